use super::{strip_groups, Generator, Place, PlaceRoot, Projection};
use crate::error::{AssignToImmutableError, InvalidAssignTargetError};
use crate::instruction::{
    IrBinaryOp, IrCastKind, IrField, IrInstId, IrInstructionKind, IrTypeRef, IrUnaryOp,
};
use crate::scope::IrLocalStorage;
use crate::value::ConstExprValue;
use ember_diagnostics::ice;
use ember_span::Span;
use ember_syntax::{
    AstAssignExpr, AstBinaryOp, AstBinaryOpExpr, AstBlockExpr, AstExpr, AstIfExpr, AstNamedType,
    AstType, AstUnaryOp, AstUnaryOpExpr,
};

impl<'g, 'ta> Generator<'g, 'ta> {
    pub(super) fn gen_expr(&mut self, expr: &AstExpr) -> IrInstId {
        match expr {
            AstExpr::IntegerLiteral(e) => {
                self.constant(e.span, ConstExprValue::Integer(e.value as i128))
            }
            AstExpr::BooleanLiteral(e) => self.constant(e.span, ConstExprValue::Bool(e.value)),
            AstExpr::UndefinedLiteral(e) => self.constant(e.span, ConstExprValue::Undefined),
            AstExpr::Reference(e) => match self.exec.scopes.lookup(self.scope, &e.name.name) {
                Some(local) => {
                    let binding = self.binding(local);
                    match self.exec.scopes.local(local).storage {
                        IrLocalStorage::Value => binding,
                        IrLocalStorage::Memory => {
                            self.emit(e.span, IrInstructionKind::Load { ptr: binding })
                        }
                    }
                }
                None => {
                    let instruction = self.instruction(
                        e.span,
                        IrInstructionKind::DeclRef {
                            name: e.name.name.clone(),
                        },
                    );
                    self.exec.push(instruction)
                }
            },
            AstExpr::Group(e) => self.gen_expr(&e.inner),
            AstExpr::Block(e) => self.gen_block(e),
            AstExpr::If(e) => self.gen_if(e),
            AstExpr::While(e) => self.gen_while(e),
            AstExpr::Comptime(e) => self.gen_block_in(&e.body, true),
            AstExpr::Assign(e) => self.gen_assign(e),
            AstExpr::BinaryOp(e) => match e.op {
                AstBinaryOp::And | AstBinaryOp::Or => self.gen_short_circuit(e),
                op => {
                    let lhs = self.gen_expr(&e.lhs);
                    let rhs = self.gen_expr(&e.rhs);
                    let op = match op {
                        AstBinaryOp::Add => IrBinaryOp::Add,
                        AstBinaryOp::Sub => IrBinaryOp::Sub,
                        AstBinaryOp::Mul => IrBinaryOp::Mul,
                        AstBinaryOp::Div => IrBinaryOp::Div,
                        AstBinaryOp::Rem => IrBinaryOp::Rem,
                        AstBinaryOp::Eq => IrBinaryOp::Eq,
                        AstBinaryOp::Neq => IrBinaryOp::Neq,
                        AstBinaryOp::Lt => IrBinaryOp::Lt,
                        AstBinaryOp::Lte => IrBinaryOp::Lte,
                        AstBinaryOp::Gt => IrBinaryOp::Gt,
                        AstBinaryOp::Gte => IrBinaryOp::Gte,
                        AstBinaryOp::And | AstBinaryOp::Or => ice!("short circuit op lowered as binop"),
                    };
                    self.emit(e.span, IrInstructionKind::BinOp { op, lhs, rhs })
                }
            },
            AstExpr::UnaryOp(e) => self.gen_unary(e),
            AstExpr::Cast(e) => {
                let operand = self.gen_expr(&e.operand);
                let target = self.annotation(&e.ty);
                self.emit(
                    e.span,
                    IrInstructionKind::Cast {
                        operand,
                        target,
                        kind: IrCastKind::Explicit,
                    },
                )
            }
            AstExpr::Call(e) => {
                let callee = self.gen_expr(&e.callee);
                let args = e
                    .arguments
                    .iter()
                    .map(|a| self.gen_expr(a))
                    .collect::<Vec<_>>();
                self.emit(e.span, IrInstructionKind::Call { callee, args })
            }
            AstExpr::DotIndex(e) => {
                let base = self.gen_expr(&e.origin);
                self.emit(
                    e.span,
                    IrInstructionKind::FieldValue {
                        base,
                        field: IrField::named(&e.field.name),
                    },
                )
            }
            AstExpr::BracketIndex(e) => {
                let base = self.gen_expr(&e.origin);
                let index = self.gen_expr(&e.index);
                self.emit(e.span, IrInstructionKind::ElemValue { base, index })
            }
            AstExpr::Construct(e) => {
                let fields = e
                    .arguments
                    .iter()
                    .map(|a| (IrField::named(&a.field.name), self.gen_expr(&a.expr)))
                    .collect::<Vec<_>>();
                let ty = IrTypeRef::Unresolved(AstType::Named(AstNamedType {
                    span: e.callee.span,
                    name: e.callee.clone(),
                }));
                self.emit(e.span, IrInstructionKind::StructInit { ty, fields })
            }
            AstExpr::Array(e) => {
                let elements = e
                    .elements
                    .iter()
                    .map(|element| self.gen_expr(element))
                    .collect::<Vec<_>>();
                self.emit(e.span, IrInstructionKind::ArrayInit { elements })
            }
        }
    }

    pub(super) fn gen_block(&mut self, block: &AstBlockExpr) -> IrInstId {
        self.gen_block_in(block, false)
    }

    pub(super) fn gen_block_in(&mut self, block: &AstBlockExpr, comptime: bool) -> IrInstId {
        let parent = self.enter_scope(comptime);
        for stmt in &block.stmts {
            self.gen_stmt(stmt);
        }
        let value = match &block.tail {
            Some(tail) => self.gen_expr(tail),
            None => self.unit(block.span),
        };
        self.scope = parent;
        value
    }

    /// Lower an if expression.
    ///
    /// ```text
    ///   bb_cond: condbr %c, bb_then, bb_else
    ///   bb_then: ... br bb_end if %c
    ///   bb_else: ... br bb_end if %c
    ///   bb_end:  phi [bb_then, %a], [bb_else, %b]
    /// ```
    ///
    /// Both arm exits carry the condition, so an analyzer that knows the condition continues
    /// straight into the join.
    fn gen_if(&mut self, e: &AstIfExpr) -> IrInstId {
        let cond = self.gen_expr(&e.condition);
        let then_block = self.new_block();
        let else_block = self.new_block();
        let end_block = self.new_block();
        self.cond_branch(e.span, cond, then_block, else_block);
        let before = self.defs.clone();

        self.switch_to(then_block);
        let then_value = self.gen_block(&e.happy_path);
        let then_edge = self.incoming();
        self.branch(e.happy_path.span, end_block, Some(cond));

        self.defs = before.clone();
        self.switch_to(else_block);
        let else_value = match &e.unhappy_path {
            Some(unhappy) => self.gen_expr(unhappy),
            None => self.unit(e.span),
        };
        let else_edge = self.incoming();
        self.branch(e.span, end_block, Some(cond));

        self.switch_to(end_block);
        let keys = before.keys().copied().collect::<Vec<_>>();
        self.defs = before;
        let values = vec![(then_edge.block, then_value), (else_edge.block, else_value)];
        self.merge_defs(e.span, &keys, &[then_edge, else_edge]);
        self.merge_value(e.span, values)
    }

    /// Lower `a && b` and `a || b` so that `b` is only evaluated when it decides the result.
    fn gen_short_circuit(&mut self, e: &AstBinaryOpExpr) -> IrInstId {
        let lhs = self.gen_expr(&e.lhs);
        let rhs_block = self.new_block();
        let end_block = self.new_block();
        let short_value = self.constant(e.span, ConstExprValue::Bool(e.op == AstBinaryOp::Or));
        let short_edge = self.incoming();
        match e.op {
            AstBinaryOp::And => self.cond_branch(e.span, lhs, rhs_block, end_block),
            _ => self.cond_branch(e.span, lhs, end_block, rhs_block),
        }
        let before = self.defs.clone();

        self.switch_to(rhs_block);
        let rhs = self.gen_expr(&e.rhs);
        let rhs_edge = self.incoming();
        self.branch(e.span, end_block, Some(lhs));

        self.switch_to(end_block);
        let keys = before.keys().copied().collect::<Vec<_>>();
        self.defs = before;
        let values = vec![(short_edge.block, short_value), (rhs_edge.block, rhs)];
        self.merge_defs(e.span, &keys, &[short_edge, rhs_edge]);
        self.merge_value(e.span, values)
    }

    fn gen_unary(&mut self, e: &AstUnaryOpExpr) -> IrInstId {
        match e.op {
            AstUnaryOp::Neg | AstUnaryOp::Not => {
                let operand = self.gen_expr(&e.operand);
                let op = match e.op {
                    AstUnaryOp::Neg => IrUnaryOp::Neg,
                    _ => IrUnaryOp::Not,
                };
                self.emit(e.span, IrInstructionKind::UnOp { op, operand })
            }
            AstUnaryOp::Deref => {
                let ptr = self.gen_expr(&e.operand);
                self.emit(e.span, IrInstructionKind::Load { ptr })
            }
            AstUnaryOp::AddressOf => {
                let target = strip_groups(&e.operand);
                if self.is_addressable(target) {
                    if let Some(place) = self.gen_place(target) {
                        return self.place_pointer(e.span, place);
                    }
                }
                let operand = self.gen_expr(target);
                self.emit(e.span, IrInstructionKind::Ref { operand })
            }
        }
    }

    /// Lower an assignment. The value of an assignment is `unit`.
    fn gen_assign(&mut self, e: &AstAssignExpr) -> IrInstId {
        let target = strip_groups(&e.lhs);
        let place = self.gen_place(target);
        let value = self.gen_expr(&e.rhs);
        match place {
            Some(Place {
                root: PlaceRoot::Local(local),
                projections,
            }) => {
                let info = self.exec.scopes.local(local).clone();
                if !info.mutable {
                    self.diagnostics.report(AssignToImmutableError {
                        name: info.name,
                        span: target.span(),
                    });
                    return self.unit(e.span);
                }
                let binding = self.binding(local);
                match info.storage {
                    IrLocalStorage::Value => {
                        let rebuilt = self.rebuild(e.span, binding, &projections, value);
                        self.defs.insert(local, rebuilt);
                    }
                    IrLocalStorage::Memory => {
                        let ptr = self.project_pointer(e.span, binding, projections);
                        self.emit(e.span, IrInstructionKind::Store { ptr, value });
                    }
                }
            }
            Some(
                place @ Place {
                    root: PlaceRoot::Pointer(_),
                    ..
                },
            ) => {
                let ptr = self.place_pointer(e.span, place);
                self.emit(e.span, IrInstructionKind::Store { ptr, value });
            }
            None => {
                self.diagnostics
                    .report(InvalidAssignTargetError { span: target.span() });
            }
        }
        self.unit(e.span)
    }

    /// Determine if taking the address of `expr` yields a pointer to existing storage, rather than
    /// to a temporary copy of its value.
    fn is_addressable(&self, expr: &AstExpr) -> bool {
        match expr {
            AstExpr::Reference(r) => self
                .exec
                .scopes
                .lookup(self.scope, &r.name.name)
                .is_some_and(|l| self.exec.scopes.local(l).storage == IrLocalStorage::Memory),
            AstExpr::Group(g) => self.is_addressable(&g.inner),
            AstExpr::DotIndex(d) => self.is_addressable(&d.origin),
            AstExpr::BracketIndex(b) => self.is_addressable(&b.origin),
            AstExpr::UnaryOp(u) => u.op == AstUnaryOp::Deref,
            _ => false,
        }
    }

    /// Lower the place an expression denotes. Index operands and dereferenced pointers are
    /// evaluated along the way.
    fn gen_place(&mut self, expr: &AstExpr) -> Option<Place> {
        match expr {
            AstExpr::Group(g) => self.gen_place(&g.inner),
            AstExpr::Reference(r) => {
                let local = self.exec.scopes.lookup(self.scope, &r.name.name)?;
                Some(Place {
                    root: PlaceRoot::Local(local),
                    projections: vec![],
                })
            }
            AstExpr::DotIndex(d) => {
                let mut place = self.gen_place(&d.origin)?;
                place
                    .projections
                    .push(Projection::Field(IrField::named(&d.field.name)));
                Some(place)
            }
            AstExpr::BracketIndex(b) => {
                let mut place = self.gen_place(&b.origin)?;
                let index = self.gen_expr(&b.index);
                place.projections.push(Projection::Elem(index));
                Some(place)
            }
            AstExpr::UnaryOp(u) if u.op == AstUnaryOp::Deref => {
                let ptr = self.gen_expr(&u.operand);
                Some(Place {
                    root: PlaceRoot::Pointer(ptr),
                    projections: vec![],
                })
            }
            _ => None,
        }
    }

    fn place_pointer(&mut self, span: Span, place: Place) -> IrInstId {
        let root = match place.root {
            PlaceRoot::Local(local) => self.binding(local),
            PlaceRoot::Pointer(ptr) => ptr,
        };
        self.project_pointer(span, root, place.projections)
    }

    fn project_pointer(
        &mut self,
        span: Span,
        root: IrInstId,
        projections: Vec<Projection>,
    ) -> IrInstId {
        projections
            .into_iter()
            .fold(root, |base, projection| match projection {
                Projection::Field(field) => {
                    self.emit(span, IrInstructionKind::FieldPtr { base, field })
                }
                Projection::Elem(index) => {
                    self.emit(span, IrInstructionKind::ElemPtr { base, index })
                }
            })
    }

    /// Produce a copy of `base` with the member at `projections` replaced by `value`.
    fn rebuild(
        &mut self,
        span: Span,
        base: IrInstId,
        projections: &[Projection],
        value: IrInstId,
    ) -> IrInstId {
        let Some((first, rest)) = projections.split_first() else {
            return value;
        };
        let inner = if rest.is_empty() {
            value
        } else {
            let member = match first {
                Projection::Field(field) => self.emit(
                    span,
                    IrInstructionKind::FieldValue {
                        base,
                        field: field.clone(),
                    },
                ),
                Projection::Elem(index) => self.emit(
                    span,
                    IrInstructionKind::ElemValue {
                        base,
                        index: *index,
                    },
                ),
            };
            self.rebuild(span, member, rest, value)
        };
        match first {
            Projection::Field(field) => self.emit(
                span,
                IrInstructionKind::InsertField {
                    base,
                    field: field.clone(),
                    value: inner,
                },
            ),
            Projection::Elem(index) => self.emit(
                span,
                IrInstructionKind::InsertElem {
                    base,
                    index: *index,
                    value: inner,
                },
            ),
        }
    }
}
