//! Lowering of the syntax tree into unanalyzed IR.
//!
//! The generator walks the syntax tree once and emits instructions into basic blocks, splitting
//! blocks at every control flow join. Locals are kept in SSA form: every assignment rebinds the
//! local to a new instruction, and a phi is placed wherever different bindings of a local meet.
//! Locals whose address is taken anywhere in the body live in memory instead.
//!
//! No types are computed here. Annotations naming builtin types are resolved immediately, and
//! every other type is carried along syntactically for the analyzer to resolve.

mod expr;
mod stmt;

use crate::error::IrError;
use crate::exec::{IrBlockId, IrExecutable};
use crate::instruction::{IrField, IrInstId, IrInstruction, IrInstructionKind, IrTypeRef};
use crate::scope::{IrLocal, IrLocalStorage, LocalId, ScopeArena, ScopeId};
use crate::table::TypeTable;
use crate::ty::IrTy;
use crate::value::ConstExprValue;
use ember_diagnostics::{ice, Diagnostics};
use ember_span::Span;
use ember_syntax::{AstExpr, AstFunctionItem, AstType, AstUnaryOp};
use std::collections::{BTreeMap, BTreeSet};

/// Lower a standalone expression, such as a constant initializer or an array length.
///
/// The expression is generated in a compile-time root scope, and the executable returns its value.
pub fn generate<'ta>(
    types: &TypeTable<'ta>,
    diagnostics: &mut Diagnostics<IrError>,
    expr: &AstExpr,
) -> IrExecutable<'ta> {
    let mut scopes = ScopeArena::new();
    let root = scopes.new_root(true);
    let mut generator = Generator::new(types, diagnostics, scopes, root, false);
    generator.collect_address_taken_in_expr(expr);
    let value = generator.gen_expr(expr);
    generator.emit(expr.span(), IrInstructionKind::Return { value });
    generator.finish()
}

/// Lower the body of a function. Parameters become [`IrInstructionKind::Param`] instructions, and
/// the value of the body is returned.
pub fn generate_function<'ta>(
    types: &TypeTable<'ta>,
    diagnostics: &mut Diagnostics<IrError>,
    function: &AstFunctionItem,
) -> IrExecutable<'ta> {
    let body = function
        .body
        .as_ref()
        .unwrap_or_else(|| ice!("generating body of extern function"));
    let mut scopes = ScopeArena::new();
    let root = scopes.new_root(false);
    let mut generator = Generator::new(types, diagnostics, scopes, root, true);
    generator.collect_address_taken_in_block(body);
    for (index, parameter) in function.parameters.iter().enumerate() {
        let value = generator.emit(parameter.span, IrInstructionKind::Param { index });
        generator.declare(&parameter.name.name, false, parameter.span, value);
    }
    let value = generator.gen_block(body);
    generator.emit(body.span, IrInstructionKind::Return { value });
    generator.finish()
}

/// Control flow edge arriving at a join block, with the bindings of the locals along that edge.
#[derive(Debug, Clone)]
struct Incoming {
    block: IrBlockId,
    defs: BTreeMap<LocalId, IrInstId>,
}

#[derive(Debug)]
struct LoopFrame {
    header: IrBlockId,
    exit: IrBlockId,
    breaks: Vec<Incoming>,
    continues: Vec<Incoming>,
}

/// The root of an assignable place.
enum PlaceRoot {
    Local(LocalId),
    /// A place reached by dereferencing the pointer value.
    Pointer(IrInstId),
}

enum Projection {
    Field(IrField),
    Elem(IrInstId),
}

struct Place {
    root: PlaceRoot,
    projections: Vec<Projection>,
}

pub(crate) struct Generator<'g, 'ta> {
    types: &'g TypeTable<'ta>,
    diagnostics: &'g mut Diagnostics<IrError>,
    exec: IrExecutable<'ta>,
    layout: Vec<IrBlockId>,
    current: IrBlockId,
    scope: ScopeId,
    /// The current binding of every local. Locals in memory are bound to their allocation.
    defs: BTreeMap<LocalId, IrInstId>,
    address_taken: BTreeSet<String>,
    loops: Vec<LoopFrame>,
    in_function: bool,
    unit: Option<IrInstId>,
}

impl<'g, 'ta> Generator<'g, 'ta> {
    fn new(
        types: &'g TypeTable<'ta>,
        diagnostics: &'g mut Diagnostics<IrError>,
        scopes: ScopeArena,
        root: ScopeId,
        in_function: bool,
    ) -> Self {
        let mut exec = IrExecutable::new(scopes);
        let entry = exec.add_block();
        Self {
            types,
            diagnostics,
            exec,
            layout: vec![entry],
            current: entry,
            scope: root,
            defs: BTreeMap::new(),
            address_taken: BTreeSet::new(),
            loops: Vec::new(),
            in_function,
            unit: None,
        }
    }

    fn finish(mut self) -> IrExecutable<'ta> {
        let layout = std::mem::take(&mut self.layout);
        self.exec.prune_unreachable(&layout);
        self.exec
    }

    fn instruction(&self, span: Span, kind: IrInstructionKind<'ta>) -> IrInstruction<'ta> {
        IrInstruction {
            span,
            scope: self.scope,
            kind,
            ty: None,
            value: None,
        }
    }

    /// Append an instruction to the current block.
    fn emit(&mut self, span: Span, kind: IrInstructionKind<'ta>) -> IrInstId {
        let instruction = self.instruction(span, kind);
        self.exec.append(self.current, instruction)
    }

    /// Create a compile-time value. Constants are not placed in any block.
    fn constant(&mut self, span: Span, value: ConstExprValue) -> IrInstId {
        let instruction = IrInstruction {
            value: Some(value),
            ..self.instruction(span, IrInstructionKind::Const)
        };
        self.exec.push(instruction)
    }

    fn unit(&mut self, span: Span) -> IrInstId {
        match self.unit {
            Some(unit) => unit,
            None => {
                let unit = self.constant(span, ConstExprValue::Unit);
                self.unit = Some(unit);
                unit
            }
        }
    }

    fn new_block(&mut self) -> IrBlockId {
        self.exec.add_block()
    }

    /// Continue generating into `block`, placing it after every block generated so far.
    fn switch_to(&mut self, block: IrBlockId) {
        self.layout.push(block);
        self.current = block;
    }

    /// Continue in a fresh block that nothing branches to. Code following a terminator lands here
    /// and is pruned once generation finishes.
    fn start_dead_block(&mut self) {
        let block = self.new_block();
        self.switch_to(block);
    }

    fn branch(&mut self, span: Span, target: IrBlockId, comptime_cond: Option<IrInstId>) {
        let from = self.current;
        self.emit(
            span,
            IrInstructionKind::Br {
                target,
                comptime_cond,
            },
        );
        self.exec.add_predecessor(target, from);
    }

    fn cond_branch(
        &mut self,
        span: Span,
        cond: IrInstId,
        then_block: IrBlockId,
        else_block: IrBlockId,
    ) {
        let from = self.current;
        self.emit(
            span,
            IrInstructionKind::CondBr {
                cond,
                then_block,
                else_block,
            },
        );
        self.exec.add_predecessor(then_block, from);
        self.exec.add_predecessor(else_block, from);
    }

    fn incoming(&self) -> Incoming {
        Incoming {
            block: self.current,
            defs: self.defs.clone(),
        }
    }

    /// Bind the locals in `keys` at the start of the current join block.
    ///
    /// A phi is placed for every local that is bound differently along the incoming edges. With no
    /// incoming edges the block is dead and the bindings are left alone.
    fn merge_defs(&mut self, span: Span, keys: &[LocalId], edges: &[Incoming]) {
        if edges.is_empty() {
            return;
        }
        for key in keys {
            let values = edges
                .iter()
                .map(|edge| {
                    let value = edge
                        .defs
                        .get(key)
                        .copied()
                        .unwrap_or_else(|| ice!("local is unbound along a join edge"));
                    (edge.block, value)
                })
                .collect::<Vec<_>>();
            let first = values[0].1;
            let value = if values.iter().all(|(_, v)| *v == first) {
                first
            } else {
                self.emit(span, IrInstructionKind::Phi { incoming: values })
            };
            self.defs.insert(*key, value);
        }
    }

    /// Merge the values of a join, placing a phi if they differ.
    fn merge_value(&mut self, span: Span, values: Vec<(IrBlockId, IrInstId)>) -> IrInstId {
        match values.as_slice() {
            [] => self.unit(span),
            [(_, only)] => *only,
            [(_, first), ..] if values.iter().all(|(_, v)| v == first) => *first,
            _ => self.emit(span, IrInstructionKind::Phi { incoming: values }),
        }
    }

    fn declare(&mut self, name: &str, mutable: bool, span: Span, value: IrInstId) -> LocalId {
        let storage = if self.address_taken.contains(name) {
            IrLocalStorage::Memory
        } else {
            IrLocalStorage::Value
        };
        let local = self.exec.scopes.declare(
            self.scope,
            IrLocal {
                name: name.to_string(),
                mutable,
                storage,
                span,
            },
        );
        let binding = match storage {
            IrLocalStorage::Value => value,
            IrLocalStorage::Memory => self.emit(
                span,
                IrInstructionKind::Alloca {
                    name: name.to_string(),
                    init: value,
                },
            ),
        };
        self.defs.insert(local, binding);
        local
    }

    fn binding(&self, local: LocalId) -> IrInstId {
        self.defs
            .get(&local)
            .copied()
            .unwrap_or_else(|| ice!(format!("local {} has no binding", local.0)))
    }

    fn enter_scope(&mut self, comptime: bool) -> ScopeId {
        let parent = self.scope;
        self.scope = self.exec.scopes.new_child(parent, comptime);
        parent
    }

    /// Resolve a type annotation as far as possible without the module's declarations.
    fn annotation(&self, ty: &AstType) -> IrTypeRef<'ta> {
        match self.builtin_type(ty) {
            Some(resolved) => IrTypeRef::Resolved(resolved),
            None => IrTypeRef::Unresolved(ty.clone()),
        }
    }

    fn builtin_type(&self, ty: &AstType) -> Option<&'ta IrTy<'ta>> {
        match ty {
            AstType::Integer(i) => Some(self.types.get_integer_ty(i.signed, i.bits)),
            AstType::Boolean(_) => Some(self.types.get_bool_ty()),
            AstType::Unit(_) => Some(self.types.get_unit_ty()),
            AstType::Pointer(p) => self
                .builtin_type(&p.inner)
                .map(|inner| self.types.get_pointer_ty(inner)),
            AstType::Named(_) | AstType::Array(_) => None,
        }
    }

    /// Record the names of locals whose address is taken, so they are placed in memory.
    fn collect_address_taken_in_expr(&mut self, expr: &AstExpr) {
        match expr {
            AstExpr::IntegerLiteral(_)
            | AstExpr::BooleanLiteral(_)
            | AstExpr::UndefinedLiteral(_)
            | AstExpr::Reference(_) => {}
            AstExpr::Group(e) => self.collect_address_taken_in_expr(&e.inner),
            AstExpr::Block(e) => self.collect_address_taken_in_block(e),
            AstExpr::If(e) => {
                self.collect_address_taken_in_expr(&e.condition);
                self.collect_address_taken_in_block(&e.happy_path);
                if let Some(unhappy) = &e.unhappy_path {
                    self.collect_address_taken_in_expr(unhappy);
                }
            }
            AstExpr::While(e) => {
                self.collect_address_taken_in_expr(&e.condition);
                self.collect_address_taken_in_block(&e.body);
            }
            AstExpr::Comptime(e) => self.collect_address_taken_in_block(&e.body),
            AstExpr::Assign(e) => {
                self.collect_address_taken_in_expr(&e.lhs);
                self.collect_address_taken_in_expr(&e.rhs);
            }
            AstExpr::BinaryOp(e) => {
                self.collect_address_taken_in_expr(&e.lhs);
                self.collect_address_taken_in_expr(&e.rhs);
            }
            AstExpr::UnaryOp(e) => {
                if e.op == AstUnaryOp::AddressOf {
                    if let Some(name) = place_root_name(&e.operand) {
                        self.address_taken.insert(name.to_string());
                    }
                }
                self.collect_address_taken_in_expr(&e.operand);
            }
            AstExpr::Cast(e) => self.collect_address_taken_in_expr(&e.operand),
            AstExpr::Call(e) => {
                self.collect_address_taken_in_expr(&e.callee);
                for argument in &e.arguments {
                    self.collect_address_taken_in_expr(argument);
                }
            }
            AstExpr::DotIndex(e) => self.collect_address_taken_in_expr(&e.origin),
            AstExpr::BracketIndex(e) => {
                self.collect_address_taken_in_expr(&e.origin);
                self.collect_address_taken_in_expr(&e.index);
            }
            AstExpr::Construct(e) => {
                for argument in &e.arguments {
                    self.collect_address_taken_in_expr(&argument.expr);
                }
            }
            AstExpr::Array(e) => {
                for element in &e.elements {
                    self.collect_address_taken_in_expr(element);
                }
            }
        }
    }
}

/// Get the name of the local at the root of a place expression like `x`, `x.f` or `x[i]`.
fn place_root_name(expr: &AstExpr) -> Option<&str> {
    match expr {
        AstExpr::Reference(r) => Some(&r.name.name),
        AstExpr::Group(g) => place_root_name(&g.inner),
        AstExpr::DotIndex(d) => place_root_name(&d.origin),
        AstExpr::BracketIndex(b) => place_root_name(&b.origin),
        _ => None,
    }
}

fn strip_groups(expr: &AstExpr) -> &AstExpr {
    match expr {
        AstExpr::Group(g) => strip_groups(&g.inner),
        e => e,
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        generate, generate_function, IrBlockId, IrError, IrExecutable, IrInstructionKind,
        TypeTable,
    };
    use bumpalo::Bump;
    use ember_diagnostics::Diagnostics;
    use ember_macros::{assert_matches, assert_ok, assert_some};
    use ember_syntax::{parse_expression, parse_translation_unit, AstItem};

    fn count(exec: &IrExecutable, matches: impl Fn(&IrInstructionKind) -> bool) -> usize {
        exec.placed_instructions()
            .filter(|id| matches(&exec.instruction(*id).kind))
            .count()
    }

    fn function<'ta>(
        types: &TypeTable<'ta>,
        source: &str,
    ) -> (IrExecutable<'ta>, Diagnostics<IrError>) {
        let tu = assert_ok!(parse_translation_unit(source));
        let AstItem::Function(f) = &tu.items[0] else {
            panic!("expected a function");
        };
        let mut diagnostics = Diagnostics::new();
        let exec = generate_function(types, &mut diagnostics, f);
        (exec, diagnostics)
    }

    #[test]
    fn test_literals_are_not_placed_in_blocks() {
        let bump = Bump::new();
        let types = TypeTable::new(&bump);
        let expr = assert_ok!(parse_expression("(2 + 3) * 4"));
        let mut diagnostics = Diagnostics::new();
        let exec = generate(&types, &mut diagnostics, &expr);
        assert_eq!(exec.blocks().len(), 1);
        assert_eq!(count(&exec, |k| matches!(k, IrInstructionKind::BinOp { .. })), 2);
        assert_eq!(count(&exec, |k| matches!(k, IrInstructionKind::Const)), 0);
        let ret = assert_some!(exec.terminator(IrBlockId(0)));
        assert!(exec.scopes.is_comptime(exec.instruction(ret).scope));
    }

    #[test]
    fn test_if_merges_rebound_locals_with_phis() {
        let bump = Bump::new();
        let types = TypeTable::new(&bump);
        let (exec, diagnostics) = function(
            &types,
            "fn f(c: bool) -> i32 { let mut x = 1; if c { x = 2; } else { x = 3; } x }",
        );
        assert!(diagnostics.is_empty());
        assert_eq!(exec.blocks().len(), 4);
        assert_eq!(count(&exec, |k| matches!(k, IrInstructionKind::Phi { .. })), 1);
    }

    #[test]
    fn test_loop_header_has_placeholder_phis_and_exit() {
        let bump = Bump::new();
        let types = TypeTable::new(&bump);
        let (exec, diagnostics) = function(
            &types,
            "fn f(n: i32) -> i32 { let mut i = 0; let k = 2; while i < n { i = i + k; } i }",
        );
        assert!(diagnostics.is_empty());
        let header = assert_some!(exec
            .block_ids()
            .find(|b| exec.block(*b).loop_info.is_some()));
        let exit = assert_some!(assert_some!(exec.block(header).loop_info).exit);
        assert!(exit > header);
        let phis = exec.phis(header);
        assert_eq!(phis.len(), 1);
        assert_matches!(
            &exec.instruction(phis[0]).kind,
            IrInstructionKind::Phi { incoming } if incoming.len() == 2
        );
        assert_eq!(exec.block(header).predecessors.len(), 2);
    }

    #[test]
    fn test_address_taken_locals_live_in_memory() {
        let bump = Bump::new();
        let types = TypeTable::new(&bump);
        let (exec, _) = function(&types, "fn f() -> i32 { let mut x = 1; let p = &x; *p = 2; x }");
        assert_eq!(count(&exec, |k| matches!(k, IrInstructionKind::Alloca { .. })), 1);
        assert_eq!(count(&exec, |k| matches!(k, IrInstructionKind::Store { .. })), 1);
        assert_eq!(count(&exec, |k| matches!(k, IrInstructionKind::Load { .. })), 1);
    }

    #[test]
    fn test_field_assignment_on_values_rebuilds_the_aggregate() {
        let bump = Bump::new();
        let types = TypeTable::new(&bump);
        let (exec, diagnostics) = function(
            &types,
            "fn f(p: P) -> P { let mut q = p; q.a.b = 1; q }",
        );
        assert!(diagnostics.is_empty());
        assert_eq!(count(&exec, |k| matches!(k, IrInstructionKind::InsertField { .. })), 2);
        assert_eq!(count(&exec, |k| matches!(k, IrInstructionKind::FieldValue { .. })), 1);
    }

    #[test]
    fn test_misplaced_control_flow_is_reported() {
        let bump = Bump::new();
        let types = TypeTable::new(&bump);
        let (_, diagnostics) = function(&types, "fn f() { break; continue; let x = 1; x = 2; 3 = 4; }");
        let reports = diagnostics.into_vec();
        assert_eq!(reports.len(), 4);
        assert_matches!(&reports[0], IrError::BreakOutsideLoop(_));
        assert_matches!(&reports[1], IrError::ContinueOutsideLoop(_));
        assert_matches!(&reports[2], IrError::AssignToImmutable(_));
        assert_matches!(&reports[3], IrError::InvalidAssignTarget(_));

        let expr = assert_ok!(parse_expression("{ return 1; }"));
        let mut diagnostics = Diagnostics::new();
        generate(&types, &mut diagnostics, &expr);
        assert_matches!(
            diagnostics.iter().next(),
            Some(IrError::ReturnOutsideFunction(_))
        );
    }

    #[test]
    fn test_code_after_return_is_pruned() {
        let bump = Bump::new();
        let types = TypeTable::new(&bump);
        let (exec, _) = function(&types, "fn f(x: i32) -> i32 { return x; x + 1 }");
        assert_eq!(exec.blocks().len(), 1);
        assert_eq!(count(&exec, |k| matches!(k, IrInstructionKind::BinOp { .. })), 0);
    }
}
