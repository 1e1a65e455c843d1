//! Textual formatting for IR executables.
//!
//! A Wadler-style pretty printer producing one line per placed instruction. Unplaced constants are
//! printed inline where they are used. The format is meant to be read by humans and holds no
//! compatibility guarantees.

use crate::exec::{IrBlockId, IrExecutable};
use crate::instruction::{IrInstId, IrInstruction, IrInstructionKind, IrTypeRef};
use ember_diagnostics::ice;
use ember_syntax::AstType;
use pretty::{Arena, DocAllocator, DocBuilder};

#[derive(Default)]
pub struct IrTextualPass<'a> {
    arena: Arena<'a>,
}

pub type Document<'a> = DocBuilder<'a, Arena<'a>>;

/// Render an executable to a string.
pub fn format_executable(exec: &IrExecutable) -> String {
    let pass = IrTextualPass::default();
    IrTextualPass::format_doc_to_string(pass.visit_executable(exec))
}

impl<'a> IrTextualPass<'a> {
    pub fn format_doc_to_string(doc: Document<'a>) -> String {
        let mut w = Vec::new();
        doc.render(80, &mut w)
            .unwrap_or_else(|_| ice!("failed to render executable"));
        String::from_utf8(w).unwrap_or_else(|_| ice!("rendered executable is not utf-8"))
    }

    pub fn visit_executable(&'a self, exec: &IrExecutable) -> Document<'a> {
        self.arena.intersperse(
            exec.block_ids().map(|block| self.visit_block(exec, block)),
            self.arena.hardline(),
        )
    }

    pub fn visit_block(&'a self, exec: &IrExecutable, block: IrBlockId) -> Document<'a> {
        let lines = exec
            .block(block)
            .instructions
            .iter()
            .map(|inst| self.visit_instruction(exec, *inst));
        self.arena
            .text(format!("bb{}:", block.0))
            .append(
                self.arena
                    .hardline()
                    .append(self.arena.intersperse(lines, self.arena.hardline()))
                    .nest(2),
            )
    }

    pub fn visit_instruction(&'a self, exec: &IrExecutable, id: IrInstId) -> Document<'a> {
        let instruction = exec.instruction(id);
        let body = self.visit_kind(exec, instruction);
        if instruction.kind.is_terminator() {
            return body;
        }
        let ty = match instruction.ty {
            Some(ty) => ty.to_string(),
            None => "?".to_string(),
        };
        self.arena
            .text(format!("%{} = {}", id.0, ty))
            .append(self.arena.space())
            .append(body)
    }

    fn visit_kind(&'a self, exec: &IrExecutable, instruction: &IrInstruction) -> Document<'a> {
        let operand = |id: &IrInstId| self.visit_operand(exec, *id);
        let list = |ids: &[IrInstId]| {
            self.arena
                .intersperse(ids.iter().map(operand), self.arena.text(", "))
        };
        match &instruction.kind {
            IrInstructionKind::Const => match &instruction.value {
                Some(value) => self.arena.text(format!("const {value}")),
                None => self.arena.text("const ?"),
            },
            IrInstructionKind::Param { index } => self.arena.text(format!("param {index}")),
            IrInstructionKind::DeclRef { name } => self.arena.text(format!("declref @{name}")),
            IrInstructionKind::BinOp { op, lhs, rhs } => self
                .arena
                .text(op.mnemonic())
                .append(self.arena.space())
                .append(list(&[*lhs, *rhs])),
            IrInstructionKind::UnOp { op, operand: value } => self
                .arena
                .text(op.mnemonic())
                .append(self.arena.space())
                .append(operand(value)),
            IrInstructionKind::Cast {
                operand: value,
                target,
                ..
            } => self
                .arena
                .text("cast ")
                .append(operand(value))
                .append(self.arena.text(" to "))
                .append(self.arena.text(type_ref_text(target))),
            IrInstructionKind::Alloca { name, init } => self
                .arena
                .text(format!("alloca \"{name}\", "))
                .append(operand(init)),
            IrInstructionKind::Load { ptr } => self.arena.text("load ").append(operand(ptr)),
            IrInstructionKind::Store { ptr, value } => {
                self.arena.text("store ").append(list(&[*value, *ptr]))
            }
            IrInstructionKind::FieldPtr { base, field } => self
                .arena
                .text("fieldptr ")
                .append(operand(base))
                .append(self.arena.text(format!(", .{}", field.name))),
            IrInstructionKind::ElemPtr { base, index } => {
                self.arena.text("elemptr ").append(list(&[*base, *index]))
            }
            IrInstructionKind::FieldValue { base, field } => self
                .arena
                .text("field ")
                .append(operand(base))
                .append(self.arena.text(format!(", .{}", field.name))),
            IrInstructionKind::ElemValue { base, index } => {
                self.arena.text("elem ").append(list(&[*base, *index]))
            }
            IrInstructionKind::InsertField { base, field, value } => self
                .arena
                .text("insertfield ")
                .append(operand(base))
                .append(self.arena.text(format!(", .{} = ", field.name)))
                .append(operand(value)),
            IrInstructionKind::InsertElem { base, index, value } => self
                .arena
                .text("insertelem ")
                .append(list(&[*base, *index, *value])),
            IrInstructionKind::Ref { operand: value } => {
                self.arena.text("ref ").append(operand(value))
            }
            IrInstructionKind::StructInit { ty, fields } => {
                let fields = fields.iter().map(|(field, value)| {
                    self.arena
                        .text(format!(".{} = ", field.name))
                        .append(operand(value))
                });
                self.arena
                    .text(format!("struct {} {{ ", type_ref_text(ty)))
                    .append(self.arena.intersperse(fields, self.arena.text(", ")))
                    .append(self.arena.text(" }"))
            }
            IrInstructionKind::ArrayInit { elements } => self
                .arena
                .text("array [")
                .append(list(elements))
                .append(self.arena.text("]")),
            IrInstructionKind::Call { callee, args } => self
                .arena
                .text("call ")
                .append(operand(callee))
                .append(self.arena.text("("))
                .append(list(args))
                .append(self.arena.text(")")),
            IrInstructionKind::Phi { incoming } => {
                let incoming = incoming.iter().map(|(block, value)| {
                    self.arena
                        .text(format!("[bb{}: ", block.0))
                        .append(operand(value))
                        .append(self.arena.text("]"))
                });
                self.arena
                    .text("phi ")
                    .append(self.arena.intersperse(incoming, self.arena.text(", ")))
            }
            IrInstructionKind::Br {
                target,
                comptime_cond,
            } => {
                let branch = self.arena.text(format!("br bb{}", target.0));
                match comptime_cond {
                    Some(cond) => branch.append(self.arena.text(" if ")).append(operand(cond)),
                    None => branch,
                }
            }
            IrInstructionKind::CondBr {
                cond,
                then_block,
                else_block,
            } => self
                .arena
                .text("condbr ")
                .append(operand(cond))
                .append(self.arena.text(format!(", bb{}, bb{}", then_block.0, else_block.0))),
            IrInstructionKind::Return { value } => self.arena.text("ret ").append(operand(value)),
            IrInstructionKind::Unreachable => self.arena.text("unreachable"),
        }
    }

    /// Print an operand. Constants that live in no block are printed by value.
    fn visit_operand(&'a self, exec: &IrExecutable, id: IrInstId) -> Document<'a> {
        let instruction = exec.instruction(id);
        match (&instruction.kind, &instruction.value) {
            (IrInstructionKind::Const, Some(value)) => match instruction.ty {
                Some(ty) => self.arena.text(format!("{ty} {value}")),
                None => self.arena.text(value.to_string()),
            },
            _ => self.arena.text(format!("%{}", id.0)),
        }
    }
}

fn type_ref_text(ty: &IrTypeRef) -> String {
    match ty {
        IrTypeRef::Resolved(ty) => ty.to_string(),
        IrTypeRef::Unresolved(ty) => ast_type_text(ty),
    }
}

fn ast_type_text(ty: &AstType) -> String {
    match ty {
        AstType::Integer(i) => format!("{}{}", if i.signed { "i" } else { "u" }, i.bits),
        AstType::Boolean(_) => "bool".to_string(),
        AstType::Unit(_) => "unit".to_string(),
        AstType::Named(n) => n.name.name.clone(),
        AstType::Pointer(p) => format!("*{}", ast_type_text(&p.inner)),
        AstType::Array(a) => format!("[_]{}", ast_type_text(&a.element)),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        format_executable, ConstExprValue, IrBinaryOp, IrExecutable, IrInstruction,
        IrInstructionKind, IrTy, ScopeArena, ScopeId, TypeTable,
    };
    use bumpalo::Bump;
    use ember_span::Span;

    fn instruction<'ta>(
        kind: IrInstructionKind<'ta>,
        ty: &'ta IrTy<'ta>,
        value: Option<ConstExprValue>,
    ) -> IrInstruction<'ta> {
        IrInstruction {
            span: Span::empty(),
            scope: ScopeId(0),
            kind,
            ty: Some(ty),
            value,
        }
    }

    #[test]
    fn test_unplaced_constants_print_inline() {
        let bump = Bump::new();
        let types = TypeTable::new(&bump);
        let i32_ty = types.get_integer_ty(true, 32);
        let noreturn = types.get_noreturn_ty();
        let mut scopes = ScopeArena::new();
        scopes.new_root(false);
        let mut exec = IrExecutable::new(scopes);
        let entry = exec.add_block();

        let param = exec.append(
            entry,
            instruction(IrInstructionKind::Param { index: 0 }, i32_ty, None),
        );
        let one = exec.push(instruction(
            IrInstructionKind::Const,
            i32_ty,
            Some(ConstExprValue::Integer(1)),
        ));
        let add = IrInstructionKind::BinOp {
            op: IrBinaryOp::Add,
            lhs: param,
            rhs: one,
        };
        let sum = exec.append(entry, instruction(add, i32_ty, None));
        exec.append(
            entry,
            instruction(IrInstructionKind::Return { value: sum }, noreturn, None),
        );

        insta::assert_snapshot!(format_executable(&exec), @r###"
        bb0:
          %0 = i32 param 0
          %2 = i32 add %0, i32 1
          ret %2
        "###);
    }
}
