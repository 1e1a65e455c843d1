use crate::exec::IrBlockId;
use crate::scope::ScopeId;
use crate::ty::IrTy;
use crate::value::ConstExprValue;
use ember_span::Span;
use ember_syntax::AstType;

/// Position of an instruction in its executable's instruction arena.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IrInstId(pub usize);

/// A single step of the IR.
///
/// The generator fills in `kind`, `span` and `scope`. The analyzer produces new instructions that
/// additionally carry their result type, and the compile-time value when the result is known.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone)]
pub struct IrInstruction<'ta> {
    pub span: Span,
    pub scope: ScopeId,
    pub kind: IrInstructionKind<'ta>,
    pub ty: Option<&'ta IrTy<'ta>>,
    pub value: Option<ConstExprValue>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone)]
pub enum IrInstructionKind<'ta> {
    /// A compile-time value. Literals are generated with the value already set on the
    /// instruction; their type follows from the value.
    Const,
    /// The function parameter at `index`.
    Param { index: usize },
    /// A reference to a module-level item, resolved during analysis.
    DeclRef { name: String },
    BinOp {
        op: IrBinaryOp,
        lhs: IrInstId,
        rhs: IrInstId,
    },
    UnOp {
        op: IrUnaryOp,
        operand: IrInstId,
    },
    Cast {
        operand: IrInstId,
        target: IrTypeRef<'ta>,
        kind: IrCastKind,
    },
    /// Allocate memory for a local whose address is taken, initialized with `init`. The result is
    /// a pointer to the local.
    Alloca { name: String, init: IrInstId },
    Load { ptr: IrInstId },
    Store { ptr: IrInstId, value: IrInstId },
    /// Pointer to a field of the struct `base` points to.
    FieldPtr { base: IrInstId, field: IrField },
    /// Pointer to an element of the array `base` points to.
    ElemPtr { base: IrInstId, index: IrInstId },
    FieldValue { base: IrInstId, field: IrField },
    ElemValue { base: IrInstId, index: IrInstId },
    /// A copy of the struct `base` with one field replaced.
    InsertField {
        base: IrInstId,
        field: IrField,
        value: IrInstId,
    },
    /// A copy of the array `base` with one element replaced.
    InsertElem {
        base: IrInstId,
        index: IrInstId,
        value: IrInstId,
    },
    /// Take the address of a temporary value.
    Ref { operand: IrInstId },
    StructInit {
        ty: IrTypeRef<'ta>,
        fields: Vec<(IrField, IrInstId)>,
    },
    ArrayInit { elements: Vec<IrInstId> },
    Call { callee: IrInstId, args: Vec<IrInstId> },
    /// A merge of the values arriving from each predecessor block.
    Phi { incoming: Vec<(IrBlockId, IrInstId)> },
    /// Unconditional branch.
    ///
    /// When `comptime_cond` folds to a compile-time value, every other path into `target` is known
    /// to be dead and the analyzer continues straight into `target`.
    Br {
        target: IrBlockId,
        comptime_cond: Option<IrInstId>,
    },
    CondBr {
        cond: IrInstId,
        then_block: IrBlockId,
        else_block: IrBlockId,
    },
    Return { value: IrInstId },
    Unreachable,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrBinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrUnaryOp {
    Neg,
    Not,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrCastKind {
    /// A coercion the language performs without being asked, such as integer widening.
    Implicit,
    /// An `as` cast written in the source.
    Explicit,
}

/// A struct field reference. The index is filled in once the struct type is known.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrField {
    pub name: String,
    pub index: Option<u32>,
}

/// A type mentioned by an instruction.
///
/// Builtin types are resolved while generating. Named and array types need the module's struct
/// table or compile-time evaluation of the array length, so they stay syntactic until analysis.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone)]
pub enum IrTypeRef<'ta> {
    Resolved(&'ta IrTy<'ta>),
    Unresolved(AstType),
}

impl IrBinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            IrBinaryOp::Eq
                | IrBinaryOp::Neq
                | IrBinaryOp::Lt
                | IrBinaryOp::Lte
                | IrBinaryOp::Gt
                | IrBinaryOp::Gte
        )
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            IrBinaryOp::Add => "add",
            IrBinaryOp::Sub => "sub",
            IrBinaryOp::Mul => "mul",
            IrBinaryOp::Div => "div",
            IrBinaryOp::Rem => "rem",
            IrBinaryOp::Eq => "eq",
            IrBinaryOp::Neq => "neq",
            IrBinaryOp::Lt => "lt",
            IrBinaryOp::Lte => "lte",
            IrBinaryOp::Gt => "gt",
            IrBinaryOp::Gte => "gte",
        }
    }
}

impl IrUnaryOp {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            IrUnaryOp::Neg => "neg",
            IrUnaryOp::Not => "not",
        }
    }
}

impl IrField {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            index: None,
        }
    }
}

impl<'ta> IrInstructionKind<'ta> {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            IrInstructionKind::Br { .. }
                | IrInstructionKind::CondBr { .. }
                | IrInstructionKind::Return { .. }
                | IrInstructionKind::Unreachable
        )
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, IrInstructionKind::Phi { .. })
    }

    /// Get every instruction this instruction reads.
    pub fn operands(&self) -> Vec<IrInstId> {
        match self {
            IrInstructionKind::Const
            | IrInstructionKind::Param { .. }
            | IrInstructionKind::DeclRef { .. }
            | IrInstructionKind::Unreachable => vec![],
            IrInstructionKind::BinOp { lhs, rhs, .. } => vec![*lhs, *rhs],
            IrInstructionKind::UnOp { operand, .. }
            | IrInstructionKind::Cast { operand, .. }
            | IrInstructionKind::Ref { operand } => vec![*operand],
            IrInstructionKind::Alloca { init, .. } => vec![*init],
            IrInstructionKind::Load { ptr } => vec![*ptr],
            IrInstructionKind::Store { ptr, value } => vec![*ptr, *value],
            IrInstructionKind::FieldPtr { base, .. } | IrInstructionKind::FieldValue { base, .. } => {
                vec![*base]
            }
            IrInstructionKind::ElemPtr { base, index }
            | IrInstructionKind::ElemValue { base, index } => vec![*base, *index],
            IrInstructionKind::InsertField { base, value, .. } => vec![*base, *value],
            IrInstructionKind::InsertElem { base, index, value } => vec![*base, *index, *value],
            IrInstructionKind::StructInit { fields, .. } => {
                fields.iter().map(|(_, value)| *value).collect()
            }
            IrInstructionKind::ArrayInit { elements } => elements.clone(),
            IrInstructionKind::Call { callee, args } => {
                let mut operands = vec![*callee];
                operands.extend(args.iter().copied());
                operands
            }
            IrInstructionKind::Phi { incoming } => incoming.iter().map(|(_, v)| *v).collect(),
            IrInstructionKind::Br { comptime_cond, .. } => comptime_cond.iter().copied().collect(),
            IrInstructionKind::CondBr { cond, .. } => vec![*cond],
            IrInstructionKind::Return { value } => vec![*value],
        }
    }

    /// Get the blocks control may transfer to after this instruction.
    pub fn successors(&self) -> Vec<IrBlockId> {
        match self {
            IrInstructionKind::Br { target, .. } => vec![*target],
            IrInstructionKind::CondBr {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{IrBinaryOp, IrBlockId, IrInstId, IrInstructionKind};

    #[test]
    fn test_operands_and_successors() {
        let call = IrInstructionKind::Call {
            callee: IrInstId(0),
            args: vec![IrInstId(1), IrInstId(2)],
        };
        assert_eq!(call.operands(), vec![IrInstId(0), IrInstId(1), IrInstId(2)]);
        assert!(!call.is_terminator());

        let br = IrInstructionKind::CondBr {
            cond: IrInstId(3),
            then_block: IrBlockId(1),
            else_block: IrBlockId(2),
        };
        assert!(br.is_terminator());
        assert_eq!(br.successors(), vec![IrBlockId(1), IrBlockId(2)]);
        assert_eq!(br.operands(), vec![IrInstId(3)]);
    }

    #[test]
    fn test_comparison_ops() {
        assert!(IrBinaryOp::Lte.is_comparison());
        assert!(!IrBinaryOp::Rem.is_comparison());
    }
}
