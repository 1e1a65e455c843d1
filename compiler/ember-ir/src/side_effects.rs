use crate::exec::IrExecutable;
use crate::instruction::{IrBinaryOp, IrInstId, IrInstructionKind};
use crate::module::IrModule;
use crate::ty::IrTy;
use crate::value::ConstExprValue;

/// Determine if removing the analyzed instruction `id` could change the behavior of the program,
/// assuming its result is unused.
///
/// Instructions that may trap are kept unless their operands prove they cannot: a division by a
/// known divisor other than zero and minus one, or an element access with a known index within
/// the bounds of the array.
pub fn has_side_effects(exec: &IrExecutable, id: IrInstId, module: &IrModule) -> bool {
    let kind = &exec.instruction(id).kind;
    if kind.is_terminator() {
        return true;
    }
    match kind {
        IrInstructionKind::Store { .. } => true,
        IrInstructionKind::Call { callee, .. } => match known(exec, *callee)
            .and_then(ConstExprValue::as_function)
        {
            Some(function) => !module.is_pure(function),
            None => true,
        },
        IrInstructionKind::Load { ptr } => !is_local_address(exec, *ptr),
        IrInstructionKind::BinOp {
            op: IrBinaryOp::Div | IrBinaryOp::Rem,
            rhs,
            ..
        } => !matches!(
            known(exec, *rhs).and_then(ConstExprValue::as_integer),
            Some(divisor) if divisor != 0 && divisor != -1
        ),
        IrInstructionKind::ElemPtr { base, index } => {
            let array = exec.instruction(*base).ty.and_then(|ty| ty.as_pointer());
            !index_in_bounds(exec, *index, array)
        }
        IrInstructionKind::ElemValue { base, index }
        | IrInstructionKind::InsertElem { base, index, .. } => {
            !index_in_bounds(exec, *index, exec.instruction(*base).ty)
        }
        _ => false,
    }
}

fn known<'e>(exec: &'e IrExecutable, id: IrInstId) -> Option<&'e ConstExprValue> {
    exec.instruction(id).value.as_ref()
}

/// Determine if `ptr` is derived from a local allocation, which loads cannot fault on.
fn is_local_address(exec: &IrExecutable, ptr: IrInstId) -> bool {
    let mut current = ptr;
    loop {
        match &exec.instruction(current).kind {
            IrInstructionKind::Alloca { .. } => return true,
            IrInstructionKind::FieldPtr { base, .. } => current = *base,
            IrInstructionKind::ElemPtr { base, index } => {
                let array = exec.instruction(*base).ty.and_then(|ty| ty.as_pointer());
                if !index_in_bounds(exec, *index, array) {
                    return false;
                }
                current = *base;
            }
            _ => return false,
        }
    }
}

fn index_in_bounds(exec: &IrExecutable, index: IrInstId, array: Option<&IrTy>) -> bool {
    let Some(IrTy::Array(array)) = array else {
        return false;
    };
    match known(exec, index).and_then(ConstExprValue::as_integer) {
        Some(index) => index >= 0 && index < i128::from(array.len),
        None => false,
    }
}
