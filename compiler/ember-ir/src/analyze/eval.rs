//! Operators and casts, folded whenever their operands are known.

use super::{Analyzer, Flow};
use crate::error::{
    DivisionByZeroError, IntegerOverflowError, InvalidCastError, InvalidOperandTypesError,
    InvalidUnaryOperandError, UndefinedValueUseError, ValueDoesNotFitError,
};
use crate::instruction::{IrBinaryOp, IrCastKind, IrInstId, IrInstructionKind, IrTypeRef, IrUnaryOp};
use crate::ty::IrTy;
use crate::value::ConstExprValue;
use ember_diagnostics::ice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FoldError {
    Overflow,
    DivisionByZero,
    Undefined,
}

fn operands_allowed(op: IrBinaryOp, ty: &IrTy) -> bool {
    match op {
        IrBinaryOp::Eq | IrBinaryOp::Neq => ty.is_numeric() || matches!(ty, IrTy::Bool),
        _ => ty.is_numeric(),
    }
}

/// Evaluate a binary operator on known operands of the peer type `ty`.
fn fold_binary(
    op: IrBinaryOp,
    lhs: &ConstExprValue,
    rhs: &ConstExprValue,
    ty: &IrTy,
) -> Result<ConstExprValue, FoldError> {
    if lhs.is_undefined() || rhs.is_undefined() {
        return Err(FoldError::Undefined);
    }
    match (lhs, rhs) {
        (ConstExprValue::Integer(a), ConstExprValue::Integer(b)) => {
            let (a, b) = (*a, *b);
            let result = match op {
                IrBinaryOp::Add => a.checked_add(b),
                IrBinaryOp::Sub => a.checked_sub(b),
                IrBinaryOp::Mul => a.checked_mul(b),
                IrBinaryOp::Div | IrBinaryOp::Rem if b == 0 => {
                    return Err(FoldError::DivisionByZero)
                }
                IrBinaryOp::Div => a.checked_div(b),
                IrBinaryOp::Rem => a.checked_rem(b),
                IrBinaryOp::Eq => return Ok(ConstExprValue::Bool(a == b)),
                IrBinaryOp::Neq => return Ok(ConstExprValue::Bool(a != b)),
                IrBinaryOp::Lt => return Ok(ConstExprValue::Bool(a < b)),
                IrBinaryOp::Lte => return Ok(ConstExprValue::Bool(a <= b)),
                IrBinaryOp::Gt => return Ok(ConstExprValue::Bool(a > b)),
                IrBinaryOp::Gte => return Ok(ConstExprValue::Bool(a >= b)),
            };
            let result = result.ok_or(FoldError::Overflow)?;
            match ty.as_integer() {
                Some(int) if !int.fits(result) => Err(FoldError::Overflow),
                _ => Ok(ConstExprValue::Integer(result)),
            }
        }
        (ConstExprValue::Bool(a), ConstExprValue::Bool(b)) => match op {
            IrBinaryOp::Eq => Ok(ConstExprValue::Bool(a == b)),
            IrBinaryOp::Neq => Ok(ConstExprValue::Bool(a != b)),
            _ => ice!("arithmetic on booleans passed type checking"),
        },
        _ => ice!("folding operands of different kinds"),
    }
}

impl<'a, 's, 'ast, 'ta> Analyzer<'a, 's, 'ast, 'ta> {
    pub(super) fn analyze_binary(
        &mut self,
        old: IrInstId,
        op: IrBinaryOp,
        lhs: IrInstId,
        rhs: IrInstId,
    ) -> Flow<IrInstId> {
        let lhs = self.operand(lhs)?;
        let rhs = self.operand(rhs)?;
        let (lhs_ty, rhs_ty) = (self.ty_of(lhs), self.ty_of(rhs));
        if lhs_ty.is_invalid() || rhs_ty.is_invalid() {
            return Ok(self.poison(old));
        }
        let Some(ty) = self
            .peer(lhs_ty, rhs_ty)
            .filter(|ty| operands_allowed(op, ty))
        else {
            self.session.diagnostics.report(InvalidOperandTypesError {
                op: op.mnemonic().to_string(),
                lhs_type: lhs_ty.to_string(),
                rhs_type: rhs_ty.to_string(),
                span: self.span_of(old),
            });
            return Ok(self.poison(old));
        };
        let result_ty = if op.is_comparison() {
            self.types().get_bool_ty()
        } else {
            ty
        };

        match (self.value_of(lhs).cloned(), self.value_of(rhs).cloned()) {
            (Some(a), Some(b)) => {
                return Ok(match fold_binary(op, &a, &b, ty) {
                    Ok(value) => self.constant(old, result_ty, value),
                    Err(error) => {
                        self.report_fold(old, error, ty);
                        self.poison(old)
                    }
                });
            }
            (_, Some(ConstExprValue::Integer(0)))
                if matches!(op, IrBinaryOp::Div | IrBinaryOp::Rem) =>
            {
                self.report_fold(old, FoldError::DivisionByZero, ty);
                return Ok(self.poison(old));
            }
            (Some(ConstExprValue::Undefined), None) | (None, Some(ConstExprValue::Undefined)) => {
                self.report_fold(old, FoldError::Undefined, ty);
                return Ok(self.poison(old));
            }
            _ => {}
        }
        let lhs = self.coerce(old, lhs, ty, None)?;
        let rhs = self.coerce(old, rhs, ty, None)?;
        self.emit(old, result_ty, IrInstructionKind::BinOp { op, lhs, rhs })
    }

    fn report_fold(&mut self, old: IrInstId, error: FoldError, ty: &IrTy) {
        let span = self.span_of(old);
        match error {
            FoldError::Overflow => self.session.diagnostics.report(IntegerOverflowError {
                type_name: ty.to_string(),
                span,
            }),
            FoldError::DivisionByZero => {
                self.session.diagnostics.report(DivisionByZeroError { span })
            }
            FoldError::Undefined => self.session.diagnostics.report(UndefinedValueUseError { span }),
        }
    }

    pub(super) fn analyze_unary(
        &mut self,
        old: IrInstId,
        op: IrUnaryOp,
        operand: IrInstId,
    ) -> Flow<IrInstId> {
        let operand = self.operand(operand)?;
        let ty = self.ty_of(operand);
        if ty.is_invalid() {
            return Ok(self.poison(old));
        }
        let allowed = match op {
            IrUnaryOp::Neg => {
                ty.is_comptime_int() || ty.as_integer().is_some_and(|int| int.signed)
            }
            IrUnaryOp::Not => matches!(ty, IrTy::Bool),
        };
        if !allowed {
            self.session.diagnostics.report(InvalidUnaryOperandError {
                op: op.mnemonic().to_string(),
                operand_type: ty.to_string(),
                span: self.span_of(old),
            });
            return Ok(self.poison(old));
        }
        let folded = match self.value_of(operand) {
            None => None,
            Some(ConstExprValue::Undefined) => Some(Err(FoldError::Undefined)),
            Some(ConstExprValue::Integer(v)) => Some(
                v.checked_neg()
                    .filter(|n| ty.as_integer().map_or(true, |int| int.fits(*n)))
                    .map(ConstExprValue::Integer)
                    .ok_or(FoldError::Overflow),
            ),
            Some(ConstExprValue::Bool(b)) => Some(Ok(ConstExprValue::Bool(!b))),
            Some(_) => ice!("unary operand of unexpected kind"),
        };
        match folded {
            Some(Ok(value)) => Ok(self.constant(old, ty, value)),
            Some(Err(error)) => {
                self.report_fold(old, error, ty);
                Ok(self.poison(old))
            }
            None => self.emit(old, ty, IrInstructionKind::UnOp { op, operand }),
        }
    }

    pub(super) fn analyze_cast(
        &mut self,
        old: IrInstId,
        operand: IrInstId,
        target: &IrTypeRef<'ta>,
        kind: IrCastKind,
    ) -> Flow<IrInstId> {
        let operand = self.operand(operand)?;
        let to = self.session.resolve_type_ref(target);
        let from = self.ty_of(operand);
        if from.is_invalid() || to.is_invalid() {
            return Ok(self.poison(old));
        }
        match kind {
            IrCastKind::Implicit => self.coerce(old, operand, to, None),
            IrCastKind::Explicit => self.explicit_cast(old, operand, from, to),
        }
    }

    /// Convert between integer types, or from `bool` to an integer type. Values known at compile
    /// time must fit the target.
    fn explicit_cast(
        &mut self,
        old: IrInstId,
        operand: IrInstId,
        from: &'ta IrTy<'ta>,
        to: &'ta IrTy<'ta>,
    ) -> Flow<IrInstId> {
        if self.coercible(operand, to) {
            return self.coerce(old, operand, to, None);
        }
        let (IrTy::Integer(_) | IrTy::ComptimeInt | IrTy::Bool, IrTy::Integer(target)) = (from, to)
        else {
            self.session.diagnostics.report(InvalidCastError {
                from_type: from.to_string(),
                to_type: to.to_string(),
                span: self.span_of(old),
            });
            return Ok(self.poison(old));
        };
        let value = match self.value_of(operand) {
            None => {
                let kind = IrInstructionKind::Cast {
                    operand,
                    target: IrTypeRef::Resolved(to),
                    kind: IrCastKind::Explicit,
                };
                return self.emit(old, to, kind);
            }
            Some(ConstExprValue::Undefined) => {
                return Ok(self.constant(old, to, ConstExprValue::Undefined))
            }
            Some(ConstExprValue::Integer(n)) => *n,
            Some(ConstExprValue::Bool(b)) => i128::from(*b),
            Some(_) => ice!("cast operand of unexpected kind"),
        };
        if !target.fits(value) {
            self.session.diagnostics.report(ValueDoesNotFitError {
                value,
                type_name: to.to_string(),
                span: self.span_of(old),
            });
            return Ok(self.poison(old));
        }
        Ok(self.constant(old, to, ConstExprValue::Integer(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::{fold_binary, FoldError};
    use crate::{ConstExprValue, IrBinaryOp, TypeTable};
    use bumpalo::Bump;
    use ember_macros::{assert_err, assert_ok};

    #[test]
    fn test_division_truncates_toward_zero() {
        let bump = Bump::new();
        let types = TypeTable::new(&bump);
        let i32_ty = types.get_integer_ty(true, 32);
        let quotient = assert_ok!(fold_binary(
            IrBinaryOp::Div,
            &ConstExprValue::Integer(-7),
            &ConstExprValue::Integer(2),
            i32_ty
        ));
        assert_eq!(quotient, ConstExprValue::Integer(-3));
        let remainder = assert_ok!(fold_binary(
            IrBinaryOp::Rem,
            &ConstExprValue::Integer(-7),
            &ConstExprValue::Integer(2),
            i32_ty
        ));
        assert_eq!(remainder, ConstExprValue::Integer(-1));
    }

    #[test]
    fn test_folding_respects_the_result_type() {
        let bump = Bump::new();
        let types = TypeTable::new(&bump);
        let u8_ty = types.get_integer_ty(false, 8);
        let sum = fold_binary(
            IrBinaryOp::Add,
            &ConstExprValue::Integer(200),
            &ConstExprValue::Integer(100),
            u8_ty,
        );
        assert_eq!(assert_err!(sum), FoldError::Overflow);
        let literal = fold_binary(
            IrBinaryOp::Add,
            &ConstExprValue::Integer(200),
            &ConstExprValue::Integer(100),
            types.get_comptime_int_ty(),
        );
        assert_eq!(assert_ok!(literal), ConstExprValue::Integer(300));
    }

    #[test]
    fn test_undefined_and_zero_divisors_are_errors() {
        let bump = Bump::new();
        let types = TypeTable::new(&bump);
        let literal = types.get_comptime_int_ty();
        let undefined = fold_binary(
            IrBinaryOp::Mul,
            &ConstExprValue::Undefined,
            &ConstExprValue::Integer(2),
            literal,
        );
        assert_eq!(assert_err!(undefined), FoldError::Undefined);
        let zero = fold_binary(
            IrBinaryOp::Rem,
            &ConstExprValue::Integer(1),
            &ConstExprValue::Integer(0),
            literal,
        );
        assert_eq!(assert_err!(zero), FoldError::DivisionByZero);
        let comparison = fold_binary(
            IrBinaryOp::Lt,
            &ConstExprValue::Integer(1),
            &ConstExprValue::Integer(2),
            literal,
        );
        assert_eq!(assert_ok!(comparison), ConstExprValue::Bool(true));
    }
}
