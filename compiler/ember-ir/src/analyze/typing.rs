//! Peer type resolution and implicit coercion.

use super::{Analyzer, Flow};
use crate::error::{TypeMismatchError, ValueDoesNotFitError};
use crate::exec::IrBlockId;
use crate::instruction::{IrCastKind, IrInstId, IrInstruction, IrInstructionKind, IrTypeRef};
use crate::table::TypeTable;
use crate::ty::IrTy;
use crate::value::ConstExprValue;
use ember_span::Span;

/// Get the type a runtime value of `ty` takes. Integer literals default to `i32`.
pub(crate) fn concretize<'ta>(types: &TypeTable<'ta>, ty: &'ta IrTy<'ta>) -> &'ta IrTy<'ta> {
    match ty {
        IrTy::ComptimeInt => types.get_integer_ty(true, 32),
        IrTy::Array(a) => {
            let element = concretize(types, a.element);
            if element == a.element {
                ty
            } else {
                types.get_array_ty(element, a.len)
            }
        }
        _ => ty,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CoerceFailure {
    Mismatch,
    DoesNotFit(i128),
}

/// Convert a known value of type `from` to type `to`.
fn coerce_const_value(
    value: &ConstExprValue,
    from: &IrTy,
    to: &IrTy,
) -> Result<ConstExprValue, CoerceFailure> {
    if from == to {
        return Ok(value.clone());
    }
    match (from, to) {
        (IrTy::Invalid, _) | (_, IrTy::Invalid) => Ok(value.clone()),
        (IrTy::Undefined | IrTy::NoReturn, _) => Ok(ConstExprValue::Undefined),
        (IrTy::ComptimeInt, IrTy::Integer(target)) => match value {
            ConstExprValue::Integer(v) if target.fits(*v) => Ok(value.clone()),
            ConstExprValue::Integer(v) => Err(CoerceFailure::DoesNotFit(*v)),
            ConstExprValue::Undefined => Ok(ConstExprValue::Undefined),
            _ => Err(CoerceFailure::Mismatch),
        },
        (IrTy::Integer(source), IrTy::Integer(target)) if source.widens_into(target) => {
            Ok(value.clone())
        }
        (IrTy::Array(source), IrTy::Array(target)) if source.len == target.len => match value {
            ConstExprValue::Aggregate(members) => members
                .iter()
                .map(|m| coerce_const_value(m, source.element, target.element))
                .collect::<Result<Vec<_>, _>>()
                .map(ConstExprValue::Aggregate),
            ConstExprValue::Undefined => Ok(ConstExprValue::Undefined),
            _ => Err(CoerceFailure::Mismatch),
        },
        _ => Err(CoerceFailure::Mismatch),
    }
}

/// What it takes to turn a value into one of the target type.
enum Conversion {
    Done(IrInstId),
    /// A runtime integer must be widened by an implicit cast.
    Widen,
}

impl<'a, 's, 'ast, 'ta> Analyzer<'a, 's, 'ast, 'ta> {
    /// Find the type both `a` and `b` coerce into.
    pub(super) fn peer(&self, a: &'ta IrTy<'ta>, b: &'ta IrTy<'ta>) -> Option<&'ta IrTy<'ta>> {
        if a == b {
            return Some(a);
        }
        match (a, b) {
            (IrTy::Invalid, _) | (_, IrTy::Invalid) => Some(self.types().get_invalid_ty()),
            (IrTy::Undefined | IrTy::NoReturn, _) => Some(b),
            (_, IrTy::Undefined | IrTy::NoReturn) => Some(a),
            (IrTy::ComptimeInt, IrTy::Integer(_)) => Some(b),
            (IrTy::Integer(_), IrTy::ComptimeInt) => Some(a),
            (IrTy::Integer(x), IrTy::Integer(y)) => {
                if x.widens_into(y) {
                    Some(b)
                } else if y.widens_into(x) {
                    Some(a)
                } else {
                    None
                }
            }
            (IrTy::Array(x), IrTy::Array(y)) if x.len == y.len => {
                let element = self.peer(x.element, y.element)?;
                Some(self.types().get_array_ty(element, x.len))
            }
            _ => None,
        }
    }

    /// Find the type the result of the old instruction `old` is coerced to by the code that uses
    /// it: the function result when it is returned, or an annotated `let`. Merges are looked
    /// through.
    pub(super) fn result_hint(&self, old: IrInstId) -> Option<&'ta IrTy<'ta>> {
        let mut pending = vec![old];
        let mut seen = Vec::new();
        while let Some(id) = pending.pop() {
            if seen.contains(&id) {
                continue;
            }
            seen.push(id);
            for user in self.old.placed_instructions() {
                let kind = &self.old.instruction(user).kind;
                if !kind.operands().contains(&id) {
                    continue;
                }
                match kind {
                    IrInstructionKind::Return { .. } => {
                        if let Some(expected) = self.expected_type {
                            return Some(expected);
                        }
                    }
                    IrInstructionKind::Cast {
                        target: IrTypeRef::Resolved(target),
                        kind: IrCastKind::Implicit,
                        ..
                    } => return Some(*target),
                    IrInstructionKind::Phi { .. } => pending.push(user),
                    _ => {}
                }
            }
        }
        None
    }

    pub(super) fn peer_all(&self, types: &[&'ta IrTy<'ta>]) -> Option<&'ta IrTy<'ta>> {
        let (first, rest) = types.split_first()?;
        rest.iter().try_fold(*first, |acc, ty| self.peer(acc, *ty))
    }

    /// Determine if `value` coerces into `to` without any diagnostic.
    pub(super) fn coercible(&self, value: IrInstId, to: &'ta IrTy<'ta>) -> bool {
        let from = self.ty_of(value);
        match self.value_of(value) {
            Some(v) => coerce_const_value(v, from, to).is_ok(),
            None => match (from, to) {
                _ if from == to => true,
                (IrTy::Invalid | IrTy::NoReturn, _) | (_, IrTy::Invalid) => true,
                (IrTy::Integer(x), IrTy::Integer(y)) => x.widens_into(y),
                _ => false,
            },
        }
    }

    /// Coerce `value` to `to` in the current block on behalf of `old`. Failures are reported and
    /// poison the result.
    pub(super) fn coerce(
        &mut self,
        old: IrInstId,
        value: IrInstId,
        to: &'ta IrTy<'ta>,
        expected_loc: Option<Span>,
    ) -> Flow<IrInstId> {
        match self.conversion(value, to, expected_loc) {
            Conversion::Done(id) => Ok(id),
            Conversion::Widen => self.emit(old, to, self.widening(value, to)),
        }
    }

    /// Coerce `value` to `to` at the end of `block`, which may already be terminated.
    pub(super) fn coerce_at(
        &mut self,
        block: IrBlockId,
        value: IrInstId,
        to: &'ta IrTy<'ta>,
    ) -> Flow<IrInstId> {
        match self.conversion(value, to, None) {
            Conversion::Done(id) => Ok(id),
            Conversion::Widen => {
                let instruction = self.derived(value, to, self.widening(value, to), None);
                Ok(self.new.insert_before_terminator(block, instruction))
            }
        }
    }

    fn widening(&self, value: IrInstId, to: &'ta IrTy<'ta>) -> IrInstructionKind<'ta> {
        IrInstructionKind::Cast {
            operand: value,
            target: IrTypeRef::Resolved(to),
            kind: IrCastKind::Implicit,
        }
    }

    /// Build a new instruction located where the new instruction `origin` is.
    fn derived(
        &self,
        origin: IrInstId,
        ty: &'ta IrTy<'ta>,
        kind: IrInstructionKind<'ta>,
        value: Option<ConstExprValue>,
    ) -> IrInstruction<'ta> {
        let origin = self.new.instruction(origin);
        IrInstruction {
            span: origin.span,
            scope: origin.scope,
            kind,
            ty: Some(ty),
            value,
        }
    }

    fn conversion(
        &mut self,
        value: IrInstId,
        to: &'ta IrTy<'ta>,
        expected_loc: Option<Span>,
    ) -> Conversion {
        let from = self.ty_of(value);
        if from == to || from.is_invalid() || to.is_invalid() {
            return Conversion::Done(value);
        }
        let span = self.new.instruction(value).span;
        if let Some(known) = self.value_of(value) {
            return match coerce_const_value(known, from, to) {
                Ok(converted) => {
                    let instruction =
                        self.derived(value, to, IrInstructionKind::Const, Some(converted));
                    Conversion::Done(self.new.push(instruction))
                }
                Err(CoerceFailure::DoesNotFit(n)) => {
                    self.session.diagnostics.report(ValueDoesNotFitError {
                        value: n,
                        type_name: to.to_string(),
                        span,
                    });
                    Conversion::Done(self.poisoned(value))
                }
                Err(CoerceFailure::Mismatch) => {
                    self.report_mismatch(from, to, span, expected_loc);
                    Conversion::Done(self.poisoned(value))
                }
            };
        }
        match (from, to) {
            (IrTy::Integer(x), IrTy::Integer(y)) if x.widens_into(y) => Conversion::Widen,
            (IrTy::NoReturn, _) => Conversion::Done(value),
            _ => {
                self.report_mismatch(from, to, span, expected_loc);
                Conversion::Done(self.poisoned(value))
            }
        }
    }

    fn poisoned(&mut self, origin: IrInstId) -> IrInstId {
        let invalid = self.types().get_invalid_ty();
        let instruction = self.derived(
            origin,
            invalid,
            IrInstructionKind::Const,
            Some(ConstExprValue::Undefined),
        );
        self.new.push(instruction)
    }

    pub(super) fn report_mismatch(
        &mut self,
        actual: &IrTy,
        expected: &IrTy,
        actual_loc: Span,
        expected_loc: Option<Span>,
    ) {
        self.session.diagnostics.report(TypeMismatchError {
            actual_type: actual.to_string(),
            expected_type: expected.to_string(),
            actual_loc,
            expected_loc,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::{coerce_const_value, concretize, CoerceFailure};
    use crate::{ConstExprValue, TypeTable};
    use bumpalo::Bump;
    use ember_macros::{assert_err, assert_ok};

    #[test]
    fn test_literals_concretize_to_i32() {
        let bump = Bump::new();
        let types = TypeTable::new(&bump);
        let literal_array = types.get_array_ty(types.get_comptime_int_ty(), 3);
        let i32_ty = types.get_integer_ty(true, 32);
        assert_eq!(concretize(&types, types.get_comptime_int_ty()), i32_ty);
        assert_eq!(
            concretize(&types, literal_array),
            types.get_array_ty(i32_ty, 3)
        );
        assert_eq!(concretize(&types, types.get_bool_ty()), types.get_bool_ty());
    }

    #[test]
    fn test_literal_coercion_checks_the_range() {
        let bump = Bump::new();
        let types = TypeTable::new(&bump);
        let literal = types.get_comptime_int_ty();
        let u8_ty = types.get_integer_ty(false, 8);
        let value = assert_ok!(coerce_const_value(
            &ConstExprValue::Integer(255),
            literal,
            u8_ty
        ));
        assert_eq!(value, ConstExprValue::Integer(255));
        let failure = assert_err!(coerce_const_value(
            &ConstExprValue::Integer(256),
            literal,
            u8_ty
        ));
        assert_eq!(failure, CoerceFailure::DoesNotFit(256));
    }

    #[test]
    fn test_sized_integers_only_widen() {
        let bump = Bump::new();
        let types = TypeTable::new(&bump);
        let i8_ty = types.get_integer_ty(true, 8);
        let i64_ty = types.get_integer_ty(true, 64);
        let u64_ty = types.get_integer_ty(false, 64);
        let small = ConstExprValue::Integer(-3);
        assert_ok!(coerce_const_value(&small, i8_ty, i64_ty));
        assert_eq!(
            assert_err!(coerce_const_value(&small, i64_ty, i8_ty)),
            CoerceFailure::Mismatch
        );
        assert_eq!(
            assert_err!(coerce_const_value(&small, i8_ty, u64_ty)),
            CoerceFailure::Mismatch
        );
        let undefined = types.get_undefined_ty();
        assert_eq!(
            assert_ok!(coerce_const_value(&ConstExprValue::Undefined, undefined, u64_ty)),
            ConstExprValue::Undefined
        );
    }
}
