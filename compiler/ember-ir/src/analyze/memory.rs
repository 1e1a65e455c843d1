//! Memory and aggregates.
//!
//! At compile time every allocation is a slot in the session's [`crate::ConstStore`] and pointers
//! are [`ConstPtr`] values, so loads and stores go straight to the store. At runtime the
//! corresponding instructions are emitted.

use super::{Analyzer, Flow, Halt};
use crate::error::{
    CannotInferTypeError, ComptimeMemoryError, ComptimeStoreAtRuntimeError, DuplicateFieldError,
    IndexOutOfBoundsError, MissingFieldError, NotAStructError, NotDereferenceableError,
    NotIndexableError, UnableToEvaluateConstantError, UndefinedValueUseError, UnknownFieldError,
};
use crate::instruction::{IrField, IrInstId, IrInstructionKind, IrTypeRef};
use crate::pointee::{pointee_of, pointee_of_mut, PointeeError};
use crate::store::ConstStore;
use crate::ty::IrTy;
use crate::value::{ConstExprValue, ConstPtr};
use ember_diagnostics::ice;

/// An array index after checking.
enum Index {
    /// An index known at compile time, together with its value coerced to `usize`.
    Known(u64, IrInstId),
    Runtime(IrInstId),
}

/// Write `value` through `ptr`, expanding undefined aggregates along the way. `counts` holds the
/// member count of the aggregate at every step of the path.
fn write_through(
    store: &mut ConstStore,
    ptr: &ConstPtr,
    counts: &[Option<usize>],
    value: ConstExprValue,
) -> Result<(), PointeeError> {
    for depth in 0..ptr.path.len() {
        let prefix = ConstPtr {
            slot: ptr.slot,
            path: ptr.path[..depth].to_vec(),
        };
        let member = pointee_of_mut(store, &prefix)?;
        if member.is_undefined() {
            let count = counts
                .get(depth)
                .copied()
                .flatten()
                .ok_or(PointeeError::OutOfBounds)?;
            *member = ConstExprValue::Aggregate(vec![ConstExprValue::Undefined; count]);
        }
    }
    *pointee_of_mut(store, ptr)? = value;
    Ok(())
}

fn pointer_error(value: &ConstExprValue) -> PointeeError {
    match value {
        ConstExprValue::Undefined => PointeeError::UndefinedPointer,
        _ => PointeeError::NotAPointer,
    }
}

impl<'a, 's, 'ast, 'ta> Analyzer<'a, 's, 'ast, 'ta> {
    /// Get the known value of `value`, which compile-time code needs. Speculation is interrupted
    /// when it is not known.
    pub(super) fn require_const(
        &mut self,
        old: IrInstId,
        value: IrInstId,
    ) -> Flow<Option<ConstExprValue>> {
        if let Some(known) = self.value_of(value) {
            return Ok(Some(known.clone()));
        }
        if self.speculation.is_some() {
            return Err(Halt::Interrupt);
        }
        self.session
            .diagnostics
            .report(UnableToEvaluateConstantError {
                span: self.span_of(old),
            });
        Ok(None)
    }

    fn report_memory(&mut self, old: IrInstId, reason: PointeeError) {
        self.session.diagnostics.report(ComptimeMemoryError {
            reason,
            span: self.span_of(old),
        });
    }

    /// Allocate storage for a local whose address is taken.
    pub(super) fn analyze_alloca(
        &mut self,
        old: IrInstId,
        name: &str,
        init: IrInstId,
    ) -> Flow<IrInstId> {
        let init = self.operand(init)?;
        let ty = self.ty_of(init);
        if ty.is_invalid() {
            return Ok(self.poison(old));
        }
        let ty = self.session.concrete_or_report(ty, self.span_of(old));
        if ty.is_invalid() {
            return Ok(self.poison(old));
        }
        let init = self.coerce(old, init, ty, None)?;
        let ptr_ty = self.types().get_pointer_ty(ty);
        if self.comptime_at(old) {
            let Some(value) = self.require_const(old, init)? else {
                return Ok(self.poison(old));
            };
            let slot = self.session.store.alloc(ty, value);
            let ptr = ConstExprValue::Pointer(ConstPtr::to_slot(slot));
            return Ok(self.constant(old, ptr_ty, ptr));
        }
        let kind = IrInstructionKind::Alloca {
            name: name.to_string(),
            init,
        };
        self.emit(old, ptr_ty, kind)
    }

    pub(super) fn analyze_load(&mut self, old: IrInstId, ptr: IrInstId) -> Flow<IrInstId> {
        let ptr = self.operand(ptr)?;
        let ty = self.ty_of(ptr);
        if ty.is_invalid() {
            return Ok(self.poison(old));
        }
        let Some(pointee) = ty.as_pointer() else {
            self.session.diagnostics.report(NotDereferenceableError {
                type_name: ty.to_string(),
                span: self.span_of(old),
            });
            return Ok(self.poison(old));
        };
        let Some(address) = self.value_of(ptr) else {
            return self.emit(old, pointee, IrInstructionKind::Load { ptr });
        };
        let loaded = pointee_of(&self.session.store, address).cloned();
        match loaded {
            Ok(value) => Ok(self.constant(old, pointee, value)),
            Err(PointeeError::UndefinedPointee) => {
                Ok(self.constant(old, pointee, ConstExprValue::Undefined))
            }
            Err(reason) => {
                self.report_memory(old, reason);
                Ok(self.poison(old))
            }
        }
    }

    pub(super) fn analyze_store(
        &mut self,
        old: IrInstId,
        ptr: IrInstId,
        value: IrInstId,
    ) -> Flow<IrInstId> {
        let ptr = self.operand(ptr)?;
        let value = self.operand(value)?;
        let ty = self.ty_of(ptr);
        if ty.is_invalid() {
            return Ok(self.poison(old));
        }
        let Some(pointee) = ty.as_pointer() else {
            self.session.diagnostics.report(NotDereferenceableError {
                type_name: ty.to_string(),
                span: self.span_of(old),
            });
            return Ok(self.poison(old));
        };
        let value = self.coerce(old, value, pointee, None)?;
        let unit = self.types().get_unit_ty();
        let Some(address) = self.value_of(ptr).cloned() else {
            return self.emit(old, unit, IrInstructionKind::Store { ptr, value });
        };
        if !self.comptime_at(old) {
            self.session
                .diagnostics
                .report(ComptimeStoreAtRuntimeError {
                    span: self.span_of(old),
                });
            return Ok(self.poison(old));
        }
        let Some(stored) = self.require_const(old, value)? else {
            return Ok(self.poison(old));
        };
        let address = match address {
            ConstExprValue::Pointer(address) => address,
            other => {
                self.report_memory(old, pointer_error(&other));
                return Ok(self.poison(old));
            }
        };
        let counts = self.member_counts(&address);
        if let Err(reason) = write_through(&mut self.session.store, &address, &counts, stored) {
            self.report_memory(old, reason);
            return Ok(self.poison(old));
        }
        Ok(self.constant(old, unit, ConstExprValue::Unit))
    }

    /// Member counts of the aggregates a compile-time pointer passes through.
    fn member_counts(&mut self, ptr: &ConstPtr) -> Vec<Option<usize>> {
        let Some(slot) = self.session.store.get(ptr.slot) else {
            return Vec::new();
        };
        let mut ty = slot.ty;
        let mut counts = Vec::with_capacity(ptr.path.len());
        for index in &ptr.path {
            counts.push(self.session.member_count(ty));
            match self.session.member_type(ty, *index) {
                Some(member) => ty = member,
                None => break,
            }
        }
        counts
    }

    /// Find a field of the struct type `ty`, reporting the failure.
    fn field_of(
        &mut self,
        old: IrInstId,
        ty: &'ta IrTy<'ta>,
        name: &str,
    ) -> Option<(u32, &'ta IrTy<'ta>)> {
        if ty.as_struct_name().is_none() {
            self.session.diagnostics.report(NotAStructError {
                type_name: ty.to_string(),
                span: self.span_of(old),
            });
            return None;
        }
        let field = self.session.struct_field(ty, name);
        if field.is_none() {
            self.session.diagnostics.report(UnknownFieldError {
                type_name: ty.to_string(),
                field_name: name.to_string(),
                span: self.span_of(old),
            });
        }
        field.filter(|(_, ty)| !ty.is_invalid())
    }

    /// Check an array index against the length of the array, coercing it to `usize`.
    fn check_index(&mut self, old: IrInstId, index: IrInstId, len: u64) -> Flow<Option<Index>> {
        let ty = self.ty_of(index);
        if ty.is_invalid() {
            return Ok(None);
        }
        let usize_ty = self.types().get_usize_ty();
        match self.value_of(index).cloned() {
            Some(ConstExprValue::Integer(n)) if ty.is_numeric() => {
                if n < 0 || n >= i128::from(len) {
                    self.session.diagnostics.report(IndexOutOfBoundsError {
                        index: n,
                        len,
                        span: self.span_of(old),
                    });
                    return Ok(None);
                }
                let index = self.coerce(old, index, usize_ty, None)?;
                if self.ty_of(index).is_invalid() {
                    return Ok(None);
                }
                let position =
                    u64::try_from(n).unwrap_or_else(|_| ice!("checked index is negative"));
                Ok(Some(Index::Known(position, index)))
            }
            Some(ConstExprValue::Undefined) => {
                self.session.diagnostics.report(UndefinedValueUseError {
                    span: self.span_of(old),
                });
                Ok(None)
            }
            _ => {
                let index = self.coerce(old, index, usize_ty, None)?;
                if self.ty_of(index).is_invalid() {
                    return Ok(None);
                }
                Ok(Some(Index::Runtime(index)))
            }
        }
    }

    fn not_indexable(&mut self, old: IrInstId, ty: &IrTy) {
        self.session.diagnostics.report(NotIndexableError {
            type_name: ty.to_string(),
            span: self.span_of(old),
        });
    }

    fn not_dereferenceable(&mut self, old: IrInstId, ty: &IrTy) {
        self.session.diagnostics.report(NotDereferenceableError {
            type_name: ty.to_string(),
            span: self.span_of(old),
        });
    }

    /// Project a pointer to a struct onto one of its fields.
    pub(super) fn analyze_field_ptr(
        &mut self,
        old: IrInstId,
        base: IrInstId,
        name: &str,
    ) -> Flow<IrInstId> {
        let base = self.operand(base)?;
        let ty = self.ty_of(base);
        if ty.is_invalid() {
            return Ok(self.poison(old));
        }
        let Some(pointee) = ty.as_pointer() else {
            self.not_dereferenceable(old, ty);
            return Ok(self.poison(old));
        };
        let Some((index, field_ty)) = self.field_of(old, pointee, name) else {
            return Ok(self.poison(old));
        };
        let result_ty = self.types().get_pointer_ty(field_ty);
        match self.value_of(base).cloned() {
            Some(ConstExprValue::Pointer(ptr)) => {
                let projected = ConstExprValue::Pointer(ptr.project(u64::from(index)));
                Ok(self.constant(old, result_ty, projected))
            }
            Some(other) => {
                self.report_memory(old, pointer_error(&other));
                Ok(self.poison(old))
            }
            None => {
                let field = IrField {
                    name: name.to_string(),
                    index: Some(index),
                };
                self.emit(old, result_ty, IrInstructionKind::FieldPtr { base, field })
            }
        }
    }

    /// Project a pointer to an array onto one of its elements.
    pub(super) fn analyze_elem_ptr(
        &mut self,
        old: IrInstId,
        base: IrInstId,
        index: IrInstId,
    ) -> Flow<IrInstId> {
        let base = self.operand(base)?;
        let index = self.operand(index)?;
        let ty = self.ty_of(base);
        if ty.is_invalid() {
            return Ok(self.poison(old));
        }
        let Some(pointee) = ty.as_pointer() else {
            self.not_dereferenceable(old, ty);
            return Ok(self.poison(old));
        };
        let IrTy::Array(array) = pointee else {
            self.not_indexable(old, pointee);
            return Ok(self.poison(old));
        };
        let Some(index) = self.check_index(old, index, array.len)? else {
            return Ok(self.poison(old));
        };
        let result_ty = self.types().get_pointer_ty(array.element);
        match (self.value_of(base).cloned(), index) {
            (Some(ConstExprValue::Pointer(ptr)), Index::Known(position, _)) => {
                let projected = ConstExprValue::Pointer(ptr.project(position));
                Ok(self.constant(old, result_ty, projected))
            }
            (Some(other), _) if !matches!(other, ConstExprValue::Pointer(_)) => {
                self.report_memory(old, pointer_error(&other));
                Ok(self.poison(old))
            }
            (_, Index::Known(_, index) | Index::Runtime(index)) => {
                // Compile-time memory holding literals has no runtime layout to address.
                if array.element.is_comptime_only() && !self.comptime_at(old) {
                    self.session.diagnostics.report(CannotInferTypeError {
                        type_name: pointee.to_string(),
                        span: self.span_of(old),
                    });
                    return Ok(self.poison(old));
                }
                self.emit(old, result_ty, IrInstructionKind::ElemPtr { base, index })
            }
        }
    }

    pub(super) fn analyze_field_value(
        &mut self,
        old: IrInstId,
        base: IrInstId,
        name: &str,
    ) -> Flow<IrInstId> {
        let base = self.operand(base)?;
        let ty = self.ty_of(base);
        if ty.is_invalid() {
            return Ok(self.poison(old));
        }
        let Some((index, field_ty)) = self.field_of(old, ty, name) else {
            return Ok(self.poison(old));
        };
        if let Some(aggregate) = self.value_of(base) {
            let member = usize::try_from(index)
                .ok()
                .and_then(|index| aggregate.member(index))
                .unwrap_or_else(|| ice!("struct value is not an aggregate"));
            return Ok(self.constant(old, field_ty, member));
        }
        let field = IrField {
            name: name.to_string(),
            index: Some(index),
        };
        self.emit(old, field_ty, IrInstructionKind::FieldValue { base, field })
    }

    pub(super) fn analyze_elem_value(
        &mut self,
        old: IrInstId,
        base: IrInstId,
        index: IrInstId,
    ) -> Flow<IrInstId> {
        let base = self.operand(base)?;
        let index = self.operand(index)?;
        let ty = self.ty_of(base);
        if ty.is_invalid() {
            return Ok(self.poison(old));
        }
        let IrTy::Array(array) = ty else {
            self.not_indexable(old, ty);
            return Ok(self.poison(old));
        };
        let Some(index) = self.check_index(old, index, array.len)? else {
            return Ok(self.poison(old));
        };
        let index = match (self.value_of(base), index) {
            (Some(aggregate), Index::Known(position, _)) => {
                let member = usize::try_from(position)
                    .ok()
                    .and_then(|position| aggregate.member(position))
                    .unwrap_or_else(|| ice!("array value is not an aggregate"));
                return Ok(self.constant(old, array.element, member));
            }
            (_, Index::Known(_, index) | Index::Runtime(index)) => index,
        };
        let hint = self.result_hint(old);
        let Some(base) = self.runtime_aggregate(old, base, hint)? else {
            return Ok(self.poison(old));
        };
        let IrTy::Array(array) = self.ty_of(base) else {
            ice!("concrete array lost its array type");
        };
        self.emit(old, array.element, IrInstructionKind::ElemValue { base, index })
    }

    /// Give an aggregate operand of a runtime instruction a type that exists at runtime.
    ///
    /// A literal like `[1, 2, 3]` is known with element type `comptime_int`. Before it is used by
    /// runtime code it takes the element type `element` when every element fits it, and the
    /// default integer type otherwise.
    fn runtime_aggregate(
        &mut self,
        old: IrInstId,
        base: IrInstId,
        element: Option<&'ta IrTy<'ta>>,
    ) -> Flow<Option<IrInstId>> {
        let ty = self.ty_of(base);
        if !ty.is_comptime_only() {
            return Ok(Some(base));
        }
        let hinted = match (ty, element) {
            (IrTy::Array(array), Some(element)) if !element.is_comptime_only() => {
                let hinted = self.types().get_array_ty(element, array.len);
                Some(hinted).filter(|hinted| self.coercible(base, *hinted))
            }
            _ => None,
        };
        let concrete = match hinted {
            Some(hinted) => hinted,
            None => self.session.concrete_or_report(ty, self.span_of(old)),
        };
        if concrete.is_invalid() {
            return Ok(None);
        }
        let base = self.coerce(old, base, concrete, None)?;
        Ok(Some(base).filter(|base| !self.ty_of(*base).is_invalid()))
    }

    /// Replace one field of a struct value, producing the updated value.
    pub(super) fn analyze_insert_field(
        &mut self,
        old: IrInstId,
        base: IrInstId,
        name: &str,
        value: IrInstId,
    ) -> Flow<IrInstId> {
        let base = self.operand(base)?;
        let value = self.operand(value)?;
        let ty = self.ty_of(base);
        if ty.is_invalid() || self.ty_of(value).is_invalid() {
            return Ok(self.poison(old));
        }
        let Some((index, field_ty)) = self.field_of(old, ty, name) else {
            return Ok(self.poison(old));
        };
        let value = self.coerce(old, value, field_ty, None)?;
        if let Some(updated) = self.replace_member(ty, base, u64::from(index), value) {
            return Ok(self.constant(old, ty, updated));
        }
        let field = IrField {
            name: name.to_string(),
            index: Some(index),
        };
        self.emit(old, ty, IrInstructionKind::InsertField { base, field, value })
    }

    /// Replace one element of an array value, producing the updated value.
    pub(super) fn analyze_insert_elem(
        &mut self,
        old: IrInstId,
        base: IrInstId,
        index: IrInstId,
        value: IrInstId,
    ) -> Flow<IrInstId> {
        let base = self.operand(base)?;
        let index = self.operand(index)?;
        let value = self.operand(value)?;
        let ty = self.ty_of(base);
        if ty.is_invalid() || self.ty_of(value).is_invalid() {
            return Ok(self.poison(old));
        }
        let IrTy::Array(array) = ty else {
            self.not_indexable(old, ty);
            return Ok(self.poison(old));
        };
        let Some(index) = self.check_index(old, index, array.len)? else {
            return Ok(self.poison(old));
        };
        let index = match index {
            Index::Known(position, index)
                if self.value_of(base).is_some() && self.value_of(value).is_some() =>
            {
                let value = self.coerce(old, value, array.element, None)?;
                if self.ty_of(value).is_invalid() {
                    return Ok(self.poison(old));
                }
                if let Some(updated) = self.replace_member(ty, base, position, value) {
                    return Ok(self.constant(old, ty, updated));
                }
                index
            }
            Index::Known(_, index) | Index::Runtime(index) => index,
        };
        let element = Some(self.ty_of(value)).filter(|ty| !ty.is_comptime_only());
        let Some(base) = self.runtime_aggregate(old, base, element)? else {
            return Ok(self.poison(old));
        };
        let ty = self.ty_of(base);
        let IrTy::Array(array) = ty else {
            ice!("concrete array lost its array type");
        };
        let value = self.coerce(old, value, array.element, None)?;
        self.emit(old, ty, IrInstructionKind::InsertElem { base, index, value })
    }

    /// Compute an aggregate with one member replaced, if both are known.
    fn replace_member(
        &mut self,
        ty: &'ta IrTy<'ta>,
        base: IrInstId,
        index: u64,
        value: IrInstId,
    ) -> Option<ConstExprValue> {
        let member = self.value_of(value)?.clone();
        let mut members = match self.value_of(base)?.clone() {
            ConstExprValue::Aggregate(members) => members,
            ConstExprValue::Undefined => {
                vec![ConstExprValue::Undefined; self.session.member_count(ty)?]
            }
            _ => return None,
        };
        *members.get_mut(usize::try_from(index).ok()?)? = member;
        Some(ConstExprValue::Aggregate(members))
    }

    /// Take the address of a temporary.
    pub(super) fn analyze_ref(&mut self, old: IrInstId, operand: IrInstId) -> Flow<IrInstId> {
        let operand = self.operand(operand)?;
        let ty = self.ty_of(operand);
        if ty.is_invalid() {
            return Ok(self.poison(old));
        }
        if self.comptime_at(old) {
            let Some(value) = self.require_const(old, operand)? else {
                return Ok(self.poison(old));
            };
            let slot = self.session.store.alloc(ty, value);
            let ptr_ty = self.types().get_pointer_ty(ty);
            let ptr = ConstExprValue::Pointer(ConstPtr::to_slot(slot));
            return Ok(self.constant(old, ptr_ty, ptr));
        }
        let ty = self.session.concrete_or_report(ty, self.span_of(old));
        if ty.is_invalid() {
            return Ok(self.poison(old));
        }
        let operand = self.coerce(old, operand, ty, None)?;
        let ptr_ty = self.types().get_pointer_ty(ty);
        self.emit(old, ptr_ty, IrInstructionKind::Ref { operand })
    }

    pub(super) fn analyze_struct_init(
        &mut self,
        old: IrInstId,
        ty: &IrTypeRef<'ta>,
        fields: &[(IrField, IrInstId)],
    ) -> Flow<IrInstId> {
        let ty = self.session.resolve_type_ref(ty);
        if ty.is_invalid() {
            return Ok(self.poison(old));
        }
        let declared = ty
            .as_struct_name()
            .and_then(|name| self.session.module.find_struct(name))
            .and_then(|id| self.session.struct_fields(id));
        let Some(declared) = declared else {
            self.session.diagnostics.report(NotAStructError {
                type_name: ty.to_string(),
                span: self.span_of(old),
            });
            return Ok(self.poison(old));
        };

        let mut slots: Vec<Option<IrInstId>> = vec![None; declared.len()];
        let mut failed = false;
        for (field, value) in fields {
            let value = self.operand(*value)?;
            match declared.iter().position(|f| f.name == field.name) {
                None => {
                    self.session.diagnostics.report(UnknownFieldError {
                        type_name: ty.to_string(),
                        field_name: field.name.clone(),
                        span: self.span_of(old),
                    });
                    failed = true;
                }
                Some(k) if slots[k].is_some() => {
                    self.session.diagnostics.report(DuplicateFieldError {
                        field_name: field.name.clone(),
                        span: self.span_of(old),
                    });
                    failed = true;
                }
                Some(k) => {
                    let value = self.coerce(old, value, declared[k].ty, None)?;
                    failed |= self.ty_of(value).is_invalid();
                    slots[k] = Some(value);
                }
            }
        }
        for (slot, field) in slots.iter().zip(&declared) {
            if slot.is_none() {
                self.session.diagnostics.report(MissingFieldError {
                    type_name: ty.to_string(),
                    field_name: field.name.clone(),
                    span: self.span_of(old),
                });
                failed = true;
            }
        }
        if failed {
            return Ok(self.poison(old));
        }

        let values = slots.into_iter().flatten().collect::<Vec<_>>();
        let known = values
            .iter()
            .map(|v| self.value_of(*v).cloned())
            .collect::<Option<Vec<_>>>();
        if let Some(members) = known {
            return Ok(self.constant(old, ty, ConstExprValue::Aggregate(members)));
        }
        let fields = declared
            .iter()
            .zip(values)
            .enumerate()
            .map(|(k, (field, value))| {
                let field = IrField {
                    name: field.name.clone(),
                    index: Some(k as u32),
                };
                (field, value)
            })
            .collect();
        let kind = IrInstructionKind::StructInit {
            ty: IrTypeRef::Resolved(ty),
            fields,
        };
        self.emit(old, ty, kind)
    }

    pub(super) fn analyze_array_init(
        &mut self,
        old: IrInstId,
        elements: &[IrInstId],
    ) -> Flow<IrInstId> {
        let values = elements
            .iter()
            .map(|e| self.operand(*e))
            .collect::<Flow<Vec<_>>>()?;
        let types = values.iter().map(|v| self.ty_of(*v)).collect::<Vec<_>>();
        if types.iter().any(|t| t.is_invalid()) {
            return Ok(self.poison(old));
        }
        let Some((&first, rest)) = types.split_first() else {
            let element = match self.expected_type {
                Some(IrTy::Array(a)) if a.len == 0 => a.element,
                _ => self.types().get_undefined_ty(),
            };
            let ty = self.types().get_array_ty(element, 0);
            return Ok(self.constant(old, ty, ConstExprValue::Aggregate(Vec::new())));
        };
        let mut element = first;
        for (k, &ty) in rest.iter().enumerate() {
            match self.peer(element, ty) {
                Some(peer) => element = peer,
                None => {
                    let span = self.new.instruction(values[k + 1]).span;
                    self.report_mismatch(ty, element, span, None);
                    return Ok(self.poison(old));
                }
            }
        }
        let len = values.len() as u64;
        let all_known = values.iter().all(|v| self.value_of(*v).is_some());
        if !all_known {
            element = self.session.concrete_or_report(element, self.span_of(old));
            if element.is_invalid() {
                return Ok(self.poison(old));
            }
        }
        let ty = self.types().get_array_ty(element, len);
        let mut coerced = Vec::with_capacity(values.len());
        for value in values {
            let value = self.coerce(old, value, element, None)?;
            if self.ty_of(value).is_invalid() {
                return Ok(self.poison(old));
            }
            coerced.push(value);
        }
        if all_known {
            let members = coerced
                .iter()
                .map(|v| self.value_of(*v).cloned())
                .collect::<Option<Vec<_>>>()
                .unwrap_or_else(|| ice!("known array element lost its value"));
            return Ok(self.constant(old, ty, ConstExprValue::Aggregate(members)));
        }
        self.emit(old, ty, IrInstructionKind::ArrayInit { elements: coerced })
    }
}
