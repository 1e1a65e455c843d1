//! Resolution of compile-time pointers to the values they point at.

use crate::store::ConstStore;
use crate::value::{ConstExprValue, ConstPtr};
use thiserror::Error;

/// Reasons a compile-time pointer cannot be followed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PointeeError {
    #[error("value is not a pointer")]
    NotAPointer,
    #[error("pointer is undefined")]
    UndefinedPointer,
    #[error("pointee is undefined")]
    UndefinedPointee,
    #[error("pointee storage has been released")]
    Dangling,
    #[error("pointer path is out of bounds of its storage")]
    OutOfBounds,
}

/// Get the value a compile-time pointer currently points to.
///
/// Pointers into aggregates are followed along their recorded path. A pointee that is itself
/// `undefined` is reported as [`PointeeError::UndefinedPointee`], so the caller decides whether
/// reading it is an error or yields an undefined value.
pub fn pointee_of<'s>(
    store: &'s ConstStore,
    value: &ConstExprValue,
) -> Result<&'s ConstExprValue, PointeeError> {
    let ptr = match value {
        ConstExprValue::Pointer(ptr) => ptr,
        ConstExprValue::Undefined => return Err(PointeeError::UndefinedPointer),
        _ => return Err(PointeeError::NotAPointer),
    };
    let slot = store.get(ptr.slot).ok_or(PointeeError::Dangling)?;
    let mut current = &slot.value;
    for index in &ptr.path {
        current = match current {
            ConstExprValue::Aggregate(members) => usize::try_from(*index)
                .ok()
                .and_then(|index| members.get(index))
                .ok_or(PointeeError::OutOfBounds)?,
            ConstExprValue::Undefined => return Err(PointeeError::UndefinedPointee),
            _ => return Err(PointeeError::OutOfBounds),
        };
    }
    match current {
        ConstExprValue::Undefined => Err(PointeeError::UndefinedPointee),
        v => Ok(v),
    }
}

/// Get mutable access to the value a compile-time pointer points to, for a store through it.
///
/// Unlike [`pointee_of`], an undefined pointee is not an error here since it is about to be
/// overwritten. Aggregates along the path must already be expanded.
pub fn pointee_of_mut<'s>(
    store: &'s mut ConstStore,
    ptr: &ConstPtr,
) -> Result<&'s mut ConstExprValue, PointeeError> {
    let slot = store.get_mut(ptr.slot).ok_or(PointeeError::Dangling)?;
    let mut current = &mut slot.value;
    for index in &ptr.path {
        current = match current {
            ConstExprValue::Aggregate(members) => usize::try_from(*index)
                .ok()
                .and_then(|index| members.get_mut(index))
                .ok_or(PointeeError::OutOfBounds)?,
            ConstExprValue::Undefined => return Err(PointeeError::UndefinedPointee),
            _ => return Err(PointeeError::OutOfBounds),
        };
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use crate::{
        pointee_of, pointee_of_mut, ConstExprValue, ConstPtr, ConstStore, PointeeError, TypeTable,
    };
    use bumpalo::Bump;
    use ember_macros::{assert_err, assert_ok};

    #[test]
    fn test_pointee_round_trip() {
        let bump = Bump::new();
        let types = TypeTable::new(&bump);
        let mut store = ConstStore::new();
        let value = ConstExprValue::Integer(42);
        let slot = store.alloc(types.get_comptime_int_ty(), value.clone());
        let ptr = ConstExprValue::Pointer(ConstPtr::to_slot(slot));
        assert_eq!(assert_ok!(pointee_of(&store, &ptr)), &value);
    }

    #[test]
    fn test_pointer_into_aggregate_follows_path() {
        let bump = Bump::new();
        let types = TypeTable::new(&bump);
        let mut store = ConstStore::new();
        let inner = ConstExprValue::Aggregate(vec![
            ConstExprValue::Integer(1),
            ConstExprValue::Integer(2),
        ]);
        let outer = ConstExprValue::Aggregate(vec![ConstExprValue::Bool(false), inner]);
        let slot = store.alloc(types.get_unit_ty(), outer);
        let ptr = ConstPtr::to_slot(slot).project(1).project(1);
        assert_eq!(
            assert_ok!(pointee_of(&store, &ConstExprValue::Pointer(ptr.clone()))),
            &ConstExprValue::Integer(2)
        );

        *assert_ok!(pointee_of_mut(&mut store, &ptr)) = ConstExprValue::Integer(5);
        assert_eq!(
            assert_ok!(pointee_of(&store, &ConstExprValue::Pointer(ptr))),
            &ConstExprValue::Integer(5)
        );

        let past_end = ConstPtr::to_slot(slot).project(2);
        assert_eq!(
            assert_err!(pointee_of(&store, &ConstExprValue::Pointer(past_end))),
            PointeeError::OutOfBounds
        );
    }

    #[test]
    fn test_undefined_pointers_and_pointees() {
        let bump = Bump::new();
        let types = TypeTable::new(&bump);
        let mut store = ConstStore::new();
        assert_eq!(
            assert_err!(pointee_of(&store, &ConstExprValue::Undefined)),
            PointeeError::UndefinedPointer
        );
        assert_eq!(
            assert_err!(pointee_of(&store, &ConstExprValue::Integer(3))),
            PointeeError::NotAPointer
        );
        let slot = store.alloc(types.get_bool_ty(), ConstExprValue::Undefined);
        let ptr = ConstPtr::to_slot(slot);
        assert_eq!(
            assert_err!(pointee_of(&store, &ConstExprValue::Pointer(ptr.clone()))),
            PointeeError::UndefinedPointee
        );
        assert_ok!(pointee_of_mut(&mut store, &ptr));
    }

    #[test]
    fn test_released_pointee_is_dangling() {
        let bump = Bump::new();
        let types = TypeTable::new(&bump);
        let mut store = ConstStore::new();
        let mark = store.mark();
        let slot = store.alloc(types.get_bool_ty(), ConstExprValue::Bool(true));
        store.release_from(mark);
        let ptr = ConstExprValue::Pointer(ConstPtr::to_slot(slot));
        assert_eq!(
            assert_err!(pointee_of(&store, &ptr)),
            PointeeError::Dangling
        );
    }
}
