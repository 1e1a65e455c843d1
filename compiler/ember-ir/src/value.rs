use crate::module::FnId;
use crate::store::SlotHandle;
use std::fmt::{Display, Formatter};

/// A value known at compile time.
///
/// Values are independent of any runtime representation. Aggregates hold struct fields in
/// declaration order, or array elements in index order.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstExprValue {
    Undefined,
    Unit,
    Bool(bool),
    /// Integers of every width, including `comptime_int`, are folded in 128 bits and checked
    /// against their type when they are produced.
    Integer(i128),
    Aggregate(Vec<ConstExprValue>),
    Pointer(ConstPtr),
    Function(FnId),
}

/// A pointer into compile-time memory.
///
/// The pointer names a slot of the [`crate::ConstStore`] and a path of field or element indices
/// into the value held by that slot. An empty path points at the whole slot.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstPtr {
    pub slot: SlotHandle,
    pub path: Vec<u64>,
}

impl ConstPtr {
    pub fn to_slot(slot: SlotHandle) -> Self {
        Self {
            slot,
            path: Vec::new(),
        }
    }

    /// Get a pointer to the member at `index` of the value this pointer points to.
    pub fn project(&self, index: u64) -> Self {
        let mut path = self.path.clone();
        path.push(index);
        Self {
            slot: self.slot,
            path,
        }
    }
}

impl ConstExprValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, ConstExprValue::Undefined)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConstExprValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i128> {
        match self {
            ConstExprValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_pointer(&self) -> Option<&ConstPtr> {
        match self {
            ConstExprValue::Pointer(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<FnId> {
        match self {
            ConstExprValue::Function(f) => Some(*f),
            _ => None,
        }
    }

    /// Get the member at `index` of an aggregate.
    ///
    /// Members of an undefined aggregate are undefined themselves.
    pub fn member(&self, index: usize) -> Option<ConstExprValue> {
        match self {
            ConstExprValue::Aggregate(members) => members.get(index).cloned(),
            ConstExprValue::Undefined => Some(ConstExprValue::Undefined),
            _ => None,
        }
    }
}

impl Display for ConstExprValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstExprValue::Undefined => write!(f, "undefined"),
            ConstExprValue::Unit => write!(f, "()"),
            ConstExprValue::Bool(b) => write!(f, "{}", b),
            ConstExprValue::Integer(i) => write!(f, "{}", i),
            ConstExprValue::Aggregate(members) => {
                write!(f, "{{")?;
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", m)?;
                }
                write!(f, "}}")
            }
            ConstExprValue::Pointer(p) => {
                write!(f, "&slot{}", p.slot.index)?;
                for index in &p.path {
                    write!(f, ".{}", index)?;
                }
                Ok(())
            }
            ConstExprValue::Function(id) => write!(f, "@fn{}", id.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{ConstExprValue, ConstPtr, SlotHandle};

    #[test]
    fn test_display_renders_nested_values() {
        let value = ConstExprValue::Aggregate(vec![
            ConstExprValue::Integer(-3),
            ConstExprValue::Bool(true),
            ConstExprValue::Aggregate(vec![ConstExprValue::Undefined]),
        ]);
        assert_eq!(value.to_string(), "{-3, true, {undefined}}");
    }

    #[test]
    fn test_pointer_projection_extends_path() {
        let slot = SlotHandle {
            index: 2,
            generation: 0,
        };
        let ptr = ConstPtr::to_slot(slot).project(1).project(0);
        assert_eq!(ptr.path, vec![1, 0]);
        assert_eq!(ConstExprValue::Pointer(ptr).to_string(), "&slot2.1.0");
    }

    #[test]
    fn test_members_of_undefined_are_undefined() {
        assert_eq!(
            ConstExprValue::Undefined.member(4),
            Some(ConstExprValue::Undefined)
        );
        assert_eq!(ConstExprValue::Integer(1).member(0), None);
    }
}
