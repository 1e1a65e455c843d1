use crate::ty::IrTy;
use crate::value::ConstExprValue;

/// A stable handle to a slot of compile-time memory.
///
/// Slots are reused after they are released. The generation distinguishes the occupants of a
/// reused slot, so a handle to a released occupant is detected instead of silently aliasing the
/// new one.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotHandle {
    pub index: u32,
    pub generation: u32,
}

#[derive(Debug, Clone)]
pub struct ConstSlot<'ta> {
    pub generation: u32,
    pub ty: &'ta IrTy<'ta>,
    pub value: ConstExprValue,
    pub live: bool,
}

/// Position in the store that marks the start of a compile-time call frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreMark(usize);

/// A saved copy of the whole store, restored by [`ConstStore::rollback`].
#[derive(Debug, Clone)]
pub struct StoreCheckpoint<'ta> {
    slots: Vec<ConstSlot<'ta>>,
    top: usize,
}

/// The backing memory for compile-time values that have an address.
///
/// Taking the address of a compile-time local allocates a slot here, and pointers to the local are
/// [`crate::ConstPtr`] values naming the slot. Slots are allocated as a stack: every slot at or
/// above `top` is released.
#[derive(Debug, Default)]
pub struct ConstStore<'ta> {
    slots: Vec<ConstSlot<'ta>>,
    top: usize,
}

impl<'ta> ConstStore<'ta> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            top: 0,
        }
    }

    pub fn alloc(&mut self, ty: &'ta IrTy<'ta>, value: ConstExprValue) -> SlotHandle {
        let index = self.top;
        self.top += 1;
        match self.slots.get_mut(index) {
            Some(slot) => {
                slot.ty = ty;
                slot.value = value;
                slot.live = true;
                SlotHandle {
                    index: index as u32,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(ConstSlot {
                    generation: 0,
                    ty,
                    value,
                    live: true,
                });
                SlotHandle {
                    index: index as u32,
                    generation: 0,
                }
            }
        }
    }

    pub fn mark(&self) -> StoreMark {
        StoreMark(self.top)
    }

    /// Release every slot allocated since `mark`.
    ///
    /// Handles to the released slots become dangling.
    pub fn release_from(&mut self, mark: StoreMark) {
        for slot in self.slots.iter_mut().take(self.top).skip(mark.0) {
            slot.live = false;
            slot.generation += 1;
            slot.value = ConstExprValue::Undefined;
        }
        self.top = self.top.min(mark.0);
    }

    pub fn checkpoint(&self) -> StoreCheckpoint<'ta> {
        StoreCheckpoint {
            slots: self.slots.clone(),
            top: self.top,
        }
    }

    /// Restore the store to the state saved by `checkpoint`, discarding every write since.
    pub fn rollback(&mut self, checkpoint: StoreCheckpoint<'ta>) {
        self.slots = checkpoint.slots;
        self.top = checkpoint.top;
    }

    /// Get the slot a handle refers to, if it is still the live occupant.
    pub fn get(&self, handle: SlotHandle) -> Option<&ConstSlot<'ta>> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.live && slot.generation == handle.generation)
    }

    pub fn get_mut(&mut self, handle: SlotHandle) -> Option<&mut ConstSlot<'ta>> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.live && slot.generation == handle.generation)
    }

    /// Number of live slots.
    pub fn live_slots(&self) -> usize {
        self.top
    }
}

#[cfg(test)]
mod tests {
    use crate::{ConstExprValue, ConstStore, TypeTable};
    use bumpalo::Bump;
    use ember_macros::{assert_none, assert_some};

    #[test]
    fn test_released_slots_dangle_after_reuse() {
        let bump = Bump::new();
        let types = TypeTable::new(&bump);
        let mut store = ConstStore::new();
        let outer = store.alloc(types.get_bool_ty(), ConstExprValue::Bool(true));
        let mark = store.mark();
        let inner = store.alloc(types.get_comptime_int_ty(), ConstExprValue::Integer(7));
        assert_eq!(store.live_slots(), 2);
        store.release_from(mark);
        assert_none!(store.get(inner));
        assert_some!(store.get(outer));

        let reused = store.alloc(types.get_comptime_int_ty(), ConstExprValue::Integer(9));
        assert_eq!(reused.index, inner.index);
        assert_ne!(reused.generation, inner.generation);
        assert_none!(store.get(inner));
        assert_eq!(
            assert_some!(store.get(reused)).value,
            ConstExprValue::Integer(9)
        );
    }

    #[test]
    fn test_rollback_discards_writes_and_allocations() {
        let bump = Bump::new();
        let types = TypeTable::new(&bump);
        let mut store = ConstStore::new();
        let slot = store.alloc(types.get_comptime_int_ty(), ConstExprValue::Integer(1));
        let checkpoint = store.checkpoint();
        let occupant = assert_some!(store.get_mut(slot));
        occupant.value = ConstExprValue::Integer(2);
        store.alloc(types.get_bool_ty(), ConstExprValue::Bool(false));
        store.rollback(checkpoint);
        assert_eq!(store.live_slots(), 1);
        assert_eq!(
            assert_some!(store.get(slot)).value,
            ConstExprValue::Integer(1)
        );
    }
}
