use crate::ty::{
    IrArrayTy, IrFunctionTy, IrIntegerTy, IrPointerTy, IrStructTy, IrTy, IrTyId,
};
use bumpalo::Bump;
use std::cell::RefCell;
use std::collections::HashMap;

/// The process-wide type table.
///
/// In order to avoid duplication of types, we use an arena allocator to allocate the types. The
/// table acts as a cache for the types, meaning we can look up types by their structural
/// description, and every lookup of the same description yields the same reference.
///
/// This simplifies comparison of types to pointer equality.
#[derive(Debug)]
pub struct TypeTable<'ta> {
    allocator: &'ta Bump,
    interned_types: RefCell<HashMap<IrTyId, &'ta IrTy<'ta>>>,
}

impl<'ta> TypeTable<'ta> {
    pub fn new(bump: &'ta Bump) -> Self {
        Self {
            allocator: bump,
            interned_types: RefCell::new(HashMap::new()),
        }
    }

    /// Get a type from the table by its id.
    pub fn get_type(&self, id: IrTyId) -> Option<&'ta IrTy<'ta>> {
        self.interned_types.borrow().get(&id).copied()
    }

    /// Number of distinct types interned so far.
    pub fn len(&self) -> usize {
        self.interned_types.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.interned_types.borrow().is_empty()
    }

    fn intern<F>(&self, id: IrTyId, make: F) -> &'ta IrTy<'ta>
    where
        F: FnOnce(&'ta Bump) -> IrTy<'ta>,
    {
        let allocator = self.allocator;
        *self
            .interned_types
            .borrow_mut()
            .entry(id)
            .or_insert_with(|| allocator.alloc(make(allocator)))
    }

    pub fn get_invalid_ty(&self) -> &'ta IrTy<'ta> {
        self.intern(IrTyId::compute_invalid_ty_id(), |_| IrTy::Invalid)
    }

    pub fn get_unit_ty(&self) -> &'ta IrTy<'ta> {
        self.intern(IrTyId::compute_unit_ty_id(), |_| IrTy::Unit)
    }

    pub fn get_bool_ty(&self) -> &'ta IrTy<'ta> {
        self.intern(IrTyId::compute_bool_ty_id(), |_| IrTy::Bool)
    }

    pub fn get_comptime_int_ty(&self) -> &'ta IrTy<'ta> {
        self.intern(IrTyId::compute_comptime_int_ty_id(), |_| IrTy::ComptimeInt)
    }

    pub fn get_undefined_ty(&self) -> &'ta IrTy<'ta> {
        self.intern(IrTyId::compute_undefined_ty_id(), |_| IrTy::Undefined)
    }

    pub fn get_noreturn_ty(&self) -> &'ta IrTy<'ta> {
        self.intern(IrTyId::compute_noreturn_ty_id(), |_| IrTy::NoReturn)
    }

    pub fn get_integer_ty(&self, signed: bool, bits: u16) -> &'ta IrTy<'ta> {
        self.intern(IrTyId::compute_integer_ty_id(signed, bits), |_| {
            IrTy::Integer(IrIntegerTy { signed, bits })
        })
    }

    /// The unsigned pointer-sized integer type, used for array lengths.
    pub fn get_usize_ty(&self) -> &'ta IrTy<'ta> {
        self.get_integer_ty(false, crate::ty::POINTER_BITS)
    }

    pub fn get_pointer_ty(&self, pointee: &'ta IrTy<'ta>) -> &'ta IrTy<'ta> {
        let id = IrTyId::compute_pointer_ty_id(&IrTyId::from(pointee));
        self.intern(id, |_| IrTy::Pointer(IrPointerTy { pointee }))
    }

    pub fn get_array_ty(&self, element: &'ta IrTy<'ta>, len: u64) -> &'ta IrTy<'ta> {
        let id = IrTyId::compute_array_ty_id(&IrTyId::from(element), len);
        self.intern(id, |_| IrTy::Array(IrArrayTy { element, len }))
    }

    pub fn get_struct_ty(&self, name: &str) -> &'ta IrTy<'ta> {
        let id = IrTyId::compute_struct_ty_id(name);
        self.intern(id, |bump| {
            IrTy::Struct(IrStructTy {
                name: bump.alloc_str(name),
            })
        })
    }

    pub fn get_function_ty(
        &self,
        parameters: &[&'ta IrTy<'ta>],
        return_type: &'ta IrTy<'ta>,
    ) -> &'ta IrTy<'ta> {
        let parameter_ids = parameters
            .iter()
            .map(|p| IrTyId::from(*p))
            .collect::<Vec<_>>();
        let id = IrTyId::compute_function_ty_id(&parameter_ids, &IrTyId::from(return_type));
        self.intern(id, |bump| {
            IrTy::Function(IrFunctionTy {
                parameters: bump.alloc_slice_copy(parameters),
                return_type,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{IrTy, TypeTable};
    use bumpalo::Bump;

    #[test]
    fn test_builtin_types_are_interned() {
        let bump = Bump::new();
        let types = TypeTable::new(&bump);
        let a = types.get_integer_ty(true, 32);
        let b = types.get_integer_ty(true, 32);
        assert!(std::ptr::eq(a, b));
        assert_eq!(a, b);
        assert_ne!(a, types.get_integer_ty(false, 32));
        assert_eq!(types.get_unit_ty(), types.get_unit_ty());
        assert_ne!(types.get_unit_ty(), types.get_bool_ty());
    }

    #[test]
    fn test_constructed_types_are_interned_structurally() {
        let bump = Bump::new();
        let types = TypeTable::new(&bump);
        let i32_ty = types.get_integer_ty(true, 32);
        let p1 = types.get_pointer_ty(types.get_array_ty(i32_ty, 4));
        let p2 = types.get_pointer_ty(types.get_array_ty(i32_ty, 4));
        assert_eq!(p1, p2);
        assert_ne!(p1, types.get_pointer_ty(types.get_array_ty(i32_ty, 5)));

        let f1 = types.get_function_ty(&[i32_ty, p1], types.get_bool_ty());
        let f2 = types.get_function_ty(&[i32_ty, p2], types.get_bool_ty());
        assert_eq!(f1, f2);
        assert_eq!(f1.to_string(), "fn(i32, *[4]i32) -> bool");
    }

    #[test]
    fn test_struct_types_are_nominal() {
        let bump = Bump::new();
        let types = TypeTable::new(&bump);
        let point = types.get_struct_ty("Point");
        assert_eq!(point, types.get_struct_ty(&String::from("Point")));
        assert_ne!(point, types.get_struct_ty("Vec2"));
        assert!(matches!(point, IrTy::Struct(s) if s.name == "Point"));
    }

    #[test]
    fn test_table_counts_distinct_types() {
        let bump = Bump::new();
        let types = TypeTable::new(&bump);
        assert!(types.is_empty());
        types.get_bool_ty();
        types.get_bool_ty();
        types.get_pointer_ty(types.get_bool_ty());
        assert_eq!(types.len(), 2);
    }
}
