use std::fmt::{Debug, Display, Formatter};
use std::hash::{DefaultHasher, Hash, Hasher};

/// Width of a pointer in bits on every target the IR is folded for.
pub const POINTER_BITS: u16 = 64;

/// An interned identifier for a type.
///
/// This is the canonicalizing key used by the [`crate::TypeTable`]: two structurally identical
/// types always compute the same id, so interning through the id hands out one allocation per
/// type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IrTyId(u64);

impl IrTyId {
    fn compute_tag_id(tag: u8) -> Self {
        let mut hasher = DefaultHasher::new();
        tag.hash(&mut hasher);
        Self(hasher.finish())
    }

    pub fn compute_invalid_ty_id() -> Self {
        Self::compute_tag_id(0x00)
    }

    pub fn compute_unit_ty_id() -> Self {
        Self::compute_tag_id(0x01)
    }

    pub fn compute_bool_ty_id() -> Self {
        Self::compute_tag_id(0x02)
    }

    pub fn compute_comptime_int_ty_id() -> Self {
        Self::compute_tag_id(0x03)
    }

    pub fn compute_undefined_ty_id() -> Self {
        Self::compute_tag_id(0x04)
    }

    pub fn compute_noreturn_ty_id() -> Self {
        Self::compute_tag_id(0x05)
    }

    pub fn compute_integer_ty_id(signed: bool, bits: u16) -> Self {
        let mut hasher = DefaultHasher::new();
        (0x10, signed, bits).hash(&mut hasher);
        Self(hasher.finish())
    }

    pub fn compute_pointer_ty_id(pointee: &IrTyId) -> Self {
        let mut hasher = DefaultHasher::new();
        (0x20, pointee).hash(&mut hasher);
        Self(hasher.finish())
    }

    pub fn compute_array_ty_id(element: &IrTyId, len: u64) -> Self {
        let mut hasher = DefaultHasher::new();
        (0x30, element, len).hash(&mut hasher);
        Self(hasher.finish())
    }

    pub fn compute_struct_ty_id(name: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        (0x40, name).hash(&mut hasher);
        Self(hasher.finish())
    }

    pub fn compute_function_ty_id(parameters: &[IrTyId], return_type: &IrTyId) -> Self {
        let mut hasher = DefaultHasher::new();
        (0x50, parameters, return_type).hash(&mut hasher);
        Self(hasher.finish())
    }
}

impl From<&IrTy<'_>> for IrTyId {
    fn from(ty: &IrTy<'_>) -> Self {
        match ty {
            IrTy::Invalid => IrTyId::compute_invalid_ty_id(),
            IrTy::Unit => IrTyId::compute_unit_ty_id(),
            IrTy::Bool => IrTyId::compute_bool_ty_id(),
            IrTy::ComptimeInt => IrTyId::compute_comptime_int_ty_id(),
            IrTy::Undefined => IrTyId::compute_undefined_ty_id(),
            IrTy::NoReturn => IrTyId::compute_noreturn_ty_id(),
            IrTy::Integer(i) => IrTyId::compute_integer_ty_id(i.signed, i.bits),
            IrTy::Pointer(p) => IrTyId::compute_pointer_ty_id(&IrTyId::from(p.pointee)),
            IrTy::Array(a) => IrTyId::compute_array_ty_id(&IrTyId::from(a.element), a.len),
            IrTy::Struct(s) => IrTyId::compute_struct_ty_id(s.name),
            IrTy::Function(f) => {
                let parameters = f
                    .parameters
                    .iter()
                    .map(|p| IrTyId::from(*p))
                    .collect::<Vec<_>>();
                IrTyId::compute_function_ty_id(&parameters, &IrTyId::from(f.return_type))
            }
        }
    }
}

/// A single type known to the IR.
///
/// Types are only ever created through the [`crate::TypeTable`], which makes every `IrTy`
/// reference canonical. Equality is therefore identity: two references are the same type exactly
/// when they point at the same allocation.
#[must_use]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug)]
pub enum IrTy<'ta> {
    /// The poison type.
    ///
    /// Results of instructions that failed analysis have this type. Every rule involving a poison
    /// operand succeeds silently, so one mistake produces one diagnostic.
    Invalid,
    Unit,
    Bool,
    /// One of the sized integer types `i8` through `u64`.
    Integer(IrIntegerTy),
    /// The type of integer literals before they meet a sized integer.
    ///
    /// Values of this type only exist at compile time. A runtime merge of such values is
    /// concretized to `i32`.
    ComptimeInt,
    /// The type of the `undefined` literal, which coerces into every type.
    Undefined,
    /// The type of expressions that never produce a value.
    NoReturn,
    Pointer(IrPointerTy<'ta>),
    Array(IrArrayTy<'ta>),
    /// A nominal struct type. The field list lives in the module's struct table.
    Struct(IrStructTy<'ta>),
    Function(IrFunctionTy<'ta>),
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IrIntegerTy {
    pub signed: bool,
    pub bits: u16,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug)]
pub struct IrPointerTy<'ta> {
    pub pointee: &'ta IrTy<'ta>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug)]
pub struct IrArrayTy<'ta> {
    pub element: &'ta IrTy<'ta>,
    pub len: u64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug)]
pub struct IrStructTy<'ta> {
    pub name: &'ta str,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug)]
pub struct IrFunctionTy<'ta> {
    pub parameters: &'ta [&'ta IrTy<'ta>],
    pub return_type: &'ta IrTy<'ta>,
}

impl IrIntegerTy {
    pub fn min_value(&self) -> i128 {
        if self.signed {
            -(1i128 << (self.bits - 1))
        } else {
            0
        }
    }

    pub fn max_value(&self) -> i128 {
        if self.signed {
            (1i128 << (self.bits - 1)) - 1
        } else {
            (1i128 << self.bits) - 1
        }
    }

    /// Determine if `value` is representable by this type.
    pub fn fits(&self, value: i128) -> bool {
        value >= self.min_value() && value <= self.max_value()
    }

    /// Truncate `value` to this type with two's complement wrapping.
    ///
    /// ```
    /// use ember_ir::IrIntegerTy;
    ///
    /// let u8_ty = IrIntegerTy { signed: false, bits: 8 };
    /// assert_eq!(u8_ty.wrap(300), 44);
    /// let i8_ty = IrIntegerTy { signed: true, bits: 8 };
    /// assert_eq!(i8_ty.wrap(200), -56);
    /// ```
    pub fn wrap(&self, value: i128) -> i128 {
        let modulus = 1i128 << self.bits;
        let truncated = value.rem_euclid(modulus);
        if self.signed && truncated > self.max_value() {
            truncated - modulus
        } else {
            truncated
        }
    }

    /// Determine if every value of `self` is representable in `target`.
    pub fn widens_into(&self, target: &IrIntegerTy) -> bool {
        match (self.signed, target.signed) {
            (a, b) if a == b => self.bits <= target.bits,
            (false, true) => self.bits < target.bits,
            _ => false,
        }
    }
}

impl PartialEq for IrTy<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for IrTy<'_> {}

impl<'ta> IrTy<'ta> {
    pub fn is_invalid(&self) -> bool {
        matches!(self, IrTy::Invalid)
    }

    pub fn is_comptime_int(&self) -> bool {
        matches!(self, IrTy::ComptimeInt)
    }

    /// Determine if the type is a sized integer or `comptime_int`.
    pub fn is_numeric(&self) -> bool {
        matches!(self, IrTy::Integer(_) | IrTy::ComptimeInt)
    }

    pub fn as_integer(&self) -> Option<IrIntegerTy> {
        match self {
            IrTy::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_pointer(&self) -> Option<&'ta IrTy<'ta>> {
        match self {
            IrTy::Pointer(p) => Some(p.pointee),
            _ => None,
        }
    }

    pub fn as_struct_name(&self) -> Option<&'ta str> {
        match self {
            IrTy::Struct(s) => Some(s.name),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&IrFunctionTy<'ta>> {
        match self {
            IrTy::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Determine if values of this type can only exist at compile time.
    pub fn is_comptime_only(&self) -> bool {
        match self {
            IrTy::ComptimeInt | IrTy::Undefined => true,
            IrTy::Array(a) => a.element.is_comptime_only(),
            _ => false,
        }
    }
}

impl Display for IrTy<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IrTy::Invalid => write!(f, "<invalid>"),
            IrTy::Unit => write!(f, "unit"),
            IrTy::Bool => write!(f, "bool"),
            IrTy::Integer(i) => write!(f, "{}{}", if i.signed { "i" } else { "u" }, i.bits),
            IrTy::ComptimeInt => write!(f, "comptime_int"),
            IrTy::Undefined => write!(f, "undefined"),
            IrTy::NoReturn => write!(f, "noreturn"),
            IrTy::Pointer(p) => write!(f, "*{}", p.pointee),
            IrTy::Array(a) => write!(f, "[{}]{}", a.len, a.element),
            IrTy::Struct(s) => write!(f, "{}", s.name),
            IrTy::Function(func) => {
                write!(f, "fn(")?;
                for (i, p) in func.parameters.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ") -> {}", func.return_type)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::IrIntegerTy;

    #[test]
    fn test_integer_bounds() {
        let i8_ty = IrIntegerTy {
            signed: true,
            bits: 8,
        };
        assert_eq!(i8_ty.min_value(), -128);
        assert_eq!(i8_ty.max_value(), 127);
        let u64_ty = IrIntegerTy {
            signed: false,
            bits: 64,
        };
        assert_eq!(u64_ty.max_value(), u64::MAX as i128);
        assert!(u64_ty.fits(0));
        assert!(!u64_ty.fits(-1));
    }

    #[test]
    fn test_integer_widening() {
        let u8_ty = IrIntegerTy {
            signed: false,
            bits: 8,
        };
        let i8_ty = IrIntegerTy {
            signed: true,
            bits: 8,
        };
        let i16_ty = IrIntegerTy {
            signed: true,
            bits: 16,
        };
        assert!(u8_ty.widens_into(&i16_ty));
        assert!(!u8_ty.widens_into(&i8_ty));
        assert!(!i8_ty.widens_into(&u8_ty));
        assert!(i8_ty.widens_into(&i16_ty));
    }

    #[test]
    fn test_wrap_round_trips_in_range_values() {
        let i32_ty = IrIntegerTy {
            signed: true,
            bits: 32,
        };
        assert_eq!(i32_ty.wrap(-5), -5);
        assert_eq!(i32_ty.wrap(i32::MAX as i128 + 1), i32::MIN as i128);
    }
}
