//! Value types and constants of the register IR.
//!
//! Every register carries a [`TypeBearer`]: either a plain [`Type`] or a
//! [`Constant`], which is a type that additionally knows its value.
//! Constant-bearing descriptors are how the constant-propagation results
//! flow to the downstream code emitter without a separate side table.
//!
//! Arithmetic folding on [`Constant`] uses exact machine-width wraparound
//! semantics for the 32- and 64-bit integer types; shift amounts are masked
//! to the operand width as the target instruction set does. Folding helpers
//! return `None` when the operation is not foldable (mixed widths, float
//! operands, division by zero) so callers can fall back to runtime
//! evaluation.

use std::fmt;
use std::sync::Arc;

/// A value type of the register IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Type {
    /// 32-bit integer (also carries booleans, bytes, chars and shorts).
    Int,
    /// 64-bit integer. Category 2.
    Long,
    /// 32-bit IEEE float.
    Float,
    /// 64-bit IEEE float. Category 2.
    Double,
    /// Any reference type.
    Object,
    /// Subroutine return address (legacy `jsr`/`ret` support).
    ReturnAddress,
    /// Placeholder for phis whose type has not been resolved yet.
    ///
    /// Minted by phi placement when no local-variable snapshot covers the
    /// merged register; resolved by the downstream phi-type-resolution pass.
    Unknown,
}

impl Type {
    /// Returns the value category: 2 for wide types occupying two
    /// consecutive registers, 1 otherwise.
    #[must_use]
    pub const fn category(self) -> u32 {
        match self {
            Self::Long | Self::Double => 2,
            _ => 1,
        }
    }

    /// Returns `true` if this is one of the two integer types SCCP folds.
    #[must_use]
    pub const fn is_integral(self) -> bool {
        matches!(self, Self::Int | Self::Long)
    }
}

/// A compile-time constant value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    /// 32-bit integer constant.
    Int(i32),
    /// 64-bit integer constant.
    Long(i64),
    /// 32-bit float constant, stored as raw bits so `Eq`/`Hash` are exact.
    Float(u32),
    /// 64-bit float constant, stored as raw bits.
    Double(u64),
    /// The null reference.
    Null,
    /// An interned string reference.
    KnownString(Arc<str>),
}

impl Constant {
    /// Returns the type of this constant.
    #[must_use]
    pub fn type_of(&self) -> Type {
        match self {
            Self::Int(_) => Type::Int,
            Self::Long(_) => Type::Long,
            Self::Float(_) => Type::Float,
            Self::Double(_) => Type::Double,
            Self::Null | Self::KnownString(_) => Type::Object,
        }
    }

    /// Returns `true` if this is an integer constant equal to zero.
    #[must_use]
    pub fn is_integral_zero(&self) -> bool {
        matches!(self, Self::Int(0) | Self::Long(0))
    }

    /// Folds `self + other` with wraparound.
    #[must_use]
    pub fn add(&self, other: &Self) -> Option<Self> {
        self.fold_arith(other, i32::wrapping_add, i64::wrapping_add)
    }

    /// Folds `self - other` with wraparound.
    #[must_use]
    pub fn sub(&self, other: &Self) -> Option<Self> {
        self.fold_arith(other, i32::wrapping_sub, i64::wrapping_sub)
    }

    /// Folds `self * other` with wraparound.
    #[must_use]
    pub fn mul(&self, other: &Self) -> Option<Self> {
        self.fold_arith(other, i32::wrapping_mul, i64::wrapping_mul)
    }

    /// Folds `self / other`. Division by zero is not foldable.
    #[must_use]
    pub fn div(&self, other: &Self) -> Option<Self> {
        if other.is_integral_zero() {
            return None;
        }
        self.fold_arith(other, i32::wrapping_div, i64::wrapping_div)
    }

    /// Folds `self % other`. Remainder by zero is not foldable.
    #[must_use]
    pub fn rem(&self, other: &Self) -> Option<Self> {
        if other.is_integral_zero() {
            return None;
        }
        self.fold_arith(other, i32::wrapping_rem, i64::wrapping_rem)
    }

    /// Folds bitwise and.
    #[must_use]
    pub fn and(&self, other: &Self) -> Option<Self> {
        self.fold_arith(other, |a, b| a & b, |a, b| a & b)
    }

    /// Folds bitwise or.
    #[must_use]
    pub fn or(&self, other: &Self) -> Option<Self> {
        self.fold_arith(other, |a, b| a | b, |a, b| a | b)
    }

    /// Folds bitwise xor.
    #[must_use]
    pub fn xor(&self, other: &Self) -> Option<Self> {
        self.fold_arith(other, |a, b| a ^ b, |a, b| a ^ b)
    }

    /// Folds `self << amount`, masking the amount to the operand width.
    #[must_use]
    pub fn shl(&self, amount: &Self) -> Option<Self> {
        let shift = amount.shift_amount()?;
        match self {
            Self::Int(v) => Some(Self::Int(v.wrapping_shl(shift & 0x1f))),
            Self::Long(v) => Some(Self::Long(v.wrapping_shl(shift & 0x3f))),
            _ => None,
        }
    }

    /// Folds arithmetic `self >> amount`, masking the amount.
    #[must_use]
    pub fn shr(&self, amount: &Self) -> Option<Self> {
        let shift = amount.shift_amount()?;
        match self {
            Self::Int(v) => Some(Self::Int(v.wrapping_shr(shift & 0x1f))),
            Self::Long(v) => Some(Self::Long(v.wrapping_shr(shift & 0x3f))),
            _ => None,
        }
    }

    /// Folds logical (zero-filling) `self >>> amount`, masking the amount.
    #[must_use]
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    pub fn ushr(&self, amount: &Self) -> Option<Self> {
        let shift = amount.shift_amount()?;
        match self {
            Self::Int(v) => Some(Self::Int(((*v as u32).wrapping_shr(shift & 0x1f)) as i32)),
            Self::Long(v) => Some(Self::Long(((*v as u64).wrapping_shr(shift & 0x3f)) as i64)),
            _ => None,
        }
    }

    /// Folds arithmetic negation with wraparound.
    #[must_use]
    pub fn neg(&self) -> Option<Self> {
        match self {
            Self::Int(v) => Some(Self::Int(v.wrapping_neg())),
            Self::Long(v) => Some(Self::Long(v.wrapping_neg())),
            _ => None,
        }
    }

    /// Folds bitwise not.
    #[must_use]
    pub fn not(&self) -> Option<Self> {
        match self {
            Self::Int(v) => Some(Self::Int(!v)),
            Self::Long(v) => Some(Self::Long(!v)),
            _ => None,
        }
    }

    /// Extracts a shift amount from an integer constant.
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    fn shift_amount(&self) -> Option<u32> {
        match self {
            Self::Int(v) => Some(*v as u32),
            Self::Long(v) => Some(*v as u32),
            _ => None,
        }
    }

    /// Applies a same-width integer fold, rejecting mixed or non-integer
    /// operand pairs.
    fn fold_arith(
        &self,
        other: &Self,
        f32op: impl FnOnce(i32, i32) -> i32,
        f64op: impl FnOnce(i64, i64) -> i64,
    ) -> Option<Self> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(Self::Int(f32op(*a, *b))),
            (Self::Long(a), Self::Long(b)) => Some(Self::Long(f64op(*a, *b))),
            _ => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "#{v}"),
            Self::Long(v) => write!(f, "#{v}L"),
            Self::Float(bits) => write!(f, "#{}f", f32::from_bits(*bits)),
            Self::Double(bits) => write!(f, "#{}d", f64::from_bits(*bits)),
            Self::Null => write!(f, "#null"),
            Self::KnownString(s) => write!(f, "#{s:?}"),
        }
    }
}

/// A type that may additionally carry a known constant value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeBearer {
    /// A plain type with no known value.
    Type(Type),
    /// A constant: the type is implied by the value.
    Constant(Constant),
}

impl TypeBearer {
    /// Returns the underlying type.
    #[must_use]
    pub fn get_type(&self) -> Type {
        match self {
            Self::Type(t) => *t,
            Self::Constant(c) => c.type_of(),
        }
    }

    /// Returns `true` if this bearer carries a known constant.
    #[must_use]
    pub const fn is_constant(&self) -> bool {
        matches!(self, Self::Constant(_))
    }

    /// Returns the constant value, if any.
    #[must_use]
    pub const fn constant(&self) -> Option<&Constant> {
        match self {
            Self::Constant(c) => Some(c),
            Self::Type(_) => None,
        }
    }
}

impl fmt::Display for TypeBearer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(t) => write!(f, "{t}"),
            Self::Constant(c) => write!(f, "{}={c}", c.type_of()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category() {
        assert_eq!(Type::Int.category(), 1);
        assert_eq!(Type::Object.category(), 1);
        assert_eq!(Type::Long.category(), 2);
        assert_eq!(Type::Double.category(), 2);
    }

    #[test]
    fn test_fold_wraparound() {
        assert_eq!(
            Constant::Int(i32::MAX).add(&Constant::Int(1)),
            Some(Constant::Int(i32::MIN))
        );
        assert_eq!(
            Constant::Long(i64::MIN).sub(&Constant::Long(1)),
            Some(Constant::Long(i64::MAX))
        );
        assert_eq!(
            Constant::Int(i32::MIN).div(&Constant::Int(-1)),
            Some(Constant::Int(i32::MIN))
        );
    }

    #[test]
    fn test_fold_div_by_zero() {
        assert_eq!(Constant::Int(7).div(&Constant::Int(0)), None);
        assert_eq!(Constant::Long(7).rem(&Constant::Long(0)), None);
    }

    #[test]
    fn test_fold_mixed_widths_rejected() {
        assert_eq!(Constant::Int(1).add(&Constant::Long(2)), None);
        assert_eq!(Constant::Float(0).add(&Constant::Float(0)), None);
    }

    #[test]
    fn test_shift_masking() {
        // Shift amounts are masked to 5 bits for Int, 6 for Long.
        assert_eq!(
            Constant::Int(1).shl(&Constant::Int(33)),
            Some(Constant::Int(2))
        );
        assert_eq!(
            Constant::Long(1).shl(&Constant::Int(65)),
            Some(Constant::Long(2))
        );
        assert_eq!(
            Constant::Int(-8).ushr(&Constant::Int(1)),
            Some(Constant::Int(0x7fff_fffc))
        );
    }

    #[test]
    fn test_type_bearer() {
        let plain = TypeBearer::Type(Type::Int);
        let constant = TypeBearer::Constant(Constant::Int(5));

        assert!(!plain.is_constant());
        assert!(constant.is_constant());
        assert_eq!(plain.get_type(), Type::Int);
        assert_eq!(constant.get_type(), Type::Int);
        assert_eq!(constant.constant(), Some(&Constant::Int(5)));
    }
}
