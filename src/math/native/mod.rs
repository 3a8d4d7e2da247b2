//! Fixed-width modular integers.
//!
//! A [`Word`] is one machine word (`u32`, `u64` or `u128`) paired with a
//! double-width companion type used for exact products. `u32` and `u64` use
//! the native `u64`/`u128`; `u128` has no native double and uses the
//! emulated [`DoubleWord`]. [`ModularArithmetic`] layers the modular
//! operations (Barrett, Shoup, wide Barrett) on top of that.

mod double;
mod modular;

pub use double::{DoubleWidth, DoubleWord};
pub use modular::ModularArithmetic;

use rand::distr::uniform::SampleUniform;
use std::{
    fmt::{Debug, Display},
    hash::Hash,
    ops::{Add, BitAnd, BitOr, Div, Mul, Not, Rem, Shl, Shr, Sub},
};

/// Integer log2 rounded down; `log2(0) == 0`.
pub const fn log2(value: u64) -> u32 {
    if value == 0 {
        0
    } else {
        63 - value.leading_zeros()
    }
}

/// Bit length of `value` (`0` for zero), as used for `qMSB`-style budgets.
pub const fn msb64(value: u64) -> u32 {
    64 - value.leading_zeros()
}

pub trait Word:
    Copy
    + Debug
    + Display
    + Default
    + Eq
    + Ord
    + Hash
    + Send
    + Sync
    + 'static
    + SampleUniform
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Rem<Output = Self>
    + BitAnd<Output = Self>
    + BitOr<Output = Self>
    + Not<Output = Self>
    + Shl<u32, Output = Self>
    + Shr<u32, Output = Self>
{
    /// Integer of twice the width, native where the platform has one.
    type Double: DoubleWidth<Self>;

    const BITS: u32;
    const ZERO: Self;
    const ONE: Self;
    const MAX: Self;

    /// Truncating conversion from `u64`.
    fn from_u64(value: u64) -> Self;
    fn try_from_u128(value: u128) -> Option<Self>;
    fn as_u128(self) -> u128;
    /// Truncating conversion to `u64`.
    fn as_u64(self) -> u64;
    fn to_f64(self) -> f64;
    /// Saturating float-to-int cast (negative and NaN map to zero).
    fn from_f64(value: f64) -> Self;

    fn leading_zeros(self) -> u32;
    fn is_power_of_two(self) -> bool;
    fn wrapping_add(self, rhs: Self) -> Self;
    fn wrapping_sub(self, rhs: Self) -> Self;
    fn wrapping_mul(self, rhs: Self) -> Self;
    fn overflowing_add(self, rhs: Self) -> (Self, bool);
    fn overflowing_sub(self, rhs: Self) -> (Self, bool);
    fn checked_mul(self, rhs: Self) -> Option<Self>;
}

macro_rules! impl_word {
    ($word:ty, $double:ty) => {
        impl Word for $word {
            type Double = $double;

            const BITS: u32 = <$word>::BITS;
            const ZERO: Self = 0;
            const ONE: Self = 1;
            const MAX: Self = <$word>::MAX;

            #[inline]
            fn from_u64(value: u64) -> Self {
                value as $word
            }

            #[inline]
            fn try_from_u128(value: u128) -> Option<Self> {
                <$word>::try_from(value).ok()
            }

            #[inline]
            fn as_u128(self) -> u128 {
                self as u128
            }

            #[inline]
            fn as_u64(self) -> u64 {
                self as u64
            }

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $word
            }

            #[inline]
            fn leading_zeros(self) -> u32 {
                <$word>::leading_zeros(self)
            }

            #[inline]
            fn is_power_of_two(self) -> bool {
                <$word>::is_power_of_two(self)
            }

            #[inline]
            fn wrapping_add(self, rhs: Self) -> Self {
                <$word>::wrapping_add(self, rhs)
            }

            #[inline]
            fn wrapping_sub(self, rhs: Self) -> Self {
                <$word>::wrapping_sub(self, rhs)
            }

            #[inline]
            fn wrapping_mul(self, rhs: Self) -> Self {
                <$word>::wrapping_mul(self, rhs)
            }

            #[inline]
            fn overflowing_add(self, rhs: Self) -> (Self, bool) {
                <$word>::overflowing_add(self, rhs)
            }

            #[inline]
            fn overflowing_sub(self, rhs: Self) -> (Self, bool) {
                <$word>::overflowing_sub(self, rhs)
            }

            #[inline]
            fn checked_mul(self, rhs: Self) -> Option<Self> {
                <$word>::checked_mul(self, rhs)
            }
        }

        impl ModularArithmetic for $word {}
    };
}

impl_word!(u32, u64);
impl_word!(u64, u128);
impl_word!(u128, DoubleWord<u128>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log2_and_msb_agree_on_powers_of_two() {
        assert_eq!(log2(0), 0);
        assert_eq!(log2(1), 0);
        assert_eq!(log2(1024), 10);
        assert_eq!(log2(1025), 10);
        assert_eq!(msb64(0), 0);
        assert_eq!(msb64(1), 1);
        assert_eq!(msb64(1024), 11);
    }

    #[test]
    fn float_conversion_saturates() {
        assert_eq!(<u32 as Word>::from_f64(-3.0), 0);
        assert_eq!(<u32 as Word>::from_f64(1e20), u32::MAX);
        assert_eq!(<u64 as Word>::from_f64(12.9), 12);
    }

    #[test]
    fn u128_round_trips_through_try_from() {
        assert_eq!(<u32 as Word>::try_from_u128(1 << 40), None);
        assert_eq!(<u64 as Word>::try_from_u128(77), Some(77));
        assert_eq!(<u128 as Word>::try_from_u128(u128::MAX), Some(u128::MAX));
    }
}
