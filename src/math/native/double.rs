use super::Word;
use std::fmt::Debug;

/// A `2W`-bit unsigned integer viewed as a `(hi, lo)` pair of `W` words.
///
/// Only the handful of operations the reduction code needs are exposed:
/// full word products, wrapping add/sub, right shifts and division by a
/// single word.
pub trait DoubleWidth<W>:
    Copy + Debug + Default + Eq + Ord + Send + Sync + 'static
{
    const ZERO: Self;
    const MAX: Self;

    fn from_word(value: W) -> Self;
    fn from_parts(hi: W, lo: W) -> Self;
    fn hi(self) -> W;
    fn lo(self) -> W;

    /// Full `W x W -> 2W` product.
    fn mul_words(a: W, b: W) -> Self;
    fn wrapping_add(self, rhs: Self) -> Self;
    fn wrapping_sub(self, rhs: Self) -> Self;
    fn shr_bits(self, bits: u32) -> Self;
    /// Quotient (double width) and remainder of division by a non-zero word.
    fn div_rem_word(self, divisor: W) -> (Self, W);
    fn bit_length(self) -> u32;
    fn to_f64(self) -> f64;

    #[inline]
    fn rem_word(self, divisor: W) -> W {
        self.div_rem_word(divisor).1
    }
}

macro_rules! impl_native_double {
    ($word:ty, $double:ty) => {
        impl DoubleWidth<$word> for $double {
            const ZERO: Self = 0;
            const MAX: Self = <$double>::MAX;

            #[inline]
            fn from_word(value: $word) -> Self {
                value as $double
            }

            #[inline]
            fn from_parts(hi: $word, lo: $word) -> Self {
                ((hi as $double) << <$word>::BITS) | lo as $double
            }

            #[inline]
            fn hi(self) -> $word {
                (self >> <$word>::BITS) as $word
            }

            #[inline]
            fn lo(self) -> $word {
                self as $word
            }

            #[inline]
            fn mul_words(a: $word, b: $word) -> Self {
                a as $double * b as $double
            }

            #[inline]
            fn wrapping_add(self, rhs: Self) -> Self {
                <$double>::wrapping_add(self, rhs)
            }

            #[inline]
            fn wrapping_sub(self, rhs: Self) -> Self {
                <$double>::wrapping_sub(self, rhs)
            }

            #[inline]
            fn shr_bits(self, bits: u32) -> Self {
                if bits >= <$double>::BITS { 0 } else { self >> bits }
            }

            #[inline]
            fn div_rem_word(self, divisor: $word) -> (Self, $word) {
                let divisor = divisor as $double;
                (self / divisor, (self % divisor) as $word)
            }

            #[inline]
            fn bit_length(self) -> u32 {
                <$double>::BITS - <$double>::leading_zeros(self)
            }

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

impl_native_double!(u32, u64);
impl_native_double!(u64, u128);

/// Emulated double word with explicit carry propagation, for word types
/// that have no native integer twice their width.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DoubleWord<W> {
    // field order matters: derived `Ord` compares `hi` first
    hi: W,
    lo: W,
}

/// `(u1 * 2^W + u0) / v` for `u1 < v`, as two half-word long-division steps
/// with normalized divisor (Knuth D with base `2^(W/2)`). Returns the
/// quotient word and the remainder.
fn div_two_by_one<W: Word>(u1: W, u0: W, v: W) -> (W, W) {
    debug_assert!(u1 < v);
    let half = W::BITS / 2;
    let base = W::ONE << half;
    let mask = base - W::ONE;

    let shift = v.leading_zeros();
    let v = v << shift;
    let (vn1, vn0) = (v >> half, v & mask);
    let un32 = if shift == 0 {
        u1
    } else {
        (u1 << shift) | (u0 >> (W::BITS - shift))
    };
    let un10 = u0 << shift;
    let (un1, un0) = (un10 >> half, un10 & mask);

    let estimate = |numerator: W, next: W| -> W {
        let mut q = numerator / vn1;
        let mut rhat = numerator - q * vn1;
        while q >= base || q * vn0 > ((rhat << half) | next) {
            q = q - W::ONE;
            rhat = rhat + vn1;
            if rhat >= base {
                break;
            }
        }
        q
    };

    let q1 = estimate(un32, un1);
    let un21 = ((un32 << half) | un1).wrapping_sub(q1.wrapping_mul(v));
    let q0 = estimate(un21, un0);
    let remainder = ((un21 << half) | un0).wrapping_sub(q0.wrapping_mul(v)) >> shift;
    ((q1 << half) | q0, remainder)
}

impl<W: Word> DoubleWidth<W> for DoubleWord<W> {
    const ZERO: Self = Self {
        hi: W::ZERO,
        lo: W::ZERO,
    };
    const MAX: Self = Self {
        hi: W::MAX,
        lo: W::MAX,
    };

    #[inline]
    fn from_word(value: W) -> Self {
        Self {
            hi: W::ZERO,
            lo: value,
        }
    }

    #[inline]
    fn from_parts(hi: W, lo: W) -> Self {
        Self { hi, lo }
    }

    #[inline]
    fn hi(self) -> W {
        self.hi
    }

    #[inline]
    fn lo(self) -> W {
        self.lo
    }

    /// Schoolbook product on half words.
    fn mul_words(a: W, b: W) -> Self {
        let half = W::BITS / 2;
        let mask = (W::ONE << half) - W::ONE;
        let (a0, a1) = (a & mask, a >> half);
        let (b0, b1) = (b & mask, b >> half);

        let p00 = a0 * b0;
        let p01 = a0 * b1;
        let p10 = a1 * b0;
        let p11 = a1 * b1;

        let middle = (p00 >> half) + (p01 & mask) + (p10 & mask);
        let lo = (p00 & mask) | (middle << half);
        let hi = p11 + (p01 >> half) + (p10 >> half) + (middle >> half);
        Self { hi, lo }
    }

    #[inline]
    fn wrapping_add(self, rhs: Self) -> Self {
        let (lo, carry) = self.lo.overflowing_add(rhs.lo);
        let carry = if carry { W::ONE } else { W::ZERO };
        Self {
            hi: self.hi.wrapping_add(rhs.hi).wrapping_add(carry),
            lo,
        }
    }

    #[inline]
    fn wrapping_sub(self, rhs: Self) -> Self {
        let (lo, borrow) = self.lo.overflowing_sub(rhs.lo);
        let borrow = if borrow { W::ONE } else { W::ZERO };
        Self {
            hi: self.hi.wrapping_sub(rhs.hi).wrapping_sub(borrow),
            lo,
        }
    }

    fn shr_bits(self, bits: u32) -> Self {
        match bits {
            0 => self,
            b if b >= 2 * W::BITS => Self::ZERO,
            b if b >= W::BITS => Self {
                hi: W::ZERO,
                lo: self.hi >> (b - W::BITS),
            },
            b => Self {
                hi: self.hi >> b,
                lo: (self.lo >> b) | (self.hi << (W::BITS - b)),
            },
        }
    }

    fn div_rem_word(self, divisor: W) -> (Self, W) {
        debug_assert!(divisor != W::ZERO, "div_rem_word: divisor must be non-zero");
        let hi = self.hi / divisor;
        let (lo, remainder) = div_two_by_one(self.hi % divisor, self.lo, divisor);
        (Self { hi, lo }, remainder)
    }

    fn bit_length(self) -> u32 {
        if self.hi != W::ZERO {
            2 * W::BITS - self.hi.leading_zeros()
        } else {
            W::BITS - self.lo.leading_zeros()
        }
    }

    fn to_f64(self) -> f64 {
        self.hi.to_f64() * 2f64.powi(W::BITS as i32) + self.lo.to_f64()
    }
}
