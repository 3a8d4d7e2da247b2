use super::{DoubleWidth, Word};
use crate::math::errors::{MathError, MathResult};

/// Modular arithmetic over one machine word.
///
/// Methods come in two tiers. The checked tier (`*_checked`, `modulo`,
/// `compute_mu`, `mod_inverse`) validates its operands and returns errors.
/// The fast tier (`*_fast`, `mod_mul_fast_const`, `reduce_wide`) performs no
/// checks: operands must already be reduced and the modulus must satisfy the
/// width bound stated on each method.
///
/// Every method has a provided implementation built on [`Word`] and its
/// double-width companion, so implementing the trait for a word type is a
/// one-line `impl`.
pub trait ModularArithmetic: Word {
    // ─── Checked tier ─────────────────────────────────────────────────────────

    fn add_checked(self, rhs: Self) -> MathResult<Self> {
        match self.overflowing_add(rhs) {
            (sum, false) => Ok(sum),
            _ => Err(MathError::Overflow { operation: "add" }),
        }
    }

    fn sub_checked(self, rhs: Self) -> MathResult<Self> {
        match self.overflowing_sub(rhs) {
            (difference, false) => Ok(difference),
            _ => Err(MathError::Overflow { operation: "sub" }),
        }
    }

    fn mul_checked(self, rhs: Self) -> MathResult<Self> {
        self.checked_mul(rhs)
            .ok_or(MathError::Overflow { operation: "mul" })
    }

    /// `self mod modulus` by plain division.
    fn modulo(self, modulus: Self) -> MathResult<Self> {
        if modulus == Self::ZERO {
            return Err(MathError::DivideByZero);
        }
        Ok(self % modulus)
    }

    // ─── Fast tier ────────────────────────────────────────────────────────────

    #[inline]
    fn add_fast(self, rhs: Self) -> Self {
        self.wrapping_add(rhs)
    }

    #[inline]
    fn sub_fast(self, rhs: Self) -> Self {
        self.wrapping_sub(rhs)
    }

    #[inline]
    fn mul_fast(self, rhs: Self) -> Self {
        self.wrapping_mul(rhs)
    }

    /// Bit length of the value (`0` for zero).
    #[inline]
    fn msb(self) -> u32 {
        Self::BITS - self.leading_zeros()
    }

    // ─── Barrett reduction ────────────────────────────────────────────────────

    /// Barrett constant `floor(2^(2n+3) / self)` where `n` is the bit length
    /// of `self`. Only moduli of at most `W - 4` bits have a constant that
    /// fits in one word.
    fn compute_mu(self) -> MathResult<Self> {
        if self == Self::ZERO {
            return Err(MathError::DivideByZero);
        }
        let bits = self.msb();
        let max_bits = Self::BITS - 4;
        if bits > max_bits {
            return Err(MathError::ModulusTooLarge { bits, max_bits });
        }
        let shift = 2 * bits + 3;
        let numerator = if shift >= Self::BITS {
            Self::Double::from_parts(Self::ONE << (shift - Self::BITS), Self::ZERO)
        } else {
            Self::Double::from_word(Self::ONE << shift)
        };
        Ok(numerator.div_rem_word(self).0.lo())
    }

    /// Reduces a double-width value with the Barrett constant of `modulus`.
    ///
    /// `mu` must come from `modulus.compute_mu()`. Inputs wider than twice
    /// the modulus (and moduli of at most two bits) take the division path.
    fn reduce_barrett(value: Self::Double, modulus: Self, mu: Self) -> Self {
        let bits = modulus.msb();
        if bits <= 2 || value.bit_length() > 2 * bits {
            return value.rem_word(modulus);
        }
        let estimate = value.shr_bits(bits - 2).lo();
        let quotient = Self::Double::mul_words(estimate, mu)
            .shr_bits(bits + 5)
            .lo();
        let mut remainder = value
            .wrapping_sub(Self::Double::mul_words(quotient, modulus))
            .lo();
        while remainder >= modulus {
            remainder = remainder - modulus;
        }
        remainder
    }

    #[inline]
    fn mod_barrett(self, modulus: Self, mu: Self) -> Self {
        Self::reduce_barrett(Self::Double::from_word(self), modulus, mu)
    }

    /// Wide Barrett constant `floor(2^(2W) / self)`, a double-width value.
    fn compute_wide_mu(self) -> Self::Double {
        let (quotient, _) = Self::Double::MAX.div_rem_word(self);
        if self.is_power_of_two() {
            quotient.wrapping_add(Self::Double::from_word(Self::ONE))
        } else {
            quotient
        }
    }

    /// Reduces any double-width accumulator modulo `modulus` using the wide
    /// Barrett constant. Requires `modulus < 2^(W-2)`.
    ///
    /// The quotient estimate drops only the lowest partial product, so it is
    /// at most a few units short; the remainder is then computed modulo
    /// `2^W`, which is exact because the true remainder is below `4 * modulus`.
    fn reduce_wide(value: Self::Double, modulus: Self, mu: Self::Double) -> Self {
        let (a_hi, a_lo) = (value.hi(), value.lo());
        let (mu_hi, mu_lo) = (mu.hi(), mu.lo());

        let low_carry = Self::Double::mul_words(a_lo, mu_lo).hi();

        let middle = Self::Double::mul_words(a_lo, mu_hi);
        let (partial, carry) = middle.lo().overflowing_add(low_carry);
        let upper = middle.hi().wrapping_add(carry_word(carry));

        let middle = Self::Double::mul_words(a_hi, mu_lo);
        let (_, carry) = middle.lo().overflowing_add(partial);
        let cross = middle.hi().wrapping_add(carry_word(carry));

        let quotient = a_hi
            .wrapping_mul(mu_hi)
            .wrapping_add(upper)
            .wrapping_add(cross);

        let mut remainder = a_lo.wrapping_sub(quotient.wrapping_mul(modulus));
        while remainder >= modulus {
            remainder = remainder - modulus;
        }
        remainder
    }

    // ─── Modular addition and subtraction ────────────────────────────────────

    /// `(self + rhs) mod modulus` for operands already in `[0, modulus)`.
    #[inline]
    fn mod_add_fast(self, rhs: Self, modulus: Self) -> Self {
        let (sum, carry) = self.overflowing_add(rhs);
        if carry || sum >= modulus {
            sum.wrapping_sub(modulus)
        } else {
            sum
        }
    }

    fn mod_add(self, rhs: Self, modulus: Self) -> Self {
        (self % modulus).mod_add_fast(rhs % modulus, modulus)
    }

    fn mod_add_barrett(self, rhs: Self, modulus: Self, mu: Self) -> Self {
        self.mod_barrett(modulus, mu)
            .mod_add_fast(rhs.mod_barrett(modulus, mu), modulus)
    }

    /// `(self - rhs) mod modulus` for operands already in `[0, modulus)`.
    #[inline]
    fn mod_sub_fast(self, rhs: Self, modulus: Self) -> Self {
        if self >= rhs {
            self - rhs
        } else {
            self.wrapping_add(modulus).wrapping_sub(rhs)
        }
    }

    fn mod_sub(self, rhs: Self, modulus: Self) -> Self {
        (self % modulus).mod_sub_fast(rhs % modulus, modulus)
    }

    fn mod_sub_barrett(self, rhs: Self, modulus: Self, mu: Self) -> Self {
        self.mod_barrett(modulus, mu)
            .mod_sub_fast(rhs.mod_barrett(modulus, mu), modulus)
    }

    fn mod_neg(self, modulus: Self) -> Self {
        let reduced = self % modulus;
        if reduced == Self::ZERO {
            reduced
        } else {
            modulus - reduced
        }
    }

    // ─── Modular multiplication ──────────────────────────────────────────────

    /// `(self * rhs) mod modulus` through the double-width product and a
    /// full division. Accepts unreduced operands.
    #[inline]
    fn mod_mul(self, rhs: Self, modulus: Self) -> Self {
        Self::Double::mul_words(self, rhs).rem_word(modulus)
    }

    fn mod_mul_barrett(self, rhs: Self, modulus: Self, mu: Self) -> Self {
        let a = self.mod_barrett(modulus, mu);
        let b = rhs.mod_barrett(modulus, mu);
        Self::reduce_barrett(Self::Double::mul_words(a, b), modulus, mu)
    }

    /// Barrett product for operands already in `[0, modulus)`.
    #[inline]
    fn mod_mul_fast(self, rhs: Self, modulus: Self, mu: Self) -> Self {
        Self::reduce_barrett(Self::Double::mul_words(self, rhs), modulus, mu)
    }

    /// Shoup constant `floor(self * 2^W / modulus)` for a fixed multiplicand
    /// `self < modulus`.
    fn prep_mod_mul_const(self, modulus: Self) -> Self {
        Self::Double::from_parts(self, Self::ZERO)
            .div_rem_word(modulus)
            .0
            .lo()
    }

    /// Shoup multiplication by a fixed `b` with precomputed
    /// `b_inv = b.prep_mod_mul_const(modulus)`. Requires
    /// `modulus < 2^(W-1)`; one high-word product and a single conditional
    /// subtraction.
    #[inline]
    fn mod_mul_fast_const(self, b: Self, modulus: Self, b_inv: Self) -> Self {
        let quotient = Self::Double::mul_words(self, b_inv).hi();
        let remainder = self
            .wrapping_mul(b)
            .wrapping_sub(quotient.wrapping_mul(modulus));
        if remainder >= modulus {
            remainder - modulus
        } else {
            remainder
        }
    }

    // ─── Exponentiation and inversion ────────────────────────────────────────

    fn mod_exp(self, exponent: Self, modulus: Self) -> Self {
        if modulus == Self::ONE {
            return Self::ZERO;
        }
        let mut result = Self::ONE;
        let mut base = self % modulus;
        let mut exponent = exponent;
        while exponent != Self::ZERO {
            if exponent & Self::ONE == Self::ONE {
                result = result.mod_mul(base, modulus);
            }
            base = base.mod_mul(base, modulus);
            exponent = exponent >> 1;
        }
        result
    }

    fn mod_exp_barrett(self, exponent: Self, modulus: Self, mu: Self) -> Self {
        if modulus == Self::ONE {
            return Self::ZERO;
        }
        let mut result = Self::ONE;
        let mut base = self.mod_barrett(modulus, mu);
        let mut exponent = exponent;
        while exponent != Self::ZERO {
            if exponent & Self::ONE == Self::ONE {
                result = result.mod_mul_fast(base, modulus, mu);
            }
            base = base.mod_mul_fast(base, modulus, mu);
            exponent = exponent >> 1;
        }
        result
    }

    /// Inverse of `self` modulo `modulus`.
    ///
    /// Runs the Euclidean quotient sequence forward, then rebuilds the Bezout
    /// coefficient from the recorded quotients; the parity of the sequence
    /// length decides its sign.
    fn mod_inverse(self, modulus: Self) -> MathResult<Self> {
        if modulus == Self::ZERO {
            return Err(MathError::DivideByZero);
        }
        let value = self % modulus;
        if value == Self::ZERO {
            return Err(MathError::no_inverse(self, modulus));
        }
        if value == Self::ONE {
            return Ok(Self::ONE);
        }

        let mut first = modulus;
        let mut second = value;
        let mut remainder = first % second;
        let mut quotients = vec![first / second];
        while remainder != Self::ONE {
            if remainder == Self::ZERO {
                return Err(MathError::no_inverse(self, modulus));
            }
            first = second;
            second = remainder;
            remainder = first % second;
            quotients.push(first / second);
        }

        let mut first = Self::ZERO;
        let mut second = Self::ONE;
        let mut coefficient = Self::ONE;
        for &quotient in quotients.iter().rev() {
            coefficient = quotient.wrapping_mul(second).wrapping_add(first);
            first = second;
            second = coefficient;
        }

        if quotients.len() % 2 == 1 {
            Ok(modulus - coefficient)
        } else {
            Ok(coefficient)
        }
    }
}

#[inline]
fn carry_word<W: Word>(carry: bool) -> W {
    if carry { W::ONE } else { W::ZERO }
}
