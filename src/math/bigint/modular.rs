use super::BigInteger;
use crate::math::errors::{MathError, MathResult};
use std::cmp::Ordering;
use tracing::warn;

// ─── Barrett reduction ────────────────────────────────────────────────────────

impl BigInteger {
    /// Barrett constant `floor(2^(2n+3) / self)` where `n` is the bit length
    /// of `self`. Valid only for this exact modulus.
    pub fn compute_mu(&self) -> MathResult<Self> {
        self.ensure_initialized()?;
        if self.is_zero() {
            return Err(MathError::DivideByZero);
        }
        Self::power_of_two(2 * self.msb() + 3).divided_by(self)
    }

    /// `self mod modulus` using the Barrett constant `mu` of `modulus`.
    ///
    /// Passing a `mu` computed for a different modulus gives a wrong result;
    /// this is not checked. Inputs wider than `2n + 3` bits fall back to
    /// long division.
    pub fn mod_barrett(&self, modulus: &Self, mu: &Self) -> MathResult<Self> {
        self.ensure_initialized()?;
        modulus.ensure_initialized()?;
        mu.ensure_initialized()?;
        if modulus.is_zero() {
            return Err(MathError::DivideByZero);
        }
        Ok(self.reduce_barrett(modulus, mu))
    }

    pub(crate) fn reduce_barrett(&self, modulus: &Self, mu: &Self) -> Self {
        if self.cmp_value(modulus) == Ordering::Less {
            return self.clone();
        }
        let bits = modulus.msb();
        if bits <= 2 {
            return self.div_rem_unchecked(modulus).1;
        }
        if self.msb() > 2 * bits + 3 {
            warn!(
                value_bits = self.msb(),
                modulus_bits = bits,
                "barrett input exceeds 2n+3 bits, using long division"
            );
            return self.div_rem_unchecked(modulus).1;
        }
        let quotient = self
            .shifted_right(bits - 2)
            .mul_unchecked(mu)
            .shifted_right(bits + 5);
        let mut remainder = self.sub_saturating(&quotient.mul_unchecked(modulus));
        while remainder.cmp_value(modulus) != Ordering::Less {
            remainder = remainder.sub_saturating(modulus);
        }
        remainder
    }
}

// ─── Modular arithmetic ───────────────────────────────────────────────────────

impl BigInteger {
    pub fn mod_add(&self, rhs: &Self, modulus: &Self) -> MathResult<Self> {
        self.plus(rhs)?.modulo(modulus)
    }

    pub fn mod_add_barrett(&self, rhs: &Self, modulus: &Self, mu: &Self) -> MathResult<Self> {
        let a = self.mod_barrett(modulus, mu)?;
        let b = rhs.mod_barrett(modulus, mu)?;
        let sum = a.add_unchecked(&b);
        Ok(if sum.cmp_value(modulus) == Ordering::Less {
            sum
        } else {
            sum.sub_saturating(modulus)
        })
    }

    pub fn mod_sub(&self, rhs: &Self, modulus: &Self) -> MathResult<Self> {
        let a = self.modulo(modulus)?;
        let b = rhs.modulo(modulus)?;
        Ok(Self::sub_reduced(&a, &b, modulus))
    }

    pub fn mod_sub_barrett(&self, rhs: &Self, modulus: &Self, mu: &Self) -> MathResult<Self> {
        let a = self.mod_barrett(modulus, mu)?;
        let b = rhs.mod_barrett(modulus, mu)?;
        Ok(Self::sub_reduced(&a, &b, modulus))
    }

    fn sub_reduced(a: &Self, b: &Self, modulus: &Self) -> Self {
        if a.cmp_value(b) != Ordering::Less {
            a.sub_saturating(b)
        } else {
            a.add_unchecked(modulus).sub_saturating(b)
        }
    }

    pub fn mod_mul(&self, rhs: &Self, modulus: &Self) -> MathResult<Self> {
        self.times(rhs)?.modulo(modulus)
    }

    pub fn mod_mul_barrett(&self, rhs: &Self, modulus: &Self, mu: &Self) -> MathResult<Self> {
        let a = self.mod_barrett(modulus, mu)?;
        let b = rhs.mod_barrett(modulus, mu)?;
        Ok(a.mul_unchecked(&b).reduce_barrett(modulus, mu))
    }

    /// Square-and-multiply, reducing after every product.
    pub fn mod_exp(&self, exponent: &Self, modulus: &Self) -> MathResult<Self> {
        let mu = modulus.compute_mu()?;
        self.mod_exp_barrett(exponent, modulus, &mu)
    }

    pub fn mod_exp_barrett(&self, exponent: &Self, modulus: &Self, mu: &Self) -> MathResult<Self> {
        exponent.ensure_initialized()?;
        let mut base = self.mod_barrett(modulus, mu)?;
        let mut result = Self::one().reduce_barrett(modulus, mu);
        for bit in 0..exponent.msb() {
            if exponent.bit(bit) {
                result = result.mul_unchecked(&base).reduce_barrett(modulus, mu);
            }
            if bit + 1 < exponent.msb() {
                base = base.mul_unchecked(&base).reduce_barrett(modulus, mu);
            }
        }
        Ok(result)
    }

    /// Inverse of `self` modulo `modulus`.
    ///
    /// The forward pass records the Euclidean quotients until a remainder of
    /// one appears; the backward pass folds them into the Bezout coefficient,
    /// whose sign follows the parity of the quotient count.
    pub fn mod_inverse(&self, modulus: &Self) -> MathResult<Self> {
        let value = self.modulo(modulus)?;
        if value.is_zero() {
            return Err(MathError::no_inverse(self, modulus));
        }
        if value.is_one() {
            return Ok(value);
        }

        let mut first = modulus.clone();
        let mut second = value;
        let (quotient, mut remainder) = first.div_rem_unchecked(&second);
        let mut quotients = vec![quotient];
        while !remainder.is_one() {
            if remainder.is_zero() {
                return Err(MathError::no_inverse(self, modulus));
            }
            first = second;
            second = remainder;
            let (quotient, next) = first.div_rem_unchecked(&second);
            quotients.push(quotient);
            remainder = next;
        }

        let mut first = Self::zero();
        let mut second = Self::one();
        for quotient in quotients.iter().rev() {
            let coefficient = quotient.mul_unchecked(&second).add_unchecked(&first);
            first = second;
            second = coefficient;
        }

        if quotients.len() % 2 == 1 {
            Ok(modulus.sub_saturating(&second))
        } else {
            Ok(second)
        }
    }
}
