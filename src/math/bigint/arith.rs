use super::{BigInteger, LIMB_BITS};
use crate::math::errors::{MathError, MathResult};
use std::cmp::Ordering;

// ─── Checked arithmetic ──────────────────────────────────────────────────────

impl BigInteger {
    pub fn plus(&self, rhs: &Self) -> MathResult<Self> {
        self.ensure_initialized()?;
        rhs.ensure_initialized()?;
        Ok(self.add_unchecked(rhs))
    }

    /// `self - rhs`, or zero when `rhs > self`.
    pub fn minus(&self, rhs: &Self) -> MathResult<Self> {
        self.ensure_initialized()?;
        rhs.ensure_initialized()?;
        Ok(self.sub_saturating(rhs))
    }

    pub fn times(&self, rhs: &Self) -> MathResult<Self> {
        self.ensure_initialized()?;
        rhs.ensure_initialized()?;
        Ok(self.mul_unchecked(rhs))
    }

    /// Quotient and remainder by long division.
    pub fn div_mod(&self, divisor: &Self) -> MathResult<(Self, Self)> {
        self.ensure_initialized()?;
        divisor.ensure_initialized()?;
        if divisor.is_zero() {
            return Err(MathError::DivideByZero);
        }
        Ok(self.div_rem_unchecked(divisor))
    }

    pub fn divided_by(&self, divisor: &Self) -> MathResult<Self> {
        Ok(self.div_mod(divisor)?.0)
    }

    /// `self mod modulus` through [`BigInteger::div_mod`].
    pub fn modulo(&self, modulus: &Self) -> MathResult<Self> {
        Ok(self.div_mod(modulus)?.1)
    }

    /// `self / q` rounded: one is added when the remainder exceeds
    /// `floor(q / 2)`.
    pub fn divide_and_round(&self, q: &Self) -> MathResult<Self> {
        let (quotient, remainder) = self.div_mod(q)?;
        let half = q.shifted_right(1);
        if remainder.cmp_value(&half) == Ordering::Greater {
            Ok(quotient.add_unchecked(&Self::one()))
        } else {
            Ok(quotient)
        }
    }
}

// ─── Unchecked kernels ───────────────────────────────────────────────────────

impl BigInteger {
    pub(crate) fn add_unchecked(&self, rhs: &Self) -> Self {
        let (long, short) = if self.limbs.len() >= rhs.limbs.len() {
            (&self.limbs, &rhs.limbs)
        } else {
            (&rhs.limbs, &self.limbs)
        };
        let mut limbs = Vec::with_capacity(long.len() + 1);
        let mut carry = false;
        for (index, &limb) in long.iter().enumerate() {
            let other = short.get(index).copied().unwrap_or(0);
            let (sum, c1) = limb.overflowing_add(other);
            let (sum, c2) = sum.overflowing_add(carry as u64);
            limbs.push(sum);
            carry = c1 || c2;
        }
        if carry {
            limbs.push(1);
        }
        Self::from_limbs(limbs)
    }

    pub(crate) fn sub_saturating(&self, rhs: &Self) -> Self {
        if self.cmp_value(rhs) != Ordering::Greater {
            return Self::zero();
        }
        let mut limbs = self.limbs.clone();
        sub_in_place(&mut limbs, &rhs.limbs);
        Self::from_limbs(limbs)
    }

    /// Schoolbook `O(n·m)` product.
    pub(crate) fn mul_unchecked(&self, rhs: &Self) -> Self {
        if self.is_zero() || rhs.is_zero() {
            return Self::zero();
        }
        let mut limbs = vec![0u64; self.limbs.len() + rhs.limbs.len()];
        for (i, &a) in self.limbs.iter().enumerate() {
            let mut carry = 0u128;
            for (j, &b) in rhs.limbs.iter().enumerate() {
                let t = a as u128 * b as u128 + limbs[i + j] as u128 + carry;
                limbs[i + j] = t as u64;
                carry = t >> LIMB_BITS;
            }
            limbs[i + rhs.limbs.len()] = carry as u64;
        }
        Self::from_limbs(limbs)
    }

    pub(crate) fn div_rem_unchecked(&self, divisor: &Self) -> (Self, Self) {
        if self.cmp_value(divisor) == Ordering::Less {
            return (Self::zero(), self.clone());
        }
        if divisor.limbs.len() == 1 {
            let mut quotient = self.limbs.clone();
            let remainder = div_rem_small_in_place(&mut quotient, divisor.limbs[0]);
            return (Self::from_limbs(quotient), Self::from_u64(remainder));
        }
        let (quotient, remainder) = knuth_divide(&self.limbs, &divisor.limbs);
        (Self::from_limbs(quotient), Self::from_limbs(remainder))
    }
}

// ─── Limb helpers ─────────────────────────────────────────────────────────────

/// `limbs -= rhs`, requiring `limbs >= rhs`.
fn sub_in_place(limbs: &mut [u64], rhs: &[u64]) {
    let mut borrow = false;
    for (index, limb) in limbs.iter_mut().enumerate() {
        let other = rhs.get(index).copied().unwrap_or(0);
        if other == 0 && !borrow && index >= rhs.len() {
            break;
        }
        let (diff, b1) = limb.overflowing_sub(other);
        let (diff, b2) = diff.overflowing_sub(borrow as u64);
        *limb = diff;
        borrow = b1 || b2;
    }
}

/// `limbs = limbs * factor + addend`, growing by one limb on carry.
pub(super) fn mul_add_small(limbs: &mut Vec<u64>, factor: u64, addend: u64) {
    let mut carry = addend as u128;
    for limb in limbs.iter_mut() {
        let t = *limb as u128 * factor as u128 + carry;
        *limb = t as u64;
        carry = t >> LIMB_BITS;
    }
    if carry != 0 {
        limbs.push(carry as u64);
    }
}

/// Divides `limbs` in place by a non-zero single limb and returns the remainder.
pub(super) fn div_rem_small_in_place(limbs: &mut [u64], divisor: u64) -> u64 {
    let divisor = divisor as u128;
    let mut remainder = 0u128;
    for limb in limbs.iter_mut().rev() {
        let current = (remainder << LIMB_BITS) | *limb as u128;
        *limb = (current / divisor) as u64;
        remainder = current % divisor;
    }
    remainder as u64
}

/// Knuth Algorithm D for a divisor of at least two limbs.
///
/// Normalizes so the top divisor limb has its high bit set, estimates each
/// quotient limb from the top two remainder limbs, corrects the estimate
/// with the second divisor limb, and adds back at most once.
fn knuth_divide(dividend: &[u64], divisor: &[u64]) -> (Vec<u64>, Vec<u64>) {
    let n = divisor.len();
    let m = dividend.len() - n;
    let shift = divisor[n - 1].leading_zeros();

    let v = shift_limbs_left(divisor, shift, n);
    let mut u = shift_limbs_left(dividend, shift, dividend.len() + 1);
    let mut quotient = vec![0u64; m + 1];

    let v_top = v[n - 1] as u128;
    let v_next = v[n - 2] as u128;
    let base = 1u128 << LIMB_BITS;

    for j in (0..=m).rev() {
        let numerator = ((u[j + n] as u128) << LIMB_BITS) | u[j + n - 1] as u128;
        let mut qhat = numerator / v_top;
        let mut rhat = numerator % v_top;
        while qhat >= base || qhat * v_next > ((rhat << LIMB_BITS) | u[j + n - 2] as u128) {
            qhat -= 1;
            rhat += v_top;
            if rhat >= base {
                break;
            }
        }

        let mut borrow = 0u64;
        let mut carry = 0u128;
        for i in 0..n {
            let product = qhat * v[i] as u128 + carry;
            carry = product >> LIMB_BITS;
            let (diff, b1) = u[i + j].overflowing_sub(product as u64);
            let (diff, b2) = diff.overflowing_sub(borrow);
            u[i + j] = diff;
            borrow = (b1 || b2) as u64;
        }
        let (top, b1) = u[j + n].overflowing_sub(carry as u64);
        let (top, b2) = top.overflowing_sub(borrow);
        u[j + n] = top;

        let mut digit = qhat as u64;
        if b1 || b2 {
            digit = digit.wrapping_sub(1);
            let mut carry = 0u128;
            for i in 0..n {
                let sum = u[i + j] as u128 + v[i] as u128 + carry;
                u[i + j] = sum as u64;
                carry = sum >> LIMB_BITS;
            }
            u[j + n] = u[j + n].wrapping_add(carry as u64);
        }
        quotient[j] = digit;
    }

    let remainder = if shift == 0 {
        u[..n].to_vec()
    } else {
        (0..n)
            .map(|i| (u[i] >> shift) | (u[i + 1] << (LIMB_BITS - shift)))
            .collect()
    };
    (quotient, remainder)
}

fn shift_limbs_left(limbs: &[u64], shift: u32, len: usize) -> Vec<u64> {
    let mut out = vec![0u64; len];
    if shift == 0 {
        out[..limbs.len()].copy_from_slice(limbs);
        return out;
    }
    let mut carry = 0u64;
    for (index, &limb) in limbs.iter().enumerate() {
        out[index] = (limb << shift) | carry;
        carry = limb >> (LIMB_BITS - shift);
    }
    if limbs.len() < len {
        out[limbs.len()] = carry;
    }
    out
}
