//! Arbitrary-precision unsigned integers.
//!
//! [`BigInteger`] stores normalized little-endian `u64` limbs together with a
//! cached bit length. Every public operation first checks that its operands
//! are initialized and fails with [`MathError::UninitializedOperand`]
//! otherwise.

mod arith;
mod modular;

use crate::math::{
    errors::{MathError, MathResult},
    native::Word,
};
use std::{cmp::Ordering, fmt, str::FromStr};

const LIMB_BITS: u32 = u64::BITS;
const DECIMAL_CHUNK: u64 = 10_000_000_000_000_000_000; // 10^19
const DECIMAL_CHUNK_DIGITS: usize = 19;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegerState {
    Initialized,
    Uninitialized,
}

/// Unsigned multi-precision integer.
///
/// # Invariants
/// - `limbs` is never empty and has no zero limb above the most significant
///   non-zero one; zero is exactly `[0]`.
/// - `msb` is the bit length of the value (`0` for zero).
#[derive(Debug, Clone, Hash)]
pub struct BigInteger {
    limbs: Vec<u64>,
    msb: u32,
    state: IntegerState,
}

// ─── Constructors ─────────────────────────────────────────────────────────────

impl BigInteger {
    pub fn zero() -> Self {
        Self::from_u64(0)
    }

    pub fn one() -> Self {
        Self::from_u64(1)
    }

    /// A value that has never been assigned; arithmetic on it fails.
    pub fn uninitialized() -> Self {
        Self {
            limbs: vec![0],
            msb: 0,
            state: IntegerState::Uninitialized,
        }
    }

    pub fn from_u64(value: u64) -> Self {
        Self::from_limbs(vec![value])
    }

    pub fn from_u128(value: u128) -> Self {
        Self::from_limbs(vec![value as u64, (value >> 64) as u64])
    }

    pub fn from_word<I: Word>(value: I) -> Self {
        Self::from_u128(value.as_u128())
    }

    /// Builds a value from little-endian limbs, normalizing leading zeros.
    pub fn from_limbs(mut limbs: Vec<u64>) -> Self {
        while limbs.len() > 1 && limbs.last() == Some(&0) {
            limbs.pop();
        }
        if limbs.is_empty() {
            limbs.push(0);
        }
        let top = limbs[limbs.len() - 1];
        let msb = (limbs.len() as u32 - 1) * LIMB_BITS + (LIMB_BITS - top.leading_zeros());
        Self {
            limbs,
            msb,
            state: IntegerState::Initialized,
        }
    }

    /// `2^exponent`.
    pub fn power_of_two(exponent: u32) -> Self {
        let mut limbs = vec![0u64; (exponent / LIMB_BITS) as usize + 1];
        limbs[(exponent / LIMB_BITS) as usize] = 1u64 << (exponent % LIMB_BITS);
        Self::from_limbs(limbs)
    }
}

impl Default for BigInteger {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<u32> for BigInteger {
    fn from(value: u32) -> Self {
        Self::from_u64(value as u64)
    }
}

impl From<u64> for BigInteger {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl From<u128> for BigInteger {
    fn from(value: u128) -> Self {
        Self::from_u128(value)
    }
}

// ─── Accessors & conversions ─────────────────────────────────────────────────

impl BigInteger {
    pub fn limbs(&self) -> &[u64] {
        &self.limbs
    }

    /// Bit length of the value; `0` for zero.
    pub fn msb(&self) -> u32 {
        self.msb
    }

    pub fn state(&self) -> IntegerState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == IntegerState::Initialized
    }

    pub fn is_zero(&self) -> bool {
        self.msb == 0
    }

    pub fn is_one(&self) -> bool {
        self.limbs.len() == 1 && self.limbs[0] == 1
    }

    pub(crate) fn ensure_initialized(&self) -> MathResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(MathError::UninitializedOperand)
        }
    }

    pub fn to_u64(&self) -> MathResult<u64> {
        self.ensure_initialized()?;
        if self.limbs.len() > 1 {
            return Err(MathError::Overflow {
                operation: "to_u64",
            });
        }
        Ok(self.limbs[0])
    }

    pub fn to_u128(&self) -> MathResult<u128> {
        self.ensure_initialized()?;
        match self.limbs.as_slice() {
            [lo] => Ok(*lo as u128),
            [lo, hi] => Ok(((*hi as u128) << 64) | *lo as u128),
            _ => Err(MathError::Overflow {
                operation: "to_u128",
            }),
        }
    }

    /// Converts to a machine word, failing if the value does not fit.
    pub fn to_word<I: Word>(&self) -> MathResult<I> {
        I::try_from_u128(self.to_u128()?).ok_or(MathError::Overflow {
            operation: "to_word",
        })
    }

    /// Nearest `f64`; rounding is that of repeated `acc * 2^64 + limb`.
    pub fn to_f64(&self) -> f64 {
        let base = 2f64.powi(LIMB_BITS as i32);
        self.limbs
            .iter()
            .rev()
            .fold(0.0, |acc, &limb| acc * base + limb as f64)
    }

    /// Bit `index` counted from 1 at the least significant end.
    pub fn get_bit_at_index(&self, index: u32) -> MathResult<u8> {
        self.ensure_initialized()?;
        if index == 0 {
            return Err(MathError::IndexError {
                index: 0,
                bound: self.msb as usize,
            });
        }
        Ok(self.bit(index - 1) as u8)
    }

    #[inline]
    pub(crate) fn bit(&self, zero_based: u32) -> bool {
        let limb = (zero_based / LIMB_BITS) as usize;
        limb < self.limbs.len() && (self.limbs[limb] >> (zero_based % LIMB_BITS)) & 1 == 1
    }
}

// ─── Shifts ───────────────────────────────────────────────────────────────────

impl BigInteger {
    pub fn shl_bits(&self, bits: u32) -> MathResult<Self> {
        self.ensure_initialized()?;
        Ok(self.shifted_left(bits))
    }

    pub fn shr_bits(&self, bits: u32) -> MathResult<Self> {
        self.ensure_initialized()?;
        Ok(self.shifted_right(bits))
    }

    /// Whole-limb move followed by a sub-limb shift carrying bits upward.
    pub(crate) fn shifted_left(&self, bits: u32) -> Self {
        if self.is_zero() {
            return Self::zero();
        }
        let whole = (bits / LIMB_BITS) as usize;
        let partial = bits % LIMB_BITS;
        let mut limbs = vec![0u64; whole + self.limbs.len() + 1];
        if partial == 0 {
            limbs[whole..whole + self.limbs.len()].copy_from_slice(&self.limbs);
        } else {
            let mut carry = 0u64;
            for (index, &limb) in self.limbs.iter().enumerate() {
                limbs[whole + index] = (limb << partial) | carry;
                carry = limb >> (LIMB_BITS - partial);
            }
            limbs[whole + self.limbs.len()] = carry;
        }
        Self::from_limbs(limbs)
    }

    pub(crate) fn shifted_right(&self, bits: u32) -> Self {
        let whole = (bits / LIMB_BITS) as usize;
        if whole >= self.limbs.len() {
            return Self::zero();
        }
        let partial = bits % LIMB_BITS;
        let source = &self.limbs[whole..];
        let limbs = if partial == 0 {
            source.to_vec()
        } else {
            source
                .iter()
                .enumerate()
                .map(|(index, &limb)| {
                    let upper = source.get(index + 1).map_or(0, |&next| next << (LIMB_BITS - partial));
                    (limb >> partial) | upper
                })
                .collect()
        };
        Self::from_limbs(limbs)
    }
}

// ─── Comparison ───────────────────────────────────────────────────────────────

impl BigInteger {
    /// Three-way comparison; bit length first, then limbs from the top.
    pub fn compare(&self, other: &Self) -> MathResult<Ordering> {
        self.ensure_initialized()?;
        other.ensure_initialized()?;
        Ok(self.cmp_value(other))
    }

    fn cmp_value(&self, other: &Self) -> Ordering {
        self.msb.cmp(&other.msb).then_with(|| {
            self.limbs
                .iter()
                .rev()
                .cmp(other.limbs.iter().rev())
        })
    }
}

impl PartialEq for BigInteger {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state && self.limbs == other.limbs
    }
}

impl Eq for BigInteger {}

impl PartialOrd for BigInteger {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BigInteger {
    fn cmp(&self, other: &Self) -> Ordering {
        // Uninitialized values sort after every initialized one.
        let state_rank = |state: IntegerState| (state == IntegerState::Uninitialized) as u8;
        state_rank(self.state)
            .cmp(&state_rank(other.state))
            .then_with(|| self.cmp_value(other))
    }
}

// ─── Decimal text ─────────────────────────────────────────────────────────────

impl FromStr for BigInteger {
    type Err = MathError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let digits = input.trim();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MathError::ParseError {
                input: input.to_string(),
            });
        }

        let mut limbs = vec![0u64];
        let head = digits.len() % DECIMAL_CHUNK_DIGITS;
        let mut chunks = Vec::new();
        if head > 0 {
            chunks.push(&digits[..head]);
        }
        chunks.extend(
            digits.as_bytes()[head..]
                .chunks(DECIMAL_CHUNK_DIGITS)
                .filter_map(|chunk| std::str::from_utf8(chunk).ok()),
        );

        for chunk in chunks {
            let value: u64 = chunk.parse().map_err(|_| MathError::ParseError {
                input: input.to_string(),
            })?;
            let scale = 10u64.pow(chunk.len() as u32);
            arith::mul_add_small(&mut limbs, scale, value);
        }
        Ok(Self::from_limbs(limbs))
    }
}

impl fmt::Display for BigInteger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_initialized() {
            return write!(f, "<uninitialized>");
        }
        let mut chunks = Vec::new();
        let mut limbs = self.limbs.clone();
        loop {
            let remainder = arith::div_rem_small_in_place(&mut limbs, DECIMAL_CHUNK);
            while limbs.len() > 1 && limbs.last() == Some(&0) {
                limbs.pop();
            }
            chunks.push(remainder);
            if limbs == [0] {
                break;
            }
        }
        let mut text = String::new();
        for (index, chunk) in chunks.iter().rev().enumerate() {
            if index == 0 {
                text.push_str(&chunk.to_string());
            } else {
                text.push_str(&format!("{chunk:0width$}", width = DECIMAL_CHUNK_DIGITS));
            }
        }
        f.pad_integral(true, "", &text)
    }
}

// ─── crypto-bigint interop ────────────────────────────────────────────────────

#[cfg(target_pointer_width = "64")]
impl BigInteger {
    /// Converts into a fixed-width `crypto_bigint::Uint`, failing if the value
    /// needs more than `LIMBS` limbs.
    pub fn to_uint<const LIMBS: usize>(&self) -> MathResult<crypto_bigint::Uint<LIMBS>> {
        self.ensure_initialized()?;
        if self.limbs.len() > LIMBS {
            return Err(MathError::Overflow {
                operation: "to_uint",
            });
        }
        let mut words = [0u64; LIMBS];
        words[..self.limbs.len()].copy_from_slice(&self.limbs);
        Ok(crypto_bigint::Uint::<LIMBS>::from_words(words))
    }

    pub fn from_uint<const LIMBS: usize>(value: &crypto_bigint::Uint<LIMBS>) -> Self {
        Self::from_limbs(value.as_words().to_vec())
    }
}
