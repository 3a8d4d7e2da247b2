//! RNS basis conversions: switching, extension, scaling and rescaling of
//! [`RnsPolynomial`](crate::rings::RnsPolynomial)s between bases.
//!
//! Every operation takes a precomputed table bundle from [`tables`]. A
//! bundle is built once per basis pair and shared read-only between calls.

pub mod behz;
pub mod rescale;
pub mod scale;
pub mod switch;
pub mod tables;

pub use behz::{fast_base_conv_q_to_bsk_montgomery, fast_base_conv_sk, fast_rns_floor_q};
pub use rescale::{drop_last_element_and_scale, mod_reduce};
pub use scale::{
    approx_scale_and_round, scale_and_round, scale_and_round_basis, scale_and_round_gamma,
};
pub use switch::{
    approx_mod_down, approx_mod_up, approx_switch_crt_basis, expand_crt_basis,
    expand_crt_basis_reverse_order, switch_crt_basis,
};
pub use tables::{
    BasisScaleTables, BehzTables, ExpandTables, GammaScaleTables, ModDownTables,
    ModReduceTables, RescaleTables, ScaleTables, ScaleTarget, SwitchTables,
};

use crate::math::{DoubleWidth, ModularArithmetic};
use crate::rings::{Format, RingError, RingResult, RnsPolynomial};

/// A multiplicand fixed for many products, stored with its Shoup constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShoupConstant<I> {
    value: I,
    precon: I,
}

impl<I: ModularArithmetic> ShoupConstant<I> {
    /// `value` must already be reduced modulo `modulus`.
    pub fn new(value: I, modulus: I) -> Self {
        debug_assert!(value < modulus);
        Self {
            value,
            precon: value.prep_mod_mul_const(modulus),
        }
    }

    pub fn value(&self) -> I {
        self.value
    }

    pub fn precon(&self) -> I {
        self.precon
    }

    /// `x * value mod modulus` for any word `x`.
    #[inline]
    pub fn mul(&self, x: I, modulus: I) -> I {
        x.mod_mul_fast_const(self.value, modulus, self.precon)
    }
}

/// Number of `a * b` products (with `a < 2^a_bits`, `b < 2^b_bits`) that a
/// double-width accumulator can absorb before it must be reduced.
pub(crate) fn lazy_terms<I: ModularArithmetic>(a_bits: u32, b_bits: u32) -> usize {
    let headroom = (2 * I::BITS).saturating_sub(a_bits + b_bits);
    if headroom >= usize::BITS {
        usize::MAX
    } else {
        (1usize << headroom).saturating_sub(1).max(2)
    }
}

/// `sum a_k * b_k mod modulus` through a double-width accumulator reduced
/// with the wide Barrett constant every `lazy` terms.
#[inline]
pub(crate) fn dot_mod<I: ModularArithmetic>(
    terms: impl Iterator<Item = (I, I)>,
    modulus: I,
    mu: I::Double,
    lazy: usize,
) -> I {
    let mut acc = I::Double::ZERO;
    let mut pending = 0usize;
    for (a, b) in terms {
        if pending == lazy {
            acc = I::Double::from_word(I::reduce_wide(acc, modulus, mu));
            pending = 1;
        }
        acc = acc.wrapping_add(I::Double::mul_words(a, b));
        pending += 1;
    }
    I::reduce_wide(acc, modulus, mu)
}

pub(crate) fn require_coefficient<I: ModularArithmetic>(x: &RnsPolynomial<I>) -> RingResult<()> {
    if x.format() != Format::Coefficient {
        return Err(RingError::format_mismatch(Format::Coefficient, x.format()));
    }
    Ok(())
}

pub(crate) fn require_towers<I: ModularArithmetic>(
    x: &RnsPolynomial<I>,
    expected: usize,
) -> RingResult<()> {
    if x.tower_count() != expected {
        return Err(RingError::TowerCountMismatch {
            expected,
            actual: x.tower_count(),
        });
    }
    Ok(())
}
