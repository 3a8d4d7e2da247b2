//! CRT interpolation between towers and multi-precision coefficients.

use crate::math::{BigInteger, ModularArithmetic};
use rayon::prelude::*;
use std::{borrow::Cow, sync::Arc};

use super::{BigPolynomial, RnsPolynomial};
use crate::rings::{
    Format,
    errors::{RingError, RingResult},
    params::{ElementParams, RnsBasis},
    poly::ResiduePolynomial,
};

impl<I: ModularArithmetic> RnsPolynomial<I> {
    /// Reconstructs every coefficient in `[0, Q)`.
    ///
    /// `c[r] = sum_i [v_i[r] * (Q/q_i)^{-1}]_{q_i} * (Q/q_i) mod Q`, reduced
    /// with the Barrett constant of `Q`. Evaluation-format inputs are
    /// transformed on a copy first.
    pub fn crt_interpolate(&self) -> RingResult<BigPolynomial> {
        let view = self.coefficient_view()?;
        let coefficients = (0..self.ring_dimension())
            .into_par_iter()
            .map(|ri| interpolate_at(&view.basis, &view.towers, ri))
            .collect();
        Ok(BigPolynomial::new_unchecked(
            self.basis.modulus().clone(),
            coefficients,
        ))
    }

    /// CRT of the single coefficient `index`.
    pub fn coefficient_at(&self, index: usize) -> RingResult<BigInteger> {
        let n = self.ring_dimension();
        if index >= n {
            return Err(RingError::IndexError { index, bound: n });
        }
        let view = self.coefficient_view()?;
        Ok(interpolate_at(&view.basis, &view.towers, index))
    }

    /// Infinity norm of the centered interpolated coefficients.
    pub fn norm(&self) -> RingResult<f64> {
        Ok(self.crt_interpolate()?.norm())
    }

    /// Interpolates, then moves every coefficient to modulus `t` with the
    /// signed-residue switch. The result is a coefficient-format polynomial
    /// without an NTT table.
    pub fn decryption_crt_interpolate(&self, t: I) -> RingResult<ResiduePolynomial<I>> {
        let params = Arc::new(ElementParams::new(self.basis.cyclotomic_order(), t, I::ZERO)?);
        let big_t = BigInteger::from_word(t);
        let big = self.crt_interpolate()?;
        let values = (0..big.ring_dimension())
            .into_par_iter()
            .map(|ri| -> RingResult<I> {
                let (magnitude, negative) = big.centered_magnitude(ri)?;
                let reduced: I = magnitude.modulo(&big_t)?.to_word()?;
                Ok(if negative { reduced.mod_neg(t) } else { reduced })
            })
            .collect::<RingResult<Vec<_>>>()?;
        Ok(ResiduePolynomial::new_unchecked(
            params,
            values,
            Format::Coefficient,
        ))
    }

    /// Decomposes multi-precision coefficients into the towers of `basis`.
    pub fn from_big_coefficients(
        basis: Arc<RnsBasis<I>>,
        big: &BigPolynomial,
        format: Format,
    ) -> RingResult<Self> {
        let n = basis.ring_dimension();
        if big.ring_dimension() != n {
            return Err(RingError::DimensionMismatch {
                expected: n,
                actual: big.ring_dimension(),
            });
        }
        let towers = basis
            .towers()
            .par_iter()
            .map(|params| {
                let q = params.big_modulus();
                let values = big
                    .coefficients()
                    .iter()
                    .map(|c| -> RingResult<I> { Ok(c.modulo(&q)?.to_word()?) })
                    .collect::<RingResult<Vec<I>>>()?;
                ResiduePolynomial::new_unchecked(Arc::clone(params), values, Format::Coefficient)
                    .into_format(format)
            })
            .collect::<RingResult<Vec<_>>>()?;
        Ok(Self::from_parts_unchecked(basis, towers, format))
    }

    pub(crate) fn coefficient_view(&self) -> RingResult<Cow<'_, Self>> {
        match self.format {
            Format::Coefficient => Ok(Cow::Borrowed(self)),
            Format::Evaluation => Ok(Cow::Owned(
                self.clone().into_format(Format::Coefficient)?,
            )),
        }
    }
}

fn interpolate_at<I: ModularArithmetic>(
    basis: &RnsBasis<I>,
    towers: &[ResiduePolynomial<I>],
    ri: usize,
) -> BigInteger {
    let sum = towers
        .iter()
        .zip(basis.q_hat_inv_mod_q())
        .zip(basis.q_hat())
        .fold(BigInteger::zero(), |acc, ((tower, &inv), q_hat)| {
            let y = tower.values()[ri].mod_mul(inv, tower.modulus());
            acc.add_unchecked(&q_hat.mul_unchecked(&BigInteger::from_word(y)))
        });
    sum.reduce_barrett(basis.modulus(), basis.modulus_mu())
}
