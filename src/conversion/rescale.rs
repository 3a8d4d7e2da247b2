//! Division by the last tower's modulus: CKKS rescaling and BGV modulus
//! reduction. Both work in place and keep the input's format.

use crate::math::ModularArithmetic;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::instrument;

use super::switch::scale_tower;
use super::tables::{ModReduceTables, RescaleTables};
use crate::rings::poly::switch_centered;
use crate::rings::{Format, RingResult, RnsPolynomial, ResiduePolynomial};

/// `x <- round(x / q_l)` where `q_l` is the modulus of the last tower,
/// which is dropped.
///
/// The last tower is read as the centered residue `r` and every other tower
/// becomes `(x_i - r) * q_l^{-1} mod q_i`.
#[instrument(level = "debug", skip_all, fields(towers = x.tower_count(), n = x.ring_dimension()))]
pub fn drop_last_element_and_scale<I: ModularArithmetic>(
    x: &mut RnsPolynomial<I>,
    tables: &RescaleTables<I>,
) -> RingResult<()> {
    let level = tables.level(x.tower_count())?;
    debug_assert_eq!(
        x.moduli()[..level.basis.tower_count()],
        level.basis.moduli()[..]
    );
    let format = x.format();
    let l = x.tower_count() - 1;
    let last = x.towers()[l].clone().into_format(Format::Coefficient)?;
    let ql = last.modulus();

    x.towers_mut()[..l]
        .par_iter_mut()
        .enumerate()
        .try_for_each(|(i, tower)| -> RingResult<()> {
            let qi = tower.modulus();
            let neg_inv = &level.neg_ql_inv_mod_q[i];
            let values = last
                .values()
                .iter()
                .map(|&v| neg_inv.mul(switch_centered(v, ql, qi), qi))
                .collect();
            let params = Arc::clone(tower.params());
            let correction = ResiduePolynomial::new_unchecked(params, values, Format::Coefficient)
                .into_format(format)?;
            scale_tower(tower, &level.ql_inv_mod_q[i]);
            tower.add_assign_checked(&correction)
        })?;
    x.truncate_to(Arc::clone(&level.basis));
    Ok(())
}

/// BGV modulus reduction: drops the last tower while keeping the plaintext
/// `X mod t` scaled by `q_l^{-1}`.
///
/// With `delta = [-x_l * t^{-1}]_{q_l}` read centered, every other tower
/// becomes `(x_i + t * delta) * q_l^{-1} mod q_i`; `x + t * delta` is
/// divisible by `q_l` and unchanged modulo `t`.
#[instrument(level = "debug", skip_all, fields(towers = x.tower_count(), n = x.ring_dimension()))]
pub fn mod_reduce<I: ModularArithmetic>(
    x: &mut RnsPolynomial<I>,
    tables: &ModReduceTables<I>,
) -> RingResult<()> {
    let level = tables.level(x.tower_count())?;
    let format = x.format();
    let l = x.tower_count() - 1;
    let mut delta = x.towers()[l].clone().into_format(Format::Coefficient)?;
    scale_tower(&mut delta, &tables.neg_t_inv_mod_q[l]);
    let ql = delta.modulus();

    x.towers_mut()[..l]
        .par_iter_mut()
        .enumerate()
        .try_for_each(|(i, tower)| -> RingResult<()> {
            let qi = tower.modulus();
            let t_mod_qi = &tables.t_mod_q[i];
            let values = delta
                .values()
                .iter()
                .map(|&v| t_mod_qi.mul(switch_centered(v, ql, qi), qi))
                .collect();
            let params = Arc::clone(tower.params());
            let correction = ResiduePolynomial::new_unchecked(params, values, Format::Coefficient)
                .into_format(format)?;
            tower.add_assign_checked(&correction)?;
            scale_tower(tower, &level.ql_inv_mod_q[i]);
            Ok(())
        })?;
    x.truncate_to(Arc::clone(&level.basis));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::tests::{big_poly, random_below};
    use crate::math::BigInteger;
    use crate::rings::{RingError, RnsBasis, RnsBasisBuilder};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn q_basis() -> Arc<RnsBasis<u64>> {
        RnsBasisBuilder::new(8)
            .with_prime_bits(30)
            .with_prime_count(3)
            .build::<u64>()
            .unwrap()
    }

    fn input(
        q: &Arc<RnsBasis<u64>>,
        format: Format,
        seed: u64,
    ) -> (RnsPolynomial<u64>, Vec<BigInteger>) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let bound = q.modulus().shifted_right(1);
        let coefficients: Vec<_> = (0..8).map(|_| random_below(&bound, &mut rng)).collect();
        let poly = RnsPolynomial::from_big_coefficients(
            Arc::clone(q),
            &big_poly(q, &coefficients),
            format,
        )
        .unwrap();
        (poly, coefficients)
    }

    /// `|Y * q_l - X|` per coefficient.
    fn residuals(
        coefficients: &[BigInteger],
        y: &RnsPolynomial<u64>,
        ql: u64,
    ) -> Vec<BigInteger> {
        let ql = BigInteger::from_u64(ql);
        y.crt_interpolate()
            .unwrap()
            .coefficients()
            .iter()
            .zip(coefficients)
            .map(|(y, x)| {
                let scaled = y.times(&ql).unwrap();
                if scaled >= *x {
                    scaled.minus(x).unwrap()
                } else {
                    x.minus(&scaled).unwrap()
                }
            })
            .collect()
    }

    // ── Rescale ───────────────────────────────────────────────────────────────

    #[test]
    fn rescale_rounds_division_by_the_last_modulus() {
        let q = q_basis();
        let ql = q.moduli()[2];
        let tables = RescaleTables::new(Arc::clone(&q)).unwrap();
        let (mut x, coefficients) = input(&q, Format::Coefficient, 51);

        drop_last_element_and_scale(&mut x, &tables).unwrap();
        assert_eq!(x.tower_count(), 2);
        assert_eq!(x.moduli(), q.moduli()[..2].to_vec());
        let half = BigInteger::from_u64(ql / 2);
        for r in residuals(&coefficients, &x, ql) {
            assert!(r <= half);
        }
    }

    #[test]
    fn rescale_commutes_with_the_transform() {
        let q = q_basis();
        let tables = RescaleTables::new(Arc::clone(&q)).unwrap();
        let (mut coeff, _) = input(&q, Format::Coefficient, 52);
        let mut eval = coeff.clone().into_format(Format::Evaluation).unwrap();

        drop_last_element_and_scale(&mut coeff, &tables).unwrap();
        drop_last_element_and_scale(&mut eval, &tables).unwrap();
        assert_eq!(eval.format(), Format::Evaluation);
        assert_eq!(eval.into_format(Format::Coefficient).unwrap(), coeff);
    }

    #[test]
    fn rescale_twice_then_refuse() {
        let q = q_basis();
        let tables = RescaleTables::new(Arc::clone(&q)).unwrap();
        assert_eq!(tables.q().moduli(), q.moduli());
        let mut x = RnsPolynomial::from_signed_coefficients(
            Arc::clone(&q),
            &[0, 1, -1, 5, 0, 0, 0, 0],
            Format::Coefficient,
        )
        .unwrap();
        drop_last_element_and_scale(&mut x, &tables).unwrap();
        drop_last_element_and_scale(&mut x, &tables).unwrap();
        assert_eq!(x.tower_count(), 1);
        assert!(matches!(
            drop_last_element_and_scale(&mut x, &tables),
            Err(RingError::InsufficientTowers { .. })
        ));
    }

    // ── ModReduce ─────────────────────────────────────────────────────────────

    #[test]
    fn mod_reduce_preserves_the_plaintext_residue() {
        let q = q_basis();
        let ql = q.moduli()[2];
        let t = 65537u64;
        let tables = ModReduceTables::new(Arc::clone(&q), t).unwrap();
        let (mut x, coefficients) = input(&q, Format::Evaluation, 53);

        mod_reduce(&mut x, &tables).unwrap();
        assert_eq!(x.format(), Format::Evaluation);
        assert_eq!(x.tower_count(), 2);

        let big_t = BigInteger::from_u64(t);
        let bound = BigInteger::from_u64(ql).times(&big_t).unwrap().shifted_right(1);
        for r in residuals(&coefficients, &x, ql) {
            assert!(r.modulo(&big_t).unwrap().is_zero());
            assert!(r <= bound);
        }
    }

    #[test]
    fn mod_reduce_rejects_unknown_levels() {
        let q = q_basis();
        let tables = ModReduceTables::new(Arc::clone(&q), 17).unwrap();
        assert_eq!(tables.q().tower_count(), 3);
        let extra = RnsBasisBuilder::new(8)
            .with_prime_bits(28)
            .with_prime_count(1)
            .build::<u64>()
            .unwrap();
        let wider = Arc::new(q.concat(&extra).unwrap());
        let mut x = RnsPolynomial::zero(wider, Format::Coefficient);
        assert!(matches!(
            mod_reduce(&mut x, &tables),
            Err(RingError::TowerCountMismatch { .. })
        ));
    }
}
