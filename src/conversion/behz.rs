//! BEHZ conversions between `Q` and the auxiliary basis `Bsk = B ∪ {m_sk}`:
//! the Montgomery-corrected lift, the `floor(t * X / Q)` step and the
//! Shenoy-Kumaresan return to `Q`.

use crate::math::ModularArithmetic;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::instrument;

use super::tables::{BehzTables, MTILDE};
use super::{dot_mod, require_coefficient, require_towers};
use crate::rings::{Format, RingResult, RnsPolynomial, ResiduePolynomial};

/// Lifts `X` from `Q` to `Q ∪ Bsk`.
///
/// The `Q` residues are pre-multiplied by `m~ = 2^16`, switched
/// approximately into `Bsk ∪ {m~}` and the `alpha * Q` overflow is cancelled
/// with the centered Montgomery correction `r = -[c]_{m~} * Q^{-1} mod m~`.
/// The `Bsk` part then holds `X + k * Q` with `k` in `{-1, 0, 1}`.
///
/// Accepts either format; the `Q` towers are kept as given and the result
/// has the input's format.
#[instrument(level = "debug", skip_all, fields(
    q = tables.q.tower_count(),
    bsk = tables.bsk.tower_count(),
    n = x.ring_dimension(),
))]
pub fn fast_base_conv_q_to_bsk_montgomery<I: ModularArithmetic>(
    x: &RnsPolynomial<I>,
    tables: &BehzTables<I>,
) -> RingResult<RnsPolynomial<I>> {
    require_towers(x, tables.q.tower_count())?;
    let view = x.coefficient_view()?;
    let n = x.ring_dimension();
    let mask = MTILDE - 1;

    let scaled: Vec<Vec<I>> = view
        .towers()
        .par_iter()
        .zip(tables.mtilde_q_hat_inv_mod_q.par_iter())
        .map(|(tower, c)| {
            let q = tower.modulus();
            tower.values().iter().map(|&v| c.mul(v, q)).collect()
        })
        .collect();

    let corrections: Vec<u64> = (0..n)
        .into_par_iter()
        .map(|ri| {
            let c_mtilde = scaled
                .iter()
                .zip(&tables.q_hat_mod_mtilde)
                .fold(0u64, |acc, (y, &h)| {
                    acc.wrapping_add(y[ri].as_u64().wrapping_mul(h))
                })
                & mask;
            c_mtilde.wrapping_mul(tables.neg_q_inv_mod_mtilde) & mask
        })
        .collect();

    let bsk_towers = tables
        .bsk
        .towers()
        .par_iter()
        .enumerate()
        .map(|(j, params)| {
            let (b, mu) = (params.modulus(), params.wide_mu());
            let row = &tables.q_hat_mod_bsk[j];
            let mtilde = I::from_u64(MTILDE);
            let values = corrections
                .iter()
                .enumerate()
                .map(|(ri, &r)| {
                    let r = if r >= MTILDE >> 1 {
                        I::from_u64(r) + b - mtilde
                    } else {
                        I::from_u64(r)
                    };
                    let terms = scaled.iter().zip(row).map(|(y, &h)| (y[ri], h));
                    let conv = dot_mod(terms, b, mu, tables.lazy_to_bsk);
                    let lifted = tables.q_mod_bsk[j].mul(r, b).mod_add_fast(conv, b);
                    tables.mtilde_inv_mod_bsk[j].mul(lifted, b)
                })
                .collect();
            ResiduePolynomial::new_unchecked(Arc::clone(params), values, Format::Coefficient)
                .into_format(x.format())
        })
        .collect::<RingResult<Vec<_>>>()?;

    let towers = x.towers().iter().cloned().chain(bsk_towers).collect();
    Ok(RnsPolynomial::from_parts_unchecked(
        Arc::clone(&tables.q_bsk),
        towers,
        x.format(),
    ))
}

/// `(t * X - [t * X]_Q) / Q` over `Bsk` for `X` given over `Q ∪ Bsk`.
///
/// The result is `floor(t * X / Q) - e` with `0 <= e < |Q|`. Input must be
/// in coefficient format; the result is in coefficient format over `Bsk`.
#[instrument(level = "debug", skip_all, fields(
    q = tables.q.tower_count(),
    bsk = tables.bsk.tower_count(),
    n = x.ring_dimension(),
))]
pub fn fast_rns_floor_q<I: ModularArithmetic>(
    x: &RnsPolynomial<I>,
    tables: &BehzTables<I>,
) -> RingResult<RnsPolynomial<I>> {
    require_coefficient(x)?;
    require_towers(x, tables.q_bsk.tower_count())?;
    let (q_part, bsk_part) = x.towers().split_at(tables.q.tower_count());

    let scaled: Vec<Vec<I>> = q_part
        .par_iter()
        .zip(tables.t_q_hat_inv_mod_q.par_iter())
        .map(|(tower, c)| {
            let q = tower.modulus();
            tower.values().iter().map(|&v| c.mul(v, q)).collect()
        })
        .collect();

    let towers = tables
        .bsk
        .towers()
        .par_iter()
        .zip(bsk_part.par_iter())
        .enumerate()
        .map(|(j, (params, own))| {
            let (b, mu) = (params.modulus(), params.wide_mu());
            let row = &tables.q_inv_mod_bsk[j];
            let values = own
                .values()
                .iter()
                .enumerate()
                .map(|(ri, &v)| {
                    let terms = scaled.iter().zip(row).map(|(y, &inv)| (y[ri], inv));
                    let correction = dot_mod(terms, b, mu, tables.lazy_to_bsk);
                    tables.t_q_inv_mod_bsk[j]
                        .mul(v, b)
                        .mod_sub_fast(correction, b)
                })
                .collect();
            ResiduePolynomial::new_unchecked(Arc::clone(params), values, Format::Coefficient)
        })
        .collect();
    Ok(RnsPolynomial::from_parts_unchecked(
        Arc::clone(&tables.bsk),
        towers,
        Format::Coefficient,
    ))
}

/// Exact conversion `Bsk -> Q` of the centered value held in `B`.
///
/// The residue modulo `m_sk` recovers the overflow
/// `gamma = [(sum_i y_i * B/b_i - x_sk) * B^{-1}]_{m_sk}`, read centered, so
/// values in `(-B/2, B/2)` come out exactly. Input must be in coefficient
/// format; the result is in coefficient format over `Q`.
#[instrument(level = "debug", skip_all, fields(
    q = tables.q.tower_count(),
    bsk = tables.bsk.tower_count(),
    n = x.ring_dimension(),
))]
pub fn fast_base_conv_sk<I: ModularArithmetic>(
    x: &RnsPolynomial<I>,
    tables: &BehzTables<I>,
) -> RingResult<RnsPolynomial<I>> {
    require_coefficient(x)?;
    require_towers(x, tables.bsk.tower_count())?;
    let (b_part, msk_part) = x.towers().split_at(tables.b_size);
    let msk_tower = &msk_part[0];
    let msk = msk_tower.modulus();
    let msk_mu = msk_tower.params().wide_mu();

    let scaled: Vec<Vec<I>> = b_part
        .par_iter()
        .zip(tables.b_hat_inv_mod_b.par_iter())
        .map(|(tower, c)| {
            let b = tower.modulus();
            tower.values().iter().map(|&v| c.mul(v, b)).collect()
        })
        .collect();

    let gammas: Vec<I> = msk_tower
        .values()
        .par_iter()
        .enumerate()
        .map(|(ri, &x_sk)| {
            let terms = scaled
                .iter()
                .zip(&tables.b_hat_mod_msk)
                .map(|(y, &h)| (y[ri], h));
            let conv = dot_mod(terms, msk, msk_mu, tables.lazy_to_msk);
            tables.b_inv_mod_msk.mul(conv.mod_sub_fast(x_sk, msk), msk)
        })
        .collect();
    let half_msk = msk >> 1;

    let towers = tables
        .q
        .towers()
        .par_iter()
        .enumerate()
        .map(|(j, params)| {
            let (q, mu) = (params.modulus(), params.wide_mu());
            let row = &tables.b_hat_mod_q[j];
            let msk_mod_q = msk % q;
            let values = gammas
                .iter()
                .enumerate()
                .map(|(ri, &gamma)| {
                    let terms = scaled.iter().zip(row).map(|(y, &h)| (y[ri], h));
                    let conv = dot_mod(terms, q, mu, tables.lazy_to_q);
                    let gamma_q = if gamma > half_msk {
                        (gamma % q).mod_sub_fast(msk_mod_q, q)
                    } else {
                        gamma % q
                    };
                    conv.mod_sub_fast(tables.b_mod_q[j].mul(gamma_q, q), q)
                })
                .collect();
            ResiduePolynomial::new_unchecked(Arc::clone(params), values, Format::Coefficient)
        })
        .collect();
    Ok(RnsPolynomial::from_parts_unchecked(
        Arc::clone(&tables.q),
        towers,
        Format::Coefficient,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::tests::{big_poly, random_below};
    use crate::math::BigInteger;
    use crate::rings::{RingError, RnsBasis, RnsBasisBuilder, generate_primes};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn q_basis() -> Arc<RnsBasis<u64>> {
        RnsBasisBuilder::new(8)
            .with_prime_bits(40)
            .with_prime_count(3)
            .build::<u64>()
            .unwrap()
    }

    fn random_over(
        basis: &Arc<RnsBasis<u64>>,
        bound: &BigInteger,
        format: Format,
        seed: u64,
    ) -> (RnsPolynomial<u64>, Vec<BigInteger>) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let coefficients: Vec<_> = (0..8).map(|_| random_below(bound, &mut rng)).collect();
        let poly = RnsPolynomial::from_big_coefficients(
            Arc::clone(basis),
            &big_poly(basis, &coefficients),
            format,
        )
        .unwrap();
        (poly, coefficients)
    }

    fn bsk_part(poly: &RnsPolynomial<u64>, tables: &BehzTables<u64>) -> RnsPolynomial<u64> {
        let q_count = tables.q().tower_count();
        poly.clone_towers(q_count, poly.tower_count()).unwrap()
    }

    // ── Q -> Q ∪ Bsk ──────────────────────────────────────────────────────────

    #[test]
    fn montgomery_lift_lands_within_one_multiple_of_q() {
        let q = q_basis();
        let tables = BehzTables::generate(Arc::clone(&q), 65537).unwrap();
        let (x, coefficients) = random_over(&q, q.modulus(), Format::Coefficient, 41);

        let lifted = fast_base_conv_q_to_bsk_montgomery(&x, &tables).unwrap();
        assert_eq!(lifted.moduli(), tables.q_bsk().moduli());
        assert_eq!(&lifted.towers()[..3], x.towers());

        let bsk_modulus = tables.bsk().modulus();
        let big_q = q.modulus();
        let y = bsk_part(&lifted, &tables).crt_interpolate().unwrap();
        for (value, got) in coefficients.iter().zip(y.coefficients()) {
            let plus_q = value.plus(big_q).unwrap();
            let minus_q = bsk_modulus.minus(&big_q.minus(value).unwrap()).unwrap();
            assert!(got == value || *got == plus_q || *got == minus_q);
        }
    }

    #[test]
    fn montgomery_lift_keeps_evaluation_format() {
        let q = q_basis();
        let tables = BehzTables::generate(Arc::clone(&q), 65537).unwrap();
        let (coeff, _) = random_over(&q, q.modulus(), Format::Coefficient, 42);
        let eval = coeff.clone().into_format(Format::Evaluation).unwrap();

        let from_eval = fast_base_conv_q_to_bsk_montgomery(&eval, &tables).unwrap();
        assert_eq!(from_eval.format(), Format::Evaluation);
        let from_coeff = fast_base_conv_q_to_bsk_montgomery(&coeff, &tables).unwrap();
        assert_eq!(
            from_eval.into_format(Format::Coefficient).unwrap(),
            from_coeff
        );
    }

    // ── floor(t * X / Q) ──────────────────────────────────────────────────────

    #[test]
    fn floor_q_is_within_the_basis_size_of_the_true_floor() {
        let q = q_basis();
        let t = 65537u64;
        let tables = BehzTables::generate(Arc::clone(&q), t).unwrap();
        let (x, coefficients) = random_over(tables.q_bsk(), q.modulus(), Format::Coefficient, 43);

        let floored = fast_rns_floor_q(&x, &tables).unwrap();
        assert_eq!(floored.moduli(), tables.bsk().moduli());

        let bsk_modulus = tables.bsk().modulus();
        let slack = BigInteger::from_u64(q.tower_count() as u64);
        let y = floored.crt_interpolate().unwrap();
        for (value, got) in coefficients.iter().zip(y.coefficients()) {
            let floor = value
                .times(&BigInteger::from_u64(t))
                .unwrap()
                .divided_by(q.modulus())
                .unwrap();
            let error = floor
                .plus(bsk_modulus)
                .unwrap()
                .minus(got)
                .unwrap()
                .modulo(bsk_modulus)
                .unwrap();
            assert!(error < slack);
        }
    }

    #[test]
    fn floor_q_requires_the_extended_basis() {
        let q = q_basis();
        let tables = BehzTables::generate(Arc::clone(&q), 17).unwrap();
        let x = RnsPolynomial::zero(q, Format::Coefficient);
        assert!(matches!(
            fast_rns_floor_q(&x, &tables),
            Err(RingError::TowerCountMismatch { .. })
        ));
    }

    // ── Bsk -> Q ──────────────────────────────────────────────────────────────

    #[test]
    fn shenoy_kumaresan_recovers_signed_values() {
        let q = q_basis();
        let tables = BehzTables::generate(Arc::clone(&q), 65537).unwrap();
        let signed = [0i64, 1, -1, 123_456_789, -987_654_321, i32::MAX as i64, -7, 42];
        let y = RnsPolynomial::from_signed_coefficients(
            Arc::clone(tables.bsk()),
            &signed,
            Format::Coefficient,
        )
        .unwrap();

        let out = fast_base_conv_sk(&y, &tables).unwrap();
        let expected =
            RnsPolynomial::from_signed_coefficients(q, &signed, Format::Coefficient).unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn shenoy_kumaresan_is_exact_below_half_of_b() {
        let q = q_basis();
        let tables = BehzTables::generate(Arc::clone(&q), 65537).unwrap();
        let b = tables
            .bsk()
            .moduli()
            .iter()
            .take(tables.bsk().tower_count() - 1)
            .fold(BigInteger::one(), |acc, &m| {
                acc.times(&BigInteger::from_u64(m)).unwrap()
            });
        let (y, coefficients) =
            random_over(tables.bsk(), &b.shifted_right(1), Format::Coefficient, 44);

        let out = fast_base_conv_sk(&y, &tables).unwrap();
        let expected = RnsPolynomial::from_big_coefficients(
            Arc::clone(&q),
            &big_poly(&q, &reduced(&coefficients, q.modulus())),
            Format::Coefficient,
        )
        .unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn shenoy_kumaresan_with_wide_auxiliary_moduli() {
        let q = RnsBasisBuilder::new(8)
            .with_prime_bits(30)
            .with_prime_count(3)
            .build::<u64>()
            .unwrap();
        let mut b = generate_primes::<u64>(62, 121, q.cyclotomic_order()).unwrap();
        let msk = b.pop().unwrap();
        let tables = BehzTables::with_auxiliary(Arc::clone(&q), b, msk, 65537).unwrap();
        assert!(tables.lazy_to_msk < tables.b_size);

        let signed: Vec<i64> = (1..=8).map(|k| 123_456_789 * k).collect();
        let y = RnsPolynomial::from_signed_coefficients(
            Arc::clone(tables.bsk()),
            &signed,
            Format::Coefficient,
        )
        .unwrap();
        let out = fast_base_conv_sk(&y, &tables).unwrap();
        let expected =
            RnsPolynomial::from_signed_coefficients(q, &signed, Format::Coefficient).unwrap();
        assert_eq!(out, expected);
    }

    fn reduced(values: &[BigInteger], modulus: &BigInteger) -> Vec<BigInteger> {
        values.iter().map(|v| v.modulo(modulus).unwrap()).collect()
    }

    #[test]
    fn explicit_auxiliary_moduli_must_exceed_mtilde() {
        let q = q_basis();
        assert!(matches!(
            BehzTables::with_auxiliary(q, vec![65521], 786433, 17),
            Err(RingError::ModulusMismatch { .. })
        ));
    }
}
