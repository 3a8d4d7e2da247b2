//! ScaleAndRound: `round(t * X / Q)` into a small modulus or onto the other
//! half of an extended basis.

use crate::math::ModularArithmetic;
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{instrument, warn};

use super::tables::{
    BasisScaleTables, GAMMA_BITS, GammaScaleTables, IntegerPath, ScaleTables, ScaleTarget,
};
use super::{dot_mod, require_coefficient, require_towers};
use crate::rings::{Format, RingResult, RnsPolynomial, ResiduePolynomial};

/// `round(t * X / Q) mod t` for a coefficient-format polynomial over `Q`.
///
/// Every residue is split into digits; the integer parts of
/// `t * θ_i * 2^(c * chunk_bits) / q_i` accumulate along the table's
/// [`IntegerPath`], the fractional parts in a single `f64` that is rounded
/// once. The result is a coefficient-format polynomial modulo `t`.
#[instrument(level = "debug", skip_all, fields(
    towers = x.tower_count(),
    t = %tables.t,
    path = ?tables.path,
))]
pub fn scale_and_round<I: ModularArithmetic>(
    x: &RnsPolynomial<I>,
    tables: &ScaleTables<I>,
) -> RingResult<ResiduePolynomial<I>> {
    require_coefficient(x)?;
    require_towers(x, tables.q.tower_count())?;
    let t = tables.t;
    let mask = (I::ONE << tables.chunk_bits) - I::ONE;
    let path = tables.path;

    let values = (0..x.ring_dimension())
        .into_par_iter()
        .map(|ri| {
            let mut float_sum = 0.5f64;
            let mut int_sum = I::ZERO;
            for (c, (ints, fracs)) in tables.int_parts.iter().zip(&tables.frac_parts).enumerate() {
                let shift = c as u32 * tables.chunk_bits;
                for ((tower, int), &frac) in x.towers().iter().zip(ints).zip(fracs) {
                    let digit = (tower.values()[ri] >> shift) & mask;
                    float_sum += digit.to_f64() * frac;
                    int_sum = match path {
                        IntegerPath::PowerOfTwo | IntegerPath::Deferred => {
                            int_sum.wrapping_add(digit.wrapping_mul(int.value()))
                        }
                        IntegerPath::Reduced => int_sum.mod_add_fast(int.mul(digit, t), t),
                    };
                }
            }
            let float_part = I::from_f64(float_sum.floor().rem_euclid(t.to_f64()));
            match path {
                IntegerPath::PowerOfTwo => int_sum.wrapping_add(float_part) & (t - I::ONE),
                IntegerPath::Deferred => int_sum.wrapping_add(float_part) % t,
                IntegerPath::Reduced => int_sum.mod_add_fast(float_part % t, t),
            }
        })
        .collect();
    Ok(ResiduePolynomial::new_unchecked(
        Arc::clone(&tables.output),
        values,
        Format::Coefficient,
    ))
}

/// Integer-only `round(t * X / Q) mod t` computed modulo `t * 2^26`.
///
/// The low 26 bits of the accumulated sum hold the rounding information;
/// doubling them carries into the quotient exactly when the fractional
/// part is at least one half. Correct when `t * X / Q` lies within
/// `2^-27` of an integer plus the approximation error of `|Q|` terms,
/// which is the situation of a freshly decrypted ciphertext.
#[instrument(level = "debug", skip_all, fields(towers = x.tower_count(), t = %tables.t))]
pub fn scale_and_round_gamma<I: ModularArithmetic>(
    x: &RnsPolynomial<I>,
    tables: &GammaScaleTables<I>,
) -> RingResult<ResiduePolynomial<I>> {
    require_coefficient(x)?;
    require_towers(x, tables.q.tower_count())?;
    let (t, t_gamma) = (tables.t, tables.t_gamma);
    let gamma_mask = (I::ONE << GAMMA_BITS) - I::ONE;

    let values = (0..x.ring_dimension())
        .into_par_iter()
        .map(|ri| {
            let s = x
                .towers()
                .iter()
                .zip(&tables.t_gamma_q_hat_inv_mod_q)
                .zip(&tables.neg_q_inv_mod_t_gamma)
                .fold(I::ZERO, |acc, ((tower, scale), neg_inv)| {
                    let y = scale.mul(tower.values()[ri], tower.modulus());
                    acc.mod_add_fast(neg_inv.mul(y, t_gamma), t_gamma)
                });
            let s = s + (s & gamma_mask);
            (s >> GAMMA_BITS) % t
        })
        .collect();
    Ok(ResiduePolynomial::new_unchecked(
        Arc::clone(&tables.output),
        values,
        Format::Coefficient,
    ))
}

/// `round(t * X / S) mod O` for `X` over `Q ∪ P`, where `S` is the side
/// dropped by the table's [`ScaleTarget`] and `O` the side kept.
///
/// The rounding offset `alpha = floor(0.5 + sum_k x_k * frac_k)` is carried
/// in an `f64`; offsets past `2^53` lose low bits and are reported once per
/// call. Input must be in coefficient format; the result is in coefficient
/// format over the kept basis.
#[instrument(level = "debug", skip_all, fields(
    towers = x.tower_count(),
    target = ?tables.target,
))]
pub fn scale_and_round_basis<I: ModularArithmetic>(
    x: &RnsPolynomial<I>,
    tables: &BasisScaleTables<I>,
) -> RingResult<RnsPolynomial<I>> {
    require_coefficient(x)?;
    require_towers(x, tables.input.tower_count())?;
    let (dropped, kept) = split_sides(x, tables);
    let inexact = AtomicBool::new(false);

    let alphas: Vec<f64> = (0..x.ring_dimension())
        .into_par_iter()
        .map(|ri| {
            dropped
                .iter()
                .zip(&tables.frac_parts)
                .fold(0.5, |nu, (tower, &frac)| nu + tower.values()[ri].to_f64() * frac)
                .floor()
        })
        .collect();

    let towers = scaled_towers(tables, dropped, kept, |ri, o| {
        float_mod(alphas[ri], o, &inexact)
    });
    if inexact.load(Ordering::Relaxed) {
        warn!("ScaleAndRound offset exceeds f64 precision; low bits of the rounding are lost");
    }
    Ok(RnsPolynomial::from_parts_unchecked(
        Arc::clone(&tables.output),
        towers,
        Format::Coefficient,
    ))
}

/// [`scale_and_round_basis`] without the rounding offset: the result is
/// `floor`-like and off by `alpha < sum_k s_k` from the rounded value.
#[instrument(level = "debug", skip_all, fields(
    towers = x.tower_count(),
    target = ?tables.target,
))]
pub fn approx_scale_and_round<I: ModularArithmetic>(
    x: &RnsPolynomial<I>,
    tables: &BasisScaleTables<I>,
) -> RingResult<RnsPolynomial<I>> {
    require_coefficient(x)?;
    require_towers(x, tables.input.tower_count())?;
    let (dropped, kept) = split_sides(x, tables);
    let towers = scaled_towers(tables, dropped, kept, |_, _| I::ZERO);
    Ok(RnsPolynomial::from_parts_unchecked(
        Arc::clone(&tables.output),
        towers,
        Format::Coefficient,
    ))
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

type Towers<'a, I> = &'a [ResiduePolynomial<I>];

fn split_sides<'a, I: ModularArithmetic>(
    x: &'a RnsPolynomial<I>,
    tables: &BasisScaleTables<I>,
) -> (Towers<'a, I>, Towers<'a, I>) {
    let dropped_count = tables.frac_parts.len();
    let towers = x.towers();
    match tables.target {
        ScaleTarget::Trailing => towers.split_at(dropped_count),
        ScaleTarget::Leading => {
            let (kept, dropped) = towers.split_at(towers.len() - dropped_count);
            (dropped, kept)
        }
    }
}

fn scaled_towers<I, F>(
    tables: &BasisScaleTables<I>,
    dropped: Towers<'_, I>,
    kept: Towers<'_, I>,
    offset: F,
) -> Vec<ResiduePolynomial<I>>
where
    I: ModularArithmetic,
    F: Fn(usize, I) -> I + Sync,
{
    tables
        .output
        .towers()
        .par_iter()
        .zip(kept.par_iter())
        .zip(tables.int_parts.par_iter())
        .map(|((params, own), row)| {
            let (o, mu) = (params.modulus(), params.wide_mu());
            let (dropped_row, own_factor) = row.split_at(dropped.len());
            let values = (0..own.ring_dimension())
                .map(|ri| {
                    let terms = dropped
                        .iter()
                        .map(|tower| tower.values()[ri])
                        .zip(dropped_row.iter().copied())
                        .chain(std::iter::once((own.values()[ri], own_factor[0])));
                    dot_mod(terms, o, mu, tables.lazy).mod_add_fast(offset(ri, o), o)
                })
                .collect();
            ResiduePolynomial::new_unchecked(Arc::clone(params), values, Format::Coefficient)
        })
        .collect()
}

/// `value mod modulus` for a non-negative integral `f64`.
fn float_mod<I: ModularArithmetic>(value: f64, modulus: I, inexact: &AtomicBool) -> I {
    const EXACT: f64 = (1u64 << 53) as f64;
    if value < EXACT && value < I::MAX.to_f64() {
        return I::from_f64(value) % modulus;
    }
    inexact.store(true, Ordering::Relaxed);
    // value = mantissa * 2^exponent with a 53-bit mantissa
    let bits = value.to_bits();
    let exponent = (((bits >> 52) & 0x7ff) as u32).saturating_sub(1075);
    let mantissa = (bits & ((1u64 << 52) - 1)) | (1u64 << 52);
    let mantissa = I::from_u64(mantissa) % modulus;
    let two = I::from_u64(2) % modulus;
    mantissa.mod_mul(two.mod_exp(I::from_u64(exponent as u64), modulus), modulus)
}
