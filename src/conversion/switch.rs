//! Fast base conversion `Q -> P`, exact and approximate, and the
//! extension / division operations built on it.

use crate::math::ModularArithmetic;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::instrument;

use super::tables::{ExpandTables, ModDownTables, SwitchTables};
use super::{ShoupConstant, dot_mod, require_coefficient, require_towers};
use crate::rings::{Format, RingError, RingResult, RnsBasis, RnsPolynomial, ResiduePolynomial};

/// `[X]_{p_j} = sum_i [x_i * (Q/q_i)^{-1}]_{q_i} * [Q/q_i]_{p_j}`.
///
/// The result represents `X + alpha * Q` for an unknown `0 <= alpha < |Q|`;
/// that multiple of `Q` is left in place. Input must be in coefficient
/// format; the output is in coefficient format over `tables.target()`.
#[instrument(level = "debug", skip_all, fields(
    source = x.tower_count(),
    target = tables.target.tower_count(),
    n = x.ring_dimension(),
))]
pub fn approx_switch_crt_basis<I: ModularArithmetic>(
    x: &RnsPolynomial<I>,
    tables: &SwitchTables<I>,
) -> RingResult<RnsPolynomial<I>> {
    require_coefficient(x)?;
    require_towers(x, tables.source.tower_count())?;
    let scaled = scaled_residues(x, &tables.q_hat_inv_mod_q);
    let n = x.ring_dimension();

    let towers = tables
        .target
        .towers()
        .par_iter()
        .zip(tables.q_hat_mod_p.par_iter())
        .map(|(params, row)| {
            let (p, mu) = (params.modulus(), params.wide_mu());
            let values = (0..n)
                .map(|ri| {
                    let terms = scaled.iter().zip(row).map(|(y, &c)| (y[ri], c));
                    dot_mod(terms, p, mu, tables.lazy)
                })
                .collect();
            ResiduePolynomial::new_unchecked(Arc::clone(params), values, Format::Coefficient)
        })
        .collect();
    Ok(RnsPolynomial::from_parts_unchecked(
        Arc::clone(&tables.target),
        towers,
        Format::Coefficient,
    ))
}

/// Exact switch `Q -> P` of the centered representative of `X`.
///
/// Tracks `nu = 0.5 + sum_i y_i / q_i` per coefficient; `alpha = floor(nu)`
/// counts the wrapped multiples of `Q`, so inputs above `Q/2` come out as
/// `X - Q`. Input must be in coefficient format.
#[instrument(level = "debug", skip_all, fields(
    source = x.tower_count(),
    target = tables.target.tower_count(),
    n = x.ring_dimension(),
))]
pub fn switch_crt_basis<I: ModularArithmetic>(
    x: &RnsPolynomial<I>,
    tables: &SwitchTables<I>,
) -> RingResult<RnsPolynomial<I>> {
    require_coefficient(x)?;
    require_towers(x, tables.source.tower_count())?;
    let scaled = scaled_residues(x, &tables.q_hat_inv_mod_q);
    let n = x.ring_dimension();
    let max_alpha = tables.alpha_q_mod_p.len() - 1;

    let alphas: Vec<usize> = (0..n)
        .into_par_iter()
        .map(|ri| {
            let nu = scaled
                .iter()
                .zip(&tables.q_inv)
                .fold(0.5, |acc, (y, &inv)| acc + y[ri].to_f64() * inv);
            (nu as usize).min(max_alpha)
        })
        .collect();

    let towers = tables
        .target
        .towers()
        .par_iter()
        .zip(tables.q_hat_mod_p.par_iter())
        .enumerate()
        .map(|(j, (params, row))| {
            let (p, mu) = (params.modulus(), params.wide_mu());
            let values = alphas
                .iter()
                .enumerate()
                .map(|(ri, &alpha)| {
                    let terms = scaled.iter().zip(row).map(|(y, &c)| (y[ri], c));
                    dot_mod(terms, p, mu, tables.lazy)
                        .mod_sub_fast(tables.alpha_q_mod_p[alpha][j], p)
                })
                .collect();
            ResiduePolynomial::new_unchecked(Arc::clone(params), values, Format::Coefficient)
        })
        .collect();
    Ok(RnsPolynomial::from_parts_unchecked(
        Arc::clone(&tables.target),
        towers,
        Format::Coefficient,
    ))
}

/// Extends `X` from `Q` to `Q ∪ P` with the exact switch.
///
/// Accepts either format; the `Q` towers are reused as given and the result
/// keeps the input format.
pub fn expand_crt_basis<I: ModularArithmetic>(
    x: &RnsPolynomial<I>,
    tables: &ExpandTables<I>,
) -> RingResult<RnsPolynomial<I>> {
    let p_part = extension(x, &tables.switch, switch_crt_basis)?;
    Ok(concat(x, p_part, &tables.extended, false))
}

/// As [`expand_crt_basis`], with the `P` towers placed before `Q`.
pub fn expand_crt_basis_reverse_order<I: ModularArithmetic>(
    x: &RnsPolynomial<I>,
    tables: &ExpandTables<I>,
) -> RingResult<RnsPolynomial<I>> {
    let p_part = extension(x, &tables.switch, switch_crt_basis)?;
    Ok(concat(x, p_part, &tables.reversed, true))
}

/// Extends `X` from `Q` to `Q ∪ P` with the approximate switch, so the `P`
/// towers carry `X + alpha * Q`.
pub fn approx_mod_up<I: ModularArithmetic>(
    x: &RnsPolynomial<I>,
    tables: &ExpandTables<I>,
) -> RingResult<RnsPolynomial<I>> {
    let p_part = extension(x, &tables.switch, approx_switch_crt_basis)?;
    Ok(concat(x, p_part, &tables.extended, false))
}

/// Divides a polynomial over `Q' ∪ P` by `P` and returns it over `Q'`,
/// where `Q'` is a prefix of the table's `Q`.
///
/// The centered residue `[X]_P` is switched exactly into `Q'` and
/// `(X - [X]_P) * P^{-1}` is returned, which is `round(X / P)` for
/// `X < Q'P/2`. With a plaintext modulus `t` the subtracted term is
/// `t * [X * t^{-1}]_P`, so the result stays congruent to `X * P^{-1}`
/// modulo `t`. The input format is preserved.
#[instrument(level = "debug", skip_all, fields(
    towers = x.tower_count(),
    p = tables.p.tower_count(),
    n = x.ring_dimension(),
))]
pub fn approx_mod_down<I: ModularArithmetic>(
    x: &RnsPolynomial<I>,
    tables: &ModDownTables<I>,
) -> RingResult<RnsPolynomial<I>> {
    let p_count = tables.p.tower_count();
    let q_max = tables.q_prefixes.len();
    let q_count = x.tower_count().saturating_sub(p_count);
    if q_count == 0 || q_count > q_max {
        return Err(RingError::TowerCountMismatch {
            expected: q_max + p_count,
            actual: x.tower_count(),
        });
    }
    debug_assert_eq!(x.moduli()[q_count..], tables.p.moduli()[..]);
    let format = x.format();

    let p_towers = x.towers()[q_count..]
        .par_iter()
        .enumerate()
        .map(|(j, tower)| {
            let mut tower = tower.clone().into_format(Format::Coefficient)?;
            if let Some(plaintext) = &tables.plaintext {
                scale_tower(&mut tower, &plaintext.t_inv_mod_p[j]);
            }
            Ok(tower)
        })
        .collect::<RingResult<Vec<_>>>()?;
    let p_part =
        RnsPolynomial::from_parts_unchecked(Arc::clone(&tables.p), p_towers, Format::Coefficient);
    let switched = switch_crt_basis(&p_part, &tables.p_to_q)?.into_towers();

    let towers = x.towers()[..q_count]
        .par_iter()
        .zip(switched.into_par_iter())
        .enumerate()
        .map(|(i, (tower, mut correction))| {
            if let Some(plaintext) = &tables.plaintext {
                scale_tower(&mut correction, &plaintext.t_mod_q[i]);
            }
            let mut out = tower.clone();
            out.sub_assign_checked(&correction.into_format(format)?)?;
            scale_tower(&mut out, &tables.p_inv_mod_q[i]);
            Ok(out)
        })
        .collect::<RingResult<Vec<_>>>()?;
    Ok(RnsPolynomial::from_parts_unchecked(
        Arc::clone(&tables.q_prefixes[q_count - 1]),
        towers,
        format,
    ))
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// `y_i[r] = x_i[r] * c_i mod q_i` for every tower.
pub(super) fn scaled_residues<I: ModularArithmetic>(
    x: &RnsPolynomial<I>,
    constants: &[ShoupConstant<I>],
) -> Vec<Vec<I>> {
    x.towers()
        .par_iter()
        .zip(constants.par_iter())
        .map(|(tower, c)| {
            let q = tower.modulus();
            tower.values().iter().map(|&v| c.mul(v, q)).collect()
        })
        .collect()
}

pub(super) fn scale_tower<I: ModularArithmetic>(
    tower: &mut ResiduePolynomial<I>,
    constant: &ShoupConstant<I>,
) {
    let q = tower.modulus();
    for value in tower.values_mut() {
        *value = constant.mul(*value, q);
    }
}

type Switch<I> = fn(&RnsPolynomial<I>, &SwitchTables<I>) -> RingResult<RnsPolynomial<I>>;

/// The `P` towers of an extension, in the input's format.
fn extension<I: ModularArithmetic>(
    x: &RnsPolynomial<I>,
    tables: &SwitchTables<I>,
    switch: Switch<I>,
) -> RingResult<RnsPolynomial<I>> {
    require_towers(x, tables.source.tower_count())?;
    let coefficients = x.coefficient_view()?;
    switch(&coefficients, tables)?.into_format(x.format())
}

fn concat<I: ModularArithmetic>(
    x: &RnsPolynomial<I>,
    p_part: RnsPolynomial<I>,
    basis: &Arc<RnsBasis<I>>,
    p_first: bool,
) -> RnsPolynomial<I> {
    let q_towers = x.towers().iter().cloned();
    let towers = if p_first {
        p_part.into_towers().into_iter().chain(q_towers).collect()
    } else {
        q_towers.chain(p_part.into_towers()).collect()
    };
    RnsPolynomial::from_parts_unchecked(Arc::clone(basis), towers, x.format())
}
