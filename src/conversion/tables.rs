//! Precomputed constants for every conversion, one bundle per operation
//! family. All constants are derived with [`BigInteger`] arithmetic and
//! stored reduced, with Shoup companions for fixed multiplicands.

use crate::math::native::msb64;
use crate::math::{BigInteger, ModularArithmetic, find_primitive_root, previous_prime};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{ShoupConstant, lazy_terms};
use crate::rings::{ElementParams, RingError, RingResult, RnsBasis};

/// `log2` of the auxiliary Montgomery modulus used by the BEHZ conversions.
pub const MTILDE_BITS: u32 = 16;
pub(crate) const MTILDE: u64 = 1 << MTILDE_BITS;

/// `log2` of the rounding helper in the integer-only ScaleAndRound.
pub const GAMMA_BITS: u32 = 26;

// ─── Basis switching ──────────────────────────────────────────────────────────

/// Constants for switching a polynomial from basis `Q` to basis `P`.
#[derive(Debug, Clone)]
pub struct SwitchTables<I: ModularArithmetic> {
    pub(super) source: Arc<RnsBasis<I>>,
    pub(super) target: Arc<RnsBasis<I>>,
    /// `(Q/q_i)^{-1} mod q_i`
    pub(super) q_hat_inv_mod_q: Vec<ShoupConstant<I>>,
    /// `[j][i] = (Q/q_i) mod p_j`
    pub(super) q_hat_mod_p: Vec<Vec<I>>,
    /// `[alpha][j] = alpha * Q mod p_j` for `alpha` in `0..=|Q|`
    pub(super) alpha_q_mod_p: Vec<Vec<I>>,
    /// `1 / q_i`
    pub(super) q_inv: Vec<f64>,
    pub(super) lazy: usize,
}

impl<I: ModularArithmetic> SwitchTables<I> {
    #[instrument(level = "debug", skip_all, fields(
        source = source.tower_count(),
        target = target.tower_count(),
        n = source.ring_dimension(),
    ))]
    pub fn new(source: Arc<RnsBasis<I>>, target: Arc<RnsBasis<I>>) -> RingResult<Self> {
        check_dimensions(&source, &target)?;
        let source_moduli = source.moduli();
        let target_moduli = target.moduli();

        let q_hat_inv_mod_q = source
            .q_hat_inv_mod_q()
            .iter()
            .zip(&source_moduli)
            .map(|(&inv, &q)| ShoupConstant::new(inv, q))
            .collect();
        let q_hat_mod_p = target_moduli
            .iter()
            .map(|&p| residues(source.q_hat(), p))
            .collect::<RingResult<Vec<_>>>()?;
        let alpha_q_mod_p = (0..=source_moduli.len() as u64)
            .map(|alpha| {
                let multiple = source.modulus().mul_unchecked(&BigInteger::from_u64(alpha));
                target_moduli
                    .iter()
                    .map(|&p| reduce(&multiple, p))
                    .collect::<RingResult<Vec<_>>>()
            })
            .collect::<RingResult<Vec<_>>>()?;
        let q_inv = source_moduli.iter().map(|q| 1.0 / q.to_f64()).collect();
        let lazy = lazy_terms::<I>(max_bits(&source), max_bits(&target));

        Ok(Self {
            source,
            target,
            q_hat_inv_mod_q,
            q_hat_mod_p,
            alpha_q_mod_p,
            q_inv,
            lazy,
        })
    }

    pub fn source(&self) -> &Arc<RnsBasis<I>> {
        &self.source
    }

    pub fn target(&self) -> &Arc<RnsBasis<I>> {
        &self.target
    }
}

/// Constants for extending `Q` to `Q ∪ P`.
#[derive(Debug, Clone)]
pub struct ExpandTables<I: ModularArithmetic> {
    pub(super) switch: SwitchTables<I>,
    /// `Q` towers first, then `P`
    pub(super) extended: Arc<RnsBasis<I>>,
    /// `P` towers first, then `Q`
    pub(super) reversed: Arc<RnsBasis<I>>,
}

impl<I: ModularArithmetic> ExpandTables<I> {
    pub fn new(q: Arc<RnsBasis<I>>, p: Arc<RnsBasis<I>>) -> RingResult<Self> {
        let extended = Arc::new(q.concat(&p)?);
        let reversed = Arc::new(p.concat(&q)?);
        Ok(Self {
            switch: SwitchTables::new(q, p)?,
            extended,
            reversed,
        })
    }

    pub fn extended(&self) -> &Arc<RnsBasis<I>> {
        &self.extended
    }

    pub fn reversed(&self) -> &Arc<RnsBasis<I>> {
        &self.reversed
    }
}

/// Constants for `Q ∪ P -> Q` division by `P`, optionally keeping the
/// residue modulo a plaintext modulus `t`.
#[derive(Debug, Clone)]
pub struct ModDownTables<I: ModularArithmetic> {
    pub(super) p: Arc<RnsBasis<I>>,
    pub(super) p_to_q: SwitchTables<I>,
    /// `P^{-1} mod q_i`
    pub(super) p_inv_mod_q: Vec<ShoupConstant<I>>,
    pub(super) plaintext: Option<PlaintextFactors<I>>,
    /// `q_prefixes[k - 1]` holds the first `k` towers of `Q`
    pub(super) q_prefixes: Vec<Arc<RnsBasis<I>>>,
}

#[derive(Debug, Clone)]
pub(super) struct PlaintextFactors<I: ModularArithmetic> {
    /// `t^{-1} mod p_j`
    pub(super) t_inv_mod_p: Vec<ShoupConstant<I>>,
    /// `t mod q_i`
    pub(super) t_mod_q: Vec<ShoupConstant<I>>,
}

impl<I: ModularArithmetic> ModDownTables<I> {
    #[instrument(level = "debug", skip_all, fields(q = q.tower_count(), p = p.tower_count()))]
    pub fn new(q: Arc<RnsBasis<I>>, p: Arc<RnsBasis<I>>, t: Option<I>) -> RingResult<Self> {
        let q_moduli = q.moduli();
        let p_moduli = p.moduli();
        let p_inv_mod_q = q_moduli
            .iter()
            .map(|&qi| inverse_shoup(p.modulus(), qi))
            .collect::<RingResult<Vec<_>>>()?;
        let plaintext = t
            .map(|t| -> RingResult<_> {
                let big_t = BigInteger::from_word(t);
                Ok(PlaintextFactors {
                    t_inv_mod_p: p_moduli
                        .iter()
                        .map(|&pj| inverse_shoup(&big_t, pj))
                        .collect::<RingResult<Vec<_>>>()?,
                    t_mod_q: q_moduli
                        .iter()
                        .map(|&qi| shoup(&big_t, qi))
                        .collect::<RingResult<Vec<_>>>()?,
                })
            })
            .transpose()?;
        let q_prefixes = prefixes(&q)?;
        Ok(Self {
            p_to_q: SwitchTables::new(Arc::clone(&p), q)?,
            p,
            p_inv_mod_q,
            plaintext,
            q_prefixes,
        })
    }
}

// ─── ScaleAndRound ────────────────────────────────────────────────────────────

/// How the integer half of ScaleAndRound `Q -> t` accumulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegerPath {
    /// `t` is a power of two: wrap freely and mask once.
    PowerOfTwo,
    /// The whole sum fits in `W - 1` bits: reduce once at the end.
    Deferred,
    /// Shoup-reduce every product modulo `t`.
    Reduced,
}

/// Constants for `round(t * X / Q) mod t`.
///
/// Each residue `x_i` is split into `chunks` digits of `chunk_bits` bits so
/// that the floating sum of `digit * fraction` terms stays below `2^52`.
#[derive(Debug, Clone)]
pub struct ScaleTables<I: ModularArithmetic> {
    pub(super) q: Arc<RnsBasis<I>>,
    pub(super) t: I,
    pub(super) output: Arc<ElementParams<I>>,
    pub(super) chunk_bits: u32,
    /// `[c][i] = floor(t * θ_i * 2^(c * chunk_bits) / q_i) mod t`
    pub(super) int_parts: Vec<Vec<ShoupConstant<I>>>,
    /// `[c][i]` fractional part of the same quotient
    pub(super) frac_parts: Vec<Vec<f64>>,
    pub(super) path: IntegerPath,
}

impl<I: ModularArithmetic> ScaleTables<I> {
    #[instrument(level = "debug", skip_all, fields(q = q.tower_count(), t = %t))]
    pub fn new(q: Arc<RnsBasis<I>>, t: I) -> RingResult<Self> {
        let output = Arc::new(ElementParams::new(q.cyclotomic_order(), t, I::ZERO)?);
        let size = q.tower_count() as u64;
        let q_bits = max_bits(&q);

        let mut chunks = 1u64;
        let mut chunk_bits = q_bits;
        while chunk_bits + msb64(size * chunks) >= 52 {
            chunks += 1;
            chunk_bits = q_bits.div_ceil(chunks as u32);
        }
        let terms = size * chunks;

        let path = if t.is_power_of_two() {
            IntegerPath::PowerOfTwo
        } else if chunk_bits + t.msb() + msb64(terms) < I::BITS - 1 {
            IntegerPath::Deferred
        } else {
            IntegerPath::Reduced
        };
        debug!(chunks, chunk_bits, ?path, "selected ScaleAndRound integer path");

        let big_t = BigInteger::from_word(t);
        let mut int_parts = Vec::with_capacity(chunks as usize);
        let mut frac_parts = Vec::with_capacity(chunks as usize);
        for c in 0..chunks as u32 {
            let shift = BigInteger::power_of_two(c * chunk_bits);
            let (ints, fracs): (Vec<_>, Vec<_>) = q
                .q_hat_inv_mod_q()
                .iter()
                .zip(q.moduli())
                .map(|(&theta, qi)| -> RingResult<(ShoupConstant<I>, f64)> {
                    let numerator = big_t
                        .mul_unchecked(&BigInteger::from_word(theta))
                        .mul_unchecked(&shift);
                    let (int, frac) = split_quotient(&numerator, qi, t)?;
                    Ok((ShoupConstant::new(int, t), frac))
                })
                .collect::<RingResult<Vec<_>>>()?
                .into_iter()
                .unzip();
            int_parts.push(ints);
            frac_parts.push(fracs);
        }

        Ok(Self {
            q,
            t,
            output,
            chunk_bits,
            int_parts,
            frac_parts,
            path,
        })
    }

    pub fn path(&self) -> IntegerPath {
        self.path
    }

    pub fn chunk_count(&self) -> usize {
        self.int_parts.len()
    }
}

/// Constants for the integer-only `Q -> t` scaling with `gamma = 2^26`.
#[derive(Debug, Clone)]
pub struct GammaScaleTables<I: ModularArithmetic> {
    pub(super) q: Arc<RnsBasis<I>>,
    pub(super) t: I,
    pub(super) t_gamma: I,
    pub(super) output: Arc<ElementParams<I>>,
    /// `t * gamma * θ_i mod q_i`
    pub(super) t_gamma_q_hat_inv_mod_q: Vec<ShoupConstant<I>>,
    /// `-q_i^{-1} mod t * gamma`
    pub(super) neg_q_inv_mod_t_gamma: Vec<ShoupConstant<I>>,
}

impl<I: ModularArithmetic> GammaScaleTables<I> {
    #[instrument(level = "debug", skip_all, fields(q = q.tower_count(), t = %t))]
    pub fn new(q: Arc<RnsBasis<I>>, t: I) -> RingResult<Self> {
        if I::BITS < 64 {
            return Err(RingError::NotImplemented(
                "gamma ScaleAndRound on 32-bit words",
            ));
        }
        let max_bits = I::BITS - 2 - GAMMA_BITS;
        if t == I::ZERO || t.msb() > max_bits {
            return Err(RingError::ModulusTooLarge {
                modulus: t.to_string(),
                max_bits,
            });
        }
        let output = Arc::new(ElementParams::new(q.cyclotomic_order(), t, I::ZERO)?);
        let t_gamma = t << GAMMA_BITS;
        let t_gamma_q_hat_inv_mod_q = q
            .q_hat_inv_mod_q()
            .iter()
            .zip(q.moduli())
            .map(|(&theta, qi)| ShoupConstant::new(theta.mod_mul(t_gamma, qi), qi))
            .collect();
        let neg_q_inv_mod_t_gamma = q
            .moduli()
            .into_iter()
            .map(|qi| -> RingResult<ShoupConstant<I>> {
                let inv = qi.mod_inverse(t_gamma)?;
                Ok(ShoupConstant::new(inv.mod_neg(t_gamma), t_gamma))
            })
            .collect::<RingResult<Vec<_>>>()?;
        Ok(Self {
            q,
            t,
            t_gamma,
            output,
            t_gamma_q_hat_inv_mod_q,
            neg_q_inv_mod_t_gamma,
        })
    }
}

/// Which side of `Q ∪ P` the basis ScaleAndRound keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleTarget {
    /// Keep `P`, scale by `t / Q`.
    Trailing,
    /// Keep `Q`, scale by `t / P`.
    Leading,
}

/// Constants for the basis-to-basis ScaleAndRound over `Q ∪ P`.
///
/// With `S` the dropped side and `O` the kept side, `θ_k` the CRT
/// cofactor inverse of the full basis:
/// `int_parts[j][k] = floor(t * θ_k * O / s_k) mod o_j` for `k < |S|`,
/// `int_parts[j][|S|] = t * θ_{o_j} * (O / o_j) mod o_j`.
#[derive(Debug, Clone)]
pub struct BasisScaleTables<I: ModularArithmetic> {
    pub(super) input: Arc<RnsBasis<I>>,
    pub(super) output: Arc<RnsBasis<I>>,
    pub(super) target: ScaleTarget,
    pub(super) int_parts: Vec<Vec<I>>,
    pub(super) frac_parts: Vec<f64>,
    pub(super) lazy: usize,
}

impl<I: ModularArithmetic> BasisScaleTables<I> {
    #[instrument(level = "debug", skip_all, fields(
        q = q.tower_count(),
        p = p.tower_count(),
        target = ?target,
    ))]
    pub fn new(
        q: Arc<RnsBasis<I>>,
        p: Arc<RnsBasis<I>>,
        t: I,
        target: ScaleTarget,
    ) -> RingResult<Self> {
        if I::BITS < 64 {
            return Err(RingError::NotImplemented(
                "basis ScaleAndRound on 32-bit words",
            ));
        }
        let input = Arc::new(q.concat(&p)?);
        let (dropped, kept, dropped_offset, kept_offset) = match target {
            ScaleTarget::Trailing => (&q, &p, 0, q.tower_count()),
            ScaleTarget::Leading => (&p, &q, q.tower_count(), 0),
        };
        let thetas = input.q_hat_inv_mod_q();
        let big_t = BigInteger::from_word(t);
        let kept_product = kept.modulus();

        let mut quotients = Vec::with_capacity(dropped.tower_count());
        let mut frac_parts = Vec::with_capacity(dropped.tower_count());
        for (k, sk) in dropped.moduli().into_iter().enumerate() {
            let numerator = big_t
                .mul_unchecked(&BigInteger::from_word(thetas[dropped_offset + k]))
                .mul_unchecked(kept_product);
            let (quotient, remainder) = numerator.div_mod(&BigInteger::from_word(sk))?;
            quotients.push(quotient);
            frac_parts.push(remainder.to_f64() / sk.to_f64());
        }

        let int_parts = kept
            .moduli()
            .into_iter()
            .enumerate()
            .map(|(j, oj)| -> RingResult<Vec<I>> {
                let mut row = residues(&quotients, oj)?;
                let own = big_t
                    .mul_unchecked(&BigInteger::from_word(thetas[kept_offset + j]))
                    .mul_unchecked(&kept.q_hat()[j]);
                row.push(reduce(&own, oj)?);
                Ok(row)
            })
            .collect::<RingResult<Vec<_>>>()?;

        let lazy = lazy_terms::<I>(max_bits(&input), max_bits(kept));
        Ok(Self {
            output: Arc::clone(kept),
            input,
            target,
            int_parts,
            frac_parts,
            lazy,
        })
    }

    pub fn input(&self) -> &Arc<RnsBasis<I>> {
        &self.input
    }

    pub fn output(&self) -> &Arc<RnsBasis<I>> {
        &self.output
    }
}

// ─── BEHZ ─────────────────────────────────────────────────────────────────────

/// Constants for the BEHZ conversions between `Q` and the auxiliary basis
/// `Bsk = B ∪ {m_sk}`.
#[derive(Debug, Clone)]
pub struct BehzTables<I: ModularArithmetic> {
    pub(super) q: Arc<RnsBasis<I>>,
    /// `B` towers first, `m_sk` last
    pub(super) bsk: Arc<RnsBasis<I>>,
    pub(super) q_bsk: Arc<RnsBasis<I>>,
    pub(super) b_size: usize,

    /// `mtilde * θ_i mod q_i`
    pub(super) mtilde_q_hat_inv_mod_q: Vec<ShoupConstant<I>>,
    /// `[j][i] = (Q/q_i) mod bsk_j`
    pub(super) q_hat_mod_bsk: Vec<Vec<I>>,
    /// `(Q/q_i) mod mtilde`
    pub(super) q_hat_mod_mtilde: Vec<u64>,
    /// `-Q^{-1} mod mtilde`
    pub(super) neg_q_inv_mod_mtilde: u64,
    pub(super) q_mod_bsk: Vec<ShoupConstant<I>>,
    pub(super) mtilde_inv_mod_bsk: Vec<ShoupConstant<I>>,

    /// `t * θ_i mod q_i`
    pub(super) t_q_hat_inv_mod_q: Vec<ShoupConstant<I>>,
    /// `[j][i] = q_i^{-1} mod bsk_j`
    pub(super) q_inv_mod_bsk: Vec<Vec<I>>,
    /// `t * Q^{-1} mod bsk_j`
    pub(super) t_q_inv_mod_bsk: Vec<ShoupConstant<I>>,

    /// `(B/b_i)^{-1} mod b_i`
    pub(super) b_hat_inv_mod_b: Vec<ShoupConstant<I>>,
    /// `[j][i] = (B/b_i) mod q_j`
    pub(super) b_hat_mod_q: Vec<Vec<I>>,
    /// `(B/b_i) mod m_sk`
    pub(super) b_hat_mod_msk: Vec<I>,
    pub(super) b_inv_mod_msk: ShoupConstant<I>,
    pub(super) b_mod_q: Vec<ShoupConstant<I>>,

    pub(super) lazy_to_bsk: usize,
    pub(super) lazy_to_q: usize,
    pub(super) lazy_to_msk: usize,
}

impl<I: ModularArithmetic> BehzTables<I> {
    /// Picks `B` as the `|Q|` NTT-friendly primes below the last modulus of
    /// `Q` and `m_sk` as the next one, adding primes to `B` until
    /// `Q * B * m_sk >= 2 * n * Q^2 * t`.
    #[instrument(level = "debug", skip_all, fields(q = q.tower_count(), t = %t))]
    pub fn generate(q: Arc<RnsBasis<I>>, t: I) -> RingResult<Self> {
        let order = q.cyclotomic_order();
        let q_moduli = q.moduli();
        let next_below = |from: I| -> RingResult<I> {
            let mut candidate = from;
            loop {
                candidate = previous_prime(candidate, order).ok_or(
                    RingError::PrimeGenerationFailed {
                        bits: from.msb(),
                        order,
                    },
                )?;
                if !q_moduli.contains(&candidate) {
                    return Ok(candidate);
                }
            }
        };

        let mut cursor = *q_moduli.last().ok_or(RingError::EmptyBasis)?;
        let mut b = Vec::with_capacity(q_moduli.len() + 1);
        for _ in 0..q_moduli.len() {
            cursor = next_below(cursor)?;
            b.push(cursor);
        }
        let mut msk = next_below(cursor)?;

        let bound = BigInteger::from_u64(2 * q.ring_dimension() as u64)
            .mul_unchecked(q.modulus())
            .mul_unchecked(&BigInteger::from_word(t));
        let product = |b: &[I], msk: I| {
            b.iter()
                .fold(BigInteger::from_word(msk), |acc, &bi| {
                    acc.mul_unchecked(&BigInteger::from_word(bi))
                })
        };
        while product(&b, msk) < bound {
            b.push(msk);
            msk = next_below(msk)?;
            debug!(b_size = b.len(), "enlarged BEHZ auxiliary basis");
        }

        Self::with_auxiliary(q, b, msk, t)
    }

    /// Builds the tables for explicit auxiliary moduli. Every auxiliary
    /// modulus must exceed `2^16` and be coprime to `Q`.
    #[instrument(level = "debug", skip_all, fields(q = q.tower_count(), b = b.len()))]
    pub fn with_auxiliary(q: Arc<RnsBasis<I>>, b: Vec<I>, msk: I, t: I) -> RingResult<Self> {
        if b.is_empty() {
            return Err(RingError::EmptyBasis);
        }
        let order = q.cyclotomic_order();
        let mut bsk_moduli = b;
        bsk_moduli.push(msk);
        if let Some(&small) = bsk_moduli.iter().find(|m| m.as_u128() <= MTILDE as u128) {
            return Err(RingError::modulus_mismatch(
                format!("modulus above {MTILDE}"),
                small,
            ));
        }
        let roots = bsk_moduli
            .iter()
            .map(|&m| find_primitive_root(m, order).unwrap_or(I::ZERO))
            .collect();
        let bsk = Arc::new(RnsBasis::new(order, bsk_moduli.clone(), roots)?);
        let b_basis = bsk.slice(0, bsk.tower_count() - 1)?;
        let q_bsk = Arc::new(q.concat(&bsk)?);
        let q_moduli = q.moduli();
        let b_moduli = b_basis.moduli();
        let big_t = BigInteger::from_word(t);
        let mtilde = BigInteger::from_u64(MTILDE);

        let mtilde_q_hat_inv_mod_q = q
            .q_hat_inv_mod_q()
            .iter()
            .zip(&q_moduli)
            .map(|(&theta, &qi)| ShoupConstant::new(theta.mod_mul(I::from_u64(MTILDE), qi), qi))
            .collect();
        let q_hat_mod_bsk = bsk_moduli
            .iter()
            .map(|&m| residues(q.q_hat(), m))
            .collect::<RingResult<Vec<_>>>()?;
        let q_hat_mod_mtilde = q
            .q_hat()
            .iter()
            .map(|h| -> RingResult<u64> { Ok(h.modulo(&mtilde)?.to_u64()?) })
            .collect::<RingResult<Vec<_>>>()?;
        let q_mod_mtilde = q.modulus().modulo(&mtilde)?.to_u64()?;
        let neg_q_inv_mod_mtilde = q_mod_mtilde.mod_inverse(MTILDE)?.mod_neg(MTILDE);
        let q_mod_bsk = bsk_moduli
            .iter()
            .map(|&m| shoup(q.modulus(), m))
            .collect::<RingResult<Vec<_>>>()?;
        let mtilde_inv_mod_bsk = bsk_moduli
            .iter()
            .map(|&m| inverse_shoup(&mtilde, m))
            .collect::<RingResult<Vec<_>>>()?;

        let t_q_hat_inv_mod_q = q
            .q_hat_inv_mod_q()
            .iter()
            .zip(&q_moduli)
            .map(|(&theta, &qi)| ShoupConstant::new(theta.mod_mul(t, qi), qi))
            .collect();
        let q_inv_mod_bsk = bsk_moduli
            .iter()
            .map(|&m| {
                q_moduli
                    .iter()
                    .map(|&qi| -> RingResult<I> { Ok(qi.mod_inverse(m)?) })
                    .collect::<RingResult<Vec<_>>>()
            })
            .collect::<RingResult<Vec<_>>>()?;
        let t_q_inv_mod_bsk = bsk_moduli
            .iter()
            .map(|&m| -> RingResult<ShoupConstant<I>> {
                let q_inv = inverse(q.modulus(), m)?;
                Ok(ShoupConstant::new(q_inv.mod_mul(reduce(&big_t, m)?, m), m))
            })
            .collect::<RingResult<Vec<_>>>()?;

        let b_hat_inv_mod_b = b_basis
            .q_hat_inv_mod_q()
            .iter()
            .zip(&b_moduli)
            .map(|(&inv, &bi)| ShoupConstant::new(inv, bi))
            .collect();
        let b_hat_mod_q = q_moduli
            .iter()
            .map(|&qj| residues(b_basis.q_hat(), qj))
            .collect::<RingResult<Vec<_>>>()?;
        let b_hat_mod_msk = residues(b_basis.q_hat(), msk)?;
        let b_inv_mod_msk = inverse_shoup(b_basis.modulus(), msk)?;
        let b_mod_q = q_moduli
            .iter()
            .map(|&qi| shoup(b_basis.modulus(), qi))
            .collect::<RingResult<Vec<_>>>()?;

        let lazy_to_bsk = lazy_terms::<I>(max_bits(&q), max_bits(&bsk));
        let lazy_to_q = lazy_terms::<I>(max_bits(&bsk), max_bits(&q));
        let lazy_to_msk = lazy_terms::<I>(max_bits(&bsk), max_bits(&bsk));
        Ok(Self {
            b_size: b_moduli.len(),
            q,
            bsk,
            q_bsk,
            mtilde_q_hat_inv_mod_q,
            q_hat_mod_bsk,
            q_hat_mod_mtilde,
            neg_q_inv_mod_mtilde,
            q_mod_bsk,
            mtilde_inv_mod_bsk,
            t_q_hat_inv_mod_q,
            q_inv_mod_bsk,
            t_q_inv_mod_bsk,
            b_hat_inv_mod_b,
            b_hat_mod_q,
            b_hat_mod_msk,
            b_inv_mod_msk,
            b_mod_q,
            lazy_to_bsk,
            lazy_to_q,
            lazy_to_msk,
        })
    }

    pub fn q(&self) -> &Arc<RnsBasis<I>> {
        &self.q
    }

    /// `B ∪ {m_sk}` with `m_sk` as the last tower.
    pub fn bsk(&self) -> &Arc<RnsBasis<I>> {
        &self.bsk
    }

    pub fn q_bsk(&self) -> &Arc<RnsBasis<I>> {
        &self.q_bsk
    }
}

// ─── Rescaling ────────────────────────────────────────────────────────────────

/// Constants for dropping the last tower of a level-`l` polynomial.
#[derive(Debug, Clone)]
pub(super) struct LevelTable<I: ModularArithmetic> {
    /// the basis after the drop
    pub(super) basis: Arc<RnsBasis<I>>,
    /// `q_l^{-1} mod q_i`
    pub(super) ql_inv_mod_q: Vec<ShoupConstant<I>>,
    /// `-q_l^{-1} mod q_i`
    pub(super) neg_ql_inv_mod_q: Vec<ShoupConstant<I>>,
}

fn level_tables<I: ModularArithmetic>(q: &RnsBasis<I>) -> RingResult<Vec<LevelTable<I>>> {
    let moduli = q.moduli();
    (1..moduli.len())
        .map(|l| -> RingResult<LevelTable<I>> {
            let ql = moduli[l];
            let inverses = moduli[..l]
                .iter()
                .map(|&qi| -> RingResult<(I, I)> { Ok((ql.mod_inverse(qi)?, qi)) })
                .collect::<RingResult<Vec<_>>>()?;
            Ok(LevelTable {
                basis: Arc::new(q.slice(0, l)?),
                ql_inv_mod_q: inverses
                    .iter()
                    .map(|&(inv, qi)| ShoupConstant::new(inv, qi))
                    .collect(),
                neg_ql_inv_mod_q: inverses
                    .iter()
                    .map(|&(inv, qi)| ShoupConstant::new(inv.mod_neg(qi), qi))
                    .collect(),
            })
        })
        .collect()
}

fn level_for<I: ModularArithmetic>(
    levels: &[LevelTable<I>],
    towers: usize,
) -> RingResult<&LevelTable<I>> {
    if towers < 2 {
        return Err(RingError::InsufficientTowers {
            requested: 1,
            available: towers,
        });
    }
    levels.get(towers - 2).ok_or(RingError::TowerCountMismatch {
        expected: levels.len() + 1,
        actual: towers,
    })
}

/// Per-level constants for CKKS rescaling by the last modulus.
#[derive(Debug, Clone)]
pub struct RescaleTables<I: ModularArithmetic> {
    pub(super) q: Arc<RnsBasis<I>>,
    pub(super) levels: Vec<LevelTable<I>>,
}

impl<I: ModularArithmetic> RescaleTables<I> {
    #[instrument(level = "debug", skip_all, fields(q = q.tower_count()))]
    pub fn new(q: Arc<RnsBasis<I>>) -> RingResult<Self> {
        let levels = level_tables(&q)?;
        Ok(Self { q, levels })
    }

    pub fn q(&self) -> &Arc<RnsBasis<I>> {
        &self.q
    }

    pub(super) fn level(&self, towers: usize) -> RingResult<&LevelTable<I>> {
        level_for(&self.levels, towers)
    }
}

/// Per-level constants for BGV modulus reduction with plaintext modulus `t`.
#[derive(Debug, Clone)]
pub struct ModReduceTables<I: ModularArithmetic> {
    pub(super) q: Arc<RnsBasis<I>>,
    pub(super) levels: Vec<LevelTable<I>>,
    /// `t mod q_i`
    pub(super) t_mod_q: Vec<ShoupConstant<I>>,
    /// `-t^{-1} mod q_i`
    pub(super) neg_t_inv_mod_q: Vec<ShoupConstant<I>>,
}

impl<I: ModularArithmetic> ModReduceTables<I> {
    #[instrument(level = "debug", skip_all, fields(q = q.tower_count(), t = %t))]
    pub fn new(q: Arc<RnsBasis<I>>, t: I) -> RingResult<Self> {
        let levels = level_tables(&q)?;
        let big_t = BigInteger::from_word(t);
        let moduli = q.moduli();
        let t_mod_q = moduli
            .iter()
            .map(|&qi| shoup(&big_t, qi))
            .collect::<RingResult<Vec<_>>>()?;
        let neg_t_inv_mod_q = moduli
            .iter()
            .map(|&qi| -> RingResult<ShoupConstant<I>> {
                let inv = inverse(&big_t, qi)?;
                Ok(ShoupConstant::new(inv.mod_neg(qi), qi))
            })
            .collect::<RingResult<Vec<_>>>()?;
        Ok(Self {
            q,
            levels,
            t_mod_q,
            neg_t_inv_mod_q,
        })
    }

    pub fn q(&self) -> &Arc<RnsBasis<I>> {
        &self.q
    }

    pub(super) fn level(&self, towers: usize) -> RingResult<&LevelTable<I>> {
        level_for(&self.levels, towers)
    }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn check_dimensions<I: ModularArithmetic>(a: &RnsBasis<I>, b: &RnsBasis<I>) -> RingResult<()> {
    if a.ring_dimension() != b.ring_dimension() {
        return Err(RingError::DimensionMismatch {
            expected: a.ring_dimension(),
            actual: b.ring_dimension(),
        });
    }
    Ok(())
}

pub(super) fn max_bits<I: ModularArithmetic>(basis: &RnsBasis<I>) -> u32 {
    basis.moduli().iter().map(|m| m.msb()).max().unwrap_or(0)
}

fn reduce<I: ModularArithmetic>(value: &BigInteger, modulus: I) -> RingResult<I> {
    Ok(value.modulo(&BigInteger::from_word(modulus))?.to_word()?)
}

fn residues<I: ModularArithmetic>(values: &[BigInteger], modulus: I) -> RingResult<Vec<I>> {
    values.iter().map(|v| reduce(v, modulus)).collect()
}

fn inverse<I: ModularArithmetic>(value: &BigInteger, modulus: I) -> RingResult<I> {
    Ok(reduce(value, modulus)?.mod_inverse(modulus)?)
}

fn shoup<I: ModularArithmetic>(value: &BigInteger, modulus: I) -> RingResult<ShoupConstant<I>> {
    Ok(ShoupConstant::new(reduce(value, modulus)?, modulus))
}

fn inverse_shoup<I: ModularArithmetic>(
    value: &BigInteger,
    modulus: I,
) -> RingResult<ShoupConstant<I>> {
    Ok(ShoupConstant::new(inverse(value, modulus)?, modulus))
}

/// `(floor(numerator / divisor) mod t, frac(numerator / divisor))`
fn split_quotient<I: ModularArithmetic>(
    numerator: &BigInteger,
    divisor: I,
    t: I,
) -> RingResult<(I, f64)> {
    let (quotient, remainder) = numerator.div_mod(&BigInteger::from_word(divisor))?;
    Ok((
        reduce(&quotient, t)?,
        remainder.to_f64() / divisor.to_f64(),
    ))
}

fn prefixes<I: ModularArithmetic>(q: &Arc<RnsBasis<I>>) -> RingResult<Vec<Arc<RnsBasis<I>>>> {
    let count = q.tower_count();
    (1..=count)
        .map(|k| -> RingResult<Arc<RnsBasis<I>>> {
            if k == count {
                Ok(Arc::clone(q))
            } else {
                Ok(Arc::new(q.slice(0, k)?))
            }
        })
        .collect()
}
