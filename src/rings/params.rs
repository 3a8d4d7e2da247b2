//! Ring parameters: one modulus ([`ElementParams`]) and a CRT basis of them
//! ([`RnsBasis`]), plus a builder that generates NTT-friendly primes.

use crate::math::{
    BigInteger, ModularArithmetic, find_primitive_root, first_prime_down, is_prime, previous_prime,
};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{
    errors::{RingError, RingResult},
    ntt::{NttTable, NttTableCache},
};

/// Parameters of one tower: `Z_q[X] / (X^n + 1)` with `n = m / 2`.
///
/// A zero `root_of_unity` means the tower has no NTT table and can only be
/// used in coefficient format.
#[derive(Debug, Clone)]
pub struct ElementParams<I: ModularArithmetic> {
    cyclotomic_order: u64,
    modulus: I,
    root_of_unity: I,
    wide_mu: I::Double,
    ntt: Option<Arc<NttTable<I>>>,
}

impl<I: ModularArithmetic> ElementParams<I> {
    pub fn new(cyclotomic_order: u64, modulus: I, root_of_unity: I) -> RingResult<Self> {
        Self::validate(cyclotomic_order, modulus)?;
        let ntt = if root_of_unity == I::ZERO {
            None
        } else {
            Some(Arc::new(NttTable::new(
                cyclotomic_order,
                modulus,
                root_of_unity,
            )?))
        };
        Ok(Self::assemble(cyclotomic_order, modulus, root_of_unity, ntt))
    }

    /// Same as [`ElementParams::new`] but shares the NTT table through `cache`.
    pub fn with_cache(
        cyclotomic_order: u64,
        modulus: I,
        root_of_unity: I,
        cache: &mut NttTableCache<I>,
    ) -> RingResult<Self> {
        Self::validate(cyclotomic_order, modulus)?;
        let ntt = if root_of_unity == I::ZERO {
            None
        } else {
            Some(cache.get_or_build(cyclotomic_order, modulus, root_of_unity)?)
        };
        Ok(Self::assemble(cyclotomic_order, modulus, root_of_unity, ntt))
    }

    fn validate(cyclotomic_order: u64, modulus: I) -> RingResult<()> {
        if cyclotomic_order < 2 || !cyclotomic_order.is_power_of_two() {
            return Err(RingError::InvalidCyclotomicOrder {
                order: cyclotomic_order,
            });
        }
        let max_bits = I::BITS - 2;
        if modulus.msb() > max_bits {
            return Err(RingError::ModulusTooLarge {
                modulus: modulus.to_string(),
                max_bits,
            });
        }
        if modulus < I::from_u64(2) {
            return Err(RingError::modulus_mismatch("a modulus of at least 2", modulus));
        }
        Ok(())
    }

    fn assemble(
        cyclotomic_order: u64,
        modulus: I,
        root_of_unity: I,
        ntt: Option<Arc<NttTable<I>>>,
    ) -> Self {
        Self {
            cyclotomic_order,
            modulus,
            root_of_unity,
            wide_mu: modulus.compute_wide_mu(),
            ntt,
        }
    }

    pub fn cyclotomic_order(&self) -> u64 {
        self.cyclotomic_order
    }

    pub fn ring_dimension(&self) -> usize {
        (self.cyclotomic_order / 2) as usize
    }

    pub fn modulus(&self) -> I {
        self.modulus
    }

    pub fn root_of_unity(&self) -> I {
        self.root_of_unity
    }

    /// Wide Barrett constant used to reduce double-word accumulators.
    pub fn wide_mu(&self) -> I::Double {
        self.wide_mu
    }

    pub fn big_modulus(&self) -> BigInteger {
        BigInteger::from_word(self.modulus)
    }

    pub fn has_ntt(&self) -> bool {
        self.ntt.is_some()
    }

    pub fn ntt(&self) -> RingResult<&NttTable<I>> {
        self.ntt
            .as_deref()
            .ok_or_else(|| RingError::MissingRootOfUnity {
                modulus: self.modulus.to_string(),
            })
    }

    /// `true` when both describe the same ring, ignoring the root.
    pub fn same_ring(&self, other: &Self) -> bool {
        self.cyclotomic_order == other.cyclotomic_order && self.modulus == other.modulus
    }

    /// Reduces a double-width accumulator modulo this tower's modulus.
    #[inline]
    pub fn reduce(&self, value: I::Double) -> I {
        I::reduce_wide(value, self.modulus, self.wide_mu)
    }
}

/// An ordered CRT basis `{q_0, ..., q_{N-1}}` over one cyclotomic order.
///
/// Immutable after construction. The product `Q`, the cofactors `Q / q_i`
/// and `[(Q / q_i)^{-1}]_{q_i}` are computed once for interpolation.
#[derive(Debug, Clone)]
pub struct RnsBasis<I: ModularArithmetic> {
    cyclotomic_order: u64,
    towers: Vec<Arc<ElementParams<I>>>,
    modulus: BigInteger,
    modulus_mu: BigInteger,
    q_hat: Vec<BigInteger>,
    q_hat_inv_mod_q: Vec<I>,
}

impl<I: ModularArithmetic> RnsBasis<I> {
    pub fn new(cyclotomic_order: u64, moduli: Vec<I>, roots: Vec<I>) -> RingResult<Self> {
        if moduli.len() != roots.len() {
            return Err(RingError::TowerCountMismatch {
                expected: moduli.len(),
                actual: roots.len(),
            });
        }
        let towers = moduli
            .into_iter()
            .zip(roots)
            .map(|(q, root)| ElementParams::new(cyclotomic_order, q, root).map(Arc::new))
            .collect::<RingResult<Vec<_>>>()?;
        Self::from_towers(towers)
    }

    pub fn with_cache(
        cyclotomic_order: u64,
        moduli: Vec<I>,
        roots: Vec<I>,
        cache: &mut NttTableCache<I>,
    ) -> RingResult<Self> {
        if moduli.len() != roots.len() {
            return Err(RingError::TowerCountMismatch {
                expected: moduli.len(),
                actual: roots.len(),
            });
        }
        let towers = moduli
            .into_iter()
            .zip(roots)
            .map(|(q, root)| {
                ElementParams::with_cache(cyclotomic_order, q, root, cache).map(Arc::new)
            })
            .collect::<RingResult<Vec<_>>>()?;
        Self::from_towers(towers)
    }

    /// Assembles a basis from existing tower parameters.
    pub fn from_towers(towers: Vec<Arc<ElementParams<I>>>) -> RingResult<Self> {
        let Some(first) = towers.first() else {
            return Err(RingError::EmptyBasis);
        };
        let cyclotomic_order = first.cyclotomic_order();
        if let Some(bad) = towers
            .iter()
            .find(|tower| tower.cyclotomic_order() != cyclotomic_order)
        {
            return Err(RingError::DimensionMismatch {
                expected: first.ring_dimension(),
                actual: bad.ring_dimension(),
            });
        }

        let modulus = towers
            .iter()
            .fold(BigInteger::one(), |acc, tower| {
                acc.mul_unchecked(&tower.big_modulus())
            });
        let modulus_mu = modulus.compute_mu()?;
        let mut q_hat = Vec::with_capacity(towers.len());
        let mut q_hat_inv_mod_q = Vec::with_capacity(towers.len());
        for tower in &towers {
            let big_q = tower.big_modulus();
            let cofactor = modulus.divided_by(&big_q)?;
            let residue: I = cofactor.modulo(&big_q)?.to_word()?;
            q_hat_inv_mod_q.push(residue.mod_inverse(tower.modulus())?);
            q_hat.push(cofactor);
        }

        Ok(Self {
            cyclotomic_order,
            towers,
            modulus,
            modulus_mu,
            q_hat,
            q_hat_inv_mod_q,
        })
    }

    pub fn cyclotomic_order(&self) -> u64 {
        self.cyclotomic_order
    }

    pub fn ring_dimension(&self) -> usize {
        (self.cyclotomic_order / 2) as usize
    }

    pub fn tower_count(&self) -> usize {
        self.towers.len()
    }

    pub fn towers(&self) -> &[Arc<ElementParams<I>>] {
        &self.towers
    }

    pub fn tower(&self, index: usize) -> RingResult<&Arc<ElementParams<I>>> {
        self.towers.get(index).ok_or(RingError::IndexError {
            index,
            bound: self.towers.len(),
        })
    }

    pub fn moduli(&self) -> Vec<I> {
        self.towers.iter().map(|tower| tower.modulus()).collect()
    }

    pub fn roots_of_unity(&self) -> Vec<I> {
        self.towers.iter().map(|tower| tower.root_of_unity()).collect()
    }

    /// The product `Q` of all moduli.
    pub fn modulus(&self) -> &BigInteger {
        &self.modulus
    }

    /// Barrett constant of [`RnsBasis::modulus`].
    pub fn modulus_mu(&self) -> &BigInteger {
        &self.modulus_mu
    }

    /// `Q / q_i` for every tower.
    pub fn q_hat(&self) -> &[BigInteger] {
        &self.q_hat
    }

    /// `[(Q / q_i)^{-1}]_{q_i}` for every tower.
    pub fn q_hat_inv_mod_q(&self) -> &[I] {
        &self.q_hat_inv_mod_q
    }

    pub fn same_moduli(&self, other: &Self) -> bool {
        self.cyclotomic_order == other.cyclotomic_order
            && self.towers.len() == other.towers.len()
            && self
                .towers
                .iter()
                .zip(&other.towers)
                .all(|(a, b)| a.modulus() == b.modulus())
    }

    // ─── Derived bases ────────────────────────────────────────────────────────

    /// Basis without its last `drop_count` towers.
    pub fn drop_last(&self, drop_count: usize) -> RingResult<Self> {
        if drop_count >= self.towers.len() {
            return Err(RingError::InsufficientTowers {
                requested: drop_count,
                available: self.towers.len(),
            });
        }
        Self::from_towers(self.towers[..self.towers.len() - drop_count].to_vec())
    }

    /// Basis of towers `start..end`.
    pub fn slice(&self, start: usize, end: usize) -> RingResult<Self> {
        if end > self.towers.len() {
            return Err(RingError::IndexError {
                index: end,
                bound: self.towers.len(),
            });
        }
        if start >= end {
            return Err(RingError::EmptyBasis);
        }
        Self::from_towers(self.towers[start..end].to_vec())
    }

    /// This basis followed by the towers of `other`.
    pub fn concat(&self, other: &Self) -> RingResult<Self> {
        let mut towers = self.towers.clone();
        towers.extend(other.towers.iter().cloned());
        Self::from_towers(towers)
    }

    /// Basis with tower `index` replaced by `params`.
    pub fn replace_tower(&self, index: usize, params: Arc<ElementParams<I>>) -> RingResult<Self> {
        if index >= self.towers.len() {
            return Err(RingError::IndexError {
                index,
                bound: self.towers.len(),
            });
        }
        let mut towers = self.towers.clone();
        towers[index] = params;
        Self::from_towers(towers)
    }
}

// ─── Builder ──────────────────────────────────────────────────────────────────

const DEFAULT_PRIME_BITS: u32 = 30;
const DEFAULT_PRIME_COUNT: usize = 3;

/// Builds an [`RnsBasis`] of NTT-friendly primes for a ring dimension.
///
/// Generated primes are the largest `p = 1 (mod 2n)` below `2^bits`, walking
/// down; all of them keep exactly `bits` bits.
#[derive(Debug, Clone)]
pub struct RnsBasisBuilder {
    ring_dimension: usize,
    prime_bits: u32,
    prime_count: usize,
    custom_primes: Option<Vec<u64>>,
}

impl RnsBasisBuilder {
    pub fn new(ring_dimension: usize) -> Self {
        Self {
            ring_dimension,
            prime_bits: DEFAULT_PRIME_BITS,
            prime_count: DEFAULT_PRIME_COUNT,
            custom_primes: None,
        }
    }

    pub fn with_prime_bits(mut self, bits: u32) -> Self {
        self.prime_bits = bits;
        self
    }

    pub fn with_prime_count(mut self, count: usize) -> Self {
        self.prime_count = count;
        self
    }

    pub fn with_custom_primes(mut self, primes: Vec<u64>) -> Self {
        self.custom_primes = Some(primes);
        self
    }

    pub fn build<I: ModularArithmetic>(self) -> RingResult<Arc<RnsBasis<I>>> {
        let order = self.cyclotomic_order()?;
        let primes = self.get_or_generate_primes::<I>(order)?;
        let roots = roots_for(&primes, order)?;
        Ok(Arc::new(RnsBasis::new(order, primes, roots)?))
    }

    pub fn build_with_cache<I: ModularArithmetic>(
        self,
        cache: &mut NttTableCache<I>,
    ) -> RingResult<Arc<RnsBasis<I>>> {
        let order = self.cyclotomic_order()?;
        let primes = self.get_or_generate_primes::<I>(order)?;
        let roots = roots_for(&primes, order)?;
        Ok(Arc::new(RnsBasis::with_cache(order, primes, roots, cache)?))
    }

    fn cyclotomic_order(&self) -> RingResult<u64> {
        let order = 2 * self.ring_dimension as u64;
        if !self.ring_dimension.is_power_of_two() {
            return Err(RingError::InvalidCyclotomicOrder { order });
        }
        Ok(order)
    }

    fn get_or_generate_primes<I: ModularArithmetic>(&self, order: u64) -> RingResult<Vec<I>> {
        if let Some(ref primes) = self.custom_primes {
            if primes.is_empty() {
                return Err(RingError::EmptyBasis);
            }
            return primes
                .iter()
                .map(|&p| {
                    I::try_from_u128(p as u128).ok_or_else(|| RingError::ModulusTooLarge {
                        modulus: p.to_string(),
                        max_bits: I::BITS - 2,
                    })
                })
                .collect();
        }
        if self.prime_count == 0 {
            return Err(RingError::EmptyBasis);
        }
        generate_primes(self.prime_bits, self.prime_count, order)
    }
}

/// `count` distinct NTT-friendly `bits`-bit primes, largest first.
#[instrument(level = "debug", skip_all, fields(bits = bits, count = count, order = order))]
pub fn generate_primes<I: ModularArithmetic>(
    bits: u32,
    count: usize,
    order: u64,
) -> RingResult<Vec<I>> {
    let max_bits = I::BITS - 2;
    if bits < 2 || bits > max_bits {
        return Err(RingError::ModulusTooLarge {
            modulus: format!("2^{bits}"),
            max_bits,
        });
    }
    let lower_bound = I::ONE << (bits - 1);
    let failed = || RingError::PrimeGenerationFailed { bits, order };

    let mut primes = Vec::with_capacity(count);
    let mut cursor = first_prime_down(I::ONE << bits, order).ok_or_else(failed)?;
    while primes.len() < count {
        if cursor < lower_bound {
            return Err(failed());
        }
        primes.push(cursor);
        if primes.len() == count {
            break;
        }
        cursor = previous_prime(cursor, order).ok_or_else(failed)?;
    }
    debug!(first = %primes[0], count, "generated NTT-friendly primes");
    Ok(primes)
}

fn roots_for<I: ModularArithmetic>(primes: &[I], order: u64) -> RingResult<Vec<I>> {
    primes
        .iter()
        .map(|&p| {
            let root = is_prime(p)
                .then(|| find_primitive_root(p, order))
                .flatten();
            root.ok_or_else(|| RingError::MissingRootOfUnity {
                modulus: p.to_string(),
            })
        })
        .collect()
}
