//! Negacyclic number-theoretic transform over `Z_q[X] / (X^n + 1)`.
//!
//! Twiddles are powers of a primitive `2n`-th root `psi` stored in
//! bit-reversed order together with their Shoup companions, so every
//! butterfly costs one high-word product. The forward transform leaves its
//! output in bit-reversed order and the inverse consumes that order, which is
//! all pointwise multiplication needs.

use crate::math::{ModularArithmetic, is_primitive_root};
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

use super::errors::{RingError, RingResult};

pub trait NumberTheoreticTransform<I> {
    /// Coefficient to evaluation representation.
    fn forward_in_place(&self, values: &mut [I]);
    /// Evaluation to coefficient representation.
    fn inverse_in_place(&self, values: &mut [I]);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NttTable<I> {
    modulus: I,
    root: I,
    cyclotomic_order: u64,
    psi_rev: Vec<I>,
    psi_rev_precon: Vec<I>,
    psi_inv_rev: Vec<I>,
    psi_inv_rev_precon: Vec<I>,
    n_inv: I,
    n_inv_precon: I,
}

impl<I: ModularArithmetic> NttTable<I> {
    /// Builds the tables for `X^(m/2) + 1` modulo `modulus`, where `root` is a
    /// primitive `m`-th root of unity and `m = cyclotomic_order`.
    pub fn new(cyclotomic_order: u64, modulus: I, root: I) -> RingResult<Self> {
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
        if !is_primitive_root(root, modulus, cyclotomic_order) {
            return Err(RingError::InvalidRootOfUnity {
                root: root.to_string(),
                modulus: modulus.to_string(),
                order: cyclotomic_order,
            });
        }

        let n = (cyclotomic_order / 2) as usize;
        let bit_count = n.trailing_zeros() as usize;
        let root_inv = root.mod_inverse(modulus)?;

        let psi_rev = bit_reversed_powers(root, modulus, n, bit_count);
        let psi_inv_rev = bit_reversed_powers(root_inv, modulus, n, bit_count);
        let psi_rev_precon = psi_rev
            .iter()
            .map(|w| w.prep_mod_mul_const(modulus))
            .collect();
        let psi_inv_rev_precon = psi_inv_rev
            .iter()
            .map(|w| w.prep_mod_mul_const(modulus))
            .collect();

        let n_inv = I::from_u64(n as u64).mod_inverse(modulus)?;
        debug!(%modulus, n, "built NTT table");
        Ok(Self {
            modulus,
            root,
            cyclotomic_order,
            psi_rev,
            psi_rev_precon,
            psi_inv_rev,
            psi_inv_rev_precon,
            n_inv,
            n_inv_precon: n_inv.prep_mod_mul_const(modulus),
        })
    }

    pub fn modulus(&self) -> I {
        self.modulus
    }

    pub fn root(&self) -> I {
        self.root
    }

    pub fn cyclotomic_order(&self) -> u64 {
        self.cyclotomic_order
    }

    pub fn ring_dimension(&self) -> usize {
        self.psi_rev.len()
    }
}

impl<I: ModularArithmetic> NumberTheoreticTransform<I> for NttTable<I> {
    fn forward_in_place(&self, values: &mut [I]) {
        let n = self.ring_dimension();
        debug_assert_eq!(values.len(), n, "forward_in_place: length mismatch");
        let q = self.modulus;

        let mut span = n;
        let mut groups = 1;
        while groups < n {
            span /= 2;
            for group in 0..groups {
                let w = self.psi_rev[groups + group];
                let w_precon = self.psi_rev_precon[groups + group];
                let start = 2 * group * span;
                for j in start..start + span {
                    let u = values[j];
                    let v = values[j + span].mod_mul_fast_const(w, q, w_precon);
                    values[j] = u.mod_add_fast(v, q);
                    values[j + span] = u.mod_sub_fast(v, q);
                }
            }
            groups *= 2;
        }
    }

    fn inverse_in_place(&self, values: &mut [I]) {
        let n = self.ring_dimension();
        debug_assert_eq!(values.len(), n, "inverse_in_place: length mismatch");
        let q = self.modulus;

        let mut span = 1;
        let mut groups = n;
        while groups > 1 {
            let half = groups / 2;
            let mut start = 0;
            for group in 0..half {
                let w = self.psi_inv_rev[half + group];
                let w_precon = self.psi_inv_rev_precon[half + group];
                for j in start..start + span {
                    let u = values[j];
                    let v = values[j + span];
                    values[j] = u.mod_add_fast(v, q);
                    values[j + span] = u.mod_sub_fast(v, q).mod_mul_fast_const(w, q, w_precon);
                }
                start += 2 * span;
            }
            span *= 2;
            groups = half;
        }

        for value in values.iter_mut() {
            *value = value.mod_mul_fast_const(self.n_inv, q, self.n_inv_precon);
        }
    }
}

/// Shares NTT tables between bases built over the same primes.
///
/// Keyed by `(cyclotomic_order, modulus)`. A request with a different root
/// for a cached key gets a fresh, uncached table.
#[derive(Debug)]
pub struct NttTableCache<I> {
    tables: HashMap<(u64, I), Arc<NttTable<I>>>,
}

impl<I: ModularArithmetic> Default for NttTableCache<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ModularArithmetic> NttTableCache<I> {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    pub fn get(&self, cyclotomic_order: u64, modulus: I) -> Option<Arc<NttTable<I>>> {
        self.tables.get(&(cyclotomic_order, modulus)).cloned()
    }

    pub fn get_or_build(
        &mut self,
        cyclotomic_order: u64,
        modulus: I,
        root: I,
    ) -> RingResult<Arc<NttTable<I>>> {
        if let Some(table) = self.tables.get(&(cyclotomic_order, modulus)) {
            if table.root == root {
                return Ok(Arc::clone(table));
            }
            debug!(%modulus, %root, "cached NTT table uses a different root");
            return Ok(Arc::new(NttTable::new(cyclotomic_order, modulus, root)?));
        }
        let table = Arc::new(NttTable::new(cyclotomic_order, modulus, root)?);
        self.tables
            .insert((cyclotomic_order, modulus), Arc::clone(&table));
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn clear(&mut self) {
        self.tables.clear();
    }
}

// ─── Private helpers ──────────────────────────────────────────────────────────

fn bit_reversed_powers<I: ModularArithmetic>(
    base: I,
    modulus: I,
    n: usize,
    bit_count: usize,
) -> Vec<I> {
    let mut powers = Vec::with_capacity(n);
    let mut current = I::ONE;
    for _ in 0..n {
        powers.push(current);
        current = current.mod_mul(base, modulus);
    }
    (0..n)
        .map(|index| powers[reverse_bits(index, bit_count)])
        .collect()
}

pub(crate) fn reverse_bits(value: usize, bit_count: usize) -> usize {
    if bit_count == 0 {
        return 0;
    }
    value.reverse_bits() >> (usize::BITS as usize - bit_count)
}
