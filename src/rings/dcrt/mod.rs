//! Double-CRT polynomials: one [`ResiduePolynomial`] tower per RNS modulus.

mod arith;
mod big;
mod crt;

pub use big::BigPolynomial;

use crate::math::{BigInteger, ModularArithmetic, gaussian_signed, ternary_signed};
use rand::Rng;
use rayon::prelude::*;
use std::sync::Arc;

use super::{
    Format,
    errors::{RingError, RingResult},
    params::RnsBasis,
    poly::ResiduePolynomial,
};

/// A polynomial modulo `Q = q_0 * ... * q_{N-1}` stored as its residues.
///
/// Invariant: `towers.len() == basis.tower_count()`, tower `i` lives under
/// `basis.tower(i)`, and every tower is in `format`.
#[derive(Debug, Clone)]
pub struct RnsPolynomial<I: ModularArithmetic> {
    basis: Arc<RnsBasis<I>>,
    towers: Vec<ResiduePolynomial<I>>,
    format: Format,
}

impl<I: ModularArithmetic> PartialEq for RnsPolynomial<I> {
    fn eq(&self, other: &Self) -> bool {
        self.format == other.format
            && self.basis.same_moduli(&other.basis)
            && self.towers == other.towers
    }
}

impl<I: ModularArithmetic> Eq for RnsPolynomial<I> {}

// ─── Constructors ─────────────────────────────────────────────────────────────

impl<I: ModularArithmetic> RnsPolynomial<I> {
    pub fn zero(basis: Arc<RnsBasis<I>>, format: Format) -> Self {
        let towers = basis
            .towers()
            .iter()
            .map(|params| ResiduePolynomial::zero(Arc::clone(params), format))
            .collect();
        Self {
            basis,
            towers,
            format,
        }
    }

    /// Assembles a polynomial from towers that match `basis` one to one.
    pub fn from_towers(
        basis: Arc<RnsBasis<I>>,
        towers: Vec<ResiduePolynomial<I>>,
    ) -> RingResult<Self> {
        if towers.len() != basis.tower_count() {
            return Err(RingError::TowerCountMismatch {
                expected: basis.tower_count(),
                actual: towers.len(),
            });
        }
        let format = towers[0].format();
        for (tower, params) in towers.iter().zip(basis.towers()) {
            if tower.ring_dimension() != params.ring_dimension() {
                return Err(RingError::DimensionMismatch {
                    expected: params.ring_dimension(),
                    actual: tower.ring_dimension(),
                });
            }
            if tower.modulus() != params.modulus() {
                return Err(RingError::modulus_mismatch(params.modulus(), tower.modulus()));
            }
            if tower.format() != format {
                return Err(RingError::format_mismatch(format, tower.format()));
            }
        }
        Ok(Self {
            basis,
            towers,
            format,
        })
    }

    /// Reduces small signed coefficients into every tower.
    pub fn from_signed_coefficients(
        basis: Arc<RnsBasis<I>>,
        coefficients: &[i64],
        format: Format,
    ) -> RingResult<Self> {
        let towers = basis
            .towers()
            .par_iter()
            .map(|params| {
                ResiduePolynomial::from_signed(Arc::clone(params), coefficients)?
                    .into_format(format)
            })
            .collect::<RingResult<Vec<_>>>()?;
        Ok(Self::from_parts_unchecked(basis, towers, format))
    }

    /// The constant polynomial `value`.
    pub fn from_constant(basis: Arc<RnsBasis<I>>, value: u64, format: Format) -> Self {
        let towers = basis
            .towers()
            .iter()
            .map(|params| {
                // below both 2^64 and the modulus
                let residue = I::from_u64((value as u128 % params.modulus().as_u128()) as u64);
                let mut tower = ResiduePolynomial::zero(Arc::clone(params), format);
                tower.add_scalar_in_place(residue);
                tower
            })
            .collect();
        Self {
            basis,
            towers,
            format,
        }
    }

    /// Independent uniform residues in every tower.
    pub fn from_uniform<R: Rng + ?Sized>(
        basis: Arc<RnsBasis<I>>,
        format: Format,
        rng: &mut R,
    ) -> Self {
        let towers = basis
            .towers()
            .iter()
            .map(|params| ResiduePolynomial::sample_uniform(Arc::clone(params), format, rng))
            .collect();
        Self {
            basis,
            towers,
            format,
        }
    }

    /// One rounded Gaussian vector, reduced into every tower.
    pub fn from_gaussian<R: Rng + ?Sized>(
        basis: Arc<RnsBasis<I>>,
        std_dev: f64,
        format: Format,
        rng: &mut R,
    ) -> RingResult<Self> {
        let noise = gaussian_signed(basis.ring_dimension(), std_dev, rng);
        Self::from_signed_coefficients(basis, &noise, format)
    }

    /// One ternary vector, reduced into every tower. A zero Hamming weight
    /// draws each coefficient uniformly from `{-1, 0, 1}`.
    pub fn from_ternary<R: Rng + ?Sized>(
        basis: Arc<RnsBasis<I>>,
        hamming_weight: usize,
        format: Format,
        rng: &mut R,
    ) -> RingResult<Self> {
        let secret = ternary_signed(basis.ring_dimension(), hamming_weight, rng);
        Self::from_signed_coefficients(basis, &secret, format)
    }

    pub(crate) fn from_parts_unchecked(
        basis: Arc<RnsBasis<I>>,
        towers: Vec<ResiduePolynomial<I>>,
        format: Format,
    ) -> Self {
        debug_assert_eq!(towers.len(), basis.tower_count());
        debug_assert!(towers.iter().all(|t| t.format() == format));
        Self {
            basis,
            towers,
            format,
        }
    }
}

// ─── Accessors & format conversion ────────────────────────────────────────────

impl<I: ModularArithmetic> RnsPolynomial<I> {
    pub fn basis(&self) -> &Arc<RnsBasis<I>> {
        &self.basis
    }

    pub fn towers(&self) -> &[ResiduePolynomial<I>] {
        &self.towers
    }

    pub fn into_towers(self) -> Vec<ResiduePolynomial<I>> {
        self.towers
    }

    pub fn tower(&self, index: usize) -> RingResult<&ResiduePolynomial<I>> {
        self.towers.get(index).ok_or(RingError::IndexError {
            index,
            bound: self.towers.len(),
        })
    }

    pub fn tower_count(&self) -> usize {
        self.towers.len()
    }

    pub fn ring_dimension(&self) -> usize {
        self.basis.ring_dimension()
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn moduli(&self) -> Vec<I> {
        self.basis.moduli()
    }

    /// The product of the moduli of the current towers.
    pub fn working_modulus(&self) -> BigInteger {
        self.basis.modulus().clone()
    }

    /// Raw values of tower `index`, for serialization.
    pub fn tower_values(&self, index: usize) -> RingResult<&[I]> {
        Ok(self.tower(index)?.values())
    }

    /// Overwrites tower `index` with raw values in the current format.
    pub fn set_tower_values(&mut self, index: usize, values: Vec<I>) -> RingResult<()> {
        let bound = self.towers.len();
        self.towers
            .get_mut(index)
            .ok_or(RingError::IndexError { index, bound })?
            .set_values(values)
    }

    pub fn switch_format(&mut self) -> RingResult<()> {
        self.towers
            .par_iter_mut()
            .try_for_each(|tower| tower.switch_format())?;
        self.format = self.format.flipped();
        Ok(())
    }

    pub fn set_format(&mut self, format: Format) -> RingResult<()> {
        if self.format != format {
            self.switch_format()?;
        }
        Ok(())
    }

    pub fn into_format(mut self, format: Format) -> RingResult<Self> {
        self.set_format(format)?;
        Ok(self)
    }

    pub(crate) fn towers_mut(&mut self) -> &mut [ResiduePolynomial<I>] {
        &mut self.towers
    }
}

// ─── Tower management ─────────────────────────────────────────────────────────

impl<I: ModularArithmetic> RnsPolynomial<I> {
    pub fn drop_last_element(&mut self) -> RingResult<()> {
        self.drop_last_elements(1)
    }

    /// Removes the last `count` towers and the matching moduli.
    pub fn drop_last_elements(&mut self, count: usize) -> RingResult<()> {
        let basis = Arc::new(self.basis.drop_last(count)?);
        self.truncate_to(basis);
        Ok(())
    }

    /// Keeps the leading towers that `basis` (a prefix of the current basis)
    /// describes.
    pub(crate) fn truncate_to(&mut self, basis: Arc<RnsBasis<I>>) {
        debug_assert!(basis.tower_count() <= self.towers.len());
        self.towers.truncate(basis.tower_count());
        self.basis = basis;
    }

    /// Copy of towers `start..end` over the matching sub-basis.
    pub fn clone_towers(&self, start: usize, end: usize) -> RingResult<Self> {
        let basis = Arc::new(self.basis.slice(start, end)?);
        Ok(Self {
            basis,
            towers: self.towers[start..end].to_vec(),
            format: self.format,
        })
    }

    /// Moves tower `index` to a new modulus with the signed-residue switch.
    pub fn switch_modulus_at_index(
        &mut self,
        index: usize,
        modulus: I,
        root_of_unity: I,
    ) -> RingResult<()> {
        if index >= self.towers.len() {
            return Err(RingError::IndexError {
                index,
                bound: self.towers.len(),
            });
        }
        let mut tower = self.towers[index].clone();
        tower.switch_modulus(modulus, root_of_unity)?;
        let basis = self
            .basis
            .replace_tower(index, Arc::clone(tower.params()))?;
        self.basis = Arc::new(basis);
        self.towers[index] = tower;
        Ok(())
    }

    /// Switching every tower to one new modulus has no RNS meaning.
    pub fn switch_modulus(&mut self, _modulus: I, _root_of_unity: I) -> RingResult<()> {
        Err(RingError::NotImplemented(
            "switch_modulus on a multi-tower polynomial",
        ))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::math::find_primitive_root;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    /// Basis over `X^n + 1` from small NTT-friendly primes.
    pub(crate) fn basis_from(order: u64, moduli: &[u64]) -> Arc<RnsBasis<u64>> {
        let roots = moduli
            .iter()
            .map(|&q| find_primitive_root(q, order).unwrap())
            .collect();
        Arc::new(RnsBasis::new(order, moduli.to_vec(), roots).unwrap())
    }

    pub(crate) fn basis_three() -> Arc<RnsBasis<u64>> {
        basis_from(16, &[17, 97, 113])
    }

    // ── Construction ──────────────────────────────────────────────────────────

    #[test]
    fn zero_has_one_tower_per_modulus() {
        let poly = RnsPolynomial::zero(basis_three(), Format::Evaluation);
        assert_eq!(poly.tower_count(), 3);
        assert_eq!(poly.ring_dimension(), 8);
        assert!(poly.towers().iter().all(|t| t.values().iter().all(|&v| v == 0)));
        assert_eq!(poly.working_modulus(), BigInteger::from_u64(17 * 97 * 113));
    }

    #[test]
    fn signed_coefficients_land_in_every_tower() {
        let poly = RnsPolynomial::from_signed_coefficients(
            basis_three(),
            &[-1, 2, 0, 0, 0, 0, 0, 5],
            Format::Coefficient,
        )
        .unwrap();
        assert_eq!(poly.tower_values(0).unwrap(), &[16, 2, 0, 0, 0, 0, 0, 5]);
        assert_eq!(poly.tower_values(2).unwrap(), &[112, 2, 0, 0, 0, 0, 0, 5]);
    }

    #[test]
    fn from_towers_validates_shape() {
        let basis = basis_three();
        let towers = RnsPolynomial::zero(Arc::clone(&basis), Format::Coefficient).into_towers();

        assert!(matches!(
            RnsPolynomial::from_towers(Arc::clone(&basis), towers[..2].to_vec()),
            Err(RingError::TowerCountMismatch { expected: 3, actual: 2 })
        ));

        let mut swapped = towers.clone();
        swapped.swap(0, 1);
        assert!(matches!(
            RnsPolynomial::from_towers(Arc::clone(&basis), swapped),
            Err(RingError::ModulusMismatch { .. })
        ));

        let mut mixed = towers.clone();
        mixed[2].switch_format().unwrap();
        assert!(matches!(
            RnsPolynomial::from_towers(Arc::clone(&basis), mixed),
            Err(RingError::FormatMismatch { .. })
        ));

        assert!(RnsPolynomial::from_towers(basis, towers).is_ok());
    }

    #[test]
    fn constant_is_the_same_in_both_formats() {
        let coefficient = RnsPolynomial::from_constant(basis_three(), 100, Format::Coefficient);
        let evaluation = RnsPolynomial::from_constant(basis_three(), 100, Format::Evaluation);
        assert_eq!(coefficient.tower_values(0).unwrap()[0], 100 % 17);
        assert_eq!(coefficient.into_format(Format::Evaluation).unwrap(), evaluation);
    }

    #[test]
    fn gaussian_noise_is_shared_across_towers() {
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        let poly =
            RnsPolynomial::from_gaussian(basis_three(), 2.0, Format::Coefficient, &mut rng).unwrap();
        let big = poly.crt_interpolate().unwrap();
        let modulus = poly.working_modulus();
        for c in big.coefficients() {
            let centered = if c > &modulus.shifted_right(1) {
                modulus.sub_saturating(c)
            } else {
                c.clone()
            };
            assert!(centered < BigInteger::from_u64(20));
        }
    }

    #[test]
    fn ternary_and_uniform_samplers() {
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        let secret =
            RnsPolynomial::from_ternary(basis_three(), 3, Format::Evaluation, &mut rng).unwrap();
        assert_eq!(secret.format(), Format::Evaluation);
        let secret = secret.into_format(Format::Coefficient).unwrap();
        let nonzero = secret.tower_values(0).unwrap().iter().filter(|&&v| v != 0).count();
        assert_eq!(nonzero, 3);

        let uniform = RnsPolynomial::from_uniform(basis_three(), Format::Coefficient, &mut rng);
        for (tower, q) in uniform.towers().iter().zip([17, 97, 113]) {
            assert!(tower.values().iter().all(|&v| v < q));
        }
    }

    // ── Format & towers ───────────────────────────────────────────────────────

    #[test]
    fn switch_format_round_trips() {
        let mut rng = ChaCha20Rng::seed_from_u64(10);
        let original = RnsPolynomial::from_uniform(basis_three(), Format::Coefficient, &mut rng);
        let mut poly = original.clone();
        poly.switch_format().unwrap();
        assert_eq!(poly.format(), Format::Evaluation);
        assert!(poly.towers().iter().all(|t| t.format() == Format::Evaluation));
        poly.switch_format().unwrap();
        assert_eq!(poly, original);
    }

    #[test]
    fn drop_last_elements_shrinks_basis() {
        let mut poly = RnsPolynomial::zero(basis_three(), Format::Coefficient);
        poly.drop_last_element().unwrap();
        assert_eq!(poly.moduli(), vec![17, 97]);
        assert!(matches!(
            poly.drop_last_elements(2),
            Err(RingError::InsufficientTowers { requested: 2, available: 2 })
        ));
        assert_eq!(poly.tower_count(), 2);
    }

    #[test]
    fn clone_towers_and_raw_access() {
        let mut poly = RnsPolynomial::zero(basis_three(), Format::Coefficient);
        poly.set_tower_values(1, vec![1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert!(matches!(
            poly.set_tower_values(0, vec![17; 8]),
            Err(RingError::NonReducedCoefficient { .. })
        ));
        assert!(matches!(
            poly.set_tower_values(3, vec![0; 8]),
            Err(RingError::IndexError { index: 3, bound: 3 })
        ));

        let middle = poly.clone_towers(1, 3).unwrap();
        assert_eq!(middle.moduli(), vec![97, 113]);
        assert_eq!(middle.tower_values(0).unwrap(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn switch_modulus_at_index_updates_the_basis() {
        let mut poly = RnsPolynomial::from_signed_coefficients(
            basis_three(),
            &[-1, 1, 0, 0, 0, 0, 0, 0],
            Format::Coefficient,
        )
        .unwrap();
        poly.switch_modulus_at_index(0, 193, 0).unwrap();
        assert_eq!(poly.moduli(), vec![193, 97, 113]);
        assert_eq!(poly.tower_values(0).unwrap()[..2], [192, 1]);

        assert!(matches!(
            poly.switch_modulus(257, 0),
            Err(RingError::NotImplemented(_))
        ));
    }
}
