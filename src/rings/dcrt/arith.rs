use crate::math::{ModularArithmetic, signed_to_residue};
use rayon::prelude::*;
use std::ops::{Add, Mul, Neg, Sub};

use super::RnsPolynomial;
use crate::rings::{
    Format,
    errors::{RingError, RingResult},
};

// ─── Tower-wise ring arithmetic ───────────────────────────────────────────────

impl<I: ModularArithmetic> RnsPolynomial<I> {
    pub fn plus(&self, rhs: &Self) -> RingResult<Self> {
        let mut out = self.clone();
        out.add_assign_checked(rhs)?;
        Ok(out)
    }

    pub fn minus(&self, rhs: &Self) -> RingResult<Self> {
        let mut out = self.clone();
        out.sub_assign_checked(rhs)?;
        Ok(out)
    }

    /// Tower-wise ring product. Both operands must share a format; the
    /// product is cheap only in evaluation format.
    pub fn times(&self, rhs: &Self) -> RingResult<Self> {
        let mut out = self.clone();
        out.mul_assign_checked(rhs)?;
        Ok(out)
    }

    pub fn negate(&self) -> Self {
        let mut out = self.clone();
        out.negate_in_place();
        out
    }

    pub fn add_assign_checked(&mut self, rhs: &Self) -> RingResult<()> {
        self.check_compatible(rhs)?;
        self.towers
            .par_iter_mut()
            .zip(rhs.towers.par_iter())
            .try_for_each(|(a, b)| a.add_assign_checked(b))
    }

    pub fn sub_assign_checked(&mut self, rhs: &Self) -> RingResult<()> {
        self.check_compatible(rhs)?;
        self.towers
            .par_iter_mut()
            .zip(rhs.towers.par_iter())
            .try_for_each(|(a, b)| a.sub_assign_checked(b))
    }

    pub fn mul_assign_checked(&mut self, rhs: &Self) -> RingResult<()> {
        self.check_compatible(rhs)?;
        self.towers
            .par_iter_mut()
            .zip(rhs.towers.par_iter())
            .try_for_each(|(a, b)| a.mul_assign_checked(b))
    }

    pub fn negate_in_place(&mut self) {
        self.towers
            .par_iter_mut()
            .for_each(|tower| tower.negate_in_place());
    }

    fn check_compatible(&self, rhs: &Self) -> RingResult<()> {
        if self.towers.len() != rhs.towers.len() {
            return Err(RingError::TowerCountMismatch {
                expected: self.towers.len(),
                actual: rhs.towers.len(),
            });
        }
        if self.format != rhs.format {
            return Err(RingError::format_mismatch(self.format, rhs.format));
        }
        Ok(())
    }
}

// ─── Scalars ──────────────────────────────────────────────────────────────────

impl<I: ModularArithmetic> RnsPolynomial<I> {
    /// Adds the integer constant `scalar`, reduced into every tower.
    pub fn plus_scalar(&self, scalar: I) -> Self {
        let mut out = self.clone();
        out.towers
            .par_iter_mut()
            .for_each(|tower| tower.add_scalar_in_place(scalar));
        out
    }

    pub fn minus_scalar(&self, scalar: I) -> Self {
        let mut out = self.clone();
        out.towers.par_iter_mut().for_each(|tower| {
            let q = tower.modulus();
            tower.add_scalar_in_place(scalar.mod_neg(q));
        });
        out
    }

    pub fn times_scalar(&self, scalar: I) -> Self {
        let mut out = self.clone();
        out.towers
            .par_iter_mut()
            .for_each(|tower| tower.mul_scalar_in_place(scalar));
        out
    }

    pub fn times_signed(&self, scalar: i64) -> Self {
        let mut out = self.clone();
        out.towers.par_iter_mut().for_each(|tower| {
            let residue = signed_to_residue(scalar, tower.modulus());
            tower.mul_scalar_in_place(residue);
        });
        out
    }

    /// Multiplies tower `i` by `scalars[i]`. The scalars are the residues of
    /// one integer in the towers' moduli, or independent per-tower factors.
    pub fn times_per_tower(&self, scalars: &[I]) -> RingResult<Self> {
        if scalars.len() != self.towers.len() {
            return Err(RingError::TowerCountMismatch {
                expected: self.towers.len(),
                actual: scalars.len(),
            });
        }
        let mut out = self.clone();
        out.towers
            .par_iter_mut()
            .zip(scalars.par_iter())
            .for_each(|(tower, &scalar)| tower.mul_scalar_in_place(scalar));
        Ok(out)
    }

    /// `true` when every tower is invertible slot-wise.
    pub fn inverse_exists(&self) -> bool {
        self.format == Format::Evaluation && self.towers.iter().all(|t| t.inverse_exists())
    }
}

// ─── Operators ────────────────────────────────────────────────────────────────

impl<I: ModularArithmetic> Add<&RnsPolynomial<I>> for &RnsPolynomial<I> {
    type Output = RingResult<RnsPolynomial<I>>;

    fn add(self, rhs: &RnsPolynomial<I>) -> Self::Output {
        self.plus(rhs)
    }
}

impl<I: ModularArithmetic> Sub<&RnsPolynomial<I>> for &RnsPolynomial<I> {
    type Output = RingResult<RnsPolynomial<I>>;

    fn sub(self, rhs: &RnsPolynomial<I>) -> Self::Output {
        self.minus(rhs)
    }
}

impl<I: ModularArithmetic> Mul<&RnsPolynomial<I>> for &RnsPolynomial<I> {
    type Output = RingResult<RnsPolynomial<I>>;

    fn mul(self, rhs: &RnsPolynomial<I>) -> Self::Output {
        self.times(rhs)
    }
}

impl<I: ModularArithmetic> Neg for RnsPolynomial<I> {
    type Output = Self;

    fn neg(mut self) -> Self::Output {
        self.negate_in_place();
        self
    }
}

impl<I: ModularArithmetic> Neg for &RnsPolynomial<I> {
    type Output = RnsPolynomial<I>;

    fn neg(self) -> Self::Output {
        self.negate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::BigInteger;
    use crate::rings::dcrt::tests::{basis_from, basis_three};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn signed(values: &[i64], format: Format) -> RnsPolynomial<u64> {
        RnsPolynomial::from_signed_coefficients(basis_three(), values, format).unwrap()
    }

    // ── Ring operations ───────────────────────────────────────────────────────

    #[test]
    fn sum_and_difference_match_signed_arithmetic() {
        let a = signed(&[1, 2, 3, 4, -5, 6, 7, 8], Format::Coefficient);
        let b = signed(&[8, -7, 6, 5, 4, 3, 2, 1], Format::Coefficient);

        let sum = (&a + &b).unwrap();
        assert_eq!(sum, signed(&[9, -5, 9, 9, -1, 9, 9, 9], Format::Coefficient));

        let diff = (&a - &b).unwrap();
        assert_eq!(diff, signed(&[-7, 9, -3, -1, -9, 3, 5, 7], Format::Coefficient));
    }

    #[test]
    fn evaluation_product_matches_coefficient_product() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let basis = basis_three();
        let a = RnsPolynomial::from_uniform(basis.clone(), Format::Coefficient, &mut rng);
        let b = RnsPolynomial::from_uniform(basis, Format::Coefficient, &mut rng);

        let slow = a.times(&b).unwrap();
        let fast = (&a.clone().into_format(Format::Evaluation).unwrap()
            * &b.clone().into_format(Format::Evaluation).unwrap())
            .unwrap()
            .into_format(Format::Coefficient)
            .unwrap();
        assert_eq!(slow, fast);
    }

    #[test]
    fn product_wraps_negacyclically() {
        // x^7 * x = x^8 = -1
        let mut x7 = vec![0i64; 8];
        x7[7] = 1;
        let mut x = vec![0i64; 8];
        x[1] = 1;
        let product = signed(&x7, Format::Evaluation)
            .times(&signed(&x, Format::Evaluation))
            .unwrap();
        let mut minus_one = vec![0i64; 8];
        minus_one[0] = -1;
        assert_eq!(product, signed(&minus_one, Format::Evaluation));
    }

    #[test]
    fn negation_is_additive_inverse() {
        let a = signed(&[1, -2, 3, 0, 5, -6, 7, 8], Format::Evaluation);
        let zero = (&a + &(-&a)).unwrap();
        assert_eq!(zero, RnsPolynomial::zero(basis_three(), Format::Evaluation));
        assert_eq!(-a.clone(), a.negate());
    }

    #[test]
    fn rejects_mismatched_operands() {
        let a = signed(&[1; 8], Format::Coefficient);
        let b = signed(&[1; 8], Format::Evaluation);
        assert!(matches!(
            a.plus(&b),
            Err(RingError::FormatMismatch {
                expected: Format::Coefficient,
                actual: Format::Evaluation
            })
        ));

        let short = RnsPolynomial::zero(basis_from(16, &[17, 97]), Format::Coefficient);
        assert!(matches!(
            a.times(&short),
            Err(RingError::TowerCountMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    // ── Scalars ───────────────────────────────────────────────────────────────

    #[test]
    fn scalar_operations_follow_the_constant_polynomial() {
        let a = signed(&[1, 2, 3, 4, 5, 6, 7, 8], Format::Coefficient);
        assert_eq!(
            a.plus_scalar(10),
            signed(&[11, 2, 3, 4, 5, 6, 7, 8], Format::Coefficient)
        );
        assert_eq!(
            a.minus_scalar(3),
            signed(&[-2, 2, 3, 4, 5, 6, 7, 8], Format::Coefficient)
        );
        assert_eq!(
            a.times_signed(-2),
            signed(&[-2, -4, -6, -8, -10, -12, -14, -16], Format::Coefficient)
        );
        assert_eq!(a.times_scalar(3), a.times_signed(3));
    }

    #[test]
    fn evaluation_scalar_addition_commutes_with_format() {
        let a = signed(&[1, 2, 3, 4, 5, 6, 7, 8], Format::Coefficient);
        let via_eval = a
            .clone()
            .into_format(Format::Evaluation)
            .unwrap()
            .plus_scalar(9)
            .into_format(Format::Coefficient)
            .unwrap();
        assert_eq!(via_eval, a.plus_scalar(9));
    }

    #[test]
    fn per_tower_scalars_scale_each_residue() {
        let a = signed(&[1, 0, 0, 0, 0, 0, 0, 0], Format::Coefficient);
        let scaled = a.times_per_tower(&[2, 3, 4]).unwrap();
        assert_eq!(scaled.tower_values(0).unwrap()[0], 2);
        assert_eq!(scaled.tower_values(1).unwrap()[0], 3);
        assert_eq!(scaled.tower_values(2).unwrap()[0], 4);

        assert!(matches!(
            a.times_per_tower(&[1, 2]),
            Err(RingError::TowerCountMismatch { .. })
        ));
    }

    #[test]
    fn scalar_times_matches_interpolated_value() {
        let a = signed(&[-3, 0, 0, 0, 0, 0, 0, 0], Format::Coefficient);
        let q = BigInteger::from_u64(17 * 97 * 113);
        let expected = q.sub_saturating(&BigInteger::from_u64(300));
        assert_eq!(a.times_signed(100).coefficient_at(0).unwrap(), expected);
    }
}
