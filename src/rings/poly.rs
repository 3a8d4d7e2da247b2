//! A single-modulus polynomial in `Z_q[X] / (X^n + 1)`.

use crate::math::{
    DoubleWidth, ModularArithmetic, gaussian_signed, signed_to_residue, ternary_signed,
    uniform_residues,
};
use rand::Rng;
use std::sync::Arc;

use super::{
    Format,
    errors::{RingError, RingResult},
    ntt::NumberTheoreticTransform,
    params::ElementParams,
};

/// `n` residues under one modulus, tagged with their [`Format`].
///
/// Invariant: `values.len() == params.ring_dimension()` and every value is
/// reduced into `[0, q)`.
#[derive(Debug, Clone)]
pub struct ResiduePolynomial<I: ModularArithmetic> {
    params: Arc<ElementParams<I>>,
    values: Vec<I>,
    format: Format,
}

impl<I: ModularArithmetic> PartialEq for ResiduePolynomial<I> {
    fn eq(&self, other: &Self) -> bool {
        self.params.same_ring(&other.params)
            && self.format == other.format
            && self.values == other.values
    }
}

impl<I: ModularArithmetic> Eq for ResiduePolynomial<I> {}

// ─── Constructors ─────────────────────────────────────────────────────────────

impl<I: ModularArithmetic> ResiduePolynomial<I> {
    pub fn zero(params: Arc<ElementParams<I>>, format: Format) -> Self {
        let n = params.ring_dimension();
        Self {
            params,
            values: vec![I::ZERO; n],
            format,
        }
    }

    /// Wraps `values`, checking length and reduction.
    pub fn from_values(
        params: Arc<ElementParams<I>>,
        values: Vec<I>,
        format: Format,
    ) -> RingResult<Self> {
        check_values(&params, &values)?;
        Ok(Self {
            params,
            values,
            format,
        })
    }

    /// Coefficient-format polynomial from signed coefficients.
    pub fn from_signed(params: Arc<ElementParams<I>>, coefficients: &[i64]) -> RingResult<Self> {
        let n = params.ring_dimension();
        if coefficients.len() != n {
            return Err(RingError::DimensionMismatch {
                expected: n,
                actual: coefficients.len(),
            });
        }
        let q = params.modulus();
        let values = coefficients
            .iter()
            .map(|&c| signed_to_residue(c, q))
            .collect();
        Ok(Self::new_unchecked(params, values, Format::Coefficient))
    }

    pub fn sample_uniform<R: Rng + ?Sized>(
        params: Arc<ElementParams<I>>,
        format: Format,
        rng: &mut R,
    ) -> Self {
        let values = uniform_residues(params.ring_dimension(), params.modulus(), rng);
        Self::new_unchecked(params, values, format)
    }

    pub fn sample_gaussian<R: Rng + ?Sized>(
        params: Arc<ElementParams<I>>,
        std_dev: f64,
        format: Format,
        rng: &mut R,
    ) -> RingResult<Self> {
        let noise = gaussian_signed(params.ring_dimension(), std_dev, rng);
        Self::from_signed(params, &noise)?.into_format(format)
    }

    pub fn sample_ternary<R: Rng + ?Sized>(
        params: Arc<ElementParams<I>>,
        hamming_weight: usize,
        format: Format,
        rng: &mut R,
    ) -> RingResult<Self> {
        let secret = ternary_signed(params.ring_dimension(), hamming_weight, rng);
        Self::from_signed(params, &secret)?.into_format(format)
    }

    pub(crate) fn new_unchecked(
        params: Arc<ElementParams<I>>,
        values: Vec<I>,
        format: Format,
    ) -> Self {
        debug_assert_eq!(values.len(), params.ring_dimension());
        Self {
            params,
            values,
            format,
        }
    }
}

// ─── Accessors & format conversion ────────────────────────────────────────────

impl<I: ModularArithmetic> ResiduePolynomial<I> {
    pub fn params(&self) -> &Arc<ElementParams<I>> {
        &self.params
    }

    pub fn modulus(&self) -> I {
        self.params.modulus()
    }

    pub fn root_of_unity(&self) -> I {
        self.params.root_of_unity()
    }

    pub fn ring_dimension(&self) -> usize {
        self.values.len()
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn values(&self) -> &[I] {
        &self.values
    }

    pub fn into_values(self) -> Vec<I> {
        self.values
    }

    pub fn at(&self, index: usize) -> RingResult<I> {
        self.values.get(index).copied().ok_or(RingError::IndexError {
            index,
            bound: self.values.len(),
        })
    }

    /// Replaces the values, keeping the format.
    pub fn set_values(&mut self, values: Vec<I>) -> RingResult<()> {
        check_values(&self.params, &values)?;
        self.values = values;
        Ok(())
    }

    pub fn set_values_to_zero(&mut self) {
        self.values.fill(I::ZERO);
    }

    pub(crate) fn values_mut(&mut self) -> &mut [I] {
        &mut self.values
    }

    /// Applies the forward or inverse NTT and flips the format.
    pub fn switch_format(&mut self) -> RingResult<()> {
        let table = self.params.ntt()?;
        match self.format {
            Format::Coefficient => table.forward_in_place(&mut self.values),
            Format::Evaluation => table.inverse_in_place(&mut self.values),
        }
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

    /// Moves the polynomial to `new_modulus`, preserving signed residues.
    ///
    /// Values above `q / 2` are read as `v - q` before reducing modulo the
    /// new modulus. Only meaningful in coefficient format.
    pub fn switch_modulus(&mut self, new_modulus: I, new_root: I) -> RingResult<()> {
        if self.format != Format::Coefficient {
            return Err(RingError::format_mismatch(Format::Coefficient, self.format));
        }
        let params = Arc::new(ElementParams::new(
            self.params.cyclotomic_order(),
            new_modulus,
            new_root,
        )?);
        let old_modulus = self.params.modulus();
        for value in &mut self.values {
            *value = switch_centered(*value, old_modulus, new_modulus);
        }
        self.params = params;
        Ok(())
    }
}

// ─── Ring arithmetic ──────────────────────────────────────────────────────────

impl<I: ModularArithmetic> ResiduePolynomial<I> {
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

    /// Ring product: pointwise in evaluation format, negacyclic convolution
    /// in coefficient format.
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
        let q = self.modulus();
        for (a, &b) in self.values.iter_mut().zip(&rhs.values) {
            *a = a.mod_add_fast(b, q);
        }
        Ok(())
    }

    pub fn sub_assign_checked(&mut self, rhs: &Self) -> RingResult<()> {
        self.check_compatible(rhs)?;
        let q = self.modulus();
        for (a, &b) in self.values.iter_mut().zip(&rhs.values) {
            *a = a.mod_sub_fast(b, q);
        }
        Ok(())
    }

    pub fn mul_assign_checked(&mut self, rhs: &Self) -> RingResult<()> {
        self.check_compatible(rhs)?;
        match self.format {
            Format::Evaluation => {
                let params = &self.params;
                for (a, &b) in self.values.iter_mut().zip(&rhs.values) {
                    *a = params.reduce(I::Double::mul_words(*a, b));
                }
            }
            Format::Coefficient => {
                self.values = negacyclic_convolution(&self.values, &rhs.values, &self.params);
            }
        }
        Ok(())
    }

    pub fn negate_in_place(&mut self) {
        let q = self.modulus();
        for value in &mut self.values {
            *value = value.mod_neg(q);
        }
    }

    fn check_compatible(&self, rhs: &Self) -> RingResult<()> {
        if self.values.len() != rhs.values.len() {
            return Err(RingError::DimensionMismatch {
                expected: self.values.len(),
                actual: rhs.values.len(),
            });
        }
        if self.modulus() != rhs.modulus() {
            return Err(RingError::modulus_mismatch(self.modulus(), rhs.modulus()));
        }
        if self.format != rhs.format {
            return Err(RingError::format_mismatch(self.format, rhs.format));
        }
        Ok(())
    }
}

// ─── Scalar arithmetic ────────────────────────────────────────────────────────

impl<I: ModularArithmetic> ResiduePolynomial<I> {
    /// Adds the constant polynomial `scalar`.
    ///
    /// In coefficient format only the constant coefficient changes; in
    /// evaluation format every slot does.
    pub fn plus_scalar(&self, scalar: I) -> Self {
        let mut out = self.clone();
        out.add_scalar_in_place(scalar);
        out
    }

    pub fn minus_scalar(&self, scalar: I) -> Self {
        let q = self.modulus();
        self.plus_scalar(scalar.mod_neg(q))
    }

    pub fn times_scalar(&self, scalar: I) -> Self {
        let mut out = self.clone();
        out.mul_scalar_in_place(scalar);
        out
    }

    pub fn times_signed(&self, scalar: i64) -> Self {
        self.times_scalar(signed_to_residue(scalar, self.modulus()))
    }

    pub(crate) fn add_scalar_in_place(&mut self, scalar: I) {
        let q = self.modulus();
        let scalar = scalar % q;
        match self.format {
            Format::Coefficient => {
                if let Some(first) = self.values.first_mut() {
                    *first = first.mod_add_fast(scalar, q);
                }
            }
            Format::Evaluation => {
                for value in &mut self.values {
                    *value = value.mod_add_fast(scalar, q);
                }
            }
        }
    }

    pub(crate) fn mul_scalar_in_place(&mut self, scalar: I) {
        let q = self.modulus();
        let scalar = scalar % q;
        let precon = scalar.prep_mod_mul_const(q);
        for value in &mut self.values {
            *value = value.mod_mul_fast_const(scalar, q, precon);
        }
    }

    /// Adds one to every stored value.
    pub fn add_one(&mut self) {
        let q = self.modulus();
        for value in &mut self.values {
            *value = value.mod_add_fast(I::ONE, q);
        }
    }

    /// `true` when every evaluation slot is invertible.
    pub fn inverse_exists(&self) -> bool {
        self.format == Format::Evaluation && self.values.iter().all(|&v| v != I::ZERO)
    }

    /// Slot-wise inverse; evaluation format only.
    pub fn multiplicative_inverse(&self) -> RingResult<Self> {
        if self.format != Format::Evaluation {
            return Err(RingError::format_mismatch(Format::Evaluation, self.format));
        }
        let q = self.modulus();
        let values = self
            .values
            .iter()
            .map(|v| v.mod_inverse(q))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new_unchecked(Arc::clone(&self.params), values, self.format))
    }
}

// ─── Private helpers ──────────────────────────────────────────────────────────

fn check_values<I: ModularArithmetic>(params: &ElementParams<I>, values: &[I]) -> RingResult<()> {
    let n = params.ring_dimension();
    if values.len() != n {
        return Err(RingError::DimensionMismatch {
            expected: n,
            actual: values.len(),
        });
    }
    let q = params.modulus();
    if let Some(bad) = values.iter().find(|&&v| v >= q) {
        return Err(RingError::NonReducedCoefficient {
            coefficient: bad.to_string(),
            modulus: q.to_string(),
        });
    }
    Ok(())
}

/// Reads `value` as a centered residue modulo `old` and reduces it modulo
/// `new`.
pub(crate) fn switch_centered<I: ModularArithmetic>(value: I, old: I, new: I) -> I {
    let half = old >> 1;
    if value > half {
        (old - value).mod_neg(new)
    } else {
        value % new
    }
}

fn negacyclic_convolution<I: ModularArithmetic>(
    a: &[I],
    b: &[I],
    params: &ElementParams<I>,
) -> Vec<I> {
    let n = a.len();
    let q = params.modulus();
    let mut out = vec![I::ZERO; n];
    for (i, &ai) in a.iter().enumerate() {
        if ai == I::ZERO {
            continue;
        }
        for (j, &bj) in b.iter().enumerate() {
            let product = params.reduce(I::Double::mul_words(ai, bj));
            let k = i + j;
            if k < n {
                out[k] = out[k].mod_add_fast(product, q);
            } else {
                out[k - n] = out[k - n].mod_sub_fast(product, q);
            }
        }
    }
    out
}
