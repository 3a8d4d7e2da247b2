use crate::math::BigInteger;
use crate::rings::errors::{RingError, RingResult};

/// A polynomial with multi-precision coefficients in `[0, modulus)`.
///
/// Produced by CRT interpolation and consumed when decomposing a large
/// polynomial into towers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigPolynomial {
    modulus: BigInteger,
    coefficients: Vec<BigInteger>,
}

impl BigPolynomial {
    pub fn new(modulus: BigInteger, coefficients: Vec<BigInteger>) -> RingResult<Self> {
        modulus.ensure_initialized()?;
        if let Some(bad) = coefficients.iter().find(|c| **c >= modulus) {
            return Err(RingError::NonReducedCoefficient {
                coefficient: bad.to_string(),
                modulus: modulus.to_string(),
            });
        }
        Ok(Self {
            modulus,
            coefficients,
        })
    }

    pub(crate) fn new_unchecked(modulus: BigInteger, coefficients: Vec<BigInteger>) -> Self {
        Self {
            modulus,
            coefficients,
        }
    }

    pub fn modulus(&self) -> &BigInteger {
        &self.modulus
    }

    pub fn coefficients(&self) -> &[BigInteger] {
        &self.coefficients
    }

    pub fn into_coefficients(self) -> Vec<BigInteger> {
        self.coefficients
    }

    pub fn ring_dimension(&self) -> usize {
        self.coefficients.len()
    }

    pub fn at(&self, index: usize) -> RingResult<&BigInteger> {
        self.coefficients.get(index).ok_or(RingError::IndexError {
            index,
            bound: self.coefficients.len(),
        })
    }

    /// Coefficient `index` read as a centered value: its magnitude and
    /// whether it lies above `modulus / 2`.
    pub fn centered_magnitude(&self, index: usize) -> RingResult<(BigInteger, bool)> {
        let value = self.at(index)?;
        Ok(centered(value, &self.modulus))
    }

    /// Infinity norm of the centered coefficients.
    pub fn norm(&self) -> f64 {
        self.coefficients
            .iter()
            .map(|c| centered(c, &self.modulus).0)
            .max()
            .map_or(0.0, |max| max.to_f64())
    }
}

fn centered(value: &BigInteger, modulus: &BigInteger) -> (BigInteger, bool) {
    if value > &modulus.shifted_right(1) {
        (modulus.sub_saturating(value), true)
    } else {
        (value.clone(), false)
    }
}
