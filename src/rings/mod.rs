//! Polynomial rings `Z_q[X] / (X^n + 1)` in single-modulus and RNS form.

pub mod dcrt;
pub mod errors;
pub mod ntt;
pub mod params;
pub mod poly;

pub use dcrt::{BigPolynomial, RnsPolynomial};
pub use errors::{RingError, RingResult};
pub use ntt::{NttTable, NttTableCache, NumberTheoreticTransform};
pub use params::{ElementParams, RnsBasis, RnsBasisBuilder, generate_primes};
pub use poly::ResiduePolynomial;

use std::fmt;

/// Representation of a polynomial's values.
///
/// `Coefficient` holds the coefficients of `a(X)`; `Evaluation` holds the
/// values of `a` at the primitive `m`-th roots of unity (the NTT image).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    #[default]
    Coefficient,
    Evaluation,
}

impl Format {
    pub fn flipped(self) -> Self {
        match self {
            Self::Coefficient => Self::Evaluation,
            Self::Evaluation => Self::Coefficient,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coefficient => write!(f, "coefficient"),
            Self::Evaluation => write!(f, "evaluation"),
        }
    }
}
