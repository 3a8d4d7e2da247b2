use super::Format;
use crate::math::MathError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RingError {
    #[error("ring dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("tower count mismatch: expected {expected}, got {actual}")]
    TowerCountMismatch { expected: usize, actual: usize },
    #[error("cannot drop {requested} towers from a polynomial with {available}")]
    InsufficientTowers { requested: usize, available: usize },
    #[error("index {index} out of range for length {bound}")]
    IndexError { index: usize, bound: usize },
    #[error("format mismatch: expected {expected}, got {actual}")]
    FormatMismatch { expected: Format, actual: Format },
    #[error("modulus mismatch: expected {expected}, got {actual}")]
    ModulusMismatch { expected: String, actual: String },
    #[error("cyclotomic order must be a power of two >= 2, got {order}")]
    InvalidCyclotomicOrder { order: u64 },
    #[error("{root} is not a primitive {order}-th root of unity modulo {modulus}")]
    InvalidRootOfUnity {
        root: String,
        modulus: String,
        order: u64,
    },
    #[error("no root of unity configured for modulus {modulus}")]
    MissingRootOfUnity { modulus: String },
    #[error("RNS basis must contain at least one modulus")]
    EmptyBasis,
    #[error("coefficient {coefficient} is not reduced modulo {modulus}")]
    NonReducedCoefficient { coefficient: String, modulus: String },
    #[error("modulus {modulus} exceeds the {max_bits}-bit limit for this word size")]
    ModulusTooLarge { modulus: String, max_bits: u32 },
    #[error("unable to find enough {bits}-bit NTT-friendly primes for order {order}")]
    PrimeGenerationFailed { bits: u32, order: u64 },
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
    #[error(transparent)]
    Math(#[from] MathError),
}

pub type RingResult<T> = Result<T, RingError>;

impl RingError {
    pub(crate) fn modulus_mismatch(expected: impl ToString, actual: impl ToString) -> Self {
        Self::ModulusMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub(crate) fn format_mismatch(expected: Format, actual: Format) -> Self {
        Self::FormatMismatch { expected, actual }
    }
}
