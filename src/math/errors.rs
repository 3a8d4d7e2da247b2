use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MathError {
    #[error("arithmetic on an uninitialized integer")]
    UninitializedOperand,
    #[error("division by zero")]
    DivideByZero,
    #[error("{value} has no inverse modulo {modulus}")]
    NoInverseExists { value: String, modulus: String },
    #[error("index {index} out of range (valid range 1..={bound})")]
    IndexError { index: usize, bound: usize },
    #[error("overflow in {operation}")]
    Overflow { operation: &'static str },
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("cannot parse {input:?} as an unsigned decimal integer")]
    ParseError { input: String },
    #[error("modulus of {bits} bits exceeds the {max_bits}-bit limit")]
    ModulusTooLarge { bits: u32, max_bits: u32 },
}

pub type MathResult<T> = Result<T, MathError>;

impl MathError {
    pub(crate) fn no_inverse(
        value: impl ToString,
        modulus: impl ToString,
    ) -> Self {
        Self::NoInverseExists {
            value: value.to_string(),
            modulus: modulus.to_string(),
        }
    }
}
