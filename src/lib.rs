pub mod conversion;
pub mod math;
pub mod rings;

pub use conversion::{
    BasisScaleTables, BehzTables, ExpandTables, GammaScaleTables, ModDownTables, ModReduceTables,
    RescaleTables, ScaleTables, ScaleTarget, ShoupConstant, SwitchTables,
};
pub use math::{BigInteger, MathError, MathResult, ModularArithmetic, Word};
pub use rings::{
    BigPolynomial, ElementParams, Format, NttTableCache, ResiduePolynomial, RingError, RingResult,
    RnsBasis, RnsBasisBuilder, RnsPolynomial,
};
