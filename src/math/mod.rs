pub mod bigint;
pub mod errors;
pub mod native;
pub mod primes;
pub mod sampling;

pub use bigint::{BigInteger, IntegerState};
pub use errors::{MathError, MathResult};
pub use native::{DoubleWidth, DoubleWord, ModularArithmetic, Word, log2};
pub use primes::{
    find_primitive_root, first_prime_down, first_prime_up, is_ntt_friendly_prime, is_prime,
    is_primitive_root, next_prime, previous_prime,
};
pub use sampling::{gaussian_signed, signed_to_residue, ternary_signed, uniform_residues};
