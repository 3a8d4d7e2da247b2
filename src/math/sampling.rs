use crate::math::native::Word;
use rand::{Rng, seq::SliceRandom};
use rand_distr::{Distribution, Normal};

/// Maps a signed integer to its residue in `[0, modulus)`, centering
/// negatives as `modulus - (|k| mod modulus)`.
#[inline]
pub fn signed_to_residue<I: Word>(value: i64, modulus: I) -> I {
    // reduced below both 2^64 and `modulus`, so the narrowing is exact
    let magnitude = I::from_u64((value.unsigned_abs() as u128 % modulus.as_u128()) as u64);
    if value < 0 && magnitude != I::ZERO {
        modulus - magnitude
    } else {
        magnitude
    }
}

/// Samples `len` uniform residues in `[0, modulus)`.
///
/// # Panics
///
/// Panics if `modulus == 0`.
pub fn uniform_residues<I: Word, R: Rng + ?Sized>(len: usize, modulus: I, rng: &mut R) -> Vec<I> {
    assert!(
        modulus != I::ZERO,
        "uniform_residues: invalid range [0, 0), modulus must be positive"
    );
    (0..len).map(|_| rng.random_range(I::ZERO..modulus)).collect()
}

/// Samples `len` rounded Gaussian integers with standard deviation `std_dev`.
///
/// # Panics
///
/// Panics if `std_dev` is not finite and positive.
pub fn gaussian_signed<R: Rng + ?Sized>(len: usize, std_dev: f64, rng: &mut R) -> Vec<i64> {
    assert!(
        std_dev.is_finite() && std_dev > 0.0,
        "gaussian_signed: std_dev must be finite and positive"
    );
    let Ok(normal) = Normal::new(0.0, std_dev) else {
        panic!("gaussian_signed: failed to create Normal distribution");
    };
    (0..len).map(|_| normal.sample(rng).round() as i64).collect()
}

/// Samples a ternary vector with coefficients in `{-1, 0, 1}`.
///
/// With `hamming_weight == 0` every entry is drawn uniformly from the three
/// values; otherwise exactly `hamming_weight` entries are non-zero.
///
/// # Panics
///
/// Panics if `hamming_weight > len`.
pub fn ternary_signed<R: Rng + ?Sized>(len: usize, hamming_weight: usize, rng: &mut R) -> Vec<i64> {
    assert!(
        hamming_weight <= len,
        "ternary_signed: hamming_weight must be <= len"
    );
    if hamming_weight == 0 {
        return (0..len).map(|_| rng.random_range(-1i64..=1)).collect();
    }
    let mut out = vec![0i64; len];
    // Shuffle indices and assign signs on the selected support.
    let mut indices: Vec<usize> = (0..len).collect();
    indices.shuffle(rng);
    for &idx in indices.iter().take(hamming_weight) {
        out[idx] = if rng.random_bool(0.5) { 1 } else { -1 };
    }
    out
}
