//! Prime utilities for constructing NTT-friendly modulus sets.
//!
//! Primality uses Miller-Rabin with a fixed set of bases. The implementation
//! decomposes `n - 1` into `d * 2^r`, then verifies that each base either:
//! - produces `1` or `n - 1` directly, or
//! - reaches `n - 1` after repeated squaring modulo `n`.
//!
//! The bases below make the test deterministic for every value under
//! `3.18 * 10^23` (so for all of `u32` and `u64`). Above that, which only
//! `u128` words reach, the answer is a strong probable-prime verdict.
//! Reference:
//! https://en.wikipedia.org/wiki/Miller%E2%80%93Rabin_primality_test
//!
//! An NTT-friendly prime for cyclotomic order `m` satisfies `p = 1 (mod m)`,
//! which guarantees a primitive `m`-th root of unity in `Z_p`.

use crate::math::native::{ModularArithmetic, Word};

// Source: https://miller-rabin.appspot.com/
const MILLER_RABIN_BASES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

/// Returns `(odd_part, power_of_two)` such that `n = odd_part * 2^power_of_two`.
fn decompose<I: Word>(n: I) -> (I, u32) {
    assert!(n != I::ZERO, "decompose: n must be positive");
    let mut d = n;
    let mut r = 0;
    while d & I::ONE == I::ZERO {
        d = d >> 1;
        r += 1;
    }
    (d, r)
}

/// Returns `true` if `n` is prime under Miller-Rabin with fixed bases.
pub fn is_prime<I: ModularArithmetic>(n: I) -> bool {
    let two = I::from_u64(2);
    let three = I::from_u64(3);
    if n < two {
        return false;
    }
    if n == two || n == three {
        return true;
    }
    if n & I::ONE == I::ZERO {
        return false;
    }

    let n_minus_one = n - I::ONE;
    let (d, r) = decompose(n_minus_one);
    'bases: for &base in MILLER_RABIN_BASES.iter() {
        let a = I::from_u64(base);
        if a >= n {
            continue;
        }
        let mut x = a.mod_exp(d, n);
        if x == I::ONE || x == n_minus_one {
            continue;
        }
        for _ in 1..r {
            x = x.mod_mul(x, n);
            if x == n_minus_one {
                continue 'bases;
            }
        }
        return false;
    }
    true
}

/// Slow-but-clear reference test using `6k +/- 1` trial division.
pub fn is_prime_reference(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n == 2 || n == 3 {
        return true;
    }
    if n.is_multiple_of(2) || n.is_multiple_of(3) {
        return false;
    }
    let mut i = 5u64;
    while i.saturating_mul(i) <= n {
        if n.is_multiple_of(i) || n.is_multiple_of(i + 2) {
            return false;
        }
        i += 6;
    }
    true
}

/// Returns `true` when `p` is prime and `p = 1 (mod cyclotomic_order)`.
#[inline]
pub fn is_ntt_friendly_prime<I: ModularArithmetic>(p: I, cyclotomic_order: u64) -> bool {
    assert!(
        cyclotomic_order > 0,
        "is_ntt_friendly_prime: cyclotomic order must be positive"
    );
    let order = I::from_u64(cyclotomic_order);
    is_prime(p) && p % order == I::ONE % order
}

/// Returns the smallest `x >= value` such that `x % modulus == 1`, or `None`
/// if that overflows the word.
fn snap_up_to_congruence<I: Word>(value: I, modulus: I) -> Option<I> {
    assert!(
        modulus > I::ONE,
        "snap_up_to_congruence: modulus must be greater than 1"
    );
    let remainder = value % modulus;
    if remainder == I::ONE {
        return Some(value);
    }
    let delta = (modulus + I::ONE - remainder) % modulus;
    match value.overflowing_add(delta) {
        (snapped, false) => Some(snapped),
        _ => None,
    }
}

/// Returns the largest `x <= value` such that `x % modulus == 1`, or `None`
/// if no such value exists.
fn snap_down_to_congruence<I: Word>(value: I, modulus: I) -> Option<I> {
    assert!(
        modulus > I::ONE,
        "snap_down_to_congruence: modulus must be greater than 1"
    );
    let remainder = value % modulus;
    let delta = (remainder + modulus - I::ONE) % modulus;
    match value.overflowing_sub(delta) {
        (snapped, false) => Some(snapped),
        _ => None,
    }
}

fn order_as_step<I: Word>(cyclotomic_order: u64, caller: &str) -> I {
    assert!(cyclotomic_order > 1, "{caller}: cyclotomic order must be greater than 1");
    I::from_u64(cyclotomic_order)
}

/// Returns the first NTT-friendly prime `p >= 2^bits + 1`.
///
/// Only candidates `p = 1 (mod cyclotomic_order)` are visited. Returns `None`
/// if the search runs off the top of the word.
///
/// # Panics
///
/// Panics if `bits >= I::BITS` or `cyclotomic_order <= 1`.
pub fn first_prime_up<I: ModularArithmetic>(bits: u32, cyclotomic_order: u64) -> Option<I> {
    assert!(bits < I::BITS, "first_prime_up: bits must be less than the word width");
    let step: I = order_as_step(cyclotomic_order, "first_prime_up");
    let start = snap_up_to_congruence((I::ONE << bits) + I::ONE, step)?;
    search_up(start, step)
}

/// Returns the largest NTT-friendly prime strictly below `bound`.
///
/// # Panics
///
/// Panics if `cyclotomic_order <= 1`.
pub fn first_prime_down<I: ModularArithmetic>(bound: I, cyclotomic_order: u64) -> Option<I> {
    let step: I = order_as_step(cyclotomic_order, "first_prime_down");
    if bound <= I::from_u64(2) {
        return None;
    }
    let mut candidate = snap_down_to_congruence(bound - I::ONE, step)?;
    loop {
        if candidate <= I::from_u64(2) {
            return None;
        }
        if is_prime(candidate) {
            return Some(candidate);
        }
        candidate = match candidate.overflowing_sub(step) {
            (next, false) => next,
            _ => return None,
        };
    }
}

/// The NTT-friendly prime preceding `prime` for the same order.
pub fn previous_prime<I: ModularArithmetic>(prime: I, cyclotomic_order: u64) -> Option<I> {
    first_prime_down(prime, cyclotomic_order)
}

/// The NTT-friendly prime following `prime` for the same order.
pub fn next_prime<I: ModularArithmetic>(prime: I, cyclotomic_order: u64) -> Option<I> {
    let step: I = order_as_step(cyclotomic_order, "next_prime");
    let start = match prime.overflowing_add(I::ONE) {
        (next, false) => snap_up_to_congruence(next, step)?,
        _ => return None,
    };
    search_up(start, step)
}

fn search_up<I: ModularArithmetic>(mut candidate: I, step: I) -> Option<I> {
    loop {
        if is_prime(candidate) {
            return Some(candidate);
        }
        candidate = match candidate.overflowing_add(step) {
            (next, false) => next,
            _ => return None,
        };
    }
}

// ─── Roots of unity ───────────────────────────────────────────────────────────

/// Returns `true` when `root` has multiplicative order exactly `order`
/// modulo the prime `modulus`.
pub fn is_primitive_root<I: ModularArithmetic>(root: I, modulus: I, order: u64) -> bool {
    if order == 0 || root == I::ZERO || root >= modulus {
        return false;
    }
    if root.mod_exp(I::from_u64(order), modulus) != I::ONE {
        return false;
    }
    distinct_prime_factors(order)
        .into_iter()
        .all(|factor| root.mod_exp(I::from_u64(order / factor), modulus) != I::ONE)
}

/// Finds a primitive `order`-th root of unity modulo the prime `modulus`.
///
/// Returns `None` when `order` does not divide `modulus - 1`.
pub fn find_primitive_root<I: ModularArithmetic>(modulus: I, order: u64) -> Option<I> {
    if order == 0 || modulus <= I::ONE {
        return None;
    }
    let order_word = I::from_u64(order);
    let group_order = modulus - I::ONE;
    if group_order % order_word != I::ZERO {
        return None;
    }
    let exponent = group_order / order_word;
    let factors = distinct_prime_factors(order);

    let mut candidate = I::from_u64(2);
    'candidate: while candidate < modulus {
        let root = candidate.mod_exp(exponent, modulus);
        candidate = candidate + I::ONE;
        if root == I::ONE && order > 1 {
            continue;
        }
        for &factor in &factors {
            if root.mod_exp(I::from_u64(order / factor), modulus) == I::ONE {
                continue 'candidate;
            }
        }
        return Some(root);
    }
    // order 1 over Z_2
    (order == 1).then_some(I::ONE)
}

fn distinct_prime_factors(mut value: u64) -> Vec<u64> {
    let mut factors = Vec::new();
    let mut d = 2u64;
    while d * d <= value {
        if value.is_multiple_of(d) {
            factors.push(d);
            while value.is_multiple_of(d) {
                value /= d;
            }
        }
        d += 1;
    }
    if value > 1 {
        factors.push(value);
    }
    factors
}
