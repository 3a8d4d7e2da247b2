use dcrt_core::conversion::{
    approx_mod_down, scale_and_round, scale_and_round_basis, scale_and_round_gamma,
};
use dcrt_core::{
    BasisScaleTables, BigInteger, BigPolynomial, Format, GammaScaleTables, ModDownTables,
    RnsBasis, RnsBasisBuilder, RnsPolynomial, ScaleTables, ScaleTarget,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::sync::Arc;

const N: usize = 16;

fn basis(bits: u32, count: usize) -> Arc<RnsBasis<u64>> {
    RnsBasisBuilder::new(N)
        .with_prime_bits(bits)
        .with_prime_count(count)
        .build::<u64>()
        .unwrap()
}

/// `delta * m + e mod Q` with `delta = floor(Q / t)`.
fn encode(q: &Arc<RnsBasis<u64>>, t: u64, messages: &[u64], noise: &[i64]) -> RnsPolynomial<u64> {
    let modulus = q.modulus();
    let delta = modulus.divided_by(&BigInteger::from_u64(t)).unwrap();
    let coefficients = messages
        .iter()
        .zip(noise)
        .map(|(&m, &e)| {
            let scaled = delta.times(&BigInteger::from_u64(m)).unwrap();
            let magnitude = BigInteger::from_u64(e.unsigned_abs());
            if e < 0 {
                scaled.mod_sub(&magnitude, modulus).unwrap()
            } else {
                scaled.mod_add(&magnitude, modulus).unwrap()
            }
        })
        .collect();
    let big = BigPolynomial::new(modulus.clone(), coefficients).unwrap();
    RnsPolynomial::from_big_coefficients(Arc::clone(q), &big, Format::Coefficient).unwrap()
}

fn random_case(t: u64, seed: u64) -> (Vec<u64>, Vec<i64>) {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let messages = (0..N).map(|_| rng.random_range(0..t)).collect();
    let noise = (0..N).map(|_| rng.random_range(-1000..1000)).collect();
    (messages, noise)
}

#[test]
fn test_decrypt_style_rounding_recovers_messages() {
    let q = basis(50, 3);
    for t in [2u64, 256, 65537, (1 << 30) + 3] {
        let (messages, noise) = random_case(t, t);
        let x = encode(&q, t, &messages, &noise);
        let tables = ScaleTables::new(Arc::clone(&q), t).unwrap();
        let plain = scale_and_round(&x, &tables).unwrap();
        assert_eq!(plain.values(), messages.as_slice(), "t = {t}");
    }
}

#[test]
fn test_gamma_rounding_agrees_with_float_rounding() {
    let q = basis(50, 3);
    let t = 65537u64;
    let (messages, noise) = random_case(t, 9);
    let x = encode(&q, t, &messages, &noise);

    let float = scale_and_round(&x, &ScaleTables::new(Arc::clone(&q), t).unwrap()).unwrap();
    let integer =
        scale_and_round_gamma(&x, &GammaScaleTables::new(Arc::clone(&q), t).unwrap()).unwrap();
    assert_eq!(float.values(), messages.as_slice());
    assert_eq!(integer.values(), messages.as_slice());
}

#[test]
fn test_leading_scale_matches_mod_down() {
    let q = basis(45, 2);
    let p = basis(20, 2);
    let scale_tables =
        BasisScaleTables::new(Arc::clone(&q), Arc::clone(&p), 1, ScaleTarget::Leading).unwrap();
    let down_tables = ModDownTables::new(Arc::clone(&q), Arc::clone(&p), None).unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(10);
    let x = RnsPolynomial::from_uniform(Arc::clone(scale_tables.input()), Format::Coefficient, &mut rng);

    let scaled = scale_and_round_basis(&x, &scale_tables).unwrap();
    let down = approx_mod_down(&x, &down_tables).unwrap();
    assert_eq!(scaled, down);
}
