use dcrt_core::conversion::{
    approx_mod_down, approx_mod_up, approx_switch_crt_basis, expand_crt_basis,
    expand_crt_basis_reverse_order, switch_crt_basis,
};
use dcrt_core::math::find_primitive_root;
use dcrt_core::{
    BigInteger, BigPolynomial, ExpandTables, Format, ModDownTables, RingError, RnsBasis,
    RnsBasisBuilder, RnsPolynomial, SwitchTables,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::sync::Arc;

fn basis_from(order: u64, moduli: &[u64]) -> Arc<RnsBasis<u64>> {
    let roots = moduli
        .iter()
        .map(|&q| find_primitive_root(q, order).unwrap())
        .collect();
    Arc::new(RnsBasis::new(order, moduli.to_vec(), roots).unwrap())
}

fn q_and_p() -> (Arc<RnsBasis<u64>>, Arc<RnsBasis<u64>>) {
    let q = RnsBasisBuilder::new(16)
        .with_prime_bits(45)
        .with_prime_count(3)
        .build::<u64>()
        .unwrap();
    let p = RnsBasisBuilder::new(16)
        .with_prime_bits(50)
        .with_prime_count(2)
        .build::<u64>()
        .unwrap();
    (q, p)
}

fn residues_of(value: &BigInteger, moduli: &[u64]) -> Vec<u64> {
    moduli
        .iter()
        .map(|&m| {
            value
                .modulo(&BigInteger::from_u64(m))
                .unwrap()
                .to_u64()
                .unwrap()
        })
        .collect()
}

#[test]
fn test_switch_scenario_with_three_primes() {
    let q = basis_from(2, &[17, 19]);
    let tables = SwitchTables::new(Arc::clone(&q), basis_from(2, &[23])).unwrap();
    let x = |value: u64| {
        let big = BigPolynomial::new(q.modulus().clone(), vec![BigInteger::from_u64(value)]).unwrap();
        RnsPolynomial::from_big_coefficients(Arc::clone(&q), &big, Format::Coefficient).unwrap()
    };

    // 300 > 323 / 2 is the centered value -23
    assert_eq!(switch_crt_basis(&x(300), &tables).unwrap().tower_values(0).unwrap(), &[0]);
    assert_eq!(approx_switch_crt_basis(&x(300), &tables).unwrap().tower_values(0).unwrap(), &[1]);
    assert_eq!(switch_crt_basis(&x(150), &tables).unwrap().tower_values(0).unwrap(), &[150 % 23]);
}

#[test]
fn test_switch_agrees_with_signed_reduction() {
    let (q, p) = q_and_p();
    let tables = SwitchTables::new(Arc::clone(&q), Arc::clone(&p)).unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(3);
    let x = RnsPolynomial::from_gaussian(Arc::clone(&q), 1e6, Format::Coefficient, &mut rng).unwrap();

    let switched = switch_crt_basis(&x, &tables).unwrap();
    let big = x.crt_interpolate().unwrap();
    let q_values: Vec<i64> = (0..16)
        .map(|ri| {
            let (magnitude, negative) = big.centered_magnitude(ri).unwrap();
            let m = magnitude.to_u64().unwrap() as i64;
            if negative { -m } else { m }
        })
        .collect();
    let expected = RnsPolynomial::from_signed_coefficients(p, &q_values, Format::Coefficient).unwrap();
    assert_eq!(switched, expected);
}

#[test]
fn test_expand_orders_towers() {
    let (q, p) = q_and_p();
    let tables = ExpandTables::new(Arc::clone(&q), Arc::clone(&p)).unwrap();
    let coefficients: Vec<i64> = (0..16).map(|k| k * k - 100).collect();
    let x = RnsPolynomial::from_signed_coefficients(Arc::clone(&q), &coefficients, Format::Evaluation)
        .unwrap();

    let forward = expand_crt_basis(&x, &tables).unwrap();
    let reversed = expand_crt_basis_reverse_order(&x, &tables).unwrap();
    assert_eq!(
        forward,
        RnsPolynomial::from_signed_coefficients(Arc::clone(tables.extended()), &coefficients, Format::Evaluation)
            .unwrap()
    );
    assert_eq!(
        reversed,
        RnsPolynomial::from_signed_coefficients(Arc::clone(tables.reversed()), &coefficients, Format::Evaluation)
            .unwrap()
    );
}

#[test]
fn test_mod_down_inverts_multiplication_by_p() {
    let (q, p) = q_and_p();
    let up_tables = ExpandTables::new(Arc::clone(&q), Arc::clone(&p)).unwrap();
    let down_tables = ModDownTables::new(Arc::clone(&q), Arc::clone(&p), None).unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(4);
    let x = RnsPolynomial::from_uniform(Arc::clone(&q), Format::Evaluation, &mut rng);

    let up = approx_mod_up(&x, &up_tables).unwrap();
    let p_residues = residues_of(p.modulus(), &up.moduli());
    let scaled = up.times_per_tower(&p_residues).unwrap();

    let down = approx_mod_down(&scaled, &down_tables).unwrap();
    assert_eq!(down.format(), Format::Evaluation);
    assert_eq!(down, x);
}

#[test]
fn test_mod_down_with_plaintext_modulus_on_a_prefix() {
    let (q, p) = q_and_p();
    let t = 65537u64;
    let tables = ModDownTables::new(Arc::clone(&q), Arc::clone(&p), Some(t)).unwrap();
    let prefix = Arc::new(q.slice(0, 2).unwrap().concat(&p).unwrap());
    let mut rng = ChaCha20Rng::seed_from_u64(5);
    let x = RnsPolynomial::from_uniform(Arc::clone(&prefix), Format::Coefficient, &mut rng);

    let down = approx_mod_down(&x, &tables).unwrap();
    assert_eq!(down.moduli(), q.moduli()[..2].to_vec());

    // X - Y * P must vanish modulo t and stay within t * P / 2
    let big_t = BigInteger::from_u64(t);
    let y = down.crt_interpolate().unwrap();
    let original = x.crt_interpolate().unwrap();
    let y_p = BigPolynomial::new(
        prefix.modulus().clone(),
        y.coefficients()
            .iter()
            .map(|c| c.mod_mul(p.modulus(), prefix.modulus()).unwrap())
            .collect(),
    )
    .unwrap();
    let bound = p.modulus().times(&big_t).unwrap();
    for (a, b) in original.coefficients().iter().zip(y_p.coefficients()) {
        let diff = a.mod_sub(b, prefix.modulus()).unwrap();
        let magnitude = if diff > prefix.modulus().divided_by(&BigInteger::from_u64(2)).unwrap() {
            prefix.modulus().minus(&diff).unwrap()
        } else {
            diff
        };
        assert!(magnitude.modulo(&big_t).unwrap().is_zero());
        assert!(magnitude <= bound);
    }
}

#[test]
fn test_mod_down_rejects_missing_p_towers() {
    let (q, p) = q_and_p();
    let tables = ModDownTables::new(Arc::clone(&q), p, None).unwrap();
    let x = RnsPolynomial::zero(Arc::new(q.slice(0, 1).unwrap()), Format::Coefficient);
    assert!(matches!(
        approx_mod_down(&x, &tables),
        Err(RingError::TowerCountMismatch { .. })
    ));
}
