// Cross-checks BigInteger against crypto-bigint as an independent reference.
use crypto_bigint::{NonZero, U256};
use dcrt_core::BigInteger;
use proptest::prelude::*;

fn pair(value: u128) -> (BigInteger, U256) {
    (BigInteger::from_u128(value), U256::from_u128(value))
}

fn non_zero(value: &U256) -> NonZero<U256> {
    NonZero::new(*value).unwrap()
}

#[test]
fn test_decimal_modulo_scenario() {
    let value: BigInteger = "123456789012345678901234567890".parse().unwrap();
    let modulus = BigInteger::from_u64(97);
    assert_eq!(value.modulo(&modulus).unwrap(), BigInteger::from_u64(58));

    let reference = U256::from_u128(123456789012345678901234567890);
    let expected = reference.rem(&non_zero(&U256::from_u64(97)));
    assert_eq!(BigInteger::from_uint(&expected), BigInteger::from_u64(58));
}

#[test]
fn test_decimal_round_trip() {
    let text = "340282366920938463463374607431768211457";
    let value: BigInteger = text.parse().unwrap();
    assert_eq!(value.to_string(), text);
    assert!("12a4".parse::<BigInteger>().is_err());
}

proptest! {
    #[test]
    fn test_addition_matches_reference(a in any::<u128>(), b in any::<u128>()) {
        let (x, rx) = pair(a);
        let (y, ry) = pair(b);
        let expected = BigInteger::from_uint(&rx.wrapping_add(&ry));
        prop_assert_eq!(x.plus(&y).unwrap(), expected);
    }

    #[test]
    fn test_multiplication_matches_reference(a in any::<u128>(), b in any::<u128>()) {
        let (x, rx) = pair(a);
        let (y, ry) = pair(b);
        let expected = BigInteger::from_uint(&rx.wrapping_mul(&ry));
        prop_assert_eq!(x.times(&y).unwrap(), expected);
    }

    #[test]
    fn test_division_matches_reference(a in any::<u128>(), b in 1u128..) {
        let (x, rx) = pair(a);
        let (y, ry) = pair(b);
        let (quotient, remainder) = rx.div_rem(&non_zero(&ry));
        let (q, r) = x.div_mod(&y).unwrap();
        prop_assert_eq!(q, BigInteger::from_uint(&quotient));
        prop_assert_eq!(r, BigInteger::from_uint(&remainder));
    }

    #[test]
    fn test_modular_product_matches_reference(
        a in any::<u128>(),
        b in any::<u128>(),
        m in 2u128..,
    ) {
        let (x, rx) = pair(a);
        let (y, ry) = pair(b);
        let (modulus, rm) = pair(m);
        let expected = rx.wrapping_mul(&ry).rem(&non_zero(&rm));
        prop_assert_eq!(x.mod_mul(&y, &modulus).unwrap(), BigInteger::from_uint(&expected));

        let mu = modulus.compute_mu().unwrap();
        prop_assert_eq!(
            x.mod_mul_barrett(&y, &modulus, &mu).unwrap(),
            BigInteger::from_uint(&expected)
        );
    }

    #[test]
    fn test_modular_subtraction_wraps(a in any::<u64>(), b in any::<u64>(), m in 2u64..) {
        let modulus = BigInteger::from_u64(m);
        let x = BigInteger::from_u64(a % m);
        let y = BigInteger::from_u64(b % m);
        let expected = ((a % m) as u128 + m as u128 - (b % m) as u128) % m as u128;
        prop_assert_eq!(x.mod_sub(&y, &modulus).unwrap(), BigInteger::from_u128(expected));
    }

    #[test]
    fn test_inverse_round_trips(a in 1u64..1_000_000) {
        // 2^61 - 1 is prime
        let modulus = BigInteger::from_u64((1 << 61) - 1);
        let x = BigInteger::from_u64(a);
        let inverse = x.mod_inverse(&modulus).unwrap();
        prop_assert!(x.mod_mul(&inverse, &modulus).unwrap().is_one());
    }

    #[test]
    fn test_uint_conversion_round_trips(a in any::<u128>()) {
        let (x, rx) = pair(a);
        prop_assert_eq!(x.to_uint::<4>().unwrap(), rx);
        prop_assert_eq!(BigInteger::from_uint(&rx), x);
    }
}
