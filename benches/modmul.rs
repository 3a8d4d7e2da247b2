use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use dcrt_core::math::ModularArithmetic;
use dcrt_core::rings::generate_primes;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::hint::black_box;

const OPERANDS: usize = 1024;

fn operands(modulus: u64) -> Vec<(u64, u64)> {
    let mut rng = ChaCha20Rng::seed_from_u64(modulus);
    (0..OPERANDS)
        .map(|_| (rng.random_range(0..modulus), rng.random_range(0..modulus)))
        .collect()
}

fn bench_mod_mul(c: &mut Criterion) {
    let mut group = c.benchmark_group("mod_mul");
    for bits in [30u32, 50, 60] {
        let modulus = generate_primes::<u64>(bits, 1, 1 << 14).unwrap()[0];
        let pairs = operands(modulus);
        let mu = modulus.compute_mu().unwrap();
        let wide_mu = modulus.compute_wide_mu();
        let preconditioned: Vec<(u64, u64, u64)> = pairs
            .iter()
            .map(|&(a, b)| (a, b, b.prep_mod_mul_const(modulus)))
            .collect();

        group.bench_with_input(BenchmarkId::new("naive", bits), &pairs, |bench, pairs| {
            bench.iter(|| {
                pairs
                    .iter()
                    .fold(0u64, |acc, &(a, b)| acc ^ a.mod_mul(black_box(b), modulus))
            });
        });
        group.bench_with_input(BenchmarkId::new("barrett", bits), &pairs, |bench, pairs| {
            bench.iter(|| {
                pairs.iter().fold(0u64, |acc, &(a, b)| {
                    acc ^ a.mod_mul_barrett(black_box(b), modulus, mu)
                })
            });
        });
        group.bench_with_input(BenchmarkId::new("wide", bits), &pairs, |bench, pairs| {
            bench.iter(|| {
                pairs.iter().fold(0u64, |acc, &(a, b)| {
                    let product = a as u128 * black_box(b) as u128;
                    acc ^ u64::reduce_wide(product, modulus, wide_mu)
                })
            });
        });
        group.bench_with_input(
            BenchmarkId::new("shoup", bits),
            &preconditioned,
            |bench, triples| {
                bench.iter(|| {
                    triples.iter().fold(0u64, |acc, &(a, b, b_inv)| {
                        acc ^ a.mod_mul_fast_const(black_box(b), modulus, b_inv)
                    })
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_mod_mul);
criterion_main!(benches);
