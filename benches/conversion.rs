use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use dcrt_core::conversion::{
    approx_mod_down, drop_last_element_and_scale, fast_base_conv_q_to_bsk_montgomery,
    fast_base_conv_sk, fast_rns_floor_q, scale_and_round, scale_and_round_gamma,
    switch_crt_basis,
};
use dcrt_core::{
    BehzTables, Format, GammaScaleTables, ModDownTables, RescaleTables, RnsBasis,
    RnsBasisBuilder, RnsPolynomial, ScaleTables, SwitchTables,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::hint::black_box;
use std::sync::Arc;

const DIMENSIONS: [usize; 2] = [1 << 10, 1 << 12];

fn basis(n: usize, bits: u32, count: usize) -> Arc<RnsBasis<u64>> {
    RnsBasisBuilder::new(n)
        .with_prime_bits(bits)
        .with_prime_count(count)
        .build::<u64>()
        .unwrap()
}

fn sample(basis: &Arc<RnsBasis<u64>>, format: Format, seed: u64) -> RnsPolynomial<u64> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    RnsPolynomial::from_uniform(Arc::clone(basis), format, &mut rng)
}

fn bench_ntt(c: &mut Criterion) {
    let mut group = c.benchmark_group("ntt");
    for n in DIMENSIONS {
        let q = basis(n, 55, 4);
        let x = sample(&q, Format::Coefficient, 1);
        group.bench_with_input(BenchmarkId::new("round_trip", n), &x, |b, x| {
            b.iter(|| {
                black_box(x.clone())
                    .into_format(Format::Evaluation)
                    .and_then(|y| y.into_format(Format::Coefficient))
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_switch(c: &mut Criterion) {
    let mut group = c.benchmark_group("switch_crt_basis");
    for n in DIMENSIONS {
        let q = basis(n, 50, 4);
        let p = basis(n, 45, 5);
        let tables = SwitchTables::new(Arc::clone(&q), p).unwrap();
        let x = sample(&q, Format::Coefficient, 2);
        group.bench_with_input(BenchmarkId::from_parameter(n), &x, |b, x| {
            b.iter(|| switch_crt_basis(black_box(x), &tables).unwrap());
        });
    }
    group.finish();
}

fn bench_mod_down(c: &mut Criterion) {
    let mut group = c.benchmark_group("approx_mod_down");
    for n in DIMENSIONS {
        let q = basis(n, 50, 4);
        let p = basis(n, 45, 2);
        let extended = Arc::new(q.concat(&p).unwrap());
        let tables = ModDownTables::new(q, p, None).unwrap();
        let x = sample(&extended, Format::Evaluation, 3);
        group.bench_with_input(BenchmarkId::from_parameter(n), &x, |b, x| {
            b.iter(|| approx_mod_down(black_box(x), &tables).unwrap());
        });
    }
    group.finish();
}

fn bench_scale_and_round(c: &mut Criterion) {
    let mut group = c.benchmark_group("scale_and_round");
    let t = 65537u64;
    for n in DIMENSIONS {
        let q = basis(n, 50, 4);
        let float = ScaleTables::new(Arc::clone(&q), t).unwrap();
        let gamma = GammaScaleTables::new(Arc::clone(&q), t).unwrap();
        let x = sample(&q, Format::Coefficient, 4);
        group.bench_with_input(BenchmarkId::new("float", n), &x, |b, x| {
            b.iter(|| scale_and_round(black_box(x), &float).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("gamma", n), &x, |b, x| {
            b.iter(|| scale_and_round_gamma(black_box(x), &gamma).unwrap());
        });
    }
    group.finish();
}

fn bench_behz(c: &mut Criterion) {
    let mut group = c.benchmark_group("behz");
    for n in DIMENSIONS {
        let q = basis(n, 50, 3);
        let tables = BehzTables::generate(Arc::clone(&q), 65537).unwrap();
        let x = sample(&q, Format::Coefficient, 5);
        group.bench_with_input(BenchmarkId::new("pipeline", n), &x, |b, x| {
            b.iter(|| {
                let lifted = fast_base_conv_q_to_bsk_montgomery(black_box(x), &tables).unwrap();
                let floored = fast_rns_floor_q(&lifted, &tables).unwrap();
                fast_base_conv_sk(&floored, &tables).unwrap()
            });
        });
    }
    group.finish();
}

fn bench_rescale(c: &mut Criterion) {
    let mut group = c.benchmark_group("drop_last_element_and_scale");
    for n in DIMENSIONS {
        let q = basis(n, 50, 5);
        let tables = RescaleTables::new(Arc::clone(&q)).unwrap();
        let x = sample(&q, Format::Evaluation, 6);
        group.bench_with_input(BenchmarkId::from_parameter(n), &x, |b, x| {
            b.iter(|| {
                let mut y = x.clone();
                drop_last_element_and_scale(&mut y, &tables).unwrap();
                y
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_ntt,
    bench_switch,
    bench_mod_down,
    bench_scale_and_round,
    bench_behz,
    bench_rescale
);
criterion_main!(benches);
