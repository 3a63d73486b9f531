use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use kennitala::{EntityKind, Kennitala, KennitalaGen};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse canonical", |b| {
        b.iter(|| Kennitala::parse(black_box("0101302989")))
    });
    c.bench_function("parse with junk", |b| {
        b.iter(|| Kennitala::parse(black_box("Mjá 🐈 kisa 010130-2989")))
    });
}

fn bench_generate(c: &mut Criterion) {
    let mut persons = KennitalaGen::with_rng(EntityKind::Person, StdRng::seed_from_u64(1));
    c.bench_function("generate person", |b| b.iter(|| persons.next_kennitala()));

    let mut companies = KennitalaGen::with_rng(EntityKind::Company, StdRng::seed_from_u64(2));
    c.bench_function("generate company", |b| b.iter(|| companies.next_kennitala()));
}

fn bench_decode(c: &mut Criterion) {
    let kt = Kennitala::parse("6902691399").unwrap();
    c.bench_function("to_date", |b| b.iter(|| black_box(kt).to_date()));
}

criterion_group!(benches, bench_parse, bench_generate, bench_decode);
criterion_main!(benches);
