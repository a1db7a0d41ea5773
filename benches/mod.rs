use criterion::{criterion_group, criterion_main};

mod journal;

use journal::register_benchmarks as register_journal_benchmarks;
use serialization::register_benchmarks as register_serialization_benchmarks;

criterion_group!(
    benches,
    register_journal_benchmarks,
    register_serialization_benchmarks,
);

criterion_main!(benches);
