mod append;
mod replay;

use criterion::Criterion;

/// Register every journal benchmark.
pub fn register_benchmarks(c: &mut Criterion) {
    chunk::register_benchmarks(c);
    append::register_benchmarks(c);
    replay::register_benchmarks(c);
}
