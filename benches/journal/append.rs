use criterion::{BenchmarkId, Criterion};
use prevalence_rs::prelude::*;
use std::sync::Arc;
use std::thread;

fn fresh_journal(config: impl FnOnce(JournalConfig) -> JournalConfig) -> (tempfile::TempDir, Arc<PersistentJournal>) {
    let dir = tempfile::tempdir().expect("tempdir must be created in bench setup");
    let journal = PersistentJournal::open(config(JournalConfig::new(dir.path())))
        .expect("journal must open in bench setup");
    journal
        .update(&mut Vec::<TransactionRecord>::new(), 1)
        .expect("journal must initialize in bench setup");
    (dir, Arc::new(journal))
}

/// Register append benchmarks. Every append is synced, so these measure
/// the storage device as much as the journal.
pub fn register_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("Journal - Append");
    group.sample_size(10);

    group.bench_function("single_thread_append", |b| {
        let (_dir, journal) = fresh_journal(|config| config);
        b.iter(|| {
            journal
                .append_next(TransactionRecord::now(0, vec![7u8; 128]))
                .expect("append")
        })
    });

    group.bench_function("single_thread_append_with_rotation", |b| {
        let (_dir, journal) = fresh_journal(|config| config.with_size_threshold_bytes(16 * 1_024));
        b.iter(|| {
            journal
                .append_next(TransactionRecord::now(0, vec![7u8; 128]))
                .expect("append")
        })
    });

    // Concurrent appenders share syncs through group commit.
    for &threads in &[2usize, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("concurrent_append_x16", threads),
            &threads,
            |b, &threads| {
                let (_dir, journal) = fresh_journal(|config| config);
                b.iter(|| {
                    let handles: Vec<_> = (0..threads)
                        .map(|_| {
                            let journal = Arc::clone(&journal);
                            thread::spawn(move || {
                                for _ in 0..16 {
                                    let _ = journal
                                        .append_next(TransactionRecord::now(0, vec![7u8; 128]));
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        let _ = handle.join();
                    }
                })
            },
        );
    }

    group.finish();
}
