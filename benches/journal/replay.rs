use criterion::{BenchmarkId, Criterion};
use prevalence_rs::prelude::*;

/// Register replay benchmarks over journals of varying length.
pub fn register_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("Journal - Replay");
    group.sample_size(10);

    for &records in &[100u64, 1_000] {
        let dir = tempfile::tempdir().expect("tempdir must be created in bench setup");
        {
            let config = JournalConfig::new(dir.path()).with_size_threshold_bytes(64 * 1_024);
            let journal = PersistentJournal::open(config).expect("journal must open");
            journal
                .update(&mut Vec::<TransactionRecord>::new(), 1)
                .expect("journal must initialize");
            for sequence in 1..=records {
                journal
                    .append(&TransactionRecord::new(sequence, sequence, vec![3u8; 256]))
                    .expect("append");
            }
            journal.close().expect("close");
        }

        group.bench_with_input(BenchmarkId::new("update", records), &records, |b, &records| {
            b.iter(|| {
                let journal = PersistentJournal::open(JournalConfig::new(dir.path()))
                    .expect("journal must open");
                let mut replayed = 0u64;
                journal
                    .update(&mut |_record: TransactionRecord| replayed += 1, 1)
                    .expect("replay");
                assert_eq!(replayed, records);
            })
        });
    }

    group.finish();
}
