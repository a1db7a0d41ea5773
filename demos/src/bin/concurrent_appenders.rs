// demos/src/bin/concurrent_appenders.rs
//
// This demo runs several threads appending to one journal at the same time.
// Sequence numbers are assigned in a short critical section while the synced
// writes happen outside it, so concurrent appenders share syncs.
//
// Functions demonstrated:
// - `append_next()`: the journal stamps the sequence number
// - size-based rotation under concurrent load
// - `update()` on a fresh instance to check the result
//
// Run this demo with:
//   cargo run --bin concurrent_appenders
//   (from the demos directory)

use prevalence_rs::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{error, info};

const THREADS: usize = 8;
const PER_THREAD: usize = 250;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let directory = std::env::temp_dir().join(format!(
        "prevalence-concurrent-{}",
        current_time_millis()
    ));

    if let Err(err) = run(&directory) {
        error!("concurrent demo failed: {err}");
        std::process::exit(1);
    }
    let _ = std::fs::remove_dir_all(&directory);
}

fn run(directory: &std::path::Path) -> Result<(), JournalError> {
    let config = JournalConfig::new(directory).with_size_threshold_bytes(16 * 1024);
    let journal = Arc::new(PersistentJournal::open(config)?);
    journal.update(&mut Vec::<TransactionRecord>::new(), 1)?;

    info!("\n=== {THREADS} threads x {PER_THREAD} appends ===");
    let started = Instant::now();
    let handles: Vec<_> = (0..THREADS)
        .map(|worker| {
            let journal = Arc::clone(&journal);
            thread::spawn(move || -> Result<(), JournalError> {
                for i in 0..PER_THREAD {
                    let payload = format!("worker {worker} op {i}").into_bytes();
                    journal.append_next(TransactionRecord::now(0, payload))?;
                }
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        match handle.join() {
            Ok(result) => result?,
            Err(_) => {
                return Err(JournalError::IllegalState {
                    message: "appender thread panicked".to_string(),
                });
            }
        }
    }
    let elapsed = started.elapsed();
    let total = THREADS * PER_THREAD;
    info!(
        "{total} durable appends in {elapsed:?} ({:.0} appends/s)",
        total as f64 / elapsed.as_secs_f64()
    );
    journal.close()?;
    info!("Files written: {}", journal.journal_files()?.len());

    info!("\n=== Replaying on a fresh instance ===");
    let restarted = PersistentJournal::open(JournalConfig::new(directory))?;
    let mut expected = 1u64;
    let mut in_order = true;
    restarted.update(
        &mut |record: TransactionRecord| {
            in_order &= record.system_version() == expected;
            expected += 1;
        },
        1,
    )?;
    info!(
        "Replayed {} records, gapless and in order: {in_order}",
        expected - 1
    );
    Ok(())
}
