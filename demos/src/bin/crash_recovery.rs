// demos/src/bin/crash_recovery.rs
//
// This demo simulates a crash in the middle of a write by chopping bytes off
// the newest journal file, then recovers.
//
// Functions demonstrated:
// - torn final records are dropped, not reported as corruption
// - a file whose first record never completed is quarantined
// - the freed sequence number is reused by the next append
//
// Run this demo with:
//   cargo run --bin crash_recovery
//   (from the demos directory)

use prevalence_rs::prelude::*;
use std::fs::OpenOptions;
use std::path::Path;
use tracing::{error, info};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let directory =
        std::env::temp_dir().join(format!("prevalence-crash-{}", current_time_millis()));

    if let Err(err) = run(&directory) {
        error!("crash recovery demo failed: {err}");
        std::process::exit(1);
    }
    let _ = std::fs::remove_dir_all(&directory);
}

fn run(directory: &Path) -> Result<(), JournalError> {
    info!("\n=== Writing three transactions, one file each ===");
    {
        let config = JournalConfig::new(directory).with_size_threshold_bytes(1);
        let journal = PersistentJournal::open(config)?;
        journal.update(&mut Vec::<TransactionRecord>::new(), 1)?;
        for (sequence, text) in [(1, "open account"), (2, "deposit"), (3, "withdraw")] {
            journal.append(&TransactionRecord::now(sequence, text.as_bytes().to_vec()))?;
        }
        journal.close()?;
    }

    info!("\n=== Simulating a crash while writing transaction 3 ===");
    let newest = directory.join(format!("{:019}.journal", 3));
    let len = std::fs::metadata(&newest)?.len();
    OpenOptions::new()
        .write(true)
        .open(&newest)?
        .set_len(len / 2)?;
    info!("Chopped {} down to {} bytes", newest.display(), len / 2);

    info!("\n=== Recovering ===");
    let journal = PersistentJournal::open(JournalConfig::new(directory))?;
    let mut recovered: Vec<TransactionRecord> = Vec::new();
    journal.update(&mut recovered, 1)?;
    for record in &recovered {
        info!(
            "#{}: {}",
            record.system_version(),
            String::from_utf8_lossy(record.payload())
        );
    }
    info!("Next transaction: {}", journal.next_transaction()?);

    for entry in std::fs::read_dir(directory)?.flatten() {
        info!("On disk: {}", entry.file_name().to_string_lossy());
    }

    info!("\n=== Retrying transaction 3 ===");
    journal.append(&TransactionRecord::now(3, b"withdraw".to_vec()))?;
    journal.close()?;
    info!("State after retry: {}", journal.state());
    Ok(())
}
