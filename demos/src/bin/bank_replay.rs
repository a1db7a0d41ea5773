// demos/src/bin/bank_replay.rs
//
// This demo keeps a tiny bank entirely in memory and makes it durable with a
// journal. Every transaction is journaled before it is executed; on start-up
// the journal is replayed to rebuild the balances.
//
// Functions demonstrated:
// - `PersistentJournal::open()` / `update()`: recovery and replay
// - `append()`: write-ahead logging with explicit sequence numbers
// - `TransactionRecord::from_value()` / `decode_with()`: payload codecs
//
// Run this demo twice to watch the state come back:
//   cargo run --bin bank_replay -- /tmp/bank-journal
//   (from the demos directory)

use prevalence_rs::current_time_nanos;
use prevalence_rs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
enum BankTransaction {
    Deposit { account: String, cents: u64 },
    Transfer { from: String, to: String, cents: u64 },
}

/// The prevalent system: nothing here is ever written to disk directly.
#[derive(Debug, Default)]
struct Bank {
    balances: BTreeMap<String, i64>,
}

impl Bank {
    fn execute(&mut self, transaction: &BankTransaction) {
        match transaction {
            BankTransaction::Deposit { account, cents } => {
                *self.balances.entry(account.clone()).or_default() += *cents as i64;
            }
            BankTransaction::Transfer { from, to, cents } => {
                *self.balances.entry(from.clone()).or_default() -= *cents as i64;
                *self.balances.entry(to.clone()).or_default() += *cents as i64;
            }
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let directory = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("prevalence-bank-journal"));

    if let Err(err) = run(directory) {
        error!("bank demo failed: {err}");
        std::process::exit(1);
    }
}

fn run(directory: PathBuf) -> Result<(), JournalError> {
    info!("\n=== Opening journal at {} ===", directory.display());
    let config = JournalConfig::new(&directory).with_size_threshold_bytes(512);
    let journal = PersistentJournal::open(config)?;
    let codec = JsonPayloadCodec::new();

    info!("\n=== Replaying ===");
    let mut bank = Bank::default();
    let mut replay_error = None;
    journal.update(
        &mut |record: TransactionRecord| match record.decode_with::<_, BankTransaction>(&codec) {
            Ok(transaction) => bank.execute(&transaction),
            Err(err) => replay_error = Some(err),
        },
        1,
    )?;
    if let Some(err) = replay_error {
        return Err(err);
    }
    info!("Recovered balances: {:?}", bank.balances);
    info!("Next transaction: {}", journal.next_transaction()?);

    info!("\n=== Executing new transactions ===");
    let transactions = [
        BankTransaction::Deposit {
            account: "alice".to_string(),
            cents: 10_000,
        },
        BankTransaction::Deposit {
            account: "bob".to_string(),
            cents: 2_500,
        },
        BankTransaction::Transfer {
            from: "alice".to_string(),
            to: "bob".to_string(),
            cents: 1_200,
        },
    ];
    for transaction in &transactions {
        let sequence = journal.next_transaction()?;
        let record =
            TransactionRecord::from_value(&codec, sequence, current_time_nanos(), transaction)?;
        // Journal first, execute second.
        journal.append(&record)?;
        bank.execute(transaction);
        info!("#{sequence}: {transaction:?}");
    }

    info!("Balances now: {:?}", bank.balances);
    info!("Journal files: {:?}", journal.journal_files()?);
    journal.verify_integrity()?;
    journal.close()?;
    Ok(())
}
