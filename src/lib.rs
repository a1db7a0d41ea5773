//! # Durable Transaction Journal for Object Prevalence
//!
//! An object-prevalence engine keeps application state entirely in memory.
//! Durability comes from journaling: every state-mutating transaction is
//! appended to disk before it executes, and on restart the journal is
//! replayed to rebuild the state. This crate is that journal.
//!
//! ## Key Features
//!
//! - **Crash Safety**: each append returns only after its bytes are synced.
//!   Every chunk carries a CRC32, and a record torn by a crash at the end of
//!   a file is recognised and dropped on recovery instead of failing it.
//!
//! - **Gapless Sequencing**: every record carries the sequence number it must
//!   be applied against. The journal checks it on append and again on
//!   replay, so a hole or a misordered file is caught loudly.
//!
//! - **Concurrent Appends**: ordering decisions are made in a short,
//!   I/O-free critical section; the writes themselves proceed outside it and
//!   share syncs (group commit).
//!
//! - **File Rotation**: journal files rotate by size, by age, or never.
//!
//! - **Poison on Failure**: a failed write leaves the journal in a state that
//!   cannot be reasoned about, so the journal refuses every further append
//!   until the process restarts.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use prevalence_rs::prelude::*;
//!
//! # fn example() -> Result<(), JournalError> {
//! let config = JournalConfig::new("/var/lib/bank/journal")
//!     .with_size_threshold_bytes(64 * 1024 * 1024);
//! let journal = PersistentJournal::open(config)?;
//!
//! // Replay everything after the last snapshot (here: from the start).
//! let mut balance = 0i64;
//! journal.update(
//!     &mut |record: TransactionRecord| {
//!         balance += i64::from_le_bytes(record.payload().try_into().unwrap_or([0; 8]));
//!     },
//!     1,
//! )?;
//!
//! // Journal, then execute.
//! let sequence = journal.next_transaction()?;
//! journal.append(&TransactionRecord::now(sequence, 25i64.to_le_bytes().to_vec()))?;
//! balance += 25;
//! # let _ = balance;
//! # Ok(())
//! # }
//! ```
//!
//! ## On-Disk Layout
//!
//! A journal directory holds files named `{first_sequence:019}.journal`.
//! Each file is a run of chunks:
//!
//! ```text
//! [4 bytes: payload length][payload][4 bytes: CRC32(length ‖ payload)]
//! ```
//!
//! and each chunk payload is one encoded [`TransactionRecord`]. Files whose
//! first record never reached the disk are renamed to
//! `….journal.unusedFile{millis}` during recovery.
//!
//! ## Feature Flags
//!
//! - `bincode` — [`serialization`] codec producing compact binary payloads
//! - `metrics` — append, rotation, recovery and sync metrics through the
//!   `metrics` facade

pub mod journal;

pub mod prelude;
pub mod serialization;
mod utils;

pub use journal::{
    Journal, JournalConfig, JournalError, JournalState, PersistentJournal, TransactionRecord,
    TransactionSubscriber,
};
#[cfg(feature = "bincode")]
pub use serialization::BincodePayloadCodec;
pub use serialization::{JsonPayloadCodec, PayloadCodec, SerializationError};
pub use utils::{current_time_millis, current_time_nanos};
