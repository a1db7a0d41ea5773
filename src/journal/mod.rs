//! Durable transaction journal.
//!
//! This module provides the write-ahead log of an object-prevalence system:
//! every state-mutating transaction is appended here, durably, before it is
//! executed, and replayed from here on restart.
//!
//! # Building blocks
//!
//! - [`chunk`] — CRC-checked, length-prefixed framing of opaque byte spans
//! - [`directory`] — journal file naming, enumeration and quarantine
//! - [`DurableWriter`] — ordered, group-committed appends to one file
//! - [`DurableReader`] — sequential chunk reads from one file, telling a
//!   torn tail apart from corruption
//! - [`TurnGate`] — the short critical section that orders appends
//!
//! # The journal
//!
//! - [`Journal`] — trait for append / replay
//! - [`PersistentJournal`] — the file-backed implementation
//! - [`JournalConfig`] — directory, rotation thresholds and file suffix
//! - [`TransactionRecord`] / [`TransactionSubscriber`] — what is stored and
//!   who receives it on replay
//! - [`JournalError`] — error type for every operation above

pub mod chunk;
pub mod config;
pub mod directory;
pub mod error;
pub mod persistent_journal;
pub mod reader;
pub mod transaction_log;
pub mod turn;
pub mod types;
pub mod writer;

pub use chunk::{CHUNK_OVERHEAD, ChunkError, MAX_CHUNK_SIZE};
pub use config::JournalConfig;
pub use directory::DEFAULT_JOURNAL_SUFFIX;
pub use error::JournalError;
pub use persistent_journal::PersistentJournal;
pub use reader::DurableReader;
pub use transaction_log::{Journal, JournalState};
pub use turn::{Halt, Turn, TurnGate};
pub use types::{TransactionRecord, TransactionSubscriber};
pub use writer::DurableWriter;
