//! Transaction journal trait for write-ahead persistence and replay.
//!
//! The [`Journal`] trait defines the contract between a prevalent system and
//! its durable log. A transaction is considered committed only after
//! [`append`](Journal::append) returns `Ok(())`; on restart,
//! [`update`](Journal::update) replays every committed transaction from a
//! given sequence number onwards.
//!
//! See [`PersistentJournal`](super::PersistentJournal) for the file-backed
//! implementation.

use super::error::JournalError;
use super::types::{TransactionRecord, TransactionSubscriber};
use serde::{Deserialize, Serialize};

/// Lifecycle of a journal instance.
///
/// `Uninitialized → Initialized` happens once, through the first successful
/// [`Journal::update`]. `Poisoned` and `Closed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JournalState {
    /// `update` has not succeeded yet; appends are rejected.
    Uninitialized,
    /// The sequence counter is known; appends are accepted.
    Initialized,
    /// A write or close failed; every further append is rejected.
    Poisoned,
    /// The journal was closed by its owner.
    Closed,
}

impl std::fmt::Display for JournalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JournalState::Uninitialized => "uninitialized",
            JournalState::Initialized => "initialized",
            JournalState::Poisoned => "poisoned",
            JournalState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// A durable, gapless log of transactions.
///
/// # Thread Safety
///
/// The trait requires `Send + Sync`: any number of threads may call
/// [`append`](Journal::append) concurrently. [`update`](Journal::update)
/// must not run concurrently with `append`; it is meant to be called once
/// during startup, before the system accepts transactions.
pub trait Journal: Send + Sync {
    /// Durably append `record`.
    ///
    /// The record's `system_version` must equal
    /// [`next_transaction`](Journal::next_transaction). The record is on
    /// stable storage when this method returns `Ok(())`.
    ///
    /// # Errors
    ///
    /// * [`JournalError::NotInitialized`] before the first `update`
    /// * [`JournalError::Aborted`] if this call failed to write or rotate;
    ///   the journal is poisoned afterwards
    /// * [`JournalError::Unavailable`] if the journal is poisoned or closed
    fn append(&self, record: &TransactionRecord) -> Result<(), JournalError>;

    /// Recover the journal and replay transactions from
    /// `initial_transaction_wanted` onwards into `subscriber`.
    ///
    /// The first call initializes the sequence counter. Later calls only
    /// check that the files on disk still agree with it and deliver nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal is corrupt, has gaps, or has not yet
    /// reached `initial_transaction_wanted`. Apart from a later call asking
    /// for a transaction beyond the counter, a failed `update` poisons the
    /// journal and every further call returns
    /// [`JournalError::Unavailable`].
    fn update(
        &self,
        subscriber: &mut dyn TransactionSubscriber,
        initial_transaction_wanted: u64,
    ) -> Result<(), JournalError>;

    /// The sequence number the next appended transaction must carry.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::NotInitialized`] before the first `update`.
    fn next_transaction(&self) -> Result<u64, JournalError>;

    /// Verify every chunk checksum and record header in the journal.
    ///
    /// # Errors
    ///
    /// Returns the first [`JournalError::CorruptEntry`] or
    /// [`JournalError::InvalidRecord`] encountered, or an I/O error.
    fn verify_integrity(&self) -> Result<(), JournalError>;

    /// Flush and close the open journal file. Idempotent.
    ///
    /// On a poisoned journal the file is released without a final sync.
    ///
    /// # Errors
    ///
    /// Returns an error if the final sync fails, or
    /// [`JournalError::Unavailable`] if the journal was poisoned.
    fn close(&self) -> Result<(), JournalError>;
}
