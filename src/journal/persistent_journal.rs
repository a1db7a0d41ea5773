//! File-backed transaction journal.
//!
//! [`PersistentJournal`] writes every transaction to `.journal` files in one
//! directory, rotates files by size and age, and replays them on restart.
//!
//! # Append protocol
//!
//! An append passes through the journal's [`TurnGate`] once, briefly: inside
//! the turn it checks the record's sequence number, decides whether to
//! rotate, assigns the sequence and picks the writer. No I/O happens there.
//! The framed record is then written and synced outside the turn, so
//! concurrent appenders keep several syncs in flight while the
//! [`DurableWriter`] keeps their bytes in sequence order. A caller that
//! rotated closes the retired file after its own record is durable.
//!
//! Any failure after a sequence number has been handed out leaves a hole the
//! journal cannot fill, so it poisons the journal: the failing caller gets
//! [`JournalError::Aborted`] and every later caller
//! [`JournalError::Unavailable`].
//!
//! # Recovery
//!
//! [`update`](Journal::update) locates the file containing the wanted
//! transaction and reads files forward, following the chain of names each
//! file's end implies. A file whose very first record never made it to disk
//! is quarantined so a fresh file can take its name.

use super::chunk::{ChunkError, MAX_CHUNK_SIZE, encode_chunk};
use super::config::JournalConfig;
use super::directory::{
    find_initial_journal_file, journal_file, journal_suffix, journal_version,
    list_journal_files, produce_directory, rename_unused_file,
};
use super::error::JournalError;
use super::reader::DurableReader;
use super::transaction_log::{Journal, JournalState};
use super::turn::{Halt, Turn, TurnGate};
use super::types::{TransactionRecord, TransactionSubscriber, stamp_system_version};
use super::writer::DurableWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Bookkeeping guarded by the turn gate. Nothing in here touches the disk.
#[derive(Debug, Default)]
struct AppendState {
    /// Sequence the next append must carry; `None` until `update`.
    next_transaction: Option<u64>,
    /// Counter value chosen by the first `update`.
    initial_transaction: u64,
    /// Writer for the file currently being appended to.
    writer: Option<Arc<DurableWriter>>,
}

/// What an append decided inside its turn.
struct Assignment {
    sequence: u64,
    writer: Arc<DurableWriter>,
    /// Rotated-out writer and the last sequence assigned to it.
    retired: Option<(Arc<DurableWriter>, u64)>,
}

/// What replay does with the records it reads.
enum ReplayMode<'a> {
    /// Deliver records to the subscriber and quarantine lost files.
    Deliver(&'a mut dyn TransactionSubscriber),
    /// Only check records; never touch files.
    Verify,
}

/// A crash-safe journal over a directory of rotated files.
///
/// # Example
///
/// ```rust,no_run
/// use prevalence_rs::prelude::*;
///
/// # fn example() -> Result<(), JournalError> {
/// let journal = PersistentJournal::open(JournalConfig::new("/var/lib/bank/journal"))?;
///
/// let mut replayed: Vec<TransactionRecord> = Vec::new();
/// journal.update(&mut replayed, 1)?;
///
/// let sequence = journal.next_transaction()?;
/// journal.append(&TransactionRecord::now(sequence, b"deposit 10".to_vec()))?;
/// journal.close()?;
/// # Ok(())
/// # }
/// ```
pub struct PersistentJournal {
    config: JournalConfig,
    gate: TurnGate<AppendState>,
}

impl PersistentJournal {
    /// Open a journal over `config.directory`, creating the directory if
    /// needed. The journal starts uninitialized; call
    /// [`update`](Journal::update) before appending.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidConfiguration`] for an invalid suffix
    /// or an unusable directory.
    pub fn open(config: JournalConfig) -> Result<Self, JournalError> {
        config.validate()?;
        produce_directory(&config.directory)?;
        debug!(
            directory = %config.directory.display(),
            suffix = %config.suffix,
            size_threshold_bytes = config.size_threshold_bytes,
            age_threshold_ms = config.age_threshold.as_millis() as u64,
            "journal opened"
        );
        Ok(Self {
            config,
            gate: TurnGate::new(AppendState::default()),
        })
    }

    /// The configuration this journal was opened with.
    #[must_use]
    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    /// Append `record` as the next transaction, whatever its
    /// `system_version` says, and return the sequence number it was given.
    ///
    /// For producers that cannot know the counter in advance.
    ///
    /// # Errors
    ///
    /// Same as [`Journal::append`], except that no sequence mismatch is
    /// possible.
    pub fn append_next(&self, record: TransactionRecord) -> Result<u64, JournalError> {
        let body = encode_body(&record)?;
        self.append_body(body, None)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> JournalState {
        match self.gate.halt() {
            Some(Halt::Aborted(_)) => JournalState::Poisoned,
            Some(Halt::Closed) => JournalState::Closed,
            None => self
                .gate
                .inspect(|state| {
                    if state.next_transaction.is_some() {
                        JournalState::Initialized
                    } else {
                        JournalState::Uninitialized
                    }
                })
                .unwrap_or(JournalState::Poisoned),
        }
    }

    /// Live journal files of this journal's kind, in sequence order.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Io`] if the directory cannot be listed.
    pub fn journal_files(&self) -> Result<Vec<PathBuf>, JournalError> {
        Ok(list_journal_files(&self.config.directory)?
            .into_iter()
            .filter(|(_, path)| journal_suffix(path) == Some(self.config.suffix.as_str()))
            .map(|(_, path)| path)
            .collect())
    }

    fn append_body(&self, mut body: Vec<u8>, expected: Option<u64>) -> Result<u64, JournalError> {
        let Assignment {
            sequence,
            writer,
            retired,
        } = {
            let mut turn = self.gate.start_turn()?;
            let next = turn.next_transaction.ok_or(JournalError::NotInitialized)?;
            if let Some(found) = expected.filter(|found| *found != next) {
                let mismatch = JournalError::SequenceMismatch {
                    expected: next,
                    found,
                };
                return Err(self.gate.abort_turn(
                    "All transaction processing is now aborted. A transaction arrived out of sequence.",
                    Some(&mismatch),
                ));
            }
            self.assign(&mut turn, next)?
        };

        stamp_system_version(&mut body, sequence);
        let written = encode_chunk(&body)
            .map_err(|e| JournalError::InvalidRecord {
                message: e.to_string(),
            })
            .and_then(|chunk| writer.write(sequence, &chunk));
        if let Err(err) = written {
            writer.fail(&err.to_string());
            return Err(self.gate.abort_turn(
                "All transaction processing is now aborted. An error occurred while writing to a journal file.",
                Some(&err),
            ));
        }
        trace!(sequence, path = %writer.path().display(), "transaction journaled");
        #[cfg(feature = "metrics")]
        metrics::counter!("journal_appends_total").increment(1);

        if let Some((retired, last_sequence)) = retired {
            self.retire(&retired, last_sequence)?;
        }
        Ok(sequence)
    }

    /// Inside the turn: rotate if needed, hand out `sequence` and the
    /// writer it goes to.
    fn assign(
        &self,
        turn: &mut Turn<'_, AppendState>,
        sequence: u64,
    ) -> Result<Assignment, JournalError> {
        let next = sequence
            .checked_add(1)
            .ok_or_else(|| JournalError::IllegalState {
                message: "transaction sequence exhausted".to_string(),
            })?;

        let current = turn
            .writer
            .as_ref()
            .filter(|writer| !self.config.should_rotate(writer.size(), writer.age()))
            .map(Arc::clone);

        let mut retired = None;
        let writer = match current {
            Some(writer) => writer,
            None => {
                let path = journal_file(&self.config.directory, sequence, &self.config.suffix);
                let fresh = Arc::new(DurableWriter::new(path, sequence, turn.writer.clone()));
                if let Some(old) = turn.writer.replace(Arc::clone(&fresh)) {
                    debug!(
                        from = %old.path().display(),
                        to = %fresh.path().display(),
                        size = old.size(),
                        "rotating journal file"
                    );
                    #[cfg(feature = "metrics")]
                    metrics::counter!("journal_rotations_total").increment(1);
                    retired = Some((old, sequence - 1));
                }
                fresh
            }
        };

        turn.next_transaction = Some(next);
        Ok(Assignment {
            sequence,
            writer,
            retired,
        })
    }

    /// Close a rotated-out writer once its last record is durable.
    fn retire(&self, retired: &DurableWriter, last_sequence: u64) -> Result<(), JournalError> {
        if let Some(Halt::Aborted(reason)) = self.gate.halt() {
            return Err(JournalError::Unavailable {
                reason: reason.clone(),
            });
        }
        retired.close_after(last_sequence).map_err(|err| {
            self.gate.abort_turn(
                "All transaction processing is now aborted. An error occurred while closing a journal file.",
                Some(&err),
            )
        })
    }

    /// Read journal files forward from `initial_journal`, returning the
    /// sequence number following the last complete record.
    fn replay(
        &self,
        initial_journal: PathBuf,
        initial_transaction: u64,
        mut mode: ReplayMode<'_>,
    ) -> Result<u64, JournalError> {
        let directory = &self.config.directory;
        let suffix = self.config.suffix.as_str();

        let mut recovering = journal_version(&initial_journal)?;
        let mut journal = initial_journal;
        let mut input = DurableReader::open(&journal)?;
        let mut delivered = 0u64;
        let mut files = 1u64;

        loop {
            match input.read_chunk() {
                Ok(chunk) => {
                    if recovering >= initial_transaction {
                        if journal_suffix(&journal) != Some(suffix) {
                            return Err(JournalError::UnsupportedJournalKind {
                                path: journal,
                                suffix: suffix.to_string(),
                            });
                        }
                        let record = TransactionRecord::decode(&chunk)?;
                        if record.system_version() != recovering {
                            return Err(JournalError::SequenceMismatch {
                                expected: recovering,
                                found: record.system_version(),
                            });
                        }
                        if let ReplayMode::Deliver(subscriber) = &mut mode {
                            subscriber.receive(record);
                            delivered += 1;
                        }
                    }
                    recovering = recovering.saturating_add(1);
                }
                Err(ChunkError::EndOfStream | ChunkError::Truncated(_)) => {
                    let next_file = journal_file(directory, recovering, suffix);
                    if next_file == journal {
                        // Not one record of this file survived; free the name.
                        if matches!(mode, ReplayMode::Deliver(_)) {
                            rename_unused_file(&journal)?;
                        }
                        break;
                    }
                    if !next_file.exists() {
                        break;
                    }
                    journal = next_file;
                    input = DurableReader::open(&journal)?;
                    files += 1;
                }
                Err(ChunkError::Corrupt {
                    expected_crc,
                    actual_crc,
                }) => {
                    return Err(JournalError::CorruptEntry {
                        path: journal,
                        offset: input.offset(),
                        expected_crc,
                        actual_crc,
                    });
                }
                Err(ChunkError::TooLarge(length)) => {
                    return Err(JournalError::InvalidRecord {
                        message: format!(
                            "chunk at offset {} of {} declares {length} bytes",
                            input.offset(),
                            journal.display()
                        ),
                    });
                }
                Err(ChunkError::Io(e)) => return Err(JournalError::io_at(e, &journal)),
            }
        }

        if matches!(mode, ReplayMode::Deliver(_)) {
            info!(
                files,
                delivered,
                next_transaction = recovering,
                "journal recovery complete"
            );
            #[cfg(feature = "metrics")]
            metrics::counter!("journal_replayed_records_total").increment(delivered);
        }
        Ok(recovering)
    }

    /// First `update`: replay and set the counter.
    ///
    /// A failed recovery halts the journal; the subscriber may already hold
    /// part of the history, so replaying into it again is never allowed.
    fn initialize(
        &self,
        subscriber: &mut dyn TransactionSubscriber,
        initial_transaction_wanted: u64,
    ) -> Result<(), JournalError> {
        let next_transaction = self
            .recover(subscriber, initial_transaction_wanted)
            .map_err(|err| self.halt_recovery(err))?;

        let mut turn = self.gate.start_turn()?;
        if turn.next_transaction.is_some() {
            return Err(JournalError::IllegalState {
                message: "journal was initialized by a concurrent update".to_string(),
            });
        }
        turn.next_transaction = Some(next_transaction);
        turn.initial_transaction = next_transaction;
        Ok(())
    }

    /// Deliver every record from `initial_transaction_wanted` on and return
    /// the next transaction number.
    fn recover(
        &self,
        subscriber: &mut dyn TransactionSubscriber,
        initial_transaction_wanted: u64,
    ) -> Result<u64, JournalError> {
        let next_transaction =
            match find_initial_journal_file(&self.config.directory, initial_transaction_wanted)? {
                None => {
                    info!(
                        directory = %self.config.directory.display(),
                        next_transaction = initial_transaction_wanted,
                        "no journal files found, starting a fresh journal"
                    );
                    initial_transaction_wanted
                }
                Some(initial_journal) => {
                    let next = self.replay(
                        initial_journal,
                        initial_transaction_wanted,
                        ReplayMode::Deliver(subscriber),
                    )?;
                    if next < initial_transaction_wanted {
                        return Err(JournalError::NotYetReached {
                            wanted: initial_transaction_wanted,
                            last_logged: next.saturating_sub(1),
                        });
                    }
                    next
                }
            };
        Ok(next_transaction)
    }

    /// Stop the journal after recovery found the files unusable, and hand
    /// back the error that explains why.
    fn halt_recovery(&self, err: JournalError) -> JournalError {
        let _ = self.gate.abort_turn(
            "All transaction processing is now aborted. The journal files could not be recovered.",
            Some(&err),
        );
        err
    }

    /// Later `update`s: check that the files still agree with the counter.
    fn revalidate(
        &self,
        known: u64,
        initial_transaction: u64,
        initial_transaction_wanted: u64,
    ) -> Result<(), JournalError> {
        if known < initial_transaction_wanted {
            return Err(JournalError::NotYetReached {
                wanted: initial_transaction_wanted,
                last_logged: known.saturating_sub(1),
            });
        }

        let from = initial_transaction_wanted.max(initial_transaction);
        self.verify_counter(known, initial_transaction, from)
            .map_err(|err| self.halt_recovery(err))
    }

    /// Check that the files from `from` on end exactly at `known`.
    fn verify_counter(
        &self,
        known: u64,
        initial_transaction: u64,
        from: u64,
    ) -> Result<(), JournalError> {
        let computed = match find_initial_journal_file(&self.config.directory, from)? {
            None => initial_transaction,
            Some(initial_journal) => self.replay(initial_journal, from, ReplayMode::Verify)?,
        };

        if computed < known {
            return Err(JournalError::MissingJournalFile { sequence: computed });
        }
        if computed > known {
            return Err(JournalError::IllegalState {
                message: format!(
                    "journal files reach transaction {computed}, beyond the counter {known}"
                ),
            });
        }
        Ok(())
    }
}

/// Encode a record body, rejecting records too large to frame.
fn encode_body(record: &TransactionRecord) -> Result<Vec<u8>, JournalError> {
    let body = record.encode();
    if body.len() > MAX_CHUNK_SIZE {
        return Err(JournalError::InvalidRecord {
            message: format!(
                "record {} is {} bytes, more than the {MAX_CHUNK_SIZE} byte chunk limit",
                record.system_version(),
                body.len()
            ),
        });
    }
    Ok(body)
}

impl Journal for PersistentJournal {
    fn append(&self, record: &TransactionRecord) -> Result<(), JournalError> {
        let body = encode_body(record)?;
        self.append_body(body, Some(record.system_version()))
            .map(|_| ())
    }

    fn update(
        &self,
        subscriber: &mut dyn TransactionSubscriber,
        initial_transaction_wanted: u64,
    ) -> Result<(), JournalError> {
        let (known, initial_transaction) = {
            let turn = self.gate.start_turn()?;
            (turn.next_transaction, turn.initial_transaction)
        };
        match known {
            None => self.initialize(subscriber, initial_transaction_wanted),
            Some(known) => {
                self.revalidate(known, initial_transaction, initial_transaction_wanted)
            }
        }
    }

    fn next_transaction(&self) -> Result<u64, JournalError> {
        self.gate
            .inspect(|state| state.next_transaction)?
            .ok_or(JournalError::NotInitialized)
    }

    fn verify_integrity(&self) -> Result<(), JournalError> {
        for path in self.journal_files()? {
            verify_file(&path)?;
        }
        Ok(())
    }

    fn close(&self) -> Result<(), JournalError> {
        let (writer, next_transaction) = {
            let mut turn = match self.gate.start_turn() {
                Ok(turn) => turn,
                Err(_) if self.gate.halt() == Some(&Halt::Closed) => return Ok(()),
                Err(err) => {
                    // Aborted: release the file without vouching for it.
                    if self.gate.is_aborted() {
                        let abandoned = self.gate.inspect_mut(|state| state.writer.take())?;
                        if let Some(writer) = abandoned {
                            debug!(
                                path = %writer.path().display(),
                                "journal file released after abort"
                            );
                        }
                    }
                    return Err(err);
                }
            };
            self.gate.close();
            (turn.writer.take(), turn.next_transaction)
        };

        if let (Some(writer), Some(next)) = (writer, next_transaction) {
            writer.close_after(next.saturating_sub(1))?;
        }
        debug!(directory = %self.config.directory.display(), "journal closed");
        Ok(())
    }
}

/// Check every chunk of one file, tolerating a torn tail.
fn verify_file(path: &Path) -> Result<(), JournalError> {
    let mut expected = journal_version(path)?;
    let mut input = DurableReader::open(path)?;
    loop {
        match input.read_chunk() {
            Ok(chunk) => {
                let record = TransactionRecord::decode(&chunk)?;
                if record.system_version() != expected {
                    return Err(JournalError::SequenceMismatch {
                        expected,
                        found: record.system_version(),
                    });
                }
                expected = expected.saturating_add(1);
            }
            Err(ChunkError::EndOfStream | ChunkError::Truncated(_)) => return Ok(()),
            Err(ChunkError::Corrupt {
                expected_crc,
                actual_crc,
            }) => {
                return Err(JournalError::CorruptEntry {
                    path: path.to_path_buf(),
                    offset: input.offset(),
                    expected_crc,
                    actual_crc,
                });
            }
            Err(ChunkError::TooLarge(length)) => {
                return Err(JournalError::InvalidRecord {
                    message: format!(
                        "chunk at offset {} of {} declares {length} bytes",
                        input.offset(),
                        path.display()
                    ),
                });
            }
            Err(ChunkError::Io(e)) => return Err(JournalError::io_at(e, path)),
        }
    }
}

impl std::fmt::Debug for PersistentJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentJournal")
            .field("directory", &self.config.directory)
            .field("suffix", &self.config.suffix)
            .field("state", &self.state())
            .field("next_transaction", &self.next_transaction().ok())
            .finish()
    }
}
