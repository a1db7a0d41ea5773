//! Durable, ordered writer for a single journal file.
//!
//! A [`DurableWriter`] is bound to one file for its whole life. It is
//! created without touching the disk (so it can be created inside the
//! journal's turn), opens its file on the first write, and accepts framed
//! records strictly in sequence order: a caller holding sequence `n` waits
//! until `n - 1` has been written.
//!
//! Order also holds across files. A writer created by a rotation keeps its
//! predecessor, and its first record is written only once the predecessor
//! has synced everything before it. A predecessor that fails takes its
//! successor down with it, so no record is acknowledged behind a hole.
//!
//! # Durability
//!
//! [`write`](DurableWriter::write) returns only after the bytes have been
//! handed to `File::sync_data`. Syncing is group-committed: the caller that
//! wins the sync lock flushes every record written so far, and callers whose
//! records were covered by that flush return without syncing again. The
//! guarantee is exactly the one the operating system gives for
//! `fsync`/`fdatasync`; on platforms where those do not reach the storage
//! medium (for example macOS without `F_FULLFSYNC`) it is best effort, and so
//! is the crash safety of the journal built on top.

use super::directory::sync_directory;
use super::error::JournalError;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Bookkeeping guarded by the writer's lock.
struct WriterState {
    /// The next sequence number admitted to write.
    next_sequence: u64,
    /// Set once `close_after` has drained the writer.
    closed: bool,
    /// First write or sync failure; sticky.
    failure: Option<String>,
}

/// Appends framed records to one journal file and makes them durable.
pub struct DurableWriter {
    path: PathBuf,
    first_sequence: u64,
    opened_at: Instant,
    file: OnceLock<File>,
    bytes_written: AtomicU64,
    state: Mutex<WriterState>,
    turn_passed: Condvar,
    /// Every sequence below this value has been synced.
    synced_through: Mutex<u64>,
    /// Writer of the previous file; released once it has synced through
    /// `first_sequence - 1`.
    predecessor: Mutex<Option<Arc<DurableWriter>>>,
}

impl DurableWriter {
    /// Create a writer for the file at `path` whose first record will be
    /// `first_sequence`, following `predecessor` if this file replaces one.
    ///
    /// No I/O happens here; the file is created by the first
    /// [`write`](Self::write).
    #[must_use]
    pub fn new(
        path: PathBuf,
        first_sequence: u64,
        predecessor: Option<Arc<DurableWriter>>,
    ) -> Self {
        Self {
            path,
            first_sequence,
            opened_at: Instant::now(),
            file: OnceLock::new(),
            bytes_written: AtomicU64::new(0),
            state: Mutex::new(WriterState {
                next_sequence: first_sequence,
                closed: false,
                failure: None,
            }),
            turn_passed: Condvar::new(),
            synced_through: Mutex::new(first_sequence),
            predecessor: Mutex::new(predecessor),
        }
    }

    /// Path of the file this writer is bound to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sequence number of the first record in the file.
    #[must_use]
    #[inline]
    pub fn first_sequence(&self) -> u64 {
        self.first_sequence
    }

    /// Bytes written to the file so far.
    #[must_use]
    #[inline]
    pub fn size(&self) -> u64 {
        self.bytes_written.load(Ordering::Acquire)
    }

    /// Time elapsed since the writer was created.
    #[must_use]
    #[inline]
    pub fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }

    /// Returns `true` once the writer has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().map(|state| state.closed).unwrap_or(false)
    }

    /// Write one framed record as sequence `sequence` and sync it.
    ///
    /// Blocks until every earlier sequence has been written (for the first
    /// record of the file: synced by the predecessor), then appends `bytes`
    /// and returns once they are durable.
    ///
    /// # Errors
    ///
    /// * [`JournalError::Io`] if the file cannot be created, written or
    ///   synced; the writer is marked failed and every waiting caller fails
    /// * [`JournalError::IllegalState`] if the writer or its predecessor is
    ///   closed early or failed, or `sequence` was already written
    pub fn write(&self, sequence: u64, bytes: &[u8]) -> Result<(), JournalError> {
        if sequence == self.first_sequence {
            self.await_predecessor()?;
        }
        let written_through = {
            let mut state = self.lock_state()?;
            while state.next_sequence < sequence && state.failure.is_none() && !state.closed {
                state = self
                    .turn_passed
                    .wait(state)
                    .map_err(|_| JournalError::MutexPoisoned)?;
            }
            self.check_usable(&state)?;
            if state.next_sequence != sequence {
                return Err(JournalError::IllegalState {
                    message: format!(
                        "sequence {sequence} is not the next one for {} (expected {})",
                        self.path.display(),
                        state.next_sequence
                    ),
                });
            }

            if let Err(err) = self.append_locked(bytes) {
                state.failure = Some(err.to_string());
                self.turn_passed.notify_all();
                return Err(err);
            }

            state.next_sequence = sequence.saturating_add(1);
            self.turn_passed.notify_all();
            state.next_sequence
        };

        self.sync_through(written_through)
    }

    /// Wait until every sequence up to and including `last_sequence` has
    /// been written, sync, and close the writer.
    ///
    /// Closing an already closed writer is a no-op. The file descriptor
    /// itself is released when the last reference to the writer is dropped.
    ///
    /// # Errors
    ///
    /// Returns the writer's failure if it failed before draining, or
    /// [`JournalError::Io`] if the final sync fails.
    pub fn close_after(&self, last_sequence: u64) -> Result<(), JournalError> {
        let written_through = {
            let mut state = self.lock_state()?;
            while state.next_sequence <= last_sequence
                && state.failure.is_none()
                && !state.closed
            {
                state = self
                    .turn_passed
                    .wait(state)
                    .map_err(|_| JournalError::MutexPoisoned)?;
            }
            if state.closed {
                return Ok(());
            }
            if let Some(failure) = &state.failure {
                return Err(JournalError::IllegalState {
                    message: format!(
                        "cannot close {} after a failure: {failure}",
                        self.path.display()
                    ),
                });
            }
            state.closed = true;
            self.turn_passed.notify_all();
            state.next_sequence
        };

        self.sync_through(written_through)?;
        debug!(
            path = %self.path.display(),
            first_sequence = self.first_sequence,
            bytes = self.size(),
            "journal file closed"
        );
        Ok(())
    }

    /// Block until every sequence up to and including `last_sequence` is
    /// durable in this file.
    fn await_durable(&self, last_sequence: u64) -> Result<(), JournalError> {
        let written_through = {
            let mut state = self.lock_state()?;
            while state.next_sequence <= last_sequence
                && state.failure.is_none()
                && !state.closed
            {
                state = self
                    .turn_passed
                    .wait(state)
                    .map_err(|_| JournalError::MutexPoisoned)?;
            }
            if let Some(failure) = &state.failure {
                return Err(JournalError::IllegalState {
                    message: format!("{} failed: {failure}", self.path.display()),
                });
            }
            if state.next_sequence <= last_sequence {
                return Err(JournalError::IllegalState {
                    message: format!(
                        "{} was closed before transaction {last_sequence}",
                        self.path.display()
                    ),
                });
            }
            state.next_sequence
        };
        self.sync_through(written_through)
    }

    /// Wait for the previous file to sync everything before this one.
    ///
    /// Only the caller holding `first_sequence` gets here; the others wait
    /// for it on this writer's own turn.
    fn await_predecessor(&self) -> Result<(), JournalError> {
        let predecessor = self
            .predecessor
            .lock()
            .map_err(|_| JournalError::MutexPoisoned)?
            .clone();
        let Some(predecessor) = predecessor else {
            return Ok(());
        };

        if let Err(err) = predecessor.await_durable(self.first_sequence.saturating_sub(1)) {
            error!(
                path = %self.path.display(),
                predecessor = %predecessor.path().display(),
                error = %err,
                "previous journal file did not complete"
            );
            self.fail(&err.to_string());
            return Err(err);
        }
        if let Ok(mut slot) = self.predecessor.lock() {
            slot.take();
        }
        Ok(())
    }

    /// Mark the writer failed so that callers waiting for their turn give up.
    pub(crate) fn fail(&self, reason: &str) {
        if let Ok(mut state) = self.state.lock() {
            if state.failure.is_none() {
                state.failure = Some(reason.to_string());
            }
            self.turn_passed.notify_all();
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, WriterState>, JournalError> {
        self.state.lock().map_err(|_| JournalError::MutexPoisoned)
    }

    fn check_usable(&self, state: &WriterState) -> Result<(), JournalError> {
        if let Some(failure) = &state.failure {
            return Err(JournalError::IllegalState {
                message: format!(
                    "writer for {} failed earlier: {failure}",
                    self.path.display()
                ),
            });
        }
        if state.closed {
            return Err(JournalError::IllegalState {
                message: format!("writer for {} is closed", self.path.display()),
            });
        }
        Ok(())
    }

    /// Append bytes to the file, creating it on first use.
    ///
    /// Must be called with the state lock held.
    fn append_locked(&self, bytes: &[u8]) -> Result<(), JournalError> {
        let mut file = match self.file.get() {
            Some(file) => file,
            None => {
                let created = self.create_file()?;
                // Only one thread can get here: the state lock is held.
                let _ = self.file.set(created);
                self.file.get().ok_or_else(|| JournalError::IllegalState {
                    message: format!("file handle for {} vanished", self.path.display()),
                })?
            }
        };

        file.write_all(bytes)
            .map_err(|e| JournalError::io_at(e, &self.path))?;
        self.bytes_written
            .fetch_add(bytes.len() as u64, Ordering::AcqRel);
        Ok(())
    }

    fn create_file(&self) -> Result<File, JournalError> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .map_err(|e| JournalError::io_at(e, &self.path))?;
        if let Some(parent) = self.path.parent() {
            sync_directory(parent)?;
        }
        debug!(
            path = %self.path.display(),
            first_sequence = self.first_sequence,
            "journal file created"
        );
        Ok(file)
    }

    /// Sync the file unless a concurrent sync already covered every
    /// sequence below `target`.
    fn sync_through(&self, target: u64) -> Result<(), JournalError> {
        let mut synced = self
            .synced_through
            .lock()
            .map_err(|_| JournalError::MutexPoisoned)?;
        if *synced >= target {
            return Ok(());
        }

        let reached = {
            let state = self.lock_state()?;
            if let Some(failure) = &state.failure {
                return Err(JournalError::IllegalState {
                    message: format!(
                        "writer for {} failed before sync: {failure}",
                        self.path.display()
                    ),
                });
            }
            state.next_sequence
        };

        let Some(file) = self.file.get() else {
            // Nothing was ever written.
            *synced = reached;
            return Ok(());
        };

        #[cfg(feature = "metrics")]
        let started = Instant::now();
        if let Err(e) = file.sync_data() {
            let err = JournalError::io_at(e, &self.path);
            error!(path = %self.path.display(), error = %err, "journal sync failed");
            self.fail(&err.to_string());
            return Err(err);
        }
        #[cfg(feature = "metrics")]
        metrics::histogram!("journal_sync_seconds").record(started.elapsed().as_secs_f64());

        *synced = reached;
        Ok(())
    }
}

impl std::fmt::Debug for DurableWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableWriter")
            .field("path", &self.path)
            .field("first_sequence", &self.first_sequence)
            .field("size", &self.size())
            .field("closed", &self.is_closed())
            .finish()
    }
}
