//! Error types for the journal subsystem.
//!
//! [`JournalError`] covers every failure mode of the durable transaction
//! journal: configuration problems caught at construction, corruption found
//! during recovery, and the fatal I/O failures that poison a journal while
//! it is appending.

use std::fmt;
use std::path::PathBuf;

/// Errors that can occur within the journal subsystem.
#[derive(Debug)]
#[non_exhaustive]
pub enum JournalError {
    /// An I/O error occurred while reading or writing journal files.
    Io {
        /// The underlying I/O error message.
        message: String,
        /// The file path involved, if known.
        path: Option<PathBuf>,
    },

    /// The journal configuration was rejected at construction time.
    InvalidConfiguration {
        /// Description of the configuration problem.
        message: String,
    },

    /// An operation requiring an initialized journal was called before the
    /// first successful `update`.
    NotInitialized,

    /// A record carried a different sequence number than the journal
    /// expected at that position.
    SequenceMismatch {
        /// The sequence number the journal expected.
        expected: u64,
        /// The sequence number carried by the record.
        found: u64,
    },

    /// The journal has not yet logged the transaction a caller asked for.
    NotYetReached {
        /// The transaction the caller wanted to start from.
        wanted: u64,
        /// The last transaction actually present in the journal (0 if none).
        last_logged: u64,
    },

    /// A journal file that must exist for the sequence to stay gapless was
    /// not found on disk.
    MissingJournalFile {
        /// The first sequence number that could not be located.
        sequence: u64,
    },

    /// Records needing replay live in a journal file of another kind.
    UnsupportedJournalKind {
        /// The file holding the records.
        path: PathBuf,
        /// The only suffix this journal replays.
        suffix: String,
    },

    /// A journal chunk failed CRC32 integrity verification.
    CorruptEntry {
        /// The journal file containing the chunk.
        path: PathBuf,
        /// Byte offset of the chunk within the file.
        offset: u64,
        /// The CRC32 stored alongside the chunk.
        expected_crc: u32,
        /// The CRC32 computed from the chunk bytes.
        actual_crc: u32,
    },

    /// A chunk decoded correctly but does not hold a valid transaction
    /// record.
    InvalidRecord {
        /// Description of the header problem.
        message: String,
    },

    /// A path does not follow the journal file naming scheme.
    InvalidFileName {
        /// The offending path.
        path: PathBuf,
    },

    /// An operation was attempted in a state that does not permit it.
    IllegalState {
        /// Description of the violated precondition.
        message: String,
    },

    /// Transaction processing was aborted by this call. The journal is now
    /// poisoned.
    Aborted {
        /// Why processing was aborted.
        reason: String,
        /// The underlying failure, if any.
        cause: Option<String>,
    },

    /// The journal was poisoned by an earlier failure, or closed, and
    /// refuses all further appends.
    Unavailable {
        /// The reason recorded when the journal became unavailable.
        reason: String,
    },

    /// An internal mutex was poisoned (another thread panicked while
    /// holding the lock).
    MutexPoisoned,

    /// A transaction payload could not be serialized.
    SerializationError {
        /// The underlying serialization error message.
        message: String,
    },

    /// A transaction payload could not be deserialized.
    DeserializationError {
        /// The underlying deserialization error message.
        message: String,
    },
}

impl JournalError {
    /// Wraps an I/O error together with the path it concerns.
    #[cold]
    pub(crate) fn io_at(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        JournalError::Io {
            message: err.to_string(),
            path: Some(path.into()),
        }
    }

    /// Returns `true` if this error leaves the journal permanently unusable.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            JournalError::Aborted { .. } | JournalError::Unavailable { .. }
        )
    }
}

impl fmt::Display for JournalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JournalError::Io { message, path } => {
                if let Some(p) = path {
                    write!(f, "journal I/O error at {}: {message}", p.display())
                } else {
                    write!(f, "journal I/O error: {message}")
                }
            }
            JournalError::InvalidConfiguration { message } => {
                write!(f, "invalid journal configuration: {message}")
            }
            JournalError::NotInitialized => {
                write!(
                    f,
                    "journal update() has to be called at least once before this operation"
                )
            }
            JournalError::SequenceMismatch { expected, found } => {
                write!(f, "expected {expected} but was {found}")
            }
            JournalError::NotYetReached {
                wanted,
                last_logged,
            } => {
                write!(
                    f,
                    "the transaction log has not yet reached transaction {wanted}; \
                     the last logged transaction was {last_logged}"
                )
            }
            JournalError::MissingJournalFile { sequence } => {
                write!(
                    f,
                    "unable to find journal file containing transaction {sequence}; \
                     it might have been manually deleted"
                )
            }
            JournalError::UnsupportedJournalKind { path, suffix } => {
                write!(
                    f,
                    "there are transactions needing to be recovered from {}, \
                     but only .{suffix} files are supported",
                    path.display()
                )
            }
            JournalError::CorruptEntry {
                path,
                offset,
                expected_crc,
                actual_crc,
            } => {
                write!(
                    f,
                    "corrupt journal entry in {} at offset {offset}: \
                     expected CRC {expected_crc:#010x}, got {actual_crc:#010x}",
                    path.display()
                )
            }
            JournalError::InvalidRecord { message } => {
                write!(f, "invalid transaction record: {message}")
            }
            JournalError::InvalidFileName { path } => {
                write!(f, "not a journal file name: {}", path.display())
            }
            JournalError::IllegalState { message } => {
                write!(f, "illegal journal state: {message}")
            }
            JournalError::Aborted { reason, cause } => {
                if let Some(cause) = cause {
                    write!(f, "{reason} Cause: {cause}")
                } else {
                    write!(f, "{reason}")
                }
            }
            JournalError::Unavailable { reason } => {
                write!(f, "journal unavailable: {reason}")
            }
            JournalError::MutexPoisoned => {
                write!(f, "journal internal mutex poisoned")
            }
            JournalError::SerializationError { message } => {
                write!(f, "transaction serialization error: {message}")
            }
            JournalError::DeserializationError { message } => {
                write!(f, "transaction deserialization error: {message}")
            }
        }
    }
}

impl std::error::Error for JournalError {}

impl From<std::io::Error> for JournalError {
    #[cold]
    fn from(err: std::io::Error) -> Self {
        JournalError::Io {
            message: err.to_string(),
            path: None,
        }
    }
}

impl From<crate::serialization::SerializationError> for JournalError {
    #[cold]
    fn from(err: crate::serialization::SerializationError) -> Self {
        JournalError::SerializationError {
            message: err.message,
        }
    }
}
