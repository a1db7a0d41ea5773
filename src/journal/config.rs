//! Configuration for a [`PersistentJournal`](super::PersistentJournal).

use super::directory::{DEFAULT_JOURNAL_SUFFIX, check_valid_journal_suffix};
use super::error::JournalError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default size threshold in bytes (0 = never rotate on size).
pub const DEFAULT_SIZE_THRESHOLD_BYTES: u64 = 0;

/// Default age threshold (zero = never rotate on age).
pub const DEFAULT_AGE_THRESHOLD: Duration = Duration::ZERO;

/// Where a journal lives and when it rotates its files.
///
/// # Example
///
/// ```rust
/// use prevalence_rs::journal::JournalConfig;
/// use std::time::Duration;
///
/// let config = JournalConfig::new("/var/lib/bank/journal")
///     .with_size_threshold_bytes(64 * 1024 * 1024)
///     .with_age_threshold(Duration::from_secs(3600));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalConfig {
    /// Directory holding the journal files.
    pub directory: PathBuf,
    /// Rotate once the open file holds at least this many bytes; 0 disables.
    #[serde(default)]
    pub size_threshold_bytes: u64,
    /// Rotate once the open file is at least this old; zero disables.
    #[serde(default)]
    pub age_threshold: Duration,
    /// File kind suffix, e.g. `journal`.
    #[serde(default = "default_suffix")]
    pub suffix: String,
}

fn default_suffix() -> String {
    DEFAULT_JOURNAL_SUFFIX.to_string()
}

impl JournalConfig {
    /// Configuration for `directory` with rotation disabled and the default
    /// suffix.
    #[must_use]
    pub fn new(directory: impl AsRef<Path>) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            size_threshold_bytes: DEFAULT_SIZE_THRESHOLD_BYTES,
            age_threshold: DEFAULT_AGE_THRESHOLD,
            suffix: default_suffix(),
        }
    }

    /// Set the size rotation threshold in bytes (0 disables).
    #[must_use = "builders do nothing unless consumed"]
    #[inline]
    pub fn with_size_threshold_bytes(mut self, size_threshold_bytes: u64) -> Self {
        self.size_threshold_bytes = size_threshold_bytes;
        self
    }

    /// Set the age rotation threshold (zero disables).
    #[must_use = "builders do nothing unless consumed"]
    #[inline]
    pub fn with_age_threshold(mut self, age_threshold: Duration) -> Self {
        self.age_threshold = age_threshold;
        self
    }

    /// Set the file kind suffix. Checked by [`validate`](Self::validate).
    #[must_use = "builders do nothing unless consumed"]
    #[inline]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Check the configuration without touching the file system.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidConfiguration`] for an empty directory
    /// path or a suffix outside the allow-list.
    pub fn validate(&self) -> Result<(), JournalError> {
        if self.directory.as_os_str().is_empty() {
            return Err(JournalError::InvalidConfiguration {
                message: "journal directory must not be empty".to_string(),
            });
        }
        check_valid_journal_suffix(&self.suffix)
    }

    /// Whether a file of `size` bytes opened `age` ago is due for rotation.
    #[must_use]
    pub fn should_rotate(&self, size: u64, age: Duration) -> bool {
        let too_big = self.size_threshold_bytes != 0 && size >= self.size_threshold_bytes;
        let too_old = !self.age_threshold.is_zero() && age >= self.age_threshold;
        too_big || too_old
    }
}
