//! Journal file naming and directory enumeration.
//!
//! Journal files are named `{first_sequence:019}.{suffix}`, e.g.
//! `0000000000000000001.journal`. The fixed width makes a plain lexical
//! directory listing come out in sequence order. Files are only recognised
//! when the suffix passes [`check_valid_journal_suffix`], so quarantined
//! files (`….journal.unusedFile1700000000000`) and unrelated files are never
//! mistaken for journal files.

use super::error::JournalError;
use crate::utils::current_time_millis;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

/// Suffix of live transaction journal files.
pub const DEFAULT_JOURNAL_SUFFIX: &str = "journal";

/// Number of zero-padded digits encoding the first sequence of a file.
pub const SEQUENCE_DIGITS: usize = 19;

/// Marker inserted into the name of quarantined files.
const UNUSED_FILE_MARKER: &str = ".unusedFile";

/// Check that `suffix` is a legal journal file suffix.
///
/// A legal suffix consists of ASCII letters and digits only and ends with
/// `journal` or `Journal` (for example `journal` or `xmlJournal`).
///
/// # Errors
///
/// Returns [`JournalError::InvalidConfiguration`] otherwise.
pub fn check_valid_journal_suffix(suffix: &str) -> Result<(), JournalError> {
    if is_valid_journal_suffix(suffix) {
        Ok(())
    } else {
        Err(JournalError::InvalidConfiguration {
            message: format!(
                "journal file suffix {suffix:?} must contain only letters and digits \
                 and end with \"journal\" or \"Journal\""
            ),
        })
    }
}

fn is_valid_journal_suffix(suffix: &str) -> bool {
    suffix.chars().all(|c| c.is_ascii_alphanumeric())
        && (suffix.ends_with("journal") || suffix.ends_with("Journal"))
}

/// Build the path of the journal file whose first record is `sequence`.
#[must_use]
pub fn journal_file(dir: &Path, sequence: u64, suffix: &str) -> PathBuf {
    dir.join(format!("{sequence:0width$}.{suffix}", width = SEQUENCE_DIGITS))
}

/// Recover the first sequence number from a journal file path.
///
/// # Errors
///
/// Returns [`JournalError::InvalidFileName`] if the file name does not
/// follow the journal naming scheme.
pub fn journal_version(path: &Path) -> Result<u64, JournalError> {
    parse_file_name(path)
        .map(|(sequence, _)| sequence)
        .ok_or_else(|| JournalError::InvalidFileName {
            path: path.to_path_buf(),
        })
}

/// Returns the suffix of a journal file, or `None` for non-journal paths.
#[must_use]
pub fn journal_suffix(path: &Path) -> Option<&str> {
    parse_file_name(path).map(|(_, suffix)| suffix)
}

fn parse_file_name(path: &Path) -> Option<(u64, &str)> {
    let name = path.file_name()?.to_str()?;
    let (digits, suffix) = name.split_once('.')?;
    if digits.len() != SEQUENCE_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !is_valid_journal_suffix(suffix) {
        return None;
    }
    let sequence = digits.parse::<u64>().ok()?;
    Some((sequence, suffix))
}

/// List every journal file in `dir`, of any journal suffix, ordered by
/// first sequence number.
///
/// # Errors
///
/// Returns [`JournalError::Io`] if the directory cannot be read.
pub fn list_journal_files(dir: &Path) -> Result<Vec<(u64, PathBuf)>, JournalError> {
    let entries = fs::read_dir(dir).map_err(|e| JournalError::io_at(e, dir))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| JournalError::io_at(e, dir))?;
        let path = entry.path();
        if let Some((sequence, _)) = parse_file_name(&path) {
            files.push((sequence, path));
        }
    }

    files.sort();
    Ok(files)
}

/// Find the journal file that would contain `wanted_sequence`.
///
/// Returns the file with the greatest first sequence `<= wanted_sequence`,
/// or `None` when the directory holds no journal files at all.
///
/// # Errors
///
/// Returns [`JournalError::MissingJournalFile`] when journal files exist
/// but all of them start after `wanted_sequence`, and
/// [`JournalError::Io`] if the directory cannot be read.
pub fn find_initial_journal_file(
    dir: &Path,
    wanted_sequence: u64,
) -> Result<Option<PathBuf>, JournalError> {
    let files = list_journal_files(dir)?;
    if files.is_empty() {
        return Ok(None);
    }

    files
        .into_iter()
        .take_while(|(sequence, _)| *sequence <= wanted_sequence)
        .last()
        .map(|(_, path)| Some(path))
        .ok_or(JournalError::MissingJournalFile {
            sequence: wanted_sequence,
        })
}

/// Move a file out of the journal naming scheme without deleting it.
///
/// The file is renamed to `{name}.unusedFile{millis}` (with a numeric
/// disambiguator if that name is taken) so its sequence number can be
/// reused by a fresh journal file. Returns the new path.
///
/// # Errors
///
/// Returns [`JournalError::Io`] if the rename fails.
pub fn rename_unused_file(path: &Path) -> Result<PathBuf, JournalError> {
    let base = format!("{}{UNUSED_FILE_MARKER}{}", path.display(), current_time_millis());

    let mut target = PathBuf::from(&base);
    let mut attempt = 1u32;
    while target.exists() {
        target = PathBuf::from(format!("{base}-{attempt}"));
        attempt = attempt.saturating_add(1);
    }

    info!(
        from = %path.display(),
        to = %target.display(),
        "registering lost file"
    );
    fs::rename(path, &target).map_err(|e| JournalError::io_at(e, path))?;
    #[cfg(feature = "metrics")]
    metrics::counter!("journal_quarantined_files_total").increment(1);
    Ok(target)
}

/// Create `dir` (and parents) if needed and check it is a usable directory.
///
/// # Errors
///
/// Returns [`JournalError::InvalidConfiguration`] if the path exists but is
/// not a directory, cannot be created, or cannot be listed.
pub fn produce_directory(dir: &Path) -> Result<(), JournalError> {
    fs::create_dir_all(dir).map_err(|e| JournalError::InvalidConfiguration {
        message: format!("cannot create journal directory {}: {e}", dir.display()),
    })?;
    if !dir.is_dir() {
        return Err(JournalError::InvalidConfiguration {
            message: format!("{} is not a directory", dir.display()),
        });
    }
    fs::read_dir(dir).map_err(|e| JournalError::InvalidConfiguration {
        message: format!("cannot list journal directory {}: {e}", dir.display()),
    })?;
    Ok(())
}

/// Flush the directory entry of a newly created file to stable storage.
///
/// Only meaningful on Unix; elsewhere opening a directory is not supported
/// and this is a no-op.
pub(crate) fn sync_directory(dir: &Path) -> Result<(), JournalError> {
    if cfg!(unix) {
        File::open(dir)
            .and_then(|d| d.sync_all())
            .map_err(|e| JournalError::io_at(e, dir))?;
    }
    Ok(())
}
