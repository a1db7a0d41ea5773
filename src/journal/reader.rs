//! Sequential chunk reader for a single journal file.
//!
//! [`DurableReader`] memory-maps one journal file read-only and hands out
//! its chunks in order. It tells a clean end of file apart from a chunk the
//! writer never finished, and it classifies a damaged chunk at the very end
//! of the file (a torn final write, or a zero-filled tail) as truncation
//! rather than corruption. Once the reader has hit the end of its valid
//! data it keeps reporting the same condition; it never tries to skip ahead.

use super::chunk::{self, ChunkError};
use super::error::JournalError;
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Where a reader stopped, remembered so later calls fail the same way.
#[derive(Debug, Clone, Copy)]
enum ReadEnd {
    Clean,
    Truncated(&'static str),
    Corrupt { expected_crc: u32, actual_crc: u32 },
    TooLarge(usize),
}

impl ReadEnd {
    fn to_error(self) -> ChunkError {
        match self {
            ReadEnd::Clean => ChunkError::EndOfStream,
            ReadEnd::Truncated(what) => ChunkError::Truncated(what),
            ReadEnd::Corrupt {
                expected_crc,
                actual_crc,
            } => ChunkError::Corrupt {
                expected_crc,
                actual_crc,
            },
            ReadEnd::TooLarge(length) => ChunkError::TooLarge(length),
        }
    }
}

/// Reads framed chunks from one journal file.
pub struct DurableReader {
    path: PathBuf,
    /// `None` for an empty file, which cannot be mapped portably.
    mmap: Option<Mmap>,
    offset: usize,
    end: Option<ReadEnd>,
}

impl DurableReader {
    /// Open `path` for reading.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Io`] if the file cannot be opened or mapped.
    pub fn open(path: &Path) -> Result<Self, JournalError> {
        let file = File::open(path).map_err(|e| JournalError::io_at(e, path))?;
        let len = file
            .metadata()
            .map_err(|e| JournalError::io_at(e, path))?
            .len();

        let mmap = if len == 0 {
            None
        } else {
            // SAFETY: Read-only mapping of `len` bytes. Journal files are only
            // ever appended to, so bytes inside the mapped range are never
            // rewritten while we read them.
            let mmap = unsafe { Mmap::map(&file).map_err(|e| JournalError::io_at(e, path))? };
            Some(mmap)
        };

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
            offset: 0,
            end: None,
        })
    }

    /// Path of the file being read.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte offset of the next chunk.
    #[must_use]
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset as u64
    }

    /// Length of the file as mapped.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.mmap.as_ref().map_or(0, |m| m.len() as u64)
    }

    /// Returns `true` if the file holds no bytes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the next chunk.
    ///
    /// # Errors
    ///
    /// * [`ChunkError::EndOfStream`] at a clean end of file
    /// * [`ChunkError::Truncated`] if the file ends inside a chunk, or its
    ///   last chunk is damaged in a way only an interrupted write explains
    /// * [`ChunkError::Corrupt`] / [`ChunkError::TooLarge`] for damage
    ///   followed by further data
    ///
    /// Every error is sticky: subsequent calls return the same condition.
    pub fn read_chunk(&mut self) -> Result<Vec<u8>, ChunkError> {
        if let Some(end) = self.end {
            return Err(end.to_error());
        }

        let data: &[u8] = self.mmap.as_deref().unwrap_or(&[]);
        let remaining = data.get(self.offset..).unwrap_or(&[]);
        let mut cursor = remaining;

        let end = match chunk::read_chunk(&mut cursor) {
            Ok(payload) => {
                self.offset += remaining.len() - cursor.len();
                return Ok(payload);
            }
            Err(ChunkError::EndOfStream) => ReadEnd::Clean,
            Err(ChunkError::Truncated(what)) => ReadEnd::Truncated(what),
            Err(ChunkError::Corrupt { .. } | ChunkError::TooLarge(_))
                if cursor.is_empty() || remaining.iter().all(|b| *b == 0) =>
            {
                ReadEnd::Truncated("torn final chunk")
            }
            Err(ChunkError::Corrupt {
                expected_crc,
                actual_crc,
            }) => ReadEnd::Corrupt {
                expected_crc,
                actual_crc,
            },
            Err(ChunkError::TooLarge(length)) => ReadEnd::TooLarge(length),
            Err(err @ ChunkError::Io(_)) => return Err(err),
        };

        if let ReadEnd::Truncated(what) = end {
            warn!(
                path = %self.path.display(),
                offset = self.offset,
                trailing_bytes = remaining.len(),
                "journal file truncated ({what})"
            );
        }
        self.end = Some(end);
        Err(end.to_error())
    }
}

impl std::fmt::Debug for DurableReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableReader")
            .field("path", &self.path)
            .field("offset", &self.offset)
            .field("len", &self.len())
            .finish()
    }
}
