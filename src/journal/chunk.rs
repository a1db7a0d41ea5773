//! Length-prefixed, checksummed framing of opaque byte payloads.
//!
//! # On-Disk Chunk Format (little-endian)
//!
//! ```text
//! [4 bytes: payload_length][N bytes: payload][4 bytes: CRC32]
//! ```
//!
//! The CRC32 covers `payload_length ‖ payload`, so a run of zero bytes (what
//! some filesystems leave behind after a crash) never passes as a valid
//! empty chunk.
//!
//! A reader positioned on a chunk boundary can tell three situations apart:
//! no bytes at all ([`ChunkError::EndOfStream`]), a chunk that was started
//! but not finished ([`ChunkError::Truncated`]), and a complete chunk whose
//! checksum does not match ([`ChunkError::Corrupt`]).

use std::io::{self, Read, Write};

/// Size of the length prefix in bytes.
pub const CHUNK_LENGTH_SIZE: usize = 4;

/// Size of the CRC32 trailer in bytes.
pub const CHUNK_CRC_SIZE: usize = 4;

/// Total framing overhead per chunk in bytes.
pub const CHUNK_OVERHEAD: usize = CHUNK_LENGTH_SIZE + CHUNK_CRC_SIZE;

/// Largest payload a chunk may declare (256 MB).
///
/// Anything larger is treated as garbage rather than allocated.
pub const MAX_CHUNK_SIZE: usize = 256 * 1024 * 1024;

/// Outcome of a failed [`read_chunk`].
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    /// The stream ended cleanly on a chunk boundary.
    #[error("end of chunk stream")]
    EndOfStream,

    /// A chunk was started but the stream ended before it was complete.
    #[error("chunk truncated: {0}")]
    Truncated(&'static str),

    /// The chunk is complete but its contents do not match the checksum.
    #[error("chunk checksum mismatch: expected {expected_crc:#010x}, got {actual_crc:#010x}")]
    Corrupt {
        /// The CRC32 stored in the trailer.
        expected_crc: u32,
        /// The CRC32 computed over the payload.
        actual_crc: u32,
    },

    /// The length prefix declares a payload larger than [`MAX_CHUNK_SIZE`].
    #[error("chunk declares {0} bytes, more than the chunk size limit")]
    TooLarge(usize),

    /// The underlying stream failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Frame `payload` into a freshly allocated buffer.
///
/// # Errors
///
/// Returns [`ChunkError::TooLarge`] if the payload exceeds
/// [`MAX_CHUNK_SIZE`].
pub fn encode_chunk(payload: &[u8]) -> Result<Vec<u8>, ChunkError> {
    let mut buf = Vec::with_capacity(payload.len().saturating_add(CHUNK_OVERHEAD));
    write_chunk(&mut buf, payload)?;
    Ok(buf)
}

/// Write one chunk holding `payload` to `out`.
///
/// The chunk is emitted with a single `write_all` so a crash leaves either
/// the whole chunk, a prefix of it, or nothing.
///
/// # Errors
///
/// Returns [`ChunkError::TooLarge`] for oversized payloads and
/// [`ChunkError::Io`] if the stream fails.
pub fn write_chunk<W: Write>(out: &mut W, payload: &[u8]) -> Result<(), ChunkError> {
    if payload.len() > MAX_CHUNK_SIZE {
        return Err(ChunkError::TooLarge(payload.len()));
    }
    let length = payload.len() as u32;
    let crc = chunk_crc(length, payload);

    let mut framed = Vec::with_capacity(payload.len() + CHUNK_OVERHEAD);
    framed.extend_from_slice(&length.to_le_bytes());
    framed.extend_from_slice(payload);
    framed.extend_from_slice(&crc.to_le_bytes());
    out.write_all(&framed)?;
    Ok(())
}

/// Read one chunk from `input`, returning its payload.
///
/// # Errors
///
/// * [`ChunkError::EndOfStream`] if `input` is exhausted on a chunk boundary
/// * [`ChunkError::Truncated`] if the length prefix, payload or trailer is
///   only partially present
/// * [`ChunkError::Corrupt`] if the payload does not match its CRC32
/// * [`ChunkError::TooLarge`] if the declared length is implausible
pub fn read_chunk<R: Read>(input: &mut R) -> Result<Vec<u8>, ChunkError> {
    let mut length_bytes = [0u8; CHUNK_LENGTH_SIZE];
    match read_up_to(input, &mut length_bytes)? {
        0 => return Err(ChunkError::EndOfStream),
        CHUNK_LENGTH_SIZE => {}
        _ => return Err(ChunkError::Truncated("partial length prefix")),
    }

    let length = u32::from_le_bytes(length_bytes) as usize;
    if length > MAX_CHUNK_SIZE {
        return Err(ChunkError::TooLarge(length));
    }

    // Grow the buffer as bytes arrive instead of trusting the prefix.
    let mut payload = Vec::new();
    (&mut *input)
        .take(length as u64)
        .read_to_end(&mut payload)?;
    if payload.len() < length {
        return Err(ChunkError::Truncated("partial payload"));
    }

    let mut crc_bytes = [0u8; CHUNK_CRC_SIZE];
    if read_up_to(input, &mut crc_bytes)? < CHUNK_CRC_SIZE {
        return Err(ChunkError::Truncated("partial checksum"));
    }

    let expected_crc = u32::from_le_bytes(crc_bytes);
    let actual_crc = chunk_crc(length as u32, &payload);
    if expected_crc != actual_crc {
        return Err(ChunkError::Corrupt {
            expected_crc,
            actual_crc,
        });
    }

    Ok(payload)
}

/// CRC32 over the length prefix followed by the payload.
fn chunk_crc(length: u32, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&length.to_le_bytes());
    hasher.update(payload);
    hasher.finalize()
}

/// Fill as much of `buf` as the stream allows, returning the byte count.
fn read_up_to<R: Read>(input: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
