//! Core types carried through the journal.
//!
//! A [`TransactionRecord`] is what the journal frames and stores: an opaque
//! payload plus the two pieces of metadata the journal must read without
//! knowing the payload's business type. A [`TransactionSubscriber`] receives
//! records during replay.

use super::error::JournalError;
use crate::serialization::PayloadCodec;
use crate::utils::current_time_nanos;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Version byte written at the start of every encoded record.
pub const RECORD_FORMAT_VERSION: u8 = 1;

/// Size of the fixed record header in bytes.
///
/// Layout: `[1 byte version][8 bytes system_version][8 bytes timestamp_ns][1 byte content_type_len]`
pub const RECORD_HEADER_SIZE: usize = 1 + 8 + 8 + 1;

/// Longest content type a record can carry.
pub const MAX_CONTENT_TYPE_LEN: usize = u8::MAX as usize;

/// A single journaled transaction.
///
/// The `system_version` is the sequence number this transaction must be
/// applied against; it always equals the record's position in the journal.
/// The `timestamp_ns` is the wall-clock time at which the transaction was
/// decided, forwarded untouched to subscribers so time-dependent logic
/// replays deterministically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    system_version: u64,
    timestamp_ns: u64,
    content_type: String,
    payload: Vec<u8>,
}

impl TransactionRecord {
    /// Create a record with an opaque payload and no content type.
    #[must_use]
    pub fn new(system_version: u64, timestamp_ns: u64, payload: Vec<u8>) -> Self {
        Self {
            system_version,
            timestamp_ns,
            content_type: String::new(),
            payload,
        }
    }

    /// Create a record stamped with the current wall-clock time.
    #[must_use]
    pub fn now(system_version: u64, payload: Vec<u8>) -> Self {
        Self::new(system_version, current_time_nanos(), payload)
    }

    /// Serialize `value` with `codec` into a record tagged with the codec's
    /// content type.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::SerializationError`] if the codec fails.
    pub fn from_value<C, T>(
        codec: &C,
        system_version: u64,
        timestamp_ns: u64,
        value: &T,
    ) -> Result<Self, JournalError>
    where
        C: PayloadCodec,
        T: Serialize,
    {
        let payload = codec.encode(value)?;
        Self::new(system_version, timestamp_ns, payload).with_content_type(codec.content_type())
    }

    /// Tag the record with the content type of its payload.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidRecord`] if `content_type` is longer
    /// than [`MAX_CONTENT_TYPE_LEN`] bytes.
    pub fn with_content_type(mut self, content_type: &str) -> Result<Self, JournalError> {
        if content_type.len() > MAX_CONTENT_TYPE_LEN {
            return Err(JournalError::InvalidRecord {
                message: format!(
                    "content type is {} bytes, at most {MAX_CONTENT_TYPE_LEN} allowed",
                    content_type.len()
                ),
            });
        }
        self.content_type = content_type.to_string();
        Ok(self)
    }

    /// The sequence number this record must be applied against.
    #[must_use]
    #[inline]
    pub fn system_version(&self) -> u64 {
        self.system_version
    }

    /// Nanoseconds since the Unix epoch at which the transaction was decided.
    #[must_use]
    #[inline]
    pub fn timestamp_ns(&self) -> u64 {
        self.timestamp_ns
    }

    /// The content type naming the payload codec (may be empty).
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// The opaque payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the record, returning its payload.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Deserialize the payload with `codec`.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::DeserializationError`] if the record was
    /// written by a different codec or the payload is malformed.
    pub fn decode_with<C, T>(&self, codec: &C) -> Result<T, JournalError>
    where
        C: PayloadCodec,
        T: DeserializeOwned,
    {
        if self.content_type != codec.content_type() {
            return Err(JournalError::DeserializationError {
                message: format!(
                    "record {} holds {:?}, not {:?}",
                    self.system_version,
                    self.content_type,
                    codec.content_type()
                ),
            });
        }
        codec
            .decode(&self.payload)
            .map_err(|e| JournalError::DeserializationError { message: e.message })
    }

    /// Encode the record into its on-disk body (the chunk payload).
    ///
    /// Layout (little-endian):
    ///
    /// ```text
    /// [1 byte: version][8 bytes: system_version][8 bytes: timestamp_ns]
    /// [1 byte: N][N bytes: content_type][payload]
    /// ```
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let content_type = self.content_type.as_bytes();
        let mut buf = Vec::with_capacity(
            RECORD_HEADER_SIZE + content_type.len() + self.payload.len(),
        );
        buf.push(RECORD_FORMAT_VERSION);
        buf.extend_from_slice(&self.system_version.to_le_bytes());
        buf.extend_from_slice(&self.timestamp_ns.to_le_bytes());
        // Bounded by `with_content_type`.
        buf.push(content_type.len() as u8);
        buf.extend_from_slice(content_type);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Decode a record body produced by [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidRecord`] if the body is too short,
    /// carries an unknown format version, or a non UTF-8 content type.
    pub fn decode(bytes: &[u8]) -> Result<Self, JournalError> {
        if bytes.len() < RECORD_HEADER_SIZE {
            return Err(JournalError::InvalidRecord {
                message: format!(
                    "record is {} bytes, header alone needs {RECORD_HEADER_SIZE}",
                    bytes.len()
                ),
            });
        }
        if bytes[0] != RECORD_FORMAT_VERSION {
            return Err(JournalError::InvalidRecord {
                message: format!("unknown record format version {}", bytes[0]),
            });
        }

        let system_version = read_u64(bytes, 1);
        let timestamp_ns = read_u64(bytes, 9);
        let content_type_len = bytes[17] as usize;

        let payload_start = RECORD_HEADER_SIZE + content_type_len;
        let content_type = bytes
            .get(RECORD_HEADER_SIZE..payload_start)
            .ok_or_else(|| JournalError::InvalidRecord {
                message: "truncated content type".to_string(),
            })?;
        let content_type =
            std::str::from_utf8(content_type).map_err(|e| JournalError::InvalidRecord {
                message: format!("content type is not UTF-8: {e}"),
            })?;

        Ok(Self {
            system_version,
            timestamp_ns,
            content_type: content_type.to_string(),
            payload: bytes[payload_start..].to_vec(),
        })
    }
}

/// Overwrite the `system_version` field of an encoded record body.
///
/// Lets the journal encode a record before it knows the record's sequence
/// number and stamp it afterwards without re-encoding the payload.
pub(crate) fn stamp_system_version(body: &mut [u8], system_version: u64) {
    if let Some(field) = body.get_mut(1..9) {
        field.copy_from_slice(&system_version.to_le_bytes());
    }
}

/// Read a little-endian `u64` at `offset`; the caller guarantees the bounds.
fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(raw)
}

/// Receives journaled transactions during replay.
///
/// `receive` is called synchronously, once per delivered record, in strictly
/// increasing sequence order. Typically the implementation executes the
/// transaction against the in-memory prevalent system.
pub trait TransactionSubscriber {
    /// Handle one replayed transaction.
    fn receive(&mut self, record: TransactionRecord);
}

impl<F> TransactionSubscriber for F
where
    F: FnMut(TransactionRecord),
{
    fn receive(&mut self, record: TransactionRecord) {
        self(record)
    }
}

impl TransactionSubscriber for Vec<TransactionRecord> {
    fn receive(&mut self, record: TransactionRecord) {
        self.push(record);
    }
}
