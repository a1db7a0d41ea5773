//! Pluggable payload serialization for journaled transactions.
//!
//! The journal never inspects transaction payloads; it stores whatever
//! bytes a [`PayloadCodec`] produced together with the codec's content type,
//! so a record read back years later still says how to decode it.
//!
//! - [`JsonPayloadCodec`] — human-readable JSON (always available)
//! - `BincodePayloadCodec` — compact binary format (requires the
//!   `bincode` feature)
//!
//! # Feature Gate
//!
//! ```toml
//! [dependencies]
//! prevalence-rs = { version = "0.1", features = ["bincode"] }
//! ```

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Errors that can occur during payload serialization or deserialization.
#[derive(Debug)]
pub struct SerializationError {
    /// Human-readable description of the failure.
    pub message: String,
}

impl std::fmt::Display for SerializationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "payload serialization error: {}", self.message)
    }
}

impl std::error::Error for SerializationError {}

/// A pluggable serializer for transaction payloads.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so a single codec can be shared by
/// every thread appending to a journal.
pub trait PayloadCodec: Send + Sync + std::fmt::Debug {
    /// Serialize `value` into a byte buffer.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError`] if the value cannot be serialized.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, SerializationError>;

    /// Deserialize a value from a byte buffer.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError`] if the bytes are malformed or
    /// incompatible with the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, SerializationError>;

    /// Returns the MIME-like content type identifier for this format.
    ///
    /// The identifier is stored in every record and checked on decode.
    #[must_use]
    fn content_type(&self) -> &'static str;
}

// ─── JSON ───────────────────────────────────────────────────────────────────

/// JSON payload codec using `serde_json`.
///
/// # Content Type
///
/// `"application/json"`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPayloadCodec;

impl JsonPayloadCodec {
    /// Create a new JSON payload codec.
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl PayloadCodec for JsonPayloadCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, SerializationError> {
        serde_json::to_vec(value).map_err(|e| SerializationError {
            message: e.to_string(),
        })
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, SerializationError> {
        serde_json::from_slice(data).map_err(|e| SerializationError {
            message: e.to_string(),
        })
    }

    #[inline]
    fn content_type(&self) -> &'static str {
        "application/json"
    }
}

// ─── Bincode ────────────────────────────────────────────────────────────────

/// Bincode payload codec for compact binary payloads.
///
/// Produces much smaller journal files than JSON at the cost of
/// human readability.
///
/// # Content Type
///
/// `"application/x-bincode"`
#[cfg(feature = "bincode")]
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodePayloadCodec;

#[cfg(feature = "bincode")]
impl BincodePayloadCodec {
    /// Create a new Bincode payload codec.
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "bincode")]
impl PayloadCodec for BincodePayloadCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, SerializationError> {
        bincode::serde::encode_to_vec(value, bincode::config::standard()).map_err(|e| {
            SerializationError {
                message: e.to_string(),
            }
        })
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, SerializationError> {
        bincode::serde::decode_from_slice(data, bincode::config::standard())
            .map(|(value, _)| value)
            .map_err(|e| SerializationError {
                message: e.to_string(),
            })
    }

    #[inline]
    fn content_type(&self) -> &'static str {
        "application/x-bincode"
    }
}
