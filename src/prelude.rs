/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/10/25
******************************************************************************/

//! Prelude module that re-exports commonly used types and traits.
//!
//! ```rust
//! use prevalence_rs::prelude::*;
//! ```
//!
//! This imports everything needed to open, replay and append to a journal.

// Journal
pub use crate::journal::{
    Journal, JournalConfig, JournalError, JournalState, PersistentJournal,
};

// Records and replay
pub use crate::journal::{TransactionRecord, TransactionSubscriber};

// Payload codecs
#[cfg(feature = "bincode")]
pub use crate::serialization::BincodePayloadCodec;
pub use crate::serialization::{JsonPayloadCodec, PayloadCodec, SerializationError};

// Utility functions
pub use crate::utils::current_time_millis;
