//! Payload encodings.
//!
//! Envelopes and message data go through one [`SerializationFormat`] picked
//! per synchronizer. Framing never inspects the bytes, so any format works as
//! long as both ends use the same one.
//!
//! ```rust
//! use netsync::core::serialization::SerializationFormat;
//!
//! let format = SerializationFormat::MessagePack;
//! let bytes = format.encode(&("move", 3u8)).unwrap();
//! let back: (String, u8) = format.decode(&bytes).unwrap();
//! assert_eq!(back, ("move".to_string(), 3));
//! ```

use crate::error::{ProtocolError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationFormat {
    /// Readable on the wire; the interoperable choice
    #[default]
    Json,
    Bincode,
    /// Self-describing binary with field names kept
    MessagePack,
}

fn encode_failed(e: impl Display) -> ProtocolError {
    ProtocolError::SerializeError(e.to_string())
}

fn decode_failed(e: impl Display) -> ProtocolError {
    ProtocolError::DeserializeError(e.to_string())
}

impl SerializationFormat {
    pub const ALL: [SerializationFormat; 3] = [Self::Json, Self::Bincode, Self::MessagePack];

    pub fn name(self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::Bincode => "Bincode",
            Self::MessagePack => "MessagePack",
        }
    }

    pub fn encode<T: Serialize + ?Sized>(self, value: &T) -> Result<Vec<u8>> {
        match self {
            Self::Json => serde_json::to_vec(value).map_err(encode_failed),
            Self::Bincode => bincode::serialize(value).map_err(encode_failed),
            Self::MessagePack => rmp_serde::to_vec_named(value).map_err(encode_failed),
        }
    }

    /// # Errors
    /// `ProtocolError::DeserializeError` when the bytes are not a `T` in this
    /// format
    pub fn decode<T: DeserializeOwned>(self, data: &[u8]) -> Result<T> {
        match self {
            Self::Json => serde_json::from_slice(data).map_err(decode_failed),
            Self::Bincode => bincode::deserialize(data).map_err(decode_failed),
            Self::MessagePack => rmp_serde::from_slice(data).map_err(decode_failed),
        }
    }
}

/// Method-call sugar over [`SerializationFormat`] for wire types.
pub trait MultiFormat: Serialize + DeserializeOwned + Sized {
    fn serialize_format(&self, format: SerializationFormat) -> Result<Vec<u8>> {
        format.encode(self)
    }

    fn deserialize_format(data: &[u8], format: SerializationFormat) -> Result<Self> {
        format.decode(data)
    }
}
