//! # Errors
//!
//! Two families:
//! - [`ProtocolError`]: what a call returns when it fails at the call site
//!   (zero identity, zero port, oversized payload, unknown peer, I/O).
//! - [`ErrorType`]: the application-facing taxonomy attached to a received
//!   message that could not be decoded or routed. These never terminate the
//!   connection; the application decides what to do with them.
//!
//! ```rust
//! use netsync::core::identity::PeerId;
//! use netsync::error::{ErrorType, ProtocolError};
//!
//! let err = ProtocolError::PeerNotFound(PeerId::random());
//! assert_eq!(err.error_type(), ErrorType::Unknown);
//!
//! let err = ProtocolError::DeserializeError("missing field `key`".into());
//! assert_eq!(err.error_type(), ErrorType::MalformedMessage);
//! ```

use crate::core::identity::{PeerId, UserId};
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Connector errors
    pub const ERR_CONNECTOR_CLOSED: &str = "Connector has been closed";
    pub const ERR_ALREADY_LISTENING: &str = "Connector is already listening";
    pub const ERR_NO_RUNTIME: &str = "No tokio runtime available for transport I/O";
    pub const ERR_PORT_IN_USE: &str = "Port already in use";
    pub const ERR_CONNECTION_REFUSED: &str = "Connection refused";
    pub const ERR_EMPTY_ADDRESS: &str = "Address cannot be empty";

    /// Synchronization errors
    pub const ERR_LOCK_POISONED: &str = "Synchronization primitive poisoned";

    /// Authentication errors
    pub const ERR_USER_ALREADY_CONNECTED: &str = "User is already authenticated on another peer";
}

/// ProtocolError is the primary error type for all protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Deserialize error: {0}")]
    DeserializeError(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connector closed")]
    ConnectorClosed,

    #[error("Identity must not be the all-zero GUID")]
    InvalidIdentity,

    #[error("Invalid port: {0}")]
    InvalidPort(u16),

    #[error("Peer not found: {0}")]
    PeerNotFound(PeerId),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Frame too large: {length} bytes (limit {limit})")]
    FrameTooLarge { length: usize, limit: usize },

    #[error("Compression failed")]
    CompressionFailure,

    #[error("Decompression failed")]
    DecompressionFailure,

    #[error("Handler already registered for message type: {0}")]
    DuplicateHandler(String),

    #[error("Message type is reserved by the protocol: {0}")]
    ReservedMessageType(String),

    #[error("Message rejected: {0:?}")]
    Message(ErrorType),

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// Map an internal failure onto the application-facing taxonomy.
    pub fn error_type(&self) -> ErrorType {
        match self {
            ProtocolError::DeserializeError(_) | ProtocolError::DecompressionFailure => {
                ErrorType::MalformedMessage
            }
            ProtocolError::Message(error) => *error,
            _ => ErrorType::Unknown,
        }
    }
}

/// Classification of a received message that could not be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ErrorType {
    /// No handler is registered for the message type
    UnknownMessage,
    /// The message could not be decompressed or deserialized
    MalformedMessage,
    /// The receiving side does not support this message
    NotSupportedMessage,
    /// The message decoded but its parameters were rejected
    InvalidMessageParameters,
    /// The message is not valid in the sender's current state
    InvalidMessageContext,
    InvalidErrorType,
    InvalidMessageType,
    InvalidMessage,
    MessageIsNull,
    Unknown,
    #[default]
    Invalid,
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
