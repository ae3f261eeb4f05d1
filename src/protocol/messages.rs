//! Built-in message data.
//!
//! These carry keepalive, authentication and error reporting. Their
//! dispatch names are reserved: application handlers cannot be registered
//! for them.

use crate::core::envelope::MessageData;
use crate::core::identity::UserId;
use crate::error::ErrorType;
use serde::{Deserialize, Serialize};

pub const PING: &str = "Ping";
pub const PONG: &str = "Pong";
pub const AUTHENTICATE: &str = "Authenticate";
pub const AUTHENTICATED: &str = "Authenticated";
pub const AUTHENTICATION_FAILED: &str = "AuthenticationFailed";
pub const ERROR: &str = "Error";

/// Every dispatch name handled by the synchronizer itself
pub const RESERVED_MESSAGE_TYPES: [&str; 6] = [
    PING,
    PONG,
    AUTHENTICATE,
    AUTHENTICATED,
    AUTHENTICATION_FAILED,
    ERROR,
];

pub fn is_reserved(message_type: &str) -> bool {
    RESERVED_MESSAGE_TYPES.contains(&message_type)
}

/// Keepalive request; answered with a [`PongMessageData`] carrying the same key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingMessageData {
    pub key: u64,
}

impl MessageData for PingMessageData {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PongMessageData {
    pub key: u64,
}

impl MessageData for PongMessageData {}

/// Credentials submitted by a peer that wants to become a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticateMessageData {
    pub credentials: Vec<u8>,
}

impl MessageData for AuthenticateMessageData {}

/// Sent back when credentials were accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedMessageData {
    pub user: UserId,
    pub info: Vec<u8>,
}

impl MessageData for AuthenticatedMessageData {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationFailedMessageData {
    pub reason: String,
}

impl MessageData for AuthenticationFailedMessageData {}

/// Tells a peer that one of its messages could not be handled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessageData {
    pub error: ErrorType,
    /// Dispatch name of the offending message, when it could be read
    pub message_type: Option<String>,
}

impl MessageData for ErrorMessageData {}
