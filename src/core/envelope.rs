//! # Message Envelope
//!
//! Every application message travels as an [`Envelope`]: the message-type
//! name used for dispatch plus the payload encoded by the active
//! [`SerializationFormat`]. The envelope itself is encoded with the same
//! format.

use crate::core::serialization::{MultiFormat, SerializationFormat};
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Conventional suffix stripped from message data type names
pub const MESSAGE_DATA_SUFFIX: &str = "MessageData";

/// A typed message the synchronizer can send and dispatch.
///
/// The default message type is the type's own name without its
/// `MessageData` suffix, so `ChatMessageData` travels as `"Chat"`.
pub trait MessageData: Serialize + DeserializeOwned + Send + 'static {
    fn message_type() -> Cow<'static, str> {
        Cow::Borrowed(message_type_name(std::any::type_name::<Self>()))
    }
}

/// Derive a dispatch name from a Rust type name.
///
/// ```rust
/// use netsync::core::envelope::message_type_name;
///
/// assert_eq!(message_type_name("game::net::PingMessageData"), "Ping");
/// assert_eq!(message_type_name("Chat"), "Chat");
/// ```
pub fn message_type_name(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    let last = base.rsplit("::").next().unwrap_or(base);
    match last.strip_suffix(MESSAGE_DATA_SUFFIX) {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => last,
    }
}

/// Wire envelope: dispatch name plus encoded payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub message_type: String,
    pub payload: Vec<u8>,
}

impl MultiFormat for Envelope {}

impl Envelope {
    /// Wrap typed message data
    pub fn wrap<T: MessageData>(data: &T, format: SerializationFormat) -> Result<Self> {
        Ok(Self {
            message_type: T::message_type().into_owned(),
            payload: format.encode(data)?,
        })
    }

    /// Decode the payload as `T`
    pub fn open<T: MessageData>(&self, format: SerializationFormat) -> Result<T> {
        format.decode(&self.payload)
    }
}
