//! # netsync
//!
//! Transport-agnostic message synchronization for real-time client/server
//! applications.
//!
//! A [`Connector`] owns the peers of one transport binding and turns their
//! raw byte streams into discrete messages. A [`Synchronizer`] sits on top,
//! decoding those messages into typed data, routing them to handlers,
//! answering pings and running the authentication handshake.
//!
//! All network I/O happens on tokio tasks. Nothing reaches the application
//! until it calls `process_events()`, which drains what the transport queued
//! and runs every handler on the calling thread.
//!
//! ```rust,no_run
//! use netsync::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct ChatMessageData {
//!     text: String,
//! }
//!
//! impl MessageData for ChatMessageData {}
//!
//! # async fn run() -> netsync::error::Result<()> {
//! let network = LoopbackNetwork::new();
//! let mut server = Synchronizer::new(Connector::new(LoopbackTransport::new(&network)));
//! server.register::<ChatMessageData, _>(|ctx, origin, chat| {
//!     ctx.send(origin.peer(), &ChatMessageData { text: chat.text })
//! })?;
//! server.connector_mut().listen(7777, ListenOptions::default())?;
//!
//! loop {
//!     for event in server.process_events() {
//!         tracing::info!(?event, "sync event");
//!     }
//!     tokio::time::sleep(std::time::Duration::from_millis(16)).await;
//! }
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use crate::core::identity::{ConnectorId, PeerId, UserId};
pub use crate::error::{ErrorType, ProtocolError, Result};
pub use crate::protocol::synchronizer::{Context, Origin, SyncEvent, Synchronizer};
pub use crate::transport::connector::Connector;
pub use crate::transport::event::{ConnectorEvent, DisconnectionReason};

/// Common imports for applications
pub mod prelude {
    pub use crate::config::NetworkConfig;
    pub use crate::core::envelope::MessageData;
    pub use crate::core::identity::{PeerId, UserId};
    pub use crate::core::serialization::SerializationFormat;
    pub use crate::error::{ErrorType, ProtocolError, Result};
    pub use crate::protocol::auth::{AuthFailurePolicy, AuthOutcome, AuthRequest, AuthState};
    pub use crate::protocol::synchronizer::{Context, Origin, SyncEvent, Synchronizer};
    pub use crate::transport::connector::Connector;
    pub use crate::transport::event::{ConnectorEvent, DisconnectionReason};
    pub use crate::transport::loopback::{LoopbackNetwork, LoopbackTransport};
    pub use crate::transport::tcp::TcpTransport;
    pub use crate::transport::ListenOptions;
    pub use crate::utils::compression::CompressionKind;
}
