//! # Transport Layer
//!
//! The contract every binding implements, and the [`Connector`] that turns
//! what bindings report into per-peer messages.
//!
//! ## Components
//! - **Transport**: listen / connect entry points of a binding
//! - **PeerLink**: the write side of one established connection
//! - **EventSink / EventQueue**: the only path from I/O tasks to peer state
//! - **Admission**: asynchronous accept/reject of inbound connections
//! - **Loopback**: same-process binding, for tests and local play
//! - **TCP**: tokio stream binding
//!
//! [`Connector`]: connector::Connector

pub mod connector;
pub mod event;
pub mod loopback;
pub mod tcp;

use crate::config::ServerConfig;
use crate::core::identity::{ConnectorId, PeerId};
use crate::error::Result;
use crate::utils::timeout;
use bytes::Bytes;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub use event::{ConnectorEvent, DisconnectionReason, EventQueue, EventSink, TransportEvent};

/// A transport binding.
///
/// Implementations perform all I/O on tokio tasks and report back only
/// through the [`EventSink`] in the [`TransportContext`] they are handed.
/// No method may block on network activity.
pub trait Transport: Send {
    /// Short binding name for logs
    fn name(&self) -> &'static str;

    /// Start accepting connections on `port`.
    ///
    /// Every inbound connection must pass through
    /// [`TransportContext::pending`] and be admitted before it is reported
    /// as `Connected`.
    fn listen(&mut self, port: u16, options: &ListenOptions, ctx: TransportContext) -> Result<()>;

    /// Stop accepting. Connections already reported are left alone.
    fn stop_listening(&mut self);

    /// Start connecting to `address`; the outcome is reported for `peer` as
    /// either `Connected` or `ConnectFailed`.
    fn connect(&mut self, peer: PeerId, address: &str, ctx: TransportContext) -> Result<()>;
}

/// Write side of one established connection.
pub trait PeerLink: Send {
    /// Queue one framed chunk. Chunks go out in call order.
    fn send(&mut self, frame: Bytes) -> Result<()>;

    /// Flush what is queued and release the connection. Idempotent; the
    /// local side is not notified.
    fn close(&mut self);
}

/// Everything a binding needs to report events for one connector.
#[derive(Clone)]
pub struct TransportContext {
    pub connector: ConnectorId,
    pub sink: EventSink,
    admission: AdmissionHook,
}

impl TransportContext {
    pub fn new(connector: ConnectorId, sink: EventSink, admission: AdmissionHook) -> Self {
        Self {
            connector,
            sink,
            admission,
        }
    }

    /// Start the admission decision for an inbound connection.
    pub fn pending(&self, remote: impl Into<String>) -> PendingConnection {
        let info = PeerInfo {
            peer: self.sink.next_peer_id(),
            connector: self.connector,
            remote: remote.into(),
        };
        let decision = (self.admission)(&info);
        PendingConnection { info, decision }
    }
}

/// What the admission hook gets to see about a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub peer: PeerId,
    pub connector: ConnectorId,
    pub remote: String,
}

/// Asynchronous accept/reject decision for inbound connections
pub type AdmissionHook = Arc<dyn Fn(&PeerInfo) -> BoxFuture<'static, bool> + Send + Sync>;

/// Hook that admits every connection
pub fn admit_all() -> AdmissionHook {
    Arc::new(|_| Box::pin(async { true }))
}

/// Box an async closure into an [`AdmissionHook`]
pub fn admission_hook<F, Fut>(hook: F) -> AdmissionHook
where
    F: Fn(&PeerInfo) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    Arc::new(move |info| Box::pin(hook(info)))
}

/// An inbound connection waiting for its admission decision.
pub struct PendingConnection {
    info: PeerInfo,
    decision: BoxFuture<'static, bool>,
}

impl PendingConnection {
    pub fn info(&self) -> &PeerInfo {
        &self.info
    }

    /// Await the decision on the connection's own task.
    ///
    /// Returns the peer info if admitted. A decision that takes longer than
    /// `timeout`, or a listener shutdown signalled through `cancel`, rejects.
    pub async fn resolve(self, timeout: Duration, cancel: &CancellationToken) -> Option<PeerInfo> {
        let PendingConnection { info, decision } = self;
        let admitted = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(peer = %info.peer, "Listener stopped before admission");
                false
            }
            decided = tokio::time::timeout(timeout, decision) => match decided {
                Ok(admitted) => admitted,
                Err(_) => {
                    warn!(peer = %info.peer, remote = %info.remote, "Admission decision timed out");
                    false
                }
            }
        };
        admitted.then_some(info)
    }
}

/// Per-listen options.
#[derive(Debug, Clone)]
pub struct ListenOptions {
    /// Interface to bind, for bindings that have one
    pub bind_address: String,
    pub admission_timeout: Duration,
}

impl Default for ListenOptions {
    fn default() -> Self {
        Self {
            bind_address: String::from("127.0.0.1"),
            admission_timeout: timeout::ADMISSION_TIMEOUT,
        }
    }
}

impl From<&ServerConfig> for ListenOptions {
    fn from(config: &ServerConfig) -> Self {
        Self {
            bind_address: config.bind_address.clone(),
            admission_timeout: config.admission_timeout,
        }
    }
}
