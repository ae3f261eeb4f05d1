//! # Event Queue
//!
//! Transport tasks never touch peer state. They push [`TransportEvent`]s
//! through an [`EventSink`] into the connector's [`EventQueue`], and the
//! application drains that queue from a single thread whenever it chooses.
//!
//! The queue is an unbounded tokio MPSC channel: any number of producers,
//! exactly one consumer, FIFO across the whole connector and therefore FIFO
//! per peer.

use crate::core::identity::PeerId;
use crate::transport::PeerLink;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc::{self, error::SendError, UnboundedReceiver, UnboundedSender};
use tracing::trace;

/// Why a peer went away. Every disconnection carries exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DisconnectionReason {
    /// The byte stream failed (I/O error, reset)
    Error,
    /// The owning connector stopped or was dropped
    Disposed,
    /// The remote end closed the connection
    Disconnected,
    TimedOut,
    Quit,
    Kicked,
    /// Admission or authentication refused the peer
    Denied,
    LobbyClosed,
    Deleted,
    /// The peer announced a frame above the configured cap
    FrameTooLarge,
    #[default]
    Invalid,
}

/// Raw event produced by a transport binding.
pub enum TransportEvent {
    /// A connection was established (outbound) or admitted (inbound)
    Connected {
        peer: PeerId,
        remote: String,
        link: Box<dyn PeerLink>,
    },
    /// Raw bytes arrived; may hold any part of any number of frames
    Received { peer: PeerId, bytes: Bytes },
    /// The transport lost the connection
    Disconnected {
        peer: PeerId,
        reason: DisconnectionReason,
    },
    /// An outbound connection could not be established
    ConnectFailed { peer: PeerId, reason: String },
    /// Local disconnect marker, queued behind everything already produced
    Closed {
        peer: PeerId,
        reason: DisconnectionReason,
    },
}

impl TransportEvent {
    pub fn peer(&self) -> PeerId {
        match self {
            TransportEvent::Connected { peer, .. }
            | TransportEvent::Received { peer, .. }
            | TransportEvent::Disconnected { peer, .. }
            | TransportEvent::ConnectFailed { peer, .. }
            | TransportEvent::Closed { peer, .. } => *peer,
        }
    }
}

impl fmt::Debug for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportEvent::Connected { peer, remote, .. } => f
                .debug_struct("Connected")
                .field("peer", peer)
                .field("remote", remote)
                .finish_non_exhaustive(),
            TransportEvent::Received { peer, bytes } => f
                .debug_struct("Received")
                .field("peer", peer)
                .field("len", &bytes.len())
                .finish(),
            TransportEvent::Disconnected { peer, reason } => f
                .debug_struct("Disconnected")
                .field("peer", peer)
                .field("reason", reason)
                .finish(),
            TransportEvent::ConnectFailed { peer, reason } => f
                .debug_struct("ConnectFailed")
                .field("peer", peer)
                .field("reason", reason)
                .finish(),
            TransportEvent::Closed { peer, reason } => f
                .debug_struct("Closed")
                .field("peer", peer)
                .field("reason", reason)
                .finish(),
        }
    }
}

/// What the application observes from `Connector::process_events`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorEvent {
    PeerConnected {
        peer: PeerId,
        remote: String,
    },
    PeerDisconnected {
        peer: PeerId,
        reason: DisconnectionReason,
    },
    /// One complete, defragmented message
    MessageReceived {
        peer: PeerId,
        payload: Bytes,
    },
    /// An outbound `connect_to` never established
    ConnectFailed {
        peer: PeerId,
        reason: String,
    },
}

impl ConnectorEvent {
    pub fn peer(&self) -> PeerId {
        match self {
            ConnectorEvent::PeerConnected { peer, .. }
            | ConnectorEvent::PeerDisconnected { peer, .. }
            | ConnectorEvent::MessageReceived { peer, .. }
            | ConnectorEvent::ConnectFailed { peer, .. } => *peer,
        }
    }
}

/// Create a connected sink/queue pair.
pub fn channel() -> (EventSink, EventQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx }, EventQueue { rx })
}

/// Producer handle given to transport tasks.
///
/// Cloneable and usable from any thread. Every method returns `false` once
/// the owning connector has closed its queue; the event is then dropped, and
/// a link carried by a dropped `Connected` event is released by its own
/// `Drop`.
#[derive(Clone)]
pub struct EventSink {
    tx: UnboundedSender<TransportEvent>,
}

impl EventSink {
    /// Mint the identity for a connection the transport is about to report
    pub fn next_peer_id(&self) -> PeerId {
        PeerId::random()
    }

    pub fn connected(&self, peer: PeerId, remote: impl Into<String>, link: Box<dyn PeerLink>) -> bool {
        self.push(TransportEvent::Connected {
            peer,
            remote: remote.into(),
            link,
        })
    }

    pub fn received(&self, peer: PeerId, bytes: Bytes) -> bool {
        self.push(TransportEvent::Received { peer, bytes })
    }

    pub fn disconnected(&self, peer: PeerId, reason: DisconnectionReason) -> bool {
        self.push(TransportEvent::Disconnected { peer, reason })
    }

    pub fn connect_failed(&self, peer: PeerId, reason: impl Into<String>) -> bool {
        self.push(TransportEvent::ConnectFailed {
            peer,
            reason: reason.into(),
        })
    }

    pub(crate) fn closed(&self, peer: PeerId, reason: DisconnectionReason) -> bool {
        self.push(TransportEvent::Closed { peer, reason })
    }

    /// Whether the consumer side is gone
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn push(&self, event: TransportEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(SendError(event)) => {
                trace!(peer = %event.peer(), "Event queue closed, dropping event");
                false
            }
        }
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// Consumer side of the connector's event channel.
#[derive(Debug)]
pub struct EventQueue {
    rx: UnboundedReceiver<TransportEvent>,
}

impl EventQueue {
    /// Number of events currently queued
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Remove every event queued at the time of the call, in FIFO order.
    ///
    /// Never waits. Events pushed while the caller processes the returned
    /// batch stay queued for the next drain.
    pub fn drain(&mut self) -> Vec<TransportEvent> {
        let pending = self.rx.len();
        let mut events = Vec::with_capacity(pending);
        for _ in 0..pending {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(_) => break,
            }
        }
        events
    }

    /// Refuse all further events; already queued ones can still be drained
    pub fn close(&mut self) {
        self.rx.close();
    }
}
