//! # Connector
//!
//! Owns the peers of one transport binding.
//!
//! Transport tasks report raw events into the connector's queue; the
//! application calls [`Connector::process_events`] from one thread to turn
//! them into [`ConnectorEvent`]s. All peer state (the peer map and each
//! peer's [`Defragmenter`]) is touched only from that thread, so none of it
//! needs a lock.

use crate::config::TransportConfig;
use crate::core::frame::{self, Defragmenter};
use crate::core::identity::{ConnectorId, PeerId};
use crate::error::{constants, ProtocolError, Result};
use crate::transport::event::{self, ConnectorEvent, DisconnectionReason, EventQueue, EventSink, TransportEvent};
use crate::transport::{
    admission_hook, admit_all, AdmissionHook, ListenOptions, PeerInfo, PeerLink, Transport,
    TransportContext,
};
use crate::utils::metrics::global_metrics;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::time::Instant;
use tracing::{debug, info, instrument, trace, warn};

/// One end of an established connection, owned by exactly one connector.
pub struct Peer {
    id: PeerId,
    connector: ConnectorId,
    remote: String,
    connected_at: Instant,
    link: Box<dyn PeerLink>,
    defragmenter: Defragmenter,
    closing: Option<DisconnectionReason>,
}

impl Peer {
    pub fn id(&self) -> PeerId {
        self.id
    }

    /// The connector that owns this peer
    pub fn connector(&self) -> ConnectorId {
        self.connector
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    /// Set once a local disconnect was requested and not yet reported
    pub fn is_closing(&self) -> bool {
        self.closing.is_some()
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.id)
            .field("connector", &self.connector)
            .field("remote", &self.remote)
            .field("closing", &self.closing)
            .field("buffered", &self.defragmenter.buffered_len())
            .finish()
    }
}

/// Manager of the peers of one transport binding.
pub struct Connector {
    id: ConnectorId,
    transport: Box<dyn Transport>,
    peers: BTreeMap<PeerId, Peer>,
    outbound: BTreeSet<PeerId>,
    queue: EventQueue,
    sink: EventSink,
    admission: AdmissionHook,
    max_frame_size: usize,
    listening: bool,
    closed: bool,
}

impl Connector {
    pub fn new<T: Transport + 'static>(transport: T) -> Self {
        Self::with_config(transport, &TransportConfig::default())
    }

    pub fn with_config<T: Transport + 'static>(transport: T, config: &TransportConfig) -> Self {
        let (sink, queue) = event::channel();
        Self {
            id: ConnectorId::next(),
            transport: Box::new(transport),
            peers: BTreeMap::new(),
            outbound: BTreeSet::new(),
            queue,
            sink,
            admission: admit_all(),
            max_frame_size: config.max_frame_size,
            listening: false,
            closed: false,
        }
    }

    pub fn id(&self) -> ConnectorId {
        self.id
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Decide asynchronously whether inbound connections are admitted.
    ///
    /// Takes effect for the next `listen`. Rejected connections are closed
    /// by the binding and never produce `PeerConnected`.
    pub fn set_admission_hook<F, Fut>(&mut self, hook: F)
    where
        F: Fn(&PeerInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.admission = admission_hook(hook);
    }

    fn context(&self) -> TransportContext {
        TransportContext::new(self.id, self.sink.clone(), self.admission.clone())
    }

    /// Start accepting inbound connections.
    ///
    /// # Errors
    /// - `ProtocolError::InvalidPort` if `port` is zero
    /// - `ProtocolError::ConnectorClosed` after `close`
    /// - whatever the binding reports (port in use, no runtime, ...)
    #[instrument(skip(self, options), fields(connector = %self.id, transport = self.transport.name()))]
    pub fn listen(&mut self, port: u16, options: ListenOptions) -> Result<()> {
        if self.closed {
            return Err(ProtocolError::ConnectorClosed);
        }
        if port == 0 {
            return Err(ProtocolError::InvalidPort(port));
        }
        if self.listening {
            return Err(ProtocolError::TransportError(
                constants::ERR_ALREADY_LISTENING.to_string(),
            ));
        }

        let ctx = self.context();
        self.transport.listen(port, &options, ctx)?;
        self.listening = true;
        info!(port, "Listening");
        Ok(())
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Stop accepting and dispose of every peer.
    ///
    /// Queued events are discarded. Every peer still connected is reported
    /// as `PeerDisconnected(Disposed)` in the returned batch (a peer with a
    /// pending local disconnect keeps its requested reason) and every
    /// outbound attempt still in flight as `ConnectFailed`. Nothing is
    /// reported for those peers afterwards.
    #[instrument(skip(self), fields(connector = %self.id))]
    pub fn stop_listening(&mut self) -> Vec<ConnectorEvent> {
        self.transport.stop_listening();
        self.listening = false;

        let mut discarded = 0usize;
        for event in self.queue.drain() {
            discarded += 1;
            if let TransportEvent::Connected { mut link, .. } = event {
                link.close();
            }
        }
        if discarded > 0 {
            debug!(discarded, "Discarded queued events");
        }

        let mut events = Vec::with_capacity(self.peers.len() + self.outbound.len());
        for (id, mut peer) in std::mem::take(&mut self.peers) {
            peer.link.close();
            global_metrics().connection_closed();
            events.push(ConnectorEvent::PeerDisconnected {
                peer: id,
                reason: peer.closing.unwrap_or(DisconnectionReason::Disposed),
            });
        }
        for id in std::mem::take(&mut self.outbound) {
            events.push(ConnectorEvent::ConnectFailed {
                peer: id,
                reason: constants::ERR_CONNECTOR_CLOSED.to_string(),
            });
        }

        info!(disposed = events.len(), "Stopped listening");
        events
    }

    /// Stop everything and refuse further use. Returns the same batch as
    /// `stop_listening`.
    pub fn close(&mut self) -> Vec<ConnectorEvent> {
        if self.closed {
            return Vec::new();
        }
        let events = self.stop_listening();
        self.closed = true;
        self.queue.close();
        events
    }

    /// Start an outbound connection.
    ///
    /// Returns the identity the peer will carry; the outcome arrives later
    /// as `PeerConnected` or `ConnectFailed`.
    #[instrument(skip(self), fields(connector = %self.id, transport = self.transport.name()))]
    pub fn connect_to(&mut self, address: &str) -> Result<PeerId> {
        if self.closed {
            return Err(ProtocolError::ConnectorClosed);
        }
        if address.is_empty() {
            return Err(ProtocolError::TransportError(
                constants::ERR_EMPTY_ADDRESS.to_string(),
            ));
        }

        let peer = self.sink.next_peer_id();
        self.outbound.insert(peer);
        let ctx = self.context();
        if let Err(e) = self.transport.connect(peer, address, ctx) {
            self.outbound.remove(&peer);
            return Err(e);
        }
        debug!(%peer, "Connecting");
        Ok(peer)
    }

    /// Frame `payload` and hand it to the peer's link.
    ///
    /// # Errors
    /// - `ProtocolError::PeerNotFound` for an unknown, disconnected or
    ///   locally closed peer; nothing is sent
    /// - `ProtocolError::PayloadTooLarge` above the frame cap
    pub fn send(&mut self, peer: PeerId, payload: &[u8]) -> Result<()> {
        let max_frame_size = self.max_frame_size;
        let target = self
            .peers
            .get_mut(&peer)
            .filter(|p| p.closing.is_none())
            .ok_or(ProtocolError::PeerNotFound(peer))?;

        if payload.len() > max_frame_size {
            return Err(ProtocolError::PayloadTooLarge(payload.len()));
        }

        let frame = frame::fragment(payload)?;
        let len = frame.len() as u64;
        target.link.send(frame)?;
        global_metrics().message_sent(len);
        trace!(%peer, bytes = len, "Frame sent");
        Ok(())
    }

    /// Close a peer's connection from this side.
    ///
    /// The link closes now and `send` to the peer fails from here on. The
    /// `PeerDisconnected { reason }` event is delivered by the next
    /// `process_events`, after anything already queued for the peer.
    pub fn disconnect(&mut self, peer: PeerId, reason: DisconnectionReason) -> Result<()> {
        let target = self
            .peers
            .get_mut(&peer)
            .filter(|p| p.closing.is_none())
            .ok_or(ProtocolError::PeerNotFound(peer))?;

        target.closing = Some(reason);
        target.link.close();
        self.sink.closed(peer, reason);
        debug!(%peer, ?reason, "Disconnect requested");
        Ok(())
    }

    /// Drain the queue and apply every event in order.
    ///
    /// Never waits for new events.
    pub fn process_events(&mut self) -> Vec<ConnectorEvent> {
        let mut events = Vec::new();
        for event in self.queue.drain() {
            self.apply(event, &mut events);
        }
        events
    }

    fn apply(&mut self, event: TransportEvent, events: &mut Vec<ConnectorEvent>) {
        match event {
            TransportEvent::Connected {
                peer,
                remote,
                mut link,
            } => {
                let outbound = self.outbound.remove(&peer);
                if !outbound && !self.listening {
                    debug!(%peer, "Inbound connection after listener stopped");
                    link.close();
                    return;
                }
                if self.peers.contains_key(&peer) {
                    warn!(%peer, "Duplicate connection for peer, closing");
                    link.close();
                    return;
                }

                self.peers.insert(
                    peer,
                    Peer {
                        id: peer,
                        connector: self.id,
                        remote: remote.clone(),
                        connected_at: Instant::now(),
                        link,
                        defragmenter: Defragmenter::new(self.max_frame_size),
                        closing: None,
                    },
                );
                global_metrics().connection_established();
                info!(%peer, %remote, outbound, "Peer connected");
                events.push(ConnectorEvent::PeerConnected { peer, remote });
            }
            TransportEvent::Received { peer, bytes } => self.receive(peer, bytes, events),
            TransportEvent::Disconnected { peer, reason } => {
                match self.peers.get(&peer).map(Peer::is_closing) {
                    Some(true) => trace!(%peer, ?reason, "Remote disconnect after local close"),
                    Some(false) => self.remove(peer, reason, events),
                    None => trace!(%peer, "Disconnect for unknown peer"),
                }
            }
            TransportEvent::ConnectFailed { peer, reason } => {
                if self.outbound.remove(&peer) {
                    warn!(%peer, %reason, "Connection failed");
                    events.push(ConnectorEvent::ConnectFailed { peer, reason });
                }
            }
            TransportEvent::Closed { peer, reason } => {
                if self.peers.contains_key(&peer) {
                    self.remove(peer, reason, events);
                }
            }
        }
    }

    fn receive(&mut self, peer: PeerId, bytes: Bytes, events: &mut Vec<ConnectorEvent>) {
        let Some(target) = self.peers.get_mut(&peer) else {
            trace!(%peer, bytes = bytes.len(), "Data for unknown peer");
            return;
        };
        global_metrics().bytes_received(bytes.len() as u64);

        let mut messages = Vec::new();
        let result = target.defragmenter.push(&bytes, &mut messages);
        for payload in messages {
            global_metrics().message_received();
            events.push(ConnectorEvent::MessageReceived { peer, payload });
        }

        if let Err(e) = result {
            warn!(%peer, error = %e, "Dropping peer");
            global_metrics().frame_oversized();
            self.remove(peer, DisconnectionReason::FrameTooLarge, events);
        }
    }

    fn remove(&mut self, peer: PeerId, reason: DisconnectionReason, events: &mut Vec<ConnectorEvent>) {
        if let Some(mut removed) = self.peers.remove(&peer) {
            removed.link.close();
            global_metrics().connection_closed();
            info!(%peer, ?reason, "Peer disconnected");
            events.push(ConnectorEvent::PeerDisconnected { peer, reason });
        }
    }

    pub fn peer(&self, peer: PeerId) -> Option<&Peer> {
        self.peers.get(&peer)
    }

    /// Connected peers in identity order
    pub fn peers(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Whether `peer` is connected and not locally closing
    pub fn is_connected(&self, peer: PeerId) -> bool {
        self.peers.get(&peer).is_some_and(|p| p.closing.is_none())
    }
}

impl Drop for Connector {
    fn drop(&mut self) {
        self.transport.stop_listening();
        for peer in self.peers.values_mut() {
            peer.link.close();
        }
    }
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("id", &self.id)
            .field("transport", &self.transport.name())
            .field("peers", &self.peers.len())
            .field("listening", &self.listening)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use std::sync::{Arc, Mutex};

    /// Binding that hands its context to the test and records writes.
    #[derive(Default, Clone)]
    struct ManualTransport {
        ctx: Arc<Mutex<Option<TransportContext>>>,
        sent: Arc<Mutex<Vec<(PeerId, Bytes)>>>,
    }

    impl ManualTransport {
        fn sink(&self) -> EventSink {
            self.ctx.lock().unwrap().as_ref().unwrap().sink.clone()
        }

        fn connect_peer(&self) -> (PeerId, Arc<Mutex<bool>>) {
            let sink = self.sink();
            let peer = sink.next_peer_id();
            let closed = Arc::new(Mutex::new(false));
            let link = ManualLink {
                peer,
                sent: self.sent.clone(),
                closed: closed.clone(),
            };
            assert!(sink.connected(peer, "manual", Box::new(link)));
            (peer, closed)
        }
    }

    impl Transport for ManualTransport {
        fn name(&self) -> &'static str {
            "manual"
        }

        fn listen(&mut self, _port: u16, _options: &ListenOptions, ctx: TransportContext) -> Result<()> {
            *self.ctx.lock().unwrap() = Some(ctx);
            Ok(())
        }

        fn stop_listening(&mut self) {}

        fn connect(&mut self, peer: PeerId, address: &str, ctx: TransportContext) -> Result<()> {
            if address == "refused" {
                ctx.sink.connect_failed(peer, constants::ERR_CONNECTION_REFUSED);
                return Ok(());
            }
            let link = ManualLink {
                peer,
                sent: self.sent.clone(),
                closed: Arc::new(Mutex::new(false)),
            };
            ctx.sink.connected(peer, address, Box::new(link));
            Ok(())
        }
    }

    struct ManualLink {
        peer: PeerId,
        sent: Arc<Mutex<Vec<(PeerId, Bytes)>>>,
        closed: Arc<Mutex<bool>>,
    }

    impl PeerLink for ManualLink {
        fn send(&mut self, frame: Bytes) -> Result<()> {
            self.sent.lock().unwrap().push((self.peer, frame));
            Ok(())
        }

        fn close(&mut self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    fn listening() -> (Connector, ManualTransport) {
        let transport = ManualTransport::default();
        let mut connector = Connector::new(transport.clone());
        connector.listen(7777, ListenOptions::default()).unwrap();
        (connector, transport)
    }

    fn framed(payload: &[u8]) -> Bytes {
        frame::fragment(payload).unwrap()
    }

    #[test]
    fn test_listen_rejects_port_zero() {
        let mut connector = Connector::new(ManualTransport::default());
        assert!(matches!(
            connector.listen(0, ListenOptions::default()),
            Err(ProtocolError::InvalidPort(0))
        ));
        assert!(!connector.is_listening());
    }

    #[test]
    fn test_listen_twice_fails() {
        let (mut connector, _transport) = listening();
        assert!(connector.listen(7778, ListenOptions::default()).is_err());
    }

    #[test]
    fn test_process_events_without_activity() {
        let (mut connector, _transport) = listening();
        assert!(connector.process_events().is_empty());
    }

    #[test]
    fn test_split_delivery_yields_one_message() {
        let (mut connector, transport) = listening();
        let (peer, _) = transport.connect_peer();
        let sink = transport.sink();

        sink.received(peer, Bytes::from_static(&[0x00, 0x00]));
        sink.received(peer, Bytes::from_static(&[0x00, 0x03, 0x41]));
        let events = connector.process_events();
        assert_eq!(
            events,
            vec![ConnectorEvent::PeerConnected {
                peer,
                remote: "manual".to_string()
            }]
        );

        sink.received(peer, Bytes::from_static(&[0x42, 0x43]));
        let events = connector.process_events();
        assert_eq!(
            events,
            vec![ConnectorEvent::MessageReceived {
                peer,
                payload: Bytes::from_static(b"ABC")
            }]
        );
    }

    #[test]
    fn test_lifecycle_order_per_peer() {
        let (mut connector, transport) = listening();
        let (peer, _) = transport.connect_peer();
        let sink = transport.sink();

        let mut stream = BytesMut::new();
        for i in 0..10u8 {
            frame::fragment_into(&[i], &mut stream).unwrap();
        }
        // Deliver in uneven chunks
        let stream = stream.freeze();
        for chunk in stream.chunks(3) {
            sink.received(peer, Bytes::copy_from_slice(chunk));
        }
        sink.disconnected(peer, DisconnectionReason::Quit);

        let events = connector.process_events();
        assert_eq!(events.len(), 12);
        assert!(matches!(events[0], ConnectorEvent::PeerConnected { .. }));
        for (i, event) in events[1..11].iter().enumerate() {
            match event {
                ConnectorEvent::MessageReceived { payload, .. } => assert_eq!(payload[..], [i as u8]),
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(
            events[11],
            ConnectorEvent::PeerDisconnected {
                peer,
                reason: DisconnectionReason::Quit
            }
        );
        assert_eq!(connector.peer_count(), 0);
    }

    #[test]
    fn test_send_frames_payload() {
        let (mut connector, transport) = listening();
        let (peer, _) = transport.connect_peer();
        connector.process_events();

        connector.send(peer, b"ABC").unwrap();
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, peer);
        assert_eq!(&sent[0].1[..], &[0x00, 0x00, 0x00, 0x03, 0x41, 0x42, 0x43]);
    }

    #[test]
    fn test_send_to_unknown_peer_fails() {
        let (mut connector, transport) = listening();
        let stranger = PeerId::random();
        assert!(matches!(
            connector.send(stranger, b"hi"),
            Err(ProtocolError::PeerNotFound(p)) if p == stranger
        ));
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_send_after_disconnect_fails() {
        let (mut connector, transport) = listening();
        let (peer, _) = transport.connect_peer();
        connector.process_events();

        transport.sink().disconnected(peer, DisconnectionReason::Disconnected);
        connector.process_events();
        assert!(matches!(
            connector.send(peer, b"late"),
            Err(ProtocolError::PeerNotFound(_))
        ));
    }

    #[test]
    fn test_send_above_cap_fails() {
        let transport = ManualTransport::default();
        let config = TransportConfig {
            max_frame_size: 8,
            ..TransportConfig::default()
        };
        let mut connector = Connector::with_config(transport.clone(), &config);
        connector.listen(7777, ListenOptions::default()).unwrap();
        let (peer, _) = transport.connect_peer();
        connector.process_events();

        assert!(matches!(
            connector.send(peer, &[0u8; 9]),
            Err(ProtocolError::PayloadTooLarge(9))
        ));
        connector.send(peer, &[0u8; 8]).unwrap();
    }

    #[test]
    fn test_oversized_frame_disconnects_peer() {
        let transport = ManualTransport::default();
        let config = TransportConfig {
            max_frame_size: 16,
            ..TransportConfig::default()
        };
        let mut connector = Connector::with_config(transport.clone(), &config);
        connector.listen(7777, ListenOptions::default()).unwrap();
        let (peer, closed) = transport.connect_peer();
        connector.process_events();

        let mut stream = BytesMut::new();
        frame::fragment_into(b"fine", &mut stream).unwrap();
        stream.extend_from_slice(&1024u32.to_be_bytes());
        let sink = transport.sink();
        sink.received(peer, stream.freeze());
        sink.received(peer, framed(b"ignored"));
        sink.disconnected(peer, DisconnectionReason::Error);

        let events = connector.process_events();
        assert_eq!(
            events,
            vec![
                ConnectorEvent::MessageReceived {
                    peer,
                    payload: Bytes::from_static(b"fine")
                },
                ConnectorEvent::PeerDisconnected {
                    peer,
                    reason: DisconnectionReason::FrameTooLarge
                },
            ]
        );
        assert!(*closed.lock().unwrap());
    }

    #[test]
    fn test_local_disconnect_reports_once() {
        let (mut connector, transport) = listening();
        let (peer, closed) = transport.connect_peer();
        let sink = transport.sink();
        sink.received(peer, framed(b"before"));
        connector.process_events();

        sink.received(peer, framed(b"queued"));
        connector.disconnect(peer, DisconnectionReason::Kicked).unwrap();
        assert!(*closed.lock().unwrap());
        assert!(matches!(
            connector.send(peer, b"x"),
            Err(ProtocolError::PeerNotFound(_))
        ));
        assert!(connector.disconnect(peer, DisconnectionReason::Kicked).is_err());

        // The transport notices the close as well
        sink.disconnected(peer, DisconnectionReason::Disconnected);

        let events = connector.process_events();
        assert_eq!(
            events,
            vec![
                ConnectorEvent::MessageReceived {
                    peer,
                    payload: Bytes::from_static(b"queued")
                },
                ConnectorEvent::PeerDisconnected {
                    peer,
                    reason: DisconnectionReason::Kicked
                },
            ]
        );
        assert!(connector.process_events().is_empty());
    }

    #[test]
    fn test_stop_listening_disposes_every_peer() {
        let (mut connector, transport) = listening();
        let (first, first_closed) = transport.connect_peer();
        let (second, _) = transport.connect_peer();
        connector.process_events();

        let sink = transport.sink();
        sink.received(first, framed(b"never delivered"));
        let (late, late_closed) = transport.connect_peer();

        let mut events = connector.stop_listening();
        events.sort_by_key(|e| e.peer());
        let mut expected = vec![
            ConnectorEvent::PeerDisconnected {
                peer: first,
                reason: DisconnectionReason::Disposed,
            },
            ConnectorEvent::PeerDisconnected {
                peer: second,
                reason: DisconnectionReason::Disposed,
            },
        ];
        expected.sort_by_key(|e| e.peer());
        assert_eq!(events, expected);

        assert!(*first_closed.lock().unwrap());
        assert!(*late_closed.lock().unwrap());
        assert_eq!(connector.peer_count(), 0);
        assert!(!connector.is_listening());

        sink.disconnected(late, DisconnectionReason::Disconnected);
        assert!(connector.process_events().is_empty());
    }

    #[test]
    fn test_inbound_after_stop_is_refused() {
        let (mut connector, transport) = listening();
        connector.stop_listening();
        let (_peer, closed) = transport.connect_peer();
        assert!(connector.process_events().is_empty());
        assert!(*closed.lock().unwrap());
    }

    #[test]
    fn test_outbound_connect() {
        let transport = ManualTransport::default();
        let mut connector = Connector::new(transport.clone());
        let peer = connector.connect_to("server:7777").unwrap();
        assert_eq!(
            connector.process_events(),
            vec![ConnectorEvent::PeerConnected {
                peer,
                remote: "server:7777".to_string()
            }]
        );
        assert_eq!(connector.peer(peer).unwrap().connector(), connector.id());
    }

    #[test]
    fn test_outbound_failure_reported_once() {
        let mut connector = Connector::new(ManualTransport::default());
        let peer = connector.connect_to("refused").unwrap();
        let events = connector.process_events();
        assert_eq!(
            events,
            vec![ConnectorEvent::ConnectFailed {
                peer,
                reason: constants::ERR_CONNECTION_REFUSED.to_string()
            }]
        );
        assert_eq!(connector.peer_count(), 0);
    }

    #[test]
    fn test_closed_connector_refuses_use() {
        let (mut connector, _transport) = listening();
        connector.close();
        assert!(connector.is_closed());
        assert!(matches!(
            connector.listen(7777, ListenOptions::default()),
            Err(ProtocolError::ConnectorClosed)
        ));
        assert!(matches!(
            connector.connect_to("anywhere"),
            Err(ProtocolError::ConnectorClosed)
        ));
        assert!(connector.close().is_empty());
    }
}
