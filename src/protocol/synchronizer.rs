//! # Synchronizer
//!
//! Typed messaging on top of a [`Connector`].
//!
//! Incoming path, per complete message:
//! ```text
//! decompress ─▶ decode envelope ─▶ built-in? ─▶ ping / pong / auth / error
//!                                      └──────▶ dispatcher ─▶ handler
//! ```
//! Outgoing path: wrap in an envelope, encode, compress, frame, send.
//!
//! A message that fails to decode or route surfaces as exactly one
//! [`SyncEvent::Error`] and never costs the peer its connection. With error
//! replies enabled the sender is told as well, unless the message could not
//! be decoded at all: a peer whose bytes we cannot read would not read our
//! reply either.

use crate::config::NetworkConfig;
use crate::core::envelope::{Envelope, MessageData};
use crate::core::identity::{PeerId, UserId};
use crate::core::serialization::{MultiFormat, SerializationFormat};
use crate::error::{ErrorType, ProtocolError, Result};
use crate::protocol::auth::{AuthFailurePolicy, AuthSessions, AuthState, Authenticator, Resolution};
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::keepalive::PingTracker;
use crate::protocol::messages::{
    self, AuthenticateMessageData, AuthenticatedMessageData, AuthenticationFailedMessageData,
    ErrorMessageData, PingMessageData, PongMessageData,
};
use crate::transport::connector::Connector;
use crate::transport::event::{ConnectorEvent, DisconnectionReason};
use crate::utils::compression::{CompressionKind, Compressor};
use crate::utils::metrics::global_metrics;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, trace, warn};

/// Who sent a message: a plain peer, or a peer authenticated as a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Peer(PeerId),
    User { user: UserId, peer: PeerId },
}

impl Origin {
    pub fn peer(&self) -> PeerId {
        match self {
            Origin::Peer(peer) | Origin::User { peer, .. } => *peer,
        }
    }

    pub fn user(&self) -> Option<UserId> {
        match self {
            Origin::Peer(_) => None,
            Origin::User { user, .. } => Some(*user),
        }
    }
}

/// What the application observes from [`Synchronizer::process_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    PeerConnected {
        peer: PeerId,
        remote: String,
    },
    PeerDisconnected {
        peer: PeerId,
        /// The user the peer was authenticated as, if any
        user: Option<UserId>,
        reason: DisconnectionReason,
    },
    ConnectFailed {
        peer: PeerId,
        reason: String,
    },
    /// A message was handled by its registered handler
    MessageReceived {
        origin: Origin,
        message_type: String,
        payload: Vec<u8>,
    },
    UserAuthenticated {
        peer: PeerId,
        user: UserId,
        info: Vec<u8>,
    },
    UserAuthenticationFailed {
        peer: PeerId,
        reason: String,
    },
    Pong {
        peer: PeerId,
        key: u64,
        round_trip: Duration,
    },
    /// A message from `peer` could not be handled
    Error {
        peer: PeerId,
        error: ErrorType,
        message_type: Option<String>,
    },
    /// `peer` reported that one of our messages could not be handled
    RemoteError {
        peer: PeerId,
        error: ErrorType,
        message_type: Option<String>,
    },
}

/// Encode/decode half of the synchronizer.
pub(crate) struct Pipeline {
    format: SerializationFormat,
    compressor: Box<dyn Compressor>,
    /// Largest decompressed message accepted, the connector's frame cap
    max_message_size: usize,
}

impl Pipeline {
    fn encode<T: MessageData>(&self, data: &T) -> Result<Vec<u8>> {
        let envelope = Envelope::wrap(data, self.format)?;
        let bytes = envelope.serialize_format(self.format)?;
        self.compressor.compress(&bytes)
    }

    fn decode(&self, payload: &[u8]) -> Result<Envelope> {
        let bytes = self.compressor.decompress(payload, self.max_message_size)?;
        Envelope::deserialize_format(&bytes, self.format)
    }
}

/// Handle given to message handlers.
pub struct Context<'a> {
    connector: &'a mut Connector,
    pipeline: &'a Pipeline,
    auth: &'a AuthSessions,
}

impl Context<'_> {
    pub fn send<T: MessageData>(&mut self, peer: PeerId, data: &T) -> Result<()> {
        let bytes = self.pipeline.encode(data)?;
        self.connector.send(peer, &bytes)
    }

    /// # Errors
    /// `ProtocolError::UserNotFound` if no connected peer is authenticated as `user`
    pub fn send_to_user<T: MessageData>(&mut self, user: UserId, data: &T) -> Result<()> {
        let peer = self
            .auth
            .peer_of(user)
            .ok_or(ProtocolError::UserNotFound(user))?;
        self.send(peer, data)
    }

    /// Send to every connected peer; returns how many it reached
    pub fn broadcast<T: MessageData>(&mut self, data: &T) -> Result<usize> {
        let bytes = self.pipeline.encode(data)?;
        let peers: Vec<PeerId> = self.connector.peers().map(|p| p.id()).collect();
        let mut reached = 0;
        for peer in peers {
            match self.connector.send(peer, &bytes) {
                Ok(()) => reached += 1,
                Err(e) => debug!(%peer, error = %e, "Broadcast skipped peer"),
            }
        }
        Ok(reached)
    }

    pub fn disconnect(&mut self, peer: PeerId, reason: DisconnectionReason) -> Result<()> {
        self.connector.disconnect(peer, reason)
    }

    pub fn user_of(&self, peer: PeerId) -> Option<UserId> {
        self.auth.user_of(peer)
    }

    pub fn peer_of(&self, user: UserId) -> Option<PeerId> {
        self.auth.peer_of(user)
    }
}

/// Routes typed messages, answers pings and authenticates peers for one
/// connector.
pub struct Synchronizer {
    connector: Connector,
    pipeline: Pipeline,
    dispatcher: Dispatcher,
    auth: AuthSessions,
    pings: PingTracker,
    reply_with_errors: bool,
}

impl Synchronizer {
    /// JSON, no compression, error replies on, `AuthFailurePolicy::KeepOpen`.
    /// Decompressed messages are bounded by the connector's frame cap.
    pub fn new(connector: Connector) -> Self {
        let max_message_size = connector.max_frame_size();
        Self {
            connector,
            pipeline: Pipeline {
                format: SerializationFormat::default(),
                compressor: Box::new(CompressionKind::None),
                max_message_size,
            },
            dispatcher: Dispatcher::new(),
            auth: AuthSessions::new(AuthFailurePolicy::default()),
            pings: PingTracker::new(),
            reply_with_errors: true,
        }
    }

    pub fn with_config(connector: Connector, config: &NetworkConfig) -> Self {
        Self::new(connector)
            .with_format(config.transport.serialization)
            .with_compressor(config.transport.compression)
            .with_error_replies(config.transport.reply_with_errors)
            .with_failure_policy(config.auth.failure_policy)
    }

    pub fn with_format(mut self, format: SerializationFormat) -> Self {
        self.pipeline.format = format;
        self
    }

    pub fn with_compressor<C: Compressor + 'static>(mut self, compressor: C) -> Self {
        self.pipeline.compressor = Box::new(compressor);
        self
    }

    /// Accept credential submissions, validated by `authenticator`
    pub fn with_authenticator<A: Authenticator + 'static>(mut self, authenticator: A) -> Self {
        self.auth.set_authenticator(Arc::new(authenticator));
        self
    }

    pub fn with_failure_policy(mut self, policy: AuthFailurePolicy) -> Self {
        self.auth.set_policy(policy);
        self
    }

    pub fn with_error_replies(mut self, enabled: bool) -> Self {
        self.reply_with_errors = enabled;
        self
    }

    /// Register a handler for `T`, callable by any peer.
    pub fn register<T, F>(&mut self, handler: F) -> Result<()>
    where
        T: MessageData,
        F: Fn(&mut Context<'_>, Origin, T) -> Result<()> + Send + Sync + 'static,
    {
        self.dispatcher.register::<T, F>(false, handler)
    }

    /// Register a handler for `T` that only authenticated peers may reach.
    /// Anyone else gets `InvalidMessageContext`.
    pub fn register_authenticated<T, F>(&mut self, handler: F) -> Result<()>
    where
        T: MessageData,
        F: Fn(&mut Context<'_>, Origin, T) -> Result<()> + Send + Sync + 'static,
    {
        self.dispatcher.register::<T, F>(true, handler)
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn connector(&self) -> &Connector {
        &self.connector
    }

    pub fn connector_mut(&mut self) -> &mut Connector {
        &mut self.connector
    }

    pub fn format(&self) -> SerializationFormat {
        self.pipeline.format
    }

    pub fn failure_policy(&self) -> AuthFailurePolicy {
        self.auth.policy()
    }

    pub fn auth_state(&self, peer: PeerId) -> Option<&AuthState> {
        self.auth.state(peer)
    }

    pub fn user_of(&self, peer: PeerId) -> Option<UserId> {
        self.auth.user_of(peer)
    }

    pub fn peer_of(&self, user: UserId) -> Option<PeerId> {
        self.auth.peer_of(user)
    }

    /// Authenticated users and the peers carrying them
    pub fn users(&self) -> Vec<(UserId, PeerId)> {
        let mut users: Vec<_> = self.auth.users().collect();
        users.sort_unstable();
        users
    }

    fn context(&mut self) -> Context<'_> {
        Context {
            connector: &mut self.connector,
            pipeline: &self.pipeline,
            auth: &self.auth,
        }
    }

    pub fn send<T: MessageData>(&mut self, peer: PeerId, data: &T) -> Result<()> {
        self.context().send(peer, data)
    }

    pub fn send_to_user<T: MessageData>(&mut self, user: UserId, data: &T) -> Result<()> {
        self.context().send_to_user(user, data)
    }

    pub fn broadcast<T: MessageData>(&mut self, data: &T) -> Result<usize> {
        self.context().broadcast(data)
    }

    pub fn disconnect(&mut self, peer: PeerId, reason: DisconnectionReason) -> Result<()> {
        self.connector.disconnect(peer, reason)
    }

    /// Submit credentials to the remote side of `peer`.
    ///
    /// The answer arrives as `UserAuthenticated` or `UserAuthenticationFailed`.
    pub fn authenticate(&mut self, peer: PeerId, credentials: impl Into<Vec<u8>>) -> Result<()> {
        self.send(
            peer,
            &AuthenticateMessageData {
                credentials: credentials.into(),
            },
        )?;
        self.auth.expect_answer(peer);
        Ok(())
    }

    /// Ping `peer` with the next key from the internal sequence
    pub fn ping(&mut self, peer: PeerId) -> Result<u64> {
        let key = self.pings.next_key();
        self.ping_with_key(peer, key)?;
        Ok(key)
    }

    pub fn ping_with_key(&mut self, peer: PeerId, key: u64) -> Result<()> {
        self.send(peer, &PingMessageData { key })?;
        self.pings.record(peer, key);
        global_metrics().ping_sent();
        Ok(())
    }

    /// Unanswered pings of `peer` with their age
    pub fn outstanding_pings(&self, peer: PeerId) -> Vec<(u64, Duration)> {
        self.pings.outstanding(peer)
    }

    /// Unanswered pings older than `max_age`, across all peers
    pub fn expired_pings(&self, max_age: Duration) -> Vec<(PeerId, u64)> {
        self.pings.expired(max_age)
    }

    /// Stop the connector; every peer is reported as disposed.
    pub fn stop_listening(&mut self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        for event in self.connector.stop_listening() {
            self.apply(event, &mut events);
        }
        events
    }

    /// Close the connector for good; see [`Connector::close`].
    pub fn close(&mut self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        for event in self.connector.close() {
            self.apply(event, &mut events);
        }
        events
    }

    /// Drain the connector and finished authentications, running handlers
    /// on the calling thread.
    #[instrument(level = "trace", skip(self), fields(connector = %self.connector.id()))]
    pub fn process_events(&mut self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        for event in self.connector.process_events() {
            self.apply(event, &mut events);
        }
        for resolution in self.auth.drain() {
            self.conclude(resolution, &mut events);
        }
        events
    }

    fn apply(&mut self, event: ConnectorEvent, events: &mut Vec<SyncEvent>) {
        match event {
            ConnectorEvent::PeerConnected { peer, remote } => {
                self.auth.connect(peer);
                events.push(SyncEvent::PeerConnected { peer, remote });
            }
            ConnectorEvent::PeerDisconnected { peer, reason } => {
                let user = self.auth.disconnect(peer);
                self.pings.forget(peer);
                events.push(SyncEvent::PeerDisconnected { peer, user, reason });
            }
            ConnectorEvent::ConnectFailed { peer, reason } => {
                events.push(SyncEvent::ConnectFailed { peer, reason });
            }
            ConnectorEvent::MessageReceived { peer, payload } => {
                self.receive(peer, &payload, events);
            }
        }
    }

    fn receive(&mut self, peer: PeerId, payload: &[u8], events: &mut Vec<SyncEvent>) {
        let envelope = match self.pipeline.decode(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(%peer, error = %e, "Undecodable message");
                self.report(peer, e.error_type(), None, false, events);
                return;
            }
        };

        let message_type = envelope.message_type.clone();
        if let Err(e) = self.route(peer, envelope, events) {
            let reply = message_type != messages::ERROR;
            self.report(peer, e.error_type(), Some(message_type), reply, events);
        }
    }

    fn route(&mut self, peer: PeerId, envelope: Envelope, events: &mut Vec<SyncEvent>) -> Result<()> {
        let format = self.pipeline.format;
        match envelope.message_type.as_str() {
            messages::PING => {
                let ping: PingMessageData = envelope.open(format)?;
                self.send(peer, &PongMessageData { key: ping.key })
            }
            messages::PONG => {
                let pong: PongMessageData = envelope.open(format)?;
                match self.pings.complete(peer, pong.key) {
                    Some(round_trip) => {
                        global_metrics().pong_matched();
                        events.push(SyncEvent::Pong {
                            peer,
                            key: pong.key,
                            round_trip,
                        });
                    }
                    None => warn!(%peer, key = pong.key, "Pong for unknown ping key"),
                }
                Ok(())
            }
            messages::AUTHENTICATE => {
                let request: AuthenticateMessageData = envelope.open(format)?;
                global_metrics().auth_attempt();
                self.auth.submit(peer, request.credentials)
            }
            messages::AUTHENTICATED => {
                self.expect_answer_from(peer)?;
                let accepted: AuthenticatedMessageData = envelope.open(format)?;
                self.auth.answered(peer);
                info!(%peer, user = %accepted.user, "Authenticated by remote");
                events.push(SyncEvent::UserAuthenticated {
                    peer,
                    user: accepted.user,
                    info: accepted.info,
                });
                Ok(())
            }
            messages::AUTHENTICATION_FAILED => {
                self.expect_answer_from(peer)?;
                let failed: AuthenticationFailedMessageData = envelope.open(format)?;
                self.auth.answered(peer);
                warn!(%peer, reason = %failed.reason, "Authentication refused by remote");
                events.push(SyncEvent::UserAuthenticationFailed {
                    peer,
                    reason: failed.reason,
                });
                Ok(())
            }
            messages::ERROR => {
                let remote: ErrorMessageData = envelope.open(format)?;
                if remote.message_type.as_deref() == Some(messages::AUTHENTICATE) {
                    self.auth.answered(peer);
                }
                debug!(%peer, error = ?remote.error, message_type = ?remote.message_type, "Remote error");
                events.push(SyncEvent::RemoteError {
                    peer,
                    error: remote.error,
                    message_type: remote.message_type,
                });
                Ok(())
            }
            _ => {
                let origin = match self.auth.user_of(peer) {
                    Some(user) => Origin::User { user, peer },
                    None => Origin::Peer(peer),
                };
                let mut ctx = Context {
                    connector: &mut self.connector,
                    pipeline: &self.pipeline,
                    auth: &self.auth,
                };
                self.dispatcher.dispatch(&mut ctx, origin, &envelope, format)?;
                trace!(%peer, message_type = %envelope.message_type, "Message handled");
                events.push(SyncEvent::MessageReceived {
                    origin,
                    message_type: envelope.message_type.clone(),
                    payload: envelope.payload,
                });
                Ok(())
            }
        }
    }

    /// Authentication results are only valid from a peer we submitted
    /// credentials to
    fn expect_answer_from(&self, peer: PeerId) -> Result<()> {
        if self.auth.awaits_answer(peer) {
            Ok(())
        } else {
            warn!(%peer, "Unsolicited authentication result");
            Err(ProtocolError::Message(ErrorType::InvalidMessageContext))
        }
    }

    fn report(
        &mut self,
        peer: PeerId,
        error: ErrorType,
        message_type: Option<String>,
        reply: bool,
        events: &mut Vec<SyncEvent>,
    ) {
        global_metrics().protocol_error();
        warn!(%peer, ?error, message_type = ?message_type, "Message not handled");

        if reply && self.reply_with_errors && self.connector.is_connected(peer) {
            let notice = ErrorMessageData {
                error,
                message_type: message_type.clone(),
            };
            if let Err(e) = self.send(peer, &notice) {
                debug!(%peer, error = %e, "Failed to send error reply");
            }
        }

        events.push(SyncEvent::Error {
            peer,
            error,
            message_type,
        });
    }

    fn conclude(&mut self, resolution: Resolution, events: &mut Vec<SyncEvent>) {
        match resolution {
            Resolution::Authenticated { peer, user, info } => {
                global_metrics().auth_success();
                info!(%peer, %user, "User authenticated");
                let reply = AuthenticatedMessageData {
                    user,
                    info: info.clone(),
                };
                if let Err(e) = self.send(peer, &reply) {
                    debug!(%peer, error = %e, "Failed to confirm authentication");
                }
                events.push(SyncEvent::UserAuthenticated { peer, user, info });
            }
            Resolution::Rejected { peer, reason } => {
                global_metrics().auth_failed();
                warn!(%peer, %reason, "Authentication failed");
                let reply = AuthenticationFailedMessageData {
                    reason: reason.clone(),
                };
                if let Err(e) = self.send(peer, &reply) {
                    debug!(%peer, error = %e, "Failed to report authentication failure");
                }
                events.push(SyncEvent::UserAuthenticationFailed { peer, reason });

                if self.auth.policy() == AuthFailurePolicy::Disconnect {
                    if let Err(e) = self.connector.disconnect(peer, DisconnectionReason::Denied) {
                        debug!(%peer, error = %e, "Peer already gone");
                    }
                }
            }
        }
    }
}
