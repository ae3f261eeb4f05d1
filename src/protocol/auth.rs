//! # Authentication
//!
//! Per-peer handshake state machine:
//!
//! ```text
//! Connected ──credentials──▶ Authenticating ──accepted──▶ Authenticated
//!     ▲                            │
//!     └──── retry (KeepOpen) ◀── Rejected ◀──declined──┘
//! ```
//!
//! Validation is delegated to an application [`Authenticator`] and runs on
//! a tokio task. Its outcome comes back through a channel that the
//! synchronizer drains during `process_events`, so every state change still
//! happens on the consumer thread. Exactly one attempt may be in flight per
//! peer; outcomes of attempts that no longer match the peer's state are
//! discarded.
//!
//! The submitting side keeps a smaller record: how many of its submissions
//! each peer has not answered yet. Only a peer with unanswered submissions
//! may send an authentication result.

use crate::core::identity::{PeerId, UserId};
use crate::error::{constants, ErrorType, ProtocolError, Result};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

/// What happens to a peer whose credentials are declined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFailurePolicy {
    /// Report the failure and leave the peer connected; it may try again
    #[default]
    KeepOpen,
    /// Report the failure and disconnect the peer with `Denied`
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Connected,
    Authenticating { attempt: u64 },
    Authenticated { user: UserId, info: Vec<u8> },
    Rejected { reason: String },
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated { .. })
    }

    pub fn user(&self) -> Option<UserId> {
        match self {
            AuthState::Authenticated { user, .. } => Some(*user),
            _ => None,
        }
    }
}

/// Credentials handed to the authenticator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub peer: PeerId,
    pub credentials: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Promote the peer. A random user id is minted when `user` is `None`.
    Accepted { user: Option<UserId>, info: Vec<u8> },
    Rejected { reason: String },
}

impl AuthOutcome {
    pub fn accept(info: impl Into<Vec<u8>>) -> Self {
        AuthOutcome::Accepted {
            user: None,
            info: info.into(),
        }
    }

    pub fn accept_as(user: UserId, info: impl Into<Vec<u8>>) -> Self {
        AuthOutcome::Accepted {
            user: Some(user),
            info: info.into(),
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        AuthOutcome::Rejected {
            reason: reason.into(),
        }
    }
}

/// Application-supplied credential validation.
///
/// Any `Fn(AuthRequest) -> impl Future<Output = AuthOutcome>` qualifies.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, request: AuthRequest) -> BoxFuture<'static, AuthOutcome>;
}

impl<F, Fut> Authenticator for F
where
    F: Fn(AuthRequest) -> Fut + Send + Sync,
    Fut: Future<Output = AuthOutcome> + Send + 'static,
{
    fn authenticate(&self, request: AuthRequest) -> BoxFuture<'static, AuthOutcome> {
        Box::pin(self(request))
    }
}

pub(crate) struct Completion {
    peer: PeerId,
    attempt: u64,
    outcome: AuthOutcome,
}

/// A finished attempt that changed a peer's state
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Resolution {
    Authenticated {
        peer: PeerId,
        user: UserId,
        info: Vec<u8>,
    },
    Rejected {
        peer: PeerId,
        reason: String,
    },
}

/// Authentication state of every connected peer.
pub(crate) struct AuthSessions {
    authenticator: Option<Arc<dyn Authenticator>>,
    policy: AuthFailurePolicy,
    sessions: BTreeMap<PeerId, AuthState>,
    users: HashMap<UserId, PeerId>,
    /// Unanswered credential submissions we sent, per peer
    awaiting: HashMap<PeerId, usize>,
    next_attempt: u64,
    completions_tx: UnboundedSender<Completion>,
    completions_rx: UnboundedReceiver<Completion>,
}

impl AuthSessions {
    pub(crate) fn new(policy: AuthFailurePolicy) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            authenticator: None,
            policy,
            sessions: BTreeMap::new(),
            users: HashMap::new(),
            awaiting: HashMap::new(),
            next_attempt: 1,
            completions_tx,
            completions_rx,
        }
    }

    pub(crate) fn set_authenticator(&mut self, authenticator: Arc<dyn Authenticator>) {
        self.authenticator = Some(authenticator);
    }

    pub(crate) fn policy(&self) -> AuthFailurePolicy {
        self.policy
    }

    pub(crate) fn set_policy(&mut self, policy: AuthFailurePolicy) {
        self.policy = policy;
    }

    pub(crate) fn connect(&mut self, peer: PeerId) {
        self.sessions.insert(peer, AuthState::Connected);
    }

    /// Forget a peer; returns the user it was bound to
    pub(crate) fn disconnect(&mut self, peer: PeerId) -> Option<UserId> {
        self.awaiting.remove(&peer);
        let user = self.sessions.remove(&peer)?.user()?;
        if self.users.get(&user) == Some(&peer) {
            self.users.remove(&user);
        }
        Some(user)
    }

    pub(crate) fn state(&self, peer: PeerId) -> Option<&AuthState> {
        self.sessions.get(&peer)
    }

    pub(crate) fn user_of(&self, peer: PeerId) -> Option<UserId> {
        self.sessions.get(&peer).and_then(AuthState::user)
    }

    pub(crate) fn peer_of(&self, user: UserId) -> Option<PeerId> {
        self.users.get(&user).copied()
    }

    pub(crate) fn users(&self) -> impl Iterator<Item = (UserId, PeerId)> + '_ {
        self.users.iter().map(|(user, peer)| (*user, *peer))
    }

    /// Record that we submitted credentials to `peer`
    pub(crate) fn expect_answer(&mut self, peer: PeerId) {
        *self.awaiting.entry(peer).or_insert(0) += 1;
    }

    pub(crate) fn awaits_answer(&self, peer: PeerId) -> bool {
        self.awaiting.contains_key(&peer)
    }

    /// `peer` answered one of our submissions, one way or another
    pub(crate) fn answered(&mut self, peer: PeerId) -> bool {
        match self.awaiting.get_mut(&peer) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                self.awaiting.remove(&peer);
                true
            }
            None => false,
        }
    }

    /// Start validating credentials submitted by `peer`.
    ///
    /// # Errors
    /// - `Message(NotSupportedMessage)` when no authenticator is installed
    /// - `Message(InvalidMessageContext)` while an attempt is in flight, once
    ///   authenticated, or after a rejection under `AuthFailurePolicy::Disconnect`
    pub(crate) fn submit(&mut self, peer: PeerId, credentials: Vec<u8>) -> Result<()> {
        let authenticator = self
            .authenticator
            .clone()
            .ok_or(ProtocolError::Message(ErrorType::NotSupportedMessage))?;
        let state = self
            .sessions
            .get_mut(&peer)
            .ok_or(ProtocolError::PeerNotFound(peer))?;

        match state {
            AuthState::Connected => {}
            AuthState::Rejected { .. } if self.policy == AuthFailurePolicy::KeepOpen => {}
            AuthState::Authenticating { .. }
            | AuthState::Authenticated { .. }
            | AuthState::Rejected { .. } => {
                return Err(ProtocolError::Message(ErrorType::InvalidMessageContext));
            }
        }

        let handle = Handle::try_current()
            .map_err(|_| ProtocolError::TransportError(constants::ERR_NO_RUNTIME.to_string()))?;

        let attempt = self.next_attempt;
        self.next_attempt += 1;
        *state = AuthState::Authenticating { attempt };

        let validation = authenticator.authenticate(AuthRequest { peer, credentials });
        let tx = self.completions_tx.clone();
        handle.spawn(async move {
            let outcome = validation.await;
            let _ = tx.send(Completion {
                peer,
                attempt,
                outcome,
            });
        });
        debug!(%peer, attempt, "Authentication started");
        Ok(())
    }

    /// Apply every outcome that arrived since the last call.
    pub(crate) fn drain(&mut self) -> Vec<Resolution> {
        let pending = self.completions_rx.len();
        let mut resolutions = Vec::new();
        for _ in 0..pending {
            let Ok(completion) = self.completions_rx.try_recv() else {
                break;
            };
            if let Some(resolution) = self.resolve(completion) {
                resolutions.push(resolution);
            }
        }
        resolutions
    }

    fn resolve(&mut self, completion: Completion) -> Option<Resolution> {
        let Completion {
            peer,
            attempt,
            outcome,
        } = completion;

        match self.sessions.get(&peer) {
            Some(AuthState::Authenticating { attempt: current }) if *current == attempt => {}
            _ => {
                debug!(%peer, attempt, "Discarding stale authentication outcome");
                return None;
            }
        }

        let (state, resolution) = match outcome {
            AuthOutcome::Accepted { user, info } => {
                let user = user.unwrap_or_else(UserId::random);
                match self.users.get(&user).copied() {
                    Some(other) if other != peer => {
                        warn!(%peer, %user, bound_to = %other, "User already connected");
                        let reason = constants::ERR_USER_ALREADY_CONNECTED.to_string();
                        (
                            AuthState::Rejected {
                                reason: reason.clone(),
                            },
                            Resolution::Rejected { peer, reason },
                        )
                    }
                    _ => {
                        self.users.insert(user, peer);
                        (
                            AuthState::Authenticated {
                                user,
                                info: info.clone(),
                            },
                            Resolution::Authenticated { peer, user, info },
                        )
                    }
                }
            }
            AuthOutcome::Rejected { reason } => (
                AuthState::Rejected {
                    reason: reason.clone(),
                },
                Resolution::Rejected { peer, reason },
            ),
        };
        self.sessions.insert(peer, state);
        Some(resolution)
    }
}
