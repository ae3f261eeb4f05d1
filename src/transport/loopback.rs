//! # Loopback Transport
//!
//! Same-process binding. Connectors sharing a [`LoopbackNetwork`] reach each
//! other by port, with no sockets involved, which makes it the binding of
//! choice for tests and local play.
//!
//! Each connection is a shared pipe with two ends. The connecting side is
//! reported `Connected` right away and may start sending at once; its frames
//! are held in the pipe until the listener's admission decision. Admission
//! flushes them to the listener in order, rejection drops them and reports
//! `Denied` back to the connecting side.

use crate::core::identity::PeerId;
use crate::error::{constants, ProtocolError, Result};
use crate::transport::event::{DisconnectionReason, EventSink};
use crate::transport::{ListenOptions, PeerLink, Transport, TransportContext};
use crate::utils::metrics::global_metrics;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Address prefix accepted by `connect`
pub const LOOPBACK_SCHEME: &str = "loopback";

struct Listener {
    ctx: TransportContext,
    admission_timeout: Duration,
    cancel: CancellationToken,
}

/// Registry of listening loopback connectors, keyed by port.
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    listeners: Arc<Mutex<HashMap<u16, Listener>>>,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<u16, Listener>>> {
        self.listeners
            .lock()
            .map_err(|_| ProtocolError::TransportError(constants::ERR_LOCK_POISONED.to_string()))
    }

    /// Ports currently listening
    pub fn ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self
            .lock()
            .map(|listeners| listeners.keys().copied().collect())
            .unwrap_or_default();
        ports.sort_unstable();
        ports
    }
}

/// Loopback binding for one connector.
pub struct LoopbackTransport {
    network: LoopbackNetwork,
    port: Option<u16>,
}

impl LoopbackTransport {
    pub fn new(network: &LoopbackNetwork) -> Self {
        Self {
            network: network.clone(),
            port: None,
        }
    }
}

/// Parse `"loopback:7777"`, `"host:7777"` or `"7777"`.
pub fn parse_port(address: &str) -> Option<u16> {
    let port = address
        .strip_prefix(LOOPBACK_SCHEME)
        .and_then(|rest| rest.strip_prefix(':'))
        .or_else(|| address.rsplit_once(':').map(|(_, port)| port))
        .unwrap_or(address);
    port.parse::<u16>().ok().filter(|port| *port != 0)
}

impl Transport for LoopbackTransport {
    fn name(&self) -> &'static str {
        "loopback"
    }

    fn listen(&mut self, port: u16, options: &ListenOptions, ctx: TransportContext) -> Result<()> {
        if self.port.is_some() {
            return Err(ProtocolError::TransportError(
                constants::ERR_ALREADY_LISTENING.to_string(),
            ));
        }

        let mut listeners = self.network.lock()?;
        if listeners.contains_key(&port) {
            return Err(ProtocolError::TransportError(format!(
                "{}: {port}",
                constants::ERR_PORT_IN_USE
            )));
        }
        listeners.insert(
            port,
            Listener {
                ctx,
                admission_timeout: options.admission_timeout,
                cancel: CancellationToken::new(),
            },
        );
        self.port = Some(port);
        info!(port, "Loopback listener registered");
        Ok(())
    }

    fn stop_listening(&mut self) {
        let Some(port) = self.port.take() else {
            return;
        };
        match self.network.lock() {
            Ok(mut listeners) => {
                if let Some(listener) = listeners.remove(&port) {
                    listener.cancel.cancel();
                }
            }
            Err(e) => warn!(port, error = %e, "Failed to unregister loopback listener"),
        }
    }

    fn connect(&mut self, peer: PeerId, address: &str, ctx: TransportContext) -> Result<()> {
        let port = parse_port(address).ok_or_else(|| {
            ProtocolError::TransportError(format!("Invalid loopback address: {address}"))
        })?;
        let handle = Handle::try_current()
            .map_err(|_| ProtocolError::TransportError(constants::ERR_NO_RUNTIME.to_string()))?;

        let listeners = self.network.lock()?;
        let Some(listener) = listeners.get(&port) else {
            debug!(%peer, port, "No loopback listener");
            ctx.sink.connect_failed(peer, constants::ERR_CONNECTION_REFUSED);
            return Ok(());
        };

        let pending = listener.ctx.pending(format!("{LOOPBACK_SCHEME}:{}", ctx.connector.get()));
        let client = Endpoint {
            peer,
            sink: ctx.sink.clone(),
        };
        let server = Endpoint {
            peer: pending.info().peer,
            sink: listener.ctx.sink.clone(),
        };
        let pipe = Arc::new(Mutex::new(PipeState::Pending(Vec::new())));

        let client_link = LoopbackLink {
            pipe: pipe.clone(),
            remote: server.clone(),
        };
        ctx.sink.connected(
            peer,
            format!("{LOOPBACK_SCHEME}:{port}"),
            Box::new(client_link),
        );

        let timeout = listener.admission_timeout;
        let cancel = listener.cancel.clone();
        drop(listeners);

        handle.spawn(async move {
            let admitted = pending.resolve(timeout, &cancel).await;
            let Ok(mut state) = pipe.lock() else {
                return;
            };
            if matches!(*state, PipeState::Closed) {
                return;
            }

            match admitted {
                Some(info) => {
                    let buffered = match std::mem::replace(&mut *state, PipeState::Open) {
                        PipeState::Pending(frames) => frames,
                        _ => Vec::new(),
                    };
                    let link = LoopbackLink {
                        pipe: pipe.clone(),
                        remote: client.clone(),
                    };
                    if server.sink.connected(info.peer, info.remote, Box::new(link)) {
                        for frame in buffered {
                            server.sink.received(server.peer, frame);
                        }
                    } else {
                        *state = PipeState::Closed;
                        client.sink.disconnected(client.peer, DisconnectionReason::Disconnected);
                    }
                }
                None => {
                    *state = PipeState::Closed;
                    global_metrics().connection_rejected();
                    debug!(peer = %client.peer, "Loopback connection denied");
                    client.sink.disconnected(client.peer, DisconnectionReason::Denied);
                }
            }
        });
        Ok(())
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        self.stop_listening();
    }
}

#[derive(Clone)]
struct Endpoint {
    peer: PeerId,
    sink: EventSink,
}

enum PipeState {
    /// Waiting for admission; holds what the connecting side already sent
    Pending(Vec<Bytes>),
    Open,
    Closed,
}

struct LoopbackLink {
    pipe: Arc<Mutex<PipeState>>,
    remote: Endpoint,
}

impl PeerLink for LoopbackLink {
    fn send(&mut self, frame: Bytes) -> Result<()> {
        let mut state = self
            .pipe
            .lock()
            .map_err(|_| ProtocolError::TransportError(constants::ERR_LOCK_POISONED.to_string()))?;
        match &mut *state {
            PipeState::Pending(frames) => {
                frames.push(frame);
                Ok(())
            }
            PipeState::Open => {
                // Delivered under the lock so frames keep their order
                self.remote.sink.received(self.remote.peer, frame);
                Ok(())
            }
            PipeState::Closed => Err(ProtocolError::ConnectionClosed),
        }
    }

    fn close(&mut self) {
        let Ok(mut state) = self.pipe.lock() else {
            return;
        };
        let was_open = matches!(*state, PipeState::Open);
        *state = PipeState::Closed;
        if was_open {
            self.remote
                .sink
                .disconnected(self.remote.peer, DisconnectionReason::Disconnected);
        }
    }
}
