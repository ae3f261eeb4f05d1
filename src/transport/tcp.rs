//! # TCP Transport
//!
//! tokio stream binding. Every connection runs two tasks:
//! - a reader pulling raw chunks through `FramedRead<_, BytesCodec>` and
//!   forwarding them untouched (reassembly is the connector's job)
//! - a writer fed by an unbounded channel, draining into
//!   `FramedWrite<_, BytesCodec>` in send order
//!
//! Inbound connections wait for their admission decision on their own task
//! before either of those starts.

use crate::config::ClientConfig;
use crate::core::identity::PeerId;
use crate::error::{constants, ProtocolError, Result};
use crate::transport::event::{DisconnectionReason, EventSink};
use crate::transport::{ListenOptions, PeerLink, Transport, TransportContext};
use crate::utils::metrics::global_metrics;
use crate::utils::timeout::{self, with_timeout_error};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::codec::{BytesCodec, FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// TCP binding for one connector.
#[derive(Debug)]
pub struct TcpTransport {
    connect_timeout: Duration,
    listener: Option<CancellationToken>,
    local_addr: Option<SocketAddr>,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self {
            connect_timeout: timeout::DEFAULT_TIMEOUT,
            listener: None,
            local_addr: None,
        }
    }
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &ClientConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout,
            listener: None,
            local_addr: None,
        }
    }

    /// Address the listener is bound to, once listening
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl Transport for TcpTransport {
    fn name(&self) -> &'static str {
        "tcp"
    }

    #[instrument(skip(self, options, ctx), fields(bind = %options.bind_address))]
    fn listen(&mut self, port: u16, options: &ListenOptions, ctx: TransportContext) -> Result<()> {
        if self.listener.is_some() {
            return Err(ProtocolError::TransportError(
                constants::ERR_ALREADY_LISTENING.to_string(),
            ));
        }
        let handle = Handle::try_current()
            .map_err(|_| ProtocolError::TransportError(constants::ERR_NO_RUNTIME.to_string()))?;
        let ip: IpAddr = options.bind_address.parse().map_err(|e| {
            ProtocolError::ConfigError(format!(
                "Invalid bind address '{}': {e}",
                options.bind_address
            ))
        })?;

        // Bind synchronously so "address in use" reaches the caller
        let std_listener = std::net::TcpListener::bind(SocketAddr::new(ip, port))?;
        std_listener.set_nonblocking(true)?;
        let listener = {
            let _guard = handle.enter();
            TcpListener::from_std(std_listener)?
        };
        let local_addr = listener.local_addr()?;

        let cancel = CancellationToken::new();
        handle.spawn(accept_loop(
            listener,
            ctx,
            options.admission_timeout,
            cancel.clone(),
        ));

        self.listener = Some(cancel);
        self.local_addr = Some(local_addr);
        info!(address = %local_addr, "TCP listener started");
        Ok(())
    }

    fn stop_listening(&mut self) {
        if let Some(cancel) = self.listener.take() {
            cancel.cancel();
            self.local_addr = None;
        }
    }

    fn connect(&mut self, peer: PeerId, address: &str, ctx: TransportContext) -> Result<()> {
        let handle = Handle::try_current()
            .map_err(|_| ProtocolError::TransportError(constants::ERR_NO_RUNTIME.to_string()))?;
        let address = address.to_string();
        let connect_timeout = self.connect_timeout;

        handle.spawn(async move {
            let connecting = async { TcpStream::connect(&address).await.map_err(ProtocolError::from) };
            match with_timeout_error(connecting, connect_timeout).await {
                Ok(stream) => {
                    let remote = stream
                        .peer_addr()
                        .map(|addr| addr.to_string())
                        .unwrap_or_else(|_| address.clone());
                    start_connection(stream, peer, remote, ctx.sink);
                }
                Err(e) => {
                    warn!(%peer, %address, error = %e, "TCP connect failed");
                    ctx.sink.connect_failed(peer, e.to_string());
                }
            }
        });
        Ok(())
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.stop_listening();
    }
}

async fn accept_loop(
    listener: TcpListener,
    ctx: TransportContext,
    admission_timeout: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("TCP listener stopped");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let pending = ctx.pending(addr.to_string());
                    let sink = ctx.sink.clone();
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        match pending.resolve(admission_timeout, &cancel).await {
                            Some(info) => start_connection(stream, info.peer, info.remote, sink),
                            None => {
                                global_metrics().connection_rejected();
                                debug!(remote = %addr, "Inbound connection rejected");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Error accepting connection");
                }
            }
        }
    }
}

fn start_connection(stream: TcpStream, peer: PeerId, remote: String, sink: EventSink) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(%peer, error = %e, "Failed to set TCP_NODELAY");
    }
    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let link = TcpLink {
        tx,
        cancel: cancel.clone(),
    };
    // Reported before the reader starts so no data precedes it
    if !sink.connected(peer, remote, Box::new(link)) {
        return;
    }

    tokio::spawn(write_loop(
        FramedWrite::new(write_half, BytesCodec::new()),
        rx,
        cancel.clone(),
    ));
    tokio::spawn(read_loop(
        FramedRead::new(read_half, BytesCodec::new()),
        peer,
        sink,
        cancel,
    ));
}

async fn read_loop(
    mut reader: FramedRead<OwnedReadHalf, BytesCodec>,
    peer: PeerId,
    sink: EventSink,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            chunk = reader.next() => match chunk {
                Some(Ok(bytes)) => {
                    if !sink.received(peer, bytes.freeze()) {
                        cancel.cancel();
                        return;
                    }
                }
                Some(Err(e)) => {
                    warn!(%peer, error = %e, "TCP read failed");
                    sink.disconnected(peer, DisconnectionReason::Error);
                    cancel.cancel();
                    return;
                }
                None => {
                    debug!(%peer, "TCP connection closed by remote");
                    sink.disconnected(peer, DisconnectionReason::Disconnected);
                    cancel.cancel();
                    return;
                }
            }
        }
    }
}

async fn write_loop(
    mut writer: FramedWrite<OwnedWriteHalf, BytesCodec>,
    mut rx: UnboundedReceiver<Bytes>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            frame = rx.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = writer.send(frame).await {
                        debug!(error = %e, "TCP write failed");
                        break;
                    }
                }
                None => break,
            },
            _ = cancel.cancelled() => {
                // Flush what was queued before the close
                while let Ok(frame) = rx.try_recv() {
                    if writer.send(frame).await.is_err() {
                        break;
                    }
                }
                break;
            }
        }
    }
    if let Err(e) = SinkExt::<Bytes>::close(&mut writer).await {
        debug!(error = %e, "TCP shutdown failed");
    }
}

struct TcpLink {
    tx: UnboundedSender<Bytes>,
    cancel: CancellationToken,
}

impl PeerLink for TcpLink {
    fn send(&mut self, frame: Bytes) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ProtocolError::ConnectionClosed);
        }
        self.tx
            .send(frame)
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    fn close(&mut self) {
        self.cancel.cancel();
    }
}

impl Drop for TcpLink {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
