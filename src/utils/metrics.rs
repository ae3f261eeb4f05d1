//! Process-wide counters for connections, traffic, authentication and
//! keepalive.
//!
//! Transport tasks and the consumer thread record concurrently, so every
//! counter is a relaxed atomic. Nothing in the stack reads them back; they
//! exist for export through [`Metrics::snapshot`] or [`Metrics::log_metrics`].

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

macro_rules! counters {
    ($($(#[$doc:meta])* $name:ident),* $(,)?) => {
        #[derive(Debug, Default)]
        struct Counters {
            $($name: AtomicU64,)*
        }

        /// Point-in-time copy of every counter
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
        pub struct MetricsSnapshot {
            $($(#[$doc])* pub $name: u64,)*
            pub uptime_seconds: u64,
        }

        impl Counters {
            fn read(&self, uptime_seconds: u64) -> MetricsSnapshot {
                MetricsSnapshot {
                    $($name: self.$name.load(Ordering::Relaxed),)*
                    uptime_seconds,
                }
            }
        }
    };
}

counters! {
    /// Peers that reached the connected state
    connections_total,
    /// Peers currently connected
    connections_active,
    /// Inbound connections refused at admission
    connections_rejected,
    messages_sent,
    messages_received,
    /// Framing included
    bytes_sent,
    /// Framing included
    bytes_received,
    /// Peers dropped for announcing a frame above the cap
    frames_oversized,
    auth_attempts,
    auth_success,
    auth_failed,
    pings_sent,
    /// Pongs that matched an outstanding ping
    pongs_matched,
    /// Messages surfaced with an error type
    protocol_errors,
}

#[derive(Debug)]
pub struct Metrics {
    counters: Counters,
    started: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            counters: Counters::default(),
            started: Instant::now(),
        }
    }

    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    pub fn connection_established(&self) {
        Self::bump(&self.counters.connections_total, 1);
        Self::bump(&self.counters.connections_active, 1);
    }

    /// Never takes the active count below zero
    pub fn connection_closed(&self) {
        let _ = self.counters.connections_active.fetch_update(
            Ordering::Relaxed,
            Ordering::Relaxed,
            |active| active.checked_sub(1),
        );
    }

    pub fn connection_rejected(&self) {
        Self::bump(&self.counters.connections_rejected, 1);
    }

    /// One framed message handed to a link
    pub fn message_sent(&self, byte_count: u64) {
        Self::bump(&self.counters.messages_sent, 1);
        Self::bump(&self.counters.bytes_sent, byte_count);
    }

    /// One raw delivery, before reassembly
    pub fn bytes_received(&self, byte_count: u64) {
        Self::bump(&self.counters.bytes_received, byte_count);
    }

    pub fn message_received(&self) {
        Self::bump(&self.counters.messages_received, 1);
    }

    pub fn frame_oversized(&self) {
        Self::bump(&self.counters.frames_oversized, 1);
    }

    pub fn auth_attempt(&self) {
        Self::bump(&self.counters.auth_attempts, 1);
    }

    pub fn auth_success(&self) {
        Self::bump(&self.counters.auth_success, 1);
    }

    pub fn auth_failed(&self) {
        Self::bump(&self.counters.auth_failed, 1);
    }

    pub fn ping_sent(&self) {
        Self::bump(&self.counters.pings_sent, 1);
    }

    pub fn pong_matched(&self) {
        Self::bump(&self.counters.pongs_matched, 1);
    }

    pub fn protocol_error(&self) {
        Self::bump(&self.counters.protocol_errors, 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.counters.read(self.started.elapsed().as_secs())
    }

    /// Emit the current snapshot as one structured `info` event
    pub fn log_metrics(&self) {
        let s = self.snapshot();
        info!(
            connections_total = s.connections_total,
            connections_active = s.connections_active,
            connections_rejected = s.connections_rejected,
            messages_sent = s.messages_sent,
            messages_received = s.messages_received,
            bytes_sent = s.bytes_sent,
            bytes_received = s.bytes_received,
            frames_oversized = s.frames_oversized,
            auth_attempts = s.auth_attempts,
            auth_success = s.auth_success,
            auth_failed = s.auth_failed,
            pings_sent = s.pings_sent,
            pongs_matched = s.pongs_matched,
            protocol_errors = s.protocol_errors,
            uptime_seconds = s.uptime_seconds,
            "netsync metrics"
        );
    }
}

static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

pub fn global_metrics() -> &'static Metrics {
    &METRICS
}
