//! Ping/pong bookkeeping.
//!
//! Pings are correlated with their pongs by `(peer, key)` only, never by
//! arrival order, so any number may be outstanding. No timeout is enforced
//! here; [`PingTracker::expired`] lets the application apply its own.

use crate::core::identity::PeerId;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct PingTracker {
    next_key: u64,
    outstanding: BTreeMap<(PeerId, u64), Instant>,
}

impl Default for PingTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PingTracker {
    pub fn new() -> Self {
        Self {
            next_key: 1,
            outstanding: BTreeMap::new(),
        }
    }

    /// Next key from the monotonic sequence
    pub fn next_key(&mut self) -> u64 {
        let key = self.next_key;
        self.next_key = self.next_key.wrapping_add(1);
        key
    }

    /// Start timing a ping. Re-using a key restarts its clock.
    pub fn record(&mut self, peer: PeerId, key: u64) {
        self.outstanding.insert((peer, key), Instant::now());
    }

    /// Match a pong; returns the round trip if the key was outstanding
    pub fn complete(&mut self, peer: PeerId, key: u64) -> Option<Duration> {
        self.outstanding
            .remove(&(peer, key))
            .map(|sent| sent.elapsed())
    }

    /// Unanswered pings of `peer` with their age, by key
    pub fn outstanding(&self, peer: PeerId) -> Vec<(u64, Duration)> {
        self.outstanding
            .range((peer, u64::MIN)..=(peer, u64::MAX))
            .map(|((_, key), sent)| (*key, sent.elapsed()))
            .collect()
    }

    /// Unanswered pings older than `max_age`
    pub fn expired(&self, max_age: Duration) -> Vec<(PeerId, u64)> {
        self.outstanding
            .iter()
            .filter(|(_, sent)| sent.elapsed() > max_age)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Drop everything outstanding for a departed peer
    pub fn forget(&mut self, peer: PeerId) {
        self.outstanding.retain(|(p, _), _| *p != peer);
    }

    pub fn len(&self) -> usize {
        self.outstanding.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outstanding.is_empty()
    }
}
