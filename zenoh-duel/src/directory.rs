//! Directory of peers currently advertising themselves as available

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::types::PeerId;

/// Change to the directory, published to in-process subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceChange {
    Available(PeerId),
    Gone(PeerId),
}

/// Discovered peers with the time they were last seen
///
/// The local identity is never listed. Entries that are not refreshed within
/// the stale timeout are dropped by [`PeerDirectory::cleanup`].
#[derive(Debug, Clone)]
pub struct PeerDirectory {
    local_id: PeerId,
    peers: HashMap<PeerId, Instant>,
    stale_timeout: Duration,
}

impl PeerDirectory {
    pub fn new(local_id: PeerId, stale_timeout: Duration) -> Self {
        Self {
            local_id,
            peers: HashMap::new(),
            stale_timeout,
        }
    }

    /// Record a presence signal; returns true if the peer is new
    pub fn on_available(&mut self, peer_id: PeerId, now: Instant) -> bool {
        if peer_id == self.local_id {
            return false;
        }
        let is_new = self.peers.insert(peer_id.clone(), now).is_none();
        if is_new {
            tracing::info!("Discovered peer '{}'", peer_id);
        }
        is_new
    }

    /// Forget a peer that withdrew its presence; returns true if it was listed
    pub fn on_gone(&mut self, peer_id: &PeerId) -> bool {
        self.peers.remove(peer_id).is_some()
    }

    /// Apply a change, returning whether the listing changed
    pub fn apply(&mut self, change: PresenceChange, now: Instant) -> bool {
        match change {
            PresenceChange::Available(peer_id) => self.on_available(peer_id, now),
            PresenceChange::Gone(peer_id) => self.on_gone(&peer_id),
        }
    }

    /// Drop peers not seen within the stale timeout, returning them
    pub fn cleanup(&mut self, now: Instant) -> Vec<PeerId> {
        let stale: Vec<PeerId> = self
            .peers
            .iter()
            .filter(|(_, last_seen)| now.saturating_duration_since(**last_seen) > self.stale_timeout)
            .map(|(peer_id, _)| peer_id.clone())
            .collect();
        for peer_id in &stale {
            tracing::info!("Removing inactive peer '{}'", peer_id);
            self.peers.remove(peer_id);
        }
        stale
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.peers.contains_key(peer_id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Peers sorted by id, with the time since they were last seen
    pub fn list(&self, now: Instant) -> Vec<(PeerId, Duration)> {
        let mut peers: Vec<(PeerId, Duration)> = self
            .peers
            .iter()
            .map(|(peer_id, last_seen)| (peer_id.clone(), now.saturating_duration_since(*last_seen)))
            .collect();
        peers.sort_by(|a, b| a.0.cmp(&b.0));
        peers
    }

    /// Peer ids sorted, for selection by index
    pub fn peer_ids(&self) -> Vec<PeerId> {
        let mut ids: Vec<PeerId> = self.peers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// One-line summary for a status bar
    pub fn status_line(&self) -> String {
        if self.peers.is_empty() {
            "Searching... no peers available".to_string()
        } else {
            format!("{} peer(s) available", self.peers.len())
        }
    }
}
