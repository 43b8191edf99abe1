//! Configuration for a DuelNode

use std::time::Duration;

use zenoh::key_expr::KeyExpr;

use crate::types::PeerId;

/// Default key expression prefix for all duel operations
pub const DEFAULT_PREFIX: &str = "zenoh/duel/tetris";

/// Main configuration for a DuelNode
#[derive(Debug, Clone)]
pub struct DuelConfig {
    /// Local peer identifier
    pub peer_id: PeerId,

    /// Timeout for step() method in milliseconds
    /// step() returns when either an event was handled or this timeout elapses
    pub step_timeout_ms: u64,

    /// Minimum wall-clock time between two snapshot pushes
    pub push_interval: Duration,

    /// How long to wait for the remote to answer a connection request
    pub handshake_timeout: Duration,

    /// Period of the presence refresh (re-reads the list of available peers)
    pub presence_refresh: Duration,

    /// Discovered peers not seen for this long are dropped from the directory
    pub stale_peer_timeout: Duration,

    /// Key expression prefix for all duel operations
    pub keyexpr_prefix: KeyExpr<'static>,
}

impl Default for DuelConfig {
    fn default() -> Self {
        Self {
            peer_id: PeerId::generate(),
            step_timeout_ms: 1000,
            push_interval: Duration::from_millis(100),
            handshake_timeout: Duration::from_secs(5),
            presence_refresh: Duration::from_secs(2),
            stale_peer_timeout: Duration::from_secs(120),
            keyexpr_prefix: KeyExpr::try_from(DEFAULT_PREFIX).unwrap().into_owned(),
        }
    }
}
