//! # zenoh-duel
//!
//! Peer-to-peer pairing and state mirroring for two-player games, built on Zenoh.
//!
//! ## Overview
//!
//! Every node is equal: it advertises itself while idle, discovers other idle
//! nodes, and either connects to one (becoming the guest) or accepts an inbound
//! connection (becoming the host). Once paired, each side periodically pushes a
//! snapshot of its own game and keeps a read-only mirror of the opponent's.
//! There is no authority and no shared simulation.
//!
//! ## Key Features
//!
//! - Durable peer identity through a pluggable [`IdentityStore`]
//! - Presence and discovery through liveliness tokens
//! - At most one opponent, further connection attempts are rejected
//! - Throttled snapshot pushes, last snapshot wins on the receiving side
//! - Restart requests forwarded to the opponent
//!
//! ## Example
//!
//! ```rust,no_run
//! use zenoh_duel::{MemoryIdentityStore, SessionExt, StepResult, initialize_identity};
//!
//! #[derive(Default, serde::Serialize, serde::Deserialize)]
//! struct Snapshot {
//!     score: u32,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let peer_id = initialize_identity(&mut MemoryIdentityStore::new())?;
//!     let session = zenoh::open(zenoh::Config::default()).await?;
//!     let mut node = session
//!         .declare_duel_node::<Snapshot>()
//!         .peer_id(peer_id)
//!         .await?;
//!
//!     loop {
//!         match node.step().await? {
//!             StepResult::Stop => break,
//!             StepResult::OpponentUpdated => println!("opponent: {}", node.opponent().score),
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod directory;
pub mod error;
pub mod identity;
pub mod message;
pub mod mirror;
pub mod network;
pub mod node;
pub mod session;
pub mod session_ext;
pub mod stats;
pub mod types;

pub use config::{DuelConfig, DEFAULT_PREFIX};
pub use directory::{PeerDirectory, PresenceChange};
pub use error::{DuelError, Result};
pub use identity::{
    initialize_identity, FileIdentityStore, IdentityStore, MemoryIdentityStore, IDENTITY_KEY,
};
pub use message::{Decoded, PeerMessage};
pub use mirror::Mirror;
pub use node::{DuelNode, NodeCommand, NodeEvent, StepResult};
pub use session::{InboundDecision, PeerSession, SessionEvent};
pub use session_ext::{DuelNodeBuilder, SessionExt};
pub use stats::LinkStats;
pub use types::{LinkState, PeerId, PeerStatus, Role};
