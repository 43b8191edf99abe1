//! Network layer for zenoh-duel

pub mod handshake;
pub mod keyexpr;
pub mod link;
pub mod liveliness;

pub use handshake::{HandshakeQuerier, HandshakeQueryable, InboundRequest, REJECT_BUSY};
pub use keyexpr::{KeyexprLink, KeyexprNode, LinkType, NodeType};
pub use link::PeerLink;
pub use liveliness::{NodeLivelinessToken, PresenceWatch, RemoteChange, RemoteWatch};
