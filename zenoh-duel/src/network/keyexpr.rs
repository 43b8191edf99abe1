//! Key expression types for presence, handshake and data link
//!
//! All key expressions live under a common prefix:
//!
//! - `<prefix>/node/<peer_id>` - liveliness token held for the node lifetime
//! - `<prefix>/available/<peer_id>` - liveliness token held while open to matches
//! - `<prefix>/handshake/<src>/<dst>` - connection request from `src` to `dst`
//! - `<prefix>/link/<src>/<dst>` - messages published by `src` for `dst`
//!
//! A `None` id stands for the `*` wildcard.

use crate::error::DuelError;
use crate::types::PeerId;
use zenoh::key_expr::KeyExpr;

const WILDCARD: &str = "*";

/// Kind of per-node liveliness token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// Identity of a running node
    Node,
    /// Node is idle and accepts connection requests
    Available,
}

impl NodeType {
    fn as_str(&self) -> &'static str {
        match self {
            NodeType::Node => "node",
            NodeType::Available => "available",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "node" => Some(NodeType::Node),
            "available" => Some(NodeType::Available),
            _ => None,
        }
    }
}

/// Kind of pairwise key expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    /// Connection request and its answer
    Handshake,
    /// Game messages over an established connection
    Link,
}

impl LinkType {
    fn as_str(&self) -> &'static str {
        match self {
            LinkType::Handshake => "handshake",
            LinkType::Link => "link",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "handshake" => Some(LinkType::Handshake),
            "link" => Some(LinkType::Link),
            _ => None,
        }
    }
}

fn id_chunk(id: &Option<PeerId>) -> &str {
    id.as_ref().map(|id| id.as_str()).unwrap_or(WILDCARD)
}

fn parse_id(chunk: &str) -> Result<Option<PeerId>, DuelError> {
    if chunk == WILDCARD {
        Ok(None)
    } else {
        PeerId::from_name(chunk.to_string()).map(Some)
    }
}

/// Per-node keyexpr: `<prefix>/<node|available>/<peer_id|*>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyexprNode {
    prefix: KeyExpr<'static>,
    node_type: NodeType,
    peer_id: Option<PeerId>,
}

impl KeyexprNode {
    pub fn new(
        prefix: impl Into<KeyExpr<'static>>,
        node_type: NodeType,
        peer_id: Option<PeerId>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            node_type,
            peer_id,
        }
    }

    pub fn prefix(&self) -> &KeyExpr<'static> {
        &self.prefix
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn peer_id(&self) -> &Option<PeerId> {
        &self.peer_id
    }
}

impl TryFrom<KeyExpr<'_>> for KeyexprNode {
    type Error = DuelError;

    fn try_from(keyexpr: KeyExpr<'_>) -> Result<Self, Self::Error> {
        let parts: Vec<&str> = keyexpr.as_str().split('/').collect();

        // [...prefix]/<node_type>/<peer_id>
        if parts.len() < 3 {
            return Err(DuelError::InvalidKeyexpr(format!(
                "Too few chunks for node keyexpr: {}",
                keyexpr.as_str()
            )));
        }
        let node_type = NodeType::parse(parts[parts.len() - 2]).ok_or_else(|| {
            DuelError::InvalidKeyexpr(format!("Unknown node type in: {}", keyexpr.as_str()))
        })?;
        let peer_id = parse_id(parts[parts.len() - 1])?;
        let prefix = KeyExpr::try_from(parts[..parts.len() - 2].join("/"))
            .map_err(|e| DuelError::InvalidKeyexpr(e.to_string()))?;

        Ok(Self {
            prefix,
            node_type,
            peer_id,
        })
    }
}

impl From<KeyexprNode> for KeyExpr<'static> {
    fn from(node: KeyexprNode) -> Self {
        let keyexpr = format!(
            "{}/{}/{}",
            node.prefix,
            node.node_type.as_str(),
            id_chunk(&node.peer_id)
        );
        // Prefix is a keyexpr and peer ids are validated single chunks
        KeyExpr::try_from(keyexpr).unwrap().into_owned()
    }
}

/// Pairwise keyexpr: `<prefix>/<handshake|link>/<node_src|*>/<node_dst|*>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyexprLink {
    prefix: KeyExpr<'static>,
    link_type: LinkType,
    node_src: Option<PeerId>,
    node_dst: Option<PeerId>,
}

impl KeyexprLink {
    pub fn new(
        prefix: impl Into<KeyExpr<'static>>,
        link_type: LinkType,
        node_src: Option<PeerId>,
        node_dst: Option<PeerId>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            link_type,
            node_src,
            node_dst,
        }
    }

    pub fn prefix(&self) -> &KeyExpr<'static> {
        &self.prefix
    }

    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    /// Requesting (or sending) side
    pub fn node_src(&self) -> &Option<PeerId> {
        &self.node_src
    }

    /// Answering (or receiving) side
    pub fn node_dst(&self) -> &Option<PeerId> {
        &self.node_dst
    }
}

impl TryFrom<KeyExpr<'_>> for KeyexprLink {
    type Error = DuelError;

    fn try_from(keyexpr: KeyExpr<'_>) -> Result<Self, Self::Error> {
        let parts: Vec<&str> = keyexpr.as_str().split('/').collect();

        // [...prefix]/<link_type>/<node_src>/<node_dst>
        if parts.len() < 4 {
            return Err(DuelError::InvalidKeyexpr(format!(
                "Too few chunks for link keyexpr: {}",
                keyexpr.as_str()
            )));
        }
        let link_type = LinkType::parse(parts[parts.len() - 3]).ok_or_else(|| {
            DuelError::InvalidKeyexpr(format!("Unknown link type in: {}", keyexpr.as_str()))
        })?;
        let node_src = parse_id(parts[parts.len() - 2])?;
        let node_dst = parse_id(parts[parts.len() - 1])?;
        let prefix = KeyExpr::try_from(parts[..parts.len() - 3].join("/"))
            .map_err(|e| DuelError::InvalidKeyexpr(e.to_string()))?;

        Ok(Self {
            prefix,
            link_type,
            node_src,
            node_dst,
        })
    }
}

impl From<KeyexprLink> for KeyExpr<'static> {
    fn from(link: KeyexprLink) -> Self {
        let keyexpr = format!(
            "{}/{}/{}/{}",
            link.prefix,
            link.link_type.as_str(),
            id_chunk(&link.node_src),
            id_chunk(&link.node_dst)
        );
        KeyExpr::try_from(keyexpr).unwrap().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix() -> KeyExpr<'static> {
        KeyExpr::try_from("zenoh/duel/tetris").unwrap()
    }

    fn id(name: &str) -> PeerId {
        PeerId::from_name(name.to_string()).unwrap()
    }

    #[test]
    fn test_node_keyexpr_format() {
        let ke: KeyExpr = KeyexprNode::new(prefix(), NodeType::Node, Some(id("alice"))).into();
        assert_eq!(ke.as_str(), "zenoh/duel/tetris/node/alice");

        let ke: KeyExpr = KeyexprNode::new(prefix(), NodeType::Available, None).into();
        assert_eq!(ke.as_str(), "zenoh/duel/tetris/available/*");
    }

    #[test]
    fn test_node_keyexpr_parse() {
        let ke = KeyExpr::try_from("zenoh/duel/tetris/available/bob").unwrap();
        let parsed = KeyexprNode::try_from(ke).unwrap();
        assert_eq!(parsed.node_type(), NodeType::Available);
        assert_eq!(parsed.peer_id(), &Some(id("bob")));
        assert_eq!(parsed.prefix().as_str(), "zenoh/duel/tetris");

        let ke = KeyExpr::try_from("zenoh/duel/tetris/player/bob").unwrap();
        assert!(KeyexprNode::try_from(ke).is_err());
    }

    #[test]
    fn test_link_keyexpr_format_and_parse() {
        let ke: KeyExpr =
            KeyexprLink::new(prefix(), LinkType::Handshake, None, Some(id("host"))).into();
        assert_eq!(ke.as_str(), "zenoh/duel/tetris/handshake/*/host");

        let ke: KeyExpr = KeyexprLink::new(
            prefix(),
            LinkType::Link,
            Some(id("alice")),
            Some(id("bob")),
        )
        .into();
        assert_eq!(ke.as_str(), "zenoh/duel/tetris/link/alice/bob");

        let parsed = KeyexprLink::try_from(ke).unwrap();
        assert_eq!(parsed.link_type(), LinkType::Link);
        assert_eq!(parsed.node_src(), &Some(id("alice")));
        assert_eq!(parsed.node_dst(), &Some(id("bob")));
    }

    #[test]
    fn test_link_keyexpr_rejects_wrong_kind() {
        let ke = KeyExpr::try_from("zenoh/duel/tetris/node/alice").unwrap();
        assert!(KeyexprLink::try_from(ke).is_err());
    }
}
