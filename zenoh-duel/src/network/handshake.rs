//! Connection handshake over query/queryable
//!
//! Each node declares one queryable on `<prefix>/handshake/*/<own_id>`.
//! A guest asks to connect by querying `<prefix>/handshake/<guest_id>/<host_id>`:
//!
//! - an ok reply is the open acknowledgement, the link is established
//! - an error reply is a rejection (the host already has an opponent)
//! - no reply before the timeout means the host is gone or unreachable

use std::time::Duration;

use crate::error::{DuelError, Result};
use crate::network::keyexpr::{KeyexprLink, LinkType};
use crate::types::PeerId;
use zenoh::handlers::FifoChannelHandler;
use zenoh::key_expr::KeyExpr;
use zenoh::query::{Query, Queryable};

/// Reason sent back when an inbound request is refused
pub const REJECT_BUSY: &str = "busy";

/// Connection request from a guest, to be accepted or rejected
#[derive(Debug)]
pub struct InboundRequest {
    query: Query,
    remote_id: PeerId,
}

impl InboundRequest {
    /// Requesting peer
    pub fn remote_id(&self) -> &PeerId {
        &self.remote_id
    }

    /// Acknowledge the connection with an empty ok reply
    pub async fn accept(self) -> Result<PeerId> {
        let keyexpr = self.query.key_expr().clone();
        self.query.reply(keyexpr, "").await?;
        Ok(self.remote_id)
    }

    /// Refuse the connection with an error reply carrying `reason`
    pub async fn reject(self, reason: &str) -> Result<()> {
        self.query.reply_err(reason).await?;
        Ok(())
    }
}

/// Queryable receiving connection requests addressed to this node
pub struct HandshakeQueryable {
    queryable: Queryable<FifoChannelHandler<Query>>,
    node_id: PeerId,
}

impl std::fmt::Debug for HandshakeQueryable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeQueryable")
            .field("key_expr", self.queryable.key_expr())
            .field("node_id", &self.node_id)
            .finish()
    }
}

impl HandshakeQueryable {
    /// Declare the queryable on `<prefix>/handshake/*/<node_id>`
    pub async fn declare(
        session: &zenoh::Session,
        prefix: impl Into<KeyExpr<'static>>,
        node_id: &PeerId,
    ) -> Result<Self> {
        let keyexpr: KeyExpr =
            KeyexprLink::new(prefix, LinkType::Handshake, None, Some(node_id.clone())).into();
        let queryable = session.declare_queryable(&keyexpr).await?;

        Ok(Self {
            queryable,
            node_id: node_id.clone(),
        })
    }

    /// Wait for the next well-formed connection request
    ///
    /// Queries with a wildcard requester or addressed to another node are
    /// answered with an error and skipped.
    pub async fn expect_request(&self) -> Result<InboundRequest> {
        loop {
            let query = self.queryable.recv_async().await.map_err(|_| {
                DuelError::Internal("Handshake queryable channel closed".to_string())
            })?;

            let parsed = match KeyexprLink::try_from(query.key_expr().clone()) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::debug!("Ignoring handshake query: {}", e);
                    continue;
                }
            };

            match (parsed.node_src(), parsed.node_dst()) {
                (Some(remote_id), Some(dst)) if dst == &self.node_id => {
                    let remote_id = remote_id.clone();
                    return Ok(InboundRequest { query, remote_id });
                }
                _ => {
                    tracing::debug!(
                        "Node '{}' got malformed handshake query: {}",
                        self.node_id,
                        query.key_expr()
                    );
                    if let Err(e) = query.reply_err("malformed request").await {
                        tracing::debug!("Failed to answer malformed query: {}", e);
                    }
                }
            }
        }
    }
}

/// Outbound side of the handshake
#[derive(Debug)]
pub struct HandshakeQuerier;

impl HandshakeQuerier {
    /// Ask `remote_id` to open a link with `local_id`
    ///
    /// Returns `Ok(())` on acknowledgement, `ConnectionRejected` on refusal
    /// and `Timeout` if nobody answered.
    pub async fn connect(
        session: zenoh::Session,
        prefix: KeyExpr<'static>,
        local_id: PeerId,
        remote_id: PeerId,
        timeout: Duration,
    ) -> Result<()> {
        let keyexpr: KeyExpr = KeyexprLink::new(
            prefix,
            LinkType::Handshake,
            Some(local_id.clone()),
            Some(remote_id.clone()),
        )
        .into();

        tracing::debug!("Node '{}' requesting connection to '{}'", local_id, remote_id);
        let replies = session.get(&keyexpr).timeout(timeout).await?;

        match replies.recv_async().await {
            Ok(reply) => match reply.result() {
                Ok(_sample) => {
                    tracing::info!("Node '{}' accepted by '{}'", local_id, remote_id);
                    Ok(())
                }
                Err(err) => {
                    let reason = err
                        .payload()
                        .try_to_string()
                        .map(|reason| reason.into_owned())
                        .unwrap_or_else(|_| "unknown reason".to_string());
                    Err(DuelError::ConnectionRejected(format!(
                        "'{}' refused: {}",
                        remote_id, reason
                    )))
                }
            },
            Err(_) => Err(DuelError::Timeout(format!(
                "no answer from '{}' within {:?}",
                remote_id, timeout
            ))),
        }
    }
}
