//! Liveliness tokens and watches
//!
//! Two tokens are declared per node: the identity token (`node`) for the whole
//! node lifetime, and the presence token (`available`) only while the node is
//! idle. Watching `available/*` gives the directory of connectable peers;
//! watching `*/<remote>` tells when the current opponent goes away.

use std::future::Future;
use std::time::Duration;

use crate::directory::PresenceChange;
use crate::error::{DuelError, Result};
use crate::network::keyexpr::{KeyexprNode, NodeType};
use crate::types::PeerId;
use zenoh::handlers::FifoChannelHandler;
use zenoh::key_expr::KeyExpr;
use zenoh::liveliness::LivelinessToken;
use zenoh::pubsub::Subscriber;
use zenoh::sample::{Sample, SampleKind};

/// Liveliness token of a node, undeclared when dropped
#[derive(Debug)]
pub struct NodeLivelinessToken {
    _token: LivelinessToken,
    keyexpr: KeyExpr<'static>,
}

impl NodeLivelinessToken {
    pub async fn declare(session: &zenoh::Session, keyexpr: KeyexprNode) -> Result<Self> {
        let keyexpr: KeyExpr<'static> = keyexpr.into();
        let token = session.liveliness().declare_token(&keyexpr).await?;
        tracing::debug!("Declared liveliness token '{}'", keyexpr);
        Ok(Self {
            _token: token,
            keyexpr,
        })
    }

    pub fn keyexpr(&self) -> &KeyExpr<'static> {
        &self.keyexpr
    }
}

/// What happened to the watched remote peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteChange {
    /// Identity token vanished: the remote process closed or lost the network
    Left(PeerId),
    /// The remote advertises itself as available again, so it no longer
    /// considers the link open
    Available(PeerId),
}

/// Watches liveliness tokens of the current opponent on `<prefix>/*/<remote>`
pub struct RemoteWatch {
    subscriber: Subscriber<FifoChannelHandler<Sample>>,
    remote_id: PeerId,
}

impl std::fmt::Debug for RemoteWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteWatch")
            .field("key_expr", self.subscriber.key_expr())
            .field("remote_id", &self.remote_id)
            .finish()
    }
}

impl RemoteWatch {
    pub async fn subscribe(
        session: &zenoh::Session,
        prefix: impl Into<KeyExpr<'static>>,
        remote_id: &PeerId,
    ) -> Result<Self> {
        let prefix = prefix.into();
        let keyexpr = KeyExpr::try_from(format!("{}/*/{}", prefix, remote_id))
            .map_err(|e| DuelError::InvalidKeyexpr(e.to_string()))?;
        let subscriber = session
            .liveliness()
            .declare_subscriber(&keyexpr)
            .await?;
        Ok(Self {
            subscriber,
            remote_id: remote_id.clone(),
        })
    }

    pub fn remote_id(&self) -> &PeerId {
        &self.remote_id
    }

    /// Wait for the next change that ends the link
    ///
    /// Withdrawal of the presence token is expected while connected and is
    /// skipped.
    pub async fn changed(&self) -> Result<RemoteChange> {
        loop {
            let sample = self.subscriber.recv_async().await.map_err(|_| {
                DuelError::Internal("Liveliness watch channel closed".to_string())
            })?;
            let parsed = match KeyexprNode::try_from(sample.key_expr().clone()) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::debug!("Ignoring liveliness sample: {}", e);
                    continue;
                }
            };
            match (parsed.node_type(), sample.kind()) {
                (NodeType::Node, SampleKind::Delete) => {
                    return Ok(RemoteChange::Left(self.remote_id.clone()));
                }
                (NodeType::Available, SampleKind::Put) => {
                    return Ok(RemoteChange::Available(self.remote_id.clone()));
                }
                _ => continue,
            }
        }
    }
}

/// Watches `<prefix>/available/*` to keep the peer directory current
pub struct PresenceWatch {
    subscriber: Subscriber<FifoChannelHandler<Sample>>,
    keyexpr: KeyExpr<'static>,
}

impl std::fmt::Debug for PresenceWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceWatch")
            .field("key_expr", &self.keyexpr)
            .finish()
    }
}

impl PresenceWatch {
    /// Subscribe with history so already-available peers are reported at once
    pub async fn subscribe(
        session: &zenoh::Session,
        prefix: impl Into<KeyExpr<'static>>,
    ) -> Result<Self> {
        let keyexpr: KeyExpr<'static> =
            KeyexprNode::new(prefix, NodeType::Available, None).into();
        let subscriber = session
            .liveliness()
            .declare_subscriber(&keyexpr)
            .history(true)
            .await?;
        Ok(Self {
            subscriber,
            keyexpr,
        })
    }

    /// Next availability change
    pub async fn recv(&self) -> Result<PresenceChange> {
        loop {
            let sample = self.subscriber.recv_async().await.map_err(|_| {
                DuelError::Internal("Presence watch channel closed".to_string())
            })?;
            match Self::parse(&sample) {
                Some(change) => return Ok(change),
                None => continue,
            }
        }
    }

    /// Query the currently declared presence tokens
    ///
    /// Complements the subscription: a peer seen by a refresh has its
    /// last-seen time renewed in the directory. The returned future owns its
    /// session handle, so it can be kept pending across select iterations.
    pub fn refresh(
        &self,
        session: &zenoh::Session,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<PeerId>>> + Send + 'static {
        let session = session.clone();
        let keyexpr = self.keyexpr.clone();
        async move {
            let replies = session
                .liveliness()
                .get(&keyexpr)
                .timeout(timeout)
                .await?;

            let mut peers = Vec::new();
            while let Ok(reply) = replies.recv_async().await {
                match reply.result() {
                    Ok(sample) => {
                        if let Some(PresenceChange::Available(peer_id)) = Self::parse(sample) {
                            peers.push(peer_id);
                        }
                    }
                    Err(e) => {
                        tracing::debug!("Presence refresh reply error: {:?}", e);
                    }
                }
            }
            Ok(peers)
        }
    }

    fn parse(sample: &Sample) -> Option<PresenceChange> {
        let parsed = match KeyexprNode::try_from(sample.key_expr().clone()) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!("Ignoring presence sample: {}", e);
                return None;
            }
        };
        let peer_id = parsed.peer_id().clone()?;
        match sample.kind() {
            SampleKind::Put => Some(PresenceChange::Available(peer_id)),
            SampleKind::Delete => Some(PresenceChange::Gone(peer_id)),
        }
    }
}
