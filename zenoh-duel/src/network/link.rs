//! Bidirectional message link between the two paired peers

use std::sync::Arc;

use crate::error::{DuelError, Result};
use crate::network::keyexpr::{KeyexprLink, LinkType};
use crate::stats::StatsTracker;
use crate::types::PeerId;
use zenoh::handlers::FifoChannelHandler;
use zenoh::key_expr::KeyExpr;
use zenoh::pubsub::{Publisher, Subscriber};
use zenoh::sample::Sample;

/// Publishes on `<prefix>/link/<local>/<remote>` and receives on
/// `<prefix>/link/<remote>/<local>`
///
/// Payloads are JSON texts wrapped with zenoh-ext serialization.
pub struct PeerLink {
    publisher: Publisher<'static>,
    subscriber: Subscriber<FifoChannelHandler<Sample>>,
    remote_id: PeerId,
    stats_tracker: Arc<StatsTracker>,
}

impl std::fmt::Debug for PeerLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerLink")
            .field("publisher", self.publisher.key_expr())
            .field("subscriber", self.subscriber.key_expr())
            .finish()
    }
}

impl PeerLink {
    pub async fn open(
        session: &zenoh::Session,
        prefix: impl Into<KeyExpr<'static>>,
        local_id: &PeerId,
        remote_id: &PeerId,
        stats_tracker: Arc<StatsTracker>,
    ) -> Result<Self> {
        let prefix = prefix.into();
        let outgoing: KeyExpr = KeyexprLink::new(
            prefix.clone(),
            LinkType::Link,
            Some(local_id.clone()),
            Some(remote_id.clone()),
        )
        .into();
        let incoming: KeyExpr = KeyexprLink::new(
            prefix,
            LinkType::Link,
            Some(remote_id.clone()),
            Some(local_id.clone()),
        )
        .into();

        let publisher = session.declare_publisher(outgoing).await?;
        let subscriber = session.declare_subscriber(incoming).await?;

        Ok(Self {
            publisher,
            subscriber,
            remote_id: remote_id.clone(),
            stats_tracker,
        })
    }

    pub fn remote_id(&self) -> &PeerId {
        &self.remote_id
    }

    /// Send one encoded message
    pub async fn send(&self, text: &str) -> Result<()> {
        let payload = zenoh_ext::z_serialize(text);
        let len = payload.len();
        self.publisher.put(payload).await?;
        self.stats_tracker.record_sent(len);
        Ok(())
    }

    /// Receive the next encoded message
    pub async fn recv(&self) -> Result<String> {
        let sample = self.subscriber.recv_async().await.map_err(|e| {
            DuelError::Internal(format!("Failed to receive sample: {}", e))
        })?;
        self.stats_tracker.record_received(sample.payload().len());

        let text: String = zenoh_ext::z_deserialize(sample.payload()).map_err(|e| {
            DuelError::Serialization(format!("Failed to deserialize: {:?}", e))
        })?;
        Ok(text)
    }
}
