use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use zenoh::{key_expr::KeyExpr, Resolvable};

use crate::config::DuelConfig;
use crate::error::Result;
use crate::node::DuelNode;
use crate::types::PeerId;

/// Extension trait for zenoh::Session to declare duel nodes
pub trait SessionExt {
    /// Declare a duel node mirroring opponent snapshots of type `S`
    ///
    /// # Example
    /// ```no_run
    /// use zenoh_duel::SessionExt;
    ///
    /// #[derive(Default, serde::Serialize, serde::Deserialize)]
    /// struct Snapshot {
    ///     score: u32,
    /// }
    ///
    /// # async fn example() {
    /// let session = zenoh::open(zenoh::Config::default()).await.unwrap();
    /// let node = session
    ///     .declare_duel_node::<Snapshot>()
    ///     .await
    ///     .unwrap();
    /// # }
    /// ```
    fn declare_duel_node<S>(&self) -> DuelNodeBuilder<'_, S>
    where
        S: Serialize + DeserializeOwned + Default + Send + Sync + 'static;
}

impl SessionExt for zenoh::Session {
    fn declare_duel_node<S>(&self) -> DuelNodeBuilder<'_, S>
    where
        S: Serialize + DeserializeOwned + Default + Send + Sync + 'static,
    {
        DuelNodeBuilder::new(self)
    }
}

/// Builder for duel nodes
#[must_use = "Resolvables do nothing unless you resolve them using `.await` or `zenoh::Wait::wait`"]
pub struct DuelNodeBuilder<'a, S> {
    session: &'a zenoh::Session,
    config: DuelConfig,
    _phantom: std::marker::PhantomData<S>,
}

impl<'a, S> DuelNodeBuilder<'a, S> {
    fn new(session: &'a zenoh::Session) -> Self {
        Self {
            session,
            config: DuelConfig::default(),
            _phantom: std::marker::PhantomData,
        }
    }

    /// Use a fixed peer id, typically the persisted identity
    pub fn peer_id(mut self, peer_id: PeerId) -> Self {
        self.config.peer_id = peer_id;
        self
    }

    /// Set the peer id from a name
    pub fn name(mut self, name: String) -> Result<Self> {
        self.config.peer_id = PeerId::from_name(name)?;
        Ok(self)
    }

    /// Set the step timeout in milliseconds
    pub fn step_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.step_timeout_ms = timeout_ms;
        self
    }

    /// Minimum time between two snapshot pushes
    pub fn push_interval(mut self, interval: Duration) -> Self {
        self.config.push_interval = interval;
        self
    }

    /// How long an outbound connection waits for an answer
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    pub fn presence_refresh(mut self, period: Duration) -> Self {
        self.config.presence_refresh = period;
        self
    }

    pub fn stale_peer_timeout(mut self, timeout: Duration) -> Self {
        self.config.stale_peer_timeout = timeout;
        self
    }

    /// Set the key expression prefix
    pub fn prefix(mut self, prefix: KeyExpr<'static>) -> Self {
        self.config.keyexpr_prefix = prefix;
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: DuelConfig) -> Self {
        self.config = config;
        self
    }
}

impl<'a, S> Resolvable for DuelNodeBuilder<'a, S>
where
    S: Serialize + DeserializeOwned + Default + Send + Sync + 'static,
{
    type To = Result<DuelNode<S>>;
}

impl<'a, S> std::future::IntoFuture for DuelNodeBuilder<'a, S>
where
    S: Serialize + DeserializeOwned + Default + Send + Sync + 'static,
{
    type Output = <Self as Resolvable>::To;
    type IntoFuture =
        std::pin::Pin<Box<dyn std::future::Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let session = self.session.clone();
            DuelNode::new_internal(self.config, session).await
        })
    }
}
