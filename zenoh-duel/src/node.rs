//! Duel node: one endpoint of a two-player match
//!
//! The node owns the zenoh resources (identity token, presence token,
//! handshake queryable, data link) and drives a [`PeerSession`] with the
//! events they produce.
//!
//! Waiting and handling are split: [`DuelNode::next_event`] only waits and is
//! cancel-safe, so it can sit in a `tokio::select!` next to timers and input;
//! [`DuelNode::handle`] applies an event. [`DuelNode::step`] combines both
//! with a timeout.
//!
//! A host that accepted a request stays Connecting until the first message
//! from its guest arrives on the link. The guest sends a restart as soon as
//! its handshake completes. A host that hears nothing within the handshake
//! timeout closes the link and becomes available again.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::{Interval, MissedTickBehavior, Sleep};

use crate::config::DuelConfig;
use crate::directory::{PeerDirectory, PresenceChange};
use crate::error::{DuelError, Result};
use crate::message::{encode_snapshot, Decoded, PeerMessage};
use crate::network::{
    HandshakeQuerier, HandshakeQueryable, InboundRequest, KeyexprNode, NodeLivelinessToken,
    NodeType, PeerLink, PresenceWatch, RemoteChange, RemoteWatch, REJECT_BUSY,
};
use crate::session::{InboundDecision, PeerSession, SessionEvent};
use crate::stats::{LinkStats, StatsTracker};
use crate::types::{LinkState, PeerId, PeerStatus, Role};

type Pending<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// Commands that can be sent to the node from other tasks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeCommand {
    /// Open a connection to a discovered peer
    Connect(PeerId),
    /// Ask the opponent to restart its game
    SendRestart,
    /// Stop the node
    Stop,
}

/// Outcome of one handled event
#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
    /// Nothing happened before the step timeout
    Timeout,
    /// Event handled without anything for the application to act on
    Handled,
    /// Stop command received
    Stop,
    /// Link opened; both sides start a fresh game
    Connected { remote: PeerId, role: Role },
    /// Connection attempt failed: the handshake failed as guest, or the
    /// guest never confirmed as host
    ConnectFailed { remote: PeerId, reason: String },
    /// Link closed; the opponent mirror is reset
    Disconnected { remote: PeerId },
    /// A new opponent snapshot is available through [`DuelNode::opponent`]
    OpponentUpdated,
    /// The opponent asked for a restart
    Restart,
    /// The directory of available peers changed
    PeersChanged,
}

/// Something [`DuelNode::next_event`] observed, to be passed to [`DuelNode::handle`]
#[derive(Debug)]
pub struct NodeEvent(EventKind);

#[derive(Debug)]
enum EventKind {
    Command(NodeCommand),
    Inbound(Result<InboundRequest>),
    HandshakeDone(Result<()>),
    ConfirmExpired,
    Link(Result<String>),
    Remote(Result<RemoteChange>),
    Presence(Result<PresenceChange>),
    RefreshDue,
    RefreshDone(Result<Vec<PeerId>>),
}

async fn poll_pending<T>(pending: &mut Option<Pending<T>>) -> Result<T> {
    match pending {
        Some(fut) => fut.await,
        None => futures::future::pending().await,
    }
}

async fn wait_deadline(deadline: &mut Option<Pin<Box<Sleep>>>) {
    match deadline {
        Some(sleep) => sleep.as_mut().await,
        None => futures::future::pending().await,
    }
}

async fn recv_link(link: &Option<PeerLink>) -> Result<String> {
    match link {
        Some(link) => link.recv().await,
        None => futures::future::pending().await,
    }
}

async fn watch_remote(watch: &Option<RemoteWatch>) -> Result<RemoteChange> {
    match watch {
        Some(watch) => watch.changed().await,
        None => futures::future::pending().await,
    }
}

/// One endpoint of a duel
///
/// `S` is the snapshot type mirrored from the opponent. It must serialize as
/// a JSON object.
pub struct DuelNode<S> {
    id: PeerId,
    config: DuelConfig,
    session: zenoh::Session,
    peer: PeerSession<S>,
    directory: PeerDirectory,
    command_rx: flume::Receiver<NodeCommand>,
    command_tx: flume::Sender<NodeCommand>,
    /// Held for the node lifetime; its disappearance tells the opponent we left
    _node_token: NodeLivelinessToken,
    /// Present only while idle
    presence_token: Option<NodeLivelinessToken>,
    handshake: HandshakeQueryable,
    presence_watch: PresenceWatch,
    pending_connect: Option<Pending<()>>,
    /// Set while a host waits for its guest's first message
    confirm_deadline: Option<Pin<Box<Sleep>>>,
    link: Option<PeerLink>,
    remote_watch: Option<RemoteWatch>,
    refresh: Interval,
    pending_refresh: Option<Pending<Vec<PeerId>>>,
    stats_tracker: Arc<StatsTracker>,
}

impl<S> DuelNode<S>
where
    S: Serialize + DeserializeOwned + Default + Send + Sync + 'static,
{
    /// Create a node (use [`crate::SessionExt::declare_duel_node`])
    pub(crate) async fn new_internal(config: DuelConfig, session: zenoh::Session) -> Result<Self> {
        let id = config.peer_id.clone();
        let prefix = config.keyexpr_prefix.clone();

        let node_token = NodeLivelinessToken::declare(
            &session,
            KeyexprNode::new(prefix.clone(), NodeType::Node, Some(id.clone())),
        )
        .await?;
        let handshake = HandshakeQueryable::declare(&session, prefix.clone(), &id).await?;
        let presence_watch = PresenceWatch::subscribe(&session, prefix).await?;

        let (command_tx, command_rx) = flume::unbounded();
        let mut refresh = tokio::time::interval(config.presence_refresh);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("Node '{}' initialized with Zenoh session", id);

        let mut node = Self {
            peer: PeerSession::new(id.clone(), config.push_interval),
            directory: PeerDirectory::new(id.clone(), config.stale_peer_timeout),
            id,
            config,
            session,
            command_rx,
            command_tx,
            _node_token: node_token,
            presence_token: None,
            handshake,
            presence_watch,
            pending_connect: None,
            confirm_deadline: None,
            link: None,
            remote_watch: None,
            refresh,
            pending_refresh: None,
            stats_tracker: Arc::new(StatsTracker::new()),
        };
        node.peer.transport_ready();
        node.process_session_events().await;
        Ok(node)
    }

    pub fn id(&self) -> &PeerId {
        &self.id
    }

    pub fn config(&self) -> &DuelConfig {
        &self.config
    }

    pub fn session(&self) -> &zenoh::Session {
        &self.session
    }

    /// Get a sender for sending commands to this node
    pub fn sender(&self) -> flume::Sender<NodeCommand> {
        self.command_tx.clone()
    }

    pub fn state(&self) -> LinkState {
        self.peer.state()
    }

    pub fn status(&self) -> PeerStatus {
        self.peer.status()
    }

    pub fn is_connected(&self) -> bool {
        self.peer.is_connected()
    }

    /// Last snapshot received from the opponent, or the default when none
    pub fn opponent(&self) -> &S {
        self.peer.mirror().get()
    }

    /// Whether a snapshot arrived since the link opened
    pub fn has_opponent(&self) -> bool {
        self.peer.mirror().has_data()
    }

    pub fn directory(&self) -> &PeerDirectory {
        &self.directory
    }

    /// Whether this node currently advertises itself as available
    pub fn is_advertised(&self) -> bool {
        self.presence_token.is_some()
    }

    pub fn stats(&self) -> LinkStats {
        self.stats_tracker.get_stats()
    }

    pub fn reset_stats(&self) {
        self.stats_tracker.reset();
    }

    /// Wait for the next event without handling it
    ///
    /// Cancel-safe: dropping the returned future loses nothing.
    pub async fn next_event(&mut self) -> NodeEvent {
        let Self {
            command_rx,
            handshake,
            pending_connect,
            confirm_deadline,
            link,
            remote_watch,
            presence_watch,
            refresh,
            pending_refresh,
            ..
        } = self;

        let kind = tokio::select! {
            command = command_rx.recv_async() => {
                // The node holds a sender, so the channel never disconnects
                EventKind::Command(command.unwrap_or(NodeCommand::Stop))
            }
            request = handshake.expect_request() => EventKind::Inbound(request),
            result = poll_pending(pending_connect), if pending_connect.is_some() => {
                EventKind::HandshakeDone(result)
            }
            _ = wait_deadline(confirm_deadline), if confirm_deadline.is_some() => {
                EventKind::ConfirmExpired
            }
            message = recv_link(link), if link.is_some() => EventKind::Link(message),
            change = watch_remote(remote_watch), if remote_watch.is_some() => {
                EventKind::Remote(change)
            }
            change = presence_watch.recv() => EventKind::Presence(change),
            _ = refresh.tick() => EventKind::RefreshDue,
            result = poll_pending(pending_refresh), if pending_refresh.is_some() => {
                EventKind::RefreshDone(result)
            }
        };
        match kind {
            EventKind::HandshakeDone(_) => self.pending_connect = None,
            EventKind::ConfirmExpired => self.confirm_deadline = None,
            EventKind::RefreshDone(_) => self.pending_refresh = None,
            _ => {}
        }
        NodeEvent(kind)
    }

    /// Apply an event returned by [`DuelNode::next_event`]
    ///
    /// Failures of the link, the handshake or presence declarations are
    /// handled here and never returned. An error means the handshake
    /// queryable or the presence subscriber is gone, and the node cannot
    /// continue.
    pub async fn handle(&mut self, event: NodeEvent) -> Result<StepResult> {
        match event.0 {
            EventKind::Command(command) => self.handle_command(command).await,
            EventKind::Inbound(Ok(request)) => self.handle_inbound(request).await,
            EventKind::Inbound(Err(e)) => Err(e),
            EventKind::HandshakeDone(result) => self.handle_handshake_done(result).await,
            EventKind::ConfirmExpired => self.handle_confirm_expired().await,
            EventKind::Link(Ok(text)) => self.handle_message(&text).await,
            EventKind::Link(Err(DuelError::Serialization(e))) => {
                tracing::warn!("Node '{}' dropped undecodable payload: {}", self.id, e);
                self.stats_tracker.record_dropped();
                Ok(StepResult::Handled)
            }
            EventKind::Link(Err(e)) => {
                tracing::warn!("Node '{}' link failed: {}", self.id, e);
                self.close_link().await
            }
            EventKind::Remote(Ok(RemoteChange::Left(remote))) => {
                tracing::info!("Node '{}': opponent '{}' left", self.id, remote);
                self.close_link().await
            }
            EventKind::Remote(Ok(RemoteChange::Available(remote))) => {
                tracing::info!(
                    "Node '{}': opponent '{}' is available again, closing link",
                    self.id,
                    remote
                );
                self.close_link().await
            }
            EventKind::Remote(Err(e)) => {
                tracing::warn!("Node '{}' lost opponent watch: {}", self.id, e);
                self.close_link().await
            }
            EventKind::Presence(Ok(change)) => {
                if self.directory.apply(change, Instant::now()) {
                    Ok(StepResult::PeersChanged)
                } else {
                    Ok(StepResult::Handled)
                }
            }
            EventKind::Presence(Err(e)) => Err(e),
            EventKind::RefreshDue => Ok(self.refresh_presence().await),
            EventKind::RefreshDone(result) => Ok(self.apply_refresh(result)),
        }
    }

    /// Execute one step: wait for one event or the step timeout, then handle it
    pub async fn step(&mut self) -> Result<StepResult> {
        let timeout = tokio::time::Duration::from_millis(self.config.step_timeout_ms);
        let event = tokio::select! {
            event = self.next_event() => event,
            _ = tokio::time::sleep(timeout) => return Ok(StepResult::Timeout),
        };
        self.handle(event).await
    }

    /// Start an outbound connection to `remote_id`
    ///
    /// Completion is reported by a later [`StepResult::Connected`] or
    /// [`StepResult::ConnectFailed`].
    pub fn connect_to(&mut self, remote_id: &PeerId) -> Result<()> {
        self.peer.connect_to(remote_id)?;
        tracing::info!("Node '{}' connecting to '{}'", self.id, remote_id);
        self.pending_connect = Some(Box::pin(HandshakeQuerier::connect(
            self.session.clone(),
            self.config.keyexpr_prefix.clone(),
            self.id.clone(),
            remote_id.clone(),
            self.config.handshake_timeout,
        )));
        Ok(())
    }

    /// Send a snapshot if connected and the push interval has elapsed
    ///
    /// Returns whether the snapshot was sent.
    pub async fn push_snapshot(&mut self, snapshot: &S) -> Result<bool> {
        if !self.peer.should_push(Instant::now()) {
            return Ok(false);
        }
        let link = self.link.as_ref().ok_or(DuelError::NotConnected)?;
        let text = encode_snapshot(snapshot)?;
        link.send(&text).await?;
        Ok(true)
    }

    /// Ask the opponent to restart its game
    pub async fn send_restart(&self) -> Result<()> {
        let link = match (&self.link, self.peer.is_connected()) {
            (Some(link), true) => link,
            _ => return Err(DuelError::NotConnected),
        };
        let text = PeerMessage::<S>::Restart.encode()?;
        link.send(&text).await?;
        tracing::info!("Node '{}' sent restart to '{}'", self.id, link.remote_id());
        Ok(())
    }

    async fn handle_command(&mut self, command: NodeCommand) -> Result<StepResult> {
        match command {
            NodeCommand::Connect(remote_id) => {
                if let Err(e) = self.connect_to(&remote_id) {
                    tracing::warn!("Node '{}' cannot connect to '{}': {}", self.id, remote_id, e);
                    return Ok(StepResult::ConnectFailed {
                        remote: remote_id,
                        reason: e.to_string(),
                    });
                }
                Ok(StepResult::Handled)
            }
            NodeCommand::SendRestart => {
                if let Err(e) = self.send_restart().await {
                    tracing::warn!("Node '{}' cannot send restart: {}", self.id, e);
                }
                Ok(StepResult::Handled)
            }
            NodeCommand::Stop => {
                tracing::info!("Node '{}' received Stop command", self.id);
                Ok(StepResult::Stop)
            }
        }
    }

    async fn handle_inbound(&mut self, request: InboundRequest) -> Result<StepResult> {
        let remote_id = request.remote_id().clone();
        if self.confirm_deadline.is_some() && self.peer.remote_id() == Some(&remote_id) {
            // The guest gave up on our earlier reply and asked again
            return Ok(self.answer_accept(request).await);
        }
        match self.peer.on_inbound(&remote_id) {
            InboundDecision::Reject => {
                tracing::info!(
                    "Node '{}' rejected connection from '{}' ({})",
                    self.id,
                    remote_id,
                    self.peer.status()
                );
                if let Err(e) = request.reject(REJECT_BUSY).await {
                    tracing::warn!(
                        "Node '{}' failed to reject '{}': {}",
                        self.id,
                        remote_id,
                        e
                    );
                }
                Ok(StepResult::Handled)
            }
            InboundDecision::Accept => {
                if let Err(e) = self.declare_link(&remote_id).await {
                    tracing::warn!(
                        "Node '{}' could not open link to '{}': {}",
                        self.id,
                        remote_id,
                        e
                    );
                    if let Err(e) = request.reject(&e.to_string()).await {
                        tracing::debug!("Node '{}' failed to reject '{}': {}", self.id, remote_id, e);
                    }
                    self.drop_link().await;
                    return Ok(StepResult::Handled);
                }
                Ok(self.answer_accept(request).await)
            }
        }
    }

    /// Reply to an accepted request and wait for the guest to confirm
    async fn answer_accept(&mut self, request: InboundRequest) -> StepResult {
        let remote_id = request.remote_id().clone();
        if let Err(e) = request.accept().await {
            tracing::warn!("Node '{}' failed to accept '{}': {}", self.id, remote_id, e);
            self.drop_link().await;
            return StepResult::Handled;
        }
        tracing::info!(
            "Node '{}' accepted '{}', waiting for its first message",
            self.id,
            remote_id
        );
        self.confirm_deadline = Some(Box::pin(tokio::time::sleep(
            self.config.handshake_timeout,
        )));
        StepResult::Handled
    }

    async fn handle_confirm_expired(&mut self) -> Result<StepResult> {
        let timeout = self.config.handshake_timeout;
        match self.drop_link().await {
            Some(remote) => {
                tracing::warn!(
                    "Node '{}': no message from '{}' within {:?}, closing link",
                    self.id,
                    remote,
                    timeout
                );
                Ok(StepResult::ConnectFailed {
                    remote,
                    reason: format!("no confirmation within {:?}", timeout),
                })
            }
            None => Ok(StepResult::Handled),
        }
    }

    async fn handle_handshake_done(&mut self, result: Result<()>) -> Result<StepResult> {
        let remote = self
            .peer
            .remote_id()
            .cloned()
            .ok_or_else(|| DuelError::Internal("handshake without remote".to_string()))?;
        let opened = match result {
            Ok(()) => self.declare_link(&remote).await,
            Err(e) => Err(e),
        };
        if let Err(e) = opened {
            tracing::warn!("Node '{}' failed to connect to '{}': {}", self.id, remote, e);
            self.drop_link().await;
            return Ok(StepResult::ConnectFailed {
                remote,
                reason: e.to_string(),
            });
        }

        let connected = self.confirm_open()?;
        self.process_session_events().await;
        // The host stays Connecting until this arrives
        if let Err(e) = self.send_opening().await {
            tracing::warn!("Node '{}' failed to send opening restart: {}", self.id, e);
        }
        Ok(connected)
    }

    /// Declare the opponent watch and the data link for `remote`
    async fn declare_link(&mut self, remote: &PeerId) -> Result<()> {
        let prefix = self.config.keyexpr_prefix.clone();
        let watch = RemoteWatch::subscribe(&self.session, prefix.clone(), remote).await?;
        let link = PeerLink::open(
            &self.session,
            prefix,
            &self.id,
            remote,
            self.stats_tracker.clone(),
        )
        .await?;
        self.remote_watch = Some(watch);
        self.link = Some(link);
        Ok(())
    }

    /// Both sides know the link is up: Connecting → Connected
    fn confirm_open(&mut self) -> Result<StepResult> {
        let remote = self
            .peer
            .remote_id()
            .cloned()
            .ok_or_else(|| DuelError::Internal("open without remote".to_string()))?;
        let role = self
            .peer
            .role()
            .ok_or_else(|| DuelError::Internal("open without role".to_string()))?;
        self.confirm_deadline = None;
        self.peer.on_open()?;
        self.stats_tracker.reset();
        tracing::info!("Node '{}' connected to '{}' as {}", self.id, remote, role);
        Ok(StepResult::Connected { remote, role })
    }

    async fn send_opening(&self) -> Result<()> {
        let link = self.link.as_ref().ok_or(DuelError::NotConnected)?;
        link.send(&PeerMessage::<S>::Restart.encode()?).await
    }

    /// Release the link resources and return to Idle
    ///
    /// Returns the opponent that was being connected or played, if any.
    async fn drop_link(&mut self) -> Option<PeerId> {
        self.link = None;
        self.remote_watch = None;
        self.pending_connect = None;
        self.confirm_deadline = None;
        let lost = self.peer.on_closed();
        self.process_session_events().await;
        lost
    }

    async fn close_link(&mut self) -> Result<StepResult> {
        match self.drop_link().await {
            Some(remote) => {
                tracing::info!("Node '{}' disconnected from '{}'", self.id, remote);
                Ok(StepResult::Disconnected { remote })
            }
            None => Ok(StepResult::Handled),
        }
    }

    async fn handle_message(&mut self, text: &str) -> Result<StepResult> {
        let message = match PeerMessage::<S>::decode(text) {
            Ok(Decoded::Message(message)) => message,
            Ok(Decoded::Unknown(kind)) => {
                tracing::debug!("Node '{}' ignoring message of type '{}'", self.id, kind);
                self.stats_tracker.record_dropped();
                return Ok(StepResult::Handled);
            }
            Err(e) => {
                tracing::warn!("Node '{}' dropped malformed message: {}", self.id, e);
                self.stats_tracker.record_dropped();
                return Ok(StepResult::Handled);
            }
        };

        if self.confirm_deadline.is_some() {
            // First message from the guest we accepted
            let connected = self.confirm_open()?;
            self.process_session_events().await;
            if let PeerMessage::GameState(_) = message {
                self.peer.on_message(message);
                self.peer.drain_events();
            }
            return Ok(connected);
        }

        self.peer.on_message(message);
        let events = self.peer.drain_events();
        if events.contains(&SessionEvent::RestartGame) {
            Ok(StepResult::Restart)
        } else if events.contains(&SessionEvent::OpponentUpdated) {
            Ok(StepResult::OpponentUpdated)
        } else {
            Ok(StepResult::Handled)
        }
    }

    /// Start a presence query unless one is still running, drop stale
    /// peers and retry a failed presence declaration
    async fn refresh_presence(&mut self) -> StepResult {
        if self.pending_refresh.is_none() {
            self.pending_refresh = Some(Box::pin(
                self.presence_watch
                    .refresh(&self.session, self.config.presence_refresh),
            ));
        }
        if self.peer.state() == LinkState::Idle {
            self.advertise().await;
        }
        if self.directory.cleanup(Instant::now()).is_empty() {
            StepResult::Handled
        } else {
            StepResult::PeersChanged
        }
    }

    fn apply_refresh(&mut self, result: Result<Vec<PeerId>>) -> StepResult {
        let peers = match result {
            Ok(peers) => peers,
            Err(e) => {
                tracing::debug!("Node '{}' presence refresh failed: {}", self.id, e);
                return StepResult::Handled;
            }
        };
        let now = Instant::now();
        let mut changed = false;
        for peer_id in peers {
            changed |= self.directory.on_available(peer_id, now);
        }
        if changed {
            StepResult::PeersChanged
        } else {
            StepResult::Handled
        }
    }

    async fn advertise(&mut self) {
        if self.presence_token.is_some() {
            return;
        }
        let keyexpr = KeyexprNode::new(
            self.config.keyexpr_prefix.clone(),
            NodeType::Available,
            Some(self.id.clone()),
        );
        match NodeLivelinessToken::declare(&self.session, keyexpr).await {
            Ok(token) => {
                tracing::info!("Node '{}' is available for a match", self.id);
                self.presence_token = Some(token);
            }
            Err(e) => tracing::warn!(
                "Node '{}' failed to advertise presence, retrying on refresh: {}",
                self.id,
                e
            ),
        }
    }

    /// Execute the side effects queued by the session
    async fn process_session_events(&mut self) {
        while let Some(event) = self.peer.poll_event() {
            match event {
                SessionEvent::AdvertisePresence => self.advertise().await,
                SessionEvent::WithdrawPresence => {
                    if self.presence_token.take().is_some() {
                        tracing::debug!("Node '{}' withdrew presence", self.id);
                    }
                }
                SessionEvent::StateChanged(state) => {
                    tracing::debug!("Node '{}' link state: {}", self.id, state);
                }
                SessionEvent::RestartGame | SessionEvent::OpponentUpdated => {}
            }
        }
    }
}
