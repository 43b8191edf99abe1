//! Pairing state machine between exactly two endpoints
//!
//! `PeerSession` holds no I/O. The node feeds it transport events (inbound
//! request, open acknowledgement, close, received message) and executes the
//! side effects it queues as [`SessionEvent`]s. This keeps every protocol rule
//! testable without a network.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::error::{DuelError, Result};
use crate::message::PeerMessage;
use crate::mirror::Mirror;
use crate::types::{LinkState, PeerId, PeerStatus, Role};

/// Side effect requested by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Announce to discovery that this identity can be connected to
    AdvertisePresence,
    /// Stop announcing availability while a match is running
    WithdrawPresence,
    /// Restart the local game from scratch
    RestartGame,
    /// The opponent mirror was overwritten or reset
    OpponentUpdated,
    /// The link lifecycle state changed
    StateChanged(LinkState),
}

/// Answer to an inbound connection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundDecision {
    Accept,
    Reject,
}

/// Pairing state of one endpoint
#[derive(Debug)]
pub struct PeerSession<S> {
    local_id: PeerId,
    remote_id: Option<PeerId>,
    role: Option<Role>,
    state: LinkState,
    mirror: Mirror<S>,
    push_interval: Duration,
    last_push: Option<Instant>,
    events: VecDeque<SessionEvent>,
}

impl<S: Default> PeerSession<S> {
    pub fn new(local_id: PeerId, push_interval: Duration) -> Self {
        Self {
            local_id,
            remote_id: None,
            role: None,
            state: LinkState::Idle,
            mirror: Mirror::new(),
            push_interval,
            last_push: None,
            events: VecDeque::new(),
        }
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    pub fn remote_id(&self) -> Option<&PeerId> {
        self.remote_id.as_ref()
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn mirror(&self) -> &Mirror<S> {
        &self.mirror
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    /// Whether a pending or established connection exists
    pub fn has_connection(&self) -> bool {
        self.remote_id.is_some()
    }

    pub fn status(&self) -> PeerStatus {
        PeerStatus {
            local_id: self.local_id.clone(),
            remote_id: self.remote_id.clone(),
            role: self.role,
            state: self.state,
        }
    }

    /// The transport finished initializing: become discoverable
    pub fn transport_ready(&mut self) {
        self.events.push_back(SessionEvent::AdvertisePresence);
    }

    /// Start an outbound connection, taking the guest role
    pub fn connect_to(&mut self, remote_id: &PeerId) -> Result<()> {
        if remote_id == &self.local_id {
            return Err(DuelError::SelfConnection(remote_id.to_string()));
        }
        if let Some(existing) = &self.remote_id {
            return Err(DuelError::AlreadyConnected(existing.to_string()));
        }
        self.remote_id = Some(remote_id.clone());
        self.role = Some(Role::Guest);
        self.set_state(LinkState::Connecting);
        Ok(())
    }

    /// Decide on an inbound connection; accepting takes the host role
    ///
    /// A second attempt while a connection exists is rejected and leaves the
    /// current pairing untouched.
    pub fn on_inbound(&mut self, remote_id: &PeerId) -> InboundDecision {
        if self.remote_id.is_some() || remote_id == &self.local_id {
            return InboundDecision::Reject;
        }
        self.remote_id = Some(remote_id.clone());
        self.role = Some(Role::Host);
        self.set_state(LinkState::Connecting);
        InboundDecision::Accept
    }

    /// Transport-level open acknowledgement
    pub fn on_open(&mut self) -> Result<()> {
        if self.state != LinkState::Connecting {
            return Err(DuelError::InvalidStateTransition {
                from: format!("{:?}", self.state),
                to: format!("{:?}", LinkState::Connected),
            });
        }
        self.last_push = None;
        self.set_state(LinkState::Connected);
        self.events.push_back(SessionEvent::WithdrawPresence);
        self.events.push_back(SessionEvent::RestartGame);
        Ok(())
    }

    /// Transport closed or failed; returns the peer we lost, if any
    ///
    /// Always ends in `Idle` with the mirror reset and presence re-advertised.
    pub fn on_closed(&mut self) -> Option<PeerId> {
        if self.state == LinkState::Idle && self.remote_id.is_none() {
            return None;
        }
        self.set_state(LinkState::Disconnected);
        let remote = self.remote_id.take();
        self.role = None;
        self.last_push = None;
        self.mirror.reset();
        self.events.push_back(SessionEvent::OpponentUpdated);
        self.events.push_back(SessionEvent::AdvertisePresence);
        self.set_state(LinkState::Idle);
        remote
    }

    /// Elapsed-time guard for snapshot pushes
    ///
    /// Returns true at most once per push interval and only while connected;
    /// a true result records `now` as the last push.
    pub fn should_push(&mut self, now: Instant) -> bool {
        if self.state != LinkState::Connected {
            return false;
        }
        if let Some(last) = self.last_push {
            if now.saturating_duration_since(last) < self.push_interval {
                return false;
            }
        }
        self.last_push = Some(now);
        true
    }

    /// Apply a message received over the link
    pub fn on_message(&mut self, message: PeerMessage<S>) {
        if self.state != LinkState::Connected {
            tracing::debug!(
                "Peer '{}' dropped message received while {:?}",
                self.local_id,
                self.state
            );
            return;
        }
        match message {
            PeerMessage::GameState(snapshot) => {
                self.mirror.apply(snapshot);
                self.events.push_back(SessionEvent::OpponentUpdated);
            }
            PeerMessage::Restart => {
                tracing::info!("Peer '{}' asked for a restart", self.local_id);
                self.events.push_back(SessionEvent::RestartGame);
            }
        }
    }

    /// Next queued side effect
    pub fn poll_event(&mut self) -> Option<SessionEvent> {
        self.events.pop_front()
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain(..).collect()
    }

    fn set_state(&mut self, state: LinkState) {
        if self.state != state {
            tracing::debug!(
                "Peer '{}' link state {:?} -> {:?}",
                self.local_id,
                self.state,
                state
            );
            self.state = state;
            self.events.push_back(SessionEvent::StateChanged(state));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> PeerId {
        PeerId::from_name(name.to_string()).unwrap()
    }

    fn session() -> PeerSession<Vec<u8>> {
        PeerSession::new(id("me"), Duration::from_millis(100))
    }

    fn open_as_guest(session: &mut PeerSession<Vec<u8>>, remote: &str) {
        session.connect_to(&id(remote)).unwrap();
        session.on_open().unwrap();
        session.drain_events();
    }

    #[test]
    fn test_connect_records_guest_role() {
        let mut s = session();
        s.connect_to(&id("you")).unwrap();
        assert_eq!(s.state(), LinkState::Connecting);
        assert_eq!(s.role(), Some(Role::Guest));
        assert_eq!(s.remote_id(), Some(&id("you")));
    }

    #[test]
    fn test_connect_to_self_rejected() {
        let mut s = session();
        assert!(matches!(s.connect_to(&id("me")), Err(DuelError::SelfConnection(_))));
        assert_eq!(s.state(), LinkState::Idle);
    }

    #[test]
    fn test_connect_while_connected_rejected() {
        let mut s = session();
        open_as_guest(&mut s, "you");
        assert!(matches!(
            s.connect_to(&id("other")),
            Err(DuelError::AlreadyConnected(_))
        ));
        assert_eq!(s.remote_id(), Some(&id("you")));
        assert_eq!(s.state(), LinkState::Connected);
    }

    #[test]
    fn test_inbound_accepted_as_host() {
        let mut s = session();
        assert_eq!(s.on_inbound(&id("you")), InboundDecision::Accept);
        assert_eq!(s.role(), Some(Role::Host));
        assert_eq!(s.state(), LinkState::Connecting);
    }

    #[test]
    fn test_second_inbound_rejected_without_disturbing_session() {
        let mut s = session();
        s.on_inbound(&id("first"));
        s.on_open().unwrap();
        s.drain_events();

        assert_eq!(s.on_inbound(&id("second")), InboundDecision::Reject);
        assert_eq!(s.remote_id(), Some(&id("first")));
        assert_eq!(s.role(), Some(Role::Host));
        assert_eq!(s.state(), LinkState::Connected);
        assert!(s.drain_events().is_empty());
    }

    #[test]
    fn test_open_restarts_game_and_withdraws_presence() {
        let mut s = session();
        s.connect_to(&id("you")).unwrap();
        s.drain_events();
        s.on_open().unwrap();
        assert_eq!(
            s.drain_events(),
            vec![
                SessionEvent::StateChanged(LinkState::Connected),
                SessionEvent::WithdrawPresence,
                SessionEvent::RestartGame,
            ]
        );
    }

    #[test]
    fn test_open_without_connecting_is_invalid() {
        let mut s = session();
        assert!(s.on_open().is_err());
    }

    #[test]
    fn test_close_resets_mirror_and_advertises_once() {
        let mut s = session();
        open_as_guest(&mut s, "you");
        s.on_message(PeerMessage::GameState(vec![1, 2, 3]));
        assert!(s.mirror().has_data());
        s.drain_events();

        let lost = s.on_closed();
        assert_eq!(lost, Some(id("you")));
        assert_eq!(s.state(), LinkState::Idle);
        assert_eq!(s.role(), None);
        assert_eq!(s.remote_id(), None);
        assert!(!s.mirror().has_data());
        assert!(s.mirror().get().is_empty());

        let events = s.drain_events();
        assert_eq!(
            events
                .iter()
                .filter(|e| **e == SessionEvent::AdvertisePresence)
                .count(),
            1
        );
        assert_eq!(
            events,
            vec![
                SessionEvent::StateChanged(LinkState::Disconnected),
                SessionEvent::OpponentUpdated,
                SessionEvent::AdvertisePresence,
                SessionEvent::StateChanged(LinkState::Idle),
            ]
        );

        // Reconnecting afterwards works and does not advertise again
        s.connect_to(&id("other")).unwrap();
        s.on_open().unwrap();
        assert!(!s.drain_events().contains(&SessionEvent::AdvertisePresence));
    }

    #[test]
    fn test_failed_handshake_resolves_to_idle() {
        let mut s = session();
        s.connect_to(&id("you")).unwrap();
        assert_eq!(s.on_closed(), Some(id("you")));
        assert_eq!(s.state(), LinkState::Idle);
        assert!(s.connect_to(&id("you")).is_ok());
    }

    #[test]
    fn test_close_when_idle_is_noop() {
        let mut s = session();
        assert_eq!(s.on_closed(), None);
        assert!(s.drain_events().is_empty());
    }

    #[test]
    fn test_push_throttled_to_interval() {
        let mut s = session();
        let t0 = Instant::now();
        assert!(!s.should_push(t0), "no push before connection");

        open_as_guest(&mut s, "you");
        assert!(s.should_push(t0));
        // A burst of calls inside the window collapses to one push
        assert!(!s.should_push(t0 + Duration::from_millis(10)));
        assert!(!s.should_push(t0 + Duration::from_millis(99)));
        assert!(s.should_push(t0 + Duration::from_millis(100)));
        assert!(!s.should_push(t0 + Duration::from_millis(150)));
        assert!(s.should_push(t0 + Duration::from_millis(230)));
    }

    #[test]
    fn test_restart_message_requests_restart() {
        let mut s = session();
        open_as_guest(&mut s, "you");
        s.on_message(PeerMessage::Restart);
        assert_eq!(s.drain_events(), vec![SessionEvent::RestartGame]);
    }

    #[test]
    fn test_messages_ignored_when_not_connected() {
        let mut s = session();
        s.on_message(PeerMessage::GameState(vec![9]));
        assert!(!s.mirror().has_data());
        assert!(s.drain_events().is_empty());
    }

    #[test]
    fn test_transport_ready_advertises() {
        let mut s = session();
        s.transport_ready();
        assert_eq!(s.poll_event(), Some(SessionEvent::AdvertisePresence));
        assert_eq!(s.poll_event(), None);
    }
}
