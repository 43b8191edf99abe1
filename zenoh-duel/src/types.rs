/// Core types for the zenoh-duel library
use crate::error::{DuelError, Result};

/// Prefix of generated peer identifiers
pub const PEER_ID_PREFIX: &str = "tetris-";

/// Number of base58 characters kept from the random part of a generated id
const PEER_ID_TOKEN_LEN: usize = 10;

/// Unique peer identifier
///
/// PeerId must be a valid single-chunk keyexpr:
/// - Non-empty UTF-8 string
/// - Cannot contain: / * $ ? # @
/// - Must be a single chunk (no slashes)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(String);

impl PeerId {
    /// Generate a new random peer id of the form `tetris-<token>`
    ///
    /// The token is the base58 encoding of a random UUID, which keeps it
    /// alphanumeric and therefore keyexpr-compatible.
    pub fn generate() -> Self {
        let uuid = uuid::Uuid::new_v4();
        let token = bs58::encode(uuid.as_bytes()).into_string();
        let token: String = token.chars().take(PEER_ID_TOKEN_LEN).collect();
        PeerId(format!("{}{}", PEER_ID_PREFIX, token))
    }

    /// Create from a specific name
    /// Returns error if name contains invalid characters
    pub fn from_name(name: String) -> Result<Self> {
        Self::validate(&name)?;
        Ok(PeerId(name))
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate that a string can be used as PeerId (single keyexpr chunk)
    fn validate(s: &str) -> Result<()> {
        if s.is_empty() {
            return Err(DuelError::InvalidPeerId(
                "Peer id cannot be empty".to_string(),
            ));
        }

        for ch in s.chars() {
            if matches!(ch, '/' | '*' | '$' | '?' | '#' | '@') || ch.is_whitespace() {
                return Err(DuelError::InvalidPeerId(format!(
                    "Peer id '{}' contains invalid character '{}'",
                    s, ch
                )));
            }
        }

        Ok(())
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PeerId {
    type Err = DuelError;

    fn from_str(s: &str) -> Result<Self> {
        PeerId::from_name(s.to_string())
    }
}

/// Role of this endpoint in the current pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Accepted an inbound connection
    Host,
    /// Initiated an outbound connection
    Guest,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Host => write!(f, "host"),
            Role::Guest => write!(f, "guest"),
        }
    }
}

/// Lifecycle of the link to the remote peer
///
/// `Idle → Connecting → Connected → (Disconnected → Idle)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// No remote peer, discoverable
    #[default]
    Idle,
    /// Handshake in progress
    Connecting,
    /// Link open, snapshots flowing
    Connected,
    /// Link torn down, about to settle back to Idle
    Disconnected,
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkState::Idle => write!(f, "waiting for opponent"),
            LinkState::Connecting => write!(f, "connecting..."),
            LinkState::Connected => write!(f, "connected"),
            LinkState::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Public view of the pairing, for status display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerStatus {
    /// Our own identity
    pub local_id: PeerId,
    /// Remote identity, if any
    pub remote_id: Option<PeerId>,
    /// Our role in the pairing, if any
    pub role: Option<Role>,
    /// Link lifecycle state
    pub state: LinkState,
}

impl std::fmt::Display for PeerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.remote_id, self.role) {
            (Some(remote), Some(role)) => {
                write!(f, "{} with {} as {}", self.state, remote, role)
            }
            (Some(remote), None) => write!(f, "{} with {}", self.state, remote),
            _ => write!(f, "{}", self.state),
        }
    }
}
