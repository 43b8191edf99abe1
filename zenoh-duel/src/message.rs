//! Wire messages exchanged between the two peers
//!
//! Exactly two shapes travel over a link, both JSON objects tagged by `type`:
//!
//! - `{ "type": "gameState", ...snapshot fields }`
//! - `{ "type": "restart" }`
//!
//! Anything else is reported as [`Decoded::Unknown`] so the receiver can log
//! and drop it.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{DuelError, Result};

const TYPE_FIELD: &str = "type";
const TYPE_GAME_STATE: &str = "gameState";
const TYPE_RESTART: &str = "restart";

/// Message sent over an established link
#[derive(Debug, Clone, PartialEq)]
pub enum PeerMessage<S> {
    /// Periodic snapshot of the sender's game
    GameState(S),
    /// Ask the receiver to restart its own game
    Restart,
}

/// Result of decoding a received payload
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<S> {
    Message(PeerMessage<S>),
    /// Well-formed object carrying a `type` we don't know
    Unknown(String),
}

impl<S> PeerMessage<S>
where
    S: Serialize + DeserializeOwned,
{
    pub fn encode(&self) -> Result<String> {
        match self {
            PeerMessage::GameState(snapshot) => encode_snapshot(snapshot),
            PeerMessage::Restart => {
                let mut object = serde_json::Map::new();
                object.insert(TYPE_FIELD.to_string(), TYPE_RESTART.into());
                Ok(serde_json::Value::Object(object).to_string())
            }
        }
    }

    /// Decode a payload; malformed JSON or a bad snapshot body is an error
    pub fn decode(text: &str) -> Result<Decoded<S>> {
        let mut value: serde_json::Value = serde_json::from_str(text)?;
        let object = value
            .as_object_mut()
            .ok_or_else(|| DuelError::Serialization("message is not a JSON object".to_string()))?;
        let kind = match object.remove(TYPE_FIELD) {
            Some(serde_json::Value::String(kind)) => kind,
            Some(other) => {
                return Err(DuelError::Serialization(format!(
                    "message type is not a string: {}",
                    other
                )));
            }
            None => {
                return Err(DuelError::Serialization(
                    "message has no type field".to_string(),
                ));
            }
        };

        match kind.as_str() {
            TYPE_GAME_STATE => {
                let snapshot: S = serde_json::from_value(value)?;
                Ok(Decoded::Message(PeerMessage::GameState(snapshot)))
            }
            TYPE_RESTART => Ok(Decoded::Message(PeerMessage::Restart)),
            _ => Ok(Decoded::Unknown(kind)),
        }
    }
}

/// Encode a snapshot as a `gameState` message without taking ownership of it
///
/// The snapshot must serialize as a JSON object; its fields sit next to `type`.
pub fn encode_snapshot<S: Serialize>(snapshot: &S) -> Result<String> {
    let mut value = serde_json::to_value(snapshot)?;
    let object = value.as_object_mut().ok_or_else(|| {
        DuelError::Serialization("snapshot must serialize as a JSON object".to_string())
    })?;
    object.insert(TYPE_FIELD.to_string(), TYPE_GAME_STATE.into());
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct TestSnapshot {
        score: u32,
        game_over: bool,
    }

    #[test]
    fn test_game_state_shape() {
        let msg = PeerMessage::GameState(TestSnapshot { score: 40, game_over: false });
        let text = msg.encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "gameState");
        assert_eq!(value["score"], 40);
        assert_eq!(value["gameOver"], false);

        let decoded = PeerMessage::<TestSnapshot>::decode(&text).unwrap();
        assert_eq!(decoded, Decoded::Message(msg));
    }

    #[test]
    fn test_restart_shape() {
        let text = PeerMessage::<TestSnapshot>::Restart.encode().unwrap();
        assert_eq!(text, r#"{"type":"restart"}"#);
        assert_eq!(
            PeerMessage::<TestSnapshot>::decode(&text).unwrap(),
            Decoded::Message(PeerMessage::Restart)
        );
    }

    #[test]
    fn test_unknown_type_is_not_an_error() {
        let decoded = PeerMessage::<TestSnapshot>::decode(r#"{"type":"chat","text":"hi"}"#).unwrap();
        assert_eq!(decoded, Decoded::Unknown("chat".to_string()));
    }

    #[test]
    fn test_malformed_payloads_are_errors() {
        assert!(PeerMessage::<TestSnapshot>::decode("not json").is_err());
        assert!(PeerMessage::<TestSnapshot>::decode("[1,2,3]").is_err());
        assert!(PeerMessage::<TestSnapshot>::decode(r#"{"score":1}"#).is_err());
        assert!(PeerMessage::<TestSnapshot>::decode(r#"{"type":7}"#).is_err());
        // Right type, wrong body
        assert!(PeerMessage::<TestSnapshot>::decode(r#"{"type":"gameState","score":"x"}"#).is_err());
    }

    #[test]
    fn test_non_object_snapshot_is_rejected() {
        assert!(encode_snapshot(&42u32).is_err());
    }
}
