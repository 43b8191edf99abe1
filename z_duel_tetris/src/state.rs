use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::piece::PieceDescriptor;

/// What one player shows the other
///
/// Deliberately leaves out the falling piece position and the paused/active
/// flags: the opponent only draws the locked board and the upcoming piece.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub board: Board,
    pub score: u32,
    pub next_piece: Option<PieceDescriptor>,
    pub level: u32,
    pub game_over: bool,
}

/// Everything needed to draw one side of the screen
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PanelState {
    // Locked cells with the falling piece drawn in
    pub board: Board,
    pub preview: Option<PieceDescriptor>,
    pub score: u32,
    pub level: u32,
    pub game_over: bool,
    pub paused: bool,
}

impl From<&Snapshot> for PanelState {
    fn from(snapshot: &Snapshot) -> Self {
        PanelState {
            board: snapshot.board.clone(),
            preview: snapshot.next_piece.clone(),
            score: snapshot.score,
            level: snapshot.level,
            game_over: snapshot.game_over,
            paused: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::TetrominoType;

    #[test]
    fn test_snapshot_field_names() {
        let snapshot = Snapshot {
            next_piece: Some(TetrominoType::T.into()),
            score: 40,
            level: 1,
            ..Default::default()
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("nextPiece").is_some());
        assert!(json.get("gameOver").is_some());
        assert_eq!(json["score"], 40);
        assert_eq!(json["board"].as_array().unwrap().len(), 20);
        assert!(json.get("paused").is_none());
    }

    #[test]
    fn test_panel_from_snapshot() {
        let snapshot = Snapshot {
            game_over: true,
            ..Default::default()
        };
        let panel = PanelState::from(&snapshot);
        assert!(panel.game_over);
        assert!(!panel.paused);
        assert!(panel.preview.is_none());
    }
}
