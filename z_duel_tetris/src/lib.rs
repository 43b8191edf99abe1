//! Two-player falling-block game over zenoh-duel
//!
//! Each side runs its own [`Tetris`] and pushes [`Snapshot`]s to the opponent,
//! who only draws them.

pub mod board;
pub mod config;
pub mod input;
pub mod piece;
pub mod state;
pub mod term_render;
pub mod tetris;
pub mod timer;

pub use board::{Board, CellType};
pub use input::{Input, map_key};
pub use piece::{Piece, PieceDescriptor, Shape, TetrominoType};
pub use state::{PanelState, Snapshot};
pub use term_render::{
    AnsiTermStyle, DuelScreen, PlainTermStyle, PlayerPanel, TermRender, TermStyle,
};
pub use tetris::{Action, FallResult, FallSchedule, LockReport, Tetris};
pub use timer::FallTimer;
