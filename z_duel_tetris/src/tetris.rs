use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::board::Board;
use crate::config::{self, level_for_lines, line_reward};
use crate::piece::{Piece, PieceDescriptor, TetrominoType};
use crate::state::{PanelState, Snapshot};

// Offsets tried, in this order, when a rotation collides in place
const KICKS: [(i32, i32); 5] = [(1, 0), (-1, 0), (0, -1), (2, 0), (-2, 0)];

// Enum with all possible player actions
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Action {
    MoveLeft,
    MoveRight,
    Rotate,
    SoftDrop,
    HardDrop,
    Pause,
}

/// Outcome of a piece lock
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct LockReport {
    pub lines_cleared: u32,
    pub score_gained: u32,
    pub level_up: bool,
    // The next piece could not be placed
    pub game_over: bool,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FallResult {
    // Game not running or no piece
    Rejected,
    Moved,
    Locked(LockReport),
}

/// Desired state of the fall timer
///
/// `generation` changes every time the timer has to be replaced (start,
/// restart, level change) even if the interval stays the same.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct FallSchedule {
    pub interval: Duration,
    pub generation: u64,
}

/// One player's game
///
/// Pure simulation: it never sleeps and owns no timer. The caller drives it
/// with player actions and [`Tetris::move_down`] on every fall tick, and keeps
/// its timer in line with [`Tetris::fall_schedule`].
pub struct Tetris {
    rng: StdRng,
    // Locked cells
    board: Board,
    // Falling piece, none before start and after game over
    current: Option<Piece>,
    // Upcoming piece
    next: Option<TetrominoType>,
    score: u32,
    level: u32,
    // Total over the whole game
    lines_cleared: u32,
    fall_interval: Duration,
    game_over: bool,
    paused: bool,
    active: bool,
    generation: u64,
}

impl Default for Tetris {
    fn default() -> Self {
        Self::new()
    }
}

impl Tetris {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    // Reproducible piece sequence
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Tetris {
            rng,
            board: Board::new(),
            current: None,
            next: None,
            score: 0,
            level: 0,
            lines_cleared: 0,
            fall_interval: config::fall_interval(0),
            game_over: false,
            paused: false,
            active: false,
            generation: 0,
        }
    }

    /// Reset everything and begin a new game
    pub fn start(&mut self) {
        self.board = Board::new();
        self.current = None;
        self.next = None;
        self.score = 0;
        self.level = 0;
        self.lines_cleared = 0;
        self.fall_interval = config::fall_interval(0);
        self.game_over = false;
        self.paused = false;
        self.active = true;
        self.generation += 1;
        self.spawn_next();
    }

    pub fn restart(&mut self) {
        self.start();
    }

    fn draw(&mut self) -> TetrominoType {
        self.rng.random()
    }

    // Promote next to current and draw a new next. Returns false and ends the
    // game if the new piece does not fit.
    fn spawn_next(&mut self) -> bool {
        let kind = match self.next.take() {
            Some(kind) => kind,
            None => self.draw(),
        };
        self.next = Some(self.draw());
        let piece = Piece::spawn(kind);
        if self.board.collides_piece(&piece) {
            self.current = None;
            self.game_over = true;
            self.active = false;
            false
        } else {
            self.current = Some(piece);
            true
        }
    }

    fn can_act(&self) -> bool {
        self.active && !self.game_over && !self.paused
    }

    // Commit `candidate` as the current piece if it fits
    fn try_place(&mut self, candidate: Piece) -> bool {
        if self.board.collides_piece(&candidate) {
            return false;
        }
        self.current = Some(candidate);
        true
    }

    fn try_shift(&mut self, dx: i32, dy: i32) -> bool {
        if !self.can_act() {
            return false;
        }
        let Some(piece) = &self.current else {
            return false;
        };
        let candidate = piece.shifted(dx, dy);
        self.try_place(candidate)
    }

    pub fn move_left(&mut self) -> bool {
        self.try_shift(-1, 0)
    }

    pub fn move_right(&mut self) -> bool {
        self.try_shift(1, 0)
    }

    /// Rotate clockwise, trying the kicks in order if the rotation collides in place
    pub fn rotate(&mut self) -> bool {
        if !self.can_act() {
            return false;
        }
        let Some(piece) = &self.current else {
            return false;
        };
        let rotated = piece.with_shape(piece.shape().rotated());
        if !self.board.collides_piece(&rotated) {
            self.current = Some(rotated);
            return true;
        }
        for (dx, dy) in KICKS {
            if self.try_place(rotated.shifted(dx, dy)) {
                return true;
            }
        }
        false
    }

    /// One row down, or lock the piece if it can't go further
    pub fn move_down(&mut self) -> FallResult {
        if !self.can_act() {
            return FallResult::Rejected;
        }
        let Some(piece) = &self.current else {
            return FallResult::Rejected;
        };
        let candidate = piece.shifted(0, 1);
        if self.try_place(candidate) {
            FallResult::Moved
        } else {
            FallResult::Locked(self.lock())
        }
    }

    /// Drop the piece as far as it goes and lock it
    pub fn hard_drop(&mut self) -> Option<LockReport> {
        if !self.can_act() {
            return None;
        }
        let mut piece = self.current.clone()?;
        loop {
            let candidate = piece.shifted(0, 1);
            if self.board.collides_piece(&candidate) {
                break;
            }
            piece = candidate;
        }
        self.current = Some(piece);
        Some(self.lock())
    }

    fn lock(&mut self) -> LockReport {
        let mut report = LockReport::default();
        let Some(piece) = self.current.take() else {
            return report;
        };
        self.board.lock(&piece);

        let lines = self.board.clear_full_lines();
        // Reward uses the level before this lock
        report.lines_cleared = lines;
        report.score_gained = line_reward(lines, self.level);
        self.score += report.score_gained;
        self.lines_cleared += lines;

        let level = level_for_lines(self.lines_cleared);
        if level > self.level {
            self.level = level;
            self.fall_interval = config::fall_interval(level);
            self.generation += 1;
            report.level_up = true;
        }

        report.game_over = !self.spawn_next();
        report
    }

    /// Toggle pause; refused when no game is running
    pub fn pause(&mut self) -> bool {
        if !self.active || self.game_over {
            return false;
        }
        self.paused = !self.paused;
        true
    }

    pub fn perform(&mut self, action: Action) -> bool {
        match action {
            Action::MoveLeft => self.move_left(),
            Action::MoveRight => self.move_right(),
            Action::Rotate => self.rotate(),
            Action::SoftDrop => self.move_down() != FallResult::Rejected,
            Action::HardDrop => self.hard_drop().is_some(),
            Action::Pause => self.pause(),
        }
    }

    /// Snapshot for the opponent, by value
    pub fn get_state(&self) -> Snapshot {
        Snapshot {
            board: self.board.clone(),
            score: self.score,
            next_piece: self.next.map(PieceDescriptor::from),
            level: self.level,
            game_over: self.game_over,
        }
    }

    /// Local view, with the falling piece drawn into the board
    pub fn view(&self) -> PanelState {
        let board = match &self.current {
            Some(piece) => self.board.with_piece(piece),
            None => self.board.clone(),
        };
        PanelState {
            board,
            preview: self.next.map(PieceDescriptor::from),
            score: self.score,
            level: self.level,
            game_over: self.game_over,
            paused: self.paused,
        }
    }

    /// How the fall timer should run right now, `None` if it should be stopped
    pub fn fall_schedule(&self) -> Option<FallSchedule> {
        self.can_act().then_some(FallSchedule {
            interval: self.fall_interval,
            generation: self.generation,
        })
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn current(&self) -> Option<&Piece> {
        self.current.as_ref()
    }

    pub fn next(&self) -> Option<TetrominoType> {
        self.next
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn lines_cleared(&self) -> u32 {
        self.lines_cleared
    }

    pub fn fall_interval(&self) -> Duration {
        self.fall_interval
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::CellType;
    use crate::config::{COLS, ROWS};
    use zenoh_duel::{Decoded, Mirror, PeerMessage};

    fn started() -> Tetris {
        let mut game = Tetris::with_seed(42);
        game.start();
        game
    }

    fn fill_row(game: &mut Tetris, row: usize, except: &[usize]) {
        for col in 0..COLS {
            if !except.contains(&col) {
                game.board.set_cell(row, col, CellType::Z);
            }
        }
    }

    fn place(game: &mut Tetris, piece: Piece) {
        game.current = Some(piece);
    }

    #[test]
    fn test_start_state() {
        let game = started();
        assert!(game.is_active());
        assert!(!game.is_game_over());
        assert!(game.current().is_some());
        assert!(game.next().is_some());
        assert_eq!(game.score(), 0);
        assert_eq!(game.level(), 0);
        assert!(game.board().is_clear());
        assert_eq!(
            game.fall_schedule().map(|s| s.interval),
            Some(Duration::from_millis(1000))
        );
    }

    #[test]
    fn test_nothing_moves_before_start() {
        let mut game = Tetris::with_seed(1);
        assert!(!game.move_left());
        assert!(!game.rotate());
        assert_eq!(game.move_down(), FallResult::Rejected);
        assert!(game.hard_drop().is_none());
        assert!(!game.pause());
        assert!(game.fall_schedule().is_none());
    }

    #[test]
    fn test_o_piece_locks_at_bottom_center() {
        let mut game = started();
        place(&mut game, Piece::spawn(TetrominoType::O));

        let mut moves = 0;
        let report = loop {
            match game.move_down() {
                FallResult::Moved => moves += 1,
                FallResult::Locked(report) => break report,
                FallResult::Rejected => panic!("move rejected"),
            }
        };
        assert_eq!(moves, 18);
        assert_eq!(report.lines_cleared, 0);
        assert_eq!(game.score(), 0);
        assert_eq!(game.board().occupied_count(), 4);
        for (row, col) in [(18, 4), (18, 5), (19, 4), (19, 5)] {
            assert_eq!(game.board().get_cell(row, col), CellType::O);
        }
    }

    #[test]
    fn test_single_line_clear() {
        let mut game = started();
        fill_row(&mut game, ROWS - 1, &[4, 5]);
        place(&mut game, Piece::spawn(TetrominoType::O));

        let report = game.hard_drop().unwrap();
        assert_eq!(report.lines_cleared, 1);
        assert_eq!(report.score_gained, 40);
        assert_eq!(game.score(), 40);
        assert_eq!(game.lines_cleared(), 1);
        // The upper half of the O slid down into the bottom row
        assert_eq!(game.board().occupied_count(), 2);
        assert_eq!(game.board().get_cell(19, 4), CellType::O);
        assert_eq!(game.board().get_cell(19, 5), CellType::O);
        assert!(game.board().cells()[0].iter().all(|c| c.is_empty()));
    }

    #[test]
    fn test_four_lines_at_level_zero() {
        let mut game = started();
        for row in 16..ROWS {
            fill_row(&mut game, row, &[5]);
        }
        place(&mut game, Piece::spawn(TetrominoType::I));
        // Vertical bar lands on column 5
        assert!(game.rotate());
        assert_eq!(game.current().unwrap().x(), 3);

        let report = game.hard_drop().unwrap();
        assert_eq!(report.lines_cleared, 4);
        assert_eq!(game.score(), 1200);
        assert!(game.board().is_clear());
    }

    #[test]
    fn test_two_lines_at_level_two() {
        let mut game = started();
        game.level = 2;
        game.lines_cleared = 20;
        fill_row(&mut game, 18, &[4, 5]);
        fill_row(&mut game, 19, &[4, 5]);
        place(&mut game, Piece::spawn(TetrominoType::O));

        let report = game.hard_drop().unwrap();
        assert_eq!(report.lines_cleared, 2);
        assert_eq!(report.score_gained, 300);
        assert!(!report.level_up);
        assert_eq!(game.level(), 2);
    }

    #[test]
    fn test_level_up_replaces_schedule() {
        let mut game = started();
        game.lines_cleared = 9;
        let before = game.fall_schedule().unwrap();
        fill_row(&mut game, ROWS - 1, &[4, 5]);
        place(&mut game, Piece::spawn(TetrominoType::O));

        let report = game.hard_drop().unwrap();
        assert!(report.level_up);
        // Reward is computed at the level the lines were cleared at
        assert_eq!(report.score_gained, 40);
        assert_eq!(game.level(), 1);

        let after = game.fall_schedule().unwrap();
        assert_eq!(after.interval, Duration::from_millis(800));
        assert_ne!(after.generation, before.generation);
    }

    #[test]
    fn test_kick_order() {
        // T at (3, 5); its rotation occupies (5,4) (6,4) (6,5) (7,4)
        let t = Piece::spawn(TetrominoType::T).shifted(-1, 5);
        assert_eq!((t.x(), t.y()), (3, 5));

        // In place collides, +1 fits (and so would -1): +1 wins
        let mut game = started();
        game.board.set_cell(7, 4, CellType::J);
        place(&mut game, t.clone());
        assert!(game.rotate());
        let piece = game.current().unwrap();
        assert_eq!((piece.x(), piece.y()), (4, 5));
        assert_eq!(piece.shape(), &TetrominoType::T.shape().rotated());

        // +1 blocked: -1
        let mut game = started();
        game.board.set_cell(7, 4, CellType::J);
        game.board.set_cell(7, 5, CellType::J);
        place(&mut game, t.clone());
        assert!(game.rotate());
        let piece = game.current().unwrap();
        assert_eq!((piece.x(), piece.y()), (2, 5));

        // Both sideways kicks blocked: one row up
        let mut game = started();
        for col in 3..=5 {
            game.board.set_cell(7, col, CellType::J);
        }
        place(&mut game, t.clone());
        assert!(game.rotate());
        let piece = game.current().unwrap();
        assert_eq!((piece.x(), piece.y()), (3, 4));

        // Row up blocked too: two columns right
        let mut game = started();
        for col in 3..=5 {
            game.board.set_cell(7, col, CellType::J);
        }
        game.board.set_cell(4, 4, CellType::J);
        place(&mut game, t.clone());
        assert!(game.rotate());
        let piece = game.current().unwrap();
        assert_eq!((piece.x(), piece.y()), (5, 5));

        // Two right blocked: two columns left
        let mut game = started();
        for col in 3..=6 {
            game.board.set_cell(7, col, CellType::J);
        }
        game.board.set_cell(4, 4, CellType::J);
        place(&mut game, t.clone());
        assert!(game.rotate());
        let piece = game.current().unwrap();
        assert_eq!((piece.x(), piece.y()), (1, 5));

        // Every kick blocked: rotation fails and nothing changes
        let mut game = started();
        for col in 2..=6 {
            game.board.set_cell(7, col, CellType::J);
        }
        game.board.set_cell(4, 4, CellType::J);
        place(&mut game, t.clone());
        let before = game.get_state();
        assert!(!game.rotate());
        assert_eq!(game.get_state(), before);
        assert_eq!(game.current(), Some(&t));
    }

    #[test]
    fn test_rejected_commands_change_nothing() {
        let mut game = started();
        // Vertical I against the left wall, boxed in on the right
        let i = Piece::spawn(TetrominoType::I);
        let i = i.with_shape(i.shape().rotated()).shifted(-5, 10);
        for row in 8..ROWS {
            for col in 1..COLS {
                game.board.set_cell(row, col, CellType::S);
            }
        }
        place(&mut game, i);

        let state = game.get_state();
        let piece = game.current().cloned();
        assert!(!game.move_left());
        assert!(!game.move_right());
        assert!(!game.rotate());
        assert_eq!(game.get_state(), state);
        assert_eq!(game.current().cloned(), piece);
    }

    #[test]
    fn test_spawn_collision_ends_game() {
        let mut game = started();
        // Every spawn orientation touches row 1 at column 4 or 5
        game.board.set_cell(1, 4, CellType::L);
        game.board.set_cell(1, 5, CellType::L);
        place(&mut game, Piece::spawn(TetrominoType::O).shifted(-4, 0));

        let report = game.hard_drop().unwrap();
        assert!(report.game_over);
        assert!(game.is_game_over());
        assert!(!game.is_active());
        assert!(game.current().is_none());
        assert!(game.fall_schedule().is_none());
        // Only the locked O was written
        assert_eq!(game.board().occupied_count(), 6);
        for (row, col) in [(18, 0), (18, 1), (19, 0), (19, 1)] {
            assert_eq!(game.board().get_cell(row, col), CellType::O);
        }

        assert!(!game.move_left());
        assert!(!game.pause());
        assert!(game.get_state().game_over);

        game.restart();
        assert!(game.is_active());
        assert!(game.board().is_clear());
    }

    #[test]
    fn test_pause_suspends_play() {
        let mut game = started();
        let schedule = game.fall_schedule();
        assert!(game.pause());
        assert!(game.is_paused());
        assert!(game.fall_schedule().is_none());
        assert!(!game.move_left());
        assert!(!game.rotate());
        assert_eq!(game.move_down(), FallResult::Rejected);
        assert!(game.hard_drop().is_none());

        assert!(game.perform(Action::Pause));
        assert!(!game.is_paused());
        assert_eq!(game.fall_schedule(), schedule);
    }

    #[test]
    fn test_view_includes_falling_piece() {
        let game = started();
        let view = game.view();
        assert_eq!(view.board.occupied_count(), 4);
        assert!(game.get_state().board.is_clear());
        assert_eq!(view.preview, game.get_state().next_piece);
    }

    #[test]
    fn test_snapshot_round_trip_ignores_pause() {
        let mut game = started();
        game.hard_drop();
        game.hard_drop();
        let running = game.get_state();
        game.pause();
        let snapshot = game.get_state();
        assert_eq!(snapshot, running);

        let text = PeerMessage::GameState(snapshot.clone()).encode().unwrap();
        let Decoded::Message(PeerMessage::GameState(received)) =
            PeerMessage::<Snapshot>::decode(&text).unwrap()
        else {
            panic!("expected a game state");
        };
        let mut mirror = Mirror::<Snapshot>::new();
        mirror.apply(received);
        assert_eq!(mirror.get(), &snapshot);
    }
}
