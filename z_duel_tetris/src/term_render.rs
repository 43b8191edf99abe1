use crate::board::{Board, CellType};
use crate::config::PREVIEW_SIZE;
use crate::piece::PieceDescriptor;
use crate::state::PanelState;

#[derive(Debug, Clone, PartialEq)]
pub enum TermCell {
    BoardCell(CellType),
    BorderVertical,
    BorderHorizontal,
    BorderTopLeft,
    BorderTopRight,
    BorderBottomLeft,
    BorderBottomRight,
    Space,
    Message(String),
}

pub trait TermStyle {
    fn display<'a>(&self, cell: &'a TermCell) -> &'a str;

    fn width(&self, cell: &TermCell) -> usize {
        match cell {
            TermCell::BoardCell(_) | TermCell::BorderHorizontal => 2,
            TermCell::Message(s) => console::measure_text_width(s),
            _ => 1,
        }
    }

    fn line_width(&self, line: &[TermCell]) -> usize {
        line.iter().map(|cell| self.width(cell)).sum()
    }
}

pub trait TermRender {
    fn output(&self, style: &impl TermStyle) -> Vec<Vec<TermCell>>;

    fn render(&self, style: &impl TermStyle) -> Vec<String> {
        self.output(style)
            .iter()
            .map(|row| row.iter().map(|cell| style.display(cell)).collect())
            .collect()
    }
}

// Make all lines in block the same width by padding with TermCell::Space
pub fn pad_block_right(block: &mut [Vec<TermCell>], style: &impl TermStyle) {
    let width = block
        .iter()
        .map(|row| style.line_width(row))
        .max()
        .unwrap_or(0);
    for row in block.iter_mut() {
        let padding = width.saturating_sub(style.line_width(row));
        row.extend(std::iter::repeat_n(TermCell::Space, padding));
    }
}

// Place blocks side by side, `gap` spaces apart, top aligned
pub fn join_blocks(
    mut blocks: Vec<Vec<Vec<TermCell>>>,
    gap: usize,
    style: &impl TermStyle,
) -> Vec<Vec<TermCell>> {
    let height = blocks.iter().map(|block| block.len()).max().unwrap_or(0);
    for block in blocks.iter_mut() {
        block.resize(height, Vec::new());
        pad_block_right(block, style);
    }
    (0..height)
        .map(|i| {
            let mut line = Vec::new();
            for (n, block) in blocks.iter().enumerate() {
                if n > 0 {
                    line.extend(std::iter::repeat_n(TermCell::Space, gap));
                }
                line.extend(block[i].iter().cloned());
            }
            line
        })
        .collect()
}

pub struct PlainTermStyle;

impl TermStyle for PlainTermStyle {
    fn display<'a>(&self, cell: &'a TermCell) -> &'a str {
        match cell {
            TermCell::BoardCell(CellType::Empty) => "  ",
            TermCell::BoardCell(_) => "[]",
            TermCell::BorderVertical => "|",
            TermCell::BorderTopLeft
            | TermCell::BorderTopRight
            | TermCell::BorderBottomLeft
            | TermCell::BorderBottomRight => "+",
            TermCell::BorderHorizontal => "--",
            TermCell::Space => " ",
            TermCell::Message(s) => s.as_str(),
        }
    }
}

pub struct AnsiTermStyle;

impl TermStyle for AnsiTermStyle {
    fn display<'a>(&self, cell: &'a TermCell) -> &'a str {
        match cell {
            TermCell::BoardCell(CellType::Empty) => "\x1b[0m  ",
            TermCell::BoardCell(CellType::I) => "\x1b[0;36m[]",
            TermCell::BoardCell(CellType::J) => "\x1b[0;34m[]",
            TermCell::BoardCell(CellType::L) => "\x1b[0;37m[]",
            TermCell::BoardCell(CellType::O) => "\x1b[0;33m[]",
            TermCell::BoardCell(CellType::S) => "\x1b[0;32m[]",
            TermCell::BoardCell(CellType::T) => "\x1b[0;35m[]",
            TermCell::BoardCell(CellType::Z) => "\x1b[0;31m[]",
            TermCell::BorderVertical => "\x1b[0m│",
            TermCell::BorderTopLeft => "\x1b[0m┌",
            TermCell::BorderTopRight => "\x1b[0m┐",
            TermCell::BorderBottomLeft => "\x1b[0m└",
            TermCell::BorderHorizontal => "\x1b[0m──",
            TermCell::BorderBottomRight => "\x1b[0m┘",
            TermCell::Space => " ",
            TermCell::Message(s) => s.as_str(),
        }
    }
}

fn cells_output(cells: &[Vec<CellType>]) -> Vec<Vec<TermCell>> {
    cells
        .iter()
        .map(|row| row.iter().map(|cell| TermCell::BoardCell(*cell)).collect())
        .collect()
}

fn horizontal_border(left: TermCell, cols: usize, right: TermCell) -> Vec<TermCell> {
    let mut line = vec![left];
    line.extend(std::iter::repeat_n(TermCell::BorderHorizontal, cols));
    line.push(right);
    line
}

fn framed_sides(lines: &mut [Vec<TermCell>]) {
    for line in lines.iter_mut() {
        line.insert(0, TermCell::BorderVertical);
        line.push(TermCell::BorderVertical);
    }
}

impl TermRender for Board {
    fn output(&self, _style: &impl TermStyle) -> Vec<Vec<TermCell>> {
        cells_output(self.cells())
    }
}

/// The well, open at the top, with an optional centered overlay
pub struct WellField<'a> {
    board: &'a Board,
    overlay: Option<&'static str>,
}

impl<'a> WellField<'a> {
    pub fn new(board: &'a Board, overlay: Option<&'static str>) -> Self {
        Self { board, overlay }
    }
}

impl TermRender for WellField<'_> {
    fn output(&self, style: &impl TermStyle) -> Vec<Vec<TermCell>> {
        let mut lines = self.board.output(style);
        if let Some(text) = self.overlay {
            let width = self
                .board
                .cols()
                .saturating_mul(style.width(&TermCell::BoardCell(CellType::Empty)));
            let left = width.saturating_sub(text.len()) / 2;
            let middle = lines.len() / 2;
            let mut line: Vec<TermCell> = std::iter::repeat_n(TermCell::Space, left).collect();
            line.push(TermCell::Message(text.to_string()));
            lines[middle] = line;
            pad_block_right(&mut lines, style);
        }

        framed_sides(&mut lines);
        lines.push(horizontal_border(
            TermCell::BorderBottomLeft,
            self.board.cols(),
            TermCell::BorderBottomRight,
        ));
        lines
    }
}

/// Boxed preview of the upcoming piece
pub struct PreviewField {
    cells: Vec<Vec<CellType>>,
}

impl PreviewField {
    pub fn new(piece: Option<&PieceDescriptor>) -> Self {
        let mut cells = vec![vec![CellType::Empty; PREVIEW_SIZE]; PREVIEW_SIZE];
        if let Some(piece) = piece {
            let cell = piece.kind.cell_type();
            for (row, col) in piece.shape.cells() {
                if row < PREVIEW_SIZE && col < PREVIEW_SIZE {
                    cells[row][col] = cell;
                }
            }
        }
        Self { cells }
    }
}

impl TermRender for PreviewField {
    fn output(&self, _style: &impl TermStyle) -> Vec<Vec<TermCell>> {
        let mut lines = cells_output(&self.cells);
        framed_sides(&mut lines);
        lines.insert(
            0,
            horizontal_border(TermCell::BorderTopLeft, PREVIEW_SIZE, TermCell::BorderTopRight),
        );
        lines.push(horizontal_border(
            TermCell::BorderBottomLeft,
            PREVIEW_SIZE,
            TermCell::BorderBottomRight,
        ));
        lines
    }
}

/// One player's well plus the column with preview and counters
pub struct PlayerPanel<'a> {
    title: String,
    state: &'a PanelState,
    // No opponent to show yet
    waiting: bool,
}

impl<'a> PlayerPanel<'a> {
    pub fn new(title: impl Into<String>, state: &'a PanelState) -> Self {
        Self {
            title: title.into(),
            state,
            waiting: false,
        }
    }

    pub fn waiting(mut self, waiting: bool) -> Self {
        self.waiting = waiting;
        self
    }

    fn overlay(&self) -> Option<&'static str> {
        if self.waiting {
            Some("Waiting...")
        } else if self.state.game_over {
            Some("Game Over")
        } else if self.state.paused {
            Some("Paused")
        } else {
            None
        }
    }
}

impl TermRender for PlayerPanel<'_> {
    fn output(&self, style: &impl TermStyle) -> Vec<Vec<TermCell>> {
        let well = WellField::new(&self.state.board, self.overlay()).output(style);

        let mut info = PreviewField::new(self.state.preview.as_ref()).output(style);
        info.push(Vec::new());
        info.push(vec![TermCell::Message(self.title.clone())]);
        info.push(vec![TermCell::Message(format!("Score: {}", self.state.score))]);
        info.push(vec![TermCell::Message(format!("Level: {}", self.state.level))]);

        join_blocks(vec![well, info], 1, style)
    }
}

/// Whole screen: local game, opponent mirror, status lines below
pub struct DuelScreen<'a> {
    local: PlayerPanel<'a>,
    opponent: PlayerPanel<'a>,
    status: Vec<String>,
}

impl<'a> DuelScreen<'a> {
    pub fn new(local: PlayerPanel<'a>, opponent: PlayerPanel<'a>, status: Vec<String>) -> Self {
        Self {
            local,
            opponent,
            status,
        }
    }
}

impl TermRender for DuelScreen<'_> {
    fn output(&self, style: &impl TermStyle) -> Vec<Vec<TermCell>> {
        let mut lines = join_blocks(
            vec![self.local.output(style), self.opponent.output(style)],
            3,
            style,
        );
        lines.push(Vec::new());
        for message in &self.status {
            lines.push(vec![TermCell::Message(message.clone())]);
        }
        // Overwrite leftovers of longer lines from the previous frame
        pad_block_right(&mut lines, style);
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{COLS, ROWS};
    use crate::piece::TetrominoType;

    #[test]
    fn test_well_dimensions() {
        let board = Board::new();
        let lines = WellField::new(&board, None).render(&PlainTermStyle);
        assert_eq!(lines.len(), ROWS + 1);
        assert!(lines.iter().all(|l| l.len() == COLS * 2 + 2));
        assert_eq!(lines[ROWS], format!("+{}+", "--".repeat(COLS)));
    }

    #[test]
    fn test_overlay_is_centered() {
        let board = Board::new();
        let lines = WellField::new(&board, Some("Game Over")).render(&PlainTermStyle);
        let middle = &lines[ROWS / 2];
        assert_eq!(middle.len(), COLS * 2 + 2);
        assert_eq!(middle.trim_matches(|c| c == '|' || c == ' '), "Game Over");
        assert_eq!(middle.find("Game"), Some(1 + (20 - 9) / 2));
    }

    #[test]
    fn test_preview_draws_piece() {
        let piece = PieceDescriptor::from(TetrominoType::T);
        let lines = PreviewField::new(Some(&piece)).render(&PlainTermStyle);
        assert_eq!(lines.len(), PREVIEW_SIZE + 2);
        assert_eq!(lines[1], "|  []    |");
        assert_eq!(lines[2], "|[][][]  |");

        let empty = PreviewField::new(None).render(&PlainTermStyle);
        assert_eq!(empty[1], "|        |");
    }

    #[test]
    fn test_panel_overlays() {
        let mut state = PanelState::default();
        let waiting = PlayerPanel::new("opponent", &state).waiting(true);
        assert_eq!(waiting.overlay(), Some("Waiting..."));

        state.paused = true;
        assert_eq!(PlayerPanel::new("me", &state).overlay(), Some("Paused"));
        state.game_over = true;
        assert_eq!(PlayerPanel::new("me", &state).overlay(), Some("Game Over"));
    }

    #[test]
    fn test_screen_layout() {
        let local = PanelState {
            score: 1200,
            ..Default::default()
        };
        let opponent = PanelState::default();
        let screen = DuelScreen::new(
            PlayerPanel::new("you", &local),
            PlayerPanel::new("opponent", &opponent).waiting(true),
            vec!["status line".to_string()],
        );
        let lines = screen.render(&PlainTermStyle);

        assert_eq!(lines.len(), ROWS + 1 + 2);
        let width = lines[0].len();
        assert!(lines.iter().all(|l| l.len() == width));
        assert!(lines.iter().any(|l| l.contains("Score: 1200")));
        assert!(lines.iter().any(|l| l.contains("Waiting...")));
        assert!(lines.last().unwrap().starts_with("status line"));
    }
}
