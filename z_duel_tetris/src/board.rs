use serde::{Deserialize, Serialize};

use crate::config::{COLS, ROWS};
use crate::piece::{Piece, Shape};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellType {
    #[default]
    Empty,
    I,
    J,
    L,
    O,
    S,
    T,
    Z,
}

impl CellType {
    pub fn is_empty(&self) -> bool {
        *self == CellType::Empty
    }
}

/// The well: `ROWS x COLS` cells, row 0 at the top
///
/// Serialized as a plain array of rows. Deserialization rejects any other size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<CellType>>", into = "Vec<Vec<CellType>>")]
pub struct Board {
    cells: Vec<Vec<CellType>>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<Vec<Vec<CellType>>> for Board {
    type Error = String;

    fn try_from(cells: Vec<Vec<CellType>>) -> Result<Self, Self::Error> {
        if cells.len() != ROWS {
            return Err(format!("board must have {} rows, got {}", ROWS, cells.len()));
        }
        if let Some(row) = cells.iter().find(|row| row.len() != COLS) {
            return Err(format!(
                "board rows must have {} columns, got {}",
                COLS,
                row.len()
            ));
        }
        Ok(Board { cells })
    }
}

impl From<Board> for Vec<Vec<CellType>> {
    fn from(board: Board) -> Self {
        board.cells
    }
}

impl Board {
    pub fn new() -> Self {
        Board {
            cells: vec![vec![CellType::Empty; COLS]; ROWS],
        }
    }

    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    pub fn cols(&self) -> usize {
        COLS
    }

    pub fn get_cell(&self, row: usize, col: usize) -> CellType {
        self.cells
            .get(row)
            .and_then(|r| r.get(col))
            .copied()
            .unwrap_or(CellType::Empty)
    }

    pub(crate) fn set_cell(&mut self, row: usize, col: usize, cell: CellType) {
        if row < ROWS && col < COLS {
            self.cells[row][col] = cell;
        }
    }

    pub fn occupied_count(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|cell| !cell.is_empty())
            .count()
    }

    pub fn is_clear(&self) -> bool {
        self.occupied_count() == 0
    }

    // A placement collides if any occupied sub-cell is outside the columns,
    // at or below the floor, or on an occupied cell. Sub-cells above the top
    // never collide.
    pub fn collides(&self, shape: &Shape, x: i32, y: i32) -> bool {
        shape.cells().any(|(r, c)| {
            let row = y + r as i32;
            let col = x + c as i32;
            if col < 0 || col >= COLS as i32 || row >= ROWS as i32 {
                return true;
            }
            row >= 0 && !self.cells[row as usize][col as usize].is_empty()
        })
    }

    pub fn collides_piece(&self, piece: &Piece) -> bool {
        self.collides(piece.shape(), piece.x(), piece.y())
    }

    // Write the piece into the board, dropping sub-cells outside the well
    pub fn lock(&mut self, piece: &Piece) {
        let cell = piece.kind().cell_type();
        for (r, c) in piece.shape().cells() {
            let row = piece.y() + r as i32;
            let col = piece.x() + c as i32;
            if row >= 0 && col >= 0 {
                self.set_cell(row as usize, col as usize, cell);
            }
        }
    }

    // Remove full rows bottom-up, inserting an empty row at the top for each,
    // and return how many were removed
    pub fn clear_full_lines(&mut self) -> u32 {
        let mut cleared = 0;
        let mut row = ROWS;
        while row > 0 {
            let index = row - 1;
            if self.cells[index].iter().all(|cell| !cell.is_empty()) {
                self.cells.remove(index);
                self.cells.insert(0, vec![CellType::Empty; COLS]);
                cleared += 1;
                // Same index holds the row that was above, check it again
            } else {
                row -= 1;
            }
        }
        cleared
    }

    // Copy of the board with the piece drawn in, for display
    pub fn with_piece(&self, piece: &Piece) -> Board {
        let mut board = self.clone();
        board.lock(piece);
        board
    }

    pub fn cells(&self) -> &[Vec<CellType>] {
        &self.cells
    }
}
