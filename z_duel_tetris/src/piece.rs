use rand::distr::{Distribution, StandardUniform};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::board::CellType;
use crate::config::COLS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TetrominoType {
    I,
    J,
    L,
    O,
    S,
    T,
    Z,
}

impl TetrominoType {
    pub const ALL: [TetrominoType; 7] = [
        TetrominoType::I,
        TetrominoType::J,
        TetrominoType::L,
        TetrominoType::O,
        TetrominoType::S,
        TetrominoType::T,
        TetrominoType::Z,
    ];

    // Spawn orientation. I is 4x4 with the bar on row 1, O is 2x2, the others
    // are 3x3 with an empty bottom row
    pub fn shape(&self) -> Shape {
        let rows: &[&[u8]] = match self {
            TetrominoType::I => &[&[0, 0, 0, 0], &[1, 1, 1, 1], &[0, 0, 0, 0], &[0, 0, 0, 0]],
            TetrominoType::J => &[&[1, 0, 0], &[1, 1, 1], &[0, 0, 0]],
            TetrominoType::L => &[&[0, 0, 1], &[1, 1, 1], &[0, 0, 0]],
            TetrominoType::O => &[&[1, 1], &[1, 1]],
            TetrominoType::S => &[&[0, 1, 1], &[1, 1, 0], &[0, 0, 0]],
            TetrominoType::T => &[&[0, 1, 0], &[1, 1, 1], &[0, 0, 0]],
            TetrominoType::Z => &[&[1, 1, 0], &[0, 1, 1], &[0, 0, 0]],
        };
        Shape::from_bits(rows)
    }

    // Cell type left on the board by this tetromino
    pub fn cell_type(&self) -> CellType {
        match self {
            TetrominoType::I => CellType::I,
            TetrominoType::J => CellType::J,
            TetrominoType::L => CellType::L,
            TetrominoType::O => CellType::O,
            TetrominoType::S => CellType::S,
            TetrominoType::T => CellType::T,
            TetrominoType::Z => CellType::Z,
        }
    }
}

// Uniform independent draw, with replacement
impl Distribution<TetrominoType> for StandardUniform {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> TetrominoType {
        TetrominoType::ALL[rng.random_range(0..TetrominoType::ALL.len())]
    }
}

/// Occupancy matrix of a piece, indexed `[row][col]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shape(Vec<Vec<bool>>);

impl Shape {
    pub fn new(rows: Vec<Vec<bool>>) -> Self {
        Shape(rows)
    }

    pub fn from_bits(rows: &[&[u8]]) -> Self {
        Shape(
            rows.iter()
                .map(|row| row.iter().map(|bit| *bit != 0).collect())
                .collect(),
        )
    }

    // Number of rows of the bounding box
    pub fn height(&self) -> usize {
        self.0.len()
    }

    // Number of columns of the bounding box
    pub fn width(&self) -> usize {
        self.0.first().map(|row| row.len()).unwrap_or(0)
    }

    pub fn is_filled(&self, row: usize, col: usize) -> bool {
        self.0
            .get(row)
            .and_then(|r| r.get(col))
            .copied()
            .unwrap_or(false)
    }

    // Offsets (row, col) of the occupied sub-cells
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.0.iter().enumerate().flat_map(|(row, cols)| {
            cols.iter()
                .enumerate()
                .filter(|(_, filled)| **filled)
                .map(move |(col, _)| (row, col))
        })
    }

    /// Clockwise rotation: transpose, then reverse the order of the source rows
    pub fn rotated(&self) -> Shape {
        let height = self.height();
        let rotated = (0..self.width())
            .map(|col| (0..height).rev().map(|row| self.0[row][col]).collect())
            .collect();
        Shape(rotated)
    }

    pub fn rows(&self) -> &[Vec<bool>] {
        &self.0
    }
}

/// Falling piece: shape plus top-left position of its bounding box
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    kind: TetrominoType,
    shape: Shape,
    x: i32,
    y: i32,
}

impl Piece {
    // Place a new piece at the top, horizontally centered
    pub fn spawn(kind: TetrominoType) -> Self {
        let shape = kind.shape();
        let x = (COLS / 2) as i32 - (shape.width() / 2) as i32;
        Piece {
            kind,
            shape,
            x,
            y: 0,
        }
    }

    pub fn kind(&self) -> TetrominoType {
        self.kind
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    // Same piece moved by (dx, dy)
    pub fn shifted(&self, dx: i32, dy: i32) -> Piece {
        Piece {
            kind: self.kind,
            shape: self.shape.clone(),
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    // Same position with another shape
    pub fn with_shape(&self, shape: Shape) -> Piece {
        Piece {
            kind: self.kind,
            shape,
            x: self.x,
            y: self.y,
        }
    }

    pub fn descriptor(&self) -> PieceDescriptor {
        PieceDescriptor {
            kind: self.kind,
            shape: self.shape.clone(),
        }
    }
}

/// Serializable description of a piece, enough to draw a preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceDescriptor {
    #[serde(rename = "type")]
    pub kind: TetrominoType,
    pub shape: Shape,
}

impl From<TetrominoType> for PieceDescriptor {
    fn from(kind: TetrominoType) -> Self {
        PieceDescriptor {
            kind,
            shape: kind.shape(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_bounding_boxes() {
        for kind in TetrominoType::ALL {
            let shape = kind.shape();
            let expected = match kind {
                TetrominoType::I => 4,
                TetrominoType::O => 2,
                _ => 3,
            };
            assert_eq!(shape.width(), expected, "{:?}", kind);
            assert_eq!(shape.height(), expected, "{:?}", kind);
            assert_eq!(shape.cells().count(), 4, "{:?}", kind);
        }
    }

    #[test]
    fn test_rotation_is_clockwise() {
        let t = TetrominoType::T.shape();
        assert_eq!(
            t.rotated(),
            Shape::from_bits(&[&[0, 1, 0], &[0, 1, 1], &[0, 1, 0]])
        );

        // The horizontal I bar on row 1 becomes a vertical bar on column 2
        let i = TetrominoType::I.shape().rotated();
        assert_eq!(i.cells().collect::<Vec<_>>(), vec![(0, 2), (1, 2), (2, 2), (3, 2)]);
    }

    #[test]
    fn test_four_rotations_are_identity() {
        for kind in TetrominoType::ALL {
            let shape = kind.shape();
            assert_eq!(shape.rotated().rotated().rotated().rotated(), shape);
        }
    }

    #[test]
    fn test_spawn_position() {
        assert_eq!(Piece::spawn(TetrominoType::O).x(), 4);
        assert_eq!(Piece::spawn(TetrominoType::I).x(), 3);
        assert_eq!(Piece::spawn(TetrominoType::T).x(), 4);
        assert_eq!(Piece::spawn(TetrominoType::T).y(), 0);
    }

    #[test]
    fn test_random_draw_covers_all_types() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            seen.insert(rng.random::<TetrominoType>());
        }
        assert_eq!(seen.len(), 7);
    }

    #[test]
    fn test_descriptor_wire_shape() {
        let json = serde_json::to_value(PieceDescriptor::from(TetrominoType::O)).unwrap();
        assert_eq!(json["type"], "O");
        assert_eq!(json["shape"], serde_json::json!([[true, true], [true, true]]));
    }
}
