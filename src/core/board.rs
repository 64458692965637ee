//! The 10x20 playfield.
//!
//! Row-major grid of cells; (x, y) with x in 0..10 left to right and
//! y in 0..20 top to bottom. Gravity increases y.

use arrayvec::ArrayVec;

use crate::core::pieces::Piece;
use crate::types::{Cell, PieceKind, BOARD_HEIGHT, BOARD_WIDTH};

pub const WIDTH: usize = BOARD_WIDTH as usize;
pub const HEIGHT: usize = BOARD_HEIGHT as usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    /// Indexed as [y][x].
    cells: [[Cell; WIDTH]; HEIGHT],
}

impl Board {
    pub fn new() -> Self {
        Self {
            cells: [[None; WIDTH]; HEIGHT],
        }
    }

    /// Cell at (x, y); None when out of bounds.
    pub fn get(&self, x: i8, y: i8) -> Option<Cell> {
        if x < 0 || x >= WIDTH as i8 || y < 0 || y >= HEIGHT as i8 {
            return None;
        }
        Some(self.cells[y as usize][x as usize])
    }

    pub fn set(&mut self, x: i8, y: i8, cell: Cell) -> bool {
        if x < 0 || x >= WIDTH as i8 || y < 0 || y >= HEIGHT as i8 {
            return false;
        }
        self.cells[y as usize][x as usize] = cell;
        true
    }

    /// Within bounds and empty.
    pub fn is_free(&self, x: i8, y: i8) -> bool {
        matches!(self.get(x, y), Some(None))
    }

    pub fn is_occupied(&self, x: i8, y: i8) -> bool {
        matches!(self.get(x, y), Some(Some(_)))
    }

    /// True if any cell of the piece is out of bounds or overlaps a
    /// locked cell.
    pub fn collides(&self, piece: &Piece) -> bool {
        piece.cells().iter().any(|&(x, y)| !self.is_free(x, y))
    }

    /// True if the piece rests on the floor or the stack: one cell down
    /// would collide.
    pub fn is_grounded(&self, piece: &Piece) -> bool {
        self.collides(&piece.translated(0, 1))
    }

    /// Write the piece's four cells with its kind code.
    ///
    /// Requires `!collides(piece)`; exactly those four cells change from
    /// empty to the piece's kind.
    pub fn lock(&mut self, piece: &Piece) {
        debug_assert!(!self.collides(piece));
        for (x, y) in piece.cells() {
            self.set(x, y, Some(piece.kind));
        }
    }

    /// Remove every fully occupied row and shift the rows above downward.
    ///
    /// Returns the cleared row indices, bottom to top (0..=4 entries).
    /// Bottom-up two-pointer compaction; the result is equivalent to
    /// deleting the set of full rows and gravity-dropping the remainder.
    pub fn clear_lines(&mut self) -> ArrayVec<usize, 4> {
        let mut cleared = ArrayVec::new();
        let mut write_y = HEIGHT;

        for read_y in (0..HEIGHT).rev() {
            if self.row_full(read_y) {
                cleared.push(read_y);
            } else {
                write_y -= 1;
                if write_y != read_y {
                    self.cells[write_y] = self.cells[read_y];
                }
            }
        }

        for y in 0..write_y {
            self.cells[y] = [None; WIDTH];
        }

        cleared.reverse();
        cleared
    }

    pub fn row_full(&self, y: usize) -> bool {
        y < HEIGHT && self.cells[y].iter().all(|cell| cell.is_some())
    }

    /// Per-column stack height: 0 for an empty column, else
    /// `HEIGHT - topmost_filled_y`.
    pub fn column_heights(&self) -> [u8; WIDTH] {
        let mut heights = [0u8; WIDTH];
        for (x, height) in heights.iter_mut().enumerate() {
            for y in 0..HEIGHT {
                if self.cells[y][x].is_some() {
                    *height = (HEIGHT - y) as u8;
                    break;
                }
            }
        }
        heights
    }

    /// Per-column count of empty cells strictly below the column's
    /// topmost filled cell.
    pub fn holes_per_column(&self) -> [u8; WIDTH] {
        let mut holes = [0u8; WIDTH];
        for (x, count) in holes.iter_mut().enumerate() {
            let mut covered = false;
            for y in 0..HEIGHT {
                if self.cells[y][x].is_some() {
                    covered = true;
                } else if covered {
                    *count += 1;
                }
            }
        }
        holes
    }

    /// Flat row-major wire encoding: `cells[y * 10 + x]`, 0 = empty,
    /// 1..=7 = kind code.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(WIDTH * HEIGHT);
        for row in &self.cells {
            for cell in row {
                out.push(cell.map_or(0, PieceKind::code));
            }
        }
        out
    }

    /// Rebuild a board from the wire encoding. Codes outside 1..=7 decode
    /// as empty.
    pub fn from_encoded(cells: &[u8]) -> Self {
        let mut board = Self::new();
        for (i, &code) in cells.iter().take(WIDTH * HEIGHT).enumerate() {
            board.cells[i / WIDTH][i % WIDTH] = PieceKind::from_code(code);
        }
        board
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
