//! Engineered board metrics.
//!
//! Every function here is a pure function of the locked board; the active
//! piece is never consulted. The six metrics below feed the observation
//! payload, and `well_sum` additionally feeds the heuristic agent.

use serde::{Deserialize, Serialize};

use crate::core::board::{Board, HEIGHT, WIDTH};

/// The observation's `features` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Features {
    pub agg_height: u32,
    pub bumpiness: u32,
    pub holes: u32,
    pub well_max: u32,
    pub row_trans: u32,
    pub col_trans: u32,
}

impl Features {
    /// Per-feature signed change, post minus pre.
    pub fn delta_from(&self, pre: &Features) -> FeatureDelta {
        FeatureDelta {
            agg_height: self.agg_height as i32 - pre.agg_height as i32,
            bumpiness: self.bumpiness as i32 - pre.bumpiness as i32,
            holes: self.holes as i32 - pre.holes as i32,
            well_max: self.well_max as i32 - pre.well_max as i32,
            row_trans: self.row_trans as i32 - pre.row_trans as i32,
            col_trans: self.col_trans as i32 - pre.col_trans as i32,
        }
    }
}

/// The `info.delta` block: feature changes relative to pre-step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeatureDelta {
    pub agg_height: i32,
    pub bumpiness: i32,
    pub holes: i32,
    pub well_max: i32,
    pub row_trans: i32,
    pub col_trans: i32,
}

/// Compute all six metrics in one pass over the derived views.
pub fn extract(board: &Board) -> Features {
    let heights = board.column_heights();
    let holes = board.holes_per_column();

    Features {
        agg_height: heights.iter().map(|&h| h as u32).sum(),
        bumpiness: heights
            .windows(2)
            .map(|w| (w[0] as i32 - w[1] as i32).unsigned_abs())
            .sum(),
        holes: holes.iter().map(|&h| h as u32).sum(),
        well_max: well_depths(board).into_iter().max().unwrap_or(0),
        row_trans: row_transitions(board),
        col_trans: col_transitions(board),
    }
}

/// Horizontally adjacent filled/empty flips, with out-of-board filled.
pub fn row_transitions(board: &Board) -> u32 {
    let mut count = 0;
    for y in 0..HEIGHT as i8 {
        let mut prev = true; // left wall
        for x in 0..WIDTH as i8 {
            let filled = board.is_occupied(x, y);
            if filled != prev {
                count += 1;
            }
            prev = filled;
        }
        if !prev {
            count += 1; // right wall
        }
    }
    count
}

/// Vertically adjacent filled/empty flips, with out-of-board filled.
pub fn col_transitions(board: &Board) -> u32 {
    let mut count = 0;
    for x in 0..WIDTH as i8 {
        let mut prev = true; // above the ceiling
        for y in 0..HEIGHT as i8 {
            let filled = board.is_occupied(x, y);
            if filled != prev {
                count += 1;
            }
            prev = filled;
        }
        if !prev {
            count += 1; // floor
        }
    }
    count
}

/// Deepest single well across all columns.
pub fn well_max(board: &Board) -> u32 {
    well_depths(board).into_iter().max().unwrap_or(0)
}

/// Total well depth across all columns (the heuristic's "well sums" term).
pub fn well_sum(board: &Board) -> u32 {
    well_depths(board).into_iter().sum()
}

/// Depth of the topmost well in each column.
///
/// A well cell is empty with both lateral neighbors (or the wall) filled;
/// the depth is the length of the first consecutive run of such cells
/// scanning from the top of the column downward.
fn well_depths(board: &Board) -> [u32; WIDTH] {
    let mut depths = [0u32; WIDTH];
    for x in 0..WIDTH as i8 {
        let mut depth = 0u32;
        for y in 0..HEIGHT as i8 {
            let walled = !board.is_free(x - 1, y) && !board.is_free(x + 1, y);
            if board.is_free(x, y) && walled {
                depth += 1;
            } else if depth > 0 {
                break;
            }
        }
        depths[x as usize] = depth;
    }
    depths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PieceKind;

    fn stack(columns: &[(i8, u8)]) -> Board {
        let mut board = Board::new();
        for &(x, height) in columns {
            for i in 0..height {
                board.set(x, HEIGHT as i8 - 1 - i as i8, Some(PieceKind::J));
            }
        }
        board
    }

    #[test]
    fn empty_board_features() {
        let f = extract(&Board::new());
        assert_eq!(f.agg_height, 0);
        assert_eq!(f.bumpiness, 0);
        assert_eq!(f.holes, 0);
        assert_eq!(f.well_max, 0);
        assert_eq!(f.row_trans, 0);
        // Each empty column flips once at the ceiling and once at the floor.
        assert_eq!(f.col_trans, 2 * WIDTH as u32);
    }

    #[test]
    fn aggregate_height_and_bumpiness() {
        let board = stack(&[(0, 3), (1, 1), (2, 4)]);
        let f = extract(&board);
        assert_eq!(f.agg_height, 8);
        // |3-1| + |1-4| + |4-0| + zeros
        assert_eq!(f.bumpiness, 2 + 3 + 4);
    }

    #[test]
    fn holes_are_covered_empties() {
        let mut board = stack(&[(4, 1)]);
        board.set(4, 10, Some(PieceKind::T));
        // Column 4: filled at y=10 and y=19, empty 11..=18 -> 8 holes.
        assert_eq!(extract(&board).holes, 8);
    }

    #[test]
    fn row_transitions_count_wall_pairs() {
        let mut board = Board::new();
        board.set(4, 19, Some(PieceKind::S));
        // Row 19: wall|empty(x4), empty->filled, filled->empty, empty(x5)|wall.
        assert_eq!(row_transitions(&board), 4);
    }

    #[test]
    fn col_transitions_full_column_is_flat() {
        let board = stack(&[(0, 20)]);
        // Column 0 never flips; the other nine flip twice each.
        assert_eq!(col_transitions(&board), 2 * 9);
    }

    #[test]
    fn well_between_two_towers() {
        // Columns 3 and 5 filled to height 4; column 4 empty.
        let board = stack(&[(3, 4), (5, 4)]);
        assert_eq!(well_max(&board), 4);
        assert_eq!(well_sum(&board), 4);
    }

    #[test]
    fn edge_column_well_uses_wall() {
        let board = stack(&[(1, 3)]);
        // Column 0: wall on the left, column 1 filled for its top 3 rows.
        assert_eq!(well_depths(&board)[0], 3);
    }

    #[test]
    fn features_depend_on_cells_only() {
        let board = stack(&[(0, 2), (7, 5)]);
        let reencoded = Board::from_encoded(&board.encode());
        assert_eq!(extract(&board), extract(&reencoded));
    }
}
