//! Legal final placements for the active (and holdable) piece.
//!
//! Candidates start at the spawn row and hard-drop straight down; tucks
//! and spins reachable only through intermediate motion are intentionally
//! absent. Symmetric rotations (O, I 0/2 and 1/3, S/Z halves) land on
//! identical cell sets and are deduplicated.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::core::board::Board;
use crate::core::pieces::{anchor_x_range, Piece, SPAWN_Y};
use crate::types::{PieceKind, Rotation};

/// One enumerated placement, as exposed in `legal_moves`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalMove {
    pub x: i8,
    pub rot: u8,
    pub use_hold: bool,
    pub harddrop_y: i8,
}

/// Piece the hold branch would make active, if holding is possible.
///
/// With an occupied slot that's the held kind; with an empty slot the
/// next bag piece becomes active. Returns None when hold was already
/// used this piece lifecycle.
pub fn hold_alternative(
    hold: Option<PieceKind>,
    hold_used: bool,
    next: PieceKind,
) -> Option<PieceKind> {
    if hold_used {
        None
    } else {
        Some(hold.unwrap_or(next))
    }
}

/// Enumerate every collision-free drop placement.
pub fn enumerate(
    board: &Board,
    current: PieceKind,
    hold: Option<PieceKind>,
    hold_used: bool,
    next: PieceKind,
) -> Vec<LegalMove> {
    let mut out = Vec::new();
    let mut seen: HashSet<([(i8, i8); 4], bool)> = HashSet::new();

    enumerate_kind(board, current, false, &mut seen, &mut out);
    if let Some(alt) = hold_alternative(hold, hold_used, next) {
        enumerate_kind(board, alt, true, &mut seen, &mut out);
    }

    out
}

fn enumerate_kind(
    board: &Board,
    kind: PieceKind,
    use_hold: bool,
    seen: &mut HashSet<([(i8, i8); 4], bool)>,
    out: &mut Vec<LegalMove>,
) {
    for rotation in Rotation::ALL {
        let (lo, hi) = anchor_x_range(kind, rotation);
        for x in lo..=hi {
            let start = Piece {
                kind,
                x,
                y: SPAWN_Y,
                rotation,
            };
            // Unreachable if the column is blocked at the spawn row.
            if board.collides(&start) {
                continue;
            }

            let mut landing = start;
            while !board.collides(&landing.translated(0, 1)) {
                landing = landing.translated(0, 1);
            }

            let mut cells = landing.cells();
            cells.sort_unstable();
            if seen.insert((cells, use_hold)) {
                out.push(LegalMove {
                    x,
                    rot: rotation.index(),
                    use_hold,
                    harddrop_y: landing.y,
                });
            }
        }
    }
}
