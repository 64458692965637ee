//! Tetromino geometry and the Super Rotation System.
//!
//! Shape and kick tables are process-wide constants shared by the engine,
//! the move enumerator, and the agents. Reference: https://tetris.wiki/SRS
//!
//! All tables use this engine's y-down convention (y grows toward the
//! floor); the published SRS kick data is y-up, so its dy components are
//! negated here.

use crate::types::{PieceKind, Rotation, BOARD_WIDTH};

/// Offset of a single cell relative to the piece anchor, within a 4x4 frame.
pub type CellOffset = (i8, i8);

/// Four occupied offsets for one (kind, rotation).
pub type PieceShape = [CellOffset; 4];

/// Spawn anchor: the 4x4 frame sits at columns 3..=6, top row 0.
pub const SPAWN_X: i8 = 3;
pub const SPAWN_Y: i8 = 0;

/// Shape table indexed by `[kind.code() - 1][rotation.index()]`.
/// The I piece spans the full 4x4 frame; the rest fit 3x3 but share the
/// 4x4 addressing convention.
const SHAPES: [[PieceShape; 4]; 7] = [
    // I
    [
        [(0, 1), (1, 1), (2, 1), (3, 1)],
        [(2, 0), (2, 1), (2, 2), (2, 3)],
        [(0, 2), (1, 2), (2, 2), (3, 2)],
        [(1, 0), (1, 1), (1, 2), (1, 3)],
    ],
    // O (all four states identical)
    [
        [(1, 0), (2, 0), (1, 1), (2, 1)],
        [(1, 0), (2, 0), (1, 1), (2, 1)],
        [(1, 0), (2, 0), (1, 1), (2, 1)],
        [(1, 0), (2, 0), (1, 1), (2, 1)],
    ],
    // T
    [
        [(1, 0), (0, 1), (1, 1), (2, 1)],
        [(1, 0), (1, 1), (2, 1), (1, 2)],
        [(0, 1), (1, 1), (2, 1), (1, 2)],
        [(1, 0), (0, 1), (1, 1), (1, 2)],
    ],
    // S
    [
        [(1, 0), (2, 0), (0, 1), (1, 1)],
        [(1, 0), (1, 1), (2, 1), (2, 2)],
        [(1, 1), (2, 1), (0, 2), (1, 2)],
        [(0, 0), (0, 1), (1, 1), (1, 2)],
    ],
    // Z
    [
        [(0, 0), (1, 0), (1, 1), (2, 1)],
        [(2, 0), (1, 1), (2, 1), (1, 2)],
        [(0, 1), (1, 1), (1, 2), (2, 2)],
        [(1, 0), (0, 1), (1, 1), (0, 2)],
    ],
    // J
    [
        [(0, 0), (0, 1), (1, 1), (2, 1)],
        [(1, 0), (2, 0), (1, 1), (1, 2)],
        [(0, 1), (1, 1), (2, 1), (2, 2)],
        [(1, 0), (1, 1), (0, 2), (1, 2)],
    ],
    // L
    [
        [(2, 0), (0, 1), (1, 1), (2, 1)],
        [(1, 0), (1, 1), (1, 2), (2, 2)],
        [(0, 1), (1, 1), (2, 1), (0, 2)],
        [(0, 0), (1, 0), (1, 1), (1, 2)],
    ],
];

/// Local offsets for a (kind, rotation).
pub fn shape(kind: PieceKind, rotation: Rotation) -> PieceShape {
    SHAPES[(kind.code() - 1) as usize][rotation.index() as usize]
}

/// Kick lists: five (dx, dy) candidates per transition, starting with (0,0).
/// Indexed by [`kick_index`].
type KickTable = [[(i8, i8); 5]; 8];

/// Shared table for J, L, S, T, Z (y-down).
const JLSTZ_KICKS: KickTable = [
    // 0->1 (cw)
    [(0, 0), (-1, 0), (-1, -1), (0, 2), (-1, 2)],
    // 0->3 (ccw)
    [(0, 0), (1, 0), (1, -1), (0, 2), (1, 2)],
    // 1->0 (ccw)
    [(0, 0), (1, 0), (1, 1), (0, -2), (1, -2)],
    // 1->2 (cw)
    [(0, 0), (1, 0), (1, 1), (0, -2), (1, -2)],
    // 2->1 (ccw)
    [(0, 0), (-1, 0), (-1, -1), (0, 2), (-1, 2)],
    // 2->3 (cw)
    [(0, 0), (1, 0), (1, -1), (0, 2), (1, 2)],
    // 3->2 (ccw)
    [(0, 0), (-1, 0), (-1, 1), (0, -2), (-1, -2)],
    // 3->0 (cw)
    [(0, 0), (-1, 0), (-1, 1), (0, -2), (-1, -2)],
];

/// I-specific table (y-down).
const I_KICKS: KickTable = [
    // 0->1 (cw)
    [(0, 0), (-2, 0), (1, 0), (-2, 1), (1, -2)],
    // 0->3 (ccw)
    [(0, 0), (-1, 0), (2, 0), (-1, -2), (2, 1)],
    // 1->0 (ccw)
    [(0, 0), (2, 0), (-1, 0), (2, -1), (-1, 2)],
    // 1->2 (cw)
    [(0, 0), (-1, 0), (2, 0), (-1, -2), (2, 1)],
    // 2->1 (ccw)
    [(0, 0), (1, 0), (-2, 0), (1, 2), (-2, -1)],
    // 2->3 (cw)
    [(0, 0), (2, 0), (-1, 0), (2, -1), (-1, 2)],
    // 3->2 (ccw)
    [(0, 0), (-2, 0), (1, 0), (-2, 1), (1, -2)],
    // 3->0 (cw)
    [(0, 0), (1, 0), (-2, 0), (1, 2), (-2, -1)],
];

/// The O piece never displaces: a single identity kick.
const O_KICK: [(i8, i8); 1] = [(0, 0)];

/// Row index into the 8-entry kick tables for a (from, direction) pair.
fn kick_index(from: Rotation, clockwise: bool) -> usize {
    match (from, clockwise) {
        (Rotation::R0, true) => 0,
        (Rotation::R0, false) => 1,
        (Rotation::R1, false) => 2,
        (Rotation::R1, true) => 3,
        (Rotation::R2, false) => 4,
        (Rotation::R2, true) => 5,
        (Rotation::R3, false) => 6,
        (Rotation::R3, true) => 7,
    }
}

/// Ordered kick candidates for rotating `kind` out of `from`.
pub fn kicks(kind: PieceKind, from: Rotation, clockwise: bool) -> &'static [(i8, i8)] {
    match kind {
        PieceKind::O => &O_KICK,
        PieceKind::I => &I_KICKS[kick_index(from, clockwise)],
        _ => &JLSTZ_KICKS[kick_index(from, clockwise)],
    }
}

/// Active falling piece. A plain value: motion and rotation produce new
/// values, the environment replaces the one it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    pub kind: PieceKind,
    pub x: i8,
    pub y: i8,
    pub rotation: Rotation,
}

impl Piece {
    /// A new piece at the spawn anchor in spawn orientation.
    pub fn spawn(kind: PieceKind) -> Self {
        Self {
            kind,
            x: SPAWN_X,
            y: SPAWN_Y,
            rotation: Rotation::R0,
        }
    }

    /// Local offsets for the current rotation.
    pub fn shape(&self) -> PieceShape {
        shape(self.kind, self.rotation)
    }

    /// Absolute occupied cells.
    pub fn cells(&self) -> [(i8, i8); 4] {
        let mut out = self.shape();
        for cell in &mut out {
            cell.0 += self.x;
            cell.1 += self.y;
        }
        out
    }

    pub fn translated(&self, dx: i8, dy: i8) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    pub fn with_rotation(&self, rotation: Rotation) -> Self {
        Self { rotation, ..*self }
    }
}

/// Resolve a rotation request with wall kicks.
///
/// `is_free` reports whether a single absolute cell is inside the board
/// and unoccupied. Returns the kicked piece for the first offset whose
/// four cells are all free, or None when every kick fails (state is then
/// unchanged by the caller).
pub fn try_rotate(
    piece: &Piece,
    clockwise: bool,
    is_free: impl Fn(i8, i8) -> bool,
) -> Option<Piece> {
    let target = if clockwise {
        piece.rotation.cw()
    } else {
        piece.rotation.ccw()
    };
    let target_shape = shape(piece.kind, target);

    for &(dx, dy) in kicks(piece.kind, piece.rotation, clockwise) {
        let x = piece.x + dx;
        let y = piece.y + dy;
        if target_shape.iter().all(|&(mx, my)| is_free(x + mx, y + my)) {
            return Some(Piece {
                kind: piece.kind,
                x,
                y,
                rotation: target,
            });
        }
    }

    None
}

/// Inclusive anchor-x range over which `kind` at `rotation` stays within
/// the board walls. Used by the move enumerator.
pub fn anchor_x_range(kind: PieceKind, rotation: Rotation) -> (i8, i8) {
    let s = shape(kind, rotation);
    let mut min_dx = i8::MAX;
    let mut max_dx = i8::MIN;
    for &(dx, _) in &s {
        min_dx = min_dx.min(dx);
        max_dx = max_dx.max(dx);
    }
    (-min_dx, BOARD_WIDTH as i8 - 1 - max_dx)
}
