//! Core types shared across the engine and session layers.
//! Pure data types with no external dependencies beyond serde.

use serde::{Deserialize, Serialize};

/// Board dimensions
pub const BOARD_WIDTH: u8 = 10;
pub const BOARD_HEIGHT: u8 = 20;

/// Gravity cadence: the active piece descends one cell every this many ticks.
pub const GRAVITY_TICKS: u32 = 48;

/// Consecutive grounded ticks before a piece locks.
pub const LOCK_DELAY_TICKS: u32 = 30;

/// Number of upcoming pieces exposed in each observation.
pub const NEXT_QUEUE_LEN: usize = 3;

/// Line clear scoring: index = lines cleared in one lock.
pub const LINE_SCORES: [u32; 5] = [0, 100, 300, 500, 800];

/// Observation schema version stamped into every payload.
pub const SCHEMA_VERSION: &str = "s1.0.0";

/// Protocol version exchanged in the hello handshake.
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// Server name reported in the hello reply.
pub const SERVER_NAME: &str = "tetris-env";

/// Tetromino piece kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    I,
    O,
    T,
    S,
    Z,
    J,
    L,
}

/// All seven kinds, in cell-code order (code = index + 1).
pub const ALL_KINDS: [PieceKind; 7] = [
    PieceKind::I,
    PieceKind::O,
    PieceKind::T,
    PieceKind::S,
    PieceKind::Z,
    PieceKind::J,
    PieceKind::L,
];

impl PieceKind {
    /// Cell code used on the wire: 1..=7 in I, O, T, S, Z, J, L order.
    pub fn code(self) -> u8 {
        match self {
            PieceKind::I => 1,
            PieceKind::O => 2,
            PieceKind::T => 3,
            PieceKind::S => 4,
            PieceKind::Z => 5,
            PieceKind::J => 6,
            PieceKind::L => 7,
        }
    }

    /// Inverse of [`PieceKind::code`]; 0 and out-of-range codes are empty.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(PieceKind::I),
            2 => Some(PieceKind::O),
            3 => Some(PieceKind::T),
            4 => Some(PieceKind::S),
            5 => Some(PieceKind::Z),
            6 => Some(PieceKind::J),
            7 => Some(PieceKind::L),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PieceKind::I => "I",
            PieceKind::O => "O",
            PieceKind::T => "T",
            PieceKind::S => "S",
            PieceKind::Z => "Z",
            PieceKind::J => "J",
            PieceKind::L => "L",
        }
    }
}

/// Rotation states; index 0 is the spawn orientation, increasing clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rotation {
    R0,
    R1,
    R2,
    R3,
}

impl Rotation {
    pub fn index(self) -> u8 {
        match self {
            Rotation::R0 => 0,
            Rotation::R1 => 1,
            Rotation::R2 => 2,
            Rotation::R3 => 3,
        }
    }

    /// Wraps modulo 4.
    pub fn from_index(index: u8) -> Self {
        match index % 4 {
            0 => Rotation::R0,
            1 => Rotation::R1,
            2 => Rotation::R2,
            _ => Rotation::R3,
        }
    }

    pub fn cw(self) -> Self {
        Rotation::from_index(self.index().wrapping_add(1))
    }

    pub fn ccw(self) -> Self {
        Rotation::from_index(self.index().wrapping_add(3))
    }

    pub const ALL: [Rotation; 4] = [Rotation::R0, Rotation::R1, Rotation::R2, Rotation::R3];
}

/// Frame actions accepted by the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Left,
    Right,
    Cw,
    Ccw,
    Soft,
    Hard,
    Hold,
    Noop,
}

impl Action {
    /// Parse the wire action string. Unknown strings are a protocol error,
    /// not an engine error, so this returns None rather than panicking.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LEFT" => Some(Action::Left),
            "RIGHT" => Some(Action::Right),
            "CW" => Some(Action::Cw),
            "CCW" => Some(Action::Ccw),
            "SOFT" => Some(Action::Soft),
            "HARD" => Some(Action::Hard),
            "HOLD" => Some(Action::Hold),
            "NOOP" => Some(Action::Noop),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Left => "LEFT",
            Action::Right => "RIGHT",
            Action::Cw => "CW",
            Action::Ccw => "CCW",
            Action::Soft => "SOFT",
            Action::Hard => "HARD",
            Action::Hold => "HOLD",
            Action::Noop => "NOOP",
        }
    }
}

/// Engine events reported through `info.events`, in per-tick order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameEvent {
    Spawn,
    HardDrop,
    Lock,
    Clear,
    TopOut,
}

/// Cell on the board (None = empty, Some = locked piece kind).
pub type Cell = Option<PieceKind>;
