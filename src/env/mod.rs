//! The headless environment: tick loop, gravity, lock delay, action
//! dispatch, and observation assembly.
//!
//! Each `step` is a total function of prior state and the input action.
//! Illegal frame actions are silently ignored; the engine never fails at
//! runtime.

pub mod features;
pub mod moves;

use serde::{Deserialize, Serialize};

use crate::core::board::Board;
use crate::core::pieces::{self, Piece};
use crate::core::rng::PieceBag;
use crate::core::scoring::line_clear_points;
use crate::types::{
    Action, GameEvent, PieceKind, BOARD_HEIGHT, BOARD_WIDTH, GRAVITY_TICKS, LOCK_DELAY_TICKS,
    NEXT_QUEUE_LEN, SCHEMA_VERSION,
};

use features::{FeatureDelta, Features};
use moves::LegalMove;

/// The observation's `board` block: flat row-major cells plus derived
/// per-column views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardView {
    pub w: u8,
    pub h: u8,
    pub cells: Vec<u8>,
    pub row_heights: Vec<u8>,
    pub holes_per_col: Vec<u8>,
}

/// The active piece as exposed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentView {
    #[serde(rename = "type")]
    pub kind: PieceKind,
    pub x: i8,
    pub y: i8,
    pub rot: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldView {
    #[serde(rename = "type")]
    pub kind: Option<PieceKind>,
    pub used: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeView {
    pub score: u32,
    pub lines_total: u32,
    pub top_out: bool,
    pub seed: u64,
}

/// Immutable snapshot emitted once per step and discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub schema_version: String,
    pub tick: u64,
    pub board: BoardView,
    pub current: Option<CurrentView>,
    pub ghost_y: Option<i8>,
    pub next_queue: Vec<PieceKind>,
    pub hold: HoldView,
    pub features: Features,
    pub episode: EpisodeView,
    pub legal_moves: Vec<LegalMove>,
}

/// The `info` block accompanying each step result.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StepInfo {
    pub events: Vec<GameEvent>,
    pub delta: FeatureDelta,
}

/// Everything a single `step` produces.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

/// Owns all mutable game state for one episode stream.
#[derive(Debug, Clone)]
pub struct Environment {
    board: Board,
    bag: PieceBag,
    active: Option<Piece>,
    hold: Option<PieceKind>,
    hold_used: bool,
    gravity_timer: u32,
    lock_ticks: u32,
    score: u32,
    lines_total: u32,
    top_out: bool,
    tick: u64,
}

impl Environment {
    /// Fresh episode seeded with `seed`. The first piece spawns
    /// immediately; a blocked spawn marks the episode topped out.
    pub fn new(seed: u64) -> Self {
        let mut env = Self {
            board: Board::new(),
            bag: PieceBag::new(seed),
            active: None,
            hold: None,
            hold_used: false,
            gravity_timer: 0,
            lock_ticks: 0,
            score: 0,
            lines_total: 0,
            top_out: false,
            tick: 0,
        };
        let mut events = Vec::new();
        env.spawn_next(&mut events);
        env
    }

    /// Re-initialize in place and return the first observation.
    pub fn reset(&mut self, seed: u64) -> Observation {
        *self = Self::new(seed);
        self.observation()
    }

    pub fn done(&self) -> bool {
        self.top_out
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn lines_total(&self) -> u32 {
        self.lines_total
    }

    pub fn seed(&self) -> u64 {
        self.bag.seed()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn active(&self) -> Option<Piece> {
        self.active
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    #[cfg(test)]
    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    /// Apply one frame. The action is applied first (collision-blocked),
    /// then gravity at its cadence, then lock delay; locking clears rows,
    /// scores, and spawns the next piece.
    pub fn step(&mut self, action: Action) -> StepResult {
        let pre = features::extract(&self.board);
        let mut events = Vec::new();

        if !self.top_out {
            self.tick += 1;
            let locked_by_action = self.apply_action(action, &mut events);
            if !locked_by_action && !self.top_out {
                self.advance_gravity(&mut events);
            }
        }

        let observation = self.observation();
        let delta = observation.features.delta_from(&pre);
        StepResult {
            observation,
            reward: 0.0,
            done: self.top_out,
            info: StepInfo { events, delta },
        }
    }

    /// Returns true when the action itself locked the piece (hard drop),
    /// which bypasses gravity and lock delay for this tick.
    fn apply_action(&mut self, action: Action, events: &mut Vec<GameEvent>) -> bool {
        match action {
            Action::Left => {
                self.try_shift(-1);
            }
            Action::Right => {
                self.try_shift(1);
            }
            Action::Cw => {
                self.try_rotate(true);
            }
            Action::Ccw => {
                self.try_rotate(false);
            }
            Action::Soft => {
                // One-cell descent; when blocked this falls through to the
                // grounded logic below.
                if let Some(piece) = self.active {
                    let down = piece.translated(0, 1);
                    if !self.board.collides(&down) {
                        self.active = Some(down);
                        self.gravity_timer = 0;
                        self.lock_ticks = 0;
                    }
                }
            }
            Action::Hard => {
                if let Some(piece) = self.active {
                    let mut landing = piece;
                    while !self.board.collides(&landing.translated(0, 1)) {
                        landing = landing.translated(0, 1);
                    }
                    self.active = Some(landing);
                    events.push(GameEvent::HardDrop);
                    self.lock_active(events);
                    return true;
                }
            }
            Action::Hold => {
                self.try_hold(events);
            }
            Action::Noop => {}
        }
        false
    }

    fn try_shift(&mut self, dx: i8) -> bool {
        let Some(piece) = self.active else {
            return false;
        };
        let shifted = piece.translated(dx, 0);
        if self.board.collides(&shifted) {
            return false;
        }
        self.active = Some(shifted);
        self.lock_ticks = 0;
        true
    }

    fn try_rotate(&mut self, clockwise: bool) -> bool {
        let Some(piece) = self.active else {
            return false;
        };
        let Some(rotated) = pieces::try_rotate(&piece, clockwise, |x, y| self.board.is_free(x, y))
        else {
            return false;
        };
        self.active = Some(rotated);
        self.lock_ticks = 0;
        true
    }

    /// Swap active with hold, once per piece lifecycle. An empty slot
    /// consumes the next bag piece as the new active.
    fn try_hold(&mut self, events: &mut Vec<GameEvent>) -> bool {
        if self.hold_used {
            return false;
        }
        let Some(piece) = self.active else {
            return false;
        };

        let incoming = match self.hold.take() {
            Some(held) => held,
            None => self.bag.next(),
        };
        self.hold = Some(piece.kind);
        self.hold_used = true;
        self.gravity_timer = 0;
        self.lock_ticks = 0;

        let fresh = Piece::spawn(incoming);
        if self.board.collides(&fresh) {
            self.top_out = true;
            events.push(GameEvent::TopOut);
        }
        self.active = Some(fresh);
        true
    }

    /// Gravity at its cadence, then lock-delay accounting.
    fn advance_gravity(&mut self, events: &mut Vec<GameEvent>) {
        let Some(piece) = self.active else {
            return;
        };

        self.gravity_timer += 1;
        if self.gravity_timer >= GRAVITY_TICKS {
            self.gravity_timer = 0;
            if !self.board.is_grounded(&piece) {
                self.active = Some(piece.translated(0, 1));
            }
        }

        let Some(piece) = self.active else {
            return;
        };
        if self.board.is_grounded(&piece) {
            self.lock_ticks += 1;
            if self.lock_ticks >= LOCK_DELAY_TICKS {
                self.lock_active(events);
            }
        } else {
            self.lock_ticks = 0;
        }
    }

    /// Fix the active piece to the board: clear rows, score, release the
    /// hold flag, spawn the successor.
    fn lock_active(&mut self, events: &mut Vec<GameEvent>) {
        let Some(piece) = self.active.take() else {
            return;
        };

        self.board.lock(&piece);
        events.push(GameEvent::Lock);

        let cleared = self.board.clear_lines();
        if !cleared.is_empty() {
            events.push(GameEvent::Clear);
        }
        self.score += line_clear_points(cleared.len());
        self.lines_total += cleared.len() as u32;

        self.hold_used = false;
        self.lock_ticks = 0;
        self.gravity_timer = 0;

        self.spawn_next(events);
    }

    fn spawn_next(&mut self, events: &mut Vec<GameEvent>) {
        let piece = Piece::spawn(self.bag.next());
        events.push(GameEvent::Spawn);
        if self.board.collides(&piece) {
            self.top_out = true;
            events.push(GameEvent::TopOut);
        }
        self.active = Some(piece);
    }

    /// Hard-drop landing row of the active piece.
    fn ghost_y(&self) -> Option<i8> {
        let piece = self.active?;
        let mut landing = piece;
        while !self.board.collides(&landing.translated(0, 1)) {
            landing = landing.translated(0, 1);
        }
        Some(landing.y)
    }

    /// Assemble the full snapshot for the current state.
    ///
    /// Takes `&mut self` because the next-queue preview may materialize
    /// another bag.
    pub fn observation(&mut self) -> Observation {
        let next_queue = self.bag.peek(NEXT_QUEUE_LEN);
        let legal_moves = match self.active {
            Some(piece) if !self.top_out => {
                let next = self.bag.peek(1)[0];
                moves::enumerate(&self.board, piece.kind, self.hold, self.hold_used, next)
            }
            _ => Vec::new(),
        };

        Observation {
            schema_version: SCHEMA_VERSION.to_string(),
            tick: self.tick,
            board: BoardView {
                w: BOARD_WIDTH,
                h: BOARD_HEIGHT,
                cells: self.board.encode(),
                row_heights: self.board.column_heights().to_vec(),
                holes_per_col: self.board.holes_per_column().to_vec(),
            },
            current: self.active.map(|p| CurrentView {
                kind: p.kind,
                x: p.x,
                y: p.y,
                rot: p.rotation.index(),
            }),
            ghost_y: self.ghost_y(),
            next_queue,
            hold: HoldView {
                kind: self.hold,
                used: self.hold_used,
            },
            features: features::extract(&self.board),
            episode: EpisodeView {
                score: self.score,
                lines_total: self.lines_total,
                top_out: self.top_out,
                seed: self.bag.seed(),
            },
            legal_moves,
        }
    }
}
