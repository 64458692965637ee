//! Deterministic engine core: geometry, playfield, piece stream, scoring.

pub mod board;
pub mod pieces;
pub mod rng;
pub mod scoring;

pub use board::Board;
pub use pieces::{try_rotate, Piece};
pub use rng::{PieceBag, SimpleRng};
pub use scoring::line_clear_points;
