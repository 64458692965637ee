//! Headless deterministic Tetris engine with structured observations.
//!
//! The engine (`core`, `env`) is synchronous and deterministic: given a
//! seed and an action sequence, two instances produce identical
//! observation streams. The session layer (`session`) drives it over a
//! line-delimited JSON protocol for human play, agent-driven play, and
//! two-agent comparisons; `agents` holds the reference policies.

pub mod agents;
pub mod core;
pub mod env;
pub mod session;
pub mod types;
