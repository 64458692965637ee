//! Deterministic piece generation: a small LCG plus the 7-bag randomizer.
//!
//! Each bag holds one of every kind, shuffled; bags are appended whole,
//! so any window [7k, 7k+7) of the stream is an exact permutation of the
//! seven kinds. Given a seed the infinite stream is fixed.

use std::collections::VecDeque;

use crate::types::{PieceKind, ALL_KINDS};

/// 64-bit linear congruential generator (MMIX constants).
#[derive(Debug, Clone)]
pub struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    /// Seed 0 would shorten the first period noticeably; remap it.
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed };
        Self { state }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    /// Uniform-ish value in [0, max). Uses the high bits; the low bits of
    /// an LCG cycle with short periods.
    pub fn next_range(&mut self, max: u64) -> u64 {
        (self.next_u64() >> 33) % max
    }

    /// Fisher-Yates shuffle.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        for i in (1..slice.len()).rev() {
            let j = self.next_range((i + 1) as u64) as usize;
            slice.swap(i, j);
        }
    }
}

/// 7-bag piece stream with unbounded lookahead.
#[derive(Debug, Clone)]
pub struct PieceBag {
    seed: u64,
    rng: SimpleRng,
    queue: VecDeque<PieceKind>,
}

impl PieceBag {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: SimpleRng::new(seed),
            queue: VecDeque::with_capacity(14),
        }
    }

    /// The seed this stream was built from (reported in observations).
    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn push_bag(&mut self) {
        let mut bag = ALL_KINDS;
        self.rng.shuffle(&mut bag);
        self.queue.extend(bag);
    }

    fn ensure(&mut self, n: usize) {
        while self.queue.len() < n {
            self.push_bag();
        }
    }

    /// Draw the next kind.
    pub fn next(&mut self) -> PieceKind {
        loop {
            if let Some(kind) = self.queue.pop_front() {
                return kind;
            }
            self.push_bag();
        }
    }

    /// The next `n` kinds in draw order, without consuming. Materializes
    /// additional bags as needed.
    pub fn peek(&mut self, n: usize) -> Vec<PieceKind> {
        self.ensure(n);
        self.queue.iter().take(n).copied().collect()
    }
}
