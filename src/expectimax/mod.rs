//! Expectimax move advisor (single-threaded and parallel) for the 2048 core.
//!
//! Tile spawning is stochastic, not adversarial, so the search alternates
//! move nodes (maximize over the player's legal directions) with chance nodes
//! (probability-weighted average over every spawn outcome). Both variants
//! share one contract:
//!
//! - They simulate on `Board` copies only and never touch live game state.
//! - Illegal directions (shifts that change nothing) are never recommended.
//! - A terminal board yields `None`, a routine outcome rather than an error.
//! - Ties between directions resolve by the fixed priority Up, Left, Down,
//!   Right, so results are reproducible.
//!
//! Quick start
//! ```
//! use twenty48_core::engine::{self as GameEngine, Board};
//! use twenty48_core::expectimax::Expectimax;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! GameEngine::new();
//! let mut rng = StdRng::seed_from_u64(123);
//! let board = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
//! let mut advisor = Expectimax::new();
//! assert!(advisor.best_move(board, 3).is_some());
//! ```

use crate::engine;

mod heuristic;
mod search_par;
mod search_seq;

pub use search_par::ExpectimaxParallel;
pub use search_seq::Expectimax;

/// Hard cap on search depth. Requests above it are clamped down; requests
/// below 1 are clamped up to 1.
pub const MAX_DEPTH: u64 = 15;

/// Spawn distribution at chance nodes: a 2 nine times out of ten, else a 4.
pub(crate) const PROB_TWO: f64 = 0.9;
pub(crate) const PROB_FOUR: f64 = 0.1;

/// Configurable knobs for the advisor. Defaults match the shipped behavior.
#[derive(Debug, Clone)]
pub struct ExpectimaxConfig {
    /// Prune chance branches once cumulative probability falls below this.
    pub prob_cutoff: f32,
    /// Enable/disable the transposition table.
    pub cache_enabled: bool,
    /// Chance nodes enumerate at most this many empty cells, evenly sampled.
    /// Purely a branching-cost bound; values >= 16 enumerate everything.
    pub spawn_sample_cap: usize,
    /// Thresholds used only by the parallel implementation.
    pub par_thresholds: ParThresholds,
}

impl Default for ExpectimaxConfig {
    fn default() -> Self {
        Self {
            prob_cutoff: 1e-4,
            cache_enabled: true,
            spawn_sample_cap: 10,
            par_thresholds: ParThresholds::default(),
        }
    }
}

/// Thresholds balancing rayon overheads in [`ExpectimaxParallel`].
#[derive(Debug, Clone, Copy)]
pub struct ParThresholds {
    /// Fan out max-node children in parallel at or above this depth.
    pub par_depth: u64,
    /// Fan out chance-node spawns in parallel at this many slots or more.
    pub par_slots: usize,
    /// Only cache entries searched at least this deep.
    pub cache_min_depth: u64,
}

impl Default for ParThresholds {
    fn default() -> Self {
        Self { par_depth: 4, par_slots: 6, cache_min_depth: 3 }
    }
}

/// Per-direction expected value at the root.
///
/// `legal` is false when the direction is a no-op for the queried board; its
/// `ev` is then meaningless and the direction must not be played.
#[derive(Debug, Clone, Copy)]
pub struct BranchEval {
    pub dir: crate::engine::Move,
    pub ev: f64,
    pub legal: bool,
}

/// Counters from the most recent search.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchStats {
    pub nodes: u64,
    pub peak_nodes: u64,
    pub cache_hits: u64,
}

/// Shared constructor chore: make sure engine and heuristic tables exist.
fn warm_engine_and_heuristics() {
    engine::new();
    heuristic::warm();
}

/// Pick the empty-slot insertion masks a chance node will expand.
///
/// Each mask ORs a 2-tile into one empty nibble (shift left once for the
/// 4-tile). When there are more empty cells than `cap`, an evenly spaced
/// subset of exactly `cap` cells is kept; the caller divides by the returned
/// length, so sampling only narrows the average, it never reweights it.
pub(crate) fn spawn_slots(board: engine::Board, cap: usize) -> Vec<u64> {
    let num_empty = board.count_empty() as usize;
    let mut slots = Vec::with_capacity(num_empty.min(cap.max(1)));
    let mut seen = 0usize;
    let mut tmp = board.raw();
    let mut insert = 1u64;
    while seen < num_empty {
        if (tmp & 0xf) == 0 {
            if num_empty <= cap || (seen * cap) / num_empty != ((seen + 1) * cap) / num_empty {
                slots.push(insert);
            }
            seen += 1;
        }
        tmp >>= 4;
        insert <<= 4;
    }
    slots
}

/// Bench-only: expose the raw heuristic value for a board.
#[cfg(feature = "bench-internal")]
#[inline]
pub fn heuristic_value(board: crate::engine::Board) -> f64 {
    heuristic::evaluate(board)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Board;

    #[test]
    fn spawn_slots_cover_every_empty_cell_when_under_cap() {
        let board = Board::from_raw(0x1212_0000_0000_0000);
        let slots = spawn_slots(board, 16);
        assert_eq!(slots.len(), 12);
        // Every mask lands on an empty nibble.
        for &mask in &slots {
            assert_eq!((board.raw() >> mask.trailing_zeros()) & 0xf, 0);
        }
    }

    #[test]
    fn spawn_slots_sample_exactly_cap_when_over() {
        let board = Board::from_raw(0x1212_0000_0000_0000);
        let slots = spawn_slots(board, 10);
        assert_eq!(slots.len(), 10);
        let all = spawn_slots(board, 16);
        // Sampled slots are a subset of the full enumeration.
        assert!(slots.iter().all(|m| all.contains(m)));
    }

    #[test]
    fn spawn_slots_empty_on_full_board() {
        let board = Board::from_raw(0x1212_2121_1212_2121);
        assert!(spawn_slots(board, 10).is_empty());
    }
}
