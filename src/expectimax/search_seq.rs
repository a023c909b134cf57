use std::collections::HashMap;

use crate::engine::{Board, Move};

use super::heuristic;
use super::{
    spawn_slots, warm_engine_and_heuristics, BranchEval, ExpectimaxConfig, SearchStats,
    MAX_DEPTH, PROB_FOUR, PROB_TWO,
};

enum Node {
    Max,
    Chance,
}

#[derive(Clone, Copy)]
struct TranspositionEntry {
    score: f64,
    depth: u64,
}

#[derive(Debug, Clone, Copy)]
struct SearchResult {
    score: f64,
    dir: Option<Move>,
}

/// Single-threaded expectimax advisor.
///
/// Constructors warm the engine and heuristic tables. All searching happens
/// on `Board` copies; the caller's state is never touched.
pub struct Expectimax {
    cfg: ExpectimaxConfig,
    stats: SearchStats,
}

impl Expectimax {
    pub fn new() -> Self {
        Self::with_config(ExpectimaxConfig::default())
    }

    pub fn with_config(cfg: ExpectimaxConfig) -> Self {
        warm_engine_and_heuristics();
        Self { cfg, stats: SearchStats::default() }
    }

    /// Best direction at the given search depth, or `None` when no direction
    /// changes the board (terminal position).
    ///
    /// `depth` is clamped to `1..=MAX_DEPTH`; zero never degenerates into a
    /// no-search. Ties resolve to the earliest direction in the priority
    /// order Up, Left, Down, Right.
    pub fn best_move(&mut self, board: Board, depth: u64) -> Option<Move> {
        let depth = depth.clamp(1, MAX_DEPTH);
        let mut map = HashMap::new();
        let mut stats = SearchStats::default();
        let result = self.search(board, Node::Max, depth, 1.0, &mut map, &mut stats);
        self.record_stats(stats);
        result.dir
    }

    /// Expected value per direction, in `[Up, Down, Left, Right]` order.
    ///
    /// Directions whose shift is a no-op come back with `legal = false`.
    pub fn branch_evals(&mut self, board: Board, depth: u64) -> [BranchEval; 4] {
        let depth = depth.clamp(1, MAX_DEPTH);
        let mut map = HashMap::new();
        let mut stats = SearchStats::default();
        let mut out = [
            BranchEval { dir: Move::Up, ev: 0.0, legal: false },
            BranchEval { dir: Move::Down, ev: 0.0, legal: false },
            BranchEval { dir: Move::Left, ev: 0.0, legal: false },
            BranchEval { dir: Move::Right, ev: 0.0, legal: false },
        ];
        for slot in out.iter_mut() {
            let shifted = board.shift(slot.dir);
            if shifted != board {
                slot.ev = self
                    .search(shifted, Node::Chance, depth, 1.0, &mut map, &mut stats)
                    .score;
                slot.legal = true;
            }
        }
        self.record_stats(stats);
        out
    }

    /// Expected value of the position itself (the best branch's value).
    pub fn state_value(&mut self, board: Board, depth: u64) -> f64 {
        let depth = depth.clamp(1, MAX_DEPTH);
        let mut map = HashMap::new();
        let mut stats = SearchStats::default();
        let result = self.search(board, Node::Max, depth, 1.0, &mut map, &mut stats);
        self.record_stats(stats);
        result.score
    }

    /// Counters from the most recent search.
    #[inline]
    pub fn last_stats(&self) -> SearchStats {
        self.stats
    }

    /// Reset accumulated stats to zero.
    #[inline]
    pub fn reset_stats(&mut self) {
        self.stats = SearchStats::default();
    }

    fn record_stats(&mut self, stats: SearchStats) {
        let peak = self.stats.peak_nodes.max(stats.nodes);
        self.stats = SearchStats { peak_nodes: peak, ..stats };
    }

    fn search(
        &self,
        board: Board,
        node: Node,
        depth: u64,
        cum_prob: f32,
        map: &mut HashMap<Board, TranspositionEntry>,
        stats: &mut SearchStats,
    ) -> SearchResult {
        stats.nodes += 1;
        match node {
            Node::Max => self.eval_move_node(board, depth, cum_prob, map, stats),
            Node::Chance => self.eval_chance_node(board, depth, cum_prob, map, stats),
        }
    }

    /// Player's turn: maximize over legal directions. The chance child keeps
    /// the same remaining depth; one ply is a move plus its spawn.
    fn eval_move_node(
        &self,
        board: Board,
        depth: u64,
        cum_prob: f32,
        map: &mut HashMap<Board, TranspositionEntry>,
        stats: &mut SearchStats,
    ) -> SearchResult {
        if depth == 0 {
            return SearchResult { score: heuristic::evaluate(board), dir: None };
        }
        let mut best = SearchResult { score: f64::NEG_INFINITY, dir: None };
        for dir in Move::ALL {
            let shifted = board.shift(dir);
            if shifted == board {
                continue;
            }
            let score = self
                .search(shifted, Node::Chance, depth, cum_prob, map, stats)
                .score;
            if score > best.score {
                best = SearchResult { score, dir: Some(dir) };
            }
        }
        if best.dir.is_none() {
            // Terminal: nothing to maximize over.
            best.score = heuristic::evaluate(board);
        }
        best
    }

    /// Spawn about to happen: average over empty cells and tile values.
    fn eval_chance_node(
        &self,
        board: Board,
        depth: u64,
        cum_prob: f32,
        map: &mut HashMap<Board, TranspositionEntry>,
        stats: &mut SearchStats,
    ) -> SearchResult {
        if depth == 0 || cum_prob < self.cfg.prob_cutoff {
            return SearchResult { score: heuristic::evaluate(board), dir: None };
        }
        if self.cfg.cache_enabled {
            if let Some(entry) = map.get(&board) {
                if entry.depth >= depth {
                    stats.cache_hits += 1;
                    return SearchResult { score: entry.score, dir: None };
                }
            }
        }
        let slots = spawn_slots(board, self.cfg.spawn_sample_cap);
        if slots.is_empty() {
            return SearchResult { score: heuristic::evaluate(board), dir: None };
        }
        let base_prob = cum_prob / slots.len() as f32;
        let mut total = 0.0;
        for &insert in &slots {
            let with_two = Board::from_raw(board.raw() | insert);
            total += PROB_TWO
                * self
                    .search(with_two, Node::Max, depth - 1, base_prob * PROB_TWO as f32, map, stats)
                    .score;
            let with_four = Board::from_raw(board.raw() | (insert << 1));
            total += PROB_FOUR
                * self
                    .search(with_four, Node::Max, depth - 1, base_prob * PROB_FOUR as f32, map, stats)
                    .score;
        }
        let score = total / slots.len() as f64;
        if self.cfg.cache_enabled {
            map.insert(board, TranspositionEntry { score, depth });
        }
        SearchResult { score, dir: None }
    }
}

impl Default for Expectimax {
    fn default() -> Self {
        Self::new()
    }
}
