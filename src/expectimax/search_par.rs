use ahash::RandomState as AHasher;
use dashmap::DashMap;
use rayon::prelude::*;

use crate::engine::{Board, Move};

use super::heuristic;
use super::{
    spawn_slots, warm_engine_and_heuristics, BranchEval, ExpectimaxConfig, ParThresholds,
    SearchStats, MAX_DEPTH, PROB_FOUR, PROB_TWO,
};

#[derive(Clone, Copy)]
enum Node {
    Max,
    Chance,
}

#[derive(Clone, Copy)]
struct TranspositionEntry {
    score: f64,
    depth: u64,
}

/// Rayon-parallel expectimax sharing a `DashMap` transposition table.
///
/// Same contract as [`super::Expectimax`]: copies only, illegal directions
/// never recommended, `None` on terminal boards, ties broken Up, Left, Down,
/// Right. Parallelism stays inside a single blocking call.
pub struct ExpectimaxParallel {
    cfg: ExpectimaxConfig,
    stats: SearchStats,
}

impl ExpectimaxParallel {
    pub fn new() -> Self {
        Self::with_config(ExpectimaxConfig::default())
    }

    pub fn with_config(cfg: ExpectimaxConfig) -> Self {
        warm_engine_and_heuristics();
        Self { cfg, stats: SearchStats::default() }
    }

    /// Best direction at the given depth, or `None` on a terminal board.
    pub fn best_move(&mut self, board: Board, depth: u64) -> Option<Move> {
        let branches = self.branch_evals(board, depth);
        best_of(&branches)
    }

    /// Best move and the per-direction evaluations behind it, in one search.
    pub fn best_move_with_branches(&mut self, board: Board, depth: u64) -> (Option<Move>, [BranchEval; 4]) {
        let branches = self.branch_evals(board, depth);
        (best_of(&branches), branches)
    }

    /// Expected value per direction, searched in parallel across the four
    /// root branches. Order is `[Up, Down, Left, Right]`.
    pub fn branch_evals(&mut self, board: Board, depth: u64) -> [BranchEval; 4] {
        let depth = depth.clamp(1, MAX_DEPTH);
        let map: DashMap<Board, TranspositionEntry, AHasher> = DashMap::with_hasher(AHasher::new());
        let dirs = [Move::Up, Move::Down, Move::Left, Move::Right];
        let evals: Vec<BranchEval> = dirs
            .par_iter()
            .map(|&dir| {
                let shifted = board.shift(dir);
                if shifted == board {
                    BranchEval { dir, ev: 0.0, legal: false }
                } else {
                    let ev = self.search(shifted, Node::Chance, depth, 1.0, &map);
                    BranchEval { dir, ev, legal: true }
                }
            })
            .collect();
        let mut out = [
            BranchEval { dir: Move::Up, ev: 0.0, legal: false },
            BranchEval { dir: Move::Down, ev: 0.0, legal: false },
            BranchEval { dir: Move::Left, ev: 0.0, legal: false },
            BranchEval { dir: Move::Right, ev: 0.0, legal: false },
        ];
        for be in evals {
            out[be.dir.index() as usize] = be;
        }
        self.stats = SearchStats { peak_nodes: self.stats.peak_nodes, ..SearchStats::default() };
        out
    }

    /// Expected value of the position (best branch's value).
    pub fn state_value(&mut self, board: Board, depth: u64) -> f64 {
        let branches = self.branch_evals(board, depth);
        branches
            .iter()
            .filter(|be| be.legal)
            .map(|be| be.ev)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    #[inline]
    pub fn last_stats(&self) -> SearchStats {
        self.stats
    }

    fn search(
        &self,
        board: Board,
        node: Node,
        depth: u64,
        cum_prob: f32,
        map: &DashMap<Board, TranspositionEntry, AHasher>,
    ) -> f64 {
        match node {
            Node::Max => self.eval_move_node(board, depth, cum_prob, map),
            Node::Chance => self.eval_chance_node(board, depth, cum_prob, map),
        }
    }

    fn eval_move_node(
        &self,
        board: Board,
        depth: u64,
        cum_prob: f32,
        map: &DashMap<Board, TranspositionEntry, AHasher>,
    ) -> f64 {
        if depth == 0 {
            return heuristic::evaluate(board);
        }
        let ParThresholds { par_depth, .. } = self.cfg.par_thresholds;
        let child = |dir: Move| -> Option<f64> {
            let shifted = board.shift(dir);
            if shifted == board {
                None
            } else {
                Some(self.search(shifted, Node::Chance, depth, cum_prob, map))
            }
        };
        let best = if depth >= par_depth {
            Move::ALL
                .par_iter()
                .filter_map(|&dir| child(dir))
                .reduce(|| f64::NEG_INFINITY, f64::max)
        } else {
            Move::ALL
                .iter()
                .filter_map(|&dir| child(dir))
                .fold(f64::NEG_INFINITY, f64::max)
        };
        if best == f64::NEG_INFINITY {
            heuristic::evaluate(board)
        } else {
            best
        }
    }

    fn eval_chance_node(
        &self,
        board: Board,
        depth: u64,
        cum_prob: f32,
        map: &DashMap<Board, TranspositionEntry, AHasher>,
    ) -> f64 {
        if depth == 0 || cum_prob < self.cfg.prob_cutoff {
            return heuristic::evaluate(board);
        }
        if self.cfg.cache_enabled {
            if let Some(entry) = map.get(&board) {
                if entry.depth >= depth {
                    return entry.score;
                }
            }
        }
        let slots = spawn_slots(board, self.cfg.spawn_sample_cap);
        if slots.is_empty() {
            return heuristic::evaluate(board);
        }
        let base_prob = cum_prob / slots.len() as f32;
        let weigh = |&insert: &u64| -> f64 {
            let with_two = Board::from_raw(board.raw() | insert);
            let two = self.search(with_two, Node::Max, depth - 1, base_prob * PROB_TWO as f32, map);
            let with_four = Board::from_raw(board.raw() | (insert << 1));
            let four = self.search(with_four, Node::Max, depth - 1, base_prob * PROB_FOUR as f32, map);
            PROB_TWO * two + PROB_FOUR * four
        };
        let ParThresholds { par_depth, par_slots, cache_min_depth } = self.cfg.par_thresholds;
        let total: f64 = if depth >= par_depth && slots.len() >= par_slots {
            slots.par_iter().map(weigh).sum()
        } else {
            slots.iter().map(weigh).sum()
        };
        let score = total / slots.len() as f64;
        if self.cfg.cache_enabled && depth >= cache_min_depth {
            map.insert(board, TranspositionEntry { score, depth });
        }
        score
    }
}

impl Default for ExpectimaxParallel {
    fn default() -> Self {
        Self::new()
    }
}

/// Highest legal branch; earlier directions win exact ties, and the array is
/// scanned in the Up, Left, Down, Right priority order.
fn best_of(branches: &[BranchEval; 4]) -> Option<Move> {
    let mut best: Option<&BranchEval> = None;
    for dir in Move::ALL {
        let be = &branches[dir.index() as usize];
        if !be.legal {
            continue;
        }
        match best {
            Some(b) if b.ev >= be.ev => {}
            _ => best = Some(be),
        }
    }
    best.map(|be| be.dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn parallel_advisor_honors_the_shared_contract() {
        let mut advisor = ExpectimaxParallel::new();
        let mut rng = StdRng::seed_from_u64(5);
        let board = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
        assert!(advisor.best_move(board, 3).is_some());

        let terminal = Board::from_raw(0x1212_2121_1212_2121);
        assert_eq!(advisor.best_move(terminal, 3), None);
    }

    #[test]
    fn forced_position_agrees_with_sequential() {
        let mut par = ExpectimaxParallel::new();
        let mut seq = crate::expectimax::Expectimax::new();
        // Only Down is legal here, so both variants must pick it.
        let board = Board::from_raw(0x1212_0000_0000_0000);
        assert_eq!(par.best_move(board, 3), Some(Move::Down));
        assert_eq!(seq.best_move(board, 3), Some(Move::Down));
    }

    #[test]
    fn branch_order_is_stable() {
        let mut advisor = ExpectimaxParallel::new();
        let mut rng = StdRng::seed_from_u64(77);
        let board = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
        let branches = advisor.branch_evals(board, 2);
        assert_eq!(branches[0].dir, Move::Up);
        assert_eq!(branches[1].dir, Move::Down);
        assert_eq!(branches[2].dir, Move::Left);
        assert_eq!(branches[3].dir, Move::Right);
    }

    #[test]
    fn best_of_prefers_priority_order_on_ties() {
        let tied = [
            BranchEval { dir: Move::Up, ev: 1.0, legal: true },
            BranchEval { dir: Move::Down, ev: 1.0, legal: true },
            BranchEval { dir: Move::Left, ev: 1.0, legal: true },
            BranchEval { dir: Move::Right, ev: 1.0, legal: true },
        ];
        assert_eq!(best_of(&tied), Some(Move::Up));

        let only_right = [
            BranchEval { dir: Move::Up, ev: 9.0, legal: false },
            BranchEval { dir: Move::Down, ev: 9.0, legal: false },
            BranchEval { dir: Move::Left, ev: 9.0, legal: false },
            BranchEval { dir: Move::Right, ev: 0.5, legal: true },
        ];
        assert_eq!(best_of(&only_right), Some(Move::Right));

        let none_legal = [
            BranchEval { dir: Move::Up, ev: 0.0, legal: false },
            BranchEval { dir: Move::Down, ev: 0.0, legal: false },
            BranchEval { dir: Move::Left, ev: 0.0, legal: false },
            BranchEval { dir: Move::Right, ev: 0.0, legal: false },
        ];
        assert_eq!(best_of(&none_legal), None);
    }
}
