//! Mutable game state: one board plus score, best score and terminal flag.
//!
//! [`Game`] is the boundary the presentation layer talks to. It owns its RNG
//! so tile spawns are reproducible under [`Game::from_seed`], and it delegates
//! all board transitions to the pure [`engine`](crate::engine) simulator.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::engine::{self, Board, Move};
use crate::expectimax::{Expectimax, MAX_DEPTH};

/// Canonical game state. Created in a playable position (two spawned tiles).
pub struct Game {
    board: Board,
    score: u64,
    best_score: u64,
    game_over: bool,
    rng: StdRng,
    advisor: Expectimax,
}

impl Game {
    /// A fresh game seeded from OS entropy.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// A fresh game with a fixed RNG seed; every spawn is then deterministic.
    pub fn from_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        engine::new();
        let mut game = Game {
            board: Board::EMPTY,
            score: 0,
            best_score: 0,
            game_over: false,
            rng,
            advisor: Expectimax::new(),
        };
        game.reset();
        game
    }

    /// Start over: clear the board, spawn two tiles, zero the score.
    ///
    /// The best score survives; it only ever increases.
    pub fn reset(&mut self) {
        self.board = Board::EMPTY
            .with_random_tile(&mut self.rng)
            .with_random_tile(&mut self.rng);
        self.score = 0;
        self.game_over = false;
    }

    /// Apply one move. Returns true iff the board changed (and a tile spawned).
    ///
    /// A shift that moves or merges nothing is not a turn: no spawn, no score,
    /// board untouched, returns false. Otherwise the merge values are added to
    /// the score, one random tile is spawned and the terminal flag refreshed.
    pub fn apply_move(&mut self, dir: Move) -> bool {
        let shifted = self.board.shift(dir);
        if shifted == self.board {
            return false;
        }
        self.score += self.board.move_score(dir);
        if self.score > self.best_score {
            self.best_score = self.score;
        }
        self.board = shifted.with_random_tile(&mut self.rng);
        self.game_over = self.board.is_game_over();
        true
    }

    /// Spawn one random tile into an empty cell.
    ///
    /// Returns false (leaving the board untouched) when no empty cell exists.
    /// `apply_move` already spawns after each valid move; this exists for
    /// callers setting up positions by hand.
    pub fn spawn_random_tile(&mut self) -> bool {
        if self.board.count_empty() == 0 {
            return false;
        }
        self.board = self.board.with_random_tile(&mut self.rng);
        self.game_over = self.board.is_game_over();
        true
    }

    /// Recommended direction from a bounded-depth expectimax search.
    ///
    /// `depth` is clamped to 1..=[`MAX_DEPTH`]; non-positive values search at
    /// depth 1. Returns `None` on a terminal board, which is a routine outcome
    /// rather than an error. The search runs on board copies only.
    pub fn get_ai_move(&mut self, depth: i32) -> Option<Move> {
        let depth = depth.clamp(1, MAX_DEPTH as i32) as u64;
        self.advisor.best_move(self.board, depth)
    }

    /// The live board (a copy; the caller cannot alias internal state).
    #[inline]
    pub fn board(&self) -> Board {
        self.board
    }

    /// All 16 tile values, row-major (index = row * 4 + col).
    #[inline]
    pub fn board_flat(&self) -> [u32; 16] {
        self.board.to_flat()
    }

    #[inline]
    pub fn score(&self) -> u64 {
        self.score
    }

    #[inline]
    pub fn best_score(&self) -> u64 {
        self.best_score
    }

    /// Seed the best score from external storage. Only raises, never lowers.
    pub fn set_best_score(&mut self, best: u64) {
        self.best_score = self.best_score.max(best);
    }

    #[inline]
    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    #[cfg(test)]
    pub(crate) fn force_board(&mut self, board: Board) {
        self.board = board;
        self.game_over = board.is_game_over();
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}
