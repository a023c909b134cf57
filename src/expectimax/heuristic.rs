//! Static board evaluation for leaf nodes of the expectimax search.
//!
//! The score is a sum over all eight lines (four rows, four columns) of a
//! precomputed per-line table, plus a whole-board bonus for keeping the
//! highest tile in a corner. Higher is better; the terms reward mobility
//! (empty cells, pending merges) and ordered gradients (monotonicity), and
//! penalize scattered large tiles.

use std::sync::OnceLock;

use crate::engine::{self as GameEngine, Board};

// Credit to Nneonneo for the line-score structure and weights.
const LOST_PENALTY: f64 = 200_000.0;
const EMPTY_WEIGHT: f64 = 270.0;
const MERGES_WEIGHT: f64 = 700.0;
const MONOTONICITY_POWER: f64 = 4.0;
const MONOTONICITY_WEIGHT: f64 = 47.0;
const SUM_POWER: f64 = 3.5;
const SUM_WEIGHT: f64 = 11.0;
const CORNER_WEIGHT: f64 = 30.0;

static LINE_SCORES: OnceLock<Box<[f64]>> = OnceLock::new();

pub(crate) fn warm() {
    let _ = line_scores();
}

fn line_scores() -> &'static [f64] {
    LINE_SCORES
        .get_or_init(|| {
            let mut table = vec![0.0f64; 0x1_0000];
            for (line, slot) in table.iter_mut().enumerate() {
                *slot = line_score(exponents(line as u64));
            }
            table.into_boxed_slice()
        })
        .as_ref()
}

/// Heuristic value of a board: all rows plus all columns, table-driven.
pub(crate) fn evaluate(board: Board) -> f64 {
    let transposed = GameEngine::transpose(board.raw());
    let table = line_scores();
    let lines: f64 = (0..4).fold(0.0, |acc, idx| {
        let row = GameEngine::extract_line(board.raw(), idx) as usize;
        let col = GameEngine::extract_line(transposed, idx) as usize;
        acc + table[row] + table[col]
    });
    lines + corner_bonus(board)
}

/// Reward keeping the strongest tile anchored in a corner.
fn corner_bonus(board: Board) -> f64 {
    let rank = board.highest_rank();
    if rank == 0 {
        return 0.0;
    }
    let max_val = board.highest_tile();
    const CORNERS: [usize; 4] = [0, 3, 12, 15];
    if CORNERS.iter().any(|&idx| board.tile_value(idx) == max_val) {
        CORNER_WEIGHT * (rank as f64).powf(SUM_POWER)
    } else {
        0.0
    }
}

fn exponents(line: u64) -> [f64; 4] {
    [
        ((line >> 12) & 0xf) as f64,
        ((line >> 8) & 0xf) as f64,
        ((line >> 4) & 0xf) as f64,
        (line & 0xf) as f64,
    ]
}

fn line_score(tiles: [f64; 4]) -> f64 {
    let mut empty = 0.0;
    let mut sum = 0.0;
    for &t in &tiles {
        if t == 0.0 {
            empty += 1.0;
        }
        sum += t.powf(SUM_POWER);
    }

    // Count runs of equal non-zero neighbours: each run of k+1 equal tiles
    // contributes k+1 potential merge credit.
    let mut merges = 0.0;
    let mut run = 0.0;
    let mut prev = 0.0;
    for &t in &tiles {
        if t == prev && t != 0.0 {
            run += 1.0;
        } else {
            if run > 0.0 {
                merges += 1.0 + run;
            }
            run = 0.0;
        }
        prev = t;
    }
    if run > 0.0 {
        merges += 1.0 + run;
    }

    // Penalize whichever orientation breaks less: a line sorted either way
    // costs nothing, a zig-zag costs a lot.
    let mut rising = 0.0;
    let mut falling = 0.0;
    for i in 1..4 {
        let a = tiles[i - 1].powf(MONOTONICITY_POWER);
        let b = tiles[i].powf(MONOTONICITY_POWER);
        if a > b {
            falling += a - b;
        } else {
            rising += b - a;
        }
    }

    LOST_PENALTY + EMPTY_WEIGHT * empty + MERGES_WEIGHT * merges
        - MONOTONICITY_WEIGHT * falling.min(rising)
        - SUM_WEIGHT * sum
}
