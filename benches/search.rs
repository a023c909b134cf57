#![cfg(feature = "bench-internal")]
use criterion::{criterion_group, criterion_main, Criterion};
use rand::{rngs::StdRng, SeedableRng};
use std::hint::black_box;

use twenty48_core::engine::{self as GameEngine, Board, Move};
use twenty48_core::expectimax::{self, Expectimax};

fn corpus() -> Vec<Board> {
    let mut rng = StdRng::seed_from_u64(1337);
    let mut boards = vec![Board::EMPTY];
    let mut b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    boards.push(b);
    let seq = [Move::Left, Move::Up, Move::Right, Move::Down];
    for i in 0..24 {
        let dir = seq[i % seq.len()];
        let nb = b.shift(dir);
        if nb != b {
            b = nb.with_random_tile(&mut rng);
        }
        boards.push(b);
    }
    boards
}

fn bench_heuristic(c: &mut Criterion) {
    GameEngine::new();
    let boards = corpus();
    c.bench_function("heuristic/value", |bch| {
        bch.iter(|| {
            let mut acc = 0f64;
            for &bd in &boards {
                acc = acc.mul_add(1.000_000_1, expectimax::heuristic_value(bd));
            }
            black_box(acc)
        })
    });
}

fn bench_best_move(c: &mut Criterion) {
    GameEngine::new();
    let boards = corpus();
    let mut advisor = Expectimax::new();
    for depth in [2u64, 3] {
        c.bench_function(&format!("expectimax/best_move/depth{depth}"), |bch| {
            bch.iter(|| {
                for &bd in &boards {
                    black_box(advisor.best_move(bd, depth));
                }
            })
        });
    }
}

criterion_group!(search, bench_heuristic, bench_best_move);
criterion_main!(search);
