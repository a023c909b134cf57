use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;

use twenty48_core::expectimax::{ExpectimaxConfig, ExpectimaxParallel};
use twenty48_core::game::Game;

#[derive(Debug, Parser)]
#[command(name = "selfplay", about = "Batch 2048 self-play runner")]
struct Args {
    /// Number of games to play
    #[arg(long, default_value_t = 1)]
    games: u32,

    /// Search depth handed to the advisor (clamped to 1..=15)
    #[arg(long, default_value_t = 3)]
    depth: i32,

    /// RNG seed; omit for entropy-seeded games
    #[arg(long)]
    seed: Option<u64>,

    /// Use the rayon-parallel search instead of the sequential one
    #[arg(long)]
    parallel: bool,

    /// Print per-branch evaluations for every move (parallel mode only)
    #[arg(long)]
    verbose: bool,

    /// Suppress the progress bar
    #[arg(long)]
    quiet: bool,
}

struct GameOutcome {
    moves: u64,
    score: u64,
    highest_tile: u32,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let start = Instant::now();

    let pb = if args.quiet {
        None
    } else {
        let pb = ProgressBar::new(args.games as u64);
        pb.set_style(ProgressStyle::with_template(
            "{bar:30} {pos}/{len} games | {elapsed_precise} | {msg}",
        )?);
        Some(pb)
    };

    let mut outcomes = Vec::with_capacity(args.games as usize);
    let mut best = 0u64;
    for game_idx in 0..args.games {
        let mut game = match args.seed {
            // Offset per game so a fixed seed still varies across the batch.
            Some(seed) => Game::from_seed(seed.wrapping_add(game_idx as u64)),
            None => Game::new(),
        };
        game.set_best_score(best);
        let outcome = if args.parallel {
            play_parallel(&mut game, args.depth, args.verbose)
        } else {
            play_sequential(&mut game, args.depth)
        };
        best = game.best_score();
        if let Some(pb) = &pb {
            pb.inc(1);
            pb.set_message(format!("last score {} (tile {})", outcome.score, outcome.highest_tile));
        }
        outcomes.push(outcome);
    }
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let elapsed = start.elapsed().as_secs_f64();
    let total_moves: u64 = outcomes.iter().map(|o| o.moves).sum();
    let mean_score = outcomes.iter().map(|o| o.score).sum::<u64>() as f64 / outcomes.len().max(1) as f64;
    let top_tile = outcomes.iter().map(|o| o.highest_tile).max().unwrap_or(0);
    println!(
        "Games: {} | mean score: {:.0} | best score: {} | top tile: {} | moves/sec: {:.1}",
        outcomes.len(),
        mean_score,
        best,
        top_tile,
        total_moves as f64 / elapsed.max(1e-6)
    );
    Ok(())
}

fn play_sequential(game: &mut Game, depth: i32) -> GameOutcome {
    let mut moves = 0u64;
    while !game.is_game_over() {
        let Some(dir) = game.get_ai_move(depth) else {
            break;
        };
        if game.apply_move(dir) {
            moves += 1;
        }
    }
    GameOutcome { moves, score: game.score(), highest_tile: game.board().highest_tile() }
}

fn play_parallel(game: &mut Game, depth: i32, verbose: bool) -> GameOutcome {
    let mut advisor = ExpectimaxParallel::with_config(ExpectimaxConfig::default());
    let depth = depth.clamp(1, 15) as u64;
    let mut moves = 0u64;
    while !game.is_game_over() {
        let (dir, branches) = advisor.best_move_with_branches(game.board(), depth);
        let Some(dir) = dir else {
            break;
        };
        if verbose {
            for be in branches {
                eprintln!(
                    "  {:>5?}: {}",
                    be.dir,
                    if be.legal { format!("{:.1}", be.ev) } else { "illegal".to_string() }
                );
            }
            eprintln!("-> {:?}", dir);
        }
        if game.apply_move(dir) {
            moves += 1;
        }
    }
    GameOutcome { moves, score: game.score(), highest_tile: game.board().highest_tile() }
}
