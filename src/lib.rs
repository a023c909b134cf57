//! twenty48-core: the decision/state core of a 4x4 2048 game.
//!
//! Two strictly layered components:
//! - [`engine`]: a packed `u64` board with pure slide/merge/spawn/terminal
//!   rules driven by precomputed per-line tables. Leaf module.
//! - [`expectimax`]: a bounded-depth expectimax advisor that simulates
//!   engine transitions on board copies and recommends a direction.
//!
//! [`game::Game`] ties them together into the mutable state a presentation
//! layer talks to: board, score, best score, terminal flag, seeded RNG.
//!
//! Quick start:
//! ```
//! use twenty48_core::engine::Move;
//! use twenty48_core::game::Game;
//!
//! let mut game = Game::from_seed(42);
//! assert_eq!(game.score(), 0);
//! if let Some(dir) = game.get_ai_move(3) {
//!     game.apply_move(dir);
//! }
//! assert!(!game.is_game_over());
//! ```
pub mod engine;
pub mod expectimax;
pub mod game;
