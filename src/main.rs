use twenty48_core::game::Game;

fn main() {
    let mut game = Game::new();
    let mut move_count = 0u64;
    println!("{}", game.board());
    while !game.is_game_over() {
        let Some(dir) = game.get_ai_move(3) else {
            break;
        };
        if game.apply_move(dir) {
            move_count += 1;
        }
        println!("{}", game.board());
    }
    println!(
        "Moves: {}, score: {}, best tile: {}",
        move_count,
        game.score(),
        game.board().highest_tile()
    );
}
