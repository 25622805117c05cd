//! Save/restore across the JSON boundary, including clock skew between
//! the saving and the restoring session.

use chomp_core::id::ActorTag;
use chomp_sim::config::GameConfig;
use chomp_sim::driver::{Difficulty, GameMode};
use chomp_sim::save::SaveData;
use chomp_sim::test_utils::{standard_maze, Harness};

fn config() -> GameConfig {
    GameConfig {
        start_lives: 3,
        max_level: 3,
        start_delay: 5,
        release_delays: [20, 30, 40],
        switch_period: 120,
        frightened_delay: 60,
        energizer_delay: 90,
        respawn_delay: 10,
        end_delay: 10,
    }
}

fn mid_play_save() -> SaveData {
    let harness = Harness::new(config(), 42);
    harness
        .driver
        .new_game(Difficulty::Normal, "standard", standard_maze());
    harness.run(35);
    harness.driver.save_game().expect("mid-play save")
}

#[test]
fn a_save_survives_the_json_wire_format() {
    let save = mid_play_save();
    let json = serde_json::to_string_pretty(&save).unwrap();
    let back: SaveData = serde_json::from_str(&json).unwrap();
    assert_eq!(back, save);
}

#[test]
fn restoring_rebuilds_the_exact_actor_and_block_state() {
    let save = mid_play_save();
    let json = serde_json::to_string(&save).unwrap();
    let decoded: SaveData = serde_json::from_str(&json).unwrap();

    let restored = Harness::new(config(), 42);
    restored
        .driver
        .load_game(&decoded, standard_maze())
        .expect("well-formed save");
    assert_eq!(restored.driver.mode(), GameMode::Wait);

    // Saving again is not possible until play resumes, so compare by
    // re-snapshotting the restored session's parts.
    let field = restored.driver.field().unwrap();
    let position = |tag: ActorTag| {
        field
            .with_actor(tag, |a| (a.position.to_string(), a.direction.name()))
            .unwrap()
    };
    assert_eq!(
        position(ActorTag::Player),
        (save.player.position.clone(), save.player.direction.as_str())
    );
    assert_eq!(
        position(ActorTag::RedGhost),
        (
            save.red_ghost.position.clone(),
            save.red_ghost.direction.as_str()
        )
    );
}

#[test]
fn scheduler_delays_are_relative_to_the_restoring_clock() {
    let save = mid_play_save();

    // Let the restoring session's clock run ahead before loading: the
    // pending (delay -> events) map must come back identical anyway,
    // because delays rebase onto whatever the clock reads at load time.
    let restored = Harness::new(config(), 42);
    restored.run(900);
    restored
        .driver
        .load_game(&save, standard_maze())
        .expect("well-formed save");

    let mut expected = save.scheduler.clone();
    // load_game schedules a fresh GAME_START for the resume countdown.
    expected
        .entry("5".to_owned())
        .or_default()
        .push("GAME_START".to_owned());
    assert_eq!(restored.scheduler.store(), expected);
}

#[test]
fn resuming_replays_the_next_tick_exactly() {
    let harness = Harness::new(config(), 42);
    harness
        .driver
        .new_game(Difficulty::Normal, "standard", standard_maze());
    harness.run(35);
    let save = harness.driver.save_game().expect("mid-play save");
    // The original session plays one more tick.
    harness.run(1);
    let after_one = harness.driver.save_game().expect("still playing");

    // The restored session waits out its resume countdown; the tick that
    // fires GAME_START also runs the first PLAY update, which must
    // advance the world from the saved state exactly as the original
    // session's next tick did.
    let restored = Harness::new(config(), 42);
    restored
        .driver
        .load_game(&save, standard_maze())
        .expect("well-formed save");
    restored.run(6);
    assert_eq!(restored.driver.mode(), GameMode::Play);
    let second = restored.driver.save_game().expect("resumed save");

    assert_eq!(second.player, after_one.player);
    assert_eq!(second.red_ghost, after_one.red_ghost);
    assert_eq!(second.pink_ghost, after_one.pink_ghost);
    assert_eq!(second.blue_ghost, after_one.blue_ghost);
    assert_eq!(second.orange_ghost, after_one.orange_ghost);
    assert_eq!(second.blocks, after_one.blocks);
    assert_eq!(second.game.time, after_one.game.time);
    assert_eq!(second.game.scores, after_one.game.scores);
    assert_eq!(second.game.lives, after_one.game.lives);
    assert_eq!(second.game.dots, after_one.game.dots);
}
