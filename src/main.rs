//! Blockfall headless driver
//!
//! Plays one game on a virtual clock with a random autoplayer, then
//! prints the result and records the top score.

use blockfall::persist::SaveStore;
use blockfall::{Action, GameEvent, GameSession, Phase, Settings, VirtualScheduler};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::Duration;

/// Virtual time per frame
const FRAME_DURATION: Duration = Duration::from_millis(16);

/// Give up after roughly an hour of virtual play
const MAX_FRAMES: u64 = 225_000;

/// Chance per frame that the autoplayer does anything
const ACTION_CHANCE: f64 = 0.15;

/// Get the blockfall temp directory, creating it if needed
fn blockfall_temp_dir() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join("blockfall");
    let _ = std::fs::create_dir_all(&dir);
    dir
}

fn pick_action(rng: &mut ChaCha8Rng) -> Option<Action> {
    if !rng.gen_bool(ACTION_CHANCE) {
        return None;
    }
    let action = match rng.gen_range(0..10) {
        0..=2 => Action::MoveLeft,
        3..=5 => Action::MoveRight,
        6 => Action::RotateCW,
        7 => Action::RotateCCW,
        8 => Action::SoftDrop,
        _ => Action::HardDrop,
    };
    Some(action)
}

fn main() {
    let session_id: u32 = rand::random();

    let log_dir = blockfall_temp_dir();
    let log_file = format!("{:08x}.log", session_id);

    let file_appender = tracing_appender::rolling::never(&log_dir, &log_file);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "blockfall=debug".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(filter)
        .with_ansi(false)
        .init();

    tracing::info!("Blockfall starting up, session={:08x}, log={}", session_id, log_dir.join(&log_file).display());

    let settings = Settings::load();
    let seed = settings.gameplay.seed.unwrap_or_else(rand::random);
    let save_path = SaveStore::default_path();
    let store = save_path.as_deref().map(SaveStore::load).unwrap_or_default();

    let mut session = GameSession::with_seed(VirtualScheduler::new(), settings.game_config(), seed);
    if session.restore_state(&store) {
        tracing::info!("Resumed saved game at level {}", session.score().level);
    } else {
        session.start_new_game(settings.gameplay.starting_level());
    }

    let mut player = ChaCha8Rng::seed_from_u64(seed);
    let mut summary = None;
    let mut frames = 0;

    while summary.is_none() && frames < MAX_FRAMES {
        if session.phase() == Phase::Falling {
            if let Some(action) = pick_action(&mut player) {
                session.process_action(action);
            }
        }

        session.scheduler_mut().advance(FRAME_DURATION);
        session.pump();
        frames += 1;

        for event in session.take_events() {
            match event {
                GameEvent::LinesClearing(rows) => tracing::debug!("Clearing rows {:?}", rows),
                GameEvent::LevelChanged { level, lines } => {
                    tracing::info!("Level {} after {} lines", level, lines)
                }
                GameEvent::GameOver(result) => summary = Some(result),
                _ => {}
            }
        }
    }

    let store = session.save_state();
    if let Some(path) = save_path.as_deref() {
        if let Err(e) = store.save(path) {
            tracing::error!("{}", e);
            eprintln!("Could not save: {}", e);
        }
    }

    match summary {
        Some(result) => {
            println!("Game over after {:.1}s (seed {})", session.scheduler().now().as_secs_f64(), seed);
            println!("Score: {}", result.score);
            println!("Lines: {}", result.lines);
            println!("Level: {}", result.level);
            println!("Top:   {}", result.top_score);
        }
        None => println!("Stopped after {} frames, game saved (score {})", frames, session.score().points),
    }
}
