//! Headless host for the Spellbreak session engine.
//!
//! Wires the engine to in-memory collaborators and a logging presenter,
//! then lets a bot play through every tier it can unlock.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `spellbreak-config.yaml`
//! 3. Build the collaborators and the engine
//! 4. Spawn the engine runner
//! 5. Let the bot play each tier in order
//! 6. Log the reports and the leaderboard, then shut down

mod bot;
mod error;
mod presenter;

use std::path::Path;

use spellbreak_core::memory::{InMemoryPersistence, InMemoryWorld, ScriptedPlayers};
use spellbreak_core::{Collaborators, Engine, GameConfig, spawn_engine};
use spellbreak_types::{Difficulty, PlayerId, Position};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::bot::{Bot, BotConfig};
use crate::error::EngineError;
use crate::presenter::LogPresenter;

/// Application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("spellbreak-engine starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        seed = ?config.seed,
        debounce_ms = config.debounce_ms,
        setup_budget_secs = config.setup_budget_secs,
        countdown_secs = config.countdown_secs,
        tiers = config.difficulties.len(),
        "Configuration loaded"
    );

    // 3. Collaborators and engine.
    let world = InMemoryWorld::new();
    let persistence = InMemoryPersistence::new();
    let players = ScriptedPlayers::new();
    let player = PlayerId::new();
    players.add_player(player, "demo-bot", Position::new(0.0, 64.0, 0.0), "wooden_sword");
    players.set_auto_trigger(player, true);

    let engine = Engine::new(
        &config,
        Collaborators {
            world: Box::new(world.clone()),
            presenter: Box::new(LogPresenter),
            persistence: Box::new(persistence.clone()),
            players: Box::new(players.clone()),
        },
    )
    .map_err(EngineError::from)?;

    // 4. Runner.
    let (handle, mut reports, task) = spawn_engine(engine);
    info!(player = %player, "Engine runner spawned");

    // 5. Play.
    let mut bot = Bot::new(
        handle.clone(),
        player,
        BotConfig {
            seed: config.seed,
            ..BotConfig::default()
        },
    );
    for difficulty in [Difficulty::Easy, Difficulty::Normal, Difficulty::Hard] {
        if bot.play(difficulty).await?.is_none() {
            continue;
        }
        let report = reports.recv().await.ok_or_else(|| EngineError::Bot {
            message: "report channel closed".to_owned(),
        })?;
        info!(
            difficulty = %report.difficulty,
            score = report.score,
            matched_pairs = report.matched_pairs,
            pair_count = report.pair_count,
            reason = ?report.reason,
            first_clear = ?report.first_clear,
            new_high_score = report.new_high_score,
            "Game finished"
        );
    }

    // 6. Leaderboard and shutdown.
    for (rank, record) in persistence.top_scores(5).iter().enumerate() {
        info!(
            rank = rank.saturating_add(1),
            player = %record.player_name,
            difficulty = %record.difficulty,
            score = record.score,
            "Leaderboard"
        );
    }

    handle.shutdown().map_err(EngineError::from)?;
    let engine = task.await?;
    if world.live_count() > 0 {
        warn!(live = world.live_count(), "Entities left in the world after shutdown");
    }
    info!(
        sessions = engine.store().session_count(),
        spawned_total = world.spawned_total(),
        "spellbreak-engine stopped"
    );
    Ok(())
}

/// Load the game configuration from `spellbreak-config.yaml`.
///
/// Looks for the file relative to the current working directory and falls
/// back to the built-in tiers when it is absent.
fn load_config() -> Result<GameConfig, EngineError> {
    let config_path = Path::new("spellbreak-config.yaml");
    if config_path.exists() {
        let config = GameConfig::from_file(config_path)?;
        Ok(config)
    } else {
        info!("Config file not found, using defaults");
        Ok(GameConfig::default())
    }
}
