//! Session lifecycle, pair resolution, scoring and tick scheduling for
//! Spellbreak.
//!
//! A player starts a game on a difficulty tier, satisfies a start trigger,
//! counts down, and then clicks decoy tokens to reveal what hides behind
//! them. Matching halves of a pair score points, specials bend the clock or
//! shuffle the field, and the game ends on a full clear, on timeout, or on
//! request.
//!
//! # Modules
//!
//! - [`config`] -- `spellbreak-config.yaml` loading and the validated
//!   difficulty table.
//! - [`collaborators`] -- Traits for the world, presentation, persistence
//!   and player effects.
//! - [`memory`] -- In-memory collaborators for tests and the demo.
//! - [`scheduler`] -- [`Scheduler`] trait and the virtual-time
//!   [`TimerQueue`].
//! - [`session`] -- Per-player game state.
//! - [`store`] -- The keyed session store.
//! - [`spawn`] -- Token layout planning and spawning.
//! - [`combo`] -- Combo multipliers and score arithmetic.
//! - [`lifecycle`] -- [`Engine`]: start, stop, countdown, ticks, teardown.
//! - [`resolver`] -- Click handling, reveals and pair resolution.
//! - [`runner`] -- Tokio task that owns an engine and drives its clock.
//! - [`error`] -- [`GameError`].
//!
//! [`Scheduler`]: scheduler::Scheduler
//! [`TimerQueue`]: scheduler::TimerQueue
//! [`Engine`]: lifecycle::Engine
//! [`GameError`]: error::GameError

pub mod collaborators;
pub mod combo;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod resolver;
pub mod runner;
pub mod scheduler;
pub mod session;
pub mod spawn;
pub mod store;

pub use collaborators::{
    CollaboratorError, Collaborators, EffectPresenter, PersistenceGateway, PlayerGateway,
    WorldEntitySpawner,
};
pub use config::{ConfigError, DifficultyConfig, DifficultyTable, GameConfig};
pub use error::GameError;
pub use lifecycle::{AdvanceReport, Engine, StartOutcome, StopOutcome};
pub use resolver::{IgnoreReason, InteractOutcome};
pub use runner::{EngineHandle, RunnerError, spawn_engine};
