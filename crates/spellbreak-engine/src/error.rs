//! Error types for the Spellbreak host binary.
//!
//! [`EngineError`] wraps every failure mode of startup and the demo run so
//! `main` can propagate with `?`.

/// Top-level error for the host binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: spellbreak_core::ConfigError,
    },

    /// The engine rejected a request or could not be built.
    #[error("game error: {source}")]
    Game {
        /// The underlying engine error.
        #[from]
        source: spellbreak_core::GameError,
    },

    /// The engine runner went away.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: spellbreak_core::RunnerError,
    },

    /// The demo bot could not finish its game.
    #[error("bot error: {message}")]
    Bot {
        /// Description of the failure.
        message: String,
    },
}
