//! Error types for the session engine.

use spellbreak_types::{Difficulty, PlayerId};

use crate::collaborators::CollaboratorError;
use crate::config::ConfigError;

/// Errors surfaced by inbound operations and timer tasks.
///
/// Ignorable inputs (a click on nothing, a start while already playing)
/// are not errors; they are reported through the outcome enums.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// A collaborator call failed.
    #[error("collaborator failure: {source}")]
    Collaborator {
        /// The underlying collaborator error.
        #[from]
        source: CollaboratorError,
    },

    /// The configuration could not be turned into a difficulty table.
    #[error("configuration error: {source}")]
    Config {
        /// The underlying configuration error.
        #[from]
        source: ConfigError,
    },

    /// The requested tier is not in the difficulty table.
    #[error("difficulty {0} is not configured")]
    UnknownDifficulty(Difficulty),

    /// A session broke one of its own invariants and was torn down.
    #[error("session fault for player {player}: {reason}")]
    SessionFault {
        /// Owner of the faulted session.
        player: PlayerId,
        /// What was found broken.
        reason: String,
    },
}
