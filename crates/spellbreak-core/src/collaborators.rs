//! Collaborator traits the engine talks to.
//!
//! The engine never touches a world, a renderer, a database, or a player
//! inventory directly. Each of those lives behind one of the traits below,
//! and the host wires concrete implementations into a [`Collaborators`]
//! bundle. In-memory implementations for tests and the headless demo live
//! in [`crate::memory`].
//!
//! Every trait is `Send` so the whole engine can move into the runner task.

use spellbreak_types::{
    Cue, Difficulty, PlayerId, Position, SavedItem, TokenId, TokenKind, VisualState,
};

/// Errors reported by collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    /// The world refused to spawn an entity.
    #[error("failed to spawn {kind:?}: {reason}")]
    Spawn {
        /// Kind that was requested.
        kind: TokenKind,
        /// Why the spawn failed.
        reason: String,
    },

    /// The world could not move an entity.
    #[error("failed to teleport token {token}: {reason}")]
    Teleport {
        /// The entity that could not be moved.
        token: TokenId,
        /// Why the move failed.
        reason: String,
    },

    /// A read or write against the score / progress store failed.
    #[error("persistence operation {operation} failed: {reason}")]
    Persistence {
        /// Name of the gateway method.
        operation: &'static str,
        /// Why it failed.
        reason: String,
    },

    /// The player is not reachable (logged out, unknown).
    #[error("player {player} is unavailable")]
    PlayerUnavailable {
        /// The missing player.
        player: PlayerId,
    },

    /// The start trigger could not be placed.
    #[error("failed to place start trigger for player {player}: {reason}")]
    Trigger {
        /// The player the trigger was for.
        player: PlayerId,
        /// Why placement failed.
        reason: String,
    },
}

/// Spawns, moves and removes token entities in the game world.
pub trait WorldEntitySpawner: Send {
    /// Spawn an entity of `kind` at `position` and return its handle.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Spawn`] if the world refuses.
    fn spawn(&mut self, kind: TokenKind, position: Position) -> Result<TokenId, CollaboratorError>;

    /// Remove an entity. Removing an unknown handle is a no-op.
    fn despawn(&mut self, token: TokenId);

    /// Move an entity.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Teleport`] if the entity cannot be moved.
    fn teleport(&mut self, token: TokenId, position: Position) -> Result<(), CollaboratorError>;

    /// Apply rendering flags to an entity.
    fn set_visual_state(&mut self, token: TokenId, state: &VisualState);
}

/// Renders presentation cues (titles, sounds, particles, bars).
pub trait EffectPresenter: Send {
    /// Present a cue to a player. Infallible from the engine's view.
    fn present(&mut self, player: PlayerId, cue: &Cue);
}

/// Read/write contract for progress and scores.
pub trait PersistenceGateway: Send {
    /// Whether the player has started a game on any tier.
    fn has_played_any_difficulty(&self, player: PlayerId) -> Result<bool, CollaboratorError>;

    /// Whether the player has started a game on `difficulty`.
    fn has_played(
        &self,
        player: PlayerId,
        difficulty: Difficulty,
    ) -> Result<bool, CollaboratorError>;

    /// Whether the player has cleared any tier.
    fn has_cleared_any_difficulty(&self, player: PlayerId) -> Result<bool, CollaboratorError>;

    /// Mark `difficulty` as played. Idempotent.
    fn record_progress(
        &mut self,
        player: PlayerId,
        difficulty: Difficulty,
    ) -> Result<(), CollaboratorError>;

    /// Mark `difficulty` as cleared. Only the first clear is timestamped.
    fn record_clear(
        &mut self,
        player: PlayerId,
        difficulty: Difficulty,
    ) -> Result<(), CollaboratorError>;

    /// Append a final score.
    fn record_score(
        &mut self,
        player: PlayerId,
        player_name: &str,
        score: u32,
        difficulty: Difficulty,
    ) -> Result<(), CollaboratorError>;

    /// Best stored score on `difficulty`, or 0 when none exists.
    fn high_score(&self, difficulty: Difficulty) -> Result<u32, CollaboratorError>;
}

/// Player-side effects: identity, location, held item and the start
/// trigger object.
pub trait PlayerGateway: Send {
    /// Name recorded with the player's scores.
    fn display_name(&self, player: PlayerId) -> Result<String, CollaboratorError>;

    /// Anchor position tokens are laid out around.
    fn position(&self, player: PlayerId) -> Result<Position, CollaboratorError>;

    /// Take the item out of the player's hand and hand it to the engine.
    fn stash_held_item(&mut self, player: PlayerId) -> Result<SavedItem, CollaboratorError>;

    /// Give a stashed item back and release any play-time protections.
    fn restore_held_item(&mut self, player: PlayerId, item: SavedItem);

    /// Put the player into play mode (invulnerable, wand in hand).
    fn prepare_for_play(&mut self, player: PlayerId);

    /// Place the start trigger object near the player.
    fn place_trigger(&mut self, player: PlayerId) -> Result<(), CollaboratorError>;

    /// Whether the player has satisfied the start trigger.
    fn trigger_satisfied(&self, player: PlayerId) -> bool;

    /// Remove the start trigger object. Idempotent.
    fn clear_trigger(&mut self, player: PlayerId);
}

/// The full set of collaborators an engine needs.
pub struct Collaborators {
    /// Entity spawning and movement.
    pub world: Box<dyn WorldEntitySpawner>,
    /// Cue rendering.
    pub presenter: Box<dyn EffectPresenter>,
    /// Progress and score storage.
    pub persistence: Box<dyn PersistenceGateway>,
    /// Player-side effects.
    pub players: Box<dyn PlayerGateway>,
}

impl core::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
