//! In-memory collaborators.
//!
//! Each type is a cheap cloneable handle over shared state: hand one clone
//! to the engine and keep another to inspect what happened. The headless
//! demo and the test suites both run against these.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use spellbreak_types::{
    Cue, Difficulty, PlayerId, Position, ProgressRecord, SavedItem, ScoreRecord, TokenId,
    TokenKind, VisualState,
};
use tracing::debug;

use crate::collaborators::{
    CollaboratorError, EffectPresenter, PersistenceGateway, PlayerGateway, WorldEntitySpawner,
};

fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// An entity living in the in-memory world.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldEntity {
    /// Rendered kind.
    pub kind: TokenKind,
    /// Current position.
    pub position: Position,
    /// Last applied rendering flags.
    pub visual: VisualState,
    /// Number of times the entity was teleported.
    pub teleports: u32,
}

#[derive(Debug, Default)]
struct WorldState {
    entities: BTreeMap<TokenId, WorldEntity>,
    spawned_total: u64,
    refuse_kinds: Vec<TokenKind>,
}

/// World that keeps entities in a map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorld {
    state: Arc<Mutex<WorldState>>,
}

impl InMemoryWorld {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future spawn of `kind` fail.
    pub fn refuse_spawns_of(&self, kind: TokenKind) {
        lock(&self.state).refuse_kinds.push(kind);
    }

    /// Look up a live entity.
    pub fn entity(&self, token: TokenId) -> Option<WorldEntity> {
        lock(&self.state).entities.get(&token).cloned()
    }

    /// Every live entity.
    pub fn entities(&self) -> Vec<(TokenId, WorldEntity)> {
        lock(&self.state)
            .entities
            .iter()
            .map(|(id, entity)| (*id, entity.clone()))
            .collect()
    }

    /// Number of live entities.
    pub fn live_count(&self) -> usize {
        lock(&self.state).entities.len()
    }

    /// Number of entities ever spawned.
    pub fn spawned_total(&self) -> u64 {
        lock(&self.state).spawned_total
    }

    /// Remove an entity behind the engine's back, as a world unload would.
    pub fn remove_externally(&self, token: TokenId) -> bool {
        lock(&self.state).entities.remove(&token).is_some()
    }
}

impl WorldEntitySpawner for InMemoryWorld {
    fn spawn(&mut self, kind: TokenKind, position: Position) -> Result<TokenId, CollaboratorError> {
        let mut state = lock(&self.state);
        if state.refuse_kinds.contains(&kind) {
            return Err(CollaboratorError::Spawn {
                kind,
                reason: "spawning disabled for this kind".to_owned(),
            });
        }
        let token = TokenId::new();
        state.entities.insert(
            token,
            WorldEntity {
                kind,
                position,
                visual: VisualState::default(),
                teleports: 0,
            },
        );
        state.spawned_total = state.spawned_total.saturating_add(1);
        Ok(token)
    }

    fn despawn(&mut self, token: TokenId) {
        lock(&self.state).entities.remove(&token);
    }

    fn teleport(&mut self, token: TokenId, position: Position) -> Result<(), CollaboratorError> {
        let mut state = lock(&self.state);
        let entity = state
            .entities
            .get_mut(&token)
            .ok_or_else(|| CollaboratorError::Teleport {
                token,
                reason: "no such entity".to_owned(),
            })?;
        entity.position = position;
        entity.teleports = entity.teleports.saturating_add(1);
        Ok(())
    }

    fn set_visual_state(&mut self, token: TokenId, state: &VisualState) {
        if let Some(entity) = lock(&self.state).entities.get_mut(&token) {
            entity.visual = state.clone();
        }
    }
}

// ---------------------------------------------------------------------------
// Presenter
// ---------------------------------------------------------------------------

/// Presenter that records every cue.
#[derive(Debug, Clone, Default)]
pub struct RecordingPresenter {
    cues: Arc<Mutex<Vec<(PlayerId, Cue)>>>,
}

impl RecordingPresenter {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cues presented to one player, oldest first.
    pub fn cues_for(&self, player: PlayerId) -> Vec<Cue> {
        lock(&self.cues)
            .iter()
            .filter(|(p, _)| *p == player)
            .map(|(_, cue)| cue.clone())
            .collect()
    }

    /// Number of recorded cues matching a predicate.
    pub fn count(&self, predicate: impl Fn(&Cue) -> bool) -> usize {
        lock(&self.cues).iter().filter(|(_, cue)| predicate(cue)).count()
    }

    /// Drop everything recorded so far.
    pub fn clear(&self) {
        lock(&self.cues).clear();
    }
}

impl EffectPresenter for RecordingPresenter {
    fn present(&mut self, player: PlayerId, cue: &Cue) {
        debug!(player = %player, cue = ?cue, "Presenting cue");
        lock(&self.cues).push((player, cue.clone()));
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct PersistenceState {
    progress: BTreeMap<(PlayerId, Difficulty), ProgressRecord>,
    scores: Vec<ScoreRecord>,
    next_score_id: u64,
    unavailable: bool,
}

impl PersistenceState {
    fn check(&self, operation: &'static str) -> Result<(), CollaboratorError> {
        if self.unavailable {
            return Err(CollaboratorError::Persistence {
                operation,
                reason: "store unavailable".to_owned(),
            });
        }
        Ok(())
    }
}

/// Progress and score store held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPersistence {
    state: Arc<Mutex<PersistenceState>>,
}

impl InMemoryPersistence {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every gateway call fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.state).unavailable = unavailable;
    }

    /// Progress row for one player and tier.
    pub fn progress(&self, player: PlayerId, difficulty: Difficulty) -> Option<ProgressRecord> {
        lock(&self.state).progress.get(&(player, difficulty)).cloned()
    }

    /// The newest `limit` scores, listed oldest first.
    pub fn recent_scores(&self, limit: usize) -> Vec<ScoreRecord> {
        let state = lock(&self.state);
        let skip = state.scores.len().saturating_sub(limit);
        state.scores.iter().skip(skip).cloned().collect()
    }

    /// The best `limit` scores across all tiers. Ties keep insertion order.
    pub fn top_scores(&self, limit: usize) -> Vec<ScoreRecord> {
        let mut scores = lock(&self.state).scores.clone();
        scores.sort_by(|a, b| b.score.cmp(&a.score).then(a.id.cmp(&b.id)));
        scores.truncate(limit);
        scores
    }

    /// The best `limit` scores on one tier.
    pub fn top_scores_for(&self, difficulty: Difficulty, limit: usize) -> Vec<ScoreRecord> {
        let mut scores: Vec<ScoreRecord> = lock(&self.state)
            .scores
            .iter()
            .filter(|s| s.difficulty == difficulty)
            .cloned()
            .collect();
        scores.sort_by(|a, b| b.score.cmp(&a.score).then(a.id.cmp(&b.id)));
        scores.truncate(limit);
        scores
    }
}

impl PersistenceGateway for InMemoryPersistence {
    fn has_played_any_difficulty(&self, player: PlayerId) -> Result<bool, CollaboratorError> {
        let state = lock(&self.state);
        state.check("has_played_any_difficulty")?;
        Ok(state
            .progress
            .values()
            .any(|p| p.player_id == player && p.played))
    }

    fn has_played(
        &self,
        player: PlayerId,
        difficulty: Difficulty,
    ) -> Result<bool, CollaboratorError> {
        let state = lock(&self.state);
        state.check("has_played")?;
        Ok(state
            .progress
            .get(&(player, difficulty))
            .is_some_and(|p| p.played))
    }

    fn has_cleared_any_difficulty(&self, player: PlayerId) -> Result<bool, CollaboratorError> {
        let state = lock(&self.state);
        state.check("has_cleared_any_difficulty")?;
        Ok(state
            .progress
            .values()
            .any(|p| p.player_id == player && p.cleared))
    }

    fn record_progress(
        &mut self,
        player: PlayerId,
        difficulty: Difficulty,
    ) -> Result<(), CollaboratorError> {
        let mut state = lock(&self.state);
        state.check("record_progress")?;
        state
            .progress
            .entry((player, difficulty))
            .or_insert_with(|| ProgressRecord {
                player_id: player,
                difficulty,
                played: false,
                cleared: false,
                cleared_at: None,
            })
            .played = true;
        Ok(())
    }

    fn record_clear(
        &mut self,
        player: PlayerId,
        difficulty: Difficulty,
    ) -> Result<(), CollaboratorError> {
        let mut state = lock(&self.state);
        state.check("record_clear")?;
        let record = state
            .progress
            .entry((player, difficulty))
            .or_insert_with(|| ProgressRecord {
                player_id: player,
                difficulty,
                played: true,
                cleared: false,
                cleared_at: None,
            });
        if !record.cleared {
            record.cleared = true;
            record.cleared_at = Some(Utc::now());
        }
        Ok(())
    }

    fn record_score(
        &mut self,
        player: PlayerId,
        player_name: &str,
        score: u32,
        difficulty: Difficulty,
    ) -> Result<(), CollaboratorError> {
        let mut state = lock(&self.state);
        state.check("record_score")?;
        state.next_score_id = state.next_score_id.saturating_add(1);
        let id = state.next_score_id;
        state.scores.push(ScoreRecord {
            id,
            player_id: player,
            player_name: player_name.to_owned(),
            score,
            difficulty,
            registered_at: Utc::now(),
        });
        Ok(())
    }

    fn high_score(&self, difficulty: Difficulty) -> Result<u32, CollaboratorError> {
        let state = lock(&self.state);
        state.check("high_score")?;
        Ok(state
            .scores
            .iter()
            .filter(|s| s.difficulty == difficulty)
            .map(|s| s.score)
            .max()
            .unwrap_or(0))
    }
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct PlayerState {
    name: String,
    position: Position,
    held: SavedItem,
    in_play: bool,
    trigger_placed: bool,
    trigger_ready: bool,
    auto_trigger: bool,
}

/// Player gateway driven by the test or demo script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPlayers {
    players: Arc<Mutex<BTreeMap<PlayerId, PlayerState>>>,
}

impl ScriptedPlayers {
    /// Create a gateway with no players.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a player standing at `position` and holding `held`.
    pub fn add_player(&self, player: PlayerId, name: &str, position: Position, held: &str) {
        lock(&self.players).insert(
            player,
            PlayerState {
                name: name.to_owned(),
                position,
                held: SavedItem(held.to_owned()),
                in_play: false,
                trigger_placed: false,
                trigger_ready: false,
                auto_trigger: false,
            },
        );
    }

    /// Take a player out of the world, as a logout would.
    pub fn remove_player(&self, player: PlayerId) -> bool {
        lock(&self.players).remove(&player).is_some()
    }

    /// Satisfy the start trigger the next time it is polled. Calling this
    /// before the trigger is placed satisfies it as soon as it appears.
    pub fn satisfy_trigger(&self, player: PlayerId) {
        if let Some(state) = lock(&self.players).get_mut(&player) {
            state.trigger_ready = true;
        }
    }

    /// Satisfy every trigger placed for this player as soon as it appears.
    pub fn set_auto_trigger(&self, player: PlayerId, enabled: bool) {
        if let Some(state) = lock(&self.players).get_mut(&player) {
            state.auto_trigger = enabled;
        }
    }

    /// Item currently in the player's hand.
    pub fn held_item(&self, player: PlayerId) -> Option<SavedItem> {
        lock(&self.players).get(&player).map(|s| s.held.clone())
    }

    /// Whether the player is currently in play mode.
    pub fn is_in_play(&self, player: PlayerId) -> bool {
        lock(&self.players).get(&player).is_some_and(|s| s.in_play)
    }

    /// Whether a start trigger is currently placed for the player.
    pub fn trigger_placed(&self, player: PlayerId) -> bool {
        lock(&self.players)
            .get(&player)
            .is_some_and(|s| s.trigger_placed)
    }
}

impl PlayerGateway for ScriptedPlayers {
    fn display_name(&self, player: PlayerId) -> Result<String, CollaboratorError> {
        lock(&self.players)
            .get(&player)
            .map(|s| s.name.clone())
            .ok_or(CollaboratorError::PlayerUnavailable { player })
    }

    fn position(&self, player: PlayerId) -> Result<Position, CollaboratorError> {
        lock(&self.players)
            .get(&player)
            .map(|s| s.position)
            .ok_or(CollaboratorError::PlayerUnavailable { player })
    }

    fn stash_held_item(&mut self, player: PlayerId) -> Result<SavedItem, CollaboratorError> {
        lock(&self.players)
            .get_mut(&player)
            .map(|s| std::mem::take(&mut s.held))
            .ok_or(CollaboratorError::PlayerUnavailable { player })
    }

    fn restore_held_item(&mut self, player: PlayerId, item: SavedItem) {
        if let Some(state) = lock(&self.players).get_mut(&player) {
            state.held = item;
            state.in_play = false;
        }
    }

    fn prepare_for_play(&mut self, player: PlayerId) {
        if let Some(state) = lock(&self.players).get_mut(&player) {
            state.in_play = true;
        }
    }

    fn place_trigger(&mut self, player: PlayerId) -> Result<(), CollaboratorError> {
        let mut players = lock(&self.players);
        let state = players
            .get_mut(&player)
            .ok_or_else(|| CollaboratorError::Trigger {
                player,
                reason: "player is not in the world".to_owned(),
            })?;
        state.trigger_placed = true;
        // A trigger satisfied ahead of placement stays satisfied.
        state.trigger_ready = state.trigger_ready || state.auto_trigger;
        Ok(())
    }

    fn trigger_satisfied(&self, player: PlayerId) -> bool {
        lock(&self.players)
            .get(&player)
            .is_some_and(|s| s.trigger_placed && s.trigger_ready)
    }

    fn clear_trigger(&mut self, player: PlayerId) {
        if let Some(state) = lock(&self.players).get_mut(&player) {
            state.trigger_placed = false;
            state.trigger_ready = false;
        }
    }
}
