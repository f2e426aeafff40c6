//! The session store: who is playing, and in which phase.
//!
//! A player appears in at most one of the two maps. A pending setup becomes
//! a session when the trigger is confirmed; a session is removed on
//! teardown. Nothing else holds session state.

use std::collections::BTreeMap;

use spellbreak_types::{PlayerId, SessionPhase};

use crate::session::{PendingSetup, Session};

/// Keyed collection of sessions and pending setups.
#[derive(Debug, Default)]
pub struct SessionStore {
    setups: BTreeMap<PlayerId, PendingSetup>,
    sessions: BTreeMap<PlayerId, Session>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the player is in setup or in a game.
    pub fn is_busy(&self, player: PlayerId) -> bool {
        self.setups.contains_key(&player) || self.sessions.contains_key(&player)
    }

    /// Lifecycle phase of the player.
    pub fn phase_of(&self, player: PlayerId) -> SessionPhase {
        if self.setups.contains_key(&player) {
            return SessionPhase::AwaitingTrigger;
        }
        self.sessions
            .get(&player)
            .map_or(SessionPhase::Idle, |s| s.phase)
    }

    /// Start tracking a setup. Returns `false` if the player is already busy.
    pub fn insert_setup(&mut self, player: PlayerId, setup: PendingSetup) -> bool {
        if self.is_busy(player) {
            return false;
        }
        self.setups.insert(player, setup);
        true
    }

    /// Mutable access to a setup.
    pub fn setup_mut(&mut self, player: PlayerId) -> Option<&mut PendingSetup> {
        self.setups.get_mut(&player)
    }

    /// Stop tracking a setup.
    pub fn remove_setup(&mut self, player: PlayerId) -> Option<PendingSetup> {
        self.setups.remove(&player)
    }

    /// Register a session. Any setup for the player must already be gone.
    pub fn insert(&mut self, session: Session) -> bool {
        let player = session.player_id;
        if self.is_busy(player) {
            return false;
        }
        self.sessions.insert(player, session);
        true
    }

    /// Shared access to a session.
    pub fn get(&self, player: PlayerId) -> Option<&Session> {
        self.sessions.get(&player)
    }

    /// Mutable access to a session.
    pub fn get_mut(&mut self, player: PlayerId) -> Option<&mut Session> {
        self.sessions.get_mut(&player)
    }

    /// Remove a session.
    pub fn remove(&mut self, player: PlayerId) -> Option<Session> {
        self.sessions.remove(&player)
    }

    /// Number of running sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of setups waiting for their trigger.
    pub fn setup_count(&self) -> usize {
        self.setups.len()
    }

    /// Players with a running session.
    pub fn players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.sessions.keys().copied()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use spellbreak_types::{Difficulty, SavedItem};

    use super::*;
    use crate::config::DifficultyTable;

    fn setup() -> PendingSetup {
        let table = DifficultyTable::builtin().unwrap();
        PendingSetup {
            difficulty: Arc::clone(table.get(Difficulty::Easy).unwrap()),
            saved_item: SavedItem::default(),
            budget_ms: 10_000,
            poll: None,
        }
    }

    #[test]
    fn setup_then_session_keeps_player_busy() {
        let mut store = SessionStore::new();
        let player = PlayerId::new();
        assert_eq!(store.phase_of(player), SessionPhase::Idle);

        assert!(store.insert_setup(player, setup()));
        assert!(!store.insert_setup(player, setup()));
        assert!(store.is_busy(player));
        assert_eq!(store.phase_of(player), SessionPhase::AwaitingTrigger);

        let pending = store.remove_setup(player).unwrap();
        let session = Session::new(
            player,
            "fay".to_owned(),
            pending.difficulty,
            pending.saved_item,
            5,
        );
        assert!(store.insert(session));
        assert_eq!(store.phase_of(player), SessionPhase::Countdown);
        assert_eq!(store.session_count(), 1);
        assert_eq!(store.setup_count(), 0);

        store.remove(player).unwrap();
        assert!(!store.is_busy(player));
    }

    #[test]
    fn session_blocks_new_setup() {
        let mut store = SessionStore::new();
        let player = PlayerId::new();
        let pending = setup();
        store.insert(Session::new(
            player,
            "gus".to_owned(),
            pending.difficulty.clone(),
            SavedItem::default(),
            5,
        ));
        assert!(!store.insert_setup(player, pending));
        assert_eq!(store.players().collect::<Vec<_>>(), vec![player]);
    }
}
