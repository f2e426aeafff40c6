//! Per-player game state.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use spellbreak_types::{
    Difficulty, PendingRecord, PlayerId, SavedItem, SessionPhase, SpawnedToken, TokenId,
};

use crate::config::DifficultyConfig;
use crate::scheduler::TaskToken;

/// The single first pick waiting for its partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingReveal {
    /// Handle of the revealed true form.
    pub true_form: TokenId,
    /// Enough to restore the decoy it came from.
    pub record: PendingRecord,
}

/// Scheduled tasks owned by a session, cancelled on teardown.
#[derive(Debug, Clone, Default)]
pub struct SessionTimers {
    /// Pre-game countdown.
    pub countdown: Option<TaskToken>,
    /// One-second active tick.
    pub ticker: Option<TaskToken>,
    /// Delayed releases and restores.
    pub delayed: Vec<TaskToken>,
}

impl SessionTimers {
    /// Take every token, leaving the set empty.
    pub fn drain(&mut self) -> Vec<TaskToken> {
        let mut tokens: Vec<TaskToken> = std::mem::take(&mut self.delayed);
        tokens.extend(self.countdown.take());
        tokens.extend(self.ticker.take());
        tokens
    }
}

/// A game in setup: the trigger is placed but not yet satisfied.
#[derive(Debug, Clone)]
pub struct PendingSetup {
    /// Tier that will start.
    pub difficulty: Arc<DifficultyConfig>,
    /// Item taken from the player's hand.
    pub saved_item: SavedItem,
    /// Setup time left in milliseconds.
    pub budget_ms: i64,
    /// Handle of the trigger poll.
    pub poll: Option<TaskToken>,
}

/// A running game, from trigger confirmation to teardown.
#[derive(Debug, Clone)]
pub struct Session {
    /// Owner.
    pub player_id: PlayerId,
    /// Name recorded with the score.
    pub player_name: String,
    /// Tier parameters.
    pub difficulty: Arc<DifficultyConfig>,
    /// Current phase; `Countdown`, `Active` or `Resolving`.
    pub phase: SessionPhase,
    /// Points so far.
    pub score: u32,
    /// Pairs matched so far.
    pub matched_pairs: u32,
    /// Consecutive matches since the last mismatch.
    pub combo_streak: u32,
    /// Clock in milliseconds. Moves in whole seconds except for specials.
    pub time_remaining_ms: i64,
    /// Seconds left in the pre-game countdown.
    pub countdown_remaining: u32,
    /// The initial layout has been spawned.
    pub has_spawned_tokens: bool,
    /// Last accepted click.
    pub last_interaction: Option<DateTime<Utc>>,
    /// Set on a full clear: whether it was the player's first clear.
    pub first_clear: Option<bool>,
    /// The player asked to stop.
    pub stop_requested: bool,
    /// Item returned to the player on teardown.
    pub saved_item: SavedItem,
    /// Every token spawned for this session and still alive.
    pub tokens: BTreeMap<TokenId, SpawnedToken>,
    /// The pending slot.
    pub pending: Option<PendingReveal>,
    /// Timers to cancel on teardown.
    pub timers: SessionTimers,
}

impl Session {
    /// A fresh session entering the countdown.
    pub fn new(
        player_id: PlayerId,
        player_name: String,
        difficulty: Arc<DifficultyConfig>,
        saved_item: SavedItem,
        countdown_secs: u32,
    ) -> Self {
        let time_remaining_ms = difficulty.total_time_ms();
        Self {
            player_id,
            player_name,
            difficulty,
            phase: SessionPhase::Countdown,
            score: 0,
            matched_pairs: 0,
            combo_streak: 0,
            time_remaining_ms,
            countdown_remaining: countdown_secs,
            has_spawned_tokens: false,
            last_interaction: None,
            first_clear: None,
            stop_requested: false,
            saved_item,
            tokens: BTreeMap::new(),
            pending: None,
            timers: SessionTimers::default(),
        }
    }

    /// Tier key.
    pub fn tier(&self) -> Difficulty {
        self.difficulty.difficulty
    }

    /// Whole seconds left, rounded down.
    pub const fn time_remaining_secs(&self) -> i64 {
        self.time_remaining_ms.div_euclid(1000)
    }

    /// Whether the clock still shows the full tier time.
    pub fn clock_untouched(&self) -> bool {
        self.time_remaining_ms == self.difficulty.total_time_ms()
    }

    /// Number of unrevealed decoys.
    pub fn decoy_count(&self) -> usize {
        self.tokens.values().filter(|t| t.is_decoy()).count()
    }

    /// Tokens a chaos shuffle moves: every registered token but `source`.
    pub fn shufflable_tokens(&self, source: TokenId) -> Vec<TokenId> {
        self.tokens.keys().copied().filter(|id| *id != source).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use spellbreak_types::{
        Position, SpecialEffect, TokenKind, TokenLabel, TokenRecord, TokenRole,
    };

    use super::*;
    use crate::config::DifficultyTable;
    use crate::scheduler::{Scheduler, Task, TimerQueue};

    fn easy_session() -> Session {
        let table = DifficultyTable::builtin().unwrap();
        let easy = Arc::clone(table.get(Difficulty::Easy).unwrap());
        Session::new(
            PlayerId::new(),
            "erin".to_owned(),
            easy,
            SavedItem::default(),
            5,
        )
    }

    #[test]
    fn new_session_starts_full_clock() {
        let session = easy_session();
        assert_eq!(session.time_remaining_ms, 30_000);
        assert_eq!(session.time_remaining_secs(), 30);
        assert!(session.clock_untouched());
        assert_eq!(session.phase, SessionPhase::Countdown);
        assert!(session.pending.is_none());
    }

    #[test]
    fn shuffle_moves_everything_but_its_source() {
        let mut session = easy_session();
        let record = TokenRecord {
            true_kind: TokenKind::Allay,
            label: TokenLabel::Special {
                kind: TokenKind::Allay,
                effect: SpecialEffect::TimeBonus,
            },
        };
        let decoy = TokenId::new();
        let special = TokenId::new();
        session.tokens.insert(
            decoy,
            SpawnedToken {
                form: TokenKind::Zombie,
                role: TokenRole::Decoy,
                record,
                position: Position::default(),
            },
        );
        session.tokens.insert(
            special,
            SpawnedToken {
                form: TokenKind::Allay,
                role: TokenRole::Special {
                    effect: SpecialEffect::TimeBonus,
                },
                record,
                position: Position::default(),
            },
        );
        let chaos = TokenId::new();
        session.tokens.insert(
            chaos,
            SpawnedToken {
                form: TokenKind::Enderman,
                role: TokenRole::Special {
                    effect: SpecialEffect::Chaos,
                },
                record,
                position: Position::default(),
            },
        );

        let mut moved = session.shufflable_tokens(chaos);
        moved.sort_unstable();
        let mut expected = vec![decoy, special];
        expected.sort_unstable();
        assert_eq!(moved, expected);
        assert_eq!(session.decoy_count(), 1);
    }

    #[test]
    fn drain_takes_every_timer() {
        let mut queue = TimerQueue::new();
        let player = PlayerId::new();
        let mut timers = SessionTimers {
            countdown: Some(queue.after(std::time::Duration::ZERO, Task::CountdownTick { player })),
            ticker: None,
            delayed: vec![queue.after(std::time::Duration::ZERO, Task::ActiveTick { player })],
        };
        assert_eq!(timers.drain().len(), 2);
        assert!(timers.countdown.is_none());
        assert!(timers.drain().is_empty());
    }
}
