//! Shared harness for the engine integration tests.

#![allow(dead_code, missing_docs, clippy::unwrap_used)]

use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use spellbreak_core::memory::{
    InMemoryPersistence, InMemoryWorld, RecordingPresenter, ScriptedPlayers,
};
use spellbreak_core::{
    AdvanceReport, Collaborators, Engine, GameConfig, GameError, InteractOutcome,
    PersistenceGateway, StartOutcome,
};
use spellbreak_types::{
    Cue, Difficulty, PlayerId, Position, SessionPhase, SpecialEffect, TokenId, TokenLabel,
};

/// Time from the start request to the first active tick: one setup poll
/// plus a five-second countdown.
pub const TO_ACTIVE: Duration = Duration::from_millis(5_500);

/// Gap between two scripted clicks, past the debounce window.
pub const CLICK_GAP_MS: i64 = 600;

pub struct Harness {
    pub engine: Engine,
    pub world: InMemoryWorld,
    pub presenter: RecordingPresenter,
    pub persistence: InMemoryPersistence,
    pub players: ScriptedPlayers,
    pub player: PlayerId,
    pub clock: DateTime<Utc>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(&GameConfig {
            seed: Some(42),
            ..GameConfig::default()
        })
    }

    pub fn with_config(config: &GameConfig) -> Self {
        let world = InMemoryWorld::new();
        let presenter = RecordingPresenter::new();
        let persistence = InMemoryPersistence::new();
        let players = ScriptedPlayers::new();
        let player = PlayerId::new();
        players.add_player(player, "Wren", Position::new(100.0, 64.0, 100.0), "diamond_sword");

        let engine = Engine::new(
            config,
            Collaborators {
                world: Box::new(world.clone()),
                presenter: Box::new(presenter.clone()),
                persistence: Box::new(persistence.clone()),
                players: Box::new(players.clone()),
            },
        )
        .unwrap();

        Self {
            engine,
            world,
            presenter,
            persistence,
            players,
            player,
            clock: Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
        }
    }

    /// Mark a tier as played so the next one unlocks.
    pub fn unlock(&self, difficulty: Difficulty) {
        let mut persistence = self.persistence.clone();
        persistence.record_progress(self.player, difficulty).unwrap();
    }

    /// Start a game and run it to its first active tick.
    pub fn start_active(&mut self, difficulty: Difficulty) {
        self.players.satisfy_trigger(self.player);
        let outcome = self.engine.start_session(self.player, difficulty).unwrap();
        assert_eq!(outcome, StartOutcome::AwaitingTrigger);
        self.engine.advance(TO_ACTIVE);
        assert_eq!(self.engine.phase_of(self.player), SessionPhase::Active);
    }

    pub fn advance(&mut self, by: Duration) -> AdvanceReport {
        self.engine.advance(by)
    }

    pub fn advance_secs(&mut self, secs: u64) -> AdvanceReport {
        self.engine.advance(Duration::from_secs(secs))
    }

    pub fn time_remaining_ms(&self) -> i64 {
        self.engine.session(self.player).unwrap().time_remaining_ms
    }

    pub fn score(&self) -> u32 {
        self.engine.session(self.player).unwrap().score
    }

    /// Click a token one click gap after the previous click.
    pub fn click(&mut self, token: TokenId) -> Result<InteractOutcome, GameError> {
        self.clock = self
            .clock
            .checked_add_signed(TimeDelta::milliseconds(CLICK_GAP_MS))
            .unwrap();
        self.engine.on_interact(self.player, token, self.clock)
    }

    /// Click a token at an explicit offset from the previous click.
    pub fn click_after(
        &mut self,
        token: TokenId,
        gap: TimeDelta,
    ) -> Result<InteractOutcome, GameError> {
        self.clock = self.clock.checked_add_signed(gap).unwrap();
        self.engine.on_interact(self.player, token, self.clock)
    }

    /// Unrevealed decoys with their hidden labels, in token order.
    pub fn decoys(&self) -> Vec<(TokenId, TokenLabel)> {
        self.engine
            .session(self.player)
            .unwrap()
            .tokens
            .iter()
            .filter(|(_, t)| t.is_decoy())
            .map(|(id, t)| (*id, t.record.label))
            .collect()
    }

    /// Two decoys hiding the halves of one pair.
    pub fn find_pair(&self) -> (TokenId, TokenId) {
        let decoys = self.decoys();
        decoys
            .iter()
            .find_map(|(a, label)| {
                decoys
                    .iter()
                    .find(|(_, other)| label.pairs_with(*other))
                    .map(|(b, _)| (*a, *b))
            })
            .unwrap()
    }

    /// Two paired decoys that do not pair with each other.
    pub fn find_mismatch(&self) -> (TokenId, TokenId) {
        let decoys = self.decoys();
        let paired: Vec<_> = decoys
            .iter()
            .filter(|(_, label)| matches!(label, TokenLabel::Paired { .. }))
            .collect();
        paired
            .iter()
            .find_map(|(a, label)| {
                paired
                    .iter()
                    .find(|(b, other)| b != a && !label.pairs_with(*other))
                    .map(|(b, _)| (*a, *b))
            })
            .unwrap()
    }

    /// A decoy hiding a special with the given effect.
    pub fn find_special(&self, effect: SpecialEffect) -> TokenId {
        self.decoys()
            .into_iter()
            .find(|(_, label)| {
                matches!(label, TokenLabel::Special { effect: e, .. } if *e == effect)
            })
            .map(|(id, _)| id)
            .unwrap()
    }

    /// Reveal a whole pair and return the outcome of the second click.
    pub fn match_pair(&mut self) -> InteractOutcome {
        let (a, b) = self.find_pair();
        let first = self.click(a).unwrap();
        assert!(matches!(first, InteractOutcome::FirstReveal { .. }));
        self.click(b).unwrap()
    }

    pub fn cues(&self) -> Vec<Cue> {
        self.presenter.cues_for(self.player)
    }

    pub fn count_cues(&self, predicate: impl Fn(&Cue) -> bool) -> usize {
        self.presenter.count(predicate)
    }
}
