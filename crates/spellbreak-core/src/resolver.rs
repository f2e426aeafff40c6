//! Click handling: debounce, reveal, pair resolution and specials.
//!
//! A click on a decoy spawns its true form in place. Specials apply their
//! effect at once and leave shortly after. Paired forms go through the
//! pending slot: the first pick waits there, the second is compared against
//! it, and the slot is emptied either way.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rand::seq::SliceRandom;
use spellbreak_types::{
    Cue, PendingRecord, PlayerId, Position, SessionPhase, SpawnedToken, SpecialEffect, TokenId,
    TokenLabel, TokenRole, VisualState,
};
use tracing::{debug, info, warn};

use crate::combo;
use crate::error::GameError;
use crate::lifecycle::Engine;
use crate::scheduler::{RestoreEntry, Scheduler, Task, TimerQueue};
use crate::session::{PendingReveal, Session};

/// Decoys are only restored after a mismatch when at least this much time
/// is left on the clock.
pub const RESPAWN_THRESHOLD_MS: i64 = 500;

/// Delay before matched, mismatched or special forms leave.
pub const RELEASE_DELAY: Duration = Duration::from_millis(500);

/// Time added or removed by the time specials.
pub const SPECIAL_TIME_MS: i64 = 5_000;

/// Why a click was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The player has no running session.
    NoSession,
    /// The session is not in active play.
    NotActive,
    /// The token does not belong to the session.
    UnknownToken,
    /// The token is already revealed.
    NotADecoy,
}

/// Result of a click that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractOutcome {
    /// Nothing happened.
    Ignored(IgnoreReason),
    /// Too soon after the previous accepted click.
    Debounced,
    /// A paired form was revealed and now waits in the pending slot.
    FirstReveal {
        /// Its label.
        label: TokenLabel,
    },
    /// A special was revealed and its effect applied.
    Special(SpecialEffect),
    /// The reveal completed a pair.
    Matched {
        /// Streak after the match.
        streak: u32,
        /// Points awarded.
        points: u32,
    },
    /// The reveal did not complete a pair.
    Mismatched {
        /// Whether the two decoys will be restored.
        respawn: bool,
    },
}

/// Schedule a session-owned delayed task, dropping tokens that already ran.
fn schedule_delayed(timers: &mut TimerQueue, session: &mut Session, delay: Duration, task: Task) {
    session.timers.delayed.retain(|t| timers.is_scheduled(*t));
    session.timers.delayed.push(timers.after(delay, task));
}

impl Engine {
    /// Handle a click by `player` on `token` at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Collaborator`] if the true form cannot be
    /// spawned. The decoy stays in place and the session is unchanged
    /// apart from the debounce timestamp.
    pub fn on_interact(
        &mut self,
        player: PlayerId,
        token: TokenId,
        now: DateTime<Utc>,
    ) -> Result<InteractOutcome, GameError> {
        let debounce = i64::try_from(self.settings.debounce_ms)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .unwrap_or(TimeDelta::MAX);

        let Some(session) = self.store.get_mut(player) else {
            return Ok(InteractOutcome::Ignored(IgnoreReason::NoSession));
        };
        if session.phase != SessionPhase::Active {
            return Ok(InteractOutcome::Ignored(IgnoreReason::NotActive));
        }
        let Some(decoy) = session.tokens.get(&token).copied() else {
            return Ok(InteractOutcome::Ignored(IgnoreReason::UnknownToken));
        };
        if !decoy.is_decoy() {
            return Ok(InteractOutcome::Ignored(IgnoreReason::NotADecoy));
        }
        if session
            .last_interaction
            .is_some_and(|last| now.signed_duration_since(last) < debounce)
        {
            debug!(player = %player, token = %token, "Click debounced");
            return Ok(InteractOutcome::Debounced);
        }
        session.last_interaction = Some(now);

        self.collab
            .presenter
            .present(player, &Cue::Incantation { at: decoy.position });

        let record = decoy.record;
        let true_form = self.collab.world.spawn(record.true_kind, decoy.position)?;
        self.collab.world.despawn(token);
        session.tokens.remove(&token);
        self.collab
            .world
            .set_visual_state(true_form, &VisualState::revealed(record.label));

        let role = match record.label {
            TokenLabel::Special { effect, .. } => TokenRole::Special { effect },
            label @ TokenLabel::Paired { .. } => TokenRole::TrueIdentity { label },
        };
        session.tokens.insert(
            true_form,
            SpawnedToken {
                form: record.true_kind,
                role,
                record,
                position: decoy.position,
            },
        );
        self.collab
            .presenter
            .present(player, &Cue::Revealed { label: record.label });
        debug!(player = %player, label = %record.label, "Revealed true form");

        if let TokenRole::Special { effect } = role {
            return Ok(self.apply_special(player, true_form, effect));
        }

        let reveal = PendingReveal {
            true_form,
            record: PendingRecord {
                original_decoy: token,
                decoy_kind: decoy.form,
                record,
            },
        };
        Ok(self.resolve_reveal(player, reveal))
    }

    /// Drop a token the world lost on its own. Returns whether it was known.
    pub fn on_token_lost(&mut self, player: PlayerId, token: TokenId) -> bool {
        let Some(session) = self.store.get_mut(player) else {
            return false;
        };
        let known = session.tokens.remove(&token).is_some();
        if known {
            debug!(player = %player, token = %token, "Token lost by the world");
        }
        known
    }

    fn apply_special(
        &mut self,
        player: PlayerId,
        token: TokenId,
        effect: SpecialEffect,
    ) -> InteractOutcome {
        let Some(session) = self.store.get_mut(player) else {
            return InteractOutcome::Ignored(IgnoreReason::NoSession);
        };

        match effect {
            SpecialEffect::TimeBonus => {
                session.time_remaining_ms = session.time_remaining_ms.saturating_add(SPECIAL_TIME_MS);
            }
            SpecialEffect::TimePenalty => {
                session.time_remaining_ms = session
                    .time_remaining_ms
                    .saturating_sub(SPECIAL_TIME_MS)
                    .max(0);
            }
            SpecialEffect::Chaos => {
                let ids = session.shufflable_tokens(token);
                let mut targets: Vec<Position> = ids
                    .iter()
                    .filter_map(|id| session.tokens.get(id).map(|t| t.position))
                    .collect();
                targets.shuffle(&mut self.rng);

                for (id, target) in ids.iter().zip(targets) {
                    let Some(spawned) = session.tokens.get_mut(id) else {
                        continue;
                    };
                    let from = spawned.position;
                    match self.collab.world.teleport(*id, target) {
                        Ok(()) => {
                            spawned.position = target;
                            self.collab
                                .presenter
                                .present(player, &Cue::Shuffled { from });
                        }
                        Err(e) => {
                            warn!(player = %player, token = %id, error = %e, "Shuffle teleport failed");
                            self.soft_failures.push(e.into());
                        }
                    }
                }
            }
        }

        self.collab
            .presenter
            .present(player, &Cue::SpecialRevealed { effect });
        schedule_delayed(
            &mut self.timers,
            session,
            RELEASE_DELAY,
            Task::ReleaseSpecial { player, token },
        );

        info!(
            player = %player,
            effect = ?effect,
            time_remaining_ms = session.time_remaining_ms,
            "Special token revealed"
        );
        InteractOutcome::Special(effect)
    }

    fn resolve_reveal(&mut self, player: PlayerId, reveal: PendingReveal) -> InteractOutcome {
        let Some(session) = self.store.get_mut(player) else {
            return InteractOutcome::Ignored(IgnoreReason::NoSession);
        };
        let label = reveal.record.record.label;

        let first = match session.pending.take() {
            Some(pending) if session.tokens.contains_key(&pending.true_form) => Some(pending),
            Some(stale) => {
                warn!(
                    player = %player,
                    token = %stale.true_form,
                    "Discarding pending pick whose form is gone"
                );
                None
            }
            None => None,
        };

        let Some(first) = first else {
            session.pending = Some(reveal);
            self.collab.presenter.present(player, &Cue::FirstPick);
            return InteractOutcome::FirstReveal { label };
        };

        if first.record.record.label.pairs_with(label) {
            session.matched_pairs = session.matched_pairs.saturating_add(1);
            session.combo_streak = session.combo_streak.saturating_add(1);
            let streak = session.combo_streak;
            let points = combo::score_for_match(streak, &session.difficulty);
            session.score = session.score.saturating_add(points);

            self.collab.presenter.present(
                player,
                &Cue::Matched {
                    streak,
                    phrase: combo::combo_phrase(streak),
                    points,
                    score: session.score,
                },
            );
            schedule_delayed(
                &mut self.timers,
                session,
                RELEASE_DELAY,
                Task::ReleasePair {
                    player,
                    tokens: [first.true_form, reveal.true_form],
                },
            );

            info!(
                player = %player,
                streak,
                points,
                score = session.score,
                matched_pairs = session.matched_pairs,
                "Pair matched"
            );
            InteractOutcome::Matched { streak, points }
        } else {
            session.combo_streak = 0;
            self.collab
                .presenter
                .present(player, &Cue::Mismatched { score: session.score });

            let respawn = session.time_remaining_ms >= RESPAWN_THRESHOLD_MS;
            if respawn {
                schedule_delayed(
                    &mut self.timers,
                    session,
                    RELEASE_DELAY,
                    Task::RestoreDecoys {
                        player,
                        entries: [
                            RestoreEntry {
                                true_form: first.true_form,
                                pending: first.record,
                            },
                            RestoreEntry {
                                true_form: reveal.true_form,
                                pending: reveal.record,
                            },
                        ],
                    },
                );
            }

            debug!(player = %player, respawn, "Pair mismatched");
            InteractOutcome::Mismatched { respawn }
        }
    }

    pub(crate) fn release_special(&mut self, player: PlayerId, token: TokenId) {
        let Some(session) = self.store.get_mut(player) else {
            return;
        };
        if session.tokens.remove(&token).is_some() {
            self.collab.world.despawn(token);
        }
    }

    pub(crate) fn release_pair(&mut self, player: PlayerId, tokens: [TokenId; 2]) {
        let Some(session) = self.store.get_mut(player) else {
            return;
        };
        for token in tokens {
            if let Some(spawned) = session.tokens.remove(&token) {
                self.collab.world.despawn(token);
                self.collab.presenter.present(
                    player,
                    &Cue::Released {
                        at: spawned.position,
                    },
                );
            }
        }
    }

    pub(crate) fn restore_decoys(
        &mut self,
        player: PlayerId,
        entries: [RestoreEntry; 2],
    ) -> Result<(), GameError> {
        let Some(session) = self.store.get_mut(player) else {
            return Ok(());
        };

        let mut result = Ok(());
        for entry in entries {
            let Some(revealed) = session.tokens.get(&entry.true_form).copied() else {
                continue;
            };
            let at = revealed.position;
            let decoy_kind = entry.pending.decoy_kind;

            match self.collab.world.spawn(decoy_kind, at) {
                Ok(decoy) => {
                    self.collab
                        .world
                        .set_visual_state(decoy, &VisualState::decoy());
                    session.tokens.insert(
                        decoy,
                        SpawnedToken {
                            form: decoy_kind,
                            role: TokenRole::Decoy,
                            record: entry.pending.record,
                            position: at,
                        },
                    );
                    self.collab.world.despawn(entry.true_form);
                    session.tokens.remove(&entry.true_form);
                    self.collab
                        .presenter
                        .present(player, &Cue::DecoyRestored { at });
                }
                Err(e) => {
                    warn!(
                        player = %player,
                        token = %entry.true_form,
                        error = %e,
                        "Decoy restore failed, revealed form stays"
                    );
                    result = Err(e.into());
                }
            }
        }
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use spellbreak_types::{Difficulty, EndReason};

    use super::*;
    use crate::collaborators::Collaborators;
    use crate::config::GameConfig;
    use crate::memory::{InMemoryPersistence, InMemoryWorld, RecordingPresenter, ScriptedPlayers};

    fn active_engine() -> (Engine, PlayerId, InMemoryWorld) {
        let world = InMemoryWorld::new();
        let players = ScriptedPlayers::new();
        let player = PlayerId::new();
        players.add_player(player, "lou", Position::default(), "");
        players.set_auto_trigger(player, true);

        let mut engine = Engine::new(
            &GameConfig {
                seed: Some(5),
                ..GameConfig::default()
            },
            Collaborators {
                world: Box::new(world.clone()),
                presenter: Box::new(RecordingPresenter::new()),
                persistence: Box::new(InMemoryPersistence::new()),
                players: Box::new(players),
            },
        )
        .unwrap();
        engine.start_session(player, Difficulty::Easy).unwrap();
        engine.advance(Duration::from_millis(5_500));
        assert_eq!(engine.phase_of(player), SessionPhase::Active);
        (engine, player, world)
    }

    /// Click two decoys that do not pair, with the clock set to `clock_ms`.
    fn mismatch_at(engine: &mut Engine, player: PlayerId, clock_ms: i64) -> InteractOutcome {
        let session = engine.store.get_mut(player).unwrap();
        session.time_remaining_ms = clock_ms;
        let paired: Vec<(TokenId, TokenLabel)> = session
            .tokens
            .iter()
            .filter(|(_, t)| t.is_decoy() && matches!(t.record.label, TokenLabel::Paired { .. }))
            .map(|(id, t)| (*id, t.record.label))
            .collect();
        let (a, label) = paired.first().copied().unwrap();
        let (b, _) = paired
            .iter()
            .find(|(id, other)| *id != a && !label.pairs_with(*other))
            .copied()
            .unwrap();

        let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let t1 = t0.checked_add_signed(TimeDelta::milliseconds(600)).unwrap();
        engine.on_interact(player, a, t0).unwrap();
        engine.on_interact(player, b, t1).unwrap()
    }

    #[test]
    fn fractional_clock_below_threshold_skips_restore() {
        let (mut engine, player, world) = active_engine();
        assert_eq!(
            mismatch_at(&mut engine, player, 300),
            InteractOutcome::Mismatched { respawn: false }
        );

        let advanced = engine.advance(RELEASE_DELAY);
        assert!(advanced.failures.is_empty());
        let session = engine.session(player).unwrap();
        assert_eq!(session.decoy_count(), 9);
        assert_eq!(world.live_count(), 11);

        // One tick takes the clock below zero, the next ends the game and
        // the true forms go with the session.
        let advanced = engine.advance(Duration::from_secs(2));
        assert_eq!(advanced.reports.first().unwrap().reason, EndReason::Timeout);
        assert_eq!(world.live_count(), 0);
    }

    #[test]
    fn clock_at_threshold_restores_decoys() {
        let (mut engine, player, world) = active_engine();
        assert_eq!(
            mismatch_at(&mut engine, player, RESPAWN_THRESHOLD_MS),
            InteractOutcome::Mismatched { respawn: true }
        );

        engine.advance(RELEASE_DELAY);
        let session = engine.session(player).unwrap();
        assert_eq!(session.decoy_count(), 11);
        assert!(session.pending.is_none());
        assert_eq!(world.live_count(), 11);
    }

    #[test]
    fn clock_just_below_threshold_skips_restore() {
        let (mut engine, player, _world) = active_engine();
        assert_eq!(
            mismatch_at(&mut engine, player, RESPAWN_THRESHOLD_MS.saturating_sub(1)),
            InteractOutcome::Mismatched { respawn: false }
        );
    }
}
