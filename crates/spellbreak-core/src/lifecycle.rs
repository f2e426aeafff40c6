//! The session engine and its lifecycle state machine.
//!
//! [`Engine`] is a plain synchronous state machine. Inbound operations
//! ([`Engine::start_session`], [`Engine::stop_session`] and the click
//! handlers in [`crate::resolver`]) mutate it directly; time enters only
//! through [`Engine::advance`], which runs due timer tasks in order.
//!
//! Per player the phases are:
//!
//! ```text
//! Idle -> AwaitingTrigger -> Countdown -> Active -> Resolving -> Terminated
//!              |                                                    ^
//!              +---------------- (setup budget spent) -> Idle       |
//!                                       (fault) --------------------+
//! ```

use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use spellbreak_types::{Cue, Difficulty, EndReason, PlayerId, SessionPhase, SessionReport};
use tracing::{debug, error, info, warn};

use crate::collaborators::Collaborators;
use crate::combo;
use crate::config::{DifficultyTable, GameConfig};
use crate::error::GameError;
use crate::scheduler::{Scheduler, Task, TimerQueue};
use crate::session::{PendingSetup, Session};
use crate::spawn;
use crate::store::SessionStore;

/// Period of the start-trigger poll.
pub const SETUP_POLL_PERIOD: Duration = Duration::from_millis(500);

/// Period of the countdown and of the active tick.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// How long the accepted trigger object stays in the world.
pub const TRIGGER_CLEAR_DELAY: Duration = Duration::from_secs(2);

/// Delay between the end title and the final-score title.
pub const FINAL_SCORE_DELAY: Duration = Duration::from_secs(3);

/// Delay between the end title and the first-clear epilogue.
pub const EPILOGUE_DELAY: Duration = Duration::from_secs(8);

/// Delay between the end title and the first-clear closing title.
pub const FIRST_CLEAR_TITLE_DELAY: Duration = Duration::from_secs(28);

const SETUP_POLL_MS: i64 = 500;
const TICK_MS: i64 = 1_000;
const END_COUNTDOWN_MS: i64 = 5_000;

/// Result of a start request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The trigger was placed; the game starts once it is satisfied.
    AwaitingTrigger,
    /// The player is already in setup or in a game.
    AlreadyBusy,
    /// The tier is locked.
    PrerequisiteMissing {
        /// Tier that must be played first.
        required: Difficulty,
    },
}

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The game will end on its next tick or poll.
    Stopping,
    /// The player had nothing running.
    NotPlaying,
}

/// What happened during one call to [`Engine::advance`].
#[derive(Debug, Default)]
pub struct AdvanceReport {
    /// Number of timer tasks run.
    pub executed: usize,
    /// Sessions that ended.
    pub reports: Vec<SessionReport>,
    /// Failures from timer tasks and non-fatal collaborator errors.
    pub failures: Vec<GameError>,
}

/// The per-player game session engine.
#[derive(Debug)]
pub struct Engine {
    pub(crate) settings: GameConfig,
    pub(crate) table: DifficultyTable,
    pub(crate) store: SessionStore,
    pub(crate) timers: TimerQueue,
    pub(crate) collab: Collaborators,
    pub(crate) rng: SmallRng,
    pub(crate) finished: Vec<SessionReport>,
    pub(crate) soft_failures: Vec<GameError>,
}

impl Engine {
    /// Build an engine from a configuration and a collaborator bundle.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Config`] if the difficulty table is invalid.
    pub fn new(config: &GameConfig, collaborators: Collaborators) -> Result<Self, GameError> {
        let table = config.difficulty_table()?;
        let rng = config.seed.map_or_else(
            || SmallRng::from_rng(&mut rand::rng()),
            SmallRng::seed_from_u64,
        );
        info!(
            tiers = table.iter().count(),
            seeded = config.seed.is_some(),
            "Session engine ready"
        );
        Ok(Self {
            settings: config.clone(),
            table,
            store: SessionStore::new(),
            timers: TimerQueue::new(),
            collab: collaborators,
            rng,
            finished: Vec::new(),
            soft_failures: Vec::new(),
        })
    }

    /// The validated difficulty table.
    pub const fn table(&self) -> &DifficultyTable {
        &self.table
    }

    /// The session store.
    pub const fn store(&self) -> &SessionStore {
        &self.store
    }

    /// A player's running session.
    pub fn session(&self, player: PlayerId) -> Option<&Session> {
        self.store.get(player)
    }

    /// A player's lifecycle phase.
    pub fn phase_of(&self, player: PlayerId) -> SessionPhase {
        self.store.phase_of(player)
    }

    /// Current virtual time.
    pub const fn now(&self) -> Duration {
        self.timers.now()
    }

    /// Virtual time of the next timer, if any.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Request a game for `player` on `difficulty`.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::UnknownDifficulty`] for an unconfigured tier and
    /// [`GameError::Collaborator`] if the player or persistence collaborator
    /// fails. The player's held item is returned before a failure surfaces.
    pub fn start_session(
        &mut self,
        player: PlayerId,
        difficulty: Difficulty,
    ) -> Result<StartOutcome, GameError> {
        let config = Arc::clone(
            self.table
                .get(difficulty)
                .ok_or(GameError::UnknownDifficulty(difficulty))?,
        );

        if self.store.is_busy(player) {
            debug!(player = %player, "Start ignored, player already busy");
            return Ok(StartOutcome::AlreadyBusy);
        }

        if let Some(required) = config.prerequisite {
            let unlocked = self.collab.persistence.has_played(player, required)?;
            if !unlocked {
                info!(
                    player = %player,
                    difficulty = %difficulty,
                    required = %required,
                    "Start refused, tier locked"
                );
                return Ok(StartOutcome::PrerequisiteMissing { required });
            }
        }

        let first_play = !self.collab.persistence.has_played_any_difficulty(player)?;
        let saved_item = self.collab.players.stash_held_item(player)?;
        if let Err(e) = self.collab.players.place_trigger(player) {
            self.collab.players.restore_held_item(player, saved_item);
            return Err(e.into());
        }

        if first_play {
            self.collab.presenter.present(player, &Cue::Prologue);
        }
        self.collab
            .presenter
            .present(player, &Cue::StandBy { difficulty });

        let reading_secs = if first_play {
            self.settings.first_play_reading_secs
        } else {
            0
        };
        let budget_ms = i64::from(self.settings.setup_budget_secs.saturating_add(reading_secs))
            .saturating_mul(1000);
        let poll = self
            .timers
            .every(SETUP_POLL_PERIOD, Task::PollTrigger { player });
        self.store.insert_setup(
            player,
            PendingSetup {
                difficulty: config,
                saved_item,
                budget_ms,
                poll: Some(poll),
            },
        );

        info!(
            player = %player,
            difficulty = %difficulty,
            budget_ms,
            first_play,
            "Awaiting start trigger"
        );
        Ok(StartOutcome::AwaitingTrigger)
    }

    /// Ask a player's game to end.
    ///
    /// Cooperative: during play the clock is zeroed and the next tick ends
    /// the game whatever the clock shows by then; during setup the budget is zeroed and the next poll
    /// cancels it.
    pub fn stop_session(&mut self, player: PlayerId) -> StopOutcome {
        if let Some(setup) = self.store.setup_mut(player) {
            setup.budget_ms = 0;
            info!(player = %player, "Stop requested during setup");
            return StopOutcome::Stopping;
        }
        if let Some(session) = self.store.get_mut(player) {
            session.time_remaining_ms = 0;
            session.stop_requested = true;
            info!(player = %player, phase = ?session.phase, "Stop requested");
            return StopOutcome::Stopping;
        }
        StopOutcome::NotPlaying
    }

    // -----------------------------------------------------------------------
    // Time
    // -----------------------------------------------------------------------

    /// Advance virtual time by `elapsed`, running every task that falls due.
    pub fn advance(&mut self, elapsed: Duration) -> AdvanceReport {
        let until = self.timers.now().saturating_add(elapsed);
        self.advance_to(until)
    }

    /// Advance virtual time to `until`, running every task that falls due.
    pub fn advance_to(&mut self, until: Duration) -> AdvanceReport {
        let mut executed: usize = 0;
        let mut failures = Vec::new();

        while let Some((_, task)) = self.timers.pop_due(until) {
            executed = executed.saturating_add(1);
            if let Err(e) = self.run_task(task) {
                warn!(error = %e, "Timer task failed");
                failures.push(e);
            }
        }
        self.timers.advance_to(until);

        failures.append(&mut self.soft_failures);
        AdvanceReport {
            executed,
            reports: std::mem::take(&mut self.finished),
            failures,
        }
    }

    fn run_task(&mut self, task: Task) -> Result<(), GameError> {
        match task {
            Task::PollTrigger { player } => self.poll_trigger(player),
            Task::CountdownTick { player } => self.countdown_tick(player),
            Task::ActiveTick { player } => self.active_tick(player),
            Task::ClearTrigger { player } => {
                self.collab.players.clear_trigger(player);
                Ok(())
            }
            Task::ReleaseSpecial { player, token } => {
                self.release_special(player, token);
                Ok(())
            }
            Task::ReleasePair { player, tokens } => {
                self.release_pair(player, tokens);
                Ok(())
            }
            Task::RestoreDecoys { player, entries } => self.restore_decoys(player, entries),
            Task::Present { player, cue } => {
                self.collab.presenter.present(player, &cue);
                Ok(())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Setup
    // -----------------------------------------------------------------------

    fn poll_trigger(&mut self, player: PlayerId) -> Result<(), GameError> {
        if self.store.setup_mut(player).is_none() {
            return Ok(());
        }
        if self.collab.players.trigger_satisfied(player) {
            return self.confirm_trigger(player);
        }

        let Some(setup) = self.store.setup_mut(player) else {
            return Ok(());
        };
        if setup.budget_ms <= 0 {
            self.cancel_setup(player);
            return Ok(());
        }

        let seconds = setup.budget_ms.saturating_add(999).div_euclid(1000);
        setup.budget_ms = setup.budget_ms.saturating_sub(SETUP_POLL_MS);
        self.collab
            .presenter
            .present(player, &Cue::SetupRemaining { seconds });
        Ok(())
    }

    fn cancel_setup(&mut self, player: PlayerId) {
        let Some(setup) = self.store.remove_setup(player) else {
            return;
        };
        if let Some(poll) = setup.poll {
            self.timers.cancel(poll);
        }
        self.collab.players.clear_trigger(player);
        self.collab
            .players
            .restore_held_item(player, setup.saved_item);
        self.collab.presenter.present(player, &Cue::SetupCancelled);
        info!(player = %player, "Setup cancelled");
    }

    fn confirm_trigger(&mut self, player: PlayerId) -> Result<(), GameError> {
        let player_name = match self.collab.players.display_name(player) {
            Ok(name) => name,
            Err(e) => {
                self.cancel_setup(player);
                return Err(e.into());
            }
        };
        let Some(setup) = self.store.remove_setup(player) else {
            return Ok(());
        };
        if let Some(poll) = setup.poll {
            self.timers.cancel(poll);
        }

        self.collab.presenter.present(player, &Cue::TriggerAccepted);
        self.timers
            .after(TRIGGER_CLEAR_DELAY, Task::ClearTrigger { player });

        let difficulty = setup.difficulty.difficulty;
        if let Err(e) = self.collab.persistence.record_progress(player, difficulty) {
            self.soft_failure(e.into());
        }
        self.collab.players.prepare_for_play(player);

        let countdown = self.settings.countdown_secs;
        let mut session = Session::new(
            player,
            player_name,
            setup.difficulty,
            setup.saved_item,
            countdown,
        );
        self.collab
            .presenter
            .present(player, &Cue::CountdownToStart { remaining: countdown });
        if countdown > 0 {
            session.timers.countdown = Some(
                self.timers
                    .every(TICK_PERIOD, Task::CountdownTick { player }),
            );
        }
        self.store.insert(session);

        info!(
            player = %player,
            difficulty = %difficulty,
            countdown,
            "Trigger accepted, counting down"
        );

        if countdown == 0 {
            return self.begin_active(player);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Countdown and play
    // -----------------------------------------------------------------------

    fn countdown_tick(&mut self, player: PlayerId) -> Result<(), GameError> {
        let Some(session) = self.store.get_mut(player) else {
            return Ok(());
        };
        if session.phase != SessionPhase::Countdown {
            return Ok(());
        }

        session.countdown_remaining = session.countdown_remaining.saturating_sub(1);
        let remaining = session.countdown_remaining;
        self.collab
            .presenter
            .present(player, &Cue::CountdownToStart { remaining });

        if remaining == 0 {
            if let Some(token) = session.timers.countdown.take() {
                self.timers.cancel(token);
            }
            return self.begin_active(player);
        }
        Ok(())
    }

    fn begin_active(&mut self, player: PlayerId) -> Result<(), GameError> {
        let Some(session) = self.store.get_mut(player) else {
            return Ok(());
        };
        session.phase = SessionPhase::Active;
        session.timers.ticker = Some(
            self.timers
                .every(TICK_PERIOD, Task::ActiveTick { player }),
        );
        info!(
            player = %player,
            difficulty = %session.tier(),
            time_remaining_ms = session.time_remaining_ms,
            "Game started"
        );
        // The first tick runs on "go".
        self.active_tick(player)
    }

    fn active_tick(&mut self, player: PlayerId) -> Result<(), GameError> {
        let Some(session) = self.store.get(player) else {
            return Ok(());
        };
        if session.phase != SessionPhase::Active {
            return Ok(());
        }

        let matched = session.matched_pairs;
        let pair_count = session.difficulty.pair_count;
        let stop_requested = session.stop_requested;
        let first_tick =
            session.clock_untouched() && !session.has_spawned_tokens && !stop_requested;
        let time_remaining_ms = session.time_remaining_ms;

        if matched > pair_count {
            return Err(self.fault(
                player,
                format!("matched {matched} pairs of {pair_count}"),
            ));
        }
        if matched == pair_count {
            self.resolve_clear(player);
            return Ok(());
        }

        if first_tick {
            self.spawn_initial(player)?;
        } else if stop_requested || time_remaining_ms <= 0 {
            // A stop holds even if a special put time back on the clock.
            let reason = if stop_requested {
                EndReason::ForcedStop
            } else {
                EndReason::Timeout
            };
            self.resolve_timeout(player, reason);
            return Ok(());
        } else if time_remaining_ms <= END_COUNTDOWN_MS {
            self.collab.presenter.present(
                player,
                &Cue::CountdownToEnd {
                    remaining: time_remaining_ms.div_euclid(1000),
                },
            );
        }

        let Some(session) = self.store.get_mut(player) else {
            return Ok(());
        };
        let difficulty = session.tier();
        self.collab
            .presenter
            .present(player, &Cue::Ambient { difficulty });
        self.collab.presenter.present(
            player,
            &Cue::Progress {
                remaining_secs: session.time_remaining_secs(),
                total_secs: session.difficulty.total_time_secs,
            },
        );
        session.time_remaining_ms = session.time_remaining_ms.saturating_sub(TICK_MS);
        Ok(())
    }

    fn spawn_initial(&mut self, player: PlayerId) -> Result<(), GameError> {
        let anchor = match self.collab.players.position(player) {
            Ok(position) => position,
            Err(e) => {
                let err = GameError::from(e);
                error!(player = %player, error = %err, "Cannot lay out tokens");
                self.teardown(player, EndReason::Fault);
                return Err(err);
            }
        };

        let Some(session) = self.store.get_mut(player) else {
            return Ok(());
        };
        let plan = spawn::plan_layout(&session.difficulty, &mut self.rng);
        let spawned = spawn::spawn_layout(self.collab.world.as_mut(), anchor, &plan);
        session.tokens.extend(spawned);
        session.has_spawned_tokens = true;

        info!(
            player = %player,
            planned = plan.len(),
            spawned = session.tokens.len(),
            "Tokens spawned"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    fn resolve_clear(&mut self, player: PlayerId) {
        // Must be read before the clear is recorded.
        let first_clear = self
            .collab
            .persistence
            .has_cleared_any_difficulty(player)
            .map(|cleared| !cleared)
            .unwrap_or_else(|e| {
                self.soft_failure(e.into());
                false
            });

        let Some(session) = self.store.get_mut(player) else {
            return;
        };
        session.phase = SessionPhase::Resolving;
        let bonus = combo::time_bonus(session.time_remaining_ms, &session.difficulty);
        session.score = session.score.saturating_add(bonus);
        session.time_remaining_ms = 0;
        session.first_clear = Some(first_clear);
        let difficulty = session.tier();

        info!(
            player = %player,
            difficulty = %difficulty,
            bonus,
            score = session.score,
            first_clear,
            "Full clear"
        );

        if let Err(e) = self.collab.persistence.record_clear(player, difficulty) {
            self.soft_failure(e.into());
        }
        self.collab.presenter.present(player, &Cue::GameClear);
        self.teardown(player, EndReason::FullClear);
    }

    fn resolve_timeout(&mut self, player: PlayerId, reason: EndReason) {
        if let Some(session) = self.store.get_mut(player) {
            session.phase = SessionPhase::Resolving;
            info!(
                player = %player,
                matched_pairs = session.matched_pairs,
                reason = ?reason,
                "Time is up"
            );
        }
        self.teardown(player, reason);
    }

    /// Tear a session down after an invariant violation.
    pub(crate) fn fault(&mut self, player: PlayerId, reason: String) -> GameError {
        error!(player = %player, reason = %reason, "Session fault");
        self.teardown(player, EndReason::Fault);
        GameError::SessionFault { player, reason }
    }

    /// Cancel timers, despawn tokens, restore the player, report, and remove
    /// the session.
    fn teardown(&mut self, player: PlayerId, reason: EndReason) -> Option<SessionReport> {
        let mut session = self.store.remove(player)?;
        session.phase = SessionPhase::Terminated;
        for token in session.timers.drain() {
            self.timers.cancel(token);
        }

        let difficulty = session.tier();
        let score = session.score;
        let cleared = session.first_clear.is_some();
        let new_high_score = self
            .collab
            .persistence
            .high_score(difficulty)
            .map(|high| score > high)
            .unwrap_or_else(|e| {
                self.soft_failure(e.into());
                false
            });

        if !cleared {
            self.collab.presenter.present(player, &Cue::GameOver);
        }
        self.collab.presenter.present(
            player,
            &Cue::EndTitle {
                cleared,
                matched_pairs: session.matched_pairs,
            },
        );
        self.timers.after(
            FINAL_SCORE_DELAY,
            Task::Present {
                player,
                cue: Cue::FinalScore {
                    score,
                    high_score: new_high_score,
                },
            },
        );
        if new_high_score {
            self.timers.after(
                FINAL_SCORE_DELAY,
                Task::Present {
                    player,
                    cue: Cue::HighScoreFireworks,
                },
            );
        }

        if let Err(e) =
            self.collab
                .persistence
                .record_score(player, &session.player_name, score, difficulty)
        {
            self.soft_failure(e.into());
        }

        if session.first_clear == Some(true) {
            self.timers.after(
                EPILOGUE_DELAY,
                Task::Present {
                    player,
                    cue: Cue::Epilogue,
                },
            );
            self.timers.after(
                FIRST_CLEAR_TITLE_DELAY,
                Task::Present {
                    player,
                    cue: Cue::FirstClearTitle,
                },
            );
        }

        for token in session.tokens.keys() {
            self.collab.world.despawn(*token);
        }
        self.collab
            .players
            .restore_held_item(player, std::mem::take(&mut session.saved_item));

        let report = SessionReport {
            player_id: player,
            difficulty,
            score,
            matched_pairs: session.matched_pairs,
            pair_count: session.difficulty.pair_count,
            reason,
            first_clear: session.first_clear,
            new_high_score,
        };
        info!(
            player = %player,
            difficulty = %difficulty,
            score,
            matched_pairs = report.matched_pairs,
            reason = ?reason,
            new_high_score,
            "Session ended"
        );
        self.finished.push(report.clone());
        Some(report)
    }

    pub(crate) fn soft_failure(&mut self, err: GameError) {
        warn!(error = %err, "Collaborator call failed, continuing");
        self.soft_failures.push(err);
    }
}
