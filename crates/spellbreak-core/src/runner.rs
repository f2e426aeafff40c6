//! Async runner that owns an [`Engine`] and drives its clock from tokio
//! time.
//!
//! The engine itself never sleeps. This module puts it behind a command
//! channel: callers hold a cheap [`EngineHandle`], the runner task owns the
//! engine, and between commands it sleeps until the next timer deadline.
//! Before any command is handled the engine is caught up to the current
//! instant, so clicks always see an up-to-date clock.
//!
//! Ended sessions are pushed to the report channel returned by
//! [`spawn_engine`].

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use spellbreak_types::{Difficulty, PlayerId, SessionReport, TokenId, TokenLabel};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::GameError;
use crate::lifecycle::{Engine, StartOutcome, StopOutcome};
use crate::resolver::InteractOutcome;

/// How long the runner sleeps when no timer is pending.
const IDLE_WAKE: Duration = Duration::from_secs(60);

/// Errors returned by [`EngineHandle`] calls.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The runner task is gone.
    #[error("engine runner has shut down")]
    Closed,

    /// The runner dropped a request without answering.
    #[error("engine runner dropped the reply: {source}")]
    NoReply {
        /// The underlying channel error.
        #[from]
        source: oneshot::error::RecvError,
    },

    /// The engine rejected the request.
    #[error("game error: {source}")]
    Game {
        /// The underlying engine error.
        #[from]
        source: GameError,
    },
}

/// Requests sent to the runner task.
#[derive(Debug)]
enum Command {
    Start {
        player: PlayerId,
        difficulty: Difficulty,
        reply: oneshot::Sender<Result<StartOutcome, GameError>>,
    },
    Stop {
        player: PlayerId,
        reply: oneshot::Sender<StopOutcome>,
    },
    Interact {
        player: PlayerId,
        token: TokenId,
        reply: oneshot::Sender<Result<InteractOutcome, GameError>>,
    },
    TokenLost {
        player: PlayerId,
        token: TokenId,
        reply: oneshot::Sender<bool>,
    },
    Decoys {
        player: PlayerId,
        reply: oneshot::Sender<Vec<(TokenId, TokenLabel)>>,
    },
    Shutdown,
}

/// Cloneable handle to a running engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl EngineHandle {
    fn send(&self, command: Command) -> Result<(), RunnerError> {
        if self.tx.send(command).is_err() {
            return Err(RunnerError::Closed);
        }
        Ok(())
    }

    /// Request a game. See [`Engine::start_session`].
    pub async fn start(
        &self,
        player: PlayerId,
        difficulty: Difficulty,
    ) -> Result<StartOutcome, RunnerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Start {
            player,
            difficulty,
            reply,
        })?;
        Ok(rx.await??)
    }

    /// Ask a game to end. See [`Engine::stop_session`].
    pub async fn stop(&self, player: PlayerId) -> Result<StopOutcome, RunnerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stop { player, reply })?;
        Ok(rx.await?)
    }

    /// Click a token. The click is stamped with the runner's clock.
    pub async fn interact(
        &self,
        player: PlayerId,
        token: TokenId,
    ) -> Result<InteractOutcome, RunnerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Interact {
            player,
            token,
            reply,
        })?;
        Ok(rx.await??)
    }

    /// Report a token that disappeared from the world.
    pub async fn token_lost(&self, player: PlayerId, token: TokenId) -> Result<bool, RunnerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::TokenLost {
            player,
            token,
            reply,
        })?;
        Ok(rx.await?)
    }

    /// Unrevealed decoys of a player's session with their hidden labels.
    pub async fn decoys(&self, player: PlayerId) -> Result<Vec<(TokenId, TokenLabel)>, RunnerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Decoys { player, reply })?;
        Ok(rx.await?)
    }

    /// Stop the runner. The engine is returned through the join handle.
    pub fn shutdown(&self) -> Result<(), RunnerError> {
        self.send(Command::Shutdown)
    }
}

/// Move `engine` onto a tokio task.
///
/// Returns the handle, the receiver of session reports, and the join
/// handle that yields the engine back after shutdown.
pub fn spawn_engine(
    engine: Engine,
) -> (
    EngineHandle,
    mpsc::UnboundedReceiver<SessionReport>,
    JoinHandle<Engine>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (reports_tx, reports_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(engine, rx, reports_tx));
    (EngineHandle { tx }, reports_rx, task)
}

async fn run(
    mut engine: Engine,
    mut rx: mpsc::UnboundedReceiver<Command>,
    reports: mpsc::UnboundedSender<SessionReport>,
) -> Engine {
    let origin = Instant::now().checked_sub(engine.now()).unwrap_or_else(Instant::now);
    let wall_origin = Utc::now();
    info!("Engine runner started");

    loop {
        let wake = engine
            .next_deadline()
            .and_then(|deadline| origin.checked_add(deadline))
            .or_else(|| Instant::now().checked_add(IDLE_WAKE))
            .unwrap_or_else(Instant::now);

        let command = tokio::select! {
            command = rx.recv() => command,
            () = tokio::time::sleep_until(wake) => {
                catch_up(&mut engine, origin, &reports);
                continue;
            }
        };

        catch_up(&mut engine, origin, &reports);
        let Some(command) = command else {
            debug!("All engine handles dropped");
            break;
        };
        if !handle(&mut engine, command, wall_origin) {
            break;
        }
        // Commands can finish sessions without a timer firing.
        catch_up(&mut engine, origin, &reports);
    }

    info!(sessions = engine.store().session_count(), "Engine runner stopped");
    engine
}

/// Run every task due by now and forward what it produced.
fn catch_up(engine: &mut Engine, origin: Instant, reports: &mpsc::UnboundedSender<SessionReport>) {
    let report = engine.advance_to(origin.elapsed());
    for failure in &report.failures {
        warn!(error = %failure, "Engine task failed");
    }
    for session in report.reports {
        if reports.send(session).is_err() {
            debug!("Report receiver dropped");
        }
    }
}

/// Apply one command. Returns `false` on shutdown.
fn handle(engine: &mut Engine, command: Command, wall_origin: DateTime<Utc>) -> bool {
    match command {
        Command::Start {
            player,
            difficulty,
            reply,
        } => {
            let _ = reply.send(engine.start_session(player, difficulty));
        }
        Command::Stop { player, reply } => {
            let _ = reply.send(engine.stop_session(player));
        }
        Command::Interact {
            player,
            token,
            reply,
        } => {
            let now = TimeDelta::from_std(engine.now())
                .ok()
                .and_then(|elapsed| wall_origin.checked_add_signed(elapsed))
                .unwrap_or(wall_origin);
            let _ = reply.send(engine.on_interact(player, token, now));
        }
        Command::TokenLost {
            player,
            token,
            reply,
        } => {
            let _ = reply.send(engine.on_token_lost(player, token));
        }
        Command::Decoys { player, reply } => {
            let decoys: Vec<(TokenId, TokenLabel)> = engine
                .session(player)
                .map(|session| {
                    session
                        .tokens
                        .iter()
                        .filter(|(_, t)| t.is_decoy())
                        .map(|(id, t)| (*id, t.record.label))
                        .collect()
                })
                .unwrap_or_default();
            let _ = reply.send(decoys);
        }
        Command::Shutdown => return false,
    }
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use spellbreak_types::{EndReason, Position, SessionPhase};

    use super::*;
    use crate::collaborators::Collaborators;
    use crate::config::GameConfig;
    use crate::memory::{InMemoryPersistence, InMemoryWorld, RecordingPresenter, ScriptedPlayers};

    fn engine_with(players: &ScriptedPlayers) -> Engine {
        let config = GameConfig {
            seed: Some(11),
            ..GameConfig::default()
        };
        let collaborators = Collaborators {
            world: Box::new(InMemoryWorld::new()),
            presenter: Box::new(RecordingPresenter::new()),
            persistence: Box::new(InMemoryPersistence::new()),
            players: Box::new(players.clone()),
        };
        Engine::new(&config, collaborators).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn game_runs_to_timeout_on_tokio_time() {
        let players = ScriptedPlayers::new();
        let player = PlayerId::new();
        players.add_player(player, "ivy", Position::default(), "sword");
        players.set_auto_trigger(player, true);

        let (handle, mut reports, task) = spawn_engine(engine_with(&players));
        let outcome = handle.start(player, Difficulty::Easy).await.unwrap();
        assert_eq!(outcome, StartOutcome::AwaitingTrigger);

        // First poll at 0.5s, countdown of five, then thirty seconds of play.
        let report = reports.recv().await.unwrap();
        assert_eq!(report.player_id, player);
        assert_eq!(report.reason, EndReason::Timeout);
        assert_eq!(report.score, 0);

        handle.shutdown().unwrap();
        let engine = task.await.unwrap();
        assert_eq!(engine.phase_of(player), SessionPhase::Idle);
        assert_eq!(players.held_item(player).unwrap().0, "sword");
    }

    #[tokio::test(start_paused = true)]
    async fn clicks_go_through_the_runner() {
        let players = ScriptedPlayers::new();
        let player = PlayerId::new();
        players.add_player(player, "jun", Position::default(), "");
        players.set_auto_trigger(player, true);

        let (handle, _reports, _task) = spawn_engine(engine_with(&players));
        handle.start(player, Difficulty::Easy).await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;

        let decoys = handle.decoys(player).await.unwrap();
        assert_eq!(decoys.len(), 11);
        let (token, _) = decoys.first().copied().unwrap();
        let outcome = handle.interact(player, token).await.unwrap();
        assert!(!matches!(outcome, InteractOutcome::Ignored(_)));

        // Same instant: debounced.
        let (other, _) = decoys.get(1).copied().unwrap();
        let again = handle.interact(player, other).await.unwrap();
        assert_eq!(again, InteractOutcome::Debounced);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_game_with_forced_stop() {
        let players = ScriptedPlayers::new();
        let player = PlayerId::new();
        players.add_player(player, "kit", Position::default(), "");
        players.set_auto_trigger(player, true);

        let (handle, mut reports, _task) = spawn_engine(engine_with(&players));
        handle.start(player, Difficulty::Easy).await.unwrap();
        tokio::time::sleep(Duration::from_secs(8)).await;

        assert_eq!(handle.stop(player).await.unwrap(), StopOutcome::Stopping);
        let report = reports.recv().await.unwrap();
        assert_eq!(report.reason, EndReason::ForcedStop);
        assert_eq!(
            handle.stop(player).await.unwrap(),
            StopOutcome::NotPlaying
        );
    }

    #[tokio::test]
    async fn dropped_runner_reports_closed() {
        let players = ScriptedPlayers::new();
        let (handle, _reports, task) = spawn_engine(engine_with(&players));
        handle.shutdown().unwrap();
        task.await.unwrap();
        assert!(matches!(
            handle.stop(PlayerId::new()).await,
            Err(RunnerError::Closed)
        ));
    }
}
