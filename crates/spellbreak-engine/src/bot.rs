//! Demo bot that plays one game through an [`EngineHandle`].
//!
//! The bot peeks at hidden labels and picks the right partner with a
//! configurable accuracy, so demo runs show matches, mismatches, combos
//! and the occasional special.

use std::time::Duration;

use rand::rngs::SmallRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use spellbreak_core::{EngineHandle, IgnoreReason, InteractOutcome, StartOutcome};
use spellbreak_types::{Difficulty, PlayerId, TokenId, TokenLabel};
use tracing::{debug, info};

use crate::error::EngineError;

/// Polls while waiting for the layout to appear.
const MAX_WAIT_POLLS: u32 = 120;

/// Bot behaviour knobs.
#[derive(Debug, Clone, Copy)]
pub struct BotConfig {
    /// Probability of picking the true partner for a first pick.
    pub accuracy: f64,
    /// Pause between two clicks. Keep it above the debounce window.
    pub think_time: Duration,
    /// RNG seed; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            accuracy: 0.8,
            think_time: Duration::from_millis(600),
            seed: None,
        }
    }
}

/// What the bot saw during one game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BotSummary {
    /// Accepted clicks.
    pub clicks: u32,
    /// Pairs matched.
    pub matches: u32,
    /// Mismatched pairs.
    pub mismatches: u32,
    /// Specials revealed.
    pub specials: u32,
}

/// A scripted player.
#[derive(Debug)]
pub struct Bot {
    handle: EngineHandle,
    player: PlayerId,
    config: BotConfig,
    rng: SmallRng,
}

impl Bot {
    /// Create a bot for `player`.
    pub fn new(handle: EngineHandle, player: PlayerId, config: BotConfig) -> Self {
        let rng = config.seed.map_or_else(
            || SmallRng::from_rng(&mut rand::rng()),
            SmallRng::seed_from_u64,
        );
        Self {
            handle,
            player,
            config,
            rng,
        }
    }

    /// Start a game and click until the layout is gone.
    ///
    /// Returns `None` when the tier is locked or the player is busy.
    pub async fn play(&mut self, difficulty: Difficulty) -> Result<Option<BotSummary>, EngineError> {
        match self.handle.start(self.player, difficulty).await? {
            StartOutcome::AwaitingTrigger => {}
            outcome => {
                info!(player = %self.player, difficulty = %difficulty, outcome = ?outcome, "Bot cannot start");
                return Ok(None);
            }
        }

        self.wait_for_layout().await?;
        info!(player = %self.player, difficulty = %difficulty, "Bot playing");

        let mut summary = BotSummary::default();
        loop {
            let decoys = self.handle.decoys(self.player).await?;
            let Some((first, label)) = decoys.choose(&mut self.rng).copied() else {
                break;
            };

            if !self.click(first, &mut summary).await? {
                break;
            }
            if matches!(label, TokenLabel::Special { .. }) {
                continue;
            }

            let Some(second) = self.pick_partner(first, label, &decoys) else {
                continue;
            };
            if !self.click(second, &mut summary).await? {
                break;
            }
        }

        info!(
            player = %self.player,
            clicks = summary.clicks,
            matches = summary.matches,
            mismatches = summary.mismatches,
            specials = summary.specials,
            "Bot finished"
        );
        Ok(Some(summary))
    }

    async fn wait_for_layout(&self) -> Result<(), EngineError> {
        for _ in 0..MAX_WAIT_POLLS {
            if !self.handle.decoys(self.player).await?.is_empty() {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        Err(EngineError::Bot {
            message: format!("no layout appeared for player {}", self.player),
        })
    }

    /// The true partner with probability `accuracy`, else any other paired
    /// decoy.
    fn pick_partner(
        &mut self,
        first: TokenId,
        label: TokenLabel,
        decoys: &[(TokenId, TokenLabel)],
    ) -> Option<TokenId> {
        let partner = decoys
            .iter()
            .find(|(_, other)| label.pairs_with(*other))
            .map(|(id, _)| *id);
        if self.rng.random_bool(self.config.accuracy.clamp(0.0, 1.0)) && partner.is_some() {
            return partner;
        }
        let others: Vec<TokenId> = decoys
            .iter()
            .filter(|(id, other)| *id != first && matches!(other, TokenLabel::Paired { .. }))
            .map(|(id, _)| *id)
            .collect();
        others.choose(&mut self.rng).copied().or(partner)
    }

    /// Click once, wait, and tally. Returns `false` once the game is over.
    async fn click(&mut self, token: TokenId, summary: &mut BotSummary) -> Result<bool, EngineError> {
        let outcome = self.handle.interact(self.player, token).await?;
        tokio::time::sleep(self.config.think_time).await;
        debug!(player = %self.player, token = %token, outcome = ?outcome, "Bot clicked");

        match outcome {
            InteractOutcome::Ignored(IgnoreReason::NoSession | IgnoreReason::NotActive) => {
                return Ok(false);
            }
            InteractOutcome::Ignored(_) | InteractOutcome::Debounced => {}
            InteractOutcome::FirstReveal { .. } => {
                summary.clicks = summary.clicks.saturating_add(1);
            }
            InteractOutcome::Special(_) => {
                summary.clicks = summary.clicks.saturating_add(1);
                summary.specials = summary.specials.saturating_add(1);
            }
            InteractOutcome::Matched { .. } => {
                summary.clicks = summary.clicks.saturating_add(1);
                summary.matches = summary.matches.saturating_add(1);
            }
            InteractOutcome::Mismatched { .. } => {
                summary.clicks = summary.clicks.saturating_add(1);
                summary.mismatches = summary.mismatches.saturating_add(1);
            }
        }
        Ok(true)
    }
}
