//! Presentation cues emitted by the engine.
//!
//! A [`Cue`] names a semantic moment ("countdown at 3", "pair matched with
//! a streak of 2") and carries the parameters a presenter needs. Which
//! title, sound, or particle renders it is the presenter's business.

use serde::{Deserialize, Serialize};

use crate::enums::{ComboPhrase, Difficulty, SpecialEffect};
use crate::structs::{Position, TokenLabel};

/// A presentation event addressed to one player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cue {
    // --- Setup ---
    /// First-ever game: show the prologue before the trigger prompt.
    Prologue,
    /// Ask the player to place the trigger object.
    StandBy {
        /// Tier that will start once the trigger is satisfied.
        difficulty: Difficulty,
    },
    /// Remaining setup budget, shown on each trigger poll.
    SetupRemaining {
        /// Whole seconds left before the setup is cancelled.
        seconds: i64,
    },
    /// Setup ran out of time; the game was cancelled.
    SetupCancelled,
    /// The trigger object was accepted.
    TriggerAccepted,

    // --- Countdown / active play ---
    /// Pre-game countdown step; `0` means "go".
    CountdownToStart {
        /// Seconds until play begins.
        remaining: u32,
    },
    /// Ambient loop played on every active tick.
    Ambient {
        /// Tier being played.
        difficulty: Difficulty,
    },
    /// Remaining-time indicator.
    Progress {
        /// Seconds left on the clock.
        remaining_secs: i64,
        /// Total seconds for the tier.
        total_secs: u32,
    },
    /// Final five seconds of the game.
    CountdownToEnd {
        /// Seconds left.
        remaining: i64,
    },

    // --- Interaction ---
    /// A decoy was clicked and is being revealed.
    Incantation {
        /// Where the decoy stood.
        at: Position,
    },
    /// A true form appeared.
    Revealed {
        /// Its label.
        label: TokenLabel,
    },
    /// First pick of a pair is waiting for its partner.
    FirstPick,
    /// A special token was revealed and its effect applied.
    SpecialRevealed {
        /// The effect.
        effect: SpecialEffect,
    },
    /// Chaos moved a token.
    Shuffled {
        /// Where it used to be.
        from: Position,
    },
    /// Two tokens formed a pair.
    Matched {
        /// Streak after this match.
        streak: u32,
        /// Phrase for the streak.
        phrase: ComboPhrase,
        /// Points awarded for this match.
        points: u32,
        /// Score after this match.
        score: u32,
    },
    /// Two tokens did not form a pair.
    Mismatched {
        /// Score (unchanged) for the scoreboard.
        score: u32,
    },
    /// A matched true form was released.
    Released {
        /// Where it was released.
        at: Position,
    },
    /// A decoy was restored after a mismatch.
    DecoyRestored {
        /// Where it was respawned.
        at: Position,
    },

    // --- Resolution ---
    /// All pairs matched.
    GameClear,
    /// Time ran out (or the game was stopped) before a clear.
    GameOver,
    /// End-of-game title.
    EndTitle {
        /// Whether the game was cleared.
        cleared: bool,
        /// Pairs matched.
        matched_pairs: u32,
    },
    /// Final score title, shown a few seconds after the end title.
    FinalScore {
        /// Final score.
        score: u32,
        /// Whether it is a new high score for the tier.
        high_score: bool,
    },
    /// Celebration for a new high score.
    HighScoreFireworks,
    /// First clear of any tier: show the epilogue.
    Epilogue,
    /// First clear of any tier: closing title after the epilogue.
    FirstClearTitle,
}
