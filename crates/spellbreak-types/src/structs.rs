//! Core value types shared between the engine and its collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{Difficulty, EndReason, PairHalf, SpecialEffect, TokenKind};
use crate::ids::{PlayerId, TokenId};

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A point in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// East-west axis.
    pub x: f64,
    /// Vertical axis.
    pub y: f64,
    /// North-south axis.
    pub z: f64,
}

impl Position {
    /// Construct a position from its three coordinates.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Return this position shifted by the given deltas.
    pub fn offset(self, dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }
}

/// A spawn slot, expressed as a horizontal offset from the player's anchor
/// position at spawn time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotOffset {
    /// East-west offset in blocks.
    pub x: i32,
    /// North-south offset in blocks (negative is in front of the player).
    pub z: i32,
}

impl SlotOffset {
    /// Construct a slot offset.
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// The pairing label a true-identity token carries.
///
/// Two tokens match when they carry opposite halves of the same kind.
/// Specials carry a unique label and never match anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenLabel {
    /// One half of a creature pair.
    Paired {
        /// The creature kind shared by both halves.
        kind: TokenKind,
        /// Which half this token is.
        half: PairHalf,
    },
    /// A special token's fixed label.
    Special {
        /// The kind of the special token.
        kind: TokenKind,
        /// The effect it triggers.
        effect: SpecialEffect,
    },
}

impl TokenLabel {
    /// Whether `other` is the counterpart of this label.
    pub fn pairs_with(self, other: Self) -> bool {
        match (self, other) {
            (
                Self::Paired { kind, half },
                Self::Paired {
                    kind: other_kind,
                    half: other_half,
                },
            ) => kind == other_kind && half.counterpart() == other_half,
            _ => false,
        }
    }
}

impl core::fmt::Display for TokenLabel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Paired {
                kind,
                half: PairHalf::First,
            } => write!(f, "First {}", kind.display_name()),
            Self::Paired {
                kind,
                half: PairHalf::Last,
            } => write!(f, "Last {}", kind.display_name()),
            Self::Special { kind, .. } => f.write_str(kind.display_name()),
        }
    }
}

/// The hidden identity behind a decoy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Kind spawned when the decoy is revealed.
    pub true_kind: TokenKind,
    /// Pairing label of the revealed form.
    pub label: TokenLabel,
}

/// Role of a registered token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenRole {
    /// Unrevealed placeholder; the only role a click can act on.
    Decoy,
    /// Revealed creature waiting for resolution or release.
    TrueIdentity {
        /// The pairing label shown on the nameplate.
        label: TokenLabel,
    },
    /// Revealed special, about to be released.
    Special {
        /// The effect that was applied on reveal.
        effect: SpecialEffect,
    },
}

/// A token currently spawned for a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnedToken {
    /// The kind the entity is currently rendered as.
    pub form: TokenKind,
    /// What the token is in the game.
    pub role: TokenRole,
    /// The hidden (or now revealed) identity.
    pub record: TokenRecord,
    /// Last known world position.
    pub position: Position,
}

impl SpawnedToken {
    /// Whether this token is still an unrevealed decoy.
    pub const fn is_decoy(&self) -> bool {
        matches!(self.role, TokenRole::Decoy)
    }
}

/// What is kept about a revealed token so the decoy can be restored on a
/// mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRecord {
    /// Handle of the decoy that was despawned on reveal.
    pub original_decoy: TokenId,
    /// Kind of that decoy.
    pub decoy_kind: TokenKind,
    /// The identity the decoy was hiding.
    pub record: TokenRecord,
}

/// Rendering flags applied to a spawned token.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VisualState {
    /// Gravity and velocity disabled.
    pub frozen: bool,
    /// Cannot be damaged.
    pub invulnerable: bool,
    /// Outline rendered through walls.
    pub glowing: bool,
    /// Ambient sounds suppressed.
    pub silent: bool,
    /// Nameplate text, if any.
    pub nameplate: Option<String>,
}

impl VisualState {
    /// Flags for an unrevealed decoy.
    pub const fn decoy() -> Self {
        Self {
            frozen: true,
            invulnerable: true,
            glowing: true,
            silent: true,
            nameplate: None,
        }
    }

    /// Flags for a revealed form showing its label.
    pub fn revealed(label: TokenLabel) -> Self {
        Self {
            frozen: true,
            invulnerable: true,
            glowing: true,
            silent: false,
            nameplate: Some(label.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Player-side state
// ---------------------------------------------------------------------------

/// Opaque description of the item a player was holding before the game
/// took over their hand. The engine never inspects it; it is handed back
/// to the player collaborator on cancel or teardown.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SavedItem(pub String);

// ---------------------------------------------------------------------------
// Persistence records
// ---------------------------------------------------------------------------

/// A persisted final score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Monotonic insertion id.
    pub id: u64,
    /// The player who scored.
    pub player_id: PlayerId,
    /// Display name at the time of the game.
    pub player_name: String,
    /// Final score.
    pub score: u32,
    /// Difficulty played.
    pub difficulty: Difficulty,
    /// When the score was written.
    pub registered_at: DateTime<Utc>,
}

/// Per-player, per-difficulty progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// The player.
    pub player_id: PlayerId,
    /// The tier.
    pub difficulty: Difficulty,
    /// At least one game on this tier reached active play.
    pub played: bool,
    /// At least one game on this tier was fully cleared.
    pub cleared: bool,
    /// When the tier was first cleared.
    pub cleared_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Final summary of a terminated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    /// The player.
    pub player_id: PlayerId,
    /// Tier played.
    pub difficulty: Difficulty,
    /// Final score including any time bonus.
    pub score: u32,
    /// Pairs matched.
    pub matched_pairs: u32,
    /// Pairs available on the tier.
    pub pair_count: u32,
    /// Why the session ended.
    pub reason: EndReason,
    /// `Some(true)` on a player's first clear of any tier, `Some(false)` on
    /// a repeat clear, `None` when the game was not cleared.
    pub first_clear: Option<bool>,
    /// The score beat the stored high score for the tier.
    pub new_high_score: bool,
}
