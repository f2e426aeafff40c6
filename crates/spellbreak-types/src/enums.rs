//! Enumeration types for the Spellbreak session engine.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Difficulty
// ---------------------------------------------------------------------------

/// A difficulty tier. Each tier maps to exactly one `DifficultyConfig`
/// record in the loaded configuration table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    /// Five pairs, flat scoring.
    Easy,
    /// Ten pairs, combo multipliers up to 3x.
    Normal,
    /// Twenty pairs, combo multipliers up to 5x.
    Hard,
}

impl Difficulty {
    /// All tiers in ascending order.
    pub const ALL: [Self; 3] = [Self::Easy, Self::Normal, Self::Hard];

    /// The lowercase key used in configuration files and persisted records.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Normal => "normal",
            Self::Hard => "hard",
        }
    }

    /// Parse a configuration / command key. Returns `None` for unknown keys.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == key)
    }
}

impl core::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Token kinds
// ---------------------------------------------------------------------------

/// The kind of entity a token is rendered as.
///
/// Kinds fall into three families: decoy forms (what the player sees before
/// clicking), paired creatures (each spawned exactly twice per game), and
/// special creatures that trigger an effect when revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    // --- Decoy forms ---
    /// Decoy form used on every tier.
    Zombie,
    /// Decoy form added from the normal tier upward.
    WitherSkeleton,
    /// Decoy form added on the hard tier.
    Creaking,

    // --- Paired creatures ---
    /// Paired creature.
    Rabbit,
    /// Paired creature.
    Cow,
    /// Paired creature.
    Pig,
    /// Paired creature.
    Chicken,
    /// Paired creature.
    Sheep,
    /// Paired creature.
    Fox,
    /// Paired creature.
    Cat,
    /// Paired creature.
    Turtle,
    /// Paired creature.
    Frog,
    /// Paired creature.
    Donkey,
    /// Paired creature.
    Camel,
    /// Paired creature.
    Ocelot,
    /// Paired creature.
    Horse,
    /// Paired creature.
    Mule,
    /// Paired creature.
    Armadillo,
    /// Paired creature.
    PolarBear,
    /// Paired creature.
    Panda,
    /// Paired creature.
    Goat,
    /// Paired creature.
    Wolf,
    /// Paired creature.
    Llama,

    // --- Specials ---
    /// Special: adds time when revealed.
    Allay,
    /// Special: removes time when revealed.
    Shulker,
    /// Special: shuffles every other token's position when revealed.
    Enderman,
}

impl TokenKind {
    /// Paired creatures in the order the built-in tiers draw them.
    pub const PAIRED: [Self; 20] = [
        Self::Rabbit,
        Self::Cow,
        Self::Pig,
        Self::Chicken,
        Self::Sheep,
        Self::Fox,
        Self::Cat,
        Self::Turtle,
        Self::Frog,
        Self::Donkey,
        Self::Camel,
        Self::Ocelot,
        Self::Horse,
        Self::Mule,
        Self::Armadillo,
        Self::PolarBear,
        Self::Panda,
        Self::Goat,
        Self::Wolf,
        Self::Llama,
    ];

    /// The effect this kind triggers when revealed, if it is a special.
    pub const fn special_effect(self) -> Option<SpecialEffect> {
        match self {
            Self::Allay => Some(SpecialEffect::TimeBonus),
            Self::Shulker => Some(SpecialEffect::TimePenalty),
            Self::Enderman => Some(SpecialEffect::Chaos),
            _ => None,
        }
    }

    /// Whether this kind is a special token.
    pub const fn is_special(self) -> bool {
        self.special_effect().is_some()
    }

    /// Human-readable name shown on nameplates.
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Zombie => "Zombie",
            Self::WitherSkeleton => "Wither Skeleton",
            Self::Creaking => "Creaking",
            Self::Rabbit => "Rabbit",
            Self::Cow => "Cow",
            Self::Pig => "Pig",
            Self::Chicken => "Chicken",
            Self::Sheep => "Sheep",
            Self::Fox => "Fox",
            Self::Cat => "Cat",
            Self::Turtle => "Turtle",
            Self::Frog => "Frog",
            Self::Donkey => "Donkey",
            Self::Camel => "Camel",
            Self::Ocelot => "Ocelot",
            Self::Horse => "Horse",
            Self::Mule => "Mule",
            Self::Armadillo => "Armadillo",
            Self::PolarBear => "Polar Bear",
            Self::Panda => "Panda",
            Self::Goat => "Goat",
            Self::Wolf => "Wolf",
            Self::Llama => "Llama",
            Self::Allay => "Allay",
            Self::Shulker => "Shulker",
            Self::Enderman => "Enderman",
        }
    }
}

/// Effect applied immediately when a special token is revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialEffect {
    /// Adds five seconds to the remaining time.
    TimeBonus,
    /// Removes five seconds from the remaining time (floored at zero).
    TimePenalty,
    /// Permutes the positions of every other spawned token.
    Chaos,
}

/// Which half of a pair a true-identity token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PairHalf {
    /// First occurrence of the kind in spawn order.
    First,
    /// Second occurrence of the kind in spawn order.
    Last,
}

impl PairHalf {
    /// The half a matching token must carry.
    pub const fn counterpart(self) -> Self {
        match self {
            Self::First => Self::Last,
            Self::Last => Self::First,
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle phase of a player's game.
///
/// `Idle` and `Terminated` are never stored: a player with no entry in the
/// session store is idle, and a terminated session has already been removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPhase {
    /// No game requested.
    Idle,
    /// Waiting for the player to satisfy the start trigger.
    AwaitingTrigger,
    /// Fixed pre-game countdown.
    Countdown,
    /// Tokens spawned, clock running.
    Active,
    /// End condition observed; scoring and teardown in progress.
    Resolving,
    /// Session removed; absorbing.
    Terminated,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndReason {
    /// Every pair was matched.
    FullClear,
    /// The clock ran out.
    Timeout,
    /// The player issued a stop command; observed as a timeout on the next
    /// tick.
    ForcedStop,
    /// An invariant was found broken; the session was torn down directly.
    Fault,
}

impl EndReason {
    /// Whether this ending counts as a clear.
    pub const fn is_clear(self) -> bool {
        matches!(self, Self::FullClear)
    }
}

/// Ordinal phrase shown for a combo streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComboPhrase {
    /// Streak of one.
    Reunion,
    /// Streak of two.
    Great,
    /// Streak of three.
    Unbelievable,
    /// Streak of four.
    Awesome,
    /// Streak of five or more.
    Clairvoyance,
}

impl ComboPhrase {
    /// Presentation text for the phrase.
    pub const fn text(self) -> &'static str {
        match self {
            Self::Reunion => "reunion!",
            Self::Great => "great matching!",
            Self::Unbelievable => "unbelievable!",
            Self::Awesome => "awesome!",
            Self::Clairvoyance => "clairvoyance?!",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_keys_roundtrip() {
        for d in Difficulty::ALL {
            assert_eq!(Difficulty::from_key(d.as_str()), Some(d));
        }
        assert_eq!(Difficulty::from_key("nightmare"), None);
    }

    #[test]
    fn only_three_specials() {
        let specials: Vec<TokenKind> = [
            TokenKind::Zombie,
            TokenKind::Rabbit,
            TokenKind::Allay,
            TokenKind::Shulker,
            TokenKind::Enderman,
        ]
        .into_iter()
        .filter(|k| k.is_special())
        .collect();
        assert_eq!(specials.len(), 3);
        assert!(TokenKind::PAIRED.iter().all(|k| !k.is_special()));
    }

    #[test]
    fn counterpart_flips() {
        assert_eq!(PairHalf::First.counterpart(), PairHalf::Last);
        assert_eq!(PairHalf::Last.counterpart(), PairHalf::First);
    }

    #[test]
    fn kinds_serialize_snake_case() {
        let json = serde_json::to_string(&TokenKind::PolarBear).ok();
        assert_eq!(json.as_deref(), Some("\"polar_bear\""));
    }
}
