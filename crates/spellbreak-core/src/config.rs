//! Configuration loading and the per-difficulty parameter table.
//!
//! The canonical configuration lives in `spellbreak-config.yaml`. Every
//! field has a default, so a missing file (or a file that only sets a few
//! knobs) yields the built-in three-tier table. The table is validated once
//! at load time and shared immutably afterwards.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use spellbreak_types::{Difficulty, SlotOffset, TokenKind};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A difficulty record breaks one of the table invariants.
    #[error("invalid {difficulty} difficulty: {reason}")]
    InvalidDifficulty {
        /// The offending tier.
        difficulty: Difficulty,
        /// What is wrong with it.
        reason: String,
    },

    /// The same tier is configured twice.
    #[error("difficulty {0} is configured more than once")]
    DuplicateDifficulty(Difficulty),

    /// A tier names a prerequisite that is not configured.
    #[error("difficulty {difficulty} requires {prerequisite}, which is not configured")]
    MissingPrerequisite {
        /// The tier with the dangling prerequisite.
        difficulty: Difficulty,
        /// The prerequisite that is missing.
        prerequisite: Difficulty,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level game configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GameConfig {
    /// Fixed RNG seed for reproducible layouts. `None` seeds from the OS.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Minimum milliseconds between two accepted clicks of one player.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Seconds the player has to satisfy the start trigger.
    #[serde(default = "default_setup_budget_secs")]
    pub setup_budget_secs: u32,

    /// Extra setup seconds granted on a player's first-ever game.
    #[serde(default = "default_first_play_reading_secs")]
    pub first_play_reading_secs: u32,

    /// Length of the pre-game countdown in seconds.
    #[serde(default = "default_countdown_secs")]
    pub countdown_secs: u32,

    /// One record per difficulty tier.
    #[serde(default = "default_difficulties")]
    pub difficulties: Vec<DifficultyConfig>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            seed: None,
            debounce_ms: default_debounce_ms(),
            setup_budget_secs: default_setup_budget_secs(),
            first_play_reading_secs: default_first_play_reading_secs(),
            countdown_secs: default_countdown_secs(),
            difficulties: default_difficulties(),
        }
    }
}

impl GameConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// Validate every difficulty record and freeze them into a lookup table.
    ///
    /// # Errors
    ///
    /// Returns the first invariant violation found.
    pub fn difficulty_table(&self) -> Result<DifficultyTable, ConfigError> {
        DifficultyTable::from_configs(self.difficulties.iter().cloned())
    }
}

/// Immutable parameters of one difficulty tier.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DifficultyConfig {
    /// The tier this record describes.
    pub difficulty: Difficulty,
    /// Display label.
    pub label: String,
    /// Number of creature pairs to find.
    pub pair_count: u32,
    /// Base points per matched pair.
    pub point_value: u32,
    /// Points per remaining second awarded on a full clear.
    pub time_bonus_factor: f64,
    /// Kinds a decoy may be drawn from.
    pub decoy_pool: Vec<TokenKind>,
    /// Every true identity spawned in a game: each paired kind twice, plus
    /// specials.
    pub true_identity_pool: Vec<TokenKind>,
    /// Candidate spawn positions relative to the player.
    pub spawn_slots: Vec<SlotOffset>,
    /// Length of active play in seconds.
    pub total_time_secs: u32,
    /// Combo multiplier by streak (index 0 is a streak of one). Streaks
    /// beyond the table use the last entry.
    pub combo_multipliers: Vec<f64>,
    /// Tier the player must have played before this one unlocks.
    #[serde(default)]
    pub prerequisite: Option<Difficulty>,
    /// Pick a fresh random subset of `spawn_slots` for each game instead of
    /// filling them in order.
    #[serde(default)]
    pub scatter_slots: bool,
}

impl DifficultyConfig {
    /// Number of special tokens in the true-identity pool.
    pub fn special_count(&self) -> usize {
        self.true_identity_pool
            .iter()
            .filter(|kind| kind.is_special())
            .count()
    }

    /// Total active-play time in milliseconds.
    pub fn total_time_ms(&self) -> i64 {
        i64::from(self.total_time_secs).saturating_mul(1000)
    }

    /// Check the record's internal invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDifficulty`] describing the first
    /// violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidDifficulty {
            difficulty: self.difficulty,
            reason,
        };

        if self.pair_count == 0 {
            return Err(invalid("pair_count must be at least 1".to_owned()));
        }
        if self.total_time_secs == 0 {
            return Err(invalid("total_time_secs must be at least 1".to_owned()));
        }
        if self.decoy_pool.is_empty() {
            return Err(invalid("decoy_pool must not be empty".to_owned()));
        }
        if !(self.time_bonus_factor.is_finite() && self.time_bonus_factor >= 0.0) {
            return Err(invalid(format!(
                "time_bonus_factor must be a non-negative number, got {}",
                self.time_bonus_factor
            )));
        }

        let mut kind_counts: BTreeMap<TokenKind, usize> = BTreeMap::new();
        for kind in self.true_identity_pool.iter().filter(|k| !k.is_special()) {
            let count = kind_counts.entry(*kind).or_insert(0);
            *count = count.saturating_add(1);
        }
        if let Some((kind, count)) = kind_counts.iter().find(|(_, count)| **count != 2) {
            return Err(invalid(format!(
                "{kind:?} appears {count} times in true_identity_pool; paired kinds appear exactly twice"
            )));
        }
        let pairs = usize::try_from(self.pair_count).unwrap_or(usize::MAX);
        if kind_counts.len() != pairs {
            return Err(invalid(format!(
                "true_identity_pool holds {} pairs but pair_count is {pairs}",
                kind_counts.len()
            )));
        }

        let expected_pool = pairs
            .saturating_mul(2)
            .saturating_add(self.special_count());
        if self.true_identity_pool.len() != expected_pool {
            return Err(invalid(format!(
                "true_identity_pool has {} entries, expected {expected_pool}",
                self.true_identity_pool.len()
            )));
        }
        if self.spawn_slots.len() < self.true_identity_pool.len() {
            return Err(invalid(format!(
                "{} spawn slots cannot hold {} tokens",
                self.spawn_slots.len(),
                self.true_identity_pool.len()
            )));
        }

        match self.combo_multipliers.as_slice() {
            [] => return Err(invalid("combo_multipliers must not be empty".to_owned())),
            table => {
                if table.iter().any(|m| !(m.is_finite() && *m >= 0.0)) {
                    return Err(invalid(
                        "combo_multipliers must be non-negative numbers".to_owned(),
                    ));
                }
                if table.windows(2).any(|w| matches!(w, [a, b] if b < a)) {
                    return Err(invalid("combo_multipliers must be non-decreasing".to_owned()));
                }
            }
        }

        Ok(())
    }
}

/// The validated, immutable difficulty table.
#[derive(Debug, Clone, Default)]
pub struct DifficultyTable {
    entries: BTreeMap<Difficulty, Arc<DifficultyConfig>>,
}

impl DifficultyTable {
    /// Validate and index a set of difficulty records.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any record is invalid, a tier appears
    /// twice, or a prerequisite names an unconfigured tier.
    pub fn from_configs(
        configs: impl IntoIterator<Item = DifficultyConfig>,
    ) -> Result<Self, ConfigError> {
        let mut entries = BTreeMap::new();
        for config in configs {
            config.validate()?;
            let difficulty = config.difficulty;
            if entries.insert(difficulty, Arc::new(config)).is_some() {
                return Err(ConfigError::DuplicateDifficulty(difficulty));
            }
        }
        for config in entries.values() {
            if let Some(prerequisite) = config
                .prerequisite
                .filter(|p| !entries.contains_key(p))
            {
                return Err(ConfigError::MissingPrerequisite {
                    difficulty: config.difficulty,
                    prerequisite,
                });
            }
        }
        Ok(Self { entries })
    }

    /// The built-in easy / normal / hard table.
    ///
    /// # Errors
    ///
    /// Only fails if the built-in records are inconsistent.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_configs(default_difficulties())
    }

    /// Look up a tier.
    pub fn get(&self, difficulty: Difficulty) -> Option<&Arc<DifficultyConfig>> {
        self.entries.get(&difficulty)
    }

    /// Iterate over every configured tier in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<DifficultyConfig>> {
        self.entries.values()
    }
}

// ---------------------------------------------------------------------------
// Built-in tiers
// ---------------------------------------------------------------------------

/// Each of the first `pair_count` paired kinds, twice.
fn paired_pool(pair_count: usize) -> Vec<TokenKind> {
    TokenKind::PAIRED
        .iter()
        .take(pair_count)
        .flat_map(|kind| [*kind, *kind])
        .collect()
}

/// A rectangular grid of slots in front of the player, spaced three blocks
/// apart, starting three blocks ahead.
fn grid_slots(half_width: i32, depth: i32) -> Vec<SlotOffset> {
    (-half_width..=half_width)
        .step_by(3)
        .flat_map(|x| {
            (-depth..=-3)
                .rev()
                .step_by(3)
                .map(move |z| SlotOffset::new(x, z))
        })
        .collect()
}

fn easy() -> DifficultyConfig {
    let mut pool = paired_pool(5);
    pool.push(TokenKind::Allay);

    // Two staggered rows.
    let spawn_slots = [
        (-7, -3),
        (-6, -6),
        (-4, -3),
        (-3, -6),
        (-1, -3),
        (0, -6),
        (2, -3),
        (3, -6),
        (5, -3),
        (6, -6),
        (8, -3),
    ]
    .into_iter()
    .map(|(x, z)| SlotOffset::new(x, z))
    .collect();

    DifficultyConfig {
        difficulty: Difficulty::Easy,
        label: "Easy".to_owned(),
        pair_count: 5,
        point_value: 5,
        time_bonus_factor: 1.0,
        decoy_pool: vec![TokenKind::Zombie],
        true_identity_pool: pool,
        spawn_slots,
        total_time_secs: 30,
        combo_multipliers: vec![1.0],
        prerequisite: None,
        scatter_slots: false,
    }
}

fn normal() -> DifficultyConfig {
    let mut pool = paired_pool(10);
    pool.extend([
        TokenKind::Allay,
        TokenKind::Allay,
        TokenKind::Shulker,
        TokenKind::Shulker,
        TokenKind::Enderman,
    ]);

    DifficultyConfig {
        difficulty: Difficulty::Normal,
        label: "Normal".to_owned(),
        pair_count: 10,
        point_value: 10,
        time_bonus_factor: 1.5,
        decoy_pool: vec![TokenKind::Zombie, TokenKind::WitherSkeleton],
        true_identity_pool: pool,
        spawn_slots: grid_slots(10, 23),
        total_time_secs: 90,
        combo_multipliers: vec![1.0, 1.5, 2.0, 2.5, 3.0],
        prerequisite: Some(Difficulty::Easy),
        scatter_slots: true,
    }
}

fn hard() -> DifficultyConfig {
    let mut pool = paired_pool(20);
    pool.extend([
        TokenKind::Allay,
        TokenKind::Allay,
        TokenKind::Allay,
        TokenKind::Shulker,
        TokenKind::Shulker,
        TokenKind::Shulker,
        TokenKind::Enderman,
        TokenKind::Enderman,
    ]);

    DifficultyConfig {
        difficulty: Difficulty::Hard,
        label: "Hard".to_owned(),
        pair_count: 20,
        point_value: 20,
        time_bonus_factor: 2.0,
        decoy_pool: vec![
            TokenKind::Zombie,
            TokenKind::WitherSkeleton,
            TokenKind::Creaking,
        ],
        true_identity_pool: pool,
        spawn_slots: grid_slots(15, 33),
        total_time_secs: 180,
        combo_multipliers: vec![1.0, 2.0, 3.0, 4.0, 5.0],
        prerequisite: Some(Difficulty::Normal),
        scatter_slots: true,
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_debounce_ms() -> u64 {
    500
}

const fn default_setup_budget_secs() -> u32 {
    10
}

const fn default_first_play_reading_secs() -> u32 {
    20
}

const fn default_countdown_secs() -> u32 {
    5
}

fn default_difficulties() -> Vec<DifficultyConfig> {
    vec![easy(), normal(), hard()]
}
