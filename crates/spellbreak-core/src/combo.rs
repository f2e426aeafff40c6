//! Combo multipliers, match points and the full-clear time bonus.
//!
//! All values are pure functions of the difficulty record and the current
//! streak / clock, so the resolver and the lifecycle share one source of
//! scoring arithmetic.

use spellbreak_types::ComboPhrase;

use crate::config::DifficultyConfig;

/// Multiplier applied to a match made at `streak` consecutive matches.
///
/// The table is indexed by `streak - 1` and saturates at its last entry.
/// A streak of zero (never produced by the resolver) reads the first entry.
pub fn combo_multiplier(streak: u32, config: &DifficultyConfig) -> f64 {
    let index = usize::try_from(streak.saturating_sub(1)).unwrap_or(usize::MAX);
    config
        .combo_multipliers
        .get(index)
        .or_else(|| config.combo_multipliers.last())
        .copied()
        .unwrap_or(1.0)
}

/// Points awarded for a match made at `streak`.
pub fn score_for_match(streak: u32, config: &DifficultyConfig) -> u32 {
    round_points(f64::from(config.point_value) * combo_multiplier(streak, config))
}

/// Bonus awarded on a full clear for the time left on the clock.
///
/// Only whole seconds count; a negative clock awards nothing.
pub fn time_bonus(time_remaining_ms: i64, config: &DifficultyConfig) -> u32 {
    let secs = time_remaining_ms.max(0).div_euclid(1000);
    let secs = i32::try_from(secs).unwrap_or(i32::MAX);
    round_points(f64::from(secs) * config.time_bonus_factor)
}

/// Phrase shown for a streak.
pub const fn combo_phrase(streak: u32) -> ComboPhrase {
    match streak {
        0 | 1 => ComboPhrase::Reunion,
        2 => ComboPhrase::Great,
        3 => ComboPhrase::Unbelievable,
        4 => ComboPhrase::Awesome,
        _ => ComboPhrase::Clairvoyance,
    }
}

/// Round half away from zero and clamp into the score range.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_points(value: f64) -> u32 {
    value.round().clamp(0.0, f64::from(u32::MAX)) as u32
}
