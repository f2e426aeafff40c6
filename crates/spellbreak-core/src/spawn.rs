//! Token layout and initial spawning.
//!
//! A layout is planned first as pure data ([`plan_layout`]) and then
//! realised against the world ([`spawn_layout`]). Keeping the two apart
//! lets the fairness guarantees be tested without a world.
//!
//! Fairness: every true identity in the pool is assigned to exactly one
//! slot, in a uniformly shuffled order, and each decoy form is drawn
//! independently and uniformly from the decoy pool.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use spellbreak_types::{
    PairHalf, Position, SlotOffset, SpawnedToken, TokenId, TokenKind, TokenLabel, TokenRecord,
    TokenRole, VisualState,
};
use tracing::{debug, warn};

use crate::collaborators::WorldEntitySpawner;
use crate::config::DifficultyConfig;

/// Height above the anchor tokens float at.
pub const SPAWN_HEIGHT: f64 = 0.3;

/// One decoy in a planned layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedToken {
    /// Slot relative to the player.
    pub slot: SlotOffset,
    /// Form the decoy is rendered as.
    pub decoy_kind: TokenKind,
    /// Identity hidden behind it.
    pub record: TokenRecord,
}

/// Attach pairing labels to a pool in iteration order.
///
/// The first occurrence of a paired kind becomes [`PairHalf::First`] and the
/// next [`PairHalf::Last`]. Specials get their fixed special label.
pub fn label_pool(pool: &[TokenKind]) -> Vec<TokenRecord> {
    let mut seen: BTreeSet<TokenKind> = BTreeSet::new();
    pool.iter()
        .map(|&kind| {
            let label = match kind.special_effect() {
                Some(effect) => TokenLabel::Special { kind, effect },
                None => {
                    let half = if seen.insert(kind) {
                        PairHalf::First
                    } else {
                        PairHalf::Last
                    };
                    TokenLabel::Paired { kind, half }
                }
            };
            TokenRecord {
                true_kind: kind,
                label,
            }
        })
        .collect()
}

/// Plan a fresh layout for one game.
pub fn plan_layout<R: Rng + ?Sized>(config: &DifficultyConfig, rng: &mut R) -> Vec<PlannedToken> {
    let mut pool = config.true_identity_pool.clone();
    pool.shuffle(rng);

    let mut slots = config.spawn_slots.clone();
    if config.scatter_slots {
        slots.shuffle(rng);
    }

    slots
        .into_iter()
        .zip(label_pool(&pool))
        .filter_map(|(slot, record)| {
            let decoy_kind = *config.decoy_pool.choose(&mut *rng)?;
            Some(PlannedToken {
                slot,
                decoy_kind,
                record,
            })
        })
        .collect()
}

/// World position of a slot relative to an anchor.
pub fn slot_position(anchor: Position, slot: SlotOffset) -> Position {
    anchor.offset(f64::from(slot.x), SPAWN_HEIGHT, f64::from(slot.z))
}

/// Spawn every planned decoy and return the resulting registry entries.
///
/// A slot whose spawn fails is logged and skipped; the rest of the layout
/// still spawns.
pub fn spawn_layout(
    world: &mut dyn WorldEntitySpawner,
    anchor: Position,
    plan: &[PlannedToken],
) -> BTreeMap<TokenId, SpawnedToken> {
    let decoy_state = VisualState::decoy();
    let mut registry = BTreeMap::new();

    for planned in plan {
        let position = slot_position(anchor, planned.slot);
        match world.spawn(planned.decoy_kind, position) {
            Ok(token) => {
                world.set_visual_state(token, &decoy_state);
                registry.insert(
                    token,
                    SpawnedToken {
                        form: planned.decoy_kind,
                        role: TokenRole::Decoy,
                        record: planned.record,
                        position,
                    },
                );
            }
            Err(e) => {
                warn!(
                    slot_x = planned.slot.x,
                    slot_z = planned.slot.z,
                    error = %e,
                    "Skipping slot after failed spawn"
                );
            }
        }
    }

    debug!(
        planned = plan.len(),
        spawned = registry.len(),
        "Spawned decoy layout"
    );
    registry
}
