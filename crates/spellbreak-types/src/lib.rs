//! Shared type definitions for the Spellbreak session engine.
//!
//! This crate is the single source of truth for the identifiers, token
//! model, persistence records and presentation cues that flow between the
//! core engine and its collaborators.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for players and tokens
//! - [`enums`] -- Difficulty tiers, token kinds, lifecycle phases
//! - [`structs`] -- Positions, token records, persistence records, reports
//! - [`cues`] -- Semantic presentation events

pub mod cues;
pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use cues::Cue;
pub use enums::{
    ComboPhrase, Difficulty, EndReason, PairHalf, SessionPhase, SpecialEffect, TokenKind,
};
pub use ids::{PlayerId, TokenId};
pub use structs::{
    PendingRecord, Position, ProgressRecord, SavedItem, ScoreRecord, SessionReport, SlotOffset,
    SpawnedToken, TokenLabel, TokenRecord, TokenRole, VisualState,
};
