//! Integration tests for click handling, pair resolution and scoring.
//!
//! Each test drives a real [`Engine`] over in-memory collaborators on
//! virtual time, from the start request through teardown.
//!
//! [`Engine`]: spellbreak_core::Engine

#![allow(clippy::unwrap_used)]

mod common;

use std::time::Duration;

use chrono::TimeDelta;
use common::Harness;
use spellbreak_core::{GameError, IgnoreReason, InteractOutcome};
use spellbreak_types::{ComboPhrase, Cue, Difficulty, EndReason, PlayerId, TokenId, TokenLabel};

#[test]
fn easy_full_clear_with_ten_seconds_left_scores_thirty_five() {
    let mut h = Harness::new();
    h.start_active(Difficulty::Easy);
    assert_eq!(h.time_remaining_ms(), 29_000);

    h.advance_secs(19);
    assert_eq!(h.time_remaining_ms(), 10_000);

    for _ in 0..5 {
        assert!(matches!(
            h.match_pair(),
            InteractOutcome::Matched { points: 5, .. }
        ));
    }
    assert_eq!(h.score(), 25);

    let advanced = h.advance_secs(1);
    let report = advanced.reports.first().unwrap();
    assert_eq!(report.reason, EndReason::FullClear);
    assert_eq!(report.score, 35);
    assert_eq!(report.matched_pairs, 5);
    assert_eq!(report.first_clear, Some(true));
    assert!(report.new_high_score);
    assert!(advanced.failures.is_empty());

    assert!(h.engine.session(h.player).is_none());
    assert_eq!(h.world.live_count(), 0);
    assert_eq!(h.players.held_item(h.player).unwrap().0, "diamond_sword");
    assert!(!h.players.is_in_play(h.player));

    let stored = h.persistence.recent_scores(1);
    assert_eq!(stored.first().unwrap().score, 35);
    assert!(
        h.persistence
            .progress(h.player, Difficulty::Easy)
            .unwrap()
            .cleared_at
            .is_some()
    );
}

#[test]
fn normal_streak_of_three_scores_forty_five() {
    let mut h = Harness::new();
    h.unlock(Difficulty::Easy);
    h.start_active(Difficulty::Normal);

    assert_eq!(
        h.match_pair(),
        InteractOutcome::Matched {
            streak: 1,
            points: 10
        }
    );
    assert_eq!(
        h.match_pair(),
        InteractOutcome::Matched {
            streak: 2,
            points: 15
        }
    );
    assert_eq!(
        h.match_pair(),
        InteractOutcome::Matched {
            streak: 3,
            points: 20
        }
    );
    assert_eq!(h.score(), 45);

    let phrases: Vec<ComboPhrase> = h
        .cues()
        .into_iter()
        .filter_map(|cue| match cue {
            Cue::Matched { phrase, .. } => Some(phrase),
            _ => None,
        })
        .collect();
    assert_eq!(
        phrases,
        vec![
            ComboPhrase::Reunion,
            ComboPhrase::Great,
            ComboPhrase::Unbelievable
        ]
    );
}

#[test]
fn mismatch_resets_the_streak() {
    let mut h = Harness::new();
    h.unlock(Difficulty::Easy);
    h.start_active(Difficulty::Normal);

    h.match_pair();
    let (a, b) = h.find_mismatch();
    h.click(a).unwrap();
    assert_eq!(
        h.click(b).unwrap(),
        InteractOutcome::Mismatched { respawn: true }
    );
    h.advance(Duration::from_millis(500));

    assert_eq!(
        h.match_pair(),
        InteractOutcome::Matched {
            streak: 1,
            points: 10
        }
    );
    assert_eq!(h.score(), 20);
    assert_eq!(
        h.count_cues(|c| matches!(c, Cue::Mismatched { score: 10 })),
        1
    );
}

#[test]
fn mismatch_restores_both_decoys_in_place() {
    let mut h = Harness::new();
    h.start_active(Difficulty::Easy);

    let before = h.decoys();
    let (a, b) = h.find_mismatch();
    let labels = (
        before.iter().find(|(id, _)| *id == a).unwrap().1,
        before.iter().find(|(id, _)| *id == b).unwrap().1,
    );
    let positions = (
        h.world.entity(a).unwrap().position,
        h.world.entity(b).unwrap().position,
    );

    h.click(a).unwrap();
    h.click(b).unwrap();
    assert_eq!(h.decoys().len(), before.len().saturating_sub(2));

    h.advance(Duration::from_millis(500));
    let after = h.decoys();
    assert_eq!(after.len(), before.len());
    assert_eq!(h.count_cues(|c| matches!(c, Cue::DecoyRestored { .. })), 2);

    // New handles, same hidden labels, same places.
    let restored: Vec<(TokenId, _)> = after
        .iter()
        .filter(|(id, _)| !before.iter().any(|(old, _)| old == id))
        .copied()
        .collect();
    assert_eq!(restored.len(), 2);
    for (id, label) in restored {
        let at = h.world.entity(id).unwrap().position;
        if label == labels.0 {
            assert_eq!(at, positions.0);
        } else {
            assert_eq!(label, labels.1);
            assert_eq!(at, positions.1);
        }
    }
    assert!(h.engine.session(h.player).unwrap().pending.is_none());
    assert_eq!(h.world.live_count(), before.len());
}

#[test]
fn mismatch_without_time_left_keeps_true_forms_until_teardown() {
    let mut h = Harness::new();
    h.start_active(Difficulty::Easy);
    h.advance_secs(29);
    assert_eq!(h.time_remaining_ms(), 0);

    let (a, b) = h.find_mismatch();
    h.click(a).unwrap();
    assert_eq!(
        h.click(b).unwrap(),
        InteractOutcome::Mismatched { respawn: false }
    );

    h.advance(Duration::from_millis(500));
    assert_eq!(h.decoys().len(), 9);
    assert_eq!(h.world.live_count(), 11);
    assert_eq!(h.count_cues(|c| matches!(c, Cue::DecoyRestored { .. })), 0);

    let advanced = h.advance_secs(1);
    assert_eq!(advanced.reports.first().unwrap().reason, EndReason::Timeout);
    assert_eq!(h.world.live_count(), 0);
}

#[test]
fn timeout_awards_no_time_bonus() {
    let mut h = Harness::new();
    h.start_active(Difficulty::Easy);
    h.match_pair();
    h.match_pair();

    let advanced = h.advance_secs(30);
    let report = advanced.reports.first().unwrap();
    assert_eq!(report.reason, EndReason::Timeout);
    assert_eq!(report.score, 10);
    assert_eq!(report.first_clear, None);

    let cues = h.cues();
    assert!(cues.contains(&Cue::GameOver));
    assert!(cues.contains(&Cue::EndTitle {
        cleared: false,
        matched_pairs: 2
    }));
    assert!(!cues.contains(&Cue::GameClear));
}

#[test]
fn clear_on_the_last_tick_beats_timeout() {
    let mut h = Harness::new();
    h.start_active(Difficulty::Easy);
    h.advance_secs(29);
    assert_eq!(h.time_remaining_ms(), 0);

    for _ in 0..5 {
        h.match_pair();
    }
    let advanced = h.advance_secs(1);
    let report = advanced.reports.first().unwrap();
    assert_eq!(report.reason, EndReason::FullClear);
    assert_eq!(report.score, 25);
}

#[test]
fn clicks_inside_the_debounce_window_are_dropped() {
    let mut h = Harness::new();
    h.start_active(Difficulty::Easy);
    let (a, b) = h.find_mismatch();

    assert!(matches!(
        h.click(a).unwrap(),
        InteractOutcome::FirstReveal { .. }
    ));
    assert_eq!(
        h.click_after(b, TimeDelta::milliseconds(200)).unwrap(),
        InteractOutcome::Debounced
    );
    assert!(h.decoys().iter().any(|(id, _)| *id == b));

    // The window runs from the last accepted click.
    assert_eq!(
        h.click_after(b, TimeDelta::milliseconds(300)).unwrap(),
        InteractOutcome::Mismatched { respawn: true }
    );
}

#[test]
fn ignored_clicks_change_nothing() {
    let mut h = Harness::new();
    let stranger = PlayerId::new();
    assert_eq!(
        h.engine
            .on_interact(stranger, TokenId::new(), h.clock)
            .unwrap(),
        InteractOutcome::Ignored(IgnoreReason::NoSession)
    );

    h.players.satisfy_trigger(h.player);
    h.engine.start_session(h.player, Difficulty::Easy).unwrap();
    h.advance(Duration::from_secs(1));
    assert_eq!(
        h.click(TokenId::new()).unwrap(),
        InteractOutcome::Ignored(IgnoreReason::NotActive)
    );

    h.advance(Duration::from_millis(4_500));
    assert_eq!(
        h.click(TokenId::new()).unwrap(),
        InteractOutcome::Ignored(IgnoreReason::UnknownToken)
    );

    let (a, _) = h.find_pair();
    h.click(a).unwrap();
    let revealed = h
        .engine
        .session(h.player)
        .unwrap()
        .pending
        .unwrap()
        .true_form;
    assert_eq!(
        h.click(revealed).unwrap(),
        InteractOutcome::Ignored(IgnoreReason::NotADecoy)
    );
    assert_eq!(h.engine.session(h.player).unwrap().combo_streak, 0);
}

#[test]
fn failed_reveal_leaves_the_decoy_in_place() {
    let mut h = Harness::new();
    h.start_active(Difficulty::Easy);
    let (a, kind) = h
        .decoys()
        .into_iter()
        .find_map(|(id, label)| match label {
            TokenLabel::Paired { kind, .. } => Some((id, kind)),
            TokenLabel::Special { .. } => None,
        })
        .unwrap();
    h.world.refuse_spawns_of(kind);

    let result = h.click(a);
    assert!(matches!(result, Err(GameError::Collaborator { .. })));
    assert!(h.decoys().iter().any(|(id, _)| *id == a));
    assert!(h.world.entity(a).is_some());
    assert!(h.engine.session(h.player).unwrap().pending.is_none());
}

#[test]
fn lost_tokens_leave_the_registry() {
    let mut h = Harness::new();
    h.start_active(Difficulty::Easy);
    let (a, _) = h.decoys().first().copied().unwrap();

    assert!(h.world.remove_externally(a));
    assert!(h.engine.on_token_lost(h.player, a));
    assert!(!h.engine.on_token_lost(h.player, a));
    assert_eq!(h.decoys().len(), 10);
}

#[test]
fn stale_pending_pick_is_discarded() {
    let mut h = Harness::new();
    h.start_active(Difficulty::Easy);
    let (a, b) = h.find_pair();

    h.click(a).unwrap();
    let first = h
        .engine
        .session(h.player)
        .unwrap()
        .pending
        .unwrap()
        .true_form;
    h.world.remove_externally(first);
    h.engine.on_token_lost(h.player, first);

    // The partner becomes the new first pick instead of matching a ghost.
    assert!(matches!(
        h.click(b).unwrap(),
        InteractOutcome::FirstReveal { .. }
    ));
    assert_eq!(h.engine.session(h.player).unwrap().matched_pairs, 0);
}

#[test]
fn matched_pair_leaves_after_release_delay() {
    let mut h = Harness::new();
    h.start_active(Difficulty::Easy);
    h.match_pair();
    assert_eq!(h.world.live_count(), 11);

    h.advance(Duration::from_millis(499));
    assert_eq!(h.world.live_count(), 11);
    h.advance(Duration::from_millis(1));
    assert_eq!(h.world.live_count(), 9);
    assert_eq!(h.count_cues(|c| matches!(c, Cue::Released { .. })), 2);
}
