//! Presenter that renders cues as structured log lines.
//!
//! Titles and results go out at `info`; the per-second ambient and progress
//! cues at `debug` so a default run stays readable.

use spellbreak_core::EffectPresenter;
use spellbreak_types::{Cue, PlayerId};
use tracing::{debug, info};

/// Logs every cue with its JSON payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPresenter;

impl LogPresenter {
    const fn is_chatty(cue: &Cue) -> bool {
        matches!(
            cue,
            Cue::Ambient { .. }
                | Cue::Progress { .. }
                | Cue::SetupRemaining { .. }
                | Cue::Incantation { .. }
                | Cue::Shuffled { .. }
                | Cue::Released { .. }
        )
    }
}

impl EffectPresenter for LogPresenter {
    fn present(&mut self, player: PlayerId, cue: &Cue) {
        let payload = serde_json::to_string(cue).unwrap_or_else(|e| format!("<unserializable: {e}>"));
        if Self::is_chatty(cue) {
            debug!(player = %player, cue = %payload, "Cue");
        } else {
            info!(player = %player, cue = %payload, "Cue");
        }
    }
}
