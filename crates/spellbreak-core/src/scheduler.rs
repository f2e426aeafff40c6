//! Task scheduling on a virtual clock.
//!
//! Every timed behaviour of a session (trigger polling, the countdown, the
//! active tick, delayed releases and restores, delayed titles) is a [`Task`]
//! value placed on a [`Scheduler`]. The engine owns a [`TimerQueue`], which
//! keeps virtual time and hands back due tasks in deadline order. Nothing
//! in here sleeps: the async runner decides how virtual time maps to wall
//! time.

use std::collections::BTreeMap;
use std::time::Duration;

use spellbreak_types::{Cue, PendingRecord, PlayerId, TokenId};

/// Handle for cancelling a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskToken(u64);

/// A decoy to bring back after a mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreEntry {
    /// The revealed form standing where the decoy should reappear.
    pub true_form: TokenId,
    /// What the decoy was.
    pub pending: PendingRecord,
}

/// Work the engine runs when a timer fires.
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    /// Check whether the player has satisfied the start trigger.
    PollTrigger {
        /// Player in setup.
        player: PlayerId,
    },
    /// Advance the pre-game countdown by one second.
    CountdownTick {
        /// Player counting down.
        player: PlayerId,
    },
    /// One second of active play.
    ActiveTick {
        /// Player in play.
        player: PlayerId,
    },
    /// Remove the start trigger object after it was accepted.
    ClearTrigger {
        /// Owner of the trigger.
        player: PlayerId,
    },
    /// Remove a revealed special token.
    ReleaseSpecial {
        /// Owner of the session.
        player: PlayerId,
        /// The special token.
        token: TokenId,
    },
    /// Remove both true forms of a matched pair.
    ReleasePair {
        /// Owner of the session.
        player: PlayerId,
        /// The two matched forms.
        tokens: [TokenId; 2],
    },
    /// Replace both true forms of a mismatch with their decoys.
    RestoreDecoys {
        /// Owner of the session.
        player: PlayerId,
        /// The two decoys to restore.
        entries: [RestoreEntry; 2],
    },
    /// Present a cue later.
    Present {
        /// Recipient.
        player: PlayerId,
        /// The cue.
        cue: Cue,
    },
}

/// The timing contract the engine schedules against.
pub trait Scheduler {
    /// Run `task` once, `delay` from now.
    fn after(&mut self, delay: Duration, task: Task) -> TaskToken;

    /// Run `task` every `period`, first `period` from now.
    fn every(&mut self, period: Duration, task: Task) -> TaskToken;

    /// Cancel a task. Cancelling a finished or unknown token is a no-op.
    fn cancel(&mut self, token: TaskToken);
}

#[derive(Debug, Clone)]
struct Entry {
    token: TaskToken,
    task: Task,
    period: Option<Duration>,
}

/// Deadline-ordered queue of tasks over virtual time.
///
/// Tasks due at the same instant run in the order they were scheduled.
#[derive(Debug, Default)]
pub struct TimerQueue {
    now: Duration,
    next_seq: u64,
    next_token: u64,
    entries: BTreeMap<(Duration, u64), Entry>,
    index: BTreeMap<TaskToken, (Duration, u64)>,
}

impl TimerQueue {
    /// Create an empty queue at virtual time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub const fn now(&self) -> Duration {
        self.now
    }

    /// Deadline of the earliest pending task.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.entries.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no task is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a token still refers to a pending task.
    pub fn is_scheduled(&self, token: TaskToken) -> bool {
        self.index.contains_key(&token)
    }

    /// Pop the earliest task due at or before `until`, moving the clock to
    /// its deadline. Periodic tasks are re-armed before being returned.
    pub fn pop_due(&mut self, until: Duration) -> Option<(TaskToken, Task)> {
        let (&key, _) = self.entries.iter().next()?;
        let (deadline, _) = key;
        if deadline > until {
            return None;
        }
        let entry = self.entries.remove(&key)?;
        self.index.remove(&entry.token);
        self.now = self.now.max(deadline);

        if let Some(period) = entry.period {
            let next = deadline.saturating_add(period);
            self.insert(next, entry.token, entry.task.clone(), Some(period));
        }
        Some((entry.token, entry.task))
    }

    /// Move the clock forward without running anything. Never moves it back.
    pub fn advance_to(&mut self, at: Duration) {
        self.now = self.now.max(at);
    }

    fn insert(&mut self, deadline: Duration, token: TaskToken, task: Task, period: Option<Duration>) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        self.entries
            .insert((deadline, seq), Entry { token, task, period });
        self.index.insert(token, (deadline, seq));
    }

    fn mint(&mut self) -> TaskToken {
        let token = TaskToken(self.next_token);
        self.next_token = self.next_token.saturating_add(1);
        token
    }
}

impl Scheduler for TimerQueue {
    fn after(&mut self, delay: Duration, task: Task) -> TaskToken {
        let token = self.mint();
        let deadline = self.now.saturating_add(delay);
        self.insert(deadline, token, task, None);
        token
    }

    fn every(&mut self, period: Duration, task: Task) -> TaskToken {
        let token = self.mint();
        let deadline = self.now.saturating_add(period);
        self.insert(deadline, token, task, Some(period));
        token
    }

    fn cancel(&mut self, token: TaskToken) {
        if let Some(key) = self.index.remove(&token) {
            self.entries.remove(&key);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn tick(player: PlayerId) -> Task {
        Task::ActiveTick { player }
    }

    #[test]
    fn runs_in_deadline_then_schedule_order() {
        let mut queue = TimerQueue::new();
        let p = PlayerId::new();
        let late = queue.after(Duration::from_millis(500), Task::ClearTrigger { player: p });
        let first = queue.after(Duration::from_millis(100), tick(p));
        let second = queue.after(Duration::from_millis(100), Task::PollTrigger { player: p });

        let order: Vec<TaskToken> =
            std::iter::from_fn(|| queue.pop_due(Duration::from_secs(1)).map(|(t, _)| t))
                .collect();
        assert_eq!(order, vec![first, second, late]);
        assert_eq!(queue.now(), Duration::from_millis(500));
    }

    #[test]
    fn nothing_runs_before_its_deadline() {
        let mut queue = TimerQueue::new();
        queue.after(Duration::from_secs(2), tick(PlayerId::new()));
        assert!(queue.pop_due(Duration::from_millis(1999)).is_none());
        assert!(queue.pop_due(Duration::from_secs(2)).is_some());
        assert!(queue.is_empty());
    }

    #[test]
    fn periodic_task_rearms_until_cancelled() {
        let mut queue = TimerQueue::new();
        let token = queue.every(Duration::from_secs(1), tick(PlayerId::new()));

        let mut fired = 0_u32;
        while queue.pop_due(Duration::from_millis(3500)).is_some() {
            fired = fired.saturating_add(1);
        }
        assert_eq!(fired, 3);
        assert_eq!(queue.next_deadline(), Some(Duration::from_secs(4)));

        queue.cancel(token);
        assert!(!queue.is_scheduled(token));
        assert!(queue.pop_due(Duration::from_secs(10)).is_none());
    }

    #[test]
    fn cancel_unknown_token_is_noop() {
        let mut queue = TimerQueue::new();
        let token = queue.after(Duration::ZERO, tick(PlayerId::new()));
        assert!(queue.pop_due(Duration::ZERO).is_some());
        queue.cancel(token);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn delays_are_relative_to_current_time() {
        let mut queue = TimerQueue::new();
        queue.advance_to(Duration::from_secs(10));
        queue.after(Duration::from_secs(1), tick(PlayerId::new()));
        assert_eq!(queue.next_deadline(), Some(Duration::from_secs(11)));

        queue.advance_to(Duration::from_secs(5));
        assert_eq!(queue.now(), Duration::from_secs(10));
    }
}
