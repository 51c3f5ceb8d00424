//! Cooperative timer scheduler for timed sub-behaviors.
//!
//! Stun windows, death delays and boss phases are one-shot tasks that fire
//! after a delay measured in simulated seconds. Every task carries:
//! - a kind (at most one in flight per kind)
//! - the owner state it expects to still be in when it fires
//! - a cancellation token
//!
//! Starting a task of a kind that is already running cancels the old one.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Token identifying one started task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CancelToken(u64);

impl fmt::Display for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task:{}", self.0)
    }
}

/// A task waiting for its delay to run out.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingTask<K, S> {
    token: CancelToken,
    kind: K,
    remaining: f32,
    expects: S,
}

/// A task whose delay ran out this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredTask<K, S> {
    /// Token returned by `start`
    pub token: CancelToken,
    /// Task kind
    pub kind: K,
    /// Owner state the task was started for
    pub expects: S,
}

impl<K, S: PartialEq> FiredTask<K, S> {
    /// Returns whether the owner is still in the state this task expects.
    #[must_use]
    pub fn is_current(&self, state: &S) -> bool {
        self.expects == *state
    }
}

/// One-shot timers keyed by kind.
#[derive(Debug, Clone)]
pub struct TaskScheduler<K, S> {
    tasks: Vec<PendingTask<K, S>>,
    next_token: u64,
}

impl<K, S> Default for TaskScheduler<K, S> {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            next_token: 1,
        }
    }
}

impl<K: Copy + PartialEq, S: Copy> TaskScheduler<K, S> {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a task firing after `delay` seconds.
    ///
    /// Any in-flight task of the same kind is cancelled first.
    pub fn start(&mut self, kind: K, delay: f32, expects: S) -> CancelToken {
        self.cancel_kind(kind);
        let token = CancelToken(self.next_token);
        self.next_token += 1;
        self.tasks.push(PendingTask {
            token,
            kind,
            remaining: delay.max(0.0),
            expects,
        });
        token
    }

    /// Cancels the pending task of `kind`, if any.
    pub fn cancel_kind(&mut self, kind: K) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.kind != kind);
        self.tasks.len() != before
    }

    /// Cancels everything. Returns how many tasks were dropped.
    pub fn cancel_all(&mut self) -> usize {
        let dropped = self.tasks.len();
        self.tasks.clear();
        dropped
    }

    /// Returns whether a task of `kind` is pending.
    #[must_use]
    pub fn is_running(&self, kind: K) -> bool {
        self.tasks.iter().any(|t| t.kind == kind)
    }

    /// Number of pending tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Advances every task by `dt` and returns those that fired, in start order.
    pub fn tick(&mut self, dt: f32) -> Vec<FiredTask<K, S>> {
        let dt = dt.max(0.0);
        let mut fired = Vec::new();
        self.tasks.retain_mut(|task| {
            task.remaining -= dt;
            if task.remaining <= 0.0 {
                fired.push(FiredTask {
                    token: task.token,
                    kind: task.kind,
                    expects: task.expects,
                });
                false
            } else {
                true
            }
        });
        fired
    }
}
