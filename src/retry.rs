//! Exponential-backoff respawn supervision.
//!
//! The shell process is expected to stay alive for the whole session. When it
//! exits unexpectedly the supervise loop respawns it, waiting an
//! exponentially increasing delay between attempts, until the attempt budget
//! is exhausted. Exhaustion is terminal for the session.

use std::time::Duration;

/// Retry budget and delay curve for the respawn loop.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of times the process may be spawned.
    pub max_attempts: u32,
    /// Delay before the first respawn; doubles on each subsequent one.
    pub base_delay: Duration,
    /// Upper bound on the delay between respawns.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Lifecycle of the supervised process across respawns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RespawnState {
    #[default]
    Starting,
    Running,
    Exited,
    Retrying,
    /// Attempt budget spent; the session is permanently unusable.
    Exhausted,
}

/// State machine driving the respawn loop.
#[derive(Debug)]
pub struct Backoff {
    policy: RetryPolicy,
    failures: u32,
    state: RespawnState,
}

impl Backoff {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            failures: 0,
            state: RespawnState::Starting,
        }
    }

    #[must_use]
    pub fn state(&self) -> RespawnState {
        self.state
    }

    pub fn transition(&mut self, next: RespawnState) {
        tracing::debug!(from = ?self.state, to = ?next, "respawn state transition");
        self.state = next;
    }

    /// Record a failed attempt and return the delay before the next one, or
    /// `None` once the attempt budget is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.transition(RespawnState::Exited);

        if self.failures + 1 >= self.policy.max_attempts {
            self.transition(RespawnState::Exhausted);
            return None;
        }

        // 2^failures, clamped so the shift cannot overflow.
        let factor = 1u32 << self.failures.min(16);
        let delay = self
            .policy
            .base_delay
            .saturating_mul(factor)
            .min(self.policy.max_delay);

        self.failures += 1;
        self.transition(RespawnState::Retrying);
        Some(delay)
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.state == RespawnState::Exhausted
    }
}
