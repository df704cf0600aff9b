//! Tick-polled wait for every agent to settle before a batch resolves.

use std::time::Duration;

use grid_arena_core::ArenaError;

/// Result of polling the gate once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateStatus {
    /// Agents are still animating; keep waiting.
    Pending,
    /// Every agent is at rest.
    Open,
    /// The wait budget ran out; resolve with in-flight agents excluded.
    TimedOut,
}

/// Bounded wait that accumulates elapsed simulation time while agents move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuiescenceGate {
    max_wait: Duration,
    waited: Duration,
}

impl QuiescenceGate {
    /// Creates a gate that gives up after `max_wait` of simulated time.
    #[must_use]
    pub const fn new(max_wait: Duration) -> Self {
        Self {
            max_wait,
            waited: Duration::ZERO,
        }
    }

    /// Polls the gate after `dt` of simulated time elapsed.
    ///
    /// The accumulated wait restarts whenever the gate opens or times out.
    pub fn poll(&mut self, quiescent: bool, dt: Duration) -> GateStatus {
        if quiescent {
            self.waited = Duration::ZERO;
            return GateStatus::Open;
        }

        self.waited = self.waited.saturating_add(dt);
        if self.waited >= self.max_wait {
            let timeout = ArenaError::QuiescenceTimeout {
                waited: self.waited,
            };
            log::warn!("{timeout}; resolving without the agents in flight");
            self.waited = Duration::ZERO;
            GateStatus::TimedOut
        } else {
            GateStatus::Pending
        }
    }

    /// Simulated time spent waiting for the current batch.
    #[must_use]
    pub const fn waited(&self) -> Duration {
        self.waited
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiescent_arena_opens_immediately() {
        let mut gate = QuiescenceGate::new(Duration::from_millis(100));
        assert_eq!(gate.poll(true, Duration::ZERO), GateStatus::Open);
    }

    #[test]
    fn gate_times_out_after_budget_and_restarts() {
        let mut gate = QuiescenceGate::new(Duration::from_millis(100));

        assert_eq!(
            gate.poll(false, Duration::from_millis(60)),
            GateStatus::Pending
        );
        assert_eq!(gate.waited(), Duration::from_millis(60));
        assert_eq!(
            gate.poll(false, Duration::from_millis(40)),
            GateStatus::TimedOut
        );
        assert_eq!(gate.waited(), Duration::ZERO);
        assert_eq!(
            gate.poll(false, Duration::from_millis(40)),
            GateStatus::Pending
        );
    }
}
