//! Timed interpolation of committed moves.

use std::{collections::BTreeMap, time::Duration};

use grid_arena_core::{AgentId, CellCoord, IntentKind, MotionStatus, PostMotion};

use crate::{occupancy::OccupancyTracker, registry::AgentRegistry};

/// In-flight interpolation of a single agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Motion {
    /// Cell the agent left; its last fully committed position.
    pub from: CellCoord,
    /// Cell the agent is travelling to; already reserved.
    pub to: CellCoord,
    /// Kind of displacement being animated.
    pub kind: IntentKind,
    /// State applied on arrival.
    pub post: PostMotion,
    elapsed: Duration,
    duration: Duration,
}

impl Motion {
    /// Fraction of the interpolation completed, in `0.0..=1.0`.
    #[must_use]
    pub fn progress(&self) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (self.elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }

    fn is_complete(&self) -> bool {
        self.elapsed >= self.duration
    }
}

/// Agent that reached its target during [`AgentMotionController::advance`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Arrival {
    /// Agent that arrived.
    pub agent: AgentId,
    /// Cell that became authoritative.
    pub cell: CellCoord,
}

/// Drives every committed move from its source to its target cell.
#[derive(Debug, Default)]
pub struct AgentMotionController {
    active: BTreeMap<AgentId, Motion>,
}

impl AgentMotionController {
    /// Creates a controller with no motion in flight.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts interpolating the agent between two cells.
    pub fn begin(
        &mut self,
        agent: AgentId,
        from: CellCoord,
        to: CellCoord,
        kind: IntentKind,
        post: PostMotion,
        duration: Duration,
    ) {
        let previous = self.active.insert(
            agent,
            Motion {
                from,
                to,
                kind,
                post,
                elapsed: Duration::ZERO,
                duration,
            },
        );
        debug_assert!(previous.is_none(), "agent {} already in motion", agent.get());
    }

    /// Advances every interpolation and finalizes those that reached their target.
    ///
    /// Arrivals become idle on their target cell (the reservation was claimed at
    /// commit) and adopt the move's post-state. Arrivals are reported in
    /// agent-identifier order.
    pub fn advance(
        &mut self,
        dt: Duration,
        agents: &mut AgentRegistry,
        occupancy: &OccupancyTracker,
    ) -> Vec<Arrival> {
        let mut finished = Vec::new();
        for (agent, motion) in &mut self.active {
            motion.elapsed = motion.elapsed.saturating_add(dt);
            if motion.is_complete() {
                finished.push(*agent);
            }
        }

        let mut arrivals = Vec::with_capacity(finished.len());
        for agent in finished {
            let Some(motion) = self.active.remove(&agent) else {
                continue;
            };
            let Some(record) = agents.get_mut(agent) else {
                continue;
            };
            debug_assert_eq!(occupancy.cell_of(agent), Some(motion.to));

            record.cell = motion.to;
            record.status = MotionStatus::Idle;
            if motion.post == PostMotion::Wander {
                record.autonomous = true;
            }
            arrivals.push(Arrival {
                agent,
                cell: motion.to,
            });
        }
        arrivals
    }

    /// Stops the agent's interpolation and snaps it back to its committed cell.
    ///
    /// The target reservation is released and the source cell re-reserved. If
    /// another agent claimed the source in the meantime, the agent settles on
    /// the target it already holds instead. Returns the cell the agent ends on,
    /// or `None` when nothing was in flight.
    pub fn interrupt(
        &mut self,
        agent: AgentId,
        agents: &mut AgentRegistry,
        occupancy: &mut OccupancyTracker,
    ) -> Option<CellCoord> {
        let motion = self.active.remove(&agent)?;
        let record = agents.get_mut(agent)?;

        let _ = occupancy.release(motion.to, agent);
        let cell = match occupancy.reserve(motion.from, agent) {
            Ok(()) => motion.from,
            Err(error) => {
                log::debug!(
                    "agent {} cannot return to its origin ({error}); settling on target",
                    agent.get()
                );
                if let Err(error) = occupancy.reserve(motion.to, agent) {
                    log::warn!("agent {} lost its target while interrupted: {error}", agent.get());
                }
                motion.to
            }
        };

        record.cell = cell;
        record.status = MotionStatus::Idle;
        Some(cell)
    }

    /// Drops the agent's interpolation without touching reservations.
    pub fn cancel(&mut self, agent: AgentId) -> Option<Motion> {
        self.active.remove(&agent)
    }

    /// Interpolation in flight for the agent, if any.
    #[must_use]
    pub fn motion(&self, agent: AgentId) -> Option<&Motion> {
        self.active.get(&agent)
    }

    /// Number of agents in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Reports whether no agent is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
