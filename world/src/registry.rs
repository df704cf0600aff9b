//! Live agents and their motion status.

use std::{collections::BTreeMap, time::Duration};

use grid_arena_core::{AgentId, CellCoord, Faction, MotionStatus, VisualOffset};

/// Authoritative record of a single agent.
#[derive(Clone, Debug, PartialEq)]
pub struct Agent {
    /// Identifier allocated by the registry.
    pub id: AgentId,
    /// Side the agent fights for.
    pub faction: Faction,
    /// Last fully committed cell; only completed moves update it.
    pub cell: CellCoord,
    /// Current motion status.
    pub status: MotionStatus,
    /// Whether autonomous behaviour drives the agent.
    pub autonomous: bool,
    /// Constant rendering bias.
    pub visual_offset: VisualOffset,
    stun_remaining: Duration,
}

impl Agent {
    /// Immobilises the agent for the provided duration.
    pub fn stun(&mut self, duration: Duration) {
        self.status = MotionStatus::Stunned;
        self.stun_remaining = duration;
    }

    /// Counts down an active stun, returning `true` when the agent recovers.
    pub fn advance_stun(&mut self, dt: Duration) -> bool {
        if self.status != MotionStatus::Stunned {
            return false;
        }
        self.stun_remaining = self.stun_remaining.saturating_sub(dt);
        if self.stun_remaining.is_zero() {
            self.status = MotionStatus::Idle;
            true
        } else {
            false
        }
    }
}

/// Registry populated explicitly on spawn and despawn.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    entries: BTreeMap<AgentId, Agent>,
    next_agent_id: u32,
}

impl AgentRegistry {
    /// Creates an empty registry with a reset identifier counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new idle agent and returns its identifier.
    pub fn register(
        &mut self,
        faction: Faction,
        cell: CellCoord,
        visual_offset: VisualOffset,
        autonomous: bool,
    ) -> AgentId {
        let id = AgentId::new(self.next_agent_id);
        self.next_agent_id = self.next_agent_id.wrapping_add(1);
        let _ = self.entries.insert(
            id,
            Agent {
                id,
                faction,
                cell,
                status: MotionStatus::Idle,
                autonomous,
                visual_offset,
                stun_remaining: Duration::ZERO,
            },
        );
        id
    }

    /// Removes the agent, returning its final record.
    pub fn unregister(&mut self, agent: AgentId) -> Option<Agent> {
        self.entries.remove(&agent)
    }

    /// Looks up an agent.
    #[must_use]
    pub fn get(&self, agent: AgentId) -> Option<&Agent> {
        self.entries.get(&agent)
    }

    /// Looks up an agent for mutation.
    pub fn get_mut(&mut self, agent: AgentId) -> Option<&mut Agent> {
        self.entries.get_mut(&agent)
    }

    /// Iterates over agents in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.entries.values()
    }

    /// Iterates mutably over agents in identifier order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Agent> {
        self.entries.values_mut()
    }

    /// Number of live agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether no agent is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
