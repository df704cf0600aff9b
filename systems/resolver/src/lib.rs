#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Movement conflict resolution for simultaneous, chained movement intents.
//!
//! The resolver is a pure system: it reads immutable world views, resolves a
//! batch of intents into a conflict-free assignment, and emits the commands
//! that commit the accepted moves. Submitted batches queue behind a bounded
//! quiescence wait so two batches never interleave.

pub mod chain;
pub mod quiescence;

use std::{collections::VecDeque, time::Duration};

use grid_arena_core::{
    AgentId, Category, Command, Direction, Event, MotionStatus, MovementIntent, PostMotion,
    ResolutionReport,
};
use grid_arena_world::{
    query::{AgentView, GridView, OccupancyView},
    ArenaConfig,
};

use quiescence::{GateStatus, QuiescenceGate};

/// Grid-wide pull that moves every idle agent standing on matching cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PullEffect {
    /// Only cells of this category trigger the pull; `None` matches every cell.
    pub category: Option<Category>,
    /// Direction every affected agent is pulled in.
    pub direction: Direction,
    /// Agents the effect never moves, such as its caster.
    pub excluded: Vec<AgentId>,
}

impl PullEffect {
    /// Creates a pull affecting every cell in the provided direction.
    #[must_use]
    pub const fn new(direction: Direction) -> Self {
        Self {
            category: None,
            direction,
            excluded: Vec::new(),
        }
    }

    /// Restricts the effect to cells of the provided category.
    #[must_use]
    pub fn on_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Exempts the agent from the effect.
    #[must_use]
    pub fn excluding(mut self, agent: AgentId) -> Self {
        self.excluded.push(agent);
        self
    }

    /// Generates one pull intent per idle, non-excluded agent on a matching cell.
    ///
    /// Intents are produced in row-major cell order.
    #[must_use]
    pub fn intents(
        &self,
        agents: &AgentView,
        occupancy: OccupancyView<'_>,
        grid: GridView<'_>,
    ) -> Vec<MovementIntent> {
        grid.iter()
            .filter(|(_, category, _)| self.category.map_or(true, |filter| filter == *category))
            .filter_map(|(cell, _, _)| {
                let agent = occupancy.occupant(cell)?;
                let snapshot = agents.get(agent)?;
                let eligible = snapshot.status == MotionStatus::Idle
                    && snapshot.cell == cell
                    && !self.excluded.contains(&agent);
                eligible.then(|| MovementIntent::pull(cell, self.direction))
            })
            .collect()
    }
}

/// Work submitted to the resolver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Batch {
    /// Explicit intents produced by a skill or AI.
    Intents(Vec<MovementIntent>),
    /// Pull whose candidates are generated when the batch starts.
    Pull(PullEffect),
}

#[derive(Clone, Debug)]
struct Pending {
    batch: Batch,
    post: PostMotion,
}

/// Pure system that turns movement intents into committed, conflict-free moves.
#[derive(Debug)]
pub struct MovementConflictResolver {
    queue: VecDeque<Pending>,
    gate: QuiescenceGate,
}

impl MovementConflictResolver {
    /// Creates a resolver whose quiescence wait gives up after `max_wait`.
    #[must_use]
    pub fn new(max_wait: Duration) -> Self {
        Self {
            queue: VecDeque::new(),
            gate: QuiescenceGate::new(max_wait),
        }
    }

    /// Creates a resolver using the configured quiescence wait.
    #[must_use]
    pub fn from_config(config: &ArenaConfig) -> Self {
        Self::new(config.quiescence_max_wait)
    }

    /// Queues a batch; `post` is applied to each moved agent once it arrives.
    pub fn submit(&mut self, batch: Batch, post: PostMotion) {
        self.queue.push_back(Pending { batch, post });
    }

    /// Number of batches waiting to be resolved.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Consumes world events and views, resolving at most one queued batch.
    ///
    /// The front batch waits until no agent is in motion. Once the wait
    /// exceeds its budget the batch resolves anyway with in-flight agents
    /// excluded, and the returned report is flagged accordingly.
    pub fn handle(
        &mut self,
        events: &[Event],
        agents: &AgentView,
        occupancy: OccupancyView<'_>,
        grid: GridView<'_>,
        out: &mut Vec<Command>,
    ) -> Option<ResolutionReport> {
        if self.queue.is_empty() {
            return None;
        }

        let dt = events
            .iter()
            .filter_map(|event| match event {
                Event::TimeAdvanced { dt } => Some(*dt),
                _ => None,
            })
            .fold(Duration::ZERO, Duration::saturating_add);

        let timed_out = match self.gate.poll(agents.is_quiescent(), dt) {
            GateStatus::Pending => return None,
            GateStatus::Open => false,
            GateStatus::TimedOut => true,
        };

        let pending = self.queue.pop_front()?;
        let intents = match pending.batch {
            Batch::Intents(intents) => intents,
            Batch::Pull(effect) => effect.intents(agents, occupancy, grid),
        };
        let mut report = self.resolve(&intents, pending.post, agents, occupancy, grid, out);
        if timed_out {
            report.mark_quiescence_timeout();
        }
        Some(report)
    }

    /// Resolves the intents immediately, bypassing the queue.
    ///
    /// The report is only valid once the emitted commands are applied, and
    /// nothing else may be resolved against the same views before that.
    ///
    /// Accepted moves are emitted as a single [`Command::CommitMoves`] in
    /// dependency order, followed by a [`Command::StunAgent`] for every
    /// rejected knockback that asks for a stun instead.
    pub fn resolve(
        &self,
        intents: &[MovementIntent],
        post: PostMotion,
        agents: &AgentView,
        occupancy: OccupancyView<'_>,
        grid: GridView<'_>,
        out: &mut Vec<Command>,
    ) -> ResolutionReport {
        let report = chain::resolve_batch(intents, agents, occupancy, grid);
        if !report.commits().is_empty() {
            out.push(Command::CommitMoves {
                moves: report.commits().to_vec(),
                post,
            });
        }
        for agent in report.stun_fallbacks() {
            out.push(Command::StunAgent { agent });
        }
        report
    }

    /// Attempts a single voluntary step, returning whether it was accepted.
    pub fn try_step(
        &self,
        agent: AgentId,
        direction: Direction,
        agents: &AgentView,
        occupancy: OccupancyView<'_>,
        grid: GridView<'_>,
        out: &mut Vec<Command>,
    ) -> bool {
        let Some(snapshot) = agents.get(agent) else {
            return false;
        };
        let intent = MovementIntent::step(agent, snapshot.cell, direction);
        self.resolve(&[intent], PostMotion::Idle, agents, occupancy, grid, out)
            .accepted_count()
            == 1
    }
}

impl Default for MovementConflictResolver {
    fn default() -> Self {
        Self::from_config(&ArenaConfig::default())
    }
}
