#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Grid Arena.
//!
//! The world owns the cell grid, the reservation ledger, the agent registry,
//! and the motion controller. Every mutation arrives as a [`Command`] through
//! [`apply`]; read access goes through the [`query`] module.

pub mod config;
pub mod geometry;
pub mod grid;
pub mod motion;
pub mod occupancy;
pub mod registry;

use std::time::Duration;

use glam::Vec2;
use grid_arena_core::{
    AgentId, ArenaError, CellCoord, Command, DamageState, Event, Faction, MotionStatus,
    PlannedMove, PostMotion, RejectionReason, VisualOffset,
};

pub use config::{ArenaConfig, ConfigError};
use geometry::ArenaGeometry;
use grid::GridState;
use motion::AgentMotionController;
use occupancy::OccupancyTracker;
use registry::AgentRegistry;

/// Represents the authoritative arena state.
#[derive(Debug)]
pub struct World {
    config: ArenaConfig,
    grid: GridState,
    occupancy: OccupancyTracker,
    agents: AgentRegistry,
    motion: AgentMotionController,
    geometry: ArenaGeometry,
    clock: Duration,
    tick_index: u64,
}

impl World {
    /// Creates a new arena using the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::build(ArenaConfig::default())
    }

    /// Creates a new arena from a validated configuration.
    pub fn with_config(config: ArenaConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: ArenaConfig) -> Self {
        let grid = GridState::new(
            config.columns,
            config.rows,
            config.cracked_duration,
            config.broken_duration,
        );
        let geometry = ArenaGeometry::new(config.columns, config.rows, config.tile_length, Vec2::ZERO);
        Self {
            grid,
            occupancy: OccupancyTracker::new(config.columns, config.rows),
            agents: AgentRegistry::new(),
            motion: AgentMotionController::new(),
            geometry,
            clock: Duration::ZERO,
            tick_index: 0,
            config,
        }
    }

    fn advance_time(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        self.tick_index = self.tick_index.saturating_add(1);
        self.clock = self.clock.saturating_add(dt);
        out_events.push(Event::TimeAdvanced { dt });

        for arrival in self.motion.advance(dt, &mut self.agents, &self.occupancy) {
            out_events.push(Event::MoveCompleted {
                agent: arrival.agent,
                cell: arrival.cell,
            });
        }

        for agent in self.agents.iter_mut() {
            if agent.advance_stun(dt) {
                out_events.push(Event::AgentRecovered { agent: agent.id });
            }
        }

        for (cell, category) in self.grid.repair_tick(self.clock) {
            out_events.push(Event::TileRepaired { cell, category });
        }
    }

    fn spawn(
        &mut self,
        faction: Faction,
        cell: CellCoord,
        visual_offset: VisualOffset,
        autonomous: bool,
    ) -> Result<AgentId, RejectionReason> {
        let category = self
            .grid
            .category(cell)
            .map_err(|_| RejectionReason::OutOfBounds)?;
        if !faction.may_enter(category) {
            return Err(RejectionReason::Restricted);
        }
        if self.grid.damage_state(cell) == Ok(DamageState::Broken) {
            return Err(RejectionReason::TargetBroken);
        }
        if self.occupancy.is_occupied(cell) {
            return Err(RejectionReason::Occupied);
        }

        let agent = self.agents.register(faction, cell, visual_offset, autonomous);
        if let Err(error) = self.occupancy.reserve(cell, agent) {
            log::warn!("spawn reservation failed: {error}");
            let _ = self.agents.unregister(agent);
            return Err(RejectionReason::Occupied);
        }
        Ok(agent)
    }

    fn despawn(&mut self, agent: AgentId) -> Result<CellCoord, ArenaError> {
        let record = self
            .agents
            .unregister(agent)
            .ok_or(ArenaError::UnknownAgent(agent))?;
        let _ = self.motion.cancel(agent);
        Ok(self.occupancy.release_agent(agent).unwrap_or(record.cell))
    }

    fn commit(&mut self, planned: PlannedMove, post: PostMotion) -> Result<(), RejectionReason> {
        let agent = self
            .agents
            .get(planned.agent)
            .ok_or(RejectionReason::UnknownAgent)?;
        if agent.status != MotionStatus::Idle {
            return Err(RejectionReason::AgentBusy);
        }
        if agent.cell != planned.from || self.occupancy.cell_of(planned.agent) != Some(planned.from)
        {
            return Err(RejectionReason::SourceMismatch);
        }
        match self.grid.damage_state(planned.to) {
            Err(_) => return Err(RejectionReason::OutOfBounds),
            Ok(DamageState::Broken) => return Err(RejectionReason::TargetBroken),
            Ok(_) => {}
        }
        if self.occupancy.is_occupied(planned.to) {
            return Err(RejectionReason::Occupied);
        }

        let _ = self.occupancy.release(planned.from, planned.agent);
        if let Err(error) = self.occupancy.reserve(planned.to, planned.agent) {
            log::warn!("commit of agent {} failed: {error}", planned.agent.get());
            let _ = self.occupancy.reserve(planned.from, planned.agent);
            return Err(RejectionReason::Occupied);
        }

        if let Some(record) = self.agents.get_mut(planned.agent) {
            record.status = planned.kind.motion_status();
        }
        self.motion.begin(
            planned.agent,
            planned.from,
            planned.to,
            planned.kind,
            post,
            self.config.motion_duration(planned.kind),
        );
        Ok(())
    }

    fn interrupt(&mut self, agent: AgentId, out_events: &mut Vec<Event>) {
        if let Some(cell) = self
            .motion
            .interrupt(agent, &mut self.agents, &mut self.occupancy)
        {
            out_events.push(Event::MoveInterrupted { agent, cell });
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick { dt } => world.advance_time(dt, out_events),
        Command::SpawnAgent {
            faction,
            cell,
            visual_offset,
            autonomous,
        } => match world.spawn(faction, cell, visual_offset, autonomous) {
            Ok(agent) => out_events.push(Event::AgentSpawned {
                agent,
                faction,
                cell,
            }),
            Err(reason) => out_events.push(Event::SpawnRejected {
                faction,
                cell,
                reason,
            }),
        },
        Command::DespawnAgent { agent } => match world.despawn(agent) {
            Ok(cell) => out_events.push(Event::AgentDespawned { agent, cell }),
            Err(error) => out_events.push(Event::CommandRejected { error }),
        },
        Command::CrackCell { cell } => match world.grid.crack(cell, world.clock) {
            Ok(Some(damage)) => {
                out_events.push(Event::TileCracked {
                    cell,
                    appearance: damage.appearance,
                });
                out_events.push(Event::TileShaken {
                    cell,
                    intensity: damage.shake,
                });
            }
            Ok(None) => {}
            Err(error) => out_events.push(Event::CommandRejected { error }),
        },
        Command::BreakCell { cell } => match world.grid.break_cell(cell, world.clock) {
            Ok(damage) => {
                out_events.push(Event::TileBroken {
                    cell,
                    appearance: damage.appearance,
                });
                out_events.push(Event::TileShaken {
                    cell,
                    intensity: damage.shake,
                });
            }
            Err(error) => out_events.push(Event::CommandRejected { error }),
        },
        Command::SetCellCategory { cell, category } => {
            match world.grid.set_category(cell, category) {
                Ok(deferred) => out_events.push(Event::CellCategoryChanged {
                    cell,
                    category,
                    deferred,
                }),
                Err(error) => out_events.push(Event::CommandRejected { error }),
            }
        }
        Command::CommitMoves { moves, post } => {
            log::debug!("committing {} move(s)", moves.len());
            for planned in moves {
                match world.commit(planned, post) {
                    Ok(()) => out_events.push(Event::MoveCommitted {
                        agent: planned.agent,
                        from: planned.from,
                        to: planned.to,
                        kind: planned.kind,
                    }),
                    Err(reason) => {
                        log::debug!(
                            "move of agent {} rejected at commit: {reason:?}",
                            planned.agent.get()
                        );
                        out_events.push(Event::MoveRejected {
                            agent: planned.agent,
                            from: planned.from,
                            to: planned.to,
                            reason,
                        });
                    }
                }
            }
        }
        Command::InterruptAgent { agent } => {
            if world.agents.get(agent).is_none() {
                out_events.push(Event::CommandRejected {
                    error: ArenaError::UnknownAgent(agent),
                });
                return;
            }
            world.interrupt(agent, out_events);
        }
        Command::StunAgent { agent } => {
            if world.agents.get(agent).is_none() {
                out_events.push(Event::CommandRejected {
                    error: ArenaError::UnknownAgent(agent),
                });
                return;
            }
            world.interrupt(agent, out_events);
            let stun_duration = world.config.stun_duration;
            if let Some(record) = world.agents.get_mut(agent) {
                record.stun(stun_duration);
                out_events.push(Event::AgentStunned { agent });
            }
        }
        Command::SetAutonomous { agent, autonomous } => match world.agents.get_mut(agent) {
            Some(record) => record.autonomous = autonomous,
            None => out_events.push(Event::CommandRejected {
                error: ArenaError::UnknownAgent(agent),
            }),
        },
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use glam::Vec2;
    use grid_arena_core::{
        AgentId, ArenaResult, CellCoord, Category, DamageState, Faction, MotionStatus,
        TileAppearance, VisualOffset,
    };

    use super::{grid::GridState, occupancy::OccupancyTracker, ArenaConfig, World};

    /// Configuration the world was built with.
    #[must_use]
    pub fn config(world: &World) -> &ArenaConfig {
        &world.config
    }

    /// Simulated time elapsed since the world was created.
    #[must_use]
    pub fn clock(world: &World) -> Duration {
        world.clock
    }

    /// Number of ticks processed so far.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Provides the grid dimensions as `(columns, rows)`.
    #[must_use]
    pub fn dimensions(world: &World) -> (u32, u32) {
        world.grid.dimensions()
    }

    /// Category of the cell.
    pub fn category(world: &World, cell: CellCoord) -> ArenaResult<Category> {
        world.grid.category(cell)
    }

    /// Damage sub-state of the cell.
    pub fn damage_state(world: &World, cell: CellCoord) -> ArenaResult<DamageState> {
        world.grid.damage_state(cell)
    }

    /// Rendering key of the cell.
    pub fn appearance(world: &World, cell: CellCoord) -> ArenaResult<TileAppearance> {
        world.grid.appearance(cell)
    }

    /// Time at which the cell repairs itself, if it is damaged.
    pub fn repair_deadline(world: &World, cell: CellCoord) -> ArenaResult<Option<Duration>> {
        world.grid.repair_deadline(cell)
    }

    /// Reports whether any agent holds the cell.
    #[must_use]
    pub fn is_occupied(world: &World, cell: CellCoord) -> bool {
        world.occupancy.is_occupied(cell)
    }

    /// Agent holding the cell, if any.
    #[must_use]
    pub fn occupant(world: &World, cell: CellCoord) -> Option<AgentId> {
        world.occupancy.occupant(cell)
    }

    /// Authoritative cell of the agent.
    #[must_use]
    pub fn agent_cell(world: &World, agent: AgentId) -> Option<CellCoord> {
        world.agents.get(agent).map(|record| record.cell)
    }

    /// Snapshot of a single agent.
    #[must_use]
    pub fn agent(world: &World, agent: AgentId) -> Option<AgentSnapshot> {
        world.agents.get(agent).map(|record| AgentSnapshot {
            id: record.id,
            faction: record.faction,
            cell: record.cell,
            status: record.status,
            autonomous: record.autonomous,
            visual_offset: record.visual_offset,
        })
    }

    /// Captures a read-only view of every live agent.
    #[must_use]
    pub fn agent_view(world: &World) -> AgentView {
        AgentView::from_snapshots(
            world
                .agents
                .iter()
                .map(|record| AgentSnapshot {
                    id: record.id,
                    faction: record.faction,
                    cell: record.cell,
                    status: record.status,
                    autonomous: record.autonomous,
                    visual_offset: record.visual_offset,
                })
                .collect(),
        )
    }

    /// Exposes a read-only view of the reservation ledger.
    #[must_use]
    pub fn occupancy_view(world: &World) -> OccupancyView<'_> {
        OccupancyView {
            tracker: &world.occupancy,
        }
    }

    /// Exposes a read-only view of the cell grid.
    #[must_use]
    pub fn grid_view(world: &World) -> GridView<'_> {
        GridView { grid: &world.grid }
    }

    /// World-space centre of the cell.
    #[must_use]
    pub fn world_position(world: &World, cell: CellCoord) -> Vec2 {
        world.geometry.world_position(cell)
    }

    /// Cell containing the world-space position, if any.
    #[must_use]
    pub fn cell_from_world_position(world: &World, position: Vec2) -> Option<CellCoord> {
        world.geometry.cell_from_world_position(position)
    }

    /// Where the agent should be drawn, including its visual offset.
    #[must_use]
    pub fn rendered_position(world: &World, agent: AgentId) -> Option<Vec2> {
        let record = world.agents.get(agent)?;
        let position = match world.motion.motion(agent) {
            Some(motion) => world.geometry.interpolate(
                motion.from,
                motion.to,
                motion.progress(),
                record.visual_offset,
            ),
            None => world.geometry.interpolate(
                record.cell,
                record.cell,
                1.0,
                record.visual_offset,
            ),
        };
        Some(position)
    }

    /// Fraction of the agent's current interpolation completed, if it is moving.
    #[must_use]
    pub fn motion_progress(world: &World, agent: AgentId) -> Option<f32> {
        world.motion.motion(agent).map(|motion| motion.progress())
    }

    /// Immutable representation of a single agent used for queries.
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub struct AgentSnapshot {
        /// Unique identifier assigned to the agent.
        pub id: AgentId,
        /// Side the agent fights for.
        pub faction: Faction,
        /// Last fully committed cell.
        pub cell: CellCoord,
        /// Current motion status.
        pub status: MotionStatus,
        /// Whether autonomous behaviour drives the agent.
        pub autonomous: bool,
        /// Constant rendering bias.
        pub visual_offset: VisualOffset,
    }

    /// Read-only snapshot describing all agents in the arena.
    #[derive(Clone, Debug, Default)]
    pub struct AgentView {
        snapshots: Vec<AgentSnapshot>,
    }

    impl AgentView {
        /// Creates a view from the provided snapshots, sorted by identifier.
        #[must_use]
        pub fn from_snapshots(mut snapshots: Vec<AgentSnapshot>) -> Self {
            snapshots.sort_by_key(|snapshot| snapshot.id);
            Self { snapshots }
        }

        /// Iterator over the captured snapshots in deterministic order.
        pub fn iter(&self) -> impl Iterator<Item = &AgentSnapshot> {
            self.snapshots.iter()
        }

        /// Snapshot of the agent, if it is alive.
        #[must_use]
        pub fn get(&self, agent: AgentId) -> Option<&AgentSnapshot> {
            self.snapshots
                .binary_search_by_key(&agent, |snapshot| snapshot.id)
                .ok()
                .and_then(|index| self.snapshots.get(index))
        }

        /// Reports whether no agent is animating between cells.
        #[must_use]
        pub fn is_quiescent(&self) -> bool {
            self.snapshots
                .iter()
                .all(|snapshot| !snapshot.status.in_motion())
        }

        /// Number of agents captured.
        #[must_use]
        pub fn len(&self) -> usize {
            self.snapshots.len()
        }

        /// Reports whether the view holds no agent.
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.snapshots.is_empty()
        }

        /// Consumes the view, yielding the underlying snapshots.
        #[must_use]
        pub fn into_vec(self) -> Vec<AgentSnapshot> {
            self.snapshots
        }
    }

    /// Read-only view into the reservation ledger.
    #[derive(Clone, Copy, Debug)]
    pub struct OccupancyView<'a> {
        tracker: &'a OccupancyTracker,
    }

    impl<'a> OccupancyView<'a> {
        /// Returns the agent holding the provided cell, if any.
        #[must_use]
        pub fn occupant(&self, cell: CellCoord) -> Option<AgentId> {
            self.tracker.occupant(cell)
        }

        /// Reports whether any agent holds the cell.
        #[must_use]
        pub fn is_occupied(&self, cell: CellCoord) -> bool {
            self.tracker.is_occupied(cell)
        }

        /// Cell the agent holds, if any.
        #[must_use]
        pub fn cell_of(&self, agent: AgentId) -> Option<CellCoord> {
            self.tracker.cell_of(agent)
        }

        /// Returns an iterator over all cells in row-major order.
        pub fn iter(&self) -> impl Iterator<Item = Option<AgentId>> + 'a {
            self.tracker.cells().iter().copied()
        }

        /// Provides the dimensions of the underlying ledger.
        #[must_use]
        pub fn dimensions(&self) -> (u32, u32) {
            self.tracker.dimensions()
        }
    }

    /// Read-only view into the cell grid.
    #[derive(Clone, Copy, Debug)]
    pub struct GridView<'a> {
        grid: &'a GridState,
    }

    impl<'a> GridView<'a> {
        /// Reports whether the cell lies within the grid.
        #[must_use]
        pub fn contains(&self, cell: CellCoord) -> bool {
            self.grid.contains(cell)
        }

        /// Category of the cell.
        pub fn category(&self, cell: CellCoord) -> ArenaResult<Category> {
            self.grid.category(cell)
        }

        /// Damage sub-state of the cell.
        pub fn damage_state(&self, cell: CellCoord) -> ArenaResult<DamageState> {
            self.grid.damage_state(cell)
        }

        /// Iterates over every cell with its category and damage state.
        pub fn iter(&self) -> impl Iterator<Item = (CellCoord, Category, DamageState)> + 'a {
            self.grid.iter()
        }

        /// Provides the grid dimensions as `(columns, rows)`.
        #[must_use]
        pub fn dimensions(&self) -> (u32, u32) {
            self.grid.dimensions()
        }
    }
}
