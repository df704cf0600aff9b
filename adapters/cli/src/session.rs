//! Host loop that drives the world and its systems for a scripted session.

use std::time::Duration;

use anyhow::{bail, Result};
use grid_arena_core::{
    AgentId, CellCoord, Command, DamageState, Event, Faction, MotionStatus, MovementIntent,
    PostMotion, ResolutionReport, VisualOffset,
};
use grid_arena_system_chase::Chase;
use grid_arena_system_resolver::{Batch, MovementConflictResolver};
use grid_arena_world::{self as world, query, ArenaConfig, World};

const SETTLE_STEP: Duration = Duration::from_millis(50);
const SETTLE_LIMIT: usize = 200;

/// Owns the world and pumps every system after each command.
#[derive(Debug)]
pub(crate) struct Session {
    world: World,
    resolver: MovementConflictResolver,
    chase: Chase,
}

impl Session {
    /// Builds a session from a validated configuration.
    pub(crate) fn new(config: ArenaConfig) -> Result<Self> {
        let resolver = MovementConflictResolver::from_config(&config);
        let chase = Chase::new(config.step_duration.saturating_mul(2));
        let world = World::with_config(config)?;
        Ok(Self {
            world,
            resolver,
            chase,
        })
    }

    pub(crate) fn world(&self) -> &World {
        &self.world
    }

    /// Applies the command and lets the systems react to the resulting events.
    pub(crate) fn apply(&mut self, command: Command) -> (Vec<Event>, Vec<ResolutionReport>) {
        let mut events = Vec::new();
        world::apply(&mut self.world, command, &mut events);
        let mut log = events.clone();
        let reports = self.pump(events, &mut log);
        (log, reports)
    }

    pub(crate) fn spawn(&mut self, faction: Faction, column: u32, row: u32) -> Result<AgentId> {
        let cell = CellCoord::new(column, row);
        let (events, _) = self.apply(Command::SpawnAgent {
            faction,
            cell,
            visual_offset: VisualOffset::new(0.0, -0.2),
            autonomous: false,
        });
        for event in events {
            match event {
                Event::AgentSpawned { agent, .. } => return Ok(agent),
                Event::SpawnRejected { reason, .. } => {
                    bail!(
                        "cannot spawn {faction:?} at ({}, {}): {reason:?}",
                        cell.column(),
                        cell.row()
                    )
                }
                _ => {}
            }
        }
        bail!("spawn at ({}, {}) produced no outcome", cell.column(), cell.row())
    }

    pub(crate) fn submit(&mut self, batch: Batch, post: PostMotion) {
        self.resolver.submit(batch, post);
    }

    /// Resolves the intents immediately and commits the accepted moves.
    pub(crate) fn resolve(&mut self, intents: &[MovementIntent]) -> ResolutionReport {
        let mut commands = Vec::new();
        let agents = query::agent_view(&self.world);
        let report = self.resolver.resolve(
            intents,
            PostMotion::Idle,
            &agents,
            query::occupancy_view(&self.world),
            query::grid_view(&self.world),
            &mut commands,
        );
        for command in commands {
            let _ = self.apply(command);
        }
        report
    }

    /// Advances time by `dt`, returning the reports of every batch resolved meanwhile.
    pub(crate) fn advance(&mut self, dt: Duration) -> Vec<ResolutionReport> {
        self.apply(Command::Tick { dt }).1
    }

    /// Advances time until no agent is animating and no batch is queued.
    pub(crate) fn settle(&mut self) -> Vec<ResolutionReport> {
        let mut reports = Vec::new();
        for _ in 0..SETTLE_LIMIT {
            if self.resolver.pending() == 0 && query::agent_view(&self.world).is_quiescent() {
                break;
            }
            reports.extend(self.advance(SETTLE_STEP));
        }
        reports
    }

    fn pump(&mut self, mut events: Vec<Event>, log: &mut Vec<Event>) -> Vec<ResolutionReport> {
        let mut reports = Vec::new();
        loop {
            let agents = query::agent_view(&self.world);
            let submitted = self.chase.handle(
                &events,
                &agents,
                query::occupancy_view(&self.world),
                query::grid_view(&self.world),
                &mut self.resolver,
            );
            if submitted > 0 {
                log::trace!("chase queued {submitted} step(s)");
            }

            let mut commands = Vec::new();
            reports.extend(self.resolver.handle(
                &events,
                &agents,
                query::occupancy_view(&self.world),
                query::grid_view(&self.world),
                &mut commands,
            ));

            if commands.is_empty() {
                break;
            }

            events.clear();
            for command in commands {
                let mut generated = Vec::new();
                world::apply(&mut self.world, command, &mut generated);
                log.extend(generated.iter().cloned());
                events.extend(generated);
            }
        }
        reports
    }
}

/// Renders the grid as text: one character per cell, agents drawn on top.
pub(crate) fn render(world: &World) -> String {
    let (columns, rows) = query::dimensions(world);
    let mut output = String::new();
    for row in 0..rows {
        for column in 0..columns {
            let cell = CellCoord::new(column, row);
            output.push(glyph(world, cell));
        }
        output.push('\n');
    }
    output
}

fn glyph(world: &World, cell: CellCoord) -> char {
    if let Some(agent) = query::occupant(world, cell).and_then(|agent| query::agent(world, agent))
    {
        let symbol = match agent.faction {
            Faction::Player => 'P',
            Faction::Hostile => 'H',
        };
        return match agent.status {
            MotionStatus::Stunned => symbol.to_ascii_lowercase(),
            _ => symbol,
        };
    }

    match query::damage_state(world, cell) {
        Ok(DamageState::Cracked) => '~',
        Ok(DamageState::Broken) => '#',
        _ => match query::category(world, cell) {
            Ok(grid_arena_core::Category::Home) => '.',
            Ok(grid_arena_core::Category::Hostile) => ',',
            Ok(grid_arena_core::Category::Neutral) => ':',
            Err(_) => ' ',
        },
    }
}
