#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Straight-line chase behaviour for autonomous hostile agents.

use std::{collections::BTreeMap, time::Duration};

use grid_arena_core::{
    AgentId, CellCoord, DamageState, Direction, Event, Faction, MotionStatus, MovementIntent,
    PostMotion,
};
use grid_arena_system_resolver::{Batch, MovementConflictResolver};
use grid_arena_world::query::{AgentSnapshot, AgentView, GridView, OccupancyView};

const DEFAULT_STEP_INTERVAL: Duration = Duration::from_millis(500);

/// Pure system that walks autonomous hostiles toward the nearest player.
#[derive(Debug)]
pub struct Chase {
    step_interval: Duration,
    accumulated: BTreeMap<AgentId, Duration>,
}

impl Chase {
    /// Creates a chase system that lets each hostile step once per `step_interval`.
    #[must_use]
    pub fn new(step_interval: Duration) -> Self {
        Self {
            step_interval,
            accumulated: BTreeMap::new(),
        }
    }

    /// Consumes world events and views, queueing the due chase steps as one batch.
    ///
    /// Steps are planned only while the resolver's queue is empty, so they
    /// never race another batch for the same cells. Hostiles that come due
    /// while other work is queued keep their elapsed time and step once the
    /// queue drains. Returns the number of intents submitted.
    pub fn handle(
        &mut self,
        events: &[Event],
        agents: &AgentView,
        occupancy: OccupancyView<'_>,
        grid: GridView<'_>,
        resolver: &mut MovementConflictResolver,
    ) -> usize {
        let dt = events
            .iter()
            .filter_map(|event| match event {
                Event::TimeAdvanced { dt } => Some(*dt),
                _ => None,
            })
            .fold(Duration::ZERO, Duration::saturating_add);
        if dt.is_zero() {
            return 0;
        }

        self.accumulated
            .retain(|agent, _| agents.get(*agent).is_some_and(is_chaser));
        let deferred = resolver.pending() > 0;

        let players: Vec<&AgentSnapshot> = agents
            .iter()
            .filter(|snapshot| snapshot.faction == Faction::Player)
            .collect();

        let mut intents = Vec::new();
        for hunter in agents.iter().filter(|snapshot| is_chaser(snapshot)) {
            let accumulated = self.accumulated.entry(hunter.id).or_default();
            *accumulated = accumulated.saturating_add(dt);
            if deferred || hunter.status != MotionStatus::Idle || *accumulated < self.step_interval
            {
                continue;
            }
            *accumulated = Duration::ZERO;

            let Some(prey) = nearest(hunter.cell, &players) else {
                continue;
            };
            if hunter.cell.manhattan_distance(prey.cell) <= 1 {
                continue;
            }
            let direction = preferred_directions(hunter.cell, prey.cell)
                .into_iter()
                .flatten()
                .find(|direction| is_open(hunter, *direction, agents, occupancy, grid));
            if let Some(direction) = direction {
                intents.push(MovementIntent::step(hunter.id, hunter.cell, direction));
            }
        }

        let submitted = intents.len();
        if submitted > 0 {
            resolver.submit(Batch::Intents(intents), PostMotion::Idle);
        }
        submitted
    }
}

impl Default for Chase {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_INTERVAL)
    }
}

fn is_chaser(snapshot: &AgentSnapshot) -> bool {
    snapshot.faction == Faction::Hostile
        && snapshot.autonomous
        && snapshot.status != MotionStatus::Stunned
}

fn nearest<'a>(from: CellCoord, players: &[&'a AgentSnapshot]) -> Option<&'a AgentSnapshot> {
    players
        .iter()
        .copied()
        .min_by_key(|player| (from.manhattan_distance(player.cell), player.id))
}

/// Directions that shorten the straight line toward `to`, longer axis first.
fn preferred_directions(from: CellCoord, to: CellCoord) -> [Option<Direction>; 2] {
    let horizontal = match to.column().cmp(&from.column()) {
        std::cmp::Ordering::Greater => Some(Direction::East),
        std::cmp::Ordering::Less => Some(Direction::West),
        std::cmp::Ordering::Equal => None,
    };
    let vertical = match to.row().cmp(&from.row()) {
        std::cmp::Ordering::Greater => Some(Direction::South),
        std::cmp::Ordering::Less => Some(Direction::North),
        std::cmp::Ordering::Equal => None,
    };

    if from.column().abs_diff(to.column()) >= from.row().abs_diff(to.row()) {
        [horizontal, vertical]
    } else {
        [vertical, horizontal]
    }
}

/// Reports whether the neighbouring cell can be entered this tick.
///
/// Cells held by another chaser count as open; the resolver orders the chain.
fn is_open(
    hunter: &AgentSnapshot,
    direction: Direction,
    agents: &AgentView,
    occupancy: OccupancyView<'_>,
    grid: GridView<'_>,
) -> bool {
    let Some(cell) = hunter.cell.neighbor(direction) else {
        return false;
    };
    if !grid.contains(cell) {
        return false;
    }
    if let Some(holder) = occupancy.occupant(cell) {
        if !agents.get(holder).is_some_and(is_chaser) {
            return false;
        }
    }
    if grid.damage_state(cell) != Ok(DamageState::Intact) {
        return false;
    }
    grid.category(cell)
        .map_or(false, |category| hunter.faction.may_enter(category))
}
