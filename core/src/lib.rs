#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Grid Arena engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters and systems submit
//! [`Command`] values describing desired mutations, the world executes those
//! commands via its `apply` entry point, and then broadcasts [`Event`] values
//! for systems to react to deterministically. Movement requests travel as
//! [`MovementIntent`] batches and come back as a [`ResolutionReport`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Registers a new agent standing on the provided cell.
    SpawnAgent {
        /// Side the agent fights for.
        faction: Faction,
        /// Cell the agent should occupy once spawned.
        cell: CellCoord,
        /// Constant rendering bias applied on top of the cell centre.
        visual_offset: VisualOffset,
        /// Whether the agent should wander and chase on its own.
        autonomous: bool,
    },
    /// Removes an agent and releases its reservation.
    DespawnAgent {
        /// Identifier of the agent to remove.
        agent: AgentId,
    },
    /// Cracks the targeted cell.
    CrackCell {
        /// Cell hit by the damaging effect.
        cell: CellCoord,
    },
    /// Breaks the targeted cell.
    BreakCell {
        /// Cell hit by the damaging effect.
        cell: CellCoord,
    },
    /// Changes the category of a cell, deferring the change while it is damaged.
    SetCellCategory {
        /// Cell whose category changes.
        cell: CellCoord,
        /// Category the cell should adopt.
        category: Category,
    },
    /// Commits a resolved batch of moves in dependency order.
    CommitMoves {
        /// Moves to apply, blockers first.
        moves: Vec<PlannedMove>,
        /// State applied to each agent once its interpolation completes.
        post: PostMotion,
    },
    /// Stops an agent's in-flight interpolation and snaps it to its committed cell.
    InterruptAgent {
        /// Identifier of the agent to interrupt.
        agent: AgentId,
    },
    /// Immobilises an agent for the configured stun duration.
    StunAgent {
        /// Identifier of the agent to stun.
        agent: AgentId,
    },
    /// Enables or disables autonomous behaviour for an agent.
    SetAutonomous {
        /// Identifier of the agent to update.
        agent: AgentId,
        /// Whether autonomous behaviour should run for the agent.
        autonomous: bool,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that an agent was registered on the grid.
    AgentSpawned {
        /// Identifier assigned to the agent.
        agent: AgentId,
        /// Side the agent fights for.
        faction: Faction,
        /// Cell the agent occupies.
        cell: CellCoord,
    },
    /// Reports that a spawn request could not be honoured.
    SpawnRejected {
        /// Side of the agent that failed to spawn.
        faction: Faction,
        /// Requested cell.
        cell: CellCoord,
        /// Why the cell could not host the agent.
        reason: RejectionReason,
    },
    /// Confirms that an agent left the arena.
    AgentDespawned {
        /// Identifier of the removed agent.
        agent: AgentId,
        /// Cell whose reservation was released.
        cell: CellCoord,
    },
    /// Confirms that a planned move claimed its target cell.
    MoveCommitted {
        /// Identifier of the moving agent.
        agent: AgentId,
        /// Cell released by the agent.
        from: CellCoord,
        /// Cell reserved for the agent.
        to: CellCoord,
        /// Kind of movement being animated.
        kind: IntentKind,
    },
    /// Reports that a planned move was stale by the time it was committed.
    MoveRejected {
        /// Identifier of the agent that stays in place.
        agent: AgentId,
        /// Cell the agent keeps.
        from: CellCoord,
        /// Cell the agent failed to claim.
        to: CellCoord,
        /// Why the commit failed.
        reason: RejectionReason,
    },
    /// Confirms that an agent finished its interpolation.
    MoveCompleted {
        /// Identifier of the agent that arrived.
        agent: AgentId,
        /// Cell that became the agent's authoritative position.
        cell: CellCoord,
    },
    /// Confirms that an in-flight interpolation was cancelled.
    MoveInterrupted {
        /// Identifier of the interrupted agent.
        agent: AgentId,
        /// Cell the agent was snapped to.
        cell: CellCoord,
    },
    /// Confirms that an agent became stunned.
    AgentStunned {
        /// Identifier of the stunned agent.
        agent: AgentId,
    },
    /// Confirms that a stunned agent became idle again.
    AgentRecovered {
        /// Identifier of the recovered agent.
        agent: AgentId,
    },
    /// Confirms that a cell cracked.
    TileCracked {
        /// Damaged cell.
        cell: CellCoord,
        /// Rendering key the cell now uses.
        appearance: TileAppearance,
    },
    /// Confirms that a cell broke.
    TileBroken {
        /// Damaged cell.
        cell: CellCoord,
        /// Rendering key the cell now uses.
        appearance: TileAppearance,
    },
    /// Confirms that a damaged cell repaired itself.
    TileRepaired {
        /// Repaired cell.
        cell: CellCoord,
        /// Category the cell renders as after repair.
        category: Category,
    },
    /// Transient shake requested for rendering collaborators.
    TileShaken {
        /// Cell to shake.
        cell: CellCoord,
        /// Strength of the shake.
        intensity: ShakeIntensity,
    },
    /// Confirms a category change.
    CellCategoryChanged {
        /// Updated cell.
        cell: CellCoord,
        /// Category recorded for the cell.
        category: Category,
        /// Whether the change only becomes visible after repair.
        deferred: bool,
    },
    /// Reports a command that referenced an invalid cell or agent.
    CommandRejected {
        /// Error describing the failure.
        error: ArenaError,
    },
}

/// Side an agent fights for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Faction {
    /// Player-controlled unit living on the home side.
    Player,
    /// Hostile unit living on the enemy side.
    Hostile,
}

impl Faction {
    /// Reports whether agents of this faction may stand on the category.
    #[must_use]
    pub const fn may_enter(self, category: Category) -> bool {
        match (self, category) {
            (_, Category::Neutral) => true,
            (Self::Player, Category::Home) => true,
            (Self::Hostile, Category::Hostile) => true,
            _ => false,
        }
    }
}

/// Ownership category of a cell, fixed when the arena is laid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Cells belonging to the player side.
    Home,
    /// Cells belonging to the hostile side.
    Hostile,
    /// Cells open to both sides.
    Neutral,
}

/// Damage sub-state of a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageState {
    /// Undamaged.
    Intact,
    /// Cracked; still walkable.
    Cracked,
    /// Broken; movement may not end here.
    Broken,
}

/// Rendering key for a cell, qualified by the category it had when damaged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TileAppearance {
    /// Undamaged tile of the category.
    Intact(Category),
    /// Cracked tile of the category.
    Cracked(Category),
    /// Broken tile of the category.
    Broken(Category),
}

/// Strength of the shake emitted when a tile is damaged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShakeIntensity {
    /// Emitted when a tile cracks.
    Light,
    /// Emitted when a tile breaks.
    Heavy,
}

/// Motion status of an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MotionStatus {
    /// Standing still and free to act.
    Idle,
    /// Walking between two cells.
    Moving,
    /// Displaced by a pull or knockback.
    BeingPulled,
    /// Immobilised.
    Stunned,
}

impl MotionStatus {
    /// Reports whether the agent is animating between two cells.
    #[must_use]
    pub const fn in_motion(self) -> bool {
        matches!(self, Self::Moving | Self::BeingPulled)
    }
}

/// State an agent adopts after its interpolation completes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PostMotion {
    /// Return to idle, leaving autonomy untouched.
    #[default]
    Idle,
    /// Return to idle and re-enable autonomous wandering.
    Wander,
}

/// Cardinal directions used for every single-cell displacement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// Movement toward decreasing row indices.
    North,
    /// Movement toward increasing column indices.
    East,
    /// Movement toward increasing row indices.
    South,
    /// Movement toward decreasing column indices.
    West,
}

impl Direction {
    /// Column and row deltas of a single step.
    #[must_use]
    pub const fn delta(self) -> (i64, i64) {
        match self {
            Self::North => (0, -1),
            Self::East => (1, 0),
            Self::South => (0, 1),
            Self::West => (-1, 0),
        }
    }

    /// Direction pointing the other way.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::East => Self::West,
            Self::South => Self::North,
            Self::West => Self::East,
        }
    }
}

/// Unique identifier assigned to an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(u32);

impl AgentId {
    /// Creates a new agent identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Computes the Manhattan distance between two cell coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: CellCoord) -> u32 {
        self.column().abs_diff(other.column()) + self.row().abs_diff(other.row())
    }

    /// Cell one step away in the provided direction.
    ///
    /// Returns `None` when the step would leave the non-negative quadrant;
    /// callers still need to check the far edges against the grid bounds.
    #[must_use]
    pub fn neighbor(self, direction: Direction) -> Option<CellCoord> {
        match direction {
            Direction::North => self.row.checked_sub(1).map(|row| Self::new(self.column, row)),
            Direction::East => self
                .column
                .checked_add(1)
                .map(|column| Self::new(column, self.row)),
            Direction::South => self.row.checked_add(1).map(|row| Self::new(self.column, row)),
            Direction::West => self
                .column
                .checked_sub(1)
                .map(|column| Self::new(column, self.row)),
        }
    }

    /// Signed distance travelled along the direction to reach this cell from the origin.
    #[must_use]
    pub fn projection(self, direction: Direction) -> i64 {
        let (dx, dy) = direction.delta();
        i64::from(self.column) * dx + i64::from(self.row) * dy
    }
}

/// Constant sub-cell rendering bias of an agent, in world units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualOffset {
    /// Horizontal bias.
    pub x: f32,
    /// Vertical bias.
    pub y: f32,
}

impl VisualOffset {
    /// Creates a new offset.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Kind of single-cell displacement requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentKind {
    /// Voluntary walk.
    Step,
    /// Forced push away from a hit.
    Knockback,
    /// Forced drag toward the caster.
    Pull,
}

impl IntentKind {
    /// Reports whether the displacement is forced on the agent.
    #[must_use]
    pub const fn is_forced(self) -> bool {
        matches!(self, Self::Knockback | Self::Pull)
    }

    /// Motion status an agent adopts while the displacement animates.
    #[must_use]
    pub const fn motion_status(self) -> MotionStatus {
        match self {
            Self::Step => MotionStatus::Moving,
            Self::Knockback | Self::Pull => MotionStatus::BeingPulled,
        }
    }
}

/// Requested single-cell displacement awaiting resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MovementIntent {
    /// Agent that should move; `None` moves whoever stands on `source`.
    pub agent: Option<AgentId>,
    /// Cell the mover must stand on when the batch resolves.
    pub source: CellCoord,
    /// Direction of the displacement.
    pub direction: Direction,
    /// Kind of displacement.
    pub kind: IntentKind,
}

impl MovementIntent {
    /// Voluntary step of a known agent.
    #[must_use]
    pub const fn step(agent: AgentId, source: CellCoord, direction: Direction) -> Self {
        Self {
            agent: Some(agent),
            source,
            direction,
            kind: IntentKind::Step,
        }
    }

    /// Knockback of a known agent.
    #[must_use]
    pub const fn knockback(agent: AgentId, source: CellCoord, direction: Direction) -> Self {
        Self {
            agent: Some(agent),
            source,
            direction,
            kind: IntentKind::Knockback,
        }
    }

    /// Ambient pull of whoever stands on `source`.
    #[must_use]
    pub const fn pull(source: CellCoord, direction: Direction) -> Self {
        Self {
            agent: None,
            source,
            direction,
            kind: IntentKind::Pull,
        }
    }

    /// Cell the mover wants to reach.
    #[must_use]
    pub fn desired_cell(&self) -> Option<CellCoord> {
        self.source.neighbor(self.direction)
    }
}

/// Accepted move handed to the world for commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlannedMove {
    /// Agent being moved.
    pub agent: AgentId,
    /// Cell released by the agent.
    pub from: CellCoord,
    /// Cell reserved for the agent.
    pub to: CellCoord,
    /// Kind of displacement.
    pub kind: IntentKind,
}

/// Reasons a movement intent or spawn request may be turned down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectionReason {
    /// The source cell lies outside the grid.
    InvalidSource,
    /// The named agent is not registered.
    UnknownAgent,
    /// Nobody stands on the source cell of an ambient intent.
    NoOccupant,
    /// The agent does not stand on the intent's source cell.
    SourceMismatch,
    /// The agent is animating or stunned.
    AgentBusy,
    /// Another intent in the batch already moves the same source cell.
    DuplicateSource,
    /// The target cell lies outside the grid.
    OutOfBounds,
    /// The target cell is broken.
    TargetBroken,
    /// The agent's faction may not stand on the target category.
    Restricted,
    /// A non-participating agent holds the target cell.
    Occupied,
    /// Another accepted move in the batch already claimed the target.
    TargetClaimed,
    /// The agent holding the target could not move away.
    ChainBlocked,
    /// The intent is part of a mutual-block cycle.
    CycleRejected,
}

impl RejectionReason {
    /// Reports whether the rejection was caused by the target cell rather than the mover.
    #[must_use]
    pub const fn blocks_target(self) -> bool {
        matches!(
            self,
            Self::OutOfBounds
                | Self::TargetBroken
                | Self::Restricted
                | Self::Occupied
                | Self::TargetClaimed
                | Self::ChainBlocked
                | Self::CycleRejected
        )
    }
}

/// Alternative effect a caller should apply when a forced move is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Fallback {
    /// Stun the agent in place.
    Stun,
}

/// Result of resolving a single intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The move was accepted and committed.
    Accepted {
        /// Cell the agent ends on.
        final_cell: CellCoord,
    },
    /// The move was turned down; the agent stays where it was.
    Rejected {
        /// Why the move was refused.
        reason: RejectionReason,
        /// Effect the caller should apply instead, if any.
        fallback: Option<Fallback>,
    },
}

impl Outcome {
    /// Reports whether the outcome is an acceptance.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Outcome attached to the intent that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IntentOutcome {
    /// Intent as submitted.
    pub intent: MovementIntent,
    /// Agent the intent resolved to, when one could be identified.
    pub agent: Option<AgentId>,
    /// Resolution result.
    pub outcome: Outcome,
}

/// Per-intent outcome of a resolution batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolutionReport {
    outcomes: Vec<IntentOutcome>,
    commits: Vec<PlannedMove>,
    quiescence_timed_out: bool,
}

impl ResolutionReport {
    /// Creates a report from outcomes listed in intent order and moves listed in commit order.
    #[must_use]
    pub fn new(outcomes: Vec<IntentOutcome>, commits: Vec<PlannedMove>) -> Self {
        Self {
            outcomes,
            commits,
            quiescence_timed_out: false,
        }
    }

    /// Flags that the batch resolved after the quiescence gate timed out.
    pub fn mark_quiescence_timeout(&mut self) {
        self.quiescence_timed_out = true;
    }

    /// Reports whether the batch resolved with agents still in motion.
    #[must_use]
    pub const fn quiescence_timed_out(&self) -> bool {
        self.quiescence_timed_out
    }

    /// Outcomes in the order the intents were submitted.
    #[must_use]
    pub fn outcomes(&self) -> &[IntentOutcome] {
        &self.outcomes
    }

    /// Accepted moves in the order they must be committed.
    #[must_use]
    pub fn commits(&self) -> &[PlannedMove] {
        &self.commits
    }

    /// Agents of accepted moves in commit order.
    #[must_use]
    pub fn commit_order(&self) -> Vec<AgentId> {
        self.commits.iter().map(|planned| planned.agent).collect()
    }

    /// Outcome recorded for the provided agent, if it took part in the batch.
    #[must_use]
    pub fn outcome_for(&self, agent: AgentId) -> Option<Outcome> {
        self.outcomes
            .iter()
            .find(|entry| entry.agent == Some(agent))
            .map(|entry| entry.outcome)
    }

    /// Number of accepted intents.
    #[must_use]
    pub fn accepted_count(&self) -> usize {
        self.commits.len()
    }

    /// Agents whose rejection asks the caller to stun them instead.
    pub fn stun_fallbacks(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.outcomes.iter().filter_map(|entry| match entry.outcome {
            Outcome::Rejected {
                fallback: Some(Fallback::Stun),
                ..
            } => entry.agent,
            _ => None,
        })
    }
}

/// Errors raised by cell, reservation, and agent operations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ArenaError {
    /// The cell lies outside the grid bounds.
    #[error("cell ({}, {}) is outside the grid", .cell.column(), .cell.row())]
    InvalidPosition {
        /// Offending cell.
        cell: CellCoord,
    },
    /// Another agent already holds the cell.
    #[error(
        "cell ({}, {}) is reserved by agent {}",
        .cell.column(),
        .cell.row(),
        .holder.get()
    )]
    AlreadyReserved {
        /// Contested cell.
        cell: CellCoord,
        /// Current holder.
        holder: AgentId,
    },
    /// The agent must release its current cell before reserving another one.
    #[error(
        "agent {} still holds cell ({}, {})",
        .agent.get(),
        .cell.column(),
        .cell.row()
    )]
    AgentHoldsCell {
        /// Agent attempting the reservation.
        agent: AgentId,
        /// Cell the agent still holds.
        cell: CellCoord,
    },
    /// No live agent carries the identifier.
    #[error("agent {} is not registered", .0.get())]
    UnknownAgent(AgentId),
    /// Agents were still moving when the quiescence budget ran out.
    #[error("agents still in motion after waiting {waited:?}")]
    QuiescenceTimeout {
        /// Time spent waiting.
        waited: Duration,
    },
}

/// Shorthand result type for arena operations.
pub type ArenaResult<T> = Result<T, ArenaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manhattan_distance_matches_expectation() {
        let origin = CellCoord::new(1, 1);
        let destination = CellCoord::new(4, 3);
        assert_eq!(origin.manhattan_distance(destination), 5);
        assert_eq!(destination.manhattan_distance(origin), 5);
    }

    #[test]
    fn neighbor_refuses_to_underflow() {
        let corner = CellCoord::new(0, 0);
        assert_eq!(corner.neighbor(Direction::West), None);
        assert_eq!(corner.neighbor(Direction::North), None);
        assert_eq!(corner.neighbor(Direction::East), Some(CellCoord::new(1, 0)));
        assert_eq!(corner.neighbor(Direction::South), Some(CellCoord::new(0, 1)));
    }

    #[test]
    fn projection_grows_along_direction() {
        let near = CellCoord::new(4, 2);
        let far = CellCoord::new(3, 2);
        assert!(far.projection(Direction::West) > near.projection(Direction::West));
        assert!(near.projection(Direction::East) > far.projection(Direction::East));
    }

    #[test]
    fn factions_enter_own_side_and_neutral_ground() {
        assert!(Faction::Player.may_enter(Category::Home));
        assert!(Faction::Player.may_enter(Category::Neutral));
        assert!(!Faction::Player.may_enter(Category::Hostile));
        assert!(Faction::Hostile.may_enter(Category::Hostile));
        assert!(!Faction::Hostile.may_enter(Category::Home));
    }

    #[test]
    fn stun_fallbacks_lists_only_flagged_rejections() {
        let agent = AgentId::new(3);
        let other = AgentId::new(4);
        let report = ResolutionReport::new(
            vec![
                IntentOutcome {
                    intent: MovementIntent::knockback(agent, CellCoord::new(1, 1), Direction::East),
                    agent: Some(agent),
                    outcome: Outcome::Rejected {
                        reason: RejectionReason::TargetBroken,
                        fallback: Some(Fallback::Stun),
                    },
                },
                IntentOutcome {
                    intent: MovementIntent::step(other, CellCoord::new(2, 2), Direction::North),
                    agent: Some(other),
                    outcome: Outcome::Rejected {
                        reason: RejectionReason::Occupied,
                        fallback: None,
                    },
                },
            ],
            Vec::new(),
        );

        assert_eq!(report.stun_fallbacks().collect::<Vec<_>>(), vec![agent]);
        assert_eq!(report.accepted_count(), 0);
    }

    #[test]
    fn movement_intent_round_trips_through_bincode() {
        let intent = MovementIntent::pull(CellCoord::new(5, 1), Direction::West);
        let bytes = bincode::serialize(&intent).expect("serialize");
        let restored: MovementIntent = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(restored, intent);
    }

    #[test]
    fn errors_render_cell_coordinates() {
        let error = ArenaError::InvalidPosition {
            cell: CellCoord::new(9, 2),
        };
        assert_eq!(error.to_string(), "cell (9, 2) is outside the grid");
    }
}
