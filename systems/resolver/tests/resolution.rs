use std::{collections::BTreeSet, time::Duration};

use grid_arena_core::{
    AgentId, CellCoord, Command, Direction, Event, Fallback, Faction, MotionStatus,
    MovementIntent, Outcome, PostMotion, RejectionReason, ResolutionReport, VisualOffset,
};
use grid_arena_system_resolver::{Batch, MovementConflictResolver, PullEffect};
use grid_arena_world::{self as world, query, ArenaConfig, World};

fn arena(columns: u32, rows: u32) -> World {
    World::with_config(ArenaConfig {
        columns,
        rows,
        ..ArenaConfig::default()
    })
    .expect("valid config")
}

fn spawn(world: &mut World, faction: Faction, column: u32, row: u32) -> AgentId {
    let mut events = Vec::new();
    world::apply(
        world,
        Command::SpawnAgent {
            faction,
            cell: CellCoord::new(column, row),
            visual_offset: VisualOffset::default(),
            autonomous: false,
        },
        &mut events,
    );
    match events.as_slice() {
        [Event::AgentSpawned { agent, .. }] => *agent,
        other => panic!("spawn failed: {other:?}"),
    }
}

fn apply_all(world: &mut World, commands: Vec<Command>) -> Vec<Event> {
    let mut events = Vec::new();
    for command in commands {
        world::apply(world, command, &mut events);
    }
    events
}

fn resolve_now(
    world: &mut World,
    resolver: &MovementConflictResolver,
    intents: &[MovementIntent],
) -> (ResolutionReport, Vec<Event>) {
    let mut commands = Vec::new();
    let agents = query::agent_view(world);
    let report = resolver.resolve(
        intents,
        PostMotion::Idle,
        &agents,
        query::occupancy_view(world),
        query::grid_view(world),
        &mut commands,
    );
    let events = apply_all(world, commands);
    assert_exclusive(world);
    (report, events)
}

fn tick(
    world: &mut World,
    resolver: &mut MovementConflictResolver,
    millis: u64,
) -> Vec<ResolutionReport> {
    let mut events = Vec::new();
    world::apply(
        world,
        Command::Tick {
            dt: Duration::from_millis(millis),
        },
        &mut events,
    );

    let mut reports = Vec::new();
    loop {
        let mut commands = Vec::new();
        let agents = query::agent_view(world);
        let report = resolver.handle(
            &events,
            &agents,
            query::occupancy_view(world),
            query::grid_view(world),
            &mut commands,
        );
        let Some(report) = report else {
            break;
        };
        reports.push(report);
        events = apply_all(world, commands);
    }
    assert_exclusive(world);
    reports
}

fn assert_exclusive(world: &World) {
    let held: Vec<AgentId> = query::occupancy_view(world).iter().flatten().collect();
    let unique: BTreeSet<AgentId> = held.iter().copied().collect();
    assert_eq!(held.len(), unique.len(), "agent holds more than one cell");
    for agent in unique {
        let cell = query::occupancy_view(world).cell_of(agent).expect("indexed");
        assert_eq!(query::occupant(world, cell), Some(agent));
    }
}

fn rejection(report: &ResolutionReport, agent: AgentId) -> Option<RejectionReason> {
    match report.outcome_for(agent) {
        Some(Outcome::Rejected { reason, .. }) => Some(reason),
        _ => None,
    }
}

#[test]
fn pulled_chain_commits_front_first() {
    let mut world = arena(12, 4);
    let resolver = MovementConflictResolver::default();
    let a3 = spawn(&mut world, Faction::Player, 3, 1);
    let a4 = spawn(&mut world, Faction::Player, 4, 1);
    let a5 = spawn(&mut world, Faction::Player, 5, 1);

    let intents = [
        MovementIntent::pull(CellCoord::new(5, 1), Direction::West),
        MovementIntent::pull(CellCoord::new(4, 1), Direction::West),
        MovementIntent::pull(CellCoord::new(3, 1), Direction::West),
    ];
    let (report, events) = resolve_now(&mut world, &resolver, &intents);

    assert_eq!(report.commit_order(), vec![a3, a4, a5]);
    assert_eq!(
        report.outcome_for(a5),
        Some(Outcome::Accepted {
            final_cell: CellCoord::new(4, 1),
        })
    );
    assert_eq!(
        events
            .iter()
            .filter(|event| matches!(event, Event::MoveCommitted { .. }))
            .count(),
        3
    );
    assert_eq!(query::occupant(&world, CellCoord::new(2, 1)), Some(a3));
    assert!(!query::is_occupied(&world, CellCoord::new(5, 1)));

    let mut resolver = resolver;
    let _ = tick(&mut world, &mut resolver, 300);
    assert_eq!(query::agent_cell(&world, a3), Some(CellCoord::new(2, 1)));
    assert_eq!(query::agent_cell(&world, a4), Some(CellCoord::new(3, 1)));
    assert_eq!(query::agent_cell(&world, a5), Some(CellCoord::new(4, 1)));
    assert!(query::agent_view(&world).is_quiescent());
}

#[test]
fn mutual_blockers_are_rejected_and_stay_put() {
    let mut world = arena(12, 4);
    let resolver = MovementConflictResolver::default();
    let left = spawn(&mut world, Faction::Player, 1, 1);
    let right = spawn(&mut world, Faction::Player, 2, 1);

    let intents = [
        MovementIntent::step(left, CellCoord::new(1, 1), Direction::East),
        MovementIntent::step(right, CellCoord::new(2, 1), Direction::West),
    ];
    let (report, events) = resolve_now(&mut world, &resolver, &intents);

    assert_eq!(rejection(&report, left), Some(RejectionReason::CycleRejected));
    assert_eq!(rejection(&report, right), Some(RejectionReason::CycleRejected));
    assert!(report.commits().is_empty());
    assert!(events.is_empty());
    assert_eq!(query::occupant(&world, CellCoord::new(1, 1)), Some(left));
    assert_eq!(query::occupant(&world, CellCoord::new(2, 1)), Some(right));
}

#[test]
fn rotation_cycle_blocks_agents_queued_behind_it() {
    let mut world = arena(12, 4);
    let resolver = MovementConflictResolver::default();
    let a = spawn(&mut world, Faction::Player, 0, 0);
    let b = spawn(&mut world, Faction::Player, 1, 0);
    let c = spawn(&mut world, Faction::Player, 1, 1);
    let d = spawn(&mut world, Faction::Player, 0, 1);
    let follower = spawn(&mut world, Faction::Player, 2, 0);

    let intents = [
        MovementIntent::step(follower, CellCoord::new(2, 0), Direction::West),
        MovementIntent::step(a, CellCoord::new(0, 0), Direction::East),
        MovementIntent::step(b, CellCoord::new(1, 0), Direction::South),
        MovementIntent::step(c, CellCoord::new(1, 1), Direction::West),
        MovementIntent::step(d, CellCoord::new(0, 1), Direction::North),
    ];
    let (report, _) = resolve_now(&mut world, &resolver, &intents);

    for member in [a, b, c, d] {
        assert_eq!(rejection(&report, member), Some(RejectionReason::CycleRejected));
    }
    assert_eq!(
        rejection(&report, follower),
        Some(RejectionReason::ChainBlocked)
    );
    assert_eq!(query::agent_cell(&world, follower), Some(CellCoord::new(2, 0)));
}

#[test]
fn bystander_blocks_only_its_own_candidate() {
    let mut world = arena(12, 4);
    let resolver = MovementConflictResolver::default();
    let bystander = spawn(&mut world, Faction::Player, 3, 1);
    let blocked = spawn(&mut world, Faction::Player, 4, 1);
    let free = spawn(&mut world, Faction::Player, 4, 2);

    let intents = [
        MovementIntent::step(blocked, CellCoord::new(4, 1), Direction::West),
        MovementIntent::step(free, CellCoord::new(4, 2), Direction::West),
    ];
    let (report, _) = resolve_now(&mut world, &resolver, &intents);

    assert_eq!(rejection(&report, blocked), Some(RejectionReason::Occupied));
    assert_eq!(report.commit_order(), vec![free]);
    assert_eq!(query::occupant(&world, CellCoord::new(3, 1)), Some(bystander));
    assert_eq!(query::occupant(&world, CellCoord::new(4, 1)), Some(blocked));
}

#[test]
fn converging_candidates_claim_the_target_once() {
    let mut world = arena(12, 4);
    let resolver = MovementConflictResolver::default();
    let west = spawn(&mut world, Faction::Player, 1, 2);
    let east = spawn(&mut world, Faction::Player, 3, 2);

    let intents = [
        MovementIntent::step(east, CellCoord::new(3, 2), Direction::West),
        MovementIntent::step(west, CellCoord::new(1, 2), Direction::East),
    ];
    let (report, _) = resolve_now(&mut world, &resolver, &intents);

    assert_eq!(report.commit_order(), vec![west]);
    assert_eq!(rejection(&report, east), Some(RejectionReason::TargetClaimed));
    assert_eq!(query::occupant(&world, CellCoord::new(2, 2)), Some(west));
}

#[test]
fn knockback_onto_broken_cell_stuns_instead() {
    let mut world = arena(8, 4);
    let resolver = MovementConflictResolver::default();
    let hostile = spawn(&mut world, Faction::Hostile, 5, 1);
    let _ = apply_all(
        &mut world,
        vec![Command::BreakCell {
            cell: CellCoord::new(6, 1),
        }],
    );

    let intents = [MovementIntent::knockback(
        hostile,
        CellCoord::new(5, 1),
        Direction::East,
    )];
    let (report, events) = resolve_now(&mut world, &resolver, &intents);

    assert_eq!(
        report.outcome_for(hostile),
        Some(Outcome::Rejected {
            reason: RejectionReason::TargetBroken,
            fallback: Some(Fallback::Stun),
        })
    );
    assert_eq!(events, vec![Event::AgentStunned { agent: hostile }]);
    assert_eq!(query::agent_cell(&world, hostile), Some(CellCoord::new(5, 1)));
    assert_eq!(
        query::agent(&world, hostile).map(|snapshot| snapshot.status),
        Some(MotionStatus::Stunned)
    );
}

#[test]
fn malformed_intents_are_reported_not_raised() {
    let mut world = arena(8, 4);
    let resolver = MovementConflictResolver::default();
    let player = spawn(&mut world, Faction::Player, 1, 1);

    let intents = [
        MovementIntent::step(player, CellCoord::new(2, 1), Direction::West),
        MovementIntent::step(AgentId::new(99), CellCoord::new(0, 0), Direction::South),
        MovementIntent::pull(CellCoord::new(0, 3), Direction::East),
        MovementIntent::step(player, CellCoord::new(1, 1), Direction::North),
        MovementIntent::step(player, CellCoord::new(1, 1), Direction::South),
        MovementIntent::pull(CellCoord::new(20, 0), Direction::East),
    ];
    let (report, _) = resolve_now(&mut world, &resolver, &intents);

    let reasons: Vec<Option<RejectionReason>> = report
        .outcomes()
        .iter()
        .map(|entry| match entry.outcome {
            Outcome::Rejected { reason, .. } => Some(reason),
            Outcome::Accepted { .. } => None,
        })
        .collect();
    assert_eq!(
        reasons,
        vec![
            Some(RejectionReason::SourceMismatch),
            Some(RejectionReason::UnknownAgent),
            Some(RejectionReason::NoOccupant),
            None,
            Some(RejectionReason::DuplicateSource),
            Some(RejectionReason::InvalidSource),
        ]
    );
    assert_eq!(query::occupant(&world, CellCoord::new(1, 0)), Some(player));
}

#[test]
fn hostile_cannot_be_pulled_onto_home_cells() {
    let mut world = arena(8, 4);
    let resolver = MovementConflictResolver::default();
    let hostile = spawn(&mut world, Faction::Hostile, 4, 0);

    let (report, _) = resolve_now(
        &mut world,
        &resolver,
        &[MovementIntent::pull(CellCoord::new(4, 0), Direction::West)],
    );

    assert_eq!(rejection(&report, hostile), Some(RejectionReason::Restricted));
    assert_eq!(query::agent_cell(&world, hostile), Some(CellCoord::new(4, 0)));
}

#[test]
fn second_batch_in_the_same_tick_sees_committed_reservations() {
    let mut world = arena(12, 4);
    let resolver = MovementConflictResolver::default();
    let first = spawn(&mut world, Faction::Player, 4, 1);
    let second = spawn(&mut world, Faction::Player, 3, 2);

    let (report, _) = resolve_now(
        &mut world,
        &resolver,
        &[MovementIntent::step(first, CellCoord::new(4, 1), Direction::West)],
    );
    assert_eq!(report.commit_order(), vec![first]);

    let (report, _) = resolve_now(
        &mut world,
        &resolver,
        &[MovementIntent::step(second, CellCoord::new(3, 2), Direction::North)],
    );
    assert_eq!(rejection(&report, second), Some(RejectionReason::Occupied));
    assert_eq!(query::occupant(&world, CellCoord::new(3, 1)), Some(first));
}

#[test]
fn agents_in_flight_are_busy() {
    let mut world = arena(12, 4);
    let resolver = MovementConflictResolver::default();
    let agent = spawn(&mut world, Faction::Player, 4, 1);

    let _ = resolve_now(
        &mut world,
        &resolver,
        &[MovementIntent::step(agent, CellCoord::new(4, 1), Direction::West)],
    );
    let (report, _) = resolve_now(
        &mut world,
        &resolver,
        &[MovementIntent::step(agent, CellCoord::new(4, 1), Direction::West)],
    );

    assert_eq!(rejection(&report, agent), Some(RejectionReason::AgentBusy));
}

#[test]
fn queued_batches_wait_for_motion_to_finish() {
    let mut world = arena(12, 4);
    let mut resolver = MovementConflictResolver::default();
    let agent = spawn(&mut world, Faction::Player, 5, 0);

    resolver.submit(
        Batch::Pull(PullEffect::new(Direction::West)),
        PostMotion::Idle,
    );
    resolver.submit(
        Batch::Pull(PullEffect::new(Direction::West)),
        PostMotion::Wander,
    );

    let reports = tick(&mut world, &mut resolver, 0);
    assert_eq!(reports.len(), 1);
    assert_eq!(resolver.pending(), 1);

    assert!(tick(&mut world, &mut resolver, 100).is_empty());
    assert!(tick(&mut world, &mut resolver, 100).is_empty());

    let reports = tick(&mut world, &mut resolver, 100);
    assert_eq!(reports.len(), 1);
    assert!(!reports[0].quiescence_timed_out());
    assert_eq!(
        reports[0].outcome_for(agent),
        Some(Outcome::Accepted {
            final_cell: CellCoord::new(3, 0),
        })
    );
    assert_eq!(resolver.pending(), 0);

    let _ = tick(&mut world, &mut resolver, 300);
    let snapshot = query::agent(&world, agent).expect("alive");
    assert_eq!(snapshot.cell, CellCoord::new(3, 0));
    assert!(snapshot.autonomous);
}

#[test]
fn quiescence_timeout_resolves_without_agents_in_flight() {
    let mut world = World::with_config(ArenaConfig {
        columns: 12,
        rows: 4,
        pull_duration: Duration::from_secs(1),
        quiescence_max_wait: Duration::from_millis(100),
        ..ArenaConfig::default()
    })
    .expect("valid config");
    let mut resolver = MovementConflictResolver::from_config(query::config(&world));
    let slow = spawn(&mut world, Faction::Player, 5, 0);
    let _ = resolve_now(
        &mut world,
        &resolver,
        &[MovementIntent::pull(CellCoord::new(5, 0), Direction::West)],
    );
    let idle = spawn(&mut world, Faction::Player, 5, 2);

    resolver.submit(
        Batch::Pull(PullEffect::new(Direction::West)),
        PostMotion::Idle,
    );

    assert!(tick(&mut world, &mut resolver, 50).is_empty());
    let reports = tick(&mut world, &mut resolver, 50);

    assert_eq!(reports.len(), 1);
    assert!(reports[0].quiescence_timed_out());
    assert_eq!(reports[0].commit_order(), vec![idle]);
    assert_eq!(reports[0].outcome_for(slow), None);
    assert_eq!(query::occupant(&world, CellCoord::new(4, 0)), Some(slow));
}

#[test]
fn pull_effect_honours_category_and_exclusions() {
    let mut world = arena(8, 4);
    let resolver = MovementConflictResolver::default();
    let caster = spawn(&mut world, Faction::Player, 2, 0);
    let player = spawn(&mut world, Faction::Player, 2, 2);
    let hostile = spawn(&mut world, Faction::Hostile, 6, 1);

    let effect = PullEffect::new(Direction::West)
        .on_category(grid_arena_core::Category::Home)
        .excluding(caster);
    let agents = query::agent_view(&world);
    let intents = effect.intents(
        &agents,
        query::occupancy_view(&world),
        query::grid_view(&world),
    );
    assert_eq!(
        intents,
        vec![MovementIntent::pull(CellCoord::new(2, 2), Direction::West)]
    );

    let (report, _) = resolve_now(&mut world, &resolver, &intents);
    assert_eq!(report.commit_order(), vec![player]);
    assert_eq!(query::agent_cell(&world, hostile), Some(CellCoord::new(6, 1)));
}

#[test]
fn try_step_reports_acceptance() {
    let mut world = arena(8, 4);
    let resolver = MovementConflictResolver::default();
    let player = spawn(&mut world, Faction::Player, 0, 0);

    let mut commands = Vec::new();
    let agents = query::agent_view(&world);
    assert!(!resolver.try_step(
        player,
        Direction::West,
        &agents,
        query::occupancy_view(&world),
        query::grid_view(&world),
        &mut commands,
    ));
    assert!(commands.is_empty());

    assert!(resolver.try_step(
        player,
        Direction::South,
        &agents,
        query::occupancy_view(&world),
        query::grid_view(&world),
        &mut commands,
    ));
    let _ = apply_all(&mut world, commands);
    assert_eq!(query::occupant(&world, CellCoord::new(0, 1)), Some(player));
}
