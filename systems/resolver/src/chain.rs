//! Dependency-ordered resolution of a single batch of movement intents.
//!
//! Every candidate moves exactly one cell, so each candidate is blocked by at
//! most one other candidate: the one standing on its target. The blocked-by
//! relation is therefore a functional graph and every walk over it is a simple
//! path that either ends on a free cell, ends on an already resolved
//! candidate, or closes a cycle.

use std::{
    cmp::Reverse,
    collections::{BTreeMap, BTreeSet},
};

use grid_arena_core::{
    AgentId, CellCoord, DamageState, Direction, Fallback, Faction, IntentKind, IntentOutcome,
    MotionStatus, MovementIntent, Outcome, PlannedMove, RejectionReason, ResolutionReport,
};
use grid_arena_world::query::{AgentSnapshot, AgentView, GridView, OccupancyView};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Node {
    Unresolved,
    InProgress,
    Accepted,
    Rejected(RejectionReason),
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
    intent_index: usize,
    agent: AgentId,
    faction: Faction,
    source: CellCoord,
    direction: Direction,
    kind: IntentKind,
    target: Option<CellCoord>,
}

/// Resolves the intents against the provided views into a conflict-free assignment.
///
/// Outcomes are reported in intent order; accepted moves are listed in the
/// order they must be committed so every blocker vacates its cell before the
/// agent behind it claims that cell. The views are not modified.
#[must_use]
pub fn resolve_batch(
    intents: &[MovementIntent],
    agents: &AgentView,
    occupancy: OccupancyView<'_>,
    grid: GridView<'_>,
) -> ResolutionReport {
    let mut verdicts: Vec<(Option<AgentId>, Option<RejectionReason>)> =
        Vec::with_capacity(intents.len());
    let mut candidates: Vec<Candidate> = Vec::new();
    let mut sources: BTreeMap<CellCoord, usize> = BTreeMap::new();

    for (intent_index, intent) in intents.iter().enumerate() {
        match identify(intent, agents, occupancy, grid) {
            Ok(snapshot) if sources.contains_key(&intent.source) => {
                verdicts.push((Some(snapshot.id), Some(RejectionReason::DuplicateSource)));
            }
            Ok(snapshot) => {
                let _ = sources.insert(intent.source, candidates.len());
                candidates.push(Candidate {
                    intent_index,
                    agent: snapshot.id,
                    faction: snapshot.faction,
                    source: intent.source,
                    direction: intent.direction,
                    kind: intent.kind,
                    target: intent.desired_cell(),
                });
                verdicts.push((Some(snapshot.id), None));
            }
            Err((agent, reason)) => verdicts.push((agent, Some(reason))),
        }
    }

    let participants: BTreeSet<AgentId> = candidates.iter().map(|candidate| candidate.agent).collect();
    let mut nodes: Vec<Node> = candidates
        .iter()
        .map(|candidate| match check_target(candidate, &participants, occupancy, grid) {
            Ok(()) => Node::Unresolved,
            Err(reason) => Node::Rejected(reason),
        })
        .collect();

    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by_key(|&index| {
        let candidate = &candidates[index];
        (
            Reverse(candidate.source.projection(candidate.direction)),
            candidate.source.row(),
            candidate.source.column(),
        )
    });

    let (columns, rows) = grid.dimensions();
    let depth_bound = usize::try_from(u64::from(columns) * u64::from(rows)).unwrap_or(usize::MAX);
    let mut claimed: BTreeSet<CellCoord> = BTreeSet::new();
    let mut commits: Vec<PlannedMove> = Vec::new();
    let mut path: Vec<usize> = Vec::new();

    for start in order {
        walk(
            start,
            &candidates,
            &sources,
            depth_bound,
            &mut nodes,
            &mut path,
            &mut claimed,
            &mut commits,
        );
    }

    for (candidate, node) in candidates.iter().zip(&nodes) {
        let reason = match node {
            Node::Accepted => None,
            Node::Rejected(reason) => Some(*reason),
            Node::Unresolved | Node::InProgress => Some(RejectionReason::ChainBlocked),
        };
        verdicts[candidate.intent_index].1 = reason;
    }

    let outcomes: Vec<IntentOutcome> = intents
        .iter()
        .zip(verdicts)
        .map(|(intent, (agent, rejection))| {
            let outcome = match (rejection, intent.desired_cell()) {
                (None, Some(final_cell)) => Outcome::Accepted { final_cell },
                (Some(reason), _) => Outcome::Rejected {
                    reason,
                    fallback: fallback_for(intent.kind, reason),
                },
                (None, None) => Outcome::Rejected {
                    reason: RejectionReason::OutOfBounds,
                    fallback: fallback_for(intent.kind, RejectionReason::OutOfBounds),
                },
            };
            IntentOutcome {
                intent: *intent,
                agent,
                outcome,
            }
        })
        .collect();

    log::debug!(
        "resolved {} intent(s): {} accepted",
        outcomes.len(),
        commits.len()
    );
    ResolutionReport::new(outcomes, commits)
}

/// Alternative effect applied when the intent is rejected for the provided reason.
#[must_use]
pub fn fallback_for(kind: IntentKind, reason: RejectionReason) -> Option<Fallback> {
    if kind == IntentKind::Knockback && reason.blocks_target() {
        Some(Fallback::Stun)
    } else {
        None
    }
}

fn identify<'v>(
    intent: &MovementIntent,
    agents: &'v AgentView,
    occupancy: OccupancyView<'_>,
    grid: GridView<'_>,
) -> Result<&'v AgentSnapshot, (Option<AgentId>, RejectionReason)> {
    if !grid.contains(intent.source) {
        return Err((intent.agent, RejectionReason::InvalidSource));
    }
    let agent = match intent.agent {
        Some(agent) => agent,
        None => occupancy
            .occupant(intent.source)
            .ok_or((None, RejectionReason::NoOccupant))?,
    };
    let snapshot = agents
        .get(agent)
        .ok_or((Some(agent), RejectionReason::UnknownAgent))?;
    if snapshot.status != MotionStatus::Idle {
        return Err((Some(agent), RejectionReason::AgentBusy));
    }
    if snapshot.cell != intent.source || occupancy.cell_of(agent) != Some(intent.source) {
        return Err((Some(agent), RejectionReason::SourceMismatch));
    }
    Ok(snapshot)
}

fn check_target(
    candidate: &Candidate,
    participants: &BTreeSet<AgentId>,
    occupancy: OccupancyView<'_>,
    grid: GridView<'_>,
) -> Result<(), RejectionReason> {
    let target = candidate
        .target
        .filter(|cell| grid.contains(*cell))
        .ok_or(RejectionReason::OutOfBounds)?;
    if grid.damage_state(target) == Ok(DamageState::Broken) {
        return Err(RejectionReason::TargetBroken);
    }
    let category = grid
        .category(target)
        .map_err(|_| RejectionReason::OutOfBounds)?;
    if !candidate.faction.may_enter(category) {
        return Err(RejectionReason::Restricted);
    }
    match occupancy.occupant(target) {
        Some(holder) if !participants.contains(&holder) => Err(RejectionReason::Occupied),
        _ => Ok(()),
    }
}

#[allow(clippy::too_many_arguments)]
fn walk(
    start: usize,
    candidates: &[Candidate],
    sources: &BTreeMap<CellCoord, usize>,
    depth_bound: usize,
    nodes: &mut [Node],
    path: &mut Vec<usize>,
    claimed: &mut BTreeSet<CellCoord>,
    commits: &mut Vec<PlannedMove>,
) {
    path.clear();
    let mut current = Some(start);
    while let Some(index) = current {
        match nodes[index] {
            Node::Unresolved => {
                nodes[index] = Node::InProgress;
                path.push(index);
                debug_assert!(
                    path.len() <= depth_bound,
                    "blocked-by walk exceeded the cell count"
                );
                current = candidates[index]
                    .target
                    .and_then(|target| sources.get(&target).copied());
            }
            Node::InProgress => {
                let cycle_start = path
                    .iter()
                    .position(|&member| member == index)
                    .unwrap_or(0);
                for member in path.drain(cycle_start..) {
                    log::debug!(
                        "agent {} is part of a blocking cycle",
                        candidates[member].agent.get()
                    );
                    nodes[member] = Node::Rejected(RejectionReason::CycleRejected);
                }
                current = None;
            }
            Node::Accepted | Node::Rejected(_) => current = None,
        }
    }

    while let Some(index) = path.pop() {
        let candidate = &candidates[index];
        let Some(target) = candidate.target else {
            nodes[index] = Node::Rejected(RejectionReason::OutOfBounds);
            continue;
        };
        let blocker_vacates = sources
            .get(&target)
            .map_or(true, |&blocker| nodes[blocker] == Node::Accepted);

        nodes[index] = if !blocker_vacates {
            Node::Rejected(RejectionReason::ChainBlocked)
        } else if !claimed.insert(target) {
            Node::Rejected(RejectionReason::TargetClaimed)
        } else {
            commits.push(PlannedMove {
                agent: candidate.agent,
                from: candidate.source,
                to: target,
                kind: candidate.kind,
            });
            Node::Accepted
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_target_related_knockback_rejections_stun() {
        assert_eq!(
            fallback_for(IntentKind::Knockback, RejectionReason::TargetBroken),
            Some(Fallback::Stun)
        );
        assert_eq!(
            fallback_for(IntentKind::Knockback, RejectionReason::CycleRejected),
            Some(Fallback::Stun)
        );
        assert_eq!(
            fallback_for(IntentKind::Knockback, RejectionReason::AgentBusy),
            None
        );
        assert_eq!(
            fallback_for(IntentKind::Pull, RejectionReason::TargetBroken),
            None
        );
    }
}
