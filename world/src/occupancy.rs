//! Reservation ledger that keeps agents from sharing a cell.

use std::collections::BTreeMap;

use grid_arena_core::{AgentId, ArenaError, ArenaResult, CellCoord};

/// Dense cell → agent reservation table with a reverse agent → cell index.
///
/// Both directions stay injective: a cell is held by at most one agent and an
/// agent holds at most one cell.
#[derive(Clone, Debug)]
pub struct OccupancyTracker {
    columns: u32,
    rows: u32,
    cells: Vec<Option<AgentId>>,
    holdings: BTreeMap<AgentId, CellCoord>,
}

impl OccupancyTracker {
    /// Creates an empty ledger for a grid of the provided dimensions.
    #[must_use]
    pub fn new(columns: u32, rows: u32) -> Self {
        let capacity_u64 = u64::from(columns) * u64::from(rows);
        let capacity = usize::try_from(capacity_u64).unwrap_or(0);
        Self {
            columns,
            rows,
            cells: vec![None; capacity],
            holdings: BTreeMap::new(),
        }
    }

    /// Reserves the cell for the agent.
    ///
    /// Re-reserving a cell the agent already holds succeeds without change. An
    /// agent holding a different cell must release it first.
    pub fn reserve(&mut self, cell: CellCoord, agent: AgentId) -> ArenaResult<()> {
        let index = self.index(cell).ok_or(ArenaError::InvalidPosition { cell })?;
        match self.cells[index] {
            Some(holder) if holder == agent => return Ok(()),
            Some(holder) => return Err(ArenaError::AlreadyReserved { cell, holder }),
            None => {}
        }
        if let Some(held) = self.holdings.get(&agent) {
            return Err(ArenaError::AgentHoldsCell { agent, cell: *held });
        }

        self.cells[index] = Some(agent);
        let _ = self.holdings.insert(agent, cell);
        Ok(())
    }

    /// Releases the cell if, and only if, the agent currently holds it.
    ///
    /// Returns whether a reservation was removed; stale releases are ignored.
    pub fn release(&mut self, cell: CellCoord, agent: AgentId) -> bool {
        let Some(index) = self.index(cell) else {
            return false;
        };
        if self.cells[index] != Some(agent) {
            return false;
        }

        self.cells[index] = None;
        let _ = self.holdings.remove(&agent);
        true
    }

    /// Releases whatever cell the agent holds.
    pub fn release_agent(&mut self, agent: AgentId) -> Option<CellCoord> {
        let cell = self.holdings.get(&agent).copied()?;
        if self.release(cell, agent) {
            Some(cell)
        } else {
            None
        }
    }

    /// Reports whether any agent holds the cell. Out-of-bounds cells are never occupied.
    #[must_use]
    pub fn is_occupied(&self, cell: CellCoord) -> bool {
        self.occupant(cell).is_some()
    }

    /// Agent holding the cell, if any.
    #[must_use]
    pub fn occupant(&self, cell: CellCoord) -> Option<AgentId> {
        self.index(cell)
            .and_then(|index| self.cells.get(index).copied().flatten())
    }

    /// Cell the agent holds, if any.
    #[must_use]
    pub fn cell_of(&self, agent: AgentId) -> Option<CellCoord> {
        self.holdings.get(&agent).copied()
    }

    /// Number of reservations currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    /// Reports whether no reservation is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    /// Dense row-major reservation table.
    #[must_use]
    pub fn cells(&self) -> &[Option<AgentId>] {
        &self.cells
    }

    /// Provides the dimensions of the ledger.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        if cell.column() < self.columns && cell.row() < self.rows {
            let row = usize::try_from(cell.row()).ok()?;
            let column = usize::try_from(cell.column()).ok()?;
            let width = usize::try_from(self.columns).ok()?;
            Some(row * width + column)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_injective(tracker: &OccupancyTracker) {
        let held: Vec<AgentId> = tracker.cells().iter().flatten().copied().collect();
        let mut unique = held.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(held.len(), unique.len(), "an agent holds two cells");
        assert_eq!(held.len(), tracker.len());
        for (agent, cell) in &tracker.holdings {
            assert_eq!(tracker.occupant(*cell), Some(*agent));
        }
    }

    #[test]
    fn reserve_conflicts_report_the_holder() {
        let mut tracker = OccupancyTracker::new(4, 4);
        let cell = CellCoord::new(1, 2);
        tracker.reserve(cell, AgentId::new(1)).expect("free cell");

        assert_eq!(
            tracker.reserve(cell, AgentId::new(2)),
            Err(ArenaError::AlreadyReserved {
                cell,
                holder: AgentId::new(1),
            })
        );
        assert_injective(&tracker);
    }

    #[test]
    fn re_reserving_own_cell_is_a_no_op() {
        let mut tracker = OccupancyTracker::new(4, 4);
        let cell = CellCoord::new(0, 0);
        tracker.reserve(cell, AgentId::new(1)).expect("free cell");
        tracker.reserve(cell, AgentId::new(1)).expect("same holder");
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn agents_hold_one_cell_at_a_time() {
        let mut tracker = OccupancyTracker::new(4, 4);
        let agent = AgentId::new(5);
        tracker.reserve(CellCoord::new(0, 0), agent).expect("free cell");

        assert_eq!(
            tracker.reserve(CellCoord::new(1, 0), agent),
            Err(ArenaError::AgentHoldsCell {
                agent,
                cell: CellCoord::new(0, 0),
            })
        );

        assert!(tracker.release(CellCoord::new(0, 0), agent));
        tracker.reserve(CellCoord::new(1, 0), agent).expect("released first");
        assert_eq!(tracker.cell_of(agent), Some(CellCoord::new(1, 0)));
        assert_injective(&tracker);
    }

    #[test]
    fn stale_release_is_ignored() {
        let mut tracker = OccupancyTracker::new(4, 4);
        let cell = CellCoord::new(3, 3);
        tracker.reserve(cell, AgentId::new(1)).expect("free cell");

        assert!(!tracker.release(cell, AgentId::new(2)));
        assert_eq!(tracker.occupant(cell), Some(AgentId::new(1)));
        assert!(!tracker.release(CellCoord::new(9, 9), AgentId::new(1)));
    }

    #[test]
    fn out_of_bounds_reservations_fail() {
        let mut tracker = OccupancyTracker::new(2, 2);
        let outside = CellCoord::new(2, 0);
        assert_eq!(
            tracker.reserve(outside, AgentId::new(1)),
            Err(ArenaError::InvalidPosition { cell: outside })
        );
        assert!(!tracker.is_occupied(outside));
    }

    #[test]
    fn release_agent_frees_its_cell() {
        let mut tracker = OccupancyTracker::new(3, 3);
        let agent = AgentId::new(8);
        tracker.reserve(CellCoord::new(2, 1), agent).expect("free cell");

        assert_eq!(tracker.release_agent(agent), Some(CellCoord::new(2, 1)));
        assert!(tracker.is_empty());
        assert_eq!(tracker.release_agent(agent), None);
    }
}
