//! Cell categories and the crack/break/repair state machine.

use std::time::Duration;

use grid_arena_core::{
    ArenaError, ArenaResult, CellCoord, Category, DamageState, ShakeIntensity, TileAppearance,
};

/// Single source of truth for tile identity and damage.
///
/// Every cell carries a category fixed at setup and an optional damage record.
/// A damage record always owns a repair deadline, so a cell can never be
/// damaged without a pending repair or carry a deadline while intact.
#[derive(Clone, Debug)]
pub struct GridState {
    columns: u32,
    rows: u32,
    cells: Vec<Cell>,
    cracked_duration: Duration,
    broken_duration: Duration,
}

#[derive(Clone, Copy, Debug)]
struct Cell {
    category: Category,
    damage: Option<Damage>,
}

#[derive(Clone, Copy, Debug)]
struct Damage {
    broken: bool,
    deadline: Duration,
    pending: Option<Category>,
}

/// Visible consequences of damaging a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileDamage {
    /// Rendering key the cell now uses.
    pub appearance: TileAppearance,
    /// Shake rendering collaborators should play.
    pub shake: ShakeIntensity,
}

impl GridState {
    /// Creates a grid whose left half belongs to the player and right half to the hostiles.
    ///
    /// The centre column of an odd-width grid is neutral ground.
    #[must_use]
    pub fn new(
        columns: u32,
        rows: u32,
        cracked_duration: Duration,
        broken_duration: Duration,
    ) -> Self {
        Self::with_layout(columns, rows, cracked_duration, broken_duration, |cell| {
            split_category(cell, columns)
        })
    }

    /// Creates a grid whose categories come from the provided layout function.
    #[must_use]
    pub fn with_layout<F>(
        columns: u32,
        rows: u32,
        cracked_duration: Duration,
        broken_duration: Duration,
        layout: F,
    ) -> Self
    where
        F: Fn(CellCoord) -> Category,
    {
        let capacity_u64 = u64::from(columns) * u64::from(rows);
        let capacity = usize::try_from(capacity_u64).unwrap_or(0);
        let mut cells = Vec::with_capacity(capacity);
        for row in 0..rows {
            for column in 0..columns {
                cells.push(Cell {
                    category: layout(CellCoord::new(column, row)),
                    damage: None,
                });
            }
        }

        Self {
            columns,
            rows,
            cells,
            cracked_duration,
            broken_duration,
        }
    }

    /// Provides the dimensions of the grid.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    /// Reports whether the cell lies within the grid.
    #[must_use]
    pub const fn contains(&self, cell: CellCoord) -> bool {
        cell.column() < self.columns && cell.row() < self.rows
    }

    /// Category currently in force for the cell.
    ///
    /// A change recorded while the cell is damaged is not reported here until
    /// the repair applies it; see [`GridState::pending_category`].
    pub fn category(&self, cell: CellCoord) -> ArenaResult<Category> {
        self.cell(cell).map(|state| state.category)
    }

    /// Category change waiting for the cell's repair, if any.
    pub fn pending_category(&self, cell: CellCoord) -> ArenaResult<Option<Category>> {
        self.cell(cell)
            .map(|state| state.damage.and_then(|damage| damage.pending))
    }

    /// Damage sub-state of the cell.
    pub fn damage_state(&self, cell: CellCoord) -> ArenaResult<DamageState> {
        self.cell(cell).map(|state| match state.damage {
            None => DamageState::Intact,
            Some(Damage { broken: false, .. }) => DamageState::Cracked,
            Some(Damage { broken: true, .. }) => DamageState::Broken,
        })
    }

    /// Rendering key of the cell.
    pub fn appearance(&self, cell: CellCoord) -> ArenaResult<TileAppearance> {
        self.cell(cell).map(|state| match state.damage {
            None => TileAppearance::Intact(state.category),
            Some(damage) => damage.appearance(state.category),
        })
    }

    /// Time at which the cell repairs itself, if it is damaged.
    pub fn repair_deadline(&self, cell: CellCoord) -> ArenaResult<Option<Duration>> {
        self.cell(cell)
            .map(|state| state.damage.map(|damage| damage.deadline))
    }

    /// Cracks the cell and arms its repair timer.
    ///
    /// Broken cells ignore the crack and `Ok(None)` is returned. Cracking an
    /// already cracked cell re-arms the deadline.
    pub fn crack(&mut self, cell: CellCoord, now: Duration) -> ArenaResult<Option<TileDamage>> {
        let deadline = now.saturating_add(self.cracked_duration);
        let state = self.cell_mut(cell)?;
        let pending = match state.damage {
            Some(Damage { broken: true, .. }) => return Ok(None),
            Some(damage) => damage.pending,
            None => None,
        };

        let damage = Damage {
            broken: false,
            deadline,
            pending,
        };
        state.damage = Some(damage);
        Ok(Some(TileDamage {
            appearance: damage.appearance(state.category),
            shake: ShakeIntensity::Light,
        }))
    }

    /// Breaks the cell and arms its (longer) repair timer.
    ///
    /// Breaking an already broken cell re-arms the deadline.
    pub fn break_cell(&mut self, cell: CellCoord, now: Duration) -> ArenaResult<TileDamage> {
        let deadline = now.saturating_add(self.broken_duration);
        let state = self.cell_mut(cell)?;
        let pending = state.damage.and_then(|damage| damage.pending);

        let damage = Damage {
            broken: true,
            deadline,
            pending,
        };
        state.damage = Some(damage);
        Ok(TileDamage {
            appearance: damage.appearance(state.category),
            shake: ShakeIntensity::Heavy,
        })
    }

    /// Reverts every cell whose deadline has passed and lists the repaired cells.
    ///
    /// Cells repair straight to intact; calling this again with the same or a
    /// later `now` leaves them untouched.
    pub fn repair_tick(&mut self, now: Duration) -> Vec<(CellCoord, Category)> {
        let columns = self.columns;
        let mut repaired = Vec::new();
        for (index, state) in self.cells.iter_mut().enumerate() {
            let Some(damage) = state.damage else {
                continue;
            };
            if damage.deadline > now {
                continue;
            }

            if let Some(category) = damage.pending {
                state.category = category;
            }
            state.damage = None;
            let cell = coord_for_index(index, columns);
            log::trace!(
                "cell ({}, {}) repaired to {:?}",
                cell.column(),
                cell.row(),
                state.category
            );
            repaired.push((cell, state.category));
        }
        repaired
    }

    /// Records a new category for the cell.
    ///
    /// Returns `true` when the cell is damaged, in which case the change is
    /// held back and takes effect when the repair completes. A later change
    /// made before the repair replaces the held one.
    pub fn set_category(&mut self, cell: CellCoord, category: Category) -> ArenaResult<bool> {
        let state = self.cell_mut(cell)?;
        match state.damage.as_mut() {
            Some(damage) => {
                damage.pending = Some(category);
                Ok(true)
            }
            None => {
                state.category = category;
                Ok(false)
            }
        }
    }

    /// Iterates over every cell with its category and damage state in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (CellCoord, Category, DamageState)> + '_ {
        let columns = self.columns;
        self.cells.iter().enumerate().map(move |(index, state)| {
            let damage = match state.damage {
                None => DamageState::Intact,
                Some(Damage { broken: false, .. }) => DamageState::Cracked,
                Some(Damage { broken: true, .. }) => DamageState::Broken,
            };
            (coord_for_index(index, columns), state.category, damage)
        })
    }

    fn cell(&self, cell: CellCoord) -> ArenaResult<&Cell> {
        self.index(cell)
            .and_then(|index| self.cells.get(index))
            .ok_or(ArenaError::InvalidPosition { cell })
    }

    fn cell_mut(&mut self, cell: CellCoord) -> ArenaResult<&mut Cell> {
        let index = self.index(cell);
        index
            .and_then(|index| self.cells.get_mut(index))
            .ok_or(ArenaError::InvalidPosition { cell })
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        if self.contains(cell) {
            let row = usize::try_from(cell.row()).ok()?;
            let column = usize::try_from(cell.column()).ok()?;
            let width = usize::try_from(self.columns).ok()?;
            Some(row * width + column)
        } else {
            None
        }
    }
}

impl Damage {
    fn appearance(self, category: Category) -> TileAppearance {
        if self.broken {
            TileAppearance::Broken(category)
        } else {
            TileAppearance::Cracked(category)
        }
    }
}

fn split_category(cell: CellCoord, columns: u32) -> Category {
    let half = columns / 2;
    if columns % 2 == 1 && cell.column() == half {
        Category::Neutral
    } else if cell.column() < half {
        Category::Home
    } else {
        Category::Hostile
    }
}

fn coord_for_index(index: usize, columns: u32) -> CellCoord {
    let width = usize::try_from(columns).unwrap_or(1).max(1);
    let column = u32::try_from(index % width).unwrap_or(u32::MAX);
    let row = u32::try_from(index / width).unwrap_or(u32::MAX);
    CellCoord::new(column, row)
}
