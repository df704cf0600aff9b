//! Mapping between grid cells and world-space positions.

use glam::Vec2;
use grid_arena_core::{CellCoord, VisualOffset};

/// Pure geometric description of where the grid sits in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArenaGeometry {
    columns: u32,
    rows: u32,
    tile_length: f32,
    origin: Vec2,
}

impl ArenaGeometry {
    /// Creates a geometry whose top-left corner sits at `origin`.
    #[must_use]
    pub const fn new(columns: u32, rows: u32, tile_length: f32, origin: Vec2) -> Self {
        Self {
            columns,
            rows,
            tile_length,
            origin,
        }
    }

    /// Side length of a cell in world units.
    #[must_use]
    pub const fn tile_length(&self) -> f32 {
        self.tile_length
    }

    /// World-space centre of the cell.
    #[must_use]
    pub fn world_position(&self, cell: CellCoord) -> Vec2 {
        let column = cell.column() as f32 + 0.5;
        let row = cell.row() as f32 + 0.5;
        self.origin + Vec2::new(column, row) * self.tile_length
    }

    /// Cell containing the world-space position, if it lies on the grid.
    #[must_use]
    pub fn cell_from_world_position(&self, position: Vec2) -> Option<CellCoord> {
        if self.tile_length <= 0.0 {
            return None;
        }
        let local = (position - self.origin) / self.tile_length;
        if !local.is_finite() || local.x < 0.0 || local.y < 0.0 {
            return None;
        }

        let column = local.x.floor() as u32;
        let row = local.y.floor() as u32;
        if column < self.columns && row < self.rows {
            Some(CellCoord::new(column, row))
        } else {
            None
        }
    }

    /// Rendered position of an agent travelling between two cells.
    ///
    /// `progress` is clamped to `0.0..=1.0`; the visual offset is added
    /// unchanged at every point of the interpolation.
    #[must_use]
    pub fn interpolate(
        &self,
        from: CellCoord,
        to: CellCoord,
        progress: f32,
        offset: VisualOffset,
    ) -> Vec2 {
        let start = self.world_position(from);
        let end = self.world_position(to);
        start.lerp(end, progress.clamp(0.0, 1.0)) + Vec2::new(offset.x, offset.y)
    }
}
