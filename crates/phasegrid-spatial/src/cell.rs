//! Cell coordinates and map geometry.

use std::fmt;

use phasegrid_object::Position;

/// Index of a cell on the map, `[0, max_cells)` on both axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    pub x: u32,
    pub y: u32,
}

impl CellCoord {
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Size and extent of a map's cell array.
///
/// The map is centered on the origin: with `max_cells` cells of
/// `cell_size` units per axis, valid coordinates lie in
/// `[-half_extent, half_extent)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridGeometry {
    cell_size: f32,
    max_cells: u32,
}

impl Default for GridGeometry {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CELL_SIZE, Self::DEFAULT_MAX_CELLS)
    }
}

impl GridGeometry {
    /// A classic map tile (533.33 units) split into 8 cells.
    pub const DEFAULT_CELL_SIZE: f32 = 533.333_33 / 8.0;
    pub const DEFAULT_MAX_CELLS: u32 = 512;

    /// Create a geometry. Both values must be positive; callers validate
    /// configuration before building one.
    #[must_use]
    pub const fn new(cell_size: f32, max_cells: u32) -> Self {
        Self {
            cell_size,
            max_cells,
        }
    }

    #[must_use]
    pub const fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[must_use]
    pub const fn max_cells(&self) -> u32 {
        self.max_cells
    }

    /// Half the side length of the map in world units.
    #[must_use]
    pub fn half_extent(&self) -> f32 {
        self.cell_size * self.max_cells as f32 / 2.0
    }

    fn axis_index(&self, value: f32) -> f32 {
        ((value + self.half_extent()) / self.cell_size).floor()
    }

    fn clamp_axis(&self, index: f32) -> u32 {
        if index.is_nan() || index < 0.0 {
            0
        } else {
            (index as u32).min(self.max_cells - 1)
        }
    }

    /// Cell containing `position`, or `None` if it lies outside the map.
    #[must_use]
    pub fn cell_of(&self, position: &Position) -> Option<CellCoord> {
        let x = self.axis_index(position.x);
        let y = self.axis_index(position.y);
        let max = self.max_cells as f32;
        if (0.0..max).contains(&x) && (0.0..max).contains(&y) {
            Some(CellCoord::new(x as u32, y as u32))
        } else {
            None
        }
    }

    /// Cell containing `position`, clamped onto the map border.
    #[must_use]
    pub fn cell_of_clamped(&self, position: &Position) -> CellCoord {
        CellCoord::new(
            self.clamp_axis(self.axis_index(position.x)),
            self.clamp_axis(self.axis_index(position.y)),
        )
    }

    /// Rectangle of cells overlapping the circle of `radius` around `center`.
    ///
    /// A radius of zero (or less) yields the single containing cell. The
    /// rectangle is clamped to the map, so it is never empty.
    #[must_use]
    pub fn area(&self, center: &Position, radius: f32) -> CellArea {
        if radius <= 0.0 {
            return CellArea::single(self.cell_of_clamped(center));
        }
        let low = Position::new(center.x - radius, center.y - radius, center.z);
        let high = Position::new(center.x + radius, center.y + radius, center.z);
        CellArea {
            low: self.cell_of_clamped(&low),
            high: self.cell_of_clamped(&high),
        }
    }

    /// Center point of a cell, at height zero.
    #[must_use]
    pub fn cell_center(&self, cell: CellCoord) -> Position {
        let half = self.half_extent();
        Position::new(
            (cell.x as f32 + 0.5).mul_add(self.cell_size, -half),
            (cell.y as f32 + 0.5).mul_add(self.cell_size, -half),
            0.0,
        )
    }
}

/// Inclusive rectangle of cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellArea {
    pub low: CellCoord,
    pub high: CellCoord,
}

impl CellArea {
    #[must_use]
    pub const fn single(cell: CellCoord) -> Self {
        Self {
            low: cell,
            high: cell,
        }
    }

    #[must_use]
    pub const fn contains(&self, cell: CellCoord) -> bool {
        cell.x >= self.low.x
            && cell.x <= self.high.x
            && cell.y >= self.low.y
            && cell.y <= self.high.y
    }

    /// Number of cells in the rectangle.
    #[must_use]
    pub const fn len(&self) -> usize {
        ((self.high.x - self.low.x + 1) * (self.high.y - self.low.y + 1)) as usize
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = CellCoord> + use<> {
        let Self { low, high } = *self;
        (low.y..=high.y).flat_map(move |y| (low.x..=high.x).map(move |x| CellCoord::new(x, y)))
    }
}
