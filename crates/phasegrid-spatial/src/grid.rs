//! Cell partition of one map.

use hashbrown::HashMap;
use phasegrid_object::{ObjectGuid, ObjectKind, Position};
use tracing::trace;

use crate::visitor::visit_buckets;
use crate::{CellArea, CellCoord, GridError, GridGeometry, GridResult, GridVisitor};

/// Per-kind guid buckets of one loaded cell.
///
/// Bucket order is insertion order, perturbed by removals (the last member
/// takes the removed member's slot).
#[derive(Debug, Default)]
pub struct CellBuckets {
    buckets: [Vec<ObjectGuid>; ObjectKind::COUNT],
}

impl CellBuckets {
    /// Members of one kind.
    #[must_use]
    pub fn bucket(&self, kind: ObjectKind) -> &[ObjectGuid] {
        &self.buckets[kind.index()]
    }

    /// Total members across every bucket.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    #[must_use]
    pub fn has_players(&self) -> bool {
        !self.bucket(ObjectKind::Player).is_empty()
    }

    /// Every member, bucket by bucket.
    pub fn iter(&self) -> impl Iterator<Item = ObjectGuid> + '_ {
        self.buckets.iter().flatten().copied()
    }
}

/// Where an object sits: its cell and its index inside the kind bucket.
#[derive(Clone, Copy, Debug)]
struct Membership {
    cell: CellCoord,
    index: usize,
}

/// The cell partition of a map.
///
/// Only loaded cells have buckets. Every member is in exactly one bucket,
/// tracked by a reverse index so removal is O(1).
#[derive(Debug, Default)]
pub struct GridMap {
    geometry: GridGeometry,
    cells: HashMap<CellCoord, CellBuckets>,
    membership: HashMap<ObjectGuid, Membership>,
}

impl GridMap {
    #[must_use]
    pub fn new(geometry: GridGeometry) -> Self {
        Self {
            geometry,
            cells: HashMap::new(),
            membership: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// Cell containing `position`, or `OutOfBounds`.
    pub fn cell_of(&self, position: &Position) -> GridResult<CellCoord> {
        self.geometry
            .cell_of(position)
            .ok_or(GridError::OutOfBounds(*position))
    }

    /// Allocate buckets for a cell. Returns `false` if it was already loaded.
    pub fn load(&mut self, cell: CellCoord) -> bool {
        if self.cells.contains_key(&cell) {
            return false;
        }
        trace!(%cell, "cell buckets allocated");
        self.cells.insert(cell, CellBuckets::default());
        true
    }

    /// Drop a cell's buckets, forgetting every member still inside.
    ///
    /// Returns the buckets so the caller can see what was left behind.
    pub fn unload(&mut self, cell: CellCoord) -> Option<CellBuckets> {
        let buckets = self.cells.remove(&cell)?;
        for guid in buckets.iter() {
            self.membership.remove(&guid);
        }
        trace!(%cell, leftover = buckets.len(), "cell buckets released");
        Some(buckets)
    }

    #[must_use]
    pub fn is_loaded(&self, cell: CellCoord) -> bool {
        self.cells.contains_key(&cell)
    }

    /// Loaded cells in unspecified order.
    pub fn loaded_cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        self.cells.keys().copied()
    }

    #[must_use]
    pub fn cell(&self, cell: CellCoord) -> Option<&CellBuckets> {
        self.cells.get(&cell)
    }

    /// Add an object to a loaded cell's bucket for its kind.
    pub fn insert(&mut self, guid: ObjectGuid, cell: CellCoord) -> GridResult<()> {
        if let Some(existing) = self.membership.get(&guid) {
            return Err(GridError::AlreadyPresent {
                guid,
                cell: existing.cell,
            });
        }
        let buckets = self
            .cells
            .get_mut(&cell)
            .ok_or(GridError::CellNotLoaded(cell))?;

        let bucket = &mut buckets.buckets[guid.kind().index()];
        let index = bucket.len();
        bucket.push(guid);
        self.membership.insert(guid, Membership { cell, index });
        Ok(())
    }

    /// Remove an object from its cell. Returns the cell it was in.
    pub fn remove(&mut self, guid: ObjectGuid) -> GridResult<CellCoord> {
        let Membership { cell, index } = self
            .membership
            .remove(&guid)
            .ok_or(GridError::NotPresent(guid))?;

        let Some(buckets) = self.cells.get_mut(&cell) else {
            // Membership never outlives its cell; unload clears both.
            return Err(GridError::CellNotLoaded(cell));
        };
        let bucket = &mut buckets.buckets[guid.kind().index()];
        bucket.swap_remove(index);
        if let Some(moved) = bucket.get(index) {
            if let Some(entry) = self.membership.get_mut(moved) {
                entry.index = index;
            }
        }
        Ok(cell)
    }

    /// Move an object to another cell.
    ///
    /// Returns the previous cell, or `None` if the object already was in
    /// `cell`. The target is checked before anything changes, so a failed
    /// move leaves the object where it was.
    pub fn relocate(&mut self, guid: ObjectGuid, cell: CellCoord) -> GridResult<Option<CellCoord>> {
        let current = self.cell_containing(guid).ok_or(GridError::NotPresent(guid))?;
        if current == cell {
            return Ok(None);
        }
        if !self.is_loaded(cell) {
            return Err(GridError::CellNotLoaded(cell));
        }
        self.remove(guid)?;
        self.insert(guid, cell)?;
        Ok(Some(current))
    }

    /// Cell an object is a member of.
    #[must_use]
    pub fn cell_containing(&self, guid: ObjectGuid) -> Option<CellCoord> {
        self.membership.get(&guid).map(|membership| membership.cell)
    }

    #[must_use]
    pub fn contains(&self, guid: ObjectGuid) -> bool {
        self.membership.contains_key(&guid)
    }

    /// Number of members across all cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.membership.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.membership.is_empty()
    }

    /// Visit one cell. Unloaded cells are skipped.
    ///
    /// Returns `true` if the visitor asked to stop.
    pub fn visit_cell<V: GridVisitor + ?Sized>(&self, cell: CellCoord, visitor: &mut V) -> bool {
        match self.cells.get(&cell) {
            Some(buckets) => visit_buckets(buckets, visitor),
            None => false,
        }
    }

    /// Visit every loaded cell of a rectangle, row by row.
    pub fn visit_area<V: GridVisitor + ?Sized>(&self, area: CellArea, visitor: &mut V) -> bool {
        for cell in area.iter() {
            if self.visit_cell(cell, visitor) {
                return true;
            }
        }
        false
    }

    /// Visit the cells overlapping the circle of `radius` around `center`.
    /// The containing cell is always part of the region.
    pub fn visit_region<V: GridVisitor + ?Sized>(
        &self,
        center: &Position,
        radius: f32,
        visitor: &mut V,
    ) -> bool {
        self.visit_area(self.geometry.area(center, radius), visitor)
    }
}
