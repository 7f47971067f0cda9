//! Movement: immediate and end-of-tick relocation.
//!
//! Moving an object mid-scan would reshuffle the bucket being visited, so
//! gameplay code normally calls [`Map::relocate`], which only records the
//! new position. [`Map::process_relocations`] then settles every mover at
//! a fixed point of the tick, however many times it moved.

use phasegrid_object::{ObjectGuid, Position, RelocationState};
use phasegrid_spatial::CellCoord;
use tracing::trace;

use crate::{Map, MapResult, PacketSink, VisibilityDiff};

impl<S: PacketSink> Map<S> {
    /// Record a move and defer reconciliation to the end of the tick.
    ///
    /// The new position is authoritative for distance checks right away;
    /// cell membership follows in [`Map::process_relocations`].
    pub fn relocate(&mut self, guid: ObjectGuid, position: Position) -> MapResult<()> {
        self.grid.cell_of(&position)?;
        let object = self.object_mut_or_err(guid)?;
        object.set_position(position);
        if object.relocation() != RelocationState::Relocating {
            object.set_relocation(RelocationState::Relocating);
            self.pending_relocations.push(guid);
        }
        Ok(())
    }

    /// Move an object and reconcile visibility immediately.
    pub fn notify_moved(&mut self, guid: ObjectGuid) -> MapResult<VisibilityDiff> {
        self.update_membership(guid)?;
        self.object_mut_or_err(guid)?
            .set_relocation(RelocationState::Reconciled);
        self.reconcile(guid)
    }

    /// Settle every queued mover.
    ///
    /// Cell membership is updated for all movers before any visibility
    /// pass runs, so each pass sees the final layout of the tick.
    pub fn process_relocations(&mut self) -> MapResult<VisibilityDiff> {
        let queued = std::mem::take(&mut self.pending_relocations);
        let movers: Vec<_> = queued
            .into_iter()
            .filter(|guid| {
                self.store
                    .get(*guid)
                    .is_some_and(|object| object.relocation() == RelocationState::Relocating)
            })
            .collect();

        for guid in &movers {
            if let Err(error) = self.update_membership(*guid) {
                self.requeue(&movers);
                return Err(error);
            }
        }

        let mut diff = VisibilityDiff::default();
        for (index, &guid) in movers.iter().enumerate() {
            // Reconciled in the meantime by an immediate move.
            let Some(object) = self.store.get_mut(guid) else {
                continue;
            };
            if object.relocation() != RelocationState::Relocating {
                continue;
            }
            object.set_relocation(RelocationState::Reconciled);
            match self.reconcile(guid) {
                Ok(settled) => diff.merge(settled),
                Err(error) => {
                    if let Some(object) = self.store.get_mut(guid) {
                        object.set_relocation(RelocationState::Relocating);
                    }
                    self.requeue(&movers[index..]);
                    return Err(error);
                }
            }
        }
        Ok(diff)
    }

    /// Put movers that are still unsettled back in the queue, ahead of
    /// anything queued since.
    fn requeue(&mut self, movers: &[ObjectGuid]) {
        let mut queue: Vec<_> = movers
            .iter()
            .copied()
            .filter(|guid| {
                self.store
                    .get(*guid)
                    .is_some_and(|object| object.relocation() == RelocationState::Relocating)
            })
            .collect();
        queue.extend(
            self.pending_relocations
                .drain(..)
                .filter(|guid| !movers.contains(guid)),
        );
        self.pending_relocations = queue;
    }

    /// Move grid membership to the cell of the object's current position,
    /// loading what the mover needs.
    ///
    /// Players, active objects and shared vision sources are viewpoints and
    /// load everything they can see into.
    fn update_membership(&mut self, guid: ObjectGuid) -> MapResult<Option<CellCoord>> {
        let object = self.object_or_err(guid)?;
        let position = *object.position();
        let is_viewpoint =
            guid.is_player() || object.is_active() || self.vision_links.contains_key(&guid);
        let cell = self.grid.cell_of(&position)?;
        self.ensure_loaded(cell)?;
        if is_viewpoint {
            self.ensure_area_loaded(&position)?;
        }
        let previous = self.grid.relocate(guid, cell)?;
        if let Some(from) = previous {
            trace!(%guid, %from, to = %cell, "changed cell");
        }
        Ok(previous)
    }
}
