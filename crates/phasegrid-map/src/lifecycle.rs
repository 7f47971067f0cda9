//! Cell lifecycle: loading persisted spawns and tearing cells down.
//!
//! ```text
//! Unloaded ─► Loading ─► Loaded ─► Evacuating ─► Stopping ─► Cleaning ─► Unloading ─► Unloaded
//! ```
//!
//! Every teardown stage is a full visitor sweep over the cell, and every
//! stage runs for every unload. A cell cannot be loaded again while a
//! later stage is in progress.

use hashbrown::HashSet;
use phasegrid_object::{
    KindMask, ObjectFlags, ObjectGuid, ObjectInit, ObjectKind, PhaseId, Position,
};
use phasegrid_spatial::{CellCoord, GridError, GridVisitor};
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::{Map, MapError, MapResult, PacketSink, SpawnRecord};

/// Where a cell is in its lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CellState {
    #[default]
    Unloaded,
    Loading,
    Loaded,
    /// Foreign spawns are sent back to their home cells.
    Evacuating,
    /// Combat and effect volumes are shut down.
    Stopping,
    /// Objects are marked destroyed and release external resources.
    Cleaning,
    /// Final removal from the partition.
    Unloading,
}

impl CellState {
    /// States in which a new load must be refused.
    #[must_use]
    pub const fn is_tearing_down(self) -> bool {
        matches!(
            self,
            Self::Evacuating | Self::Stopping | Self::Cleaning | Self::Unloading
        )
    }
}

/// Personal-copy scope for a cell load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhaseScope {
    /// Player the copies belong to.
    pub owner: ObjectGuid,
    /// Only personal records in one of these phases are loaded.
    pub phases: SmallVec<[PhaseId; 4]>,
}

impl PhaseScope {
    #[must_use]
    pub fn new(owner: ObjectGuid, phases: impl IntoIterator<Item = PhaseId>) -> Self {
        Self {
            owner,
            phases: phases.into_iter().collect(),
        }
    }
}

/// Outcome of [`Map::load_cell`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub cell: Option<CellCoord>,
    pub loaded: Vec<ObjectGuid>,
    /// Held back by the respawn policy.
    pub skipped: usize,
    /// Rows that failed to load or did not belong to the cell.
    pub failed: usize,
    /// Cell (or personal scope) was already loaded.
    pub already_loaded: bool,
}

/// Outcome of [`Map::unload_cell`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnloadReport {
    pub cell: Option<CellCoord>,
    /// Stages run, in order.
    pub stages: Vec<CellState>,
    pub evacuated: usize,
    pub combat_stopped: usize,
    pub effects_removed: usize,
    pub cleaned: usize,
    pub removed: usize,
}

/// Sweeps a cell's buckets for one teardown stage.
struct StageSweep {
    interest: KindMask,
    members: Vec<ObjectGuid>,
}

impl StageSweep {
    const fn new(interest: KindMask) -> Self {
        Self {
            interest,
            members: Vec::new(),
        }
    }
}

impl GridVisitor for StageSweep {
    fn interest(&self) -> KindMask {
        self.interest
    }

    fn visit_objects(&mut self, _kind: ObjectKind, guids: &[ObjectGuid]) {
        self.members.extend_from_slice(guids);
    }
}

impl<S: PacketSink> Map<S> {
    #[must_use]
    pub fn cell_state(&self, cell: CellCoord) -> CellState {
        self.cell_states.get(&cell).copied().unwrap_or_default()
    }

    /// Load a cell if it is not loaded yet.
    pub(crate) fn ensure_loaded(&mut self, cell: CellCoord) -> MapResult<()> {
        if self.cell_state(cell) == CellState::Unloaded {
            self.load_cell(cell, None)?;
        }
        Ok(())
    }

    /// Load every cell a viewpoint at `position` can see into.
    pub(crate) fn ensure_area_loaded(&mut self, position: &Position) -> MapResult<()> {
        let area = self
            .grid
            .geometry()
            .area(position, self.config.visibility_range);
        for cell in area.iter() {
            self.ensure_loaded(cell)?;
            self.cell_activity.insert(cell, self.tick);
        }
        Ok(())
    }

    /// Instantiate a cell's persisted spawns.
    ///
    /// Without a scope, shared spawns are loaded once. With a scope, the
    /// personal records matching its phases are loaded as copies owned by
    /// the scope's player, once per owner; the shared load runs first if
    /// needed. A scope matching nothing is a no-op.
    ///
    /// Rows that fail to load are logged and skipped.
    pub fn load_cell(
        &mut self,
        cell: CellCoord,
        scope: Option<PhaseScope>,
    ) -> MapResult<LoadReport> {
        let geometry = self.grid.geometry();
        if cell.x >= geometry.max_cells() || cell.y >= geometry.max_cells() {
            return Err(GridError::OutOfBounds(geometry.cell_center(cell)).into());
        }
        let state = self.cell_state(cell);
        if state.is_tearing_down() || state == CellState::Loading {
            return Err(MapError::CellBusy { cell, state });
        }

        let mut report = LoadReport {
            cell: Some(cell),
            ..LoadReport::default()
        };

        if state == CellState::Unloaded {
            self.cell_states.insert(cell, CellState::Loading);
            self.grid.load(cell);
            self.cell_activity.insert(cell, self.tick);
            self.load_records(cell, None, &mut report);
            self.cell_states.insert(cell, CellState::Loaded);
            debug!(
                %cell,
                loaded = report.loaded.len(),
                skipped = report.skipped,
                failed = report.failed,
                "cell loaded"
            );
        } else if scope.is_none() {
            report.already_loaded = true;
        }

        if let Some(scope) = scope {
            if self.personal_loads.insert((cell, scope.owner)) {
                let before = report.loaded.len();
                self.load_records(cell, Some(&scope), &mut report);
                let loaded = report.loaded.len() - before;
                debug!(%cell, owner = %scope.owner, loaded, "personal copies loaded");
            } else {
                report.already_loaded = true;
            }
        }
        Ok(report)
    }

    fn load_records(
        &mut self,
        cell: CellCoord,
        scope: Option<&PhaseScope>,
        report: &mut LoadReport,
    ) {
        for spawn_id in self.spawn_store.spawn_ids(cell) {
            let record = match self.spawn_store.load(spawn_id) {
                Ok(record) => record,
                Err(error) => {
                    warn!(%cell, %spawn_id, %error, "spawn failed to load");
                    report.failed += 1;
                    continue;
                }
            };
            if record.personal != scope.is_some() {
                continue;
            }
            if let Some(scope) = scope {
                if !record.phase.intersects(&scope.phases) {
                    continue;
                }
            }
            if record.kind.is_player() {
                warn!(%cell, %spawn_id, "player rows cannot be spawned from a cell");
                report.failed += 1;
                continue;
            }
            if self.grid.geometry().cell_of(&record.position) != Some(cell) {
                warn!(%cell, %spawn_id, "spawn point lies outside the cell");
                report.failed += 1;
                continue;
            }
            let owner = scope.map(|scope| scope.owner);
            if self.spawned.contains_key(&(spawn_id, owner)) {
                continue;
            }
            if !self.respawn.should_spawn(&record) {
                report.skipped += 1;
                continue;
            }
            if let Some(guid) = self.instantiate(cell, record, owner) {
                report.loaded.push(guid);
            }
        }
    }

    fn instantiate(
        &mut self,
        cell: CellCoord,
        record: SpawnRecord,
        owner: Option<ObjectGuid>,
    ) -> Option<ObjectGuid> {
        let spawn_id = record.spawn_id;
        let phase = match owner {
            Some(owner) => record.phase.personal_to(owner),
            None => record.phase,
        };
        let init = ObjectInit::new(record.kind, record.position)
            .with_phase(phase)
            .with_home(record.position)
            .with_spawn_id(spawn_id)
            .with_flags(ObjectFlags::IN_WORLD);

        let guid = self.store.spawn(init);
        if let Err(error) = self.grid.insert(guid, cell) {
            warn!(%cell, %spawn_id, %error, "spawn rejected by the grid");
            self.store.despawn(guid);
            return None;
        }
        self.spawned.insert((spawn_id, owner), guid);
        self.pending_visibility.push(guid);
        Some(guid)
    }

    /// Members of `cell` with a kind in `interest`, swept through the grid.
    fn sweep(&self, cell: CellCoord, interest: KindMask) -> Vec<ObjectGuid> {
        let mut sweep = StageSweep::new(interest);
        self.grid.visit_cell(cell, &mut sweep);
        sweep.members
    }

    /// Tear a cell down and release it.
    ///
    /// Refused while players stand in the cell. Stages run in a fixed order:
    ///
    /// 1. **Evacuating**: objects whose home is another loaded cell go home
    /// 2. **Stopping**: combat ends, effect volumes owned by members vanish
    /// 3. **Cleaning**: members are marked destroyed and cleaned up
    /// 4. **Unloading**: members leave every client and the partition
    pub fn unload_cell(&mut self, cell: CellCoord) -> MapResult<UnloadReport> {
        let state = self.cell_state(cell);
        match state {
            CellState::Loaded => {}
            CellState::Unloaded => {
                return Err(GridError::CellNotLoaded(cell).into());
            }
            _ => return Err(MapError::CellBusy { cell, state }),
        }
        if self.grid.cell(cell).is_some_and(|buckets| buckets.has_players()) {
            return Err(MapError::CellOccupied(cell));
        }

        let mut report = UnloadReport {
            cell: Some(cell),
            ..UnloadReport::default()
        };
        self.evacuate(cell, &mut report)?;
        self.stop(cell, &mut report)?;
        self.clean(cell, &mut report);
        self.release(cell, &mut report)?;

        debug!(
            %cell,
            evacuated = report.evacuated,
            cleaned = report.cleaned,
            removed = report.removed,
            "cell unloaded"
        );
        Ok(report)
    }

    fn enter_stage(&mut self, cell: CellCoord, stage: CellState, report: &mut UnloadReport) {
        self.cell_states.insert(cell, stage);
        report.stages.push(stage);
    }

    fn evacuate(&mut self, cell: CellCoord, report: &mut UnloadReport) -> MapResult<()> {
        self.enter_stage(cell, CellState::Evacuating, report);

        for guid in self.sweep(cell, KindMask::GRID) {
            let Some(home) = self.store.get(guid).and_then(|object| object.home().copied()) else {
                continue;
            };
            let Some(home_cell) = self.grid.geometry().cell_of(&home) else {
                continue;
            };
            if home_cell == cell || self.cell_state(home_cell) != CellState::Loaded {
                continue;
            }

            self.object_mut_or_err(guid)?.set_position(home);
            self.grid.relocate(guid, home_cell)?;
            if let Some(object) = self.store.get(guid) {
                self.hooks.on_evacuate(object, cell, home_cell);
            }
            self.reconcile(guid)?;
            report.evacuated += 1;
        }
        Ok(())
    }

    fn stop(&mut self, cell: CellCoord, report: &mut UnloadReport) -> MapResult<()> {
        self.enter_stage(cell, CellState::Stopping, report);

        let members = self.sweep(cell, KindMask::GRID);
        for guid in &members {
            let Some(object) = self.store.get_mut(*guid) else {
                continue;
            };
            if object.is_in_combat() {
                object.remove_flags(ObjectFlags::IN_COMBAT);
                self.hooks.on_combat_stop(object);
                report.combat_stopped += 1;
            }
        }

        let owners: HashSet<ObjectGuid> = members.into_iter().collect();
        let mut effects: Vec<ObjectGuid> = self
            .store
            .iter()
            .filter(|object| object.kind().is_effect_volume())
            .filter(|object| object.owner().is_some_and(|owner| owners.contains(&owner)))
            .map(|object| object.guid())
            .collect();
        effects.sort_unstable();
        for effect in effects {
            let removed = self.remove_object(effect)?;
            self.hooks.on_effect_removed(&removed);
            report.effects_removed += 1;
        }
        Ok(())
    }

    fn clean(&mut self, cell: CellCoord, report: &mut UnloadReport) {
        self.enter_stage(cell, CellState::Cleaning, report);

        for guid in self.sweep(cell, KindMask::GRID) {
            if self.clean_object(guid) {
                report.cleaned += 1;
            }
        }
    }

    /// Mark destroyed and run the cleanup hook once.
    fn clean_object(&mut self, guid: ObjectGuid) -> bool {
        let Some(object) = self.store.get_mut(guid) else {
            return false;
        };
        if object.flags().contains(ObjectFlags::CLEANED) {
            return false;
        }
        object.insert_flags(ObjectFlags::DESTROYED | ObjectFlags::CLEANED);
        self.hooks.on_cleanup(object);
        true
    }

    fn release(&mut self, cell: CellCoord, report: &mut UnloadReport) -> MapResult<()> {
        self.enter_stage(cell, CellState::Unloading, report);

        for guid in self.sweep(cell, KindMask::GRID) {
            // Anything that slipped in after the cleaning sweep.
            if self.clean_object(guid) {
                report.cleaned += 1;
            }
            self.remove_object(guid)?;
            report.removed += 1;
        }

        self.grid.unload(cell);
        self.cell_states.remove(&cell);
        self.cell_activity.remove(&cell);
        self.personal_loads.retain(|(loaded, _)| *loaded != cell);
        Ok(())
    }

    /// Unload cells that no viewpoint has been near for the configured
    /// delay. Returns how many were unloaded.
    pub(crate) fn unload_idle_cells(&mut self) -> MapResult<usize> {
        let delay = self.config.cell_unload_delay;
        if delay == 0 {
            return Ok(0);
        }

        let range = self.config.visibility_range;
        let mut covered = HashSet::new();
        for position in self.viewpoint_positions() {
            covered.extend(self.grid.geometry().area(&position, range).iter());
        }

        let mut loaded: Vec<CellCoord> = self.grid.loaded_cells().collect();
        loaded.sort_unstable();
        let mut unloaded = 0;
        for cell in loaded {
            if covered.contains(&cell) {
                self.cell_activity.insert(cell, self.tick);
                continue;
            }
            let last_active = self.cell_activity.get(&cell).copied().unwrap_or(self.tick);
            let occupied = self.grid.cell(cell).is_some_and(|buckets| buckets.has_players());
            if self.tick.saturating_sub(last_active) >= delay
                && !occupied
                && self.cell_state(cell) == CellState::Loaded
            {
                self.unload_cell(cell)?;
                unloaded += 1;
            }
        }
        Ok(unloaded)
    }
}

#[cfg(test)]
mod tests {
    use phasegrid_object::{PhaseShift, SpawnId};

    use super::*;
    use crate::{MapConfig, MapId, MemorySpawnStore, PacketLog};

    const BUSY: [CellState; 5] = [
        CellState::Loading,
        CellState::Evacuating,
        CellState::Stopping,
        CellState::Cleaning,
        CellState::Unloading,
    ];

    fn config() -> MapConfig {
        MapConfig {
            cell_size: 16.0,
            max_cells: 20,
            visibility_range: 30.0,
            ..MapConfig::default()
        }
    }

    fn new_map() -> Map<PacketLog> {
        let mut store = MemorySpawnStore::new(config().geometry());
        store.insert(SpawnRecord::new(
            SpawnId(1),
            ObjectKind::Creature,
            Position::new(4.0, 4.0, 0.0),
        ));
        Map::new(MapId(1), config(), PacketLog::new())
            .unwrap()
            .with_spawn_store(store)
    }

    #[test]
    fn test_busy_cell_refuses_load() {
        let cell = CellCoord::new(10, 10);
        for busy in BUSY {
            let mut map = new_map();
            map.cell_states.insert(cell, busy);

            let result = map.load_cell(cell, None);
            assert!(
                matches!(result, Err(MapError::CellBusy { state, .. }) if state == busy),
                "{busy:?}: {result:?}"
            );
            assert_eq!(map.cell_state(cell), busy);
            assert!(map.grid.cell(cell).is_none());
            assert_eq!(map.objects().count(), 0);
        }
    }

    #[test]
    fn test_busy_cell_refuses_personal_load() {
        let cell = CellCoord::new(10, 10);
        for busy in BUSY {
            let mut map = new_map();
            let corner = Position::new(-150.0, -150.0, 0.0);
            let owner = map.add_player(corner, PhaseShift::new()).unwrap();
            map.cell_states.insert(cell, busy);

            let scope = PhaseScope::new(owner, [PhaseId(1)]);
            let result = map.load_cell(cell, Some(scope));
            assert!(matches!(result, Err(MapError::CellBusy { .. })), "{busy:?}");
            assert!(map.personal_loads.is_empty());
        }
    }

    #[test]
    fn test_busy_cell_refuses_unload() {
        let cell = CellCoord::new(10, 10);
        for busy in BUSY {
            let mut map = new_map();
            map.load_cell(cell, None).unwrap();
            let spawned = map.objects().count();
            map.cell_states.insert(cell, busy);

            let result = map.unload_cell(cell);
            assert!(
                matches!(result, Err(MapError::CellBusy { state, .. }) if state == busy),
                "{busy:?}: {result:?}"
            );
            assert_eq!(map.cell_state(cell), busy);
            assert!(map.grid.cell(cell).is_some());
            assert_eq!(map.objects().count(), spawned);
        }
    }

    #[test]
    fn test_cell_reloads_after_teardown_completes() {
        let cell = CellCoord::new(10, 10);
        let mut map = new_map();
        let first = map.load_cell(cell, None).unwrap();
        assert_eq!(first.loaded.len(), 1);

        let report = map.unload_cell(cell).unwrap();
        assert_eq!(
            report.stages,
            [
                CellState::Evacuating,
                CellState::Stopping,
                CellState::Cleaning,
                CellState::Unloading,
            ]
        );
        assert_eq!(map.cell_state(cell), CellState::Unloaded);
        assert!(matches!(
            map.unload_cell(cell),
            Err(MapError::Grid(GridError::CellNotLoaded(_)))
        ));

        let second = map.load_cell(cell, None).unwrap();
        assert_eq!(second.loaded.len(), 1);
        assert_eq!(map.cell_state(cell), CellState::Loaded);
    }
}
