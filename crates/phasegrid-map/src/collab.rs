//! Collaborators the map consumes but does not implement: network delivery,
//! persisted spawns, respawn timers and gameplay teardown.
//!
//! Each trait comes with a small in-memory implementation that the tests
//! and single-process tools use.

use hashbrown::HashMap;
use phasegrid_object::{ObjectGuid, ObjectKind, PhaseShift, Position, SpawnId, WorldObject};
use phasegrid_spatial::{CellCoord, GridGeometry};

use crate::{LoadError, UpdatePacket};

/// Delivery of finished update packets to a player's client.
pub trait PacketSink {
    fn send_packet(&mut self, player: ObjectGuid, packet: UpdatePacket);
}

/// Sink that keeps every packet, in send order.
#[derive(Debug, Default)]
pub struct PacketLog {
    sent: Vec<(ObjectGuid, UpdatePacket)>,
}

impl PacketLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sent(&self) -> &[(ObjectGuid, UpdatePacket)] {
        &self.sent
    }

    /// Packets sent to one player.
    pub fn packets_for(&self, player: ObjectGuid) -> impl Iterator<Item = &UpdatePacket> + '_ {
        self.sent
            .iter()
            .filter(move |(to, _)| *to == player)
            .map(|(_, packet)| packet)
    }

    /// Drain everything logged so far.
    pub fn take(&mut self) -> Vec<(ObjectGuid, UpdatePacket)> {
        std::mem::take(&mut self.sent)
    }

    pub fn clear(&mut self) {
        self.sent.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sent.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}

impl PacketSink for PacketLog {
    fn send_packet(&mut self, player: ObjectGuid, packet: UpdatePacket) {
        self.sent.push((player, packet));
    }
}

/// A persisted spawn row.
#[derive(Clone, Debug)]
pub struct SpawnRecord {
    pub spawn_id: SpawnId,
    pub kind: ObjectKind,
    /// Spawn point; also the object's home.
    pub position: Position,
    pub phase: PhaseShift,
    /// Only instantiated as per-player copies under a phase scope.
    pub personal: bool,
}

impl SpawnRecord {
    #[must_use]
    pub fn new(spawn_id: SpawnId, kind: ObjectKind, position: Position) -> Self {
        Self {
            spawn_id,
            kind,
            position,
            phase: PhaseShift::new(),
            personal: false,
        }
    }

    #[must_use]
    pub fn with_phase(mut self, phase: PhaseShift) -> Self {
        self.phase = phase;
        self
    }

    #[must_use]
    pub fn personal(mut self) -> Self {
        self.personal = true;
        self
    }
}

/// Lookup of persisted spawns by cell.
pub trait SpawnStore {
    /// Spawns whose spawn point lies in `cell`.
    fn spawn_ids(&self, cell: CellCoord) -> Vec<SpawnId>;

    fn load(&self, spawn_id: SpawnId) -> Result<SpawnRecord, LoadError>;
}

/// Spawn store backed by hash maps.
#[derive(Debug, Default)]
pub struct MemorySpawnStore {
    geometry: GridGeometry,
    by_cell: HashMap<CellCoord, Vec<SpawnId>>,
    records: HashMap<SpawnId, SpawnRecord>,
    corrupt: HashMap<SpawnId, String>,
}

impl MemorySpawnStore {
    /// `geometry` must match the map the store feeds.
    #[must_use]
    pub fn new(geometry: GridGeometry) -> Self {
        Self {
            geometry,
            ..Self::default()
        }
    }

    /// Add a record, indexed by the cell of its spawn point.
    ///
    /// Records outside the map are indexed under the clamped border cell;
    /// the loader rejects them.
    pub fn insert(&mut self, record: SpawnRecord) {
        let cell = self.geometry.cell_of_clamped(&record.position);
        self.by_cell.entry(cell).or_default().push(record.spawn_id);
        self.records.insert(record.spawn_id, record);
    }

    /// Index a spawn id without a usable row.
    pub fn insert_corrupt(
        &mut self,
        cell: CellCoord,
        spawn_id: SpawnId,
        reason: impl Into<String>,
    ) {
        self.by_cell.entry(cell).or_default().push(spawn_id);
        self.corrupt.insert(spawn_id, reason.into());
    }

    /// Index a spawn id whose row is gone.
    pub fn insert_dangling(&mut self, cell: CellCoord, spawn_id: SpawnId) {
        self.by_cell.entry(cell).or_default().push(spawn_id);
    }
}

impl SpawnStore for MemorySpawnStore {
    fn spawn_ids(&self, cell: CellCoord) -> Vec<SpawnId> {
        self.by_cell.get(&cell).cloned().unwrap_or_default()
    }

    fn load(&self, spawn_id: SpawnId) -> Result<SpawnRecord, LoadError> {
        if let Some(reason) = self.corrupt.get(&spawn_id) {
            return Err(LoadError::Corrupt {
                spawn_id,
                reason: reason.clone(),
            });
        }
        self.records
            .get(&spawn_id)
            .cloned()
            .ok_or(LoadError::Missing(spawn_id))
    }
}

/// Decides whether a persisted spawn should exist right now.
pub trait RespawnPolicy {
    fn should_spawn(&self, record: &SpawnRecord) -> bool;
}

/// Spawns everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysSpawn;

impl RespawnPolicy for AlwaysSpawn {
    fn should_spawn(&self, _record: &SpawnRecord) -> bool {
        true
    }
}

impl<F> RespawnPolicy for F
where
    F: Fn(&SpawnRecord) -> bool,
{
    fn should_spawn(&self, record: &SpawnRecord) -> bool {
        self(record)
    }
}

/// Gameplay callbacks run while a cell is torn down.
///
/// Objects are passed after the map has updated them, so flags already
/// reflect the stage.
pub trait LifecycleHooks {
    /// Object left an unloading cell for its home cell.
    fn on_evacuate(&mut self, object: &WorldObject, from: CellCoord, to: CellCoord) {
        let _ = (object, from, to);
    }

    fn on_combat_stop(&mut self, object: &WorldObject) {
        let _ = object;
    }

    /// Effect volume destroyed because its owner's cell is unloading.
    fn on_effect_removed(&mut self, effect: &WorldObject) {
        let _ = effect;
    }

    /// Release external resources held for the object.
    fn on_cleanup(&mut self, object: &WorldObject) {
        let _ = object;
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl LifecycleHooks for NoHooks {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_indexes_by_cell() {
        let geometry = GridGeometry::new(16.0, 10);
        let mut store = MemorySpawnStore::new(geometry);
        let near = Position::new(1.0, 1.0, 0.0);
        let far = Position::new(40.0, 1.0, 0.0);
        store.insert(SpawnRecord::new(SpawnId(1), ObjectKind::Creature, near));
        store.insert(SpawnRecord::new(SpawnId(2), ObjectKind::Creature, far));

        assert_eq!(store.spawn_ids(CellCoord::new(5, 5)), [SpawnId(1)]);
        assert_eq!(store.spawn_ids(CellCoord::new(7, 5)), [SpawnId(2)]);
        assert!(store.spawn_ids(CellCoord::new(0, 0)).is_empty());
    }

    #[test]
    fn test_memory_store_load_errors() {
        let mut store = MemorySpawnStore::new(GridGeometry::new(16.0, 10));
        let cell = CellCoord::new(1, 1);
        store.insert_corrupt(cell, SpawnId(9), "bad template");
        store.insert_dangling(cell, SpawnId(10));

        assert!(matches!(store.load(SpawnId(9)), Err(LoadError::Corrupt { .. })));
        assert_eq!(store.load(SpawnId(10)).unwrap_err(), LoadError::Missing(SpawnId(10)));
    }
}
