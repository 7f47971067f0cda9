//! The spatial record of a world object.

use std::fmt;

use crate::{ObjectGuid, ObjectKind, PhaseShift, Position};

/// Identity of a persisted spawn (the row an object was loaded from).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpawnId(pub u64);

impl fmt::Display for SpawnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "spawn#{}", self.0)
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ObjectFlags: u8 {
        /// Inserted into a map partition.
        const IN_WORLD = 1 << 0;
        /// Engaged in combat; stopped before its cell is torn down.
        const IN_COMBAT = 1 << 1;
        /// External resources released.
        const CLEANED = 1 << 2;
        /// Marked for removal; never returned by queries.
        const DESTROYED = 1 << 3;
        /// Keeps the cells around it relevant like a player would.
        const ACTIVE = 1 << 4;
    }
}

/// Where an object is in the relocation pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RelocationState {
    /// Has not moved since it entered the map.
    #[default]
    Stationary,
    /// Position changed; visibility not reconciled yet.
    Relocating,
    /// Visibility reconciled for the latest position.
    Reconciled,
}

/// Field groups changed since the last update broadcast.
///
/// The bit layout belongs to the gameplay layer; the spatial core only
/// merges and ships it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChangeMask(pub u64);

impl ChangeMask {
    pub const NONE: ChangeMask = ChangeMask(0);

    #[must_use]
    pub const fn bit(index: u32) -> Self {
        Self(1 << index)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Merge another mask in.
    pub fn merge(&mut self, other: ChangeMask) {
        self.0 |= other.0;
    }

    /// Take the accumulated mask, leaving it empty.
    pub fn take(&mut self) -> ChangeMask {
        std::mem::take(self)
    }
}

/// Everything needed to spawn an object into the store.
#[derive(Clone, Debug)]
pub struct ObjectInit {
    pub kind: ObjectKind,
    pub position: Position,
    pub phase: PhaseShift,
    pub home: Option<Position>,
    pub spawn_id: Option<SpawnId>,
    pub owner: Option<ObjectGuid>,
    pub flags: ObjectFlags,
}

impl ObjectInit {
    #[must_use]
    pub fn new(kind: ObjectKind, position: Position) -> Self {
        Self {
            kind,
            position,
            phase: PhaseShift::new(),
            home: None,
            spawn_id: None,
            owner: None,
            flags: ObjectFlags::empty(),
        }
    }

    #[must_use]
    pub fn with_phase(mut self, phase: PhaseShift) -> Self {
        self.phase = phase;
        self
    }

    /// Respawn point. Its cell is the object's logical home.
    #[must_use]
    pub fn with_home(mut self, home: Position) -> Self {
        self.home = Some(home);
        self
    }

    #[must_use]
    pub fn with_spawn_id(mut self, spawn_id: SpawnId) -> Self {
        self.spawn_id = Some(spawn_id);
        self
    }

    #[must_use]
    pub fn with_owner(mut self, owner: ObjectGuid) -> Self {
        self.owner = Some(owner);
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: ObjectFlags) -> Self {
        self.flags |= flags;
        self
    }
}

/// Spatial record of one object: position, phase, identity and the
/// bookkeeping the map needs to keep it in sync with observers.
#[derive(Clone, Debug)]
pub struct WorldObject {
    guid: ObjectGuid,
    position: Position,
    phase: PhaseShift,
    flags: ObjectFlags,
    relocation: RelocationState,
    home: Option<Position>,
    spawn_id: Option<SpawnId>,
    owner: Option<ObjectGuid>,
    pending_changes: ChangeMask,
}

impl WorldObject {
    #[must_use]
    pub fn new(guid: ObjectGuid, init: ObjectInit) -> Self {
        debug_assert_eq!(guid.kind(), init.kind, "guid kind must match init kind");
        Self {
            guid,
            position: init.position,
            phase: init.phase,
            flags: init.flags,
            relocation: RelocationState::Stationary,
            home: init.home,
            spawn_id: init.spawn_id,
            owner: init.owner,
            pending_changes: ChangeMask::NONE,
        }
    }

    #[must_use]
    pub const fn guid(&self) -> ObjectGuid {
        self.guid
    }

    #[must_use]
    pub const fn kind(&self) -> ObjectKind {
        self.guid.kind()
    }

    #[must_use]
    pub const fn position(&self) -> &Position {
        &self.position
    }

    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    #[must_use]
    pub const fn phase(&self) -> &PhaseShift {
        &self.phase
    }

    pub fn set_phase(&mut self, phase: PhaseShift) {
        self.phase = phase;
    }

    #[must_use]
    pub const fn flags(&self) -> ObjectFlags {
        self.flags
    }

    pub fn insert_flags(&mut self, flags: ObjectFlags) {
        self.flags |= flags;
    }

    pub fn remove_flags(&mut self, flags: ObjectFlags) {
        self.flags &= !flags;
    }

    #[must_use]
    pub const fn is_in_world(&self) -> bool {
        self.flags.contains(ObjectFlags::IN_WORLD)
    }

    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        self.flags.contains(ObjectFlags::DESTROYED)
    }

    #[must_use]
    pub const fn is_in_combat(&self) -> bool {
        self.flags.contains(ObjectFlags::IN_COMBAT)
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.flags.contains(ObjectFlags::ACTIVE)
    }

    /// In the world and not marked for removal.
    #[must_use]
    pub const fn is_perceivable(&self) -> bool {
        self.is_in_world() && !self.is_destroyed()
    }

    #[must_use]
    pub const fn relocation(&self) -> RelocationState {
        self.relocation
    }

    pub fn set_relocation(&mut self, state: RelocationState) {
        self.relocation = state;
    }

    #[must_use]
    pub const fn home(&self) -> Option<&Position> {
        self.home.as_ref()
    }

    #[must_use]
    pub const fn spawn_id(&self) -> Option<SpawnId> {
        self.spawn_id
    }

    #[must_use]
    pub const fn owner(&self) -> Option<ObjectGuid> {
        self.owner
    }

    #[must_use]
    pub const fn pending_changes(&self) -> ChangeMask {
        self.pending_changes
    }

    /// Merge a change. Returns `true` if the object had nothing pending before.
    pub fn mark_changed(&mut self, changes: ChangeMask) -> bool {
        let was_clean = self.pending_changes.is_empty();
        self.pending_changes.merge(changes);
        was_clean && !changes.is_empty()
    }

    /// Take the pending change mask.
    pub fn take_changes(&mut self) -> ChangeMask {
        self.pending_changes.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Generation;

    fn creature() -> WorldObject {
        let guid = ObjectGuid::new(ObjectKind::Creature, 0, Generation::new());
        WorldObject::new(
            guid,
            ObjectInit::new(ObjectKind::Creature, Position::new(1.0, 2.0, 3.0))
                .with_home(Position::new(0.0, 0.0, 0.0))
                .with_spawn_id(SpawnId(77)),
        )
    }

    #[test]
    fn test_change_mask_merge() {
        let mut object = creature();
        assert!(object.mark_changed(ChangeMask::bit(1)));
        assert!(!object.mark_changed(ChangeMask::bit(4)));
        assert_eq!(object.pending_changes(), ChangeMask(0b1_0010));
        assert_eq!(object.take_changes(), ChangeMask(0b1_0010));
        assert!(object.pending_changes().is_empty());
    }

    #[test]
    fn test_empty_change_is_not_queued() {
        let mut object = creature();
        assert!(!object.mark_changed(ChangeMask::NONE));
    }

    #[test]
    fn test_flags() {
        let mut object = creature();
        assert!(!object.is_perceivable());
        object.insert_flags(ObjectFlags::IN_WORLD | ObjectFlags::IN_COMBAT);
        assert!(object.is_perceivable());
        assert!(object.is_in_combat());
        object.remove_flags(ObjectFlags::IN_COMBAT);
        assert!(!object.is_in_combat());
        object.insert_flags(ObjectFlags::DESTROYED);
        assert!(!object.is_perceivable());
    }

    #[test]
    fn test_init_fields_carried() {
        let object = creature();
        assert_eq!(object.spawn_id(), Some(SpawnId(77)));
        assert_eq!(object.home(), Some(&Position::new(0.0, 0.0, 0.0)));
        assert_eq!(object.relocation(), RelocationState::Stationary);
    }
}
