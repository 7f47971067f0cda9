//! Arena of spatial records.
//!
//! The grid never owns objects; it stores guids that resolve through this
//! store. Slots are recycled through a free list and their generation is
//! bumped on every despawn, so guids held by stale visitors simply stop
//! resolving.

use crate::{Generation, ObjectGuid, ObjectInit, SlotId, WorldObject};

/// One arena slot.
#[derive(Debug, Default)]
struct Slot {
    generation: Generation,
    object: Option<WorldObject>,
}

/// Owner of every [`WorldObject`] on a map.
#[derive(Debug, Default)]
pub struct ObjectStore {
    slots: Vec<Slot>,
    free_list: Vec<SlotId>,
    alive_count: u32,
}

impl ObjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::with_capacity(capacity / 4),
            alive_count: 0,
        }
    }

    /// Spawn a new object and return its guid.
    pub fn spawn(&mut self, init: ObjectInit) -> ObjectGuid {
        self.alive_count += 1;

        let slot_id = match self.free_list.pop() {
            Some(slot_id) => slot_id,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as SlotId
            }
        };

        let slot = &mut self.slots[slot_id as usize];
        let guid = ObjectGuid::new(init.kind, slot_id, slot.generation);
        slot.object = Some(WorldObject::new(guid, init));
        guid
    }

    /// Remove an object, making its slot available for reuse.
    ///
    /// Returns `None` if the guid is stale or unknown.
    pub fn despawn(&mut self, guid: ObjectGuid) -> Option<WorldObject> {
        self.get(guid)?;

        let slot = &mut self.slots[guid.slot() as usize];
        let object = slot.object.take();
        slot.generation = slot.generation.next();
        self.free_list.push(guid.slot());
        self.alive_count -= 1;
        object
    }

    #[must_use]
    pub fn get(&self, guid: ObjectGuid) -> Option<&WorldObject> {
        let slot = self.slots.get(guid.slot() as usize)?;
        if slot.generation != guid.generation() {
            return None;
        }
        slot.object.as_ref().filter(|object| object.guid() == guid)
    }

    #[must_use]
    pub fn get_mut(&mut self, guid: ObjectGuid) -> Option<&mut WorldObject> {
        let slot = self.slots.get_mut(guid.slot() as usize)?;
        if slot.generation != guid.generation() {
            return None;
        }
        slot.object.as_mut().filter(|object| object.guid() == guid)
    }

    #[must_use]
    pub fn contains(&self, guid: ObjectGuid) -> bool {
        self.get(guid).is_some()
    }

    /// Iterate live objects in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &WorldObject> {
        self.slots.iter().filter_map(|slot| slot.object.as_ref())
    }

    /// Number of live objects.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.alive_count as usize
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.alive_count == 0
    }

    /// Total slots, including recycled ones.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ObjectKind, Position};

    fn init(kind: ObjectKind) -> ObjectInit {
        ObjectInit::new(kind, Position::new(0.0, 0.0, 0.0))
    }

    #[test]
    fn test_spawn_assigns_slots() {
        let mut store = ObjectStore::new();

        let a = store.spawn(init(ObjectKind::Player));
        let b = store.spawn(init(ObjectKind::Creature));

        assert_eq!(a.slot(), 0);
        assert_eq!(b.slot(), 1);
        assert_eq!(b.kind(), ObjectKind::Creature);
        assert!(store.contains(a));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_despawn_invalidates_guid() {
        let mut store = ObjectStore::new();

        let a = store.spawn(init(ObjectKind::Creature));
        assert!(store.despawn(a).is_some());
        assert!(!store.contains(a));
        assert!(store.despawn(a).is_none());
        assert!(store.is_empty());

        // Slot is reused with a new generation
        let b = store.spawn(init(ObjectKind::Creature));
        assert_eq!(b.slot(), a.slot());
        assert_ne!(b.generation(), a.generation());
        assert!(store.get(a).is_none());
        assert!(store.get(b).is_some());
    }

    #[test]
    fn test_reused_slot_with_other_kind_rejects_old_guid() {
        let mut store = ObjectStore::new();

        let a = store.spawn(init(ObjectKind::Corpse));
        store.despawn(a);
        let b = store.spawn(init(ObjectKind::AreaTrigger));

        let forged = ObjectGuid::new(ObjectKind::Corpse, b.slot(), b.generation());
        assert!(store.get(forged).is_none());
    }

    #[test]
    fn test_iter_skips_free_slots() {
        let mut store = ObjectStore::with_capacity(4);
        let a = store.spawn(init(ObjectKind::Creature));
        let b = store.spawn(init(ObjectKind::GameObject));
        store.despawn(a);

        let live: Vec<_> = store.iter().map(WorldObject::guid).collect();
        assert_eq!(live, [b]);
        assert_eq!(store.capacity(), 2);
    }
}
