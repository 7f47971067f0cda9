//! Object identifiers with generational slots.
//!
//! A guid names a slot in the [`ObjectStore`](crate::ObjectStore) plus the
//! generation that slot had when the object was spawned. Recycled slots bump
//! their generation, so a stale guid never resolves to a newer object.

use std::fmt;

use crate::ObjectKind;

/// Generation counter to detect stale object references.
/// Incremented each time a slot is recycled.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Generation(u32);

impl Generation {
    /// Largest generation that fits in a packed guid.
    const MAX: u32 = (1 << 24) - 1;

    /// Create a new generation (starts at 0).
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Next generation, wrapping inside the 24 bits a packed guid keeps.
    #[must_use]
    pub const fn next(self) -> Self {
        Self((self.0 + 1) & Self::MAX)
    }

    /// Get the raw generation value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen{}", self.0)
    }
}

/// Raw slot index into the object store.
pub type SlotId = u32;

/// Stable identity of a world object.
///
/// Packed layout (see [`ObjectGuid::to_bits`]):
///
/// ```text
///  63      56 55              32 31                    0
/// ┌──────────┬──────────────────┬───────────────────────┐
/// │   kind   │    generation    │         slot          │
/// └──────────┴──────────────────┴───────────────────────┘
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectGuid {
    kind: ObjectKind,
    generation: u32,
    slot: SlotId,
}

impl ObjectGuid {
    #[must_use]
    pub const fn new(kind: ObjectKind, slot: SlotId, generation: Generation) -> Self {
        Self {
            kind,
            generation: generation.0,
            slot,
        }
    }

    #[must_use]
    pub const fn kind(self) -> ObjectKind {
        self.kind
    }

    #[must_use]
    pub const fn slot(self) -> SlotId {
        self.slot
    }

    #[must_use]
    pub const fn generation(self) -> Generation {
        Generation(self.generation)
    }

    #[must_use]
    pub const fn is_player(self) -> bool {
        self.kind.is_player()
    }

    /// Pack into a single u64 for transmission.
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        ((self.kind as u64) << 56) | ((self.generation as u64) << 32) | (self.slot as u64)
    }

    /// Unpack from a u64. Returns `None` for an unknown kind tag.
    #[must_use]
    pub const fn from_bits(bits: u64) -> Option<Self> {
        let Some(kind) = ObjectKind::from_index((bits >> 56) as u8) else {
            return None;
        };
        Some(Self {
            kind,
            generation: ((bits >> 32) as u32) & Generation::MAX,
            slot: bits as u32,
        })
    }
}

impl fmt::Debug for ObjectGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({}v{})", self.kind, self.slot, self.generation)
    }
}

impl fmt::Display for ObjectGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}v{}", self.kind, self.slot, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guid_bits_roundtrip() {
        let guid = ObjectGuid::new(ObjectKind::AreaTrigger, 12345, Generation(6789));
        let recovered = ObjectGuid::from_bits(guid.to_bits()).unwrap();
        assert_eq!(guid, recovered);
        assert_eq!(recovered.kind(), ObjectKind::AreaTrigger);
    }

    #[test]
    fn test_unknown_kind_tag_rejected() {
        assert_eq!(ObjectGuid::from_bits(0xFF00_0000_0000_0001), None);
    }

    #[test]
    fn test_generation_wraps_in_packed_range() {
        let last = Generation(Generation::MAX);
        assert_eq!(last.next(), Generation::new());
    }

    #[test]
    fn test_debug_format() {
        let guid = ObjectGuid::new(ObjectKind::Creature, 3, Generation(1));
        assert_eq!(format!("{guid:?}"), "Creature(3v1)");
        assert_eq!(guid.to_string(), "creature-3v1");
    }
}
