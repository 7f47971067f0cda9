//! Object categories.
//!
//! The category set is closed: the grid keeps one bucket per kind and
//! visitors declare interest with a [`KindMask`].

use std::fmt;

/// Category of a world object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ObjectKind {
    Player = 0,
    Creature = 1,
    GameObject = 2,
    Corpse = 3,
    DynamicObject = 4,
    AreaTrigger = 5,
    SceneObject = 6,
    Conversation = 7,
}

impl ObjectKind {
    /// Number of kinds (and therefore buckets per cell).
    pub const COUNT: usize = 8;

    /// All kinds in bucket order.
    pub const ALL: [ObjectKind; Self::COUNT] = [
        Self::Player,
        Self::Creature,
        Self::GameObject,
        Self::Corpse,
        Self::DynamicObject,
        Self::AreaTrigger,
        Self::SceneObject,
        Self::Conversation,
    ];

    /// Bucket index of this kind.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Kind for a bucket index.
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Player),
            1 => Some(Self::Creature),
            2 => Some(Self::GameObject),
            3 => Some(Self::Corpse),
            4 => Some(Self::DynamicObject),
            5 => Some(Self::AreaTrigger),
            6 => Some(Self::SceneObject),
            7 => Some(Self::Conversation),
            _ => None,
        }
    }

    /// Single-kind mask.
    #[must_use]
    pub const fn mask(self) -> KindMask {
        KindMask::from_bits_retain(1 << self as u8)
    }

    #[must_use]
    pub const fn is_player(self) -> bool {
        matches!(self, Self::Player)
    }

    /// Kinds that are spawned from persisted data and have a home cell.
    #[must_use]
    pub const fn has_home(self) -> bool {
        matches!(self, Self::Creature | Self::GameObject)
    }

    /// Transient effect volumes that must not outlive their owner.
    #[must_use]
    pub const fn is_effect_volume(self) -> bool {
        matches!(self, Self::DynamicObject | Self::AreaTrigger)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Player => "player",
            Self::Creature => "creature",
            Self::GameObject => "gameobject",
            Self::Corpse => "corpse",
            Self::DynamicObject => "dynamicobject",
            Self::AreaTrigger => "areatrigger",
            Self::SceneObject => "sceneobject",
            Self::Conversation => "conversation",
        };
        f.write_str(name)
    }
}

bitflags::bitflags! {
    /// Set of object kinds a visitor or query is interested in.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct KindMask: u8 {
        const PLAYER = 1 << 0;
        const CREATURE = 1 << 1;
        const GAME_OBJECT = 1 << 2;
        const CORPSE = 1 << 3;
        const DYNAMIC_OBJECT = 1 << 4;
        const AREA_TRIGGER = 1 << 5;
        const SCENE_OBJECT = 1 << 6;
        const CONVERSATION = 1 << 7;

        /// Everything except players.
        const GRID = Self::CREATURE.bits()
            | Self::GAME_OBJECT.bits()
            | Self::CORPSE.bits()
            | Self::DYNAMIC_OBJECT.bits()
            | Self::AREA_TRIGGER.bits()
            | Self::SCENE_OBJECT.bits()
            | Self::CONVERSATION.bits();

        /// Players plus every grid kind.
        const WORLD = Self::PLAYER.bits() | Self::GRID.bits();
    }
}

impl KindMask {
    /// Check whether a kind is part of this mask.
    #[must_use]
    pub const fn includes(self, kind: ObjectKind) -> bool {
        self.contains(kind.mask())
    }

    /// Iterate the kinds in this mask, in bucket order.
    pub fn kinds(self) -> impl Iterator<Item = ObjectKind> {
        ObjectKind::ALL
            .into_iter()
            .filter(move |kind| self.includes(*kind))
    }
}

impl From<ObjectKind> for KindMask {
    fn from(kind: ObjectKind) -> Self {
        kind.mask()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_roundtrip() {
        for kind in ObjectKind::ALL {
            assert_eq!(ObjectKind::from_index(kind.index() as u8), Some(kind));
        }
        assert_eq!(ObjectKind::from_index(8), None);
    }

    #[test]
    fn test_single_kind_masks_are_distinct() {
        let mut seen = KindMask::empty();
        for kind in ObjectKind::ALL {
            assert!(!seen.intersects(kind.mask()));
            seen |= kind.mask();
        }
        assert_eq!(seen, KindMask::WORLD);
    }

    #[test]
    fn test_grid_mask_excludes_players() {
        assert!(!KindMask::GRID.includes(ObjectKind::Player));
        assert_eq!(KindMask::GRID.kinds().count(), ObjectKind::COUNT - 1);
    }

    #[test]
    fn test_mask_kinds_order() {
        let mask = KindMask::CONVERSATION | KindMask::PLAYER | KindMask::CORPSE;
        let kinds: Vec<_> = mask.kinds().collect();
        assert_eq!(
            kinds,
            [ObjectKind::Player, ObjectKind::Corpse, ObjectKind::Conversation]
        );
    }
}
