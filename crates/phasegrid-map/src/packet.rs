//! Update packets handed to the network layer.
//!
//! The map only decides *what* a client must learn; byte layout belongs to
//! whoever implements [`PacketSink`](crate::PacketSink).

use phasegrid_object::{ChangeMask, ObjectGuid, ObjectKind, Position, WorldObject};

use crate::MapId;

/// One object's entry in an update packet.
#[derive(Clone, Debug, PartialEq)]
pub enum UpdateBlock {
    /// Full creation payload: the client starts rendering the object.
    Create {
        guid: ObjectGuid,
        kind: ObjectKind,
        position: Position,
    },
    /// Field-level delta for an object the client already knows.
    Values { guid: ObjectGuid, changes: ChangeMask },
}

impl UpdateBlock {
    #[must_use]
    pub const fn guid(&self) -> ObjectGuid {
        match self {
            Self::Create { guid, .. } | Self::Values { guid, .. } => *guid,
        }
    }
}

/// Everything one player learns from one pass.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdatePacket {
    pub map: MapId,
    pub blocks: Vec<UpdateBlock>,
    /// Objects the client must stop rendering.
    pub out_of_range: Vec<ObjectGuid>,
}

impl UpdatePacket {
    #[must_use]
    pub const fn new(map: MapId) -> Self {
        Self {
            map,
            blocks: Vec::new(),
            out_of_range: Vec::new(),
        }
    }

    pub fn push_create(&mut self, object: &WorldObject) {
        self.blocks.push(UpdateBlock::Create {
            guid: object.guid(),
            kind: object.kind(),
            position: *object.position(),
        });
    }

    pub fn push_values(&mut self, guid: ObjectGuid, changes: ChangeMask) {
        self.blocks.push(UpdateBlock::Values { guid, changes });
    }

    pub fn push_out_of_range(&mut self, guid: ObjectGuid) {
        self.out_of_range.push(guid);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.out_of_range.is_empty()
    }

    /// Guids with a creation block.
    pub fn created(&self) -> impl Iterator<Item = ObjectGuid> + '_ {
        self.blocks.iter().filter_map(|block| match block {
            UpdateBlock::Create { guid, .. } => Some(*guid),
            UpdateBlock::Values { .. } => None,
        })
    }

    /// Guids with a values block.
    pub fn updated(&self) -> impl Iterator<Item = ObjectGuid> + '_ {
        self.blocks.iter().filter_map(|block| match block {
            UpdateBlock::Values { guid, .. } => Some(*guid),
            UpdateBlock::Create { .. } => None,
        })
    }
}
