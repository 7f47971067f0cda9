//! Kind-dispatched cell visitors.
//!
//! A visitor declares which kinds it cares about through
//! [`GridVisitor::interest`] and overrides the handlers for those kinds.
//! The grid only calls a handler when the kind is in the interest mask and
//! the bucket is non-empty, so a creature search never touches a corpse
//! bucket.
//!
//! Every per-kind handler defaults to [`GridVisitor::visit_objects`], which
//! itself does nothing. Visitors that treat all kinds alike override just
//! `visit_objects`; visitors with kind-specific behavior override the
//! individual handlers.
//!
//! # Example
//!
//! ```ignore
//! struct CountCreatures(usize);
//!
//! impl GridVisitor for CountCreatures {
//!     fn interest(&self) -> KindMask {
//!         KindMask::CREATURE
//!     }
//!
//!     fn visit_creatures(&mut self, guids: &[ObjectGuid]) {
//!         self.0 += guids.len();
//!     }
//! }
//! ```

use phasegrid_object::{KindMask, ObjectGuid, ObjectKind};

use crate::CellBuckets;

pub trait GridVisitor {
    /// Kinds this visitor wants to see.
    fn interest(&self) -> KindMask;

    /// Stop the current scan after the bucket being visited.
    fn is_done(&self) -> bool {
        false
    }

    /// Fallback for every kind without its own override.
    fn visit_objects(&mut self, kind: ObjectKind, guids: &[ObjectGuid]) {
        let _ = (kind, guids);
    }

    fn visit_players(&mut self, guids: &[ObjectGuid]) {
        self.visit_objects(ObjectKind::Player, guids);
    }

    fn visit_creatures(&mut self, guids: &[ObjectGuid]) {
        self.visit_objects(ObjectKind::Creature, guids);
    }

    fn visit_game_objects(&mut self, guids: &[ObjectGuid]) {
        self.visit_objects(ObjectKind::GameObject, guids);
    }

    fn visit_corpses(&mut self, guids: &[ObjectGuid]) {
        self.visit_objects(ObjectKind::Corpse, guids);
    }

    fn visit_dynamic_objects(&mut self, guids: &[ObjectGuid]) {
        self.visit_objects(ObjectKind::DynamicObject, guids);
    }

    fn visit_area_triggers(&mut self, guids: &[ObjectGuid]) {
        self.visit_objects(ObjectKind::AreaTrigger, guids);
    }

    fn visit_scene_objects(&mut self, guids: &[ObjectGuid]) {
        self.visit_objects(ObjectKind::SceneObject, guids);
    }

    fn visit_conversations(&mut self, guids: &[ObjectGuid]) {
        self.visit_objects(ObjectKind::Conversation, guids);
    }
}

/// Route one bucket to the matching handler.
fn dispatch<V: GridVisitor + ?Sized>(visitor: &mut V, kind: ObjectKind, guids: &[ObjectGuid]) {
    match kind {
        ObjectKind::Player => visitor.visit_players(guids),
        ObjectKind::Creature => visitor.visit_creatures(guids),
        ObjectKind::GameObject => visitor.visit_game_objects(guids),
        ObjectKind::Corpse => visitor.visit_corpses(guids),
        ObjectKind::DynamicObject => visitor.visit_dynamic_objects(guids),
        ObjectKind::AreaTrigger => visitor.visit_area_triggers(guids),
        ObjectKind::SceneObject => visitor.visit_scene_objects(guids),
        ObjectKind::Conversation => visitor.visit_conversations(guids),
    }
}

/// Visit every interesting, non-empty bucket of one cell.
///
/// Returns `true` if the visitor asked to stop.
pub(crate) fn visit_buckets<V: GridVisitor + ?Sized>(
    buckets: &CellBuckets,
    visitor: &mut V,
) -> bool {
    let interest = visitor.interest();
    for kind in interest.kinds() {
        let guids = buckets.bucket(kind);
        if guids.is_empty() {
            continue;
        }
        dispatch(visitor, kind, guids);
        if visitor.is_done() {
            return true;
        }
    }
    false
}
