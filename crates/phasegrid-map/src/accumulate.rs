//! Change accumulation.
//!
//! Field-level changes are merged per object while the tick runs and
//! shipped once at the end. Each aware player gets at most one values
//! block per changed object, and at most one packet per flush, no matter
//! how many paths (own position, shared vision, far sight) lead to it.

use hashbrown::HashMap;
use phasegrid_object::{ChangeMask, KindMask, ObjectGuid, ObjectKind};
use phasegrid_spatial::GridVisitor;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::trace;

use crate::{Map, MapResult, PacketSink, PlayerView, UpdatePacket};

/// Collects the players that must hear about one object's change.
///
/// A player is reached either by standing in the region or through a chain
/// of vision links rooted at something in the region. It is served only if
/// its client renders the object, or if it is the object.
struct ChangeAccumulator<'a> {
    target: ObjectGuid,
    views: &'a HashMap<ObjectGuid, PlayerView>,
    vision_links: &'a HashMap<ObjectGuid, SmallVec<[ObjectGuid; 2]>>,
    served: FxHashSet<ObjectGuid>,
    recipients: Vec<ObjectGuid>,
}

impl<'a> ChangeAccumulator<'a> {
    fn new(
        target: ObjectGuid,
        views: &'a HashMap<ObjectGuid, PlayerView>,
        vision_links: &'a HashMap<ObjectGuid, SmallVec<[ObjectGuid; 2]>>,
    ) -> Self {
        Self {
            target,
            views,
            vision_links,
            served: FxHashSet::default(),
            recipients: Vec::new(),
        }
    }

    fn serve(&mut self, player: ObjectGuid) {
        if !self.served.insert(player) {
            return;
        }
        let aware = player == self.target
            || self
                .views
                .get(&player)
                .is_some_and(|view| view.has_at_client(self.target));
        if aware {
            self.recipients.push(player);
        }
    }

    /// Serve every player seeing through `source`, following chains.
    fn follow_links(&mut self, source: ObjectGuid) {
        let mut stack: SmallVec<[ObjectGuid; 8]> = SmallVec::new();
        stack.push(source);
        let mut expanded = FxHashSet::default();
        while let Some(next) = stack.pop() {
            if !expanded.insert(next) {
                continue;
            }
            let Some(linked) = self.vision_links.get(&next) else {
                continue;
            };
            for &player in linked {
                self.serve(player);
                stack.push(player);
            }
        }
    }
}

impl GridVisitor for ChangeAccumulator<'_> {
    fn interest(&self) -> KindMask {
        KindMask::WORLD
    }

    fn visit_players(&mut self, guids: &[ObjectGuid]) {
        for &player in guids {
            self.serve(player);
            self.follow_links(player);
        }
    }

    fn visit_objects(&mut self, _kind: ObjectKind, guids: &[ObjectGuid]) {
        for &guid in guids {
            self.follow_links(guid);
        }
    }
}

impl<S: PacketSink> Map<S> {
    /// Merge a field-level change into the object's pending mask.
    ///
    /// The object is queued for the next flush the first time it changes.
    pub fn notify_changed(&mut self, guid: ObjectGuid, changes: ChangeMask) -> MapResult<()> {
        if self.object_mut_or_err(guid)?.mark_changed(changes) {
            self.pending_changes.push(guid);
        }
        Ok(())
    }

    /// Ship every pending change. Returns the number of packets sent.
    pub fn send_object_updates(&mut self) -> usize {
        let queued = std::mem::take(&mut self.pending_changes);
        let mut order: Vec<ObjectGuid> = Vec::new();
        let mut batches: FxHashMap<ObjectGuid, UpdatePacket> = FxHashMap::default();

        for guid in queued {
            let Some(object) = self.store.get_mut(guid) else {
                continue;
            };
            let changes = object.take_changes();
            if changes.is_empty() || !self.grid.contains(guid) {
                continue;
            }
            let center = *object.position();

            let mut accumulator = ChangeAccumulator::new(guid, &self.views, &self.vision_links);
            self.grid
                .visit_region(&center, self.config.visibility_range, &mut accumulator);

            trace!(%guid, recipients = accumulator.recipients.len(), "change accumulated");
            for player in accumulator.recipients {
                let id = self.id;
                batches
                    .entry(player)
                    .or_insert_with(|| {
                        order.push(player);
                        UpdatePacket::new(id)
                    })
                    .push_values(guid, changes);
            }
        }

        let sent = order.len();
        for player in order {
            if let Some(packet) = batches.remove(&player) {
                self.send(player, packet);
            }
        }
        sent
    }
}
