//! Visibility reconciliation.
//!
//! A player's client set is the set of objects it renders. After anything
//! that can change what a player perceives (movement, phase change, a new
//! vision link) the set is recomputed and diffed:
//!
//! ```text
//!   old client set      current in-range, in-phase set
//!   ┌──────────┐        ┌──────────┐
//!   │  left  ┌─┼────────┼─┐ entered│
//!   │        │ │  kept  │ │        │
//!   └────────┼─┘        └─┼────────┘
//!            └────────────┘
//! ```
//!
//! `left` objects go out of range on the client, `entered` objects get a
//! full creation block, `kept` objects are left to change accumulation.
//! Reconciliation is symmetric: a moving player re-evaluates its own set,
//! and everyone around it re-evaluates the mover.

use hashbrown::{HashMap, HashSet};
use phasegrid_object::{KindMask, ObjectGuid, ObjectKind, Position, RelocationState, WorldObject};
use phasegrid_query::{InRange, ObjectListSearcher, Viewpoint};
use phasegrid_spatial::GridVisitor;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use tracing::trace;

use crate::{Map, MapError, MapResult, PacketSink, UpdatePacket};

/// `(observer, target)` pairs that changed during a pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VisibilityDiff {
    pub entered: Vec<(ObjectGuid, ObjectGuid)>,
    pub left: Vec<(ObjectGuid, ObjectGuid)>,
}

impl VisibilityDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.left.is_empty()
    }

    pub fn merge(&mut self, other: VisibilityDiff) {
        self.entered.extend(other.entered);
        self.left.extend(other.left);
    }
}

/// Finds every player that might perceive something in a region: players
/// standing there, and players seeing through an object standing there.
struct ObserverCollector<'a> {
    vision_links: &'a HashMap<ObjectGuid, SmallVec<[ObjectGuid; 2]>>,
    seen: FxHashSet<ObjectGuid>,
    found: Vec<ObjectGuid>,
}

impl ObserverCollector<'_> {
    fn add(&mut self, player: ObjectGuid) {
        if self.seen.insert(player) {
            self.found.push(player);
        }
    }
}

impl GridVisitor for ObserverCollector<'_> {
    fn interest(&self) -> KindMask {
        KindMask::WORLD
    }

    fn visit_objects(&mut self, kind: ObjectKind, guids: &[ObjectGuid]) {
        for &guid in guids {
            if kind.is_player() {
                self.add(guid);
            }
            if let Some(linked) = self.vision_links.get(&guid) {
                for &player in linked {
                    self.add(player);
                }
            }
        }
    }
}

impl<S: PacketSink> Map<S> {
    /// Points a player perceives from: its own position, then each vision
    /// source still in the world.
    fn viewpoints_of(&self, player: &WorldObject) -> SmallVec<[Position; 4]> {
        let mut points = SmallVec::new();
        points.push(*player.position());
        if let Some(view) = self.views.get(&player.guid()) {
            points.extend(
                view.vision_sources
                    .iter()
                    .filter_map(|source| self.store.get(*source))
                    .filter(|source| self.grid.contains(source.guid()))
                    .map(|source| *source.position()),
            );
        }
        points
    }

    /// Everything `player` should render right now.
    fn visible_set(&self, player: ObjectGuid) -> HashSet<ObjectGuid> {
        let mut visible = HashSet::new();
        let Some(observer) = self.store.get(player) else {
            return visible;
        };
        let range = self.config.visibility_range;
        let mode = self.config.distance_mode;

        for center in self.viewpoints_of(observer) {
            let others = |object: &WorldObject| object.guid() != player;
            let check = InRange::new(center, range, mode, others);
            let viewpoint = Viewpoint::of(observer);
            let mut searcher =
                ObjectListSearcher::new(&self.store, viewpoint, Self::VISIBLE_KINDS, check);
            self.grid.visit_region(&center, range, &mut searcher);
            visible.extend(searcher.into_results());
        }
        visible
    }

    /// Same rule as [`Self::visible_set`], for one pair.
    fn can_perceive(&self, player: ObjectGuid, target: ObjectGuid) -> bool {
        if player == target || !self.grid.contains(target) {
            return false;
        }
        let (Some(observer), Some(object)) = (self.store.get(player), self.store.get(target)) else {
            return false;
        };
        if !Self::VISIBLE_KINDS.includes(object.kind()) || !Viewpoint::of(observer).admits(object) {
            return false;
        }
        let range = self.config.visibility_range;
        let mode = self.config.distance_mode;
        self.viewpoints_of(observer)
            .iter()
            .any(|center| mode.within(center, object.position(), range))
    }

    /// Recompute a player's whole client set and send one packet with the
    /// difference.
    pub fn update_visibility_for_player(
        &mut self,
        player: ObjectGuid,
    ) -> MapResult<VisibilityDiff> {
        self.object_or_err(player)?;
        if !self.views.contains_key(&player) {
            return Err(MapError::NotAPlayer(player));
        }

        let current = self.visible_set(player);
        let Some(view) = self.views.get_mut(&player) else {
            return Err(MapError::NotAPlayer(player));
        };
        let mut left: Vec<_> = view.client_guids.difference(&current).copied().collect();
        let mut entered: Vec<_> = current.difference(&view.client_guids).copied().collect();
        view.client_guids = current;
        left.sort_unstable();
        entered.sort_unstable();

        let mut packet = UpdatePacket::new(self.id);
        for target in &left {
            packet.push_out_of_range(*target);
            self.forget_watcher(*target, player);
        }
        for target in &entered {
            self.watchers.entry(*target).or_default().insert(player);
            if let Some(object) = self.store.get(*target) {
                packet.push_create(object);
            }
        }
        self.send(player, packet);

        if !(left.is_empty() && entered.is_empty()) {
            trace!(%player, entered = entered.len(), left = left.len(), "client set updated");
        }
        Ok(VisibilityDiff {
            entered: entered.into_iter().map(|target| (player, target)).collect(),
            left: left.into_iter().map(|target| (player, target)).collect(),
        })
    }

    /// Re-evaluate one pair. Returns `Some(true)` if the target entered,
    /// `Some(false)` if it left.
    fn refresh_pair(&mut self, player: ObjectGuid, target: ObjectGuid) -> Option<bool> {
        let visible = self.can_perceive(player, target);
        let view = self.views.get_mut(&player)?;
        if view.client_guids.contains(&target) == visible {
            return None;
        }

        let mut packet = UpdatePacket::new(self.id);
        if visible {
            view.client_guids.insert(target);
            self.watchers.entry(target).or_default().insert(player);
            if let Some(object) = self.store.get(target) {
                packet.push_create(object);
            }
        } else {
            view.client_guids.remove(&target);
            self.forget_watcher(target, player);
            packet.push_out_of_range(target);
        }
        self.send(player, packet);
        Some(visible)
    }

    /// Players that may have to re-evaluate `target`: those around it now
    /// and those that rendered it before.
    fn observers_of(&self, target: ObjectGuid) -> Vec<ObjectGuid> {
        let mut collector = ObserverCollector {
            vision_links: &self.vision_links,
            seen: FxHashSet::default(),
            found: Vec::new(),
        };
        if let Some(object) = self.store.get(target) {
            if self.grid.contains(target) {
                self.grid
                    .visit_region(object.position(), self.config.visibility_range, &mut collector);
            }
        }
        let mut previous: Vec<_> = self.watchers_of(target).collect();
        previous.sort_unstable();
        for player in previous {
            collector.add(player);
        }
        collector.found
    }

    /// Every player around `target` re-evaluates it.
    ///
    /// Players still waiting for their own delayed relocation are skipped;
    /// their full pass covers `target`.
    pub fn update_visibility_of(&mut self, target: ObjectGuid) -> VisibilityDiff {
        let mut diff = VisibilityDiff::default();
        for player in self.observers_of(target) {
            if player == target {
                continue;
            }
            let relocating = self
                .store
                .get(player)
                .is_some_and(|object| object.relocation() == RelocationState::Relocating);
            if relocating {
                continue;
            }
            match self.refresh_pair(player, target) {
                Some(true) => diff.entered.push((player, target)),
                Some(false) => diff.left.push((player, target)),
                None => {}
            }
        }
        diff
    }

    /// Full reconciliation after `guid` moved or changed phase.
    ///
    /// A player re-evaluates its own set first, then everyone nearby
    /// re-evaluates the mover, then players seeing through the mover get
    /// a full pass since their viewpoint moved with it.
    pub fn reconcile(&mut self, guid: ObjectGuid) -> MapResult<VisibilityDiff> {
        self.object_or_err(guid)?;
        let mut diff = VisibilityDiff::default();
        if self.views.contains_key(&guid) {
            diff.merge(self.update_visibility_for_player(guid)?);
        }
        diff.merge(self.update_visibility_of(guid));

        let linked = self.vision_links.get(&guid).cloned().unwrap_or_default();
        for player in linked {
            let relocating = self
                .store
                .get(player)
                .is_some_and(|object| object.relocation() == RelocationState::Relocating);
            if !relocating {
                diff.merge(self.update_visibility_for_player(player)?);
            }
        }
        Ok(diff)
    }
}
