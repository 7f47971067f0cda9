//! One map instance: objects, grid, player views and the tick entry point.

use std::fmt;

use hashbrown::{HashMap, HashSet};
use phasegrid_object::{
    KindMask, ObjectFlags, ObjectGuid, ObjectInit, ObjectKind, ObjectStore, PhaseShift, Position,
    SpawnId, WorldObject,
};
use phasegrid_query::{ObjectCheck, QueryContext, QueryOrigin};
use phasegrid_spatial::{CellCoord, GridMap};
use smallvec::SmallVec;
use tracing::{debug, debug_span};

use crate::{
    AlwaysSpawn, CellState, LifecycleHooks, MapConfig, MapError, MapResult, MemorySpawnStore,
    NoHooks, PacketSink, RespawnPolicy, SpawnStore, UpdatePacket, VisibilityDiff,
};

/// Identifier of a map instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MapId(pub u32);

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "map#{}", self.0)
    }
}

/// What a player's client currently renders, and the extra viewpoints it
/// perceives from.
#[derive(Debug, Default)]
pub struct PlayerView {
    pub(crate) client_guids: HashSet<ObjectGuid>,
    pub(crate) vision_sources: SmallVec<[ObjectGuid; 2]>,
}

impl PlayerView {
    /// Objects the client has been told to render.
    #[must_use]
    pub fn client_guids(&self) -> &HashSet<ObjectGuid> {
        &self.client_guids
    }

    /// Objects this player also sees through (shared vision, far sight).
    #[must_use]
    pub fn vision_sources(&self) -> &[ObjectGuid] {
        &self.vision_sources
    }

    #[must_use]
    pub fn has_at_client(&self, guid: ObjectGuid) -> bool {
        self.client_guids.contains(&guid)
    }
}

/// Summary of one [`Map::update`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub relocated: usize,
    pub entered: usize,
    pub left: usize,
    pub updates_sent: usize,
    pub cells_unloaded: usize,
}

/// A map instance.
///
/// Owns the object arena, the cell partition and every player's view.
/// All mutation happens through `&mut self`, so a map is driven by exactly
/// one thread at a time; separate maps tick in parallel through
/// [`MapManager`](crate::MapManager).
pub struct Map<S> {
    pub(crate) id: MapId,
    pub(crate) config: MapConfig,
    pub(crate) store: ObjectStore,
    pub(crate) grid: GridMap,
    pub(crate) views: HashMap<ObjectGuid, PlayerView>,
    /// Reverse index of client sets: object -> players rendering it.
    pub(crate) watchers: HashMap<ObjectGuid, HashSet<ObjectGuid>>,
    /// Viewpoint source -> players perceiving through it.
    pub(crate) vision_links: HashMap<ObjectGuid, SmallVec<[ObjectGuid; 2]>>,
    pub(crate) cell_states: HashMap<CellCoord, CellState>,
    pub(crate) personal_loads: HashSet<(CellCoord, ObjectGuid)>,
    /// Live instance of each spawn row, keyed with the personal owner.
    pub(crate) spawned: HashMap<(SpawnId, Option<ObjectGuid>), ObjectGuid>,
    pub(crate) pending_relocations: Vec<ObjectGuid>,
    /// Objects loaded this tick whose observers are not settled yet.
    pub(crate) pending_visibility: Vec<ObjectGuid>,
    pub(crate) pending_changes: Vec<ObjectGuid>,
    /// Last tick a viewpoint was near each loaded cell.
    pub(crate) cell_activity: HashMap<CellCoord, u64>,
    pub(crate) tick: u64,
    pub(crate) sink: S,
    pub(crate) spawn_store: Box<dyn SpawnStore + Send>,
    pub(crate) respawn: Box<dyn RespawnPolicy + Send>,
    pub(crate) hooks: Box<dyn LifecycleHooks + Send>,
}

impl<S> fmt::Debug for Map<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Map")
            .field("id", &self.id)
            .field("tick", &self.tick)
            .field("objects", &self.store.len())
            .field("players", &self.views.len())
            .field("loaded_cells", &self.cell_states.len())
            .finish_non_exhaustive()
    }
}

impl<S: PacketSink> Map<S> {
    /// Create an empty map with no persisted spawns.
    pub fn new(id: MapId, config: MapConfig, sink: S) -> MapResult<Self> {
        config.validate()?;
        let geometry = config.geometry();
        Ok(Self {
            id,
            grid: GridMap::new(geometry),
            spawn_store: Box::new(MemorySpawnStore::new(geometry)),
            config,
            store: ObjectStore::new(),
            views: HashMap::new(),
            watchers: HashMap::new(),
            vision_links: HashMap::new(),
            cell_states: HashMap::new(),
            personal_loads: HashSet::new(),
            spawned: HashMap::new(),
            pending_relocations: Vec::new(),
            pending_visibility: Vec::new(),
            pending_changes: Vec::new(),
            cell_activity: HashMap::new(),
            tick: 0,
            sink,
            respawn: Box::new(AlwaysSpawn),
            hooks: Box::new(NoHooks),
        })
    }

    #[must_use]
    pub fn with_spawn_store(mut self, spawn_store: impl SpawnStore + Send + 'static) -> Self {
        self.spawn_store = Box::new(spawn_store);
        self
    }

    #[must_use]
    pub fn with_respawn_policy(mut self, policy: impl RespawnPolicy + Send + 'static) -> Self {
        self.respawn = Box::new(policy);
        self
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: impl LifecycleHooks + Send + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    #[must_use]
    pub const fn id(&self) -> MapId {
        self.id
    }

    #[must_use]
    pub const fn config(&self) -> &MapConfig {
        &self.config
    }

    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    #[must_use]
    pub const fn grid(&self) -> &GridMap {
        &self.grid
    }

    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    #[must_use]
    pub fn object(&self, guid: ObjectGuid) -> Option<&WorldObject> {
        self.store.get(guid)
    }

    /// Live objects, players included.
    pub fn objects(&self) -> impl Iterator<Item = &WorldObject> {
        self.store.iter()
    }

    #[must_use]
    pub fn view(&self, player: ObjectGuid) -> Option<&PlayerView> {
        self.views.get(&player)
    }

    /// Players currently rendering `guid`.
    pub fn watchers_of(&self, guid: ObjectGuid) -> impl Iterator<Item = ObjectGuid> + '_ {
        self.watchers.get(&guid).into_iter().flatten().copied()
    }

    #[must_use]
    pub fn spawned_instance(
        &self,
        spawn_id: SpawnId,
        owner: Option<ObjectGuid>,
    ) -> Option<ObjectGuid> {
        self.spawned.get(&(spawn_id, owner)).copied()
    }

    pub(crate) fn object_or_err(&self, guid: ObjectGuid) -> MapResult<&WorldObject> {
        self.store.get(guid).ok_or(MapError::UnknownObject(guid))
    }

    pub(crate) fn object_mut_or_err(&mut self, guid: ObjectGuid) -> MapResult<&mut WorldObject> {
        self.store.get_mut(guid).ok_or(MapError::UnknownObject(guid))
    }

    /// Deliver a packet unless it is empty.
    pub(crate) fn send(&mut self, player: ObjectGuid, packet: UpdatePacket) {
        if !packet.is_empty() {
            self.sink.send_packet(player, packet);
        }
    }

    // ==================== Object Management ====================

    /// Put a new object on the map.
    ///
    /// The containing cell is loaded if needed; for players, every cell of
    /// the visibility area is. Observers learn about the object right away,
    /// and a player gets its initial client set.
    pub fn add_object(&mut self, init: ObjectInit) -> MapResult<ObjectGuid> {
        let cell = self.grid.cell_of(&init.position)?;
        self.ensure_loaded(cell)?;
        if init.kind.is_player() || init.flags.contains(ObjectFlags::ACTIVE) {
            self.ensure_area_loaded(&init.position)?;
        }

        let spawn_key = init.spawn_id.map(|id| (id, init.phase.personal_owner()));
        let guid = self.store.spawn(init.with_flags(ObjectFlags::IN_WORLD));
        self.grid.insert(guid, cell)?;
        if let Some(key) = spawn_key {
            self.spawned.insert(key, guid);
        }
        if guid.is_player() {
            self.views.insert(guid, PlayerView::default());
        }

        debug!(%guid, %cell, "object added");
        self.reconcile(guid)?;
        Ok(guid)
    }

    pub fn add_player(&mut self, position: Position, phase: PhaseShift) -> MapResult<ObjectGuid> {
        self.add_object(ObjectInit::new(ObjectKind::Player, position).with_phase(phase))
    }

    /// Take an object off the map.
    ///
    /// Every client rendering it is told it went out of range. A player's
    /// own view and vision links are torn down, and players that saw
    /// through the object get a fresh visibility pass.
    pub fn remove_object(&mut self, guid: ObjectGuid) -> MapResult<WorldObject> {
        let object = self.object_or_err(guid)?;
        let spawn_key = object.spawn_id().map(|id| (id, object.phase().personal_owner()));

        self.retract_from_watchers(guid);

        if let Some(view) = self.views.remove(&guid) {
            for known in &view.client_guids {
                self.forget_watcher(*known, guid);
            }
            for source in &view.vision_sources {
                self.unlink_vision(*source, guid);
            }
        }

        let relinked = self.vision_links.remove(&guid).unwrap_or_default();
        for player in &relinked {
            if let Some(view) = self.views.get_mut(player) {
                view.vision_sources.retain(|source| *source != guid);
            }
        }

        if let Some(key) = spawn_key {
            if self.spawned.get(&key) == Some(&guid) {
                self.spawned.remove(&key);
            }
        }
        if self.grid.contains(guid) {
            self.grid.remove(guid)?;
        }
        let object = self.store.despawn(guid).ok_or(MapError::UnknownObject(guid))?;
        debug!(%guid, "object removed");

        for player in relinked {
            self.update_visibility_for_player(player)?;
        }
        Ok(object)
    }

    /// Tell every client rendering `guid` that it is gone.
    pub(crate) fn retract_from_watchers(&mut self, guid: ObjectGuid) {
        let Some(watchers) = self.watchers.remove(&guid) else {
            return;
        };
        let mut watchers: Vec<_> = watchers.into_iter().collect();
        watchers.sort_unstable();
        for player in watchers {
            if let Some(view) = self.views.get_mut(&player) {
                view.client_guids.remove(&guid);
            }
            let mut packet = UpdatePacket::new(self.id);
            packet.push_out_of_range(guid);
            self.send(player, packet);
        }
    }

    pub(crate) fn forget_watcher(&mut self, target: ObjectGuid, player: ObjectGuid) {
        if let Some(watchers) = self.watchers.get_mut(&target) {
            watchers.remove(&player);
            if watchers.is_empty() {
                self.watchers.remove(&target);
            }
        }
    }

    fn unlink_vision(&mut self, source: ObjectGuid, player: ObjectGuid) {
        if let Some(linked) = self.vision_links.get_mut(&source) {
            linked.retain(|linked| *linked != player);
            if linked.is_empty() {
                self.vision_links.remove(&source);
            }
        }
    }

    /// Replace an object's phase shift and reconcile visibility for it.
    pub fn set_phase(
        &mut self,
        guid: ObjectGuid,
        phase: PhaseShift,
    ) -> MapResult<VisibilityDiff> {
        self.object_mut_or_err(guid)?.set_phase(phase);
        self.reconcile(guid)
    }

    pub fn set_in_combat(&mut self, guid: ObjectGuid, in_combat: bool) -> MapResult<()> {
        let object = self.object_mut_or_err(guid)?;
        if in_combat {
            object.insert_flags(ObjectFlags::IN_COMBAT);
        } else {
            object.remove_flags(ObjectFlags::IN_COMBAT);
        }
        Ok(())
    }

    /// Active objects keep the cells around them loaded like a player.
    pub fn set_active(&mut self, guid: ObjectGuid, active: bool) -> MapResult<()> {
        let object = self.object_mut_or_err(guid)?;
        if !active {
            object.remove_flags(ObjectFlags::ACTIVE);
            return Ok(());
        }
        object.insert_flags(ObjectFlags::ACTIVE);
        let position = *object.position();
        self.ensure_area_loaded(&position)
    }

    /// Let `player` also perceive from `source`'s position.
    pub fn share_vision(
        &mut self,
        source: ObjectGuid,
        player: ObjectGuid,
    ) -> MapResult<VisibilityDiff> {
        let position = *self.object_or_err(source)?.position();
        let view = self.views.get_mut(&player).ok_or(MapError::NotAPlayer(player))?;
        if source == player || view.vision_sources.contains(&source) {
            return Ok(VisibilityDiff::default());
        }
        view.vision_sources.push(source);
        self.vision_links.entry(source).or_default().push(player);

        self.ensure_area_loaded(&position)?;
        self.update_visibility_for_player(player)
    }

    pub fn unshare_vision(
        &mut self,
        source: ObjectGuid,
        player: ObjectGuid,
    ) -> MapResult<VisibilityDiff> {
        let view = self.views.get_mut(&player).ok_or(MapError::NotAPlayer(player))?;
        let before = view.vision_sources.len();
        view.vision_sources.retain(|linked| *linked != source);
        if view.vision_sources.len() == before {
            return Ok(VisibilityDiff::default());
        }
        self.unlink_vision(source, player);
        self.update_visibility_for_player(player)
    }

    // ==================== Queries ====================

    /// Read-only query view using this map's distance mode.
    #[must_use]
    pub fn query(&self) -> QueryContext<'_> {
        QueryContext::new(&self.grid, &self.store, self.config.distance_mode)
    }

    pub fn find_first<C: ObjectCheck>(
        &self,
        origin: &QueryOrigin<'_>,
        check: C,
    ) -> Option<ObjectGuid> {
        self.query().find_first(origin, check)
    }

    pub fn find_last<C: ObjectCheck>(
        &self,
        origin: &QueryOrigin<'_>,
        check: C,
    ) -> Option<ObjectGuid> {
        self.query().find_last(origin, check)
    }

    pub fn find_all<C: ObjectCheck>(&self, origin: &QueryOrigin<'_>, check: C) -> Vec<ObjectGuid> {
        self.query().find_all(origin, check)
    }

    pub fn find_nearest<C: ObjectCheck>(
        &self,
        origin: &QueryOrigin<'_>,
        check: C,
    ) -> Option<ObjectGuid> {
        self.query().find_nearest(origin, check)
    }

    pub fn try_find_first<F, E>(
        &self,
        origin: &QueryOrigin<'_>,
        predicate: F,
    ) -> Result<Option<ObjectGuid>, E>
    where
        F: FnMut(&WorldObject) -> Result<bool, E>,
    {
        self.query().try_find_first(origin, predicate)
    }

    pub fn for_each<C, F>(&self, origin: &QueryOrigin<'_>, check: C, action: F)
    where
        C: ObjectCheck,
        F: FnMut(&WorldObject),
    {
        self.query().for_each(origin, check, action);
    }

    /// Mutate every match.
    ///
    /// Matches are collected first, then mutated, so the action never runs
    /// while the grid is being scanned. Moving an object must still go
    /// through [`Map::relocate`].
    pub fn for_each_mut<C, F>(&mut self, origin: &QueryOrigin<'_>, check: C, mut action: F) -> usize
    where
        C: ObjectCheck,
        F: FnMut(&mut WorldObject),
    {
        let matches = self.find_all(origin, check);
        for guid in &matches {
            if let Some(object) = self.store.get_mut(*guid) {
                action(object);
            }
        }
        matches.len()
    }

    // ==================== Tick ====================

    /// Advance one tick.
    ///
    /// 1. Drain delayed relocations
    /// 2. Settle visibility of objects loaded since the last tick
    /// 3. Broadcast accumulated field changes
    /// 4. Unload cells no viewpoint has been near for `cell_unload_delay` ticks
    pub fn update(&mut self) -> MapResult<TickReport> {
        self.tick += 1;
        let span = debug_span!("map_tick", map = %self.id, tick = self.tick);
        let _guard = span.enter();

        let relocated = self.pending_relocations.len();
        let mut diff = self.process_relocations()?;
        diff.merge(self.settle_loaded_objects());
        let updates_sent = self.send_object_updates();
        let cells_unloaded = self.unload_idle_cells()?;

        let report = TickReport {
            tick: self.tick,
            relocated,
            entered: diff.entered.len(),
            left: diff.left.len(),
            updates_sent,
            cells_unloaded,
        };
        debug!(
            relocated,
            entered = report.entered,
            left = report.left,
            updates_sent,
            cells_unloaded,
            "tick complete"
        );
        Ok(report)
    }

    fn settle_loaded_objects(&mut self) -> VisibilityDiff {
        let mut diff = VisibilityDiff::default();
        for guid in std::mem::take(&mut self.pending_visibility) {
            if self.grid.contains(guid) {
                diff.merge(self.update_visibility_of(guid));
            }
        }
        diff
    }

    /// Positions that keep cells alive: players, their vision sources and
    /// active objects.
    pub(crate) fn viewpoint_positions(&self) -> Vec<Position> {
        let mut positions = Vec::new();
        for (player, view) in &self.views {
            positions.extend(self.store.get(*player).map(|object| *object.position()));
            positions.extend(
                view.vision_sources
                    .iter()
                    .filter_map(|source| self.store.get(*source))
                    .map(|object| *object.position()),
            );
        }
        positions.extend(
            self.store
                .iter()
                .filter(|object| object.is_active() && object.is_perceivable())
                .map(|object| *object.position()),
        );
        positions
    }

    /// Kinds a full visibility pass considers.
    pub(crate) const VISIBLE_KINDS: KindMask = KindMask::WORLD;
}
