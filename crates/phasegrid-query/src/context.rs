//! Region queries over one map's grid and store.

use phasegrid_object::{DistanceMode, KindMask, ObjectGuid, ObjectStore, Position, WorldObject};
use phasegrid_spatial::GridMap;

use crate::{
    FallibleCheck, InRange, NearestCheck, ObjectCheck, ObjectLastSearcher, ObjectListSearcher,
    ObjectSearcher, ObjectWorker, Viewpoint,
};

/// Where a query looks from and how far.
#[derive(Clone, Copy, Debug)]
pub struct QueryOrigin<'a> {
    pub center: Position,
    pub radius: f32,
    pub viewpoint: Viewpoint<'a>,
    pub mask: KindMask,
    /// Overrides the map's distance mode.
    pub mode: Option<DistanceMode>,
}

impl<'a> QueryOrigin<'a> {
    /// Query from an object's position, through its phase shift.
    #[must_use]
    pub fn around(object: &'a WorldObject, radius: f32) -> Self {
        Self::at(*object.position(), radius, Viewpoint::of(object))
    }

    #[must_use]
    pub const fn at(center: Position, radius: f32, viewpoint: Viewpoint<'a>) -> Self {
        Self {
            center,
            radius,
            viewpoint,
            mask: KindMask::WORLD,
            mode: None,
        }
    }

    #[must_use]
    pub const fn with_mask(mut self, mask: KindMask) -> Self {
        self.mask = mask;
        self
    }

    #[must_use]
    pub const fn with_mode(mut self, mode: DistanceMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

/// Read-only view used to run the searchers.
///
/// Every query is distance-bounded by its origin's radius, so the cells
/// visited and the candidates accepted always agree.
#[derive(Clone, Copy)]
pub struct QueryContext<'a> {
    grid: &'a GridMap,
    store: &'a ObjectStore,
    default_mode: DistanceMode,
}

impl<'a> QueryContext<'a> {
    #[must_use]
    pub const fn new(
        grid: &'a GridMap,
        store: &'a ObjectStore,
        default_mode: DistanceMode,
    ) -> Self {
        Self {
            grid,
            store,
            default_mode,
        }
    }

    fn bounded<C: ObjectCheck>(&self, origin: &QueryOrigin<'_>, check: C) -> InRange<C> {
        let mode = origin.mode.unwrap_or(self.default_mode);
        InRange::new(origin.center, origin.radius, mode, check)
    }

    /// First match in scan order.
    pub fn find_first<C: ObjectCheck>(
        &self,
        origin: &QueryOrigin<'a>,
        check: C,
    ) -> Option<ObjectGuid> {
        let check = self.bounded(origin, check);
        let mut searcher = ObjectSearcher::new(self.store, origin.viewpoint, origin.mask, check);
        self.grid.visit_region(&origin.center, origin.radius, &mut searcher);
        searcher.result()
    }

    /// Last match in scan order.
    pub fn find_last<C: ObjectCheck>(
        &self,
        origin: &QueryOrigin<'a>,
        check: C,
    ) -> Option<ObjectGuid> {
        let check = self.bounded(origin, check);
        let mut searcher =
            ObjectLastSearcher::new(self.store, origin.viewpoint, origin.mask, check);
        self.grid.visit_region(&origin.center, origin.radius, &mut searcher);
        searcher.result()
    }

    pub fn find_all<C: ObjectCheck>(&self, origin: &QueryOrigin<'a>, check: C) -> Vec<ObjectGuid> {
        let check = self.bounded(origin, check);
        let mut searcher =
            ObjectListSearcher::new(self.store, origin.viewpoint, origin.mask, check);
        self.grid.visit_region(&origin.center, origin.radius, &mut searcher);
        searcher.into_results()
    }

    pub fn for_each<C, F>(&self, origin: &QueryOrigin<'a>, check: C, action: F)
    where
        C: ObjectCheck,
        F: FnMut(&WorldObject),
    {
        let mut worker = ObjectWorker::new(
            self.store,
            origin.viewpoint,
            origin.mask,
            self.bounded(origin, check),
            action,
        );
        self.grid.visit_region(&origin.center, origin.radius, &mut worker);
    }

    /// Closest match to the origin's center.
    pub fn find_nearest<C: ObjectCheck>(
        &self,
        origin: &QueryOrigin<'a>,
        check: C,
    ) -> Option<ObjectGuid> {
        let mode = origin.mode.unwrap_or(self.default_mode);
        let nearest = NearestCheck::new(origin.center, origin.radius, mode, check);
        let mut searcher =
            ObjectLastSearcher::new(self.store, origin.viewpoint, origin.mask, nearest);
        self.grid.visit_region(&origin.center, origin.radius, &mut searcher);
        searcher.result()
    }

    /// First match for a predicate that can fail. The first error ends the
    /// scan and is returned.
    pub fn try_find_first<F, E>(
        &self,
        origin: &QueryOrigin<'a>,
        predicate: F,
    ) -> Result<Option<ObjectGuid>, E>
    where
        F: FnMut(&WorldObject) -> Result<bool, E>,
    {
        let check = self.bounded(origin, FallibleCheck::new(predicate));
        let mut searcher = ObjectSearcher::new(self.store, origin.viewpoint, origin.mask, check);
        self.grid.visit_region(&origin.center, origin.radius, &mut searcher);

        let (result, check) = searcher.into_parts();
        match check.into_inner().into_error() {
            Some(error) => Err(error),
            None => Ok(result),
        }
    }
}

#[cfg(test)]
mod tests {
    use phasegrid_object::{ObjectFlags, ObjectInit, ObjectKind, PhaseId, PhaseShift};
    use phasegrid_spatial::GridGeometry;

    use super::*;
    use crate::AnyObject;

    struct Fixture {
        grid: GridMap,
        store: ObjectStore,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                grid: GridMap::new(GridGeometry::new(16.0, 20)),
                store: ObjectStore::new(),
            }
        }

        fn add(&mut self, kind: ObjectKind, position: Position, phase: PhaseShift) -> ObjectGuid {
            let guid = self.store.spawn(
                ObjectInit::new(kind, position)
                    .with_phase(phase)
                    .with_flags(ObjectFlags::IN_WORLD),
            );
            let cell = self.grid.cell_of(&position).unwrap();
            self.grid.load(cell);
            self.grid.insert(guid, cell).unwrap();
            guid
        }

        fn context(&self) -> QueryContext<'_> {
            QueryContext::new(&self.grid, &self.store, DistanceMode::Planar)
        }
    }

    fn at(x: f32, y: f32) -> Position {
        Position::new(x, y, 0.0)
    }

    #[test]
    fn test_phase_isolation() {
        let mut fixture = Fixture::new();
        let one = PhaseShift::with_phases([PhaseId(1)]);
        let two = PhaseShift::with_phases([PhaseId(2)]);
        let a = fixture.add(ObjectKind::Creature, at(5.0, 5.0), one);
        let b = fixture.add(ObjectKind::Creature, at(5.0, 5.0), two);

        let phase = PhaseShift::with_phases([PhaseId(1)]);
        let origin = QueryOrigin::at(at(5.0, 5.0), 10.0, Viewpoint::from_phase(&phase));
        let found = fixture.context().find_all(&origin, AnyObject);

        assert!(found.contains(&a));
        assert!(!found.contains(&b));
    }

    #[test]
    fn test_distance_bound_is_exact() {
        let mut fixture = Fixture::new();
        let inside = fixture.add(ObjectKind::Creature, at(10.0, 0.0), PhaseShift::new());
        let outside = fixture.add(ObjectKind::Creature, at(10.01, 0.0), PhaseShift::new());

        let phase = PhaseShift::new();
        let origin = QueryOrigin::at(at(0.0, 0.0), 10.0, Viewpoint::from_phase(&phase));
        let found = fixture.context().find_all(&origin, AnyObject);
        assert_eq!(found, [inside]);
        assert!(!found.contains(&outside));
    }

    #[test]
    fn test_spatial_mode_counts_height() {
        let mut fixture = Fixture::new();
        let above = Position::new(3.0, 0.0, 50.0);
        let high = fixture.add(ObjectKind::Creature, above, PhaseShift::new());

        let phase = PhaseShift::new();
        let origin = QueryOrigin::at(at(0.0, 0.0), 10.0, Viewpoint::from_phase(&phase));
        assert_eq!(fixture.context().find_first(&origin, AnyObject), Some(high));
        let spatial = origin.with_mode(DistanceMode::Spatial);
        assert_eq!(fixture.context().find_first(&spatial, AnyObject), None);
    }

    #[test]
    fn test_first_and_last_follow_scan_order() {
        let mut fixture = Fixture::new();
        let first = fixture.add(ObjectKind::Creature, at(1.0, 1.0), PhaseShift::new());
        let last = fixture.add(ObjectKind::Creature, at(2.0, 2.0), PhaseShift::new());

        let phase = PhaseShift::new();
        let origin = QueryOrigin::at(at(0.0, 0.0), 5.0, Viewpoint::from_phase(&phase));
        let context = fixture.context();
        assert_eq!(context.find_first(&origin, AnyObject), Some(first));
        assert_eq!(context.find_last(&origin, AnyObject), Some(last));
    }

    #[test]
    fn test_first_match_stops_evaluating() {
        let mut fixture = Fixture::new();
        for i in 0..5 {
            fixture.add(ObjectKind::Creature, at(i as f32, 0.0), PhaseShift::new());
        }

        let phase = PhaseShift::new();
        let origin = QueryOrigin::at(at(0.0, 0.0), 10.0, Viewpoint::from_phase(&phase));
        let mut evaluated = 0;
        let found = fixture.context().find_first(&origin, |_: &WorldObject| {
            evaluated += 1;
            true
        });
        assert!(found.is_some());
        assert_eq!(evaluated, 1);
    }

    #[test]
    fn test_empty_region_is_not_an_error() {
        let fixture = Fixture::new();
        let phase = PhaseShift::new();
        let origin = QueryOrigin::at(at(0.0, 0.0), 30.0, Viewpoint::from_phase(&phase));
        let context = fixture.context();
        assert_eq!(context.find_first(&origin, AnyObject), None);
        assert!(context.find_all(&origin, AnyObject).is_empty());
    }

    #[test]
    fn test_mask_restricts_kinds() {
        let mut fixture = Fixture::new();
        fixture.add(ObjectKind::Corpse, at(1.0, 0.0), PhaseShift::new());
        let creature = fixture.add(ObjectKind::Creature, at(2.0, 0.0), PhaseShift::new());

        let phase = PhaseShift::new();
        let origin = QueryOrigin::at(at(0.0, 0.0), 10.0, Viewpoint::from_phase(&phase))
            .with_mask(KindMask::CREATURE);
        assert_eq!(fixture.context().find_all(&origin, AnyObject), [creature]);
    }

    #[test]
    fn test_find_nearest_across_cells() {
        let mut fixture = Fixture::new();
        fixture.add(ObjectKind::Creature, at(-30.0, 0.0), PhaseShift::new());
        let near = fixture.add(ObjectKind::Creature, at(6.0, 8.0), PhaseShift::new());
        fixture.add(ObjectKind::Creature, at(20.0, 20.0), PhaseShift::new());

        let phase = PhaseShift::new();
        let origin = QueryOrigin::at(at(0.0, 0.0), 40.0, Viewpoint::from_phase(&phase));
        assert_eq!(fixture.context().find_nearest(&origin, AnyObject), Some(near));
    }

    #[test]
    fn test_negative_radius_finds_nothing() {
        let mut fixture = Fixture::new();
        fixture.add(ObjectKind::Creature, at(0.0, 0.0), PhaseShift::new());
        fixture.add(ObjectKind::Creature, at(0.5, 0.0), PhaseShift::new());

        let phase = PhaseShift::new();
        let origin = QueryOrigin::at(at(0.0, 0.0), -1.0, Viewpoint::from_phase(&phase));
        let context = fixture.context();
        assert_eq!(context.find_first(&origin, AnyObject), None);
        assert_eq!(context.find_last(&origin, AnyObject), None);
        assert_eq!(context.find_nearest(&origin, AnyObject), None);
        assert!(context.find_all(&origin, AnyObject).is_empty());

        let mut visited = 0;
        context.for_each(&origin, AnyObject, |_| visited += 1);
        assert_eq!(visited, 0);
    }

    #[test]
    fn test_for_each_visits_every_match() {
        let mut fixture = Fixture::new();
        for i in 0..4 {
            fixture.add(ObjectKind::GameObject, at(i as f32 * 3.0, 0.0), PhaseShift::new());
        }

        let phase = PhaseShift::new();
        let origin = QueryOrigin::at(at(0.0, 0.0), 7.0, Viewpoint::from_phase(&phase));
        let mut total_x = 0.0;
        fixture
            .context()
            .for_each(&origin, AnyObject, |object| total_x += object.position().x);
        assert!((total_x - 9.0_f32).abs() < f32::EPSILON);
    }

    #[test]
    fn test_try_find_first_propagates_error() {
        let mut fixture = Fixture::new();
        fixture.add(ObjectKind::Creature, at(1.0, 0.0), PhaseShift::new());

        let phase = PhaseShift::new();
        let origin = QueryOrigin::at(at(0.0, 0.0), 10.0, Viewpoint::from_phase(&phase));
        let result: Result<_, String> = fixture
            .context()
            .try_find_first(&origin, |_| Err("predicate failed".to_owned()));
        assert_eq!(result, Err("predicate failed".to_owned()));

        let ok: Result<_, String> = fixture.context().try_find_first(&origin, |_| Ok(true));
        assert!(ok.unwrap().is_some());
    }
}
