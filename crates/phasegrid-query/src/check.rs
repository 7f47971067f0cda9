//! Candidate predicates.
//!
//! A check decides whether one object is a match. Checks are evaluated once
//! per candidate per scan, after the phase filter, and may be stateful:
//! [`NearestCheck`] tightens its range every time it accepts, which turns a
//! last-match scan into a nearest-object search.

use phasegrid_object::{DistanceMode, ObjectGuid, PhaseShift, Position, WorldObject};

/// Predicate over candidates.
pub trait ObjectCheck {
    fn check(&mut self, object: &WorldObject) -> bool;

    /// Once true, no further candidate can match and the scan may stop.
    fn is_exhausted(&self) -> bool {
        false
    }
}

impl<F> ObjectCheck for F
where
    F: FnMut(&WorldObject) -> bool,
{
    fn check(&mut self, object: &WorldObject) -> bool {
        self(object)
    }
}

/// Accepts every candidate.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnyObject;

impl ObjectCheck for AnyObject {
    fn check(&mut self, _object: &WorldObject) -> bool {
        true
    }
}

/// Phase context candidates are filtered against.
///
/// `viewer` is the identity doing the looking; it lets a player's queries
/// see its own personal copies.
#[derive(Clone, Copy, Debug)]
pub struct Viewpoint<'a> {
    phase: &'a PhaseShift,
    viewer: Option<ObjectGuid>,
}

impl<'a> Viewpoint<'a> {
    /// Look through an object's own phase shift.
    #[must_use]
    pub fn of(object: &'a WorldObject) -> Self {
        Self {
            phase: object.phase(),
            viewer: Some(object.guid()),
        }
    }

    /// Look through an explicit phase shift with no identity.
    #[must_use]
    pub const fn from_phase(phase: &'a PhaseShift) -> Self {
        Self {
            phase,
            viewer: None,
        }
    }

    #[must_use]
    pub const fn with_viewer(mut self, viewer: ObjectGuid) -> Self {
        self.viewer = Some(viewer);
        self
    }

    #[must_use]
    pub const fn phase(&self) -> &'a PhaseShift {
        self.phase
    }

    #[must_use]
    pub const fn viewer(&self) -> Option<ObjectGuid> {
        self.viewer
    }

    /// Phase filter plus liveness: destroyed or out-of-world objects are
    /// never candidates.
    #[must_use]
    pub fn admits(&self, object: &WorldObject) -> bool {
        object.is_perceivable() && self.phase.can_see(object.phase(), self.viewer)
    }
}

/// Distance bound around a reference point, wrapped around another check.
///
/// The inner check only runs for candidates inside the range. A negative
/// range matches nothing.
#[derive(Clone, Debug)]
pub struct InRange<C> {
    center: Position,
    range: f32,
    mode: DistanceMode,
    inner: C,
}

impl<C: ObjectCheck> InRange<C> {
    #[must_use]
    pub const fn new(center: Position, range: f32, mode: DistanceMode, inner: C) -> Self {
        Self {
            center,
            range,
            mode,
            inner,
        }
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: ObjectCheck> ObjectCheck for InRange<C> {
    fn check(&mut self, object: &WorldObject) -> bool {
        self.mode.within(&self.center, object.position(), self.range) && self.inner.check(object)
    }

    fn is_exhausted(&self) -> bool {
        self.range < 0.0 || self.inner.is_exhausted()
    }
}

/// Accepts a candidate only if it is closer than every candidate accepted
/// before it.
///
/// Paired with a last-match searcher, the final result is the nearest
/// match. Ties keep the earlier candidate. A negative range matches
/// nothing.
#[derive(Clone, Debug)]
pub struct NearestCheck<C> {
    center: Position,
    /// `None` for a negative range.
    range_sq: Option<f32>,
    best_sq: Option<f32>,
    mode: DistanceMode,
    inner: C,
}

impl<C: ObjectCheck> NearestCheck<C> {
    #[must_use]
    pub fn new(center: Position, range: f32, mode: DistanceMode, inner: C) -> Self {
        Self {
            center,
            range_sq: (range >= 0.0).then_some(range * range),
            best_sq: None,
            mode,
            inner,
        }
    }

    /// Squared distance of the best match so far.
    #[must_use]
    pub const fn best_distance_sq(&self) -> Option<f32> {
        self.best_sq
    }
}

impl<C: ObjectCheck> ObjectCheck for NearestCheck<C> {
    fn check(&mut self, object: &WorldObject) -> bool {
        let Some(range_sq) = self.range_sq else {
            return false;
        };
        let distance_sq = self.mode.distance_sq(&self.center, object.position());
        if distance_sq > range_sq {
            return false;
        }
        if self.best_sq.is_some_and(|best| distance_sq >= best) {
            return false;
        }
        if !self.inner.check(object) {
            return false;
        }
        self.best_sq = Some(distance_sq);
        true
    }

    fn is_exhausted(&self) -> bool {
        self.range_sq.is_none() || self.best_sq == Some(0.0) || self.inner.is_exhausted()
    }
}

/// Adapts a predicate that can fail.
///
/// The first error is stored, the candidate is rejected, and the check
/// reports itself exhausted so the scan stops.
#[derive(Debug)]
pub struct FallibleCheck<F, E> {
    predicate: F,
    error: Option<E>,
}

impl<F, E> FallibleCheck<F, E>
where
    F: FnMut(&WorldObject) -> Result<bool, E>,
{
    pub const fn new(predicate: F) -> Self {
        Self {
            predicate,
            error: None,
        }
    }

    /// The stored error, if the predicate failed.
    pub fn into_error(self) -> Option<E> {
        self.error
    }
}

impl<F, E> ObjectCheck for FallibleCheck<F, E>
where
    F: FnMut(&WorldObject) -> Result<bool, E>,
{
    fn check(&mut self, object: &WorldObject) -> bool {
        if self.error.is_some() {
            return false;
        }
        match (self.predicate)(object) {
            Ok(matched) => matched,
            Err(error) => {
                self.error = Some(error);
                false
            }
        }
    }

    fn is_exhausted(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use phasegrid_object::{Generation, ObjectFlags, ObjectInit, ObjectKind, PhaseId};

    use super::*;

    fn object_at(slot: u32, x: f32, phase: PhaseShift) -> WorldObject {
        let guid = ObjectGuid::new(ObjectKind::Creature, slot, Generation::new());
        WorldObject::new(
            guid,
            ObjectInit::new(ObjectKind::Creature, Position::new(x, 0.0, 0.0))
                .with_phase(phase)
                .with_flags(ObjectFlags::IN_WORLD),
        )
    }

    #[test]
    fn test_viewpoint_filters_phase_and_liveness() {
        let phase_one = PhaseShift::with_phases([PhaseId(1)]);
        let viewpoint = Viewpoint::from_phase(&phase_one);

        let mut same = object_at(0, 0.0, PhaseShift::with_phases([PhaseId(1)]));
        let other = object_at(1, 0.0, PhaseShift::with_phases([PhaseId(2)]));
        assert!(viewpoint.admits(&same));
        assert!(!viewpoint.admits(&other));

        same.insert_flags(ObjectFlags::DESTROYED);
        assert!(!viewpoint.admits(&same));
    }

    #[test]
    fn test_in_range_runs_inner_only_inside() {
        let mut calls = 0;
        let mut check = InRange::new(
            Position::new(0.0, 0.0, 0.0),
            10.0,
            DistanceMode::Planar,
            |_: &WorldObject| {
                calls += 1;
                true
            },
        );
        assert!(check.check(&object_at(0, 10.0, PhaseShift::new())));
        assert!(!check.check(&object_at(1, 10.5, PhaseShift::new())));
        drop(check);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_nearest_check_narrows() {
        let origin = Position::new(0.0, 0.0, 0.0);
        let mut check = NearestCheck::new(origin, 50.0, DistanceMode::Planar, AnyObject);
        assert!(check.check(&object_at(0, 30.0, PhaseShift::new())));
        assert!(!check.check(&object_at(1, 40.0, PhaseShift::new())));
        assert!(!check.check(&object_at(2, 30.0, PhaseShift::new())));
        assert!(check.check(&object_at(3, 5.0, PhaseShift::new())));
        assert_eq!(check.best_distance_sq(), Some(25.0));
    }

    #[test]
    fn test_negative_range_matches_nothing() {
        let origin = Position::new(0.0, 0.0, 0.0);
        let at_origin = object_at(0, 0.0, PhaseShift::new());

        let mut bounded = InRange::new(origin, -5.0, DistanceMode::Planar, AnyObject);
        assert!(!bounded.check(&at_origin));
        assert!(bounded.is_exhausted());

        let mut nearest = NearestCheck::new(origin, -5.0, DistanceMode::Spatial, AnyObject);
        assert!(!nearest.check(&at_origin));
        assert!(!nearest.check(&object_at(1, 3.0, PhaseShift::new())));
        assert!(nearest.is_exhausted());
        assert_eq!(nearest.best_distance_sq(), None);
    }

    #[test]
    fn test_fallible_check_stops_on_error() {
        let mut seen = 0;
        let mut check = FallibleCheck::new(|object: &WorldObject| {
            seen += 1;
            if object.guid().slot() == 1 { Err("broken predicate") } else { Ok(false) }
        });
        assert!(!check.check(&object_at(0, 0.0, PhaseShift::new())));
        assert!(!check.is_exhausted());
        assert!(!check.check(&object_at(1, 0.0, PhaseShift::new())));
        assert!(check.is_exhausted());
        assert!(!check.check(&object_at(2, 0.0, PhaseShift::new())));
        assert_eq!(check.into_error(), Some("broken predicate"));
        assert_eq!(seen, 2);
    }
}
