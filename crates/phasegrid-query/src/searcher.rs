//! The four scan shapes, as grid visitors.
//!
//! | Searcher | Result | Stops early |
//! |---|---|---|
//! | [`ObjectSearcher`] | first match | yes |
//! | [`ObjectLastSearcher`] | last match in scan order | only if the check is exhausted |
//! | [`ObjectListSearcher`] | every match | no |
//! | [`ObjectWorker`] | nothing, runs an action per match | no |
//!
//! Each searcher resolves guids through the store, applies the viewpoint's
//! phase filter, then its check. Scan order is bucket order, cell by cell;
//! "first" and "last" carry no meaning beyond that.

use phasegrid_object::{KindMask, ObjectGuid, ObjectKind, ObjectStore, WorldObject};
use phasegrid_spatial::GridVisitor;

use crate::{ObjectCheck, Viewpoint};

/// Shared candidate filter of every searcher.
struct Candidates<'a> {
    store: &'a ObjectStore,
    viewpoint: Viewpoint<'a>,
    mask: KindMask,
}

impl<'a> Candidates<'a> {
    fn resolve(&self, guid: ObjectGuid) -> Option<&'a WorldObject> {
        self.store
            .get(guid)
            .filter(|object| self.viewpoint.admits(object))
    }
}

/// Stops at the first match.
pub struct ObjectSearcher<'a, C> {
    candidates: Candidates<'a>,
    check: C,
    result: Option<ObjectGuid>,
}

impl<'a, C: ObjectCheck> ObjectSearcher<'a, C> {
    pub fn new(store: &'a ObjectStore, viewpoint: Viewpoint<'a>, mask: KindMask, check: C) -> Self {
        Self {
            candidates: Candidates {
                store,
                viewpoint,
                mask,
            },
            check,
            result: None,
        }
    }

    #[must_use]
    pub const fn result(&self) -> Option<ObjectGuid> {
        self.result
    }

    pub fn into_parts(self) -> (Option<ObjectGuid>, C) {
        (self.result, self.check)
    }
}

impl<C: ObjectCheck> GridVisitor for ObjectSearcher<'_, C> {
    fn interest(&self) -> KindMask {
        self.candidates.mask
    }

    fn is_done(&self) -> bool {
        self.result.is_some() || self.check.is_exhausted()
    }

    fn visit_objects(&mut self, _kind: ObjectKind, guids: &[ObjectGuid]) {
        for &guid in guids {
            let Some(object) = self.candidates.resolve(guid) else {
                continue;
            };
            if self.check.check(object) {
                self.result = Some(guid);
                return;
            }
            if self.check.is_exhausted() {
                return;
            }
        }
    }
}

/// Scans everything and keeps the last match.
pub struct ObjectLastSearcher<'a, C> {
    candidates: Candidates<'a>,
    check: C,
    result: Option<ObjectGuid>,
}

impl<'a, C: ObjectCheck> ObjectLastSearcher<'a, C> {
    pub fn new(store: &'a ObjectStore, viewpoint: Viewpoint<'a>, mask: KindMask, check: C) -> Self {
        Self {
            candidates: Candidates {
                store,
                viewpoint,
                mask,
            },
            check,
            result: None,
        }
    }

    #[must_use]
    pub const fn result(&self) -> Option<ObjectGuid> {
        self.result
    }

    pub fn into_parts(self) -> (Option<ObjectGuid>, C) {
        (self.result, self.check)
    }
}

impl<C: ObjectCheck> GridVisitor for ObjectLastSearcher<'_, C> {
    fn interest(&self) -> KindMask {
        self.candidates.mask
    }

    fn is_done(&self) -> bool {
        self.check.is_exhausted()
    }

    fn visit_objects(&mut self, _kind: ObjectKind, guids: &[ObjectGuid]) {
        for &guid in guids {
            if self.check.is_exhausted() {
                return;
            }
            if let Some(object) = self.candidates.resolve(guid) {
                if self.check.check(object) {
                    self.result = Some(guid);
                }
            }
        }
    }
}

/// Collects every match.
pub struct ObjectListSearcher<'a, C> {
    candidates: Candidates<'a>,
    check: C,
    results: Vec<ObjectGuid>,
}

impl<'a, C: ObjectCheck> ObjectListSearcher<'a, C> {
    pub fn new(store: &'a ObjectStore, viewpoint: Viewpoint<'a>, mask: KindMask, check: C) -> Self {
        Self {
            candidates: Candidates {
                store,
                viewpoint,
                mask,
            },
            check,
            results: Vec::new(),
        }
    }

    #[must_use]
    pub fn results(&self) -> &[ObjectGuid] {
        &self.results
    }

    pub fn into_results(self) -> Vec<ObjectGuid> {
        self.results
    }

    pub fn into_parts(self) -> (Vec<ObjectGuid>, C) {
        (self.results, self.check)
    }
}

impl<C: ObjectCheck> GridVisitor for ObjectListSearcher<'_, C> {
    fn interest(&self) -> KindMask {
        self.candidates.mask
    }

    fn is_done(&self) -> bool {
        self.check.is_exhausted()
    }

    fn visit_objects(&mut self, _kind: ObjectKind, guids: &[ObjectGuid]) {
        for &guid in guids {
            if let Some(object) = self.candidates.resolve(guid) {
                if self.check.check(object) {
                    self.results.push(guid);
                }
            }
        }
    }
}

/// Runs an action on every match.
///
/// The action only gets shared access; mutation goes through
/// collect-then-apply on the map.
pub struct ObjectWorker<'a, C, F> {
    candidates: Candidates<'a>,
    check: C,
    action: F,
}

impl<'a, C, F> ObjectWorker<'a, C, F>
where
    C: ObjectCheck,
    F: FnMut(&WorldObject),
{
    pub fn new(
        store: &'a ObjectStore,
        viewpoint: Viewpoint<'a>,
        mask: KindMask,
        check: C,
        action: F,
    ) -> Self {
        Self {
            candidates: Candidates {
                store,
                viewpoint,
                mask,
            },
            check,
            action,
        }
    }
}

impl<C, F> GridVisitor for ObjectWorker<'_, C, F>
where
    C: ObjectCheck,
    F: FnMut(&WorldObject),
{
    fn interest(&self) -> KindMask {
        self.candidates.mask
    }

    fn is_done(&self) -> bool {
        self.check.is_exhausted()
    }

    fn visit_objects(&mut self, _kind: ObjectKind, guids: &[ObjectGuid]) {
        for &guid in guids {
            if let Some(object) = self.candidates.resolve(guid) {
                if self.check.check(object) {
                    (self.action)(object);
                }
            }
        }
    }
}
