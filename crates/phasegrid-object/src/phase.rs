//! Phase filtering.
//!
//! Objects on the same coordinates can live in mutually exclusive realities.
//! Two objects perceive each other only if their phase sets intersect, or
//! one of them is flagged always-visible.

use std::cmp::Ordering;

use smallvec::SmallVec;

use crate::ObjectGuid;

/// Opaque phase identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhaseId(pub u32);

impl PhaseId {
    /// Phase every object is in unless told otherwise.
    pub const DEFAULT: PhaseId = PhaseId(169);
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PhaseFlags: u8 {
        /// Visible from every phase (used by some triggers).
        const ALWAYS_VISIBLE = 1 << 0;
    }
}

/// Per-object phase state.
///
/// The phase set is kept sorted so intersection is a linear merge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhaseShift {
    phases: SmallVec<[PhaseId; 4]>,
    flags: PhaseFlags,
    /// Set on personal copies: only this player may perceive them.
    personal_owner: Option<ObjectGuid>,
}

impl Default for PhaseShift {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseShift {
    /// Phase shift containing only the default phase.
    #[must_use]
    pub fn new() -> Self {
        Self::with_phases([PhaseId::DEFAULT])
    }

    /// Phase shift with no phases at all. Sees nothing that is not always-visible.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            phases: SmallVec::new(),
            flags: PhaseFlags::empty(),
            personal_owner: None,
        }
    }

    /// Phase shift with exactly the given phases.
    #[must_use]
    pub fn with_phases(phases: impl IntoIterator<Item = PhaseId>) -> Self {
        let mut phases: SmallVec<[PhaseId; 4]> = phases.into_iter().collect();
        phases.sort_unstable();
        phases.dedup();
        Self {
            phases,
            flags: PhaseFlags::empty(),
            personal_owner: None,
        }
    }

    /// Phase shift visible from every phase.
    #[must_use]
    pub fn always_visible() -> Self {
        let mut shift = Self::new();
        shift.flags |= PhaseFlags::ALWAYS_VISIBLE;
        shift
    }

    /// Add a phase. Returns `false` if it was already present.
    pub fn add_phase(&mut self, phase: PhaseId) -> bool {
        match self.phases.binary_search(&phase) {
            Ok(_) => false,
            Err(at) => {
                self.phases.insert(at, phase);
                true
            }
        }
    }

    /// Remove a phase. Returns `false` if it was not present.
    pub fn remove_phase(&mut self, phase: PhaseId) -> bool {
        match self.phases.binary_search(&phase) {
            Ok(at) => {
                self.phases.remove(at);
                true
            }
            Err(_) => false,
        }
    }

    #[must_use]
    pub fn has_phase(&self, phase: PhaseId) -> bool {
        self.phases.binary_search(&phase).is_ok()
    }

    /// Phases in ascending order.
    #[must_use]
    pub fn phases(&self) -> &[PhaseId] {
        &self.phases
    }

    #[must_use]
    pub const fn flags(&self) -> PhaseFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: PhaseFlags) {
        self.flags = flags;
    }

    #[must_use]
    pub const fn is_always_visible(&self) -> bool {
        self.flags.contains(PhaseFlags::ALWAYS_VISIBLE)
    }

    #[must_use]
    pub const fn personal_owner(&self) -> Option<ObjectGuid> {
        self.personal_owner
    }

    /// Mark this shift as belonging to a personal copy owned by `owner`.
    #[must_use]
    pub fn personal_to(mut self, owner: ObjectGuid) -> Self {
        self.personal_owner = Some(owner);
        self
    }

    /// Check whether any phase of `phases` is in this shift.
    #[must_use]
    pub fn intersects(&self, phases: &[PhaseId]) -> bool {
        phases.iter().any(|phase| self.has_phase(*phase))
    }

    /// True iff the phase sets intersect, or either side is always-visible.
    #[must_use]
    pub fn shares_phase(&self, other: &PhaseShift) -> bool {
        if self.is_always_visible() || other.is_always_visible() {
            return true;
        }

        let (a, b) = (self.phases.as_slice(), other.phases.as_slice());
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => return true,
            }
        }
        false
    }

    /// Phase check used by queries and visibility.
    ///
    /// `viewer` is the identity looking through this shift, if there is one.
    /// A personal copy is hidden from everyone but its owner and the owner's
    /// other personal copies.
    #[must_use]
    pub fn can_see(&self, target: &PhaseShift, viewer: Option<ObjectGuid>) -> bool {
        if !self.shares_phase(target) {
            return false;
        }
        match target.personal_owner {
            None => true,
            Some(owner) => viewer == Some(owner) || self.personal_owner == Some(owner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Generation, ObjectKind};

    fn player(slot: u32) -> ObjectGuid {
        ObjectGuid::new(ObjectKind::Player, slot, Generation::new())
    }

    #[test]
    fn test_default_phase_shared() {
        assert!(PhaseShift::new().shares_phase(&PhaseShift::default()));
    }

    #[test]
    fn test_disjoint_phases() {
        let a = PhaseShift::with_phases([PhaseId(1)]);
        let b = PhaseShift::with_phases([PhaseId(2)]);
        assert!(!a.shares_phase(&b));
        assert!(!b.shares_phase(&a));
    }

    #[test]
    fn test_partial_overlap() {
        let a = PhaseShift::with_phases([PhaseId(5), PhaseId(1), PhaseId(9)]);
        let b = PhaseShift::with_phases([PhaseId(2), PhaseId(9)]);
        assert!(a.shares_phase(&b));
        assert_eq!(a.phases(), &[PhaseId(1), PhaseId(5), PhaseId(9)]);
    }

    #[test]
    fn test_always_visible_either_side() {
        let flagged = PhaseShift::always_visible();
        let other = PhaseShift::with_phases([PhaseId(42)]);
        assert!(flagged.shares_phase(&other));
        assert!(other.shares_phase(&flagged));
        assert!(PhaseShift::empty().shares_phase(&flagged));
    }

    #[test]
    fn test_empty_sees_nothing() {
        assert!(!PhaseShift::empty().shares_phase(&PhaseShift::new()));
        assert!(!PhaseShift::empty().shares_phase(&PhaseShift::empty()));
    }

    #[test]
    fn test_add_remove_keeps_order() {
        let mut shift = PhaseShift::empty();
        assert!(shift.add_phase(PhaseId(3)));
        assert!(shift.add_phase(PhaseId(1)));
        assert!(!shift.add_phase(PhaseId(3)));
        assert_eq!(shift.phases(), &[PhaseId(1), PhaseId(3)]);
        assert!(shift.remove_phase(PhaseId(1)));
        assert!(!shift.remove_phase(PhaseId(1)));
        assert_eq!(shift.phases(), &[PhaseId(3)]);
    }

    #[test]
    fn test_personal_copy_only_for_owner() {
        let owner = player(1);
        let stranger = player(2);
        let copy = PhaseShift::with_phases([PhaseId(7)]).personal_to(owner);
        let viewer = PhaseShift::with_phases([PhaseId(7)]);

        assert!(viewer.shares_phase(&copy));
        assert!(viewer.can_see(&copy, Some(owner)));
        assert!(!viewer.can_see(&copy, Some(stranger)));
        assert!(!viewer.can_see(&copy, None));

        // Another personal copy of the same owner sees its sibling.
        let sibling = PhaseShift::with_phases([PhaseId(7)]).personal_to(owner);
        assert!(sibling.can_see(&copy, None));
    }
}
