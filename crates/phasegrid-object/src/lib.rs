//! Phasegrid objects - the spatial record of everything that lives on a map.
//!
//! A map holds players, creatures, game objects, corpses and a handful of
//! transient kinds. This crate only knows the part of them the spatial core
//! needs:
//!
//! - **Guid**: a generational handle into the [`ObjectStore`] arena
//! - **Kind**: the closed set of object categories the grid buckets by
//! - **Phase**: the isolation tags deciding who can perceive whom
//! - **Position**: map-space coordinates and squared-distance helpers
//!
//! Gameplay data (health, AI, inventories) is owned elsewhere and keyed by
//! [`ObjectGuid`].
//!
//! # Example
//!
//! ```ignore
//! let mut store = ObjectStore::new();
//! let guid = store.spawn(
//!     ObjectInit::new(ObjectKind::Creature, Position::new(10.0, 20.0, 0.0))
//!         .with_phase(PhaseShift::with_phases([PhaseId(7)])),
//! );
//!
//! let creature = store.get(guid).unwrap();
//! assert!(creature.phase().has_phase(PhaseId(7)));
//! ```

mod guid;
mod kind;
mod object;
mod phase;
mod position;
mod store;

pub use guid::{Generation, ObjectGuid, SlotId};
pub use kind::{KindMask, ObjectKind};
pub use object::{ChangeMask, ObjectFlags, ObjectInit, RelocationState, SpawnId, WorldObject};
pub use phase::{PhaseFlags, PhaseId, PhaseShift};
pub use position::{DistanceMode, Position};
pub use store::ObjectStore;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        ChangeMask, DistanceMode, KindMask, ObjectGuid, ObjectInit, ObjectKind, ObjectStore,
        PhaseId, PhaseShift, Position, WorldObject,
    };
}
