//! Spatial queries built from grid visitors and the phase filter.
//!
//! Every query has the same shape: pick the cells overlapping a circle,
//! visit the buckets of the requested kinds, drop candidates the viewpoint
//! cannot see, then run a caller-supplied [`ObjectCheck`].
//!
//! # Example
//!
//! ```ignore
//! let context = QueryContext::new(&grid, &store, DistanceMode::Planar);
//! let origin = QueryOrigin::around(player, 30.0).with_mask(KindMask::CREATURE);
//!
//! // Nearest creature that is in combat.
//! let target = context.find_nearest(&origin, |c: &WorldObject| c.is_in_combat());
//! ```

mod check;
mod context;
mod searcher;

pub use check::{AnyObject, FallibleCheck, InRange, NearestCheck, ObjectCheck, Viewpoint};
pub use context::{QueryContext, QueryOrigin};
pub use searcher::{ObjectLastSearcher, ObjectListSearcher, ObjectSearcher, ObjectWorker};
