//! Phasegrid spatial partitioning
//!
//! Divides a map into a square array of cells. Each loaded cell keeps one
//! bucket of object guids per [`ObjectKind`](phasegrid_object::ObjectKind),
//! and generic algorithms walk those buckets through a [`GridVisitor`].
//!
//! ```text
//!        area(center, radius)
//! ┌────┬────┬────┬────┐
//! │    │ ▓▓ │ ▓▓ │    │   ▓▓ cells overlapping the circle's bounding box
//! ├────┼────┼────┼────┤
//! │    │ ▓▓ │ ▓▓ │    │   unloaded cells inside the box are skipped
//! └────┴────┴────┴────┘
//! ```

pub mod cell;
pub mod error;
pub mod grid;
pub mod visitor;

pub use cell::{CellArea, CellCoord, GridGeometry};
pub use error::{GridError, GridResult};
pub use grid::{CellBuckets, GridMap};
pub use visitor::GridVisitor;
