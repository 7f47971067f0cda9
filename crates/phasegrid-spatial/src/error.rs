//! Grid error types.

use phasegrid_object::{ObjectGuid, Position};
use thiserror::Error;

use crate::CellCoord;

/// Membership errors. Each one means the caller's view of the grid is out
/// of sync with the grid itself.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    /// Object is already a member of some cell.
    #[error("{guid} is already in cell {cell}")]
    AlreadyPresent { guid: ObjectGuid, cell: CellCoord },

    /// Object is not a member of any cell.
    #[error("{0} is not in the grid")]
    NotPresent(ObjectGuid),

    /// Target cell has not been loaded.
    #[error("cell {0} is not loaded")]
    CellNotLoaded(CellCoord),

    /// Position lies outside the map.
    #[error("position ({}, {}) is outside the map", .0.x, .0.y)]
    OutOfBounds(Position),
}

/// Result type for grid operations.
pub type GridResult<T> = Result<T, GridError>;
