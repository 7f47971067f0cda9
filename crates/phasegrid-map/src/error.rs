//! Map error types.

use phasegrid_object::{ObjectGuid, SpawnId};
use phasegrid_spatial::{CellCoord, GridError};
use thiserror::Error;

use crate::CellState;

/// Map error type.
#[derive(Debug, Error)]
pub enum MapError {
    /// Grid membership out of sync with the caller.
    #[error("grid error: {0}")]
    Grid(#[from] GridError),

    /// Guid does not resolve to a live object on this map.
    #[error("unknown object: {0}")]
    UnknownObject(ObjectGuid),

    /// Operation needs a player.
    #[error("{0} is not a player")]
    NotAPlayer(ObjectGuid),

    /// Cell is in the middle of a lifecycle stage that forbids the request.
    #[error("cell {cell} is busy ({state:?})")]
    CellBusy { cell: CellCoord, state: CellState },

    /// Cell still holds players and cannot be unloaded.
    #[error("cell {0} still holds players")]
    CellOccupied(CellCoord),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for map operations.
pub type MapResult<T> = Result<T, MapError>;

/// Failure to instantiate one persisted spawn. Contained at the cell
/// loading boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("{0} has no stored row")]
    Missing(SpawnId),

    #[error("{spawn_id} is corrupt: {reason}")]
    Corrupt { spawn_id: SpawnId, reason: String },
}
