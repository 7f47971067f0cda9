//! Map instances for a phased, cell-partitioned world.
//!
//! A [`Map`] owns its objects and grid and every player's client set.
//! Each tick it settles delayed movement, reconciles what each player
//! perceives, ships accumulated field changes, and unloads cells nobody is
//! near anymore.
//!
//! ```text
//! Map::update
//!   process_relocations  membership first, then one reconciliation per mover
//!   settle loads         observers learn about freshly loaded spawns
//!   send_object_updates  one packet per aware player
//!   unload_idle_cells    staged teardown of cells out of every viewpoint
//! ```
//!
//! Gameplay, persistence and the wire format are injected through the
//! traits in [`collab`]: [`PacketSink`], [`SpawnStore`], [`RespawnPolicy`]
//! and [`LifecycleHooks`].

mod accumulate;
pub mod collab;
mod config;
mod error;
mod lifecycle;
mod manager;
mod map;
mod packet;
mod relocation;
mod visibility;

pub use collab::{
    AlwaysSpawn, LifecycleHooks, MemorySpawnStore, NoHooks, PacketLog, PacketSink, RespawnPolicy,
    SpawnRecord, SpawnStore,
};
pub use config::MapConfig;
pub use error::{LoadError, MapError, MapResult};
pub use lifecycle::{CellState, LoadReport, PhaseScope, UnloadReport};
pub use manager::MapManager;
pub use map::{Map, MapId, PlayerView, TickReport};
pub use packet::{UpdateBlock, UpdatePacket};
pub use visibility::VisibilityDiff;
