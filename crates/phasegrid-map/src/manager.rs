//! Drives many maps at once.
//!
//! Maps share nothing, so each tick runs every map on the rayon pool.
//! Within a map, updates stay sequential.

use rayon::iter::{IntoParallelRefMutIterator, ParallelIterator};
use tracing::{info, warn};

use crate::{Map, MapId, MapResult, PacketSink, TickReport};

/// Owns a set of map instances and ticks them in parallel.
#[derive(Debug)]
pub struct MapManager<S> {
    maps: Vec<Map<S>>,
}

impl<S> Default for MapManager<S> {
    fn default() -> Self {
        Self { maps: Vec::new() }
    }
}

impl<S: PacketSink + Send> MapManager<S> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a map, replacing any map with the same id.
    pub fn insert(&mut self, map: Map<S>) -> Option<Map<S>> {
        let id = map.id();
        info!(map = %id, "map registered");
        match self.maps.iter().position(|existing| existing.id() == id) {
            Some(index) => Some(std::mem::replace(&mut self.maps[index], map)),
            None => {
                self.maps.push(map);
                None
            }
        }
    }

    pub fn remove(&mut self, id: MapId) -> Option<Map<S>> {
        let index = self.maps.iter().position(|map| map.id() == id)?;
        Some(self.maps.swap_remove(index))
    }

    #[must_use]
    pub fn get(&self, id: MapId) -> Option<&Map<S>> {
        self.maps.iter().find(|map| map.id() == id)
    }

    pub fn get_mut(&mut self, id: MapId) -> Option<&mut Map<S>> {
        self.maps.iter_mut().find(|map| map.id() == id)
    }

    pub fn maps(&self) -> impl Iterator<Item = &Map<S>> {
        self.maps.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Tick every map once, in parallel.
    ///
    /// A failing map does not stop the others; its error is returned next
    /// to its id.
    pub fn update_all(&mut self) -> Vec<(MapId, MapResult<TickReport>)> {
        let mut results: Vec<_> = self
            .maps
            .par_iter_mut()
            .map(|map| (map.id(), map.update()))
            .collect();
        results.sort_unstable_by_key(|(id, _)| *id);

        for (id, result) in &results {
            if let Err(error) = result {
                warn!(map = %id, %error, "map tick failed");
            }
        }
        results
    }
}
