//! Map configuration.

use phasegrid_object::DistanceMode;
use phasegrid_spatial::GridGeometry;
use serde::{Deserialize, Serialize};

use crate::{MapError, MapResult};

/// Tunables of one map instance.
///
/// Missing fields take their defaults, so `{}` is a valid configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Side length of a cell in world units.
    pub cell_size: f32,
    /// Cells per axis.
    pub max_cells: u32,
    /// Distance at which players perceive objects.
    pub visibility_range: f32,
    pub distance_mode: DistanceMode,
    /// Ticks a cell may stay out of every viewpoint's range before it is
    /// unloaded. Zero keeps cells loaded forever.
    pub cell_unload_delay: u64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            cell_size: GridGeometry::DEFAULT_CELL_SIZE,
            max_cells: GridGeometry::DEFAULT_MAX_CELLS,
            visibility_range: 100.0,
            distance_mode: DistanceMode::Planar,
            cell_unload_delay: 0,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

impl MapConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> MapResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read `PHASEGRID_*` environment variables, falling back to defaults
    /// for anything unset or unparsable.
    pub fn from_env() -> MapResult<Self> {
        let defaults = Self::default();
        let distance_mode = match std::env::var("PHASEGRID_DISTANCE_MODE").ok().as_deref() {
            Some("spatial") => DistanceMode::Spatial,
            Some("planar") => DistanceMode::Planar,
            _ => defaults.distance_mode,
        };
        let config = Self {
            cell_size: env_or("PHASEGRID_CELL_SIZE", defaults.cell_size),
            max_cells: env_or("PHASEGRID_MAX_CELLS", defaults.max_cells),
            visibility_range: env_or("PHASEGRID_VISIBILITY_RANGE", defaults.visibility_range),
            distance_mode,
            cell_unload_delay: env_or("PHASEGRID_CELL_UNLOAD_DELAY", defaults.cell_unload_delay),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MapResult<()> {
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(MapError::InvalidConfig(format!(
                "cell_size must be positive, got {}",
                self.cell_size
            )));
        }
        if self.max_cells == 0 {
            return Err(MapError::InvalidConfig("max_cells must be at least 1".to_owned()));
        }
        if !(self.visibility_range.is_finite() && self.visibility_range > 0.0) {
            return Err(MapError::InvalidConfig(format!(
                "visibility_range must be positive, got {}",
                self.visibility_range
            )));
        }
        Ok(())
    }

    #[must_use]
    pub const fn geometry(&self) -> GridGeometry {
        GridGeometry::new(self.cell_size, self.max_cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(MapConfig::from_json("{}").unwrap(), MapConfig::default());
    }

    #[test]
    fn test_partial_json() {
        let json = r#"{"visibility_range": 250.0, "distance_mode": "spatial"}"#;
        let config = MapConfig::from_json(json).unwrap();
        assert!((config.visibility_range - 250.0).abs() < f32::EPSILON);
        assert_eq!(config.distance_mode, DistanceMode::Spatial);
        assert_eq!(config.max_cells, GridGeometry::DEFAULT_MAX_CELLS);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            MapConfig::from_json(r#"{"cell_size": 0.0}"#),
            Err(MapError::InvalidConfig(_))
        ));
        assert!(matches!(
            MapConfig::from_json(r#"{"max_cells": 0}"#),
            Err(MapError::InvalidConfig(_))
        ));
        assert!(matches!(MapConfig::from_json("not json"), Err(MapError::Json(_))));
    }
}
