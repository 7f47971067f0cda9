//! Map-space positions and distance checks.
//!
//! Range checks compare squared distances so no candidate pays for a
//! square root.

use serde::{Deserialize, Serialize};

/// A point on a map, with facing.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub orientation: f32,
}

impl Position {
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            orientation: 0.0,
        }
    }

    #[must_use]
    pub const fn with_orientation(mut self, orientation: f32) -> Self {
        self.orientation = orientation;
        self
    }

    /// Squared distance on the horizontal plane.
    #[must_use]
    pub fn distance_sq_2d(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Squared distance including height.
    #[must_use]
    pub fn distance_sq_3d(&self, other: &Position) -> f32 {
        let dz = self.z - other.z;
        self.distance_sq_2d(other) + dz * dz
    }
}

/// How distance is measured for range checks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMode {
    /// Ignore height.
    #[default]
    Planar,
    /// Full 3D distance.
    Spatial,
}

impl DistanceMode {
    #[inline]
    #[must_use]
    pub fn distance_sq(self, a: &Position, b: &Position) -> f32 {
        match self {
            Self::Planar => a.distance_sq_2d(b),
            Self::Spatial => a.distance_sq_3d(b),
        }
    }

    /// Check `distance(a, b) <= range` without taking a square root.
    ///
    /// A negative range contains nothing, not even `a` itself.
    #[inline]
    #[must_use]
    pub fn within(self, a: &Position, b: &Position, range: f32) -> bool {
        range >= 0.0 && self.distance_sq(a, b) <= range * range
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planar_ignores_height() {
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(3.0, 4.0, 100.0);
        assert_eq!(DistanceMode::Planar.distance_sq(&a, &b), 25.0);
        assert!(DistanceMode::Planar.within(&a, &b, 5.0));
        assert!(!DistanceMode::Spatial.within(&a, &b, 5.0));
    }

    #[test]
    fn test_spatial_distance() {
        let a = Position::new(1.0, 2.0, 3.0);
        let b = Position::new(2.0, 4.0, 5.0);
        assert_eq!(DistanceMode::Spatial.distance_sq(&a, &b), 9.0);
    }

    #[test]
    fn test_squared_comparison_matches_true_distance() {
        let origin = Position::new(0.0, 0.0, 0.0);
        for step in 0..40 {
            let k = step as f32 * 0.5;
            let point = Position::new(3.0 * k, 4.0 * k, 0.0);
            for range in [0.0_f32, 1.0, 7.5, 20.0, 49.5, 50.0] {
                let by_sqrt = DistanceMode::Planar.distance_sq(&origin, &point).sqrt() <= range;
                assert_eq!(DistanceMode::Planar.within(&origin, &point, range), by_sqrt);
            }
        }
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(10.0, 0.0, 0.0);
        assert!(DistanceMode::Planar.within(&a, &b, 10.0));
    }

    #[test]
    fn test_negative_range_contains_nothing() {
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(0.5, 0.0, 0.0);
        for mode in [DistanceMode::Planar, DistanceMode::Spatial] {
            assert!(!mode.within(&a, &b, -1.0));
            assert!(!mode.within(&a, &a, -1.0));
            assert!(!mode.within(&a, &a, -0.0001));
        }
        assert!(DistanceMode::Planar.within(&a, &a, 0.0));
    }
}
