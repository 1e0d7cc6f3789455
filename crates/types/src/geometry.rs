//! Detector-frame geometry helpers.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Position or direction in the detector frame (cm for positions).
pub type Point = Vector3<f32>;

/// Beam axis, used as the direction of reconstructed neutrinos.
pub fn beam_axis() -> Point {
    Point::new(0.0, 0.0, 1.0)
}

/// Unit vector along `v`, or the zero vector when `v` is too short to normalise.
pub fn unit_or_zero(v: &Point) -> Point {
    let norm = v.norm();
    if norm > f32::EPSILON {
        v / norm
    } else {
        Point::zeros()
    }
}

/// Axis-aligned fiducial box; points on the boundary are inside.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FiducialVolume {
    pub min: Point,
    pub max: Point,
}

impl FiducialVolume {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// Inset the detector bounds by the given per-axis margins.
    pub fn from_detector(detector_min: Point, detector_max: Point, margins: Point) -> Self {
        Self {
            min: detector_min + margins,
            max: detector_max - margins,
        }
    }

    pub fn contains(&self, point: &Point) -> bool {
        (0..3).all(|axis| point[axis] >= self.min[axis] && point[axis] <= self.max[axis])
    }

    /// A volume whose margins swallowed the whole detector contains nothing.
    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| self.min[axis] > self.max[axis])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fiducial_volume_is_inset_by_margins() {
        let volume = FiducialVolume::from_detector(
            Point::new(0.0, -116.0, 0.0),
            Point::new(256.0, 116.0, 1036.0),
            Point::new(10.0, 20.0, 10.0),
        );

        assert!(volume.contains(&Point::new(128.0, 0.0, 500.0)));
        assert!(volume.contains(&Point::new(10.0, -96.0, 10.0)));
        assert!(!volume.contains(&Point::new(9.9, 0.0, 500.0)));
        assert!(!volume.contains(&Point::new(128.0, 100.0, 500.0)));
        assert!(!volume.is_empty());
    }

    #[test]
    fn unit_or_zero_handles_null_vector() {
        assert_eq!(unit_or_zero(&Point::zeros()), Point::zeros());
        let unit = unit_or_zero(&Point::new(3.0, 0.0, 4.0));
        assert!((unit.norm() - 1.0).abs() < 1e-6);
    }
}
