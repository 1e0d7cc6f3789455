//! Calorimetric hits.

use crate::geometry::Point;
use serde::{Deserialize, Serialize};

/// Identity of a hit, unique within one event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HitId(pub u32);

/// Readout view a hit was recorded in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HitView {
    U,
    V,
    W,
    ThreeD,
}

impl HitView {
    /// The collection plane, whose charge is used for calorimetry.
    pub const COLLECTION: HitView = HitView::W;

    pub const TWO_D: [HitView; 3] = [HitView::U, HitView::V, HitView::W];

    pub fn is_two_d(self) -> bool {
        !matches!(self, HitView::ThreeD)
    }

    /// Direction across the wires of this view (the wire-pitch direction).
    ///
    /// Induction planes sit at ±60° to the vertical collection wires.
    /// Space points have no pitch; the beam axis is returned for them.
    pub fn pitch_axis(self) -> Point {
        const SIN_60: f32 = 0.866_025_4;
        match self {
            HitView::U => Point::new(0.0, -SIN_60, 0.5),
            HitView::V => Point::new(0.0, SIN_60, 0.5),
            HitView::W | HitView::ThreeD => Point::new(0.0, 0.0, 1.0),
        }
    }
}

/// A single reconstructed hit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaloHit {
    pub id: HitId,
    pub view: HitView,
    /// Hit position; 2D hits carry their view coordinates with y = 0.
    pub position: Point,
    /// Raw deposited charge (ADC-derived).
    pub input_energy: f32,
    /// Wire pitch for 2D hits (cm).
    pub cell_size: f32,
}
