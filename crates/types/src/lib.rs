pub mod geometry;
pub mod hierarchy;
pub mod hit;
pub mod ntuple;
pub mod particle;
pub mod pdg;
pub mod truth;

pub use geometry::*;
pub use hierarchy::*;
pub use hit::*;
pub use ntuple::*;
pub use particle::*;
pub use truth::*;
