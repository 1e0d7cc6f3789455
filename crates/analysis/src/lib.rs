//! Particle analysis for reconstructed LArTPC events
//!
//! Turns a reconstructed candidate hierarchy into one analysis record per
//! neutrino, primary neutrino daughter and cosmic ray.
//!
//! Modules:
//! - `builder`: Per-event orchestration and record hand-off
//! - `fit`: Sliding track fits and per-hit path lengths
//! - `recombination`: Charge to energy conversion with recombination correction
//! - `selection`: Which hits receive the correction
//! - `classifier`: BDT-driven track typing
//! - `range`: Energy-from-range lookup tables
//! - `energy`: Hierarchical energy aggregation
//! - `type_tree`: Label trees mirroring the hierarchy
//! - `truth`: Monte Carlo matching
//! - `pca`: Point-cloud principal axes
//! - `config`: TOML configuration and resolved settings

pub mod builder;
pub mod classifier;
pub mod config;
pub mod energy;
pub mod errors;
pub mod fit;
pub mod pca;
pub mod range;
pub mod recombination;
pub mod selection;
pub mod truth;
pub mod type_tree;

pub use builder::{
    candidate_role, direction_at_vertex, EventSummary, ParticleBuilder, ParticleSink, SkipReason,
    VecSink,
};
pub use classifier::{
    label_for_response, BdtTrackClassifier, TrackClassifier, TypeClassifier, TypeMap,
    PION_MUON_RESPONSE_THRESHOLD, PROTON_RESPONSE_THRESHOLD,
};
pub use config::{AnalysisConfig, AnalysisSettings};
pub use energy::{EnergyAggregator, EnergyEstimate, EnergyInputs};
pub use errors::{AnalysisError, InvariantViolations, Result, SinkError};
pub use fit::{FitError, LinearTrackFitter, TrackFit, TrackFitIndex, TrackFitter};
pub use range::{EnergyFromRangeEntry, EnergyFromRangeTable};
pub use recombination::{HitEnergyMap, HitEnergyRecord, RecombinationCorrector, RecombinationModel};
pub use selection::{ExcludeTrackEnds, HitSelectionConfig, HitSelectionPolicy, SelectAll, SelectNone};
pub use truth::{HitMatch, TruthMatcher, TruthTarget};
pub use type_tree::build_type_tree;
