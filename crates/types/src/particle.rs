//! Analysis output: particle type labels, type trees and the per-candidate
//! analysis record.

use crate::geometry::Point;
use crate::hierarchy::CandidateId;
use crate::pdg;
use crate::truth::McParticleId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Particle-type taxonomy
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeLabel {
    Neutrino,
    Track,
    Shower,
    Proton,
    PionMuon,
    CosmicRay,
    Unknown,
}

impl TypeLabel {
    pub const ALL: [TypeLabel; 7] = [
        TypeLabel::Neutrino,
        TypeLabel::Track,
        TypeLabel::Shower,
        TypeLabel::Proton,
        TypeLabel::PionMuon,
        TypeLabel::CosmicRay,
        TypeLabel::Unknown,
    ];

    /// True-particle label derived from a PDG code.
    pub fn from_pdg(pdg_code: i32) -> Self {
        if pdg::is_neutrino(pdg_code) {
            return TypeLabel::Neutrino;
        }
        if pdg::is_electromagnetic(pdg_code) {
            return TypeLabel::Shower;
        }
        match pdg_code.abs() {
            pdg::PROTON => TypeLabel::Proton,
            pdg::MUON | pdg::PION => TypeLabel::PionMuon,
            pdg::KAON => TypeLabel::Track,
            _ => TypeLabel::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TypeLabel::Neutrino => "NEUTRINO",
            TypeLabel::Track => "TRACK",
            TypeLabel::Shower => "SHOWER",
            TypeLabel::Proton => "PROTON",
            TypeLabel::PionMuon => "PION_MUON",
            TypeLabel::CosmicRay => "COSMIC_RAY",
            TypeLabel::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for TypeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type labels arranged like the hierarchy they were derived from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeTree {
    pub label: TypeLabel,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TypeTree>,
}

impl TypeTree {
    pub fn leaf(label: TypeLabel) -> Self {
        Self {
            label,
            children: Vec::new(),
        }
    }

    pub fn new(label: TypeLabel, children: Vec<TypeTree>) -> Self {
        Self { label, children }
    }

    /// Number of nodes.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TypeTree::size).sum::<usize>()
    }

    /// Labels in depth-first pre-order.
    pub fn labels(&self) -> Vec<TypeLabel> {
        let mut out = Vec::with_capacity(self.size());
        self.collect_labels(&mut out);
        out
    }

    fn collect_labels(&self, out: &mut Vec<TypeLabel>) {
        out.push(self.label);
        for child in &self.children {
            child.collect_labels(out);
        }
    }
}

/// Role a candidate plays in the event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandidateRole {
    Neutrino,
    PrimaryDaughter,
    CosmicRay,
}

/// Truth quantities of the matched MC particle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct McInfo {
    pub particle: McParticleId,
    pub energy: f32,
    pub vertex_position: Point,
    pub momentum: Point,
    pub direction_cosines: Point,
    pub pdg_code: i32,
    pub kind: TypeLabel,
    pub type_tree: TypeTree,
    pub is_vertex_fiducial: bool,
    pub is_contained: bool,
    pub is_shower: bool,
    pub hit_purity: f32,
    pub hit_completeness: f32,
}

#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("Field {0} is not finite")]
    NonFinite(&'static str),
}

/// Finished analysis quantities for one accepted candidate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisParticleRecord {
    pub candidate: CandidateId,
    pub role: CandidateRole,
    pub kind: TypeLabel,
    pub type_tree: TypeTree,

    // Framework metadata of the input candidate
    pub particle_id: i32,
    pub charge: i32,
    pub mass: f32,
    pub framework_energy: f32,
    pub framework_momentum: Point,
    pub is_shower: bool,

    pub vertex_position: Point,
    pub is_vertex_fiducial: bool,
    pub are_all_hits_fiducial: bool,
    pub fiducial_hit_fraction: f32,

    /// Best energy estimate (GeV)
    pub analysis_energy: f32,
    /// Energy from charge only (GeV)
    pub energy_from_charge: f32,
    pub direction_cosines: Point,
    pub analysis_momentum: Point,

    pub number_of_3d_hits: u32,
    pub number_of_collection_plane_hits: u32,
    pub number_of_downstream_particles: u32,

    pub mc: Option<McInfo>,
}

impl AnalysisParticleRecord {
    pub fn has_mc_info(&self) -> bool {
        self.mc.is_some()
    }

    /// Reject records carrying non-finite physics quantities.
    pub fn validate(&self) -> Result<(), RecordError> {
        let scalars = [
            ("analysis_energy", self.analysis_energy),
            ("energy_from_charge", self.energy_from_charge),
            ("fiducial_hit_fraction", self.fiducial_hit_fraction),
        ];
        for (name, value) in scalars {
            if !value.is_finite() {
                return Err(RecordError::NonFinite(name));
            }
        }

        let vectors = [
            ("vertex_position", &self.vertex_position),
            ("direction_cosines", &self.direction_cosines),
            ("analysis_momentum", &self.analysis_momentum),
        ];
        for (name, value) in vectors {
            if !value.iter().all(|c| c.is_finite()) {
                return Err(RecordError::NonFinite(name));
            }
        }
        Ok(())
    }
}
