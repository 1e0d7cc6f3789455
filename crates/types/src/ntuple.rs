//! Flat per-event rows for tabular export.
//!
//! Rows always carry every column; truth columns hold zeros when the record
//! has no MC information so that all rows share one layout.

use crate::particle::{AnalysisParticleRecord, CandidateRole, TypeLabel};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticleRow {
    pub candidate: u32,
    pub is_vertex_fiducial: bool,
    pub are_all_hits_fiducial: bool,
    pub has_mc_info: bool,
    pub energy: f32,
    pub energy_from_charge_only: f32,
    pub vertex: [f32; 3],
    pub direction_cosines: [f32; 3],
    pub momentum: [f32; 3],
    pub particle_type: TypeLabel,
    pub is_shower: bool,
    pub number_of_3d_hits: u32,
    pub number_of_collection_plane_hits: u32,
    pub number_of_downstream_particles: u32,

    pub mc_particle: Option<u32>,
    pub mc_energy: f32,
    pub mc_vertex: [f32; 3],
    pub mc_direction_cosines: [f32; 3],
    pub mc_momentum: [f32; 3],
    pub mc_is_vertex_fiducial: bool,
    pub mc_is_contained: bool,
    pub mc_particle_type: TypeLabel,
    pub mc_is_shower: bool,
    pub mc_pdg_code: i32,
    pub mc_hit_purity: f32,
    pub mc_hit_completeness: f32,
}

impl From<&AnalysisParticleRecord> for ParticleRow {
    fn from(record: &AnalysisParticleRecord) -> Self {
        let mut row = Self {
            candidate: record.candidate.0,
            is_vertex_fiducial: record.is_vertex_fiducial,
            are_all_hits_fiducial: record.are_all_hits_fiducial,
            has_mc_info: record.has_mc_info(),
            energy: record.analysis_energy,
            energy_from_charge_only: record.energy_from_charge,
            vertex: record.vertex_position.into(),
            direction_cosines: record.direction_cosines.into(),
            momentum: record.analysis_momentum.into(),
            particle_type: record.kind,
            is_shower: record.is_shower,
            number_of_3d_hits: record.number_of_3d_hits,
            number_of_collection_plane_hits: record.number_of_collection_plane_hits,
            number_of_downstream_particles: record.number_of_downstream_particles,
            mc_particle: None,
            mc_energy: 0.0,
            mc_vertex: [0.0; 3],
            mc_direction_cosines: [0.0; 3],
            mc_momentum: [0.0; 3],
            mc_is_vertex_fiducial: false,
            mc_is_contained: false,
            mc_particle_type: TypeLabel::Unknown,
            mc_is_shower: false,
            mc_pdg_code: 0,
            mc_hit_purity: 0.0,
            mc_hit_completeness: 0.0,
        };

        if let Some(mc) = &record.mc {
            row.mc_particle = Some(mc.particle.0);
            row.mc_energy = mc.energy;
            row.mc_vertex = mc.vertex_position.into();
            row.mc_direction_cosines = mc.direction_cosines.into();
            row.mc_momentum = mc.momentum.into();
            row.mc_is_vertex_fiducial = mc.is_vertex_fiducial;
            row.mc_is_contained = mc.is_contained;
            row.mc_particle_type = mc.kind;
            row.mc_is_shower = mc.is_shower;
            row.mc_pdg_code = mc.pdg_code;
            row.mc_hit_purity = mc.hit_purity;
            row.mc_hit_completeness = mc.hit_completeness;
        }

        row
    }
}

/// One event's records split by role.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventNtuple {
    pub neutrinos: Vec<ParticleRow>,
    pub primaries: Vec<ParticleRow>,
    pub cosmic_rays: Vec<ParticleRow>,
}

impl EventNtuple {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a AnalysisParticleRecord>) -> Self {
        let mut ntuple = Self::default();
        for record in records {
            let row = ParticleRow::from(record);
            match record.role {
                CandidateRole::Neutrino => ntuple.neutrinos.push(row),
                CandidateRole::PrimaryDaughter => ntuple.primaries.push(row),
                CandidateRole::CosmicRay => ntuple.cosmic_rays.push(row),
            }
        }
        ntuple
    }

    pub fn was_neutrino_reconstructed(&self) -> bool {
        !self.neutrinos.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
