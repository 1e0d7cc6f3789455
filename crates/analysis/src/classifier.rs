//! Particle typing of candidates.

use crate::errors::{AnalysisError, InvariantViolations, Result};
use crate::fit::TrackFitIndex;
use crate::recombination::{track_charge_energy, HitEnergyMap};
use larreco_bdt::BdtModel;
use larreco_types::{CandidateId, Event, TypeLabel};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Responses above this are protons.
pub const PROTON_RESPONSE_THRESHOLD: f32 = 0.14;
/// Responses below this are pions or muons.
pub const PION_MUON_RESPONSE_THRESHOLD: f32 = -0.14;

/// Label per candidate of one hierarchy
pub type TypeMap = BTreeMap<CandidateId, TypeLabel>;

/// Scores a track from its range (cm) and mean energy deposition (GeV/cm).
pub trait TrackClassifier: Send + Sync {
    fn response(&self, range: f32, energy_density: f32) -> Result<f32>;
}

pub fn label_for_response(response: f32) -> TypeLabel {
    if response > PROTON_RESPONSE_THRESHOLD {
        TypeLabel::Proton
    } else if response < PION_MUON_RESPONSE_THRESHOLD {
        TypeLabel::PionMuon
    } else {
        TypeLabel::Track
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TrackVariable {
    Range,
    EnergyDensity,
}

impl TrackVariable {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "range" | "track_length" => Some(TrackVariable::Range),
            "energy_density" | "avg_energy_deposition" => Some(TrackVariable::EnergyDensity),
            _ => None,
        }
    }
}

/// [`TrackClassifier`] backed by a BDT whose input variables are named
/// `range` and `energy_density`, in any order.
#[derive(Debug, Clone)]
pub struct BdtTrackClassifier {
    model: BdtModel,
    layout: Vec<TrackVariable>,
}

impl BdtTrackClassifier {
    pub fn new(model: BdtModel) -> Result<Self> {
        let layout = model
            .variables
            .iter()
            .map(|name| {
                TrackVariable::from_name(name).ok_or_else(|| {
                    AnalysisError::Config(format!("Unknown classifier variable '{name}'"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        for required in [TrackVariable::Range, TrackVariable::EnergyDensity] {
            if layout.iter().filter(|v| **v == required).count() != 1 {
                return Err(AnalysisError::Config(format!(
                    "Classifier must use {required:?} exactly once"
                )));
            }
        }

        Ok(Self { model, layout })
    }

    pub fn model(&self) -> &BdtModel {
        &self.model
    }
}

impl TrackClassifier for BdtTrackClassifier {
    fn response(&self, range: f32, energy_density: f32) -> Result<f32> {
        let features: Vec<f32> = self
            .layout
            .iter()
            .map(|v| match v {
                TrackVariable::Range => range,
                TrackVariable::EnergyDensity => energy_density,
            })
            .collect();
        Ok(self.model.evaluate(&features)?)
    }
}

/// Assigns a [`TypeLabel`] to every candidate of a hierarchy.
pub struct TypeClassifier<'a> {
    classifier: &'a dyn TrackClassifier,
}

impl<'a> TypeClassifier<'a> {
    pub fn new(classifier: &'a dyn TrackClassifier) -> Self {
        Self { classifier }
    }

    pub fn classify(
        &self,
        event: &Event,
        id: CandidateId,
        fits: &TrackFitIndex,
        energies: &HitEnergyMap,
        violations: &mut InvariantViolations,
    ) -> TypeLabel {
        if !event[id].is_track_like {
            return TypeLabel::Shower;
        }

        let Some(records) = energies.get(id) else {
            return TypeLabel::Track;
        };
        let Some(fit) = fits.get(id) else {
            violations.report(&format!("hit energies without a track fit for {id:?}"));
            return TypeLabel::Track;
        };

        let energy = track_charge_energy(records);
        let range = fit.total_length();
        if !(energy > 0.0 && range > 0.0) {
            return TypeLabel::Track;
        }

        match self.classifier.response(range, energy / range) {
            Ok(response) => {
                debug!(
                    "Candidate {:?}: range {:.2} cm, {:.4} GeV, response {:.3}",
                    id, range, energy, response
                );
                label_for_response(response)
            }
            Err(e) => {
                warn!("Classifier failed for candidate {:?}: {}", id, e);
                TypeLabel::Track
            }
        }
    }

    /// Labels for `root` and all its descendants.
    pub fn type_map(
        &self,
        event: &Event,
        root: CandidateId,
        fits: &TrackFitIndex,
        energies: &HitEnergyMap,
        violations: &mut InvariantViolations,
    ) -> TypeMap {
        event
            .subtree(root)
            .into_iter()
            .map(|id| (id, self.classify(event, id, fits, energies, violations)))
            .collect()
    }
}
