//! Bottom-up energy aggregation over a candidate hierarchy.

use crate::classifier::TypeMap;
use crate::errors::InvariantViolations;
use crate::fit::TrackFitIndex;
use crate::range::EnergyFromRangeTable;
use crate::recombination::{track_charge_energy, HitEnergyMap, RecombinationModel};
use larreco_types::{CandidateId, Event, HitView, TypeLabel};
use std::ops::{Add, AddAssign};

/// Total and charge-only energy (GeV)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EnergyEstimate {
    pub total: f32,
    pub from_charge: f32,
}

impl EnergyEstimate {
    pub fn new(total: f32, from_charge: f32) -> Self {
        Self { total, from_charge }
    }

    pub fn both(energy: f32) -> Self {
        Self::new(energy, energy)
    }
}

impl Add for EnergyEstimate {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.total + other.total, self.from_charge + other.from_charge)
    }
}

impl AddAssign for EnergyEstimate {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

/// Per-event inputs the aggregation reads.
pub struct EnergyInputs<'a> {
    pub types: &'a TypeMap,
    pub fits: &'a TrackFitIndex,
    pub energies: &'a HitEnergyMap,
}

pub struct EnergyAggregator<'a> {
    model: &'a RecombinationModel,
    proton: &'a EnergyFromRangeTable,
    pion_muon: &'a EnergyFromRangeTable,
}

impl<'a> EnergyAggregator<'a> {
    pub fn new(
        model: &'a RecombinationModel,
        proton: &'a EnergyFromRangeTable,
        pion_muon: &'a EnergyFromRangeTable,
    ) -> Self {
        Self {
            model,
            proton,
            pion_muon,
        }
    }

    /// Uncorrected charge energy of the candidate's own collection-plane hits.
    pub fn charge_energy(&self, event: &Event, id: CandidateId) -> f32 {
        event
            .own_hits(id, HitView::COLLECTION)
            .into_iter()
            .map(|hit| self.model.scaled_energy(hit.input_energy))
            .sum()
    }

    /// Uncorrected charge energy of the candidate and every descendant.
    pub fn shower_energy(&self, event: &Event, id: CandidateId) -> f32 {
        event
            .subtree(id)
            .into_iter()
            .map(|c| self.charge_energy(event, c))
            .sum()
    }

    /// Energy of `id` and its descendants.
    ///
    /// A shower takes the charge of its whole subtree, so its descendants
    /// are not visited again.
    pub fn aggregate(
        &self,
        event: &Event,
        id: CandidateId,
        inputs: &EnergyInputs<'_>,
        violations: &mut InvariantViolations,
    ) -> EnergyEstimate {
        let label = inputs.types.get(&id).copied();
        if label == Some(TypeLabel::Shower) {
            return EnergyEstimate::both(self.shower_energy(event, id));
        }

        let mut estimate = self.own_contribution(event, id, label, inputs, violations);
        for child in event.children(id) {
            estimate += self.aggregate(event, *child, inputs, violations);
        }
        estimate
    }

    /// Contribution of the candidate alone.
    pub fn own_contribution(
        &self,
        event: &Event,
        id: CandidateId,
        label: Option<TypeLabel>,
        inputs: &EnergyInputs<'_>,
        violations: &mut InvariantViolations,
    ) -> EnergyEstimate {
        let fit = inputs.fits.get(id);
        let records = inputs.energies.get(id);
        if fit.is_some() != records.is_some() {
            violations.report(&format!(
                "track fit and hit energies disagree for candidate {id:?}"
            ));
        }

        match label {
            Some(TypeLabel::Shower) => EnergyEstimate::both(self.charge_energy(event, id)),
            Some(kind @ (TypeLabel::Proton | TypeLabel::PionMuon)) => {
                let from_charge = self.charge_energy(event, id);
                let total = match (fit, records) {
                    (Some(fit), Some(records)) => {
                        let table = if kind == TypeLabel::Proton {
                            self.proton
                        } else {
                            self.pion_muon
                        };
                        table
                            .lookup(fit.total_length())
                            .unwrap_or_else(|| track_charge_energy(records))
                    }
                    _ => from_charge,
                };
                EnergyEstimate::new(total, from_charge)
            }
            Some(TypeLabel::Track) => match records {
                Some(records) => EnergyEstimate::both(track_charge_energy(records)),
                None => EnergyEstimate::both(self.charge_energy(event, id)),
            },
            other => {
                violations.report(&format!(
                    "no energy estimate for label {other:?} of candidate {id:?}"
                ));
                EnergyEstimate::both(self.charge_energy(event, id))
            }
        }
    }
}
