//! Calorimetric hit energies with the Birks-style recombination correction.
//!
//! Raw hit charge `dQ` becomes an uncorrected energy `dQ / (α·1000)` (GeV).
//! Over a path length `dx` the uncorrected `dE/dx` (MeV/cm) is corrected as
//! `dE/dx / (1 - (dE/dx)/β)`. The correction diverges as `dE/dx → β`, so
//! every corrected value is guarded before it is trusted.

use crate::errors::InvariantViolations;
use crate::fit::{TrackFit, TrackFitIndex};
use crate::selection::HitSelectionPolicy;
use larreco_types::{CandidateId, Event, HitId, HitView};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Derived quantities of one collection-plane hit of a track.
#[derive(Clone, Debug, PartialEq)]
pub struct HitEnergyRecord {
    pub hit: HitId,
    /// Projection along the track fit
    pub coordinate: f32,
    /// GeV
    pub uncorrected_energy: f32,
    /// GeV
    pub corrected_energy: f32,
    pub apply_correction: bool,
}

impl HitEnergyRecord {
    /// The energy this hit contributes to the track (GeV).
    pub fn energy(&self) -> f32 {
        if self.apply_correction {
            self.corrected_energy
        } else {
            self.uncorrected_energy
        }
    }
}

/// Charge energy of a track, honouring each record's correction flag (GeV).
pub fn track_charge_energy(records: &[HitEnergyRecord]) -> f32 {
    records.iter().map(HitEnergyRecord::energy).sum()
}

/// Recombination model parameters
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecombinationModel {
    /// Charge scale: ADC per MeV
    pub alpha: f32,
    /// Pole of the correction (MeV/cm)
    pub beta: f32,
    /// Corrected hit energies at or above this (MeV) are not trusted
    pub max_dedx: f32,
}

impl Default for RecombinationModel {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 10.0,
            max_dedx: 500.0,
        }
    }
}

impl RecombinationModel {
    /// Uncorrected energy of a raw charge (GeV).
    pub fn scaled_energy(&self, charge: f32) -> f32 {
        charge / (self.alpha * 1000.0)
    }

    /// Corrected energy (GeV) of `uncorrected` GeV deposited over
    /// `path_length` cm.
    pub fn correct(&self, uncorrected: f32, path_length: f32) -> f32 {
        let dedx_uncorrected = 1000.0 * uncorrected / path_length;
        let dedx_corrected = dedx_uncorrected / (1.0 - dedx_uncorrected / self.beta);
        dedx_corrected * path_length / 1000.0
    }

    /// Whether a corrected value can be used at all. Energies are compared
    /// in MeV.
    pub fn correction_is_trustworthy(&self, record: &HitEnergyRecord) -> bool {
        if record.uncorrected_energy * 1000.0 >= self.beta {
            return false;
        }
        if !(record.corrected_energy > 0.0) {
            return false;
        }
        if record.corrected_energy * 1000.0 >= self.max_dedx {
            return false;
        }
        record.corrected_energy.is_finite()
    }
}

/// Builds the ordered [`HitEnergyRecord`] sequence of a fitted track.
pub struct RecombinationCorrector<'a> {
    model: &'a RecombinationModel,
    policy: &'a dyn HitSelectionPolicy,
}

impl<'a> RecombinationCorrector<'a> {
    pub fn new(model: &'a RecombinationModel, policy: &'a dyn HitSelectionPolicy) -> Self {
        Self { model, policy }
    }

    /// Records for the candidate's own collection-plane hits, ordered by
    /// projection onto `fit`; equal projections keep hit order.
    pub fn hit_energies(
        &self,
        event: &Event,
        id: CandidateId,
        fit: &dyn TrackFit,
        violations: &mut InvariantViolations,
    ) -> Vec<HitEnergyRecord> {
        let mut projected: Vec<_> = event
            .own_hits(id, HitView::COLLECTION)
            .into_iter()
            .map(|hit| (fit.projection(&hit.position), hit))
            .collect();
        projected.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut records: Vec<HitEnergyRecord> = projected
            .into_iter()
            .map(|(coordinate, hit)| {
                let uncorrected_energy = self.model.scaled_energy(hit.input_energy);
                let corrected_energy = self.model.correct(uncorrected_energy, fit.path_length(hit));
                HitEnergyRecord {
                    hit: hit.id,
                    coordinate,
                    uncorrected_energy,
                    corrected_energy,
                    apply_correction: false,
                }
            })
            .collect();

        let flags = self.policy.select(&records);
        if flags.len() != records.len() {
            violations.report(&format!(
                "hit selection returned {} flags for {} hits of candidate {:?}",
                flags.len(),
                records.len(),
                id
            ));
        }

        for (i, record) in records.iter_mut().enumerate() {
            let selected = flags.get(i).copied().unwrap_or(false);
            record.apply_correction = selected && self.model.correction_is_trustworthy(record);
        }

        records
    }
}

/// Hit-energy sequences keyed by candidate; present exactly for the
/// candidates of a [`TrackFitIndex`].
#[derive(Debug, Default)]
pub struct HitEnergyMap {
    records: BTreeMap<CandidateId, Vec<HitEnergyRecord>>,
}

impl HitEnergyMap {
    pub fn build(
        event: &Event,
        fits: &TrackFitIndex,
        corrector: &RecombinationCorrector<'_>,
        violations: &mut InvariantViolations,
    ) -> Self {
        let mut records = BTreeMap::new();
        for id in fits.candidates() {
            if let Some(fit) = fits.get(id) {
                records.insert(id, corrector.hit_energies(event, id, fit, violations));
            }
        }
        Self { records }
    }

    pub fn get(&self, id: CandidateId) -> Option<&[HitEnergyRecord]> {
        self.records.get(&id).map(Vec::as_slice)
    }

    pub fn contains(&self, id: CandidateId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::{LinearTrackFitter, TrackFitter};
    use crate::selection::{SelectAll, SelectNone};
    use larreco_types::{CaloHit, NewCandidate, Point};

    /// Straight track along the beam with collection-plane hits of unit
    /// pitch at the given z positions.
    fn track_event(hits: &[(f32, f32)]) -> (Event, CandidateId) {
        let mut builder = Event::builder();
        let mut ids: Vec<_> = (0..5)
            .map(|i| builder.add_hit(HitView::ThreeD, Point::new(0.0, 0.0, i as f32 * 2.0), 0.0, 0.0))
            .collect();
        for (z, charge) in hits {
            ids.push(builder.add_hit(HitView::W, Point::new(0.0, 0.0, *z), *charge, 1.0));
        }
        let track = builder
            .add_candidate(NewCandidate::track().with_hits(ids), None)
            .unwrap();
        (builder.build(), track)
    }

    fn fit_for(event: &Event, id: CandidateId) -> Box<dyn TrackFit> {
        let hits: Vec<&CaloHit> = event.own_hits(id, HitView::ThreeD);
        LinearTrackFitter.fit(&hits, 25).unwrap()
    }

    #[test]
    fn test_scaled_energy_and_correction() {
        let model = RecombinationModel {
            alpha: 1.0,
            beta: 1000.0,
            max_dedx: 500.0,
        };
        assert!((model.scaled_energy(10.0) - 0.01).abs() < 1e-7);

        // 10 MeV/cm against a pole at 1000 MeV/cm: a 1% correction.
        let corrected = model.correct(0.01, 1.0);
        assert!((corrected - 0.01 / 0.99).abs() < 1e-6);
    }

    #[test]
    fn test_records_are_ordered_by_projection() {
        let (event, track) = track_event(&[(6.0, 30.0), (2.0, 10.0), (4.0, 20.0)]);
        let model = RecombinationModel {
            alpha: 1.0,
            beta: 1000.0,
            max_dedx: 500.0,
        };
        let fit = fit_for(&event, track);
        let mut violations = InvariantViolations::default();
        let records = RecombinationCorrector::new(&model, &SelectNone).hit_energies(
            &event,
            track,
            fit.as_ref(),
            &mut violations,
        );

        let coordinates: Vec<f32> = records.iter().map(|r| r.coordinate).collect();
        assert!(coordinates.windows(2).all(|w| w[0] <= w[1]));
        assert!((track_charge_energy(&records) - 0.06).abs() < 1e-6);
        assert_eq!(violations.count(), 0);
    }

    #[test]
    fn test_guards_override_the_policy() {
        let model = RecombinationModel {
            alpha: 1.0,
            beta: 50.0,
            max_dedx: 40.0,
        };
        let record = |uncorrected: f32, corrected: f32| HitEnergyRecord {
            hit: HitId(0),
            coordinate: 0.0,
            uncorrected_energy: uncorrected,
            corrected_energy: corrected,
            apply_correction: true,
        };

        assert!(model.correction_is_trustworthy(&record(0.010, 0.0125)));
        // Uncorrected at the pole
        assert!(!model.correction_is_trustworthy(&record(0.050, 0.01)));
        // Corrected pushed negative past the pole
        assert!(!model.correction_is_trustworthy(&record(0.020, -0.01)));
        assert!(!model.correction_is_trustworthy(&record(0.020, 0.0)));
        // Corrected above the maximum
        assert!(!model.correction_is_trustworthy(&record(0.020, 0.040)));
        assert!(!model.correction_is_trustworthy(&record(0.020, f32::INFINITY)));
        assert!(!model.correction_is_trustworthy(&record(0.020, f32::NAN)));
    }

    #[test]
    fn test_guarded_hits_fall_back_to_uncorrected() {
        // 60 MeV over 1 cm is past the 50 MeV/cm pole.
        let (event, track) = track_event(&[(2.0, 5.0), (4.0, 60.0)]);
        let model = RecombinationModel {
            alpha: 1.0,
            beta: 50.0,
            max_dedx: 500.0,
        };
        let fit = fit_for(&event, track);
        let mut violations = InvariantViolations::default();
        let records = RecombinationCorrector::new(&model, &SelectAll).hit_energies(
            &event,
            track,
            fit.as_ref(),
            &mut violations,
        );

        let hot = records.iter().find(|r| r.uncorrected_energy > 0.05).unwrap();
        assert!(!hot.apply_correction);
        assert_eq!(hot.energy(), hot.uncorrected_energy);
        assert_eq!(records.iter().filter(|r| r.apply_correction).count(), 1);
    }

    #[derive(Debug)]
    struct ShortPolicy;

    impl HitSelectionPolicy for ShortPolicy {
        fn select(&self, _records: &[HitEnergyRecord]) -> Vec<bool> {
            vec![true]
        }
    }

    #[test]
    fn test_short_policy_output_is_a_violation() {
        let (event, track) = track_event(&[(2.0, 5.0), (4.0, 6.0)]);
        let model = RecombinationModel {
            alpha: 1.0,
            beta: 1000.0,
            max_dedx: 500.0,
        };
        let fit = fit_for(&event, track);
        let mut violations = InvariantViolations::default();
        let records = RecombinationCorrector::new(&model, &ShortPolicy).hit_energies(
            &event,
            track,
            fit.as_ref(),
            &mut violations,
        );

        assert_eq!(violations.count(), 1);
        assert_eq!(records.iter().filter(|r| r.apply_correction).count(), 1);
    }
}
