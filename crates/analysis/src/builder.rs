//! Per-event orchestration: candidate roles, analysis records and their
//! hand-off to a [`ParticleSink`].

use crate::classifier::TypeClassifier;
use crate::config::AnalysisSettings;
use crate::energy::{EnergyAggregator, EnergyInputs};
use crate::errors::{AnalysisError, InvariantViolations, Result, SinkError};
use crate::fit::{TrackFit, TrackFitIndex};
use crate::pca::pca;
use crate::recombination::{HitEnergyMap, RecombinationCorrector};
use crate::truth::TruthMatcher;
use crate::type_tree::build_type_tree;
use larreco_types::{
    beam_axis, unit_or_zero, AnalysisParticleRecord, CaloHit, Candidate, CandidateId,
    CandidateRole, Event, FiducialVolume, HitView, McInfo, McTruth, Point, TypeLabel, TypeTree,
    Vertex,
};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Why no record was produced for a candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// Neither a neutrino, a primary neutrino daughter nor a cosmic ray
    UnrecognizedRole,
    /// Number of associated vertices, when not exactly one
    VertexCount(usize),
}

/// Role of a candidate in its hierarchy, if it has a recognized one.
pub fn candidate_role(event: &Event, id: CandidateId) -> Option<CandidateRole> {
    let candidate = event.candidate(id)?;
    if candidate.is_root() {
        if candidate.is_neutrino() {
            Some(CandidateRole::Neutrino)
        } else {
            Some(CandidateRole::CosmicRay)
        }
    } else if event.is_primary_neutrino_daughter(id) {
        Some(CandidateRole::PrimaryDaughter)
    } else {
        None
    }
}

/// Receives finished records. An error aborts the event.
pub trait ParticleSink {
    fn accept(&mut self, record: AnalysisParticleRecord, vertex: Vertex) -> std::result::Result<(), SinkError>;
}

/// Collects records in memory, in hand-off order.
#[derive(Debug, Default)]
pub struct VecSink {
    records: Vec<(AnalysisParticleRecord, Vertex)>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[(AnalysisParticleRecord, Vertex)] {
        &self.records
    }

    pub fn record(&self, candidate: CandidateId) -> Option<&AnalysisParticleRecord> {
        self.records
            .iter()
            .map(|(record, _)| record)
            .find(|record| record.candidate == candidate)
    }

    pub fn into_records(self) -> Vec<AnalysisParticleRecord> {
        self.records.into_iter().map(|(record, _)| record).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ParticleSink for VecSink {
    fn accept(&mut self, record: AnalysisParticleRecord, vertex: Vertex) -> std::result::Result<(), SinkError> {
        self.records.push((record, vertex));
        Ok(())
    }
}

/// Outcome of one event
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EventSummary {
    pub candidate_count: usize,
    pub built: Vec<CandidateId>,
    pub skipped: Vec<(CandidateId, SkipReason)>,
    /// Built primary daughters that are track-like
    pub primary_tracks: u32,
    /// Built primary daughters that are shower-like
    pub primary_showers: u32,
    pub invariant_violations: u32,
}

impl EventSummary {
    pub fn is_built(&self, id: CandidateId) -> bool {
        self.built.contains(&id)
    }

    pub fn skip_reason(&self, id: CandidateId) -> Option<SkipReason> {
        self.skipped
            .iter()
            .find(|(candidate, _)| *candidate == id)
            .map(|(_, reason)| *reason)
    }
}

struct EventState<'e> {
    matcher: Option<TruthMatcher<'e>>,
    violations: InvariantViolations,
    summary: EventSummary,
}

/// Fraction of `hits` inside `volume`, and whether all of them are.
/// No hits: all inside, fraction 0.
fn fiducial_hit_stats(hits: &[&CaloHit], volume: &FiducialVolume) -> (bool, f32) {
    let inside = hits.iter().filter(|h| volume.contains(&h.position)).count();
    let fraction = if hits.is_empty() {
        0.0
    } else {
        inside as f32 / hits.len() as f32
    };
    (inside == hits.len(), fraction)
}

/// Initial direction of a candidate at its vertex: the fitted direction when
/// there is a fit, else the principal axis of its subtree's 3D hits. It is
/// oriented towards the centroid of those hits.
pub fn direction_at_vertex(
    event: &Event,
    id: CandidateId,
    fit: Option<&dyn TrackFit>,
    vertex: &Point,
) -> Point {
    let hits = event.subtree_hits(id, &[HitView::ThreeD]);
    let cloud = pca(hits.iter().map(|h| &h.position));

    let direction = match (fit, &cloud) {
        (Some(fit), _) => fit.direction_at(vertex),
        (None, Some(cloud)) => cloud.principal_axis(),
        (None, None) => {
            warn!("PCA eigenvectors were empty for candidate {:?}", id);
            return Point::zeros();
        }
    };
    let direction = unit_or_zero(&direction);

    match cloud {
        Some(cloud) if (cloud.centroid - vertex).dot(&direction) < 0.0 => -direction,
        _ => direction,
    }
}

/// Builds analysis records for every recognized candidate of an event.
pub struct ParticleBuilder<'a> {
    settings: &'a AnalysisSettings,
}

impl<'a> ParticleBuilder<'a> {
    pub fn new(settings: &'a AnalysisSettings) -> Self {
        Self { settings }
    }

    /// Process one event. Neutrino daughters are handed off before their
    /// neutrino, whose record sums theirs.
    pub fn build_event(
        &self,
        event: &Event,
        truth: Option<&McTruth>,
        sink: &mut dyn ParticleSink,
    ) -> Result<EventSummary> {
        let matcher = match truth {
            Some(truth) if self.settings.add_mc_information() => Some(TruthMatcher::new(event, truth)),
            None if self.settings.add_mc_information() => {
                debug!("No MC truth supplied, records will carry no MC information");
                None
            }
            _ => None,
        };

        let mut state = EventState {
            matcher,
            violations: InvariantViolations::default(),
            summary: EventSummary {
                candidate_count: event.candidate_count(),
                ..EventSummary::default()
            },
        };

        for root in event.roots().iter().copied() {
            match candidate_role(event, root) {
                Some(CandidateRole::Neutrino) => {
                    let mut daughters = Vec::new();
                    for daughter in event.children(root).iter().copied() {
                        if let Some(record) = self.process(
                            event,
                            &mut state,
                            daughter,
                            CandidateRole::PrimaryDaughter,
                            &[],
                            sink,
                        )? {
                            daughters.push(record);
                        }
                        self.skip_descendants(event, &mut state, daughter);
                    }
                    self.process(event, &mut state, root, CandidateRole::Neutrino, &daughters, sink)?;
                }
                Some(role) => {
                    self.process(event, &mut state, root, role, &[], sink)?;
                    self.skip_descendants(event, &mut state, root);
                }
                None => {
                    state.summary.skipped.push((root, SkipReason::UnrecognizedRole));
                }
            }
        }

        let mut summary = state.summary;
        summary.invariant_violations = state.violations.count();
        info!(
            "Event processed: {} candidates, {} built, {} skipped, {} invariant violations",
            summary.candidate_count,
            summary.built.len(),
            summary.skipped.len(),
            summary.invariant_violations
        );
        Ok(summary)
    }

    fn skip_descendants(&self, event: &Event, state: &mut EventState<'_>, id: CandidateId) {
        for descendant in event.subtree(id).into_iter().skip(1) {
            state
                .summary
                .skipped
                .push((descendant, SkipReason::UnrecognizedRole));
        }
    }

    fn process(
        &self,
        event: &Event,
        state: &mut EventState<'_>,
        id: CandidateId,
        role: CandidateRole,
        daughters: &[AnalysisParticleRecord],
        sink: &mut dyn ParticleSink,
    ) -> Result<Option<AnalysisParticleRecord>> {
        let candidate = &event[id];
        let vertex = match candidate.single_vertex() {
            Some(vertex) => *vertex,
            None => {
                let count = candidate.vertices.len();
                warn!(
                    "Could not create analysis particle for candidate {:?}: number of vertices was {}",
                    id, count
                );
                state.summary.skipped.push((id, SkipReason::VertexCount(count)));
                return Ok(None);
            }
        };

        let fiducial = self.settings.fiducial();
        let mc = state.matcher.as_mut().and_then(|matcher| {
            matcher.mc_info(
                id,
                role,
                fiducial,
                self.settings.containment_fraction_lower_bound(),
            )
        });

        let record = match role {
            CandidateRole::Neutrino => self.neutrino_record(event, candidate, &vertex, daughters, mc),
            _ => self.particle_record(event, candidate, role, &vertex, mc, &mut state.violations),
        };

        record
            .validate()
            .map_err(|e| AnalysisError::Construction {
                candidate: id,
                reason: e.to_string(),
            })?;
        sink.accept(record.clone(), vertex)
            .map_err(|e| AnalysisError::Construction {
                candidate: id,
                reason: e.to_string(),
            })?;

        state.summary.built.push(id);
        if role == CandidateRole::PrimaryDaughter {
            if record.is_shower {
                state.summary.primary_showers += 1;
            } else {
                state.summary.primary_tracks += 1;
            }
        }
        Ok(Some(record))
    }

    /// Record with the framework metadata and vertex fields filled in and
    /// all analysis quantities zeroed.
    fn base_record(
        &self,
        event: &Event,
        candidate: &Candidate,
        role: CandidateRole,
        vertex: &Vertex,
        mc: Option<McInfo>,
    ) -> AnalysisParticleRecord {
        AnalysisParticleRecord {
            candidate: candidate.id,
            role,
            kind: TypeLabel::Unknown,
            type_tree: TypeTree::leaf(TypeLabel::Unknown),
            particle_id: candidate.particle_id,
            charge: candidate.charge,
            mass: candidate.mass,
            framework_energy: candidate.energy,
            framework_momentum: candidate.momentum,
            is_shower: !candidate.is_track_like,
            vertex_position: vertex.position,
            is_vertex_fiducial: self.settings.fiducial().contains(&vertex.position),
            are_all_hits_fiducial: true,
            fiducial_hit_fraction: 0.0,
            analysis_energy: 0.0,
            energy_from_charge: 0.0,
            direction_cosines: Point::zeros(),
            analysis_momentum: Point::zeros(),
            number_of_3d_hits: 0,
            number_of_collection_plane_hits: 0,
            number_of_downstream_particles: event.descendant_count(candidate.id) as u32,
            mc,
        }
    }

    fn neutrino_record(
        &self,
        event: &Event,
        candidate: &Candidate,
        vertex: &Vertex,
        daughters: &[AnalysisParticleRecord],
        mc: Option<McInfo>,
    ) -> AnalysisParticleRecord {
        let mut record = self.base_record(event, candidate, CandidateRole::Neutrino, vertex, mc);
        record.kind = TypeLabel::Neutrino;
        record.type_tree = TypeTree::new(
            TypeLabel::Neutrino,
            daughters.iter().map(|d| d.type_tree.clone()).collect(),
        );
        record.direction_cosines = beam_axis();

        let mut fiducial_hits = 0.0f32;
        for daughter in daughters {
            record.analysis_energy += daughter.analysis_energy;
            record.energy_from_charge += daughter.energy_from_charge;
            record.are_all_hits_fiducial &= daughter.are_all_hits_fiducial;
            record.analysis_momentum += daughter.analysis_momentum;
            record.number_of_3d_hits += daughter.number_of_3d_hits;
            record.number_of_collection_plane_hits += daughter.number_of_collection_plane_hits;
            fiducial_hits += daughter.fiducial_hit_fraction * daughter.number_of_3d_hits as f32;
        }
        if record.number_of_3d_hits > 0 {
            record.fiducial_hit_fraction = fiducial_hits / record.number_of_3d_hits as f32;
        }
        record
    }

    fn particle_record(
        &self,
        event: &Event,
        candidate: &Candidate,
        role: CandidateRole,
        vertex: &Vertex,
        mc: Option<McInfo>,
        violations: &mut InvariantViolations,
    ) -> AnalysisParticleRecord {
        let settings = self.settings;
        let id = candidate.id;

        let fits = TrackFitIndex::build(event, id, settings.fitter(), settings.sliding_fit_window());
        let corrector = RecombinationCorrector::new(settings.recombination(), settings.hit_selection());
        let energies = HitEnergyMap::build(event, &fits, &corrector, violations);
        let types = TypeClassifier::new(settings.classifier()).type_map(event, id, &fits, &energies, violations);

        let inputs = EnergyInputs {
            types: &types,
            fits: &fits,
            energies: &energies,
        };
        let energy = EnergyAggregator::new(
            settings.recombination(),
            settings.proton_table(),
            settings.pion_muon_table(),
        )
        .aggregate(event, id, &inputs, violations);

        let direction = direction_at_vertex(event, id, fits.get(id), &vertex.position);
        let hits_3d = event.subtree_hits(id, &[HitView::ThreeD]);
        let (all_fiducial, fiducial_fraction) = fiducial_hit_stats(&hits_3d, settings.fiducial());

        let mut record = self.base_record(event, candidate, role, vertex, mc);
        record.kind = types.get(&id).copied().unwrap_or(TypeLabel::Unknown);
        record.type_tree = build_type_tree(event, id, &types);
        record.analysis_energy = energy.total;
        record.energy_from_charge = energy.from_charge;
        record.direction_cosines = direction;
        record.analysis_momentum = direction * energy.total;
        record.are_all_hits_fiducial = all_fiducial;
        record.fiducial_hit_fraction = fiducial_fraction;
        record.number_of_3d_hits = hits_3d.len() as u32;
        record.number_of_collection_plane_hits = event.subtree_hits(id, &[HitView::COLLECTION]).len() as u32;
        record
    }
}
