//! Matching reconstructed candidates to Monte Carlo truth.

use larreco_types::{
    CandidateId, CandidateRole, Event, FiducialVolume, HitId, HitView, McInfo, McParticleId,
    McTruth, Point, TypeLabel, TypeTree,
};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Hit-level match quality of a candidate against a truth particle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HitMatch {
    pub purity: f32,
    pub completeness: f32,
}

/// Truth particle a candidate is compared against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TruthTarget {
    /// Everything produced by this true neutrino
    Neutrino(McParticleId),
    /// Everything descending from this primary particle
    Primary(McParticleId),
}

impl TruthTarget {
    pub fn particle(&self) -> McParticleId {
        match *self {
            TruthTarget::Neutrino(id) | TruthTarget::Primary(id) => id,
        }
    }
}

/// Per-event truth matcher. Main-particle lookups are cached per candidate
/// for the lifetime of the matcher.
pub struct TruthMatcher<'a> {
    event: &'a Event,
    truth: &'a McTruth,
    main_particles: BTreeMap<CandidateId, Option<McParticleId>>,
}

impl<'a> TruthMatcher<'a> {
    pub fn new(event: &'a Event, truth: &'a McTruth) -> Self {
        Self {
            event,
            truth,
            main_particles: BTreeMap::new(),
        }
    }

    /// Whether a truth contribution from `particle` counts towards `target`.
    /// Contributions whose ancestry cannot be resolved never count.
    fn resolves_to(&self, particle: McParticleId, target: TruthTarget) -> bool {
        let Some(primary) = self.truth.primary(particle) else {
            return false;
        };
        match target {
            TruthTarget::Primary(id) => primary == id,
            TruthTarget::Neutrino(id) => self.truth.root(primary) == Some(id),
        }
    }

    /// Purity and completeness of the 2D hits of `candidate` and its
    /// descendants against `target`.
    ///
    /// A hit's matched weight is capped at 1. Both values are 0 when the
    /// candidate has no 2D hits or the target left no weight in the event.
    pub fn hit_match(&self, candidate: CandidateId, target: TruthTarget) -> HitMatch {
        let candidate_hits = self.event.subtree_hits(candidate, &HitView::TWO_D);

        let mut matched: BTreeMap<HitId, f32> = BTreeMap::new();
        let mut total_weight = 0.0f32;
        for (hit, weights) in self.truth.weighted_hits() {
            let weight: f32 = weights
                .iter()
                .filter(|w| self.resolves_to(w.particle, target))
                .map(|w| w.weight)
                .sum();
            if weight > 0.0 {
                matched.insert(hit, weight);
                total_weight += weight;
            }
        }

        if candidate_hits.is_empty() || total_weight < f32::EPSILON {
            return HitMatch::default();
        }

        let numerator: f32 = candidate_hits
            .iter()
            .filter_map(|hit| matched.get(&hit.id))
            .map(|weight| weight.min(1.0))
            .sum();

        HitMatch {
            purity: numerator / candidate_hits.len() as f32,
            completeness: numerator / total_weight,
        }
    }

    /// The primary particle with the largest summed weight over the
    /// candidate's own 2D hits; ties go to the lowest id.
    pub fn main_mc_particle(&mut self, candidate: CandidateId) -> Option<McParticleId> {
        if let Some(cached) = self.main_particles.get(&candidate) {
            return *cached;
        }

        let mut totals: BTreeMap<McParticleId, f32> = BTreeMap::new();
        for view in HitView::TWO_D {
            for hit in self.event.own_hits(candidate, view) {
                for w in self.truth.hit_weights(hit.id) {
                    if let Some(primary) = self.truth.primary(w.particle) {
                        *totals.entry(primary).or_default() += w.weight;
                    }
                }
            }
        }

        let mut best: Option<(McParticleId, f32)> = None;
        for (particle, weight) in totals {
            if weight > 0.0 && best.map_or(true, |(_, best_weight)| weight > best_weight) {
                best = Some((particle, weight));
            }
        }

        let main = best.map(|(particle, _)| particle);
        if main.is_none() {
            debug!("No main MC particle for candidate {:?}", candidate);
        }
        self.main_particles.insert(candidate, main);
        main
    }

    /// The true neutrino of the event; the most energetic by momentum when
    /// there are several.
    pub fn true_neutrino(&self) -> Option<McParticleId> {
        let neutrinos = self.truth.true_neutrinos();
        if neutrinos.len() > 1 {
            warn!(
                "{} true neutrinos in the event, using the one with the largest momentum",
                neutrinos.len()
            );
        }

        let mut best: Option<(McParticleId, f32)> = None;
        for nu in neutrinos {
            let p = nu.momentum.norm();
            if best.map_or(true, |(_, best_p)| p > best_p) {
                best = Some((nu.id, p));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Truth fields for a candidate, or `None` when no truth particle can be
    /// associated with it.
    pub fn mc_info(
        &mut self,
        candidate: CandidateId,
        role: CandidateRole,
        fiducial: &FiducialVolume,
        containment_lower_bound: f32,
    ) -> Option<McInfo> {
        let target = match role {
            CandidateRole::Neutrino => TruthTarget::Neutrino(self.true_neutrino()?),
            _ => TruthTarget::Primary(self.main_mc_particle(candidate)?),
        };
        let particle = self.truth.particle(target.particle())?;

        let energy = if particle.is_neutrino() {
            particle.energy
        } else {
            particle.kinetic_energy()
        };

        let momentum_norm = particle.momentum.norm();
        let direction_cosines = if momentum_norm > f32::EPSILON {
            particle.momentum / momentum_norm
        } else {
            warn!(
                "MC particle {:?} momentum too small for a direction",
                particle.id
            );
            Point::zeros()
        };

        let kind = TypeLabel::from_pdg(particle.pdg_code);
        let hit_match = self.hit_match(candidate, target);

        Some(McInfo {
            particle: particle.id,
            energy,
            vertex_position: particle.vertex,
            momentum: particle.momentum,
            direction_cosines,
            pdg_code: particle.pdg_code,
            kind,
            type_tree: mc_type_tree(self.truth, particle.id),
            is_vertex_fiducial: fiducial.contains(&particle.vertex),
            is_contained: containment_fraction(self.truth, particle.id, fiducial)
                > containment_lower_bound,
            is_shower: kind == TypeLabel::Shower,
            hit_purity: hit_match.purity,
            hit_completeness: hit_match.completeness,
        })
    }
}

/// Labels from PDG codes over the true particle and its descendants.
pub fn mc_type_tree(truth: &McTruth, id: McParticleId) -> TypeTree {
    match truth.particle(id) {
        Some(particle) => TypeTree::new(
            TypeLabel::from_pdg(particle.pdg_code),
            particle
                .children
                .iter()
                .filter(|child| truth.particle(**child).is_some())
                .map(|child| mc_type_tree(truth, *child))
                .collect(),
        ),
        None => TypeTree::leaf(TypeLabel::Unknown),
    }
}

/// Share of the kinetic energy of the particle and its descendants carried
/// by particles that start and end inside the fiducial volume. Neutrinos
/// are left out of both sums.
pub fn containment_fraction(truth: &McTruth, id: McParticleId, fiducial: &FiducialVolume) -> f32 {
    let mut total = 0.0f32;
    let mut contained = 0.0f32;
    for particle in truth
        .descendants(id)
        .into_iter()
        .filter_map(|p| truth.particle(p))
        .filter(|p| !p.is_neutrino())
    {
        let kinetic = particle.kinetic_energy();
        total += kinetic;
        if fiducial.contains(&particle.vertex) && fiducial.contains(&particle.endpoint) {
            contained += kinetic;
        }
    }

    if total > f32::EPSILON {
        contained / total
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use larreco_types::{pdg, NewCandidate, NewMcParticle};
    use proptest::prelude::*;

    fn fiducial() -> FiducialVolume {
        FiducialVolume::new(Point::new(0.0, 0.0, 0.0), Point::new(100.0, 100.0, 100.0))
    }

    fn particle(pdg_code: i32, energy: f32, mass: f32, vertex: Point, endpoint: Point) -> NewMcParticle {
        NewMcParticle {
            pdg_code,
            energy,
            mass,
            momentum: Point::new(0.0, 0.0, energy),
            vertex,
            endpoint,
        }
    }

    #[test]
    fn test_containment_fraction() {
        let mut builder = McTruth::builder();
        let inside = Point::new(50.0, 50.0, 50.0);
        let outside = Point::new(50.0, 50.0, 150.0);
        let muon = builder
            .add_particle(particle(pdg::MUON, 0.4, 0.1, inside, inside), None)
            .unwrap();
        builder
            .add_particle(particle(pdg::ELECTRON, 0.1, 0.0, inside, outside), Some(muon))
            .unwrap();
        let truth = builder.build();

        let fraction = containment_fraction(&truth, muon, &fiducial());
        assert!((fraction - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_mc_type_tree_mirrors_children() {
        let mut builder = McTruth::builder();
        let origin = Point::zeros();
        let nu = builder
            .add_particle(particle(pdg::NU_MU, 1.0, 0.0, origin, origin), None)
            .unwrap();
        let p = builder
            .add_particle(particle(pdg::PROTON, 1.2, 0.938, origin, origin), Some(nu))
            .unwrap();
        builder
            .add_particle(particle(pdg::PHOTON, 0.1, 0.0, origin, origin), Some(p))
            .unwrap();
        builder
            .add_particle(particle(pdg::MUON, 0.5, 0.1, origin, origin), Some(nu))
            .unwrap();
        let truth = builder.build();

        assert_eq!(
            mc_type_tree(&truth, nu).labels(),
            vec![
                TypeLabel::Neutrino,
                TypeLabel::Proton,
                TypeLabel::Shower,
                TypeLabel::PionMuon
            ]
        );
    }

    /// One candidate with two collection hits; truth has a neutrino with a
    /// muon and a proton, plus a cosmic muon.
    fn matched_event() -> (Event, CandidateId, McTruth, [McParticleId; 4]) {
        let mut events = Event::builder();
        let h0 = events.add_hit(HitView::W, Point::zeros(), 1.0, 0.3);
        let h1 = events.add_hit(HitView::W, Point::zeros(), 1.0, 0.3);
        let h2 = events.add_hit(HitView::W, Point::zeros(), 1.0, 0.3);
        let candidate = events
            .add_candidate(NewCandidate::track().with_hits([h0, h1]), None)
            .unwrap();
        let event = events.build();

        let origin = Point::new(10.0, 10.0, 10.0);
        let mut truth = McTruth::builder();
        let nu = truth
            .add_particle(particle(pdg::NU_MU, 1.0, 0.0, origin, origin), None)
            .unwrap();
        let muon = truth
            .add_particle(particle(pdg::MUON, 0.5, 0.1, origin, origin), Some(nu))
            .unwrap();
        let proton = truth
            .add_particle(particle(pdg::PROTON, 1.0, 0.938, origin, origin), Some(nu))
            .unwrap();
        let cosmic = truth
            .add_particle(particle(pdg::MUON, 2.0, 0.1, origin, origin), None)
            .unwrap();

        truth.add_hit_weight(h0, muon, 1.0).unwrap();
        truth.add_hit_weight(h1, muon, 0.5).unwrap();
        truth.add_hit_weight(h1, proton, 0.5).unwrap();
        truth.add_hit_weight(h2, muon, 1.0).unwrap();
        truth.add_hit_weight(h2, cosmic, 0.25).unwrap();
        // Unknown particle: skipped
        truth.add_hit_weight(h2, McParticleId(99), 1.0).unwrap();

        (event, candidate, truth.build(), [nu, muon, proton, cosmic])
    }

    #[test]
    fn test_primary_purity_and_completeness() {
        let (event, candidate, truth, [_, muon, ..]) = matched_event();
        let matcher = TruthMatcher::new(&event, &truth);

        let result = matcher.hit_match(candidate, TruthTarget::Primary(muon));
        assert!((result.purity - 0.75).abs() < 1e-6);
        assert!((result.completeness - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_neutrino_purity_and_completeness() {
        let (event, candidate, truth, [nu, ..]) = matched_event();
        let matcher = TruthMatcher::new(&event, &truth);

        let result = matcher.hit_match(candidate, TruthTarget::Neutrino(nu));
        assert!((result.purity - 1.0).abs() < 1e-6);
        assert!((result.completeness - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_matches_are_zero() {
        let (event, candidate, truth, [.., cosmic]) = matched_event();
        let matcher = TruthMatcher::new(&event, &truth);

        // Cosmic has weight only outside the candidate.
        let outside = matcher.hit_match(candidate, TruthTarget::Primary(cosmic));
        assert_eq!(outside.purity, 0.0);

        // Unknown target: no truth weight at all.
        let none = matcher.hit_match(candidate, TruthTarget::Primary(McParticleId(42)));
        assert_eq!(none, HitMatch::default());

        let empty_event = Event::builder().build();
        let matcher = TruthMatcher::new(&empty_event, &truth);
        let mut builder = Event::builder();
        let lonely = builder.add_candidate(NewCandidate::track(), None).unwrap();
        let lonely_event = builder.build();
        assert_eq!(
            TruthMatcher::new(&lonely_event, &truth).hit_match(lonely, TruthTarget::Primary(McParticleId(1))),
            HitMatch::default()
        );
        assert_eq!(matcher.true_neutrino(), Some(McParticleId(0)));
    }

    #[test]
    fn test_main_particle_and_cache() {
        let (event, candidate, truth, [_, muon, ..]) = matched_event();
        let mut matcher = TruthMatcher::new(&event, &truth);
        assert_eq!(matcher.main_mc_particle(candidate), Some(muon));
        assert_eq!(matcher.main_mc_particle(candidate), Some(muon));
        assert_eq!(matcher.main_particles.len(), 1);
    }

    #[test]
    fn test_main_particle_tie_goes_to_lowest_id() {
        let mut events = Event::builder();
        let h0 = events.add_hit(HitView::U, Point::zeros(), 1.0, 0.3);
        let candidate = events
            .add_candidate(NewCandidate::track().with_hits([h0]), None)
            .unwrap();
        let event = events.build();

        let origin = Point::zeros();
        let mut truth = McTruth::builder();
        let a = truth
            .add_particle(particle(pdg::MUON, 1.0, 0.1, origin, origin), None)
            .unwrap();
        let b = truth
            .add_particle(particle(pdg::PION, 1.0, 0.1, origin, origin), None)
            .unwrap();
        truth.add_hit_weight(h0, b, 0.5).unwrap();
        truth.add_hit_weight(h0, a, 0.5).unwrap();
        let truth = truth.build();

        let mut matcher = TruthMatcher::new(&event, &truth);
        assert_eq!(matcher.main_mc_particle(candidate), Some(a));
    }

    #[test]
    fn test_mc_info_for_primary() {
        let (event, candidate, truth, [_, muon, ..]) = matched_event();
        let mut matcher = TruthMatcher::new(&event, &truth);
        let info = matcher
            .mc_info(candidate, CandidateRole::PrimaryDaughter, &fiducial(), 0.9)
            .unwrap();

        assert_eq!(info.particle, muon);
        assert_eq!(info.pdg_code, pdg::MUON);
        assert_eq!(info.kind, TypeLabel::PionMuon);
        assert!((info.energy - 0.4).abs() < 1e-6);
        assert_eq!(info.direction_cosines, Point::new(0.0, 0.0, 1.0));
        assert!(info.is_vertex_fiducial);
        assert!(info.is_contained);
        assert!(!info.is_shower);
    }

    #[test]
    fn test_mc_info_for_neutrino_uses_total_energy() {
        let (event, candidate, truth, [nu, ..]) = matched_event();
        let mut matcher = TruthMatcher::new(&event, &truth);
        let info = matcher
            .mc_info(candidate, CandidateRole::Neutrino, &fiducial(), 0.9)
            .unwrap();
        assert_eq!(info.particle, nu);
        assert_eq!(info.energy, 1.0);
        assert_eq!(info.kind, TypeLabel::Neutrino);
    }

    proptest! {
        #[test]
        fn purity_and_completeness_are_bounded(
            weights in proptest::collection::vec((0usize..6, 0u32..4, 0.0f32..2.0), 0..40),
            owned in proptest::collection::vec(any::<bool>(), 6),
        ) {
            let mut events = Event::builder();
            let hits: Vec<HitId> = (0..6)
                .map(|i| events.add_hit(HitView::TWO_D[i % 3], Point::zeros(), 1.0, 0.3))
                .collect();
            let own: Vec<HitId> = hits.iter().zip(&owned).filter(|(_, o)| **o).map(|(h, _)| *h).collect();
            let candidate = events.add_candidate(NewCandidate::track().with_hits(own), None).unwrap();
            let event = events.build();

            let origin = Point::zeros();
            let mut truth = McTruth::builder();
            let nu = truth.add_particle(particle(pdg::NU_E, 1.0, 0.0, origin, origin), None).unwrap();
            for _ in 0..3 {
                truth.add_particle(particle(pdg::PROTON, 1.0, 0.9, origin, origin), Some(nu)).unwrap();
            }
            for (hit, particle, weight) in weights {
                truth.add_hit_weight(hits[hit], McParticleId(particle), weight).unwrap();
            }
            let truth = truth.build();
            let matcher = TruthMatcher::new(&event, &truth);

            for target in [
                TruthTarget::Neutrino(nu),
                TruthTarget::Primary(McParticleId(1)),
                TruthTarget::Primary(McParticleId(3)),
            ] {
                let result = matcher.hit_match(candidate, target);
                prop_assert!((0.0..=1.0).contains(&result.purity));
                prop_assert!((0.0..=1.0 + 1e-5).contains(&result.completeness));
            }
        }
    }
}
