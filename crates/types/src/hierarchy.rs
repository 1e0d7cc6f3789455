//! Reconstructed particle-flow hierarchy for one event.
//!
//! The hierarchy is an arena of candidates linked parent → ordered children.
//! It is only constructed through [`EventBuilder`], which guarantees every
//! referenced id exists and that the links form a forest (a parent must be
//! added before its children, so cycles cannot be expressed).

use crate::geometry::Point;
use crate::hit::{CaloHit, HitId, HitView};
use crate::pdg;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Index;
use thiserror::Error;

/// Identity of a candidate, unique within one event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CandidateId(pub u32);

/// Vertex labels as assigned by the pattern recognition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VertexLabel {
    #[default]
    Position,
    Interaction,
    Start,
    End,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub position: Point,
    #[serde(default)]
    pub label: VertexLabel,
}

impl Vertex {
    pub fn at(position: Point) -> Self {
        Self {
            position,
            label: VertexLabel::Position,
        }
    }
}

/// Hierarchy construction errors
#[derive(Debug, Error, PartialEq)]
pub enum HierarchyError {
    #[error("Unknown parent candidate {0:?}")]
    UnknownParent(CandidateId),
    #[error("Candidate references unknown hit {0:?}")]
    UnknownHit(HitId),
    #[error("Hit {0:?} is assigned to more than one candidate")]
    SharedHit(HitId),
}

/// Candidate description handed to [`EventBuilder::add_candidate`].
#[derive(Clone, Debug, Default)]
pub struct NewCandidate {
    /// PDG hypothesis assigned by the pattern recognition
    pub particle_id: i32,
    pub charge: i32,
    pub mass: f32,
    pub energy: f32,
    pub momentum: Point,
    pub is_track_like: bool,
    pub hits: Vec<HitId>,
    pub vertices: Vec<Vertex>,
}

impl NewCandidate {
    pub fn track() -> Self {
        Self {
            particle_id: pdg::MUON,
            is_track_like: true,
            ..Self::default()
        }
    }

    pub fn shower() -> Self {
        Self {
            particle_id: pdg::ELECTRON,
            is_track_like: false,
            ..Self::default()
        }
    }

    pub fn neutrino() -> Self {
        Self {
            particle_id: pdg::NU_MU,
            is_track_like: false,
            ..Self::default()
        }
    }

    pub fn with_hits(mut self, hits: impl IntoIterator<Item = HitId>) -> Self {
        self.hits.extend(hits);
        self
    }

    pub fn with_vertex(mut self, position: Point) -> Self {
        self.vertices.push(Vertex::at(position));
        self
    }

    pub fn with_momentum(mut self, momentum: Point) -> Self {
        self.momentum = momentum;
        self
    }
}

/// A node of the reconstructed hierarchy.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub id: CandidateId,
    pub particle_id: i32,
    pub charge: i32,
    pub mass: f32,
    pub energy: f32,
    pub momentum: Point,
    pub is_track_like: bool,
    pub hits: Vec<HitId>,
    pub vertices: Vec<Vertex>,
    pub parent: Option<CandidateId>,
    pub children: Vec<CandidateId>,
}

impl Candidate {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_neutrino(&self) -> bool {
        pdg::is_neutrino(self.particle_id)
    }

    /// The single associated vertex, if there is exactly one.
    pub fn single_vertex(&self) -> Option<&Vertex> {
        match self.vertices.as_slice() {
            [vertex] => Some(vertex),
            _ => None,
        }
    }
}

/// Read-only event: hits plus the candidate forest.
#[derive(Clone, Debug, Default)]
pub struct Event {
    hits: BTreeMap<HitId, CaloHit>,
    candidates: BTreeMap<CandidateId, Candidate>,
    roots: Vec<CandidateId>,
}

impl Event {
    pub fn builder() -> EventBuilder {
        EventBuilder::default()
    }

    pub fn candidate(&self, id: CandidateId) -> Option<&Candidate> {
        self.candidates.get(&id)
    }

    pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.values()
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Root candidates in insertion order.
    pub fn roots(&self) -> &[CandidateId] {
        &self.roots
    }

    pub fn children(&self, id: CandidateId) -> &[CandidateId] {
        self.candidates
            .get(&id)
            .map(|c| c.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn hit(&self, id: HitId) -> Option<&CaloHit> {
        self.hits.get(&id)
    }

    /// Every hit of the event, ordered by id.
    pub fn hits(&self) -> impl Iterator<Item = &CaloHit> {
        self.hits.values()
    }

    /// The candidate's own hits in `view`, in the order they were assigned.
    pub fn own_hits(&self, id: CandidateId, view: HitView) -> Vec<&CaloHit> {
        self.candidates
            .get(&id)
            .map(|c| {
                c.hits
                    .iter()
                    .filter_map(|h| self.hits.get(h))
                    .filter(|h| h.view == view)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The candidate and all its descendants, depth-first, parents first.
    pub fn subtree(&self, id: CandidateId) -> Vec<CandidateId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !self.candidates.contains_key(&current) {
                continue;
            }
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Number of descendants, excluding the candidate itself.
    pub fn descendant_count(&self, id: CandidateId) -> usize {
        self.subtree(id).len().saturating_sub(1)
    }

    /// Hits in any of `views` over the candidate and all its descendants.
    pub fn subtree_hits(&self, id: CandidateId, views: &[HitView]) -> Vec<&CaloHit> {
        self.subtree(id)
            .into_iter()
            .flat_map(move |c| {
                views
                    .iter()
                    .flat_map(move |view| self.own_hits(c, *view))
            })
            .collect()
    }

    /// Whether the candidate is the direct daughter of a neutrino root.
    pub fn is_primary_neutrino_daughter(&self, id: CandidateId) -> bool {
        self.candidates
            .get(&id)
            .and_then(|c| c.parent)
            .and_then(|parent| self.candidates.get(&parent))
            .map(|parent| parent.is_root() && parent.is_neutrino())
            .unwrap_or(false)
    }
}

impl Index<CandidateId> for Event {
    type Output = Candidate;

    /// Panics if `id` was not produced by the builder of this event.
    fn index(&self, id: CandidateId) -> &Candidate {
        &self.candidates[&id]
    }
}

/// Incremental construction of an [`Event`].
#[derive(Debug, Default)]
pub struct EventBuilder {
    hits: BTreeMap<HitId, CaloHit>,
    candidates: BTreeMap<CandidateId, Candidate>,
    roots: Vec<CandidateId>,
    owned_hits: BTreeMap<HitId, CandidateId>,
    next_hit: u32,
    next_candidate: u32,
}

impl EventBuilder {
    pub fn add_hit(&mut self, view: HitView, position: Point, input_energy: f32, cell_size: f32) -> HitId {
        let id = HitId(self.next_hit);
        self.next_hit += 1;
        self.hits.insert(
            id,
            CaloHit {
                id,
                view,
                position,
                input_energy,
                cell_size,
            },
        );
        id
    }

    /// Add a candidate below `parent` (appended after its existing children),
    /// or as a new root when `parent` is `None`.
    pub fn add_candidate(
        &mut self,
        candidate: NewCandidate,
        parent: Option<CandidateId>,
    ) -> Result<CandidateId, HierarchyError> {
        if let Some(parent) = parent {
            if !self.candidates.contains_key(&parent) {
                return Err(HierarchyError::UnknownParent(parent));
            }
        }

        for hit in &candidate.hits {
            if !self.hits.contains_key(hit) {
                return Err(HierarchyError::UnknownHit(*hit));
            }
            if self.owned_hits.contains_key(hit) {
                return Err(HierarchyError::SharedHit(*hit));
            }
        }

        let id = CandidateId(self.next_candidate);
        self.next_candidate += 1;

        for hit in &candidate.hits {
            self.owned_hits.insert(*hit, id);
        }

        match parent {
            Some(parent) => {
                if let Some(p) = self.candidates.get_mut(&parent) {
                    p.children.push(id);
                }
            }
            None => self.roots.push(id),
        }

        self.candidates.insert(
            id,
            Candidate {
                id,
                particle_id: candidate.particle_id,
                charge: candidate.charge,
                mass: candidate.mass,
                energy: candidate.energy,
                momentum: candidate.momentum,
                is_track_like: candidate.is_track_like,
                hits: candidate.hits,
                vertices: candidate.vertices,
                parent,
                children: Vec::new(),
            },
        );

        Ok(id)
    }

    pub fn build(self) -> Event {
        Event {
            hits: self.hits,
            candidates: self.candidates,
            roots: self.roots,
        }
    }
}
