//! Monte Carlo truth: the true particle forest and the hit → particle
//! weight table.

use crate::geometry::Point;
use crate::hit::HitId;
use crate::pdg;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct McParticleId(pub u32);

#[derive(Debug, Error, PartialEq)]
pub enum TruthError {
    #[error("Unknown parent MC particle {0:?}")]
    UnknownParent(McParticleId),
    #[error("Invalid weight {weight} for hit {hit:?}")]
    InvalidWeight { hit: HitId, weight: f32 },
}

#[derive(Clone, Debug, Default)]
pub struct NewMcParticle {
    pub pdg_code: i32,
    /// Total energy (GeV)
    pub energy: f32,
    pub mass: f32,
    pub momentum: Point,
    pub vertex: Point,
    pub endpoint: Point,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct McParticle {
    pub id: McParticleId,
    pub pdg_code: i32,
    pub energy: f32,
    pub mass: f32,
    pub momentum: Point,
    pub vertex: Point,
    pub endpoint: Point,
    pub parent: Option<McParticleId>,
    pub children: Vec<McParticleId>,
}

impl McParticle {
    pub fn kinetic_energy(&self) -> f32 {
        (self.energy - self.mass).max(0.0)
    }

    pub fn is_neutrino(&self) -> bool {
        pdg::is_neutrino(self.pdg_code)
    }
}

/// One truth contribution to a hit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct McWeight {
    pub particle: McParticleId,
    pub weight: f32,
}

/// Read-only truth for one event.
#[derive(Clone, Debug, Default)]
pub struct McTruth {
    particles: BTreeMap<McParticleId, McParticle>,
    hit_weights: BTreeMap<HitId, Vec<McWeight>>,
}

impl McTruth {
    pub fn builder() -> McTruthBuilder {
        McTruthBuilder::default()
    }

    pub fn particle(&self, id: McParticleId) -> Option<&McParticle> {
        self.particles.get(&id)
    }

    pub fn particles(&self) -> impl Iterator<Item = &McParticle> {
        self.particles.values()
    }

    /// Truth contributions recorded for `hit` (empty for unmatched hits).
    pub fn hit_weights(&self, hit: HitId) -> &[McWeight] {
        self.hit_weights
            .get(&hit)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The whole hit → truth table, ordered by hit id.
    pub fn weighted_hits(&self) -> impl Iterator<Item = (HitId, &[McWeight])> {
        self.hit_weights.iter().map(|(hit, w)| (*hit, w.as_slice()))
    }

    /// Ancestor chain from `id` (inclusive) up to its root.
    ///
    /// Returns `None` if any link points at a particle that is not in the
    /// record.
    pub fn ancestry(&self, id: McParticleId) -> Option<Vec<McParticleId>> {
        let mut chain = Vec::new();
        let mut current = self.particles.get(&id)?;
        loop {
            chain.push(current.id);
            match current.parent {
                Some(parent) => current = self.particles.get(&parent)?,
                None => return Some(chain),
            }
        }
    }

    /// The primary particle `id` descends from: the root of its chain, or
    /// the child of the root when the root is a neutrino. A neutrino root
    /// has no primary.
    pub fn primary(&self, id: McParticleId) -> Option<McParticleId> {
        let chain = self.ancestry(id)?;
        let root = *chain.last()?;
        if self.particles.get(&root)?.is_neutrino() {
            let len = chain.len();
            if len < 2 {
                return None;
            }
            Some(chain[len - 2])
        } else {
            Some(root)
        }
    }

    pub fn root(&self, id: McParticleId) -> Option<McParticleId> {
        self.ancestry(id).and_then(|chain| chain.last().copied())
    }

    /// Parentless neutrinos.
    pub fn true_neutrinos(&self) -> Vec<&McParticle> {
        self.particles
            .values()
            .filter(|p| p.parent.is_none() && p.is_neutrino())
            .collect()
    }

    /// The particle and all its descendants, parents first.
    pub fn descendants(&self, id: McParticleId) -> Vec<McParticleId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(particle) = self.particles.get(&current) else {
                continue;
            };
            out.push(current);
            stack.extend(particle.children.iter().rev().copied());
        }
        out
    }
}

#[derive(Debug, Default)]
pub struct McTruthBuilder {
    particles: BTreeMap<McParticleId, McParticle>,
    hit_weights: BTreeMap<HitId, Vec<McWeight>>,
    next_particle: u32,
}

impl McTruthBuilder {
    pub fn add_particle(
        &mut self,
        particle: NewMcParticle,
        parent: Option<McParticleId>,
    ) -> Result<McParticleId, TruthError> {
        if let Some(parent) = parent {
            if !self.particles.contains_key(&parent) {
                return Err(TruthError::UnknownParent(parent));
            }
        }

        let id = McParticleId(self.next_particle);
        self.next_particle += 1;

        if let Some(parent) = parent {
            if let Some(p) = self.particles.get_mut(&parent) {
                p.children.push(id);
            }
        }

        self.particles.insert(
            id,
            McParticle {
                id,
                pdg_code: particle.pdg_code,
                energy: particle.energy,
                mass: particle.mass,
                momentum: particle.momentum,
                vertex: particle.vertex,
                endpoint: particle.endpoint,
                parent,
                children: Vec::new(),
            },
        );
        Ok(id)
    }

    /// Record that `particle` contributed `weight` to `hit`. The particle
    /// does not have to be part of the stored record.
    pub fn add_hit_weight(
        &mut self,
        hit: HitId,
        particle: McParticleId,
        weight: f32,
    ) -> Result<(), TruthError> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(TruthError::InvalidWeight { hit, weight });
        }
        self.hit_weights
            .entry(hit)
            .or_default()
            .push(McWeight { particle, weight });
        Ok(())
    }

    pub fn build(self) -> McTruth {
        McTruth {
            particles: self.particles,
            hit_weights: self.hit_weights,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neutrino_interaction() -> (McTruth, [McParticleId; 4]) {
        let mut builder = McTruth::builder();
        let nu = builder
            .add_particle(
                NewMcParticle {
                    pdg_code: pdg::NU_MU,
                    energy: 1.0,
                    ..Default::default()
                },
                None,
            )
            .unwrap();
        let mu = builder
            .add_particle(
                NewMcParticle {
                    pdg_code: pdg::MUON,
                    energy: 0.6,
                    mass: 0.105_66,
                    ..Default::default()
                },
                Some(nu),
            )
            .unwrap();
        let electron = builder
            .add_particle(
                NewMcParticle {
                    pdg_code: pdg::ELECTRON,
                    ..Default::default()
                },
                Some(mu),
            )
            .unwrap();
        let cosmic = builder
            .add_particle(
                NewMcParticle {
                    pdg_code: pdg::MUON,
                    ..Default::default()
                },
                None,
            )
            .unwrap();
        (builder.build(), [nu, mu, electron, cosmic])
    }

    #[test]
    fn primary_skips_the_neutrino() {
        let (truth, [nu, mu, electron, cosmic]) = neutrino_interaction();
        assert_eq!(truth.primary(electron), Some(mu));
        assert_eq!(truth.primary(mu), Some(mu));
        assert_eq!(truth.primary(nu), None);
        assert_eq!(truth.primary(cosmic), Some(cosmic));
        assert_eq!(truth.primary(McParticleId(99)), None);
        assert_eq!(truth.root(electron), Some(nu));
    }

    #[test]
    fn true_neutrinos_are_parentless() {
        let (truth, [nu, mu, electron, _]) = neutrino_interaction();
        let neutrinos: Vec<_> = truth.true_neutrinos().iter().map(|p| p.id).collect();
        assert_eq!(neutrinos, vec![nu]);
        assert_eq!(truth.descendants(nu), vec![nu, mu, electron]);
    }

    #[test]
    fn hit_weights_accumulate_per_hit() {
        let mut builder = McTruth::builder();
        builder.add_hit_weight(HitId(1), McParticleId(0), 0.25).unwrap();
        builder.add_hit_weight(HitId(1), McParticleId(4), 0.75).unwrap();
        assert!(builder.add_hit_weight(HitId(2), McParticleId(0), f32::NAN).is_err());
        let truth = builder.build();

        assert_eq!(truth.hit_weights(HitId(1)).len(), 2);
        assert!(truth.hit_weights(HitId(2)).is_empty());
    }
}
