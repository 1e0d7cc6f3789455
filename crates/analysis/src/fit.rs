//! Trajectory fits for track-like candidates.
//!
//! [`TrackFitter`] is the fitting primitive; [`TrackFitIndex`] owns one fit
//! per track-like candidate of a hierarchy for the lifetime of an event.

use crate::pca::pca;
use larreco_types::{CaloHit, CandidateId, Event, HitView, Point};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Smallest |cos| between the track and a view's pitch axis used when
/// converting a wire pitch to a 3D path length.
pub const MIN_PITCH_COSINE: f32 = 0.01;

#[derive(Debug, Error, PartialEq)]
pub enum FitError {
    #[error("Need at least 2 hits to fit a track, got {0}")]
    TooFewHits(usize),
    #[error("Hits have no extent along the track")]
    Degenerate,
}

/// A fitted trajectory.
pub trait TrackFit: fmt::Debug + Send + Sync {
    /// Distance along the track of the projection of `point`, measured from
    /// the upstream end of the fit.
    fn projection(&self, point: &Point) -> f32;

    /// Unit direction of the fit near `point`.
    fn direction_at(&self, point: &Point) -> Point;

    /// Length between the outermost projected hits.
    fn total_length(&self) -> f32;

    /// 3D path length traversed inside the cell of a 2D hit.
    fn path_length(&self, hit: &CaloHit) -> f32 {
        let direction = self.direction_at(&hit.position);
        let cosine = direction.dot(&hit.view.pitch_axis()).abs().max(MIN_PITCH_COSINE);
        hit.cell_size / cosine
    }
}

/// Fitting primitive.
pub trait TrackFitter: Send + Sync {
    fn fit(&self, hits: &[&CaloHit], window: usize) -> Result<Box<dyn TrackFit>, FitError>;
}

/// Sliding linear fit: a global principal axis fixes the track coordinate,
/// local directions come from the PCA of the hits within `window`
/// positions of a point along that coordinate.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinearTrackFitter;

impl TrackFitter for LinearTrackFitter {
    fn fit(&self, hits: &[&CaloHit], window: usize) -> Result<Box<dyn TrackFit>, FitError> {
        if hits.len() < 2 {
            return Err(FitError::TooFewHits(hits.len()));
        }

        let global = pca(hits.iter().map(|h| &h.position)).ok_or(FitError::TooFewHits(0))?;
        let axis = global.principal_axis();

        let mut samples: Vec<(f32, Point)> = hits
            .iter()
            .map(|h| ((h.position - global.centroid).dot(&axis), h.position))
            .collect();
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));

        let (first, last) = match (samples.first(), samples.last()) {
            (Some(first), Some(last)) => (first.0, last.0),
            _ => return Err(FitError::TooFewHits(0)),
        };
        let length = last - first;
        if !(length > f32::EPSILON) {
            return Err(FitError::Degenerate);
        }

        Ok(Box::new(LinearTrackFit {
            centroid: global.centroid,
            axis,
            origin: first,
            length,
            window: window.max(1),
            samples,
        }))
    }
}

#[derive(Debug, Clone)]
pub struct LinearTrackFit {
    centroid: Point,
    axis: Point,
    origin: f32,
    length: f32,
    window: usize,
    /// (coordinate along `axis` relative to `centroid`, position), ascending
    samples: Vec<(f32, Point)>,
}

impl LinearTrackFit {
    fn axial(&self, point: &Point) -> f32 {
        (point - self.centroid).dot(&self.axis)
    }
}

impl TrackFit for LinearTrackFit {
    fn projection(&self, point: &Point) -> f32 {
        self.axial(point) - self.origin
    }

    fn direction_at(&self, point: &Point) -> Point {
        let t = self.axial(point);
        let centre = self.samples.partition_point(|(s, _)| *s < t);
        let lo = centre.saturating_sub(self.window);
        let hi = (centre + self.window).min(self.samples.len());

        let local = if hi - lo >= 2 {
            pca(self.samples[lo..hi].iter().map(|(_, p)| p))
                .filter(|r| r.eigenvalues[0] > f32::EPSILON)
                .map(|r| r.principal_axis())
        } else {
            None
        };

        let direction = local.unwrap_or(self.axis);
        if direction.dot(&self.axis) < 0.0 {
            -direction
        } else {
            direction
        }
    }

    fn total_length(&self) -> f32 {
        self.length
    }
}

/// Fits keyed by candidate, for every track-like candidate of a hierarchy
/// whose fit succeeded.
#[derive(Debug, Default)]
pub struct TrackFitIndex {
    fits: BTreeMap<CandidateId, Box<dyn TrackFit>>,
}

impl TrackFitIndex {
    /// Fit the own 3D hits of every track-like candidate below (and
    /// including) `root`. Failed fits are left out of the index.
    pub fn build(event: &Event, root: CandidateId, fitter: &dyn TrackFitter, window: usize) -> Self {
        let mut fits = BTreeMap::new();
        for id in event.subtree(root) {
            if !event[id].is_track_like {
                continue;
            }
            let hits = event.own_hits(id, HitView::ThreeD);
            match fitter.fit(&hits, window) {
                Ok(fit) => {
                    fits.insert(id, fit);
                }
                Err(e) => debug!("No track fit for candidate {:?}: {}", id, e),
            }
        }
        Self { fits }
    }

    pub fn get(&self, id: CandidateId) -> Option<&dyn TrackFit> {
        self.fits.get(&id).map(|fit| fit.as_ref())
    }

    pub fn contains(&self, id: CandidateId) -> bool {
        self.fits.contains_key(&id)
    }

    pub fn candidates(&self) -> impl Iterator<Item = CandidateId> + '_ {
        self.fits.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.fits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fits.is_empty()
    }
}
