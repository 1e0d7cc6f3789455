//! Error types for the analysis engine

use larreco_bdt::BdtError;
use larreco_types::CandidateId;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Configuration is unusable
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Classifier error: {0}")]
    Classifier(#[from] BdtError),

    /// The output record for a candidate could not be handed off. Aborts the
    /// event.
    #[error("Failed to construct output for candidate {candidate:?}: {reason}")]
    Construction {
        candidate: CandidateId,
        reason: String,
    },

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Rejection reported by a [`ParticleSink`](crate::ParticleSink).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct SinkError(pub String);

/// Tally of internal-invariant violations seen while processing one event.
///
/// Violations point at a defect rather than bad input, so they are logged at
/// error level and processing carries on with a fallback.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InvariantViolations(u32);

impl InvariantViolations {
    pub fn report(&mut self, what: &str) {
        error!("Internal invariant violated: {}", what);
        self.0 += 1;
    }

    pub fn count(&self) -> u32 {
        self.0
    }
}
