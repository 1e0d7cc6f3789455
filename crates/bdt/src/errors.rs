//! Error types for BDT models

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BdtError {
    /// Model file could not be read or parsed
    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Invalid model structure: {0}")]
    InvalidStructure(String),

    #[error("Invalid node reference in tree {tree} node {node}")]
    InvalidNodeReference { tree: usize, node: usize },

    #[error("Feature count mismatch: model expects {expected}, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    #[error("Feature {0} is not finite")]
    NonFiniteFeature(usize),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BdtError>;
