//! Boosted decision tree classifier
//!
//! Modules:
//! - `model`: Tree structures, JSON loading, validation and content hash
//! - `eval`: Tree traversal and weighted ensemble response
//! - `errors`: Error types

pub mod errors;
pub mod eval;
pub mod model;

pub use errors::{BdtError, Result};
pub use eval::eval_tree;
pub use model::{Aggregation, BdtModel, DecisionNode, DecisionTree};

#[cfg(any(test, feature = "enable-tests"))]
pub use model::create_test_model;
