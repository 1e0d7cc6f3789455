//! Ensemble evaluation.

use crate::errors::{BdtError, Result};
use crate::model::{Aggregation, BdtModel, DecisionTree};
use tracing::warn;

/// Leaf value reached by `features` in `tree`.
///
/// Malformed trees (dangling references, out-of-range features) contribute
/// 0 with a warning; validated models never take that path.
pub fn eval_tree(tree: &DecisionTree, features: &[f32]) -> f32 {
    let mut idx = 0usize;

    // Each step moves to a strictly later node in a validated tree.
    for _ in 0..=tree.nodes.len() {
        let Some(node) = tree.nodes.get(idx) else {
            warn!("Invalid node index {}", idx);
            return 0.0;
        };

        if let Some(value) = node.value {
            return value;
        }

        let Some(feature_value) = features.get(node.feature) else {
            warn!(
                "Feature index {} out of bounds (len={})",
                node.feature,
                features.len()
            );
            return 0.0;
        };

        let next = if *feature_value <= node.threshold {
            node.left
        } else {
            node.right
        };
        match next {
            Some(next) => idx = next,
            None => {
                warn!("Internal node {} has no child", idx);
                return 0.0;
            }
        }
    }

    warn!("Traversal did not reach a leaf");
    0.0
}

impl BdtModel {
    /// Model response for one feature vector, in model variable order.
    pub fn evaluate(&self, features: &[f32]) -> Result<f32> {
        if features.len() != self.variables.len() {
            return Err(BdtError::FeatureCountMismatch {
                expected: self.variables.len(),
                actual: features.len(),
            });
        }
        if let Some(idx) = features.iter().position(|f| !f.is_finite()) {
            return Err(BdtError::NonFiniteFeature(idx));
        }

        let mut sum = 0.0f32;
        let mut total_weight = 0.0f32;
        for tree in &self.trees {
            sum += tree.weight * eval_tree(tree, features);
            total_weight += tree.weight;
        }

        Ok(match self.aggregation {
            Aggregation::Sum => sum,
            Aggregation::WeightedMean if total_weight > 0.0 => sum / total_weight,
            Aggregation::WeightedMean => 0.0,
        })
    }
}
