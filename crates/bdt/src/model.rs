//! Boosted decision tree model description.
//!
//! Models are stored as JSON. Each tree is a flat node array whose root is
//! node 0; children always sit after their parent, which keeps every
//! traversal finite.

use crate::errors::{BdtError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{fs, path::Path};
use tracing::info;

/// Decision node in a tree. Leaves carry a `value`, internal nodes route
/// `features[feature] <= threshold` to `left` and everything else to `right`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DecisionNode {
    #[serde(default)]
    pub feature: usize,
    #[serde(default)]
    pub threshold: f32,
    #[serde(default)]
    pub left: Option<usize>,
    #[serde(default)]
    pub right: Option<usize>,
    #[serde(default)]
    pub value: Option<f32>,
}

impl DecisionNode {
    pub fn split(feature: usize, threshold: f32, left: usize, right: usize) -> Self {
        Self {
            feature,
            threshold,
            left: Some(left),
            right: Some(right),
            value: None,
        }
    }

    pub fn leaf(value: f32) -> Self {
        Self {
            feature: 0,
            threshold: 0.0,
            left: None,
            right: None,
            value: Some(value),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.value.is_some()
    }
}

fn unit_weight() -> f32 {
    1.0
}

/// One weighted tree of the ensemble
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DecisionTree {
    pub nodes: Vec<DecisionNode>,
    /// Boost weight
    #[serde(default = "unit_weight")]
    pub weight: f32,
}

/// How tree responses are combined into the model response
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Σ wᵢ·yᵢ / Σ wᵢ, bounded by the leaf values (AdaBoost style)
    #[default]
    WeightedMean,
    /// Σ wᵢ·yᵢ (gradient boosting style)
    Sum,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BdtModel {
    /// Input variable names, in feature order
    pub variables: Vec<String>,
    pub trees: Vec<DecisionTree>,
    #[serde(default)]
    pub aggregation: Aggregation,
}

impl BdtModel {
    // ---------------------------------------------------------------------
    // Loading / saving
    // ---------------------------------------------------------------------

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .map_err(|e| BdtError::ModelLoad(format!("{}: {e}", path.display())))?;
        let model = Self::from_json_str(&data)?;
        info!(
            "Loaded BDT model from {} ({} trees, {} variables)",
            path.display(),
            model.trees.len(),
            model.variables.len()
        );
        Ok(model)
    }

    pub fn from_json_str(data: &str) -> Result<Self> {
        let model: Self =
            serde_json::from_str(data).map_err(|e| BdtError::ModelLoad(e.to_string()))?;
        model.validate()?;
        Ok(model)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| BdtError::Serialization(e.to_string()))
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| BdtError::Serialization(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }

    /// SHA-256 of the compact JSON encoding, hex encoded
    pub fn model_hash(&self) -> Result<String> {
        let serialized = self.to_json()?;
        let mut hasher = Sha256::new();
        hasher.update(serialized.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }

    pub fn feature_count(&self) -> usize {
        self.variables.len()
    }

    // ---------------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------------

    pub fn validate(&self) -> Result<()> {
        if self.variables.is_empty() {
            return Err(BdtError::InvalidStructure("Model has no input variables".into()));
        }
        if self.trees.is_empty() {
            return Err(BdtError::InvalidStructure("Model has no trees".into()));
        }

        let total_weight: f32 = self.trees.iter().map(|t| t.weight).sum();
        if self.aggregation == Aggregation::WeightedMean && total_weight <= 0.0 {
            return Err(BdtError::InvalidStructure(format!(
                "Tree weights sum to {total_weight}"
            )));
        }

        for (t_idx, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(BdtError::InvalidStructure(format!("Tree {t_idx} has no nodes")));
            }
            if !tree.weight.is_finite() {
                return Err(BdtError::InvalidStructure(format!(
                    "Tree {t_idx} has non-finite weight"
                )));
            }

            for (n_idx, node) in tree.nodes.iter().enumerate() {
                if let Some(value) = node.value {
                    if !value.is_finite() {
                        return Err(BdtError::InvalidStructure(format!(
                            "Tree {t_idx} node {n_idx} has non-finite value"
                        )));
                    }
                    continue;
                }

                if node.feature >= self.variables.len() {
                    return Err(BdtError::InvalidStructure(format!(
                        "Tree {t_idx} node {n_idx} uses feature {} of {}",
                        node.feature,
                        self.variables.len()
                    )));
                }

                let valid_child =
                    |child: Option<usize>| matches!(child, Some(c) if c > n_idx && c < tree.nodes.len());
                if !valid_child(node.left) || !valid_child(node.right) {
                    return Err(BdtError::InvalidNodeReference {
                        tree: t_idx,
                        node: n_idx,
                    });
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------

#[cfg(any(test, feature = "enable-tests"))]
impl BdtModel {
    /// Two-variable (`range`, `energy_density`) model with an easily
    /// predicted response:
    /// - short and dense → 0.5
    /// - long and dense → 0.0
    /// - light → -0.5 (short) or -1.0 (long)
    pub fn create_test_model() -> Self {
        Self {
            variables: vec!["range".into(), "energy_density".into()],
            trees: vec![
                DecisionTree {
                    nodes: vec![
                        DecisionNode::split(1, 0.004, 1, 2),
                        DecisionNode::leaf(-1.0),
                        DecisionNode::leaf(1.0),
                    ],
                    weight: 1.0,
                },
                DecisionTree {
                    nodes: vec![
                        DecisionNode::split(0, 100.0, 1, 2),
                        DecisionNode::leaf(0.0),
                        DecisionNode::leaf(-1.0),
                    ],
                    weight: 1.0,
                },
            ],
            aggregation: Aggregation::WeightedMean,
        }
    }
}

#[cfg(any(test, feature = "enable-tests"))]
pub fn create_test_model() -> BdtModel {
    BdtModel::create_test_model()
}
