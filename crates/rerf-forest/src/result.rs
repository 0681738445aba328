//! Training result types.

use crate::forest::{Forest, ForestStats};
use crate::oob::OobScore;

/// Metadata about the training run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TrainingMetadata {
    /// Number of trees trained.
    pub n_trees: usize,
    /// Number of features in the dataset.
    pub n_features: usize,
    /// Number of classes.
    pub n_classes: usize,
    /// Number of training observations.
    pub n_observations: usize,
    /// Resolved mtry used at every node.
    pub mtry_resolved: usize,
}

/// Result of forest training.
///
/// Contains the fitted forest, optional OOB score, per-tree OOB indices,
/// and training metadata.
#[derive(Debug)]
pub struct TrainedForest {
    forest: Forest,
    oob_score: Option<OobScore>,
    oob_indices_per_tree: Vec<Vec<usize>>,
    metadata: TrainingMetadata,
}

impl TrainedForest {
    pub(crate) fn new(
        forest: Forest,
        oob_score: Option<OobScore>,
        oob_indices_per_tree: Vec<Vec<usize>>,
        metadata: TrainingMetadata,
    ) -> Self {
        Self {
            forest,
            oob_score,
            oob_indices_per_tree,
            metadata,
        }
    }

    /// Borrow the fitted forest.
    #[must_use]
    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    /// Consume the result and return the fitted forest.
    #[must_use]
    pub fn into_forest(self) -> Forest {
        self.forest
    }

    /// Return the OOB score, if computed.
    #[must_use]
    pub fn oob_score(&self) -> Option<&OobScore> {
        self.oob_score.as_ref()
    }

    /// Return training metadata.
    #[must_use]
    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }

    /// Return the sorted out-of-bag observation indices of each tree.
    #[must_use]
    pub fn oob_indices_per_tree(&self) -> &[Vec<usize>] {
        &self.oob_indices_per_tree
    }

    /// Depth and size statistics of the fitted forest.
    #[must_use]
    pub fn stats(&self) -> ForestStats {
        self.forest.stats()
    }
}
