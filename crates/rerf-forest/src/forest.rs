//! Forest training with parallel tree construction.

use rayon::ThreadPoolBuilder;
use rayon::iter::{IntoParallelIterator, IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::builder::majority_class;
use crate::config::{ForestConfig, OobMode};
use crate::dataset::Dataset;
use crate::error::RerfError;
use crate::oob::compute_oob;
use crate::result::{TrainedForest, TrainingMetadata};
use crate::rng::{SeedStream, TreeRng};
use crate::tree::{GrownTree, Tree, grow_tree};

/// A fitted forest of growth-time trees.
#[derive(Debug, Clone, PartialEq)]
pub struct Forest {
    pub(crate) trees: Vec<Tree>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
}

/// Shape statistics over every tree in a forest.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ForestStats {
    /// Deepest node depth across all trees.
    pub max_depth: usize,
    /// Mean depth of all leaves across all trees.
    pub mean_leaf_depth: f64,
    /// Total leaf count.
    pub n_leaves: usize,
    /// Total node count.
    pub n_nodes: usize,
}

/// Run `op` on a dedicated pool of `n_threads` workers, or on rayon's
/// global pool when `n_threads` is `None`.
pub(crate) fn with_pool<R, F>(n_threads: Option<usize>, op: F) -> Result<R, RerfError>
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    let Some(n_threads) = n_threads else {
        return Ok(op());
    };
    if n_threads == 0 {
        return Err(RerfError::InvalidThreadCount { n_threads });
    }
    let pool = ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build()
        .map_err(|source| RerfError::ThreadPool { n_threads, source })?;
    Ok(pool.install(op))
}

/// Train the forest.
#[instrument(skip_all, fields(n_trees = config.n_trees, n_observations = dataset.n_observations()))]
pub(crate) fn train(config: &ForestConfig, dataset: &Dataset) -> Result<TrainedForest, RerfError> {
    let settings = config.resolve(dataset)?;

    info!(
        n_trees = config.n_trees,
        n_observations = dataset.n_observations(),
        n_features = dataset.n_features(),
        n_classes = dataset.n_classes(),
        mtry = settings.mtry,
        forest_type = ?config.forest_type,
        "training forest"
    );

    let tree_seeds = SeedStream::new(config.seed_mode).tree_seeds(config.n_trees);

    let grown: Vec<GrownTree> = with_pool(config.n_threads, || {
        tree_seeds
            .into_par_iter()
            .map(|seed| grow_tree(dataset, &settings, &mut TreeRng::from_seed(seed)))
            .collect()
    })?;

    let mut trees = Vec::with_capacity(grown.len());
    let mut oob_indices_per_tree = Vec::with_capacity(grown.len());
    for GrownTree { tree, bootstrap } in grown {
        let (_, oob) = bootstrap.into_parts();
        trees.push(tree);
        oob_indices_per_tree.push(oob);
    }

    debug!(n_trees_trained = trees.len(), "tree training complete");

    let oob_score = match config.oob_mode {
        OobMode::Enabled => compute_oob(&trees, dataset, &oob_indices_per_tree),
        OobMode::Disabled => None,
    };

    let forest = Forest {
        trees,
        n_features: dataset.n_features(),
        n_classes: dataset.n_classes(),
    };

    let metadata = TrainingMetadata {
        n_trees: config.n_trees,
        n_features: dataset.n_features(),
        n_classes: dataset.n_classes(),
        n_observations: dataset.n_observations(),
        mtry_resolved: settings.mtry,
    };

    info!(
        oob_accuracy = oob_score.as_ref().map(|s| s.accuracy),
        n_nodes = forest.stats().n_nodes,
        "forest training complete"
    );

    Ok(TrainedForest::new(forest, oob_score, oob_indices_per_tree, metadata))
}

impl Forest {
    pub(crate) fn from_trees(trees: Vec<Tree>, n_features: usize, n_classes: usize) -> Self {
        Self {
            trees,
            n_features,
            n_classes,
        }
    }

    /// Predict the class of one observation by majority vote over all trees.
    ///
    /// Ties go to the lowest class id.
    ///
    /// # Errors
    ///
    /// Returns [`RerfError::PredictionFeatureMismatch`] when
    /// `observation.len() != n_features`.
    pub fn predict(&self, observation: &[f64]) -> Result<usize, RerfError> {
        if observation.len() != self.n_features {
            return Err(RerfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: observation.len(),
            });
        }
        Ok(self.vote(|f| observation[f]))
    }

    fn vote(&self, value: impl Fn(usize) -> f64) -> usize {
        let mut votes = vec![0usize; self.n_classes];
        for tree in &self.trees {
            votes[tree.leaf_class(&value)] += 1;
        }
        majority_class(&votes)
    }

    /// Predict class labels for a batch of rows in parallel.
    ///
    /// # Errors
    ///
    /// Returns [`RerfError::PredictionFeatureMismatch`] if any row has the wrong feature count.
    pub fn predict_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<usize>, RerfError> {
        rows.par_iter().map(|row| self.predict(row)).collect()
    }

    /// Fraction of `dataset` observations whose predicted class differs from the label.
    ///
    /// # Errors
    ///
    /// Returns [`RerfError::PredictionFeatureMismatch`] when the dataset has a
    /// different number of features than the forest.
    pub fn error_rate(&self, dataset: &Dataset) -> Result<f64, RerfError> {
        if dataset.n_features() != self.n_features {
            return Err(RerfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: dataset.n_features(),
            });
        }
        let wrong = (0..dataset.n_observations())
            .into_par_iter()
            .filter(|&obs| self.vote(|f| dataset.value(f, obs)) != dataset.label(obs))
            .count();
        Ok(wrong as f64 / dataset.n_observations() as f64)
    }

    /// Depth and size statistics over all trees.
    #[must_use]
    pub fn stats(&self) -> ForestStats {
        let n_leaves: usize = self.trees.iter().map(Tree::n_leaves).sum();
        let leaf_depth_sum: usize = self.trees.iter().map(Tree::leaf_depth_sum).sum();
        ForestStats {
            max_depth: self.trees.iter().map(Tree::max_depth).max().unwrap_or(0),
            mean_leaf_depth: if n_leaves == 0 {
                0.0
            } else {
                leaf_depth_sum as f64 / n_leaves as f64
            },
            n_leaves,
            n_nodes: self.trees.iter().map(Tree::n_nodes).sum(),
        }
    }

    /// Trees in training order.
    #[must_use]
    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Return the number of features this forest was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Return the number of trees in the ensemble.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}
