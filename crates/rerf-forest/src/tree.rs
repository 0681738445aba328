use tracing::{debug, instrument};

use crate::RerfError;
use crate::bootstrap::{BootstrapSample, draw_bootstrap};
use crate::builder::{GrowSettings, NodeBuilder};
use crate::candidate::project_terms;
use crate::dataset::Dataset;
use crate::node::Node;
use crate::rng::TreeRng;

/// A grown decision tree.
///
/// Stored as a pre-order `Vec<Node>` arena with the root at index 0 and
/// children referenced by [`crate::NodeIndex`].
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
}

/// A tree together with the bootstrap it was grown from.
#[derive(Debug, Clone)]
pub struct GrownTree {
    /// The grown tree.
    pub tree: Tree,
    /// In-bag draw and out-of-bag complement used for this tree.
    pub bootstrap: BootstrapSample,
}

/// Grow one tree: draw a bootstrap, then build nodes over the full in-bag range.
#[instrument(skip_all, fields(n_observations = dataset.n_observations()))]
pub(crate) fn grow_tree(
    dataset: &Dataset,
    settings: &GrowSettings,
    rng: &mut TreeRng,
) -> GrownTree {
    let bootstrap = draw_bootstrap(dataset.n_observations(), rng);
    let nodes = NodeBuilder::new(dataset, settings, rng, bootstrap.in_bag().to_vec()).build();

    debug!(
        n_nodes = nodes.len(),
        n_oob = bootstrap.out_of_bag().len(),
        "tree grown"
    );

    GrownTree {
        tree: Tree {
            nodes,
            n_features: dataset.n_features(),
            n_classes: dataset.n_classes(),
        },
        bootstrap,
    }
}

impl Tree {
    /// Predict the class of a single observation.
    ///
    /// Walks from the root: at each internal node the observation is
    /// projected and goes left when `projected < cut_value`.
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
        Ok(self.predict_unchecked(observation))
    }

    pub(crate) fn predict_unchecked(&self, observation: &[f64]) -> usize {
        self.leaf_class(|f| observation[f])
    }

    /// Class of the leaf reached when feature `f` reads as `value(f)`.
    pub(crate) fn leaf_class(&self, value: impl Fn(usize) -> f64) -> usize {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { class, .. } => return *class,
                Node::Internal {
                    projection,
                    cut_value,
                    left,
                    right,
                    ..
                } => {
                    let projected = project_terms(projection.terms(), &value);
                    idx = if projected < *cut_value {
                        left.index()
                    } else {
                        right.index()
                    };
                }
            }
        }
    }

    /// Nodes in arena (pre-order) order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of features the tree expects.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Number of classes the tree was trained on.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Return the total number of nodes in the tree.
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the maximum node depth. A single-leaf tree has depth 0.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.nodes.iter().map(Node::depth).max().unwrap_or(0)
    }

    /// Sum of leaf depths, for mean-leaf-depth statistics.
    #[must_use]
    pub fn leaf_depth_sum(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.is_leaf())
            .map(Node::depth)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::ForestType;
    use crate::split::SplitCriterion;

    fn settings() -> GrowSettings {
        GrowSettings {
            forest_type: ForestType::Classic,
            mtry: 2,
            n_draws: 2,
            min_parent: 1,
            max_depth: None,
            criterion: SplitCriterion::Gini,
        }
    }

    fn separable() -> Dataset {
        let rows = vec![
            vec![1.0, 0.0],
            vec![2.0, 0.0],
            vec![3.0, 0.0],
            vec![10.0, 0.0],
            vec![11.0, 0.0],
            vec![12.0, 0.0],
        ];
        Dataset::from_rows(&rows, &[0, 0, 0, 1, 1, 1]).unwrap()
    }

    #[test]
    fn grown_tree_classifies_training_region() {
        let ds = separable();
        let mut rng = TreeRng::from_seed(42);
        let grown = grow_tree(&ds, &settings(), &mut rng);
        let tree = &grown.tree;
        // Bootstrap may miss a class entirely, so only check in-bag rows.
        for &obs in grown.bootstrap.in_bag() {
            assert_eq!(tree.predict(&ds.row(obs)).unwrap(), ds.label(obs));
        }
    }

    #[test]
    fn in_bag_counts_reach_leaves() {
        let ds = separable();
        let mut rng = TreeRng::from_seed(5);
        let grown = grow_tree(&ds, &settings(), &mut rng);
        assert_eq!(grown.tree.nodes()[0].n_samples(), 6);
        let leaf_total: usize = grown
            .tree
            .nodes()
            .iter()
            .filter(|n| n.is_leaf())
            .map(Node::n_samples)
            .sum();
        assert_eq!(leaf_total, 6);
    }

    #[test]
    fn same_seed_same_tree() {
        let ds = separable();
        let a = grow_tree(&ds, &settings(), &mut TreeRng::from_seed(17));
        let b = grow_tree(&ds, &settings(), &mut TreeRng::from_seed(17));
        assert_eq!(a.tree, b.tree);
        assert_eq!(a.bootstrap.in_bag(), b.bootstrap.in_bag());
    }

    #[test]
    fn prediction_feature_mismatch() {
        let ds = separable();
        let grown = grow_tree(&ds, &settings(), &mut TreeRng::from_seed(1));
        let err = grown.tree.predict(&[1.0]).unwrap_err();
        assert!(matches!(
            err,
            RerfError::PredictionFeatureMismatch { expected: 2, got: 1 }
        ));
    }

    #[test]
    fn stats_on_single_leaf() {
        let tree = Tree {
            nodes: vec![Node::Leaf {
                class: 1,
                depth: 0,
                n_samples: 3,
            }],
            n_features: 1,
            n_classes: 2,
        };
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.max_depth(), 0);
        assert_eq!(tree.leaf_depth_sum(), 0);
        assert_eq!(tree.predict(&[42.0]).unwrap(), 1);
    }
}
