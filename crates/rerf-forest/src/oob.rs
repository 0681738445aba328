//! Out-of-bag (OOB) evaluation.

use tracing::debug;

use crate::builder::majority_class;
use crate::dataset::Dataset;
use crate::tree::Tree;

/// Out-of-bag evaluation result.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OobScore {
    /// OOB accuracy (fraction of correctly predicted OOB observations).
    pub accuracy: f64,
    /// OOB confusion matrix: `confusion_matrix[true][predicted]`.
    pub confusion_matrix: Vec<Vec<usize>>,
    /// Number of observations that were out of bag for at least one tree.
    pub n_oob_samples: usize,
}

/// Compute out-of-bag predictions and accuracy.
///
/// Each observation is voted on only by the trees whose bootstrap missed it.
/// Observations that were in bag for every tree are skipped; `None` when
/// that leaves nothing to score.
pub(crate) fn compute_oob(
    trees: &[Tree],
    dataset: &Dataset,
    oob_indices_per_tree: &[Vec<usize>],
) -> Option<OobScore> {
    let n_classes = dataset.n_classes();
    let mut oob_votes: Vec<Vec<usize>> = vec![vec![0; n_classes]; dataset.n_observations()];
    let mut has_oob = vec![false; dataset.n_observations()];

    for (tree, oob_indices) in trees.iter().zip(oob_indices_per_tree) {
        for &obs in oob_indices {
            let pred = tree.leaf_class(|f| dataset.value(f, obs));
            oob_votes[obs][pred] += 1;
            has_oob[obs] = true;
        }
    }

    let n_oob_samples = has_oob.iter().filter(|&&h| h).count();
    if n_oob_samples == 0 {
        debug!("every observation was in bag for every tree, skipping OOB score");
        return None;
    }

    let mut confusion = vec![vec![0usize; n_classes]; n_classes];
    let mut correct = 0usize;
    for (obs, votes) in oob_votes.iter().enumerate() {
        if !has_oob[obs] {
            continue;
        }
        let predicted = majority_class(votes);
        let label = dataset.label(obs);
        confusion[label][predicted] += 1;
        if predicted == label {
            correct += 1;
        }
    }

    Some(OobScore {
        accuracy: correct as f64 / n_oob_samples as f64,
        confusion_matrix: confusion,
        n_oob_samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    fn leaf_tree(class: usize) -> Tree {
        Tree {
            nodes: vec![Node::Leaf {
                class,
                depth: 0,
                n_samples: 1,
            }],
            n_features: 1,
            n_classes: 2,
        }
    }

    #[test]
    fn votes_only_from_trees_missing_the_observation() {
        let ds = Dataset::from_rows(&[vec![0.0], vec![1.0], vec![2.0]], &[0, 1, 1]).unwrap();
        let trees = vec![leaf_tree(0), leaf_tree(1)];
        // Tree 0 misses observation 0, tree 1 misses observations 1 and 2.
        let oob = compute_oob(&trees, &ds, &[vec![0], vec![1, 2]]).unwrap();
        assert_eq!(oob.n_oob_samples, 3);
        assert!((oob.accuracy - 1.0).abs() < f64::EPSILON);
        assert_eq!(oob.confusion_matrix, vec![vec![1, 0], vec![0, 2]]);
    }

    #[test]
    fn confusion_records_mistakes() {
        let ds = Dataset::from_rows(&[vec![0.0], vec![1.0]], &[0, 1]).unwrap();
        let trees = vec![leaf_tree(1)];
        let oob = compute_oob(&trees, &ds, &[vec![0, 1]]).unwrap();
        assert!((oob.accuracy - 0.5).abs() < f64::EPSILON);
        assert_eq!(oob.confusion_matrix, vec![vec![0, 1], vec![0, 1]]);
    }

    #[test]
    fn no_oob_observations_gives_none() {
        let ds = Dataset::from_rows(&[vec![0.0], vec![1.0]], &[0, 1]).unwrap();
        assert!(compute_oob(&[leaf_tree(0)], &ds, &[vec![]]).is_none());
    }
}
