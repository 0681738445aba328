//! Parallel prediction over a packed forest.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::iter::{IntoParallelIterator, IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::builder::majority_class;
use crate::dataset::Dataset;
use crate::error::RerfError;
use crate::forest::with_pool;
use crate::pack::PackedForest;

/// Shared flag that asks an in-flight batch prediction to stop.
///
/// Clones observe the same flag. Workers check it before each row.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Outcome of a cancellable batch prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPrediction {
    /// One entry per input row: `Some(class)` if predicted, `None` if skipped.
    pub predictions: Vec<Option<usize>>,
    /// Whether cancellation caused any row to be skipped.
    pub cancelled: bool,
}

/// Base of the class ids reported at an output boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum LabelBase {
    /// Report class ids as stored (`0..n_classes`).
    #[default]
    ZeroBased,
    /// Report class ids shifted by one (`1..=n_classes`).
    OneBased,
}

impl LabelBase {
    /// Map an internal 0-based class id to this base.
    #[must_use]
    pub fn apply(self, class: usize) -> usize {
        match self {
            LabelBase::ZeroBased => class,
            LabelBase::OneBased => class + 1,
        }
    }
}

impl PackedForest {
    /// Class of the leaf reached in the tree rooted at `root`.
    fn tree_class(&self, root: u32, value: &impl Fn(usize) -> f64) -> usize {
        let mut node = &self.nodes[root as usize];
        while let Some((left, right)) = node.children() {
            let terms = &self.terms[node.terms_range()];
            let projected = match terms {
                [only] if only.weight() == 1.0 => value(only.feature()),
                _ => terms.iter().map(|t| t.weight() * value(t.feature())).sum(),
            };
            node = &self.nodes[if projected < node.cut_value() { left } else { right }];
        }
        node.right_or_class as usize
    }

    fn vote(&self, value: impl Fn(usize) -> f64) -> usize {
        let mut votes = vec![0usize; self.n_classes];
        for &root in &self.roots {
            votes[self.tree_class(root, &value)] += 1;
        }
        majority_class(&votes)
    }

    fn check_row(&self, row: &[f64]) -> Result<(), RerfError> {
        if row.len() == self.n_features {
            Ok(())
        } else {
            Err(RerfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: row.len(),
            })
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
        self.check_row(observation)?;
        Ok(self.vote(|f| observation[f]))
    }

    /// Predict every row on a pool of `n_threads` workers.
    ///
    /// # Errors
    ///
    /// Returns [`RerfError::PredictionFeatureMismatch`] if any row has the
    /// wrong feature count, [`RerfError::InvalidThreadCount`] for zero
    /// threads, or [`RerfError::ThreadPool`] if the pool cannot be built.
    #[instrument(skip_all, fields(n_rows = rows.len(), n_threads = n_threads))]
    pub fn predict_batch(&self, rows: &[Vec<f64>], n_threads: usize) -> Result<Vec<usize>, RerfError> {
        let predictions = with_pool(Some(n_threads), || {
            rows.par_iter()
                .map(|row| self.predict(row))
                .collect::<Result<Vec<usize>, RerfError>>()
        })??;
        info!(n_rows = predictions.len(), "batch prediction done");
        Ok(predictions)
    }

    /// Predict every row, stopping early once `token` is cancelled.
    ///
    /// All rows are validated before any work starts. Rows that were
    /// reached before cancellation hold `Some(class)`; the rest hold `None`.
    ///
    /// # Errors
    ///
    /// Same as [`PackedForest::predict_batch`].
    #[instrument(skip_all, fields(n_rows = rows.len(), n_threads = n_threads))]
    pub fn predict_batch_cancellable(
        &self,
        rows: &[Vec<f64>],
        n_threads: usize,
        token: &CancelToken,
    ) -> Result<BatchPrediction, RerfError> {
        for row in rows {
            self.check_row(row)?;
        }
        let predictions = self.cancellable_rows(rows, n_threads, token, || {})?;
        let skipped = predictions.iter().filter(|p| p.is_none()).count();
        if skipped > 0 {
            debug!(skipped, "batch prediction cancelled");
        }
        Ok(BatchPrediction {
            predictions,
            cancelled: skipped > 0,
        })
    }

    /// Runs `after_row` once per predicted row, after its vote.
    fn cancellable_rows(
        &self,
        rows: &[Vec<f64>],
        n_threads: usize,
        token: &CancelToken,
        after_row: impl Fn() + Sync,
    ) -> Result<Vec<Option<usize>>, RerfError> {
        with_pool(Some(n_threads), || {
            rows.par_iter()
                .map(|row| {
                    if token.is_cancelled() {
                        return None;
                    }
                    let class = self.vote(|f| row[f]);
                    after_row();
                    Some(class)
                })
                .collect()
        })
    }

    /// Fraction of `dataset` observations whose predicted class differs from the label.
    ///
    /// # Errors
    ///
    /// Returns [`RerfError::PredictionFeatureMismatch`] when the dataset has a
    /// different number of features, or a pool error as in
    /// [`PackedForest::predict_batch`].
    pub fn error_rate(&self, dataset: &Dataset, n_threads: usize) -> Result<f64, RerfError> {
        if dataset.n_features() != self.n_features {
            return Err(RerfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: dataset.n_features(),
            });
        }
        let wrong = with_pool(Some(n_threads), || {
            (0..dataset.n_observations())
                .into_par_iter()
                .filter(|&obs| self.vote(|f| dataset.value(f, obs)) != dataset.label(obs))
                .count()
        })?;
        Ok(wrong as f64 / dataset.n_observations() as f64)
    }
}
