//! Immutable labeled training data.

use tracing::debug;

use crate::error::RerfError;

/// Labeled numeric dataset shared read-only by every tree.
///
/// # Layout
///
/// Features are stored column-major: `columns[feature][observation]`. The
/// constructors take row-major input (`rows[observation][feature]`) and
/// transpose once, so split evaluation scans contiguous feature columns.
///
/// Labels are zero-based class ids in `[0, n_classes)`.
#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<Vec<f64>>,
    labels: Vec<usize>,
    n_classes: usize,
}

impl Dataset {
    /// Build a dataset, inferring `n_classes` as `max(label) + 1`.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`RerfError::EmptyDataset`] | `rows` is empty |
    /// | [`RerfError::ZeroFeatures`] | rows have zero columns |
    /// | [`RerfError::FeatureCountMismatch`] | rows have inconsistent lengths |
    /// | [`RerfError::NonFiniteValue`] | a value is NaN or infinite |
    /// | [`RerfError::LabelCountMismatch`] | `labels.len() != rows.len()` |
    pub fn from_rows(rows: &[Vec<f64>], labels: &[usize]) -> Result<Self, RerfError> {
        let n_classes = labels.iter().max().copied().unwrap_or(0) + 1;
        Self::with_n_classes(rows, labels, n_classes)
    }

    /// Build a dataset with an explicit class count.
    ///
    /// # Errors
    ///
    /// Everything [`Dataset::from_rows`] reports, plus
    /// [`RerfError::LabelOutOfRange`] when a label is `>= n_classes`.
    pub fn with_n_classes(
        rows: &[Vec<f64>],
        labels: &[usize],
        n_classes: usize,
    ) -> Result<Self, RerfError> {
        validate_rows(rows)?;
        let n_rows = rows.len();
        let n_features = rows[0].len();

        if labels.len() != n_rows {
            return Err(RerfError::LabelCountMismatch {
                n_labels: labels.len(),
                n_rows,
            });
        }
        if let Some((row, &label)) = labels.iter().enumerate().find(|&(_, &l)| l >= n_classes) {
            return Err(RerfError::LabelOutOfRange {
                label,
                row,
                n_classes,
            });
        }

        let columns: Vec<Vec<f64>> = (0..n_features)
            .map(|f| rows.iter().map(|row| row[f]).collect())
            .collect();

        debug!(n_rows, n_features, n_classes, "dataset validated");

        Ok(Self {
            columns,
            labels: labels.to_vec(),
            n_classes,
        })
    }

    /// Number of observations (rows).
    #[must_use]
    pub fn n_observations(&self) -> usize {
        self.labels.len()
    }

    /// Number of feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    /// Number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// All values of one feature column.
    #[must_use]
    pub fn column(&self, feature: usize) -> &[f64] {
        &self.columns[feature]
    }

    /// Single feature value.
    #[inline]
    #[must_use]
    pub fn value(&self, feature: usize, observation: usize) -> f64 {
        self.columns[feature][observation]
    }

    /// Class label of one observation.
    #[inline]
    #[must_use]
    pub fn label(&self, observation: usize) -> usize {
        self.labels[observation]
    }

    /// All labels, in row order.
    #[must_use]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Copy one observation back out as a row.
    #[must_use]
    pub fn row(&self, observation: usize) -> Vec<f64> {
        self.columns.iter().map(|col| col[observation]).collect()
    }
}

/// Check shape and finiteness of a row-major feature matrix.
pub(crate) fn validate_rows(rows: &[Vec<f64>]) -> Result<(), RerfError> {
    let Some(first) = rows.first() else {
        return Err(RerfError::EmptyDataset);
    };
    let n_features = first.len();
    if n_features == 0 {
        return Err(RerfError::ZeroFeatures);
    }
    for (row, values) in rows.iter().enumerate() {
        if values.len() != n_features {
            return Err(RerfError::FeatureCountMismatch {
                expected: n_features,
                got: values.len(),
                row,
            });
        }
        if let Some(feature) = values.iter().position(|v| !v.is_finite()) {
            return Err(RerfError::NonFiniteValue { row, feature });
        }
    }
    Ok(())
}
