//! Impurity criteria and best-cut search over sorted projected values.

use crate::node::Impurity;

/// Criterion for measuring the quality of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum SplitCriterion {
    /// Gini impurity: 1 - Σ(p_i²)
    #[default]
    Gini,
    /// Information entropy: -Σ(p_i · ln(p_i))
    Entropy,
}

impl SplitCriterion {
    /// Compute the impurity of a node from its class counts.
    ///
    /// Returns [`Impurity::new(0.0)`] when `n_samples` is zero (pure node).
    #[must_use]
    pub fn impurity(&self, class_counts: &[usize], n_samples: usize) -> Impurity {
        if n_samples == 0 {
            return Impurity::new(0.0);
        }
        let n = n_samples as f64;
        let value = match self {
            SplitCriterion::Gini => {
                let sum_sq: f64 = class_counts
                    .iter()
                    .map(|&c| {
                        let p = c as f64 / n;
                        p * p
                    })
                    .sum();
                1.0 - sum_sq
            }
            SplitCriterion::Entropy => {
                -class_counts
                    .iter()
                    .filter(|&&c| c > 0)
                    .map(|&c| {
                        let p = c as f64 / n;
                        p * p.ln()
                    })
                    .sum::<f64>()
            }
        };
        Impurity::new(value)
    }
}

/// A class label zipped with the observation's projected value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledValue {
    /// Class of the observation.
    pub label: usize,
    /// Projected value of the observation.
    pub value: f64,
}

impl LabeledValue {
    /// Zip a label with a projected value.
    #[must_use]
    pub fn new(label: usize, value: f64) -> Self {
        Self { label, value }
    }
}

/// Best cut found over a sorted run of projected values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutThreshold {
    /// Cut value: projected values `< value` go left.
    pub value: f64,
    /// Weighted impurity decrease `n·I(parent) − n_l·I(left) − n_r·I(right)`.
    pub score: f64,
    /// Observations left of the cut.
    pub n_left: usize,
    /// Whether both sides of the cut are pure.
    pub is_perfect: bool,
}

/// Midpoint between two distinct adjacent projected values.
///
/// When rounding would collapse the midpoint onto `lo`, `hi` is returned so
/// that `lo < cut <= hi` always holds.
///
/// # Panics
///
/// Panics if `lo >= hi`; the caller must only ask for cuts between
/// distinct values.
#[must_use]
pub fn midpoint(lo: f64, hi: f64) -> f64 {
    assert!(lo < hi, "midpoint requested between non-increasing values {lo} and {hi}");
    let mid = 0.5 * lo + 0.5 * hi;
    if mid > lo { mid } else { hi }
}

/// Find the best cut over `pairs`, which must be sorted ascending by value.
///
/// Scans left to right with incremental class counts, scoring every boundary
/// between distinct adjacent values. The first best boundary in ascending
/// order wins. Returns `None` when all values are identical.
pub fn evaluate_split(
    pairs: &[LabeledValue],
    parent_counts: &[usize],
    criterion: SplitCriterion,
) -> Option<CutThreshold> {
    debug_assert!(
        pairs.windows(2).all(|w| w[0].value <= w[1].value),
        "pairs must be sorted by value"
    );
    let n_samples = pairs.len();
    if n_samples < 2 {
        return None;
    }

    let parent_weighted = n_samples as f64 * criterion.impurity(parent_counts, n_samples).value();
    let mut left_counts = vec![0usize; parent_counts.len()];
    let mut right_counts = parent_counts.to_vec();
    let mut best: Option<CutThreshold> = None;

    for i in 0..(n_samples - 1) {
        let current = pairs[i];
        left_counts[current.label] += 1;
        right_counts[current.label] -= 1;

        let next = pairs[i + 1];
        if current.value == next.value {
            continue;
        }

        let n_left = i + 1;
        let n_right = n_samples - n_left;
        let left_impurity = criterion.impurity(&left_counts, n_left).value();
        let right_impurity = criterion.impurity(&right_counts, n_right).value();
        let score = parent_weighted
            - n_left as f64 * left_impurity
            - n_right as f64 * right_impurity;

        if best.is_none_or(|b| score > b.score) {
            best = Some(CutThreshold {
                value: midpoint(current.value, next.value),
                score,
                n_left,
                is_perfect: left_impurity == 0.0 && right_impurity == 0.0,
            });
        }
    }

    best
}
