//! Random split-candidate generation for classic and Randomer forests.

use crate::error::RerfError;
use crate::node::FeatureIndex;
use crate::rng::TreeRng;

/// Discrete set of weights that Randomer projections draw from.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WeightSet(Vec<f64>);

impl WeightSet {
    /// Create a weight set.
    ///
    /// # Errors
    ///
    /// Returns [`RerfError::InvalidWeightSet`] when `weights` is empty or
    /// contains a zero or non-finite value.
    pub fn new(weights: Vec<f64>) -> Result<Self, RerfError> {
        let reason = if weights.is_empty() {
            Some("weight set is empty")
        } else if weights.iter().any(|w| !w.is_finite()) {
            Some("weights must be finite")
        } else if weights.contains(&0.0) {
            Some("weights must be non-zero")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(RerfError::InvalidWeightSet { weights, reason }),
            None => Ok(Self(weights)),
        }
    }

    /// The `{-1, +1}` set.
    #[must_use]
    pub fn signed_unit() -> Self {
        Self(vec![-1.0, 1.0])
    }

    /// Weights in the set.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Whether `weight` is a member of the set.
    #[must_use]
    pub fn contains(&self, weight: f64) -> bool {
        self.0.contains(&weight)
    }

    fn draw(&self, rng: &mut TreeRng) -> f64 {
        self.0[rng.next_bounded(self.0.len())]
    }
}

impl Default for WeightSet {
    fn default() -> Self {
        Self::signed_unit()
    }
}

/// Which family of split candidates the forest considers at each node.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub enum ForestType {
    /// Single raw features, `mtry` distinct ones per node.
    #[default]
    Classic,
    /// Sparse signed linear combinations of raw features.
    Randomer {
        /// Weights each projection term is drawn from.
        weights: WeightSet,
    },
}

impl ForestType {
    /// Randomer forest with the default `{-1, +1}` weights.
    #[must_use]
    pub fn randomer() -> Self {
        ForestType::Randomer {
            weights: WeightSet::default(),
        }
    }

    /// Largest mtry this forest type accepts for `n_features` columns.
    ///
    /// Randomer candidates are combinations, so their count may exceed the
    /// number of raw features, up to `n_features²`.
    pub(crate) fn mtry_limit(&self, n_features: usize) -> usize {
        match self {
            ForestType::Classic => n_features,
            ForestType::Randomer { .. } => n_features.saturating_mul(n_features),
        }
    }
}

/// One weighted raw feature inside a projection.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProjectionTerm {
    /// Raw feature column.
    pub feature: FeatureIndex,
    /// Signed weight applied to that column.
    pub weight: f64,
}

/// A projection of an observation onto one scalar: `Σ weight · x[feature]`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SplitCandidate {
    terms: Vec<ProjectionTerm>,
}

impl SplitCandidate {
    /// Projection onto a single raw feature with weight `1.0`.
    #[must_use]
    pub fn single(feature: FeatureIndex) -> Self {
        Self {
            terms: vec![ProjectionTerm {
                feature,
                weight: 1.0,
            }],
        }
    }

    /// Projection from explicit terms.
    #[must_use]
    pub fn from_terms(terms: Vec<ProjectionTerm>) -> Self {
        Self { terms }
    }

    /// Terms of the projection.
    #[must_use]
    pub fn terms(&self) -> &[ProjectionTerm] {
        &self.terms
    }

    /// Project a full observation row.
    #[inline]
    #[must_use]
    pub fn project(&self, observation: &[f64]) -> f64 {
        project_terms(&self.terms, |f| observation[f])
    }
}

/// Evaluate `Σ weight · value(feature)` over `terms`.
///
/// A single unit-weight term returns the raw value unchanged, so classic
/// splits compare exactly against the stored feature.
#[inline]
pub(crate) fn project_terms(terms: &[ProjectionTerm], value: impl Fn(usize) -> f64) -> f64 {
    match terms {
        [only] if only.weight == 1.0 => value(only.feature.index()),
        _ => terms
            .iter()
            .map(|t| t.weight * value(t.feature.index()))
            .sum(),
    }
}

/// Draw exactly `mtry` split candidates for one node.
///
/// Classic forests shuffle the first `mtry` positions of `0..n_features`
/// (partial Fisher-Yates) and take one distinct feature per candidate; the
/// caller guarantees `mtry <= n_features`.
///
/// Randomer forests scatter `n_draws` random features over `mtry` buckets,
/// give each still-empty bucket one more feature, and attach a weight drawn
/// from the weight set to every term. Repeated features within a bucket are
/// kept once. Classic forests ignore `n_draws`.
pub fn generate_candidates(
    n_features: usize,
    mtry: usize,
    n_draws: usize,
    forest_type: &ForestType,
    rng: &mut TreeRng,
) -> Vec<SplitCandidate> {
    match forest_type {
        ForestType::Classic => {
            debug_assert!(mtry <= n_features, "mtry validated against n_features");
            let mut order: Vec<usize> = (0..n_features).collect();
            for i in 0..mtry {
                let j = i + rng.next_bounded(n_features - i);
                order.swap(i, j);
            }
            order[..mtry]
                .iter()
                .map(|&f| SplitCandidate::single(FeatureIndex::new(f)))
                .collect()
        }
        ForestType::Randomer { weights } => {
            let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); mtry];
            for _ in 0..n_draws {
                let bucket = rng.next_bounded(mtry);
                let feature = rng.next_bounded(n_features);
                if !buckets[bucket].contains(&feature) {
                    buckets[bucket].push(feature);
                }
            }
            for bucket in buckets.iter_mut().filter(|b| b.is_empty()) {
                bucket.push(rng.next_bounded(n_features));
            }
            buckets
                .into_iter()
                .map(|features| {
                    let terms = features
                        .into_iter()
                        .map(|f| ProjectionTerm {
                            feature: FeatureIndex::new(f),
                            weight: weights.draw(rng),
                        })
                        .collect();
                    SplitCandidate::from_terms(terms)
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn iris_shaped_classic_draws_exactly_mtry() {
        let mut rng = TreeRng::from_seed(42);
        for _ in 0..200 {
            let cands = generate_candidates(4, 2, 2, &ForestType::Classic, &mut rng);
            assert_eq!(cands.len(), 2);
            for c in &cands {
                assert_eq!(c.terms().len(), 1);
                assert!(c.terms()[0].feature.index() < 4);
                assert_eq!(c.terms()[0].weight, 1.0);
            }
        }
    }

    #[test]
    fn iris_shaped_randomer_draws_exactly_mtry() {
        let mut rng = TreeRng::from_seed(42);
        let ft = ForestType::randomer();
        for _ in 0..200 {
            let cands = generate_candidates(4, 2, 2, &ft, &mut rng);
            assert_eq!(cands.len(), 2);
            for c in &cands {
                assert!(!c.terms().is_empty());
                assert!(c.terms().iter().all(|t| t.feature.index() < 4));
            }
        }
    }

    #[test]
    fn classic_candidates_are_distinct() {
        let mut rng = TreeRng::from_seed(9);
        for _ in 0..100 {
            let cands = generate_candidates(10, 10, 10, &ForestType::Classic, &mut rng);
            let features: HashSet<usize> =
                cands.iter().map(|c| c.terms()[0].feature.index()).collect();
            assert_eq!(features.len(), 10);
        }
    }

    #[test]
    fn randomer_weights_come_from_set() {
        let weights = WeightSet::new(vec![-2.0, 0.5, 3.0]).unwrap();
        let ft = ForestType::Randomer {
            weights: weights.clone(),
        };
        let mut rng = TreeRng::from_seed(1);
        for _ in 0..100 {
            for c in generate_candidates(6, 8, 8, &ft, &mut rng) {
                let features: HashSet<usize> =
                    c.terms().iter().map(|t| t.feature.index()).collect();
                assert_eq!(features.len(), c.terms().len(), "duplicate feature in candidate");
                assert!(c.terms().iter().all(|t| weights.contains(t.weight)));
            }
        }
    }

    #[test]
    fn randomer_mtry_may_exceed_features() {
        let mut rng = TreeRng::from_seed(2);
        let cands = generate_candidates(3, 7, 7, &ForestType::randomer(), &mut rng);
        assert_eq!(cands.len(), 7);
    }

    #[test]
    fn randomer_terms_grow_with_draws() {
        let ft = ForestType::randomer();
        let mean_terms = |n_draws: usize| {
            let mut rng = TreeRng::from_seed(11);
            let total: usize = (0..200)
                .flat_map(|_| generate_candidates(50, 4, n_draws, &ft, &mut rng))
                .map(|c| c.terms().len())
                .sum();
            total as f64 / 800.0
        };
        let sparse = mean_terms(4);
        let dense = mean_terms(12);
        assert!(sparse < 1.5, "sparse mean terms {sparse}");
        assert!(dense > 2.5, "dense mean terms {dense}");
    }

    #[test]
    fn randomer_mtry_limit_is_quadratic() {
        assert_eq!(ForestType::Classic.mtry_limit(5), 5);
        assert_eq!(ForestType::randomer().mtry_limit(5), 25);
        assert_eq!(ForestType::randomer().mtry_limit(usize::MAX), usize::MAX);
    }

    #[test]
    fn weight_set_rejects_bad_values() {
        assert!(WeightSet::new(vec![]).is_err());
        assert!(WeightSet::new(vec![1.0, 0.0]).is_err());
        assert!(WeightSet::new(vec![f64::NAN]).is_err());
        assert!(WeightSet::new(vec![-1.0, 2.0]).is_ok());
    }

    #[test]
    fn projection_sums_weighted_terms() {
        let c = SplitCandidate::from_terms(vec![
            ProjectionTerm {
                feature: FeatureIndex::new(0),
                weight: -1.0,
            },
            ProjectionTerm {
                feature: FeatureIndex::new(2),
                weight: 2.0,
            },
        ]);
        assert!((c.project(&[1.5, 100.0, 4.0]) - 6.5).abs() < 1e-12);
        assert_eq!(SplitCandidate::single(FeatureIndex::new(1)).project(&[0.0, 7.25]), 7.25);
    }
}
