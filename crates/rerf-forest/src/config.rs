//! Configuration builder for forest training.

use crate::builder::GrowSettings;
use crate::candidate::ForestType;
use crate::dataset::Dataset;
use crate::error::RerfError;
use crate::result::TrainedForest;
use crate::rng::SeedMode;
use crate::split::SplitCriterion;

/// Strategy for the number of split candidates drawn at each node.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Mtry {
    /// `floor(sqrt(n_features))`, at least 1.
    Sqrt,
    /// `floor(fraction · n_features)`, at least 1. Fraction must be in (0.0, 1.0].
    Fraction(f64),
    /// A fixed count.
    Fixed(usize),
}

/// Whether to compute out-of-bag evaluation during training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OobMode {
    /// Compute OOB accuracy and confusion matrix.
    Enabled,
    /// Skip OOB evaluation.
    Disabled,
}

/// Configuration for forest training.
///
/// Construct via [`ForestConfig::new`], then chain `with_*` methods. Values
/// that depend on the dataset (mtry, thread count) are checked by
/// [`ForestConfig::fit`].
///
/// # Defaults
///
/// | Parameter     | Default        |
/// |---------------|----------------|
/// | `mtry`        | `Sqrt`         |
/// | `mtry_mult`   | 1.0            |
/// | `forest_type` | `Classic`      |
/// | `min_parent`  | 1              |
/// | `max_depth`   | `None`         |
/// | `criterion`   | `Gini`         |
/// | `seed_mode`   | `Fixed(42)`    |
/// | `n_threads`   | `None` (rayon) |
/// | `oob_mode`    | `Disabled`     |
#[derive(Debug, Clone)]
pub struct ForestConfig {
    pub(crate) n_trees: usize,
    pub(crate) mtry: Mtry,
    pub(crate) mtry_mult: f64,
    pub(crate) forest_type: ForestType,
    pub(crate) min_parent: usize,
    pub(crate) max_depth: Option<usize>,
    pub(crate) criterion: SplitCriterion,
    pub(crate) seed_mode: SeedMode,
    pub(crate) n_threads: Option<usize>,
    pub(crate) oob_mode: OobMode,
}

impl ForestConfig {
    /// Create a new config with the given number of trees.
    ///
    /// # Errors
    ///
    /// Returns [`RerfError::InvalidTreeCount`] if `n_trees` is zero.
    pub fn new(n_trees: usize) -> Result<Self, RerfError> {
        if n_trees == 0 {
            return Err(RerfError::InvalidTreeCount { n_trees });
        }
        Ok(Self {
            n_trees,
            mtry: Mtry::Sqrt,
            mtry_mult: 1.0,
            forest_type: ForestType::Classic,
            min_parent: 1,
            max_depth: None,
            criterion: SplitCriterion::Gini,
            seed_mode: SeedMode::Fixed(42),
            n_threads: None,
            oob_mode: OobMode::Disabled,
        })
    }

    // --- Setters ---

    /// Set the mtry strategy.
    #[must_use]
    pub fn with_mtry(mut self, mtry: Mtry) -> Self {
        self.mtry = mtry;
        self
    }

    /// Scale the Randomer feature draws per node to `mtry · mtry_mult`.
    ///
    /// Larger values give denser projections. Classic forests ignore it.
    #[must_use]
    pub fn with_mtry_mult(mut self, mtry_mult: f64) -> Self {
        self.mtry_mult = mtry_mult;
        self
    }

    /// Set the forest type.
    #[must_use]
    pub fn with_forest_type(mut self, forest_type: ForestType) -> Self {
        self.forest_type = forest_type;
        self
    }

    /// Nodes with at most `min_parent` observations become leaves.
    #[must_use]
    pub fn with_min_parent(mut self, min_parent: usize) -> Self {
        self.min_parent = min_parent;
        self
    }

    /// Set the maximum tree depth. `None` means unlimited; `Some(0)` grows
    /// single-leaf trees.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the split quality criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set a fixed random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_mode = SeedMode::Fixed(seed);
        self
    }

    /// Set how the master seed stream is initialised.
    #[must_use]
    pub fn with_seed_mode(mut self, seed_mode: SeedMode) -> Self {
        self.seed_mode = seed_mode;
        self
    }

    /// Set the number of training threads. `None` uses rayon's global pool.
    #[must_use]
    pub fn with_n_threads(mut self, n_threads: Option<usize>) -> Self {
        self.n_threads = n_threads;
        self
    }

    /// Set the OOB evaluation mode.
    #[must_use]
    pub fn with_oob_mode(mut self, oob_mode: OobMode) -> Self {
        self.oob_mode = oob_mode;
        self
    }

    /// Set a parameter by its textual name.
    ///
    /// | Name                       | Value                                   |
    /// |----------------------------|-----------------------------------------|
    /// | `numTreesInForest`         | tree count, at least 1                  |
    /// | `mtry`                     | fixed candidate count                   |
    /// | `mtryMult`                 | positive draw multiplier                |
    /// | `fractionOfFeaturesToTest` | fraction in (0.0, 1.0]                  |
    /// | `minParent`                | at least 1                              |
    /// | `maxDepth`                 | depth limit, 0 for a single leaf        |
    /// | `seed`                     | `u64` seed                              |
    /// | `numCores`                 | thread count, at least 1                |
    /// | `forestType`               | `rfBase`/`classic` or `rerf`/`randomer` |
    ///
    /// # Errors
    ///
    /// Returns [`RerfError::UnknownParameter`] for an unrecognized name,
    /// [`RerfError::InvalidParameterValue`] when the value does not parse,
    /// and the matching configuration error when it parses but is out of range.
    pub fn with_parameter(mut self, name: &str, value: &str) -> Result<Self, RerfError> {
        match name {
            "numTreesInForest" => {
                let n_trees = parse_value(name, value)?;
                if n_trees == 0 {
                    return Err(RerfError::InvalidTreeCount { n_trees });
                }
                self.n_trees = n_trees;
            }
            "mtry" => self.mtry = Mtry::Fixed(parse_value(name, value)?),
            "fractionOfFeaturesToTest" => {
                let fraction: f64 = parse_value(name, value)?;
                check_fraction(fraction)?;
                self.mtry = Mtry::Fraction(fraction);
            }
            "minParent" => {
                let min_parent = parse_value(name, value)?;
                if min_parent == 0 {
                    return Err(RerfError::InvalidMinParent { min_parent });
                }
                self.min_parent = min_parent;
            }
            "mtryMult" => {
                let mtry_mult = parse_value(name, value)?;
                check_mtry_mult(mtry_mult, f64::INFINITY)?;
                self.mtry_mult = mtry_mult;
            }
            "maxDepth" => self.max_depth = Some(parse_value(name, value)?),
            "seed" => self.seed_mode = SeedMode::Fixed(parse_value(name, value)?),
            "numCores" => {
                let n_threads = parse_value(name, value)?;
                if n_threads == 0 {
                    return Err(RerfError::InvalidThreadCount { n_threads });
                }
                self.n_threads = Some(n_threads);
            }
            "forestType" => {
                self.forest_type = match value {
                    "rfBase" | "classic" => ForestType::Classic,
                    "rerf" | "randomer" => ForestType::randomer(),
                    _ => {
                        return Err(RerfError::InvalidParameterValue {
                            name: name.to_string(),
                            value: value.to_string(),
                        });
                    }
                };
            }
            _ => {
                return Err(RerfError::UnknownParameter {
                    name: name.to_string(),
                });
            }
        }
        Ok(self)
    }

    // --- Getters ---

    /// Return the number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Return the mtry strategy.
    #[must_use]
    pub fn mtry(&self) -> Mtry {
        self.mtry
    }

    /// Return the Randomer draw multiplier.
    #[must_use]
    pub fn mtry_mult(&self) -> f64 {
        self.mtry_mult
    }

    /// Return the forest type.
    #[must_use]
    pub fn forest_type(&self) -> &ForestType {
        &self.forest_type
    }

    /// Return the leaf threshold on node size.
    #[must_use]
    pub fn min_parent(&self) -> usize {
        self.min_parent
    }

    /// Return the maximum depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the split criterion.
    #[must_use]
    pub fn criterion(&self) -> SplitCriterion {
        self.criterion
    }

    /// Return the seed mode.
    #[must_use]
    pub fn seed_mode(&self) -> SeedMode {
        self.seed_mode
    }

    /// Return the training thread count, if set.
    #[must_use]
    pub fn n_threads(&self) -> Option<usize> {
        self.n_threads
    }

    /// Return the OOB evaluation mode.
    #[must_use]
    pub fn oob_mode(&self) -> OobMode {
        self.oob_mode
    }

    /// Resolve mtry for `n_features` columns under the configured forest type.
    ///
    /// # Errors
    ///
    /// Returns [`RerfError::InvalidMtryFraction`] for a fraction outside
    /// (0.0, 1.0] and [`RerfError::InvalidMtry`] when the count is zero or
    /// exceeds `n_features` (classic) or `n_features²` (Randomer).
    pub fn resolve_mtry(&self, n_features: usize) -> Result<usize, RerfError> {
        let resolved = match self.mtry {
            Mtry::Sqrt => ((n_features as f64).sqrt().floor() as usize).max(1),
            Mtry::Fraction(fraction) => {
                check_fraction(fraction)?;
                ((n_features as f64 * fraction).floor() as usize).max(1)
            }
            Mtry::Fixed(n) => n,
        };
        let limit = self.forest_type.mtry_limit(n_features);
        if resolved == 0 || resolved > limit {
            return Err(RerfError::InvalidMtry {
                mtry: resolved,
                limit,
            });
        }
        Ok(resolved)
    }

    /// Check every setting against `dataset` and freeze the growth parameters.
    pub(crate) fn resolve(&self, dataset: &Dataset) -> Result<GrowSettings, RerfError> {
        if self.min_parent == 0 {
            return Err(RerfError::InvalidMinParent {
                min_parent: self.min_parent,
            });
        }
        if let Some(n_threads) = self.n_threads
            && n_threads == 0
        {
            return Err(RerfError::InvalidThreadCount { n_threads });
        }
        let n_features = dataset.n_features();
        let mtry = self.resolve_mtry(n_features)?;
        // Each bucket holds at most n_features distinct features.
        check_mtry_mult(self.mtry_mult, n_features as f64)?;
        let n_draws = ((mtry as f64 * self.mtry_mult).floor() as usize)
            .min(mtry.saturating_mul(n_features));
        Ok(GrowSettings {
            forest_type: self.forest_type.clone(),
            mtry,
            n_draws,
            min_parent: self.min_parent,
            max_depth: self.max_depth,
            criterion: self.criterion,
        })
    }

    /// Train a forest on `dataset`.
    ///
    /// # Errors
    ///
    /// | Variant                            | When                                        |
    /// |------------------------------------|---------------------------------------------|
    /// | [`RerfError::InvalidMtry`]         | resolved mtry is 0 or above the type limit  |
    /// | [`RerfError::InvalidMtryFraction`] | fraction is not in (0.0, 1.0]               |
    /// | [`RerfError::InvalidMtryMult`]     | `mtry_mult` is not in (0, n_features]       |
    /// | [`RerfError::InvalidMinParent`]    | `min_parent` is zero                        |
    /// | [`RerfError::InvalidThreadCount`]  | `n_threads` is `Some(0)`                    |
    /// | [`RerfError::ThreadPool`]          | the training pool cannot be built           |
    pub fn fit(&self, dataset: &Dataset) -> Result<TrainedForest, RerfError> {
        crate::forest::train(self, dataset)
    }
}

fn parse_value<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, RerfError> {
    value
        .trim()
        .parse()
        .map_err(|_| RerfError::InvalidParameterValue {
            name: name.to_string(),
            value: value.to_string(),
        })
}

fn check_fraction(fraction: f64) -> Result<(), RerfError> {
    if fraction > 0.0 && fraction <= 1.0 {
        Ok(())
    } else {
        Err(RerfError::InvalidMtryFraction { fraction })
    }
}

fn check_mtry_mult(mtry_mult: f64, limit: f64) -> Result<(), RerfError> {
    if mtry_mult > 0.0 && mtry_mult <= limit && mtry_mult.is_finite() {
        Ok(())
    } else {
        Err(RerfError::InvalidMtryMult { mtry_mult })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_trees_rejected() {
        assert!(matches!(
            ForestConfig::new(0),
            Err(RerfError::InvalidTreeCount { n_trees: 0 })
        ));
    }

    #[test]
    fn mtry_defaults_to_floor_sqrt() {
        let config = ForestConfig::new(1).unwrap();
        assert_eq!(config.resolve_mtry(4).unwrap(), 2);
        assert_eq!(config.resolve_mtry(10).unwrap(), 3);
        assert_eq!(config.resolve_mtry(1).unwrap(), 1);
    }

    #[test]
    fn fraction_floors_with_minimum_one() {
        let config = ForestConfig::new(1).unwrap().with_mtry(Mtry::Fraction(0.3));
        assert_eq!(config.resolve_mtry(10).unwrap(), 3);
        assert_eq!(config.resolve_mtry(2).unwrap(), 1);
        let bad = ForestConfig::new(1).unwrap().with_mtry(Mtry::Fraction(1.5));
        assert!(matches!(
            bad.resolve_mtry(4),
            Err(RerfError::InvalidMtryFraction { .. })
        ));
    }

    #[test]
    fn classic_mtry_bounded_by_features() {
        let config = ForestConfig::new(1).unwrap().with_mtry(Mtry::Fixed(5));
        assert!(matches!(
            config.resolve_mtry(4),
            Err(RerfError::InvalidMtry { mtry: 5, limit: 4 })
        ));
        let randomer = config.with_forest_type(ForestType::randomer());
        assert_eq!(randomer.resolve_mtry(4).unwrap(), 5);
    }

    #[test]
    fn randomer_mtry_bounded_by_feature_pairs() {
        let config = ForestConfig::new(1)
            .unwrap()
            .with_forest_type(ForestType::randomer())
            .with_parameter("mtry", "1000000000000")
            .unwrap();
        assert!(matches!(
            config.resolve_mtry(10),
            Err(RerfError::InvalidMtry { limit: 100, .. })
        ));
        assert_eq!(config.with_mtry(Mtry::Fixed(100)).resolve_mtry(10).unwrap(), 100);
    }

    #[test]
    fn zero_max_depth_accepted() {
        let ds = Dataset::from_rows(&[vec![1.0], vec![2.0]], &[0, 1]).unwrap();
        let config = ForestConfig::new(1)
            .unwrap()
            .with_parameter("maxDepth", "0")
            .unwrap();
        assert_eq!(config.max_depth(), Some(0));
        assert_eq!(config.resolve(&ds).unwrap().max_depth, Some(0));
    }

    #[test]
    fn mtry_mult_scales_draws() {
        let rows: Vec<Vec<f64>> = (0..4).map(|i| vec![f64::from(i); 9]).collect();
        let ds = Dataset::from_rows(&rows, &[0, 1, 0, 1]).unwrap();
        let config = ForestConfig::new(1)
            .unwrap()
            .with_forest_type(ForestType::randomer())
            .with_mtry(Mtry::Fixed(4));
        assert_eq!(config.mtry_mult(), 1.0);
        assert_eq!(config.resolve(&ds).unwrap().n_draws, 4);
        let dense = config.clone().with_parameter("mtryMult", "2.5").unwrap();
        assert_eq!(dense.mtry_mult(), 2.5);
        assert_eq!(dense.resolve(&ds).unwrap().n_draws, 10);
        let too_dense = config.with_mtry_mult(10.0);
        assert!(matches!(
            too_dense.resolve(&ds),
            Err(RerfError::InvalidMtryMult { .. })
        ));
    }

    #[test]
    fn zero_mtry_rejected() {
        let config = ForestConfig::new(1)
            .unwrap()
            .with_forest_type(ForestType::randomer())
            .with_mtry(Mtry::Fixed(0));
        assert!(matches!(
            config.resolve_mtry(3),
            Err(RerfError::InvalidMtry { mtry: 0, .. })
        ));
    }

    #[test]
    fn parameters_by_name() {
        let config = ForestConfig::new(1)
            .unwrap()
            .with_parameter("numTreesInForest", "25")
            .unwrap()
            .with_parameter("minParent", "3")
            .unwrap()
            .with_parameter("forestType", "rerf")
            .unwrap()
            .with_parameter("numCores", "2")
            .unwrap()
            .with_parameter("seed", "7")
            .unwrap()
            .with_parameter("fractionOfFeaturesToTest", "0.5")
            .unwrap();
        assert_eq!(config.n_trees(), 25);
        assert_eq!(config.min_parent(), 3);
        assert_eq!(config.forest_type(), &ForestType::randomer());
        assert_eq!(config.n_threads(), Some(2));
        assert_eq!(config.seed_mode(), SeedMode::Fixed(7));
        assert_eq!(config.mtry(), Mtry::Fraction(0.5));
    }

    #[test]
    fn bad_parameters_rejected() {
        let config = ForestConfig::new(1).unwrap();
        assert!(matches!(
            config.clone().with_parameter("useBinning", "1"),
            Err(RerfError::UnknownParameter { .. })
        ));
        assert!(matches!(
            config.clone().with_parameter("mtry", "two"),
            Err(RerfError::InvalidParameterValue { .. })
        ));
        assert!(matches!(
            config.clone().with_parameter("forestType", "boosted"),
            Err(RerfError::InvalidParameterValue { .. })
        ));
        assert!(matches!(
            config.clone().with_parameter("mtryMult", "-1"),
            Err(RerfError::InvalidMtryMult { .. })
        ));
        assert!(matches!(
            config.with_parameter("mtryMult", "inf"),
            Err(RerfError::InvalidMtryMult { .. })
        ));
    }

    #[test]
    fn resolve_checks_node_limits() {
        let ds = Dataset::from_rows(&[vec![1.0], vec![2.0]], &[0, 1]).unwrap();
        let zero_parent = ForestConfig::new(1).unwrap().with_min_parent(0);
        assert!(matches!(
            zero_parent.resolve(&ds),
            Err(RerfError::InvalidMinParent { .. })
        ));
        let zero_threads = ForestConfig::new(1).unwrap().with_n_threads(Some(0));
        assert!(matches!(
            zero_threads.resolve(&ds),
            Err(RerfError::InvalidThreadCount { .. })
        ));
        let settings = ForestConfig::new(1).unwrap().resolve(&ds).unwrap();
        assert_eq!(settings.mtry, 1);
    }
}
