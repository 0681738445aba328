//! JSON summaries printed or saved by the CLI.

use std::path::PathBuf;

use rerf_forest::{
    ForestStats, ForestType, OobScore, PackOrder, PackedForest, TrainedForest, TrainingMetadata,
    VERSION_MAJOR, VERSION_MINOR,
};
use serde::Serialize;

/// Summary of a training run.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    /// Where the packed model was written.
    pub model: PathBuf,
    /// `"classic"` or `"randomer"`.
    pub forest_type: &'static str,
    /// Node order used in the packed file.
    pub pack_order: PackOrder,
    /// Dimensions of the fitted forest.
    pub metadata: TrainingMetadata,
    /// Out-of-bag estimate, when enabled and available.
    pub oob: Option<OobScore>,
    /// Shape of the grown trees.
    pub stats: ForestStats,
}

impl TrainingReport {
    /// Summarize `trained`, saved to `model` in `pack_order`.
    #[must_use]
    pub fn new(
        model: PathBuf,
        forest_type: &ForestType,
        pack_order: PackOrder,
        trained: &TrainedForest,
    ) -> Self {
        Self {
            model,
            forest_type: forest_type_name(forest_type),
            pack_order,
            metadata: trained.metadata().clone(),
            oob: trained.oob_score().cloned(),
            stats: trained.stats(),
        }
    }
}

/// Summary of a batch prediction run.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionReport {
    /// Model the predictions came from.
    pub model: PathBuf,
    /// Number of rows predicted.
    pub n_rows: usize,
    /// Where predictions were written, if anywhere.
    pub output: Option<PathBuf>,
    /// Misclassification rate, when the input carried labels.
    pub error_rate: Option<f64>,
}

/// Layout summary of a packed model file.
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    /// Inspected file.
    pub model: PathBuf,
    /// `"major.minor"` format version.
    pub format_version: String,
    pub n_trees: usize,
    pub n_features: usize,
    pub n_classes: usize,
    pub n_nodes: usize,
    pub n_terms: usize,
    /// Node count of each tree.
    pub tree_sizes: Vec<usize>,
    /// Deepest node over all trees.
    pub max_depth: usize,
}

impl InspectReport {
    /// Describe `packed`, loaded from `model`.
    #[must_use]
    pub fn new(model: PathBuf, packed: &PackedForest) -> Self {
        Self {
            model,
            format_version: format!("{VERSION_MAJOR}.{VERSION_MINOR}"),
            n_trees: packed.n_trees(),
            n_features: packed.n_features(),
            n_classes: packed.n_classes(),
            n_nodes: packed.n_nodes(),
            n_terms: packed.n_terms(),
            tree_sizes: packed.tree_sizes(),
            max_depth: packed.nodes().iter().map(|n| n.depth()).max().unwrap_or(0),
        }
    }
}

fn forest_type_name(forest_type: &ForestType) -> &'static str {
    match forest_type {
        ForestType::Classic => "classic",
        ForestType::Randomer { .. } => "randomer",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rerf_forest::{Dataset, ForestConfig, OobMode};

    fn trained() -> TrainedForest {
        let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![f64::from(i), f64::from(i % 5)]).collect();
        let labels: Vec<usize> = (0..40).map(|i| usize::from(i >= 20)).collect();
        let ds = Dataset::from_rows(&rows, &labels).unwrap();
        ForestConfig::new(10)
            .unwrap()
            .with_oob_mode(OobMode::Enabled)
            .fit(&ds)
            .unwrap()
    }

    #[test]
    fn training_report_serializes() {
        let trained = trained();
        let report = TrainingReport::new(
            PathBuf::from("m.rerf"),
            &ForestType::randomer(),
            PackOrder::HotChildFirst,
            &trained,
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["forest_type"], "randomer");
        assert_eq!(json["pack_order"], "HotChildFirst");
        assert_eq!(json["metadata"]["n_trees"], 10);
        assert!(json["oob"]["accuracy"].is_number());
    }

    #[test]
    fn inspect_report_matches_packed_counts() {
        let trained = trained();
        let packed = PackedForest::pack(trained.forest(), PackOrder::PreOrder);
        let report = InspectReport::new(PathBuf::from("m.rerf"), &packed);
        assert_eq!(report.format_version, "1.0");
        assert_eq!(report.n_trees, 10);
        assert_eq!(report.tree_sizes.iter().sum::<usize>(), report.n_nodes);
        assert_eq!(report.max_depth, trained.stats().max_depth);
    }
}
