//! Accuracy regression tests for rerf-forest.
//!
//! These tests verify that algorithmic changes do not degrade classic or
//! Randomer forest accuracy on a deterministic synthetic dataset.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use rerf_forest::{Dataset, ForestConfig, ForestType, Mtry, OobMode, PackOrder, PackedForest};

// ---------------------------------------------------------------------------
// Helper: deterministic synthetic classification dataset
// ---------------------------------------------------------------------------

/// Generate a `n_samples`-row, 10-feature, 3-class classification dataset.
///
/// Features 0-2 are informative (class * 3.0 + noise in [0, 0.5]).
/// Features 3-9 are pure noise in [0, 0.5].
/// Samples are assigned round-robin across classes.
fn make_classification(n_samples: usize, seed: u64) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let n_features = 10;
    let n_classes = 3;

    let mut rows = Vec::with_capacity(n_samples);
    let mut labels = Vec::with_capacity(n_samples);
    for i in 0..n_samples {
        let class = i % n_classes;
        labels.push(class);
        let row: Vec<f64> = (0..n_features)
            .map(|f| {
                let base = if f < 3 { class as f64 * 3.0 } else { 0.0 };
                base + rng.r#gen::<f64>() * 0.5
            })
            .collect();
        rows.push(row);
    }
    Dataset::from_rows(&rows, &labels).unwrap()
}

// ---------------------------------------------------------------------------
// a) held_out_error_below_threshold
// ---------------------------------------------------------------------------

/// Error on a held-out draw of the same distribution must stay below 0.10.
#[test]
fn held_out_error_below_threshold() {
    let train = make_classification(300, 42);
    let test = make_classification(150, 7);
    for forest_type in [ForestType::Classic, ForestType::randomer()] {
        let result = ForestConfig::new(100)
            .unwrap()
            .with_forest_type(forest_type.clone())
            .with_seed(42)
            .fit(&train)
            .unwrap();
        let error = result.forest().error_rate(&test).unwrap();
        assert!(error < 0.10, "{forest_type:?} held-out error {error} >= 0.10");
    }
}

// ---------------------------------------------------------------------------
// b) oob_accuracy_above_threshold
// ---------------------------------------------------------------------------

/// OOB accuracy with 100 trees must exceed 0.80.
#[test]
fn oob_accuracy_above_threshold() {
    let ds = make_classification(300, 42);
    let result = ForestConfig::new(100)
        .unwrap()
        .with_seed(42)
        .with_oob_mode(OobMode::Enabled)
        .fit(&ds)
        .unwrap();

    let oob = result.oob_score().expect("OOB score must be computed when OobMode::Enabled");
    assert!(
        oob.accuracy > 0.80,
        "oob_accuracy {} <= 0.80",
        oob.accuracy
    );
    assert_eq!(oob.confusion_matrix.len(), 3);
}

// ---------------------------------------------------------------------------
// c) randomer_with_wide_mtry
// ---------------------------------------------------------------------------

/// A Randomer forest may draw more candidates than there are raw features.
#[test]
fn randomer_with_wide_mtry() {
    let ds = make_classification(300, 42);
    let result = ForestConfig::new(50)
        .unwrap()
        .with_forest_type(ForestType::randomer())
        .with_mtry(Mtry::Fixed(20))
        .with_seed(42)
        .fit(&ds)
        .unwrap();
    assert_eq!(result.metadata().mtry_resolved, 20);
    let error = result.forest().error_rate(&ds).unwrap();
    assert!(error < 0.05, "training error {error} >= 0.05");
}

// ---------------------------------------------------------------------------
// d) deterministic_predictions
// ---------------------------------------------------------------------------

/// Same config and seed must produce identical packed bytes across two runs.
#[test]
fn deterministic_predictions() {
    let ds = make_classification(300, 42);
    let config = ForestConfig::new(100).unwrap().with_seed(42);

    let first = config.fit(&ds).unwrap().into_forest();
    let second = config.fit(&ds).unwrap().into_forest();

    assert_eq!(
        PackedForest::pack(&first, PackOrder::PreOrder).to_bytes(),
        PackedForest::pack(&second, PackOrder::PreOrder).to_bytes(),
        "packed forests differ across runs with the same seed"
    );
}

// ---------------------------------------------------------------------------
// e) prediction_accuracy_on_training_data
// ---------------------------------------------------------------------------

/// Training error with 100 trees must stay below 0.05 (trees grow to purity).
#[test]
fn prediction_accuracy_on_training_data() {
    let ds = make_classification(300, 42);
    let result = ForestConfig::new(100).unwrap().with_seed(42).fit(&ds).unwrap();
    let error = result.forest().error_rate(&ds).unwrap();
    assert!(error < 0.05, "training error {error} >= 0.05");
}

// ---------------------------------------------------------------------------
// f) forest_statistics
// ---------------------------------------------------------------------------

/// Depth limits are reflected in the forest statistics.
#[test]
fn forest_statistics() {
    let ds = make_classification(300, 42);
    let result = ForestConfig::new(20)
        .unwrap()
        .with_max_depth(Some(3))
        .with_seed(42)
        .fit(&ds)
        .unwrap();
    let stats = result.stats();
    assert!(stats.max_depth <= 3);
    assert!(stats.mean_leaf_depth <= 3.0);
    assert!(stats.n_leaves >= 20);
}
