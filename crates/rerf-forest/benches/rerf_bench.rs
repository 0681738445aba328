//! Criterion benchmarks for rerf-forest: growth, packing and packed prediction.

use criterion::{Criterion, criterion_group, criterion_main};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use rerf_forest::{Dataset, ForestConfig, ForestType, PackOrder, PackedForest};

fn make_classification(
    n_samples: usize,
    n_features: usize,
    n_classes: usize,
    seed: u64,
) -> (Dataset, Vec<Vec<f64>>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
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
    (Dataset::from_rows(&rows, &labels).unwrap(), rows)
}

fn bench_train(c: &mut Criterion) {
    let (ds, _) = make_classification(500, 20, 5, 42);
    let classic = ForestConfig::new(50).unwrap().with_seed(42);
    let randomer = classic.clone().with_forest_type(ForestType::randomer());

    c.bench_function("classic_train_500x20_5class_50trees", |b| {
        b.iter(|| classic.fit(&ds).unwrap());
    });
    c.bench_function("randomer_train_500x20_5class_50trees", |b| {
        b.iter(|| randomer.fit(&ds).unwrap());
    });
}

fn bench_pack(c: &mut Criterion) {
    let (ds, _) = make_classification(500, 20, 5, 42);
    let forest = ForestConfig::new(50).unwrap().fit(&ds).unwrap().into_forest();

    c.bench_function("pack_hot_child_first_50trees", |b| {
        b.iter(|| PackedForest::pack(&forest, PackOrder::HotChildFirst).to_bytes());
    });
}

fn bench_packed_predict_batch(c: &mut Criterion) {
    let (ds, rows) = make_classification(500, 20, 5, 42);
    let forest = ForestConfig::new(50).unwrap().fit(&ds).unwrap().into_forest();
    let pre_order = PackedForest::pack(&forest, PackOrder::PreOrder);
    let hot_first = PackedForest::pack(&forest, PackOrder::HotChildFirst);

    c.bench_function("packed_predict_batch_pre_order_500x20", |b| {
        b.iter(|| pre_order.predict_batch(&rows, 4).unwrap());
    });
    c.bench_function("packed_predict_batch_hot_child_first_500x20", |b| {
        b.iter(|| hot_first.predict_batch(&rows, 4).unwrap());
    });
}

criterion_group!(benches, bench_train, bench_pack, bench_packed_predict_batch);
criterion_main!(benches);
