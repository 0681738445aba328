//! Recursive node construction over explicit in-bag index ranges.

use std::ops::Range;

use crate::candidate::{ForestType, SplitCandidate, generate_candidates, project_terms};
use crate::dataset::Dataset;
use crate::node::{Node, NodeIndex};
use crate::rng::TreeRng;
use crate::split::{CutThreshold, LabeledValue, SplitCriterion, evaluate_split};

/// Growth parameters resolved against a concrete dataset.
#[derive(Debug, Clone)]
pub(crate) struct GrowSettings {
    pub(crate) forest_type: ForestType,
    pub(crate) mtry: usize,
    /// Feature draws spread over the `mtry` Randomer candidates.
    pub(crate) n_draws: usize,
    pub(crate) min_parent: usize,
    pub(crate) max_depth: Option<usize>,
    pub(crate) criterion: SplitCriterion,
}

/// Builds one tree's arena from its in-bag index buffer.
///
/// Every node owns a contiguous sub-range of `indices`; splitting a node
/// stable-partitions its range in place so children get adjacent sub-ranges.
pub(crate) struct NodeBuilder<'a> {
    dataset: &'a Dataset,
    settings: &'a GrowSettings,
    rng: &'a mut TreeRng,
    indices: Vec<usize>,
    pairs: Vec<LabeledValue>,
    arena: Vec<Node>,
}

impl<'a> NodeBuilder<'a> {
    pub(crate) fn new(
        dataset: &'a Dataset,
        settings: &'a GrowSettings,
        rng: &'a mut TreeRng,
        indices: Vec<usize>,
    ) -> Self {
        let capacity = indices.len();
        Self {
            dataset,
            settings,
            rng,
            indices,
            pairs: Vec::with_capacity(capacity),
            arena: Vec::new(),
        }
    }

    /// Grow the whole tree and return its pre-order arena.
    pub(crate) fn build(mut self) -> Vec<Node> {
        let full = 0..self.indices.len();
        self.build_node(full, 0);
        self.arena
    }

    fn build_node(&mut self, range: Range<usize>, depth: usize) -> NodeIndex {
        let n_samples = range.len();
        let mut class_counts = vec![0usize; self.dataset.n_classes()];
        for &obs in &self.indices[range.clone()] {
            class_counts[self.dataset.label(obs)] += 1;
        }

        let pure = class_counts.iter().filter(|&&c| c > 0).count() <= 1;
        let too_small = n_samples <= self.settings.min_parent;
        let depth_reached = self.settings.max_depth.is_some_and(|max| depth >= max);

        if pure || too_small || depth_reached {
            return self.push_leaf(&class_counts, depth, n_samples);
        }

        let Some((projection, cut)) = self.best_split(range.clone(), &class_counts) else {
            return self.push_leaf(&class_counts, depth, n_samples);
        };

        let n_left = self.partition(range.clone(), &projection, cut.value);
        assert!(
            n_left == cut.n_left,
            "partition sent {n_left} observations left, split evaluation expected {}",
            cut.n_left
        );
        let mid = range.start + n_left;

        // Reserve the parent slot so the arena stays in pre-order.
        let node_idx = self.arena.len();
        self.arena.push(Node::Leaf {
            class: 0,
            depth,
            n_samples,
        });

        let left = self.build_node(range.start..mid, depth + 1);
        let right = self.build_node(mid..range.end, depth + 1);

        self.arena[node_idx] = Node::Internal {
            projection,
            cut_value: cut.value,
            left,
            right,
            depth,
            n_samples,
            impurity_decrease: cut.score,
        };
        NodeIndex::new(node_idx)
    }

    /// Score every candidate on the range and keep the first best one.
    fn best_split(
        &mut self,
        range: Range<usize>,
        class_counts: &[usize],
    ) -> Option<(SplitCandidate, CutThreshold)> {
        let candidates = generate_candidates(
            self.dataset.n_features(),
            self.settings.mtry,
            self.settings.n_draws,
            &self.settings.forest_type,
            self.rng,
        );

        let mut best: Option<(SplitCandidate, CutThreshold)> = None;
        for candidate in candidates {
            self.pairs.clear();
            for &obs in &self.indices[range.clone()] {
                let value = project_terms(candidate.terms(), |f| self.dataset.value(f, obs));
                self.pairs.push(LabeledValue::new(self.dataset.label(obs), value));
            }
            self.pairs.sort_by(|a, b| a.value.total_cmp(&b.value));

            let Some(cut) = evaluate_split(&self.pairs, class_counts, self.settings.criterion)
            else {
                continue;
            };
            if best.as_ref().is_none_or(|(_, b)| cut.score > b.score) {
                let perfect = cut.is_perfect;
                best = Some((candidate, cut));
                if perfect {
                    break;
                }
            }
        }
        best
    }

    /// Stable partition of `range` by `projection < cut`; returns the left count.
    fn partition(&mut self, range: Range<usize>, projection: &SplitCandidate, cut: f64) -> usize {
        let dataset = self.dataset;
        let (left, right): (Vec<usize>, Vec<usize>) = self.indices[range.clone()]
            .iter()
            .partition(|&&obs| project_terms(projection.terms(), |f| dataset.value(f, obs)) < cut);

        let mid = range.start + left.len();
        self.indices[range.start..mid].copy_from_slice(&left);
        self.indices[mid..range.end].copy_from_slice(&right);
        left.len()
    }

    fn push_leaf(&mut self, class_counts: &[usize], depth: usize, n_samples: usize) -> NodeIndex {
        let idx = self.arena.len();
        self.arena.push(Node::Leaf {
            class: majority_class(class_counts),
            depth,
            n_samples,
        });
        NodeIndex::new(idx)
    }
}

/// Class with the highest count; the lowest class id wins ties.
pub(crate) fn majority_class(class_counts: &[usize]) -> usize {
    let mut best = 0;
    for (class, &count) in class_counts.iter().enumerate() {
        if count > class_counts[best] {
            best = class;
        }
    }
    best
}
