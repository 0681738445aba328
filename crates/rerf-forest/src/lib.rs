//! Randomer Forest classification: grow, pack, predict.
//!
//! Grows ensembles of randomized decision trees whose splits are either
//! single raw features (classic forest) or sparse signed combinations of
//! features (Randomer forest). Trees are grown in parallel via rayon, then
//! compiled into a flat, versioned binary layout ([`PackedForest`]) that is
//! traversed for parallel, cancellable batch prediction.

mod bootstrap;
mod builder;
mod candidate;
mod config;
mod dataset;
mod error;
mod forest;
mod node;
mod oob;
mod pack;
mod predict;
mod result;
mod rng;
mod split;
mod tree;

pub use bootstrap::{BootstrapSample, draw_bootstrap};
pub use candidate::{ForestType, ProjectionTerm, SplitCandidate, WeightSet, generate_candidates};
pub use config::{ForestConfig, Mtry, OobMode};
pub use dataset::Dataset;
pub use error::RerfError;
pub use forest::{Forest, ForestStats};
pub use node::{FeatureIndex, Impurity, Node, NodeIndex};
pub use oob::OobScore;
pub use pack::{
    HEADER_LEN, MAGIC, NODE_LEN, PackOrder, PackedForest, PackedNode, PackedTerm, TERM_LEN,
    VERSION_MAJOR, VERSION_MINOR,
};
pub use predict::{BatchPrediction, CancelToken, LabelBase};
pub use result::{TrainedForest, TrainingMetadata};
pub use rng::{SeedMode, TreeRng};
pub use split::{CutThreshold, LabeledValue, SplitCriterion, evaluate_split, midpoint};
pub use tree::{GrownTree, Tree};
