use std::path::PathBuf;

/// Errors from forest configuration, training, packing and prediction.
#[derive(Debug, thiserror::Error)]
pub enum RerfError {
    // --- Configuration ---
    /// Returned when n_trees is zero.
    #[error("n_trees must be at least 1, got {n_trees}")]
    InvalidTreeCount {
        /// The invalid n_trees value provided.
        n_trees: usize,
    },

    /// Returned when mtry resolves to 0, or exceeds n_features for a classic forest.
    #[error("mtry resolved to {mtry}, but must be in [1, {limit}]")]
    InvalidMtry {
        /// The resolved mtry value.
        mtry: usize,
        /// Largest mtry accepted for this forest type.
        limit: usize,
    },

    /// Returned when a fractional mtry is not in (0.0, 1.0].
    #[error("fraction of features to test must be in (0.0, 1.0], got {fraction}")]
    InvalidMtryFraction {
        /// The invalid fraction.
        fraction: f64,
    },

    /// Returned when min_parent is zero.
    #[error("min_parent must be at least 1, got {min_parent}")]
    InvalidMinParent {
        /// The invalid min_parent value provided.
        min_parent: usize,
    },

    /// Returned when the Randomer draw multiplier is not positive, not
    /// finite, or above the feature count.
    #[error("mtry multiplier must be finite and in (0, n_features], got {mtry_mult}")]
    InvalidMtryMult {
        /// The rejected multiplier.
        mtry_mult: f64,
    },

    /// Returned when a thread count of zero is requested.
    #[error("thread count must be at least 1, got {n_threads}")]
    InvalidThreadCount {
        /// The invalid thread count.
        n_threads: usize,
    },

    /// Returned when a projection weight set is empty or holds a zero or non-finite weight.
    #[error("invalid projection weight set {weights:?}: {reason}")]
    InvalidWeightSet {
        /// The rejected weights.
        weights: Vec<f64>,
        /// Why the set was rejected.
        reason: &'static str,
    },

    /// Returned when a parameter name is not recognized.
    #[error("unknown parameter \"{name}\"")]
    UnknownParameter {
        /// The unrecognized parameter name.
        name: String,
    },

    /// Returned when a parameter value cannot be parsed.
    #[error("invalid value \"{value}\" for parameter \"{name}\"")]
    InvalidParameterValue {
        /// The parameter name.
        name: String,
        /// The raw value that failed to parse.
        value: String,
    },

    /// Returned when the worker pool cannot be created.
    #[error("failed to build a thread pool with {n_threads} threads")]
    ThreadPool {
        /// Requested number of worker threads.
        n_threads: usize,
        /// The underlying rayon error.
        source: rayon::ThreadPoolBuildError,
    },

    // --- Data ---
    /// Returned when the dataset has zero rows.
    #[error("dataset has zero observations")]
    EmptyDataset,

    /// Returned when the dataset has zero feature columns.
    #[error("dataset has zero feature columns")]
    ZeroFeatures,

    /// Returned when a row has a different number of features than expected.
    #[error("observation {row} has {got} features, expected {expected}")]
    FeatureCountMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the row.
        got: usize,
        /// The zero-based index of the offending row.
        row: usize,
    },

    /// Returned when a feature value is NaN or infinite.
    #[error("non-finite value at observation {row}, feature {feature}")]
    NonFiniteValue {
        /// The zero-based index of the offending row.
        row: usize,
        /// The zero-based index of the offending feature column.
        feature: usize,
    },

    /// Returned when the label vector length differs from the number of rows.
    #[error("got {n_labels} labels for {n_rows} observations")]
    LabelCountMismatch {
        /// Number of labels supplied.
        n_labels: usize,
        /// Number of feature rows supplied.
        n_rows: usize,
    },

    /// Returned when a label is outside `[0, n_classes)`.
    #[error("label {label} at observation {row} is outside [0, {n_classes})")]
    LabelOutOfRange {
        /// The offending label.
        label: usize,
        /// The zero-based index of the offending row.
        row: usize,
        /// Declared number of classes.
        n_classes: usize,
    },

    /// Returned when a prediction input has the wrong number of features.
    #[error("prediction input has {got} features, expected {expected}")]
    PredictionFeatureMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the prediction input.
        got: usize,
    },

    // --- Packed format ---
    /// Returned when the input does not start with the packed-forest magic bytes.
    #[error("not a packed forest: bad magic {found:?}")]
    BadMagic {
        /// The first four bytes found.
        found: [u8; 4],
    },

    /// Returned when the packed layout version is not supported by this build.
    #[error("unsupported packed forest version {major}.{minor}, expected {expected_major}.x")]
    UnsupportedVersion {
        /// Major version found in the header.
        major: u16,
        /// Minor version found in the header.
        minor: u16,
        /// Major version this build reads.
        expected_major: u16,
    },

    /// Returned when the byte stream ends before the declared content.
    #[error("packed forest truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes required by the header.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// Returned when bytes remain after the declared content.
    #[error("packed forest has {extra} trailing bytes")]
    TrailingBytes {
        /// Number of unexpected bytes.
        extra: usize,
    },

    /// Returned when a record references something outside the forest.
    #[error("corrupt packed forest record {record}: {reason}")]
    CorruptRecord {
        /// Index of the offending node or root entry.
        record: usize,
        /// What is wrong with it.
        reason: String,
    },

    // --- I/O ---
    /// Returned when writing a packed forest file fails.
    #[error("failed to write packed forest to {path}")]
    WriteForest {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading a packed forest file fails.
    #[error("failed to read packed forest from {path}")]
    ReadForest {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
