use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use rerf_forest::{
    ForestConfig, ForestType, LabelBase, Mtry, OobMode, PackOrder, PackedForest, SplitCriterion,
    WeightSet,
};
use rerf_io::{
    DatasetReader, InspectReport, PredictionReport, TrainingReport, write_json, write_predictions,
};

#[derive(Parser)]
#[command(name = "rerf")]
#[command(about = "Grow Randomer Forests and predict from a packed forest file")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Forest growth parameters for `train`.
#[derive(Args, Debug, Clone)]
struct ForestArgs {
    /// Number of trees in the forest
    #[arg(long, default_value_t = 100)]
    trees: usize,

    /// Split candidates tried per node (defaults to floor(sqrt(n_features)))
    #[arg(long, conflicts_with = "mtry_fraction")]
    mtry: Option<usize>,

    /// Split candidates per node as a fraction of the feature count
    #[arg(long)]
    mtry_fraction: Option<f64>,

    /// Randomer feature draws per node as a multiple of mtry
    #[arg(long, default_value_t = 1.0)]
    mtry_mult: f64,

    /// Candidate family: "classic" or "randomer"
    #[arg(long, default_value = "classic")]
    forest_type: String,

    /// Comma-separated projection weights for randomer forests
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    weights: Vec<f64>,

    /// Nodes with at most this many observations become leaves
    #[arg(long, default_value_t = 1)]
    min_parent: usize,

    /// Maximum tree depth; 0 grows single-leaf trees (unlimited if not set)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Split criterion: "gini" or "entropy"
    #[arg(long, default_value = "gini")]
    criterion: String,

    /// Compute the out-of-bag accuracy estimate
    #[arg(long, default_value_t = false)]
    oob: bool,

    /// Extra parameters by name, e.g. `--param minParent=5`
    #[arg(long = "param", value_parser = parse_key_val)]
    params: Vec<(String, String)>,
}

#[derive(Subcommand)]
enum Command {
    /// Train a forest on a labeled CSV and write the packed model
    Train {
        /// Path to the training CSV file
        #[arg(long)]
        data: PathBuf,

        /// Zero-based column holding the class labels
        #[arg(long)]
        label_column: usize,

        /// Path of the packed model to write
        #[arg(long)]
        model: PathBuf,

        /// Node order in the packed model: "pre-order" or "hot-child-first"
        #[arg(long, default_value = "pre-order")]
        pack_order: String,

        /// Also write the JSON training summary to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Input CSV has no header row
        #[arg(long, default_value_t = false)]
        no_headers: bool,

        #[command(flatten)]
        forest: ForestArgs,
    },

    /// Predict classes for a CSV with a packed model
    Predict {
        /// Path to the packed model
        #[arg(long)]
        model: PathBuf,

        /// Path to the input CSV file
        #[arg(long)]
        data: PathBuf,

        /// Zero-based label column; enables the error rate
        #[arg(long)]
        label_column: Option<usize>,

        /// Path of the predictions CSV to write
        #[arg(long)]
        output: PathBuf,

        /// Report classes as 1..=n_classes instead of 0..n_classes
        #[arg(long, default_value_t = false)]
        one_based: bool,

        /// Input CSV has no header row
        #[arg(long, default_value_t = false)]
        no_headers: bool,
    },

    /// Print the layout of a packed model
    Inspect {
        /// Path to the packed model
        #[arg(long)]
        model: PathBuf,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got `{s}`"))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

fn parse_forest_type(s: &str, weights: &[f64]) -> Result<ForestType> {
    match s {
        "classic" => {
            if !weights.is_empty() {
                anyhow::bail!("--weights only applies to randomer forests");
            }
            Ok(ForestType::Classic)
        }
        "randomer" if weights.is_empty() => Ok(ForestType::randomer()),
        "randomer" => Ok(ForestType::Randomer {
            weights: WeightSet::new(weights.to_vec())?,
        }),
        other => anyhow::bail!("unknown forest type: {other} (expected classic or randomer)"),
    }
}

fn parse_criterion(s: &str) -> Result<SplitCriterion> {
    match s {
        "gini" => Ok(SplitCriterion::Gini),
        "entropy" => Ok(SplitCriterion::Entropy),
        other => anyhow::bail!("unknown criterion: {other} (expected gini or entropy)"),
    }
}

fn parse_pack_order(s: &str) -> Result<PackOrder> {
    match s {
        "pre-order" => Ok(PackOrder::PreOrder),
        "hot-child-first" => Ok(PackOrder::HotChildFirst),
        other => {
            anyhow::bail!("unknown pack order: {other} (expected pre-order or hot-child-first)")
        }
    }
}

fn build_config(args: &ForestArgs, seed: u64) -> Result<ForestConfig> {
    let mtry = match (args.mtry, args.mtry_fraction) {
        (Some(n), _) => Mtry::Fixed(n),
        (None, Some(fraction)) => Mtry::Fraction(fraction),
        (None, None) => Mtry::Sqrt,
    };
    let mut config = ForestConfig::new(args.trees)?
        .with_mtry(mtry)
        .with_mtry_mult(args.mtry_mult)
        .with_forest_type(parse_forest_type(&args.forest_type, &args.weights)?)
        .with_min_parent(args.min_parent)
        .with_max_depth(args.max_depth)
        .with_criterion(parse_criterion(&args.criterion)?)
        .with_seed(seed)
        .with_oob_mode(if args.oob {
            OobMode::Enabled
        } else {
            OobMode::Disabled
        });
    for (name, value) in &args.params {
        config = config
            .with_parameter(name, value)
            .with_context(|| format!("invalid --param {name}={value}"))?;
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configure Rayon thread pool
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Train {
            data,
            label_column,
            model,
            pack_order,
            report,
            no_headers,
            forest,
        } => {
            let pack_order = parse_pack_order(&pack_order)?;
            let config = build_config(&forest, cli.seed)?;

            // Read dataset
            let table = DatasetReader::new(&data)
                .with_label_column(Some(label_column))
                .with_headers(!no_headers)
                .read()
                .context("failed to read training CSV")?;
            let dataset = table.to_dataset().context("failed to build dataset")?;

            // Train, pack, save
            let trained = config.fit(&dataset).context("training failed")?;
            let packed = PackedForest::pack(trained.forest(), pack_order);
            packed
                .save(&model)
                .with_context(|| format!("failed to write model {}", model.display()))?;

            let summary = TrainingReport::new(model, config.forest_type(), pack_order, &trained);
            if let Some(report) = report {
                write_json(&report, &summary)?;
            }
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Predict {
            model,
            data,
            label_column,
            output,
            one_based,
            no_headers,
        } => {
            let packed = PackedForest::load(&model)
                .with_context(|| format!("failed to load model {}", model.display()))?;
            let table = DatasetReader::new(&data)
                .with_label_column(label_column)
                .with_headers(!no_headers)
                .read()
                .context("failed to read input CSV")?;

            let n_threads = rayon::current_num_threads();
            let predictions = packed
                .predict_batch(&table.rows, n_threads)
                .context("prediction failed")?;

            let error_rate = match table.labels {
                Some(_) => {
                    let dataset = table.to_dataset().context("failed to build dataset")?;
                    Some(packed.error_rate(&dataset, n_threads)?)
                }
                None => None,
            };

            let base = if one_based {
                LabelBase::OneBased
            } else {
                LabelBase::ZeroBased
            };
            write_predictions(&output, &predictions, base)?;

            let summary = PredictionReport {
                model,
                n_rows: predictions.len(),
                output: Some(output),
                error_rate,
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Inspect { model } => {
            let packed = PackedForest::load(&model)
                .with_context(|| format!("failed to load model {}", model.display()))?;
            let summary = InspectReport::new(model, &packed);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
