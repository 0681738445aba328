//! CSV loading, prediction output, and JSON reports for rerf.

mod error;
mod reader;
mod report;
mod writer;

pub use error::IoError;
pub use reader::{DatasetReader, LabeledTable};
pub use report::{InspectReport, PredictionReport, TrainingReport};
pub use writer::{write_json, write_predictions};
