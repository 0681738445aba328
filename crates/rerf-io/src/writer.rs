//! Prediction CSV and JSON report writers.

use std::fs;
use std::path::Path;

use rerf_forest::LabelBase;
use serde::Serialize;
use tracing::{info, instrument};

use crate::IoError;

/// Write one prediction per row as CSV with header `row,prediction`.
///
/// Class ids are shifted by `base` on the way out.
///
/// # Errors
///
/// Returns [`IoError::CsvWrite`] if the file cannot be created or written.
#[instrument(skip_all, fields(path = %path.display(), n_rows = predictions.len()))]
pub fn write_predictions(
    path: &Path,
    predictions: &[usize],
    base: LabelBase,
) -> Result<(), IoError> {
    let csv_error = |source| IoError::CsvWrite {
        path: path.to_path_buf(),
        source,
    };
    let mut wtr = csv::Writer::from_path(path).map_err(csv_error)?;
    wtr.write_record(["row", "prediction"]).map_err(csv_error)?;
    for (row, &class) in predictions.iter().enumerate() {
        wtr.write_record([row.to_string(), base.apply(class).to_string()])
            .map_err(csv_error)?;
    }
    wtr.flush().map_err(|e| IoError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    info!("predictions written");
    Ok(())
}

/// Write `value` as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`IoError::Json`] if encoding fails, or [`IoError::WriteFile`]
/// if the file cannot be written.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), IoError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| IoError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    fs::write(path, json).map_err(|e| IoError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    info!("report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn predictions_csv_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pred.csv");
        write_predictions(&path, &[0, 2, 1], LabelBase::ZeroBased).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "row,prediction\n0,0\n1,2\n2,1\n");
    }

    #[test]
    fn one_based_shifts_classes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pred.csv");
        write_predictions(&path, &[0, 1], LabelBase::OneBased).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "row,prediction\n0,1\n1,2\n");
    }

    #[test]
    fn json_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("r.json");
        write_json(&path, &serde_json::json!({"n": 3})).unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["n"], 3);
    }

    #[test]
    fn unwritable_path_reported() {
        let result = write_predictions(
            Path::new("/nonexistent/dir/pred.csv"),
            &[0],
            LabelBase::ZeroBased,
        );
        assert!(matches!(result, Err(IoError::CsvWrite { .. })));
    }
}
