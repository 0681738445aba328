//! CSV reader for labeled or unlabeled numeric tables.

use std::path::{Path, PathBuf};

use rerf_forest::Dataset;
use tracing::{debug, info, instrument};

use crate::IoError;

/// A parsed numeric table, optionally with a class label per row.
#[derive(Debug, Clone)]
pub struct LabeledTable {
    /// Source file.
    pub path: PathBuf,
    /// Feature column names, in column order, label column excluded.
    pub feature_names: Vec<String>,
    /// Feature values: `rows[observation][feature]`.
    pub rows: Vec<Vec<f64>>,
    /// One class id per row when a label column was configured.
    pub labels: Option<Vec<usize>>,
}

impl LabeledTable {
    /// Number of data rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Build a training [`Dataset`] from the table.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingLabels`] if the table was read without a
    /// label column, or [`IoError::InvalidDataset`] if the dataset is rejected.
    pub fn to_dataset(&self) -> Result<Dataset, IoError> {
        let labels = self.labels.as_ref().ok_or_else(|| IoError::MissingLabels {
            path: self.path.clone(),
        })?;
        Dataset::from_rows(&self.rows, labels).map_err(|source| IoError::InvalidDataset {
            path: self.path.clone(),
            source,
        })
    }
}

/// Reads a numeric CSV table.
///
/// Expected CSV format:
/// - Optional header row (feature names); on by default
/// - Every other cell is a finite float
/// - The label column, if configured, holds non-negative integer class ids
///   (`2` and `2.0` are both accepted)
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::EmptyDataset`] | Zero data rows |
/// | [`IoError::NoFeatureColumns`] | No column left besides the label |
/// | [`IoError::LabelColumnOutOfRange`] | Label column past the last column |
/// | [`IoError::InconsistentRowLength`] | Row has a different column count |
/// | [`IoError::NonFiniteValue`] | Cell is NaN, Inf, or unparseable float |
/// | [`IoError::InvalidLabel`] | Label cell is not a non-negative integer |
pub struct DatasetReader {
    path: PathBuf,
    label_column: Option<usize>,
    has_headers: bool,
}

impl DatasetReader {
    /// Create a new reader for the given CSV file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            label_column: None,
            has_headers: true,
        }
    }

    /// Read class labels from the zero-based column `column`.
    #[must_use]
    pub fn with_label_column(mut self, column: Option<usize>) -> Self {
        self.label_column = column;
        self
    }

    /// Whether the first row holds column names.
    #[must_use]
    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }

    /// Read and validate the CSV file.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<LabeledTable, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // Row-length mismatches are reported by the loop below.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(self.has_headers)
            .flexible(true)
            .from_reader(file);

        let header: Option<Vec<String>> = if self.has_headers {
            let record = rdr.headers().map_err(|e| self.csv_error(e))?;
            Some(record.iter().map(String::from).collect())
        } else {
            None
        };

        let mut expected_cols = header.as_ref().map(Vec::len);
        let mut rows = Vec::new();
        let mut labels = self.label_column.map(|_| Vec::new());

        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.csv_error(e))?;
            let expected = *expected_cols.get_or_insert(record.len());
            if record.len() != expected {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected,
                    got: record.len(),
                });
            }
            self.check_columns(expected)?;

            let mut row = Vec::with_capacity(expected);
            for (col_index, raw) in record.iter().enumerate() {
                if Some(col_index) == self.label_column {
                    if let Some(labels) = labels.as_mut() {
                        labels.push(self.parse_label(raw, row_index)?);
                    }
                    continue;
                }
                row.push(self.parse_value(raw, row_index, col_index)?);
            }
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        let n_cols = expected_cols.unwrap_or(0);
        let feature_names: Vec<String> = match header {
            Some(names) => names
                .into_iter()
                .enumerate()
                .filter(|&(i, _)| Some(i) != self.label_column)
                .map(|(_, name)| name)
                .collect(),
            None => (0..n_cols)
                .filter(|&i| Some(i) != self.label_column)
                .map(|i| format!("f{i}"))
                .collect(),
        };
        debug!(n_columns = n_cols, "columns resolved");

        info!(
            n_rows = rows.len(),
            n_features = feature_names.len(),
            labeled = labels.is_some(),
            "table loaded"
        );

        Ok(LabeledTable {
            path: self.path.clone(),
            feature_names,
            rows,
            labels,
        })
    }

    fn check_columns(&self, n_columns: usize) -> Result<(), IoError> {
        if let Some(label_column) = self.label_column
            && label_column >= n_columns
        {
            return Err(IoError::LabelColumnOutOfRange {
                path: self.path.clone(),
                label_column,
                n_columns,
            });
        }
        let n_features = n_columns - usize::from(self.label_column.is_some());
        if n_features == 0 {
            return Err(IoError::NoFeatureColumns {
                path: self.path.clone(),
            });
        }
        Ok(())
    }

    fn parse_value(&self, raw: &str, row_index: usize, col_index: usize) -> Result<f64, IoError> {
        let non_finite = || IoError::NonFiniteValue {
            path: self.path.clone(),
            row_index,
            col_index,
            raw: raw.to_string(),
        };
        let value: f64 = raw.trim().parse().map_err(|_| non_finite())?;
        if !value.is_finite() {
            return Err(non_finite());
        }
        Ok(value)
    }

    fn parse_label(&self, raw: &str, row_index: usize) -> Result<usize, IoError> {
        let trimmed = raw.trim();
        if let Ok(label) = trimmed.parse::<usize>() {
            return Ok(label);
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64 => Ok(v as usize),
            _ => Err(IoError::InvalidLabel {
                path: self.path.clone(),
                row_index,
                raw: raw.to_string(),
            }),
        }
    }

    fn csv_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn read_labeled_table() {
        let f = write_csv("a,b,class\n1.0,2.0,0\n3.0,4.0,1\n5.0,6.0,2\n");
        let table = DatasetReader::new(f.path())
            .with_label_column(Some(2))
            .read()
            .unwrap();
        assert_eq!(table.feature_names, vec!["a", "b"]);
        assert_eq!(table.rows, vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]);
        assert_eq!(table.labels, Some(vec![0, 1, 2]));
        let ds = table.to_dataset().unwrap();
        assert_eq!(ds.n_classes(), 3);
        assert_eq!(ds.n_features(), 2);
    }

    #[test]
    fn label_column_may_come_first() {
        let f = write_csv("1,0.5,0.25\n0,1.5,2.5\n");
        let table = DatasetReader::new(f.path())
            .with_headers(false)
            .with_label_column(Some(0))
            .read()
            .unwrap();
        assert_eq!(table.feature_names, vec!["f1", "f2"]);
        assert_eq!(table.rows[1], vec![1.5, 2.5]);
        assert_eq!(table.labels, Some(vec![1, 0]));
    }

    #[test]
    fn unlabeled_table_keeps_every_column() {
        let f = write_csv("x,y\n1,2\n3,4\n");
        let table = DatasetReader::new(f.path()).read().unwrap();
        assert_eq!(table.n_rows(), 2);
        assert!(table.labels.is_none());
        assert!(matches!(table.to_dataset(), Err(IoError::MissingLabels { .. })));
    }

    #[test]
    fn integral_float_labels_accepted() {
        let f = write_csv("x,y\n1.0,2.0\n3.0,1\n");
        let table = DatasetReader::new(f.path())
            .with_label_column(Some(1))
            .read()
            .unwrap();
        assert_eq!(table.labels, Some(vec![2, 1]));
    }

    #[test]
    fn error_file_not_found() {
        let result = DatasetReader::new(Path::new("/nonexistent/file.csv")).read();
        assert!(matches!(result, Err(IoError::FileNotFound { .. })));
    }

    #[test]
    fn error_empty_dataset() {
        let f = write_csv("a,b,c\n");
        let result = DatasetReader::new(f.path()).read();
        assert!(matches!(result, Err(IoError::EmptyDataset { .. })));
    }

    #[test]
    fn error_inconsistent_row_length() {
        let f = write_csv("a,b,c\n1.0,2.0,3.0\n1.0,2.0\n");
        let result = DatasetReader::new(f.path()).read();
        assert!(matches!(
            result,
            Err(IoError::InconsistentRowLength { row_index: 1, .. })
        ));
    }

    #[test]
    fn error_non_finite_values() {
        for bad in ["NaN", "inf", "abc"] {
            let f = write_csv(&format!("a,b\n1.0,{bad}\n"));
            let result = DatasetReader::new(f.path()).read();
            assert!(
                matches!(result, Err(IoError::NonFiniteValue { col_index: 1, .. })),
                "{bad} accepted"
            );
        }
    }

    #[test]
    fn error_bad_label() {
        for bad in ["-1", "1.5", "cat"] {
            let f = write_csv(&format!("a,label\n1.0,{bad}\n"));
            let result = DatasetReader::new(f.path()).with_label_column(Some(1)).read();
            assert!(matches!(result, Err(IoError::InvalidLabel { .. })), "{bad} accepted");
        }
    }

    #[test]
    fn error_label_column_out_of_range() {
        let f = write_csv("a,b\n1.0,2.0\n");
        let result = DatasetReader::new(f.path()).with_label_column(Some(5)).read();
        assert!(matches!(
            result,
            Err(IoError::LabelColumnOutOfRange {
                label_column: 5,
                n_columns: 2,
                ..
            })
        ));
    }

    #[test]
    fn error_label_only() {
        let f = write_csv("label\n1\n");
        let result = DatasetReader::new(f.path()).with_label_column(Some(0)).read();
        assert!(matches!(result, Err(IoError::NoFeatureColumns { .. })));
    }
}
