//! Symmetric weight matrix: the sole input of a construction run.

use std::path::Path;

use crate::config::PmfgConfig;
use crate::error::{PmfgError, Result};

/// Dense `n x n` proximity matrix with node labels.
///
/// Off-diagonal entries are finite and symmetric within the tolerance given
/// at construction. The diagonal is never read.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightMatrix {
    labels: Vec<String>,
    size: usize,
    values: Vec<f64>,
}

impl WeightMatrix {
    pub fn new(labels: Vec<String>, rows: Vec<Vec<f64>>, tolerance: f64) -> Result<Self> {
        let size = rows.len();
        if size == 0 {
            return Err(PmfgError::input("weight matrix has no nodes"));
        }
        if labels.len() != size {
            return Err(PmfgError::input(format!(
                "{} labels for a matrix with {} rows",
                labels.len(),
                size
            )));
        }

        let mut values = Vec::with_capacity(size * size);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != size {
                return Err(PmfgError::input(format!(
                    "matrix is not square: row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    size
                )));
            }
            values.extend(row);
        }

        let matrix = Self {
            labels,
            size,
            values,
        };
        matrix.validate(tolerance)?;
        Ok(matrix)
    }

    /// Matrix whose labels are the node indices
    pub fn unlabeled(rows: Vec<Vec<f64>>, tolerance: f64) -> Result<Self> {
        let labels = (0..rows.len()).map(|i| i.to_string()).collect();
        Self::new(labels, rows, tolerance)
    }

    /// Average `rows` with its transpose before validating, the usual
    /// preparation for directed proximity measures.
    pub fn symmetrized(labels: Vec<String>, mut rows: Vec<Vec<f64>>, tolerance: f64) -> Result<Self> {
        let size = rows.len();
        if rows.iter().all(|row| row.len() == size) {
            for i in 0..size {
                for j in (i + 1)..size {
                    let mean = (rows[i][j] + rows[j][i]) / 2.0;
                    rows[i][j] = mean;
                    rows[j][i] = mean;
                }
            }
        }
        Self::new(labels, rows, tolerance)
    }

    fn validate(&self, tolerance: f64) -> Result<()> {
        for i in 0..self.size {
            for j in (i + 1)..self.size {
                let upper = self.values[i * self.size + j];
                let lower = self.values[j * self.size + i];
                if !upper.is_finite() || !lower.is_finite() {
                    return Err(PmfgError::input(format!(
                        "non-finite weight between {} and {}",
                        self.labels[i], self.labels[j]
                    )));
                }
                if (upper - lower).abs() > tolerance {
                    return Err(PmfgError::input(format!(
                        "matrix is not symmetric at ({}, {}): {} vs {}",
                        self.labels[i], self.labels[j], upper, lower
                    )));
                }
            }
        }
        Ok(())
    }

    /// Read a labeled matrix CSV: a header row of column labels (first cell
    /// ignored) followed by one `label, w_1, ..., w_n` row per node.
    /// Empty cells read as NaN.
    pub fn from_csv<P: AsRef<Path>>(path: P, config: &PmfgConfig) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path.as_ref())?;

        let labels: Vec<String> = reader
            .headers()?
            .iter()
            .skip(1)
            .map(|label| label.trim().to_string())
            .collect();

        let mut rows = Vec::with_capacity(labels.len());
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let row_label = record.get(0).unwrap_or_default().trim();
            match labels.get(rows.len()) {
                Some(expected) if expected == row_label => {}
                Some(expected) => {
                    return Err(PmfgError::input(format!(
                        "row {} is labeled '{}' but column {} is '{}'",
                        line + 2,
                        row_label,
                        rows.len() + 1,
                        expected
                    )))
                }
                None => {
                    return Err(PmfgError::input(format!(
                        "matrix is not square: more than {} rows",
                        labels.len()
                    )))
                }
            }

            let row = record
                .iter()
                .skip(1)
                .map(|field| parse_weight(field, line + 2))
                .collect::<Result<Vec<f64>>>()?;
            rows.push(row);
        }

        log::info!(
            "Read {}x{} weight matrix from {}",
            rows.len(),
            labels.len(),
            path.as_ref().display()
        );

        if rows.len() != labels.len() {
            return Err(PmfgError::input(format!(
                "matrix is not square: {} rows for {} columns",
                rows.len(),
                labels.len()
            )));
        }

        if config.symmetrize {
            Self::symmetrized(labels, rows, config.symmetry_tolerance)
        } else {
            Self::new(labels, rows, config.symmetry_tolerance)
        }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label(&self, node: usize) -> &str {
        &self.labels[node]
    }

    /// Upper-triangle weight of the unordered pair `{i, j}`
    pub fn weight(&self, i: usize, j: usize) -> f64 {
        let (a, b) = if i < j { (i, j) } else { (j, i) };
        self.values[a * self.size + b]
    }
}

fn parse_weight(field: &str, line: usize) -> Result<f64> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(f64::NAN);
    }
    field
        .parse::<f64>()
        .map_err(|_| PmfgError::input(format!("line {}: '{}' is not a number", line, field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn rows() -> Vec<Vec<f64>> {
        vec![
            vec![1.0, 0.9, 0.8],
            vec![0.9, 1.0, 0.7],
            vec![0.8, 0.7, 1.0],
        ]
    }

    #[test]
    fn test_new_and_weight() {
        let matrix = WeightMatrix::unlabeled(rows(), 1e-9).unwrap();
        assert_eq!(matrix.len(), 3);
        assert_eq!(matrix.weight(0, 1), 0.9);
        assert_eq!(matrix.weight(2, 1), 0.7);
        assert_eq!(matrix.label(2), "2");
    }

    #[test]
    fn test_diagonal_is_ignored() {
        let mut data = rows();
        data[1][1] = f64::NAN;
        assert!(WeightMatrix::unlabeled(data, 1e-9).is_ok());
    }

    #[test]
    fn test_rejects_empty() {
        let err = WeightMatrix::unlabeled(vec![], 1e-9).unwrap_err();
        assert!(matches!(err, PmfgError::Input { .. }));
    }

    #[test]
    fn test_rejects_non_square() {
        let data = vec![vec![0.0, 1.0], vec![1.0]];
        assert!(WeightMatrix::unlabeled(data, 1e-9).is_err());
    }

    #[test]
    fn test_rejects_asymmetric() {
        let mut data = rows();
        data[0][2] = 0.5;
        let err = WeightMatrix::unlabeled(data, 1e-3).unwrap_err();
        assert!(err.to_string().contains("not symmetric"));
    }

    #[test]
    fn test_rejects_non_finite() {
        let mut data = rows();
        data[0][1] = f64::INFINITY;
        data[1][0] = f64::INFINITY;
        let err = WeightMatrix::unlabeled(data, 1e-9).unwrap_err();
        assert!(err.to_string().contains("non-finite"));
    }

    #[test]
    fn test_symmetrized_averages() {
        let mut data = rows();
        data[0][2] = 0.6;
        let matrix = WeightMatrix::symmetrized(vec!["a".into(), "b".into(), "c".into()], data, 1e-9).unwrap();
        assert!((matrix.weight(0, 2) - 0.7).abs() < 1e-12);
        assert!((matrix.weight(2, 0) - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_from_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, ",BR,AR,CL").unwrap();
        writeln!(file, "BR,,0.5,0.25").unwrap();
        writeln!(file, "AR,0.5,,0.75").unwrap();
        writeln!(file, "CL,0.25,0.75,").unwrap();

        let matrix = WeightMatrix::from_csv(file.path(), &PmfgConfig::default()).unwrap();
        assert_eq!(matrix.labels(), &["BR", "AR", "CL"]);
        assert_eq!(matrix.weight(1, 2), 0.75);
    }

    #[test]
    fn test_from_csv_label_mismatch() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, ",a,b").unwrap();
        writeln!(file, "b,0,1").unwrap();
        writeln!(file, "a,1,0").unwrap();

        let err = WeightMatrix::from_csv(file.path(), &PmfgConfig::default()).unwrap_err();
        assert!(matches!(err, PmfgError::Input { .. }));
    }

    #[test]
    fn test_from_csv_symmetrize() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, ",a,b").unwrap();
        writeln!(file, "a,0,1").unwrap();
        writeln!(file, "b,3,0").unwrap();

        let strict = WeightMatrix::from_csv(file.path(), &PmfgConfig::default());
        assert!(strict.is_err());

        let config = PmfgConfig {
            symmetrize: true,
            ..PmfgConfig::default()
        };
        let matrix = WeightMatrix::from_csv(file.path(), &config).unwrap();
        assert_eq!(matrix.weight(0, 1), 2.0);
    }
}
