use std::path::Path;
use thiserror::Error;

const SYMMETRY_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Invalid distance '{value}' at row {row}, column {column}")]
    Parse {
        row: usize,
        column: usize,
        value: String,
    },
    #[error("Matrix is not square: row {row} has {found} value(s), expected {expected}")]
    NotSquare {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Matrix is not symmetric at ({row}, {column})")]
    Asymmetric { row: usize, column: usize },
}

/// Square, symmetric matrix of pairwise frame distances with a zero diagonal.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    size: usize,
    values: Vec<f64>,
}

impl DistanceMatrix {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            values: vec![0.0; size * size],
        }
    }

    /// Builds a matrix from full rows, validating shape, values and symmetry.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, MatrixError> {
        let size = rows.len();
        let mut values = Vec::with_capacity(size * size);
        for (row, entries) in rows.into_iter().enumerate() {
            if entries.len() != size {
                return Err(MatrixError::NotSquare {
                    row,
                    expected: size,
                    found: entries.len(),
                });
            }
            for (column, &value) in entries.iter().enumerate() {
                if !value.is_finite() || value < 0.0 {
                    return Err(MatrixError::Parse {
                        row,
                        column,
                        value: value.to_string(),
                    });
                }
            }
            values.extend(entries);
        }

        let matrix = Self { size, values };
        matrix.check_symmetry()?;
        Ok(matrix)
    }

    fn check_symmetry(&self) -> Result<(), MatrixError> {
        for row in 0..self.size {
            if self.values[row * self.size + row] > SYMMETRY_TOLERANCE {
                return Err(MatrixError::Asymmetric { row, column: row });
            }
            for column in (row + 1)..self.size {
                let upper = self.values[row * self.size + column];
                let lower = self.values[column * self.size + row];
                if (upper - lower).abs() > SYMMETRY_TOLERANCE * upper.abs().max(1.0) {
                    return Err(MatrixError::Asymmetric { row, column });
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        if i < self.size && j < self.size {
            Some(self.values[i * self.size + j])
        } else {
            None
        }
    }

    /// Stores `value` at both `(i, j)` and `(j, i)`. Out-of-range indices are ignored.
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        if i < self.size && j < self.size {
            self.values[i * self.size + j] = value;
            self.values[j * self.size + i] = value;
        }
    }

    pub fn row(&self, i: usize) -> Option<&[f64]> {
        (i < self.size).then(|| &self.values[i * self.size..(i + 1) * self.size])
    }

    /// Writes the matrix as headerless CSV, one row per line.
    pub fn save_csv(&self, path: &Path) -> Result<(), MatrixError> {
        let path_str = path.to_string_lossy().to_string();
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .map_err(|e| MatrixError::Csv {
                path: path_str.clone(),
                source: e,
            })?;

        for i in 0..self.size {
            let row = &self.values[i * self.size..(i + 1) * self.size];
            writer
                .write_record(row.iter().map(|value| value.to_string()))
                .map_err(|e| MatrixError::Csv {
                    path: path_str.clone(),
                    source: e,
                })?;
        }
        writer.flush().map_err(|e| MatrixError::Io {
            path: path_str,
            source: e,
        })
    }

    /// Reads a headerless CSV matrix written by [`DistanceMatrix::save_csv`] or any tool
    /// producing the same layout.
    pub fn load_csv(path: &Path) -> Result<Self, MatrixError> {
        let path_str = path.to_string_lossy().to_string();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| MatrixError::Csv {
                path: path_str.clone(),
                source: e,
            })?;

        let mut rows = Vec::new();
        for (row, result) in reader.records().enumerate() {
            let record = result.map_err(|e| MatrixError::Csv {
                path: path_str.clone(),
                source: e,
            })?;
            let values = record
                .iter()
                .enumerate()
                .map(|(column, field)| {
                    field.parse::<f64>().map_err(|_| MatrixError::Parse {
                        row,
                        column,
                        value: field.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(values);
        }
        Self::from_rows(rows)
    }
}
