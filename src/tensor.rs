//! Dense row-major `f32` matrices for per-RoI network outputs.

use crate::util::{DetPostError, DetPostResult};

/// Row-major `rows x cols` matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    data: Vec<f32>,
    rows: usize,
    cols: usize,
}

impl Matrix {
    /// Wraps a flat buffer, checking that it holds exactly `rows * cols` values.
    pub fn new(data: Vec<f32>, rows: usize, cols: usize) -> DetPostResult<Self> {
        let expected = rows
            .checked_mul(cols)
            .ok_or(DetPostError::InvalidDimensions {
                width: cols,
                height: rows,
            })?;
        if data.len() != expected {
            return Err(DetPostError::ShapeMismatch {
                context: "matrix buffer",
                expected,
                got: data.len(),
            });
        }
        Ok(Self { data, rows, cols })
    }

    /// Builds a matrix from equally sized rows.
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R], cols: usize) -> DetPostResult<Self> {
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(DetPostError::ShapeMismatch {
                    context: "matrix row",
                    expected: cols,
                    got: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Self::new(data, rows.len(), cols)
    }

    /// Returns the number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Returns the number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns the flat buffer.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Returns row `r`.
    pub fn row(&self, r: usize) -> Option<&[f32]> {
        if r >= self.rows {
            return None;
        }
        self.data.get(r * self.cols..(r + 1) * self.cols)
    }

    /// Returns the value at `(r, c)`.
    pub fn get(&self, r: usize, c: usize) -> Option<f32> {
        if c >= self.cols {
            return None;
        }
        self.row(r).map(|row| row[c])
    }

    /// Returns a new matrix whose row `i` is row `indices[i]` of `self`.
    pub fn gather_rows(&self, indices: &[usize]) -> DetPostResult<Self> {
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &idx in indices {
            let row = self.row(idx).ok_or(DetPostError::IndexOutOfBounds {
                index: idx,
                len: self.rows,
                context: "matrix row",
            })?;
            data.extend_from_slice(row);
        }
        Ok(Self {
            data,
            rows: indices.len(),
            cols: self.cols,
        })
    }

    /// Checks the row count against what the caller sent to the network.
    pub(crate) fn expect_rows(&self, context: &'static str, expected: usize) -> DetPostResult<()> {
        if self.rows != expected {
            return Err(DetPostError::ShapeMismatch {
                context,
                expected,
                got: self.rows,
            });
        }
        Ok(())
    }

    /// Checks the column count.
    pub(crate) fn expect_cols(&self, context: &'static str, expected: usize) -> DetPostResult<()> {
        if self.cols != expected {
            return Err(DetPostError::ShapeMismatch {
                context,
                expected,
                got: self.cols,
            });
        }
        Ok(())
    }
}
