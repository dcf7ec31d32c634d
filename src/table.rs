//! Axis-indexed tables for cross-algorithm comparison
//!
//! A [`Table`] is indexed by x-axis value (ascending) with one column per
//! algorithm (or seed). Cells are `Option<f64>`: `None` is the explicit
//! "missing" sentinel for a column that has no value at, or before, that
//! index.
//!
//! ```text
//! xaxis | A1    A2    A3
//!   1   | 0.5   0.6   None
//!   3   | 0.4   None  0.2
//! ```

use crate::trace::sort_dedup;
use crate::{Error, Result};

/// Ordered mapping from index value to value, sorted by index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    points: Vec<(f64, f64)>,
}

impl Series {
    /// Create a series; points are sorted by index and, for a repeated
    /// index, the last point wins.
    #[must_use]
    pub fn new(mut points: Vec<(f64, f64)>) -> Self {
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        let points = points.into_iter().fold(Vec::<(f64, f64)>::new(), |mut acc, p| {
            match acc.last_mut() {
                Some(last) if last.0 == p.0 => *last = p,
                _ => acc.push(p),
            }
            acc
        });
        Self { points }
    }

    /// `(index, value)` pairs in index order.
    #[must_use]
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Index values in order.
    #[must_use]
    pub fn index(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.0).collect()
    }

    /// Values in index order.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.1).collect()
    }

    /// Value stored at exactly `x`.
    #[must_use]
    pub fn get(&self, x: f64) -> Option<f64> {
        self.points
            .binary_search_by(|p| p.0.total_cmp(&x))
            .ok()
            .map(|i| self.points[i].1)
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if the series has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Axis-indexed table with named columns and missing cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    index: Vec<f64>,
    columns: Vec<String>,
    rows: Vec<Vec<Option<f64>>>,
}

impl Table {
    /// Create a table from row-major cells.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the cell shape does not match the
    /// index and columns, or the index is not strictly ascending.
    pub fn new(index: Vec<f64>, columns: Vec<String>, rows: Vec<Vec<Option<f64>>>) -> Result<Self> {
        if rows.len() != index.len() || rows.iter().any(|row| row.len() != columns.len()) {
            return Err(Error::InvalidInput(format!(
                "table shape mismatch: {} index values, {} columns",
                index.len(),
                columns.len()
            )));
        }
        if index.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InvalidInput("table index must be strictly ascending".to_string()));
        }
        Ok(Self { index, columns, rows })
    }

    /// Align named series on the union of their indices, optionally extended
    /// with `extra_index`. Cells a series has no point for are missing.
    #[must_use]
    pub fn align(columns: Vec<(String, Series)>, extra_index: Option<&[f64]>) -> Self {
        let mut index: Vec<f64> = columns.iter().flat_map(|(_, s)| s.index()).collect();
        if let Some(extra) = extra_index {
            index.extend_from_slice(extra);
        }
        sort_dedup(&mut index);

        let rows: Vec<Vec<Option<f64>>> = index
            .iter()
            .map(|&x| columns.iter().map(|(_, s)| s.get(x)).collect())
            .collect();
        let names = columns.into_iter().map(|(name, _)| name).collect();

        Self {
            index,
            columns: names,
            rows,
        }
    }

    /// Index values, ascending.
    #[must_use]
    pub fn index(&self) -> &[f64] {
        &self.index
    }

    /// Column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Row-major cells.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Option<f64>>] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.index.len()
    }

    /// Number of columns.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Cells of the named column, in index order.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let col = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| row[col]).collect())
    }

    /// Cell at index value `x` in the named column.
    #[must_use]
    pub fn value_at(&self, x: f64, column: &str) -> Option<f64> {
        let col = self.columns.iter().position(|c| c == column)?;
        let row = self.index.binary_search_by(|v| v.total_cmp(&x)).ok()?;
        self.rows[row][col]
    }

    /// Propagate the last known value of each column forward along the index.
    /// Leading gaps stay missing.
    #[must_use]
    pub fn forward_fill(&self) -> Self {
        let mut last: Vec<Option<f64>> = vec![None; self.columns.len()];
        let rows: Vec<Vec<Option<f64>>> = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(last.iter_mut())
                    .map(|(cell, prev)| {
                        if cell.is_some() {
                            *prev = *cell;
                        }
                        *prev
                    })
                    .collect()
            })
            .collect();

        Self {
            rows,
            ..self.clone()
        }
    }

    /// Rank each row ascending (1 = lowest value) among its present cells.
    ///
    /// Tied values receive the mean of the ranks they jointly occupy; missing
    /// cells stay missing.
    #[must_use]
    pub fn rank_rows(&self) -> Self {
        let rows = self.rows.iter().map(|row| average_ranks(row)).collect();
        Self {
            rows,
            ..self.clone()
        }
    }

    /// Element-wise mean of tables sharing index and columns.
    ///
    /// A cell missing in any input is missing in the mean.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `tables` is empty or shapes differ.
    pub fn mean_of(tables: &[Self]) -> Result<Self> {
        let first = check_same_shape(tables)?;
        #[allow(clippy::cast_precision_loss)]
        let n = tables.len() as f64;

        let rows: Vec<Vec<Option<f64>>> = (0..first.num_rows())
            .map(|r| {
                (0..first.num_columns())
                    .map(|c| {
                        tables
                            .iter()
                            .map(|t| t.rows[r][c])
                            .sum::<Option<f64>>()
                            .map(|total| total / n)
                    })
                    .collect()
            })
            .collect();

        Ok(Self {
            rows,
            ..first.clone()
        })
    }

    /// Element-wise standard error of the mean across tables sharing index
    /// and columns (sample standard deviation over present cells divided by
    /// the square root of their count). Fewer than two present cells gives
    /// a missing result.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `tables` is empty or shapes differ.
    pub fn standard_error_of(tables: &[Self]) -> Result<Self> {
        let first = check_same_shape(tables)?;

        let rows: Vec<Vec<Option<f64>>> = (0..first.num_rows())
            .map(|r| {
                (0..first.num_columns())
                    .map(|c| {
                        let present: Vec<f64> =
                            tables.iter().filter_map(|t| t.rows[r][c]).collect();
                        standard_error(&present)
                    })
                    .collect()
            })
            .collect();

        Ok(Self {
            rows,
            ..first.clone()
        })
    }
}

fn check_same_shape(tables: &[Table]) -> Result<&Table> {
    let first = tables
        .first()
        .ok_or_else(|| Error::InvalidInput("cannot combine zero tables".to_string()))?;
    if tables
        .iter()
        .any(|t| t.index != first.index || t.columns != first.columns)
    {
        return Err(Error::InvalidInput(
            "tables must share index and columns".to_string(),
        ));
    }
    Ok(first)
}

/// Average ranks of the present, non-NaN cells of one row.
fn average_ranks(row: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut present: Vec<(usize, f64)> = row
        .iter()
        .enumerate()
        .filter_map(|(i, cell)| cell.filter(|v| !v.is_nan()).map(|v| (i, v)))
        .collect();
    present.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut ranks = vec![None; row.len()];
    let mut start = 0;
    while start < present.len() {
        let mut end = start + 1;
        while end < present.len() && present[end].1 == present[start].1 {
            end += 1;
        }
        // positions start..end hold ranks start+1 ..= end
        #[allow(clippy::cast_precision_loss)]
        let rank = (start + 1 + end) as f64 / 2.0;
        for &(col, _) in &present[start..end] {
            ranks[col] = Some(rank);
        }
        start = end;
    }
    ranks
}

#[allow(clippy::cast_precision_loss)]
fn standard_error(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(var.sqrt() / n.sqrt())
}
