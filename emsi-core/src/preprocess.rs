//! Preprocessing: forward-fill, drop incomplete rows, standardize.
//!
//! Forward-filling treats gaps as non-trading days rather than true
//! missingness. Standardization is fit and applied in one pass over the rows
//! that survive the drop.

use chrono::NaiveDate;
use ndarray::Array2;
use thiserror::Error;

use crate::matrix::FeatureMatrix;
use crate::stats;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PreprocessError {
    #[error("insufficient data for {country}: no complete rows after forward-fill ({columns} columns)")]
    InsufficientData { country: String, columns: usize },

    #[error("no feature columns selected for {country}")]
    NoColumns { country: String },
}

/// A standardized, gap-free feature matrix ready for PCA.
#[derive(Debug, Clone)]
pub struct StandardizedMatrix {
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<String>,
    /// Row-major data, `dates.len()` x `columns.len()`.
    pub data: Array2<f64>,
    /// Per-column means removed during scaling.
    pub means: Vec<f64>,
    /// Per-column divisors (population std, or 1.0 for constant columns).
    pub scales: Vec<f64>,
}

impl StandardizedMatrix {
    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }
}

/// Propagate the last observed value of each column forward over gaps.
/// Leading gaps stay missing.
pub fn forward_fill(matrix: &mut FeatureMatrix) {
    for column in matrix.columns_mut() {
        column.values = stats::forward_fill(&column.values);
    }
}

/// Remove every row that still has a missing value in any column.
pub fn drop_missing_rows(matrix: &mut FeatureMatrix) {
    let keep: Vec<bool> = (0..matrix.nrows())
        .map(|i| !matrix.row_has_missing(i))
        .collect();
    matrix.retain_rows(|i| keep[i]);
}

/// Scale every column to zero mean and unit population variance.
pub fn standardize(matrix: &FeatureMatrix) -> StandardizedMatrix {
    let n = matrix.nrows();
    let p = matrix.ncols();
    let mut data = Array2::<f64>::zeros((n, p));
    let mut means = Vec::with_capacity(p);
    let mut scales = Vec::with_capacity(p);

    for (j, column) in matrix.columns().iter().enumerate() {
        let mean = stats::mean(&column.values);
        let std = stats::population_std(&column.values);
        let scale = if std > 0.0 && std.is_finite() { std } else { 1.0 };
        for (i, v) in column.values.iter().enumerate() {
            data[[i, j]] = (v - mean) / scale;
        }
        means.push(mean);
        scales.push(scale);
    }

    StandardizedMatrix {
        dates: matrix.dates().to_vec(),
        columns: matrix.column_names().into_iter().map(String::from).collect(),
        data,
        means,
        scales,
    }
}

/// Full preprocessing pass for one country's feature slice.
pub fn preprocess(
    country: &str,
    matrix: &FeatureMatrix,
) -> Result<StandardizedMatrix, PreprocessError> {
    if matrix.ncols() == 0 {
        return Err(PreprocessError::NoColumns {
            country: country.to_string(),
        });
    }

    let mut filled = matrix.clone();
    forward_fill(&mut filled);
    drop_missing_rows(&mut filled);

    if filled.nrows() == 0 {
        return Err(PreprocessError::InsufficientData {
            country: country.to_string(),
            columns: filled.ncols(),
        });
    }

    tracing::debug!(
        country,
        rows_in = matrix.nrows(),
        rows_kept = filled.nrows(),
        columns = filled.ncols(),
        "preprocessed feature slice"
    );

    Ok(standardize(&filled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{assert_approx, DEFAULT_EPSILON};

    fn dates(n: usize) -> Vec<NaiveDate> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n).map(|i| base + chrono::Duration::days(i as i64)).collect()
    }

    #[test]
    fn forward_fill_keeps_leading_gap() {
        let mut m = FeatureMatrix::new(dates(5));
        m.push_column("A", vec![f64::NAN, 1.0, f64::NAN, f64::NAN, 4.0]);
        forward_fill(&mut m);
        let a = m.column("A").unwrap();
        assert!(a[0].is_nan());
        assert_eq!(&a[1..], &[1.0, 1.0, 1.0, 4.0]);
    }

    #[test]
    fn drops_leading_incomplete_rows() {
        let mut m = FeatureMatrix::new(dates(4));
        m.push_column("A", vec![1.0, 2.0, 3.0, 4.0]);
        m.push_column("A_volatility", vec![f64::NAN, f64::NAN, 0.5, 0.6]);
        let out = preprocess("TST", &m).unwrap();
        assert_eq!(out.nrows(), 2);
        assert_eq!(out.dates, dates(4)[2..].to_vec());
    }

    #[test]
    fn standardized_columns_have_zero_mean_unit_std() {
        let mut m = FeatureMatrix::new(dates(6));
        m.push_column("A", vec![1.0, 3.0, 2.0, 8.0, 5.0, 4.0]);
        m.push_column("B", vec![10.0, 10.5, 9.0, 12.0, 11.0, 10.0]);
        let out = preprocess("TST", &m).unwrap();
        for j in 0..out.ncols() {
            let col: Vec<f64> = out.data.column(j).to_vec();
            assert_approx(stats::mean(&col), 0.0, DEFAULT_EPSILON);
            assert_approx(stats::population_std(&col), 1.0, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn constant_column_becomes_zero() {
        let mut m = FeatureMatrix::new(dates(3));
        m.push_column("A", vec![7.0, 7.0, 7.0]);
        let out = preprocess("TST", &m).unwrap();
        assert!(out.data.iter().all(|v| *v == 0.0));
        assert_eq!(out.scales, vec![1.0]);
    }

    #[test]
    fn no_complete_rows_is_insufficient_data() {
        let mut m = FeatureMatrix::new(dates(3));
        m.push_column("A", vec![1.0, 2.0, 3.0]);
        m.push_column("B", vec![f64::NAN; 3]);
        let err = preprocess("POL", &m).unwrap_err();
        assert_eq!(
            err,
            PreprocessError::InsufficientData {
                country: "POL".into(),
                columns: 2
            }
        );
        assert!(err.to_string().contains("insufficient data for POL"));
    }

    #[test]
    fn no_columns_is_an_error() {
        let m = FeatureMatrix::new(dates(3));
        assert!(matches!(
            preprocess("TST", &m),
            Err(PreprocessError::NoColumns { .. })
        ));
    }
}
