//! Date-indexed feature matrix.
//!
//! Rows are dates, columns are named series. Missing cells are `NaN`.
//! Columns are stored contiguously so per-column transforms stay cheap.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureMatrix {
    dates: Vec<NaiveDate>,
    columns: Vec<Column>,
}

impl FeatureMatrix {
    /// An empty matrix over the given (sorted, unique) date axis.
    pub fn new(dates: Vec<NaiveDate>) -> Self {
        debug_assert!(dates.windows(2).all(|w| w[0] < w[1]), "dates must be strictly ascending");
        Self {
            dates,
            columns: Vec::new(),
        }
    }

    /// Append a column. Replaces an existing column of the same name in place.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<f64>) {
        assert_eq!(
            values.len(),
            self.dates.len(),
            "column length must match the date axis"
        );
        let name = name.into();
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => self.columns.push(Column { name, values }),
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn nrows(&self) -> usize {
        self.dates.len()
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.columns.is_empty()
    }

    /// New matrix holding only the named columns, in the order given.
    /// Names that are not present are skipped.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> FeatureMatrix {
        let columns = names
            .iter()
            .filter_map(|n| self.columns.iter().find(|c| c.name == n.as_ref()).cloned())
            .collect();
        FeatureMatrix {
            dates: self.dates.clone(),
            columns,
        }
    }

    /// True if any column is missing a value on row `row`.
    pub fn row_has_missing(&self, row: usize) -> bool {
        self.columns.iter().any(|c| c.values[row].is_nan())
    }

    /// Count of cells that are missing.
    pub fn missing_count(&self) -> usize {
        self.columns
            .iter()
            .map(|c| c.values.iter().filter(|v| v.is_nan()).count())
            .sum()
    }

    /// Keep only the rows for which `keep(row)` is true.
    pub fn retain_rows(&mut self, keep: impl Fn(usize) -> bool) {
        let kept: Vec<usize> = (0..self.dates.len()).filter(|&i| keep(i)).collect();
        self.dates = kept.iter().map(|&i| self.dates[i]).collect();
        for column in &mut self.columns {
            column.values = kept.iter().map(|&i| column.values[i]).collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n).map(|i| base + chrono::Duration::days(i as i64)).collect()
    }

    #[test]
    fn push_and_lookup() {
        let mut m = FeatureMatrix::new(dates(3));
        m.push_column("A", vec![1.0, 2.0, 3.0]);
        m.push_column("B", vec![f64::NAN, 5.0, 6.0]);
        assert_eq!(m.ncols(), 2);
        assert_eq!(m.column("B").unwrap()[1], 5.0);
        assert!(m.row_has_missing(0));
        assert!(!m.row_has_missing(1));
        assert_eq!(m.missing_count(), 1);
    }

    #[test]
    fn push_replaces_same_name() {
        let mut m = FeatureMatrix::new(dates(2));
        m.push_column("A", vec![1.0, 2.0]);
        m.push_column("A", vec![3.0, 4.0]);
        assert_eq!(m.ncols(), 1);
        assert_eq!(m.column("A").unwrap(), &[3.0, 4.0]);
    }

    #[test]
    fn select_preserves_requested_order_and_skips_unknown() {
        let mut m = FeatureMatrix::new(dates(1));
        m.push_column("A", vec![1.0]);
        m.push_column("B", vec![2.0]);
        let s = m.select(&["B", "missing", "A"]);
        assert_eq!(s.column_names(), vec!["B", "A"]);
    }

    #[test]
    fn retain_rows_filters_dates_and_values() {
        let mut m = FeatureMatrix::new(dates(4));
        m.push_column("A", vec![1.0, 2.0, 3.0, 4.0]);
        m.retain_rows(|i| i % 2 == 1);
        assert_eq!(m.nrows(), 2);
        assert_eq!(m.column("A").unwrap(), &[2.0, 4.0]);
    }
}
