//! Multi-series time alignment.
//!
//! Market series are outer-joined onto the union of their dates; a series
//! with no observation on a date gets NaN there (no fill at this stage).
//! Annual macro series are joined as-of onto that axis afterwards, so they
//! never add dates of their own.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use super::provider::MacroObservation;
use crate::config::MacroIndicator;
use crate::matrix::FeatureMatrix;
use crate::series::TimeSeries;

/// Align series on the union of their dates. Columns keep the caller's order
/// and are named after each series.
pub fn align_series(series: &[TimeSeries]) -> FeatureMatrix {
    let dates: Vec<NaiveDate> = series
        .iter()
        .flat_map(|s| s.dates().iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut matrix = FeatureMatrix::new(dates);
    for s in series {
        let values = matrix
            .dates()
            .iter()
            .map(|d| s.get(*d).unwrap_or(f64::NAN))
            .collect();
        matrix.push_column(s.name.clone(), values);
    }
    matrix
}

/// Add `series` as a column holding, for each row, its latest value on or
/// before that row's date.
pub fn asof_join(matrix: &mut FeatureMatrix, series: &TimeSeries) {
    let values = matrix
        .dates()
        .iter()
        .map(|d| series.asof(*d).unwrap_or(f64::NAN))
        .collect();
    matrix.push_column(series.name.clone(), values);
}

/// Group raw observations into one series per (indicator, country), named
/// `"<label> (<ISO3>)"`. Observations of unknown indicators are ignored.
pub fn macro_series(
    observations: &[MacroObservation],
    indicators: &[MacroIndicator],
) -> Vec<TimeSeries> {
    let mut grouped: BTreeMap<String, Vec<(NaiveDate, f64)>> = BTreeMap::new();
    for obs in observations {
        let Some(ind) = indicators.iter().find(|i| i.id == obs.indicator) else {
            continue;
        };
        grouped
            .entry(ind.column_name(&obs.country))
            .or_default()
            .push((obs.date, obs.value));
    }
    grouped
        .into_iter()
        .map(|(name, points)| TimeSeries::from_points(name, points))
        .collect()
}
