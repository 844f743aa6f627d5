//! Date-keyed numeric time series.
//!
//! One series per instrument. Dates are unique and sorted ascending; a missing
//! date is a gap, never a zero.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::stats;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub name: String,
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Build a series from unordered points. Later duplicates of a date win.
    pub fn from_points(
        name: impl Into<String>,
        points: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Self {
        let map: BTreeMap<NaiveDate, f64> = points.into_iter().collect();
        let (dates, values) = map.into_iter().unzip();
        Self {
            name: name.into(),
            dates,
            values,
        }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dates: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }

    /// Value on an exact date.
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|i| self.values[i])
    }

    /// Latest value observed on or before `date`.
    pub fn asof(&self, date: NaiveDate) -> Option<f64> {
        match self.dates.binary_search(&date) {
            Ok(i) => Some(self.values[i]),
            Err(0) => None,
            Err(i) => Some(self.values[i - 1]),
        }
    }

    /// Day-over-day percent change with the first (undefined) observation dropped.
    pub fn pct_change(&self) -> TimeSeries {
        let changes = stats::pct_change(&self.values);
        Self {
            name: self.name.clone(),
            dates: self.dates.iter().skip(1).copied().collect(),
            values: changes.into_iter().skip(1).collect(),
        }
    }

    /// Same dates, every value multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> TimeSeries {
        Self {
            name: self.name.clone(),
            dates: self.dates.clone(),
            values: self.values.iter().map(|v| v * factor).collect(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}
