//! Frozen CSV snapshots of provider data.
//!
//! Layout:
//! - `{dir}/prices/{SYMBOL}.csv` with columns `date,close`
//! - `{dir}/macro/{INDICATOR}.csv` with columns `country,date,value`
//!
//! Writes are atomic (write to .tmp, rename into place). A snapshot replays a
//! past download exactly, which makes runs reproducible offline.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::provider::{DataError, DataSource, MacroObservation, MacroProvider, PriceProvider};
use crate::series::TimeSeries;

#[derive(Debug, Serialize, Deserialize)]
struct PriceRow {
    date: NaiveDate,
    close: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct MacroRow {
    country: String,
    date: NaiveDate,
    value: f64,
}

/// A directory of CSV files that serves as both price and macro provider.
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn prices_path(&self, symbol: &str) -> PathBuf {
        self.dir.join("prices").join(format!("{symbol}.csv"))
    }

    fn macro_path(&self, indicator: &str) -> PathBuf {
        self.dir.join("macro").join(format!("{indicator}.csv"))
    }

    pub fn has_prices(&self, symbol: &str) -> bool {
        self.prices_path(symbol).exists()
    }

    /// Store a close series, replacing any previous snapshot of the symbol.
    pub fn write_prices(&self, series: &TimeSeries) -> Result<(), DataError> {
        let rows = series.iter().map(|(date, close)| PriceRow { date, close });
        write_atomic(&self.prices_path(&series.name), rows)
    }

    /// Store every observation of one indicator.
    pub fn write_macro(
        &self,
        indicator: &str,
        observations: &[MacroObservation],
    ) -> Result<(), DataError> {
        let rows = observations.iter().map(|o| MacroRow {
            country: o.country.clone(),
            date: o.date,
            value: o.value,
        });
        write_atomic(&self.macro_path(indicator), rows)
    }

    fn not_found(&self, symbol: &str) -> DataError {
        DataError::NotInSnapshot {
            symbol: symbol.to_string(),
            dir: self.dir.display().to_string(),
        }
    }
}

fn write_atomic<R: Serialize>(path: &Path, rows: impl Iterator<Item = R>) -> Result<(), DataError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| DataError::Snapshot(format!("failed to create {}: {e}", parent.display())))?;
    }
    let tmp = path.with_extension("csv.tmp");
    {
        let mut writer = csv::Writer::from_path(&tmp)
            .map_err(|e| DataError::Snapshot(format!("failed to open {}: {e}", tmp.display())))?;
        for row in rows {
            writer
                .serialize(row)
                .map_err(|e| DataError::Snapshot(format!("failed to write {}: {e}", tmp.display())))?;
        }
        writer
            .flush()
            .map_err(|e| DataError::Snapshot(format!("failed to flush {}: {e}", tmp.display())))?;
    }
    fs::rename(&tmp, path)
        .map_err(|e| DataError::Snapshot(format!("failed to rename into {}: {e}", path.display())))
}

fn read_rows<R: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<R>, DataError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| DataError::Snapshot(format!("failed to open {}: {e}", path.display())))?;
    reader
        .deserialize()
        .collect::<Result<Vec<R>, _>>()
        .map_err(|e| DataError::Snapshot(format!("corrupt snapshot {}: {e}", path.display())))
}

impl PriceProvider for SnapshotStore {
    fn name(&self) -> &str {
        "snapshot"
    }

    fn source(&self) -> DataSource {
        DataSource::Snapshot
    }

    fn fetch_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<TimeSeries, DataError> {
        let path = self.prices_path(symbol);
        if !path.exists() {
            return Err(self.not_found(symbol));
        }
        let rows: Vec<PriceRow> = read_rows(&path)?;
        Ok(TimeSeries::from_points(
            symbol,
            rows.into_iter()
                .filter(|r| r.date >= start && r.date <= end)
                .map(|r| (r.date, r.close)),
        ))
    }
}

impl MacroProvider for SnapshotStore {
    fn name(&self) -> &str {
        "snapshot"
    }

    fn fetch_indicator(
        &self,
        indicator: &str,
        countries: &[&str],
        start_year: i32,
        end_year: i32,
    ) -> Result<Vec<MacroObservation>, DataError> {
        let path = self.macro_path(indicator);
        if !path.exists() {
            return Err(self.not_found(indicator));
        }
        let rows: Vec<MacroRow> = read_rows(&path)?;
        Ok(rows
            .into_iter()
            .filter(|r| countries.contains(&r.country.as_str()))
            .filter(|r| (start_year..=end_year).contains(&r.date.year()))
            .map(|r| MacroObservation {
                indicator: indicator.to_string(),
                country: r.country,
                date: r.date,
                value: r.value,
            })
            .collect())
    }
}
