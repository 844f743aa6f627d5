//! Data provider traits and structured error types.
//!
//! Providers abstract over data sources (Yahoo Finance, World Bank, frozen
//! CSV snapshots, synthetic data) so the pipeline can swap implementations and
//! tests can substitute in-memory data.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::series::TimeSeries;

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("HTTP {status} from {provider} for {symbol}")]
    HttpStatus {
        provider: String,
        symbol: String,
        status: u16,
    },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no snapshot data for '{symbol}' in {dir}")]
    NotInSnapshot { symbol: String, dir: String },

    #[error("snapshot I/O error: {0}")]
    Snapshot(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Where a series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    YahooFinance,
    WorldBank,
    Snapshot,
    Synthetic,
    InMemory,
}

/// One annual macro observation for one country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroObservation {
    /// Indicator id, e.g. `NY.GDP.MKTP.KD.ZG`.
    pub indicator: String,
    /// ISO3 country code.
    pub country: String,
    /// Observation date (January 1st of the reported year).
    pub date: NaiveDate,
    pub value: f64,
}

/// Source of daily closing prices.
pub trait PriceProvider {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    fn source(&self) -> DataSource;

    /// Daily closes for `symbol` between `start` and `end` (inclusive), keyed by
    /// calendar date with any time zone stripped.
    fn fetch_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<TimeSeries, DataError>;
}

/// Source of annual macroeconomic indicators.
pub trait MacroProvider {
    fn name(&self) -> &str;

    /// Observations of one indicator for the given ISO3 countries and year range.
    /// Missing (null) observations are omitted.
    fn fetch_indicator(
        &self,
        indicator: &str,
        countries: &[&str],
        start_year: i32,
        end_year: i32,
    ) -> Result<Vec<MacroObservation>, DataError>;
}
