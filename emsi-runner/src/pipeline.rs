//! End-to-end pipeline orchestration.
//!
//! One shared fetch builds the featured matrix, then every country runs the
//! same sequence on its own column slice: preprocess, build index, classify
//! outlook, rank drivers, screen equities. A country that fails the index
//! stages is recorded and skipped; the others still complete.

use chrono::NaiveDate;
use thiserror::Error;

use emsi_core::config::{CountryConfig, PipelineConfig};
use emsi_core::data::{MacroProvider, PriceProvider};
use emsi_core::features::volatility_column;
use emsi_core::index::{
    build_index, outlook_volatilities, classify_outlook, top_drivers, Drivers, IndexError, Outlook,
    StabilityIndex,
};
use emsi_core::matrix::FeatureMatrix;
use emsi_core::preprocess::{preprocess, PreprocessError};
use emsi_core::screener::{screen_country, CountryScreen};

use crate::data_loader::{load_dataset, LoadError, LoadedData};

/// Why a country produced no index.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CountryError {
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Everything computed for one successful country.
#[derive(Debug, Clone)]
pub struct CountryResult {
    pub country: CountryConfig,
    pub index: StabilityIndex,
    pub outlook: Outlook,
    /// Latest short- and long-window volatility of the index changes.
    pub vol_short: f64,
    pub vol_long: f64,
    pub drivers: Drivers,
    pub screen: CountryScreen,
}

impl CountryResult {
    pub fn latest(&self) -> Option<(NaiveDate, f64)> {
        self.index.latest()
    }
}

#[derive(Debug, Clone)]
pub struct CountryFailure {
    pub country: String,
    pub error: CountryError,
}

/// Outcome of a full run, in configured country order.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub data: LoadedData,
    pub countries: Vec<CountryResult>,
    pub failures: Vec<CountryFailure>,
}

impl PipelineResult {
    pub fn screener_record_count(&self) -> usize {
        self.countries.iter().map(|c| c.screen.records.len()).sum()
    }
}

/// The featured-matrix columns that describe one country: its market levels,
/// their volatilities and, when enabled, its macro indicators.
pub fn country_columns(country: &CountryConfig, config: &PipelineConfig) -> Vec<String> {
    let mut columns: Vec<String> = country
        .market_tickers()
        .iter()
        .map(|t| t.to_string())
        .collect();
    columns.extend(country.market_tickers().iter().map(|t| volatility_column(t)));
    if config.include_macro_features {
        columns.extend(
            config
                .macro_indicators
                .iter()
                .map(|i| i.column_name(&country.code)),
        );
    }
    columns
}

/// Run the index stages and the screener for a single country.
pub fn run_country(
    country: &CountryConfig,
    featured: &FeatureMatrix,
    config: &PipelineConfig,
    prices: &dyn PriceProvider,
) -> Result<CountryResult, CountryError> {
    let columns = country_columns(country, config);
    let present: Vec<&String> = columns.iter().filter(|c| featured.has_column(c)).collect();
    if present.len() < columns.len() {
        tracing::warn!(
            country = %country.code,
            missing = columns.len() - present.len(),
            "some feature columns are absent"
        );
    }
    let slice = featured.select(&present);

    let standardized = preprocess(&country.code, &slice)?;
    let index = build_index(&country.code, &standardized)?;

    let (vol_short, vol_long) = outlook_volatilities(index.series.values(), &config.index);
    let outlook = classify_outlook(vol_short, vol_long, &config.index);
    let drivers = top_drivers(&index.loadings, config.index.top_drivers);

    tracing::info!(
        country = %country.code,
        rows = index.series.len(),
        explained_variance = index.explained_variance,
        %outlook,
        "built stability index"
    );

    let screen = screen_country(
        country,
        &index.changes(),
        prices,
        config.start_date,
        config.end_date,
        &config.screener,
    );

    Ok(CountryResult {
        country: country.clone(),
        index,
        outlook,
        vol_short,
        vol_long,
        drivers,
        screen,
    })
}

/// Fetch, build and screen every configured country.
///
/// Only the shared data load can fail the run. Per-country index failures are
/// collected in [`PipelineResult::failures`].
pub fn run_pipeline(
    config: &PipelineConfig,
    prices: &dyn PriceProvider,
    macros: Option<&dyn MacroProvider>,
) -> Result<PipelineResult, LoadError> {
    let data = load_dataset(config, prices, macros)?;

    let mut countries = Vec::new();
    let mut failures = Vec::new();
    for country in &config.countries {
        match run_country(country, &data.featured, config, prices) {
            Ok(result) => countries.push(result),
            Err(error) => {
                tracing::error!(country = %country.code, %error, "country failed, continuing");
                failures.push(CountryFailure {
                    country: country.code.clone(),
                    error,
                });
            }
        }
    }

    Ok(PipelineResult {
        data,
        countries,
        failures,
    })
}
