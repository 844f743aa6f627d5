//! Series loading and feature matrix assembly for the runner.
//!
//! Fetches every country's index and currency series once, aligns them on
//! the union of trading dates and appends rolling volatility columns. When
//! macro features are enabled the annual indicators are fetched for all
//! countries in one request per indicator and joined as-of onto the market
//! dates.
//!
//! Any failure here aborts the run: without the market series no country
//! index can be built. Per-equity fetches happen later in the screener,
//! where a failure only skips that ticker.

use chrono::{Datelike, NaiveDate};
use std::collections::BTreeSet;
use thiserror::Error;

use emsi_core::config::PipelineConfig;
use emsi_core::data::{
    align_series, asof_join, macro_series, DataError, MacroProvider, PriceProvider,
};
use emsi_core::features::add_volatility_features;
use emsi_core::matrix::FeatureMatrix;
use emsi_core::series::TimeSeries;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to fetch market series '{symbol}': {source}")]
    Market {
        symbol: String,
        #[source]
        source: DataError,
    },

    #[error("failed to fetch macro indicator '{indicator}': {source}")]
    Macro {
        indicator: String,
        #[source]
        source: DataError,
    },

    #[error("macro features are enabled but no macro provider was supplied")]
    NoMacroProvider,
}

/// Everything the per-country stages need from the shared fetch.
#[derive(Debug, Clone)]
pub struct LoadedData {
    /// Market levels, their volatility columns and (optionally) macro columns.
    pub featured: FeatureMatrix,
    /// Raw market series in fetch order.
    pub market: Vec<TimeSeries>,
    /// Macro series, one per (indicator, country).
    pub macro_series: Vec<TimeSeries>,
    /// BLAKE3 over every input series, for run provenance.
    pub dataset_hash: String,
    /// Name of the price provider that served the market series.
    pub provider: String,
}

/// Fetch and assemble the featured matrix for the whole universe.
pub fn load_dataset(
    config: &PipelineConfig,
    prices: &dyn PriceProvider,
    macros: Option<&dyn MacroProvider>,
) -> Result<LoadedData, LoadError> {
    let mut market = Vec::new();
    for symbol in config.market_tickers() {
        let series = prices
            .fetch_closes(symbol, config.start_date, config.end_date)
            .map_err(|source| LoadError::Market {
                symbol: symbol.to_string(),
                source,
            })?;
        if series.is_empty() {
            tracing::warn!(symbol, "market series is empty");
        } else {
            tracing::info!(
                symbol,
                rows = series.len(),
                first = %series.first_date().unwrap_or(NaiveDate::MIN),
                last = %series.last_date().unwrap_or(NaiveDate::MIN),
                "fetched market series"
            );
        }
        market.push(series);
    }

    let aligned = align_series(&market);
    let mut featured = add_volatility_features(
        &aligned,
        config.index.volatility_window,
        config.index.annualization_days,
    );

    let macro_series = if config.include_macro_features {
        let provider = macros.ok_or(LoadError::NoMacroProvider)?;
        let series = load_macro(config, provider)?;
        for s in &series {
            asof_join(&mut featured, s);
        }
        series
    } else {
        Vec::new()
    };

    let dataset_hash = compute_dataset_hash(market.iter().chain(macro_series.iter()));

    tracing::info!(
        rows = featured.nrows(),
        columns = featured.ncols(),
        provider = prices.name(),
        %dataset_hash,
        "assembled feature matrix"
    );

    Ok(LoadedData {
        featured,
        market,
        macro_series,
        dataset_hash,
        provider: prices.name().to_string(),
    })
}

fn load_macro(
    config: &PipelineConfig,
    provider: &dyn MacroProvider,
) -> Result<Vec<TimeSeries>, LoadError> {
    let countries: Vec<&str> = config.countries.iter().map(|c| c.code.as_str()).collect();
    let mut observations = Vec::new();
    for indicator in &config.macro_indicators {
        let obs = provider
            .fetch_indicator(
                &indicator.id,
                &countries,
                config.start_date.year(),
                config.end_date.year(),
            )
            .map_err(|source| LoadError::Macro {
                indicator: indicator.id.clone(),
                source,
            })?;
        tracing::info!(indicator = %indicator.id, observations = obs.len(), "fetched macro indicator");
        observations.extend(obs);
    }
    Ok(macro_series(&observations, &config.macro_indicators))
}

/// Compute a deterministic BLAKE3 hash over a set of series.
///
/// The hash covers names, dates and values in sorted name order, so it is
/// identical regardless of fetch order.
pub fn compute_dataset_hash<'a>(series: impl Iterator<Item = &'a TimeSeries>) -> String {
    let mut sorted: Vec<&TimeSeries> = series.collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut hasher = blake3::Hasher::new();
    let mut seen = BTreeSet::new();
    for s in sorted {
        if !seen.insert(s.name.as_str()) {
            continue;
        }
        hasher.update(s.name.as_bytes());
        for (date, value) in s.iter() {
            hasher.update(date.to_string().as_bytes());
            hasher.update(&value.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}
