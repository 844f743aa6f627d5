//! Stock screener: correlate each equity's daily returns with its country's
//! index changes and sort it into a category.
//!
//! A stock passes through four gates in order: enough price history, enough
//! dates shared with the index, a correlation outside the weak band, then
//! trailing metrics. Failing a gate is a counted skip, never an error.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{CountryConfig, Equity, ScreenerConfig, WeakCorrelationPolicy};
use crate::data::PriceProvider;
use crate::series::TimeSeries;
use crate::stats;

/// Why a stock did not produce a screener record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Fetch failed, history empty, or shorter than the minimum.
    NoData,
    /// Too few dates shared with the index changes.
    InsufficientAlignment,
    /// Correlation inside the weak band or undefined.
    WeakCorrelation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounts {
    pub no_data: usize,
    pub insufficient_alignment: usize,
    pub weak_correlation: usize,
}

impl SkipCounts {
    pub fn record(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::NoData => self.no_data += 1,
            SkipReason::InsufficientAlignment => self.insufficient_alignment += 1,
            SkipReason::WeakCorrelation => self.weak_correlation += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.no_data + self.insufficient_alignment + self.weak_correlation
    }
}

/// Screener category. Ordering follows the display strings so sorting by
/// category matches sorting by label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "High-Momentum Play")]
    HighMomentumPlay,
    #[serde(rename = "Neutral")]
    Neutral,
    #[serde(rename = "Resilient Defender")]
    ResilientDefender,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::HighMomentumPlay => "High-Momentum Play",
            Category::Neutral => "Neutral",
            Category::ResilientDefender => "Resilient Defender",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One categorized stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenerRecord {
    pub country: String,
    pub ticker: String,
    pub company_name: String,
    /// Rounded to 3 decimals. Categorization uses the unrounded value.
    pub correlation_to_index: f64,
    pub category: Category,
    /// Mean daily return over the trailing window, percent, 2 decimals.
    pub avg_return_30d: f64,
    /// Sample std of daily returns over the trailing window, percent, 2 decimals.
    pub volatility_30d: f64,
    /// Number of joined (stock return, index change) rows.
    pub data_points: usize,
}

/// Screener output for one country.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountryScreen {
    pub country: String,
    pub records: Vec<ScreenerRecord>,
    pub skipped: SkipCounts,
}

impl CountryScreen {
    pub fn count(&self, category: Category) -> usize {
        self.records.iter().filter(|r| r.category == category).count()
    }
}

/// Stock returns and index changes on their shared dates.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedReturns {
    pub dates: Vec<NaiveDate>,
    pub stock: Vec<f64>,
    pub index: Vec<f64>,
}

impl AlignedReturns {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Inner join on date, dropping rows where either side is missing.
pub fn align_returns(stock_returns: &TimeSeries, index_changes: &TimeSeries) -> AlignedReturns {
    let mut out = AlignedReturns {
        dates: Vec::new(),
        stock: Vec::new(),
        index: Vec::new(),
    };
    for (date, r) in stock_returns.iter() {
        let Some(c) = index_changes.get(date) else {
            continue;
        };
        if r.is_nan() || c.is_nan() {
            continue;
        }
        out.dates.push(date);
        out.stock.push(r);
        out.index.push(c);
    }
    out
}

/// Category for a correlation, or `None` inside the weak band. Both
/// thresholds are strict; an undefined correlation is weak.
pub fn categorize(correlation: Option<f64>, threshold: f64) -> Option<Category> {
    match correlation {
        Some(r) if r > threshold => Some(Category::HighMomentumPlay),
        Some(r) if r < -threshold => Some(Category::ResilientDefender),
        _ => None,
    }
}

/// Mean and sample std of the last `window` returns, both in percent and
/// rounded to 2 decimals.
pub fn trailing_metrics(returns: &[f64], window: usize) -> (f64, f64) {
    let tail = &returns[returns.len().saturating_sub(window)..];
    (
        stats::round_to(stats::mean(tail) * 100.0, 2),
        stats::round_to(stats::sample_std(tail) * 100.0, 2),
    )
}

/// Screen one stock against precomputed index changes.
pub fn screen_stock(
    country: &str,
    equity: &Equity,
    closes: &TimeSeries,
    index_changes: &TimeSeries,
    config: &ScreenerConfig,
) -> Result<ScreenerRecord, SkipReason> {
    if closes.len() < config.min_history {
        return Err(SkipReason::NoData);
    }

    let aligned = align_returns(&closes.pct_change(), index_changes);
    if aligned.len() < config.min_aligned {
        return Err(SkipReason::InsufficientAlignment);
    }

    let correlation = stats::pearson(&aligned.stock, &aligned.index);
    let category = match (categorize(correlation, config.correlation_threshold), config.weak_policy) {
        (Some(category), _) => category,
        (None, WeakCorrelationPolicy::LabelNeutral) => Category::Neutral,
        (None, WeakCorrelationPolicy::Exclude) => return Err(SkipReason::WeakCorrelation),
    };

    let (avg_return_30d, volatility_30d) = trailing_metrics(&aligned.stock, config.trailing_window);
    Ok(ScreenerRecord {
        country: country.to_string(),
        ticker: equity.ticker.clone(),
        company_name: equity.name.clone(),
        correlation_to_index: correlation.map_or(f64::NAN, |r| stats::round_to(r, 3)),
        category,
        avg_return_30d,
        volatility_30d,
        data_points: aligned.len(),
    })
}

/// Screen every configured equity of a country. Fetch failures skip only the
/// affected ticker.
pub fn screen_country(
    country: &CountryConfig,
    index_changes: &TimeSeries,
    provider: &dyn PriceProvider,
    start: NaiveDate,
    end: NaiveDate,
    config: &ScreenerConfig,
) -> CountryScreen {
    let mut screen = CountryScreen {
        country: country.code.clone(),
        ..Default::default()
    };

    for equity in &country.equities {
        let closes = match provider.fetch_closes(&equity.ticker, start, end) {
            Ok(closes) => closes,
            Err(e) => {
                tracing::warn!(country = %country.code, ticker = %equity.ticker, error = %e, "fetch failed, skipping");
                screen.skipped.record(SkipReason::NoData);
                continue;
            }
        };

        match screen_stock(&country.code, equity, &closes, index_changes, config) {
            Ok(record) => {
                tracing::info!(
                    country = %country.code,
                    ticker = %equity.ticker,
                    correlation = record.correlation_to_index,
                    category = %record.category,
                    "categorized"
                );
                screen.records.push(record);
            }
            Err(reason) => {
                tracing::info!(
                    country = %country.code,
                    ticker = %equity.ticker,
                    rows = closes.len(),
                    ?reason,
                    "excluded"
                );
                screen.skipped.record(reason);
            }
        }
    }

    tracing::info!(
        country = %country.code,
        momentum = screen.count(Category::HighMomentumPlay),
        defenders = screen.count(Category::ResilientDefender),
        no_data = screen.skipped.no_data,
        insufficient_alignment = screen.skipped.insufficient_alignment,
        weak_correlation = screen.skipped.weak_correlation,
        "screened country"
    );
    screen
}
