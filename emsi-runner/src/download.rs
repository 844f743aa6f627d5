//! Snapshot download: fetch every series in a universe once and freeze it.
//!
//! Failures are collected rather than fatal so one delisted ticker does not
//! cost the whole snapshot.

use chrono::Datelike;
use emsi_core::config::PipelineConfig;
use emsi_core::data::{DataError, MacroProvider, PriceProvider, SnapshotStore};

/// Result of a snapshot download.
#[derive(Debug)]
pub struct DownloadSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<(String, DataError)>,
}

impl DownloadSummary {
    fn record(&mut self, name: &str, result: Result<(), DataError>) {
        self.total += 1;
        match result {
            Ok(()) => self.succeeded += 1,
            Err(e) => {
                tracing::warn!(name, error = %e, "snapshot entry failed");
                self.failed += 1;
                self.errors.push((name.to_string(), e));
            }
        }
    }
}

/// Download market series, equities and (if a provider is given) macro
/// indicators into `store`.
pub fn download_snapshot(
    config: &PipelineConfig,
    prices: &dyn PriceProvider,
    macros: Option<&dyn MacroProvider>,
    store: &SnapshotStore,
) -> DownloadSummary {
    let mut summary = DownloadSummary {
        total: 0,
        succeeded: 0,
        failed: 0,
        errors: Vec::new(),
    };

    let mut symbols: Vec<&str> = config.market_tickers();
    for country in &config.countries {
        symbols.extend(country.equities.iter().map(|e| e.ticker.as_str()));
    }

    for (i, symbol) in symbols.iter().enumerate() {
        tracing::info!(symbol, progress = i + 1, total = symbols.len(), "downloading");
        let result = prices
            .fetch_closes(symbol, config.start_date, config.end_date)
            .and_then(|series| store.write_prices(&series));
        summary.record(symbol, result);
    }

    if let Some(macros) = macros {
        let countries: Vec<&str> = config.countries.iter().map(|c| c.code.as_str()).collect();
        for indicator in &config.macro_indicators {
            let result = macros
                .fetch_indicator(
                    &indicator.id,
                    &countries,
                    config.start_date.year(),
                    config.end_date.year(),
                )
                .and_then(|obs| store.write_macro(&indicator.id, &obs));
            summary.record(&indicator.id, result);
        }
    }

    tracing::info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        dir = %store.dir().display(),
        "snapshot complete"
    );
    summary
}
