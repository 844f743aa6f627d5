//! EMSI Core: country stability index and stock screener.
//!
//! This crate contains the computational heart of the pipeline:
//! - Configuration (country universe, date range, model parameters)
//! - Data providers (Yahoo Finance, World Bank, CSV snapshots, synthetic)
//! - Date-aligned feature matrices and volatility features
//! - Preprocessing and the one-component PCA index
//! - Outlook classification and driver ranking
//! - Correlation-based stock screening

pub mod config;
pub mod data;
pub mod features;
pub mod index;
pub mod matrix;
pub mod preprocess;
pub mod screener;
pub mod series;
pub mod stats;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: values handed between pipeline stages are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<config::PipelineConfig>();
        require_sync::<config::PipelineConfig>();
        require_send::<series::TimeSeries>();
        require_sync::<series::TimeSeries>();
        require_send::<matrix::FeatureMatrix>();
        require_sync::<matrix::FeatureMatrix>();
        require_send::<preprocess::StandardizedMatrix>();
        require_sync::<preprocess::StandardizedMatrix>();
        require_send::<index::StabilityIndex>();
        require_sync::<index::StabilityIndex>();
        require_send::<screener::CountryScreen>();
        require_sync::<screener::CountryScreen>();

        require_send::<data::YahooProvider>();
        require_sync::<data::YahooProvider>();
        require_send::<data::WorldBankProvider>();
        require_sync::<data::WorldBankProvider>();
        require_send::<data::SnapshotStore>();
        require_sync::<data::SnapshotStore>();
    }

    /// Architecture contract: the screener reaches prices only through the
    /// provider trait, so any source (live, snapshot, in-memory) can back it.
    #[test]
    fn screener_accepts_trait_object_provider() {
        fn _check(
            country: &config::CountryConfig,
            changes: &series::TimeSeries,
            provider: &dyn data::PriceProvider,
            cfg: &config::ScreenerConfig,
        ) -> screener::CountryScreen {
            let d = chrono::NaiveDate::MIN;
            screener::screen_country(country, changes, provider, d, d, cfg)
        }
    }
}
