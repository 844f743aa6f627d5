//! Run summary: a JSON record of what each country produced.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use emsi_core::config::PipelineConfig;
use emsi_core::screener::{Category, SkipCounts};

use crate::pipeline::PipelineResult;

/// Current run summary schema version.
pub const SUMMARY_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountryStatus {
    Ok,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountrySummary {
    pub country: String,
    pub status: CountryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub index_rows: usize,
    pub explained_variance: Option<f64>,
    pub explained_variance_ratio: Option<f64>,
    pub outlook: Option<String>,
    pub high_momentum: usize,
    pub resilient_defender: usize,
    pub neutral: usize,
    pub skipped: SkipCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub schema_version: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub provider: String,
    pub dataset_hash: String,
    pub include_macro_features: bool,
    pub feature_rows: usize,
    pub countries: Vec<CountrySummary>,
    pub screener_records: usize,
}

impl RunSummary {
    /// Summarize a run. Countries appear in configured order, failed ones
    /// included with their reason.
    pub fn from_result(result: &PipelineResult, config: &PipelineConfig) -> Self {
        let mut countries = Vec::with_capacity(config.countries.len());
        for country in &config.countries {
            if let Some(ok) = result.countries.iter().find(|c| c.country.code == country.code) {
                countries.push(CountrySummary {
                    country: country.code.clone(),
                    status: CountryStatus::Ok,
                    reason: None,
                    index_rows: ok.index.series.len(),
                    explained_variance: Some(ok.index.explained_variance),
                    explained_variance_ratio: Some(ok.index.explained_variance_ratio),
                    outlook: Some(ok.outlook.to_string()),
                    high_momentum: ok.screen.count(Category::HighMomentumPlay),
                    resilient_defender: ok.screen.count(Category::ResilientDefender),
                    neutral: ok.screen.count(Category::Neutral),
                    skipped: ok.screen.skipped,
                });
            } else if let Some(failed) = result.failures.iter().find(|f| f.country == country.code) {
                countries.push(CountrySummary {
                    country: country.code.clone(),
                    status: CountryStatus::Failed,
                    reason: Some(failed.error.to_string()),
                    index_rows: 0,
                    explained_variance: None,
                    explained_variance_ratio: None,
                    outlook: None,
                    high_momentum: 0,
                    resilient_defender: 0,
                    neutral: 0,
                    skipped: SkipCounts::default(),
                });
            }
        }

        Self {
            schema_version: SUMMARY_SCHEMA_VERSION,
            start_date: config.start_date,
            end_date: config.end_date,
            provider: result.data.provider.clone(),
            dataset_hash: result.data.dataset_hash.clone(),
            include_macro_features: config.include_macro_features,
            feature_rows: result.data.featured.nrows(),
            countries,
            screener_records: result.screener_record_count(),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.countries
            .iter()
            .filter(|c| c.status == CountryStatus::Ok)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.countries.len() - self.succeeded()
    }
}
