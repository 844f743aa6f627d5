//! Pipeline configuration: country universe, date range and model knobs.
//!
//! The configuration is an immutable value passed into the pipeline. It can be
//! loaded from a TOML file or built from the compiled-in emerging-markets
//! default. Each country is one structured record carrying its index ticker,
//! currency ticker and equity list together.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A single listed equity in a country's screening universe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equity {
    pub ticker: String,
    pub name: String,
}

impl Equity {
    pub fn new(ticker: &str, name: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            name: name.to_string(),
        }
    }
}

/// Everything the pipeline needs to know about one country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryConfig {
    /// ISO 3166-1 alpha-3 code (BRA, IND, ...). Used as the index column name.
    pub code: String,
    /// ISO 3166-1 alpha-2 code.
    pub iso2: String,
    pub name: String,
    /// Benchmark equity index (e.g. `^BVSP`).
    pub index_ticker: String,
    /// Currency pair quoted against USD (e.g. `BRLUSD=X`).
    pub currency_ticker: String,
    #[serde(default)]
    pub equities: Vec<Equity>,
}

impl CountryConfig {
    /// Market instruments that feed this country's index, in feature order.
    pub fn market_tickers(&self) -> [&str; 2] {
        [self.index_ticker.as_str(), self.currency_ticker.as_str()]
    }
}

/// A macro indicator fetched per country (World Bank series id + label).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroIndicator {
    pub id: String,
    pub label: String,
}

impl MacroIndicator {
    /// Feature column name for this indicator in a given country.
    pub fn column_name(&self, country_code: &str) -> String {
        format!("{} ({country_code})", self.label)
    }
}

/// What to do with stocks whose correlation falls inside the weak band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeakCorrelationPolicy {
    /// Drop the stock from the output and count it as a weak correlation.
    #[default]
    Exclude,
    /// Keep the stock with the category "Neutral".
    LabelNeutral,
}

/// Stock screener parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenerConfig {
    /// Minimum number of closing prices a stock must have.
    pub min_history: usize,
    /// Minimum number of dates shared by stock returns and index changes.
    pub min_aligned: usize,
    /// Strict correlation magnitude threshold for categorization.
    pub correlation_threshold: f64,
    /// Trailing window for average return and volatility.
    pub trailing_window: usize,
    pub weak_policy: WeakCorrelationPolicy,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            min_history: 30,
            min_aligned: 30,
            correlation_threshold: 0.02,
            trailing_window: 30,
            weak_policy: WeakCorrelationPolicy::Exclude,
        }
    }
}

/// Index construction and outlook parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Rolling window for realized-volatility features.
    pub volatility_window: usize,
    /// Trading days per year used to annualize volatility.
    pub annualization_days: f64,
    pub short_window: usize,
    pub long_window: usize,
    /// `vol_short > cautious_ratio * vol_long` → Cautious.
    pub cautious_ratio: f64,
    /// `vol_short < bullish_ratio * vol_long` → Bullish.
    pub bullish_ratio: f64,
    pub top_drivers: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            volatility_window: 30,
            annualization_days: 252.0,
            short_window: 7,
            long_window: 14,
            cautious_ratio: 1.5,
            bullish_ratio: 0.75,
            top_drivers: 3,
        }
    }
}

/// The complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Add each country's macro columns to its index feature slice.
    #[serde(default)]
    pub include_macro_features: bool,
    pub countries: Vec<CountryConfig>,
    #[serde(default)]
    pub macro_indicators: Vec<MacroIndicator>,
    #[serde(default)]
    pub screener: ScreenerConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

impl PipelineConfig {
    /// Load a configuration from a TOML file and validate it.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse a configuration from a TOML string and validate it.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start_date >= self.end_date {
            return Err(ConfigError::Invalid(format!(
                "start_date {} must be before end_date {}",
                self.start_date, self.end_date
            )));
        }
        if self.countries.is_empty() {
            return Err(ConfigError::Invalid("no countries configured".into()));
        }

        let mut seen = BTreeSet::new();
        for country in &self.countries {
            if !seen.insert(country.code.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate country code '{}'",
                    country.code
                )));
            }
        }

        let windows = [
            ("index.volatility_window", self.index.volatility_window),
            ("index.short_window", self.index.short_window),
            ("index.long_window", self.index.long_window),
            ("screener.trailing_window", self.screener.trailing_window),
        ];
        for (name, value) in windows {
            if value < 2 {
                return Err(ConfigError::Invalid(format!("{name} must be >= 2, got {value}")));
            }
        }
        if self.screener.correlation_threshold < 0.0 {
            return Err(ConfigError::Invalid(
                "screener.correlation_threshold must be non-negative".into(),
            ));
        }
        Ok(())
    }

    pub fn country(&self, code: &str) -> Option<&CountryConfig> {
        self.countries.iter().find(|c| c.code == code)
    }

    /// Index and currency tickers for every country, in config order.
    pub fn market_tickers(&self) -> Vec<&str> {
        self.countries
            .iter()
            .flat_map(|c| c.market_tickers())
            .collect()
    }

    /// Total number of equities across all countries.
    pub fn equity_count(&self) -> usize {
        self.countries.iter().map(|c| c.equities.len()).sum()
    }

    /// The built-in universe: Brazil, India, South Africa and Poland, 2020–2024.
    pub fn default_emerging_markets() -> Self {
        let countries = vec![
            CountryConfig {
                code: "BRA".into(),
                iso2: "BR".into(),
                name: "Brazil".into(),
                index_ticker: "^BVSP".into(),
                currency_ticker: "BRLUSD=X".into(),
                equities: vec![
                    Equity::new("VALE", "Vale"),
                    Equity::new("PETR4.SA", "Petrobras"),
                    Equity::new("ITUB", "Itaú Unibanco"),
                    Equity::new("BBDC4.SA", "Bradesco"),
                    Equity::new("ABEV3.SA", "Ambev"),
                    Equity::new("WEGE3.SA", "WEG"),
                    Equity::new("MGLU3.SA", "Magazine Luiza"),
                    Equity::new("LREN3.SA", "Lojas Renner"),
                    Equity::new("RENT3.SA", "Localiza"),
                    Equity::new("GGBR4.SA", "Gerdau"),
                ],
            },
            CountryConfig {
                code: "IND".into(),
                iso2: "IN".into(),
                name: "India".into(),
                index_ticker: "^NSEI".into(),
                currency_ticker: "INRUSD=X".into(),
                equities: vec![
                    Equity::new("RELIANCE.NS", "Reliance Industries"),
                    Equity::new("TCS.NS", "Tata Consultancy"),
                    Equity::new("HDB", "HDFC Bank"),
                    Equity::new("INFY", "Infosys"),
                    Equity::new("HINDUNILVR.NS", "Hindustan Unilever"),
                    Equity::new("ICICIBANK.NS", "ICICI Bank"),
                    Equity::new("KOTAKBANK.NS", "Kotak Mahindra Bank"),
                    Equity::new("SBIN.NS", "State Bank of India"),
                    Equity::new("BAJFINANCE.NS", "Bajaj Finance"),
                    Equity::new("BHARTIARTL.NS", "Bharti Airtel"),
                ],
            },
            CountryConfig {
                code: "ZAF".into(),
                iso2: "ZA".into(),
                name: "South Africa".into(),
                index_ticker: "^J203.JO".into(),
                currency_ticker: "ZARUSD=X".into(),
                equities: vec![
                    Equity::new("NPN.JO", "Naspers"),
                    Equity::new("BHP", "BHP Group"),
                    Equity::new("CFR.JO", "Compagnie Financière Richemont"),
                    Equity::new("ANH.JO", "Anheuser-Busch InBev"),
                    Equity::new("FSR.JO", "FirstRand"),
                    Equity::new("GLN.JO", "Glencore"),
                    Equity::new("SBK.JO", "Standard Bank"),
                    Equity::new("VOD.JO", "Vodacom"),
                    Equity::new("MTN.JO", "MTN Group"),
                    Equity::new("SOL.JO", "Sasol"),
                ],
            },
            CountryConfig {
                code: "POL".into(),
                iso2: "PL".into(),
                name: "Poland".into(),
                index_ticker: "^WIG20".into(),
                currency_ticker: "PLNUSD=X".into(),
                equities: vec![
                    Equity::new("PKO.WA", "PKO Bank Polski"),
                    Equity::new("PZU.WA", "PZU"),
                    Equity::new("CDR.WA", "CD Projekt"),
                    Equity::new("LPP.WA", "LPP"),
                    Equity::new("DNP.WA", "Dino Polska"),
                    Equity::new("KGH.WA", "KGHM Polska Miedź"),
                    Equity::new("MBK.WA", "mBank"),
                    Equity::new("PEO.WA", "Bank Pekao"),
                    Equity::new("SPL.WA", "Santander Bank Polska"),
                    Equity::new("TPE.WA", "Tauron Polska Energia"),
                ],
            },
        ];

        Self {
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid date"),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).expect("valid date"),
            include_macro_features: false,
            countries,
            macro_indicators: vec![
                MacroIndicator {
                    id: "NY.GDP.MKTP.KD.ZG".into(),
                    label: "GDP growth (annual %)".into(),
                },
                MacroIndicator {
                    id: "FP.CPI.TOTL.ZG".into(),
                    label: "Inflation, consumer prices (annual %)".into(),
                },
            ],
            screener: ScreenerConfig::default(),
            index: IndexConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_universe_has_four_countries() {
        let config = PipelineConfig::default_emerging_markets();
        assert_eq!(config.countries.len(), 4);
        assert_eq!(config.equity_count(), 40);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn market_tickers_pair_index_with_currency() {
        let config = PipelineConfig::default_emerging_markets();
        let tickers = config.market_tickers();
        assert_eq!(tickers.len(), 8);
        assert_eq!(tickers[0], "^BVSP");
        assert_eq!(tickers[1], "BRLUSD=X");
        assert_eq!(tickers[6], "^WIG20");
    }

    #[test]
    fn toml_roundtrip() {
        let config = PipelineConfig::default_emerging_markets();
        let toml_str = config.to_toml().unwrap();
        let parsed = PipelineConfig::from_toml(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let toml_str = r#"
start_date = "2023-01-01"
end_date = "2023-12-31"

[[countries]]
code = "TST"
iso2 = "TS"
name = "Testland"
index_ticker = "^TST"
currency_ticker = "TSTUSD=X"
"#;
        let config = PipelineConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.screener, ScreenerConfig::default());
        assert_eq!(config.index, IndexConfig::default());
        assert!(config.country("TST").unwrap().equities.is_empty());
        assert!(!config.include_macro_features);
    }

    #[test]
    fn rejects_inverted_dates() {
        let mut config = PipelineConfig::default_emerging_markets();
        config.end_date = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must be before"));
    }

    #[test]
    fn rejects_duplicate_country() {
        let mut config = PipelineConfig::default_emerging_markets();
        let dup = config.countries[0].clone();
        config.countries.push(dup);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate country code 'BRA'"));
    }

    #[test]
    fn rejects_degenerate_window() {
        let mut config = PipelineConfig::default_emerging_markets();
        config.index.short_window = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn macro_column_name_carries_country() {
        let config = PipelineConfig::default_emerging_markets();
        assert_eq!(
            config.macro_indicators[0].column_name("BRA"),
            "GDP growth (annual %) (BRA)"
        );
    }
}
