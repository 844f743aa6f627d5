//! World Bank macro indicator provider.
//!
//! Uses the v2 JSON API. A response is a two-element array: paging metadata,
//! then the observations. Annual observations are dated January 1st of their
//! year; null values are dropped.

use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;

use super::provider::{DataError, MacroObservation, MacroProvider};

const PER_PAGE: u32 = 1000;

#[derive(Debug, Deserialize)]
struct WbObservation {
    indicator: WbRef,
    countryiso3code: String,
    date: String,
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WbRef {
    id: String,
}

/// World Bank data provider.
pub struct WorldBankProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl WorldBankProvider {
    pub fn new() -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: "https://api.worldbank.org/v2".into(),
        })
    }

    fn indicator_url(&self, indicator: &str, countries: &[&str], start: i32, end: i32, page: u32) -> String {
        format!(
            "{}/country/{}/indicator/{indicator}?format=json&date={start}:{end}&per_page={PER_PAGE}&page={page}",
            self.base_url,
            countries.join(";"),
        )
    }

    /// Split one page into (total pages, observations).
    fn parse_page(indicator: &str, body: serde_json::Value) -> Result<(u32, Vec<MacroObservation>), DataError> {
        let mut parts = match body {
            serde_json::Value::Array(parts) => parts.into_iter(),
            other => {
                return Err(DataError::ResponseFormatChanged(format!(
                    "expected array response for {indicator}, got {other}"
                )))
            }
        };

        let meta = parts
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("empty response".into()))?;
        if let Some(message) = meta.get("message") {
            return Err(DataError::ResponseFormatChanged(format!(
                "world bank rejected {indicator}: {message}"
            )));
        }
        // `pages` is a number in most responses but a string in some
        let pages = match meta.get("pages") {
            Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(1) as u32,
            Some(serde_json::Value::String(s)) => s.parse().unwrap_or(1),
            _ => 1,
        };

        let rows: Vec<WbObservation> = match parts.next() {
            Some(serde_json::Value::Null) | None => Vec::new(),
            Some(data) => serde_json::from_value(data).map_err(|e| {
                DataError::ResponseFormatChanged(format!("observations for {indicator}: {e}"))
            })?,
        };

        let mut observations = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(value) = row.value else { continue };
            let year: i32 = row.date.parse().map_err(|_| {
                DataError::ResponseFormatChanged(format!("non-annual date '{}'", row.date))
            })?;
            let date = NaiveDate::from_ymd_opt(year, 1, 1)
                .ok_or_else(|| DataError::ResponseFormatChanged(format!("bad year {year}")))?;
            observations.push(MacroObservation {
                indicator: row.indicator.id,
                country: row.countryiso3code,
                date,
                value,
            });
        }

        Ok((pages, observations))
    }
}

impl MacroProvider for WorldBankProvider {
    fn name(&self) -> &str {
        "world_bank"
    }

    fn fetch_indicator(
        &self,
        indicator: &str,
        countries: &[&str],
        start_year: i32,
        end_year: i32,
    ) -> Result<Vec<MacroObservation>, DataError> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let url = self.indicator_url(indicator, countries, start_year, end_year, page);
            tracing::debug!(indicator, page, %url, "requesting indicator page");

            let resp = self
                .client
                .get(&url)
                .send()
                .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;
            let status = resp.status();
            if !status.is_success() {
                return Err(DataError::HttpStatus {
                    provider: self.name().to_string(),
                    symbol: indicator.to_string(),
                    status: status.as_u16(),
                });
            }
            let body: serde_json::Value = resp.json().map_err(|e| {
                DataError::ResponseFormatChanged(format!("failed to parse {indicator}: {e}"))
            })?;

            let (pages, observations) = Self::parse_page(indicator, body)?;
            all.extend(observations);
            if page >= pages {
                break;
            }
            page += 1;
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_observations_and_drops_nulls() {
        let body: serde_json::Value = serde_json::from_str(
            r#"[{"page":1,"pages":1,"per_page":"1000","total":3},
               [{"indicator":{"id":"NY.GDP.MKTP.KD.ZG","value":"GDP growth (annual %)"},
                 "country":{"id":"BR","value":"Brazil"},"countryiso3code":"BRA",
                 "date":"2023","value":2.9,"unit":"","obs_status":"","decimal":1},
                {"indicator":{"id":"NY.GDP.MKTP.KD.ZG","value":"GDP growth (annual %)"},
                 "country":{"id":"BR","value":"Brazil"},"countryiso3code":"BRA",
                 "date":"2024","value":null,"unit":"","obs_status":"","decimal":1},
                {"indicator":{"id":"NY.GDP.MKTP.KD.ZG","value":"GDP growth (annual %)"},
                 "country":{"id":"IN","value":"India"},"countryiso3code":"IND",
                 "date":"2023","value":8.2,"unit":"","obs_status":"","decimal":1}]]"#,
        )
        .unwrap();
        let (pages, obs) = WorldBankProvider::parse_page("NY.GDP.MKTP.KD.ZG", body).unwrap();
        assert_eq!(pages, 1);
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].country, "BRA");
        assert_eq!(obs[0].date, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(obs[1].value, 8.2);
    }

    #[test]
    fn error_message_is_surfaced() {
        let body: serde_json::Value = serde_json::from_str(
            r#"[{"message":[{"id":"120","key":"Invalid value","value":"The provided parameter value is not valid"}]}]"#,
        )
        .unwrap();
        let err = WorldBankProvider::parse_page("BAD", body).unwrap_err();
        assert!(err.to_string().contains("rejected BAD"));
    }

    #[test]
    fn empty_data_section_is_ok() {
        let body: serde_json::Value =
            serde_json::from_str(r#"[{"page":1,"pages":0,"total":0}, null]"#).unwrap();
        let (_, obs) = WorldBankProvider::parse_page("X", body).unwrap();
        assert!(obs.is_empty());
    }

    #[test]
    fn url_joins_countries() {
        let p = WorldBankProvider::new().unwrap();
        let url = p.indicator_url("FP.CPI.TOTL.ZG", &["BRA", "IND"], 2020, 2024, 2);
        assert!(url.ends_with(
            "/country/BRA;IND/indicator/FP.CPI.TOTL.ZG?format=json&date=2020:2024&per_page=1000&page=2"
        ));
    }
}
