//! Deterministic synthetic data for offline runs and tests.
//!
//! Every symbol gets its own RNG seeded from the BLAKE3 hash of its name, so
//! the same symbol always produces the same path regardless of what else is
//! requested. Weekends are skipped.

use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::provider::{DataError, DataSource, MacroObservation, MacroProvider, PriceProvider};
use crate::series::TimeSeries;

/// Random-walk prices and noisy annual macro values.
#[derive(Debug, Clone, Default)]
pub struct SyntheticProvider {
    salt: String,
}

impl SyntheticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose paths differ from the unsalted one.
    pub fn with_salt(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }

    fn rng_for(&self, key: &str) -> StdRng {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.salt.as_bytes());
        hasher.update(key.as_bytes());
        StdRng::from_seed(*hasher.finalize().as_bytes())
    }

    /// Generate the close path for `symbol` over `[start, end]`.
    pub fn closes(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> TimeSeries {
        let mut rng = self.rng_for(symbol);
        let mut points = Vec::new();
        let mut price = 100.0_f64;
        let mut current = start;

        while current <= end {
            if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
                current += chrono::Duration::days(1);
                continue;
            }
            let daily_return: f64 = rng.gen_range(-0.03..0.03);
            price *= 1.0 + daily_return;
            points.push((current, price));
            current += chrono::Duration::days(1);
        }

        TimeSeries::from_points(symbol, points)
    }
}

impl PriceProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn source(&self) -> DataSource {
        DataSource::Synthetic
    }

    fn fetch_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<TimeSeries, DataError> {
        Ok(self.closes(symbol, start, end))
    }
}

impl MacroProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch_indicator(
        &self,
        indicator: &str,
        countries: &[&str],
        start_year: i32,
        end_year: i32,
    ) -> Result<Vec<MacroObservation>, DataError> {
        let mut out = Vec::new();
        for country in countries {
            let mut rng = self.rng_for(&format!("{indicator}/{country}"));
            for year in start_year..=end_year {
                let Some(date) = NaiveDate::from_ymd_opt(year, 1, 1) else {
                    continue;
                };
                out.push(MacroObservation {
                    indicator: indicator.to_string(),
                    country: country.to_string(),
                    date,
                    value: rng.gen_range(-2.0..8.0),
                });
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn deterministic_per_symbol() {
        let p = SyntheticProvider::new();
        let a = p.closes("^BVSP", d("2024-01-01"), d("2024-03-31"));
        let b = p.closes("^BVSP", d("2024-01-01"), d("2024-03-31"));
        let c = p.closes("^NSEI", d("2024-01-01"), d("2024-03-31"));
        assert_eq!(a, b);
        assert_ne!(a.values(), c.values());
    }

    #[test]
    fn skips_weekends() {
        let p = SyntheticProvider::new();
        // 2024-01-06 and 2024-01-07 are a weekend
        let ts = p.closes("X", d("2024-01-01"), d("2024-01-07"));
        assert_eq!(ts.len(), 5);
        assert!(ts
            .dates()
            .iter()
            .all(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun)));
    }

    #[test]
    fn salt_changes_paths() {
        let a = SyntheticProvider::new().closes("X", d("2024-01-01"), d("2024-01-31"));
        let b = SyntheticProvider::with_salt("other").closes("X", d("2024-01-01"), d("2024-01-31"));
        assert_ne!(a.values(), b.values());
    }

    #[test]
    fn macro_has_one_value_per_country_year() {
        let p = SyntheticProvider::new();
        let obs = p
            .fetch_indicator("FP.CPI.TOTL.ZG", &["BRA", "IND"], 2020, 2024)
            .unwrap();
        assert_eq!(obs.len(), 10);
        assert!(obs.iter().all(|o| o.date.month() == 1 && o.date.day() == 1));
    }
}
