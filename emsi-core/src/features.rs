//! Realized-volatility feature generation.
//!
//! Every column that looks like a market instrument gets a companion
//! `<name>_volatility` column: the rolling sample std of daily percent changes,
//! annualized. The first `window` rows of each new column are `NaN`.
//!
//! Levels are forward-filled before differencing. Markets keep different
//! holiday calendars, so the aligned matrix has scattered gaps; a gap counts
//! as a flat day rather than voiding every window that touches it.

use crate::matrix::FeatureMatrix;
use crate::stats;

/// Suffix appended to derived volatility columns.
pub const VOLATILITY_SUFFIX: &str = "_volatility";

/// Heuristic: does this column name denote a market instrument?
///
/// Matches index tickers (`^BVSP`), currency pairs (`BRLUSD=X`), venue-suffixed
/// equities (`PETR4.SA`) and plain uppercase tickers (`VALE`).
pub fn is_market_instrument(name: &str) -> bool {
    name.starts_with('^') || name.ends_with("=X") || name.contains('.') || is_upper(name)
}

/// Uppercase in the `str.isupper` sense: at least one cased character, none lowercase.
fn is_upper(name: &str) -> bool {
    let mut has_cased = false;
    for ch in name.chars() {
        if ch.is_lowercase() {
            return false;
        }
        if ch.is_uppercase() {
            has_cased = true;
        }
    }
    has_cased
}

/// Name of the volatility column derived from `column`.
pub fn volatility_column(column: &str) -> String {
    format!("{column}{VOLATILITY_SUFFIX}")
}

/// Annualized rolling volatility of daily percent changes over gap-filled levels.
pub fn rolling_volatility(values: &[f64], window: usize, annualization_days: f64) -> Vec<f64> {
    let returns = stats::padded_pct_change(values);
    let factor = annualization_days.sqrt();
    stats::rolling_std(&returns, window)
        .into_iter()
        .map(|v| v * factor)
        .collect()
}

/// Return a copy of `matrix` with a volatility column appended for every
/// qualifying input column. Only columns present on entry are considered.
pub fn add_volatility_features(
    matrix: &FeatureMatrix,
    window: usize,
    annualization_days: f64,
) -> FeatureMatrix {
    let mut out = matrix.clone();
    for column in matrix.columns() {
        if !is_market_instrument(&column.name) {
            continue;
        }
        let vol = rolling_volatility(&column.values, window, annualization_days);
        out.push_column(volatility_column(&column.name), vol);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{assert_approx, DEFAULT_EPSILON};
    use chrono::NaiveDate;

    #[test]
    fn instrument_heuristic() {
        assert!(is_market_instrument("^BVSP"));
        assert!(is_market_instrument("BRLUSD=X"));
        assert!(is_market_instrument("PETR4.SA"));
        assert!(is_market_instrument("VALE"));
        assert!(!is_market_instrument("GDP growth (annual %) (BRA)"));
        assert!(!is_market_instrument("1234"));
        assert!(!is_market_instrument(""));
    }

    #[test]
    fn volatility_leading_rows_are_nan() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64).sin()).collect();
        let vol = rolling_volatility(&closes, 30, 252.0);
        // pct_change is NaN at 0, so the first full window ends at index 30
        for v in vol.iter().take(30) {
            assert!(v.is_nan());
        }
        assert!(vol[30].is_finite());
    }

    #[test]
    fn volatility_is_annualized_sample_std() {
        let closes = [100.0, 101.0, 99.0, 102.0];
        let vol = rolling_volatility(&closes, 3, 252.0);
        let returns = [0.01, 99.0 / 101.0 - 1.0, 102.0 / 99.0 - 1.0];
        let expected = stats::sample_std(&returns) * 252f64.sqrt();
        assert_approx(vol[3], expected, DEFAULT_EPSILON);
    }

    #[test]
    fn holiday_gap_does_not_blank_volatility() {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = (0..80).map(|i| base + chrono::Duration::days(i)).collect();
        let mut m = FeatureMatrix::new(dates);
        let mut index: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64 * 0.4).sin()).collect();
        index[40] = f64::NAN;
        m.push_column("^BVSP", index);
        m.push_column("BRLUSD=X", (0..80).map(|i| 5.0 + 0.01 * (i as f64).cos()).collect());

        let out = add_volatility_features(&m, 30, 252.0);
        for name in ["^BVSP_volatility", "BRLUSD=X_volatility"] {
            let vol = out.column(name).unwrap();
            assert!(vol[30..].iter().all(|v| v.is_finite()), "{name} has gaps after warm-up");
        }
        // the raw level keeps its gap
        assert!(out.column("^BVSP").unwrap()[40].is_nan());
    }

    #[test]
    fn late_listing_warms_up_from_first_close() {
        let mut closes: Vec<f64> = (0..50).map(|i| 10.0 + (i as f64).sin()).collect();
        closes[..5].fill(f64::NAN);
        let vol = rolling_volatility(&closes, 30, 252.0);
        assert!(vol[34].is_nan());
        assert!(vol[35].is_finite());
    }

    #[test]
    fn adds_only_for_instrument_columns() {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = (0..5).map(|i| base + chrono::Duration::days(i)).collect();
        let mut m = FeatureMatrix::new(dates);
        m.push_column("^IDX", vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        m.push_column("GDP growth (annual %) (TST)", vec![1.0; 5]);
        let out = add_volatility_features(&m, 2, 252.0);
        assert_eq!(
            out.column_names(),
            vec!["^IDX", "GDP growth (annual %) (TST)", "^IDX_volatility"]
        );
    }
}
