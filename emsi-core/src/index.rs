//! Stability index construction.
//!
//! The index is the first principal component of a country's standardized
//! feature matrix. PCA has no canonical orientation: the builder flips the axis
//! so the largest-magnitude loading is positive, which makes results
//! reproducible for identical input, but callers must not rely on the sign
//! meaning "stable" or "unstable". Loadings are always returned alongside the
//! index so consumers can normalize the sign themselves.

use chrono::NaiveDate;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::IndexConfig;
use crate::features::VOLATILITY_SUFFIX;
use crate::preprocess::StandardizedMatrix;
use crate::series::TimeSeries;
use crate::stats;

const JACOBI_MAX_SWEEPS: usize = 100;
const JACOBI_TOLERANCE: f64 = 1e-24;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IndexError {
    #[error("insufficient data for {country}: PCA needs at least 2 rows and 1 column, got {rows}x{columns}")]
    InsufficientData {
        country: String,
        rows: usize,
        columns: usize,
    },

    #[error("PCA produced non-finite values for {country}")]
    NonFinite { country: String },
}

/// Weight of one input feature in the principal axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loading {
    pub feature: String,
    pub weight: f64,
}

/// A country's stability index and the axis that defines it.
#[derive(Debug, Clone)]
pub struct StabilityIndex {
    pub country: String,
    pub series: TimeSeries,
    /// Unit-norm loadings, one per input column, in column order.
    pub loadings: Vec<Loading>,
    /// Leading eigenvalue of the sample covariance matrix.
    pub explained_variance: f64,
    /// Share of total variance captured by the first component.
    pub explained_variance_ratio: f64,
}

impl StabilityIndex {
    pub fn latest(&self) -> Option<(NaiveDate, f64)> {
        self.series.last_date().zip(self.series.values().last().copied())
    }

    /// Day-over-day percent change of the index, first row dropped.
    pub fn changes(&self) -> TimeSeries {
        self.series.pct_change()
    }
}

/// Fit a one-component PCA and project every row onto the principal axis.
pub fn build_index(country: &str, matrix: &StandardizedMatrix) -> Result<StabilityIndex, IndexError> {
    let (n, p) = matrix.data.dim();
    if n < 2 || p == 0 {
        return Err(IndexError::InsufficientData {
            country: country.to_string(),
            rows: n,
            columns: p,
        });
    }

    let centered = center(&matrix.data);
    let covariance = centered.t().dot(&centered) / (n as f64 - 1.0);
    let (eigenvalue, mut axis) = leading_eigenpair(&covariance);
    orient(&mut axis);

    let scores = centered.dot(&axis);
    if !eigenvalue.is_finite() || scores.iter().any(|v| !v.is_finite()) {
        return Err(IndexError::NonFinite {
            country: country.to_string(),
        });
    }

    let total_variance: f64 = covariance.diag().sum();
    let explained_variance_ratio = if total_variance > 0.0 {
        eigenvalue / total_variance
    } else {
        0.0
    };

    let loadings = matrix
        .columns
        .iter()
        .zip(axis.iter())
        .map(|(feature, &weight)| Loading {
            feature: feature.clone(),
            weight,
        })
        .collect();

    let series = TimeSeries::from_points(
        country,
        matrix.dates.iter().copied().zip(scores.iter().copied()),
    );

    tracing::debug!(
        country,
        rows = n,
        columns = p,
        explained_variance = eigenvalue,
        explained_variance_ratio,
        "built stability index"
    );

    Ok(StabilityIndex {
        country: country.to_string(),
        series,
        loadings,
        explained_variance: eigenvalue,
        explained_variance_ratio,
    })
}

fn center(data: &Array2<f64>) -> Array2<f64> {
    match data.mean_axis(Axis(0)) {
        Some(mean) => data - &mean,
        None => data.clone(),
    }
}

/// Largest eigenvalue and its unit eigenvector of a symmetric matrix (cyclic Jacobi).
fn leading_eigenpair(symmetric: &Array2<f64>) -> (f64, Array1<f64>) {
    let p = symmetric.nrows();
    let mut a = symmetric.clone();
    let mut v = Array2::<f64>::eye(p);

    for _ in 0..JACOBI_MAX_SWEEPS {
        let mut off = 0.0;
        for i in 0..p {
            for j in (i + 1)..p {
                off += a[[i, j]] * a[[i, j]];
            }
        }
        if off < JACOBI_TOLERANCE {
            break;
        }

        for ip in 0..p {
            for iq in (ip + 1)..p {
                let apq = a[[ip, iq]];
                if apq.abs() < f64::MIN_POSITIVE {
                    continue;
                }
                let theta = (a[[iq, iq]] - a[[ip, ip]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..p {
                    let akp = a[[k, ip]];
                    let akq = a[[k, iq]];
                    a[[k, ip]] = c * akp - s * akq;
                    a[[k, iq]] = s * akp + c * akq;
                }
                for k in 0..p {
                    let apk = a[[ip, k]];
                    let aqk = a[[iq, k]];
                    a[[ip, k]] = c * apk - s * aqk;
                    a[[iq, k]] = s * apk + c * aqk;
                }
                for k in 0..p {
                    let vkp = v[[k, ip]];
                    let vkq = v[[k, iq]];
                    v[[k, ip]] = c * vkp - s * vkq;
                    v[[k, iq]] = s * vkp + c * vkq;
                }
            }
        }
    }

    let mut best = 0;
    for i in 1..p {
        if a[[i, i]] > a[[best, best]] {
            best = i;
        }
    }

    let mut axis = v.column(best).to_owned();
    let norm = axis.dot(&axis).sqrt();
    if norm > 0.0 {
        axis /= norm;
    }
    (a[[best, best]], axis)
}

/// Flip the axis so its largest-magnitude component is positive.
fn orient(axis: &mut Array1<f64>) {
    let mut pivot = 0.0_f64;
    for &w in axis.iter() {
        if w.abs() > pivot.abs() {
            pivot = w;
        }
    }
    if pivot < 0.0 {
        axis.mapv_inplace(|w| -w);
    }
}

// ─── Outlook ────────────────────────────────────────────────────────

/// Short-horizon market outlook derived from index volatility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outlook {
    Cautious,
    Bullish,
    Neutral,
}

impl Outlook {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outlook::Cautious => "Cautious",
            Outlook::Bullish => "Bullish",
            Outlook::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for Outlook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify from the latest short- and long-window volatilities.
/// Boundaries are exclusive; undefined volatility resolves to Neutral.
pub fn classify_outlook(vol_short: f64, vol_long: f64, config: &IndexConfig) -> Outlook {
    if vol_short > vol_long * config.cautious_ratio {
        Outlook::Cautious
    } else if vol_short < vol_long * config.bullish_ratio {
        Outlook::Bullish
    } else {
        Outlook::Neutral
    }
}

/// Latest rolling volatilities of the index's percent change (short, long).
pub fn outlook_volatilities(index: &[f64], config: &IndexConfig) -> (f64, f64) {
    let changes = stats::pct_change(index);
    let latest = |window: usize| {
        stats::rolling_std(&changes, window)
            .last()
            .copied()
            .unwrap_or(f64::NAN)
    };
    (latest(config.short_window), latest(config.long_window))
}

pub fn outlook(index: &[f64], config: &IndexConfig) -> Outlook {
    let (vol_short, vol_long) = outlook_volatilities(index, config);
    classify_outlook(vol_short, vol_long, config)
}

// ─── Drivers ────────────────────────────────────────────────────────

/// A feature ranked among the strongest contributors to the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Drivers {
    /// Largest loadings, descending.
    pub positive: Vec<Driver>,
    /// Smallest loadings, ascending.
    pub negative: Vec<Driver>,
}

/// Top `n` largest and `n` smallest loadings with human-readable names.
/// Ties keep column order.
pub fn top_drivers(loadings: &[Loading], n: usize) -> Drivers {
    let mut ranked: Vec<&Loading> = loadings.iter().collect();
    ranked.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    let positive = ranked.iter().take(n).map(|l| to_driver(l)).collect();

    ranked.sort_by(|a, b| a.weight.total_cmp(&b.weight));
    let negative = ranked.iter().take(n).map(|l| to_driver(l)).collect();

    Drivers { positive, negative }
}

fn to_driver(loading: &Loading) -> Driver {
    Driver {
        name: clean_feature_name(&loading.feature),
        value: loading.weight,
    }
}

/// Turn an internal column name into a display label.
///
/// `^BVSP_volatility` → `Bvsp Volatility`, `BRLUSD=X` → `Brlusd`.
pub fn clean_feature_name(name: &str) -> String {
    let readable = name.replace(VOLATILITY_SUFFIX, " Volatility");
    let readable = readable.trim_start_matches('^');
    let readable = match readable.find("=X") {
        Some(pos) => format!("{}{}", &readable[..pos], &readable[pos + 2..]),
        None => readable.to_string(),
    };
    title_case(&readable)
}

/// Uppercase the first letter of every alphabetic run, lowercase the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_cased = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if prev_cased {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_cased = true;
        } else {
            out.push(ch);
            prev_cased = false;
        }
    }
    out
}
