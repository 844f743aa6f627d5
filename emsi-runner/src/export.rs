//! CSV and JSON artifact generation.
//!
//! Every artifact is rendered to a string first and then written in one go,
//! so a run either replaces a file completely or leaves it untouched.
//! Numbers use fixed precision and rows have a total order, which makes two
//! runs over the same input byte-identical.
//!
//! Missing values are written as empty cells.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use emsi_core::config::PipelineConfig;
use emsi_core::index::{Driver, StabilityIndex};
use emsi_core::matrix::FeatureMatrix;
use emsi_core::screener::ScreenerRecord;

use crate::pipeline::{CountryResult, PipelineResult};
use crate::summary::RunSummary;

pub const FULL_INDEX_FILE: &str = "full_stability_index.csv";
pub const INDEX_DATA_FILE: &str = "index_data.csv";
pub const SCREENER_FILE: &str = "stock_screener_data.csv";
pub const FEATURED_FILE: &str = "featured_dataset.csv";
pub const SUMMARY_FILE: &str = "run_summary.json";

fn fmt_value(v: f64, decimals: usize) -> String {
    if v.is_finite() {
        format!("{v:.decimals$}")
    } else {
        String::new()
    }
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Index artifacts ────────────────────────────────────────────────

/// Outer join of every country's full index history on date.
///
/// Columns: date, then one column per country in the given order.
pub fn export_full_index_csv(countries: &[CountryResult]) -> Result<String> {
    let dates: BTreeSet<NaiveDate> = countries
        .iter()
        .flat_map(|c| c.index.series.dates().iter().copied())
        .collect();

    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["date".to_string()];
    header.extend(countries.iter().map(|c| c.country.code.clone()));
    wtr.write_record(&header)?;

    for date in dates {
        let mut row = vec![date.to_string()];
        for c in countries {
            row.push(c.index.series.get(date).map_or_else(String::new, |v| fmt_value(v, 6)));
        }
        wtr.write_record(&row)?;
    }
    finish(wtr)
}

/// Latest index value per country with outlook and top drivers.
///
/// Columns: date, country_code, stability_index, outlook, then for each
/// driver slot j: positive_driver_j_name, positive_driver_j_value,
/// negative_driver_j_name, negative_driver_j_value. Unfilled slots are empty.
pub fn export_index_data_csv(countries: &[CountryResult], driver_slots: usize) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header: Vec<String> = ["date", "country_code", "stability_index", "outlook"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    for j in 1..=driver_slots {
        header.push(format!("positive_driver_{j}_name"));
        header.push(format!("positive_driver_{j}_value"));
        header.push(format!("negative_driver_{j}_name"));
        header.push(format!("negative_driver_{j}_value"));
    }
    wtr.write_record(&header)?;

    for c in countries {
        let Some((date, value)) = c.latest() else {
            continue;
        };
        let mut row = vec![
            date.to_string(),
            c.country.code.clone(),
            fmt_value(value, 6),
            c.outlook.to_string(),
        ];
        for j in 0..driver_slots {
            push_driver(&mut row, c.drivers.positive.get(j));
            push_driver(&mut row, c.drivers.negative.get(j));
        }
        wtr.write_record(&row)?;
    }
    finish(wtr)
}

fn push_driver(row: &mut Vec<String>, driver: Option<&Driver>) {
    match driver {
        Some(d) => {
            row.push(d.name.clone());
            row.push(fmt_value(d.value, 6));
        }
        None => {
            row.push(String::new());
            row.push(String::new());
        }
    }
}

/// One country's loading vector. Columns: feature, loading.
pub fn export_loadings_csv(index: &StabilityIndex) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["feature", "loading"])?;
    for l in &index.loadings {
        wtr.write_record([l.feature.as_str(), fmt_value(l.weight, 6).as_str()])?;
    }
    finish(wtr)
}

// ─── Screener ───────────────────────────────────────────────────────

/// Screener records sorted by country asc, category asc, correlation desc.
/// Undefined correlations go last within their category; ticker breaks
/// remaining ties.
pub fn sorted_records(records: &[ScreenerRecord]) -> Vec<&ScreenerRecord> {
    let mut sorted: Vec<&ScreenerRecord> = records.iter().collect();
    sorted.sort_by(|a, b| {
        a.country
            .cmp(&b.country)
            .then(a.category.cmp(&b.category))
            .then(descending_nan_last(a.correlation_to_index, b.correlation_to_index))
            .then(a.ticker.cmp(&b.ticker))
    });
    sorted
}

fn descending_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}

/// Columns: country, ticker, company_name, correlation_to_index, category,
/// avg_return_30d, volatility_30d, data_points
pub fn export_screener_csv(records: &[ScreenerRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "country",
        "ticker",
        "company_name",
        "correlation_to_index",
        "category",
        "avg_return_30d",
        "volatility_30d",
        "data_points",
    ])?;
    for r in sorted_records(records) {
        wtr.write_record([
            r.country.as_str(),
            r.ticker.as_str(),
            r.company_name.as_str(),
            fmt_value(r.correlation_to_index, 3).as_str(),
            r.category.as_str(),
            fmt_value(r.avg_return_30d, 2).as_str(),
            fmt_value(r.volatility_30d, 2).as_str(),
            r.data_points.to_string().as_str(),
        ])?;
    }
    finish(wtr)
}

/// Write the screener file, or return `None` without writing when there are
/// no records. A stale file from an earlier run is removed in that case.
pub fn write_screener(records: &[ScreenerRecord], output_dir: &Path) -> Result<Option<PathBuf>> {
    let path = output_dir.join(SCREENER_FILE);
    if records.is_empty() {
        tracing::warn!("no stocks qualified, screener file not written");
        remove_stale(&path)?;
        return Ok(None);
    }
    let csv = export_screener_csv(records)?;
    std::fs::write(&path, csv).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(Some(path))
}

fn remove_stale(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("failed to remove stale {}", path.display()))?;
        tracing::info!(path = %path.display(), "removed stale artifact");
    }
    Ok(())
}

/// File name of one country's loading vector.
pub fn loadings_file(country_code: &str) -> String {
    format!("{country_code}_loadings.csv")
}

// ─── Feature matrix ─────────────────────────────────────────────────

/// Columns: date, then every feature column in matrix order.
pub fn export_featured_csv(matrix: &FeatureMatrix) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["date"];
    header.extend(matrix.column_names());
    wtr.write_record(&header)?;

    for (i, date) in matrix.dates().iter().enumerate() {
        let mut row = vec![date.to_string()];
        row.extend(matrix.columns().iter().map(|c| fmt_value(c.values[i], 6)));
        wtr.write_record(&row)?;
    }
    finish(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Paths of everything a run wrote.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub full_index: PathBuf,
    pub index_data: PathBuf,
    pub screener: Option<PathBuf>,
    pub loadings: Vec<PathBuf>,
    pub featured: PathBuf,
    pub summary: PathBuf,
}

/// Save the full artifact set for a run into `output_dir`, replacing the
/// previous run's files.
pub fn save_artifacts(
    result: &PipelineResult,
    config: &PipelineConfig,
    output_dir: &Path,
) -> Result<ArtifactPaths> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;

    let write = |name: &str, content: String| -> Result<PathBuf> {
        let path = output_dir.join(name);
        std::fs::write(&path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote artifact");
        Ok(path)
    };

    let full_index = write(FULL_INDEX_FILE, export_full_index_csv(&result.countries)?)?;
    let index_data = write(
        INDEX_DATA_FILE,
        export_index_data_csv(&result.countries, config.index.top_drivers)?,
    )?;

    let mut loadings = Vec::with_capacity(result.countries.len());
    for c in &result.countries {
        loadings.push(write(&loadings_file(&c.country.code), export_loadings_csv(&c.index)?)?);
    }
    // A country without an index this run must not keep last run's loadings.
    for country in &config.countries {
        if !result.countries.iter().any(|c| c.country.code == country.code) {
            remove_stale(&output_dir.join(loadings_file(&country.code)))?;
        }
    }

    let records: Vec<ScreenerRecord> = result
        .countries
        .iter()
        .flat_map(|c| c.screen.records.iter().cloned())
        .collect();
    let screener = write_screener(&records, output_dir)?;

    let featured = write(FEATURED_FILE, export_featured_csv(&result.data.featured)?)?;

    let summary = RunSummary::from_result(result, config);
    let json = serde_json::to_string_pretty(&summary).context("failed to serialize run summary")?;
    let summary = write(SUMMARY_FILE, json)?;

    Ok(ArtifactPaths {
        full_index,
        index_data,
        screener,
        loadings,
        featured,
        summary,
    })
}
