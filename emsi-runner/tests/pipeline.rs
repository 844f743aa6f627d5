use chrono::NaiveDate;
use emsi_core::config::PipelineConfig;
use emsi_core::data::{DataError, DataSource, PriceProvider, SyntheticProvider};
use emsi_core::series::TimeSeries;
use emsi_runner::export::{FULL_INDEX_FILE, INDEX_DATA_FILE, SCREENER_FILE, SUMMARY_FILE};
use emsi_runner::{run_pipeline, save_artifacts, CountryStatus, LoadError, RunSummary};

/// Synthetic prices with selected symbols failing, coming back empty or
/// closed on their own market holidays.
struct Scripted {
    inner: SyntheticProvider,
    failing: Vec<String>,
    empty: Vec<String>,
    holidays: Vec<(String, NaiveDate)>,
}

impl Scripted {
    fn new() -> Self {
        Self {
            inner: SyntheticProvider::new(),
            failing: Vec::new(),
            empty: Vec::new(),
            holidays: Vec::new(),
        }
    }
}

impl PriceProvider for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    fn source(&self) -> DataSource {
        DataSource::InMemory
    }

    fn fetch_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<TimeSeries, DataError> {
        if self.failing.iter().any(|s| s == symbol) {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        if self.empty.iter().any(|s| s == symbol) {
            return Ok(TimeSeries::empty(symbol));
        }
        let closes = self.inner.closes(symbol, start, end);
        let open = closes.iter().filter(|(d, _)| {
            !self
                .holidays
                .iter()
                .any(|(s, h)| s == symbol && h == d)
        });
        Ok(TimeSeries::from_points(symbol, open))
    }
}

fn config() -> PipelineConfig {
    let mut config = PipelineConfig::default_emerging_markets();
    config.start_date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    config.end_date = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
    config
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Local closures that fall on weekdays every other market trades.
fn staggered_holidays() -> Vec<(String, NaiveDate)> {
    [
        ("^BVSP", date(2023, 2, 20)),
        ("^BVSP", date(2023, 2, 21)),
        ("^BVSP", date(2023, 4, 21)),
        ("^NSEI", date(2023, 3, 7)),
        ("^NSEI", date(2023, 8, 15)),
        ("^J203.JO", date(2023, 3, 21)),
        ("^J203.JO", date(2023, 6, 16)),
        ("^WIG20", date(2023, 5, 3)),
        ("^WIG20", date(2023, 11, 1)),
        ("PLNUSD=X", date(2023, 12, 26)),
    ]
    .into_iter()
    .map(|(s, d)| (s.to_string(), d))
    .collect()
}

fn all_equities(config: &PipelineConfig) -> Vec<String> {
    config
        .countries
        .iter()
        .flat_map(|c| c.equities.iter().map(|e| e.ticker.clone()))
        .collect()
}

#[test]
fn two_runs_on_identical_input_are_byte_identical() {
    let config = config();
    let provider = SyntheticProvider::new();
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();

    let first = run_pipeline(&config, &provider, None).unwrap();
    save_artifacts(&first, &config, a.path()).unwrap();
    let second = run_pipeline(&config, &provider, None).unwrap();
    save_artifacts(&second, &config, b.path()).unwrap();

    let mut names: Vec<String> = std::fs::read_dir(a.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert!(names.contains(&FULL_INDEX_FILE.to_string()));
    assert!(names.contains(&"BRA_loadings.csv".to_string()));
    for name in &names {
        let x = std::fs::read(a.path().join(name)).unwrap();
        let y = std::fs::read(b.path().join(name)).unwrap();
        assert_eq!(x, y, "{name} differs between runs");
    }
}

#[test]
fn rerun_overwrites_previous_artifacts() {
    let config = config();
    let dir = tempfile::tempdir().unwrap();
    let result = run_pipeline(&config, &SyntheticProvider::new(), None).unwrap();
    save_artifacts(&result, &config, dir.path()).unwrap();
    let before = std::fs::read(dir.path().join(INDEX_DATA_FILE)).unwrap();

    let other = run_pipeline(&config, &SyntheticProvider::with_salt("rerun"), None).unwrap();
    save_artifacts(&other, &config, dir.path()).unwrap();
    let after = std::fs::read(dir.path().join(INDEX_DATA_FILE)).unwrap();
    assert_ne!(before, after);
}

#[test]
fn index_data_has_one_row_per_country_and_driver_columns() {
    let config = config();
    let dir = tempfile::tempdir().unwrap();
    let result = run_pipeline(&config, &SyntheticProvider::new(), None).unwrap();
    save_artifacts(&result, &config, dir.path()).unwrap();

    let content = std::fs::read_to_string(dir.path().join(INDEX_DATA_FILE)).unwrap();
    let mut lines = content.lines();
    let header: Vec<&str> = lines.next().unwrap().split(',').collect();
    assert_eq!(header.len(), 4 + 4 * 3);
    assert_eq!(&header[..5], &["date", "country_code", "stability_index", "outlook", "positive_driver_1_name"]);
    assert_eq!(header[15], "negative_driver_3_value");
    assert_eq!(lines.count(), 4);

    let full = std::fs::read_to_string(dir.path().join(FULL_INDEX_FILE)).unwrap();
    assert_eq!(full.lines().next().unwrap(), "date,BRA,IND,ZAF,POL");
}

#[test]
fn zero_qualifying_stocks_writes_no_screener_file() {
    let config = config();
    let mut provider = Scripted::new();
    provider.failing = all_equities(&config);
    let dir = tempfile::tempdir().unwrap();

    let result = run_pipeline(&config, &provider, None).unwrap();
    let paths = save_artifacts(&result, &config, dir.path()).unwrap();
    assert!(paths.screener.is_none());
    assert!(!dir.path().join(SCREENER_FILE).exists());

    let summary: RunSummary =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join(SUMMARY_FILE)).unwrap()).unwrap();
    assert_eq!(summary.screener_records, 0);
    for c in &summary.countries {
        assert_eq!(c.status, CountryStatus::Ok);
        assert_eq!(c.high_momentum + c.resilient_defender, 0);
        assert_eq!(c.skipped.no_data, 10);
    }
}

#[test]
fn failed_country_is_reported_and_others_continue() {
    let config = config();
    let mut provider = Scripted::new();
    provider.empty = vec!["PLNUSD=X".to_string()];
    let dir = tempfile::tempdir().unwrap();

    let result = run_pipeline(&config, &provider, None).unwrap();
    assert_eq!(result.countries.len(), 3);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].country, "POL");
    assert!(result.failures[0].error.to_string().contains("insufficient data for POL"));

    save_artifacts(&result, &config, dir.path()).unwrap();
    let full = std::fs::read_to_string(dir.path().join(FULL_INDEX_FILE)).unwrap();
    assert_eq!(full.lines().next().unwrap(), "date,BRA,IND,ZAF");
    assert!(!dir.path().join("POL_loadings.csv").exists());

    let summary = RunSummary::from_result(&result, &config);
    assert_eq!(summary.succeeded(), 3);
    assert_eq!(summary.failed(), 1);
    let pol = summary.countries.iter().find(|c| c.country == "POL").unwrap();
    assert_eq!(pol.status, CountryStatus::Failed);
    assert!(pol.reason.is_some());

    if let Ok(screener) = std::fs::read_to_string(dir.path().join(SCREENER_FILE)) {
        assert!(screener.lines().skip(1).all(|l| !l.starts_with("POL,")));
    }
}

#[test]
fn market_fetch_failure_aborts_the_run() {
    let config = config();
    let mut provider = Scripted::new();
    provider.failing = vec!["^NSEI".to_string()];
    let err = run_pipeline(&config, &provider, None).unwrap_err();
    assert!(matches!(err, LoadError::Market { ref symbol, .. } if symbol == "^NSEI"));
}

#[test]
fn screener_rows_respect_threshold_and_order() {
    let config = config();
    let dir = tempfile::tempdir().unwrap();
    let result = run_pipeline(&config, &SyntheticProvider::new(), None).unwrap();
    save_artifacts(&result, &config, dir.path()).unwrap();

    let Ok(content) = std::fs::read_to_string(dir.path().join(SCREENER_FILE)) else {
        assert_eq!(result.screener_record_count(), 0);
        return;
    };
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let rows: Vec<(String, String, f64)> = reader
        .records()
        .map(|r| {
            let r = r.unwrap();
            (r[0].to_string(), r[4].to_string(), r[3].parse().unwrap())
        })
        .collect();
    assert_eq!(rows.len(), result.screener_record_count());
    for w in rows.windows(2) {
        let (a, b) = (&w[0], &w[1]);
        assert!(
            (a.0.as_str(), a.1.as_str()) < (b.0.as_str(), b.1.as_str())
                || ((a.0 == b.0 && a.1 == b.1) && a.2 >= b.2)
        );
    }
    for (_, category, corr) in &rows {
        match category.as_str() {
            "High-Momentum Play" => assert!(*corr >= 0.02),
            "Resilient Defender" => assert!(*corr <= -0.02),
            other => panic!("unexpected category {other}"),
        }
    }
}

#[test]
fn market_holidays_keep_volatility_defined_after_warm_up() {
    let config = config();
    let mut provider = Scripted::new();
    provider.holidays = staggered_holidays();

    let result = run_pipeline(&config, &provider, None).unwrap();
    let featured = &result.data.featured;
    assert!(featured.has_column("^BVSP"));
    let bvsp_gap = featured.dates().iter().position(|d| *d == date(2023, 2, 20)).unwrap();
    assert!(featured.column("^BVSP").unwrap()[bvsp_gap].is_nan());

    let window = config.index.volatility_window;
    for column in featured.columns() {
        if !column.name.ends_with("_volatility") {
            continue;
        }
        let missing: Vec<NaiveDate> = column.values[window..]
            .iter()
            .zip(&featured.dates()[window..])
            .filter(|(v, _)| !v.is_finite())
            .map(|(_, d)| *d)
            .collect();
        assert!(missing.is_empty(), "{} undefined on {missing:?}", column.name);
    }

    assert!(result.failures.is_empty());
    for c in &result.countries {
        let rows = c.index.series.len();
        assert_eq!(rows, featured.nrows() - window, "{} lost rows", c.country.code);
    }
}

#[test]
fn rerun_removes_loadings_of_a_country_that_now_fails() {
    let config = config();
    let dir = tempfile::tempdir().unwrap();

    let first = run_pipeline(&config, &Scripted::new(), None).unwrap();
    save_artifacts(&first, &config, dir.path()).unwrap();
    assert!(dir.path().join("POL_loadings.csv").exists());

    let mut provider = Scripted::new();
    provider.empty = vec!["PLNUSD=X".to_string()];
    let second = run_pipeline(&config, &provider, None).unwrap();
    let paths = save_artifacts(&second, &config, dir.path()).unwrap();

    assert!(!dir.path().join("POL_loadings.csv").exists());
    assert!(dir.path().join("BRA_loadings.csv").exists());
    assert_eq!(paths.loadings.len(), 3);
}
