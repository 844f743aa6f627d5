//! EMSI Runner: pipeline orchestration, run summaries and artifact export.
//!
//! This crate builds on `emsi-core` to provide:
//! - Data loading and feature matrix assembly
//! - The per-country index and screener pipeline
//! - Snapshot downloads for offline reruns
//! - CSV and JSON artifact export

pub mod data_loader;
pub mod download;
pub mod export;
pub mod pipeline;
pub mod summary;

pub use data_loader::{compute_dataset_hash, load_dataset, LoadError, LoadedData};
pub use download::{download_snapshot, DownloadSummary};
pub use export::{save_artifacts, write_screener, ArtifactPaths};
pub use pipeline::{
    country_columns, run_country, run_pipeline, CountryError, CountryFailure, CountryResult,
    PipelineResult,
};
pub use summary::{CountryStatus, CountrySummary, RunSummary};
