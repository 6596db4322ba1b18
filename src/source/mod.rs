//! Incident dataset loading.
//!
//! This module reads the incident CSV from disk or over HTTP and turns it
//! into records for the aggregator.

pub mod loader;

pub use loader::{load_records, DataSource, SourceOptions};

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading a dataset.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("dataset is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}
