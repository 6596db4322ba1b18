//! Dataset loading from a local file or an HTTP(S) URL.

use super::SourceError;
use crate::models::Record;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Where the incident CSV lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Path(PathBuf),
    Url(String),
}

impl DataSource {
    /// `http://` and `https://` locations are URLs; anything else is a path.
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            DataSource::Url(location.to_string())
        } else {
            DataSource::Path(PathBuf::from(location))
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Path(path) => write!(f, "{}", path.display()),
            DataSource::Url(url) => write!(f, "{}", url),
        }
    }
}

/// Options for loading a dataset.
#[derive(Debug, Clone)]
pub struct SourceOptions {
    /// HTTP request timeout in seconds.
    pub timeout_seconds: u64,
    /// Whether to show a spinner while downloading.
    pub show_progress: bool,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            show_progress: true,
        }
    }
}

/// A parsed dataset: its header and its rows.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// Column names from the header row, in file order.
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl Dataset {
    /// Fails if any of `names` is not a column of this dataset.
    pub fn require_columns(&self, names: &[&str]) -> Result<(), SourceError> {
        let missing: Vec<String> = names
            .iter()
            .filter(|name| !self.columns.iter().any(|c| c.as_str() == **name))
            .map(|name| name.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SourceError::MissingColumns(missing))
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Load and parse the dataset at `source`.
///
/// URLs are fetched once; a failed request is returned as an error.
pub async fn load_records(source: &DataSource, options: &SourceOptions) -> Result<Dataset, SourceError> {
    info!("Loading dataset from: {}", source);

    let text = match source {
        DataSource::Path(path) => {
            tokio::fs::read_to_string(path)
                .await
                .map_err(|err| SourceError::Io {
                    path: path.clone(),
                    source: err,
                })?
        }
        DataSource::Url(url) => fetch_text(url, options).await?,
    };

    let dataset = parse_csv(&text)?;
    info!(
        "Loaded {} records with {} columns",
        dataset.len(),
        dataset.columns.len()
    );

    Ok(dataset)
}

/// Download `url` as text.
async fn fetch_text(url: &str, options: &SourceOptions) -> Result<String, SourceError> {
    let http_error = |source: reqwest::Error| SourceError::Http {
        url: url.to_string(),
        source,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(options.timeout_seconds))
        .build()
        .map_err(http_error)?;

    let spinner = if options.show_progress {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("Downloading {}", url));
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let result = async {
        let response = client.get(url).send().await.map_err(http_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status,
            });
        }
        response.text().await.map_err(http_error)
    }
    .await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let text = result?;
    debug!("Downloaded {} bytes from {}", text.len(), url);
    Ok(text)
}

/// Parse CSV text with a header row into records.
///
/// Rows shorter than the header leave their trailing columns absent.
pub fn parse_csv(text: &str) -> Result<Dataset, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader.headers()?.iter().map(String::from).collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let fields: HashMap<String, String> = columns
            .iter()
            .cloned()
            .zip(row.iter().map(String::from))
            .collect();
        records.push(Record::new(fields));
    }

    Ok(Dataset { columns, records })
}
