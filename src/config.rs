//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.foodwatch.toml` files.

use crate::analysis::{DateSpec, DEFAULT_DATE_FORMAT};
use crate::models::DETECTION_DATE;
use crate::view::{ChartKind, Scene};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = ".foodwatch.toml";

/// Dataset the dashboard was built around.
pub const DEFAULT_DATA_URL: &str = "https://gist.githubusercontent.com/psuiuc/cf86c74b75aacad4b31600dcf79b33b1/raw/1c4b6cbc58bd3903a9c2597aff280d8992e5d46c/food.csv";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Dataset settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
        }
    }
}

impl GeneralConfig {
    /// True when the report goes to stdout (`output = "-"`).
    pub fn writes_to_stdout(&self) -> bool {
        self.output == "-"
    }
}

fn default_output() -> String {
    "foodwatch_report.md".to_string()
}

/// Where the incident data comes from and how to read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// File path or HTTP(S) URL of the incident CSV.
    #[serde(default = "default_location")]
    pub location: String,

    /// Download timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Column holding the detection date.
    #[serde(default = "default_date_field")]
    pub date_field: String,

    /// chrono format of the detection date.
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            location: default_location(),
            timeout_seconds: default_timeout(),
            date_field: default_date_field(),
            date_format: default_date_format(),
        }
    }
}

impl SourceConfig {
    /// Date column and format as a `DateSpec`.
    pub fn date_spec(&self) -> DateSpec {
        DateSpec {
            field: self.date_field.clone(),
            format: self.date_format.clone(),
        }
    }
}

fn default_location() -> String {
    DEFAULT_DATA_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_date_field() -> String {
    DETECTION_DATE.to_string()
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Scene rendered when none is given on the command line.
    #[serde(default)]
    pub scene: Scene,

    /// Chart kind rendered when none is given on the command line.
    #[serde(default)]
    pub chart: ChartKind,

    /// Include stacked segment tables for bar charts.
    #[serde(default = "default_true")]
    pub include_segments: bool,

    /// Include per-series listings for line charts.
    #[serde(default = "default_true")]
    pub include_series: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            scene: Scene::default(),
            chart: ChartKind::default(),
            include_segments: true,
            include_series: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref input) = args.input {
            self.source.location = input.clone();
        }
        if let Some(timeout) = args.timeout {
            self.source.timeout_seconds = timeout;
        }
        if let Some(ref field) = args.date_field {
            self.source.date_field = field.clone();
        }

        if let Some(scene) = args.scene {
            self.report.scene = scene;
        }
        if let Some(chart) = args.chart {
            self.report.chart = chart;
        }

        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
