//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::view::{ChartKind, Scene};
use clap::Parser;
use std::path::PathBuf;

/// foodwatch - food-safety incident dashboard data
///
/// Aggregate a food-safety incident dataset into chart-ready bar and
/// time-series data, written as a Markdown or JSON report.
///
/// Examples:
///   foodwatch
///   foodwatch --input data/food.csv --scene adulterant-severity
///   foodwatch --chart timeseries --all-scenes --format json -o charts.json
///   foodwatch --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Incident CSV to load (file path or http(s) URL)
    ///
    /// Defaults to the location in .foodwatch.toml, or the original
    /// dashboard dataset.
    #[arg(short, long, value_name = "PATH|URL", env = "FOODWATCH_INPUT")]
    pub input: Option<String>,

    /// Scene to render
    #[arg(short, long, value_name = "SCENE", conflicts_with = "all_scenes")]
    pub scene: Option<Scene>,

    /// Chart kind to render
    #[arg(long, value_name = "KIND")]
    pub chart: Option<ChartKind>,

    /// Render every scene with the selected chart kind
    #[arg(long)]
    pub all_scenes: bool,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Output file path for the report ("-" for stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .foodwatch.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Download timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Column holding the detection date
    #[arg(long, value_name = "NAME")]
    pub date_field: Option<String>,

    /// Exit with code 2 when a rendered view has no data
    #[arg(long)]
    pub fail_on_empty: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .foodwatch.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref input) = self.input {
            if input.trim().is_empty() {
                return Err("Input location must not be empty".to_string());
            }
        }

        if let Some(ref field) = self.date_field {
            if field.trim().is_empty() {
                return Err("Date field must not be empty".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
