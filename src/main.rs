//! foodwatch - food-safety incident dashboard data
//!
//! A CLI tool that loads a food-safety incident dataset, aggregates it
//! into stacked bar and monthly time-series chart data, and writes the
//! result as a Markdown or JSON report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad arguments, config, unreadable dataset, etc.)
//!   2 - A rendered view had no data and --fail-on-empty was set

mod analysis;
mod cli;
mod config;
mod models;
mod report;
mod source;
mod view;

use analysis::DateSpec;
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use models::{DashboardReport, Record, ReportMetadata};
use source::{DataSource, SourceOptions};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use view::{ChartKind, Scene, ViewEvent, ViewState};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("foodwatch v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .foodwatch.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to change the dataset location, date format, and default scene.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    // Logs go to stderr so `--output -` keeps stdout clean.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Load, aggregate and write the report. Returns exit code (0 or 2).
async fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let to_stdout = config.general.writes_to_stdout();
    let chatty = !args.quiet && !to_stdout;

    let views = requested_views(&args, &config);
    let dates = config.source.date_spec();

    // Step 1: Load the dataset
    let data_source = DataSource::parse(&config.source.location);
    if chatty {
        println!("📥 Loading incidents: {}", data_source);
    }

    let options = SourceOptions {
        timeout_seconds: config.source.timeout_seconds,
        show_progress: chatty,
    };
    let mut dataset = source::load_records(&data_source, &options)
        .await
        .with_context(|| format!("Failed to load dataset from {}", data_source))?;

    if dataset.is_empty() {
        warn!("Dataset at {} has no records", data_source);
    }

    // Step 2: Check every column the views need before aggregating
    for state in &views {
        let (attr1, attr2) = state.scene.attributes();
        let mut needed = vec![attr1, attr2];
        if state.chart == ChartKind::Timeseries {
            needed.push(dates.field.as_str());
        }
        dataset
            .require_columns(&needed)
            .with_context(|| format!("Cannot render scene {}", state.scene))?;
    }

    analysis::sort_records_by_date(&mut dataset.records, &dates);
    let records_undated = count_undated(&views, &dataset.records, &dates);
    if records_undated > 0 {
        warn!(
            "{} records have no parseable {} and are left out of time series",
            records_undated, dates.field
        );
    }

    // Step 3: Render each view
    if chatty {
        println!("📊 Aggregating {} records...", dataset.len());
    }

    let rendered: Vec<_> = views
        .iter()
        .map(|&state| {
            let chart = view::render(state, &dataset.records, &dates);
            info!(
                "Rendered {} ({}){}",
                state.scene,
                state.chart,
                if chart.is_empty() { " with no data" } else { "" }
            );
            chart
        })
        .collect();

    let report = DashboardReport {
        metadata: ReportMetadata {
            source: data_source.to_string(),
            generated_at: Utc::now(),
            records_loaded: dataset.len(),
            records_undated,
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        views: rendered,
    };

    // Step 4: Generate and save the report
    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report, &config.report),
    };

    if to_stdout {
        print!("{}", output);
    } else {
        let path = &config.general.output;
        std::fs::write(path, &output)
            .with_context(|| format!("Failed to write report to {}", path))?;

        if chatty {
            println!("\n📝 Summary:");
            println!("   Records: {} ({} undated)", dataset.len(), records_undated);
            for chart in &report.views {
                println!("   - {} ({})", chart.scene().title(), chart.kind());
            }
            println!("\n✅ Report saved to: {}", path);
        }
    }

    if args.fail_on_empty && report.has_empty_view() {
        eprintln!("\n⛔ At least one view has no data. Failing (exit code 2).");
        return Ok(2);
    }

    Ok(0)
}

/// The views to render, from the merged config and flags.
fn requested_views(args: &Args, config: &Config) -> Vec<ViewState> {
    let base = ViewState::default()
        .apply(ViewEvent::SelectScene(config.report.scene))
        .apply(ViewEvent::SelectChart(config.report.chart));

    if args.all_scenes {
        Scene::ALL
            .iter()
            .map(|&scene| base.apply(ViewEvent::SelectScene(scene)))
            .collect()
    } else {
        vec![base]
    }
}

/// Records with no parseable date, counted only when a time-series view is requested.
fn count_undated(views: &[ViewState], records: &[Record], dates: &DateSpec) -> usize {
    if !views.iter().any(|v| v.chart == ChartKind::Timeseries) {
        return 0;
    }
    records.iter().filter(|r| dates.date_of(r).is_none()).count()
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
