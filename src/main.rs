//! seodash - SEO performance dashboard
//!
//! A CLI tool that loads a search-console performance export and a content
//! metadata table, aggregates them into the dashboard's derived views, and
//! writes a Markdown or JSON report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Error (configuration, missing column, invalid value, write failure, etc.)

mod analysis;
mod cli;
mod config;
mod error;
mod loader;
mod models;
mod report;

use anyhow::{bail, Context, Result};
use analysis::PipelineOptions;
use cli::{Args, OutputFormat};
use config::{Config, DEFAULT_CONFIG_FILE};
use loader::{ColumnNames, DataSources, Session};
use models::{Dashboard, DashboardMetadata};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        if let Err(e) = handle_init_config() {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    // Load configuration before logging so [general] verbose can apply
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(&args, &config);

    info!("seodash v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Configuration: {:?}", config);

    if let Err(e) = run(&args, &config) {
        error!("Dashboard failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Handle --init-config: generate a default .seodash.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        bail!(
            "{} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to set input files, column names and policies.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = if config.general.verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load the tables, build the dashboard and write the report.
fn run(args: &Args, config: &Config) -> Result<()> {
    let start_time = Instant::now();

    let (performance, metadata) = match (&config.data.performance, &config.data.metadata) {
        (Some(p), Some(m)) => (p.clone(), m.clone()),
        (None, _) => {
            bail!("No performance table given (use --performance or [data] performance)")
        }
        (_, None) => bail!("No metadata table given (use --metadata or [data] metadata)"),
    };

    // Step 1: Load both tables once for this run
    if !args.quiet {
        println!("📥 Loading tables...");
        println!("   Performance: {}", performance.display());
        println!("   Metadata:    {}", metadata.display());
    }

    let session = Session::load(DataSources {
        performance,
        metadata,
        columns: ColumnNames::from(&config.columns),
        show_progress: !args.quiet,
    })?;

    // Handle --check: validate inputs and exit
    if args.check {
        return handle_check(&session, config);
    }

    // Step 2: Aggregate
    let options = PipelineOptions {
        duplicate_pages: config.pipeline.duplicate_pages,
        unclustered: config.pipeline.unclustered,
    };
    info!(
        "Building dashboard (duplicate pages: {}, unclustered: {})",
        options.duplicate_pages, options.unclustered
    );

    let metrics = analysis::build_metrics(session.performance(), session.metadata(), options)?;

    if session.performance().is_empty() {
        warn!("Performance table has no rows; the dashboard will be empty");
    }

    let dashboard = Dashboard {
        metadata: DashboardMetadata {
            title: config.report.title.clone(),
            performance_source: session.sources().performance.display().to_string(),
            metadata_source: session.sources().metadata.display().to_string(),
            performance_rows: session.performance().len(),
            metadata_rows: session.metadata().len(),
            generated_at: session.loaded_at(),
            duplicate_pages: options.duplicate_pages,
            unclustered: options.unclustered,
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        metrics,
    };

    // Step 3: Render and save the report
    let output = match config.report.format {
        OutputFormat::Json => report::generate_json_report(&dashboard)?,
        OutputFormat::Markdown => report::generate_markdown_report(&dashboard),
    };

    let output_path = Path::new(&config.general.output);
    std::fs::write(output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    if !args.quiet {
        let summary = &dashboard.metrics.summary;
        println!("\n📊 Key Metrics:");
        println!(
            "   Total Clicks: {}",
            report::generator::format_thousands(summary.total_clicks)
        );
        println!(
            "   Total Impressions: {}",
            report::generator::format_thousands(summary.total_impressions)
        );
        println!("   Average CTR: {:.2}%", summary.average_ctr);
        match summary.average_position {
            Some(position) => println!("   Average Position: {:.2}", position),
            None => println!("   Average Position: n/a"),
        }
        println!(
            "\n✅ Dashboard complete! Report saved to: {}",
            output_path.display()
        );
    }

    Ok(())
}

/// Handle --check: validate tables and the join, without aggregating.
fn handle_check(session: &Session, config: &Config) -> Result<()> {
    let enriched = analysis::join(
        session.performance(),
        session.metadata(),
        config.pipeline.duplicate_pages,
    )?;
    let matched = enriched.iter().filter(|e| e.cluster.is_some()).count();

    println!("\n🔍 Check: both tables loaded and validated.\n");
    println!("   Performance rows: {}", session.performance().len());
    println!("   Metadata rows:    {}", session.metadata().len());
    println!("   Rows with a cluster: {}/{}", matched, enriched.len());
    println!("\n✅ Check complete. No report was written.");
    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so problems go straight to stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Ignoring {}: {:#}", DEFAULT_CONFIG_FILE, e);
            Ok(Config::default())
        }
    }
}
