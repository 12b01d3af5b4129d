//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::{DuplicatePagePolicy, UnclusteredPolicy};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// seodash - SEO performance dashboard
///
/// Aggregates a search-console performance export and a content metadata
/// table into monthly, cluster, weekday and publication views, a
/// correlation matrix and headline metrics.
///
/// Examples:
///   seodash --performance gsc.csv --metadata metadata.csv
///   seodash --performance gsc.csv --metadata metadata.csv --format json
///   seodash --performance gsc.csv --metadata metadata.csv --unclustered drop
///   seodash --performance gsc.csv --metadata metadata.csv --check
///   seodash --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Search-console performance CSV (page, date, clicks, impressions, position)
    #[arg(short, long, value_name = "FILE", env = "SEODASH_PERFORMANCE")]
    pub performance: Option<PathBuf>,

    /// Content metadata CSV (page, cluster, date_published)
    #[arg(short, long, value_name = "FILE", env = "SEODASH_METADATA")]
    pub metadata: Option<PathBuf>,

    /// Output file path for the report
    ///
    /// Defaults to seo_dashboard.md (or .json with --format json).
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .seodash.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// How to resolve pages listed more than once in the metadata
    ///
    /// first: keep the first row in file order. reject: fail the run.
    #[arg(long, value_name = "POLICY")]
    pub duplicate_pages: Option<DuplicatePagePolicy>,

    /// How to treat pages without a cluster in the cluster table
    ///
    /// bucket: group them as "(unclustered)". drop: leave them out and
    /// report their share separately.
    #[arg(long, value_name = "POLICY")]
    pub unclustered: Option<UnclusteredPolicy>,

    /// Report title
    #[arg(long, value_name = "TEXT")]
    pub title: Option<String>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Load and validate both tables, then exit without aggregating
    #[arg(long)]
    pub check: bool,

    /// Generate a default .seodash.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
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

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Input files, when given on the command line, must exist
        for (flag, path) in [
            ("--performance", &self.performance),
            ("--metadata", &self.metadata),
        ] {
            if let Some(path) = path {
                if !path.is_file() {
                    return Err(format!("{} file does not exist: {}", flag, path.display()));
                }
            }
        }

        if let Some(ref title) = self.title {
            if title.trim().is_empty() {
                return Err("Title must not be empty".to_string());
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

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn make_args() -> Args {
        Args {
            performance: Some(PathBuf::from("Cargo.toml")),
            metadata: Some(PathBuf::from("Cargo.toml")),
            output: None,
            format: None,
            config: None,
            duplicate_pages: None,
            unclustered: None,
            title: None,
            verbose: false,
            quiet: false,
            check: false,
            init_config: false,
        }
    }

    #[test]
    fn test_validation_accepts_existing_files() {
        let args = make_args();
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_missing_file() {
        let mut args = make_args();
        args.performance = Some(PathBuf::from("does/not/exist.csv"));
        let err = args.validate().unwrap_err();
        assert!(err.contains("--performance"));
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_skipped_for_init_config() {
        let mut args = make_args();
        args.metadata = Some(PathBuf::from("does/not/exist.csv"));
        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_parse_policies_from_flags() {
        let args = Args::try_parse_from([
            "seodash",
            "--duplicate-pages",
            "reject",
            "--unclustered",
            "drop",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(args.duplicate_pages, Some(DuplicatePagePolicy::Reject));
        assert_eq!(args.unclustered, Some(UnclusteredPolicy::Drop));
        assert_eq!(args.format, Some(OutputFormat::Json));
    }
}
