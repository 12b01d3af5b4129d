//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.seodash.toml` files.

use crate::cli::OutputFormat;
use crate::models::{DuplicatePagePolicy, UnclusteredPolicy};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".seodash.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Input file locations.
    #[serde(default)]
    pub data: DataConfig,

    /// Header names in the input files.
    #[serde(default)]
    pub columns: ColumnConfig,

    /// Aggregation policies.
    #[serde(default)]
    pub pipeline: PipelineConfig,

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

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "seo_dashboard.md".to_string()
}

/// Input table locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataConfig {
    /// Search-console performance CSV.
    #[serde(default)]
    pub performance: Option<PathBuf>,

    /// Content metadata CSV.
    #[serde(default)]
    pub metadata: Option<PathBuf>,
}

/// Header names to match in the input files (case-insensitive).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnConfig {
    #[serde(default = "default_page")]
    pub page: String,
    #[serde(default = "default_date")]
    pub date: String,
    #[serde(default = "default_clicks")]
    pub clicks: String,
    #[serde(default = "default_impressions")]
    pub impressions: String,
    #[serde(default = "default_position")]
    pub position: String,
    #[serde(default = "default_cluster")]
    pub cluster: String,
    #[serde(default = "default_date_published")]
    pub date_published: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            page: default_page(),
            date: default_date(),
            clicks: default_clicks(),
            impressions: default_impressions(),
            position: default_position(),
            cluster: default_cluster(),
            date_published: default_date_published(),
        }
    }
}

fn default_page() -> String {
    "page".to_string()
}

fn default_date() -> String {
    "date".to_string()
}

fn default_clicks() -> String {
    "clicks".to_string()
}

fn default_impressions() -> String {
    "impressions".to_string()
}

fn default_position() -> String {
    "position".to_string()
}

fn default_cluster() -> String {
    "cluster".to_string()
}

fn default_date_published() -> String {
    "date_published".to_string()
}

/// Aggregation policy settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// What to do when metadata lists a page more than once.
    #[serde(default)]
    pub duplicate_pages: DuplicatePagePolicy,

    /// Whether pages without a cluster get their own bucket or are dropped.
    #[serde(default)]
    pub unclustered: UnclusteredPolicy,
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Output format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Report title.
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            title: default_title(),
        }
    }
}

fn default_title() -> String {
    "SEO Performance Analysis Dashboard".to_string()
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
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

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
        if let Some(ref performance) = args.performance {
            self.data.performance = Some(performance.clone());
        }
        if let Some(ref metadata) = args.metadata {
            self.data.metadata = Some(metadata.clone());
        }

        if let Some(policy) = args.duplicate_pages {
            self.pipeline.duplicate_pages = policy;
        }
        if let Some(policy) = args.unclustered {
            self.pipeline.unclustered = policy;
        }

        if let Some(format) = args.format {
            self.report.format = format;
        }
        if let Some(ref title) = args.title {
            self.report.title = title.clone();
        }

        match args.output {
            Some(ref output) => self.general.output = output.display().to_string(),
            // Keep the default file name in step with the chosen format.
            None if self.general.output == default_output()
                && self.report.format == OutputFormat::Json =>
            {
                self.general.output = "seo_dashboard.json".to_string();
            }
            None => {}
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
