//! Dashboard report generation.
//!
//! This module renders a [`Dashboard`] as Markdown or JSON. It only formats
//! values; every number shown is computed by the analysis pipeline.

use crate::models::{
    weekday_name, ClusterMetric, CorrelationMatrix, Dashboard, DashboardMetadata, MonthlyMetric,
    PublicationFrequency, SummaryMetrics, UnclusteredShare, WeekdayMetric,
};
use anyhow::Result;

/// Label used for the cluster bucket of pages without metadata.
pub const UNCLUSTERED_LABEL: &str = "(unclustered)";

/// Generate a complete Markdown report.
pub fn generate_markdown_report(dashboard: &Dashboard) -> String {
    let metrics = &dashboard.metrics;
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", dashboard.metadata.title));
    output.push_str(&generate_metadata_section(&dashboard.metadata));
    output.push_str(&generate_table_of_contents());
    output.push_str(&generate_key_metrics_section(&metrics.summary));
    output.push_str(&generate_monthly_section(&metrics.monthly));
    output.push_str(&generate_cluster_section(
        &metrics.clusters,
        metrics.unclustered.as_ref(),
    ));
    output.push_str(&generate_correlation_section(&metrics.correlation));
    output.push_str(&generate_weekday_section(&metrics.weekdays));
    output.push_str(&generate_publication_section(&metrics.publications));
    output.push_str(&generate_footer());

    output
}

/// Generate a JSON report.
pub fn generate_json_report(dashboard: &Dashboard) -> Result<String> {
    serde_json::to_string_pretty(dashboard).map_err(Into::into)
}

/// Format a count with thousands separators, e.g. `1,234,567`.
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }

    out
}

/// Escape text for a Markdown table cell so a `|` cannot end the cell.
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

/// Wrap text in an inline code span fenced longer than any backtick run in it.
fn code_span(text: &str) -> String {
    let longest_run = text
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest_run + 1);
    if longest_run > 0 {
        format!("{fence} {text} {fence}")
    } else {
        format!("{fence}{text}{fence}")
    }
}

/// Format an optional value with fixed decimals, `n/a` when absent.
fn format_optional(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", decimals, v),
        None => "n/a".to_string(),
    }
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &DashboardMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Performance Data:** {} ({} rows)\n",
        code_span(&metadata.performance_source),
        format_thousands(metadata.performance_rows as u64)
    ));
    section.push_str(&format!(
        "- **Content Metadata:** {} ({} rows)\n",
        code_span(&metadata.metadata_source),
        format_thousands(metadata.metadata_rows as u64)
    ));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Policies:** duplicate pages = `{}`, unclustered pages = `{}`\n",
        metadata.duplicate_pages, metadata.unclustered
    ));
    section.push_str(&format!(
        "- **Duration:** {:.2}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the table of contents.
fn generate_table_of_contents() -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Key Metrics](#key-metrics)\n");
    toc.push_str("- [1. Monthly Traffic Trends](#1-monthly-traffic-trends)\n");
    toc.push_str("- [2. Content Category Analysis](#2-content-category-analysis)\n");
    toc.push_str("- [3. Correlation Analysis](#3-correlation-analysis)\n");
    toc.push_str("- [4. Weekly Patterns](#4-weekly-patterns)\n");
    toc.push_str("- [5. Publication Frequency](#5-publication-frequency)\n");
    toc.push('\n');

    toc
}

/// Generate the headline metrics table.
fn generate_key_metrics_section(summary: &SummaryMetrics) -> String {
    let mut section = String::new();

    section.push_str("## Key Metrics\n\n");
    section.push_str("| Total Clicks | Total Impressions | Average CTR | Average Position |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {:.2}% | {} |\n\n",
        format_thousands(summary.total_clicks),
        format_thousands(summary.total_impressions),
        summary.average_ctr,
        format_optional(summary.average_position, 2)
    ));

    section
}

/// Generate the monthly trends table.
fn generate_monthly_section(monthly: &[MonthlyMetric]) -> String {
    let mut section = String::new();

    section.push_str("## 1. Monthly Traffic Trends\n\n");

    if monthly.is_empty() {
        section.push_str("No performance data.\n\n");
        return section;
    }

    section.push_str("| Month | Clicks | Impressions | Avg Position |\n");
    section.push_str("|:---|---:|---:|---:|\n");
    for m in monthly {
        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            m.month,
            format_thousands(m.total_clicks),
            format_thousands(m.total_impressions),
            format_optional(m.mean_position, 2)
        ));
    }
    section.push('\n');

    section
}

/// Generate the content cluster table.
fn generate_cluster_section(
    clusters: &[ClusterMetric],
    unclustered: Option<&UnclusteredShare>,
) -> String {
    let mut section = String::new();

    section.push_str("## 2. Content Category Analysis\n\n");

    if clusters.is_empty() {
        section.push_str("No clustered pages.\n\n");
    } else {
        section.push_str("| Cluster | Clicks | Impressions | CTR | Avg Position |\n");
        section.push_str("|:---|---:|---:|---:|---:|\n");
        for c in clusters {
            section.push_str(&format!(
                "| {} | {} | {} | {:.2}% | {} |\n",
                escape_cell(c.cluster.as_deref().unwrap_or(UNCLUSTERED_LABEL)),
                format_thousands(c.total_clicks),
                format_thousands(c.total_impressions),
                c.ctr * 100.0,
                format_optional(c.mean_position, 2)
            ));
        }
        section.push('\n');
    }

    if let Some(share) = unclustered.filter(|s| s.rows > 0) {
        section.push_str(&format!(
            "*Not shown: {} rows without a cluster ({} clicks, {} impressions).*\n\n",
            format_thousands(share.rows as u64),
            format_thousands(share.clicks),
            format_thousands(share.impressions)
        ));
    }

    section
}

/// Generate the correlation matrix table.
fn generate_correlation_section(matrix: &CorrelationMatrix) -> String {
    let mut section = String::new();

    section.push_str("## 3. Correlation Analysis\n\n");
    section.push_str(&format!("| | {} |\n", matrix.columns.join(" | ")));
    section.push_str("|:---|---:|---:|---:|\n");

    for (i, name) in matrix.columns.iter().enumerate() {
        let cells: Vec<String> = (0..matrix.columns.len())
            .map(|j| format_optional(matrix.get(i, j), 3))
            .collect();
        section.push_str(&format!("| **{}** | {} |\n", name, cells.join(" | ")));
    }
    section.push('\n');

    if matrix.values.iter().flatten().any(Option::is_none) {
        section.push_str(
            "*n/a: fewer than two rows or no variance in one of the columns.*\n\n",
        );
    }

    section
}

/// Generate the day-of-week table.
fn generate_weekday_section(weekdays: &[WeekdayMetric]) -> String {
    let mut section = String::new();

    section.push_str("## 4. Weekly Patterns\n\n");
    section.push_str("| Day | Avg Clicks | Avg Impressions | Avg Position |\n");
    section.push_str("|:---|---:|---:|---:|\n");
    for w in weekdays {
        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            weekday_name(w.weekday),
            format_optional(w.mean_clicks, 2),
            format_optional(w.mean_impressions, 2),
            format_optional(w.mean_position, 2)
        ));
    }
    section.push('\n');

    section
}

/// Generate the publication frequency table.
fn generate_publication_section(publications: &[PublicationFrequency]) -> String {
    let mut section = String::new();

    section.push_str("## 5. Publication Frequency\n\n");

    if publications.is_empty() {
        section.push_str("No content metadata.\n\n");
        return section;
    }

    section.push_str("| Month | Pages Published |\n");
    section.push_str("|:---|---:|\n");
    for p in publications {
        section.push_str(&format!(
            "| {} | {} |\n",
            p.month,
            format_thousands(p.publication_count as u64)
        ));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by seodash v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}
