//! Metrics aggregation pipeline.
//!
//! Turns the performance and metadata tables into the derived tables the
//! dashboard presents. The join runs once; every derived table is then
//! computed independently from the same enriched records.

pub mod aggregator;
pub mod correlation;
pub mod join;

pub use aggregator::*;
pub use correlation::correlation_matrix;
pub use join::join;

use crate::error::Result;
use crate::models::{
    ContentMetadata, DuplicatePagePolicy, Metrics, PerformanceRecord, UnclusteredPolicy,
};
use tracing::{debug, warn};

/// Policies applied while building the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    pub duplicate_pages: DuplicatePagePolicy,
    pub unclustered: UnclusteredPolicy,
}

/// Run the whole pipeline over the two input tables.
pub fn build_metrics(
    performance: &[PerformanceRecord],
    metadata: &[ContentMetadata],
    options: PipelineOptions,
) -> Result<Metrics> {
    let enriched = join(performance, metadata, options.duplicate_pages)?;

    let unclustered = match options.unclustered {
        UnclusteredPolicy::Drop => {
            let share = unclustered_share(&enriched)?;
            if share.rows > 0 {
                warn!(
                    "{} performance rows without a cluster left out of the cluster table",
                    share.rows
                );
            }
            Some(share)
        }
        UnclusteredPolicy::Bucket => None,
    };

    let metrics = Metrics {
        summary: summary_metrics(&enriched)?,
        monthly: monthly_metrics(&enriched)?,
        clusters: cluster_metrics(&enriched, options.unclustered)?,
        unclustered,
        weekdays: weekday_metrics(&enriched),
        publications: publication_frequency(metadata),
        correlation: correlation_matrix(&enriched),
    };

    debug!(
        "Derived tables: {} months, {} clusters, {} weekdays, {} publication months",
        metrics.monthly.len(),
        metrics.clusters.len(),
        metrics.weekdays.len(),
        metrics.publications.len()
    );

    Ok(metrics)
}
