//! Left join of performance records onto content metadata.

use crate::error::{DashboardError, Result};
use crate::models::{ContentMetadata, DuplicatePagePolicy, EnrichedRecord, PerformanceRecord};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::warn;

/// Attach each performance record's cluster by `page`.
///
/// Output preserves the order of `performance`. Pages without metadata get
/// a `None` cluster. Duplicate metadata pages are resolved by `policy`.
pub fn join<'a>(
    performance: &'a [PerformanceRecord],
    metadata: &'a [ContentMetadata],
    policy: DuplicatePagePolicy,
) -> Result<Vec<EnrichedRecord<'a>>> {
    let index = index_metadata(metadata, policy)?;

    Ok(performance
        .iter()
        .map(|record| EnrichedRecord {
            record,
            cluster: index
                .get(record.page.as_str())
                .and_then(|row| row.cluster.as_deref()),
        })
        .collect())
}

/// Build a page lookup, keeping the first row for each page.
fn index_metadata(
    metadata: &[ContentMetadata],
    policy: DuplicatePagePolicy,
) -> Result<HashMap<&str, &ContentMetadata>> {
    let mut index: HashMap<&str, &ContentMetadata> = HashMap::with_capacity(metadata.len());
    let mut shadowed = 0usize;

    for row in metadata {
        match index.entry(row.page.as_str()) {
            Entry::Vacant(slot) => {
                slot.insert(row);
            }
            Entry::Occupied(_) => match policy {
                DuplicatePagePolicy::First => shadowed += 1,
                DuplicatePagePolicy::Reject => {
                    let occurrences = metadata.iter().filter(|m| m.page == row.page).count();
                    return Err(DashboardError::JoinAmbiguity {
                        page: row.page.clone(),
                        occurrences,
                    });
                }
            },
        }
    }

    if shadowed > 0 {
        warn!(
            "{} duplicate metadata rows ignored; the first row per page was kept",
            shadowed
        );
    }

    Ok(index)
}
