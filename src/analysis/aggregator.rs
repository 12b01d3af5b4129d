//! Grouped traffic aggregations and summary statistics.
//!
//! Every function here is a pure function of its input. Groups are kept in
//! ordered maps so output order never depends on hashing.

use crate::error::{DashboardError, Result};
use crate::models::{
    ClusterMetric, ContentMetadata, EnrichedRecord, Month, MonthlyMetric, PerformanceRecord,
    PublicationFrequency, SummaryMetrics, UnclusteredPolicy, UnclusteredShare, WeekdayMetric,
};
use chrono::{Datelike, Weekday};
use std::collections::BTreeMap;

/// Days of the week in report order.
pub const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Running arithmetic mean over present values.
#[derive(Debug, Clone, Copy, Default)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Click and impression sums plus mean position for one group.
#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    rows: usize,
    clicks: u64,
    impressions: u64,
    position: Mean,
}

impl Totals {
    fn add(&mut self, record: &PerformanceRecord) -> Result<()> {
        self.rows += 1;
        self.clicks = checked_sum(self.clicks, record.clicks, "clicks")?;
        self.impressions = checked_sum(self.impressions, record.impressions, "impressions")?;
        self.position.push(record.position);
        Ok(())
    }
}

/// Add a count cell to a running total, failing instead of wrapping.
fn checked_sum(total: u64, value: Option<u64>, column: &'static str) -> Result<u64> {
    total
        .checked_add(value.unwrap_or(0))
        .ok_or(DashboardError::CountOverflow { column })
}

/// `numerator / denominator`, or 0 when the denominator is 0.
pub fn ratio_or_zero(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Traffic per calendar month, ascending by month.
pub fn monthly_metrics(enriched: &[EnrichedRecord<'_>]) -> Result<Vec<MonthlyMetric>> {
    let mut grouped: BTreeMap<Month, Totals> = BTreeMap::new();

    for e in enriched {
        grouped
            .entry(Month::from_date(e.record.date))
            .or_default()
            .add(e.record)?;
    }

    Ok(grouped
        .into_iter()
        .map(|(month, totals)| MonthlyMetric {
            month,
            total_clicks: totals.clicks,
            total_impressions: totals.impressions,
            mean_position: totals.position.value(),
        })
        .collect())
}

/// Traffic per content cluster, ascending by cluster label.
///
/// Records without a cluster are grouped into a trailing `None` cluster
/// under [`UnclusteredPolicy::Bucket`] and left out under
/// [`UnclusteredPolicy::Drop`] (see [`unclustered_share`]).
pub fn cluster_metrics(
    enriched: &[EnrichedRecord<'_>],
    policy: UnclusteredPolicy,
) -> Result<Vec<ClusterMetric>> {
    let mut named: BTreeMap<&str, Totals> = BTreeMap::new();
    let mut unclustered = Totals::default();

    for e in enriched {
        match e.cluster {
            Some(cluster) => named.entry(cluster).or_default().add(e.record)?,
            None if policy == UnclusteredPolicy::Bucket => unclustered.add(e.record)?,
            None => {}
        }
    }

    let mut metrics: Vec<ClusterMetric> = named
        .into_iter()
        .map(|(cluster, totals)| cluster_metric(Some(cluster.to_string()), &totals))
        .collect();

    if policy == UnclusteredPolicy::Bucket && unclustered.rows > 0 {
        metrics.push(cluster_metric(None, &unclustered));
    }

    Ok(metrics)
}

fn cluster_metric(cluster: Option<String>, totals: &Totals) -> ClusterMetric {
    ClusterMetric {
        cluster,
        total_clicks: totals.clicks,
        total_impressions: totals.impressions,
        mean_position: totals.position.value(),
        ctr: ratio_or_zero(totals.clicks, totals.impressions),
    }
}

/// Rows, clicks and impressions of records that have no cluster.
pub fn unclustered_share(enriched: &[EnrichedRecord<'_>]) -> Result<UnclusteredShare> {
    enriched
        .iter()
        .filter(|e| e.cluster.is_none())
        .try_fold(UnclusteredShare::default(), |mut share, e| {
            share.rows += 1;
            share.clicks = checked_sum(share.clicks, e.record.clicks, "clicks")?;
            share.impressions =
                checked_sum(share.impressions, e.record.impressions, "impressions")?;
            Ok(share)
        })
}

/// Average daily traffic for each day of the week, Monday first.
///
/// Always returns seven entries; a day with no records has `None` means.
pub fn weekday_metrics(enriched: &[EnrichedRecord<'_>]) -> Vec<WeekdayMetric> {
    let mut days = [[Mean::default(); 3]; 7];

    for e in enriched {
        let day = &mut days[e.record.date.weekday().num_days_from_monday() as usize];
        day[0].push(e.record.clicks.map(|v| v as f64));
        day[1].push(e.record.impressions.map(|v| v as f64));
        day[2].push(e.record.position);
    }

    WEEK.iter()
        .zip(days.iter())
        .map(|(&weekday, [clicks, impressions, position])| WeekdayMetric {
            weekday,
            mean_clicks: clicks.value(),
            mean_impressions: impressions.value(),
            mean_position: position.value(),
        })
        .collect()
}

/// Pages published per month, ascending by month.
pub fn publication_frequency(metadata: &[ContentMetadata]) -> Vec<PublicationFrequency> {
    let mut counts: BTreeMap<Month, usize> = BTreeMap::new();

    for row in metadata {
        *counts.entry(Month::from_date(row.date_published)).or_default() += 1;
    }

    counts
        .into_iter()
        .map(|(month, publication_count)| PublicationFrequency {
            month,
            publication_count,
        })
        .collect()
}

/// Headline totals over every record.
pub fn summary_metrics(enriched: &[EnrichedRecord<'_>]) -> Result<SummaryMetrics> {
    let mut totals = Totals::default();
    for e in enriched {
        totals.add(e.record)?;
    }

    Ok(SummaryMetrics {
        total_clicks: totals.clicks,
        total_impressions: totals.impressions,
        average_ctr: ratio_or_zero(totals.clicks, totals.impressions) * 100.0,
        average_position: totals.position.value(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(
        page: &str,
        date: &str,
        clicks: Option<u64>,
        impressions: Option<u64>,
        position: Option<f64>,
    ) -> PerformanceRecord {
        PerformanceRecord {
            page: page.to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            clicks,
            impressions,
            position,
        }
    }

    fn enrich<'a>(
        records: &'a [PerformanceRecord],
        clusters: &[Option<&'a str>],
    ) -> Vec<EnrichedRecord<'a>> {
        records
            .iter()
            .zip(clusters.iter())
            .map(|(record, &cluster)| EnrichedRecord { record, cluster })
            .collect()
    }

    fn sample() -> Vec<PerformanceRecord> {
        vec![
            record("a", "2024-01-05", Some(10), Some(100), Some(5.0)),
            record("b", "2024-01-20", Some(4), Some(80), Some(9.0)),
            record("a", "2024-02-10", Some(20), Some(200), Some(3.0)),
            record("c", "2023-12-31", Some(1), Some(50), Some(12.0)),
        ]
    }

    #[test]
    fn test_monthly_metrics_sorted_without_duplicates() {
        let records = sample();
        let enriched = enrich(&records, &[None; 4]);

        let monthly = monthly_metrics(&enriched).unwrap();
        let months: Vec<String> = monthly.iter().map(|m| m.month.to_string()).collect();

        assert_eq!(months, vec!["2023-12", "2024-01", "2024-02"]);
        assert_eq!(monthly[1].total_clicks, 14);
        assert_eq!(monthly[1].total_impressions, 180);
        assert_eq!(monthly[1].mean_position, Some(7.0));
        assert!(monthly.windows(2).all(|w| w[0].month < w[1].month));
    }

    #[test]
    fn test_monthly_metrics_empty_input() {
        assert!(monthly_metrics(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_monthly_mean_skips_missing_positions() {
        let records = vec![
            record("a", "2024-03-01", Some(1), None, Some(4.0)),
            record("a", "2024-03-02", None, Some(10), None),
        ];
        let enriched = enrich(&records, &[None, None]);

        let monthly = monthly_metrics(&enriched).unwrap();
        assert_eq!(monthly.len(), 1);
        assert_eq!(monthly[0].total_clicks, 1);
        assert_eq!(monthly[0].total_impressions, 10);
        assert_eq!(monthly[0].mean_position, Some(4.0));
    }

    #[test]
    fn test_cluster_metrics_bucket_reconciles_with_summary() {
        let records = sample();
        let enriched = enrich(&records, &[Some("Blog"), Some("Advice"), Some("Blog"), None]);

        let clusters = cluster_metrics(&enriched, UnclusteredPolicy::Bucket).unwrap();
        let labels: Vec<Option<&str>> = clusters.iter().map(|c| c.cluster.as_deref()).collect();
        assert_eq!(labels, vec![Some("Advice"), Some("Blog"), None]);

        let blog = &clusters[1];
        assert_eq!(blog.total_clicks, 30);
        assert_eq!(blog.total_impressions, 300);
        assert_eq!(blog.mean_position, Some(4.0));
        assert!((blog.ctr - 0.1).abs() < 1e-12);

        let summary = summary_metrics(&enriched).unwrap();
        let cluster_clicks: u64 = clusters.iter().map(|c| c.total_clicks).sum();
        assert_eq!(cluster_clicks, summary.total_clicks);
    }

    #[test]
    fn test_cluster_metrics_drop_reconciles_with_share() {
        let records = sample();
        let enriched = enrich(&records, &[Some("Blog"), None, Some("Blog"), None]);

        let clusters = cluster_metrics(&enriched, UnclusteredPolicy::Drop).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].cluster.as_deref(), Some("Blog"));

        let share = unclustered_share(&enriched).unwrap();
        assert_eq!(share.rows, 2);
        assert_eq!(share.clicks, 5);
        assert_eq!(share.impressions, 130);

        let summary = summary_metrics(&enriched).unwrap();
        let cluster_clicks: u64 = clusters.iter().map(|c| c.total_clicks).sum();
        assert_eq!(cluster_clicks + share.clicks, summary.total_clicks);
    }

    #[test]
    fn test_zero_impressions_fall_back_to_zero_ctr() {
        let records = vec![
            record("a", "2024-01-01", Some(0), Some(0), Some(3.0)),
            record("b", "2024-01-02", Some(2), Some(0), Some(4.0)),
        ];
        let enriched = enrich(&records, &[Some("Blog"), None]);

        for cluster in cluster_metrics(&enriched, UnclusteredPolicy::Bucket).unwrap() {
            assert_eq!(cluster.ctr, 0.0);
        }

        let summary = summary_metrics(&enriched).unwrap();
        assert_eq!(summary.average_ctr, 0.0);
        assert!(!summary.average_ctr.is_nan());
    }

    #[test]
    fn test_weekday_metrics_always_seven_days() {
        // 2024-01-01 was a Monday, 2024-01-03 a Wednesday.
        let records = vec![
            record("a", "2024-01-01", Some(10), Some(100), Some(2.0)),
            record("a", "2024-01-08", Some(20), Some(300), Some(4.0)),
            record("b", "2024-01-03", Some(5), Some(50), Some(6.0)),
        ];
        let enriched = enrich(&records, &[None; 3]);

        let weekdays = weekday_metrics(&enriched);
        let days: Vec<Weekday> = weekdays.iter().map(|w| w.weekday).collect();
        assert_eq!(days, WEEK.to_vec());

        assert_eq!(weekdays[0].mean_clicks, Some(15.0));
        assert_eq!(weekdays[0].mean_impressions, Some(200.0));
        assert_eq!(weekdays[0].mean_position, Some(3.0));
        assert_eq!(weekdays[2].mean_clicks, Some(5.0));

        let tuesday = &weekdays[1];
        assert_eq!(tuesday.mean_clicks, None);
        assert_eq!(tuesday.mean_impressions, None);
        assert_eq!(tuesday.mean_position, None);
    }

    #[test]
    fn test_weekday_metrics_empty_input() {
        let weekdays = weekday_metrics(&[]);
        assert_eq!(weekdays.len(), 7);
        assert_eq!(weekdays[0].weekday, Weekday::Mon);
        assert_eq!(weekdays[6].weekday, Weekday::Sun);
        assert!(weekdays.iter().all(|w| w.mean_clicks.is_none()));
    }

    #[test]
    fn test_publication_frequency() {
        let date = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let metadata = vec![
            ContentMetadata {
                page: "a".to_string(),
                cluster: Some("Blog".to_string()),
                date_published: date("2023-12-01"),
            },
            ContentMetadata {
                page: "b".to_string(),
                cluster: None,
                date_published: date("2023-11-15"),
            },
            ContentMetadata {
                page: "c".to_string(),
                cluster: Some("Blog".to_string()),
                date_published: date("2023-12-24"),
            },
        ];

        let frequency = publication_frequency(&metadata);
        assert_eq!(frequency.len(), 2);
        assert_eq!(frequency[0].month.to_string(), "2023-11");
        assert_eq!(frequency[0].publication_count, 1);
        assert_eq!(frequency[1].month.to_string(), "2023-12");
        assert_eq!(frequency[1].publication_count, 2);

        assert!(publication_frequency(&[]).is_empty());
    }

    #[test]
    fn test_summary_metrics() {
        let records = vec![
            record("a", "2024-01-05", Some(10), Some(100), Some(5.0)),
            record("a", "2024-02-10", Some(20), Some(200), Some(3.0)),
        ];
        let enriched = enrich(&records, &[Some("Blog"), Some("Blog")]);

        let summary = summary_metrics(&enriched).unwrap();
        assert_eq!(summary.total_clicks, 30);
        assert_eq!(summary.total_impressions, 300);
        assert!((summary.average_ctr - 10.0).abs() < 1e-9);
        assert_eq!(summary.average_position, Some(4.0));
    }

    #[test]
    fn test_summary_metrics_empty_input() {
        let summary = summary_metrics(&[]).unwrap();
        assert_eq!(summary.total_clicks, 0);
        assert_eq!(summary.average_ctr, 0.0);
        assert_eq!(summary.average_position, None);
    }

    #[test]
    fn test_count_overflow_is_an_error() {
        let records = vec![
            record("a", "2024-01-01", Some(u64::MAX), Some(10), None),
            record("b", "2024-01-02", Some(1), Some(10), None),
        ];
        let enriched = enrich(&records, &[Some("Blog"), Some("Blog")]);

        let err = summary_metrics(&enriched).unwrap_err();
        assert!(matches!(err, DashboardError::CountOverflow { column: "clicks" }));
        assert!(monthly_metrics(&enriched).is_err());
        assert!(cluster_metrics(&enriched, UnclusteredPolicy::Bucket).is_err());

        let orphans = enrich(&records, &[None, None]);
        assert!(unclustered_share(&orphans).is_err());
        assert!(cluster_metrics(&orphans, UnclusteredPolicy::Drop).is_ok());
    }
}
