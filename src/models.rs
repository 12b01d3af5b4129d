//! Data models for the dashboard.
//!
//! This module contains the input records, the derived tables produced by
//! the aggregation pipeline, and the dashboard handed to the report layer.

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A calendar month key, ordered chronologically and rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    pub year: i32,
    pub month: u32,
}

impl Month {
    /// Truncate a date to its month.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got '{}'", s))?;
        let year: i32 = year.parse().map_err(|_| format!("invalid year in '{}'", s))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("invalid month in '{}'", s))?;
        if !(1..=12).contains(&month) {
            return Err(format!("month out of range in '{}'", s));
        }
        Ok(Self { year, month })
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One row of the search-console performance table.
///
/// Numeric cells may be empty in the source file; those are `None` and are
/// skipped by every aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceRecord {
    pub page: String,
    pub date: NaiveDate,
    pub clicks: Option<u64>,
    pub impressions: Option<u64>,
    /// Mean search rank, lower is better.
    pub position: Option<f64>,
}

/// One row of the content metadata table.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentMetadata {
    pub page: String,
    pub cluster: Option<String>,
    pub date_published: NaiveDate,
}

/// A performance record with its page's cluster attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnrichedRecord<'a> {
    pub record: &'a PerformanceRecord,
    /// `None` when the page has no metadata row or the row has no cluster.
    pub cluster: Option<&'a str>,
}

/// Monthly traffic totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyMetric {
    pub month: Month,
    pub total_clicks: u64,
    pub total_impressions: u64,
    pub mean_position: Option<f64>,
}

/// Traffic totals for one content cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterMetric {
    /// `None` is the bucket of records without a cluster.
    pub cluster: Option<String>,
    pub total_clicks: u64,
    pub total_impressions: u64,
    pub mean_position: Option<f64>,
    /// Clicks per impression as a ratio; 0 when there are no impressions.
    pub ctr: f64,
}

/// Daily averages for one day of the week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayMetric {
    #[serde(serialize_with = "serialize_weekday")]
    pub weekday: Weekday,
    /// All means are `None` when no record falls on this weekday.
    pub mean_clicks: Option<f64>,
    pub mean_impressions: Option<f64>,
    pub mean_position: Option<f64>,
}

/// Number of pages published in a month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicationFrequency {
    pub month: Month,
    pub publication_count: usize,
}

/// Pearson correlation between clicks, impressions and position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: [&'static str; 3],
    /// `None` where the coefficient is undefined (fewer than two paired
    /// rows, or zero variance in either column).
    pub values: [[Option<f64>; 3]; 3],
}

impl CorrelationMatrix {
    pub const COLUMNS: [&'static str; 3] = ["clicks", "impressions", "position"];

    /// Coefficient at row `i`, column `j`.
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.values[i][j]
    }
}

/// Headline numbers shown above the charts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryMetrics {
    pub total_clicks: u64,
    pub total_impressions: u64,
    /// Percentage; 0 when there are no impressions.
    pub average_ctr: f64,
    pub average_position: Option<f64>,
}

/// Traffic excluded from the cluster table under the `drop` policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnclusteredShare {
    pub rows: usize,
    pub clicks: u64,
    pub impressions: u64,
}

/// How duplicate `page` keys in the metadata table are resolved.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePagePolicy {
    /// The first row in file order wins.
    #[default]
    First,
    /// Fail the run.
    Reject,
}

/// How records without a cluster are treated in the cluster table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum UnclusteredPolicy {
    /// Group them into one unnamed cluster listed last.
    #[default]
    Bucket,
    /// Leave them out and report their share separately.
    Drop,
}

impl fmt::Display for DuplicatePagePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicatePagePolicy::First => write!(f, "first"),
            DuplicatePagePolicy::Reject => write!(f, "reject"),
        }
    }
}

impl fmt::Display for UnclusteredPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnclusteredPolicy::Bucket => write!(f, "bucket"),
            UnclusteredPolicy::Drop => write!(f, "drop"),
        }
    }
}

/// Every derived table computed from one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub summary: SummaryMetrics,
    pub monthly: Vec<MonthlyMetric>,
    pub clusters: Vec<ClusterMetric>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unclustered: Option<UnclusteredShare>,
    pub weekdays: Vec<WeekdayMetric>,
    pub publications: Vec<PublicationFrequency>,
    pub correlation: CorrelationMatrix,
}

/// Run information shown in the report header.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardMetadata {
    pub title: String,
    pub performance_source: String,
    pub metadata_source: String,
    pub performance_rows: usize,
    pub metadata_rows: usize,
    /// When the input tables were read.
    pub generated_at: DateTime<Utc>,
    pub duplicate_pages: DuplicatePagePolicy,
    pub unclustered: UnclusteredPolicy,
    pub duration_seconds: f64,
}

/// The complete dashboard handed to the report layer.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub metadata: DashboardMetadata,
    pub metrics: Metrics,
}

/// Full English name of a weekday.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn serialize_weekday<S: Serializer>(day: &Weekday, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(weekday_name(*day))
}
