//! CSV table loading and the per-run session.
//!
//! Required headers are checked before any row is read, so a missing column
//! aborts the run before the pipeline sees any data.

use crate::error::{DashboardError, Result, Table};
use crate::models::{ContentMetadata, PerformanceRecord};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::StringRecord;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Header names to look for in the input files.
#[derive(Debug, Clone)]
pub struct ColumnNames {
    pub page: String,
    pub date: String,
    pub clicks: String,
    pub impressions: String,
    pub position: String,
    pub cluster: String,
    pub date_published: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self::from(&crate::config::ColumnConfig::default())
    }
}

impl From<&crate::config::ColumnConfig> for ColumnNames {
    fn from(config: &crate::config::ColumnConfig) -> Self {
        Self {
            page: config.page.clone(),
            date: config.date.clone(),
            clicks: config.clicks.clone(),
            impressions: config.impressions.clone(),
            position: config.position.clone(),
            cluster: config.cluster.clone(),
            date_published: config.date_published.clone(),
        }
    }
}

/// Where the two tables come from.
#[derive(Debug, Clone)]
pub struct DataSources {
    pub performance: PathBuf,
    pub metadata: PathBuf,
    pub columns: ColumnNames,
    /// Show a spinner while reading.
    pub show_progress: bool,
}

/// Both input tables, loaded once and held read-only for one run.
#[derive(Debug)]
pub struct Session {
    sources: DataSources,
    performance: Vec<PerformanceRecord>,
    metadata: Vec<ContentMetadata>,
    loaded_at: DateTime<Utc>,
}

impl Session {
    /// Load both tables from `sources`.
    pub fn load(sources: DataSources) -> Result<Self> {
        let (performance, metadata) = read_tables(&sources)?;
        let loaded_at = Utc::now();
        debug!("Tables loaded at {}", loaded_at.to_rfc3339());

        Ok(Self {
            sources,
            performance,
            metadata,
            loaded_at,
        })
    }

    /// Re-read both files. On error the previously loaded tables are kept.
    #[allow(dead_code)]
    pub fn refresh(&mut self) -> Result<()> {
        let (performance, metadata) = read_tables(&self.sources)?;
        self.performance = performance;
        self.metadata = metadata;
        self.loaded_at = Utc::now();
        debug!("Tables reloaded at {}", self.loaded_at.to_rfc3339());
        Ok(())
    }

    pub fn performance(&self) -> &[PerformanceRecord] {
        &self.performance
    }

    pub fn metadata(&self) -> &[ContentMetadata] {
        &self.metadata
    }

    pub fn sources(&self) -> &DataSources {
        &self.sources
    }

    /// When the tables currently held were read.
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

type Tables = (Vec<PerformanceRecord>, Vec<ContentMetadata>);

fn read_tables(sources: &DataSources) -> Result<Tables> {
    let progress = sources.show_progress.then(spinner);

    let performance =
        load_performance(&sources.performance, &sources.columns, progress.as_ref())?;
    info!(
        "Loaded {} performance rows from {}",
        performance.len(),
        sources.performance.display()
    );

    let metadata = load_metadata(&sources.metadata, &sources.columns, progress.as_ref())?;
    info!(
        "Loaded {} metadata rows from {}",
        metadata.len(),
        sources.metadata.display()
    );

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    Ok((performance, metadata))
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg} {pos} rows")
    {
        pb.set_style(style);
    }
    pb
}

/// Load the search-console performance table.
pub fn load_performance(
    path: &Path,
    columns: &ColumnNames,
    progress: Option<&ProgressBar>,
) -> Result<Vec<PerformanceRecord>> {
    let table = Table::Performance;
    let mut reader = open(path, table)?;
    let headers = reader
        .headers()
        .map_err(|e| DashboardError::csv(table, e))?
        .clone();

    let page = Field::locate(&headers, table, &columns.page)?;
    let date = Field::locate(&headers, table, &columns.date)?;
    let clicks = Field::locate(&headers, table, &columns.clicks)?;
    let impressions = Field::locate(&headers, table, &columns.impressions)?;
    let position = Field::locate(&headers, table, &columns.position)?;
    debug!("performance headers: {:?}", headers);

    if let Some(pb) = progress {
        pb.set_message("performance");
        pb.set_position(0);
    }

    let mut rows = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result.map_err(|e| DashboardError::csv(table, e))?;
        let row = Row {
            table,
            number: i + 1,
            record: &record,
        };

        rows.push(PerformanceRecord {
            page: row.text(&page)?,
            date: row.date(&date)?,
            clicks: row.count(&clicks)?,
            impressions: row.count(&impressions)?,
            position: row.position(&position)?,
        });

        if let Some(pb) = progress {
            pb.inc(1);
        }
    }

    Ok(rows)
}

/// Load the content metadata table.
pub fn load_metadata(
    path: &Path,
    columns: &ColumnNames,
    progress: Option<&ProgressBar>,
) -> Result<Vec<ContentMetadata>> {
    let table = Table::Metadata;
    let mut reader = open(path, table)?;
    let headers = reader
        .headers()
        .map_err(|e| DashboardError::csv(table, e))?
        .clone();

    let page = Field::locate(&headers, table, &columns.page)?;
    let cluster = Field::locate(&headers, table, &columns.cluster)?;
    let date_published = Field::locate(&headers, table, &columns.date_published)?;
    debug!("metadata headers: {:?}", headers);

    if let Some(pb) = progress {
        pb.set_message("metadata");
        pb.set_position(0);
    }

    let mut rows = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result.map_err(|e| DashboardError::csv(table, e))?;
        let row = Row {
            table,
            number: i + 1,
            record: &record,
        };

        rows.push(ContentMetadata {
            page: row.text(&page)?,
            cluster: row.optional_text(&cluster),
            date_published: row.date(&date_published)?,
        });

        if let Some(pb) = progress {
            pb.inc(1);
        }
    }

    Ok(rows)
}

fn open(path: &Path, table: Table) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| DashboardError::csv(table, e))
}

/// Normalize a header for matching: case, surrounding space, `_`/`-`/space.
fn normalize_header(name: &str) -> String {
    name.trim()
        .trim_start_matches('\u{feff}')
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

/// A located column.
struct Field<'a> {
    index: usize,
    name: &'a str,
}

impl<'a> Field<'a> {
    fn locate(headers: &StringRecord, table: Table, name: &'a str) -> Result<Self> {
        let wanted = normalize_header(name);
        headers
            .iter()
            .position(|h| normalize_header(h) == wanted)
            .map(|index| Self { index, name })
            .ok_or_else(|| DashboardError::MissingColumn {
                table,
                column: name.to_string(),
            })
    }
}

/// One data row, numbered from 1.
struct Row<'r> {
    table: Table,
    number: usize,
    record: &'r StringRecord,
}

impl Row<'_> {
    fn raw(&self, field: &Field<'_>) -> &str {
        self.record.get(field.index).unwrap_or("").trim()
    }

    fn invalid(&self, field: &Field<'_>, value: &str) -> DashboardError {
        DashboardError::InvalidValue {
            table: self.table,
            row: self.number,
            column: field.name.to_string(),
            value: value.to_string(),
        }
    }

    fn text(&self, field: &Field<'_>) -> Result<String> {
        let value = self.raw(field);
        if value.is_empty() {
            return Err(self.invalid(field, value));
        }
        Ok(value.to_string())
    }

    fn optional_text(&self, field: &Field<'_>) -> Option<String> {
        let value = self.raw(field);
        (!value.is_empty()).then(|| value.to_string())
    }

    fn date(&self, field: &Field<'_>) -> Result<NaiveDate> {
        let value = self.raw(field);
        parse_date(value).ok_or_else(|| self.invalid(field, value))
    }

    fn count(&self, field: &Field<'_>) -> Result<Option<u64>> {
        let value = self.raw(field);
        if value.is_empty() {
            return Ok(None);
        }
        parse_count(value)
            .map(Some)
            .ok_or_else(|| self.invalid(field, value))
    }

    fn position(&self, field: &Field<'_>) -> Result<Option<f64>> {
        let value = self.raw(field);
        if value.is_empty() {
            return Ok(None);
        }
        match value.parse::<f64>() {
            Ok(v) if v.is_finite() && v > 0.0 => Ok(Some(v)),
            _ => Err(self.invalid(field, value)),
        }
    }
}

/// Parse a calendar date, dropping any time of day.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];
    const DATETIME_FORMATS: [&str; 3] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
    ];

    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(value, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// Parse a non-negative whole number, accepting spreadsheet forms like `12.0`.
fn parse_count(value: &str) -> Option<u64> {
    if let Ok(n) = value.parse::<u64>() {
        return Some(n);
    }
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64 => {
            Some(v as u64)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const PERFORMANCE_CSV: &str = "\
page,date,clicks,impressions,position
/blog/a,2024-01-05,10,100,5.0
/blog/a,2024-02-10,20,200,3.0
/guides/b,2024-02-11 00:00:00,,40,
";

    const METADATA_CSV: &str = "\
page,Cluster,Date_Published
/blog/a,Blog,2023-12-01
/guides/b,,2023-11-20
";

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn sources(dir: &TempDir, performance: &str, metadata: &str) -> DataSources {
        DataSources {
            performance: write(dir, "performance.csv", performance),
            metadata: write(dir, "metadata.csv", metadata),
            columns: ColumnNames::default(),
            show_progress: false,
        }
    }

    #[test]
    fn test_load_performance() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "gsc.csv", PERFORMANCE_CSV);

        let rows = load_performance(&path, &ColumnNames::default(), None).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].page, "/blog/a");
        assert_eq!(rows[0].clicks, Some(10));
        assert_eq!(rows[1].position, Some(3.0));
        assert_eq!(rows[2].date, NaiveDate::from_ymd_opt(2024, 2, 11).unwrap());
        assert_eq!(rows[2].clicks, None);
        assert_eq!(rows[2].position, None);
    }

    #[test]
    fn test_load_metadata_matches_headers_loosely() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "meta.csv", METADATA_CSV);

        let rows = load_metadata(&path, &ColumnNames::default(), None).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cluster.as_deref(), Some("Blog"));
        assert_eq!(rows[1].cluster, None);
        assert_eq!(
            rows[1].date_published,
            NaiveDate::from_ymd_opt(2023, 11, 20).unwrap()
        );
    }

    #[test]
    fn test_missing_column_is_reported_before_rows() {
        let dir = TempDir::new().unwrap();
        // The row is malformed too; the header check must win.
        let path = write(&dir, "gsc.csv", "page,date,clicks,position\n/a,not-a-date,x,0\n");

        let err = load_performance(&path, &ColumnNames::default(), None).unwrap_err();
        match err {
            DashboardError::MissingColumn { table, column } => {
                assert_eq!(table, Table::Performance);
                assert_eq!(column, "impressions");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_values_name_row_and_column() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "gsc.csv",
            "page,date,clicks,impressions,position\n/a,2024-01-01,1,10,2.0\n/a,2024-01-02,-3,10,2.0\n",
        );

        let err = load_performance(&path, &ColumnNames::default(), None).unwrap_err();
        match err {
            DashboardError::InvalidValue { row, column, value, .. } => {
                assert_eq!(row, 2);
                assert_eq!(column, "clicks");
                assert_eq!(value, "-3");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_positive_position_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "gsc.csv",
            "page,date,clicks,impressions,position\n/a,2024-01-01,1,10,0\n",
        );

        assert!(load_performance(&path, &ColumnNames::default(), None).is_err());
    }

    #[test]
    fn test_header_only_table_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "gsc.csv", "page,date,clicks,impressions,position\n");

        let rows = load_performance(&path, &ColumnNames::default(), None).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_custom_column_names() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "meta.csv", "url,topic,published\n/a,News,2024/03/09\n");
        let columns = ColumnNames {
            page: "url".to_string(),
            cluster: "topic".to_string(),
            date_published: "published".to_string(),
            ..ColumnNames::default()
        };

        let rows = load_metadata(&path, &columns, None).unwrap();
        assert_eq!(rows[0].page, "/a");
        assert_eq!(rows[0].cluster.as_deref(), Some("News"));
    }

    #[test]
    fn test_session_load_and_refresh() {
        let dir = TempDir::new().unwrap();
        let mut session = Session::load(sources(&dir, PERFORMANCE_CSV, METADATA_CSV)).unwrap();
        assert_eq!(session.performance().len(), 3);
        assert_eq!(session.metadata().len(), 2);
        let first_load = session.loaded_at();
        assert!(first_load <= Utc::now());

        fs::write(
            &session.sources().performance,
            "page,date,clicks,impressions,position\n/blog/a,2024-03-01,1,2,3\n",
        )
        .unwrap();
        session.refresh().unwrap();
        assert_eq!(session.performance().len(), 1);
        assert!(session.loaded_at() >= first_load);
    }

    #[test]
    fn test_failed_refresh_keeps_previous_tables() {
        let dir = TempDir::new().unwrap();
        let mut session = Session::load(sources(&dir, PERFORMANCE_CSV, METADATA_CSV)).unwrap();
        let loaded_at = session.loaded_at();

        fs::write(&session.sources().metadata, "page,cluster\n/a,Blog\n").unwrap();
        assert!(session.refresh().is_err());
        assert_eq!(session.loaded_at(), loaded_at);
        assert_eq!(session.performance().len(), 3);
        assert_eq!(session.metadata().len(), 2);
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 5);
        assert_eq!(parse_date("2024-01-05"), expected);
        assert_eq!(parse_date("2024/01/05"), expected);
        assert_eq!(parse_date("2024-01-05 13:45:00"), expected);
        assert_eq!(parse_date("2024-01-05T13:45:00+02:00"), expected);
        assert_eq!(parse_date("05.01.2024"), None);
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("42"), Some(42));
        assert_eq!(parse_count("12.0"), Some(12));
        assert_eq!(parse_count("1.5"), None);
        assert_eq!(parse_count("-1"), None);
    }
}
