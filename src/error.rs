//! Error types for table loading and the aggregation pipeline.
//!
//! Everything here is detected before a dashboard is handed to the report
//! layer, so a failed run never produces a partial report.

use thiserror::Error;

/// Result type alias using [`DashboardError`].
pub type Result<T> = std::result::Result<T, DashboardError>;

/// Which input table an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Performance,
    Metadata,
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Table::Performance => write!(f, "performance"),
            Table::Metadata => write!(f, "metadata"),
        }
    }
}

/// Errors raised while loading tables or building the dashboard.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// An expected column header is absent from an input table.
    #[error("{table} table is missing required column '{column}'")]
    MissingColumn { table: Table, column: String },

    /// A cell could not be parsed into the column's type.
    #[error("{table} table, row {row}: invalid value '{value}' in column '{column}'")]
    InvalidValue {
        table: Table,
        row: usize,
        column: String,
        value: String,
    },

    /// Metadata lists the same page more than once under the `reject` policy.
    #[error("metadata lists page '{page}' {occurrences} times")]
    JoinAmbiguity { page: String, occurrences: usize },

    /// A click or impression total does not fit in 64 bits.
    #[error("total {column} exceed the 64-bit counter range")]
    CountOverflow { column: &'static str },

    /// The CSV reader failed.
    #[error("failed to read {table} table: {source}")]
    Csv {
        table: Table,
        #[source]
        source: csv::Error,
    },
}

impl DashboardError {
    pub(crate) fn csv(table: Table, source: csv::Error) -> Self {
        Self::Csv { table, source }
    }
}
