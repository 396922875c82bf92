//! Metric source abstraction shared by the live and local connectors.

use std::fmt;

use async_trait::async_trait;
use common::errors::AppResult;
use common::models::catalog::{ColumnEntry, TableEntry};
use common::models::metric::Metric;
use common::models::table::ResultTable;

/// Where a table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Live database.
    Live,
    /// Built-in sample data after the database failed.
    Sample,
    /// Parquet extracts on disk.
    Local,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Live => "live",
            SourceKind::Sample => "sample",
            SourceKind::Local => "local",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything that can answer the dashboard metrics.
///
/// `fetch` never fails: sources degrade to sample or empty tables instead.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Table for `metric`, shaped like its documented schema.
    async fn fetch(&self, metric: Metric) -> ResultTable;

    /// Source the next `fetch` will be served from.
    fn kind(&self) -> SourceKind;

    /// Whether sample data is being served.
    fn is_sample_mode(&self) -> bool {
        self.kind() == SourceKind::Sample
    }

    /// Short description of the backing store for the status banner.
    fn describe(&self) -> String;

    /// Runs a caller-supplied read query.
    async fn execute_query(&self, sql: &str) -> AppResult<ResultTable>;

    /// Tables (and views) visible in `schema`.
    async fn list_tables(&self, schema: Option<&str>) -> AppResult<Vec<TableEntry>>;

    /// Columns of one table, in ordinal order.
    async fn table_columns(&self, schema: Option<&str>, table: &str) -> AppResult<Vec<ColumnEntry>>;
}
