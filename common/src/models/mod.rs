//! Shared data models.

pub mod catalog;
pub mod connection;
pub mod metric;
pub mod query;
pub mod table;

// Re-export commonly used types
pub use catalog::{ColumnEntry, TableEntry, TableKind};
pub use connection::{DbConfig, DbType};
pub use metric::{Metric, MetricDescriptor};
pub use query::{QueryRequest, QueryResult};
pub use table::{CellValue, ColumnInfo, ColumnSpec, ColumnType, ResultTable};
