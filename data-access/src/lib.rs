//! Data access layer for the airline analytics dashboard.
//!
//! [`AnalyticsConnector`] runs the metric queries against the configured
//! store and, after the first failure, serves deterministic sample tables
//! for the rest of its life. [`LocalConnector`] answers the same metrics from
//! parquet extracts on disk. Both implement [`MetricSource`].

pub mod catalog;
pub mod connector;
pub mod decode;
pub mod local;
pub mod pool;
pub mod queries;
pub mod sample;
pub mod source;

pub use connector::AnalyticsConnector;
pub use local::LocalConnector;
pub use pool::DatabasePool;
pub use source::{MetricSource, SourceKind};
