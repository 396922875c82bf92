//! Shared building blocks for the airline analytics workspace.
//!
//! Holds configuration loading, the error type, the result-table model,
//! the metric catalogue and the HTTP response envelope used by every binary.

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod response;
pub mod utils;
