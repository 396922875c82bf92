//! Error types shared by all crates.
//!
//! Metric reads never surface these to the UI (they fall back to sample data
//! instead). Config loading, schema discovery and custom queries propagate
//! `AppError` with `?`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::response::ApiResponse;

/// Result alias used across the workspace.
pub type AppResult<T> = Result<T, AppError>;

/// Application error.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Request or argument failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// SQL statement was refused by the validator.
    #[error("unsafe SQL: {0}")]
    UnsafeSql(String),

    /// Could not open a connection to the store.
    #[error("database connection failed: {0}")]
    DatabaseConnection(String),

    /// Query was sent but failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(String),

    /// Requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Metric slug is not part of the catalogue.
    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    /// Local parquet dataset could not be read.
    #[error("local dataset error: {0}")]
    LocalData(String),

    /// Filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Machine-readable error code placed in the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::UnsafeSql(_) => "UNSAFE_SQL",
            AppError::DatabaseConnection(_) => "DATABASE_CONNECTION_ERROR",
            AppError::DatabaseQuery(_) => "DATABASE_QUERY_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::UnknownMetric(_) => "UNKNOWN_METRIC",
            AppError::LocalData(_) => "LOCAL_DATA_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::UnsafeSql(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) | AppError::UnknownMetric(_) => StatusCode::NOT_FOUND,
            AppError::DatabaseConnection(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::DatabaseQuery(_) | AppError::LocalData(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_) | AppError::Io(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(e) => AppError::Config(e.to_string()),
            sqlx::Error::Io(e) => AppError::DatabaseConnection(e.to_string()),
            sqlx::Error::Tls(e) => AppError::DatabaseConnection(e.to_string()),
            sqlx::Error::PoolTimedOut => AppError::DatabaseConnection("pool timed out".into()),
            sqlx::Error::PoolClosed => AppError::DatabaseConnection("pool closed".into()),
            other => AppError::DatabaseQuery(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "request rejected");
        }
        let body = ApiResponse::err(self.code(), self.to_string());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_metric_maps_to_404() {
        let err = AppError::UnknownMetric("cargo_volume".into());
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "UNKNOWN_METRIC");
    }

    #[test]
    fn test_pool_timeout_is_connection_error() {
        let err = AppError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, AppError::DatabaseConnection(_)));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
