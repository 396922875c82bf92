//! 路由模块

use axum::{
    routing::{delete, get, post},
    Router,
};
use crate::handlers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(handlers::health_check))
        .route("/api/status", get(handlers::source_status))
        .route("/api/metrics", get(handlers::list_metrics))
        .route("/api/metrics/{metric}", get(handlers::get_metric))
        .route("/api/query", post(handlers::execute_query))
        .route("/api/schema/tables", get(handlers::list_tables))
        .route("/api/schema/tables/{table}/columns", get(handlers::table_columns))
        .route("/api/cache", delete(handlers::clear_cache))
}
