//! 航空运营分析服务
//!
//! 为高管仪表盘提供指标数据，包括：
//! - 十项运营指标（收入、客座率、机队、维护、人力等）
//! - 数据源状态（实时数据库、样例数据或本地 parquet 数据集）
//! - 只读自定义查询与模式浏览

mod handlers;
mod routes;
mod service;
mod state;

use std::sync::Arc;

use anyhow::Context;
use axum::{middleware, routing::get, Json, Router};
use common::config::{load_dotenv, AppConfig, DbConfig};
use common::middleware::request_id::request_id_middleware;
use data_access::{AnalyticsConnector, LocalConnector, MetricSource};
use state::AppState;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

const SERVICE_NAME: &str = "analytics-service";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "航空运营分析 API",
        version = "0.1.0",
        description = "高管仪表盘指标服务，数据库不可用时自动切换为样例数据"
    ),
    paths(
        handlers::health_check,
        handlers::source_status,
        handlers::list_metrics,
        handlers::get_metric,
        handlers::execute_query,
        handlers::list_tables,
        handlers::table_columns,
        handlers::clear_cache,
    ),
    components(schemas(
        common::models::Metric,
        common::models::MetricDescriptor,
        common::models::ResultTable,
        common::models::ColumnInfo,
        common::models::ColumnType,
        common::models::QueryRequest,
        common::models::QueryResult,
        common::models::TableEntry,
        common::models::TableKind,
        common::models::ColumnEntry,
        common::response::CacheCleared,
        service::SourceStatus,
        handlers::HealthResponse,
    )),
    tags(
        (name = "metrics", description = "指标端点"),
        (name = "query", description = "查询执行端点"),
        (name = "schema", description = "模式浏览端点"),
        (name = "health", description = "健康检查端点")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // 初始化日志追踪
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // 加载配置
    let config = AppConfig::load_with_service(SERVICE_NAME);

    // 选择数据源
    let source = build_source(&config).await;
    info!(source = %source.kind(), database = %source.describe(), "数据源就绪");

    // 创建应用状态与路由
    let state = AppState::new(config.clone(), source);
    let app = create_router(state);

    // 启动服务
    let addr = format!("{}:{}", config.host, config.port);
    info!(service = SERVICE_NAME, address = %addr, "启动服务");

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("绑定地址失败: {addr}"))?;
    axum::serve(listener, app).await.context("服务启动失败")?;
    Ok(())
}

/// `USE_LOCAL` 选择本地数据集，否则连接数据库（失败时进入样例模式）
async fn build_source(config: &AppConfig) -> Arc<dyn MetricSource> {
    if config.use_local {
        info!(data_dir = %config.local_data_dir.display(), "使用本地 parquet 数据集");
        return Arc::new(LocalConnector::new(&config.local_data_dir));
    }
    match DbConfig::from_env() {
        Ok(db) => Arc::new(AnalyticsConnector::connect(&db).await),
        Err(e) => Arc::new(AnalyticsConnector::offline(&e.to_string())),
    }
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::router())
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use data_access::DatabasePool;
    use serde_json::{json, Value};
    use sqlx::sqlite::SqlitePoolOptions;
    use tower::ServiceExt;

    fn config() -> AppConfig {
        AppConfig::from_lookup(SERVICE_NAME, |_| None)
    }

    fn offline_app() -> Router {
        let source: Arc<dyn MetricSource> = Arc::new(AnalyticsConnector::offline("tests"));
        create_router(AppState::new(config(), source))
    }

    async fn live_app() -> Router {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        for sql in [
            "CREATE TABLE TICKETS (TICKET_ID INTEGER, FLIGHT_ID INTEGER, TOTAL_AMOUNT REAL)",
            "INSERT INTO TICKETS VALUES (1, 1000, 450.0), (2, 1000, 550.0)",
        ] {
            sqlx::query(sql).execute(&pool).await.unwrap();
        }
        let connector = AnalyticsConnector::from_pool(DatabasePool::from(pool), "").await;
        create_router(AppState::new(config(), Arc::new(connector)))
    }

    async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                builder = builder.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_offline_metric_serves_sample_data() {
        let (status, body) = send(offline_app(), Method::GET, "/api/metrics/total_revenue", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["meta"]["source"], "sample");
        assert_eq!(body["data"]["rows"][0][0], json!(15750000.0));
        assert_eq!(body["data"]["columns"][0]["name"], "total_revenue");
        assert!(body["meta"]["request_id"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_metric_is_404() {
        let (status, body) = send(offline_app(), Method::GET, "/api/metrics/cargo_volume", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "UNKNOWN_METRIC");
    }

    #[tokio::test]
    async fn test_status_and_catalogue() {
        let (_, status) = send(offline_app(), Method::GET, "/api/status", None).await;
        assert_eq!(status["data"]["sample_mode"], true);
        assert_eq!(status["data"]["source"], "sample");

        let (_, metrics) = send(offline_app(), Method::GET, "/api/metrics", None).await;
        let list = metrics["data"].as_array().unwrap();
        assert_eq!(list.len(), 10);
        assert_eq!(list[2]["metric"], "load_factor");
    }

    #[tokio::test]
    async fn test_query_rejects_writes_and_empty_sql() {
        let (status, body) = send(
            offline_app(),
            Method::POST,
            "/api/query",
            Some(json!({ "sql": "DROP TABLE TICKETS" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "UNSAFE_SQL");

        let (status, body) =
            send(offline_app(), Method::POST, "/api/query", Some(json!({ "sql": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_offline_query_returns_empty_table() {
        let (status, body) = send(
            offline_app(),
            Method::POST,
            "/api/query",
            Some(json!({ "sql": "SELECT 1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["row_count"], 0);
    }

    #[tokio::test]
    async fn test_schema_browsing_needs_a_database() {
        let (status, body) = send(offline_app(), Method::GET, "/api/schema/tables", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "DATABASE_CONNECTION_ERROR");
    }

    #[tokio::test]
    async fn test_live_metric_query_and_schema() {
        let app = live_app().await;

        let (_, body) = send(app.clone(), Method::GET, "/api/metrics/total_revenue", None).await;
        assert_eq!(body["meta"]["source"], "live");
        assert_eq!(body["data"]["rows"][0][0], json!(1000.0));

        let (_, body) = send(
            app.clone(),
            Method::POST,
            "/api/query",
            Some(json!({ "sql": "SELECT TICKET_ID FROM TICKETS ORDER BY TICKET_ID", "limit": 1 })),
        )
        .await;
        assert_eq!(body["data"]["row_count"], 1);
        assert_eq!(body["data"]["truncated"], true);

        let (_, body) = send(app.clone(), Method::GET, "/api/schema/tables", None).await;
        assert_eq!(body["data"][0]["name"], "TICKETS");

        let (status, body) =
            send(app.clone(), Method::GET, "/api/schema/tables/TICKETS/columns", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 3);
        assert_eq!(body["data"][2]["name"], "TOTAL_AMOUNT");
    }

    #[tokio::test]
    async fn test_cache_clear_reports_evictions() {
        let app = offline_app();
        send(app.clone(), Method::GET, "/api/metrics/hr_metrics", None).await;
        send(app.clone(), Method::GET, "/api/metrics/route_network", None).await;

        let (status, body) = send(app.clone(), Method::DELETE, "/api/cache", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["evicted"], 2);
    }

    #[tokio::test]
    async fn test_openapi_document_lists_metric_route() {
        let (status, body) = send(offline_app(), Method::GET, "/api-docs/openapi.json", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/api/metrics/{metric}"].is_object());
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(offline_app(), Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], SERVICE_NAME);
    }
}
