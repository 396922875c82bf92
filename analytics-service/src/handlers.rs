//! Handler模块

use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use common::errors::AppError;
use common::middleware::request_id::RequestId;
use common::models::catalog::{ColumnEntry, TableEntry};
use common::models::metric::{Metric, MetricDescriptor};
use common::models::query::{QueryRequest, QueryResult};
use common::models::table::ResultTable;
use common::response::{ApiResponse, CacheCleared};
use crate::service::SourceStatus;
use crate::state::AppState;

/// 模式查询参数
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SchemaParams {
    /// 模式名，缺省时使用连接配置中的模式
    pub schema: Option<String>,
}

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "服务运行正常", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: state.config.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

/// 当前数据源（实时、样例或本地）
#[utoipa::path(
    get,
    path = "/api/status",
    tag = "metrics",
    responses(
        (status = 200, description = "数据源状态", body = ApiResponse<SourceStatus>)
    )
)]
pub async fn source_status(State(state): State<AppState>) -> Json<ApiResponse<SourceStatus>> {
    let status = state.metrics.status();
    let source = status.source.clone();
    Json(ApiResponse::ok_with_service(status, &state.config.service_name).with_source(source))
}

/// 列出所有指标及其列定义
#[utoipa::path(
    get,
    path = "/api/metrics",
    tag = "metrics",
    responses(
        (status = 200, description = "指标目录", body = ApiResponse<Vec<MetricDescriptor>>)
    )
)]
pub async fn list_metrics(State(state): State<AppState>) -> Json<ApiResponse<Vec<MetricDescriptor>>> {
    let data = Metric::ALL.into_iter().map(MetricDescriptor::from).collect();
    Json(ApiResponse::ok_with_service(data, &state.config.service_name))
}

/// 读取单个指标
#[utoipa::path(
    get,
    path = "/api/metrics/{metric}",
    tag = "metrics",
    params(
        ("metric" = String, Path, description = "指标名，例如 total_revenue")
    ),
    responses(
        (status = 200, description = "指标数据", body = ApiResponse<ResultTable>),
        (status = 404, description = "未知指标")
    )
)]
pub async fn get_metric(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(metric): Path<String>,
) -> Result<Json<ApiResponse<ResultTable>>, AppError> {
    let metric: Metric = metric.parse()?;
    let start = Instant::now();
    let (source, table) = state.metrics.metric(metric).await;
    Ok(Json(
        ApiResponse::ok_with_service(table, &state.config.service_name)
            .with_source(source.as_str())
            .with_request_id(request_id.as_str())
            .with_duration(start.elapsed().as_millis() as u64),
    ))
}

/// 执行只读 SQL 查询
#[utoipa::path(
    post,
    path = "/api/query",
    tag = "query",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "查询执行成功", body = ApiResponse<QueryResult>),
        (status = 400, description = "SQL 无效或校验错误")
    )
)]
pub async fn execute_query(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(req): Json<QueryRequest>,
) -> Result<Json<ApiResponse<QueryResult>>, AppError> {
    let result = state.metrics.query(req).await?;
    Ok(Json(
        ApiResponse::ok_with_service(result, &state.config.service_name)
            .with_source(state.metrics.source_kind().as_str())
            .with_request_id(request_id.as_str()),
    ))
}

/// 列出模式中的表和视图
#[utoipa::path(
    get,
    path = "/api/schema/tables",
    tag = "schema",
    params(SchemaParams),
    responses(
        (status = 200, description = "表列表", body = ApiResponse<Vec<TableEntry>>),
        (status = 503, description = "数据库不可用")
    )
)]
pub async fn list_tables(
    State(state): State<AppState>,
    Query(params): Query<SchemaParams>,
) -> Result<Json<ApiResponse<Vec<TableEntry>>>, AppError> {
    let data = state.metrics.tables(params.schema.as_deref()).await?;
    Ok(Json(ApiResponse::ok_with_service(data, &state.config.service_name)))
}

/// 获取表的列信息
#[utoipa::path(
    get,
    path = "/api/schema/tables/{table}/columns",
    tag = "schema",
    params(
        ("table" = String, Path, description = "表名"),
        SchemaParams
    ),
    responses(
        (status = 200, description = "列信息", body = ApiResponse<Vec<ColumnEntry>>),
        (status = 404, description = "表不存在")
    )
)]
pub async fn table_columns(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(params): Query<SchemaParams>,
) -> Result<Json<ApiResponse<Vec<ColumnEntry>>>, AppError> {
    let data = state.metrics.columns(params.schema.as_deref(), &table).await?;
    Ok(Json(ApiResponse::ok_with_service(data, &state.config.service_name)))
}

/// 清空指标缓存
#[utoipa::path(
    delete,
    path = "/api/cache",
    tag = "metrics",
    responses(
        (status = 200, description = "缓存已清空", body = ApiResponse<CacheCleared>)
    )
)]
pub async fn clear_cache(State(state): State<AppState>) -> Json<ApiResponse<CacheCleared>> {
    let evicted = state.metrics.clear().await;
    Json(ApiResponse::ok_with_service(CacheCleared { evicted }, &state.config.service_name))
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}
