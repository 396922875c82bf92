//! 指标服务模块
//!
//! 在数据源之上加一层按指标划分的 TTL 缓存。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::errors::AppResult;
use common::models::catalog::{ColumnEntry, TableEntry};
use common::models::metric::Metric;
use common::models::query::{QueryRequest, QueryResult};
use common::models::table::ResultTable;
use data_access::{MetricSource, SourceKind};
use serde::Serialize;
use tokio::sync::RwLock;
use utoipa::ToSchema;
use validator::Validate;

/// 数据源状态（仪表盘横幅）
#[derive(Debug, Serialize, ToSchema)]
pub struct SourceStatus {
    /// `live`、`sample` 或 `local`
    pub source: String,
    /// 是否正在使用样例数据
    pub sample_mode: bool,
    /// 后端存储描述
    pub database: String,
}

struct CachedTable {
    loaded_at: Instant,
    source: SourceKind,
    table: ResultTable,
}

/// 指标服务
pub struct MetricService {
    source: Arc<dyn MetricSource>,
    ttl: Duration,
    cache: RwLock<HashMap<Metric, CachedTable>>,
}

impl MetricService {
    /// 创建新的指标服务实例
    pub fn new(source: Arc<dyn MetricSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// 读取指标，缓存未过期时直接返回
    pub async fn metric(&self, metric: Metric) -> (SourceKind, ResultTable) {
        {
            let cache = self.cache.read().await;
            if let Some(hit) = cache.get(&metric) {
                if hit.loaded_at.elapsed() < self.ttl {
                    tracing::debug!(metric = %metric, "metric cache hit");
                    return (hit.source, hit.table.clone());
                }
            }
        }

        let table = self.source.fetch(metric).await;
        // kind() after fetch: a failed read has already switched to sample data
        let source = self.source.kind();
        tracing::info!(metric = %metric, source = %source, rows = table.row_count(), "metric loaded");

        self.cache.write().await.insert(
            metric,
            CachedTable {
                loaded_at: Instant::now(),
                source,
                table: table.clone(),
            },
        );
        (source, table)
    }

    /// 清空缓存，返回被清除的条目数
    pub async fn clear(&self) -> usize {
        let mut cache = self.cache.write().await;
        let evicted = cache.len();
        cache.clear();
        tracing::info!(evicted, "metric cache cleared");
        evicted
    }

    pub fn status(&self) -> SourceStatus {
        let kind = self.source.kind();
        SourceStatus {
            source: kind.to_string(),
            sample_mode: self.source.is_sample_mode(),
            database: self.source.describe(),
        }
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source.kind()
    }

    /// 执行自定义查询（不缓存）
    pub async fn query(&self, req: QueryRequest) -> AppResult<QueryResult> {
        req.validate()?;
        let start = Instant::now();
        let table = self.source.execute_query(&req.sql).await?;
        let execution_time_ms = start.elapsed().as_millis() as u64;
        Ok(QueryResult::new(table, req.limit, execution_time_ms))
    }

    pub async fn tables(&self, schema: Option<&str>) -> AppResult<Vec<TableEntry>> {
        self.source.list_tables(schema).await
    }

    pub async fn columns(&self, schema: Option<&str>, table: &str) -> AppResult<Vec<ColumnEntry>> {
        self.source.table_columns(schema, table).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::errors::AppError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts fetches and serves empty documented tables.
    #[derive(Default)]
    struct CountingSource {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl MetricSource for CountingSource {
        async fn fetch(&self, metric: Metric) -> ResultTable {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            ResultTable::with_schema(metric.schema())
        }

        fn kind(&self) -> SourceKind {
            SourceKind::Live
        }

        fn describe(&self) -> String {
            "counting".into()
        }

        async fn execute_query(&self, _sql: &str) -> AppResult<ResultTable> {
            Ok(ResultTable::default())
        }

        async fn list_tables(&self, _schema: Option<&str>) -> AppResult<Vec<TableEntry>> {
            Ok(Vec::new())
        }

        async fn table_columns(&self, _schema: Option<&str>, table: &str) -> AppResult<Vec<ColumnEntry>> {
            Err(AppError::NotFound(table.to_string()))
        }
    }

    #[tokio::test]
    async fn test_cached_metric_is_not_refetched() {
        let source = Arc::new(CountingSource::default());
        let service = MetricService::new(source.clone(), Duration::from_secs(3600));

        let (kind, table) = service.metric(Metric::LoadFactor).await;
        assert_eq!(kind, SourceKind::Live);
        assert_eq!(table.column_names(), Metric::LoadFactor.column_names());
        service.metric(Metric::LoadFactor).await;
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

        service.metric(Metric::HrMetrics).await;
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_entries_are_refetched() {
        let source = Arc::new(CountingSource::default());
        let service = MetricService::new(source.clone(), Duration::ZERO);
        service.metric(Metric::TotalRevenue).await;
        service.metric(Metric::TotalRevenue).await;
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_clear_evicts_everything() {
        let source = Arc::new(CountingSource::default());
        let service = MetricService::new(source.clone(), Duration::from_secs(3600));
        service.metric(Metric::TotalRevenue).await;
        service.metric(Metric::RouteNetwork).await;

        assert_eq!(service.clear().await, 2);
        assert_eq!(service.clear().await, 0);
        service.metric(Metric::TotalRevenue).await;
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_query_validates_request() {
        let service = MetricService::new(Arc::new(CountingSource::default()), Duration::ZERO);
        let err = service
            .query(QueryRequest {
                sql: String::new(),
                limit: Some(10),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
