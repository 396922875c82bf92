//! Live connector with a one-way fallback to sample data.
//!
//! The first failure of any kind (pool creation, ping, query) flips
//! `sample_mode`; from then on every metric is served from
//! [`crate::sample`] without touching the store. There is no reconnection.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::errors::{AppError, AppResult};
use common::models::catalog::{ColumnEntry, TableEntry};
use common::models::connection::DbConfig;
use common::models::metric::Metric;
use common::models::table::ResultTable;
use common::utils::SqlValidator;

use crate::pool::DatabasePool;
use crate::queries::{Dialect, MetricSql};
use crate::sample::sample_table;
use crate::source::{MetricSource, SourceKind};

/// Data access layer for the airline analytics store.
pub struct AnalyticsConnector {
    pool: Option<DatabasePool>,
    sql: Option<MetricSql>,
    schema: String,
    target: String,
    sample_mode: AtomicBool,
}

impl AnalyticsConnector {
    /// Connects and pings the store. Never fails; a broken store yields a
    /// connector already in sample mode.
    pub async fn connect(config: &DbConfig) -> Self {
        let target = config.display_target();
        match DatabasePool::connect(config).await {
            Ok(pool) => Self::with_pool(pool, &config.schema, target).await,
            Err(e) => {
                tracing::warn!(store = %target, error = %e, "connection failed, serving sample data");
                Self::degraded(config.schema.clone(), target)
            }
        }
    }

    /// Wraps an existing pool and pings it.
    pub async fn from_pool(pool: DatabasePool, schema: &str) -> Self {
        let target = format!("{} pool", pool.db_type());
        Self::with_pool(pool, schema, target).await
    }

    /// Connector that serves sample data from the start.
    pub fn offline(reason: &str) -> Self {
        tracing::warn!(reason, "no database configured, serving sample data");
        Self::degraded(String::new(), "offline".to_string())
    }

    async fn with_pool(pool: DatabasePool, schema: &str, target: String) -> Self {
        let sql = match MetricSql::new(Dialect::from(pool.db_type()), schema) {
            Ok(sql) => sql,
            Err(e) => {
                tracing::warn!(schema, error = %e, "invalid schema name, serving sample data");
                return Self::degraded(schema.to_string(), target);
            }
        };
        let connector = Self {
            pool: Some(pool),
            sql: Some(sql),
            schema: schema.to_string(),
            target,
            sample_mode: AtomicBool::new(false),
        };
        if connector.test_connection().await {
            tracing::info!(store = %connector.target, "connected to analytics store");
        }
        connector
    }

    fn degraded(schema: String, target: String) -> Self {
        Self {
            pool: None,
            sql: None,
            schema,
            target,
            sample_mode: AtomicBool::new(true),
        }
    }

    /// Whether sample data is being served.
    pub fn is_sample_mode(&self) -> bool {
        self.sample_mode.load(Ordering::Acquire)
    }

    /// Schema the metric tables live in.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Underlying pool, if one was ever opened.
    pub fn pool(&self) -> Option<&DatabasePool> {
        self.pool.as_ref()
    }

    fn degrade(&self, context: &str, error: &AppError) {
        if !self.sample_mode.swap(true, Ordering::AcqRel) {
            tracing::warn!(context, error = %error, "analytics store unavailable, switching to sample data");
        }
    }

    /// Runs the ping query; latches sample mode on failure.
    pub async fn test_connection(&self) -> bool {
        let Some(pool) = &self.pool else {
            return false;
        };
        match pool.ping().await {
            Ok(elapsed) => {
                tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "ping ok");
                true
            }
            Err(e) => {
                self.degrade("ping", &e);
                false
            }
        }
    }

    /// Table for `metric`: live while the store works, sample data afterwards.
    pub async fn fetch(&self, metric: Metric) -> ResultTable {
        if self.is_sample_mode() {
            return sample_table(metric);
        }
        match self.fetch_live(metric).await {
            Ok(table) => table,
            Err(e) => {
                self.degrade(metric.slug(), &e);
                sample_table(metric)
            }
        }
    }

    async fn fetch_live(&self, metric: Metric) -> AppResult<ResultTable> {
        let (Some(pool), Some(sql)) = (&self.pool, &self.sql) else {
            return Err(AppError::DatabaseConnection("no connection pool".into()));
        };
        let raw = pool.fetch_table(&sql.statement(metric)).await?;
        if !raw.columns.is_empty() {
            let missing: Vec<&str> = metric
                .column_names()
                .into_iter()
                .filter(|name| raw.column_index(name).is_none())
                .collect();
            if !missing.is_empty() {
                return Err(AppError::DatabaseQuery(format!(
                    "result is missing columns: {}",
                    missing.join(", ")
                )));
            }
        }
        let mut table = raw.conform(metric.schema());
        match metric {
            Metric::LoadFactor => table.round_column("load_factor", 2),
            Metric::PassengerDemographics => table.round_column("avg_age", 1),
            _ => {}
        }
        tracing::debug!(metric = %metric, rows = table.row_count(), "live metric fetched");
        Ok(table)
    }

    /// Sum of all ticket amounts.
    pub async fn total_revenue(&self) -> ResultTable {
        self.fetch(Metric::TotalRevenue).await
    }

    /// Revenue, ticket count and average price per route.
    pub async fn revenue_by_route(&self) -> ResultTable {
        self.fetch(Metric::RevenueByRoute).await
    }

    /// Booked passengers over seat capacity, per flight.
    pub async fn load_factor(&self) -> ResultTable {
        self.fetch(Metric::LoadFactor).await
    }

    pub async fn fleet_utilization(&self) -> ResultTable {
        self.fetch(Metric::FleetUtilization).await
    }

    pub async fn fuel_efficiency(&self) -> ResultTable {
        self.fetch(Metric::FuelEfficiency).await
    }

    /// Aircraft with at least 500 takeoffs since the last check.
    pub async fn maintenance_alerts(&self) -> ResultTable {
        self.fetch(Metric::MaintenanceAlerts).await
    }

    pub async fn passenger_demographics(&self) -> ResultTable {
        self.fetch(Metric::PassengerDemographics).await
    }

    pub async fn hr_metrics(&self) -> ResultTable {
        self.fetch(Metric::HrMetrics).await
    }

    /// Routes with airport coordinates, for the network map.
    pub async fn route_network(&self) -> ResultTable {
        self.fetch(Metric::RouteNetwork).await
    }

    /// Daily ticket revenue.
    pub async fn financial_trends(&self) -> ResultTable {
        self.fetch(Metric::FinancialTrends).await
    }

    /// Runs a caller-supplied read query.
    ///
    /// Statements the validator refuses are rejected without touching the
    /// store. A store failure latches sample mode and yields an empty table.
    pub async fn execute_query(&self, sql: &str) -> AppResult<ResultTable> {
        SqlValidator::validate(sql)?;
        let Some(pool) = &self.pool else {
            return Ok(ResultTable::default());
        };
        match pool.fetch_table(sql).await {
            Ok(table) => Ok(table),
            Err(e) => {
                self.degrade("custom query", &e);
                Ok(ResultTable::default())
            }
        }
    }

    fn catalog_pool(&self) -> AppResult<&DatabasePool> {
        self.pool
            .as_ref()
            .ok_or_else(|| AppError::DatabaseConnection("analytics store is not connected".into()))
    }
}

#[async_trait]
impl MetricSource for AnalyticsConnector {
    async fn fetch(&self, metric: Metric) -> ResultTable {
        AnalyticsConnector::fetch(self, metric).await
    }

    fn kind(&self) -> SourceKind {
        if self.is_sample_mode() {
            SourceKind::Sample
        } else {
            SourceKind::Live
        }
    }

    fn describe(&self) -> String {
        self.target.clone()
    }

    async fn execute_query(&self, sql: &str) -> AppResult<ResultTable> {
        AnalyticsConnector::execute_query(self, sql).await
    }

    async fn list_tables(&self, schema: Option<&str>) -> AppResult<Vec<TableEntry>> {
        let schema = schema.unwrap_or(&self.schema);
        self.catalog_pool()?.list_tables(schema, None).await
    }

    async fn table_columns(&self, schema: Option<&str>, table: &str) -> AppResult<Vec<ColumnEntry>> {
        let schema = schema.unwrap_or(&self.schema);
        self.catalog_pool()?.table_columns(schema, table).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::connection::DbType;
    use common::models::table::CellValue;

    const AIRLINE_DDL: &[&str] = &[
        "CREATE TABLE AIRPORTS (AIRPORT_ID INTEGER, AIRPORT_NAME TEXT, LATITUDE REAL, LONGITUDE REAL)",
        "CREATE TABLE ROUTES (ROUTE_ID INTEGER, ORIGIN_AIRPORT_ID INTEGER, DESTINATION_AIRPORT_ID INTEGER)",
        "CREATE TABLE AIRPLANES (AIRPLANE_ID INTEGER, MODEL TEXT, REGISTRATION_NUMBER TEXT, \
         CAPACITY INTEGER, TOTAL_FLIGHT_DISTANCE INTEGER, FLIGHT_HOURS INTEGER, \
         FUEL_GALLONS_HOUR REAL, MAINTENANCE_LAST_ACHECK INTEGER, MAINTENANCE_TAKEOFFS INTEGER)",
        "CREATE TABLE FLIGHTS (FLIGHT_ID INTEGER, ROUTE_ID INTEGER, AIRPLANE_ID INTEGER, DEPARTURE_TIME TEXT)",
        "CREATE TABLE TICKETS (TICKET_ID INTEGER, FLIGHT_ID INTEGER, TOTAL_AMOUNT REAL)",
        "CREATE TABLE PASSENGERS (PASSENGER_ID INTEGER, GENDER TEXT, AGE INTEGER)",
        "CREATE TABLE DEPARTMENTS (DEPARTMENT_ID INTEGER, DEPARTMENT_NAME TEXT)",
        "CREATE TABLE EMPLOYEES (EMPLOYEE_ID INTEGER, DEPARTMENT_ID INTEGER, SALARY REAL)",
    ];

    const AIRLINE_ROWS: &[&str] = &[
        "INSERT INTO AIRPORTS VALUES (1, 'JFK', 40.64, -73.78), (2, 'LAX', 33.94, -118.41)",
        "INSERT INTO ROUTES VALUES (10, 1, 2), (11, 2, 1)",
        "INSERT INTO AIRPLANES VALUES \
         (100, 'Boeing 787', 'N1000', 3, 420000, 4100, 5100.5, 12, 910), \
         (101, 'Airbus A350', 'N1001', 4, 380000, 3900, 5300.0, 40, 720), \
         (102, 'Airbus A350', 'N1002', 4, 200000, 2000, 5250.0, 80, 120)",
        "INSERT INTO FLIGHTS VALUES \
         (1000, 10, 100, '2024-03-01 08:00:00'), (1001, 11, 101, '2024-03-02 09:30:00')",
        "INSERT INTO TICKETS VALUES (1, 1000, 450.0), (2, 1000, 550.0), (3, 1001, 300.0)",
        "INSERT INTO PASSENGERS VALUES (1, 'M', 40), (2, 'F', 35), (3, 'F', 36)",
        "INSERT INTO DEPARTMENTS VALUES (1, 'Flight Operations'), (2, 'Maintenance')",
        "INSERT INTO EMPLOYEES VALUES (1, 1, 36000), (2, 1, 38000), (3, 2, 30000)",
    ];

    async fn sqlite_pool(statements: &[&[&str]]) -> DatabasePool {
        let pool = DatabasePool::connect(&DbConfig::sqlite(":memory:"))
            .await
            .unwrap();
        let DatabasePool::SQLite(inner) = &pool else {
            unreachable!()
        };
        for stmt in statements.iter().flat_map(|group| group.iter()) {
            sqlx::query(stmt).execute(inner).await.unwrap();
        }
        pool
    }

    fn unreachable_postgres() -> DbConfig {
        let mut config = DbConfig::sqlite("unused");
        config.db_type = DbType::Postgres;
        config.host = "127.0.0.1".into();
        config.port = Some(1);
        config.database = "IEMASTER".into();
        config.username = Some("analyst".into());
        config.password = Some("secret".into());
        config.schema = "IEPLANE".into();
        config.connect_timeout_secs = 1;
        config
    }

    #[tokio::test]
    async fn test_unreachable_store_serves_fixed_total_revenue() {
        let connector = AnalyticsConnector::connect(&unreachable_postgres()).await;
        assert!(connector.is_sample_mode());

        let first = connector.total_revenue().await;
        let second = connector.total_revenue().await;
        assert_eq!(first.row_count(), 1);
        assert_eq!(first.rows[0][0], CellValue::Float(15_750_000.0));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_live_metrics_match_documented_schema() {
        let pool = sqlite_pool(&[AIRLINE_DDL, AIRLINE_ROWS]).await;
        let connector = AnalyticsConnector::from_pool(pool, "").await;
        for metric in Metric::ALL {
            let table = connector.fetch(metric).await;
            assert_eq!(table.column_names(), metric.column_names(), "{metric}");
        }
        assert!(!connector.is_sample_mode());
    }

    #[tokio::test]
    async fn test_live_values() {
        let pool = sqlite_pool(&[AIRLINE_DDL, AIRLINE_ROWS]).await;
        let connector = AnalyticsConnector::from_pool(pool, "").await;

        let total = connector.total_revenue().await;
        assert_eq!(total.rows[0][0], CellValue::Float(1300.0));

        let load = connector.load_factor().await;
        assert_eq!(load.cell(0, "FLIGHT_ID"), Some(&CellValue::Int(1000)));
        assert_eq!(load.cell(0, "load_factor"), Some(&CellValue::Float(66.67)));

        let alerts = connector.maintenance_alerts().await;
        assert_eq!(alerts.row_count(), 2);
        assert_eq!(alerts.cell(0, "maintenance_status"), Some(&CellValue::from("CRITICAL")));
        assert_eq!(alerts.cell(1, "maintenance_status"), Some(&CellValue::from("HIGH")));

        let demo = connector.passenger_demographics().await;
        let female = (0..demo.row_count())
            .find(|&r| demo.cell(r, "GENDER") == Some(&CellValue::from("F")))
            .unwrap();
        assert_eq!(demo.cell(female, "avg_age"), Some(&CellValue::Float(35.5)));

        let trends = connector.financial_trends().await;
        assert_eq!(
            trends.cell(0, "flight_date"),
            Some(&CellValue::Date(chrono::NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()))
        );
        assert!(!connector.is_sample_mode());
    }

    #[tokio::test]
    async fn test_empty_live_result_is_empty_table() {
        let pool = sqlite_pool(&[AIRLINE_DDL]).await;
        let connector = AnalyticsConnector::from_pool(pool, "").await;
        let table = connector.maintenance_alerts().await;
        assert!(table.is_empty());
        assert_eq!(table.column_names(), Metric::MaintenanceAlerts.column_names());
        assert!(!connector.is_sample_mode());
    }

    #[tokio::test]
    async fn test_missing_tables_latch_sample_mode() {
        let pool = sqlite_pool(&[]).await;
        let connector = AnalyticsConnector::from_pool(pool, "").await;
        assert!(!connector.is_sample_mode());

        let table = connector.load_factor().await;
        assert!(connector.is_sample_mode());
        assert_eq!(table.row_count(), 200);

        // the latch is permanent, even for metrics never tried live
        let revenue = connector.total_revenue().await;
        assert_eq!(revenue.rows[0][0], CellValue::Float(15_750_000.0));
        assert!(connector.is_sample_mode());
    }

    #[tokio::test]
    async fn test_execute_query() {
        let pool = sqlite_pool(&[AIRLINE_DDL, AIRLINE_ROWS]).await;
        let connector = AnalyticsConnector::from_pool(pool, "").await;

        let table = connector
            .execute_query("SELECT AIRPORT_NAME FROM AIRPORTS ORDER BY AIRPORT_ID")
            .await
            .unwrap();
        assert_eq!(table.row_count(), 2);

        let err = connector.execute_query("DELETE FROM TICKETS").await.unwrap_err();
        assert!(matches!(err, AppError::UnsafeSql(_)));
        assert!(!connector.is_sample_mode());

        let table = connector.execute_query("SELECT * FROM CREW").await.unwrap();
        assert!(table.is_empty());
        assert!(connector.is_sample_mode());
    }

    #[tokio::test]
    async fn test_offline_connector() {
        let connector = AnalyticsConnector::offline("tests");
        assert!(connector.is_sample_mode());
        assert!(!connector.test_connection().await);
        assert_eq!(MetricSource::kind(&connector), SourceKind::Sample);
        assert!(connector.list_tables(None).await.is_err());
        assert_eq!(connector.hr_metrics().await.row_count(), 4);
    }
}
