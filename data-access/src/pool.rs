//! Database connection pool.
//!
//! One pool per process, created from [`DbConfig`]. The enum keeps the three
//! sqlx backends behind a single type so the connector and the catalog can
//! dispatch on the store kind.

use std::time::{Duration, Instant};

use common::errors::{AppError, AppResult};
use common::models::connection::{DbConfig, DbType};
use common::models::table::ResultTable;
use sqlx::{mysql::MySqlPoolOptions, postgres::PgPoolOptions, sqlite::SqlitePoolOptions};
use sqlx::{MySqlPool, PgPool, SqlitePool};

use crate::decode::rows_to_table;

/// Database connection pool enum.
#[derive(Clone, Debug)]
pub enum DatabasePool {
    /// MySQL connection pool.
    MySQL(MySqlPool),
    /// PostgreSQL connection pool.
    Postgres(PgPool),
    /// SQLite connection pool.
    SQLite(SqlitePool),
}

impl DatabasePool {
    /// Opens a pool for `config`.
    ///
    /// sqlx connects eagerly, so an unreachable host or bad credentials fail here.
    pub async fn connect(config: &DbConfig) -> AppResult<Self> {
        let url = config.connection_url()?;
        let timeout = Duration::from_secs(config.connect_timeout_secs.max(1));
        let max_connections = config.max_connections.max(1);

        tracing::debug!(store = %config.display_target(), "opening connection pool");

        match config.db_type {
            DbType::MySQL => {
                let pool = MySqlPoolOptions::new()
                    .max_connections(max_connections)
                    .acquire_timeout(timeout)
                    .connect(&url)
                    .await
                    .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;
                Ok(DatabasePool::MySQL(pool))
            }
            DbType::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(max_connections)
                    .acquire_timeout(timeout)
                    .connect(&url)
                    .await
                    .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;
                Ok(DatabasePool::Postgres(pool))
            }
            DbType::SQLite => {
                // one connection so `:memory:` databases stay shared
                let pool = SqlitePoolOptions::new()
                    .max_connections(1)
                    .acquire_timeout(timeout)
                    .connect(&url)
                    .await
                    .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;
                Ok(DatabasePool::SQLite(pool))
            }
        }
    }

    pub fn db_type(&self) -> DbType {
        match self {
            DatabasePool::MySQL(_) => DbType::MySQL,
            DatabasePool::Postgres(_) => DbType::Postgres,
            DatabasePool::SQLite(_) => DbType::SQLite,
        }
    }

    /// Runs `SELECT 1` and returns the round-trip time.
    pub async fn ping(&self) -> AppResult<Duration> {
        let start = Instant::now();
        match self {
            DatabasePool::MySQL(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
            DatabasePool::Postgres(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
            DatabasePool::SQLite(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
        }
        Ok(start.elapsed())
    }

    /// Runs a read query and decodes every row.
    pub async fn fetch_table(&self, sql: &str) -> AppResult<ResultTable> {
        let table = match self {
            DatabasePool::MySQL(pool) => rows_to_table(&sqlx::query(sql).fetch_all(pool).await?),
            DatabasePool::Postgres(pool) => {
                rows_to_table(&sqlx::query(sql).fetch_all(pool).await?)
            }
            DatabasePool::SQLite(pool) => rows_to_table(&sqlx::query(sql).fetch_all(pool).await?),
        };
        Ok(table)
    }

    pub async fn close(&self) {
        match self {
            DatabasePool::MySQL(pool) => pool.close().await,
            DatabasePool::Postgres(pool) => pool.close().await,
            DatabasePool::SQLite(pool) => pool.close().await,
        }
    }
}

impl From<SqlitePool> for DatabasePool {
    fn from(pool: SqlitePool) -> Self {
        DatabasePool::SQLite(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::table::CellValue;

    #[tokio::test]
    async fn test_sqlite_memory_pool_answers_ping() {
        let pool = DatabasePool::connect(&DbConfig::sqlite(":memory:"))
            .await
            .unwrap();
        assert_eq!(pool.db_type(), DbType::SQLite);
        assert!(pool.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_table_decodes_rows() {
        let pool = DatabasePool::connect(&DbConfig::sqlite(":memory:"))
            .await
            .unwrap();
        let table = pool
            .fetch_table("SELECT 1 AS n, 'JFK' AS code, 2.5 AS x")
            .await
            .unwrap();
        assert_eq!(table.column_names(), vec!["n", "code", "x"]);
        assert_eq!(
            table.rows[0],
            vec![CellValue::Int(1), CellValue::Text("JFK".into()), CellValue::Float(2.5)]
        );
    }

    #[tokio::test]
    async fn test_unreachable_postgres_fails_to_connect() {
        let mut config = DbConfig::sqlite("unused");
        config.db_type = DbType::Postgres;
        config.host = "127.0.0.1".into();
        config.port = Some(1);
        config.database = "IEMASTER".into();
        config.connect_timeout_secs = 1;
        let err = DatabasePool::connect(&config).await.unwrap_err();
        assert!(matches!(err, AppError::DatabaseConnection(_)));
    }
}
