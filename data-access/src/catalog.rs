//! Schema discovery.
//!
//! Lists schemas, tables, views and columns of the connected store and reads
//! raw table contents. Postgres and MySQL go through `information_schema`,
//! SQLite through `sqlite_master` and `pragma_table_info`. Unlike the metric
//! reads these propagate errors: they back tooling, not the dashboard.

use common::errors::{AppError, AppResult};
use common::models::catalog::{ColumnEntry, TableEntry, TableKind};
use common::models::table::ResultTable;
use common::utils::SqlValidator;

use crate::pool::DatabasePool;

impl DatabasePool {
    /// Schema names, sorted.
    pub async fn list_schemas(&self) -> AppResult<Vec<String>> {
        let sql = match self {
            DatabasePool::Postgres(_) => {
                "SELECT CAST(schema_name AS TEXT) AS schema_name \
                 FROM information_schema.schemata ORDER BY 1"
            }
            DatabasePool::MySQL(_) => {
                "SELECT CAST(SCHEMA_NAME AS CHAR) AS schema_name \
                 FROM information_schema.SCHEMATA ORDER BY 1"
            }
            DatabasePool::SQLite(_) => "SELECT name AS schema_name FROM pragma_database_list ORDER BY seq",
        };
        let table = self.fetch_table(sql).await?;
        Ok((0..table.row_count())
            .map(|row| text(&table, row, "schema_name"))
            .collect())
    }

    /// Tables and views in `schema`, optionally filtered by kind.
    pub async fn list_tables(&self, schema: &str, kind: Option<TableKind>) -> AppResult<Vec<TableEntry>> {
        let sql = match self {
            DatabasePool::Postgres(_) | DatabasePool::MySQL(_) => format!(
                "SELECT CAST(table_schema AS {text}) AS table_schema, \
                 CAST(table_name AS {text}) AS table_name, \
                 CAST(table_type AS {text}) AS table_type \
                 FROM information_schema.tables WHERE {filter} \
                 ORDER BY table_name",
                text = self.text_type(),
                filter = self.schema_filter("table_schema", schema)?,
            ),
            DatabasePool::SQLite(_) => "SELECT '' AS table_schema, name AS table_name, \
                 type AS table_type FROM sqlite_master \
                 WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' \
                 ORDER BY name"
                .to_string(),
        };

        let table = self.fetch_table(&sql).await?;
        let entries = (0..table.row_count())
            .map(|row| TableEntry {
                schema: text(&table, row, "table_schema"),
                name: text(&table, row, "table_name"),
                kind: if text(&table, row, "table_type").to_uppercase().contains("VIEW") {
                    TableKind::View
                } else {
                    TableKind::Table
                },
            })
            .filter(|entry| kind.map_or(true, |k| k == entry.kind))
            .collect();
        Ok(entries)
    }

    /// Views in `schema`.
    pub async fn list_views(&self, schema: &str) -> AppResult<Vec<TableEntry>> {
        self.list_tables(schema, Some(TableKind::View)).await
    }

    /// Whether `schema.table` exists (case-insensitive).
    pub async fn table_exists(&self, schema: &str, table: &str) -> AppResult<bool> {
        SqlValidator::validate_identifier(table)?;
        Ok(self
            .list_tables(schema, None)
            .await?
            .iter()
            .any(|entry| entry.name.eq_ignore_ascii_case(table)))
    }

    /// Columns of one table, in ordinal order.
    pub async fn table_columns(&self, schema: &str, table: &str) -> AppResult<Vec<ColumnEntry>> {
        SqlValidator::validate_identifier(table)?;
        let sql = match self {
            DatabasePool::Postgres(_) | DatabasePool::MySQL(_) => format!(
                "{select} WHERE {filter} AND UPPER(table_name) = UPPER('{table}') \
                 ORDER BY ordinal_position",
                select = self.columns_select(),
                filter = self.schema_filter("table_schema", schema)?,
            ),
            DatabasePool::SQLite(_) => format!(
                "SELECT '{table}' AS table_name, cid + 1 AS position, name AS column_name, \
                 type AS data_type, CASE WHEN \"notnull\" = 0 THEN 'YES' ELSE 'NO' END AS is_nullable \
                 FROM pragma_table_info('{table}') ORDER BY cid"
            ),
        };
        let columns = column_entries(&self.fetch_table(&sql).await?);
        if columns.is_empty() {
            return Err(AppError::NotFound(format!("table {table}")));
        }
        Ok(columns)
    }

    /// Every column of every base table in `schema`, ordered by table then position.
    pub async fn schema_columns(&self, schema: &str) -> AppResult<Vec<ColumnEntry>> {
        let sql = match self {
            DatabasePool::Postgres(_) | DatabasePool::MySQL(_) => format!(
                "{select} WHERE {filter} ORDER BY table_name, ordinal_position",
                select = self.columns_select(),
                filter = self.schema_filter("table_schema", schema)?,
            ),
            DatabasePool::SQLite(_) => "SELECT m.name AS table_name, p.cid + 1 AS position, \
                 p.name AS column_name, p.type AS data_type, \
                 CASE WHEN p.\"notnull\" = 0 THEN 'YES' ELSE 'NO' END AS is_nullable \
                 FROM sqlite_master m JOIN pragma_table_info(m.name) p \
                 WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite_%' \
                 ORDER BY m.name, p.cid"
                .to_string(),
        };
        Ok(column_entries(&self.fetch_table(&sql).await?))
    }

    /// Reads `schema.table`, optionally projecting columns and capping rows.
    pub async fn read_table(
        &self,
        schema: &str,
        table: &str,
        columns: Option<&[&str]>,
        limit: Option<u32>,
    ) -> AppResult<ResultTable> {
        SqlValidator::validate_identifier(table)?;
        let projection = match columns {
            Some(cols) if !cols.is_empty() => {
                for col in cols {
                    SqlValidator::validate_identifier(col)?;
                }
                cols.join(", ")
            }
            _ => "*".to_string(),
        };
        let mut sql = format!("SELECT {projection} FROM {}", self.qualify(schema, table)?);
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        self.fetch_table(&sql).await
    }

    /// First `n` rows of `schema.table`.
    pub async fn head(&self, schema: &str, table: &str, n: u32) -> AppResult<ResultTable> {
        self.read_table(schema, table, None, Some(n)).await
    }

    fn qualify(&self, schema: &str, table: &str) -> AppResult<String> {
        let schema = schema.trim();
        if schema.is_empty() || matches!(self, DatabasePool::SQLite(_)) {
            return Ok(table.to_string());
        }
        SqlValidator::validate_identifier(schema)?;
        Ok(format!("{schema}.{table}"))
    }

    fn text_type(&self) -> &'static str {
        match self {
            DatabasePool::MySQL(_) => "CHAR",
            _ => "TEXT",
        }
    }

    fn columns_select(&self) -> String {
        let (text, int) = match self {
            DatabasePool::MySQL(_) => ("CHAR", "SIGNED"),
            _ => ("TEXT", "BIGINT"),
        };
        format!(
            "SELECT CAST(table_name AS {text}) AS table_name, \
             CAST(ordinal_position AS {int}) AS position, \
             CAST(column_name AS {text}) AS column_name, \
             CAST(data_type AS {text}) AS data_type, \
             CAST(is_nullable AS {text}) AS is_nullable \
             FROM information_schema.columns"
        )
    }

    /// `information_schema` predicate for `schema`; empty means the session default.
    fn schema_filter(&self, column: &str, schema: &str) -> AppResult<String> {
        let schema = schema.trim();
        if schema.is_empty() {
            let current = match self {
                DatabasePool::MySQL(_) => "DATABASE()",
                _ => "current_schema()",
            };
            return Ok(format!("{column} = {current}"));
        }
        SqlValidator::validate_identifier(schema)?;
        Ok(format!("UPPER({column}) = UPPER('{schema}')"))
    }
}

fn text(table: &ResultTable, row: usize, column: &str) -> String {
    table
        .cell(row, column)
        .map(|cell| cell.to_string())
        .unwrap_or_default()
}

fn column_entries(table: &ResultTable) -> Vec<ColumnEntry> {
    (0..table.row_count())
        .map(|row| ColumnEntry {
            table: text(table, row, "table_name"),
            position: table
                .cell(row, "position")
                .and_then(|c| c.as_i64())
                .unwrap_or_default(),
            name: text(table, row, "column_name"),
            type_name: text(table, row, "data_type"),
            nullable: text(table, row, "is_nullable").eq_ignore_ascii_case("YES"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::connection::DbConfig;
    use common::models::table::CellValue;

    async fn airline_db() -> DatabasePool {
        let pool = DatabasePool::connect(&DbConfig::sqlite(":memory:"))
            .await
            .unwrap();
        let DatabasePool::SQLite(inner) = &pool else {
            unreachable!()
        };
        for stmt in [
            "CREATE TABLE AIRPORTS (AIRPORT_ID INTEGER NOT NULL, AIRPORT_NAME TEXT, LATITUDE REAL)",
            "CREATE TABLE TICKETS (TICKET_ID INTEGER NOT NULL, FLIGHT_ID INTEGER, TOTAL_AMOUNT REAL)",
            "CREATE VIEW BIG_TICKETS AS SELECT * FROM TICKETS WHERE TOTAL_AMOUNT > 1000",
            "INSERT INTO AIRPORTS VALUES (1, 'JFK', 40.6), (2, 'LAX', 33.9), (3, 'ORD', 41.9)",
        ] {
            sqlx::query(stmt).execute(inner).await.unwrap();
        }
        pool
    }

    #[tokio::test]
    async fn test_list_tables_and_views() {
        let pool = airline_db().await;
        let tables = pool.list_tables("", None).await.unwrap();
        let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["AIRPORTS", "BIG_TICKETS", "TICKETS"]);

        let views = pool.list_views("").await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].kind, TableKind::View);
    }

    #[tokio::test]
    async fn test_table_exists_is_case_insensitive() {
        let pool = airline_db().await;
        assert!(pool.table_exists("", "airports").await.unwrap());
        assert!(!pool.table_exists("", "CREW").await.unwrap());
        assert!(pool.table_exists("", "x'; --").await.is_err());
    }

    #[tokio::test]
    async fn test_table_columns() {
        let pool = airline_db().await;
        let cols = pool.table_columns("", "TICKETS").await.unwrap();
        assert_eq!(cols.len(), 3);
        assert_eq!(cols[0].name, "TICKET_ID");
        assert_eq!(cols[0].position, 1);
        assert!(!cols[0].nullable);
        assert_eq!(cols[2].type_name, "REAL");
        assert!(cols[2].nullable);

        let err = pool.table_columns("", "CREW").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_schema_columns_cover_all_tables() {
        let pool = airline_db().await;
        let cols = pool.schema_columns("").await.unwrap();
        assert_eq!(cols.len(), 6);
        assert_eq!(cols[0].table, "AIRPORTS");
        assert_eq!(cols[5].table, "TICKETS");
    }

    #[tokio::test]
    async fn test_head_and_projection() {
        let pool = airline_db().await;
        let head = pool.head("", "AIRPORTS", 2).await.unwrap();
        assert_eq!(head.row_count(), 2);

        let names = pool
            .read_table("", "AIRPORTS", Some(&["AIRPORT_NAME"]), None)
            .await
            .unwrap();
        assert_eq!(names.column_names(), vec!["AIRPORT_NAME"]);
        assert_eq!(names.rows[2][0], CellValue::Text("ORD".into()));

        assert!(pool
            .read_table("", "AIRPORTS", Some(&["1; DROP"]), None)
            .await
            .is_err());
    }
}
