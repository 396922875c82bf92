//! Custom SQL query models.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::table::ResultTable;

/// Request body for running an ad-hoc read query.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct QueryRequest {
    /// SQL statement to execute.
    #[validate(length(min = 1, message = "SQL statement is required"))]
    pub sql: String,

    /// Maximum number of rows to return (default: 1000).
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100000))]
    pub limit: Option<u32>,
}

fn default_limit() -> Option<u32> {
    Some(1000)
}

/// Result of an ad-hoc query.
#[derive(Debug, Serialize, ToSchema)]
pub struct QueryResult {
    /// Returned table (empty when the store was unavailable).
    pub table: ResultTable,

    /// Number of rows returned.
    pub row_count: usize,

    /// Whether the result was cut at `limit`.
    pub truncated: bool,

    /// Query execution time in milliseconds.
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Applies the row limit and wraps the table.
    pub fn new(mut table: ResultTable, limit: Option<u32>, execution_time_ms: u64) -> Self {
        let mut truncated = false;
        if let Some(limit) = limit.map(|l| l as usize) {
            if table.rows.len() > limit {
                table.rows.truncate(limit);
                truncated = true;
            }
        }
        Self {
            row_count: table.row_count(),
            table,
            truncated,
            execution_time_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::table::{CellValue, ColumnInfo, ColumnType};

    #[test]
    fn test_limit_truncates_rows() {
        let mut table = ResultTable::new(vec![ColumnInfo::new("X", ColumnType::Int)]);
        for i in 0..5 {
            table.push_row(vec![CellValue::Int(i)]);
        }
        let result = QueryResult::new(table, Some(3), 2);
        assert_eq!(result.row_count, 3);
        assert!(result.truncated);
    }

    #[test]
    fn test_default_limit_applies_when_missing() {
        let req: QueryRequest = serde_json::from_str(r#"{"sql":"SELECT 1"}"#).unwrap();
        assert_eq!(req.limit, Some(1000));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_empty_sql_is_invalid() {
        let req = QueryRequest {
            sql: String::new(),
            limit: None,
        };
        assert!(req.validate().is_err());
    }
}
