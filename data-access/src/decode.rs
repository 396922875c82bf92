//! Row decoding.
//!
//! Turns sqlx rows of any backend into a [`ResultTable`]. Each cell is tried
//! against a short list of Rust types in order; the first one the driver
//! accepts wins. Cells nothing accepts (e.g. `NUMERIC` on Postgres, which
//! the metric SQL casts away) become `Null`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use common::models::table::{CellValue, ColumnInfo, ColumnType, ResultTable};
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row};

/// Conversion of a decoded driver value into a cell.
trait IntoCell {
    fn into_cell(self) -> CellValue;
}

macro_rules! int_cell {
    ($($ty:ty),+) => {$(
        impl IntoCell for $ty {
            fn into_cell(self) -> CellValue {
                CellValue::Int(i64::from(self))
            }
        }
    )+};
}

int_cell!(i16, i32, i64, u32);

impl IntoCell for u64 {
    fn into_cell(self) -> CellValue {
        i64::try_from(self).map_or(CellValue::Float(self as f64), CellValue::Int)
    }
}

impl IntoCell for f32 {
    fn into_cell(self) -> CellValue {
        CellValue::Float(f64::from(self))
    }
}

impl IntoCell for f64 {
    fn into_cell(self) -> CellValue {
        CellValue::Float(self)
    }
}

impl IntoCell for bool {
    fn into_cell(self) -> CellValue {
        CellValue::Bool(self)
    }
}

impl IntoCell for String {
    fn into_cell(self) -> CellValue {
        CellValue::Text(self)
    }
}

impl IntoCell for NaiveDate {
    fn into_cell(self) -> CellValue {
        CellValue::Date(self)
    }
}

impl IntoCell for NaiveDateTime {
    fn into_cell(self) -> CellValue {
        CellValue::Timestamp(self)
    }
}

impl IntoCell for DateTime<Utc> {
    fn into_cell(self) -> CellValue {
        CellValue::Timestamp(self.naive_utc())
    }
}

/// A driver row that can hand out cells by position.
pub trait DecodeRow: Row {
    fn decode_cell(&self, idx: usize) -> CellValue;
}

macro_rules! try_types {
    ($row:expr, $idx:expr, [$($ty:ty),+ $(,)?]) => {{
        $(
            if let Ok(value) = $row.try_get::<Option<$ty>, _>($idx) {
                return value.map_or(CellValue::Null, IntoCell::into_cell);
            }
        )+
        let column = $row.columns().get($idx).map(|c| c.name().to_string());
        tracing::debug!(?column, "cell type not decodable, using NULL");
        CellValue::Null
    }};
}

impl DecodeRow for PgRow {
    fn decode_cell(&self, idx: usize) -> CellValue {
        try_types!(
            self,
            idx,
            [i64, i32, i16, f64, f32, bool, String, NaiveDate, NaiveDateTime, DateTime<Utc>]
        )
    }
}

impl DecodeRow for MySqlRow {
    fn decode_cell(&self, idx: usize) -> CellValue {
        try_types!(
            self,
            idx,
            [i64, u64, f64, f32, String, NaiveDate, NaiveDateTime, DateTime<Utc>, bool]
        )
    }
}

impl DecodeRow for SqliteRow {
    fn decode_cell(&self, idx: usize) -> CellValue {
        // dates are stored as text, so try them before falling back to String
        try_types!(self, idx, [i64, f64, NaiveDate, NaiveDateTime, String, bool])
    }
}

/// Decodes all rows. Column types are inferred from the first non-null cell.
///
/// An empty row set yields a table without columns; callers that know the
/// expected shape conform it afterwards.
pub fn rows_to_table<R: DecodeRow>(rows: &[R]) -> ResultTable {
    let Some(first) = rows.first() else {
        return ResultTable::default();
    };
    let columns = first
        .columns()
        .iter()
        .map(|c| ColumnInfo::new(c.name(), ColumnType::Unknown))
        .collect();
    let mut table = ResultTable::new(columns);
    let width = table.columns.len();
    for row in rows {
        table.push_row((0..width).map(|idx| row.decode_cell(idx)).collect());
    }
    table.infer_types();
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn fetch(sql: &str) -> ResultTable {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let rows = sqlx::query(sql).fetch_all(&pool).await.unwrap();
        rows_to_table(&rows)
    }

    #[tokio::test]
    async fn test_nulls_and_types_are_inferred() {
        let table = fetch(
            "SELECT NULL AS a, 3 AS b UNION ALL SELECT 1.5 AS a, NULL AS b",
        )
        .await;
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.columns[0].data_type, ColumnType::Float);
        assert_eq!(table.columns[1].data_type, ColumnType::Int);
        assert_eq!(table.rows[0][0], CellValue::Null);
    }

    #[tokio::test]
    async fn test_date_text_decodes_as_date() {
        let table = fetch("SELECT DATE('2024-03-01 10:30:00') AS d").await;
        assert_eq!(
            table.rows[0][0],
            CellValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
    }

    #[tokio::test]
    async fn test_empty_result_has_no_columns() {
        let table = fetch("SELECT 1 AS a WHERE 1 = 0").await;
        assert!(table.is_empty());
        assert!(table.columns.is_empty());
    }
}
