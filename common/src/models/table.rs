//! Generic tabular result container.
//!
//! Every metric read, custom query and schema lookup hands back a
//! [`ResultTable`]: ordered, named, typed columns plus row-major cells.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Logical column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int,
    Float,
    Text,
    Bool,
    Date,
    Timestamp,
    /// Type could not be determined (e.g. every value was NULL).
    Unknown,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Int => "int",
            ColumnType::Float => "float",
            ColumnType::Text => "text",
            ColumnType::Bool => "bool",
            ColumnType::Date => "date",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Column information in a result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Column data type.
    pub data_type: ColumnType,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Static column description used by the metric catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub data_type: ColumnType,
}

impl ColumnSpec {
    pub const fn new(name: &'static str, data_type: ColumnType) -> Self {
        Self { name, data_type }
    }
}

impl From<&ColumnSpec> for ColumnInfo {
    fn from(spec: &ColumnSpec) -> Self {
        ColumnInfo::new(spec.name, spec.data_type)
    }
}

/// A single cell.
///
/// Serialized as a bare JSON value; the column carries the type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Numeric view of the cell. Text is parsed leniently.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(v) => Some(*v as f64),
            CellValue::Float(v) if v.is_finite() => Some(*v),
            CellValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Int(v) => Some(*v),
            CellValue::Float(v) if v.is_finite() => Some(v.round() as i64),
            CellValue::Bool(v) => Some(i64::from(*v)),
            CellValue::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f.round() as i64))
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            CellValue::Date(d) => Some(*d),
            CellValue::Timestamp(ts) => Some(ts.date()),
            CellValue::Text(s) => parse_date(s),
            _ => None,
        }
    }

    /// Type this cell would report on its own.
    pub fn column_type(&self) -> ColumnType {
        match self {
            CellValue::Null => ColumnType::Unknown,
            CellValue::Bool(_) => ColumnType::Bool,
            CellValue::Int(_) => ColumnType::Int,
            CellValue::Float(_) => ColumnType::Float,
            CellValue::Date(_) => ColumnType::Date,
            CellValue::Timestamp(_) => ColumnType::Timestamp,
            CellValue::Text(_) => ColumnType::Text,
        }
    }

    /// Converts the cell to `target`, yielding `Null` when it cannot be represented.
    pub fn coerce(self, target: ColumnType) -> CellValue {
        if self.is_null() {
            return CellValue::Null;
        }
        match target {
            ColumnType::Unknown => self,
            ColumnType::Int => self.as_i64().map_or(CellValue::Null, CellValue::Int),
            ColumnType::Float => self.as_f64().map_or(CellValue::Null, CellValue::Float),
            ColumnType::Bool => match self {
                CellValue::Bool(b) => CellValue::Bool(b),
                other => other
                    .as_i64()
                    .map_or(CellValue::Null, |v| CellValue::Bool(v != 0)),
            },
            ColumnType::Date => self.as_date().map_or(CellValue::Null, CellValue::Date),
            ColumnType::Timestamp => match self {
                CellValue::Timestamp(ts) => CellValue::Timestamp(ts),
                CellValue::Date(d) => d
                    .and_hms_opt(0, 0, 0)
                    .map_or(CellValue::Null, CellValue::Timestamp),
                CellValue::Text(s) => parse_timestamp(&s).map_or(CellValue::Null, CellValue::Timestamp),
                _ => CellValue::Null,
            },
            ColumnType::Text => match self {
                CellValue::Text(s) => CellValue::Text(s),
                other => CellValue::Text(other.to_string()),
            },
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(v) => write!(f, "{v}"),
            CellValue::Int(v) => write!(f, "{v}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            CellValue::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::Int(v)
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Float(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::Text(v.to_string())
    }
}

impl From<String> for CellValue {
    fn from(v: String) -> Self {
        CellValue::Text(v)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(v: NaiveDate) -> Self {
        CellValue::Date(v)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(CellValue::Null, Into::into)
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(s).map(|ts| ts.date()))
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Tabular result returned by every read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct ResultTable {
    /// Column information.
    pub columns: Vec<ColumnInfo>,

    /// Row data, one cell per column.
    #[schema(value_type = Vec<Vec<Object>>)]
    pub rows: Vec<Vec<CellValue>>,
}

impl ResultTable {
    /// Empty table with the given columns.
    pub fn new(columns: Vec<ColumnInfo>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Empty table shaped like `schema`.
    pub fn with_schema(schema: &[ColumnSpec]) -> Self {
        Self::new(schema.iter().map(ColumnInfo::from).collect())
    }

    /// Builds a table column by column. Short columns are padded with `Null`.
    pub fn from_columns(columns: Vec<(ColumnInfo, Vec<CellValue>)>) -> Self {
        let height = columns.iter().map(|(_, cells)| cells.len()).max().unwrap_or(0);
        let mut rows = vec![Vec::with_capacity(columns.len()); height];
        let mut infos = Vec::with_capacity(columns.len());
        for (info, cells) in columns {
            let mut cells = cells.into_iter();
            for row in rows.iter_mut() {
                row.push(cells.next().unwrap_or(CellValue::Null));
            }
            infos.push(info);
        }
        Self {
            columns: infos,
            rows,
        }
    }

    /// Appends a row, padding or truncating it to the column count.
    pub fn push_row(&mut self, mut row: Vec<CellValue>) {
        row.resize(self.columns.len(), CellValue::Null);
        self.rows.push(row);
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Case-insensitive column lookup.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .or_else(|| {
                self.columns
                    .iter()
                    .position(|c| c.name.eq_ignore_ascii_case(name))
            })
    }

    /// First column matching any of `names` (case-insensitive).
    pub fn find_column(&self, names: &[&str]) -> Option<usize> {
        names.iter().find_map(|n| self.column_index(n))
    }

    /// Cells of one column.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &CellValue> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&CellValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Appends the rows of `other`, matching columns by name.
    ///
    /// Columns only present in `other` are added; missing cells become `Null`.
    pub fn append(&mut self, other: ResultTable) {
        if self.columns.is_empty() && self.rows.is_empty() {
            *self = other;
            return;
        }
        let mut mapping = Vec::with_capacity(other.columns.len());
        for col in &other.columns {
            let idx = match self.column_index(&col.name) {
                Some(idx) => idx,
                None => {
                    self.columns.push(col.clone());
                    for row in self.rows.iter_mut() {
                        row.push(CellValue::Null);
                    }
                    self.columns.len() - 1
                }
            };
            mapping.push(idx);
        }
        let width = self.columns.len();
        for row in other.rows {
            let mut out = vec![CellValue::Null; width];
            for (cell, &idx) in row.into_iter().zip(mapping.iter()) {
                out[idx] = cell;
            }
            self.rows.push(out);
        }
    }

    /// Reshapes the table to `schema`.
    ///
    /// Columns are matched case-insensitively and renamed to the schema
    /// spelling; absent columns become `Null`; extra columns are dropped;
    /// cells are coerced to the schema type.
    pub fn conform(self, schema: &[ColumnSpec]) -> ResultTable {
        let sources: Vec<Option<usize>> = schema.iter().map(|s| self.column_index(s.name)).collect();
        let rows = self
            .rows
            .into_iter()
            .map(|row| {
                schema
                    .iter()
                    .zip(sources.iter())
                    .map(|(spec, src)| match src {
                        Some(idx) => row[*idx].clone().coerce(spec.data_type),
                        None => CellValue::Null,
                    })
                    .collect()
            })
            .collect();
        ResultTable {
            columns: schema.iter().map(ColumnInfo::from).collect(),
            rows,
        }
    }

    /// Rounds a float column in place to `digits` decimals.
    pub fn round_column(&mut self, name: &str, digits: i32) {
        let Some(idx) = self.column_index(name) else {
            return;
        };
        let factor = 10f64.powi(digits);
        for row in self.rows.iter_mut() {
            if let CellValue::Float(v) = row[idx] {
                row[idx] = CellValue::Float((v * factor).round() / factor);
            }
        }
    }

    /// Fills `Unknown` column types from the first non-null cell.
    pub fn infer_types(&mut self) {
        for (idx, col) in self.columns.iter_mut().enumerate() {
            if col.data_type != ColumnType::Unknown {
                continue;
            }
            if let Some(cell) = self.rows.iter().map(|r| &r[idx]).find(|c| !c.is_null()) {
                col.data_type = cell.column_type();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: [ColumnSpec; 2] = [
        ColumnSpec::new("ROUTE_ID", ColumnType::Int),
        ColumnSpec::new("total_revenue", ColumnType::Float),
    ];

    #[test]
    fn test_conform_renames_case_insensitively_and_coerces() {
        let mut table = ResultTable::new(vec![
            ColumnInfo::new("total_revenue", ColumnType::Int),
            ColumnInfo::new("route_id", ColumnType::Int),
            ColumnInfo::new("extra", ColumnType::Text),
        ]);
        table.push_row(vec![CellValue::Int(2500), CellValue::Int(7), "x".into()]);

        let out = table.conform(&SCHEMA);
        assert_eq!(out.column_names(), vec!["ROUTE_ID", "total_revenue"]);
        assert_eq!(out.rows[0], vec![CellValue::Int(7), CellValue::Float(2500.0)]);
    }

    #[test]
    fn test_conform_of_empty_table_keeps_schema() {
        let out = ResultTable::default().conform(&SCHEMA);
        assert!(out.is_empty());
        assert_eq!(out.column_names(), vec!["ROUTE_ID", "total_revenue"]);
    }

    #[test]
    fn test_from_columns_pads_short_columns() {
        let table = ResultTable::from_columns(vec![
            (ColumnInfo::new("a", ColumnType::Int), vec![CellValue::Int(1), CellValue::Int(2)]),
            (ColumnInfo::new("b", ColumnType::Text), vec!["x".into()]),
        ]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(1, "b"), Some(&CellValue::Null));
    }

    #[test]
    fn test_append_unions_columns() {
        let mut a = ResultTable::from_columns(vec![(
            ColumnInfo::new("flight_id", ColumnType::Int),
            vec![CellValue::Int(1)],
        )]);
        let b = ResultTable::from_columns(vec![
            (ColumnInfo::new("FLIGHT_ID", ColumnType::Int), vec![CellValue::Int(2)]),
            (ColumnInfo::new("capacity", ColumnType::Int), vec![CellValue::Int(180)]),
        ]);
        a.append(b);
        assert_eq!(a.row_count(), 2);
        assert_eq!(a.column_names(), vec!["flight_id", "capacity"]);
        assert_eq!(a.cell(0, "capacity"), Some(&CellValue::Null));
        assert_eq!(a.cell(1, "flight_id"), Some(&CellValue::Int(2)));
    }

    #[test]
    fn test_round_column() {
        let mut table = ResultTable::from_columns(vec![(
            ColumnInfo::new("load_factor", ColumnType::Float),
            vec![CellValue::Float(83.33333)],
        )]);
        table.round_column("LOAD_FACTOR", 2);
        assert_eq!(table.rows[0][0], CellValue::Float(83.33));
    }

    #[test]
    fn test_text_coerces_to_date() {
        let cell = CellValue::Text("2024-03-01 08:15:00".into()).coerce(ColumnType::Date);
        assert_eq!(cell, CellValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
    }

    #[test]
    fn test_cells_serialize_as_plain_json() {
        let json = serde_json::to_string(&vec![
            CellValue::Null,
            CellValue::Int(3),
            CellValue::Text("JFK".into()),
        ])
        .unwrap();
        assert_eq!(json, r#"[null,3,"JFK"]"#);
    }

    #[test]
    fn test_date_and_date_like_text_differ_only_in_column_type() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let table = ResultTable::from_columns(vec![
            (ColumnInfo::new("flight_date", ColumnType::Date), vec![CellValue::Date(date)]),
            (ColumnInfo::new("note", ColumnType::Text), vec!["2024-03-01".into()]),
        ]);
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["rows"][0][0], json["rows"][0][1]);
        assert_eq!(json["columns"][0]["data_type"], "date");
        assert_eq!(json["columns"][1]["data_type"], "text");
        assert_eq!(table.rows[0][1].column_type(), ColumnType::Text);
    }
}
