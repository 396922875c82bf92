//! Schema discovery models.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Kind of catalog object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    Table,
    View,
}

/// A table or view in a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TableEntry {
    /// Owning schema (empty for SQLite).
    pub schema: String,
    /// Table name.
    pub name: String,
    /// Table or view.
    pub kind: TableKind,
}

/// Column metadata for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ColumnEntry {
    /// Table the column belongs to.
    pub table: String,
    /// 1-based ordinal position.
    pub position: i64,
    /// Column name.
    pub name: String,
    /// Declared database type name.
    pub type_name: String,
    /// Whether NULL is allowed.
    pub nullable: bool,
}
