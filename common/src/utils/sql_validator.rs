//! SQL statement validator.
//!
//! Guards the ad-hoc query endpoint and the catalog helpers that have to
//! splice identifiers into SQL text.

use crate::errors::AppError;

/// Validates SQL statements for security.
pub struct SqlValidator;

/// Forbidden SQL keywords; the analytics store is read-only for us.
const FORBIDDEN_KEYWORDS: [&str; 10] = [
    "DROP ",
    "TRUNCATE ",
    "DELETE ",
    "ALTER ",
    "INSERT ",
    "UPDATE ",
    "CREATE ",
    "GRANT ",
    "REVOKE ",
    "MERGE ",
];

const MAX_IDENTIFIER_LEN: usize = 128;

impl SqlValidator {
    /// Validates an ad-hoc statement.
    ///
    /// Only a single `SELECT` (or `WITH ... SELECT`) statement is accepted.
    ///
    /// # Errors
    /// Returns `AppError::UnsafeSql` when the statement could modify data or
    /// chains several statements.
    pub fn validate(sql: &str) -> Result<(), AppError> {
        let trimmed = sql.trim().trim_end_matches(';').trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation("SQL statement is empty".into()));
        }
        if trimmed.contains(';') {
            return Err(AppError::UnsafeSql("multiple statements are not allowed".into()));
        }
        if !Self::is_select(trimmed) {
            return Err(AppError::UnsafeSql("only SELECT statements are allowed".into()));
        }

        // pad so a keyword at the very end still matches its trailing space
        let sql_upper = format!("{} ", trimmed.to_uppercase().replace(['\n', '\t', '\r'], " "));
        for keyword in FORBIDDEN_KEYWORDS {
            if sql_upper.contains(keyword) {
                return Err(AppError::UnsafeSql(format!(
                    "forbidden operation: {}",
                    keyword.trim()
                )));
            }
        }
        Ok(())
    }

    /// Checks if the SQL is a read query.
    pub fn is_select(sql: &str) -> bool {
        let upper = sql.trim_start().to_uppercase();
        upper.starts_with("SELECT") || upper.starts_with("WITH")
    }

    /// Validates a schema, table or column name before it is spliced into SQL.
    ///
    /// Letters, digits, `_` and `$`, not starting with a digit.
    pub fn validate_identifier(name: &str) -> Result<(), AppError> {
        let mut chars = name.chars();
        let valid = match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || first == '_' => chars
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$'),
            _ => false,
        };
        if !valid || name.len() > MAX_IDENTIFIER_LEN {
            return Err(AppError::Validation(format!("invalid identifier: {name:?}")));
        }
        Ok(())
    }
}
