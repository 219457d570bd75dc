//! Error types for the FlexiMart ETL pipeline.
//!
//! One enum per layer, with `From` conversions so `?` works across
//! boundaries:
//!
//! - [`CsvError`] - reading and parsing source extracts
//! - [`DataError`] - record-set and key-reconciliation failures
//! - [`StoreError`] - relational store connectivity and constraints
//! - [`EtlError`] - top-level run errors

use thiserror::Error;

// =============================================================================
// Source Errors
// =============================================================================

/// Errors while reading a tabular extract.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Malformed CSV record.
    #[error("Line {line}: {message}")]
    Parse { line: u64, message: String },

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,

    /// The source has no extract for the requested table.
    #[error("No extract available for '{0}'")]
    Missing(String),
}

// =============================================================================
// Data Errors
// =============================================================================

/// Errors raised by record-set operations and key reconciliation.
#[derive(Debug, Error)]
pub enum DataError {
    /// A referenced column does not exist.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// A column was declared twice.
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    /// A join or derive would produce two columns with the same name.
    #[error("Column '{0}' conflicts with an existing column")]
    ColumnConflict(String),

    /// A row does not match the column count.
    #[error("Row has {found} values, expected {expected}")]
    RowWidth { expected: usize, found: usize },

    /// Key lists of a join differ in length.
    #[error("Join key mismatch: {left} left keys, {right} right keys")]
    KeyArity { left: usize, right: usize },

    /// A value could not be converted to the requested type.
    #[error("Cannot coerce value '{value}' in column '{column}' to {target}")]
    Coercion {
        column: String,
        value: String,
        target: &'static str,
    },

    /// A natural key that must identify a persisted row is null.
    #[error("Null natural key in column '{0}'")]
    NullNaturalKey(String),

    /// A surrogate key read back from the store is not an integer.
    #[error("Invalid surrogate key '{value}' in column '{column}'")]
    InvalidSurrogate { column: String, value: String },

    /// A mandatory foreign key is still null where it must be resolved.
    #[error("{count} rows have an unresolved '{column}'")]
    Unresolved { column: String, count: usize },
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors at the relational store boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot be reached.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A row violates a table constraint.
    #[error("Constraint violation on '{table}': {message}")]
    Constraint { table: String, message: String },

    /// Table is not part of the schema.
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Column is not part of the table.
    #[error("Unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },

    /// Table or column name is not a plain SQL identifier.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A column type the loader cannot decode.
    #[error("Unsupported type '{type_name}' for column '{column}'")]
    UnsupportedType { column: String, type_name: String },

    /// Any other backend failure.
    #[error("Store error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => {
                let table = db.table().unwrap_or("?").to_string();
                if db.constraint().is_some()
                    || matches!(
                        db.kind(),
                        sqlx::error::ErrorKind::UniqueViolation
                            | sqlx::error::ErrorKind::ForeignKeyViolation
                            | sqlx::error::ErrorKind::NotNullViolation
                            | sqlx::error::ErrorKind::CheckViolation
                    )
                {
                    StoreError::Constraint {
                        table,
                        message: db.message().to_string(),
                    }
                } else {
                    StoreError::Backend(db.message().to_string())
                }
            }
            sqlx::Error::Io(e) => StoreError::Connection(e.to_string()),
            sqlx::Error::Tls(e) => StoreError::Connection(e.to_string()),
            sqlx::Error::PoolTimedOut => StoreError::Connection("pool timed out".to_string()),
            sqlx::Error::PoolClosed => StoreError::Connection("pool closed".to_string()),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

// =============================================================================
// Run Errors (top-level)
// =============================================================================

/// Top-level error for one pipeline run.
///
/// Returned by [`crate::pipeline::run`] after the report has been flushed.
#[derive(Debug, Error)]
pub enum EtlError {
    /// Source extract error.
    #[error("Source error: {0}")]
    Source(#[from] CsvError),

    /// Data error.
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Report could not be written.
    #[error("Report error: {0}")]
    Report(#[source] std::io::Error),

    /// Run was configured without a required setting.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EtlError {
    /// True for failures at the relational store boundary.
    pub fn is_store(&self) -> bool {
        matches!(self, EtlError::Store(_))
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for source operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for record-set and key operations.
pub type DataResult<T> = Result<T, DataError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for a pipeline run.
pub type EtlResult<T> = Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let data_err = DataError::MissingColumn("email".into());
        let etl_err: EtlError = data_err.into();
        assert!(etl_err.to_string().contains("email"));
        assert!(!etl_err.is_store());

        let store_err = StoreError::Constraint {
            table: "orders".into(),
            message: "foreign key".into(),
        };
        let etl_err: EtlError = store_err.into();
        assert!(etl_err.is_store());
        assert!(etl_err.to_string().contains("orders"));
    }

    #[test]
    fn test_coercion_error_format() {
        let err = DataError::Coercion {
            column: "quantity".into(),
            value: "abc".into(),
            target: "integer",
        };
        let msg = err.to_string();
        assert!(msg.contains("quantity"));
        assert!(msg.contains("'abc'"));
        assert!(msg.contains("integer"));
    }
}
