//! Relational store boundary.
//!
//! The pipeline only needs four things from a store: a liveness check, bulk
//! inserts, a projection read, and (optionally) inserts that hand back the
//! generated keys. [`RelationalStore`] captures exactly that.
//!
//! - [`memory::MemoryStore`] - serial keys and constraint checks in memory
//! - [`postgres::PgStore`] - PostgreSQL through sqlx

pub mod memory;
pub mod postgres;
pub mod schema;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use schema::{ColumnDef, ForeignKey, TableSchema};

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::record::RecordSet;

/// A read of selected columns from one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub table: String,
    pub columns: Vec<String>,
}

impl Projection {
    pub fn new<S: Into<String>>(table: impl Into<String>, columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// `SELECT col, ... FROM table` form, for logs.
    pub fn describe(&self) -> String {
        format!("SELECT {} FROM {}", self.columns.join(", "), self.table)
    }
}

/// Persistence contract used by the pipeline.
///
/// Every call completes (and is visible to subsequent reads) before it
/// returns.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Fails if the store cannot be reached.
    async fn ping(&self) -> StoreResult<()>;

    /// Create the target tables if they are missing. Stores that carry
    /// their schema with them have nothing to do.
    async fn ensure_schema(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Insert every row of `rows` into `table`. Returns the count written.
    async fn persist(&self, table: &str, rows: &RecordSet) -> StoreResult<usize>;

    /// Read `projection.columns` of every row of `projection.table`.
    async fn query(&self, projection: &Projection) -> StoreResult<RecordSet>;

    /// Insert `rows` and return `returning` for exactly the inserted rows.
    ///
    /// The default implementation persists and then re-reads the whole
    /// table, so the result may include rows written by earlier runs.
    async fn persist_returning(
        &self,
        table: &str,
        rows: &RecordSet,
        returning: &[&str],
    ) -> StoreResult<RecordSet> {
        self.persist(table, rows).await?;
        self.query(&Projection::new(table, returning.iter().copied())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_describe() {
        let p = Projection::new("customers", ["customer_id", "email"]);
        assert_eq!(p.describe(), "SELECT customer_id, email FROM customers");
    }
}
