//! Rewrites foreign keys of dependent rows to surrogate keys.
//!
//! ```text
//! sales.customer_id ──▶ shadow map (old_customer_id → email)
//!                   ──▶ resolver  (email → customer_id)
//!                   ──▶ sales.customer_key
//! ```

use crate::error::{DataError, DataResult};
use crate::record::{JoinKind, RecordSet};

use super::preserver::PreservedTable;
use super::resolver::SurrogateResolver;

const SHADOW_KEY: &str = "__shadow_key";
const NATURAL_KEY: &str = "__natural_key";

/// Joins a parent's shadow map with its resolver to rewrite dependents.
#[derive(Debug, Clone, Copy)]
pub struct DependencyRewriter<'a> {
    parent: &'a PreservedTable,
    resolver: &'a SurrogateResolver,
}

/// Dependent rows after rewriting.
#[derive(Debug, Clone)]
pub struct Rewritten {
    /// Rows whose foreign key resolved, with the new key column.
    pub rows: RecordSet,
    /// Rows dropped because no persisted parent matched.
    pub excluded: usize,
}

impl<'a> DependencyRewriter<'a> {
    pub fn new(parent: &'a PreservedTable, resolver: &'a SurrogateResolver) -> Self {
        Self { parent, resolver }
    }

    /// Add `resolved_column` to `dependent`, holding the surrogate key of the
    /// parent referenced by `foreign_key`.
    ///
    /// Rows with no persisted parent are removed here; the result never
    /// contains a null in `resolved_column`.
    pub fn rewrite(
        &self,
        dependent: RecordSet,
        foreign_key: &str,
        resolved_column: &str,
    ) -> DataResult<Rewritten> {
        if self.resolver.natural_columns().len() != 1 {
            return Err(DataError::KeyArity {
                left: 1,
                right: self.resolver.natural_columns().len(),
            });
        }

        let mut shadow = self.parent.shadow_map.clone();
        shadow.rename_column(self.parent.shadow_column(), SHADOW_KEY)?;
        shadow.rename_column(self.parent.natural_column(), NATURAL_KEY)?;

        let mut mapping = self.resolver.to_record_set()?;
        mapping.rename_column(&self.resolver.natural_columns()[0], NATURAL_KEY)?;
        mapping.rename_column(self.resolver.surrogate_column(), resolved_column)?;

        let joined = dependent
            .join(&shadow, &[foreign_key], &[SHADOW_KEY], JoinKind::Left)?
            .join(&mapping, &[NATURAL_KEY], &[NATURAL_KEY], JoinKind::Left)?
            .drop_columns(&[NATURAL_KEY])?;

        let (rows, excluded) = joined.drop_rows_with_null(&[resolved_column])?;
        Ok(Rewritten { rows, excluded })
    }
}
