//! Natural-key preservation ahead of surrogate assignment.
//!
//! ```text
//! cleaned customers                 shadow map                payload
//! ┌─────────────┬─────────┐        ┌─────────────────┬─────────┐  ┌─────────┬───────┐
//! │ customer_id │ email   │  ───▶  │ old_customer_id │ email   │  │ email   │ phone │
//! │ C001        │ a@x.com │        │ C001            │ a@x.com │  │ a@x.com │ ...   │
//! │ C007        │ a@x.com │        │ C007            │ a@x.com │  └─────────┴───────┘
//! └─────────────┴─────────┘        └─────────────────┴─────────┘
//! ```
//!
//! The payload carries one row per natural attribute and no identifier; the
//! store assigns the surrogate. The shadow map remembers every source id so
//! dependents referencing either `C001` or `C007` reach the same row.

use crate::error::{DataError, DataResult};
use crate::record::RecordSet;

/// Describes how one parent table keeps its source identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaturalKeyPreserver {
    id_column: String,
    shadow_column: String,
    natural_column: String,
}

/// A parent table split into its storage payload and its shadow map.
#[derive(Debug, Clone)]
pub struct PreservedTable {
    /// `{shadow, natural}`, one row per distinct shadow key.
    pub shadow_map: RecordSet,
    /// Rows to persist, without the identifier, unique on the natural column.
    pub payload: RecordSet,
    /// Payload rows dropped because an earlier row had the same natural key.
    pub collapsed: usize,
    /// Shadow keys seen with more than one natural key (first one kept).
    pub shadow_conflicts: usize,
    shadow_column: String,
    natural_column: String,
}

impl NaturalKeyPreserver {
    pub fn new(
        id_column: impl Into<String>,
        shadow_column: impl Into<String>,
        natural_column: impl Into<String>,
    ) -> Self {
        Self {
            id_column: id_column.into(),
            shadow_column: shadow_column.into(),
            natural_column: natural_column.into(),
        }
    }

    pub fn natural_column(&self) -> &str {
        &self.natural_column
    }

    /// Split a cleaned table.
    ///
    /// Must run after deduplication and null filtering, so that every
    /// shadow key corresponds to a row that is actually persisted.
    pub fn preserve(&self, table: RecordSet) -> DataResult<PreservedTable> {
        let nulls = table.null_count(&self.natural_column)?;
        if nulls > 0 {
            return Err(DataError::NullNaturalKey(self.natural_column.clone()));
        }

        let mut table = table;
        table.rename_column(&self.id_column, &self.shadow_column)?;

        let (shadow_map, _) = table
            .select(&[self.shadow_column.as_str(), self.natural_column.as_str()])?
            .deduplicate();
        let (shadow_map, _) = shadow_map.drop_rows_with_null(&[self.shadow_column.as_str()])?;
        let (shadow_map, shadow_conflicts) = shadow_map.distinct_by(&[self.shadow_column.as_str()])?;

        let (payload, collapsed) = table
            .drop_columns(&[self.shadow_column.as_str()])?
            .distinct_by(&[self.natural_column.as_str()])?;

        Ok(PreservedTable {
            shadow_map,
            payload,
            collapsed,
            shadow_conflicts,
            shadow_column: self.shadow_column.clone(),
            natural_column: self.natural_column.clone(),
        })
    }
}

impl PreservedTable {
    pub fn shadow_column(&self) -> &str {
        &self.shadow_column
    }

    pub fn natural_column(&self) -> &str {
        &self.natural_column
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;

    fn preserver() -> NaturalKeyPreserver {
        NaturalKeyPreserver::new("customer_id", "old_customer_id", "email")
    }

    #[test]
    fn test_identifier_leaves_payload() {
        let table = RecordSet::from_rows(
            ["customer_id", "email", "city"],
            vec![
                vec!["C001".into(), "a@x.com".into(), "Pune".into()],
                vec!["C002".into(), "b@x.com".into(), "Delhi".into()],
            ],
        )
        .unwrap();

        let preserved = preserver().preserve(table).unwrap();

        assert_eq!(preserved.payload.columns(), &["email", "city"]);
        assert_eq!(preserved.shadow_map.columns(), &["old_customer_id", "email"]);
        assert_eq!(preserved.shadow_map.len(), 2);
        assert_eq!(preserved.collapsed, 0);
    }

    #[test]
    fn test_same_email_collapses_but_keeps_both_shadows() {
        let table = RecordSet::from_rows(
            ["customer_id", "email", "phone"],
            vec![
                vec!["C001".into(), "a@x.com".into(), "+91-9876543210".into()],
                vec!["C007".into(), "a@x.com".into(), Value::Null],
            ],
        )
        .unwrap();

        let preserved = preserver().preserve(table).unwrap();

        assert_eq!(preserved.payload.len(), 1);
        assert_eq!(preserved.collapsed, 1);
        // First-seen row wins the payload.
        assert_eq!(preserved.payload.rows()[0][1], Value::from("+91-9876543210"));
        assert_eq!(preserved.shadow_map.len(), 2);
    }

    #[test]
    fn test_shadow_key_with_two_emails_keeps_first() {
        let table = RecordSet::from_rows(
            ["customer_id", "email"],
            vec![
                vec!["C001".into(), "a@x.com".into()],
                vec!["C001".into(), "z@x.com".into()],
            ],
        )
        .unwrap();

        let preserved = preserver().preserve(table).unwrap();

        assert_eq!(preserved.shadow_conflicts, 1);
        assert_eq!(preserved.shadow_map.len(), 1);
        assert_eq!(preserved.shadow_map.rows()[0][1], Value::from("a@x.com"));
        assert_eq!(preserved.payload.len(), 2);
    }

    #[test]
    fn test_null_natural_key_rejected() {
        let table = RecordSet::from_rows(
            ["customer_id", "email"],
            vec![vec!["C001".into(), Value::Null]],
        )
        .unwrap();

        assert!(matches!(
            preserver().preserve(table),
            Err(DataError::NullNaturalKey(c)) if c == "email"
        ));
    }
}
