//! In-memory tables.
//!
//! A [`RecordSet`] is an ordered list of rows over named columns. Every
//! operation is a pure transformation: it either consumes the set and
//! returns a new one, or mutates a single column in place.
//!
//! # Example
//!
//! ```text
//! ┌─────────────┬──────────┐   deduplicate()   ┌─────────────┬──────────┐
//! │ customer_id │ email    │  ──────────────▶  │ customer_id │ email    │
//! ├─────────────┼──────────┤                   ├─────────────┼──────────┤
//! │ C001        │ a@x.com  │                   │ C001        │ a@x.com  │
//! │ C001        │ a@x.com  │                   │ C002        │ b@x.com  │
//! │ C002        │ b@x.com  │                   └─────────────┴──────────┘
//! └─────────────┴──────────┘                    removed: 1
//! ```

mod aggregate;
mod join;
mod value;

pub use aggregate::{Aggregate, AggregateSpec, Fill};
pub use join::JoinKind;
pub use value::{ColumnType, Value};

use std::collections::HashSet;

use crate::error::{DataError, DataResult};

/// An ordered collection of rows with named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// Borrowed view of one row, with column lookup by name.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    /// Value of `column`, or `MissingColumn`.
    pub fn get(&self, column: &str) -> DataResult<&'a Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
            .ok_or_else(|| DataError::MissingColumn(column.to_string()))
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }
}

impl RecordSet {
    /// Create an empty set with the given columns.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> DataResult<Self> {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut seen = HashSet::new();
        for c in &columns {
            if !seen.insert(c.as_str()) {
                return Err(DataError::DuplicateColumn(c.clone()));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    /// Create a set from columns and rows, checking row widths.
    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<Value>>,
    ) -> DataResult<Self> {
        let mut set = Self::new(columns)?;
        for row in rows {
            set.push_row(row)?;
        }
        Ok(set)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<Value>> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Index of `column`, or `MissingColumn`.
    pub fn column_index(&self, column: &str) -> DataResult<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| DataError::MissingColumn(column.to_string()))
    }

    fn column_indices(&self, columns: &[&str]) -> DataResult<Vec<usize>> {
        columns.iter().map(|c| self.column_index(c)).collect()
    }

    /// Append a row. Its width must match the column count.
    pub fn push_row(&mut self, row: Vec<Value>) -> DataResult<()> {
        if row.len() != self.columns.len() {
            return Err(DataError::RowWidth {
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Iterate rows as named views.
    pub fn iter(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |values| Row {
            columns: &self.columns,
            values,
        })
    }

    /// All values of `column`, in row order.
    pub fn column(&self, column: &str) -> DataResult<Vec<&Value>> {
        let idx = self.column_index(column)?;
        Ok(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Number of nulls in `column`.
    pub fn null_count(&self, column: &str) -> DataResult<usize> {
        Ok(self.column(column)?.into_iter().filter(|v| v.is_null()).count())
    }

    // -------------------------------------------------------------------------
    // Row filters
    // -------------------------------------------------------------------------

    /// Remove repeated rows by full-row equality, keeping first occurrences.
    ///
    /// Returns the distinct rows and how many duplicates were removed.
    pub fn deduplicate(self) -> (Self, usize) {
        let before = self.rows.len();
        let mut seen = HashSet::with_capacity(before);
        let rows: Vec<Vec<Value>> = self
            .rows
            .into_iter()
            .filter(|row| seen.insert(row.clone()))
            .collect();
        let removed = before - rows.len();
        (
            Self {
                columns: self.columns,
                rows,
            },
            removed,
        )
    }

    /// Keep the first row for each distinct tuple of `columns`.
    pub fn distinct_by(self, columns: &[&str]) -> DataResult<(Self, usize)> {
        let idx = self.column_indices(columns)?;
        let before = self.rows.len();
        let mut seen = HashSet::with_capacity(before);
        let rows: Vec<Vec<Value>> = self
            .rows
            .into_iter()
            .filter(|row| seen.insert(idx.iter().map(|&i| row[i].clone()).collect::<Vec<_>>()))
            .collect();
        let removed = before - rows.len();
        Ok((
            Self {
                columns: self.columns,
                rows,
            },
            removed,
        ))
    }

    /// Remove rows with a null in any of `columns`.
    pub fn drop_rows_with_null(self, columns: &[&str]) -> DataResult<(Self, usize)> {
        let idx = self.column_indices(columns)?;
        let before = self.rows.len();
        let rows: Vec<Vec<Value>> = self
            .rows
            .into_iter()
            .filter(|row| idx.iter().all(|&i| !row[i].is_null()))
            .collect();
        let removed = before - rows.len();
        Ok((
            Self {
                columns: self.columns,
                rows,
            },
            removed,
        ))
    }

    /// Keep rows for which `keep` returns true.
    pub fn filter<F>(self, mut keep: F) -> DataResult<Self>
    where
        F: FnMut(Row<'_>) -> DataResult<bool>,
    {
        let mut rows = Vec::with_capacity(self.rows.len());
        for values in self.rows {
            let row = Row {
                columns: &self.columns,
                values: &values,
            };
            if keep(row)? {
                rows.push(values);
            }
        }
        Ok(Self {
            columns: self.columns,
            rows,
        })
    }

    // -------------------------------------------------------------------------
    // Column operations
    // -------------------------------------------------------------------------

    /// Append a column computed from each row.
    pub fn derive_column<F>(&mut self, name: &str, mut f: F) -> DataResult<()>
    where
        F: FnMut(Row<'_>) -> DataResult<Value>,
    {
        if self.has_column(name) {
            return Err(DataError::ColumnConflict(name.to_string()));
        }
        let mut derived = Vec::with_capacity(self.rows.len());
        for values in &self.rows {
            derived.push(f(Row {
                columns: &self.columns,
                values,
            })?);
        }
        for (row, value) in self.rows.iter_mut().zip(derived) {
            row.push(value);
        }
        self.columns.push(name.to_string());
        Ok(())
    }

    /// Append a column holding the same value on every row.
    pub fn with_constant(mut self, name: &str, value: Value) -> DataResult<Self> {
        self.derive_column(name, |_| Ok(value.clone()))?;
        Ok(self)
    }

    /// Replace every value of `column` with `f(value)`.
    pub fn map_column<F>(&mut self, column: &str, mut f: F) -> DataResult<()>
    where
        F: FnMut(&Value) -> Value,
    {
        let idx = self.column_index(column)?;
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
        Ok(())
    }

    /// Convert every value of `column` to `target`.
    ///
    /// Fails on the first value that cannot be converted.
    pub fn cast_column(&mut self, column: &str, target: ColumnType) -> DataResult<()> {
        let idx = self.column_index(column)?;
        for row in &mut self.rows {
            row[idx] = row[idx].coerce(target).ok_or_else(|| DataError::Coercion {
                column: column.to_string(),
                value: row[idx].to_string(),
                target: target.name(),
            })?;
        }
        Ok(())
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> DataResult<()> {
        if from == to {
            return self.column_index(from).map(|_| ());
        }
        if self.has_column(to) {
            return Err(DataError::ColumnConflict(to.to_string()));
        }
        let idx = self.column_index(from)?;
        self.columns[idx] = to.to_string();
        Ok(())
    }

    /// Project onto `columns`, in the given order.
    pub fn select(&self, columns: &[&str]) -> DataResult<Self> {
        let idx = self.column_indices(columns)?;
        let mut out = Self::new(columns.iter().copied())?;
        out.rows = self
            .rows
            .iter()
            .map(|row| idx.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Ok(out)
    }

    /// Remove `columns`. Every named column must exist.
    pub fn drop_columns(self, columns: &[&str]) -> DataResult<Self> {
        let drop = self.column_indices(columns)?;
        let keep: Vec<usize> = (0..self.columns.len()).filter(|i| !drop.contains(i)).collect();
        let new_columns = keep.iter().map(|&i| self.columns[i].clone()).collect();
        let rows = self
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .enumerate()
                    .filter(|(i, _)| keep.contains(i))
                    .map(|(_, v)| v)
                    .collect()
            })
            .collect();
        Ok(Self {
            columns: new_columns,
            rows,
        })
    }

    /// Sort rows by the given columns, ascending.
    pub fn sort_by_columns(&mut self, columns: &[&str]) -> DataResult<()> {
        let idx = self.column_indices(columns)?;
        self.rows.sort_by(|a, b| {
            idx.iter()
                .map(|&i| a[i].cmp(&b[i]))
                .find(|o| o.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customers() -> RecordSet {
        RecordSet::from_rows(
            ["customer_id", "email", "phone"],
            vec![
                vec!["C001".into(), "a@x.com".into(), "98765".into()],
                vec!["C001".into(), "a@x.com".into(), "98765".into()],
                vec!["C002".into(), Value::Null, "12345".into()],
                vec!["C003".into(), "c@x.com".into(), Value::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        assert!(matches!(
            RecordSet::new(["a", "a"]),
            Err(DataError::DuplicateColumn(_))
        ));
    }

    #[test]
    fn test_row_width_checked() {
        let mut set = RecordSet::new(["a", "b"]).unwrap();
        assert!(matches!(
            set.push_row(vec![Value::Int(1)]),
            Err(DataError::RowWidth { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn test_deduplicate_counts_removed() {
        let (set, removed) = customers().deduplicate();
        assert_eq!(removed, 1);
        assert_eq!(set.len(), 3);
        assert_eq!(set.rows()[0][0], Value::from("C001"));
    }

    #[test]
    fn test_deduplicate_non_adjacent_rows() {
        let set = RecordSet::from_rows(
            ["k"],
            vec![vec![Value::Int(1)], vec![Value::Int(2)], vec![Value::Int(1)]],
        )
        .unwrap();
        let (set, removed) = set.deduplicate();
        assert_eq!(removed, 1);
        assert_eq!(set.column("k").unwrap(), vec![&Value::Int(1), &Value::Int(2)]);
    }

    #[test]
    fn test_drop_rows_with_null() {
        let (set, removed) = customers().drop_rows_with_null(&["email"]).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(set.len(), 3);
        assert!(set.column("email").unwrap().iter().all(|v| !v.is_null()));
    }

    #[test]
    fn test_drop_rows_with_null_missing_column() {
        assert!(matches!(
            customers().drop_rows_with_null(&["nope"]),
            Err(DataError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_distinct_by_first_seen_wins() {
        let set = RecordSet::from_rows(
            ["id", "email"],
            vec![
                vec!["C1".into(), "a@x.com".into()],
                vec!["C2".into(), "a@x.com".into()],
            ],
        )
        .unwrap();
        let (set, removed) = set.distinct_by(&["email"]).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(set.rows()[0][0], Value::from("C1"));
    }

    #[test]
    fn test_derive_column() {
        let mut set = RecordSet::from_rows(
            ["quantity", "unit_price"],
            vec![vec![Value::Int(2), Value::Float(10.0)]],
        )
        .unwrap();
        set.derive_column("subtotal", |row| {
            Ok(row.get("quantity")?.mul(row.get("unit_price")?))
        })
        .unwrap();
        assert_eq!(set.column("subtotal").unwrap(), vec![&Value::Float(20.0)]);
        assert!(matches!(
            set.derive_column("subtotal", |_| Ok(Value::Null)),
            Err(DataError::ColumnConflict(_))
        ));
    }

    #[test]
    fn test_cast_column_reports_value() {
        let mut set = RecordSet::from_rows(["q"], vec![vec!["2".into()], vec!["x".into()]]).unwrap();
        let err = set.cast_column("q", ColumnType::Int).unwrap_err();
        assert!(err.to_string().contains("'x'"));
    }

    #[test]
    fn test_select_and_drop() {
        let set = customers();
        let projected = set.select(&["email", "customer_id"]).unwrap();
        assert_eq!(projected.columns(), &["email", "customer_id"]);

        let dropped = set.drop_columns(&["phone"]).unwrap();
        assert_eq!(dropped.columns(), &["customer_id", "email"]);
        assert_eq!(dropped.rows()[0].len(), 2);
    }

    #[test]
    fn test_rename_conflict() {
        let mut set = customers();
        assert!(set.rename_column("phone", "email").is_err());
        set.rename_column("customer_id", "old_customer_id").unwrap();
        assert!(set.has_column("old_customer_id"));
    }
}
