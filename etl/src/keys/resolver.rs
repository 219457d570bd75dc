//! Natural-to-surrogate key lookup built from rows read back from the store.

use std::collections::HashMap;

use crate::error::{DataError, DataResult};
use crate::record::{RecordSet, Value};

/// Maps a natural key tuple to the surrogate key the store assigned.
///
/// Built only from rows that are already persisted. When two persisted rows
/// share a natural key, the one with the lowest surrogate wins; collisions
/// are counted so the run can report them.
#[derive(Debug, Clone)]
pub struct SurrogateResolver {
    natural_columns: Vec<String>,
    surrogate_column: String,
    mapping: HashMap<Vec<Value>, i64>,
    collisions: usize,
}

impl SurrogateResolver {
    /// Build from a projection holding `surrogate_column` and every column of
    /// `natural_columns`. Rows with a null natural key are ignored.
    pub fn from_projection(
        projection: &RecordSet,
        natural_columns: &[&str],
        surrogate_column: &str,
    ) -> DataResult<Self> {
        let surrogate_idx = projection.column_index(surrogate_column)?;
        let natural_idx: Vec<usize> = natural_columns
            .iter()
            .map(|c| projection.column_index(c))
            .collect::<DataResult<_>>()?;

        let mut entries = Vec::with_capacity(projection.len());
        for row in projection.rows() {
            let surrogate = match &row[surrogate_idx] {
                Value::Int(key) => *key,
                other => {
                    return Err(DataError::InvalidSurrogate {
                        column: surrogate_column.to_string(),
                        value: other.to_string(),
                    })
                }
            };
            let natural: Vec<Value> = natural_idx.iter().map(|&i| row[i].clone()).collect();
            if natural.iter().any(Value::is_null) {
                continue;
            }
            entries.push((surrogate, natural));
        }
        entries.sort_by_key(|(surrogate, _)| *surrogate);

        let mut mapping = HashMap::with_capacity(entries.len());
        let mut collisions = 0;
        for (surrogate, natural) in entries {
            if mapping.contains_key(&natural) {
                collisions += 1;
            } else {
                mapping.insert(natural, surrogate);
            }
        }

        Ok(Self {
            natural_columns: natural_columns.iter().map(|c| c.to_string()).collect(),
            surrogate_column: surrogate_column.to_string(),
            mapping,
            collisions,
        })
    }

    /// Surrogate for a natural key tuple.
    pub fn resolve(&self, natural: &[Value]) -> Option<i64> {
        self.mapping.get(natural).copied()
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Persisted rows whose natural key was already taken.
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    pub fn natural_columns(&self) -> &[String] {
        &self.natural_columns
    }

    pub fn surrogate_column(&self) -> &str {
        &self.surrogate_column
    }

    /// The mapping as `{natural columns..., surrogate}`, sorted by surrogate.
    pub fn to_record_set(&self) -> DataResult<RecordSet> {
        let columns = self
            .natural_columns
            .iter()
            .cloned()
            .chain(std::iter::once(self.surrogate_column.clone()));
        let mut entries: Vec<(&Vec<Value>, &i64)> = self.mapping.iter().collect();
        entries.sort_by_key(|(_, surrogate)| **surrogate);

        let mut out = RecordSet::new(columns)?;
        for (natural, surrogate) in entries {
            let mut row = natural.clone();
            row.push(Value::Int(*surrogate));
            out.push_row(row)?;
        }
        Ok(out)
    }
}
