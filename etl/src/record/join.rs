//! Relational joins between record sets.

use std::collections::HashMap;

use super::{RecordSet, Value};
use crate::error::{DataError, DataResult};

/// Join flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinKind {
    /// Keep every left row; unmatched right columns become null.
    #[default]
    Left,
    /// Keep only left rows with at least one match.
    Inner,
}

impl RecordSet {
    /// Join `other` on `left_keys[i] == right_keys[i]`.
    ///
    /// Output columns are the left columns followed by the non-key right
    /// columns. A left row matching several right rows appears once per
    /// match. Null keys never match.
    pub fn join(
        &self,
        other: &RecordSet,
        left_keys: &[&str],
        right_keys: &[&str],
        kind: JoinKind,
    ) -> DataResult<RecordSet> {
        if left_keys.len() != right_keys.len() || left_keys.is_empty() {
            return Err(DataError::KeyArity {
                left: left_keys.len(),
                right: right_keys.len(),
            });
        }
        let left_idx: Vec<usize> = left_keys
            .iter()
            .map(|k| self.column_index(k))
            .collect::<DataResult<_>>()?;
        let right_idx: Vec<usize> = right_keys
            .iter()
            .map(|k| other.column_index(k))
            .collect::<DataResult<_>>()?;
        let carried: Vec<usize> = (0..other.columns.len())
            .filter(|i| !right_idx.contains(i))
            .collect();

        let mut columns = self.columns.clone();
        for &i in &carried {
            let name = &other.columns[i];
            if self.has_column(name) {
                return Err(DataError::ColumnConflict(name.clone()));
            }
            columns.push(name.clone());
        }

        let mut index: HashMap<Vec<&Value>, Vec<usize>> = HashMap::new();
        for (pos, row) in other.rows.iter().enumerate() {
            let key: Vec<&Value> = right_idx.iter().map(|&i| &row[i]).collect();
            if key.iter().any(|v| v.is_null()) {
                continue;
            }
            index.entry(key).or_default().push(pos);
        }

        let mut out = RecordSet::new(columns)?;
        for row in &self.rows {
            let key: Vec<&Value> = left_idx.iter().map(|&i| &row[i]).collect();
            let matches = if key.iter().any(|v| v.is_null()) {
                None
            } else {
                index.get(&key)
            };
            match matches {
                Some(positions) => {
                    for &pos in positions {
                        let right = &other.rows[pos];
                        let mut joined = row.clone();
                        joined.extend(carried.iter().map(|&i| right[i].clone()));
                        out.rows.push(joined);
                    }
                }
                None if kind == JoinKind::Left => {
                    let mut joined = row.clone();
                    joined.extend(carried.iter().map(|_| Value::Null));
                    out.rows.push(joined);
                }
                None => {}
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales() -> RecordSet {
        RecordSet::from_rows(
            ["customer_id", "quantity"],
            vec![
                vec!["C001".into(), Value::Int(2)],
                vec!["C999".into(), Value::Int(1)],
                vec![Value::Null, Value::Int(4)],
            ],
        )
        .unwrap()
    }

    fn shadow() -> RecordSet {
        RecordSet::from_rows(
            ["old_customer_id", "email"],
            vec![
                vec!["C001".into(), "a@x.com".into()],
                vec![Value::Null, "ghost@x.com".into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_left_join_preserves_every_left_row() {
        let joined = sales()
            .join(&shadow(), &["customer_id"], &["old_customer_id"], JoinKind::Left)
            .unwrap();

        assert_eq!(joined.columns(), &["customer_id", "quantity", "email"]);
        assert_eq!(joined.len(), 3);
        assert_eq!(joined.rows()[0][2], Value::from("a@x.com"));
        assert!(joined.rows()[1][2].is_null());
        // Null keys never match, not even a null on the right side.
        assert!(joined.rows()[2][2].is_null());
    }

    #[test]
    fn test_inner_join_drops_unmatched() {
        let joined = sales()
            .join(&shadow(), &["customer_id"], &["old_customer_id"], JoinKind::Inner)
            .unwrap();
        assert_eq!(joined.len(), 1);
    }

    #[test]
    fn test_composite_key_join() {
        let items = RecordSet::from_rows(
            ["customer_key", "date", "product_key"],
            vec![
                vec![Value::Int(1), "2024-01-01".into(), Value::Int(10)],
                vec![Value::Int(1), "2024-01-02".into(), Value::Int(11)],
            ],
        )
        .unwrap();
        let orders = RecordSet::from_rows(
            ["customer_id", "order_date", "order_id"],
            vec![vec![Value::Int(1), "2024-01-01".into(), Value::Int(500)]],
        )
        .unwrap();

        let joined = items
            .join(
                &orders,
                &["customer_key", "date"],
                &["customer_id", "order_date"],
                JoinKind::Left,
            )
            .unwrap();
        assert_eq!(joined.columns(), &["customer_key", "date", "product_key", "order_id"]);
        assert_eq!(joined.rows()[0][3], Value::Int(500));
        assert!(joined.rows()[1][3].is_null());
    }

    #[test]
    fn test_multiple_matches_repeat_left_row() {
        let right = RecordSet::from_rows(
            ["old_customer_id", "email"],
            vec![
                vec!["C001".into(), "a@x.com".into()],
                vec!["C001".into(), "b@x.com".into()],
            ],
        )
        .unwrap();
        let joined = sales()
            .join(&right, &["customer_id"], &["old_customer_id"], JoinKind::Inner)
            .unwrap();
        assert_eq!(joined.len(), 2);
    }

    #[test]
    fn test_conflicting_column_rejected() {
        let right = RecordSet::from_rows(
            ["old_customer_id", "quantity"],
            vec![vec!["C001".into(), Value::Int(9)]],
        )
        .unwrap();
        assert!(matches!(
            sales().join(&right, &["customer_id"], &["old_customer_id"], JoinKind::Left),
            Err(DataError::ColumnConflict(c)) if c == "quantity"
        ));
    }

    #[test]
    fn test_key_arity_checked() {
        assert!(matches!(
            sales().join(&shadow(), &["customer_id"], &[], JoinKind::Left),
            Err(DataError::KeyArity { .. })
        ));
    }
}
