//! Null filling and group aggregation.

use std::collections::BTreeMap;

use super::{RecordSet, Value};
use crate::error::DataResult;

/// How to replace nulls in a column.
#[derive(Debug, Clone, PartialEq)]
pub enum Fill {
    /// A fixed value.
    Constant(Value),
    /// Median of the column's non-null numeric values.
    Median,
    /// Mean of the column's non-null numeric values.
    Mean,
}

/// Aggregate function applied per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    Count,
    Min,
    Max,
    First,
}

/// One output column of [`RecordSet::group_aggregate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateSpec {
    pub output: String,
    pub source: String,
    pub function: Aggregate,
}

impl AggregateSpec {
    pub fn new(output: impl Into<String>, source: impl Into<String>, function: Aggregate) -> Self {
        Self {
            output: output.into(),
            source: source.into(),
            function,
        }
    }

    pub fn sum(output: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(output, source, Aggregate::Sum)
    }
}

fn numeric_values(set: &RecordSet, column: &str) -> DataResult<Vec<f64>> {
    Ok(set
        .column(column)?
        .into_iter()
        .filter_map(Value::as_f64)
        .collect())
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

impl RecordSet {
    /// Replace nulls in `column`. Returns how many cells were filled.
    pub fn fill_null(&mut self, column: &str, fill: Fill) -> DataResult<usize> {
        self.fill_nulls(&[(column, fill)])
    }

    /// Replace nulls in several columns.
    ///
    /// Every statistic is computed before any fill is applied.
    pub fn fill_nulls(&mut self, fills: &[(&str, Fill)]) -> DataResult<usize> {
        let mut resolved = Vec::with_capacity(fills.len());
        for (column, fill) in fills {
            let idx = self.column_index(column)?;
            let value = match fill {
                Fill::Constant(v) => v.clone(),
                Fill::Median => median(numeric_values(self, column)?)
                    .map(Value::Float)
                    .unwrap_or(Value::Null),
                Fill::Mean => {
                    let values = numeric_values(self, column)?;
                    if values.is_empty() {
                        Value::Null
                    } else {
                        Value::Float(values.iter().sum::<f64>() / values.len() as f64)
                    }
                }
            };
            resolved.push((idx, value));
        }

        let mut filled = 0;
        for (idx, value) in resolved {
            if value.is_null() {
                continue;
            }
            for row in &mut self.rows {
                if row[idx].is_null() {
                    row[idx] = value.clone();
                    filled += 1;
                }
            }
        }
        Ok(filled)
    }

    /// One output row per distinct tuple of `keys`.
    ///
    /// Rows with a null key are skipped. Output columns are the keys followed
    /// by one column per spec, sorted by key tuple so the result does not
    /// depend on input order.
    pub fn group_aggregate(&self, keys: &[&str], specs: &[AggregateSpec]) -> DataResult<RecordSet> {
        let key_idx: Vec<usize> = keys
            .iter()
            .map(|k| self.column_index(k))
            .collect::<DataResult<_>>()?;
        let source_idx: Vec<usize> = specs
            .iter()
            .map(|s| self.column_index(&s.source))
            .collect::<DataResult<_>>()?;

        let mut groups: BTreeMap<Vec<Value>, Vec<Value>> = BTreeMap::new();
        for row in &self.rows {
            let key: Vec<Value> = key_idx.iter().map(|&i| row[i].clone()).collect();
            if key.iter().any(Value::is_null) {
                continue;
            }
            let accumulators = groups
                .entry(key)
                .or_insert_with(|| specs.iter().map(|s| initial(s.function)).collect());
            for ((acc, spec), &i) in accumulators.iter_mut().zip(specs).zip(&source_idx) {
                *acc = step(spec.function, acc, &row[i]);
            }
        }

        let columns = keys
            .iter()
            .map(|k| k.to_string())
            .chain(specs.iter().map(|s| s.output.clone()));
        let mut out = RecordSet::new(columns)?;
        for (mut key, accumulators) in groups {
            key.extend(accumulators);
            out.push_row(key)?;
        }
        Ok(out)
    }
}

fn initial(function: Aggregate) -> Value {
    match function {
        Aggregate::Sum | Aggregate::Count => Value::Int(0),
        Aggregate::Min | Aggregate::Max | Aggregate::First => Value::Null,
    }
}

fn step(function: Aggregate, acc: &Value, value: &Value) -> Value {
    if value.is_null() {
        return acc.clone();
    }
    match function {
        Aggregate::Sum => {
            let sum = acc.add(value);
            if sum.is_null() {
                acc.clone()
            } else {
                sum
            }
        }
        Aggregate::Count => Value::Int(acc.as_i64().unwrap_or(0) + 1),
        Aggregate::Min => {
            if acc.is_null() || value < acc {
                value.clone()
            } else {
                acc.clone()
            }
        }
        Aggregate::Max => {
            if acc.is_null() || value > acc {
                value.clone()
            } else {
                acc.clone()
            }
        }
        Aggregate::First => {
            if acc.is_null() {
                value.clone()
            } else {
                acc.clone()
            }
        }
    }
}
