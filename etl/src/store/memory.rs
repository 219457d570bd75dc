//! In-memory relational store.
//!
//! Assigns serial keys and enforces the same NOT NULL, UNIQUE, type and
//! FOREIGN KEY rules as the PostgreSQL schema. A batch is checked in full
//! before any row lands, so a failed persist leaves the table untouched.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::schema::{self, TableSchema};
use super::{Projection, RelationalStore};
use crate::error::{StoreError, StoreResult};
use crate::record::{RecordSet, Value};

#[derive(Debug)]
struct Table {
    schema: TableSchema,
    rows: Vec<Vec<Value>>,
    next_key: i64,
}

impl Table {
    fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
            next_key: 1,
        }
    }

    fn column_index(&self, column: &str) -> StoreResult<usize> {
        self.schema
            .columns
            .iter()
            .position(|c| c.name == column)
            .ok_or_else(|| StoreError::UnknownColumn {
                table: self.schema.name.to_string(),
                column: column.to_string(),
            })
    }

    fn keys(&self) -> StoreResult<HashSet<i64>> {
        let idx = self.column_index(self.schema.key)?;
        Ok(self.rows.iter().filter_map(|r| r[idx].as_i64()).collect())
    }
}

/// Relational store held in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Table>>,
    offline: bool,
}

impl MemoryStore {
    /// A store with the given tables.
    pub fn new(schemas: Vec<TableSchema>) -> Self {
        let tables = schemas
            .into_iter()
            .map(|s| (s.name.to_string(), Table::new(s)))
            .collect();
        Self {
            tables: Mutex::new(tables),
            offline: false,
        }
    }

    /// A store with the FlexiMart tables.
    pub fn fleximart() -> Self {
        Self::new(schema::fleximart())
    }

    /// A store whose every call fails with a connection error.
    pub fn offline() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            offline: true,
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<String, Table>>> {
        if self.offline {
            return Err(StoreError::Connection("store is offline".to_string()));
        }
        self.tables
            .lock()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
    }

    /// Full contents of `table`, key column included.
    pub fn table(&self, table: &str) -> StoreResult<RecordSet> {
        let tables = self.lock()?;
        let t = tables
            .get(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        let columns: Vec<&str> = t.schema.columns.iter().map(|c| c.name).collect();
        RecordSet::from_rows(columns, t.rows.clone())
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    /// Row count of `table`.
    pub fn count(&self, table: &str) -> StoreResult<usize> {
        let tables = self.lock()?;
        tables
            .get(table)
            .map(|t| t.rows.len())
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }

    /// Validate and insert; returns the full stored rows that were added.
    fn insert(&self, table: &str, rows: &RecordSet) -> StoreResult<Vec<Vec<Value>>> {
        let mut tables = self.lock()?;

        let (schema, next_key, existing) = {
            let t = tables
                .get(table)
                .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
            (t.schema.clone(), t.next_key, t.rows.clone())
        };
        let constraint = |message: String| StoreError::Constraint {
            table: table.to_string(),
            message,
        };

        // Map incoming columns onto table positions.
        let mut positions = Vec::with_capacity(rows.columns().len());
        for column in rows.columns() {
            if column == schema.key {
                return Err(constraint(format!("cannot insert explicit key '{}'", column)));
            }
            let idx = schema
                .columns
                .iter()
                .position(|c| c.name == column.as_str())
                .ok_or_else(|| StoreError::UnknownColumn {
                    table: table.to_string(),
                    column: column.clone(),
                })?;
            positions.push(idx);
        }

        let mut parent_keys = HashMap::new();
        for fk in &schema.foreign_keys {
            let parent = tables
                .get(fk.references)
                .ok_or_else(|| StoreError::UnknownTable(fk.references.to_string()))?;
            parent_keys.insert(fk.column, parent.keys()?);
        }

        let mut unique_seen: HashMap<usize, HashSet<Value>> = HashMap::new();
        for (i, c) in schema.columns.iter().enumerate() {
            if c.unique {
                unique_seen.insert(i, existing.iter().map(|r| r[i].clone()).collect());
            }
        }

        let key_idx = schema
            .columns
            .iter()
            .position(|c| c.name == schema.key)
            .ok_or_else(|| StoreError::UnknownColumn {
                table: table.to_string(),
                column: schema.key.to_string(),
            })?;

        let mut staged = Vec::with_capacity(rows.len());
        let mut key = next_key;
        for incoming in rows.rows() {
            let mut stored: Vec<Value> = schema
                .columns
                .iter()
                .map(|c| c.default.clone().unwrap_or(Value::Null))
                .collect();
            for (value, &idx) in incoming.iter().zip(&positions) {
                stored[idx] = value.clone();
            }
            stored[key_idx] = Value::Int(key);

            for (i, c) in schema.columns.iter().enumerate() {
                let value = &stored[i];
                if !c.sql_type.accepts(value) {
                    return Err(constraint(format!(
                        "value '{}' does not fit column '{}' ({})",
                        value,
                        c.name,
                        c.sql_type.ddl()
                    )));
                }
                if value.is_null() && !c.nullable {
                    return Err(constraint(format!("null value in column '{}'", c.name)));
                }
                if let Some(seen) = unique_seen.get_mut(&i) {
                    if !value.is_null() && !seen.insert(value.clone()) {
                        return Err(constraint(format!(
                            "duplicate key value '{}' in column '{}'",
                            value, c.name
                        )));
                    }
                }
                if let Some(keys) = parent_keys.get(c.name) {
                    let ok = match value {
                        Value::Null => true,
                        Value::Int(k) => keys.contains(k),
                        _ => false,
                    };
                    if !ok {
                        return Err(constraint(format!(
                            "'{}' = {} has no parent row",
                            c.name, value
                        )));
                    }
                }
            }
            staged.push(stored);
            key += 1;
        }

        let t = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        t.rows.extend(staged.iter().cloned());
        t.next_key = key;
        Ok(staged)
    }

    fn project(
        schema: &TableSchema,
        rows: &[Vec<Value>],
        columns: &[String],
    ) -> StoreResult<RecordSet> {
        let mut idx = Vec::with_capacity(columns.len());
        for column in columns {
            let i = schema
                .columns
                .iter()
                .position(|c| c.name == column.as_str())
                .ok_or_else(|| StoreError::UnknownColumn {
                    table: schema.name.to_string(),
                    column: column.clone(),
                })?;
            idx.push(i);
        }
        let projected = rows
            .iter()
            .map(|r| idx.iter().map(|&i| r[i].clone()).collect())
            .collect();
        RecordSet::from_rows(columns.iter().cloned(), projected)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[async_trait]
impl RelationalStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.lock().map(|_| ())
    }

    async fn persist(&self, table: &str, rows: &RecordSet) -> StoreResult<usize> {
        self.insert(table, rows).map(|added| added.len())
    }

    async fn query(&self, projection: &Projection) -> StoreResult<RecordSet> {
        let tables = self.lock()?;
        let t = tables
            .get(&projection.table)
            .ok_or_else(|| StoreError::UnknownTable(projection.table.clone()))?;
        Self::project(&t.schema, &t.rows, &projection.columns)
    }

    async fn persist_returning(
        &self,
        table: &str,
        rows: &RecordSet,
        returning: &[&str],
    ) -> StoreResult<RecordSet> {
        let added = self.insert(table, rows)?;
        let schema = {
            let tables = self.lock()?;
            tables
                .get(table)
                .map(|t| t.schema.clone())
                .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?
        };
        let columns: Vec<String> = returning.iter().map(|c| c.to_string()).collect();
        Self::project(&schema, &added, &columns)
    }
}
