//! PostgreSQL store backed by a sqlx connection pool.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Postgres, QueryBuilder, Row, TypeInfo};

use super::schema::{self, SqlType};
use super::{Projection, RelationalStore};
use crate::error::{StoreError, StoreResult};
use crate::record::{RecordSet, Value};

/// PostgreSQL caps bind parameters per statement at this count.
const MAX_BIND_PARAMS: usize = 65_535;
const MAX_IDENTIFIER_LEN: usize = 63;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Open a pool against `url`.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert `rows` in chunks inside one transaction. With `returning`
    /// set, each chunk hands back those columns of the inserted rows.
    async fn insert(
        &self,
        table: &str,
        rows: &RecordSet,
        returning: Option<&[&str]>,
    ) -> StoreResult<Vec<PgRow>> {
        let table = identifier(table)?;
        for column in rows.columns() {
            identifier(column)?;
        }
        let returned = match returning {
            Some(columns) => Some(select_list(table, columns)?),
            None => None,
        };

        let chunk_size = (MAX_BIND_PARAMS / rows.columns().len().max(1)).max(1);
        let mut tx = self.pool.begin().await?;
        let mut out = Vec::new();

        for chunk in rows.rows().chunks(chunk_size) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "INSERT INTO {} ({}) ",
                table,
                rows.columns().join(", ")
            ));
            builder.push_values(chunk, |mut b, row| {
                for value in row {
                    match value {
                        Value::Null => {
                            b.push("NULL");
                        }
                        Value::Bool(v) => {
                            b.push_bind(*v);
                        }
                        Value::Int(v) => {
                            b.push_bind(*v);
                        }
                        Value::Float(v) => {
                            b.push_bind(*v);
                        }
                        Value::Text(v) => {
                            b.push_bind(v.clone());
                        }
                        Value::Date(v) => {
                            b.push_bind(*v);
                        }
                    }
                }
            });

            match &returned {
                Some(list) => {
                    builder.push(" RETURNING ");
                    builder.push(list);
                    out.extend(builder.build().fetch_all(&mut *tx).await?);
                }
                None => {
                    builder.build().execute(&mut *tx).await?;
                }
            }
        }

        tx.commit().await?;
        Ok(out)
    }
}

#[async_trait]
impl RelationalStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn ensure_schema(&self) -> StoreResult<()> {
        for table in schema::fleximart() {
            sqlx::query(&table.to_ddl()).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn persist(&self, table: &str, rows: &RecordSet) -> StoreResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        self.insert(table, rows, None).await?;
        Ok(rows.len())
    }

    async fn query(&self, projection: &Projection) -> StoreResult<RecordSet> {
        let table = identifier(&projection.table)?;
        let columns: Vec<&str> = projection.columns.iter().map(String::as_str).collect();
        let sql = format!("SELECT {} FROM {}", select_list(table, &columns)?, table);

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        decode_rows(&columns, &rows)
    }

    async fn persist_returning(
        &self,
        table: &str,
        rows: &RecordSet,
        returning: &[&str],
    ) -> StoreResult<RecordSet> {
        if rows.is_empty() {
            return RecordSet::new(returning.iter().copied())
                .map_err(|e| StoreError::Backend(e.to_string()));
        }
        let inserted = self.insert(table, rows, Some(returning)).await?;
        decode_rows(returning, &inserted)
    }
}

/// Reject anything but a plain SQL identifier.
fn identifier(name: &str) -> StoreResult<&str> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if valid_start
        && name.len() <= MAX_IDENTIFIER_LEN
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Ok(name)
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

/// Column list for SELECT / RETURNING. DECIMAL columns come back as
/// float8 so they decode without an arbitrary-precision type.
fn select_list(table: &str, columns: &[&str]) -> StoreResult<String> {
    let known = schema::fleximart().into_iter().find(|t| t.name == table);
    let mut parts = Vec::with_capacity(columns.len());
    for column in columns {
        let column = identifier(column)?;
        let is_decimal = known
            .as_ref()
            .and_then(|t| t.column(column))
            .map(|c| c.sql_type == SqlType::Decimal)
            .unwrap_or(false);
        if is_decimal {
            parts.push(format!("{column}::float8 AS {column}"));
        } else {
            parts.push(column.to_string());
        }
    }
    Ok(parts.join(", "))
}

fn decode_rows(columns: &[&str], rows: &[PgRow]) -> StoreResult<RecordSet> {
    let mut out =
        RecordSet::new(columns.iter().copied()).map_err(|e| StoreError::Backend(e.to_string()))?;
    for row in rows {
        let values = (0..row.columns().len())
            .map(|i| decode_cell(row, i))
            .collect::<StoreResult<Vec<_>>>()?;
        out.push_row(values)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
    }
    Ok(out)
}

fn decode_cell(row: &PgRow, idx: usize) -> StoreResult<Value> {
    let column = &row.columns()[idx];
    let value = match column.type_info().name() {
        "INT2" => row.try_get::<Option<i16>, _>(idx)?.map(|v| Value::Int(v as i64)),
        "INT4" => row.try_get::<Option<i32>, _>(idx)?.map(|v| Value::Int(v as i64)),
        "INT8" => row.try_get::<Option<i64>, _>(idx)?.map(Value::Int),
        "FLOAT4" => row.try_get::<Option<f32>, _>(idx)?.map(|v| Value::Float(v as f64)),
        "FLOAT8" => row.try_get::<Option<f64>, _>(idx)?.map(Value::Float),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
            row.try_get::<Option<String>, _>(idx)?.map(Value::Text)
        }
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(idx)?
            .map(Value::Date),
        "BOOL" => row.try_get::<Option<bool>, _>(idx)?.map(Value::Bool),
        other => {
            return Err(StoreError::UnsupportedType {
                column: column.name().to_string(),
                type_name: other.to_string(),
            })
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_validation() {
        assert!(identifier("order_items").is_ok());
        assert!(identifier("_tmp1").is_ok());
        assert!(matches!(
            identifier("orders; DROP TABLE customers"),
            Err(StoreError::InvalidIdentifier(_))
        ));
        assert!(identifier("1orders").is_err());
        assert!(identifier("").is_err());
    }

    #[test]
    fn test_select_list_casts_decimals() {
        let list = select_list("orders", &["order_id", "total_amount"]).unwrap();
        assert_eq!(list, "order_id, total_amount::float8 AS total_amount");

        let list = select_list("elsewhere", &["total_amount"]).unwrap();
        assert_eq!(list, "total_amount");
    }

    #[test]
    fn test_select_list_rejects_bad_column() {
        assert!(select_list("orders", &["order_id", "x y"]).is_err());
    }
}
