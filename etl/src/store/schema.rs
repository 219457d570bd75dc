//! Target table definitions.
//!
//! One description drives both the in-memory constraint checks and the
//! PostgreSQL DDL, so the two stores enforce the same rules.

use crate::error::DataResult;
use crate::models::{customer, order, order_item, product, DEFAULT_ORDER_STATUS};
use crate::record::{RecordSet, Value};

/// Column storage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    /// Auto-incrementing integer key.
    Serial,
    Integer,
    /// `DECIMAL(10,2)`.
    Decimal,
    Varchar(u16),
    Date,
}

impl SqlType {
    pub fn ddl(&self) -> String {
        match self {
            SqlType::Serial => "SERIAL".to_string(),
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::Decimal => "DECIMAL(10,2)".to_string(),
            SqlType::Varchar(n) => format!("VARCHAR({})", n),
            SqlType::Date => "DATE".to_string(),
        }
    }

    /// Whether `value` can be stored in a column of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (SqlType::Serial | SqlType::Integer, Value::Int(_)) => true,
            (SqlType::Decimal, Value::Int(_) | Value::Float(_)) => true,
            (SqlType::Varchar(n), Value::Text(s)) => s.chars().count() <= *n as usize,
            (SqlType::Date, Value::Date(_)) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub nullable: bool,
    pub unique: bool,
    /// Value used when an insert omits the column.
    pub default: Option<Value>,
}

impl ColumnDef {
    pub fn new(name: &'static str, sql_type: SqlType) -> Self {
        Self {
            name,
            sql_type,
            nullable: true,
            unique: false,
            default: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: &'static str,
    pub references: &'static str,
}

/// One target table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub name: &'static str,
    /// Store-assigned surrogate key.
    pub key: &'static str,
    pub columns: Vec<ColumnDef>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Project `rows` onto the columns this table stores.
    ///
    /// Returns the projected set and the names of dropped source columns.
    pub fn conform(&self, rows: &RecordSet) -> DataResult<(RecordSet, Vec<String>)> {
        let (kept, dropped): (Vec<&String>, Vec<&String>) = rows
            .columns()
            .iter()
            .partition(|c| c.as_str() != self.key && self.column(c).is_some());
        let kept: Vec<&str> = kept.into_iter().map(String::as_str).collect();
        let projected = rows.select(&kept)?;
        Ok((projected, dropped.into_iter().cloned().collect()))
    }

    /// `CREATE TABLE IF NOT EXISTS` statement.
    pub fn to_ddl(&self) -> String {
        let mut lines: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let mut line = format!("    {} {}", c.name, c.sql_type.ddl());
                if c.name == self.key {
                    line.push_str(" PRIMARY KEY");
                }
                if !c.nullable {
                    line.push_str(" NOT NULL");
                }
                if c.unique {
                    line.push_str(" UNIQUE");
                }
                if let Some(default) = &c.default {
                    match default {
                        Value::Text(s) => line.push_str(&format!(" DEFAULT '{}'", s.replace('\'', "''"))),
                        other => line.push_str(&format!(" DEFAULT {}", other)),
                    }
                }
                line
            })
            .collect();
        for fk in &self.foreign_keys {
            lines.push(format!(
                "    FOREIGN KEY ({}) REFERENCES {}({})",
                fk.column, fk.references, fk.column
            ));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
            self.name,
            lines.join(",\n")
        )
    }
}

/// The four FlexiMart tables, parents first.
pub fn fleximart() -> Vec<TableSchema> {
    vec![
        TableSchema {
            name: customer::TABLE,
            key: customer::ID,
            columns: vec![
                ColumnDef::new(customer::ID, SqlType::Serial),
                ColumnDef::new("first_name", SqlType::Varchar(50)),
                ColumnDef::new("last_name", SqlType::Varchar(50)),
                ColumnDef::new(customer::EMAIL, SqlType::Varchar(100)).not_null().unique(),
                ColumnDef::new(customer::PHONE, SqlType::Varchar(20)),
                ColumnDef::new("city", SqlType::Varchar(50)),
                ColumnDef::new(customer::REGISTRATION_DATE, SqlType::Date),
            ],
            foreign_keys: vec![],
        },
        TableSchema {
            name: product::TABLE,
            key: product::ID,
            columns: vec![
                ColumnDef::new(product::ID, SqlType::Serial),
                ColumnDef::new(product::NAME, SqlType::Varchar(100)).not_null(),
                ColumnDef::new(product::CATEGORY, SqlType::Varchar(50)),
                ColumnDef::new(product::PRICE, SqlType::Decimal),
                ColumnDef::new(product::STOCK_QUANTITY, SqlType::Integer).default_value(0i64),
            ],
            foreign_keys: vec![],
        },
        TableSchema {
            name: order::TABLE,
            key: order::ID,
            columns: vec![
                ColumnDef::new(order::ID, SqlType::Serial),
                ColumnDef::new(order::CUSTOMER_ID, SqlType::Integer).not_null(),
                ColumnDef::new(order::ORDER_DATE, SqlType::Date).not_null(),
                ColumnDef::new(order::TOTAL_AMOUNT, SqlType::Decimal).not_null(),
                ColumnDef::new(order::STATUS, SqlType::Varchar(20)).default_value(DEFAULT_ORDER_STATUS),
            ],
            foreign_keys: vec![ForeignKey {
                column: order::CUSTOMER_ID,
                references: customer::TABLE,
            }],
        },
        TableSchema {
            name: order_item::TABLE,
            key: order_item::ID,
            columns: vec![
                ColumnDef::new(order_item::ID, SqlType::Serial),
                ColumnDef::new(order_item::ORDER_ID, SqlType::Integer).not_null(),
                ColumnDef::new(order_item::PRODUCT_ID, SqlType::Integer).not_null(),
                ColumnDef::new(order_item::QUANTITY, SqlType::Integer).not_null(),
                ColumnDef::new(order_item::UNIT_PRICE, SqlType::Decimal).not_null(),
                ColumnDef::new(order_item::SUBTOTAL, SqlType::Decimal).not_null(),
            ],
            foreign_keys: vec![
                ForeignKey {
                    column: order_item::ORDER_ID,
                    references: order::TABLE,
                },
                ForeignKey {
                    column: order_item::PRODUCT_ID,
                    references: product::TABLE,
                },
            ],
        },
    ]
}

/// DDL for the whole schema.
pub fn fleximart_ddl() -> String {
    fleximart()
        .iter()
        .map(TableSchema::to_ddl)
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ddl_contains_constraints() {
        let ddl = fleximart_ddl();
        assert!(ddl.contains("customer_id SERIAL PRIMARY KEY"));
        assert!(ddl.contains("email VARCHAR(100) NOT NULL UNIQUE"));
        assert!(ddl.contains("FOREIGN KEY (order_id) REFERENCES orders(order_id)"));
        assert!(ddl.contains("status VARCHAR(20) DEFAULT 'Pending'"));
    }

    #[test]
    fn test_conform_drops_unknown_and_key_columns() {
        let schema = &fleximart()[0];
        let rows = RecordSet::from_rows(
            ["customer_id", "email", "loyalty_tier"],
            vec![vec!["C001".into(), "a@x.com".into(), "gold".into()]],
        )
        .unwrap();

        let (projected, dropped) = schema.conform(&rows).unwrap();
        assert_eq!(projected.columns(), &["email"]);
        assert_eq!(dropped, vec!["customer_id".to_string(), "loyalty_tier".to_string()]);
    }

    #[test]
    fn test_type_acceptance() {
        assert!(SqlType::Decimal.accepts(&Value::Int(3)));
        assert!(!SqlType::Integer.accepts(&Value::Float(3.0)));
        assert!(!SqlType::Varchar(2).accepts(&Value::from("abc")));
        assert!(SqlType::Date.accepts(&Value::Null));
    }
}
