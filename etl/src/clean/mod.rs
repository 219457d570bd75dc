//! Cleaning stage.
//!
//! Turns raw extracts into typed, deduplicated record sets ready for key
//! preservation. Each entity follows the same shape:
//!
//! ```text
//! raw ──▶ deduplicate ──▶ normalize ──▶ drop null mandatory ──▶ cast/fill/derive
//! ```
//!
//! Source identifiers are left in place; [`crate::keys::NaturalKeyPreserver`]
//! takes them from here.

pub mod normalize;

pub use normalize::Normalizers;

use serde::Serialize;

use crate::error::DataResult;
use crate::models::{customer, product, sale};
use crate::record::{ColumnType, Fill, RecordSet, Value};

/// Row counts of one cleaned entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanStats {
    /// Rows in the raw extract.
    pub read: usize,
    /// Exact duplicate rows removed.
    pub duplicates: usize,
    /// Rows dropped for a null mandatory field.
    pub dropped: usize,
}

/// A cleaned entity with its counts.
#[derive(Debug, Clone)]
pub struct Cleaned {
    pub records: RecordSet,
    pub stats: CleanStats,
}

/// Mandatory sale fields; a null in any of them drops the row.
pub const SALE_REQUIRED: [&str; 5] = [
    sale::CUSTOMER_ID,
    sale::PRODUCT_ID,
    sale::TRANSACTION_DATE,
    sale::QUANTITY,
    sale::UNIT_PRICE,
];

#[derive(Debug, Clone, Copy, Default)]
pub struct Cleaner {
    normalizers: Normalizers,
}

impl Cleaner {
    pub fn new(normalizers: Normalizers) -> Self {
        Self { normalizers }
    }

    /// Deduplicate, normalize email/phone/date and drop rows without email.
    pub fn customers(&self, raw: RecordSet) -> DataResult<Cleaned> {
        let read = raw.len();
        let (mut records, duplicates) = raw.deduplicate();

        records.map_column(customer::EMAIL, self.normalizers.email)?;
        if records.has_column(customer::PHONE) {
            records.map_column(customer::PHONE, self.normalizers.phone)?;
        }
        if records.has_column(customer::REGISTRATION_DATE) {
            records.map_column(customer::REGISTRATION_DATE, self.normalizers.date)?;
        }

        let (records, dropped) = records.drop_rows_with_null(&[customer::EMAIL])?;
        Ok(Cleaned {
            records,
            stats: CleanStats {
                read,
                duplicates,
                dropped,
            },
        })
    }

    /// Deduplicate, drop unnamed products, fill price with the median and
    /// stock with zero, normalize category.
    pub fn products(&self, raw: RecordSet) -> DataResult<Cleaned> {
        let read = raw.len();
        let (records, duplicates) = raw.deduplicate();
        let (mut records, dropped) = records.drop_rows_with_null(&[product::NAME])?;

        let mut fills = Vec::new();
        if records.has_column(product::PRICE) {
            records.cast_column(product::PRICE, ColumnType::Float)?;
            fills.push((product::PRICE, Fill::Median));
        }
        if records.has_column(product::STOCK_QUANTITY) {
            records.cast_column(product::STOCK_QUANTITY, ColumnType::Int)?;
            fills.push((product::STOCK_QUANTITY, Fill::Constant(Value::Int(0))));
        }
        records.fill_nulls(&fills)?;

        if records.has_column(product::CATEGORY) {
            records.map_column(product::CATEGORY, self.normalizers.category)?;
        }

        Ok(Cleaned {
            records,
            stats: CleanStats {
                read,
                duplicates,
                dropped,
            },
        })
    }

    /// Deduplicate, normalize the transaction date, drop incomplete rows
    /// and derive `subtotal = quantity * unit_price`.
    pub fn sales(&self, raw: RecordSet) -> DataResult<Cleaned> {
        let read = raw.len();
        let (mut records, duplicates) = raw.deduplicate();

        records.map_column(sale::TRANSACTION_DATE, self.normalizers.date)?;
        let (mut records, dropped) = records.drop_rows_with_null(&SALE_REQUIRED)?;

        records.cast_column(sale::QUANTITY, ColumnType::Int)?;
        records.cast_column(sale::UNIT_PRICE, ColumnType::Float)?;
        if records.has_column(sale::SUBTOTAL) {
            records = records.drop_columns(&[sale::SUBTOTAL])?;
        }
        records.derive_column(sale::SUBTOTAL, |row| {
            Ok(row.get(sale::QUANTITY)?.mul(row.get(sale::UNIT_PRICE)?))
        })?;

        Ok(Cleaned {
            records,
            stats: CleanStats {
                read,
                duplicates,
                dropped,
            },
        })
    }
}
