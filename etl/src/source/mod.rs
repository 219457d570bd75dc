//! Tabular sources for the three raw extracts.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::config::EtlConfig;
use crate::error::{CsvError, CsvResult};
use crate::logs::log_info_indent;
use crate::parser::parse_csv_file_auto;
use crate::record::RecordSet;

/// The extracts a run reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceTable {
    Customers,
    Products,
    Sales,
}

impl SourceTable {
    pub const ALL: [SourceTable; 3] = [SourceTable::Customers, SourceTable::Products, SourceTable::Sales];

    pub fn name(&self) -> &'static str {
        match self {
            SourceTable::Customers => "customers",
            SourceTable::Products => "products",
            SourceTable::Sales => "sales",
        }
    }
}

impl fmt::Display for SourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Anything that can hand over a raw extract as a record set.
pub trait TabularSource {
    fn load(&self, table: SourceTable) -> CsvResult<RecordSet>;
}

/// Reads each extract from a CSV file, detecting encoding and delimiter.
#[derive(Debug, Clone)]
pub struct CsvSource {
    customers: PathBuf,
    products: PathBuf,
    sales: PathBuf,
}

impl CsvSource {
    pub fn new(customers: impl Into<PathBuf>, products: impl Into<PathBuf>, sales: impl Into<PathBuf>) -> Self {
        Self {
            customers: customers.into(),
            products: products.into(),
            sales: sales.into(),
        }
    }

    pub fn from_config(config: &EtlConfig) -> Self {
        Self::new(&config.customers_path, &config.products_path, &config.sales_path)
    }

    pub fn path(&self, table: SourceTable) -> &PathBuf {
        match table {
            SourceTable::Customers => &self.customers,
            SourceTable::Products => &self.products,
            SourceTable::Sales => &self.sales,
        }
    }
}

impl TabularSource for CsvSource {
    fn load(&self, table: SourceTable) -> CsvResult<RecordSet> {
        let path = self.path(table);
        let parsed = parse_csv_file_auto(path)?;
        log_info_indent(
            format!(
                "{}: {} rows ({}, delimiter {:?})",
                path.display(),
                parsed.records.len(),
                parsed.encoding,
                parsed.delimiter
            ),
            1,
        );
        Ok(parsed.records)
    }
}

/// Serves prebuilt record sets.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: HashMap<SourceTable, RecordSet>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, table: SourceTable, records: RecordSet) -> Self {
        self.tables.insert(table, records);
        self
    }
}

impl TabularSource for MemorySource {
    fn load(&self, table: SourceTable) -> CsvResult<RecordSet> {
        self.tables
            .get(&table)
            .cloned()
            .ok_or_else(|| CsvError::Missing(table.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;
    use std::io::Write;

    #[test]
    fn test_csv_source_reads_each_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = EtlConfig::in_dir(dir.path());
        for (path, body) in [
            (&config.customers_path, "customer_id;email\nC001;a@x.com\n"),
            (&config.products_path, "product_id,product_name\nP1,Laptop\nP2,Mouse\n"),
            (&config.sales_path, "customer_id,product_id\n"),
        ] {
            let mut f = std::fs::File::create(path).unwrap();
            f.write_all(body.as_bytes()).unwrap();
        }

        let source = CsvSource::from_config(&config);
        let customers = source.load(SourceTable::Customers).unwrap();
        assert_eq!(customers.columns(), &["customer_id", "email"]);
        assert_eq!(customers.rows()[0][1], Value::from("a@x.com"));
        assert_eq!(source.load(SourceTable::Products).unwrap().len(), 2);
        assert!(source.load(SourceTable::Sales).unwrap().is_empty());
    }

    #[test]
    fn test_csv_source_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvSource::from_config(&EtlConfig::in_dir(dir.path()));
        assert!(matches!(
            source.load(SourceTable::Customers),
            Err(CsvError::Io { .. })
        ));
    }

    #[test]
    fn test_memory_source() {
        let set = RecordSet::new(["email"]).unwrap();
        let source = MemorySource::new().with(SourceTable::Customers, set.clone());
        assert_eq!(source.load(SourceTable::Customers).unwrap(), set);
        assert!(matches!(source.load(SourceTable::Sales), Err(CsvError::Missing(_))));
    }
}
