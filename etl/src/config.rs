//! Run configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EtlError, EtlResult};
use crate::models::DEFAULT_ORDER_STATUS;

pub const CUSTOMERS_FILE: &str = "customers_raw.csv";
pub const PRODUCTS_FILE: &str = "products_raw.csv";
pub const SALES_FILE: &str = "sales_raw.csv";
pub const REPORT_FILE: &str = "data_quality_report.txt";

/// Everything one pipeline run needs to know about its surroundings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub customers_path: PathBuf,
    pub products_path: PathBuf,
    pub sales_path: PathBuf,
    pub report_path: PathBuf,
    /// PostgreSQL connection string; not needed for dry runs.
    #[serde(skip_serializing)]
    pub database_url: Option<String>,
    /// `status` given to every synthesized order.
    pub order_status: String,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            customers_path: PathBuf::from(CUSTOMERS_FILE),
            products_path: PathBuf::from(PRODUCTS_FILE),
            sales_path: PathBuf::from(SALES_FILE),
            report_path: PathBuf::from(REPORT_FILE),
            database_url: None,
            order_status: DEFAULT_ORDER_STATUS.to_string(),
        }
    }
}

impl EtlConfig {
    /// Default file names resolved under `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            customers_path: dir.join(CUSTOMERS_FILE),
            products_path: dir.join(PRODUCTS_FILE),
            sales_path: dir.join(SALES_FILE),
            report_path: dir.join(REPORT_FILE),
            ..Self::default()
        }
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn database_url(&self) -> EtlResult<&str> {
        self.database_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| EtlError::Config("DATABASE_URL is not set".to_string()))
    }
}
