//! # FlexiMart ETL - surrogate-key reconciliation for the FlexiMart warehouse
//!
//! Loads three dirty extracts (customers, products, sales) into a normalized
//! schema whose keys are assigned by the database, and rewrites every
//! dependent row to the generated keys before it is written.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌─────────┐   ┌──────────────────┐   ┌─────────────────┐
//! │ CSV files │──▶│  Clean  │──▶│ Preserve + Load  │──▶│ Orders + Items  │
//! │ (auto-enc)│   │ (dedup) │   │ customers/prods  │   │ aggregate, link │
//! └───────────┘   └─────────┘   └──────────────────┘   └─────────────────┘
//!                                       │                      │
//!                                       ▼                      ▼
//!                                 resolve keys ───────▶ rewrite foreign keys
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fleximart_etl::{pipeline, EtlConfig, CsvSource, MemoryStore, MemoryReportSink, RunOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = EtlConfig::in_dir("data");
//!     let store = MemoryStore::fleximart();
//!     let sink = MemoryReportSink::new();
//!     let summary = pipeline::run(&CsvSource::from_config(&config), &store, &sink, &RunOptions::default())
//!         .await
//!         .unwrap();
//!     println!("{} orders loaded", summary.orders_loaded);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per layer
//! - [`record`] - In-memory tables (dedup, fill, join, group)
//! - [`keys`] - Natural-key preservation, surrogate resolution, rewriting
//! - [`clean`] - Cleaning stage and field normalizers
//! - [`parser`] - CSV parsing with auto-detection
//! - [`source`] - Raw extract sources
//! - [`store`] - Relational stores (PostgreSQL, in-memory)
//! - [`report`] - Data-quality report sinks
//! - [`pipeline`] - The end-to-end run
//! - [`logs`] - Progress log broadcaster

// Core modules
pub mod config;
pub mod error;
pub mod logs;
pub mod models;
pub mod record;

// Key reconciliation
pub mod keys;

// Extract and clean
pub mod clean;
pub mod parser;
pub mod source;

// Load
pub mod report;
pub mod store;

// Orchestration
pub mod pipeline;

// =============================================================================
// Re-exports - Errors
// =============================================================================

pub use error::{CsvError, DataError, EtlError, EtlResult, StoreError};

// =============================================================================
// Re-exports - Records and keys
// =============================================================================

pub use keys::{DependencyRewriter, NaturalKeyPreserver, PreservedTable, SurrogateResolver};
pub use record::{Aggregate, AggregateSpec, ColumnType, Fill, JoinKind, RecordSet, Value};

// =============================================================================
// Re-exports - Collaborators
// =============================================================================

pub use clean::{Cleaner, Normalizers};
pub use config::EtlConfig;
pub use report::{FileReportSink, MemoryReportSink, Report, ReportSink};
pub use source::{CsvSource, MemorySource, SourceTable, TabularSource};
pub use store::{MemoryStore, PgStore, Projection, RelationalStore};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use pipeline::{clean_sources, run, CleanSummary, RunOptions, RunSummary};
