//! End-to-end FlexiMart load.
//!
//! ```text
//! extract ─▶ clean ─▶ customers/products ─▶ orders ─▶ order items
//!                      persist + resolve     (see [`orders`])
//! ```
//!
//! [`run`] always hands the report to the sink, including when a stage
//! fails. Whatever was persisted before a failure stays persisted.
//!
//! # Example
//!
//! ```rust,ignore
//! use fleximart_etl::{pipeline, CsvSource, EtlConfig, FileReportSink, PgStore, RunOptions};
//!
//! let config = EtlConfig::default().with_database_url("postgres://localhost/fleximart");
//! let store = PgStore::connect(config.database_url()?).await?;
//! let summary = pipeline::run(
//!     &CsvSource::from_config(&config),
//!     &store,
//!     &FileReportSink::new(&config.report_path),
//!     &RunOptions::from(&config),
//! )
//! .await?;
//! ```

pub mod orders;

use serde::Serialize;

use crate::clean::{CleanStats, Cleaner, Normalizers};
use crate::config::EtlConfig;
use crate::error::{EtlError, EtlResult};
use crate::keys::{NaturalKeyPreserver, PreservedTable, SurrogateResolver};
use crate::logs::{log_error, log_info, log_success, log_warning, log_warning_indent};
use crate::models::{customer, product, DEFAULT_ORDER_STATUS};
use crate::record::RecordSet;
use crate::report::{Report, ReportSink, SUCCESS_LINE};
use crate::source::{SourceTable, TabularSource};
use crate::store::{schema, RelationalStore};

use orders::{Parent, ResolvedSales};

/// Knobs for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// `status` of synthesized orders.
    pub order_status: String,
    pub normalizers: Normalizers,
    /// Create missing tables before loading.
    pub init_schema: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            order_status: DEFAULT_ORDER_STATUS.to_string(),
            normalizers: Normalizers::default(),
            init_schema: false,
        }
    }
}

impl From<&EtlConfig> for RunOptions {
    fn from(config: &EtlConfig) -> Self {
        Self {
            order_status: config.order_status.clone(),
            ..Self::default()
        }
    }
}

/// Cleaned extracts with their counts.
#[derive(Debug, Clone)]
pub struct CleanedSources {
    pub customers: RecordSet,
    pub products: RecordSet,
    pub sales: RecordSet,
    pub stats: CleanSummary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanSummary {
    pub customers: CleanStats,
    pub products: CleanStats,
    pub sales: CleanStats,
}

/// Counts of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub clean: CleanSummary,
    pub customers_loaded: usize,
    pub products_loaded: usize,
    pub orders_loaded: usize,
    pub order_items_loaded: usize,
    /// Customer rows folded into an earlier row with the same email.
    pub customers_collapsed: usize,
    /// Product rows folded into an earlier row with the same name.
    pub products_collapsed: usize,
    pub sales_unknown_customer: usize,
    pub sales_unknown_product: usize,
    pub items_without_order: usize,
}

/// Read and clean all three extracts, appending read/duplicate counts to
/// `report`.
pub fn clean_sources(
    source: &dyn TabularSource,
    options: &RunOptions,
    report: &mut Report,
) -> EtlResult<CleanedSources> {
    log_info("Reading extracts...");
    let customers = source.load(SourceTable::Customers)?;
    let products = source.load(SourceTable::Products)?;
    let sales = source.load(SourceTable::Sales)?;
    report.count("Customers records read", customers.len());
    report.count("Products records read", products.len());
    report.count("Sales records read", sales.len());

    log_info("Cleaning...");
    let cleaner = Cleaner::new(options.normalizers);
    let customers = cleaner.customers(customers)?;
    report.count("Customer duplicates removed", customers.stats.duplicates);
    let products = cleaner.products(products)?;
    report.count("Product duplicates removed", products.stats.duplicates);
    let sales = cleaner.sales(sales)?;
    report.count("Sales duplicates removed", sales.stats.duplicates);

    for (name, stats) in [
        ("customers", &customers.stats),
        ("products", &products.stats),
        ("sales", &sales.stats),
    ] {
        if stats.dropped > 0 {
            log_warning_indent(
                format!("{}: {} rows dropped for missing mandatory fields", name, stats.dropped),
                1,
            );
        }
    }
    log_success("Extracts cleaned");

    Ok(CleanedSources {
        stats: CleanSummary {
            customers: customers.stats,
            products: products.stats,
            sales: sales.stats,
        },
        customers: customers.records,
        products: products.records,
        sales: sales.records,
    })
}

/// Run the whole load and flush the report.
///
/// The report ends with the success line only when every stage completed;
/// otherwise its last line describes the failure.
pub async fn run(
    source: &dyn TabularSource,
    store: &dyn RelationalStore,
    sink: &dyn ReportSink,
    options: &RunOptions,
) -> EtlResult<RunSummary> {
    let mut report = Report::new();
    let result = execute(source, store, options, &mut report).await;

    match &result {
        Ok(_) => {
            report.push(SUCCESS_LINE);
            log_success(SUCCESS_LINE);
        }
        Err(e) => {
            let line = failure_line(e);
            log_error(&line);
            report.push(line);
        }
    }

    let flushed = sink.flush(report.lines());
    match (result, flushed) {
        (Ok(summary), Ok(())) => Ok(summary),
        (Ok(_), Err(io)) => Err(EtlError::Report(io)),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(io)) => {
            log_error(format!("Report could not be written: {}", io));
            Err(e)
        }
    }
}

/// The report line describing a failed run.
pub fn failure_line(error: &EtlError) -> String {
    match error {
        EtlError::Store(e) => format!("Database error: {}", e),
        e => format!("ETL error: {}", e),
    }
}

async fn execute(
    source: &dyn TabularSource,
    store: &dyn RelationalStore,
    options: &RunOptions,
    report: &mut Report,
) -> EtlResult<RunSummary> {
    let cleaned = clean_sources(source, options, report)?;

    log_info("Testing database connection...");
    store.ping().await?;
    if options.init_schema {
        log_info("Creating missing tables...");
        store.ensure_schema().await?;
    }

    log_info("Loading customers...");
    let customers = NaturalKeyPreserver::new(customer::ID, customer::SHADOW_ID, customer::EMAIL)
        .preserve(cleaned.customers)?;
    let customer_keys = load_parent(store, customer::TABLE, customer::ID, &customers).await?;
    report.count("Customers loaded", customers.payload.len());

    log_info("Loading products...");
    let products = NaturalKeyPreserver::new(product::ID, product::SHADOW_ID, product::NAME)
        .preserve(cleaned.products)?;
    let product_keys = load_parent(store, product::TABLE, product::ID, &products).await?;
    report.count("Products loaded", products.payload.len());

    log_info("Loading orders...");
    let resolved = ResolvedSales::resolve(
        cleaned.sales,
        Parent::new(&customers, &customer_keys),
        Parent::new(&products, &product_keys),
    )?;
    let (unknown_customers, unknown_products) = (resolved.unknown_customers, resolved.unknown_products);
    report.count("Sales excluded (customer not loaded)", unknown_customers);
    report.count("Sales excluded (product not loaded)", unknown_products);

    let headers = resolved
        .aggregate(&options.order_status)?
        .persist(store)
        .await?
        .resolve()?;
    report.count("Orders loaded", headers.loaded);

    log_info("Loading order items...");
    let items = headers.rewrite()?.filter()?.persist(store).await?;
    report.count("Order items loaded", items.items_loaded);

    Ok(RunSummary {
        clean: cleaned.stats,
        customers_loaded: customers.payload.len(),
        products_loaded: products.payload.len(),
        orders_loaded: items.orders_loaded,
        order_items_loaded: items.items_loaded,
        customers_collapsed: customers.collapsed,
        products_collapsed: products.collapsed,
        sales_unknown_customer: unknown_customers,
        sales_unknown_product: unknown_products,
        items_without_order: items.excluded,
    })
}

/// Persist a parent payload and build its resolver from the returned keys.
async fn load_parent(
    store: &dyn RelationalStore,
    table: &str,
    key: &str,
    preserved: &PreservedTable,
) -> EtlResult<SurrogateResolver> {
    if preserved.collapsed > 0 {
        log_warning_indent(
            format!(
                "{} {} rows share a {} with an earlier row",
                preserved.collapsed,
                table,
                preserved.natural_column()
            ),
            1,
        );
    }
    if preserved.shadow_conflicts > 0 {
        log_warning_indent(
            format!(
                "{} source ids map to more than one {}",
                preserved.shadow_conflicts,
                preserved.natural_column()
            ),
            1,
        );
    }

    let target = schema::fleximart()
        .into_iter()
        .find(|t| t.name == table)
        .ok_or_else(|| EtlError::Config(format!("no schema for table '{}'", table)))?;
    let (payload, dropped) = target.conform(&preserved.payload)?;
    if !dropped.is_empty() {
        log_warning_indent(format!("{}: ignoring columns {}", table, dropped.join(", ")), 1);
    }

    let natural = preserved.natural_column();
    let returned = store.persist_returning(table, &payload, &[key, natural]).await?;
    let resolver = SurrogateResolver::from_projection(&returned, &[natural], key)?;
    if resolver.collisions() > 0 {
        log_warning(format!(
            "{}: {} persisted rows share a {}; lowest {} kept",
            table,
            resolver.collisions(),
            natural,
            key
        ));
    }
    log_success(format!("{} {} loaded", payload.len(), table));
    Ok(resolver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, StoreResult};
    use crate::record::Value;
    use async_trait::async_trait;
    use crate::report::MemoryReportSink;
    use crate::source::MemorySource;
    use crate::store::{MemoryStore, Projection};

    fn table(columns: &[&str], rows: &[&[&str]]) -> RecordSet {
        RecordSet::from_rows(
            columns.iter().copied(),
            rows.iter()
                .map(|r| r.iter().map(|s| Value::text(*s)).collect())
                .collect(),
        )
        .unwrap()
    }

    fn customers() -> RecordSet {
        table(
            &["customer_id", "first_name", "email", "phone", "city", "registration_date"],
            &[
                &["C001", "Rahul", "rahul@x.com", "9876543210", "Pune", "2023-01-15"],
                &["C002", "Rahul", "rahul@x.com", "+91 98765-43210", "Pune", "2023-01-15"],
                &["C003", "Priya", "priya@x.com", "9123456780", "Delhi", "2023-02-01"],
                &["C004", "Nobody", "", "9000000000", "Goa", "2023-03-01"],
            ],
        )
    }

    fn products() -> RecordSet {
        table(
            &["product_id", "product_name", "category", "price", "stock_quantity"],
            &[
                &["P001", "Laptop", "electronics", "50", "10"],
                &["P002", "Mouse", "ELECTRONICS", "", ""],
                &["P003", "Desk", "", "30", "5"],
            ],
        )
    }

    fn sales(rows: &[&[&str]]) -> RecordSet {
        table(
            &["transaction_id", "customer_id", "product_id", "quantity", "unit_price", "transaction_date", "status"],
            rows,
        )
    }

    fn source(sales_rows: &[&[&str]]) -> MemorySource {
        MemorySource::new()
            .with(SourceTable::Customers, customers())
            .with(SourceTable::Products, products())
            .with(SourceTable::Sales, sales(sales_rows))
    }

    async fn run_memory(
        sales_rows: &[&[&str]],
    ) -> (EtlResult<RunSummary>, MemoryStore, MemoryReportSink) {
        let store = MemoryStore::fleximart();
        let sink = MemoryReportSink::new();
        let result = run(&source(sales_rows), &store, &sink, &RunOptions::default()).await;
        (result, store, sink)
    }

    #[tokio::test]
    async fn test_duplicate_email_customers_share_surrogate() {
        let (result, store, _) = run_memory(&[
            &["T1", "C001", "P001", "1", "10", "2024-01-10", "Completed"],
            &["T2", "C002", "P003", "1", "20", "2024-01-11", "Completed"],
        ])
        .await;
        let summary = result.unwrap();

        assert_eq!(summary.customers_loaded, 2);
        assert_eq!(summary.customers_collapsed, 1);
        let emails = store
            .query(&Projection::new("customers", ["customer_id", "email"]))
            .await
            .unwrap();
        assert_eq!(emails.len(), 2);

        let orders = store.table("orders").unwrap();
        let customer_ids: Vec<&Value> = orders.column("customer_id").unwrap();
        assert_eq!(customer_ids, vec![&Value::Int(1), &Value::Int(1)]);
    }

    #[tokio::test]
    async fn test_unknown_product_sale_excluded() {
        let (result, store, _) = run_memory(&[
            &["T1", "C001", "P001", "1", "10", "2024-01-10", "Completed"],
            &["T2", "C001", "P999", "1", "20", "2024-01-10", "Completed"],
        ])
        .await;
        let summary = result.unwrap();

        assert_eq!(summary.sales_unknown_product, 1);
        assert_eq!(summary.orders_loaded, 1);
        assert_eq!(summary.order_items_loaded, 1);
        let items = store.table("order_items").unwrap();
        assert_eq!(items.column("product_id").unwrap(), vec![&Value::Int(1)]);
        // The excluded sale does not count toward the order total.
        let orders = store.table("orders").unwrap();
        assert_eq!(orders.column("total_amount").unwrap(), vec![&Value::Float(10.0)]);
    }

    #[tokio::test]
    async fn test_placeholder_emails_are_dropped_not_merged() {
        let customers = crate::parser::parse_str(
            "customer_id,first_name,email,phone,city,registration_date\n\
             C001,Rahul,N/A,9876543210,Pune,2023-01-15\n\
             C002,Priya,n/a,9123456780,Delhi,2023-02-01\n\
             C003,Amit,amit@x.com,9000000000,Goa,2023-03-01",
            ',',
        )
        .unwrap();
        let source = MemorySource::new()
            .with(SourceTable::Customers, customers)
            .with(SourceTable::Products, products())
            .with(
                SourceTable::Sales,
                sales(&[
                    &["T1", "C001", "P001", "1", "10", "2024-01-10", "Completed"],
                    &["T2", "C002", "P001", "1", "5", "2024-01-10", "Completed"],
                    &["T3", "C003", "P001", "1", "20", "2024-01-10", "Completed"],
                ]),
            );
        let store = MemoryStore::fleximart();
        let sink = MemoryReportSink::new();

        let summary = run(&source, &store, &sink, &RunOptions::default()).await.unwrap();

        assert_eq!(summary.clean.customers.dropped, 2);
        assert_eq!(summary.customers_loaded, 1);
        assert_eq!(summary.customers_collapsed, 0);
        assert_eq!(summary.sales_unknown_customer, 2);
        assert_eq!(summary.orders_loaded, 1);
        assert_eq!(summary.order_items_loaded, 1);
        let orders = store.table("orders").unwrap();
        assert_eq!(orders.column("total_amount").unwrap(), vec![&Value::Float(20.0)]);
    }

    #[tokio::test]
    async fn test_same_customer_same_day_is_one_order() {
        let (result, store, _) = run_memory(&[
            &["T1", "C001", "P001", "2", "25", "2024-01-10", "Completed"],
            &["T2", "C001", "P003", "1", "30", "2024-01-10", "Completed"],
        ])
        .await;
        let summary = result.unwrap();

        assert_eq!(summary.orders_loaded, 1);
        assert_eq!(summary.order_items_loaded, 2);
        let orders = store.table("orders").unwrap();
        assert_eq!(orders.column("total_amount").unwrap(), vec![&Value::Float(80.0)]);
        assert_eq!(orders.column("status").unwrap(), vec![&Value::from("Pending")]);
        let items = store.table("order_items").unwrap();
        assert_eq!(
            items.column("order_id").unwrap(),
            vec![&Value::Int(1), &Value::Int(1)]
        );
    }

    #[tokio::test]
    async fn test_null_transaction_date_excluded() {
        let (result, store, sink) = run_memory(&[
            &["T1", "C001", "P001", "1", "10", "2024-01-10", "Completed"],
            &["T2", "C003", "P001", "1", "10", "", "Completed"],
        ])
        .await;
        let summary = result.unwrap();

        assert_eq!(summary.clean.sales.dropped, 1);
        assert_eq!(store.count("orders").unwrap(), 1);
        assert_eq!(store.count("order_items").unwrap(), 1);
        assert_eq!(sink.lines().last().map(String::as_str), Some(SUCCESS_LINE));
    }

    #[tokio::test]
    async fn test_report_lines_on_success() {
        let (result, _, sink) = run_memory(&[
            &["T1", "C001", "P001", "1", "10", "2024-01-10", "Completed"],
            &["T1", "C001", "P001", "1", "10", "2024-01-10", "Completed"],
        ])
        .await;
        result.unwrap();

        let lines = sink.lines();
        assert_eq!(
            &lines[..6],
            &[
                "Customers records read: 4",
                "Products records read: 3",
                "Sales records read: 2",
                "Customer duplicates removed: 0",
                "Product duplicates removed: 0",
                "Sales duplicates removed: 1",
            ]
        );
        assert!(lines.contains(&"Customers loaded: 2".to_string()));
        assert!(lines.contains(&"Products loaded: 3".to_string()));
        assert!(lines.contains(&"Orders loaded: 1".to_string()));
        assert!(lines.contains(&"Order items loaded: 1".to_string()));
        assert_eq!(sink.flushes(), 1);
    }

    #[tokio::test]
    async fn test_offline_store_still_flushes_report() {
        let store = MemoryStore::offline();
        let sink = MemoryReportSink::new();
        let result = run(
            &source(&[&["T1", "C001", "P001", "1", "10", "2024-01-10", "Completed"]]),
            &store,
            &sink,
            &RunOptions::default(),
        )
        .await;

        assert!(result.unwrap_err().is_store());
        let lines = sink.lines();
        assert_eq!(lines.len(), 7);
        assert!(lines[6].starts_with("Database error:"));
        assert_eq!(sink.flushes(), 1);
    }

    /// Reachable, but refuses DDL.
    struct NoCreateStore(MemoryStore);

    #[async_trait]
    impl RelationalStore for NoCreateStore {
        async fn ping(&self) -> StoreResult<()> {
            self.0.ping().await
        }

        async fn ensure_schema(&self) -> StoreResult<()> {
            Err(StoreError::Backend("permission denied for schema public".to_string()))
        }

        async fn persist(&self, table: &str, rows: &RecordSet) -> StoreResult<usize> {
            self.0.persist(table, rows).await
        }

        async fn query(&self, projection: &Projection) -> StoreResult<RecordSet> {
            self.0.query(projection).await
        }
    }

    #[tokio::test]
    async fn test_schema_failure_still_flushes_report() {
        let store = NoCreateStore(MemoryStore::fleximart());
        let sink = MemoryReportSink::new();
        let options = RunOptions {
            init_schema: true,
            ..RunOptions::default()
        };
        let result = run(
            &source(&[&["T1", "C001", "P001", "1", "10", "2024-01-10", "Completed"]]),
            &store,
            &sink,
            &options,
        )
        .await;

        assert!(result.unwrap_err().is_store());
        let lines = sink.lines();
        assert_eq!(lines.len(), 7);
        assert_eq!(
            lines[6],
            "Database error: Store error: permission denied for schema public"
        );
        assert_eq!(sink.flushes(), 1);
        assert_eq!(store.0.count("customers").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_schema_step_skipped_by_default() {
        let store = NoCreateStore(MemoryStore::fleximart());
        let sink = MemoryReportSink::new();
        let summary = run(
            &source(&[&["T1", "C001", "P001", "1", "10", "2024-01-10", "Completed"]]),
            &store,
            &sink,
            &RunOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(summary.orders_loaded, 1);
        assert_eq!(sink.lines().last().map(String::as_str), Some(SUCCESS_LINE));
    }

    #[test]
    fn test_failure_line_prefix() {
        let store = EtlError::from(StoreError::Connection("refused".to_string()));
        assert_eq!(failure_line(&store), "Database error: Connection failed: refused");
        let config = EtlError::Config("DATABASE_URL is not set".to_string());
        assert!(failure_line(&config).starts_with("ETL error:"));
    }

    #[tokio::test]
    async fn test_rerun_hits_unique_email_constraint() {
        let rows: &[&[&str]] = &[&["T1", "C001", "P001", "1", "10", "2024-01-10", "Completed"]];
        let store = MemoryStore::fleximart();
        let sink = MemoryReportSink::new();
        run(&source(rows), &store, &sink, &RunOptions::default()).await.unwrap();

        let second = run(&source(rows), &store, &sink, &RunOptions::default()).await;
        assert!(second.unwrap_err().is_store());
        assert!(sink.lines().last().unwrap().starts_with("Database error:"));
        assert_eq!(store.count("customers").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_missing_column_is_etl_error() {
        let store = MemoryStore::fleximart();
        let sink = MemoryReportSink::new();
        let source = MemorySource::new()
            .with(SourceTable::Customers, table(&["customer_id"], &[&["C001"]]))
            .with(SourceTable::Products, products())
            .with(SourceTable::Sales, sales(&[]));

        let result = run(&source, &store, &sink, &RunOptions::default()).await;
        assert!(!result.unwrap_err().is_store());
        assert!(sink.lines().last().unwrap().starts_with("ETL error:"));
        assert_eq!(store.count("customers").unwrap(), 0);
    }
}
