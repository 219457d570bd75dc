//! FlexiMart ETL CLI
//!
//! # Commands
//!
//! ```bash
//! fleximart-etl run                      # Load the extracts into PostgreSQL
//! fleximart-etl dry-run                  # Same pipeline against an in-memory store
//! fleximart-etl check                    # Test the database connection
//! fleximart-etl schema                   # Print the target DDL
//! fleximart-etl clean                    # Clean only and print the counts
//! ```
//!
//! `DATABASE_URL` is read from the environment or a `.env` file.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use fleximart_etl::logs::LOGS;
use fleximart_etl::report::Report;
use fleximart_etl::store::schema::fleximart_ddl;
use fleximart_etl::{
    clean_sources, pipeline, CsvSource, EtlConfig, EtlError, FileReportSink, MemoryStore, PgStore,
    RelationalStore, ReportSink, RunOptions, RunSummary,
};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "fleximart-etl")]
#[command(about = "Load FlexiMart extracts into the normalized warehouse schema", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline against PostgreSQL
    Run {
        #[command(flatten)]
        inputs: InputArgs,

        #[command(flatten)]
        database: DatabaseArgs,

        /// Create missing tables before loading
        #[arg(long)]
        init_schema: bool,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the full pipeline against an in-memory store
    DryRun {
        #[command(flatten)]
        inputs: InputArgs,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Test the database connection
    Check {
        #[command(flatten)]
        database: DatabaseArgs,
    },

    /// Print the target schema DDL
    Schema,

    /// Clean the extracts without loading them
    Clean {
        #[command(flatten)]
        inputs: InputArgs,

        /// Print the counts as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Directory holding the default extract file names
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Customers extract (default: customers_raw.csv)
    #[arg(long)]
    customers: Option<PathBuf>,

    /// Products extract (default: products_raw.csv)
    #[arg(long)]
    products: Option<PathBuf>,

    /// Sales extract (default: sales_raw.csv)
    #[arg(long)]
    sales: Option<PathBuf>,

    /// Report file (default: data_quality_report.txt)
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Status given to new orders
    #[arg(long, default_value = "Pending")]
    order_status: String,
}

impl InputArgs {
    fn config(self) -> EtlConfig {
        let mut config = match self.data_dir {
            Some(dir) => EtlConfig::in_dir(dir),
            None => EtlConfig::default(),
        };
        if let Some(path) = self.customers {
            config.customers_path = path;
        }
        if let Some(path) = self.products {
            config.products_path = path;
        }
        if let Some(path) = self.sales {
            config.sales_path = path;
        }
        if let Some(path) = self.report {
            config.report_path = path;
        }
        config.order_status = self.order_status;
        config
    }
}

#[derive(Args)]
struct DatabaseArgs {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            inputs,
            database,
            init_schema,
            json,
        } => {
            let mut config = inputs.config();
            config.database_url = database.database_url;
            cmd_run(config, init_schema, json).await
        }

        Commands::DryRun { inputs, json } => cmd_dry_run(inputs.config(), json).await,

        Commands::Check { database } => {
            let config = EtlConfig {
                database_url: database.database_url,
                ..EtlConfig::default()
            };
            cmd_check(&config).await
        }

        Commands::Schema => {
            println!("{}", fleximart_ddl());
            Ok(())
        }

        Commands::Clean { inputs, json } => cmd_clean(inputs.config(), json),
    };

    if let Err(e) = result {
        eprintln!("✗ Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_run(config: EtlConfig, init_schema: bool, json: bool) -> CliResult {
    LOGS.set_quiet(json);
    let sink = FileReportSink::new(&config.report_path);

    let connected = match config.database_url() {
        Ok(url) => PgStore::connect(url).await.map_err(EtlError::from),
        Err(e) => Err(e),
    };
    let store = match connected {
        Ok(store) => store,
        Err(e) => {
            // Nothing ran, but the report is still written.
            let mut report = Report::new();
            report.push(pipeline::failure_line(&e));
            sink.flush(report.lines())?;
            return Err(e.into());
        }
    };

    let options = RunOptions {
        init_schema,
        ..RunOptions::from(&config)
    };
    let summary = pipeline::run(&CsvSource::from_config(&config), &store, &sink, &options).await?;
    finish(&summary, &config, json)
}

async fn cmd_dry_run(config: EtlConfig, json: bool) -> CliResult {
    LOGS.set_quiet(json);
    let store = MemoryStore::fleximart();
    let sink = FileReportSink::new(&config.report_path);

    let summary = pipeline::run(
        &CsvSource::from_config(&config),
        &store,
        &sink,
        &RunOptions::from(&config),
    )
    .await?;
    finish(&summary, &config, json)
}

async fn cmd_check(config: &EtlConfig) -> CliResult {
    let store = PgStore::connect(config.database_url()?).await?;
    store.ping().await?;
    println!("✓ Database reachable");
    Ok(())
}

fn cmd_clean(config: EtlConfig, json: bool) -> CliResult {
    LOGS.set_quiet(json);
    let mut report = Report::new();
    let cleaned = clean_sources(
        &CsvSource::from_config(&config),
        &RunOptions::from(&config),
        &mut report,
    )?;

    if json {
        print_json(&cleaned.stats)?;
    } else {
        for line in report.lines() {
            println!("{}", line);
        }
        for (name, stats) in [
            ("Customers", cleaned.stats.customers),
            ("Products", cleaned.stats.products),
            ("Sales", cleaned.stats.sales),
        ] {
            println!("{} dropped (missing mandatory fields): {}", name, stats.dropped);
        }
    }
    Ok(())
}

fn finish(summary: &RunSummary, config: &EtlConfig, json: bool) -> CliResult {
    if json {
        print_json(summary)?;
    } else {
        eprintln!("\nReport written to {}", config.report_path.display());
        eprintln!(
            "   {} customers, {} products, {} orders, {} order items",
            summary.customers_loaded,
            summary.products_loaded,
            summary.orders_loaded,
            summary.order_items_loaded
        );
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
