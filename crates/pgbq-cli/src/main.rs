mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use pgbq_core::{Encoding, ExportConfig};

const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

#[derive(Parser)]
#[command(
    name = "pgbq",
    version,
    about = "One-shot export of a PostgreSQL table into a BigQuery dataset"
)]
struct Cli {
    /// Postgres connection URI
    #[arg(
        long,
        default_value = "postgres://postgres@127.0.0.1:5432/postgres?sslmode=disable"
    )]
    uri: String,

    /// Postgres schema
    #[arg(long, default_value = "public")]
    schema: String,

    /// Postgres table name
    #[arg(long)]
    table: String,

    /// BigQuery project id
    #[arg(long)]
    project: String,

    /// BigQuery dataset
    #[arg(long)]
    dataset: String,

    /// Per-day partition retention in days, negative to disable partitioning
    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    partitions: i32,

    /// Columns to exclude (comma-separated)
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Drop columns with unknown types instead of failing
    #[arg(long)]
    ignore_unknown_types: bool,

    /// Row encoding submitted to the load job
    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Field delimiter for csv encoding
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Csv,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<ExportConfig> {
        let credentials = std::env::var_os(CREDENTIALS_ENV)
            .map(PathBuf::from)
            .ok_or_else(|| {
                anyhow::anyhow!("{CREDENTIALS_ENV} must point to a service account key file")
            })?;

        Ok(ExportConfig {
            source_uri: self.uri,
            source_schema: self.schema,
            source_table: self.table,
            project: self.project,
            dataset: self.dataset,
            exclude: self.exclude,
            ignore_unknown_types: self.ignore_unknown_types,
            partition_days: self.partitions,
            delimiter: self.delimiter,
            encoding: match self.format {
                Format::Json => Encoding::Json,
                Format::Csv => Encoding::Delimited,
            },
            credentials,
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("{err:#}");
            return ExitCode::FAILURE;
        }
    };

    match pgbq_core::run_export(&config).await {
        Ok(stats) => {
            tracing::info!(
                output_rows = stats.output_rows,
                output_bytes = stats.output_bytes,
                "Export complete"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            // Surface the full error chain; components only propagate.
            let err = anyhow::Error::new(err);
            tracing::error!("Export failed: {err:#}");
            ExitCode::FAILURE
        }
    }
}
