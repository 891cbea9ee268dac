//! One-shot bulk export of a single `PostgreSQL` table into BigQuery.
//!
//! The pipeline discovers the source table's schema, translates it into the
//! destination's schema representation, streams the table's rows through a
//! row-to-text encoder without buffering the result set, and submits and
//! monitors a bulk-load job. Everything is fail-fast: the first error of any
//! kind ends the run.

pub mod config;
pub mod dest;
pub mod error;
pub mod job;
pub mod mapper;
pub mod schema;
pub mod source;
pub mod stream;
pub mod table;
pub mod types;

pub use config::{Encoding, ExportConfig};
pub use dest::{bigquery::BigQueryWarehouse, LoadStatistics, Warehouse};
pub use error::ExportError;

/// Run one export end to end and return the load job's final statistics.
///
/// Control flow: schema extraction, then table lifecycle (needs the schema
/// to create the table), then the row stream (needs the retained column
/// list), then the load job (needs schema, stream, and table handle). The
/// source connection is used strictly sequentially: the catalog query
/// finishes before the row query starts.
///
/// # Errors
///
/// Any [`ExportError`] aborts the run; there is no retry or partial-success
/// mode at this level.
pub async fn run_export(config: &ExportConfig) -> Result<LoadStatistics, ExportError> {
    config.validate()?;

    let client = source::connect(&config.source_uri).await?;
    source::probe(&client).await?;
    tracing::debug!(table = %config.source_table, "Source connection established");

    let (table_schema, retained) = schema::extract_schema(&client, config).await?;
    tracing::info!(
        schema = %config.source_schema,
        table = %config.source_table,
        columns = retained.len(),
        "Resolved export schema"
    );

    let warehouse = BigQueryWarehouse::new(&config.credentials).await?;
    let target = table::ensure_table(
        &warehouse,
        &config.destination_table(),
        &table_schema,
        config.partition_retention(),
    )
    .await?;

    let query = stream::build_row_query(config, &retained);
    let rows = stream::spawn_row_stream(client, query);

    job::run_load(
        &warehouse,
        &target,
        &table_schema,
        config.source_format(),
        rows,
    )
    .await
}
