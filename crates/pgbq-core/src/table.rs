//! Destination table lifecycle.
//!
//! Ensures the base table exists before any load, then resolves the
//! effective write target. The day suffix is computed once per run and the
//! same value is used for every destination operation afterwards. An
//! existing table is left exactly as found: no schema comparison, no
//! migration.

use chrono::{NaiveDate, Utc};

use crate::dest::Warehouse;
use crate::error::ExportError;
use crate::types::{TableId, TableSchema};

/// Day-partition suffix for a write target, `$YYYYMMDD`.
#[must_use]
pub fn partition_suffix(date: NaiveDate) -> String {
    format!("${}", date.format("%Y%m%d"))
}

/// Ensure the destination table exists and resolve the write target.
///
/// Creates the table with `schema` when absent, attaching a day partition
/// expiring after `retention_days` when partitioning is enabled. Returns
/// the base id, suffixed with today's UTC date when partitioned.
///
/// # Errors
///
/// Returns [`ExportError::TableCreation`] when the probe or creation fails.
pub async fn ensure_table<W: Warehouse>(
    warehouse: &W,
    base: &TableId,
    schema: &TableSchema,
    retention_days: Option<u32>,
) -> Result<TableId, ExportError> {
    if warehouse.table_exists(base).await? {
        tracing::debug!(table = %base, "Destination table already exists, leaving it untouched");
    } else {
        warehouse.create_table(base, schema, retention_days).await?;
        tracing::info!(
            table = %base,
            fields = schema.len(),
            partitioned = retention_days.is_some(),
            "Created destination table"
        );
    }

    Ok(match retention_days {
        Some(_) => base.with_suffix(&partition_suffix(Utc::now().date_naive())),
        None => base.clone(),
    })
}
