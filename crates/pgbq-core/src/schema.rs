//! Schema extraction from source catalog metadata.
//!
//! Queries `information_schema` for the table's columns in ordinal order,
//! applies the exclusion set, and translates each retained column through
//! the type mapper. No partial schema is ever returned: any catalog failure
//! or (without the ignore option) unmapped type aborts extraction.

use tokio_postgres::Client;

use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::mapper;
use crate::types::{ColumnDescriptor, TableSchema};

const CATALOG_QUERY: &str = "SELECT column_name, udt_name, is_nullable \
    FROM information_schema.columns \
    WHERE table_schema = $1 AND table_name = $2 \
    ORDER BY ordinal_position";

/// Extract the destination schema and the retained source column list.
///
/// Both outputs preserve source ordinal order and stay in lockstep: entry
/// `i` of the column list produced entry `i` of the schema.
///
/// # Errors
///
/// [`ExportError::CatalogQuery`] when metadata cannot be read,
/// [`ExportError::Config`] when the table has no exportable columns, and
/// [`ExportError::UnknownType`] for an unmapped type unless
/// `ignore_unknown_types` is set.
pub async fn extract_schema(
    client: &Client,
    config: &ExportConfig,
) -> Result<(TableSchema, Vec<String>), ExportError> {
    let rows = client
        .query(CATALOG_QUERY, &[&config.source_schema, &config.source_table])
        .await
        .map_err(ExportError::CatalogQuery)?;

    let columns: Vec<ColumnDescriptor> = rows
        .iter()
        .map(|row| ColumnDescriptor {
            name: row.get(0),
            pg_type: row.get(1),
            nullable: row.get::<_, &str>(2) == "YES",
        })
        .collect();

    if columns.is_empty() {
        return Err(ExportError::Config(format!(
            "table {}.{} not found or has no columns",
            config.source_schema, config.source_table
        )));
    }

    build_schema(&columns, &config.exclude, config.ignore_unknown_types)
}

/// Filter and translate catalog columns into the destination schema.
///
/// Pure half of extraction, split out from the catalog query. Excluded
/// columns are dropped from both outputs; unmapped types are dropped too
/// when `ignore_unknown` is set, otherwise they fail the whole extraction.
pub fn build_schema(
    columns: &[ColumnDescriptor],
    exclude: &[String],
    ignore_unknown: bool,
) -> Result<(TableSchema, Vec<String>), ExportError> {
    let mut fields = Vec::with_capacity(columns.len());
    let mut retained = Vec::with_capacity(columns.len());

    for column in columns {
        if exclude.iter().any(|name| name == &column.name) {
            continue;
        }
        match mapper::to_field(column) {
            Ok(field) => {
                retained.push(column.name.clone());
                fields.push(field);
            }
            Err(err @ ExportError::UnknownType { .. }) => {
                if !ignore_unknown {
                    return Err(err);
                }
                tracing::warn!(
                    column = %column.name,
                    pg_type = %column.pg_type,
                    "Dropping column with unmapped source type"
                );
            }
            Err(err) => return Err(err),
        }
    }

    if fields.is_empty() {
        return Err(ExportError::Config(
            "no exportable columns left after exclusions".to_string(),
        ));
    }

    Ok((fields, retained))
}
