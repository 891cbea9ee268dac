//! Source `PostgreSQL` connection handling.
//!
//! The returned client is used strictly sequentially: the catalog query
//! completes before the row query starts, and the row query then owns the
//! connection until the stream ends. The same handle is never used for
//! overlapping queries.

use tokio_postgres::{Client, NoTls};

use crate::error::ExportError;

/// Connect to the source and spawn its connection driver.
///
/// # Errors
///
/// Returns [`ExportError::Connection`] when the URI cannot be parsed or the
/// server is unreachable.
pub async fn connect(uri: &str) -> Result<Client, ExportError> {
    let (client, connection) = tokio_postgres::connect(uri, NoTls)
        .await
        .map_err(ExportError::Connection)?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("source connection error: {e}");
        }
    });

    Ok(client)
}

/// Cheap connectivity probe run before the pipeline starts.
///
/// # Errors
///
/// Returns [`ExportError::Connection`] when the round trip fails.
pub async fn probe(client: &Client) -> Result<(), ExportError> {
    client
        .query_one("SELECT 1", &[])
        .await
        .map_err(ExportError::Connection)?;
    Ok(())
}

/// Quote an identifier for interpolation into a query.
///
/// Double-quotes the name and doubles embedded quotes, so arbitrary column
/// and table names survive verbatim.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
