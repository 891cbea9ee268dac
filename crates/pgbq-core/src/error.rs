//! Export pipeline error types.

/// Errors produced by the export pipeline.
///
/// Every variant is fatal to the run except [`ExportError::UnknownType`],
/// which the schema extractor recovers from per-column when the
/// ignore-unknown-types option is set. Components propagate these with `?`;
/// only the binary maps them to a process exit code.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Invalid or incomplete configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Source connection could not be established or probed.
    #[error("source connection failed: {0}")]
    Connection(#[source] tokio_postgres::Error),

    /// Catalog metadata could not be enumerated or read.
    #[error("catalog query failed: {0}")]
    CatalogQuery(#[source] tokio_postgres::Error),

    /// A source column type is absent from the mapping table.
    #[error("column '{column}' has source type '{pg_type}' with no target mapping")]
    UnknownType { column: String, pg_type: String },

    /// Destination table probe or creation failed.
    #[error("destination table '{table}': {reason}")]
    TableCreation { table: String, reason: String },

    /// The row-producing query failed to start.
    #[error("row query failed: {0}")]
    RowQuery(#[source] tokio_postgres::Error),

    /// A row could not be scanned while streaming the result set.
    #[error("row scan failed: {0}")]
    RowScan(#[source] tokio_postgres::Error),

    /// Submitting the bulk-load job (or shipping its payload) failed.
    #[error("load job submission failed: {0}")]
    JobSubmission(String),

    /// A status poll round trip failed.
    #[error("load job status poll failed: {0}")]
    JobPoll(String),

    /// The destination reported a terminal job-level failure.
    #[error("load job '{job}' failed: {reason}")]
    JobFailed { job: String, reason: String },

    /// Warehouse credentials could not be loaded or exchanged for a token.
    #[error("warehouse authentication failed: {0}")]
    Auth(String),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ExportError>;
