//! Destination warehouse interface.
//!
//! The bulk-load service is a black box behind [`Warehouse`]: an existence
//! probe, idempotent table creation, job submission over a byte stream, and
//! status polling. [`bigquery::BigQueryWarehouse`] is the production
//! implementation; tests substitute an in-memory one.

pub mod bigquery;

use async_trait::async_trait;

use crate::error::ExportError;
use crate::stream::EncodedRows;
use crate::types::{TableId, TableSchema};

/// Wire format of the load payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// One JSON object per line.
    NewlineDelimitedJson,
    /// Delimiter-joined text lines.
    Csv { delimiter: char },
}

/// Whether the load job may create the destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateDisposition {
    CreateNever,
    CreateIfNeeded,
}

impl CreateDisposition {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateNever => "CREATE_NEVER",
            Self::CreateIfNeeded => "CREATE_IF_NEEDED",
        }
    }
}

/// What happens to existing destination contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDisposition {
    WriteTruncate,
    WriteAppend,
}

impl WriteDisposition {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WriteTruncate => "WRITE_TRUNCATE",
            Self::WriteAppend => "WRITE_APPEND",
        }
    }
}

/// Everything a load job submission needs besides the payload itself.
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest<'a> {
    pub table: &'a TableId,
    pub schema: &'a TableSchema,
    pub format: SourceFormat,
    pub create_disposition: CreateDisposition,
    pub write_disposition: WriteDisposition,
    /// Rows the service may drop before failing the job.
    pub max_bad_records: i64,
}

/// Identifier of a submitted load job, used for status polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    /// Project the job was submitted under.
    pub project: String,
    pub job_id: String,
    pub location: Option<String>,
}

/// Lifecycle state reported by the job service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Done,
}

/// Row/byte counts reported by a load job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStatistics {
    pub output_rows: i64,
    pub output_bytes: i64,
}

/// One polled snapshot of a load job.
#[derive(Debug, Clone)]
pub struct JobStatus {
    pub state: JobState,
    pub statistics: Option<LoadStatistics>,
    /// Terminal error detail; only meaningful once `state` is `Done`.
    pub error: Option<String>,
}

/// Black-box bulk-load service operations used by the pipeline.
#[async_trait]
pub trait Warehouse {
    /// Probe whether the destination table exists.
    async fn table_exists(&self, table: &TableId) -> Result<bool, ExportError>;

    /// Create the destination table, optionally day-partitioned with the
    /// given expiration.
    async fn create_table(
        &self,
        table: &TableId,
        schema: &TableSchema,
        expiration_days: Option<u32>,
    ) -> Result<(), ExportError>;

    /// Submit a bulk-load job reading `rows` to completion of the upload.
    async fn start_load(
        &self,
        request: LoadRequest<'_>,
        rows: EncodedRows,
    ) -> Result<JobHandle, ExportError>;

    /// Poll a submitted job's status.
    async fn job_status(&self, job: &JobHandle) -> Result<JobStatus, ExportError>;
}
