//! Export run configuration.
//!
//! Built once by the caller, validated, then passed by reference into each
//! pipeline component. There is no process-wide mutable state.

use std::path::PathBuf;

use crate::dest::SourceFormat;
use crate::error::ExportError;
use crate::types::TableId;

/// Row encoding submitted to the bulk-load job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// One JSON object per line, aggregated by the source.
    Json,
    /// One delimiter-joined text line per row.
    Delimited,
}

/// Immutable configuration for a single export run.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Source connection URI (`postgres://...`).
    pub source_uri: String,
    /// Source schema containing the table.
    pub source_schema: String,
    /// Source table to export.
    pub source_table: String,
    /// Destination project id.
    pub project: String,
    /// Destination dataset id.
    pub dataset: String,
    /// Column names dropped from the export.
    pub exclude: Vec<String>,
    /// Drop columns with unmapped source types instead of failing the run.
    pub ignore_unknown_types: bool,
    /// Day partition retention in days; negative disables partitioning.
    pub partition_days: i32,
    /// Field delimiter for delimited encoding.
    pub delimiter: char,
    pub encoding: Encoding,
    /// Service account key file for the destination.
    pub credentials: PathBuf,
}

impl ExportConfig {
    /// Check the configuration before any external call is made.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Config`] on a missing table/project/dataset or
    /// a delimiter that would corrupt line framing.
    pub fn validate(&self) -> Result<(), ExportError> {
        if self.source_table.is_empty() {
            return Err(ExportError::Config("source table is required".to_string()));
        }
        if self.project.is_empty() {
            return Err(ExportError::Config("project id is required".to_string()));
        }
        if self.dataset.is_empty() {
            return Err(ExportError::Config("dataset id is required".to_string()));
        }
        if matches!(self.delimiter, '\n' | '\r') {
            return Err(ExportError::Config(
                "delimiter must not be a line terminator".to_string(),
            ));
        }
        if self.credentials.as_os_str().is_empty() {
            return Err(ExportError::Config(
                "service account key file is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Retention window when partitioning is enabled (`partition_days >= 0`).
    #[must_use]
    pub fn partition_retention(&self) -> Option<u32> {
        u32::try_from(self.partition_days).ok()
    }

    /// Destination table before any partition suffix is applied.
    ///
    /// The destination table keeps the source table's name.
    #[must_use]
    pub fn destination_table(&self) -> TableId {
        TableId::new(&self.project, &self.dataset, &self.source_table)
    }

    /// Wire format tag matching the configured encoding.
    #[must_use]
    pub fn source_format(&self) -> SourceFormat {
        match self.encoding {
            Encoding::Json => SourceFormat::NewlineDelimitedJson,
            Encoding::Delimited => SourceFormat::Csv {
                delimiter: self.delimiter,
            },
        }
    }
}
