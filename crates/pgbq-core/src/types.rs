//! Schema descriptors shared across the pipeline.
//!
//! A [`ColumnDescriptor`] is what the source catalog reports; a
//! [`FieldDescriptor`] is its translated destination counterpart. Field order
//! always matches the row query's projected column order: the load job binds
//! columns positionally for delimited payloads and by name for JSON ones,
//! and both must agree.

use std::fmt;

use serde::Serialize;

/// One source column as reported by catalog metadata, in ordinal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub pg_type: String,
    pub nullable: bool,
}

impl ColumnDescriptor {
    #[must_use]
    pub fn new(name: &str, pg_type: &str, nullable: bool) -> Self {
        Self {
            name: name.to_string(),
            pg_type: pg_type.to_string(),
            nullable,
        }
    }
}

/// Destination field type. Serializes to the warehouse wire names
/// (`STRING`, `INTEGER`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TargetType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Time,
    DateTime,
    Timestamp,
}

impl TargetType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::Boolean => "BOOLEAN",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::DateTime => "DATETIME",
            Self::Timestamp => "TIMESTAMP",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One destination field, derived 1:1 from a retained [`ColumnDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: TargetType,
    /// `true` when the source column is NOT NULL.
    pub required: bool,
}

/// Ordered destination schema. Order is load-bearing, see the module docs.
pub type TableSchema = Vec<FieldDescriptor>;

/// Fully-qualified destination table identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableId {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableId {
    #[must_use]
    pub fn new(project: &str, dataset: &str, table: &str) -> Self {
        Self {
            project: project.to_string(),
            dataset: dataset.to_string(),
            table: table.to_string(),
        }
    }

    /// The same table with `suffix` appended to the table component.
    #[must_use]
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self {
            project: self.project.clone(),
            dataset: self.dataset.clone(),
            table: format!("{}{}", self.table, suffix),
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}
