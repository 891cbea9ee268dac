//! Source type -> destination type mapping.
//!
//! A fixed lookup table, not a coercion engine: the mapping is total only
//! over the enumerated set and performs no widening or truncation. Types
//! outside the set surface as [`ExportError::UnknownType`].

use crate::error::ExportError;
use crate::types::{ColumnDescriptor, FieldDescriptor, TargetType};

/// The full source-type-name -> target-type enumeration.
///
/// String-like types (text, XML, network, UUID, binary, currency variants)
/// go to STRING; fixed and floating numerics to INTEGER/FLOAT; temporal
/// types to their respective targets.
pub const TYPE_MAPPINGS: &[(&str, TargetType)] = &[
    ("varchar", TargetType::String),
    ("bpchar", TargetType::String),
    ("text", TargetType::String),
    ("citext", TargetType::String),
    ("xml", TargetType::String),
    ("cidr", TargetType::String),
    ("inet", TargetType::String),
    ("uuid", TargetType::String),
    ("bit", TargetType::String),
    ("varbit", TargetType::String),
    ("bytea", TargetType::String),
    ("money", TargetType::String),
    ("int2", TargetType::Integer),
    ("int4", TargetType::Integer),
    ("int8", TargetType::Integer),
    ("float4", TargetType::Float),
    ("float8", TargetType::Float),
    ("numeric", TargetType::Float),
    ("bool", TargetType::Boolean),
    ("date", TargetType::Date),
    ("time", TargetType::Time),
    ("timestamp", TargetType::DateTime),
    ("timestamptz", TargetType::Timestamp),
];

/// Resolve a source type name against the mapping table.
#[must_use]
pub fn lookup(pg_type: &str) -> Option<TargetType> {
    TYPE_MAPPINGS
        .iter()
        .find(|(name, _)| *name == pg_type)
        .map(|(_, target)| *target)
}

/// Translate one column descriptor into its destination field.
///
/// # Errors
///
/// Returns [`ExportError::UnknownType`] when the column's source type is
/// absent from [`TYPE_MAPPINGS`].
pub fn to_field(column: &ColumnDescriptor) -> Result<FieldDescriptor, ExportError> {
    let field_type = lookup(&column.pg_type).ok_or_else(|| ExportError::UnknownType {
        column: column.name.clone(),
        pg_type: column.pg_type.clone(),
    })?;
    Ok(FieldDescriptor {
        name: column.name.clone(),
        field_type,
        required: !column.nullable,
    })
}
