use thiserror::Error;

use crate::column::ColumnType;

/// Errors raised while configuring or growing a [`FastMap`](crate::FastMap).
///
/// Configuration and type errors are raised at construction, so a map is never
/// partially built. `ResourceExhausted` is fatal for the map instance that
/// raised it: records committed before the failure stay readable, but callers
/// should stop inserting and discard the map.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FastMapError {
    /// Invalid constructor arguments (page size, load factor) or mismatched
    /// schemas when merging two maps.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A value column whose kind has no fixed width.
    #[error("Unsupported value column type {column_type:?} at index {column}")]
    UnsupportedType {
        column: usize,
        column_type: ColumnType,
    },

    /// The arena hit its resize limit, or a field or record does not fit the
    /// 4-byte length header.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),
}

pub type Result<T> = std::result::Result<T, FastMapError>;
