//! Batch-level and record-level error types.
//!
//! Per-instrument source failures are carried by
//! [`SourceError`](crate::source::SourceError) inside the batch report and
//! never surface here; `SyncError` is reserved for conditions that prevent a
//! batch from running at all.

use thiserror::Error;

/// Record-level validation failure. A bar that fails validation is dropped
/// from its fetch result; the fetch itself still counts as a success.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("instrument code '{0}' must be exactly six ASCII digits")]
    InvalidCode(String),

    #[error("unknown market '{0}'")]
    InvalidMarket(String),

    #[error("close price must be positive, got {0}")]
    NonPositiveClose(i64),

    #[error("bar range invalid: high {high} is below low {low}")]
    InvalidBarRange { high: i64, low: i64 },

    #[error("bar bounds invalid: {field} {value} outside [{low}, {high}]")]
    InvalidBarBounds {
        field: &'static str,
        value: i64,
        low: i64,
        high: i64,
    },

    #[error("{field} must not be negative, got {value}")]
    NegativeValue { field: &'static str, value: i64 },
}

/// Batch-level failure that aborts a sync run before any per-instrument work.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync batch contains no instruments")]
    EmptyBatch,

    #[error(transparent)]
    Warehouse(#[from] barsync_warehouse::WarehouseError),

    #[error("invalid configuration: {0}")]
    Config(String),
}
