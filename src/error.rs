// ⚠️ Analytics Errors - Discriminated failure modes of the pipeline
//
// NoData and InsufficientData are expected steady states (fresh system,
// first month of sales) and are surfaced as distinct results at the boundary.
// ContractViolation means a record reached aggregation in a shape the
// data-source boundary should have rejected.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyticsError {
    /// Zero qualifying records
    #[error("No historical sales data found")]
    NoData,

    /// Fewer than two historical months - a line cannot be fitted
    #[error("Insufficient data for a trend: {points} historical month(s), at least 2 required")]
    InsufficientData { points: usize },

    /// Non-numeric or negative forecast horizon (or other bad option)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Record rejected at the data-source boundary
    #[error("Invalid record {order_ref}: {reason}")]
    InvalidRecord { order_ref: String, reason: String },

    /// Malformed record inside the core (fatal, not retried)
    #[error("Internal contract violation: {0}")]
    ContractViolation(String),
}

impl AnalyticsError {
    /// True for the "expected" empty-state conditions a UI renders as empty charts
    pub fn is_empty_state(&self) -> bool {
        matches!(
            self,
            AnalyticsError::NoData | AnalyticsError::InsufficientData { .. }
        )
    }
}

pub type AnalyticsResult<T> = std::result::Result<T, AnalyticsError>;
