//! Pipeline error type.
//!
//! Configuration, capability and infeasibility errors abort a run; no
//! partial schedule or movement log is returned with them. Physics and
//! avoidance problems are not errors and only surface as log warnings.

use thiserror::Error;

use crate::models::Violation;
use crate::validation::ValidationError;

/// Errors raised by the scheduling and movement pipeline.
#[derive(Error, Debug)]
pub enum LineError {
    /// Structural input problems (duplicate ids, dangling references).
    #[error("invalid line input: {} error(s), first: {}", .0.len(), first_message(.0))]
    InvalidInput(Vec<ValidationError>),

    /// A stage's permitted station range, intersected with its group, is empty.
    #[error("batch {batch} stage {stage}: no permitted station")]
    EmptyStationRange { batch: u32, stage: u32 },

    /// No transporter can lift at `from` and sink at `to`.
    #[error("no transporter covers transfer from station {from} to station {to}")]
    NoCapableTransporter { from: u32, to: u32 },

    /// The solver found no feasible schedule within its budget.
    #[error("no feasible schedule found (lower bound: {lower_bound:?})")]
    Infeasible { lower_bound: Option<i64> },

    /// A solved schedule failed the post-solve check.
    #[error("schedule failed verification: {} violation(s)", .0.len())]
    InvalidSchedule(Vec<Violation>),

    #[error("configuration parse error: {0}")]
    Json(#[from] serde_json::Error),
}

fn first_message(errors: &[ValidationError]) -> &str {
    errors.first().map(|e| e.message.as_str()).unwrap_or("-")
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, LineError>;
