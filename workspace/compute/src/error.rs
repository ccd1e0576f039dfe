use std::collections::BTreeMap;

use chrono::NaiveDate;
use thiserror::Error;

/// Per-field validation messages, keyed by field name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Error types for the compute module
#[derive(Error, Debug)]
pub enum ComputeError {
    /// Error from the database operations
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// A date window whose start lies after its end
    #[error("Invalid date window: {from} is after {to}")]
    InvalidWindow { from: NaiveDate, to: NaiveDate },

    /// A form submission that failed field validation
    #[error("Submission failed validation on {} field(s)", .0.len())]
    Validation(FieldErrors),
}

/// Type alias for Result with ComputeError
pub type Result<T> = std::result::Result<T, ComputeError>;
