//! Error types for the data model.

use thiserror::Error;

/// Errors raised while decoding or validating model input.
#[derive(Error, Debug)]
pub enum ModelError {
    /// A job descriptor failed to parse against the JSON schema.
    #[error("malformed job descriptor: {0}")]
    JobSchema(#[from] serde_json::Error),

    /// A job parsed but carries out-of-range values.
    #[error("invalid job {id}: {reason}")]
    InvalidJob {
        /// Job id the error is attributed to.
        id: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A geometry element is structurally unusable.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Machine limits are unusable for a compilation run.
    #[error("invalid machine limits: {0}")]
    InvalidLimits(String),
}
