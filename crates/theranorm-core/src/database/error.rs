//! Record store error types.

use thiserror::Error;

/// Errors raised by record store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection setup or schema initialization failed.
    #[error("Store initialization failed: {0}")]
    Initialization(String),

    /// Lookup or scan failed at the backend level.
    #[error("Read failed: {0}")]
    Read(String),

    /// Insert, update, or delete failed at the backend level.
    #[error("Write failed: {0}")]
    Write(String),

    /// Targeted update against a record that does not exist. Raised
    /// distinctly so merge-reference updates can log and continue.
    #[error("No record exists for {concept_id}")]
    RecordNotFound { concept_id: String },

    /// Backend driver error.
    #[error("Database error: {0}")]
    Database(String),
}

impl From<surrealdb::Error> for StoreError {
    fn from(err: surrealdb::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Write(err.to_string())
    }
}
