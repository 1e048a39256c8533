//! Merge engine error types.

use thiserror::Error;

use crate::database::StoreError;

/// Errors that can abort a merge batch.
#[derive(Debug, Error)]
pub enum MergeError {
    /// No member of a concept group resolved to an identity record. This
    /// indicates store inconsistency and is surfaced rather than dropped.
    #[error("No records could be retrieved for group {group:?}")]
    EmptyGroup { group: Vec<String> },

    /// A record carries a source name with no configured priority rank.
    /// Fatal: silent misranking would corrupt downstream references.
    #[error("Prohibited source: {src} in concept_id {concept_id}")]
    ProhibitedSource { src: String, concept_id: String },

    /// Store failure propagated from the backend.
    #[error(transparent)]
    Store(#[from] StoreError),
}
