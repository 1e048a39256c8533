//! Record store abstraction for therapy concepts.
//!
//! The merge engine only ever talks to the [`DrugStore`] trait. Two backends
//! are provided:
//!
//! - [`SurrealStore`] - embedded SurrealDB with RocksDB persistence
//! - [`MemoryStore`] - map-backed store for tests and local experimentation
//!
//! Concept identifiers are case-insensitively unique; lookups normalize to
//! lowercase. Reference entries use the `<term>##<type>` keying scheme so a
//! single sorted index answers "which concept owns this term" queries.

mod error;
mod memory;
mod surreal;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use surreal::SurrealStore;

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::HashSet;

use crate::schemas::{DrugRecord, MergedRecord, RefType, SourceMeta, SourceName};

/// Interface required of any record store backend.
///
/// Read operations return `Ok(None)` (or empty collections) for missing
/// data; `Err` is reserved for backend failures. The one exception is
/// [`DrugStore::update_merge_ref`], which must fail loudly with
/// [`StoreError::RecordNotFound`] when its target does not exist.
#[async_trait]
pub trait DrugStore: Send + Sync {
    /// Fetch the identity record for a concept identifier.
    async fn get_record_by_id(&self, concept_id: &str) -> Result<Option<DrugRecord>, StoreError>;

    /// Fetch a merged record by its primary concept identifier.
    async fn get_merged_record(
        &self,
        concept_id: &str,
    ) -> Result<Option<MergedRecord>, StoreError>;

    /// Retrieve concept IDs owning reference entries that match a normalized
    /// term. Empty if nothing matches.
    async fn get_refs_by_type(
        &self,
        term: &str,
        ref_type: RefType,
    ) -> Result<Vec<String>, StoreError>;

    /// Retrieve all ingredient concept IDs backreferenced by an RxNorm brand
    /// identifier. Callers decide how to treat ambiguous (multi-hit) results.
    async fn get_rxnorm_ids_by_brand(&self, brand_id: &str) -> Result<Vec<String>, StoreError>;

    /// Lazily iterate every identity record in the store.
    async fn scan_identity_records(
        &self,
    ) -> Result<BoxStream<'static, Result<DrugRecord, StoreError>>, StoreError>;

    /// All identity concept IDs; the fallback candidate set for a full
    /// normalization run.
    async fn get_all_concept_ids(&self) -> Result<HashSet<String>, StoreError>;

    /// Insert an identity record along with its reference entries.
    async fn add_record(&self, record: &DrugRecord) -> Result<(), StoreError>;

    /// Register an RxNorm brand-to-ingredient backreference.
    async fn add_rxnorm_brand(&self, brand_id: &str, record_id: &str) -> Result<(), StoreError>;

    /// Insert or overwrite a merged record.
    async fn add_merged_record(&self, record: &MergedRecord) -> Result<(), StoreError>;

    /// Point an identity record's merge reference at a merged record.
    ///
    /// Returns [`StoreError::RecordNotFound`] if the identity record does
    /// not exist.
    async fn update_merge_ref(&self, concept_id: &str, merge_ref: &str)
        -> Result<(), StoreError>;

    /// Remove all merged records. Run before every normalization batch so
    /// stale merge topology from a prior run cannot survive.
    async fn delete_normalized_concepts(&self) -> Result<(), StoreError>;

    /// Conclude batched writing, if the backend buffers writes.
    async fn complete_write_transaction(&self) -> Result<(), StoreError>;

    /// License/version metadata for a source, if loaded.
    async fn get_source_metadata(
        &self,
        src_name: SourceName,
    ) -> Result<Option<SourceMeta>, StoreError>;

    /// Record source metadata during ingestion.
    async fn add_source_metadata(
        &self,
        src_name: SourceName,
        meta: &SourceMeta,
    ) -> Result<(), StoreError>;

    /// Check whether the backend schema has been created.
    async fn check_schema_initialized(&self) -> Result<bool, StoreError>;

    /// Rudimentary check that critical tables hold at least some records.
    async fn check_tables_populated(&self) -> Result<bool, StoreError>;
}
