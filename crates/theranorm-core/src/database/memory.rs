//! Map-backed record store.
//!
//! Keeps the full store in process memory. Primarily the dependency-injection
//! seam for engine tests, but also usable for small local runs.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tokio::sync::RwLock;

use super::error::StoreError;
use super::DrugStore;
use crate::schemas::{DrugRecord, MergedRecord, RefType, SourceMeta, SourceName, RXNORM_BRAND_TYPE};

/// In-memory implementation of [`DrugStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    /// Identity records, keyed by lowercase concept ID.
    records: BTreeMap<String, DrugRecord>,
    /// Merged records, keyed by lowercase primary concept ID.
    merged: BTreeMap<String, MergedRecord>,
    /// Reference entries: `<term>##<type>` key to owning concept IDs.
    refs: BTreeMap<String, BTreeSet<String>>,
    source_meta: BTreeMap<String, SourceMeta>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn ref_key(term: &str, tag: &str) -> String {
    format!("{}##{}", term.to_lowercase(), tag)
}

impl Inner {
    fn add_ref(&mut self, term: &str, tag: &str, concept_id: &str) {
        self.refs
            .entry(ref_key(term, tag))
            .or_default()
            .insert(concept_id.to_string());
    }
}

#[async_trait]
impl DrugStore for MemoryStore {
    async fn get_record_by_id(&self, concept_id: &str) -> Result<Option<DrugRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.records.get(&concept_id.to_lowercase()).cloned())
    }

    async fn get_merged_record(
        &self,
        concept_id: &str,
    ) -> Result<Option<MergedRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.merged.get(&concept_id.to_lowercase()).cloned())
    }

    async fn get_refs_by_type(
        &self,
        term: &str,
        ref_type: RefType,
    ) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .refs
            .get(&ref_key(term, ref_type.as_str()))
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_rxnorm_ids_by_brand(&self, brand_id: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .refs
            .get(&ref_key(brand_id, RXNORM_BRAND_TYPE))
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn scan_identity_records(
        &self,
    ) -> Result<BoxStream<'static, Result<DrugRecord, StoreError>>, StoreError> {
        let inner = self.inner.read().await;
        let snapshot: Vec<DrugRecord> = inner.records.values().cloned().collect();
        Ok(stream::iter(snapshot.into_iter().map(Ok)).boxed())
    }

    async fn get_all_concept_ids(&self) -> Result<HashSet<String>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .values()
            .map(|r| r.concept_id.clone())
            .collect())
    }

    async fn add_record(&self, record: &DrugRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let concept_id = &record.concept_id;
        if let Some(label) = &record.label {
            inner.add_ref(label, RefType::Label.as_str(), concept_id);
        }
        for alias in &record.aliases {
            inner.add_ref(alias, RefType::Alias.as_str(), concept_id);
        }
        for trade_name in &record.trade_names {
            inner.add_ref(trade_name, RefType::TradeName.as_str(), concept_id);
        }
        for xref in &record.xrefs {
            inner.add_ref(xref, RefType::Xref.as_str(), concept_id);
        }
        for assoc in &record.associated_with {
            inner.add_ref(assoc, RefType::AssociatedWith.as_str(), concept_id);
        }
        inner
            .records
            .insert(concept_id.to_lowercase(), record.clone());
        Ok(())
    }

    async fn add_rxnorm_brand(&self, brand_id: &str, record_id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.add_ref(brand_id, RXNORM_BRAND_TYPE, record_id);
        Ok(())
    }

    async fn add_merged_record(&self, record: &MergedRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .merged
            .insert(record.concept_id.to_lowercase(), record.clone());
        Ok(())
    }

    async fn update_merge_ref(
        &self,
        concept_id: &str,
        merge_ref: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        match inner.records.get_mut(&concept_id.to_lowercase()) {
            Some(record) => {
                record.merge_ref = Some(merge_ref.to_string());
                Ok(())
            }
            None => Err(StoreError::RecordNotFound {
                concept_id: concept_id.to_string(),
            }),
        }
    }

    async fn delete_normalized_concepts(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.merged.clear();
        Ok(())
    }

    async fn complete_write_transaction(&self) -> Result<(), StoreError> {
        // Writes are applied immediately.
        Ok(())
    }

    async fn get_source_metadata(
        &self,
        src_name: SourceName,
    ) -> Result<Option<SourceMeta>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.source_meta.get(src_name.as_str()).cloned())
    }

    async fn add_source_metadata(
        &self,
        src_name: SourceName,
        meta: &SourceMeta,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .source_meta
            .insert(src_name.as_str().to_string(), meta.clone());
        Ok(())
    }

    async fn check_schema_initialized(&self) -> Result<bool, StoreError> {
        Ok(true)
    }

    async fn check_tables_populated(&self) -> Result<bool, StoreError> {
        let inner = self.inner.read().await;
        Ok(!inner.records.is_empty())
    }
}
