//! Concept resolution and merged record generation.
//!
//! The merge engine partitions concept identifiers into equivalence groups
//! by following cross-reference edges, then synthesizes one merged record
//! per multi-member group and points every member back at it.
//!
//! # Components
//!
//! - [`Merge`] - batch engine owning the per-run group index and caches
//! - [`Merge::build_group`] - work-list expansion of one starting identifier
//! - [`Merge::generate_merged_record`] - priority-ordered field synthesis
//! - [`sort_merge_records`] - canonical ordering of group records
//!
//! A batch run deletes all previously normalized records before rebuilding,
//! so a run that aborts partway leaves a state the next run heals. Engine
//! state (group index, UNII memo, failed-lookup cache) is scoped to one
//! engine value: construct a fresh [`Merge`] per batch.

mod error;
mod groups;
mod record;

pub use error::MergeError;
pub use record::sort_merge_records;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::database::{DrugStore, StoreError};

/// Outcome counts for one merge batch, reported for operational diagnosis.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeStats {
    /// Multi-member concept groups discovered.
    pub groups: usize,
    /// Merged records written to the store.
    pub merged_records: usize,
    /// Merge-reference updates applied.
    pub refs_updated: usize,
    /// Merge-reference updates that targeted a missing record.
    pub refs_failed: usize,
}

/// Batch engine for concept group construction and record merging.
pub struct Merge<S: DrugStore> {
    store: Arc<S>,
    /// Group index: every member of a group keys the same shared set.
    groups: HashMap<String, Arc<BTreeSet<String>>>,
    /// UNII code to qualifying Drugs@FDA concepts. UNIIs aren't stored in
    /// groups, so a side table prevents repeat queries.
    unii_to_drugsatfda: HashMap<String, BTreeSet<String>>,
    /// Concept IDs whose lookups already failed this batch.
    failed_lookups: HashSet<String>,
}

impl<S: DrugStore> Merge<S> {
    /// Create an engine for one batch run against the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            groups: HashMap::new(),
            unii_to_drugsatfda: HashMap::new(),
            failed_lookups: HashSet::new(),
        }
    }

    /// Run one full merge batch: delete previously normalized records, build
    /// concept groups from the candidate IDs (or every concept in the store
    /// when `None`), write merged records, and update back-references.
    pub async fn create_merged_concepts(
        &mut self,
        candidate_ids: Option<HashSet<String>>,
    ) -> Result<MergeStats, MergeError> {
        self.store.delete_normalized_concepts().await?;

        let record_ids = match candidate_ids {
            Some(ids) => ids,
            None => self.store.get_all_concept_ids().await?,
        };

        info!(candidates = record_ids.len(), "generating record id sets");
        let start = Instant::now();
        let mut sorted_ids: Vec<String> = record_ids.into_iter().collect();
        sorted_ids.sort();
        for record_id in &sorted_ids {
            let group = self.build_group(record_id).await?;
            if group.is_empty() {
                continue;
            }
            let group = Arc::new(group);
            for member in group.iter() {
                self.groups.insert(member.clone(), Arc::clone(&group));
            }
        }
        debug!(elapsed = ?start.elapsed(), "built record id sets");

        self.groups.retain(|_, group| group.len() > 1);

        info!("creating merged records and updating store");
        let start = Instant::now();
        let mut stats = MergeStats::default();
        let mut uploaded_ids: HashSet<String> = HashSet::new();
        let mut keys: Vec<String> = self.groups.keys().cloned().collect();
        keys.sort();
        for key in keys {
            if uploaded_ids.contains(&key) {
                continue;
            }
            let group = Arc::clone(&self.groups[&key]);
            let merged = self.generate_merged_record(&group).await?;

            self.store.add_merged_record(&merged).await?;
            stats.merged_records += 1;

            let merge_ref = merged.concept_id.to_lowercase();
            for concept_id in group.iter() {
                match self.store.update_merge_ref(concept_id, &merge_ref).await {
                    Ok(()) => stats.refs_updated += 1,
                    Err(StoreError::RecordNotFound { .. }) => {
                        error!(
                            concept_id = %concept_id,
                            merge_ref = %merge_ref,
                            "updating nonexistent record for merge ref"
                        );
                        stats.refs_failed += 1;
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            stats.groups += 1;
            uploaded_ids.extend(group.iter().cloned());
        }

        self.store.complete_write_transaction().await?;
        info!(
            groups = stats.groups,
            merged_records = stats.merged_records,
            refs_updated = stats.refs_updated,
            refs_failed = stats.refs_failed,
            "merged concept generation successful"
        );
        debug!(elapsed = ?start.elapsed(), "generated and added concepts");
        Ok(stats)
    }
}
