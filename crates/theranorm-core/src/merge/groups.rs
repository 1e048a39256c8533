//! Concept group construction.
//!
//! Expands a starting concept identifier into its full equivalence group by
//! following cross-reference edges. Edges come from three places: a record's
//! own `xrefs`, UNII co-references to single-UNII Drugs@FDA applications,
//! and RxNorm brand backreferences tried when a direct `rxcui` lookup fails.

use std::collections::BTreeSet;
use tracing::{error, warn};

use super::Merge;
use crate::database::{DrugStore, StoreError};
use crate::schemas::{is_drugsatfda, is_rxnorm, is_unii, DrugRecord, RefType};

impl<S: DrugStore> Merge<S> {
    /// Build the concept group for an individual record ID.
    ///
    /// Runs an explicit work-list expansion rather than recursion so
    /// pathological reference chains cannot exhaust the stack. Every
    /// identifier is visited at most once per batch: already-grouped IDs
    /// short-circuit to their existing group and failed lookups are memoized
    /// for the life of the engine value.
    pub async fn build_group(&mut self, record_id: &str) -> Result<BTreeSet<String>, StoreError> {
        if let Some(existing) = self.groups.get(record_id) {
            return Ok((**existing).clone());
        }
        // Drugs@FDA applications are terminal nodes: they participate as
        // edge targets but are never expanded as traversal sources.
        if is_drugsatfda(record_id) {
            return Ok(BTreeSet::from([record_id.to_string()]));
        }

        let mut group = BTreeSet::new();
        let mut pending = vec![record_id.to_string()];

        while let Some(id) = pending.pop() {
            if group.contains(&id) {
                continue;
            }
            if let Some(existing) = self.groups.get(&id) {
                group.extend(existing.iter().cloned());
                continue;
            }
            // UNII codes are an edge mechanism only, never group members.
            if is_unii(&id) {
                continue;
            }
            if is_drugsatfda(&id) {
                group.insert(id);
                continue;
            }
            if self.failed_lookups.contains(&id) {
                continue;
            }

            let Some(record) = self.store.get_record_by_id(&id).await? else {
                if is_rxnorm(&id) {
                    // The ID may name an RxNorm brand concept; follow the
                    // backreference to its ingredient instead.
                    if let Some(target) = self.resolve_brand(&id).await? {
                        if !group.contains(&target) {
                            pending.push(target);
                        }
                        continue;
                    }
                }
                warn!(concept_id = %id, ?group, "unable to resolve lookup during group expansion");
                self.failed_lookups.insert(id);
                continue;
            };

            let neighbors = self.record_xrefs(&record).await?;
            group.insert(record.concept_id);
            for neighbor in neighbors {
                if !group.contains(&neighbor) {
                    pending.push(neighbor);
                }
            }
        }

        Ok(group)
    }

    /// Extract outbound edges for a record: declared `xrefs` plus Drugs@FDA
    /// applications co-referenced through UNII codes.
    async fn record_xrefs(&mut self, record: &DrugRecord) -> Result<BTreeSet<String>, StoreError> {
        let mut xrefs: BTreeSet<String> = record.xrefs.iter().cloned().collect();

        for unii in record.associated_with.iter().filter(|a| is_unii(a)) {
            if let Some(cached) = self.unii_to_drugsatfda.get(unii.as_str()) {
                xrefs.extend(cached.iter().cloned());
                continue;
            }

            let associated = self
                .store
                .get_refs_by_type(&unii.to_lowercase(), RefType::AssociatedWith)
                .await?;
            let mut drugsatfda_refs = BTreeSet::new();
            for concept_id in associated.iter().filter(|c| is_drugsatfda(c)) {
                if let Some(qualified) = self.drugsatfda_from_unii(concept_id).await? {
                    drugsatfda_refs.insert(qualified);
                }
            }
            self.unii_to_drugsatfda
                .insert(unii.clone(), drugsatfda_refs.clone());
            xrefs.extend(drugsatfda_refs);
        }

        Ok(xrefs)
    }

    /// Verify that a Drugs@FDA record referenced through a UNII can safely
    /// join a concept group.
    ///
    /// Drugs@FDA tracks combination therapies and attaches a UNII for each
    /// component; pulling those applications in would merge distinct active
    /// ingredients under the umbrella of the combination. Only applications
    /// declaring exactly one UNII qualify.
    async fn drugsatfda_from_unii(&self, concept_id: &str) -> Result<Option<String>, StoreError> {
        let Some(record) = self.store.get_record_by_id(concept_id).await? else {
            error!(concept_id, "couldn't retrieve Drugs@FDA record for UNII check");
            return Ok(None);
        };
        let unii_count = record.associated_with.iter().filter(|a| is_unii(a)).count();
        if unii_count == 1 {
            Ok(Some(record.concept_id))
        } else {
            Ok(None)
        }
    }

    /// Dereference an RxNorm brand identifier to its ingredient concept.
    /// Ambiguous backreferences are never followed.
    async fn resolve_brand(&self, brand_id: &str) -> Result<Option<String>, StoreError> {
        let mut matches = self.store.get_rxnorm_ids_by_brand(brand_id).await?;
        if matches.len() > 1 {
            warn!(
                brand_id,
                ?matches,
                "ambiguous rx_brand backreference; treating as unresolved"
            );
            return Ok(None);
        }
        Ok(matches.pop())
    }
}
