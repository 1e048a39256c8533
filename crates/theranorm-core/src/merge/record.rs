//! Merged record generation.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;
use tracing::{debug, error};

use super::error::MergeError;
use super::Merge;
use crate::database::DrugStore;
use crate::schemas::{DrugRecord, MergedRecord, SourceName};

/// Matches RxNorm biosimilar labels, e.g. "trastuzumab-anns"; capture group 1
/// is the base therapeutic name. See FDA nonproprietary naming guidance for
/// biological products.
fn biologic_suffix() -> &'static Regex {
    static BIOLOGIC_SUFFIX: OnceLock<Regex> = OnceLock::new();
    BIOLOGIC_SUFFIX.get_or_init(|| {
        Regex::new(r"^(.*)[ -][a-z]{4}$").expect("biologic suffix pattern compiles")
    })
}

/// Sort group records into canonical merge order.
///
/// Orders by source priority with the lexicographically-least concept ID as
/// tie-break; a pure function of the input set. If the top entry looks like
/// an RxNorm biosimilar and a base RxNorm concept is present, the base moves
/// to the front so the normalized label is "trastuzumab" rather than
/// "trastuzumab-abcd".
///
/// Broken out to facilitate direct testing.
pub fn sort_merge_records(records: Vec<DrugRecord>) -> Result<Vec<DrugRecord>, MergeError> {
    let mut keyed = Vec::with_capacity(records.len());
    for record in records {
        let src = SourceName::parse(&record.src_name).ok_or_else(|| {
            MergeError::ProhibitedSource {
                src: record.src_name.clone(),
                concept_id: record.concept_id.clone(),
            }
        })?;
        keyed.push((src.priority(), src, record));
    }
    keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.2.concept_id.cmp(&b.2.concept_id)));

    let rxnorm_count = keyed
        .iter()
        .filter(|(_, src, _)| *src == SourceName::RxNorm)
        .count();
    if rxnorm_count > 1 {
        let first_label = keyed[0].2.label.clone().unwrap_or_default();
        if let Some(caps) = biologic_suffix().captures(&first_label) {
            let base = caps[1].to_lowercase();
            let position = keyed.iter().enumerate().skip(1).find_map(|(i, (_, src, r))| {
                let matches_base = *src == SourceName::RxNorm
                    && r.label.as_deref().is_some_and(|l| l.to_lowercase() == base);
                matches_base.then_some(i)
            });
            if let Some(i) = position {
                debug!(
                    concept_id = %keyed[i].2.concept_id,
                    "reordering rxnorm entry ahead of biosimilars"
                );
                let entry = keyed.remove(i);
                keyed.insert(0, entry);
            }
        }
    }

    Ok(keyed.into_iter().map(|(_, _, record)| record).collect())
}

impl<S: DrugStore> Merge<S> {
    /// Generate the merged record for a concept group.
    ///
    /// Scalar fields take the first non-empty value in sorted order;
    /// set-valued fields union across all members. Group members that no
    /// longer resolve are logged and skipped; only a group with no
    /// retrievable member at all is an error. Pure with respect to the
    /// fetched record set, so re-running over an unchanged store yields a
    /// byte-identical record.
    pub async fn generate_merged_record(
        &self,
        group: &BTreeSet<String>,
    ) -> Result<MergedRecord, MergeError> {
        let mut records = Vec::new();
        for concept_id in group {
            match self.store.get_record_by_id(concept_id).await? {
                Some(record) => records.push(record),
                None => error!(
                    concept_id = %concept_id,
                    ?group,
                    "merge record generator could not retrieve record"
                ),
            }
        }
        if records.is_empty() {
            return Err(MergeError::EmptyGroup {
                group: group.iter().cloned().collect(),
            });
        }

        let records = sort_merge_records(records)?;

        let concept_id = records[0].concept_id.clone();
        let merged_id = records
            .iter()
            .map(|r| r.concept_id.as_str())
            .collect::<Vec<_>>()
            .join("|");
        let xrefs: Vec<String> = records[1..].iter().map(|r| r.concept_id.clone()).collect();

        let mut label: Option<String> = None;
        let mut aliases = BTreeSet::new();
        let mut trade_names = BTreeSet::new();
        let mut associated_with = BTreeSet::new();
        let mut approval_ratings = BTreeSet::new();
        let mut approval_year = BTreeSet::new();
        let mut has_indication = Vec::new();

        for record in &records {
            aliases.extend(record.aliases.iter().cloned());
            trade_names.extend(record.trade_names.iter().cloned());
            associated_with.extend(record.associated_with.iter().cloned());
            approval_ratings.extend(record.approval_ratings.iter().cloned());
            approval_year.extend(record.approval_year.iter().cloned());

            if let Some(record_label) = &record.label {
                match &label {
                    None => label = Some(record_label.clone()),
                    // Lower-priority labels that lose the scalar slot are
                    // still worth keeping as aliases.
                    Some(chosen) if chosen != record_label => {
                        aliases.insert(record_label.clone());
                    }
                    Some(_) => {}
                }
            }

            for indication in &record.has_indication {
                if !has_indication.contains(indication) {
                    has_indication.push(indication.clone());
                }
            }
        }

        Ok(MergedRecord {
            concept_id,
            merged_id,
            xrefs,
            label,
            aliases: aliases.into_iter().collect(),
            trade_names: trade_names.into_iter().collect(),
            associated_with: associated_with.into_iter().collect(),
            approval_ratings: approval_ratings.into_iter().collect(),
            approval_year: approval_year.into_iter().collect(),
            has_indication,
        })
    }
}
