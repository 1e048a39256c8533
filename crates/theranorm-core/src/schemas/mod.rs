//! Core data types for therapy concepts, reference entries, and merged records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Namespace prefix carried by UNII regulatory codes. UNIIs participate in
/// group construction as edge signals only and are never group members.
pub const UNII_PREFIX: &str = "unii:";

/// Namespace prefix for RxNorm concept identifiers.
pub const RXNORM_PREFIX: &str = "rxcui:";

/// Namespace prefix shared by Drugs@FDA NDA/ANDA application identifiers.
pub const DRUGSATFDA_PREFIX: &str = "drugsatfda";

/// Reference tag marking a backreference from an RxNorm brand concept to its
/// ingredient concept. Kept out of [`RefType`] because brand backreferences
/// shouldn't be publicly searchable.
pub const RXNORM_BRAND_TYPE: &str = "rx_brand";

/// True if the identifier denotes a UNII code rather than a source concept.
pub fn is_unii(id: &str) -> bool {
    id.to_lowercase().starts_with(UNII_PREFIX)
}

/// True if the identifier belongs to the RxNorm namespace.
pub fn is_rxnorm(id: &str) -> bool {
    id.to_lowercase().starts_with(RXNORM_PREFIX)
}

/// True if the identifier denotes a Drugs@FDA regulatory application.
pub fn is_drugsatfda(id: &str) -> bool {
    id.to_lowercase().starts_with(DRUGSATFDA_PREFIX)
}

/// Record item types as tagged in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Identity,
    Merger,
}

/// Reference (lookup) entry types, mapping a normalized term back to the
/// concept identifier that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefType {
    Label,
    TradeName,
    Alias,
    Xref,
    AssociatedWith,
}

impl RefType {
    /// Store-facing tag for this reference type.
    pub fn as_str(&self) -> &'static str {
        match self {
            RefType::Label => "label",
            RefType::TradeName => "trade_name",
            RefType::Alias => "alias",
            RefType::Xref => "xref",
            RefType::AssociatedWith => "associated_with",
        }
    }
}

/// Known data sources, ranked by merge priority.
///
/// The ordinal returned by [`SourceName::priority`] decides which group
/// member becomes the primary identifier of a merged record and whose scalar
/// fields win. Lower is better. Records carrying a source name outside this
/// enumeration abort the merge batch rather than risk silent misranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceName {
    RxNorm,
    #[serde(rename = "NCIt")]
    NcIt,
    HemOnc,
    DrugBank,
    #[serde(rename = "DrugsAtFDA")]
    DrugsAtFda,
    #[serde(rename = "GuideToPHARMACOLOGY")]
    GuideToPharmacology,
    #[serde(rename = "ChEMBL")]
    ChEmbl,
    #[serde(rename = "ChemIDplus")]
    ChemIdPlus,
    Wikidata,
}

impl SourceName {
    /// Merge priority rank. Lower values take precedence.
    pub fn priority(self) -> u8 {
        match self {
            SourceName::RxNorm => 1,
            SourceName::NcIt => 2,
            SourceName::HemOnc => 3,
            SourceName::DrugBank => 4,
            SourceName::DrugsAtFda => 5,
            SourceName::GuideToPharmacology => 6,
            SourceName::ChEmbl => 7,
            SourceName::ChemIdPlus => 8,
            SourceName::Wikidata => 9,
        }
    }

    /// Parse a stored source name. Case-insensitive; accepts the "Drugs@FDA"
    /// display spelling used by some upstream dumps.
    pub fn parse(s: &str) -> Option<SourceName> {
        match s.to_uppercase().as_str() {
            "RXNORM" => Some(SourceName::RxNorm),
            "NCIT" => Some(SourceName::NcIt),
            "HEMONC" => Some(SourceName::HemOnc),
            "DRUGBANK" => Some(SourceName::DrugBank),
            "DRUGSATFDA" | "DRUGS@FDA" => Some(SourceName::DrugsAtFda),
            "GUIDETOPHARMACOLOGY" => Some(SourceName::GuideToPharmacology),
            "CHEMBL" => Some(SourceName::ChEmbl),
            "CHEMIDPLUS" => Some(SourceName::ChemIdPlus),
            "WIKIDATA" => Some(SourceName::Wikidata),
            _ => None,
        }
    }

    /// Canonical display spelling, as stored in `src_name` fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceName::RxNorm => "RxNorm",
            SourceName::NcIt => "NCIt",
            SourceName::HemOnc => "HemOnc",
            SourceName::DrugBank => "DrugBank",
            SourceName::DrugsAtFda => "DrugsAtFDA",
            SourceName::GuideToPharmacology => "GuideToPHARMACOLOGY",
            SourceName::ChEmbl => "ChEMBL",
            SourceName::ChemIdPlus => "ChemIDplus",
            SourceName::Wikidata => "Wikidata",
        }
    }

    /// All known sources, in priority order.
    pub fn all() -> [SourceName; 9] {
        [
            SourceName::RxNorm,
            SourceName::NcIt,
            SourceName::HemOnc,
            SourceName::DrugBank,
            SourceName::DrugsAtFda,
            SourceName::GuideToPharmacology,
            SourceName::ChEmbl,
            SourceName::ChemIdPlus,
            SourceName::Wikidata,
        ]
    }
}

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Disease indication data attached by regulatory bodies.
///
/// Deduplicated across a merged group by full-tuple equality, not just by
/// `disease_id`, since sources attach differing supplemental detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HasIndication {
    pub disease_id: String,
    pub disease_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_disease_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplemental_info: Option<BTreeMap<String, String>>,
}

/// Per-source identity record for one concept identifier.
///
/// Created by source ingestion; the merge engine treats every field as
/// read-only except `merge_ref`, which the persistence step points at the
/// subsuming merged record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugRecord {
    /// Namespaced concept identifier, e.g. `rxcui:8134`.
    pub concept_id: String,
    /// Source name as stored; validated against [`SourceName`] at merge time.
    pub src_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trade_names: Vec<String>,
    /// Identifiers in other namespaces known to denote the same concept.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub xrefs: Vec<String>,
    /// Weaker-typed associated codes (e.g. UNII); not concept-equivalent on
    /// their own.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub associated_with: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approval_ratings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approval_year: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub has_indication: Vec<HasIndication>,
    /// Lowercase primary identifier of the merged record subsuming this one,
    /// if its group has two or more members.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_ref: Option<String>,
}

impl DrugRecord {
    /// Create a bare identity record for a source concept.
    pub fn new(concept_id: impl Into<String>, src_name: SourceName) -> Self {
        Self {
            concept_id: concept_id.into(),
            src_name: src_name.as_str().to_string(),
            label: None,
            aliases: Vec::new(),
            trade_names: Vec::new(),
            xrefs: Vec::new(),
            associated_with: Vec::new(),
            approval_ratings: Vec::new(),
            approval_year: Vec::new(),
            has_indication: Vec::new(),
            merge_ref: None,
        }
    }
}

/// Synthesized record representing a whole concept group.
///
/// Rebuilt from scratch on every merge batch; never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    /// Primary identifier: the group member from the highest-priority source.
    pub concept_id: String,
    /// Display form: all member identifiers joined with `|` in sort order.
    /// Lower-cased, this is the record's canonical sort/lookup key.
    pub merged_id: String,
    /// Remaining group members, in sort order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub xrefs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trade_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub associated_with: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approval_ratings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approval_year: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub has_indication: Vec<HasIndication>,
}

impl MergedRecord {
    /// Canonical sortable key, e.g. `rxcui:8134|ncit:c739##merger`.
    pub fn sort_key(&self) -> String {
        format!("{}##merger", self.merged_id.to_lowercase())
    }
}

/// License and versioning metadata for a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMeta {
    pub data_license: String,
    pub data_license_url: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}
