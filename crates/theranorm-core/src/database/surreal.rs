//! SurrealDB embedded record store.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::json;
use std::collections::HashSet;
use std::path::Path;
use surrealdb::engine::local::{Db, RocksDb};
use surrealdb::Surreal;

use super::error::StoreError;
use super::DrugStore;
use crate::schemas::{DrugRecord, MergedRecord, RefType, SourceMeta, SourceName, RXNORM_BRAND_TYPE};

/// Embedded SurrealDB implementation of [`DrugStore`].
///
/// Rows in the `therapy` table carry a `label_and_type` key in the
/// `<concept-id>##<item-type>` scheme; reference entries live in a separate
/// `reference` table keyed `<term>##<ref-type>`.
pub struct SurrealStore {
    db: Surreal<Db>,
}

#[derive(serde::Deserialize)]
struct ConceptIdRow {
    concept_id: String,
}

#[derive(serde::Deserialize)]
struct CountRow {
    count: i64,
}

impl SurrealStore {
    /// Open or create a store at the given path.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let db = Surreal::new::<RocksDb>(path)
            .await
            .map_err(|e| StoreError::Initialization(e.to_string()))?;
        db.use_ns("theranorm")
            .use_db("therapies")
            .await
            .map_err(|e| StoreError::Initialization(e.to_string()))?;

        let store = Self { db };
        store.initialize_schema().await?;
        Ok(store)
    }

    /// Initialize tables and indexes. Tolerant of existing content.
    async fn initialize_schema(&self) -> Result<(), StoreError> {
        self.db
            .query(
                r#"
                DEFINE TABLE IF NOT EXISTS therapy SCHEMALESS;
                DEFINE INDEX IF NOT EXISTS therapy_pk ON therapy FIELDS label_and_type UNIQUE;
                DEFINE INDEX IF NOT EXISTS therapy_concept ON therapy FIELDS concept_id_lower;
                DEFINE INDEX IF NOT EXISTS therapy_item_type ON therapy FIELDS item_type;
                "#,
            )
            .await?;

        self.db
            .query(
                r#"
                DEFINE TABLE IF NOT EXISTS reference SCHEMAFULL;
                DEFINE FIELD label_and_type ON reference TYPE string;
                DEFINE FIELD concept_id ON reference TYPE string;
                DEFINE INDEX IF NOT EXISTS reference_pk ON reference FIELDS label_and_type, concept_id UNIQUE;
                "#,
            )
            .await?;

        self.db
            .query(
                r#"
                DEFINE TABLE IF NOT EXISTS source_meta SCHEMALESS;
                DEFINE INDEX IF NOT EXISTS source_meta_pk ON source_meta FIELDS src_name UNIQUE;
                "#,
            )
            .await?;

        self.db
            .query(
                r#"
                DEFINE TABLE IF NOT EXISTS metadata SCHEMAFULL;
                DEFINE FIELD key ON metadata TYPE string;
                DEFINE FIELD value ON metadata TYPE any;
                DEFINE INDEX IF NOT EXISTS metadata_key ON metadata FIELDS key UNIQUE;
                UPSERT metadata:initialized SET key = 'initialized', value = true;
                "#,
            )
            .await?;

        Ok(())
    }

    fn identity_pk(concept_id: &str) -> String {
        format!("{}##identity", concept_id.to_lowercase())
    }

    fn ref_pk(term: &str, tag: &str) -> String {
        format!("{}##{}", term.to_lowercase(), tag)
    }

    async fn add_reference(
        &self,
        term: &str,
        tag: &str,
        concept_id: &str,
    ) -> Result<(), StoreError> {
        // Tolerate duplicate writes across re-ingestion runs.
        self.db
            .query(
                "IF (SELECT * FROM reference WHERE label_and_type = $pk AND concept_id = $cid) = [] \
                 { CREATE reference SET label_and_type = $pk, concept_id = $cid }",
            )
            .bind(("pk", Self::ref_pk(term, tag)))
            .bind(("cid", concept_id.to_string()))
            .await?;
        Ok(())
    }

    async fn count_where(&self, table: &str, condition: &str) -> Result<usize, StoreError> {
        let query = format!("SELECT count() FROM {table} WHERE {condition} GROUP ALL");
        let row: Option<CountRow> = self.db.query(query).await?.take(0)?;
        Ok(row.map(|r| r.count as usize).unwrap_or(0))
    }
}

#[async_trait]
impl DrugStore for SurrealStore {
    async fn get_record_by_id(&self, concept_id: &str) -> Result<Option<DrugRecord>, StoreError> {
        let record: Option<DrugRecord> = self
            .db
            .query("SELECT * FROM therapy WHERE label_and_type = $pk LIMIT 1")
            .bind(("pk", Self::identity_pk(concept_id)))
            .await?
            .take(0)?;
        Ok(record)
    }

    async fn get_merged_record(
        &self,
        concept_id: &str,
    ) -> Result<Option<MergedRecord>, StoreError> {
        let record: Option<MergedRecord> = self
            .db
            .query(
                "SELECT * FROM therapy \
                 WHERE item_type = 'merger' AND concept_id_lower = $id LIMIT 1",
            )
            .bind(("id", concept_id.to_lowercase()))
            .await?
            .take(0)?;
        Ok(record)
    }

    async fn get_refs_by_type(
        &self,
        term: &str,
        ref_type: RefType,
    ) -> Result<Vec<String>, StoreError> {
        let rows: Vec<ConceptIdRow> = self
            .db
            .query("SELECT concept_id FROM reference WHERE label_and_type = $pk")
            .bind(("pk", Self::ref_pk(term, ref_type.as_str())))
            .await?
            .take(0)?;
        let mut ids: Vec<String> = rows.into_iter().map(|r| r.concept_id).collect();
        ids.sort();
        Ok(ids)
    }

    async fn get_rxnorm_ids_by_brand(&self, brand_id: &str) -> Result<Vec<String>, StoreError> {
        let rows: Vec<ConceptIdRow> = self
            .db
            .query("SELECT concept_id FROM reference WHERE label_and_type = $pk")
            .bind(("pk", Self::ref_pk(brand_id, RXNORM_BRAND_TYPE)))
            .await?
            .take(0)?;
        let mut ids: Vec<String> = rows.into_iter().map(|r| r.concept_id).collect();
        ids.sort();
        Ok(ids)
    }

    async fn scan_identity_records(
        &self,
    ) -> Result<BoxStream<'static, Result<DrugRecord, StoreError>>, StoreError> {
        let records: Vec<DrugRecord> = self
            .db
            .query("SELECT * FROM therapy WHERE item_type = 'identity'")
            .await?
            .take(0)?;
        Ok(stream::iter(records.into_iter().map(Ok)).boxed())
    }

    async fn get_all_concept_ids(&self) -> Result<HashSet<String>, StoreError> {
        let rows: Vec<ConceptIdRow> = self
            .db
            .query("SELECT concept_id FROM therapy WHERE item_type = 'identity'")
            .await?
            .take(0)?;
        Ok(rows.into_iter().map(|r| r.concept_id).collect())
    }

    async fn add_record(&self, record: &DrugRecord) -> Result<(), StoreError> {
        let pk = Self::identity_pk(&record.concept_id);
        let mut row = serde_json::to_value(record)?;
        let obj = row
            .as_object_mut()
            .ok_or_else(|| StoreError::Write("record did not serialize to an object".into()))?;
        obj.insert("label_and_type".into(), json!(pk.clone()));
        obj.insert("item_type".into(), json!("identity"));
        obj.insert(
            "concept_id_lower".into(),
            json!(record.concept_id.to_lowercase()),
        );

        self.db
            .query("DELETE therapy WHERE label_and_type = $pk")
            .bind(("pk", pk))
            .await?;
        let _: Option<DrugRecord> = self.db.create("therapy").content(row).await?;

        if let Some(label) = &record.label {
            self.add_reference(label, RefType::Label.as_str(), &record.concept_id)
                .await?;
        }
        for alias in &record.aliases {
            self.add_reference(alias, RefType::Alias.as_str(), &record.concept_id)
                .await?;
        }
        for trade_name in &record.trade_names {
            self.add_reference(trade_name, RefType::TradeName.as_str(), &record.concept_id)
                .await?;
        }
        for xref in &record.xrefs {
            self.add_reference(xref, RefType::Xref.as_str(), &record.concept_id)
                .await?;
        }
        for assoc in &record.associated_with {
            self.add_reference(assoc, RefType::AssociatedWith.as_str(), &record.concept_id)
                .await?;
        }
        Ok(())
    }

    async fn add_rxnorm_brand(&self, brand_id: &str, record_id: &str) -> Result<(), StoreError> {
        self.add_reference(brand_id, RXNORM_BRAND_TYPE, record_id).await
    }

    async fn add_merged_record(&self, record: &MergedRecord) -> Result<(), StoreError> {
        let pk = record.sort_key();
        let mut row = serde_json::to_value(record)?;
        let obj = row
            .as_object_mut()
            .ok_or_else(|| StoreError::Write("record did not serialize to an object".into()))?;
        obj.insert("label_and_type".into(), json!(pk.clone()));
        obj.insert("item_type".into(), json!("merger"));
        obj.insert(
            "concept_id_lower".into(),
            json!(record.concept_id.to_lowercase()),
        );

        self.db
            .query("DELETE therapy WHERE label_and_type = $pk")
            .bind(("pk", pk))
            .await?;
        let _: Option<MergedRecord> = self.db.create("therapy").content(row).await?;
        Ok(())
    }

    async fn update_merge_ref(
        &self,
        concept_id: &str,
        merge_ref: &str,
    ) -> Result<(), StoreError> {
        // Single statement so the existence check and the write cannot
        // interleave with other writers.
        let updated: Option<ConceptIdRow> = self
            .db
            .query(
                "UPDATE therapy SET merge_ref = $merge_ref \
                 WHERE label_and_type = $pk RETURN AFTER",
            )
            .bind(("merge_ref", merge_ref.to_string()))
            .bind(("pk", Self::identity_pk(concept_id)))
            .await?
            .take(0)?;
        if updated.is_none() {
            return Err(StoreError::RecordNotFound {
                concept_id: concept_id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_normalized_concepts(&self) -> Result<(), StoreError> {
        self.db
            .query("DELETE therapy WHERE item_type = 'merger'")
            .await?;
        Ok(())
    }

    async fn complete_write_transaction(&self) -> Result<(), StoreError> {
        // Writes are committed per statement.
        Ok(())
    }

    async fn get_source_metadata(
        &self,
        src_name: SourceName,
    ) -> Result<Option<SourceMeta>, StoreError> {
        let meta: Option<SourceMeta> = self
            .db
            .query("SELECT * FROM source_meta WHERE src_name = $src LIMIT 1")
            .bind(("src", src_name.as_str().to_string()))
            .await?
            .take(0)?;
        Ok(meta)
    }

    async fn add_source_metadata(
        &self,
        src_name: SourceName,
        meta: &SourceMeta,
    ) -> Result<(), StoreError> {
        let mut row = serde_json::to_value(meta)?;
        let obj = row
            .as_object_mut()
            .ok_or_else(|| StoreError::Write("metadata did not serialize to an object".into()))?;
        obj.insert("src_name".into(), json!(src_name.as_str()));

        self.db
            .query("DELETE source_meta WHERE src_name = $src")
            .bind(("src", src_name.as_str().to_string()))
            .await?;
        let _: Option<SourceMeta> = self.db.create("source_meta").content(row).await?;
        Ok(())
    }

    async fn check_schema_initialized(&self) -> Result<bool, StoreError> {
        let row: Option<serde_json::Value> = self
            .db
            .query("SELECT `value` FROM metadata WHERE `key` = 'initialized'")
            .await?
            .take(0)?;
        Ok(row.is_some())
    }

    async fn check_tables_populated(&self) -> Result<bool, StoreError> {
        let identities = self
            .count_where("therapy", "item_type = 'identity'")
            .await?;
        let references = self.count_where("reference", "label_and_type != ''").await?;
        Ok(identities > 0 && references > 0)
    }
}
