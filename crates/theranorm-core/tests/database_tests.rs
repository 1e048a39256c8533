use futures::StreamExt;
use tempfile::TempDir;
use theranorm_core::schemas::{RefType, SourceMeta};
use theranorm_core::{
    DrugRecord, DrugStore, MemoryStore, MergedRecord, SourceName, StoreError, SurrealStore,
};

fn sample_record() -> DrugRecord {
    let mut record = DrugRecord::new("rxcui:8134", SourceName::RxNorm);
    record.label = Some("Phenobarbital".to_string());
    record.aliases = vec!["Luminal".to_string()];
    record.trade_names = vec!["Solfoton".to_string()];
    record.xrefs = vec!["ncit:C739".to_string()];
    record.associated_with = vec!["unii:YQE403BP4D".to_string()];
    record
}

fn sample_merged() -> MergedRecord {
    MergedRecord {
        concept_id: "rxcui:8134".to_string(),
        merged_id: "rxcui:8134|ncit:C739".to_string(),
        xrefs: vec!["ncit:C739".to_string()],
        label: Some("Phenobarbital".to_string()),
        aliases: Vec::new(),
        trade_names: Vec::new(),
        associated_with: Vec::new(),
        approval_ratings: Vec::new(),
        approval_year: Vec::new(),
        has_indication: Vec::new(),
    }
}

#[tokio::test]
async fn test_record_roundtrip_case_insensitive() {
    let store = MemoryStore::new();
    store.add_record(&sample_record()).await.unwrap();

    let fetched = store.get_record_by_id("RXCUI:8134").await.unwrap().unwrap();
    assert_eq!(fetched.concept_id, "rxcui:8134");
    assert_eq!(fetched.label.as_deref(), Some("Phenobarbital"));

    assert!(store.get_record_by_id("rxcui:0000").await.unwrap().is_none());
}

#[tokio::test]
async fn test_refs_by_type() {
    let store = MemoryStore::new();
    store.add_record(&sample_record()).await.unwrap();

    let by_label = store
        .get_refs_by_type("phenobarbital", RefType::Label)
        .await
        .unwrap();
    assert_eq!(by_label, vec!["rxcui:8134"]);

    let by_alias = store
        .get_refs_by_type("LUMINAL", RefType::Alias)
        .await
        .unwrap();
    assert_eq!(by_alias, vec!["rxcui:8134"]);

    let by_assoc = store
        .get_refs_by_type("unii:yqe403bp4d", RefType::AssociatedWith)
        .await
        .unwrap();
    assert_eq!(by_assoc, vec!["rxcui:8134"]);

    // Terms registered under one type must not answer queries for another.
    let wrong_type = store
        .get_refs_by_type("luminal", RefType::TradeName)
        .await
        .unwrap();
    assert!(wrong_type.is_empty());
}

#[tokio::test]
async fn test_brand_backreferences() {
    let store = MemoryStore::new();
    store.add_rxnorm_brand("rxcui:2003", "rxcui:100").await.unwrap();

    let ids = store.get_rxnorm_ids_by_brand("RXCUI:2003").await.unwrap();
    assert_eq!(ids, vec!["rxcui:100"]);

    store.add_rxnorm_brand("rxcui:2003", "rxcui:200").await.unwrap();
    let ids = store.get_rxnorm_ids_by_brand("rxcui:2003").await.unwrap();
    assert_eq!(ids.len(), 2);
}

#[tokio::test]
async fn test_update_merge_ref_requires_record() {
    let store = MemoryStore::new();
    store.add_record(&sample_record()).await.unwrap();

    store
        .update_merge_ref("rxcui:8134", "rxcui:8134")
        .await
        .unwrap();
    let fetched = store.get_record_by_id("rxcui:8134").await.unwrap().unwrap();
    assert_eq!(fetched.merge_ref.as_deref(), Some("rxcui:8134"));

    let err = store
        .update_merge_ref("rxcui:9999", "rxcui:8134")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::RecordNotFound { concept_id } if concept_id == "rxcui:9999"
    ));
}

#[tokio::test]
async fn test_delete_normalized_leaves_identities() {
    let store = MemoryStore::new();
    store.add_record(&sample_record()).await.unwrap();
    store.add_merged_record(&sample_merged()).await.unwrap();

    assert!(store
        .get_merged_record("rxcui:8134")
        .await
        .unwrap()
        .is_some());

    store.delete_normalized_concepts().await.unwrap();

    assert!(store
        .get_merged_record("rxcui:8134")
        .await
        .unwrap()
        .is_none());
    assert!(store
        .get_record_by_id("rxcui:8134")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_get_all_concept_ids() {
    let store = MemoryStore::new();
    store.add_record(&sample_record()).await.unwrap();
    store
        .add_record(&DrugRecord::new("ncit:C739", SourceName::NcIt))
        .await
        .unwrap();

    let ids = store.get_all_concept_ids().await.unwrap();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains("rxcui:8134"));
    assert!(ids.contains("ncit:C739"));
}

#[tokio::test]
async fn test_scan_identity_records() {
    let store = MemoryStore::new();
    store.add_record(&sample_record()).await.unwrap();
    store
        .add_record(&DrugRecord::new("ncit:C739", SourceName::NcIt))
        .await
        .unwrap();

    let mut stream = store.scan_identity_records().await.unwrap();
    let mut seen = Vec::new();
    while let Some(record) = stream.next().await {
        seen.push(record.unwrap().concept_id);
    }
    seen.sort();
    assert_eq!(seen, vec!["ncit:C739", "rxcui:8134"]);
}

#[tokio::test]
async fn test_source_metadata_queryable_for_every_source() {
    let store = MemoryStore::new();
    for src in SourceName::all() {
        assert!(store.get_source_metadata(src).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn test_source_metadata_roundtrip() {
    let store = MemoryStore::new();
    assert!(store
        .get_source_metadata(SourceName::RxNorm)
        .await
        .unwrap()
        .is_none());

    let meta = SourceMeta {
        data_license: "UMLS Metathesaurus".to_string(),
        data_license_url: "https://www.nlm.nih.gov/research/umls/rxnorm/docs/termsofservice.html"
            .to_string(),
        version: "20240102".to_string(),
        data_url: None,
        last_updated: None,
    };
    store
        .add_source_metadata(SourceName::RxNorm, &meta)
        .await
        .unwrap();

    let fetched = store
        .get_source_metadata(SourceName::RxNorm)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched, meta);
}

#[tokio::test]
async fn test_surreal_store_roundtrip() {
    let dir = TempDir::new().unwrap();
    let store = SurrealStore::open(dir.path()).await.unwrap();

    assert!(store.check_schema_initialized().await.unwrap());
    assert!(!store.check_tables_populated().await.unwrap());

    store.add_record(&sample_record()).await.unwrap();

    let fetched = store.get_record_by_id("RXCUI:8134").await.unwrap().unwrap();
    assert_eq!(fetched.concept_id, "rxcui:8134");
    assert_eq!(fetched.label.as_deref(), Some("Phenobarbital"));

    let by_label = store
        .get_refs_by_type("Phenobarbital", RefType::Label)
        .await
        .unwrap();
    assert_eq!(by_label, vec!["rxcui:8134"]);

    store.add_merged_record(&sample_merged()).await.unwrap();
    let merged = store
        .get_merged_record("rxcui:8134")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(merged.merged_id, "rxcui:8134|ncit:C739");

    store
        .update_merge_ref("rxcui:8134", "rxcui:8134")
        .await
        .unwrap();
    let updated = store.get_record_by_id("rxcui:8134").await.unwrap().unwrap();
    assert_eq!(updated.merge_ref.as_deref(), Some("rxcui:8134"));

    let err = store
        .update_merge_ref("rxcui:9999", "rxcui:8134")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::RecordNotFound { .. }));

    store.delete_normalized_concepts().await.unwrap();
    assert!(store
        .get_merged_record("rxcui:8134")
        .await
        .unwrap()
        .is_none());
    assert!(store.check_tables_populated().await.unwrap());
}

#[tokio::test]
async fn test_populated_check() {
    let store = MemoryStore::new();
    assert!(!store.check_tables_populated().await.unwrap());
    store.add_record(&sample_record()).await.unwrap();
    assert!(store.check_tables_populated().await.unwrap());
}
