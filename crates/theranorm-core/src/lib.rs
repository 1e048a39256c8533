pub mod config;
pub mod database;
pub mod merge;
pub mod schemas;

pub use config::Config;
pub use database::{DrugStore, MemoryStore, StoreError, SurrealStore};
pub use merge::{Merge, MergeError, MergeStats};
pub use schemas::{DrugRecord, HasIndication, MergedRecord, RefType, SourceMeta, SourceName};
