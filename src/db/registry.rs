use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::schema::{MetadataSnapshot, SchemaSnapshot};

/// A registered target database
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseRecord {
    #[serde(skip)]
    pub id: i64,
    pub name: String,
    pub url: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Durable store of registered databases and their schema snapshots.
///
/// Deleting a database removes all of its snapshots. `latest_metadata`
/// returns the snapshot written last, even when timestamps collide.
#[async_trait]
pub trait Registry: Send + Sync {
    /// All registered databases, most recently created first.
    async fn list_databases(&self) -> anyhow::Result<Vec<DatabaseRecord>>;

    async fn get_database(&self, name: &str) -> anyhow::Result<Option<DatabaseRecord>>;

    /// Insert a new record or update the URL of an existing one. `created_at`
    /// is preserved on update.
    async fn upsert_database(&self, name: &str, url: &str) -> anyhow::Result<DatabaseRecord>;

    /// Returns `false` when no record had that name.
    async fn delete_database(&self, name: &str) -> anyhow::Result<bool>;

    async fn save_metadata(
        &self,
        database_id: i64,
        schema: &SchemaSnapshot,
    ) -> anyhow::Result<MetadataSnapshot>;

    async fn latest_metadata(&self, database_id: i64) -> anyhow::Result<Option<MetadataSnapshot>>;
}
