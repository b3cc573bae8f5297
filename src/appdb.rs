use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::db::registry::{DatabaseRecord, Registry};
use crate::db::schema::{MetadataSnapshot, SchemaSnapshot};

const SCHEMA_SQL: &str = include_str!("../appdb/schema.sql");

/// File name of the registry database inside the data directory.
pub const APP_DB_FILE: &str = "db_query.db";

/// Embedded registry database for connection records and schema snapshots.
pub struct AppDatabase {
    conn: Arc<Mutex<Connection>>,
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DatabaseRecord> {
    Ok(DatabaseRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

impl AppDatabase {
    /// Initialize the registry at the given data directory.
    /// Creates the DB file if it doesn't exist, then runs schema DDL.
    pub fn init(data_dir: PathBuf) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

        let db_path = data_dir.join(APP_DB_FILE);

        let conn = Connection::open(&db_path).context("Failed to open registry database")?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to set WAL mode")?;

        let db = Self::with_connection(conn)?;
        log::info!("Registry database initialized at {:?}", db_path);
        Ok(db)
    }

    /// A registry that lives only as long as the process. Used by tests.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .context("Failed to enable foreign keys")?;
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to apply schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl Registry for AppDatabase {
    async fn list_databases(&self) -> anyhow::Result<Vec<DatabaseRecord>> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let c = conn.lock().map_err(|e| anyhow!("Lock error: {}", e))?;
            let mut stmt = c
                .prepare(
                    "SELECT id, name, url, created_at, updated_at FROM databases \
                     ORDER BY created_at DESC, id DESC",
                )
                .context("Failed to prepare databases query")?;

            let rows = stmt
                .query_map([], record_from_row)
                .context("Failed to query databases")?
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read database row")?;

            Ok(rows)
        })
        .await
        .context("spawn_blocking join error")?
    }

    async fn get_database(&self, name: &str) -> anyhow::Result<Option<DatabaseRecord>> {
        let conn = self.conn.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || {
            let c = conn.lock().map_err(|e| anyhow!("Lock error: {}", e))?;
            c.query_row(
                "SELECT id, name, url, created_at, updated_at FROM databases WHERE name = ?1",
                rusqlite::params![name],
                record_from_row,
            )
            .optional()
            .context("Failed to get database")
        })
        .await
        .context("spawn_blocking join error")?
    }

    async fn upsert_database(&self, name: &str, url: &str) -> anyhow::Result<DatabaseRecord> {
        let conn = self.conn.clone();
        let name = name.to_string();
        let url = url.to_string();
        tokio::task::spawn_blocking(move || {
            let c = conn.lock().map_err(|e| anyhow!("Lock error: {}", e))?;
            c.query_row(
                "INSERT INTO databases (name, url, created_at, updated_at) VALUES (?1, ?2, ?3, ?3) \
                 ON CONFLICT(name) DO UPDATE SET url = excluded.url, updated_at = excluded.updated_at \
                 RETURNING id, name, url, created_at, updated_at",
                rusqlite::params![name, url, now()],
                record_from_row,
            )
            .context("Failed to upsert database")
        })
        .await
        .context("spawn_blocking join error")?
    }

    async fn delete_database(&self, name: &str) -> anyhow::Result<bool> {
        let conn = self.conn.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || {
            let c = conn.lock().map_err(|e| anyhow!("Lock error: {}", e))?;
            let removed = c
                .execute("DELETE FROM databases WHERE name = ?1", rusqlite::params![name])
                .context("Failed to delete database")?;
            Ok(removed > 0)
        })
        .await
        .context("spawn_blocking join error")?
    }

    async fn save_metadata(
        &self,
        database_id: i64,
        schema: &SchemaSnapshot,
    ) -> anyhow::Result<MetadataSnapshot> {
        let conn = self.conn.clone();
        let payload = serde_json::to_string(schema).context("Failed to serialize metadata")?;
        let schema = schema.clone();
        tokio::task::spawn_blocking(move || {
            let c = conn.lock().map_err(|e| anyhow!("Lock error: {}", e))?;
            let updated_at = now();
            c.execute(
                "INSERT INTO metadata (database_id, metadata, updated_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![database_id, payload, updated_at],
            )
            .context("Failed to save metadata")?;
            Ok(MetadataSnapshot {
                database_id,
                tables: schema.tables,
                views: schema.views,
                updated_at,
            })
        })
        .await
        .context("spawn_blocking join error")?
    }

    async fn latest_metadata(&self, database_id: i64) -> anyhow::Result<Option<MetadataSnapshot>> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let c = conn.lock().map_err(|e| anyhow!("Lock error: {}", e))?;
            let row: Option<(String, String)> = c
                .query_row(
                    "SELECT metadata, updated_at FROM metadata WHERE database_id = ?1 \
                     ORDER BY updated_at DESC, id DESC LIMIT 1",
                    rusqlite::params![database_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
                .context("Failed to get latest metadata")?;

            let Some((payload, updated_at)) = row else {
                return Ok(None);
            };
            let schema: SchemaSnapshot =
                serde_json::from_str(&payload).context("Stored metadata is not valid JSON")?;
            Ok(Some(MetadataSnapshot {
                database_id,
                tables: schema.tables,
                views: schema.views,
                updated_at,
            }))
        })
        .await
        .context("spawn_blocking join error")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::{ColumnMetadata, KeyRole, TableKind, TableMetadata};

    fn temp_db() -> AppDatabase {
        let dir = tempfile::tempdir().unwrap();
        AppDatabase::init(dir.keep()).unwrap()
    }

    fn sample_schema(table: &str) -> SchemaSnapshot {
        SchemaSnapshot {
            tables: vec![TableMetadata {
                name: table.into(),
                kind: TableKind::Table,
                columns: vec![ColumnMetadata {
                    name: "id".into(),
                    column_type: "int".into(),
                    nullable: false,
                    default: None,
                    key_role: KeyRole::Primary,
                }],
            }],
            views: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let db = temp_db();
        let created = db.upsert_database("shop", "mysql://u:p@localhost/shop").await.unwrap();
        assert_eq!(created.name, "shop");
        assert_eq!(created.created_at, created.updated_at);

        let fetched = db.get_database("shop").await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert!(db.get_database("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_updates_url_and_keeps_created_at() {
        let db = AppDatabase::open_in_memory().unwrap();
        let first = db.upsert_database("shop", "mysql://localhost/a").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = db.upsert_database("shop", "mysql://localhost/b").await.unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.url, "mysql://localhost/b");
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);
        assert_eq!(db.list_databases().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let db = AppDatabase::open_in_memory().unwrap();
        db.upsert_database("older", "mysql://localhost/a").await.unwrap();
        db.upsert_database("newer", "mysql://localhost/b").await.unwrap();

        let names: Vec<String> = db
            .list_databases()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["newer", "older"]);
    }

    #[tokio::test]
    async fn test_delete_cascades_metadata() {
        let db = temp_db();
        let record = db.upsert_database("shop", "mysql://localhost/shop").await.unwrap();
        db.save_metadata(record.id, &sample_schema("orders")).await.unwrap();

        assert!(db.delete_database("shop").await.unwrap());
        assert!(db.get_database("shop").await.unwrap().is_none());
        assert!(db.latest_metadata(record.id).await.unwrap().is_none());
        assert!(!db.delete_database("shop").await.unwrap());
    }

    #[tokio::test]
    async fn test_latest_metadata_wins() {
        let db = AppDatabase::open_in_memory().unwrap();
        let record = db.upsert_database("shop", "mysql://localhost/shop").await.unwrap();
        assert!(db.latest_metadata(record.id).await.unwrap().is_none());

        db.save_metadata(record.id, &sample_schema("first")).await.unwrap();
        let saved = db.save_metadata(record.id, &sample_schema("second")).await.unwrap();

        let latest = db.latest_metadata(record.id).await.unwrap().unwrap();
        assert_eq!(latest, saved);
        assert_eq!(latest.tables[0].name, "second");
        assert_eq!(latest.schema(), sample_schema("second"));
    }

    #[tokio::test]
    async fn test_metadata_rejects_unknown_database() {
        let db = AppDatabase::open_in_memory().unwrap();
        assert!(db.save_metadata(42, &SchemaSnapshot::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap().keep();
        {
            let db = AppDatabase::init(dir.clone()).unwrap();
            db.upsert_database("shop", "mysql://localhost/shop").await.unwrap();
        }
        let db = AppDatabase::init(dir).unwrap();
        assert!(db.get_database("shop").await.unwrap().is_some());
    }
}
