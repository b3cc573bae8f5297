use std::sync::Arc;
use std::time::Duration;

use crate::db::connection_string::ConnectionDescriptor;
use crate::db::connectors::{self, ConnectorFactory, DatabaseConnector, RawColumn};
use crate::db::schema::{ColumnMetadata, KeyRole, SchemaSnapshot, TableKind, TableMetadata};

/// Reads the tables, views and columns of a target database into a
/// [`SchemaSnapshot`].
pub struct MetadataIntrospector {
    factory: Arc<dyn ConnectorFactory>,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl MetadataIntrospector {
    /// `read_timeout` bounds the whole catalog read, all relations included.
    pub fn new(factory: Arc<dyn ConnectorFactory>, connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            factory,
            connect_timeout,
            read_timeout,
        }
    }

    /// Open one connection, read the schema and close the connection on every
    /// exit path.
    pub async fn introspect(&self, descriptor: &ConnectionDescriptor) -> anyhow::Result<SchemaSnapshot> {
        let connector =
            connectors::open(self.factory.as_ref(), descriptor, self.connect_timeout).await?;
        let qualify = descriptor.database.is_none();
        let outcome = tokio::time::timeout(self.read_timeout, read_schema(connector.as_ref(), qualify)).await;
        connectors::close(connector).await;

        let snapshot = match outcome {
            Ok(result) => result?,
            Err(_) => anyhow::bail!(
                "Timed out reading schema of {} after {}s",
                descriptor.address(),
                self.read_timeout.as_secs()
            ),
        };
        log::info!(
            "Introspected {}: {} tables, {} views",
            descriptor.address(),
            snapshot.tables.len(),
            snapshot.views.len()
        );
        Ok(snapshot)
    }
}

async fn read_schema(
    connector: &dyn DatabaseConnector,
    qualify: bool,
) -> anyhow::Result<SchemaSnapshot> {
    let mut snapshot = SchemaSnapshot::default();

    for relation in connector.list_relations().await? {
        let Some(kind) = TableKind::from_table_type(&relation.table_type) else {
            continue;
        };
        let columns = connector
            .list_columns(&relation.schema, &relation.name)
            .await?
            .into_iter()
            .map(normalize_column)
            .collect();

        let name = if qualify {
            format!("{}.{}", relation.schema, relation.name)
        } else {
            relation.name
        };
        let table = TableMetadata {
            name,
            kind,
            columns,
        };
        match kind {
            TableKind::Table => snapshot.tables.push(table),
            TableKind::View => snapshot.views.push(table),
        }
    }

    Ok(snapshot)
}

/// Map a raw `INFORMATION_SCHEMA.COLUMNS` row onto the metadata model.
pub fn normalize_column(raw: RawColumn) -> ColumnMetadata {
    let column_type = raw
        .column_type
        .filter(|t| !t.is_empty())
        .or(raw.data_type)
        .unwrap_or_default();

    ColumnMetadata {
        name: raw.name,
        column_type,
        nullable: raw.is_nullable == "YES",
        default: raw.default,
        key_role: KeyRole::from_column_key(raw.column_key.as_deref().unwrap_or_default()),
    }
}
