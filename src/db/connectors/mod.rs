pub mod mysql;

use std::time::Duration;

use crate::db::connection_string::ConnectionDescriptor;
use crate::db::schema::Row;
use anyhow::anyhow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A table or view as listed by `INFORMATION_SCHEMA.TABLES`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationInfo {
    pub schema: String,
    pub name: String,
    /// Raw `TABLE_TYPE`, e.g. `BASE TABLE` or `VIEW`
    pub table_type: String,
}

/// A column as listed by `INFORMATION_SCHEMA.COLUMNS`, before normalization
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawColumn {
    pub name: String,
    pub data_type: Option<String>,
    pub column_type: Option<String>,
    pub is_nullable: String,
    pub default: Option<String>,
    pub column_key: Option<String>,
}

/// The core trait that all target connectors must implement
#[async_trait]
pub trait DatabaseConnector: Send + Sync {
    /// Connect to the database
    async fn connect(&mut self) -> anyhow::Result<()>;

    /// Disconnect from the database
    async fn disconnect(&mut self) -> anyhow::Result<()>;

    /// Check if the connection is active
    async fn is_connected(&self) -> bool;

    /// Round-trip to the server to prove the session is usable
    async fn ping(&self) -> anyhow::Result<()>;

    /// List base tables and views in scope for this connection.
    ///
    /// With a default database that is `DATABASE()`, otherwise every
    /// non-system schema.
    async fn list_relations(&self) -> anyhow::Result<Vec<RelationInfo>>;

    /// List the columns of one relation in ordinal order
    async fn list_columns(&self, schema: &str, relation: &str) -> anyhow::Result<Vec<RawColumn>>;

    /// Execute a raw query and return results
    async fn execute_query(&self, query: &str) -> anyhow::Result<Vec<Row>>;
}

/// Builds an unconnected connector for a descriptor
pub trait ConnectorFactory: Send + Sync {
    fn create(&self, descriptor: &ConnectionDescriptor) -> Box<dyn DatabaseConnector>;
}

/// Factory for live MySQL connections
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlConnectorFactory;

impl ConnectorFactory for MySqlConnectorFactory {
    fn create(&self, descriptor: &ConnectionDescriptor) -> Box<dyn DatabaseConnector> {
        Box::new(mysql::MySqlConnector::new(descriptor.clone()))
    }
}

/// Create and connect a connector, giving up after `timeout`.
pub async fn open(
    factory: &dyn ConnectorFactory,
    descriptor: &ConnectionDescriptor,
    timeout: Duration,
) -> anyhow::Result<Box<dyn DatabaseConnector>> {
    let mut connector = factory.create(descriptor);
    match tokio::time::timeout(timeout, connector.connect()).await {
        Ok(Ok(())) => Ok(connector),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(anyhow!(
            "Timed out connecting to {} after {}s",
            descriptor.address(),
            timeout.as_secs()
        )),
    }
}

/// Close a connector, logging instead of failing.
pub async fn close(mut connector: Box<dyn DatabaseConnector>) {
    if let Err(e) = connector.disconnect().await {
        log::warn!("Failed to close target connection: {}", e);
    }
}

/// Connect, ping and disconnect. Used to vet a URL before it is registered.
pub async fn probe(
    factory: &dyn ConnectorFactory,
    descriptor: &ConnectionDescriptor,
    timeout: Duration,
) -> anyhow::Result<()> {
    let connector = open(factory, descriptor, timeout).await?;
    let outcome = match tokio::time::timeout(timeout, connector.ping()).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!("Timed out pinging {}", descriptor.address())),
    };
    close(connector).await;
    outcome
}
