//! Orchestrates registration, metadata reads, direct queries and natural
//! language queries over injected collaborators.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::db::connection_string::{mask_password, parse_connection_url};
use crate::db::connectors::{self, ConnectorFactory};
use crate::db::executor::{ExecutorTimeouts, QueryExecutor};
use crate::db::introspector::MetadataIntrospector;
use crate::db::registry::{DatabaseRecord, Registry};
use crate::db::schema::{QueryResult, TableMetadata};
use crate::db::translator::{NaturalLanguageTranslator, TranslateError};
use crate::error::GatewayError;
use crate::security::{validate_database_name, GuardError, SqlGuard};

/// Latest schema snapshot of a registered database, as served to callers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseMetadataView {
    pub name: String,
    pub tables: Vec<TableMetadata>,
    pub views: Vec<TableMetadata>,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NaturalQueryResponse {
    pub sql: String,
    pub result: QueryResult,
}

/// Limits shared by every outbound operation
#[derive(Debug, Clone, Copy)]
pub struct GatewaySettings {
    pub guard: SqlGuard,
    pub connect_timeout: Duration,
    pub query_timeout: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            guard: SqlGuard::default(),
            connect_timeout: Duration::from_secs(10),
            query_timeout: Duration::from_secs(30),
        }
    }
}

pub struct Gateway {
    registry: Arc<dyn Registry>,
    factory: Arc<dyn ConnectorFactory>,
    introspector: MetadataIntrospector,
    executor: QueryExecutor,
    translator: NaturalLanguageTranslator,
    connect_timeout: Duration,
}

impl Gateway {
    pub fn new(
        registry: Arc<dyn Registry>,
        factory: Arc<dyn ConnectorFactory>,
        translator: NaturalLanguageTranslator,
        settings: GatewaySettings,
    ) -> Self {
        let timeouts = ExecutorTimeouts {
            connect: settings.connect_timeout,
            query: settings.query_timeout,
        };
        Self {
            introspector: MetadataIntrospector::new(
                factory.clone(),
                settings.connect_timeout,
                settings.query_timeout,
            ),
            executor: QueryExecutor::new(factory.clone(), settings.guard, timeouts),
            registry,
            factory,
            translator,
            connect_timeout: settings.connect_timeout,
        }
    }

    pub async fn list_databases(&self) -> Result<Vec<DatabaseRecord>, GatewayError> {
        Ok(self.registry.list_databases().await?)
    }

    /// Register `name` or point it at a new URL.
    ///
    /// The URL must answer a live connection test before anything is stored.
    /// A schema snapshot is taken afterwards; if that fails the record is kept
    /// and the failure is only logged.
    pub async fn register(&self, name: &str, url: Option<&str>) -> Result<DatabaseRecord, GatewayError> {
        validate_database_name(name)?;
        let url = url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| GatewayError::InvalidConnection("URL is required".to_string()))?;
        let descriptor = parse_connection_url(url.trim())
            .map_err(|e| GatewayError::InvalidConnection(e.to_string()))?;

        if let Err(e) = connectors::probe(self.factory.as_ref(), &descriptor, self.connect_timeout).await {
            log::warn!("Connection test for {} ({}) failed: {:#}", name, mask_password(url), e);
            return Err(GatewayError::InvalidConnection(
                "Failed to connect to MySQL database".to_string(),
            ));
        }

        let record = self.registry.upsert_database(name, url).await?;
        log::info!("Registered database {} -> {}", name, mask_password(url));

        match self.introspector.introspect(&descriptor).await {
            Ok(schema) => {
                self.registry.save_metadata(record.id, &schema).await?;
            }
            Err(e) => {
                log::warn!("Failed to fetch metadata for {}: {:#}", name, e);
            }
        }

        Ok(record)
    }

    pub async fn get_metadata(&self, name: &str) -> Result<DatabaseMetadataView, GatewayError> {
        let record = self.find(name).await?;
        let snapshot = self
            .registry
            .latest_metadata(record.id)
            .await?
            .ok_or(GatewayError::MetadataNotFound)?;

        Ok(DatabaseMetadataView {
            name: record.name,
            tables: snapshot.tables,
            views: snapshot.views,
            updated_at: snapshot.updated_at,
        })
    }

    /// Unregister `name`, dropping its snapshots with it.
    pub async fn delete(&self, name: &str) -> Result<(), GatewayError> {
        if self.registry.delete_database(name).await? {
            log::info!("Unregistered database {}", name);
            Ok(())
        } else {
            Err(GatewayError::DatabaseNotFound)
        }
    }

    pub async fn execute_query(&self, name: &str, sql: Option<&str>) -> Result<QueryResult, GatewayError> {
        let record = self.find(name).await?;
        let sql = sql.ok_or(GatewayError::InvalidSql(GuardError::SqlRequired))?;
        Ok(self.executor.execute(&record.url, sql).await?)
    }

    /// Translate `prompt` into SQL against the latest snapshot, then run it.
    pub async fn execute_natural_query(
        &self,
        name: &str,
        prompt: Option<&str>,
    ) -> Result<NaturalQueryResponse, GatewayError> {
        let record = self.find(name).await?;
        let prompt = prompt
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| GatewayError::InvalidRequest("Prompt is required".to_string()))?;
        if !self.translator.is_configured() {
            return Err(TranslateError::NotConfigured.into());
        }

        let snapshot = self
            .registry
            .latest_metadata(record.id)
            .await?
            .ok_or(GatewayError::MetadataNotFound)?;

        let sql = self.translator.translate(prompt, &snapshot.schema()).await?;
        let result = self.executor.execute(&record.url, &sql).await.map_err(|e| {
            GatewayError::QueryFailed(format!(
                "Generated SQL execution failed: {}. Generated SQL: {}",
                e, sql
            ))
        })?;

        Ok(NaturalQueryResponse { sql, result })
    }

    async fn find(&self, name: &str) -> Result<DatabaseRecord, GatewayError> {
        self.registry
            .get_database(name)
            .await?
            .ok_or(GatewayError::DatabaseNotFound)
    }
}
