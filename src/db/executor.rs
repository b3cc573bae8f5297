//! Runs guarded SQL against a target on a short-lived connection.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::db::connection_string::{parse_connection_url, ConnectionStringError};
use crate::db::connectors::{self, ConnectorFactory};
use crate::db::schema::QueryResult;
use crate::security::{GuardError, SqlGuard};

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    InvalidConnection(#[from] ConnectionStringError),

    #[error("Query execution failed: {0}")]
    QueryExecutionFailed(String),
}

/// Timeouts applied to each execution
#[derive(Debug, Clone, Copy)]
pub struct ExecutorTimeouts {
    pub connect: Duration,
    pub query: Duration,
}

pub struct QueryExecutor {
    factory: Arc<dyn ConnectorFactory>,
    guard: SqlGuard,
    timeouts: ExecutorTimeouts,
}

impl QueryExecutor {
    pub fn new(factory: Arc<dyn ConnectorFactory>, guard: SqlGuard, timeouts: ExecutorTimeouts) -> Self {
        Self {
            factory,
            guard,
            timeouts,
        }
    }

    /// Guard `raw_sql`, run it against `url` and normalize the rows.
    pub async fn execute(&self, url: &str, raw_sql: &str) -> Result<QueryResult, ExecutorError> {
        let parsed = self.guard.parse_sql(raw_sql)?;
        let descriptor = parse_connection_url(url)?;

        let connector = connectors::open(self.factory.as_ref(), &descriptor, self.timeouts.connect)
            .await
            .map_err(|e| ExecutorError::QueryExecutionFailed(format!("{:#}", e)))?;

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeouts.query, connector.execute_query(&parsed.sql)).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        connectors::close(connector).await;

        let rows = match outcome {
            Ok(Ok(rows)) => rows,
            Ok(Err(e)) => return Err(ExecutorError::QueryExecutionFailed(format!("{:#}", e))),
            Err(_) => {
                return Err(ExecutorError::QueryExecutionFailed(format!(
                    "Query timed out after {}s",
                    self.timeouts.query.as_secs()
                )))
            }
        };

        log::info!(
            "Query on {} returned {} rows in {}ms",
            descriptor.address(),
            rows.len(),
            elapsed_ms
        );
        Ok(QueryResult::from_rows(rows, elapsed_ms))
    }
}
