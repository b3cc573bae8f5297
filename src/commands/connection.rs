use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{json_body, AppState};
use crate::db::registry::DatabaseRecord;
use crate::error::GatewayError;
use crate::gateway::DatabaseMetadataView;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DatabaseList {
    pub databases: Vec<DatabaseRecord>,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus { status: "ok" })
}

pub async fn list_databases(State(gateway): State<AppState>) -> Result<Json<DatabaseList>, GatewayError> {
    let databases = gateway.list_databases().await?;
    Ok(Json(DatabaseList { databases }))
}

/// Register a database or replace its URL.
pub async fn put_database(
    State(gateway): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<DatabaseRecord>, GatewayError> {
    let request = json_body(payload)?;
    let record = gateway.register(&name, request.url.as_deref()).await?;
    Ok(Json(record))
}

pub async fn get_database(
    State(gateway): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<DatabaseMetadataView>, GatewayError> {
    Ok(Json(gateway.get_metadata(&name).await?))
}

pub async fn delete_database(
    State(gateway): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, GatewayError> {
    gateway.delete(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
