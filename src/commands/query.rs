use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use super::{json_body, AppState};
use crate::db::schema::QueryResult;
use crate::error::GatewayError;
use crate::gateway::NaturalQueryResponse;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub sql: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NaturalQueryRequest {
    pub prompt: Option<String>,
}

pub async fn execute_query(
    State(gateway): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResult>, GatewayError> {
    let request = json_body(payload)?;
    Ok(Json(gateway.execute_query(&name, request.sql.as_deref()).await?))
}

pub async fn execute_natural_query(
    State(gateway): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<NaturalQueryRequest>, JsonRejection>,
) -> Result<Json<NaturalQueryResponse>, GatewayError> {
    let request = json_body(payload)?;
    Ok(Json(
        gateway
            .execute_natural_query(&name, request.prompt.as_deref())
            .await?,
    ))
}
