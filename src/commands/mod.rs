//! HTTP surface of the gateway.

pub mod connection;
pub mod query;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::error::GatewayError;
use crate::gateway::Gateway;

/// State shared by every handler
pub type AppState = Arc<Gateway>;

/// Build the axum router with all routes
pub fn router(gateway: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(connection::health))
        .route("/api/v1/dbs", get(connection::list_databases))
        .route(
            "/api/v1/dbs/{name}",
            get(connection::get_database)
                .put(connection::put_database)
                .delete(connection::delete_database),
        )
        .route("/api/v1/dbs/{name}/query", post(query::execute_query))
        .route(
            "/api/v1/dbs/{name}/query/natural",
            post(query::execute_natural_query),
        )
        .layer(middleware::from_fn(log_requests))
        .layer(cors)
        .with_state(gateway)
}

async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    log::info!(
        "{} {} -> {} ({}ms)",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

/// Unwrap a JSON body, reporting malformed input as `INVALID_REQUEST`.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, GatewayError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| GatewayError::InvalidRequest(rejection.body_text()))
}
