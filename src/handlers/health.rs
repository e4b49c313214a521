//! Health check endpoint handler.
//!
//! Returns a short plain-text status with the number of connected viewers.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, instrument};

use crate::server::ServerState;

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<ServerState>) -> impl IntoResponse {
    debug!("Processing /health request");

    let (status, body) = match state.broker.subscriber_count().await {
        Ok(viewers) => (StatusCode::OK, format!("OK\n\nviewers: {viewers}\n")),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, format!("{e}\n")),
    };

    debug!("Health check: {}", status);
    (status, [("Content-Type", "text/plain; charset=utf-8")], body)
}
