//! Server-sent events stream of live samples.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use std::convert::Infallible;
use tracing::{debug, info, instrument, warn};

use crate::server::ServerState;

/// Handler for the /process/updates endpoint.
///
/// Each published sample becomes one `data: <json>` event. The stream ends
/// when the run is cancelled or the broker drops this viewer; the viewer is
/// unregistered when the stream is dropped.
#[instrument(skip(state))]
pub async fn updates_handler(State(state): State<ServerState>) -> Response {
    let mut subscription = match state.broker.register().await {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!("Rejecting viewer: {}", e);
            return (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response();
        }
    };
    info!(viewer = subscription.id(), "Viewer connected");

    let token = state.token.clone();
    let stream = async_stream::stream! {
        loop {
            let next = tokio::select! {
                _ = token.cancelled() => None,
                payload = subscription.recv() => payload,
            };
            match next {
                Some(payload) => yield Ok::<Event, Infallible>(Event::default().data(&*payload)),
                None => break,
            }
        }
        debug!(viewer = subscription.id(), "Viewer stream ended");
    };

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        Sse::new(stream).keep_alive(KeepAlive::default()),
    )
        .into_response()
}
