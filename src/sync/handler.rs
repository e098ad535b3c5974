//! Axum handler that syncs every incoming request.

use axum::Router;
use axum::extract::{Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{Extensions, HeaderMap, StatusCode, Version};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tower_http::compression::CompressionLayer;

use super::handshake::{self, EVENT_STREAM_MEDIA_TYPE, Synced};
use crate::app_state::AppState;
use crate::domain::Syncable;

/// `GET <sync path>` — WebSocket upgrade or event stream.
///
/// Logs the connect, returns the transport response, and logs the
/// disconnect from a watcher task once the session ends. Handshake
/// failures are logged and answered with the error response.
pub async fn sync_handler<S>(State(state): State<AppState<S>>, request: Request) -> Response
where
    S: Syncable,
{
    match handshake::sync(state.target.as_ref(), &state.config, request).await {
        Ok(Synced { session, response }) => {
            tracing::info!(session = %session.id(), transport = %session.transport(), "connect");
            tokio::spawn(async move {
                session.wait().await;
                tracing::info!(
                    session = %session.id(),
                    transport = %session.transport(),
                    uptime_secs = (chrono::Utc::now() - session.established_at()).num_seconds(),
                    "disconnect"
                );
            });
            response
        }
        Err(err) => {
            tracing::warn!(error = %err, "sync handshake failed");
            err.into_response()
        }
    }
}

/// Builds a router serving [`sync_handler`] at `path`.
///
/// Event-stream responses are gzip-compressed when enabled in the config
/// and accepted by the client.
pub fn routes<S>(path: &str, state: AppState<S>) -> Router
where
    S: Syncable,
{
    let gzip = state.config.event_stream.gzip;
    let router = Router::new()
        .route(path, get(sync_handler::<S>))
        .with_state(state);

    if gzip {
        router.layer(CompressionLayer::new().compress_when(is_event_stream))
    } else {
        router
    }
}

/// Compression predicate: only event streams are worth compressing here.
fn is_event_stream(
    _status: StatusCode,
    _version: Version,
    headers: &HeaderMap,
    _extensions: &Extensions,
) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with(EVENT_STREAM_MEDIA_TYPE))
}
