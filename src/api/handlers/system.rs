//! System endpoints: health check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::config::PROTOCOL;
use crate::service::SyncState;

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    protocol: &'static str,
    state_version: u64,
    subscribers: usize,
}

/// `GET /health` — Service health, protocol tag and subscriber count.
pub async fn health_handler<T>(State(state): State<SyncState<T>>) -> impl IntoResponse
where
    T: Serialize + Send + Sync + 'static,
{
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            protocol: PROTOCOL,
            state_version: state.version(),
            subscribers: state.subscriber_count().await,
        }),
    )
}

/// System routes mounted at the root level.
pub fn routes<T>() -> Router<SyncState<T>>
where
    T: Serialize + Send + Sync + 'static,
{
    Router::new().route("/health", get(health_handler::<T>))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn health_reports_state() {
        let state = SyncState::new(serde_json::json!({ "count": 1 }));
        let Ok(_) = state.push().await else {
            panic!("push failed");
        };
        let app = routes::<serde_json::Value>().with_state(state);

        let Ok(request) = Request::builder().uri("/health").body(Body::empty()) else {
            panic!("valid request");
        };
        let Ok(response) = app.oneshot(request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let Ok(bytes) = to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body should be readable");
        };
        let Ok(body) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
            panic!("body should be json");
        };
        assert_eq!(body.get("status"), Some(&serde_json::json!("healthy")));
        assert_eq!(body.get("protocol"), Some(&serde_json::json!("v2")));
        assert_eq!(body.get("state_version"), Some(&serde_json::json!(1)));
        assert_eq!(body.get("subscribers"), Some(&serde_json::json!(0)));
    }
}
