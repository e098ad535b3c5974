//! livesync demo server.
//!
//! Synchronizes a ticking clock to every connected browser over WebSocket
//! or Server-Sent Events.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use chrono::Utc;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use livesync::api;
use livesync::app_state::AppState;
use livesync::config::GatewayConfig;
use livesync::service::SyncState;
use livesync::sync::handler;

/// The object synchronized to clients.
#[derive(Debug, Default, Serialize)]
struct Clock {
    time: String,
    count: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = GatewayConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(addr = %config.listen_addr, path = %config.sync_path, "starting livesync");

    // Build the synchronized object
    let clock = SyncState::new(Clock::default());
    tokio::spawn(tick(
        clock.clone(),
        Duration::from_millis(config.tick_interval_ms.max(1)),
    ));

    // Build router
    let sync_state = AppState::new(Arc::new(clock.clone()), config.sync_config());
    let app = Router::new()
        .merge(api::build_router(clock))
        .merge(handler::routes(&config.sync_path, sync_state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        );

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Advances the clock forever.
async fn tick(clock: SyncState<Clock>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let result = clock
            .update(|c| {
                c.count += 1;
                c.time = Utc::now().to_rfc3339();
            })
            .await;
        if let Err(err) = result {
            tracing::warn!(error = %err, "cannot publish clock");
        }
    }
}
