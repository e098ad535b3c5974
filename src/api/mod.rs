//! Auxiliary HTTP API mounted next to the sync endpoint.

pub mod handlers;

use axum::Router;
use serde::Serialize;

use crate::service::SyncState;

/// Builds the API router for the given synchronized object.
pub fn build_router<T>(state: SyncState<T>) -> Router
where
    T: Serialize + Send + Sync + 'static,
{
    Router::new()
        .merge(handlers::system::routes::<T>())
        .with_state(state)
}
