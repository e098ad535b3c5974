//! Shared state injected into the sync handler.

use std::fmt;
use std::sync::Arc;

use crate::config::SyncConfig;

/// State available to the sync handler via Axum's `State` extractor.
///
/// Generic over the synchronized object so the same handler serves any
/// [`crate::domain::Syncable`].
pub struct AppState<S: ?Sized> {
    /// Object every accepted session is synchronized with.
    pub target: Arc<S>,
    /// Transport configuration, built once at startup.
    pub config: Arc<SyncConfig>,
}

impl<S: ?Sized> AppState<S> {
    /// Creates the state for `target`.
    #[must_use]
    pub fn new(target: Arc<S>, config: SyncConfig) -> Self {
        Self {
            target,
            config: Arc::new(config),
        }
    }
}

impl<S: ?Sized> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            target: Arc::clone(&self.target),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S: ?Sized> fmt::Debug for AppState<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
