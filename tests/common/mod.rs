//! Shared fixtures for the integration tests.

#![allow(dead_code, clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use livesync::app_state::AppState;
use livesync::config::{EventStreamConfig, SyncConfig};
use livesync::domain::{Session, SyncHandle, Syncable};
use livesync::error::CollaboratorError;
use livesync::sync::handler;

/// Collaborator that records every call made by the handshake.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    pub syncs: Arc<AtomicUsize>,
    pub sessions: Arc<Mutex<Vec<Session>>>,
    pub reject: bool,
}

impl Recorder {
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn sync_count(&self) -> usize {
        self.syncs.load(Ordering::SeqCst)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Waits for the first registered session.
    pub async fn first_session(&self) -> Session {
        let found = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(session) = self.sessions.lock().await.first().cloned() {
                    return session;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        let Ok(session) = found else {
            panic!("no session was registered");
        };
        session
    }
}

#[async_trait]
impl Syncable for Recorder {
    type Handle = Self;

    async fn sync(&self) -> Result<Self::Handle, CollaboratorError> {
        self.syncs.fetch_add(1, Ordering::SeqCst);
        Ok(self.clone())
    }
}

#[async_trait]
impl SyncHandle for Recorder {
    async fn subscribe(&self, session: Session) -> Result<(), CollaboratorError> {
        if self.reject {
            return Err(CollaboratorError::Rejected("subscriber limit reached".to_string()));
        }
        self.sessions.lock().await.push(session);
        Ok(())
    }
}

/// Sync config without keep-alive comments or compression, so streams
/// carry nothing but events.
pub fn quiet_config() -> SyncConfig {
    SyncConfig {
        event_stream: EventStreamConfig {
            gzip: false,
            keep_alive: None,
        },
        ..SyncConfig::default()
    }
}

/// Serves the sync endpoint for `target` at `/sync` on an ephemeral port.
pub async fn serve<S: Syncable>(target: S, config: SyncConfig) -> SocketAddr {
    let app = handler::routes("/sync", AppState::new(Arc::new(target), config));
    let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
        panic!("cannot bind test listener");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("listener has no address");
    };
    tokio::spawn(async move {
        let _ = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await;
    });
    addr
}

/// Awaits `session.wait()` with a deadline.
pub async fn wait_disconnect(session: &Session) {
    if tokio::time::timeout(Duration::from_secs(5), session.wait())
        .await
        .is_err()
    {
        panic!("session {} did not disconnect", session.id());
    }
}
