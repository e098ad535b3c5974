//! Reference synchronization engine: pushes whole snapshots of an object.
//!
//! [`SyncState`] owns the object, the last published snapshot and the
//! subscriber list. Every mutation goes through [`SyncState::update`], which
//! re-serializes the object and, if it changed, publishes a new version.
//! Publishing never touches the network: each subscriber has its own
//! forwarding task that writes the newest snapshot to its session. A slow
//! client only falls behind on its own task and skips straight to the latest
//! version once it catches up, so versions still arrive in increasing order.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, watch};

use crate::domain::{Session, SyncHandle, Syncable, Update};
use crate::error::CollaboratorError;

/// An object synchronized to every subscribed session.
///
/// Cheap to clone; clones share the object and the subscribers.
pub struct SyncState<T> {
    inner: Arc<StateInner<T>>,
}

struct StateInner<T> {
    value: RwLock<T>,
    /// Last published snapshot. Version 0 means nothing was published yet.
    published: watch::Sender<Update>,
    sessions: Mutex<Vec<Session>>,
}

impl<T> SyncState<T>
where
    T: Serialize + Send + Sync + 'static,
{
    /// Wraps `value` for synchronization.
    #[must_use]
    pub fn new(value: T) -> Self {
        let (published, _) = watch::channel(Update::full(0, serde_json::Value::Null));
        Self {
            inner: Arc::new(StateInner {
                value: RwLock::new(value),
                published,
                sessions: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Mutates the object and pushes the result.
    ///
    /// Returns whatever `f` returns.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Serialize`] if the mutated object cannot
    /// be serialized; the mutation itself is kept.
    pub async fn update<F, R>(&self, f: F) -> Result<R, CollaboratorError>
    where
        F: FnOnce(&mut T) -> R,
    {
        let result = {
            let mut value = self.inner.value.write().await;
            f(&mut value)
        };
        self.push().await?;
        Ok(result)
    }

    /// Publishes the current object if it changed since the last push.
    ///
    /// Returns the version after the push. Delivery happens on the
    /// subscribers' own tasks; this never waits on a client.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Serialize`] if the object cannot be
    /// serialized.
    pub async fn push(&self) -> Result<u64, CollaboratorError> {
        // Holding the read guard until the snapshot is committed keeps a
        // stale serialization from overwriting a newer one.
        let value = self.inner.value.read().await;
        let body = serde_json::to_value(&*value)?;

        let mut version = 0;
        let changed = self.inner.published.send_if_modified(|current| {
            let changed = current.version == 0 || current.body != body;
            if changed {
                current.version += 1;
                current.body = body;
            }
            version = current.version;
            changed
        });
        drop(value);

        if changed {
            tracing::trace!(version, "published update");
        }
        Ok(version)
    }

    /// Runs `f` with shared access to the object.
    pub async fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let value = self.inner.value.read().await;
        f(&value)
    }

    /// Version of the last published snapshot (0 before the first sync).
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.published.borrow().version
    }

    /// Number of registered sessions, including ones that disconnected
    /// but whose forwarding task has not noticed yet.
    pub async fn subscriber_count(&self) -> usize {
        self.inner.sessions.lock().await.len()
    }

    /// Removes `session` from the subscriber list. Returns `true` if it was
    /// there.
    ///
    /// The session's forwarding task keeps running until the session
    /// disconnects.
    pub async fn unsubscribe(&self, session: &Session) -> bool {
        let mut sessions = self.inner.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|s| !s.same(session));
        sessions.len() != before
    }

    /// Writes every newly published snapshot to `session` until it
    /// disconnects or a write fails, then releases it.
    async fn forward(self, session: Session, mut published: watch::Receiver<Update>) {
        loop {
            tokio::select! {
                () = session.wait() => break,
                changed = published.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            let update = published.borrow_and_update().clone();
            if let Err(err) = session.send(&update).await {
                tracing::warn!(session = %session.id(), error = %err, "dropping subscriber");
                break;
            }
        }

        if self.unsubscribe(&session).await {
            tracing::debug!(session = %session.id(), "subscriber released");
        }
    }
}

impl<T> Clone for SyncState<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for SyncState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncState")
            .field("version", &self.inner.published.borrow().version)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T> Syncable for SyncState<T>
where
    T: Serialize + Send + Sync + 'static,
{
    type Handle = Self;

    /// Publishes version 1 on first use.
    async fn sync(&self) -> Result<Self::Handle, CollaboratorError> {
        if self.version() == 0 {
            self.push().await?;
        }
        Ok(self.clone())
    }
}

#[async_trait]
impl<T> SyncHandle for SyncState<T>
where
    T: Serialize + Send + Sync + 'static,
{
    /// Sends the current snapshot unless the client already has this exact
    /// version, then registers the session until it disconnects.
    async fn subscribe(&self, session: Session) -> Result<(), CollaboratorError> {
        let mut published = self.inner.published.subscribe();
        let current = published.borrow_and_update().clone();
        if session.version() != current.version {
            session.send(&current).await.map_err(|err| {
                CollaboratorError::Rejected(format!("initial update failed: {err}"))
            })?;
        }
        self.inner.sessions.lock().await.push(session.clone());

        tokio::spawn(self.clone().forward(session, published));
        Ok(())
    }
}
