//! Collaborator seam between the handshake and the synchronization engine.
//!
//! The handshake calls [`Syncable::sync`] once, then
//! [`SyncHandle::subscribe`] once on the returned handle, for every
//! accepted request. Any error fails the handshake.

use async_trait::async_trait;

use super::Session;
use crate::error::CollaboratorError;

/// An object whose state can be synchronized to clients.
#[async_trait]
pub trait Syncable: Send + Sync + 'static {
    /// Handle through which sessions are registered for pushes.
    type Handle: SyncHandle;

    /// Prepares the object for synchronization and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns a [`CollaboratorError`] if the object cannot be synchronized.
    async fn sync(&self) -> Result<Self::Handle, CollaboratorError>;
}

/// Registry of sessions that receive future updates.
#[async_trait]
pub trait SyncHandle: Send + Sync {
    /// Registers `session` for future pushes.
    ///
    /// # Errors
    ///
    /// Returns a [`CollaboratorError`] if the session cannot be registered.
    async fn subscribe(&self, session: Session) -> Result<(), CollaboratorError>;
}
