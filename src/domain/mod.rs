//! Domain layer: sessions, updates and the collaborator seam.
//!
//! A [`Session`] is one transport-agnostic client connection. The
//! synchronization engine that decides what to push is reached through the
//! [`Syncable`] and [`SyncHandle`] traits and talks back to clients with
//! [`Update`]s.

pub mod session;
pub mod syncable;
pub mod update;

pub use session::Session;
pub use syncable::{SyncHandle, Syncable};
pub use update::Update;
