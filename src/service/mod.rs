//! Service layer: the bundled synchronization engine.
//!
//! [`SyncState`] implements the collaborator traits from
//! [`crate::domain`] by pushing whole snapshots of a serializable object.

pub mod sync_state;

pub use sync_state::SyncState;
