//! Sync endpoint: the handshake and the HTTP handler wrapping it.
//!
//! [`handshake::sync`] is the building block for applications that need
//! request-time checks (authentication, tenancy) before syncing.
//! [`handler::routes`] mounts a ready-made endpoint that syncs every
//! request.

pub mod handler;
pub mod handshake;

pub use handshake::{HandshakeParams, Synced, sync};
