//! # livesync
//!
//! Pushes live updates of an in-memory object to browser clients over a
//! WebSocket or a Server-Sent Events stream, chosen per request.
//!
//! This crate is the connection layer: it negotiates the protocol, picks
//! the transport, runs one task per connection and delivers the updates an
//! external synchronization engine hands it. A simple engine that pushes
//! whole snapshots ([`service::SyncState`]) is included.
//!
//! ## Architecture
//!
//! ```text
//! Browser (WebSocket | EventSource)
//!     │
//!     ├── Sync handler (sync/handler)
//!     ├── Handshake (sync/handshake)
//!     │       protocol tag, last version, transport selection
//!     │
//!     ├── Session (domain/session) ── one task per connection
//!     ├── Transport (transport/) ── socket | event stream
//!     │
//!     └── Syncable collaborator (domain/syncable, service/)
//! ```
//!
//! ## Handshake
//!
//! `GET /sync?p=v2&v=<last version>`; `Accept: text/event-stream` selects
//! the event stream, anything else must be a WebSocket upgrade.

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod sync;
pub mod transport;
