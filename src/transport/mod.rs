//! Wire transports: WebSocket and Server-Sent Events behind one interface.
//!
//! Each variant is built from the request side of the exchange and hands
//! back the HTTP response that establishes the channel. After that the
//! session only ever calls [`Transport::connect`] (once, on its own task)
//! and [`Transport::send`].

pub mod event_stream;
pub mod socket;

use std::fmt;

use serde::Serialize;

pub use event_stream::EventStreamTransport;
pub use socket::SocketTransport;

use crate::domain::Update;
use crate::error::TransportError;

/// The wire mechanism owned by a session.
#[derive(Debug)]
pub enum Transport {
    /// Full-duplex WebSocket.
    Socket(SocketTransport),
    /// One-way Server-Sent Events stream.
    EventStream(EventStreamTransport),
}

/// Which variant a [`Transport`] is, for logging and introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// See [`Transport::Socket`].
    Socket,
    /// See [`Transport::EventStream`].
    EventStream,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Socket => f.write_str("websocket"),
            Self::EventStream => f.write_str("event-stream"),
        }
    }
}

impl Transport {
    /// Returns the variant tag.
    #[must_use]
    pub const fn kind(&self) -> TransportKind {
        match self {
            Self::Socket(_) => TransportKind::Socket,
            Self::EventStream(_) => TransportKind::EventStream,
        }
    }

    /// Runs the channel until the peer goes away.
    ///
    /// Resolves only at the end of the connection. A clean close is `Ok`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the channel could not be established
    /// or failed while open.
    pub async fn connect(&self) -> Result<(), TransportError> {
        match self {
            Self::Socket(socket) => socket.connect().await,
            Self::EventStream(stream) => stream.connect().await,
        }
    }

    /// Serializes and delivers one update.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] after teardown, or the encode or
    /// write error.
    pub async fn send(&self, update: &Update) -> Result<(), TransportError> {
        match self {
            Self::Socket(socket) => socket.send(update).await,
            Self::EventStream(stream) => stream.send(update),
        }
    }
}
