//! Turns one inbound request into one live [`Session`], or rejects it.
//!
//! The handshake validates the protocol tag, reads the client's last known
//! version, picks a transport from the `Accept` header, launches the
//! session's connect loop and registers the session with the
//! synchronization collaborator. Every failure is a [`SyncError`], which
//! renders itself as the HTTP response for the client.

use std::net::SocketAddr;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, FromRequestParts, Query, Request};
use axum::http::HeaderMap;
use axum::http::header::{ACCEPT, ORIGIN};
use axum::http::request::Parts;
use axum::response::Response;
use serde::Deserialize;

use crate::config::{PROTOCOL, SyncConfig};
use crate::domain::{Session, SyncHandle, Syncable};
use crate::error::SyncError;
use crate::transport::{EventStreamTransport, SocketTransport, Transport};

/// Media type that selects the event-stream transport.
pub const EVENT_STREAM_MEDIA_TYPE: &str = "text/event-stream";

/// Outcome of a successful handshake.
///
/// `response` must be returned to the client: it is the upgrade (or
/// stream) that brings the session's transport to life. Dropping it tears
/// the session down.
#[derive(Debug)]
pub struct Synced {
    /// The new session, already registered with the collaborator.
    pub session: Session,
    /// Response establishing the transport.
    pub response: Response,
}

/// Handshake parameters carried in the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeParams {
    /// Protocol tag (`p`), if present.
    pub protocol: Option<String>,
    /// Last version the client has (`v`); 0 when absent or malformed.
    pub version: u64,
}

#[derive(Debug, Default, Deserialize)]
struct RawParams {
    p: Option<String>,
    v: Option<String>,
}

impl HandshakeParams {
    /// Reads the parameters from a request's parts.
    ///
    /// Never fails: an unreadable query yields no protocol tag and
    /// version 0.
    #[must_use]
    pub fn from_parts(parts: &Parts) -> Self {
        let raw = Query::<RawParams>::try_from_uri(&parts.uri)
            .map(|Query(raw)| raw)
            .unwrap_or_default();
        let version = raw
            .v
            .as_deref()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);
        Self {
            protocol: raw.p,
            version,
        }
    }

    /// Checks the protocol tag against [`PROTOCOL`].
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ProtocolMismatch`] if the tag is absent or
    /// different.
    pub fn check_protocol(&self) -> Result<(), SyncError> {
        if self.protocol.as_deref() == Some(PROTOCOL) {
            Ok(())
        } else {
            Err(SyncError::ProtocolMismatch {
                expected: PROTOCOL,
                found: self.protocol.clone(),
            })
        }
    }
}

/// Returns `true` if the `Accept` header asks for an event stream.
#[must_use]
pub fn wants_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|range| range.split(';').next())
        .any(|media| media.trim().eq_ignore_ascii_case(EVENT_STREAM_MEDIA_TYPE))
}

/// Identity of the peer: its remote address, when the server exposes it.
fn remote_id(parts: &Parts) -> String {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |ConnectInfo(addr)| addr.to_string())
}

/// Performs the handshake for `request` against `target`.
///
/// On success the session is connected, its connect loop is running on its
/// own task and `target` has registered it. The caller must send
/// [`Synced::response`] back to the client.
///
/// # Errors
///
/// - [`SyncError::ProtocolMismatch`] if `p` is not [`PROTOCOL`]; nothing is
///   created.
/// - [`SyncError::Upgrade`] if the WebSocket upgrade is invalid or the
///   origin is not allowed.
/// - [`SyncError::Collaborator`] if `target` fails to sync or subscribe.
pub async fn sync<S>(target: &S, config: &SyncConfig, request: Request) -> Result<Synced, SyncError>
where
    S: Syncable + ?Sized,
{
    let (mut parts, _body) = request.into_parts();

    let params = HandshakeParams::from_parts(&parts);
    params.check_protocol()?;

    let (transport, response) = if wants_event_stream(&parts.headers) {
        let (transport, response) = EventStreamTransport::open(&config.event_stream);
        (Transport::EventStream(transport), response)
    } else {
        let ws = WebSocketUpgrade::from_request_parts(&mut parts, &())
            .await
            .map_err(|rejection| SyncError::Upgrade(rejection.to_string()))?;
        let origin = parts.headers.get(ORIGIN).and_then(|v| v.to_str().ok());
        if !config.socket.origin.allows(origin) {
            return Err(SyncError::Upgrade(format!(
                "origin {} is not allowed",
                origin.unwrap_or("(none)")
            )));
        }
        let (transport, response) = SocketTransport::upgrade(ws, &config.socket);
        (Transport::Socket(transport), response)
    };

    let handle = target.sync().await?;

    let session = Session::new(remote_id(&parts), params.version, transport);
    tracing::debug!(
        session = %session.id(),
        transport = %session.transport(),
        version = session.version(),
        "session created"
    );
    session.spawn_connect();

    handle.subscribe(session.clone()).await?;

    Ok(Synced { session, response })
}
