//! WebSocket transport.
//!
//! The upgrade callback hands the socket to [`SocketTransport::connect`],
//! which publishes the write half for [`SocketTransport::send`] and then
//! drains inbound frames until the peer leaves. The protocol is push-only:
//! inbound data is read but never interpreted.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, oneshot};

use crate::config::SocketConfig;
use crate::domain::Update;
use crate::error::TransportError;

/// Server side of one WebSocket connection.
pub struct SocketTransport {
    upgraded: Mutex<Option<oneshot::Receiver<WebSocket>>>,
    writer: Mutex<WriteHalf>,
    torn_down: AtomicBool,
}

/// Writer lifecycle. Frames sent before the upgrade completes are queued
/// and flushed, in order, ahead of anything sent later.
enum WriteHalf {
    Pending(Vec<Message>),
    Open(SplitSink<WebSocket, Message>),
    Closed,
}

impl WriteHalf {
    const fn label(&self) -> &'static str {
        match self {
            Self::Pending(_) => "pending",
            Self::Open(_) => "open",
            Self::Closed => "closed",
        }
    }
}

impl SocketTransport {
    /// Accepts the upgrade and returns the `101 Switching Protocols`
    /// response.
    ///
    /// The socket becomes available to [`Self::connect`] once hyper has
    /// sent the response and taken over the connection.
    pub fn upgrade(ws: WebSocketUpgrade, config: &SocketConfig) -> (Self, Response) {
        let (handoff, upgraded) = oneshot::channel();
        let transport = Self::from_handoff(upgraded);
        let response = ws
            .read_buffer_size(config.read_buffer_size)
            .write_buffer_size(config.write_buffer_size)
            .on_failed_upgrade(|err: axum::Error| {
                tracing::warn!(error = %err, "websocket upgrade failed");
            })
            .on_upgrade(move |socket| async move {
                if handoff.send(socket).is_err() {
                    tracing::debug!("websocket upgraded after its session was dropped");
                }
            });
        (transport, response)
    }

    fn from_handoff(upgraded: oneshot::Receiver<WebSocket>) -> Self {
        Self {
            upgraded: Mutex::new(Some(upgraded)),
            writer: Mutex::new(WriteHalf::Pending(Vec::new())),
            torn_down: AtomicBool::new(false),
        }
    }

    /// Runs the connection until the peer closes it.
    ///
    /// Once this returns, fails, panics or is cancelled, every later
    /// [`Self::send`] fails with [`TransportError::Closed`].
    ///
    /// # Errors
    ///
    /// - [`TransportError::Upgrade`] if the socket never arrived.
    /// - [`TransportError::Socket`] on a read error, or a write error while
    ///   flushing queued updates.
    /// - [`TransportError::Closed`] if called more than once.
    pub async fn connect(&self) -> Result<(), TransportError> {
        let upgraded = self.upgraded.lock().await.take();
        let Some(upgraded) = upgraded else {
            return Err(TransportError::Closed);
        };
        let _teardown = Teardown(&self.torn_down);

        let Ok(socket) = upgraded.await else {
            self.close().await;
            return Err(TransportError::Upgrade(
                "connection dropped before the upgrade completed".to_string(),
            ));
        };

        let (mut sink, stream) = socket.split();
        {
            let mut writer = self.writer.lock().await;
            let WriteHalf::Pending(queued) = std::mem::replace(&mut *writer, WriteHalf::Closed)
            else {
                return Err(TransportError::Closed);
            };
            for message in queued {
                sink.send(message).await?;
            }
            *writer = WriteHalf::Open(sink);
        }
        tracing::trace!("websocket open");

        let result = drain(stream).await;
        self.close().await;
        result
    }

    /// Writes one update as a single JSON text frame.
    ///
    /// Holds the write lock for the whole frame, so concurrent callers never
    /// interleave.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] after teardown,
    /// [`TransportError::Encode`] if the update cannot be serialized, or
    /// [`TransportError::Socket`] if the write fails.
    pub async fn send(&self, update: &Update) -> Result<(), TransportError> {
        let message = Message::text(update.to_json()?);
        let mut writer = self.writer.lock().await;
        if self.torn_down.load(Ordering::Acquire) {
            *writer = WriteHalf::Closed;
            return Err(TransportError::Closed);
        }
        match &mut *writer {
            WriteHalf::Pending(queued) => {
                queued.push(message);
                Ok(())
            }
            WriteHalf::Open(sink) => sink.send(message).await.map_err(TransportError::from),
            WriteHalf::Closed => Err(TransportError::Closed),
        }
    }

    async fn close(&self) {
        let mut writer = self.writer.lock().await;
        if let WriteHalf::Open(mut sink) = std::mem::replace(&mut *writer, WriteHalf::Closed)
            && let Err(err) = sink.close().await
        {
            tracing::debug!(error = %err, "websocket close failed");
        }
    }
}

impl fmt::Debug for SocketTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self
            .writer
            .try_lock()
            .map_or("busy", |writer| writer.label());
        f.debug_struct("SocketTransport")
            .field("writer", &state)
            .finish_non_exhaustive()
    }
}

/// Marks the transport torn down when the connect loop exits by any path.
struct Teardown<'a>(&'a AtomicBool);

impl Drop for Teardown<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Reads until a Close frame, end of stream or a read error.
async fn drain(mut stream: SplitStream<WebSocket>) -> Result<(), TransportError> {
    while let Some(frame) = stream.next().await {
        if let Message::Close(close) = frame? {
            tracing::trace!(?close, "peer closed websocket");
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn sends_queue_until_the_upgrade_arrives() {
        let (_handoff, upgraded) = oneshot::channel();
        let transport = SocketTransport::from_handoff(upgraded);

        let Ok(()) = transport.send(&Update::full(1, serde_json::Value::Null)).await else {
            panic!("send before the upgrade should queue");
        };
        assert_eq!(format!("{transport:?}"), r#"SocketTransport { writer: "pending", .. }"#);
    }

    #[tokio::test]
    async fn cancelled_connect_closes_the_writer() {
        let (_handoff, upgraded) = oneshot::channel();
        let transport = Arc::new(SocketTransport::from_handoff(upgraded));

        let task = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move { transport.connect().await })
        };
        tokio::task::yield_now().await;
        task.abort();
        let Err(err) = task.await else {
            panic!("connect cannot finish without an upgrade");
        };
        assert!(err.is_cancelled());

        let sent = transport.send(&Update::full(1, serde_json::Value::Null)).await;
        let Err(TransportError::Closed) = sent else {
            panic!("send after a cancelled connect must fail, got {sent:?}");
        };
        assert_eq!(format!("{transport:?}"), r#"SocketTransport { writer: "closed", .. }"#);
    }

    #[tokio::test]
    async fn dropped_handoff_fails_connect() {
        let (handoff, upgraded) = oneshot::channel::<WebSocket>();
        let transport = SocketTransport::from_handoff(upgraded);
        drop(handoff);

        let Err(TransportError::Upgrade(_)) = transport.connect().await else {
            panic!("connect must fail when the upgrade never happens");
        };
        let Err(TransportError::Closed) = transport.connect().await else {
            panic!("second connect must fail");
        };
        let Err(TransportError::Closed) =
            transport.send(&Update::full(1, serde_json::Value::Null)).await
        else {
            panic!("send after a failed upgrade must fail");
        };
    }
}
