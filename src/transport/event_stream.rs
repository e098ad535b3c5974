//! Server-Sent Events transport.
//!
//! The session publishes into an unbounded queue; the receiving end is the
//! body of the `text/event-stream` response. The stream ends when hyper
//! drops the body, which is what [`EventStreamTransport::connect`] waits
//! for.

use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::config::EventStreamConfig;
use crate::domain::Update;
use crate::error::TransportError;

/// Name of the event channel every update is published on.
pub const EVENT_NAME: &str = "events";

/// Publishing side of one client's event stream.
#[derive(Debug)]
pub struct EventStreamTransport {
    publisher: mpsc::UnboundedSender<Update>,
}

impl EventStreamTransport {
    /// Creates the transport and the streaming response that feeds the
    /// client.
    pub fn open(config: &EventStreamConfig) -> (Self, Response) {
        let (publisher, listener) = mpsc::unbounded_channel();
        let events = UnboundedReceiverStream::new(listener).map(|update| to_event(&update));

        let sse = Sse::new(events);
        let response = match config.keep_alive {
            Some(interval) => sse
                .keep_alive(KeepAlive::new().interval(interval))
                .into_response(),
            None => sse.into_response(),
        };

        (Self { publisher }, response)
    }

    /// Resolves once the response stream has been dropped.
    ///
    /// # Errors
    ///
    /// Never fails; the stream has no error of its own to report.
    pub async fn connect(&self) -> Result<(), TransportError> {
        self.publisher.closed().await;
        Ok(())
    }

    /// Queues one update for the listener.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] once the stream has ended.
    pub fn send(&self, update: &Update) -> Result<(), TransportError> {
        self.publisher
            .send(update.clone())
            .map_err(|_| TransportError::Closed)
    }
}

fn to_event(update: &Update) -> Result<Event, axum::Error> {
    Event::default()
        .event(EVENT_NAME)
        .id(update.version.to_string())
        .json_data(update)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::body::to_bytes;
    use axum::http::header::CONTENT_TYPE;

    use super::*;

    fn without_keep_alive() -> EventStreamConfig {
        EventStreamConfig {
            gzip: false,
            keep_alive: None,
        }
    }

    #[tokio::test]
    async fn response_is_an_event_stream() {
        let (_transport, response) = EventStreamTransport::open(&without_keep_alive());
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        assert_eq!(content_type, Some("text/event-stream"));
    }

    #[tokio::test]
    async fn updates_become_named_events_in_order() {
        let (transport, response) = EventStreamTransport::open(&without_keep_alive());
        let Ok(()) = transport.send(&Update::full(1, serde_json::json!({ "n": 1 }))) else {
            panic!("first send failed");
        };
        let Ok(()) = transport.send(&Update::full(2, serde_json::json!({ "n": 2 }))) else {
            panic!("second send failed");
        };
        drop(transport);

        let Ok(bytes) = to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body should be readable");
        };
        let Ok(text) = std::str::from_utf8(&bytes) else {
            panic!("body should be utf-8");
        };
        assert_eq!(
            text,
            "event: events\nid: 1\ndata: {\"version\":1,\"body\":{\"n\":1}}\n\n\
             event: events\nid: 2\ndata: {\"version\":2,\"body\":{\"n\":2}}\n\n"
        );
    }

    #[tokio::test]
    async fn connect_returns_when_response_is_dropped() {
        let (transport, response) = EventStreamTransport::open(&without_keep_alive());
        drop(response);
        let Ok(Ok(())) =
            tokio::time::timeout(std::time::Duration::from_secs(5), transport.connect()).await
        else {
            panic!("connect should return once the stream is gone");
        };
    }

    #[tokio::test]
    async fn send_after_stream_end_is_closed() {
        let (transport, response) = EventStreamTransport::open(&without_keep_alive());
        drop(response);
        let Err(TransportError::Closed) = transport.send(&Update::full(1, serde_json::Value::Null))
        else {
            panic!("send on a dropped stream must fail");
        };
    }
}
