//! One client connection, independent of the wire transport.
//!
//! A [`Session`] is created connected by the handshake. Its transport's
//! connect loop runs on a dedicated task; when that loop ends, for any
//! reason, a drop guard marks the session disconnected and releases every
//! [`Session::wait`] caller. There is no separate "connecting" state.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::Update;
use crate::error::TransportError;
use crate::transport::{Transport, TransportKind};

/// Handle to a live (or finished) client connection.
///
/// Cheap to clone; all clones observe the same state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: String,
    connected: AtomicBool,
    established_at: DateTime<Utc>,
    version: u64,
    closed: watch::Sender<bool>,
    transport: Transport,
}

impl Session {
    /// Creates a connected session owning `transport`.
    pub(crate) fn new(id: String, version: u64, transport: Transport) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            inner: Arc::new(SessionInner {
                id,
                connected: AtomicBool::new(true),
                established_at: Utc::now(),
                version,
                closed,
                transport,
            }),
        }
    }

    /// Remote address of the peer at handshake time.
    ///
    /// Not unique behind shared proxies; do not treat it as an identity
    /// for authorization.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Returns `true` until the transport loop has exited.
    ///
    /// Advisory only: the peer may be gone already.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Last version of the object the client reported having.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version
    }

    /// When the handshake created this session.
    #[must_use]
    pub fn established_at(&self) -> DateTime<Utc> {
        self.inner.established_at
    }

    /// Which wire transport carries this session.
    #[must_use]
    pub fn transport(&self) -> TransportKind {
        self.inner.transport.kind()
    }

    /// Returns `true` if both handles refer to the same session.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Waits until the session has disconnected.
    ///
    /// Returns immediately if it already has. Any number of tasks may wait
    /// at once.
    pub async fn wait(&self) {
        let mut closed = self.inner.closed.subscribe();
        // The sender lives in `inner`, which `self` keeps alive.
        let _ = closed.wait_for(|closed| *closed).await;
    }

    /// Delivers one update to the client.
    ///
    /// Updates sent through one session reach the wire in call order.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] once the transport is torn down,
    /// or the underlying write/encode error.
    pub async fn send(&self, update: &Update) -> Result<(), TransportError> {
        self.inner.transport.send(update).await
    }

    /// Runs the transport's connect loop on its own task.
    ///
    /// The session flips to disconnected when the task finishes, fails,
    /// panics or is aborted.
    pub(crate) fn spawn_connect(&self) -> JoinHandle<()> {
        let guard = DisconnectGuard {
            inner: Arc::clone(&self.inner),
        };
        tokio::spawn(async move {
            let guard = guard;
            let inner = &guard.inner;
            match inner.transport.connect().await {
                Ok(()) => {
                    tracing::debug!(
                        session = %inner.id,
                        transport = %inner.transport.kind(),
                        "transport closed"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        session = %inner.id,
                        transport = %inner.transport.kind(),
                        error = %err,
                        "connection error"
                    );
                }
            }
        })
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("connected", &self.is_connected())
            .field("established_at", &self.inner.established_at)
            .field("version", &self.inner.version)
            .field("transport", &self.inner.transport.kind())
            .finish()
    }
}

/// Marks the session disconnected when dropped.
struct DisconnectGuard {
    inner: Arc<SessionInner>,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        self.inner.connected.store(false, Ordering::Release);
        self.inner.closed.send_replace(true);
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use tokio_test::{assert_pending, assert_ready};

    use super::*;
    use crate::config::EventStreamConfig;
    use crate::transport::EventStreamTransport;

    /// Builds a session over an event stream; dropping the returned
    /// response ends the stream.
    fn stream_session(version: u64) -> (Session, axum::response::Response) {
        let (transport, response) = EventStreamTransport::open(&EventStreamConfig::default());
        let session = Session::new(
            "127.0.0.1:5000".to_string(),
            version,
            Transport::EventStream(transport),
        );
        (session, response)
    }

    async fn wait_with_timeout(session: &Session) {
        if tokio::time::timeout(Duration::from_secs(5), session.wait())
            .await
            .is_err()
        {
            panic!("session did not disconnect");
        }
    }

    #[tokio::test]
    async fn new_session_is_connected() {
        let (session, _response) = stream_session(3);
        assert!(session.is_connected());
        assert_eq!(session.id(), "127.0.0.1:5000");
        assert_eq!(session.version(), 3);
        assert_eq!(session.transport(), TransportKind::EventStream);
    }

    #[tokio::test]
    async fn wait_blocks_until_transport_ends() {
        let (session, response) = stream_session(0);
        let _task = session.spawn_connect();

        let mut waiter = tokio_test::task::spawn(session.wait());
        assert_pending!(waiter.poll());

        drop(response);
        wait_with_timeout(&session).await;

        assert!(waiter.is_woken());
        assert_ready!(waiter.poll());
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn wait_after_disconnect_returns_immediately() {
        let (session, response) = stream_session(0);
        let task = session.spawn_connect();
        drop(response);
        let Ok(()) = task.await else {
            panic!("connect task failed");
        };

        let mut waiter = tokio_test::task::spawn(session.wait());
        assert_ready!(waiter.poll());
        let mut again = tokio_test::task::spawn(session.wait());
        assert_ready!(again.poll());
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn concurrent_waiters_all_release() {
        let (session, response) = stream_session(0);
        let _task = session.spawn_connect();

        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let session = session.clone();
                tokio::spawn(async move { session.wait().await })
            })
            .collect();
        tokio::task::yield_now().await;
        drop(response);

        for waiter in waiters {
            let Ok(Ok(())) = tokio::time::timeout(Duration::from_secs(5), waiter).await else {
                panic!("waiter did not finish");
            };
        }
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn aborted_connect_task_still_disconnects() {
        let (session, _response) = stream_session(0);
        let task = session.spawn_connect();
        task.abort();
        wait_with_timeout(&session).await;
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn send_after_teardown_fails_fast() {
        let (session, response) = stream_session(0);
        let _task = session.spawn_connect();
        drop(response);
        wait_with_timeout(&session).await;

        let update = Update::full(1, serde_json::json!({}));
        let result = tokio::time::timeout(Duration::from_secs(1), session.send(&update)).await;
        let Ok(Err(TransportError::Closed)) = result else {
            panic!("expected a prompt Closed error");
        };
    }

    #[tokio::test]
    async fn clones_are_the_same_session() {
        let (session, _response) = stream_session(0);
        let (other, _other_response) = stream_session(0);
        assert!(session.same(&session.clone()));
        assert!(!session.same(&other));
    }
}
