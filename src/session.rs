use crate::config::ClusterConfig;
use crate::error::{Error, RequestError};
use crate::metrics_utils::{GaugeGuard, IN_FLIGHT, REQUEST_DURATION, SUBMITTED_TOTAL};
use crate::spawn;
use crate::time::wait_until;
use async_trait::async_trait;
use futures_channel::oneshot;
use futures_core::future::FusedFuture;
use metrics::{counter, histogram};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

const DRAIN_POLL: Duration = Duration::from_millis(1);

/// A connected handle capable of executing many requests at once.
///
/// This is the seam to the driver: implementations own the protocol,
/// connection pooling and any backpressure. `execute` is called
/// concurrently from many tasks through a shared reference.
#[async_trait]
pub trait Session: Send + Sync + 'static {
    /// The description of one unit of work.
    type Request: Send + 'static;
    /// What a successful request resolves to.
    type Payload: Send + 'static;
    /// What a failed request resolves to.
    type Error: fmt::Display + Send + Sync + 'static;

    /// Executes one request to completion.
    async fn execute(&self, request: Self::Request) -> Result<Self::Payload, Self::Error>;

    /// Stops accepting requests and waits for in-flight ones to finish.
    async fn close(&self) {}
}

/// Opens sessions against a cluster.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Session: Session;

    /// Connects to the hosts in `config` and binds the session to `keyspace`.
    async fn connect(
        &self,
        config: &ClusterConfig,
        keyspace: &str,
    ) -> Result<Self::Session, <Self::Session as Session>::Error>;
}

/// A cheaply cloneable, shared handle to a connected [`Session`].
///
/// Clones share a count of submitted requests that have not finished yet,
/// which [`close`](SessionHandle::close) drains.
pub struct SessionHandle<S: Session> {
    session: Arc<S>,
    submitted: Arc<AtomicUsize>,
}

impl<S: Session> Clone for SessionHandle<S> {
    fn clone(&self) -> Self {
        SessionHandle {
            session: self.session.clone(),
            submitted: self.submitted.clone(),
        }
    }
}

impl<S: Session> fmt::Debug for SessionHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("handles", &Arc::strong_count(&self.session))
            .field("unfinished", &self.unfinished())
            .finish()
    }
}

impl<S: Session> SessionHandle<S> {
    /// Wraps an already connected session.
    pub fn new(session: S) -> Self {
        SessionHandle {
            session: Arc::new(session),
            submitted: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Opens a session with `connector`, blocking the caller until it is
    /// usable.
    #[tracing::instrument(skip(connector, config), fields(contact_points = ?config.contact_points()))]
    pub async fn connect<C>(
        connector: &C,
        config: &ClusterConfig,
        keyspace: &str,
    ) -> Result<Self, Error<S::Error>>
    where
        C: Connector<Session = S>,
    {
        match connector.connect(config, keyspace).await {
            Ok(session) => {
                tracing::debug!("session connected");
                Ok(SessionHandle::new(session))
            }
            Err(e) => {
                tracing::error!(error = %e, "connect failed");
                Err(Error::Connect(e))
            }
        }
    }

    /// The session this handle points at.
    pub fn session(&self) -> &S {
        &self.session
    }

    /// Requests submitted through any clone of this handle that have not
    /// finished yet, whether or not they have started.
    pub fn unfinished(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    /// Starts `request` on the runtime and returns immediately.
    ///
    /// Never blocks. Whatever goes wrong with the request itself is
    /// delivered through the returned handle.
    ///
    /// # Panics
    ///
    /// Panics when called outside the runtime selected by feature, e.g.
    /// outside a Tokio runtime with the `tokio` feature.
    pub fn execute_async(&self, request: S::Request) -> PendingHandle<S::Payload, S::Error> {
        let (tx, rx) = oneshot::channel();
        let session = self.session.clone();
        let unfinished = Unfinished::submit(&self.submitted);
        counter!(SUBMITTED_TOTAL).increment(1);
        spawn(async move {
            let _unfinished = unfinished;
            let _in_flight = GaugeGuard::increment(IN_FLIGHT);
            let started = Instant::now();
            let result = session.execute(request).await;
            histogram!(REQUEST_DURATION).record(started.elapsed().as_secs_f64());
            // The receiver is gone if collection was aborted. Nothing to do.
            let _ = tx.send(result);
        });
        PendingHandle { rx: Some(rx) }
    }

    /// Executes `request` and waits for it. Used for one-off statements such
    /// as schema bootstrap.
    pub async fn execute(&self, request: S::Request) -> Result<S::Payload, RequestError<S::Error>> {
        self.execute_async(request).await
    }

    /// Closes the session.
    ///
    /// Every request submitted before the call runs to completion first,
    /// including those whose task has not started yet. Then the session
    /// itself is closed.
    pub async fn close(self) {
        let submitted = &self.submitted;
        wait_until(DRAIN_POLL, || submitted.load(Ordering::SeqCst) == 0).await;
        self.session.close().await;
        log::debug!("session closed");
    }
}

/// One submitted request that has not finished. Released when its task ends,
/// including by panic, or when the task could not be spawned.
struct Unfinished(Arc<AtomicUsize>);

impl Unfinished {
    fn submit(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Unfinished(count.clone())
    }
}

impl Drop for Unfinished {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One in-flight request.
///
/// Awaiting the handle consumes it, so it resolves exactly once. Dropping it
/// without awaiting releases it; the request itself still runs to completion.
#[must_use = "a pending handle does nothing unless awaited or collected"]
pub struct PendingHandle<P, E> {
    rx: Option<oneshot::Receiver<Result<P, E>>>,
}

#[cfg(test)]
impl<P, E> PendingHandle<P, E> {
    pub(crate) fn resolved(result: Result<P, E>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        PendingHandle { rx: Some(rx) }
    }

    pub(crate) fn orphaned() -> Self {
        let (_, rx) = oneshot::channel();
        PendingHandle { rx: Some(rx) }
    }
}

impl<P, E> fmt::Debug for PendingHandle<P, E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PendingHandle")
            .field("resolved", &self.rx.is_none())
            .finish()
    }
}

impl<P, E> Future for PendingHandle<P, E> {
    type Output = Result<P, RequestError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let rx = match self.rx.as_mut() {
            Some(rx) => rx,
            None => panic!("PendingHandle polled after completion"),
        };
        let outcome = match Pin::new(rx).poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Ok(Ok(payload))) => Ok(payload),
            Poll::Ready(Ok(Err(e))) => Err(RequestError::Session(e)),
            Poll::Ready(Err(oneshot::Canceled)) => Err(RequestError::Canceled),
        };
        self.rx = None;
        Poll::Ready(outcome)
    }
}

impl<P, E> FusedFuture for PendingHandle<P, E> {
    fn is_terminated(&self) -> bool {
        self.rx.is_none()
    }
}
