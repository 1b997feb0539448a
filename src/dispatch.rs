use crate::session::{PendingHandle, Session, SessionHandle};
use std::fmt;

/// Submits a batch of requests without waiting on any of them.
pub struct Dispatcher<S: Session> {
    session: SessionHandle<S>,
}

impl<S: Session> Dispatcher<S> {
    pub fn new(session: SessionHandle<S>) -> Self {
        Self { session }
    }

    /// Hands every request to the session and returns their handles.
    ///
    /// The handle at position `i` of the result belongs to the `i`th request
    /// yielded by `requests`. This never suspends.
    pub fn dispatch<I>(&self, requests: I) -> PendingBatch<S::Payload, S::Error>
    where
        I: IntoIterator<Item = S::Request>,
    {
        let requests = requests.into_iter();
        let mut handles = Vec::with_capacity(requests.size_hint().0);
        for request in requests {
            handles.push(self.session.execute_async(request));
        }
        log::debug!("dispatched {} requests", handles.len());
        PendingBatch { handles }
    }
}

impl<S: Session> fmt::Debug for Dispatcher<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("session", &self.session)
            .finish()
    }
}

/// Handles of a dispatched batch, in submission order.
#[must_use = "a dispatched batch should be collected"]
pub struct PendingBatch<P, E> {
    handles: Vec<PendingHandle<P, E>>,
}

impl<P, E> PendingBatch<P, E> {
    /// Number of requests submitted.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub(crate) fn into_handles(self) -> Vec<PendingHandle<P, E>> {
        self.handles
    }
}

/// Yields the handles in submission order, for callers that want to await
/// them one by one.
impl<P, E> IntoIterator for PendingBatch<P, E> {
    type Item = PendingHandle<P, E>;
    type IntoIter = std::vec::IntoIter<PendingHandle<P, E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.handles.into_iter()
    }
}

impl<P, E> From<Vec<PendingHandle<P, E>>> for PendingBatch<P, E> {
    fn from(handles: Vec<PendingHandle<P, E>>) -> Self {
        Self { handles }
    }
}

impl<P, E> fmt::Debug for PendingBatch<P, E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PendingBatch")
            .field("len", &self.handles.len())
            .finish()
    }
}
