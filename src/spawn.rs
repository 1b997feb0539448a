use std::future::Future;

/// Spawns a new asynchronous task on the selected runtime.
///
/// Requests submitted by the dispatcher run through here, so they make
/// progress on the runtime's workers while the caller keeps submitting.
pub fn spawn<T>(task: T)
where
    T: Future + Send + 'static,
    T::Output: Send + 'static,
{
    spawn::spawn(task);
}

#[cfg(all(feature = "tokio", not(feature = "async-std")))]
mod spawn {
    use std::future::Future;

    pub fn spawn<T>(task: T)
    where
        T: Future + Send + 'static,
        T::Output: Send + 'static,
    {
        tokio::spawn(task);
    }
}

#[cfg(feature = "async-std")]
mod spawn {
    pub use async_std::task::spawn;
}
