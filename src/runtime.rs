//! A batteries included runtime for programs driving batches.
//! Volley does not implement a runtime, it wraps the one selected by feature.
//!
//! The worker threads of the runtime play the role of the driver's io
//! threads: every request spawned by the dispatcher runs on them, while the
//! thread calling [`Runtime::block_on`] only submits and collects.

pub use internal::Runtime;

#[cfg(all(feature = "tokio", not(feature = "async-std")))]
mod internal {
    use std::future::Future;
    use std::io;

    /// Wrapper of the Tokio Runtime.
    #[derive(Debug)]
    pub struct Runtime {
        rt: tokio::runtime::Runtime,
    }

    impl Runtime {
        /// Creates a multi-threaded runtime with `io_threads` workers.
        pub fn new(io_threads: usize) -> io::Result<Self> {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(io_threads.max(1))
                .thread_name("volley-io")
                .enable_time()
                .build()?;
            Ok(Runtime { rt })
        }

        /// Runs a future to completion on the Tokio runtime. This is the
        /// runtime's entry point.
        pub fn block_on<F, T>(&self, future: F) -> T
        where
            F: Future<Output = T>,
        {
            self.rt.block_on(future)
        }
    }
}

#[cfg(feature = "async-std")]
mod internal {
    use async_std::task;
    use std::future::Future;
    use std::io;

    /// Wrapper of the async-std runtime.
    ///
    /// async-std sizes its own global executor, so the thread count is only
    /// used when `ASYNC_STD_THREAD_COUNT` has not been set by the user.
    #[derive(Debug)]
    pub struct Runtime(());

    impl Runtime {
        /// Creates a new [`Runtime`].
        pub fn new(io_threads: usize) -> io::Result<Self> {
            if std::env::var_os("ASYNC_STD_THREAD_COUNT").is_none() {
                std::env::set_var("ASYNC_STD_THREAD_COUNT", io_threads.max(1).to_string());
            }
            Ok(Runtime(()))
        }

        /// Runs a future to completion on the async-std runtime. This is the
        /// runtime's entry point.
        pub fn block_on<F, T>(&self, future: F) -> T
        where
            F: Future<Output = T>,
        {
            task::block_on(future)
        }
    }
}
