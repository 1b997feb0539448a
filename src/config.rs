use crate::collect::{CollectOrder, ValidationPolicy};
use crate::metrics_utils::describe_metrics;
use tracing::Level;

const DEFAULT_IO_THREADS: usize = 2;
const DEFAULT_IO_QUEUE_SIZE: usize = 16384;
const DEFAULT_MAX_PENDING_REQUESTS: usize = 10000;
const DEFAULT_CORE_CONNECTIONS_PER_HOST: usize = 2;
const DEFAULT_MAX_CONNECTIONS_PER_HOST: usize = 4;
const DEFAULT_CONCURRENCY: usize = 10000;

/// Settings a [`Connector`](crate::Connector) uses to open a session.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterConfig {
    contact_points: Vec<String>,
    io_threads: usize,
    io_queue_size: usize,
    max_pending_requests: usize,
    core_connections_per_host: usize,
    max_connections_per_host: usize,
    log_level: Level,
}

impl ClusterConfig {
    /// Returns a builder with every parameter at its default.
    pub fn builder() -> Builder {
        Builder::new()
    }

    pub fn contact_points(&self) -> &[String] {
        &self.contact_points
    }

    pub fn io_threads(&self) -> usize {
        self.io_threads
    }

    pub fn io_queue_size(&self) -> usize {
        self.io_queue_size
    }

    pub fn max_pending_requests(&self) -> usize {
        self.max_pending_requests
    }

    pub fn core_connections_per_host(&self) -> usize {
        self.core_connections_per_host
    }

    pub fn max_connections_per_host(&self) -> usize {
        self.max_connections_per_host
    }

    pub fn log_level(&self) -> Level {
        self.log_level
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Builder::new().build()
    }
}

/// A builder for a [`ClusterConfig`].
#[derive(Debug, Clone)]
pub struct Builder {
    contact_points: Vec<String>,
    io_threads: usize,
    io_queue_size: usize,
    max_pending_requests: usize,
    core_connections_per_host: usize,
    max_connections_per_host: usize,
    log_level: Level,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            contact_points: Vec::new(),
            io_threads: DEFAULT_IO_THREADS,
            io_queue_size: DEFAULT_IO_QUEUE_SIZE,
            max_pending_requests: DEFAULT_MAX_PENDING_REQUESTS,
            core_connections_per_host: DEFAULT_CORE_CONNECTIONS_PER_HOST,
            max_connections_per_host: DEFAULT_MAX_CONNECTIONS_PER_HOST,
            log_level: Level::WARN,
        }
    }
}

impl Builder {
    /// Constructs a new `Builder`.
    ///
    /// Parameters are initialized with their default values.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds the hosts in a comma separated list, e.g. `"127.0.0.1,127.0.0.2"`.
    ///
    /// Blank entries are skipped. May be called more than once.
    pub fn contact_points(mut self, list: &str) -> Self {
        self.contact_points.extend(
            list.split(',')
                .map(str::trim)
                .filter(|host| !host.is_empty())
                .map(String::from),
        );
        self
    }

    /// Adds a single host.
    pub fn contact_point(mut self, host: impl Into<String>) -> Self {
        self.contact_points.push(host.into());
        self
    }

    /// Sets the number of threads that execute requests.
    ///
    /// - Defaults to 2.
    ///
    /// # Panics
    ///
    /// Panics if `io_threads` is zero.
    pub fn io_threads(mut self, io_threads: usize) -> Self {
        assert!(io_threads > 0, "io_threads must be positive");
        self.io_threads = io_threads;
        self
    }

    /// Sets how many requests may be queued for execution at once.
    ///
    /// - Defaults to 16384.
    ///
    /// # Panics
    ///
    /// Panics if `io_queue_size` is zero.
    pub fn io_queue_size(mut self, io_queue_size: usize) -> Self {
        assert!(io_queue_size > 0, "io_queue_size must be positive");
        self.io_queue_size = io_queue_size;
        self
    }

    /// Sets the number of in-flight requests above which the session starts
    /// rejecting work. Rejections show up on the request's handle, never at
    /// submission.
    ///
    /// - Defaults to 10000.
    ///
    /// # Panics
    ///
    /// Panics if `max_pending_requests` is zero.
    pub fn max_pending_requests(mut self, max_pending_requests: usize) -> Self {
        assert!(
            max_pending_requests > 0,
            "max_pending_requests must be positive"
        );
        self.max_pending_requests = max_pending_requests;
        self
    }

    /// Sets the number of connections kept open to every host.
    ///
    /// - Defaults to 2.
    ///
    /// # Panics
    ///
    /// Panics if `core` is zero.
    pub fn core_connections_per_host(mut self, core: usize) -> Self {
        assert!(core > 0, "core_connections_per_host must be positive");
        self.core_connections_per_host = core;
        self
    }

    /// Sets the upper bound on connections to every host.
    ///
    /// - Defaults to 4.
    ///
    /// # Panics
    ///
    /// Panics if `max` is zero.
    pub fn max_connections_per_host(mut self, max: usize) -> Self {
        assert!(max > 0, "max_connections_per_host must be positive");
        self.max_connections_per_host = max;
        self
    }

    /// Sets the level programs should install for the crate's logs.
    ///
    /// - Defaults to `WARN`.
    pub fn log_level(mut self, level: Level) -> Self {
        self.log_level = level;
        self
    }

    /// Consumes the builder, returning the configuration.
    pub fn build(self) -> ClusterConfig {
        describe_metrics();
        let mut core = self.core_connections_per_host;
        if core > self.max_connections_per_host {
            core = self.max_connections_per_host
        };

        ClusterConfig {
            contact_points: self.contact_points,
            io_threads: self.io_threads,
            io_queue_size: self.io_queue_size,
            max_pending_requests: self.max_pending_requests,
            core_connections_per_host: core,
            max_connections_per_host: self.max_connections_per_host,
            log_level: self.log_level,
        }
    }
}

/// How a batch is sized and collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    concurrency: usize,
    validation: ValidationPolicy,
    order: CollectOrder,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            validation: ValidationPolicy::Abort,
            order: CollectOrder::Submission,
        }
    }
}

impl BatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requests submitted per batch. Zero is a valid, empty batch.
    ///
    /// - Defaults to 10000.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// - Defaults to [`ValidationPolicy::Abort`].
    pub fn with_validation(mut self, validation: ValidationPolicy) -> Self {
        self.validation = validation;
        self
    }

    /// - Defaults to [`CollectOrder::Submission`].
    pub fn with_order(mut self, order: CollectOrder) -> Self {
        self.order = order;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn validation(&self) -> ValidationPolicy {
        self.validation
    }

    pub fn order(&self) -> CollectOrder {
        self.order
    }
}
