//! Fire a batch of requests at a shared session and collect what comes back.
//!
//! A batch is split in two halves that never overlap:
//!
//! - the [`Dispatcher`] hands every request to the session without waiting,
//!   producing a [`PendingBatch`] whose order matches the input;
//! - the [`Collector`] waits on each handle, classifies the outcome and
//!   builds a [`BatchReport`].
//!
//! A request that fails is recorded and collection moves on. A payload that
//! comes back in the wrong shape is fatal or recorded, depending on the
//! [`ValidationPolicy`].
//!
//! The session itself is a trait ([`Session`]) so any driver can sit behind
//! it. [`memory::MemoryCluster`] is an in-process implementation used by the
//! `volley-perf` benchmark and the tests.
//!
//! # Example
//!
//! ```rust
//! use volley::memory::{ColumnType, MemoryCluster, Statement, TableSchema};
//! use volley::{ClusterConfig, Collector, Dispatcher, ExpectRows, SessionHandle};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cluster = MemoryCluster::builder()
//!         .node("127.0.0.1")
//!         .keyspace("examples")
//!         .build();
//!     let config = ClusterConfig::builder().contact_points("127.0.0.1").build();
//!     let session = SessionHandle::connect(&cluster, &config, "examples").await?;
//!
//!     let schema = TableSchema::new("kv", "k").column("k", ColumnType::Text);
//!     session.execute(Statement::create_table(schema)).await?;
//!
//!     let dispatcher = Dispatcher::new(session.clone());
//!     let inserts = (0..100).map(|i| Statement::insert("kv", &["k"], vec![i.to_string().into()]));
//!     let report = Collector::new().collect(dispatcher.dispatch(inserts)).await?;
//!     assert_eq!(report.succeeded(), 100);
//!
//!     let selects = (0..10).map(|_| Statement::select("kv", Some(3)));
//!     let report = Collector::new()
//!         .with_validator(ExpectRows(3))
//!         .collect(dispatcher.dispatch(selects))
//!         .await?;
//!     assert!(report.all_succeeded());
//!
//!     session.close().await;
//!     Ok(())
//! }
//! ```
#![warn(missing_debug_implementations)]

mod collect;
mod config;
mod dispatch;
mod error;
mod metrics_utils;
mod report;
mod session;
mod spawn;
mod time;

pub mod memory;
pub mod perf;
pub mod runtime;

pub use async_trait::async_trait;
pub use collect::{
    AcceptAll, CollectOrder, Collector, ExpectRows, RowCount, ValidationPolicy, Validator,
};
pub use config::{BatchConfig, Builder, ClusterConfig};
pub use dispatch::{Dispatcher, PendingBatch};
pub use error::{CollectError, Error, RequestError, ValidationError};
pub use report::{BatchReport, Failure, FailureKind};
pub use session::{Connector, PendingHandle, Session, SessionHandle};
pub use spawn::spawn;

/// Dispatches `requests` on `session` and collects them with `collector`.
pub async fn run_batch<S, I, V>(
    session: &SessionHandle<S>,
    requests: I,
    collector: &Collector<V>,
) -> Result<BatchReport, CollectError>
where
    S: Session,
    I: IntoIterator<Item = S::Request>,
    V: Validator<S::Payload>,
{
    let batch = Dispatcher::new(session.clone()).dispatch(requests);
    collector.collect(batch).await
}
