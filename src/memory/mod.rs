//! An in-process cluster that stands in for a real database driver.
//!
//! It implements [`Connector`] and [`Session`] over typed [`Statement`]s so a
//! batch can be driven end to end without a server. Every request pays a
//! simulated round trip, and admission is bounded by the session's
//! `max_pending_requests` and `io_queue_size`.

mod statement;
mod table;

pub use statement::{ColumnType, QueryResult, Row, Statement, TableSchema, Value};

use crate::config::ClusterConfig;
use crate::session::{Connector, Session};
use crate::time::{sleep, wait_until};
use async_trait::async_trait;
use futures_util::lock::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use table::Table;
use thiserror::Error;

const DRAIN_POLL: Duration = Duration::from_millis(1);

/// Errors returned by the in-memory cluster.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("no hosts available among contact points {0:?}")]
    NoHostAvailable(Vec<String>),
    #[error("keyspace {0} does not exist")]
    KeyspaceNotFound(String),
    #[error("table {0} already exists")]
    TableExists(String),
    #[error("table {0} does not exist")]
    TableNotFound(String),
    #[error("invalid statement: {0}")]
    Invalid(String),
    #[error("request rejected: {max_pending} requests already pending")]
    Overloaded { max_pending: usize },
    #[error("request queue is full ({capacity} entries)")]
    QueueFull { capacity: usize },
    #[error("cluster unavailable")]
    Unavailable,
    #[error("session is closed")]
    Closed,
}

type Keyspaces = HashMap<String, HashMap<String, Table>>;

struct ClusterState {
    nodes: BTreeSet<String>,
    keyspaces: Mutex<Keyspaces>,
    latency: Duration,
    outage: AtomicBool,
}

/// A simulated cluster. Clones share the same data.
#[derive(Clone)]
pub struct MemoryCluster {
    state: Arc<ClusterState>,
}

impl MemoryCluster {
    pub fn builder() -> MemoryClusterBuilder {
        MemoryClusterBuilder::default()
    }

    /// When set, every request fails with [`MemoryError::Unavailable`] and
    /// new connections are refused.
    pub fn set_outage(&self, outage: bool) {
        self.state.outage.store(outage, Ordering::SeqCst);
        log::warn!("memory cluster outage set to {}", outage);
    }

    /// Number of rows stored in `keyspace.table`, if it exists.
    pub async fn row_count(&self, keyspace: &str, table: &str) -> Option<usize> {
        let keyspaces = self.state.keyspaces.lock().await;
        keyspaces.get(keyspace)?.get(table).map(Table::len)
    }
}

impl fmt::Debug for MemoryCluster {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MemoryCluster")
            .field("nodes", &self.state.nodes)
            .field("latency", &self.state.latency)
            .field("outage", &self.state.outage.load(Ordering::Relaxed))
            .finish()
    }
}

/// A builder for a [`MemoryCluster`].
#[derive(Debug, Default)]
pub struct MemoryClusterBuilder {
    nodes: BTreeSet<String>,
    keyspaces: Vec<String>,
    latency: Duration,
}

impl MemoryClusterBuilder {
    /// Adds a node that accepts connections at `host`.
    pub fn node(mut self, host: impl Into<String>) -> Self {
        self.nodes.insert(host.into());
        self
    }

    pub fn keyspace(mut self, name: impl Into<String>) -> Self {
        self.keyspaces.push(name.into());
        self
    }

    /// Simulated round trip paid by every request.
    ///
    /// - Defaults to zero.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn build(self) -> MemoryCluster {
        let keyspaces = self
            .keyspaces
            .into_iter()
            .map(|name| (name, HashMap::new()))
            .collect();
        MemoryCluster {
            state: Arc::new(ClusterState {
                nodes: self.nodes,
                keyspaces: Mutex::new(keyspaces),
                latency: self.latency,
                outage: AtomicBool::new(false),
            }),
        }
    }
}

#[async_trait]
impl Connector for MemoryCluster {
    type Session = MemorySession;

    async fn connect(
        &self,
        config: &ClusterConfig,
        keyspace: &str,
    ) -> Result<MemorySession, MemoryError> {
        let hosts: Vec<String> = config
            .contact_points()
            .iter()
            .filter(|host| self.state.nodes.contains(host.as_str()))
            .cloned()
            .collect();
        if hosts.is_empty() || self.state.outage.load(Ordering::SeqCst) {
            return Err(MemoryError::NoHostAvailable(
                config.contact_points().to_vec(),
            ));
        }

        if !self.state.keyspaces.lock().await.contains_key(keyspace) {
            return Err(MemoryError::KeyspaceNotFound(keyspace.to_string()));
        }

        log::debug!(
            "connected to {:?}, {} connections per host",
            hosts,
            config.core_connections_per_host()
        );
        Ok(MemorySession {
            cluster: self.state.clone(),
            keyspace: keyspace.to_string(),
            connections: hosts.len() * config.core_connections_per_host(),
            hosts,
            max_pending: config.max_pending_requests(),
            io_queue_size: config.io_queue_size(),
            in_flight: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }
}

/// A session bound to one keyspace of a [`MemoryCluster`].
pub struct MemorySession {
    cluster: Arc<ClusterState>,
    keyspace: String,
    hosts: Vec<String>,
    connections: usize,
    max_pending: usize,
    io_queue_size: usize,
    in_flight: AtomicUsize,
    closed: AtomicBool,
}

impl MemorySession {
    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    /// Contact points that answered.
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn connections(&self) -> usize {
        self.connections
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Counts the request before looking at `closed`, so `close` either
    /// waits for it or it sees the session closed.
    fn admit(&self) -> Result<InFlight<'_>, MemoryError> {
        let before = self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);
        if self.closed.load(Ordering::SeqCst) {
            return Err(MemoryError::Closed);
        }
        if before >= self.io_queue_size {
            return Err(MemoryError::QueueFull {
                capacity: self.io_queue_size,
            });
        }
        if before >= self.max_pending {
            return Err(MemoryError::Overloaded {
                max_pending: self.max_pending,
            });
        }
        Ok(guard)
    }

    async fn apply(&self, statement: Statement) -> Result<QueryResult, MemoryError> {
        let mut keyspaces = self.cluster.keyspaces.lock().await;
        let tables = keyspaces
            .get_mut(&self.keyspace)
            .ok_or_else(|| MemoryError::KeyspaceNotFound(self.keyspace.clone()))?;

        match statement {
            Statement::CreateTable {
                schema,
                if_not_exists,
            } => {
                if tables.contains_key(schema.name()) {
                    return if if_not_exists {
                        Ok(QueryResult::empty())
                    } else {
                        Err(MemoryError::TableExists(schema.name().to_string()))
                    };
                }
                log::debug!("creating table {}", schema);
                let name = schema.name().to_string();
                tables.insert(name, Table::create(schema)?);
                Ok(QueryResult::empty())
            }
            Statement::Insert {
                table,
                columns,
                values,
            } => {
                let target = tables
                    .get_mut(&table)
                    .ok_or(MemoryError::TableNotFound(table))?;
                target.upsert(&columns, values)?;
                Ok(QueryResult::empty())
            }
            Statement::Select { table, limit } => tables
                .get(&table)
                .map(|t| t.select(limit))
                .ok_or(MemoryError::TableNotFound(table)),
        }
    }
}

impl fmt::Debug for MemorySession {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MemorySession")
            .field("keyspace", &self.keyspace)
            .field("hosts", &self.hosts)
            .field("in_flight", &self.in_flight())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

#[async_trait]
impl Session for MemorySession {
    type Request = Statement;
    type Payload = QueryResult;
    type Error = MemoryError;

    async fn execute(&self, statement: Statement) -> Result<QueryResult, MemoryError> {
        let _in_flight = self.admit()?;
        sleep(self.cluster.latency).await;
        if self.cluster.outage.load(Ordering::SeqCst) {
            return Err(MemoryError::Unavailable);
        }
        self.apply(statement).await
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let in_flight = &self.in_flight;
        wait_until(DRAIN_POLL, || in_flight.load(Ordering::SeqCst) == 0).await;
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster() -> MemoryCluster {
        MemoryCluster::builder()
            .node("127.0.0.1")
            .keyspace("examples")
            .build()
    }

    fn config(points: &str) -> ClusterConfig {
        ClusterConfig::builder().contact_points(points).build()
    }

    #[tokio::test]
    async fn test_connect_needs_a_live_contact_point() {
        let err = cluster()
            .connect(&config("10.1.1.1"), "examples")
            .await
            .unwrap_err();
        assert_eq!(err, MemoryError::NoHostAvailable(vec!["10.1.1.1".into()]));

        let session = cluster()
            .connect(&config("10.1.1.1,127.0.0.1"), "examples")
            .await
            .unwrap();
        assert_eq!(session.hosts(), &["127.0.0.1".to_string()]);
        assert_eq!(session.connections(), 2);
    }

    #[tokio::test]
    async fn test_connect_unknown_keyspace() {
        let err = cluster()
            .connect(&config("127.0.0.1"), "missing")
            .await
            .unwrap_err();
        assert_eq!(err, MemoryError::KeyspaceNotFound("missing".into()));
    }

    #[tokio::test]
    async fn test_create_insert_select() {
        let cluster = cluster();
        let session = cluster
            .connect(&config("127.0.0.1"), "examples")
            .await
            .unwrap();
        let schema = TableSchema::new("kv", "k").column("k", ColumnType::Text);

        session
            .execute(Statement::create_table(schema.clone()))
            .await
            .unwrap();
        assert_eq!(
            session.execute(Statement::create_table(schema.clone())).await,
            Err(MemoryError::TableExists("kv".into()))
        );
        assert!(session
            .execute(Statement::create_table_if_not_exists(schema))
            .await
            .is_ok());

        for k in &["a", "b", "a"] {
            session
                .execute(Statement::insert("kv", &["k"], vec![(*k).into()]))
                .await
                .unwrap();
        }
        assert_eq!(cluster.row_count("examples", "kv").await, Some(2));

        let rows = session.execute(Statement::select("kv", None)).await.unwrap();
        assert_eq!(rows.columns(), &["k".to_string()]);
        assert_eq!(rows.rows().len(), 2);
        assert_eq!(
            session.execute(Statement::select("nope", None)).await,
            Err(MemoryError::TableNotFound("nope".into()))
        );
    }

    #[tokio::test]
    async fn test_outage_and_close() {
        let cluster = cluster();
        let session = cluster
            .connect(&config("127.0.0.1"), "examples")
            .await
            .unwrap();

        cluster.set_outage(true);
        assert_eq!(
            session.execute(Statement::select("kv", None)).await,
            Err(MemoryError::Unavailable)
        );
        assert!(cluster
            .connect(&config("127.0.0.1"), "examples")
            .await
            .is_err());
        cluster.set_outage(false);

        session.close().await;
        assert_eq!(session.in_flight(), 0);
        assert_eq!(
            session.execute(Statement::select("kv", None)).await,
            Err(MemoryError::Closed)
        );
    }

    #[tokio::test]
    async fn test_close_waits_for_admitted() {
        let cluster = cluster();
        let session = cluster
            .connect(&config("127.0.0.1"), "examples")
            .await
            .unwrap();

        let admitted = session.admit().unwrap();
        let mut close = Box::pin(session.close());
        assert!(futures_util::poll!(close.as_mut()).is_pending());
        // Counted, then turned away.
        assert_eq!(session.admit().err(), Some(MemoryError::Closed));
        assert_eq!(session.in_flight(), 1);

        drop(admitted);
        close.await;
        assert_eq!(session.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_admission_limits() {
        let cluster = cluster();
        let cfg = ClusterConfig::builder()
            .contact_points("127.0.0.1")
            .max_pending_requests(2)
            .build();
        let session = cluster.connect(&cfg, "examples").await.unwrap();

        let a = session.admit().unwrap();
        let b = session.admit().unwrap();
        assert_eq!(
            session.admit().err(),
            Some(MemoryError::Overloaded { max_pending: 2 })
        );
        assert_eq!(session.in_flight(), 2);
        drop((a, b));
        assert_eq!(session.in_flight(), 0);

        let cfg = ClusterConfig::builder()
            .contact_points("127.0.0.1")
            .io_queue_size(1)
            .build();
        let session = cluster.connect(&cfg, "examples").await.unwrap();
        let _a = session.admit().unwrap();
        assert_eq!(
            session.admit().err(),
            Some(MemoryError::QueueFull { capacity: 1 })
        );
    }
}
