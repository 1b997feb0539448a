use std::time::Duration;
use volley::memory::{MemoryCluster, MemoryError, MemorySession, Statement};
use volley::perf::{self, KEYSPACE, TABLE};
use volley::{
    BatchConfig, ClusterConfig, CollectError, Collector, Dispatcher, Error, RequestError,
    SessionHandle, ValidationError, ValidationPolicy,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn cluster(latency: Duration) -> MemoryCluster {
    MemoryCluster::builder()
        .node("127.0.0.1")
        .node("127.0.0.2")
        .keyspace(KEYSPACE)
        .latency(latency)
        .build()
}

async fn connect(cluster: &MemoryCluster, config: &ClusterConfig) -> SessionHandle<MemorySession> {
    SessionHandle::connect(cluster, config, KEYSPACE)
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_inserts_then_selects() {
    init_logger();
    let cluster = cluster(Duration::from_micros(50));
    let config = ClusterConfig::builder()
        .contact_points("127.0.0.1,127.0.0.2")
        .build();
    let session = connect(&cluster, &config).await;

    let summary = perf::run(&session, &BatchConfig::new().with_concurrency(200))
        .await
        .unwrap();

    assert_eq!(summary.insert.submitted(), 200);
    assert_eq!(summary.insert.succeeded(), 200);
    assert_eq!(summary.select.succeeded(), 200);
    assert_eq!(summary.failed(), 0);
    assert_eq!(cluster.row_count(KEYSPACE, TABLE).await, Some(200));

    session.close().await;
}

#[tokio::test]
async fn test_run_twice_reuses_table() {
    let cluster = cluster(Duration::ZERO);
    let config = ClusterConfig::builder().contact_points("127.0.0.1").build();
    let session = connect(&cluster, &config).await;
    let batch = BatchConfig::new().with_concurrency(10);

    perf::run(&session, &batch).await.unwrap();
    perf::run(&session, &batch).await.unwrap();
    assert_eq!(cluster.row_count(KEYSPACE, TABLE).await, Some(20));
}

#[tokio::test]
async fn test_connect_failure() {
    let cluster = cluster(Duration::ZERO);
    let config = ClusterConfig::builder().contact_points("10.0.0.1").build();

    match SessionHandle::connect(&cluster, &config, KEYSPACE).await {
        Err(Error::Connect(MemoryError::NoHostAvailable(points))) => {
            assert_eq!(points, vec!["10.0.0.1".to_string()]);
        }
        other => panic!("expected a connect error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_bootstrap_failure_stops_the_run() {
    let cluster = cluster(Duration::ZERO);
    let config = ClusterConfig::builder().contact_points("127.0.0.1").build();
    let session = connect(&cluster, &config).await;
    cluster.set_outage(true);

    match perf::run(&session, &BatchConfig::new().with_concurrency(10)).await {
        Err(Error::Bootstrap(RequestError::Session(MemoryError::Unavailable))) => (),
        other => panic!("expected a bootstrap error, got {:?}", other.map(|_| ())),
    }
    assert_eq!(cluster.row_count(KEYSPACE, TABLE).await, None);
}

// With fewer rows than the select limit every select comes back short.
#[tokio::test]
async fn test_short_reads_abort() {
    let cluster = cluster(Duration::ZERO);
    let config = ClusterConfig::builder().contact_points("127.0.0.1").build();
    let session = connect(&cluster, &config).await;

    match perf::run(&session, &BatchConfig::new().with_concurrency(2)).await {
        Err(Error::Collect(CollectError::Validation {
            index,
            source,
            partial,
        })) => {
            assert_eq!(index, 0);
            assert_eq!(
                source,
                ValidationError::RowCount {
                    expected: 3,
                    actual: 2
                }
            );
            assert_eq!(partial.succeeded(), 0);
            assert_eq!(partial.failed(), 1);
            assert_eq!(partial.released(), 1);
            assert_eq!(partial.resolved() + partial.released(), partial.submitted());
        }
        other => panic!("expected a validation error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_short_reads_recorded() {
    let cluster = cluster(Duration::ZERO);
    let config = ClusterConfig::builder().contact_points("127.0.0.1").build();
    let session = connect(&cluster, &config).await;
    let batch = BatchConfig::new()
        .with_concurrency(2)
        .with_validation(ValidationPolicy::Record);

    let summary = perf::run(&session, &batch).await.unwrap();
    assert_eq!(summary.insert.succeeded(), 2);
    assert_eq!(summary.select.failed(), 2);
    assert_eq!(
        summary.select.failure_reasons().get("expected 3 rows, got 2"),
        Some(&2)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_overload_is_recorded_per_request() {
    init_logger();
    let cluster = cluster(Duration::from_millis(20));
    let config = ClusterConfig::builder()
        .contact_points("127.0.0.1")
        .max_pending_requests(10)
        .build();
    let session = connect(&cluster, &config).await;
    let batch = BatchConfig::new()
        .with_concurrency(50)
        .with_validation(ValidationPolicy::Record);

    let summary = perf::run(&session, &batch).await.unwrap();

    assert_eq!(summary.insert.resolved(), 50);
    assert!(summary.insert.succeeded() >= 10);
    assert!(summary.insert.failed() > 0);
    assert!(summary
        .insert
        .failure_reasons()
        .contains_key("request rejected: 10 requests already pending"));
    assert_eq!(summary.select.resolved(), 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_close_drains_in_flight() {
    let cluster = cluster(Duration::from_millis(100));
    let config = ClusterConfig::builder().contact_points("127.0.0.1").build();
    let session = connect(&cluster, &config).await;
    session
        .execute(Statement::create_table(perf::songs_schema()))
        .await
        .unwrap();
    let probe = session.clone();

    let handles: Vec<_> = (0..20)
        .map(|_| session.execute_async(Statement::select(TABLE, Some(3))))
        .collect();
    // Let every request get admitted before closing.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(probe.session().in_flight(), 20);

    session.close().await;
    assert_eq!(probe.session().in_flight(), 0);
    for handle in handles {
        assert!(handle.await.unwrap().is_empty());
    }

    match probe.execute(Statement::select(TABLE, None)).await {
        Err(RequestError::Session(MemoryError::Closed)) => (),
        other => panic!("expected Closed, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_close_right_after_dispatch() {
    let cluster = cluster(Duration::from_millis(5));
    let config = ClusterConfig::builder().contact_points("127.0.0.1").build();
    let session = connect(&cluster, &config).await;
    session
        .execute(Statement::create_table(perf::songs_schema()))
        .await
        .unwrap();

    let inserts = perf::insert_statements(100, &perf::default_tags());
    let batch = Dispatcher::new(session.clone()).dispatch(inserts);
    session.clone().close().await;

    let report = Collector::new().collect(batch).await.unwrap();
    assert_eq!(report.succeeded(), 100);
    assert_eq!(cluster.row_count(KEYSPACE, TABLE).await, Some(100));
    assert_eq!(session.session().in_flight(), 0);
}
