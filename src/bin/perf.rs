use clap::{Parser, ValueEnum};
use std::num::NonZeroUsize;
use std::process;
use std::time::Duration;
use volley::memory::MemoryCluster;
use volley::perf::{self, KEYSPACE};
use volley::runtime::Runtime;
use volley::{BatchConfig, ClusterConfig, CollectOrder, SessionHandle, ValidationPolicy};

/// Hosts of the simulated cluster.
const NODES: [&str; 2] = ["127.0.0.1", "127.0.0.2"];

#[derive(Parser, Debug)]
#[command(
    name = "volley-perf",
    about = "Insert and select throughput against a simulated cluster"
)]
struct Args {
    /// Comma separated hosts to connect to
    #[arg(long, default_value = "127.0.0.1,127.0.0.2")]
    contact_points: String,

    #[arg(long, default_value = KEYSPACE)]
    keyspace: String,

    /// Requests per phase
    #[arg(long, default_value_t = 10000)]
    requests: usize,

    #[arg(long, default_value = "2")]
    io_threads: NonZeroUsize,

    #[arg(long, default_value = "16384")]
    io_queue_size: NonZeroUsize,

    #[arg(long, default_value = "10000")]
    max_pending_requests: NonZeroUsize,

    #[arg(long, default_value = "2")]
    core_connections_per_host: NonZeroUsize,

    #[arg(long, default_value = "4")]
    max_connections_per_host: NonZeroUsize,

    /// Simulated round trip per request, in microseconds
    #[arg(long, default_value_t = 200)]
    latency_us: u64,

    /// What a select returning the wrong number of rows does
    #[arg(long, value_enum, default_value_t = Validation::Abort)]
    validation: Validation,

    #[arg(long, value_enum, default_value_t = Order::Submission)]
    order: Order,

    #[arg(long, default_value = "warn")]
    log_level: tracing::Level,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Validation {
    Abort,
    Record,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Order {
    Submission,
    Completion,
}

impl Args {
    fn cluster_config(&self) -> ClusterConfig {
        ClusterConfig::builder()
            .contact_points(&self.contact_points)
            .io_threads(self.io_threads.get())
            .io_queue_size(self.io_queue_size.get())
            .max_pending_requests(self.max_pending_requests.get())
            .core_connections_per_host(self.core_connections_per_host.get())
            .max_connections_per_host(self.max_connections_per_host.get())
            .log_level(self.log_level)
            .build()
    }

    fn batch_config(&self) -> BatchConfig {
        BatchConfig::new()
            .with_concurrency(self.requests)
            .with_validation(match self.validation {
                Validation::Abort => ValidationPolicy::Abort,
                Validation::Record => ValidationPolicy::Record,
            })
            .with_order(match self.order {
                Order::Submission => CollectOrder::Submission,
                Order::Completion => CollectOrder::Completion,
            })
    }
}

fn main() {
    let args = Args::parse();
    let config = args.cluster_config();

    tracing_subscriber::fmt()
        .with_max_level(config.log_level())
        .with_target(false)
        .init();

    let rt = match Runtime::new(config.io_threads()) {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let code = rt.block_on(run(&args, &config));
    process::exit(code);
}

async fn run(args: &Args, config: &ClusterConfig) -> i32 {
    let mut cluster = MemoryCluster::builder()
        .keyspace(KEYSPACE)
        .latency(Duration::from_micros(args.latency_us));
    for node in NODES.iter() {
        cluster = cluster.node(*node);
    }
    let cluster = cluster.build();

    let session = match SessionHandle::connect(&cluster, config, &args.keyspace).await {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error: {}", e);
            return -1;
        }
    };

    let outcome = perf::run(&session, &args.batch_config()).await;
    session.close().await;

    match outcome {
        Ok(summary) => {
            println!("{}", summary);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}
