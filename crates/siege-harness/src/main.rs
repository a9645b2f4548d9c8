use clap::{Parser, Subcommand};
use hyper::{
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server, StatusCode,
};
use siege_common::Config;
use siege_harness::engine::supervisor::PoolSupervisor;
use siege_harness::engine::worker::{PhaseBoard, WorkerPhase};
use siege_harness::export;
use siege_harness::metrics::MetricsAggregator;
use siege_harness::transport::{transport_for, Endpoint};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "siege-harness",
    about = "Opens and sustains a pool of persistent streaming connections against one endpoint",
    version
)]
struct Cli {
    /// Path to a YAML config file (otherwise ./siege.yaml or ./config.yaml).
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pool until interrupted.
    Run {
        /// Target address: ws://, wss://, tcp://host:port, or host:port.
        endpoint: Option<String>,
        /// Number of concurrent connection slots.
        worker_count: Option<usize>,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries the stats lines; structured logs go to stderr.
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn metrics_handler(
    req: Request<Body>,
    metrics: Arc<MetricsAggregator>,
    phases: Arc<PhaseBoard>,
) -> Result<Response<Body>, Infallible> {
    match req.uri().path() {
        "/health" => Ok(Response::new(Body::from("OK"))),
        "/metrics" => {
            let snapshot = metrics.snapshot();
            let active = phases.count(WorkerPhase::Connected);
            Ok(Response::new(Body::from(export::render_metrics(
                &snapshot, active,
            ))))
        }
        _ => {
            let mut not_found = Response::new(Body::from("Not Found"));
            *not_found.status_mut() = StatusCode::NOT_FOUND;
            Ok(not_found)
        }
    }
}

async fn run_metrics_server(port: u16, metrics: Arc<MetricsAggregator>, phases: Arc<PhaseBoard>) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    export::register_metrics();

    let make_svc = make_service_fn(move |_conn| {
        let metrics = Arc::clone(&metrics);
        let phases = Arc::clone(&phases);
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                metrics_handler(req, Arc::clone(&metrics), Arc::clone(&phases))
            }))
        }
    });

    let server = Server::bind(&addr).serve(make_svc);
    info!(port = port, "observability server online");

    if let Err(e) = server.await {
        error!(error = %e, "observability server failed");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    let Command::Run {
        endpoint,
        worker_count,
    } = cli.command;
    if let Some(endpoint) = endpoint {
        config.endpoint.url = endpoint;
    }
    if let Some(worker_count) = worker_count {
        config.pool.worker_count = worker_count;
    }
    config.validate()?;

    let mut headers: Vec<(String, String)> = config
        .endpoint
        .headers
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    headers.sort();
    let endpoint = Endpoint::parse(&config.endpoint.url)?
        .with_connect_timeout(Duration::from_millis(config.endpoint.connect_timeout_ms))
        .with_headers(headers);
    let transport = transport_for(&endpoint);

    let mut supervisor = PoolSupervisor::new(
        config.pool.clone(),
        config.stats.clone(),
        endpoint,
        transport,
    );

    if config.metrics.enabled {
        let port = config.metrics.port;
        let metrics = supervisor.metrics();
        let phases = supervisor.phases();
        tokio::spawn(async move {
            run_metrics_server(port, metrics, phases).await;
        });
    }

    println!(
        "Starting stress run with {} workers",
        config.pool.worker_count
    );
    println!("Endpoint: {}", config.endpoint.url);
    println!();

    supervisor
        .run(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => error!(error = %e, "failed to listen for shutdown signal"),
            }
            println!("\nStopping...");
        })
        .await;

    Ok(())
}
