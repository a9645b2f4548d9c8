use std::net::SocketAddr;
use std::time::{Duration, Instant};

use siege_common::{PoolConfig, StatsConfig};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use siege_harness::transport::{transport_for, Endpoint};
use siege_harness::{PoolState, PoolSupervisor};

fn pool_config(worker_count: usize) -> PoolConfig {
    PoolConfig {
        worker_count,
        stagger_ms: 1,
        backoff_ms: 50,
        receive_timeout_ms: 100,
        grace_period_ms: 2000,
    }
}

fn stats_config() -> StatsConfig {
    StatsConfig { interval_secs: 5 }
}

/// An address nothing listens on: bind a port, then free it.
async fn refused_endpoint() -> Endpoint {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Endpoint::parse(&format!("tcp://{}", addr))
        .unwrap()
        .with_connect_timeout(Duration::from_millis(500))
}

/// A local endpoint that streams one JSON line every few milliseconds to
/// every client, the way the stressed server would.
async fn spawn_line_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                loop {
                    if socket.write_all(b"{\"seen\":1}\n").await.is_err() {
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            });
        }
    });
    addr
}

fn supervisor_for(endpoint: Endpoint, worker_count: usize) -> PoolSupervisor {
    let transport = transport_for(&endpoint);
    PoolSupervisor::new(pool_config(worker_count), stats_config(), endpoint, transport)
}

#[tokio::test]
async fn test_zero_workers_traverses_lifecycle() {
    let endpoint = refused_endpoint().await;
    let mut pool = supervisor_for(endpoint, 0);

    assert_eq!(pool.state(), PoolState::Idle);
    pool.start().await;
    assert_eq!(pool.state(), PoolState::Running);

    let summary = pool.stop().await;
    assert_eq!(pool.state(), PoolState::Stopped);
    assert_eq!(summary.connected_total, 0);
    assert_eq!(summary.disconnected_total, 0);
    assert_eq!(summary.error_total, 0);
    assert_eq!(summary.message_total, 0);
    assert_eq!(summary.unaccounted_workers, 0);
}

#[tokio::test]
async fn test_refusing_endpoint_counts_errors_only() {
    let endpoint = refused_endpoint().await;
    let mut pool = supervisor_for(endpoint, 3);

    pool.start().await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    let summary = pool.stop().await;

    assert_eq!(summary.connected_total, 0);
    assert_eq!(summary.disconnected_total, 0);
    assert!(summary.error_total >= 3, "every worker retried at least once");
    assert_eq!(summary.unaccounted_workers, 0);
    assert_eq!(pool.state(), PoolState::Stopped);
}

#[tokio::test]
async fn test_immediate_stop_still_attempts_every_worker() {
    let endpoint = refused_endpoint().await;
    let mut pool = supervisor_for(endpoint, 5);

    pool.start().await;
    let summary = pool.stop().await;

    assert!(
        summary.connected_total + summary.error_total >= 5,
        "each of the 5 workers attempted at least once, got {} + {}",
        summary.connected_total,
        summary.error_total
    );
    assert_eq!(summary.unaccounted_workers, 0);
}

#[tokio::test]
async fn test_live_endpoint_counts_messages_and_converges() {
    let addr = spawn_line_server().await;
    let endpoint = Endpoint::parse(&format!("tcp://{}", addr)).unwrap();
    let mut pool = supervisor_for(endpoint, 3);

    pool.start().await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    let summary = pool.stop().await;

    assert!(summary.connected_total >= 3);
    assert!(summary.message_total >= 1);
    // Once the pool is fully stopped every connect has a matching disconnect.
    assert_eq!(summary.connected_total, summary.disconnected_total);
    assert_eq!(summary.unaccounted_workers, 0);
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let endpoint = refused_endpoint().await;
    let mut pool = supervisor_for(endpoint, 2);

    pool.start().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let first = pool.stop().await;
    let second = pool.stop().await;

    assert_eq!(first, second);
    assert_eq!(pool.state(), PoolState::Stopped);
}

#[tokio::test]
async fn test_stagger_spaces_launches() {
    let endpoint = refused_endpoint().await;
    let transport = transport_for(&endpoint);
    let config = PoolConfig {
        worker_count: 4,
        stagger_ms: 30,
        backoff_ms: 50,
        receive_timeout_ms: 100,
        grace_period_ms: 2000,
    };
    let mut pool = PoolSupervisor::new(config, stats_config(), endpoint, transport);

    let begun = Instant::now();
    pool.start().await;
    let elapsed = begun.elapsed();

    // Three stagger pauses separate four launches.
    assert!(
        elapsed >= Duration::from_millis(90),
        "launches not staggered: {:?}",
        elapsed
    );

    pool.stop().await;
}
