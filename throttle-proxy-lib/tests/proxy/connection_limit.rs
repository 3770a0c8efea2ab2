use std::net::SocketAddr;
use std::time::Duration;
use throttle_proxy_lib::config::SecurityConfig;
use throttle_proxy_lib::proxy::connection::{ConnectionError, ConnectionManager};
use tokio_util::sync::CancellationToken;

fn peer() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 40000))
}

fn manager(max_connections: usize, shutdown: CancellationToken) -> ConnectionManager {
    ConnectionManager::new(&SecurityConfig { max_connections }, shutdown)
}

#[test]
fn test_connection_limit_enforced() {
    let connections = manager(2, CancellationToken::new());

    let first = connections.try_accept(peer(), None);
    let second = connections.try_accept(peer(), None);
    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(connections.active(), 2);

    assert!(matches!(
        connections.try_accept(peer(), None),
        Err(ConnectionError::LimitExceeded { current: 2, limit: 2 })
    ));

    // Closing a connection frees a slot
    drop(first);
    assert_eq!(connections.active(), 1);
    assert!(connections.try_accept(peer(), None).is_ok());
}

#[test]
fn test_rejects_after_shutdown() {
    let shutdown = CancellationToken::new();
    let connections = manager(10, shutdown.clone());
    shutdown.cancel();

    assert!(connections.is_shutdown());
    assert!(matches!(connections.try_accept(peer(), None), Err(ConnectionError::Shutdown)));
    assert_eq!(connections.active(), 0);
}

#[tokio::test]
async fn test_drain_returns_when_connections_close() {
    let connections = manager(10, CancellationToken::new());
    let guard = connections
        .try_accept(peer(), None)
        .unwrap_or_else(|e| panic!("connection rejected: {e}"));

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(guard);
    });

    let remaining = connections.drain(Duration::from_secs(5)).await;
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn test_drain_gives_up_after_timeout() {
    let connections = manager(10, CancellationToken::new());
    let _guard = connections
        .try_accept(peer(), None)
        .unwrap_or_else(|e| panic!("connection rejected: {e}"));

    let remaining = connections.drain(Duration::from_millis(50)).await;
    assert_eq!(remaining, 1);
}
