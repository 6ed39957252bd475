//! End-to-end dispatch over TCP: membership, selection, pooling and eviction.

use std::time::Duration;
use tokio::net::TcpStream;
use rpc_dispatch::config::DispatchConfig;
use rpc_dispatch::dispatch::DispatchError;
use rpc_dispatch::lifecycle::Runtime;
use rpc_dispatch::pool::{ConnectionPool, PoolConfig, PoolError};

mod common;

#[tokio::test]
async fn calls_follow_weights_and_reuse_connections() {
    let a = common::start_echo_backend().await;
    let b = common::start_echo_backend().await;

    let mut config = DispatchConfig::default();
    config.nodes = vec![a.node("a", "echo", 4), b.node("b", "echo", 2)];
    let runtime = Runtime::start(config).unwrap();
    common::wait_for_nodes(&runtime, "echo", 2).await;

    let dispatcher = runtime.dispatcher();
    let mut order = Vec::new();
    for _ in 0..6 {
        let (node, mut conn) = dispatcher.acquire("swrr", "echo").await.unwrap();
        let reply = common::ping(&mut conn).await.unwrap();
        assert_eq!(reply, b"ping\n");
        order.push(node.id);
        conn.put();
    }

    assert_eq!(order, vec!["a", "b", "a", "a", "b", "a"]);
    assert_eq!(a.accepted(), 1);
    assert_eq!(b.accepted(), 1);

    runtime.stop().await;
}

#[tokio::test]
async fn call_returns_invocation_result() {
    let a = common::start_echo_backend().await;

    let mut config = DispatchConfig::default();
    config.nodes = vec![a.node("a", "echo", 1)];
    let runtime = Runtime::start(config).unwrap();
    common::wait_for_nodes(&runtime, "echo", 1).await;

    for _ in 0..3 {
        let reply = runtime.dispatcher().call("swrr", "echo", common::ping).await.unwrap();
        assert_eq!(reply, b"ping\n");
    }
    assert_eq!(a.accepted(), 1);

    runtime.stop().await;
}

#[tokio::test]
async fn broken_connection_is_replaced() {
    let backend = common::start_closing_backend().await;

    let mut config = DispatchConfig::default();
    config.nodes = vec![backend.node("a", "echo", 1)];
    let runtime = Runtime::start(config).unwrap();
    common::wait_for_nodes(&runtime, "echo", 1).await;

    let dispatcher = runtime.dispatcher();
    let err = dispatcher.call("swrr", "echo", common::ping).await.unwrap_err();
    assert!(matches!(err, DispatchError::Invoke { .. }));

    let stats = dispatcher.stats();
    assert_eq!(stats[0].1.open, 0);

    let _ = dispatcher.call("swrr", "echo", common::ping).await;
    assert!(common::eventually(|| backend.accepted() == 2).await);

    runtime.stop().await;
}

#[tokio::test]
async fn removed_node_pool_is_evicted() {
    let a = common::start_echo_backend().await;
    let b = common::start_echo_backend().await;

    let mut config = DispatchConfig::default();
    config.nodes = vec![a.node("a", "echo", 1), b.node("b", "echo", 1)];
    let runtime = Runtime::start(config.clone()).unwrap();
    common::wait_for_nodes(&runtime, "echo", 2).await;

    for _ in 0..2 {
        runtime.dispatcher().call("swrr", "echo", common::ping).await.unwrap();
    }
    assert_eq!(runtime.dispatcher().stats().len(), 2);

    config.nodes = vec![a.node("a", "echo", 1)];
    runtime.reload(config);
    common::wait_for_nodes(&runtime, "echo", 1).await;

    let dispatcher = runtime.dispatcher();
    assert!(common::eventually(|| dispatcher.stats().len() == 1).await);
    assert_eq!(dispatcher.stats()[0].0, a.addr.to_string());

    runtime.stop().await;
}

#[tokio::test]
async fn unreachable_node_reports_connect_error() {
    // Bind then drop to get a port nobody listens on.
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let mut config = DispatchConfig::default();
    config.pool.connect_timeout_ms = 500;
    config.nodes = vec![rpc_dispatch::config::NodeConfig {
        id: "gone".into(),
        service: "echo".into(),
        address: addr.to_string(),
        weight: 1,
    }];
    let runtime = Runtime::start(config).unwrap();
    common::wait_for_nodes(&runtime, "echo", 1).await;

    let err = runtime.dispatcher().acquire("swrr", "echo").await.unwrap_err();
    assert!(matches!(err, DispatchError::Pool(PoolError::Connect(_))));

    runtime.stop().await;
}

#[tokio::test]
async fn pool_over_tcp_opens_initial_connections_eagerly() {
    let backend = common::start_echo_backend().await;
    let addr = backend.addr;

    let pool = ConnectionPool::new(
        move || TcpStream::connect(addr),
        PoolConfig::new(2, 4, Duration::from_secs(60)),
    )
    .await
    .unwrap();

    assert_eq!(pool.available(), 2);
    assert_eq!(pool.open_count(), 2);
    assert!(common::eventually(|| backend.accepted() == 2).await);

    let mut conn = pool.get().await.unwrap();
    assert_eq!(common::ping(&mut conn).await.unwrap(), b"ping\n");
    pool.put(conn);
    assert_eq!(pool.available(), 2);

    pool.close();
    assert!(matches!(pool.get().await, Err(PoolError::Closed)));
}

#[tokio::test]
async fn stop_closes_pools() {
    let a = common::start_echo_backend().await;

    let mut config = DispatchConfig::default();
    config.nodes = vec![a.node("a", "echo", 1)];
    let runtime = Runtime::start(config).unwrap();
    common::wait_for_nodes(&runtime, "echo", 1).await;
    runtime.dispatcher().call("swrr", "echo", common::ping).await.unwrap();

    let dispatcher = std::sync::Arc::clone(runtime.dispatcher());
    runtime.stop().await;

    assert!(dispatcher.is_closed());
    assert!(dispatcher.stats().is_empty());
    let err = dispatcher.call("swrr", "echo", common::ping).await.unwrap_err();
    assert!(matches!(err, DispatchError::Pool(PoolError::Closed)));
}
