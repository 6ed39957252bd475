//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use futures_util::future::BoxFuture;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use rpc_dispatch::config::NodeConfig;
use rpc_dispatch::discovery::Node;
use rpc_dispatch::lifecycle::Runtime;
use rpc_dispatch::pool::BoxError;

/// A mock backend and the number of connections it has accepted.
pub struct MockBackend {
    pub addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn node(&self, id: &str, service: &str, weight: u32) -> NodeConfig {
        NodeConfig {
            id: id.to_string(),
            service: service.to_string(),
            address: self.addr.to_string(),
            weight,
        }
    }
}

/// Start a backend that echoes every byte it receives.
pub async fn start_echo_backend() -> MockBackend {
    start_backend(true).await
}

/// Start a backend that accepts and immediately hangs up.
#[allow(dead_code)]
pub async fn start_closing_backend() -> MockBackend {
    start_backend(false).await
}

async fn start_backend(echo: bool) -> MockBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if !echo {
                        drop(socket);
                        continue;
                    }
                    tokio::spawn(async move {
                        let mut buf = [0u8; 1024];
                        loop {
                            match socket.read(&mut buf).await {
                                Ok(0) | Err(_) => break,
                                Ok(n) => {
                                    if socket.write_all(&buf[..n]).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockBackend { addr, accepted }
}

/// Send `ping\n` and read the echo back.
pub fn ping(conn: &mut TcpStream) -> BoxFuture<'_, Result<Vec<u8>, BoxError>> {
    Box::pin(async move {
        conn.write_all(b"ping\n").await?;
        let mut buf = [0u8; 5];
        conn.read_exact(&mut buf).await?;
        Ok::<_, BoxError>(buf.to_vec())
    })
}

/// Wait until the balancer holds exactly `count` nodes for `service`.
pub async fn wait_for_nodes(runtime: &Runtime, service: &str, count: usize) -> Vec<Node> {
    for _ in 0..200 {
        if let Ok(nodes) = runtime.dispatcher().group().nodes("swrr", service) {
            if nodes.len() == count {
                return nodes;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("service {service} never reached {count} nodes");
}

/// Poll `check` until it holds or a second passes.
#[allow(dead_code)]
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}
