//! Plain TCP transport.

use std::io;
use std::time::Duration;
use futures_util::future::BoxFuture;
use tokio::net::TcpStream;
use crate::dispatch::Connector;
use crate::pool::{BoxError, Connection};

impl Connection for TcpStream {}

/// Opens TCP connections with a connect timeout.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
    nodelay: bool,
}

impl TcpConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            nodelay: true,
        }
    }

    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl Connector for TcpConnector {
    type Conn = TcpStream;

    fn connect(&self, address: &str) -> BoxFuture<'static, Result<TcpStream, BoxError>> {
        let address = address.to_string();
        let timeout = self.connect_timeout;
        let nodelay = self.nodelay;

        Box::pin(async move {
            let stream = tokio::time::timeout(timeout, TcpStream::connect(&address))
                .await
                .map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("connect to {address} timed out after {timeout:?}"),
                    )
                })??;
            stream.set_nodelay(nodelay)?;
            tracing::trace!(address = %address, "TCP connection established");
            Ok(stream)
        })
    }
}
