use futures_util::future::BoxFuture;
use crate::pool::{BoxError, Connection};

/// Opens connections to an arbitrary node address.
///
/// The dispatcher derives one pool factory per address from a connector.
pub trait Connector: Send + Sync + 'static {
    type Conn: Connection;

    fn connect(&self, address: &str) -> BoxFuture<'static, Result<Self::Conn, BoxError>>;
}
