//! Physical connection factory used by the pool.

use strata_client::{BaseConnection, Result};

/// Creates physical connections for the pool.
///
/// Handshake, authentication and TLS are the connector's business; the pool
/// only asks for a ready-to-use connection whenever no idle one is
/// available.
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The physical connection type produced.
    type Connection: BaseConnection + 'static;

    /// Open a new connection.
    async fn connect(&self) -> Result<Self::Connection>;
}
