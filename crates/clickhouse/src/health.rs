//! ClickHouse health checks.

use crate::client::ClickHouseClient;
use tracing::{debug, error};
use warehouse_core::{ConnectionErrorCode, Error, Result};

/// Check ClickHouse connection health.
pub async fn check_connection(client: &ClickHouseClient) -> bool {
    match client.inner().query("SELECT 1").fetch_one::<u8>().await {
        Ok(_) => {
            debug!("ClickHouse connection healthy");
            true
        }
        Err(e) => {
            error!("ClickHouse health check failed: {}", e);
            false
        }
    }
}

/// Fail fast before any statement runs when the cluster is unreachable.
pub async fn ensure_connection(client: &ClickHouseClient) -> Result<()> {
    if check_connection(client).await {
        Ok(())
    } else {
        Err(Error::connection(
            ConnectionErrorCode::Unreachable,
            format!("cannot reach ClickHouse at {}", client.config().url()),
        ))
    }
}
