//! Statement execution interface.

use async_trait::async_trait;

use crate::error::Result;

/// A warehouse the pipeline can run SQL against.
///
/// Each statement is committed on its own; there is no multi-statement
/// transaction. Implemented by the ClickHouse client and by the dry-run
/// recorder.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Execute a statement that returns no rows.
    async fn execute(&self, sql: &str) -> Result<()>;

    /// Run a query returning a single unsigned count.
    async fn fetch_count(&self, sql: &str) -> Result<u64>;

    /// Database the statements run in, when known.
    ///
    /// Mutations resolve some table references outside the session database,
    /// so plans qualify those with this name.
    fn database(&self) -> Option<&str> {
        None
    }
}

