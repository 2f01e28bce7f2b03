//! Dry-run warehouse: logs and records statements instead of executing them.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;
use warehouse_core::{Result, Warehouse};

/// Warehouse that executes nothing.
///
/// Every statement is logged and kept in order; counts come back as 0.
#[derive(Default)]
pub struct DryRun {
    executed: Mutex<Vec<String>>,
    queried: Mutex<Vec<String>>,
}

impl DryRun {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statements passed to `execute`, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }

    /// Queries passed to `fetch_count`, in order.
    pub fn queried(&self) -> Vec<String> {
        self.queried.lock().clone()
    }
}

#[async_trait]
impl Warehouse for DryRun {
    async fn execute(&self, sql: &str) -> Result<()> {
        info!(dry_run = true, "{}", sql.trim());
        self.executed.lock().push(sql.trim().to_string());
        Ok(())
    }

    async fn fetch_count(&self, sql: &str) -> Result<u64> {
        self.queried.lock().push(sql.trim().to_string());
        Ok(0)
    }
}
