//! The two operator entry points: schema rebuild and the ETL run.

use std::time::Instant;

use clickhouse_client::schema::{create_all, drop_all};
use tracing::info;
use warehouse_core::{Result, Target, Warehouse};

use crate::loader::{clean_staging, load_raw};
use crate::source::LoadPlan;
use crate::transform::transform_all;
use crate::verify::verify_unique_keys;

/// Knobs for an ETL run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Check natural-key uniqueness after the transform.
    pub verify: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self { verify: true }
    }
}

/// What an ETL run did.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Rows added per target, in transform order.
    pub inserted: Vec<(Target, u64)>,
    pub elapsed_ms: u64,
}

impl RunSummary {
    pub fn total_inserted(&self) -> u64 {
        self.inserted.iter().map(|(_, rows)| rows).sum()
    }
}

/// Drop every table, then create the full schema.
///
/// Loaded data does not survive this.
pub async fn rebuild_schema<W: Warehouse + ?Sized>(warehouse: &W) -> Result<()> {
    drop_all(warehouse).await?;
    create_all(warehouse).await?;
    info!("Schema rebuilt");
    Ok(())
}

/// Load staging, purge null keys, merge every target, optionally verify.
///
/// Any failure aborts the run; nothing is retried.
pub async fn run_etl<W: Warehouse + ?Sized>(
    warehouse: &W,
    plan: &LoadPlan,
    options: PipelineOptions,
) -> Result<RunSummary> {
    let started = Instant::now();

    load_raw(warehouse, plan).await?;
    clean_staging(warehouse).await?;
    let inserted = transform_all(warehouse).await?;

    if options.verify {
        verify_unique_keys(warehouse).await?;
    }

    let summary = RunSummary {
        inserted,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        inserted = summary.total_inserted(),
        elapsed_ms = summary.elapsed_ms,
        "ETL Process Complete"
    );
    Ok(summary)
}
