//! Sparkify warehouse ETL
//!
//! Batch pipeline that provisions a star schema on ClickHouse and fills it
//! from song metadata and listening-event logs in S3:
//! - `create-tables`: drop and recreate all seven tables
//! - `etl`: bulk-load staging, purge null keys, merge into the star schema

pub mod settings;

use anyhow::{Context, Result};
use clickhouse_client::{health::ensure_connection, ClickHouseClient};
use pipeline::DryRun;
use tracing::info;
use warehouse_core::Warehouse;

pub use settings::Settings;

/// Open the warehouse the settings describe.
///
/// In dry-run mode nothing is contacted; otherwise the cluster must answer a
/// health check before any statement runs.
pub async fn connect(settings: &Settings) -> Result<Box<dyn Warehouse>> {
    if settings.pipeline.dry_run {
        info!("Dry run: statements are logged, not executed");
        return Ok(Box::new(DryRun::new()));
    }

    let client = ClickHouseClient::new(settings.clickhouse())
        .context("Failed to create ClickHouse client")?;
    ensure_connection(&client)
        .await
        .context("ClickHouse health check failed")?;

    info!(
        url = %client.config().url(),
        database = %client.config().database,
        "Connected to ClickHouse"
    );
    Ok(Box::new(client))
}
