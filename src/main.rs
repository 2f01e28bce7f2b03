//! `etl`: load staging from S3 and merge it into the star schema.

use anyhow::{Context, Result};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use pipeline::{run_etl, LoadPlan};
use telemetry::init_tracing_from_env;
use warehouse_etl::{connect, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    let run_id = Uuid::new_v4();
    run()
        .instrument(info_span!("etl", run_id = %run_id))
        .await
}

async fn run() -> Result<()> {
    info!("Starting Sparkify ETL v{}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load()?;
    let warehouse = connect(&settings).await?;

    let plan = LoadPlan::resolve(&settings.sources(), settings.credentials())
        .await
        .context("Failed to resolve load sources")?;

    let summary = run_etl(warehouse.as_ref(), &plan, settings.pipeline_options())
        .await
        .context("ETL run failed")?;

    for (target, rows) in &summary.inserted {
        info!(target_table = %target, inserted = rows, "Target summary");
    }
    Ok(())
}
