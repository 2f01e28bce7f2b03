//! `create-tables`: drop and recreate the whole warehouse schema.

use anyhow::{Context, Result};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use pipeline::rebuild_schema;
use telemetry::init_tracing_from_env;
use warehouse_etl::{connect, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    let run_id = Uuid::new_v4();
    run()
        .instrument(info_span!("create_tables", run_id = %run_id))
        .await
}

async fn run() -> Result<()> {
    let settings = Settings::load()?;
    let warehouse = connect(&settings).await?;

    rebuild_schema(warehouse.as_ref())
        .await
        .context("Schema rebuild failed")?;

    info!(database = %settings.cluster.db_name, "Tables ready");
    Ok(())
}
