//! Common test setup functions.

use clickhouse::Row;
use clickhouse_client::{ClickHouseClient, ClickHouseConfig};
use pipeline::rebuild_schema;
use serde::Serialize;
use warehouse_core::{Result, Warehouse, STAGING_LOGS, STAGING_SONGS};

use crate::containers::TestContainers;
use crate::fixtures::{LogEvent, SongMeta};

/// Real ClickHouse with a freshly built schema in a database of its own.
pub struct TestContext {
    pub containers: TestContainers,
    pub clickhouse: ClickHouseClient,
}

impl TestContext {
    /// Start (or reach) ClickHouse, create a unique database and the schema.
    pub async fn new() -> Self {
        let containers = TestContainers::start().await;

        let database = format!("sparkify_{}", uuid::Uuid::new_v4().simple());
        let config = |database: &str| ClickHouseConfig {
            host: containers.clickhouse_host.clone(),
            port: containers.clickhouse_port,
            database: database.to_string(),
            username: containers.clickhouse_username.clone(),
            password: containers.clickhouse_password.clone(),
            secure: containers.clickhouse_secure,
        };

        let admin = ClickHouseClient::new(config("default")).expect("Failed to create admin client");
        admin
            .execute(&format!("CREATE DATABASE IF NOT EXISTS {}", database))
            .await
            .expect("Failed to create test database");

        let clickhouse =
            ClickHouseClient::new(config(&database)).expect("Failed to create ClickHouse client");
        rebuild_schema(&clickhouse)
            .await
            .expect("Failed to initialize schema");

        Self {
            containers,
            clickhouse,
        }
    }

    /// Insert rows into `staging_logs`.
    pub async fn seed_logs(&self, events: &[LogEvent]) {
        insert_rows(&self.clickhouse, STAGING_LOGS, events)
            .await
            .expect("Failed to seed staging_logs");
    }

    /// Insert rows into `staging_songs`.
    pub async fn seed_songs(&self, songs: &[SongMeta]) {
        insert_rows(&self.clickhouse, STAGING_SONGS, songs)
            .await
            .expect("Failed to seed staging_songs");
    }

    /// Empty both staging tables, as a fresh batch would find them.
    pub async fn clear_staging(&self) {
        for table in [STAGING_LOGS, STAGING_SONGS] {
            self.clickhouse
                .execute(&format!("TRUNCATE TABLE {}", table))
                .await
                .expect("Failed to truncate staging");
        }
    }

    pub async fn count(&self, sql: &str) -> u64 {
        self.clickhouse.fetch_count(sql).await.expect("Count failed")
    }
}

async fn insert_rows<T: Row + Serialize>(
    client: &ClickHouseClient,
    table: &str,
    rows: &[T],
) -> Result<()> {
    let to_err = |e: clickhouse::error::Error| warehouse_core::Error::query(e.to_string());

    let mut insert = client.inner().insert(table).map_err(to_err)?;
    for row in rows {
        insert.write(row).await.map_err(to_err)?;
    }
    insert.end().await.map_err(to_err)
}
