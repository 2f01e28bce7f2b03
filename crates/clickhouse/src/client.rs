//! ClickHouse client wrapper.

use crate::config::ClickHouseConfig;
use async_trait::async_trait;
use clickhouse::Client;
use tracing::{debug, info};
use warehouse_core::{Error, Result, Warehouse};

/// ClickHouse client wrapper.
#[derive(Clone)]
pub struct ClickHouseClient {
    inner: Client,
    config: ClickHouseConfig,
}

impl ClickHouseClient {
    /// Creates a new ClickHouse client.
    ///
    /// Mutations (`ALTER ... DELETE/UPDATE`) are made synchronous so that a
    /// statement has fully applied by the time it returns.
    pub fn new(config: ClickHouseConfig) -> Result<Self> {
        if config.host.trim().is_empty() {
            return Err(Error::config("clickhouse host is empty"));
        }

        let mut client = Client::default()
            .with_url(config.url())
            .with_database(&config.database)
            .with_option("mutations_sync", "2");

        if let Some(ref user) = config.username {
            client = client.with_user(user);
        }

        if let Some(ref pass) = config.password {
            client = client.with_password(pass);
        }

        info!(
            url = %config.url(),
            database = %config.database,
            "Created ClickHouse client"
        );

        Ok(Self {
            inner: client,
            config,
        })
    }

    /// Returns the inner clickhouse client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }
}

#[async_trait]
impl Warehouse for ClickHouseClient {
    async fn execute(&self, sql: &str) -> Result<()> {
        debug!(sql = %sql.trim(), "Executing statement");
        self.inner
            .query(sql)
            .execute()
            .await
            .map_err(|e| Error::query(format!("Statement error: {}", e)))
    }

    async fn fetch_count(&self, sql: &str) -> Result<u64> {
        self.inner
            .query(sql)
            .fetch_one::<u64>()
            .await
            .map_err(|e| Error::query(format!("Query error: {}", e)))
    }

    fn database(&self) -> Option<&str> {
        Some(self.config.database.as_str()).filter(|db| !db.trim().is_empty())
    }
}
