//! Testcontainer setup for ClickHouse.
//!
//! Set `WAREHOUSE_TEST_CLICKHOUSE_URL` to run against an existing server
//! instead of starting a container.

use std::time::Duration;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};
use url::Url;

/// Where the test ClickHouse server listens.
pub struct TestContainers {
    #[allow(dead_code)]
    clickhouse: Option<ContainerAsync<GenericImage>>,
    pub clickhouse_host: String,
    pub clickhouse_port: u16,
    pub clickhouse_secure: bool,
    pub clickhouse_username: Option<String>,
    pub clickhouse_password: Option<String>,
}

impl TestContainers {
    /// Start ClickHouse container, or point at the external server.
    pub async fn start() -> Self {
        if let Some(raw) = std::env::var("WAREHOUSE_TEST_CLICKHOUSE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
        {
            let url = Url::parse(&raw).expect("WAREHOUSE_TEST_CLICKHOUSE_URL is not a URL");
            return Self {
                clickhouse: None,
                clickhouse_host: url.host_str().unwrap_or("localhost").to_string(),
                clickhouse_port: url.port_or_known_default().unwrap_or(8123),
                clickhouse_secure: url.scheme() == "https",
                clickhouse_username: std::env::var("WAREHOUSE_TEST_CLICKHOUSE_USER").ok(),
                clickhouse_password: std::env::var("WAREHOUSE_TEST_CLICKHOUSE_PASSWORD").ok(),
            };
        }

        let (clickhouse, port) = start_clickhouse().await;

        Self {
            clickhouse: Some(clickhouse),
            clickhouse_host: "127.0.0.1".to_string(),
            clickhouse_port: port,
            clickhouse_secure: false,
            clickhouse_username: Some("default".to_string()),
            clickhouse_password: None,
        }
    }
}

/// Start ClickHouse container, return container and mapped HTTP port.
pub async fn start_clickhouse() -> (ContainerAsync<GenericImage>, u16) {
    // CLICKHOUSE_DEFAULT_ACCESS_MANAGEMENT=1 lets the default user create databases
    let image = GenericImage::new("clickhouse/clickhouse-server", "24.3")
        .with_wait_for(WaitFor::seconds(5))
        .with_exposed_port(8123.tcp())
        .with_env_var("CLICKHOUSE_DEFAULT_ACCESS_MANAGEMENT", "1")
        .with_env_var("CLICKHOUSE_USER", "default")
        .with_env_var("CLICKHOUSE_PASSWORD", "");

    let container = image.start().await.expect("Failed to start ClickHouse");

    let port = container.get_host_port_ipv4(8123).await.unwrap();
    let url = format!("http://127.0.0.1:{}", port);

    wait_for_http(&url, Duration::from_secs(30)).await;

    (container, port)
}

/// Wait for HTTP endpoint to respond.
async fn wait_for_http(url: &str, timeout: Duration) {
    let client = reqwest::Client::new();
    let start = std::time::Instant::now();

    while start.elapsed() < timeout {
        if let Ok(resp) = client.get(url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    panic!("HTTP endpoint {} not ready after {:?}", url, timeout);
}
