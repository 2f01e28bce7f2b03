//! ClickHouse configuration.

use serde::{Deserialize, Serialize};

/// ClickHouse connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickHouseConfig {
    /// Cluster host name
    pub host: String,
    /// HTTP(S) interface port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Database name
    #[serde(default = "default_database")]
    pub database: String,
    /// Username (optional)
    pub username: Option<String>,
    /// Password (optional)
    pub password: Option<String>,
    /// Use https instead of http
    #[serde(default)]
    pub secure: bool,
}

fn default_port() -> u16 {
    8123
}

fn default_database() -> String {
    "sparkify".to_string()
}

impl ClickHouseConfig {
    /// HTTP URL of the cluster.
    pub fn url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: default_port(),
            database: default_database(),
            username: None,
            password: None,
            secure: false,
        }
    }
}
