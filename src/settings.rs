//! Operator configuration.
//!
//! Loaded from the INI file `dwh.cfg` (path overridable with
//! `WAREHOUSE_CONFIG`), then overridden by `WAREHOUSE_<SECTION>__<KEY>`
//! environment variables, then validated.

use anyhow::{Context, Result};
use clickhouse_client::ClickHouseConfig;
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File, FileFormat};
use pipeline::{PipelineOptions, S3Credentials, SourceConfig};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Default config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "dwh.cfg";

/// `[CLUSTER]`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ClusterSettings {
    #[validate(length(min = 1, message = "CLUSTER.HOST must not be empty"))]
    pub host: String,
    #[validate(length(min = 1, message = "CLUSTER.DB_NAME must not be empty"))]
    pub db_name: String,
    pub db_user: Option<String>,
    pub db_password: Option<String>,
    #[serde(default = "default_port")]
    #[validate(range(min = 1, message = "CLUSTER.DB_PORT must be non-zero"))]
    pub db_port: u16,
    #[serde(default)]
    pub secure: bool,
}

fn default_port() -> u16 {
    8123
}

/// `[IAM_ROLE]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IamRoleSettings {
    /// Role ClickHouse assumes to read the bucket; unset for public data.
    pub arn: Option<String>,
}

/// `[S3]`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct S3Settings {
    #[validate(length(min = 1, message = "S3.LOG_DATA must not be empty"))]
    pub log_data: String,
    #[validate(length(min = 1, message = "S3.LOG_JSONPATH must not be empty"))]
    pub log_jsonpath: String,
    #[validate(length(min = 1, message = "S3.SONG_DATA must not be empty"))]
    pub song_data: String,
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    "us-west-2".to_string()
}

/// `[PIPELINE]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Log statements instead of executing them.
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_verify")]
    pub verify: bool,
}

fn default_verify() -> bool {
    true
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            dry_run: false,
            verify: default_verify(),
        }
    }
}

/// Everything both binaries need.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Settings {
    #[validate(nested)]
    pub cluster: ClusterSettings,
    #[serde(default)]
    pub iam_role: IamRoleSettings,
    #[validate(nested)]
    pub s3: S3Settings,
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

impl Settings {
    /// Load from the config file and environment.
    pub fn load() -> Result<Self> {
        let path =
            std::env::var("WAREHOUSE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let builder = config::Config::builder().add_source(
            File::with_name(&path)
                .format(FileFormat::Ini)
                .required(false),
        );

        Self::build(builder).with_context(|| format!("Failed to load configuration from {}", path))
    }

    /// Parse INI text, still applying environment overrides.
    pub fn from_ini(ini: &str) -> Result<Self> {
        Self::build(config::Config::builder().add_source(File::from_str(ini, FileFormat::Ini)))
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config = builder
            .add_source(
                Environment::with_prefix("WAREHOUSE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let settings: Settings = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        settings.validate().context("Invalid configuration")?;
        Ok(settings)
    }

    pub fn clickhouse(&self) -> ClickHouseConfig {
        ClickHouseConfig {
            host: self.cluster.host.clone(),
            port: self.cluster.db_port,
            database: self.cluster.db_name.clone(),
            username: non_blank(self.cluster.db_user.as_deref()),
            password: non_blank(self.cluster.db_password.as_deref()),
            secure: self.cluster.secure,
        }
    }

    pub fn sources(&self) -> SourceConfig {
        SourceConfig {
            log_data: self.s3.log_data.clone(),
            log_jsonpath: self.s3.log_jsonpath.clone(),
            song_data: self.s3.song_data.clone(),
            region: self.s3.region.clone(),
        }
    }

    pub fn credentials(&self) -> S3Credentials {
        S3Credentials::from_role_arn(self.iam_role.arn.as_deref())
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            verify: self.pipeline.verify,
        }
    }
}

/// `KEY=` in the INI file means unset.
fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
