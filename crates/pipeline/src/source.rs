//! Bulk source locations and file-format descriptors.
//!
//! Raw data lives in object storage and is read server-side by ClickHouse's
//! `s3` table function. The event-log JSONPaths mapping is read client-side,
//! since it only decides how each staging column is extracted.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;
use warehouse_core::{Error, LoadErrorCode, Result, STAGING_LOGS, STAGING_LOG_COLUMNS, STAGING_SONGS};

/// Source locations for the two staging tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Event log prefix, e.g. `s3://udacity-dend/log_data`
    pub log_data: String,
    /// JSONPaths mapping for the event logs
    pub log_jsonpath: String,
    /// Song metadata prefix
    pub song_data: String,
    /// Bucket region
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    "us-west-2".to_string()
}

/// Credentials ClickHouse presents to object storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum S3Credentials {
    /// Assume an IAM role.
    Role(String),
    /// Public bucket, unsigned requests.
    Unsigned,
}

impl S3Credentials {
    pub fn from_role_arn(arn: Option<&str>) -> Self {
        match arn.map(str::trim).filter(|a| !a.is_empty()) {
            Some(arn) => Self::Role(arn.to_string()),
            None => Self::Unsigned,
        }
    }
}

/// A parsed source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    S3 { bucket: String, key: String },
    Http(String),
    Local(PathBuf),
}

impl SourceLocation {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(invalid_source("empty source location"));
        }

        match Url::parse(raw) {
            Ok(url) if url.scheme() == "s3" => {
                let bucket = url
                    .host_str()
                    .filter(|h| !h.is_empty())
                    .ok_or_else(|| invalid_source(format!("missing bucket in {}", raw)))?;
                Ok(Self::S3 {
                    bucket: bucket.to_string(),
                    key: url.path().trim_start_matches('/').to_string(),
                })
            }
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
                Ok(Self::Http(url.to_string()))
            }
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(Self::Local)
                .map_err(|_| invalid_source(format!("bad file url {}", raw))),
            Ok(url) => Err(invalid_source(format!(
                "unsupported scheme '{}' in {}",
                url.scheme(),
                raw
            ))),
            // No scheme: a plain filesystem path
            Err(_) => Ok(Self::Local(PathBuf::from(raw))),
        }
    }

    /// Virtual-hosted HTTPS URL for the object, if the location is remote.
    pub fn http_url(&self, region: &str) -> Option<String> {
        match self {
            Self::S3 { bucket, key } => Some(format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                bucket, region, key
            )),
            Self::Http(url) => Some(url.clone()),
            Self::Local(_) => None,
        }
    }

    /// URL ClickHouse reads a data set from. A prefix (a key without a file
    /// extension or glob) is expanded to every JSON file beneath it.
    pub fn data_url(&self, region: &str) -> Result<String> {
        let url = self.http_url(region).ok_or_else(|| {
            invalid_source("bulk sources must be s3:// or http(s):// locations")
        })?;

        let last = url.rsplit('/').next().unwrap_or_default();
        if last.contains('.') || last.contains('*') {
            Ok(url)
        } else {
            Ok(format!("{}/**.json", url.trim_end_matches('/')))
        }
    }
}

/// How a staging table's columns are read from its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFormat {
    /// Newline-delimited JSON, one key per staging column, in column order.
    JsonPaths(Vec<String>),
    /// JSON objects matched to staging columns by field name.
    JsonAuto,
}

/// One bulk copy source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkSource {
    pub table: &'static str,
    pub url: String,
    pub format: SourceFormat,
}

/// Everything the bulk loader needs: both sources plus credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPlan {
    pub logs: BulkSource,
    pub songs: BulkSource,
    pub credentials: S3Credentials,
}

impl LoadPlan {
    /// Resolve sources, fetching the JSONPaths mapping.
    pub async fn resolve(config: &SourceConfig, credentials: S3Credentials) -> Result<Self> {
        let location = SourceLocation::parse(&config.log_jsonpath)?;
        let document = fetch_document(&location, &config.region).await?;
        let keys = parse_jsonpaths(&document)?;
        info!(
            jsonpaths = %config.log_jsonpath,
            keys = keys.len(),
            "Resolved event log JSONPaths"
        );
        Self::from_parts(config, credentials, keys)
    }

    /// Build a plan from already-parsed JSONPaths keys.
    pub fn from_parts(
        config: &SourceConfig,
        credentials: S3Credentials,
        log_keys: Vec<String>,
    ) -> Result<Self> {
        if log_keys.len() != STAGING_LOG_COLUMNS.len() {
            return Err(invalid_source(format!(
                "JSONPaths lists {} paths but {} has {} columns",
                log_keys.len(),
                STAGING_LOGS,
                STAGING_LOG_COLUMNS.len()
            )));
        }

        let logs = BulkSource {
            table: STAGING_LOGS,
            url: SourceLocation::parse(&config.log_data)?.data_url(&config.region)?,
            format: SourceFormat::JsonPaths(log_keys),
        };
        let songs = BulkSource {
            table: STAGING_SONGS,
            url: SourceLocation::parse(&config.song_data)?.data_url(&config.region)?,
            format: SourceFormat::JsonAuto,
        };

        Ok(Self {
            logs,
            songs,
            credentials,
        })
    }

    /// Sources in load order.
    pub fn sources(&self) -> [&BulkSource; 2] {
        [&self.logs, &self.songs]
    }
}

#[derive(Debug, Deserialize)]
struct JsonPathsDocument {
    jsonpaths: Vec<String>,
}

/// A top-level JSONPath: `$['key']`, `$["key"]` or `$.key`.
static PATH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\$(?:\[\s*['"]([^'"]+)['"]\s*\]|\.([A-Za-z_][A-Za-z0-9_]*))$"#)
        .expect("valid JSONPath pattern")
});

/// Parse a JSONPaths document into top-level keys, in order.
///
/// Accepts `$['key']`, `$["key"]` and `$.key`; nested paths are rejected.
pub fn parse_jsonpaths(document: &str) -> Result<Vec<String>> {
    let doc: JsonPathsDocument = serde_json::from_str(document)
        .map_err(|e| invalid_source(format!("invalid JSONPaths document: {}", e)))?;

    doc.jsonpaths
        .iter()
        .map(|path| {
            let captures = PATH_PATTERN
                .captures(path.trim())
                .ok_or_else(|| invalid_source(format!("unsupported JSONPath {}", path)))?;
            let key = captures
                .get(1)
                .or_else(|| captures.get(2))
                .map(|m| m.as_str().to_string())
                .ok_or_else(|| invalid_source(format!("unsupported JSONPath {}", path)))?;
            Ok(key)
        })
        .collect()
}

async fn fetch_document(location: &SourceLocation, region: &str) -> Result<String> {
    match location {
        SourceLocation::Local(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| invalid_source(format!("cannot read {}: {}", path.display(), e))),
        remote => {
            let url = remote
                .http_url(region)
                .ok_or_else(|| invalid_source("JSONPaths location has no URL"))?;
            debug!(url = %url, "Fetching JSONPaths");
            let response = reqwest::get(&url)
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| invalid_source(format!("cannot fetch {}: {}", url, e)))?;
            response
                .text()
                .await
                .map_err(|e| invalid_source(format!("cannot read {}: {}", url, e)))
        }
    }
}

fn invalid_source(msg: impl Into<String>) -> Error {
    Error::load(LoadErrorCode::InvalidSource, msg)
}
