//! Unified error types for the warehouse ETL.
//!
//! Error codes:
//! - CONN_001: Connection errors
//! - SCHEMA_001: Schema (DDL) errors
//! - LOAD_001-002: Bulk load errors
//! - TRANSFORM_001-002: Transform errors
//!
//! None of these are retried. Recovery is always a schema rebuild followed by
//! a full pipeline rerun.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Connection error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorCode {
    /// CONN_001: Warehouse unreachable or rejected credentials
    Unreachable,
}

impl ConnectionErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unreachable => "CONN_001",
        }
    }
}

/// Schema error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorCode {
    /// SCHEMA_001: DDL statement failed
    DdlFailed,
}

impl SchemaErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DdlFailed => "SCHEMA_001",
        }
    }
}

/// Bulk load error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadErrorCode {
    /// LOAD_001: Copy or clean statement failed
    CopyFailed,
    /// LOAD_002: Source location or JSONPaths descriptor is unusable
    InvalidSource,
}

impl LoadErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::CopyFailed => "LOAD_001",
            Self::InvalidSource => "LOAD_002",
        }
    }
}

/// Transform error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformErrorCode {
    /// TRANSFORM_001: Merge statement failed
    StatementFailed,
    /// TRANSFORM_002: Target table holds duplicate natural keys
    DuplicateKeys,
}

impl TransformErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::StatementFailed => "TRANSFORM_001",
            Self::DuplicateKeys => "TRANSFORM_002",
        }
    }
}

/// Unified error type for the warehouse ETL.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection error with code.
    #[error("[{code}] {message}")]
    Connection { code: &'static str, message: String },

    /// Schema error with code.
    #[error("[{code}] {message}")]
    Schema { code: &'static str, message: String },

    /// Bulk load error with code.
    #[error("[{code}] {message}")]
    Load { code: &'static str, message: String },

    /// Transform error with code.
    #[error("[{code}] {message}")]
    Transform { code: &'static str, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("query error: {0}")]
    Query(String),
}

impl Error {
    /// Create a connection error.
    pub fn connection(code: ConnectionErrorCode, msg: impl Into<String>) -> Self {
        Self::Connection {
            code: code.code(),
            message: msg.into(),
        }
    }

    /// Create a schema error.
    pub fn schema(code: SchemaErrorCode, msg: impl Into<String>) -> Self {
        Self::Schema {
            code: code.code(),
            message: msg.into(),
        }
    }

    /// Create a bulk load error.
    pub fn load(code: LoadErrorCode, msg: impl Into<String>) -> Self {
        Self::Load {
            code: code.code(),
            message: msg.into(),
        }
    }

    /// Create a transform error.
    pub fn transform(code: TransformErrorCode, msg: impl Into<String>) -> Self {
        Self::Transform {
            code: code.code(),
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::Connection { code, .. } => Some(code),
            Self::Schema { code, .. } => Some(code),
            Self::Load { code, .. } => Some(code),
            Self::Transform { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Re-tag a raw query failure as a failure of the pipeline stage that ran it.
    ///
    /// Already-coded errors pass through untouched.
    pub fn in_stage(self, stage: Stage) -> Self {
        let message = match self {
            Self::Query(message) => message,
            coded => return coded,
        };
        match stage {
            Stage::Schema => Self::schema(SchemaErrorCode::DdlFailed, message),
            Stage::Load => Self::load(LoadErrorCode::CopyFailed, message),
            Stage::Transform => Self::transform(TransformErrorCode::StatementFailed, message),
        }
    }
}

/// Pipeline stage a statement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Schema,
    Load,
    Transform,
}
