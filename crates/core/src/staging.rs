//! Staging table column catalog.
//!
//! Shared by the DDL and the bulk loader so the copy projection always lines
//! up with the table it lands in. Every staging column is nullable: staging
//! is the landing zone for unvalidated data.

/// Scalar type of a staging column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Int32,
    Int64,
    Float64,
}

impl ColumnType {
    /// ClickHouse type name.
    pub fn sql(&self) -> &'static str {
        match self {
            Self::Text => "String",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::Float64 => "Float64",
        }
    }
}

/// A column of a staging table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagingColumn {
    pub name: &'static str,
    pub ty: ColumnType,
}

impl StagingColumn {
    const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self { name, ty }
    }

    /// Column type as declared in staging DDL.
    pub fn nullable_type(&self) -> String {
        format!("Nullable({})", self.ty.sql())
    }

    /// Whether empty/blank values should be coerced to NULL on load.
    pub fn is_text(&self) -> bool {
        self.ty == ColumnType::Text
    }
}

use ColumnType::*;

/// Columns of `staging_logs`, in JSONPaths order.
pub const STAGING_LOG_COLUMNS: &[StagingColumn] = &[
    StagingColumn::new("artist", Text),
    StagingColumn::new("auth", Text),
    StagingColumn::new("firstName", Text),
    StagingColumn::new("gender", Text),
    StagingColumn::new("itemInSession", Int32),
    StagingColumn::new("lastName", Text),
    StagingColumn::new("length", Float64),
    StagingColumn::new("level", Text),
    StagingColumn::new("location", Text),
    StagingColumn::new("method", Text),
    StagingColumn::new("page", Text),
    StagingColumn::new("registration", Float64),
    StagingColumn::new("sessionId", Int32),
    StagingColumn::new("song", Text),
    StagingColumn::new("status", Int32),
    StagingColumn::new("ts", Int64),
    StagingColumn::new("userAgent", Text),
    StagingColumn::new("userId", Int32),
];

/// Columns of `staging_songs`, matched by field name on load.
pub const STAGING_SONG_COLUMNS: &[StagingColumn] = &[
    StagingColumn::new("artist_id", Text),
    StagingColumn::new("artist_latitude", Float64),
    StagingColumn::new("artist_location", Text),
    StagingColumn::new("artist_longitude", Float64),
    StagingColumn::new("artist_name", Text),
    StagingColumn::new("duration", Float64),
    StagingColumn::new("num_songs", Int32),
    StagingColumn::new("song_id", Text),
    StagingColumn::new("title", Text),
    StagingColumn::new("year", Int32),
];

/// Log columns that must be non-null before transformation.
pub const STAGING_LOG_REQUIRED: &[&str] = &["userId", "sessionId", "ts"];

/// Song columns that must be non-null before transformation.
pub const STAGING_SONG_REQUIRED: &[&str] = &["song_id", "artist_id"];

/// Render a column list as a ClickHouse structure string
/// (`name Nullable(T), ...`).
pub fn structure(columns: &[StagingColumn]) -> String {
    columns
        .iter()
        .map(|c| format!("{} {}", c.name, c.nullable_type()))
        .collect::<Vec<_>>()
        .join(", ")
}
