//! Star-schema table definitions and the schema manager.
//!
//! Seven tables: two staging tables, four dimensions, one fact table.
//! - Target tables are MergeTree, sorted by their natural key
//! - Primary keys are declared but, as on any MergeTree, not enforced;
//!   uniqueness is the upsert transformer's job
//! - ClickHouse has no FOREIGN KEY DDL, so songplays references are recorded
//!   as column comments
//! - Timestamps are DateTime64(3, 'UTC'), matching the millisecond epoch `ts`

use telemetry::Progress;
use warehouse_core::{
    staging::{StagingColumn, STAGING_LOG_COLUMNS, STAGING_SONG_COLUMNS},
    Result, Stage, Warehouse, DROP_ORDER, STAGING_LOGS, STAGING_SONGS,
};

/// SQL for creating the users dimension.
pub const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    user_id Int32,
    first_name Nullable(String),
    last_name Nullable(String),
    gender Nullable(String),
    level Nullable(String)
)
ENGINE = MergeTree()
PRIMARY KEY user_id
ORDER BY user_id
"#;

/// SQL for creating the songs dimension.
pub const CREATE_SONGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS songs (
    song_id String,
    title Nullable(String),
    artist_id Nullable(String),
    year Nullable(Int32),
    duration Nullable(Float64)
)
ENGINE = MergeTree()
PRIMARY KEY song_id
ORDER BY song_id
"#;

/// SQL for creating the artists dimension.
pub const CREATE_ARTISTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS artists (
    artist_id String,
    name Nullable(String),
    location Nullable(String),
    latitude Nullable(Float64),
    longitude Nullable(Float64)
)
ENGINE = MergeTree()
PRIMARY KEY artist_id
ORDER BY artist_id
"#;

/// SQL for creating the time dimension.
///
/// Calendar fields are derived from songplay start times; weekday counts
/// from Sunday = 0.
pub const CREATE_TIME_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS time (
    start_time DateTime64(3, 'UTC'),
    hour UInt8,
    day UInt8,
    week UInt8,
    month UInt8,
    year UInt16,
    weekday UInt8
)
ENGINE = MergeTree()
PRIMARY KEY start_time
ORDER BY start_time
"#;

/// SQL for creating the songplays fact table.
///
/// `songplay_id` is a surrogate key; the sorting key is the natural key
/// `(start_time, user_id, session_id)`.
pub const CREATE_SONGPLAYS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS songplays (
    songplay_id UInt64,
    start_time DateTime64(3, 'UTC') COMMENT 'references time (start_time)',
    user_id Int32 COMMENT 'references users (user_id)',
    level String,
    song_id Nullable(String) COMMENT 'references songs (song_id)',
    artist_id Nullable(String) COMMENT 'references artists (artist_id)',
    session_id Int32,
    location String,
    user_agent String
)
ENGINE = MergeTree()
PRIMARY KEY (start_time, user_id, session_id)
ORDER BY (start_time, user_id, session_id)
"#;

/// SQL for creating a staging table from its column catalog.
///
/// Staging tables are MergeTree (not Memory) so the null purge can run as a
/// mutation.
pub fn create_staging_table(table: &str, columns: &[StagingColumn]) -> String {
    let body = columns
        .iter()
        .map(|c| format!("    {} {}", c.name, c.nullable_type()))
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        "\nCREATE TABLE IF NOT EXISTS {} (\n{}\n)\nENGINE = MergeTree()\nORDER BY tuple()\n",
        table, body
    )
}

/// All table creation statements.
pub fn create_table_statements() -> Vec<String> {
    vec![
        create_staging_table(STAGING_LOGS, STAGING_LOG_COLUMNS),
        create_staging_table(STAGING_SONGS, STAGING_SONG_COLUMNS),
        CREATE_USERS_TABLE.to_string(),
        CREATE_SONGS_TABLE.to_string(),
        CREATE_ARTISTS_TABLE.to_string(),
        CREATE_TIME_TABLE.to_string(),
        CREATE_SONGPLAYS_TABLE.to_string(),
    ]
}

/// All table drop statements, fact before dimensions.
pub fn drop_table_statements() -> Vec<String> {
    DROP_ORDER
        .iter()
        .map(|table| format!("DROP TABLE IF EXISTS {}", table))
        .collect()
}

/// Drop every table, tolerating tables that do not exist.
pub async fn drop_all<W: Warehouse + ?Sized>(warehouse: &W) -> Result<()> {
    let statements = drop_table_statements();
    let mut progress = Progress::new("Dropping (IF EXISTS)", "Tables", statements.len());

    for sql in &statements {
        warehouse
            .execute(sql)
            .await
            .map_err(|e| e.in_stage(Stage::Schema))?;
        progress.complete();
    }

    Ok(())
}

/// Create every table that does not exist yet.
pub async fn create_all<W: Warehouse + ?Sized>(warehouse: &W) -> Result<()> {
    let statements = create_table_statements();
    let mut progress = Progress::new("Creating", "Tables", statements.len());

    for sql in &statements {
        warehouse
            .execute(sql)
            .await
            .map_err(|e| e.in_stage(Stage::Schema))?;
        progress.complete();
    }

    Ok(())
}
