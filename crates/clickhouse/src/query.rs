//! Query functions for reading data back (used in verification and tests).

use crate::client::ClickHouseClient;
use clickhouse::Row;
use serde::Deserialize;
use warehouse_core::{Error, Result, Target, Warehouse};

/// Row of the users dimension.
#[derive(Debug, Clone, PartialEq, Row, Deserialize)]
pub struct UserRow {
    pub user_id: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
}

/// Row of the songs dimension.
#[derive(Debug, Clone, PartialEq, Row, Deserialize)]
pub struct SongRow {
    pub song_id: String,
    pub title: Option<String>,
    pub artist_id: Option<String>,
    pub year: Option<i32>,
    pub duration: Option<f64>,
}

/// Row of the artists dimension.
#[derive(Debug, Clone, PartialEq, Row, Deserialize)]
pub struct ArtistRow {
    pub artist_id: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Row of the songplays fact table.
#[derive(Debug, Clone, PartialEq, Row, Deserialize)]
pub struct SongplayRow {
    pub songplay_id: u64,
    pub start_time: i64, // DateTime64(3) as milliseconds
    pub user_id: i32,
    pub level: String,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: i32,
    pub location: String,
    pub user_agent: String,
}

/// Row of the time dimension.
#[derive(Debug, Clone, PartialEq, Row, Deserialize)]
pub struct TimeRow {
    pub start_time: i64, // DateTime64(3) as milliseconds
    pub hour: u8,
    pub day: u8,
    pub week: u8,
    pub month: u8,
    pub year: u16,
    pub weekday: u8,
}

/// SQL counting rows whose natural key is shared with another row.
pub fn duplicate_keys_sql(target: Target) -> String {
    let key = target.natural_key().join(", ");
    format!(
        "SELECT toUInt64(count() - uniqExact({})) FROM {}",
        key,
        target.table()
    )
}

/// Count rows in a table.
pub async fn count_rows<W: Warehouse + ?Sized>(warehouse: &W, table: &str) -> Result<u64> {
    warehouse
        .fetch_count(&format!("SELECT count() FROM {}", table))
        .await
}

/// Count surplus rows sharing a natural key in a target table.
pub async fn count_duplicate_keys<W: Warehouse + ?Sized>(
    warehouse: &W,
    target: Target,
) -> Result<u64> {
    warehouse.fetch_count(&duplicate_keys_sql(target)).await
}

/// Count staging rows where any of the given columns is NULL.
pub async fn count_null_keys<W: Warehouse + ?Sized>(
    warehouse: &W,
    table: &str,
    columns: &[&str],
) -> Result<u64> {
    let predicate = columns
        .iter()
        .map(|c| format!("{} IS NULL", c))
        .collect::<Vec<_>>()
        .join(" OR ");
    warehouse
        .fetch_count(&format!("SELECT count() FROM {} WHERE {}", table, predicate))
        .await
}

/// Fetch all users ordered by id.
pub async fn query_users(client: &ClickHouseClient) -> Result<Vec<UserRow>> {
    client
        .inner()
        .query("SELECT user_id, first_name, last_name, gender, level FROM users ORDER BY user_id")
        .fetch_all()
        .await
        .map_err(|e| Error::query(format!("Query error: {}", e)))
}

/// Fetch all songs ordered by id.
pub async fn query_songs(client: &ClickHouseClient) -> Result<Vec<SongRow>> {
    client
        .inner()
        .query("SELECT song_id, title, artist_id, year, duration FROM songs ORDER BY song_id")
        .fetch_all()
        .await
        .map_err(|e| Error::query(format!("Query error: {}", e)))
}

/// Fetch all artists ordered by id.
pub async fn query_artists(client: &ClickHouseClient) -> Result<Vec<ArtistRow>> {
    client
        .inner()
        .query(
            "SELECT artist_id, name, location, latitude, longitude FROM artists ORDER BY artist_id",
        )
        .fetch_all()
        .await
        .map_err(|e| Error::query(format!("Query error: {}", e)))
}

/// Fetch all songplays ordered by natural key.
pub async fn query_songplays(client: &ClickHouseClient) -> Result<Vec<SongplayRow>> {
    client
        .inner()
        .query(
            "SELECT songplay_id, start_time, user_id, level, song_id, artist_id, session_id, \
             location, user_agent FROM songplays ORDER BY start_time, user_id, session_id",
        )
        .fetch_all()
        .await
        .map_err(|e| Error::query(format!("Query error: {}", e)))
}

/// Fetch the time dimension ordered by start time.
pub async fn query_time(client: &ClickHouseClient) -> Result<Vec<TimeRow>> {
    client
        .inner()
        .query("SELECT start_time, hour, day, week, month, year, weekday FROM time ORDER BY start_time")
        .fetch_all()
        .await
        .map_err(|e| Error::query(format!("Query error: {}", e)))
}
