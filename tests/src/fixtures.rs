//! Staging rows for seeding tests.
//!
//! Field names follow the staging column names so the `clickhouse` inserter
//! can write them directly; unset fields land as NULL.

use clickhouse::Row;
use serde::Serialize;

/// Sunday 2018-11-04 00:00:00 UTC in epoch milliseconds.
pub const SUNDAY_MIDNIGHT_MS: i64 = 1_541_289_600_000;

/// A row of `staging_logs`.
#[derive(Debug, Clone, Default, Row, Serialize)]
pub struct LogEvent {
    pub artist: Option<String>,
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    pub gender: Option<String>,
    #[serde(rename = "lastName")]
    pub last_name: Option<String>,
    pub length: Option<f64>,
    pub level: Option<String>,
    pub location: Option<String>,
    pub page: Option<String>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<i32>,
    pub song: Option<String>,
    pub ts: Option<i64>,
    #[serde(rename = "userAgent")]
    pub user_agent: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<i32>,
}

/// A `NextSong` event from a free user with a fixed identity.
pub fn next_song(user_id: i32, ts: i64) -> LogEvent {
    LogEvent {
        first_name: Some("Lily".to_string()),
        last_name: Some("Koch".to_string()),
        gender: Some("F".to_string()),
        level: Some("free".to_string()),
        location: Some("Chicago-Naperville-Elgin, IL-IN-WI".to_string()),
        page: Some("NextSong".to_string()),
        session_id: Some(1),
        ts: Some(ts),
        user_agent: Some("Mozilla/5.0".to_string()),
        user_id: Some(user_id),
        ..Default::default()
    }
}

impl LogEvent {
    pub fn level(mut self, level: &str) -> Self {
        self.level = Some(level.to_string());
        self
    }

    pub fn session(mut self, session_id: i32) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn page(mut self, page: &str) -> Self {
        self.page = Some(page.to_string());
        self
    }

    /// Set the played song as reported by the player.
    pub fn playing(mut self, song: &str, artist: &str, length: f64) -> Self {
        self.song = Some(song.to_string());
        self.artist = Some(artist.to_string());
        self.length = Some(length);
        self
    }
}

/// A row of `staging_songs`.
#[derive(Debug, Clone, Default, Row, Serialize)]
pub struct SongMeta {
    pub artist_id: Option<String>,
    pub artist_latitude: Option<f64>,
    pub artist_location: Option<String>,
    pub artist_longitude: Option<f64>,
    pub artist_name: Option<String>,
    pub duration: Option<f64>,
    pub num_songs: Option<i32>,
    pub song_id: Option<String>,
    pub title: Option<String>,
    pub year: Option<i32>,
}

/// Song metadata with every field set.
pub fn song(song_id: &str, title: &str, artist_id: &str, artist_name: &str, duration: f64) -> SongMeta {
    SongMeta {
        artist_id: Some(artist_id.to_string()),
        artist_latitude: None,
        artist_location: Some("Hamtramck, MI".to_string()),
        artist_longitude: None,
        artist_name: Some(artist_name.to_string()),
        duration: Some(duration),
        num_songs: Some(1),
        song_id: Some(song_id.to_string()),
        title: Some(title.to_string()),
        year: Some(2004),
    }
}

impl SongMeta {
    pub fn located(mut self, location: &str) -> Self {
        self.artist_location = Some(location.to_string());
        self
    }
}
