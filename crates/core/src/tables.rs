//! Table catalog for the star schema.
//!
//! Names, natural keys, and the orderings the pipeline depends on:
//! transforms run dimensions before the fact table and `time` last, drops
//! remove the fact table before the dimensions it references.

use std::fmt;

/// Staging table for raw event logs.
pub const STAGING_LOGS: &str = "staging_logs";

/// Staging table for raw song metadata.
pub const STAGING_SONGS: &str = "staging_songs";

/// A star-schema target table populated by the upsert transformer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Users,
    Songs,
    Artists,
    Songplays,
    Time,
}

impl Target {
    /// Transform order. Songplays resolve against songs and artists, and
    /// time is derived from committed songplays.
    pub const TRANSFORM_ORDER: [Target; 5] = [
        Target::Users,
        Target::Songs,
        Target::Artists,
        Target::Songplays,
        Target::Time,
    ];

    /// Table name in the warehouse.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Songs => "songs",
            Self::Artists => "artists",
            Self::Songplays => "songplays",
            Self::Time => "time",
        }
    }

    /// Columns forming the natural key.
    pub fn natural_key(&self) -> &'static [&'static str] {
        match self {
            Self::Users => &["user_id"],
            Self::Songs => &["song_id"],
            Self::Artists => &["artist_id"],
            Self::Songplays => &["start_time", "user_id", "session_id"],
            Self::Time => &["start_time"],
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Every table the schema manager owns, in drop order.
///
/// Staging first, then the fact table, then the dimensions it references.
pub const DROP_ORDER: [&str; 7] = [
    STAGING_LOGS,
    STAGING_SONGS,
    "songplays",
    "users",
    "songs",
    "artists",
    "time",
];
