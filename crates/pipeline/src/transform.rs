//! Upsert transformer: cleaned staging -> star schema.
//!
//! MergeTree has no `INSERT ... ON CONFLICT`, so every target is merged
//! through transient tables:
//!
//! 1. Stage: project distinct candidate rows (plus derived columns) into a
//!    transient table.
//! 2. Dedup: `row_number()` partitioned by the natural key, ordered by the
//!    recency column descending and then every other column descending, keeps
//!    exactly one candidate per key even when timestamps tie.
//! 3. Anti-join: only candidates whose key is not already in the target are
//!    inserted, so replaying a merge never adds rows.
//! 4. Update (users only): the surviving candidate overwrites `level` on the
//!    existing row when name and gender match and the level differs.
//! 5. Cleanup: transient tables are dropped whether or not the merge worked.
//!
//! Targets must run in [`Target::TRANSFORM_ORDER`].

use clickhouse_client::query::count_rows;
use telemetry::Progress;
use tracing::{debug, info, warn};
use warehouse_core::{Result, Stage, Target, Warehouse, STAGING_LOGS, STAGING_SONGS};

use crate::sql::{descending, key_expr};

/// Separator between the parts of the songplay match key. Cannot occur in
/// titles or names, so `("ab", "c")` and `("a", "bc")` never collide.
pub const MATCH_KEY_SEPARATOR: &str = "\\x1f";

/// Phase of a merge a statement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Create and fill transient candidate tables.
    Stage,
    /// Resolve foreign references for fact candidates.
    Resolve,
    /// Deduplicate and anti-join insert into the target.
    Insert,
    /// Latest-wins update of mutable attributes.
    Update,
}

#[derive(Debug, Clone)]
pub struct MergeStep {
    pub phase: Phase,
    pub sql: String,
}

/// Ordered statements merging staging data into one target.
#[derive(Debug, Clone)]
pub struct MergePlan {
    pub target: Target,
    /// Tables created by the plan and dropped after it.
    pub transient: Vec<&'static str>,
    pub steps: Vec<MergeStep>,
}

impl MergePlan {
    fn new(target: Target) -> Self {
        Self {
            target,
            transient: Vec::new(),
            steps: Vec::new(),
        }
    }

    /// Create a Memory-engine transient table.
    fn transient(mut self, name: &'static str, columns: &[(&str, &str)]) -> Self {
        self.transient.push(name);
        self.step(Phase::Stage, create_transient(name, columns, "Memory"))
    }

    /// Join-engine copy of the level changes so the mutation can look up the
    /// new value per row.
    fn level_lookup(mut self) -> Self {
        self.transient.push("users_level_lookup");
        self.step(
            Phase::Update,
            create_transient(
                "users_level_lookup",
                &[("user_id", "Int32"), ("level", "Nullable(String)")],
                "Join(ANY, LEFT, user_id)",
            ),
        )
        .step(
            Phase::Update,
            "INSERT INTO users_level_lookup SELECT user_id, level FROM users_level_changes"
                .to_string(),
        )
    }

    fn step(mut self, phase: Phase, sql: String) -> Self {
        self.steps.push(MergeStep { phase, sql });
        self
    }

    /// Statements to drop the transient tables.
    pub fn cleanup_statements(&self) -> Vec<String> {
        self.transient
            .iter()
            .map(|table| format!("DROP TABLE IF EXISTS {}", table))
            .collect()
    }
}

fn create_transient(name: &str, columns: &[(&str, &str)], engine: &str) -> String {
    let body = columns
        .iter()
        .map(|(column, ty)| format!("{} {}", column, ty))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({}) ENGINE = {}", name, body, engine)
}

/// Dedup ordering: recency columns first, then every remaining non-key
/// column, all descending.
fn tiebreak<'a>(recency: &[&'a str], columns: &[&'a str], key: &[&str]) -> Vec<&'a str> {
    let mut order = recency.to_vec();
    order.extend(
        columns
            .iter()
            .copied()
            .filter(|c| !key.contains(c) && !recency.contains(c)),
    );
    order
}

/// Candidates ranked within their key; the survivor has `seqnum = 1`.
pub fn ranked_candidates(source: &str, key: &[&str], order_by: &[&str]) -> String {
    format!(
        "SELECT\n        *,\n        row_number() OVER (\n            PARTITION BY {}\n            ORDER BY {}\n        ) AS seqnum\n    FROM {}",
        key.join(", "),
        descending(order_by),
        source
    )
}

/// Deduplicated, anti-joined insert of new keys only.
struct InsertNew<'a> {
    target: &'a str,
    columns: &'a [&'a str],
    projection: Vec<String>,
    source: &'a str,
    key: &'a [&'a str],
    order_by: Vec<&'a str>,
}

impl InsertNew<'_> {
    fn render(&self) -> String {
        format!(
            "INSERT INTO {target} ({columns})\nSELECT {projection}\nFROM (\n    {ranked}\n)\nWHERE seqnum = 1\n  AND {key_expr} NOT IN (SELECT {key} FROM {target})",
            target = self.target,
            columns = self.columns.join(", "),
            projection = self.projection.join(", "),
            ranked = ranked_candidates(self.source, self.key, &self.order_by),
            key_expr = key_expr(self.key),
            key = self.key.join(", "),
        )
    }
}

/// `database.table`, or the bare name when the database is unknown.
fn qualified(database: Option<&str>, table: &str) -> String {
    match database {
        Some(database) => format!("{}.{}", database, table),
        None => table.to_string(),
    }
}

fn plain_projection(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

const USER_COLUMNS: &[&str] = &["user_id", "first_name", "last_name", "gender", "level"];
const USER_KEY: &[&str] = &["user_id"];

/// Users: latest event per user wins, both for new rows and for `level`.
///
/// The level mutation runs outside the session, so `joinGet` and the
/// changed-user subquery name their tables with `database`.
pub fn users_plan(database: Option<&str>) -> MergePlan {
    let table = Target::Users.table();
    let order_by = tiebreak(&["ts"], USER_COLUMNS, USER_KEY);

    let insert = InsertNew {
        target: table,
        columns: USER_COLUMNS,
        projection: plain_projection(USER_COLUMNS),
        source: "users_staging",
        key: USER_KEY,
        order_by: order_by.clone(),
    };

    MergePlan::new(Target::Users)
        .transient(
            "users_staging",
            &[
                ("user_id", "Int32"),
                ("first_name", "Nullable(String)"),
                ("last_name", "Nullable(String)"),
                ("gender", "Nullable(String)"),
                ("level", "Nullable(String)"),
                ("ts", "Int64"),
            ],
        )
        .step(
            Phase::Stage,
            format!(
                "INSERT INTO users_staging\nSELECT DISTINCT assumeNotNull(userId), firstName, lastName, gender, level, assumeNotNull(ts)\nFROM {}\nWHERE page = 'NextSong' AND userId IS NOT NULL AND ts IS NOT NULL",
                STAGING_LOGS
            ),
        )
        .transient(
            "users_level_changes",
            &[("user_id", "Int32"), ("level", "Nullable(String)")],
        )
        .step(Phase::Insert, insert.render())
        .step(
            Phase::Update,
            format!(
                "INSERT INTO users_level_changes\nSELECT st.user_id, st.level\nFROM (\n    {}\n) AS st\nINNER JOIN {} AS u ON st.user_id = u.user_id\nWHERE st.seqnum = 1\n  AND u.first_name = st.first_name\n  AND u.last_name = st.last_name\n  AND u.gender = st.gender\n  AND u.level != st.level",
                ranked_candidates("users_staging", USER_KEY, &order_by),
                table
            ),
        )
        .level_lookup()
        .step(
            Phase::Update,
            format!(
                "ALTER TABLE {} UPDATE level = joinGet('{}', 'level', user_id)\nWHERE user_id IN (SELECT user_id FROM {})",
                table,
                qualified(database, "users_level_lookup"),
                qualified(database, "users_level_changes")
            ),
        )
}

const SONG_COLUMNS: &[&str] = &["song_id", "title", "artist_id", "year", "duration"];
const SONG_KEY: &[&str] = &["song_id"];

/// Songs: insert-if-new, no recency signal.
pub fn songs_plan() -> MergePlan {
    let insert = InsertNew {
        target: Target::Songs.table(),
        columns: SONG_COLUMNS,
        projection: plain_projection(SONG_COLUMNS),
        source: "songs_staging",
        key: SONG_KEY,
        order_by: tiebreak(&[], SONG_COLUMNS, SONG_KEY),
    };

    MergePlan::new(Target::Songs)
        .transient(
            "songs_staging",
            &[
                ("song_id", "String"),
                ("title", "Nullable(String)"),
                ("artist_id", "Nullable(String)"),
                ("year", "Nullable(Int32)"),
                ("duration", "Nullable(Float64)"),
            ],
        )
        .step(
            Phase::Stage,
            format!(
                "INSERT INTO songs_staging\nSELECT DISTINCT assumeNotNull(song_id), title, artist_id, year, duration\nFROM {}\nWHERE song_id IS NOT NULL",
                STAGING_SONGS
            ),
        )
        .step(Phase::Insert, insert.render())
}

const ARTIST_COLUMNS: &[&str] = &["artist_id", "name", "location", "latitude", "longitude"];
const ARTIST_KEY: &[&str] = &["artist_id"];

/// Artists: insert-if-new, no recency signal.
pub fn artists_plan() -> MergePlan {
    let insert = InsertNew {
        target: Target::Artists.table(),
        columns: ARTIST_COLUMNS,
        projection: plain_projection(ARTIST_COLUMNS),
        source: "artists_staging",
        key: ARTIST_KEY,
        order_by: tiebreak(&[], ARTIST_COLUMNS, ARTIST_KEY),
    };

    MergePlan::new(Target::Artists)
        .transient(
            "artists_staging",
            &[
                ("artist_id", "String"),
                ("name", "Nullable(String)"),
                ("location", "Nullable(String)"),
                ("latitude", "Nullable(Float64)"),
                ("longitude", "Nullable(Float64)"),
            ],
        )
        .step(
            Phase::Stage,
            format!(
                "INSERT INTO artists_staging\nSELECT DISTINCT assumeNotNull(artist_id), artist_name, artist_location, artist_latitude, artist_longitude\nFROM {}\nWHERE artist_id IS NOT NULL",
                STAGING_SONGS
            ),
        )
        .step(Phase::Insert, insert.render())
}

const SONGPLAY_COLUMNS: &[&str] = &[
    "songplay_id",
    "start_time",
    "user_id",
    "level",
    "song_id",
    "artist_id",
    "session_id",
    "location",
    "user_agent",
];
const SONGPLAY_KEY: &[&str] = &["start_time", "user_id", "session_id"];
const SONGPLAY_RESOLVED_COLUMNS: &[&str] = &[
    "start_time",
    "user_id",
    "level",
    "song_id",
    "artist_id",
    "session_id",
    "location",
    "user_agent",
    "song",
    "artist",
    "length",
];

fn match_key(title: &str, artist: &str, duration: &str) -> String {
    let sep = format!("'{}'", MATCH_KEY_SEPARATOR);
    format!(
        "concat({}, {sep}, {}, {sep}, toString({}))",
        title,
        artist,
        duration,
        sep = sep
    )
}

/// Songplays: resolve song/artist by exact (title, artist name, duration)
/// match, then insert new natural keys with a hashed surrogate id.
///
/// `songplay_id` is `cityHash64` of the natural key, so reruns produce the
/// same id for the same play.
pub fn songplays_plan() -> MergePlan {
    let mut projection = vec!["cityHash64(start_time, user_id, session_id)".to_string()];
    projection.extend(plain_projection(&SONGPLAY_COLUMNS[1..]));

    let insert = InsertNew {
        target: Target::Songplays.table(),
        columns: SONGPLAY_COLUMNS,
        projection,
        source: "songplays_resolved",
        key: SONGPLAY_KEY,
        order_by: tiebreak(&[], SONGPLAY_RESOLVED_COLUMNS, SONGPLAY_KEY),
    };

    MergePlan::new(Target::Songplays)
        .transient(
            "songplays_staging",
            &[
                ("start_time", "DateTime64(3, 'UTC')"),
                ("user_id", "Int32"),
                ("level", "Nullable(String)"),
                ("session_id", "Int32"),
                ("location", "Nullable(String)"),
                ("user_agent", "Nullable(String)"),
                ("song", "Nullable(String)"),
                ("artist", "Nullable(String)"),
                ("length", "Nullable(Float64)"),
                ("match_key", "Nullable(String)"),
            ],
        )
        .step(
            Phase::Stage,
            format!(
                "INSERT INTO songplays_staging\nSELECT DISTINCT fromUnixTimestamp64Milli(assumeNotNull(ts), 'UTC'), assumeNotNull(userId), level, assumeNotNull(sessionId), location, userAgent, song, artist, length, {}\nFROM {}\nWHERE page = 'NextSong' AND userId IS NOT NULL AND sessionId IS NOT NULL AND ts IS NOT NULL",
                match_key("song", "artist", "length"),
                STAGING_LOGS
            ),
        )
        .transient(
            "songplays_catalog",
            &[
                ("song_id", "Nullable(String)"),
                ("artist_id", "Nullable(String)"),
                ("match_key", "String"),
            ],
        )
        .transient(
            "songplays_resolved",
            &[
                ("start_time", "DateTime64(3, 'UTC')"),
                ("user_id", "Int32"),
                ("level", "Nullable(String)"),
                ("song_id", "Nullable(String)"),
                ("artist_id", "Nullable(String)"),
                ("session_id", "Int32"),
                ("location", "Nullable(String)"),
                ("user_agent", "Nullable(String)"),
                ("song", "Nullable(String)"),
                ("artist", "Nullable(String)"),
                ("length", "Nullable(Float64)"),
            ],
        )
        .step(
            Phase::Resolve,
            format!(
                "INSERT INTO songplays_catalog\nSELECT DISTINCT s.song_id, a.artist_id, assumeNotNull({})\nFROM {} AS s\nINNER JOIN {} AS a ON s.artist_id = a.artist_id\nWHERE s.title IS NOT NULL AND a.name IS NOT NULL AND s.duration IS NOT NULL",
                match_key("s.title", "a.name", "s.duration"),
                Target::Songs.table(),
                Target::Artists.table()
            ),
        )
        .step(
            Phase::Resolve,
            "INSERT INTO songplays_resolved\nSELECT st.start_time, st.user_id, st.level, c.song_id, c.artist_id, st.session_id, st.location, st.user_agent, st.song, st.artist, st.length\nFROM songplays_staging AS st\nLEFT JOIN songplays_catalog AS c ON st.match_key = c.match_key\nSETTINGS join_use_nulls = 1"
                .to_string(),
        )
        .step(Phase::Insert, insert.render())
}

const TIME_COLUMNS: &[&str] = &[
    "start_time",
    "hour",
    "day",
    "week",
    "month",
    "year",
    "weekday",
];
const TIME_KEY: &[&str] = &["start_time"];

/// Time: calendar fields derived from committed songplay start times.
pub fn time_plan() -> MergePlan {
    let insert = InsertNew {
        target: Target::Time.table(),
        columns: TIME_COLUMNS,
        projection: plain_projection(TIME_COLUMNS),
        source: "time_staging",
        key: TIME_KEY,
        order_by: tiebreak(&[], TIME_COLUMNS, TIME_KEY),
    };

    MergePlan::new(Target::Time)
        .transient(
            "time_staging",
            &[
                ("start_time", "DateTime64(3, 'UTC')"),
                ("hour", "UInt8"),
                ("day", "UInt8"),
                ("week", "UInt8"),
                ("month", "UInt8"),
                ("year", "UInt16"),
                ("weekday", "UInt8"),
            ],
        )
        .step(
            Phase::Stage,
            format!(
                "INSERT INTO time_staging\nSELECT DISTINCT start_time, toHour(start_time), toDayOfMonth(start_time), toISOWeek(start_time), toMonth(start_time), toYear(start_time), toDayOfWeek(start_time) % 7\nFROM {}",
                Target::Songplays.table()
            ),
        )
        .step(Phase::Insert, insert.render())
}

/// Merge plan for a target in `database`.
pub fn plan_for(target: Target, database: Option<&str>) -> MergePlan {
    match target {
        Target::Users => users_plan(database),
        Target::Songs => songs_plan(),
        Target::Artists => artists_plan(),
        Target::Songplays => songplays_plan(),
        Target::Time => time_plan(),
    }
}

async fn drop_transient<W: Warehouse + ?Sized>(warehouse: &W, plan: &MergePlan) -> Result<()> {
    for sql in plan.cleanup_statements() {
        warehouse.execute(&sql).await?;
    }
    Ok(())
}

async fn execute_steps<W: Warehouse + ?Sized>(warehouse: &W, plan: &MergePlan) -> Result<()> {
    for step in &plan.steps {
        debug!(target_table = %plan.target, phase = ?step.phase, "Running merge step");
        warehouse.execute(&step.sql).await?;
    }
    Ok(())
}

/// Run one merge plan and return how many rows it added to the target.
///
/// Leftover transient tables from an interrupted run are dropped first; the
/// plan's own are dropped afterwards even if a step failed. A step failure
/// wins over a cleanup failure.
pub async fn run_merge<W: Warehouse + ?Sized>(warehouse: &W, plan: &MergePlan) -> Result<u64> {
    let table = plan.target.table();

    drop_transient(warehouse, plan)
        .await
        .map_err(|e| e.in_stage(Stage::Transform))?;

    let before = count_rows(warehouse, table)
        .await
        .map_err(|e| e.in_stage(Stage::Transform))?;

    let outcome = execute_steps(warehouse, plan).await;
    let cleanup = drop_transient(warehouse, plan).await;

    match (outcome, cleanup) {
        (Ok(()), Ok(())) => {}
        (Ok(()), Err(e)) => return Err(e.in_stage(Stage::Transform)),
        (Err(e), Ok(())) => return Err(e.in_stage(Stage::Transform)),
        (Err(e), Err(cleanup_err)) => {
            warn!(
                target_table = table,
                error = %cleanup_err,
                "Failed to drop transient tables after merge failure"
            );
            return Err(e.in_stage(Stage::Transform));
        }
    }

    let after = count_rows(warehouse, table)
        .await
        .map_err(|e| e.in_stage(Stage::Transform))?;

    Ok(after.saturating_sub(before))
}

/// Merge every target in dependency order.
pub async fn transform_all<W: Warehouse + ?Sized>(warehouse: &W) -> Result<Vec<(Target, u64)>> {
    let mut progress = Progress::new(
        "Transforming Data & Loading",
        "Star Schema Tables",
        Target::TRANSFORM_ORDER.len(),
    );
    let mut inserted = Vec::with_capacity(Target::TRANSFORM_ORDER.len());

    for target in Target::TRANSFORM_ORDER {
        progress.start();
        let rows = run_merge(warehouse, &plan_for(target, warehouse.database())).await?;
        info!(target_table = %target, inserted = rows, "Merged");
        inserted.push((target, rows));
        progress.complete();
    }

    Ok(inserted)
}
