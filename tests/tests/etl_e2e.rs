//! End-to-end tests for the clean + transform stages.
//!
//! Staging tables are seeded directly with the `clickhouse` inserter (the S3
//! copy itself needs a bucket), then the real pipeline statements run against
//! ClickHouse.
//!
//! Requires Docker to be running for the ClickHouse testcontainer.

use clickhouse_client::{query_artists, query_songplays, query_songs, query_time, query_users};
use integration_tests::{
    fixtures::{next_song, song, SUNDAY_MIDNIGHT_MS},
    setup::TestContext,
};
use pipeline::{clean_staging, transform::transform_all, verify::verify_unique_keys};

#[tokio::test]
async fn test_null_keys_purged_from_staging() {
    let ctx = TestContext::new().await;

    let mut no_user = next_song(7, 1_000);
    no_user.user_id = None;
    let mut no_ts = next_song(8, 2_000);
    no_ts.ts = None;
    ctx.seed_logs(&[next_song(9, 3_000), no_user, no_ts]).await;

    let mut no_artist = song("SOA", "Song A", "ARA", "Artist A", 200.0);
    no_artist.artist_id = None;
    ctx.seed_songs(&[song("SOB", "Song B", "ARB", "Artist B", 180.0), no_artist])
        .await;

    clean_staging(&ctx.clickhouse).await.expect("Clean failed");

    assert_eq!(ctx.count("SELECT count() FROM staging_logs").await, 1);
    assert_eq!(ctx.count("SELECT count() FROM staging_songs").await, 1);
    assert_eq!(
        ctx.count("SELECT count() FROM staging_logs WHERE userId IS NULL OR sessionId IS NULL OR ts IS NULL")
            .await,
        0
    );
}

#[tokio::test]
async fn test_latest_level_wins_within_and_across_batches() {
    let ctx = TestContext::new().await;

    // Same batch: the later event decides the inserted level
    ctx.seed_logs(&[
        next_song(42, 100).level("free"),
        next_song(42, 200).level("paid").session(2),
    ])
    .await;
    clean_staging(&ctx.clickhouse).await.unwrap();
    transform_all(&ctx.clickhouse).await.unwrap();

    let users = query_users(&ctx.clickhouse).await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].user_id, 42);
    assert_eq!(users[0].level.as_deref(), Some("paid"));

    // Next batch: the existing row is updated in place
    ctx.clear_staging().await;
    ctx.seed_logs(&[next_song(42, 300).level("free").session(3)])
        .await;
    clean_staging(&ctx.clickhouse).await.unwrap();
    transform_all(&ctx.clickhouse).await.unwrap();

    let users = query_users(&ctx.clickhouse).await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].level.as_deref(), Some("free"));
}

#[tokio::test]
async fn test_equal_timestamps_fall_back_to_greater_level() {
    let ctx = TestContext::new().await;

    // Same user, same ts: the descending tiebreak decides, whatever the
    // staging order
    ctx.seed_logs(&[
        next_song(11, 500).level("free"),
        next_song(11, 500).level("paid").session(2),
        next_song(12, 500).level("paid").session(2),
        next_song(12, 500).level("free"),
    ])
    .await;
    clean_staging(&ctx.clickhouse).await.unwrap();
    transform_all(&ctx.clickhouse).await.unwrap();

    let users = query_users(&ctx.clickhouse).await.unwrap();
    assert_eq!(users.len(), 2);
    for user in &users {
        assert_eq!(user.level.as_deref(), Some("paid"), "user {}", user.user_id);
    }
}

#[tokio::test]
async fn test_level_not_updated_when_identity_differs() {
    let ctx = TestContext::new().await;

    ctx.seed_logs(&[next_song(5, 100).level("free")]).await;
    clean_staging(&ctx.clickhouse).await.unwrap();
    transform_all(&ctx.clickhouse).await.unwrap();

    ctx.clear_staging().await;
    let mut renamed = next_song(5, 200).level("paid");
    renamed.last_name = Some("Someone-Else".to_string());
    ctx.seed_logs(&[renamed]).await;
    clean_staging(&ctx.clickhouse).await.unwrap();
    transform_all(&ctx.clickhouse).await.unwrap();

    let users = query_users(&ctx.clickhouse).await.unwrap();
    assert_eq!(users[0].level.as_deref(), Some("free"));
    assert_eq!(users[0].last_name.as_deref(), Some("Koch"));
}

#[tokio::test]
async fn test_duplicate_artist_collapses_to_one_row() {
    let ctx = TestContext::new().await;

    ctx.seed_songs(&[
        song("SO1", "First", "AR1", "Shared Artist", 100.0).located("Detroit"),
        song("SO2", "Second", "AR1", "Shared Artist", 120.0).located("Chicago"),
    ])
    .await;
    clean_staging(&ctx.clickhouse).await.unwrap();
    transform_all(&ctx.clickhouse).await.unwrap();

    let artists = query_artists(&ctx.clickhouse).await.unwrap();
    assert_eq!(artists.len(), 1);
    assert_eq!(artists[0].artist_id, "AR1");
    // Descending tiebreak keeps the greater location
    assert_eq!(artists[0].location.as_deref(), Some("Detroit"));

    let songs = query_songs(&ctx.clickhouse).await.unwrap();
    assert_eq!(songs.len(), 2);
    assert!(songs.iter().all(|s| s.artist_id.as_deref() == Some("AR1")));
}

#[tokio::test]
async fn test_songplays_resolve_exact_matches_only() {
    let ctx = TestContext::new().await;

    ctx.seed_songs(&[song("SOX", "Intro", "ARX", "The XX", 128.0)])
        .await;
    ctx.seed_logs(&[
        next_song(1, 1_000).playing("Intro", "The XX", 128.0),
        next_song(1, 2_000).playing("Intro", "The XX", 128.5),
        next_song(1, 3_000).playing("Unknown", "Nobody", 99.0),
        next_song(1, 4_000).page("Home"),
    ])
    .await;
    clean_staging(&ctx.clickhouse).await.unwrap();
    transform_all(&ctx.clickhouse).await.unwrap();

    let songplays = query_songplays(&ctx.clickhouse).await.unwrap();
    assert_eq!(songplays.len(), 3, "only NextSong events become songplays");

    assert_eq!(songplays[0].song_id.as_deref(), Some("SOX"));
    assert_eq!(songplays[0].artist_id.as_deref(), Some("ARX"));
    assert_eq!(songplays[1].song_id, None);
    assert_eq!(songplays[2].artist_id, None);
    assert_eq!(songplays[0].level, "free");
}

#[tokio::test]
async fn test_duplicate_songplay_key_in_one_batch_keeps_one_row() {
    let ctx = TestContext::new().await;

    let mut in_austin = next_song(4, 7_000).playing("First Take", "Someone", 201.0);
    in_austin.location = Some("Austin, TX".to_string());
    let mut in_seattle = next_song(4, 7_000).playing("Second Take", "Someone Else", 187.0);
    in_seattle.location = Some("Seattle, WA".to_string());
    ctx.seed_logs(&[in_austin, in_seattle]).await;
    clean_staging(&ctx.clickhouse).await.unwrap();
    transform_all(&ctx.clickhouse).await.unwrap();

    let songplays = query_songplays(&ctx.clickhouse).await.unwrap();
    assert_eq!(songplays.len(), 1);
    assert_eq!(songplays[0].location, "Seattle, WA");

    let rerun = transform_all(&ctx.clickhouse).await.unwrap();
    assert!(rerun.iter().all(|(_, rows)| *rows == 0), "{:?}", rerun);
    assert_eq!(query_songplays(&ctx.clickhouse).await.unwrap(), songplays);
}

#[tokio::test]
async fn test_time_fields_derived_with_sunday_zero() {
    let ctx = TestContext::new().await;

    ctx.seed_logs(&[next_song(3, SUNDAY_MIDNIGHT_MS)]).await;
    clean_staging(&ctx.clickhouse).await.unwrap();
    transform_all(&ctx.clickhouse).await.unwrap();

    let time = query_time(&ctx.clickhouse).await.unwrap();
    assert_eq!(time.len(), 1);
    let row = &time[0];
    assert_eq!(row.start_time, SUNDAY_MIDNIGHT_MS);
    assert_eq!(
        (row.hour, row.day, row.week, row.month, row.year, row.weekday),
        (0, 4, 44, 11, 2018, 0)
    );
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let ctx = TestContext::new().await;

    ctx.seed_songs(&[song("SOX", "Intro", "ARX", "The XX", 128.0)])
        .await;
    ctx.seed_logs(&[
        next_song(1, 1_000).playing("Intro", "The XX", 128.0),
        next_song(2, 1_000).playing("Intro", "The XX", 128.0),
        next_song(2, 5_000).level("paid"),
    ])
    .await;
    clean_staging(&ctx.clickhouse).await.unwrap();

    let first = transform_all(&ctx.clickhouse).await.unwrap();
    assert!(first.iter().all(|(_, rows)| *rows > 0), "{:?}", first);

    let songplays = query_songplays(&ctx.clickhouse).await.unwrap();

    let second = transform_all(&ctx.clickhouse).await.unwrap();
    assert!(second.iter().all(|(_, rows)| *rows == 0), "{:?}", second);
    assert_eq!(query_songplays(&ctx.clickhouse).await.unwrap(), songplays);

    verify_unique_keys(&ctx.clickhouse)
        .await
        .expect("natural keys should be unique");
}

#[tokio::test]
async fn test_transient_tables_dropped_after_run() {
    let ctx = TestContext::new().await;

    ctx.seed_logs(&[next_song(1, 1_000)]).await;
    clean_staging(&ctx.clickhouse).await.unwrap();
    transform_all(&ctx.clickhouse).await.unwrap();

    assert_eq!(
        ctx.count("SELECT count() FROM system.tables WHERE database = currentDatabase()")
            .await,
        7
    );
}
