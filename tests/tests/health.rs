//! Connection checks.

use clickhouse_client::{
    health::{check_connection, ensure_connection},
    ClickHouseClient, ClickHouseConfig,
};
use integration_tests::setup::TestContext;

#[tokio::test]
async fn test_reachable_cluster_is_healthy() {
    let ctx = TestContext::new().await;
    assert!(check_connection(&ctx.clickhouse).await);
    ensure_connection(&ctx.clickhouse)
        .await
        .expect("ClickHouse should be reachable");
}

#[tokio::test]
async fn test_unreachable_cluster_is_connection_error() {
    // Nothing listens on port 1
    let client = ClickHouseClient::new(ClickHouseConfig {
        host: "127.0.0.1".to_string(),
        port: 1,
        ..Default::default()
    })
    .unwrap();

    let err = ensure_connection(&client).await.unwrap_err();
    assert_eq!(err.error_code(), Some("CONN_001"));
}
