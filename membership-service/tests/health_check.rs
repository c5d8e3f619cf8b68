//! Health and readiness probe tests.
//!
//! Run with: ./scripts/integ-tests.sh

mod common;

use common::TestApp;

#[tokio::test]
#[ignore]
async fn health_check_works() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url("/health"))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "membership-service");
}

#[tokio::test]
#[ignore]
async fn readiness_check_works() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url("/ready"))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
}

#[tokio::test]
#[ignore]
async fn metrics_endpoint_exposes_prometheus_text() {
    let app = TestApp::spawn().await;

    // Drive at least one timed query so the histogram family has a sample.
    app.client
        .get(app.url("/api/affiliate/leaderboard"))
        .send()
        .await
        .expect("Failed to warm up metrics");

    let response = app
        .client
        .get(app.url("/metrics"))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());

    let body = response.text().await.expect("Failed to read body");
    assert!(body.contains("membership_db_query_duration_seconds"));
}
