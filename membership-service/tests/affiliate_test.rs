//! Affiliate aggregation tests.
//!
//! The leaderboard is a global query, so these tests run serially and seed
//! commissions large enough to dominate rows left by other tests.
//!
//! Run with: ./scripts/integ-tests.sh

mod common;

use common::TestApp;
use serial_test::serial;
use uuid::Uuid;

#[tokio::test]
#[ignore]
#[serial]
async fn summary_aggregates_referrals_and_rewards() {
    let app = TestApp::spawn().await;
    let referrer_id = app.seed_user("Aïcha Ballo").await;

    app.seed_referral(referrer_id, "registered").await;
    app.seed_referral(referrer_id, "converted").await;
    app.seed_referral(referrer_id, "converted").await;
    app.seed_reward(referrer_id, 500, 10).await;
    app.seed_reward(referrer_id, 750, 15).await;

    let body: serde_json::Value = app
        .client
        .get(app.url(&format!("/api/affiliate/summary/{}", referrer_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["referrer"]["full_name"], "Aïcha Ballo");
    assert_eq!(body["data"]["referral_count"], 3);
    assert_eq!(body["data"]["converted_count"], 2);
    let commission: f64 = body["data"]["commission_total"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(commission, 1250.0);
    assert_eq!(body["data"]["credit_points_total"], 25);
}

#[tokio::test]
#[ignore]
#[serial]
async fn summary_for_referrer_without_activity_is_zeroed() {
    let app = TestApp::spawn().await;
    let referrer_id = app.seed_user("Drissa Koffi").await;

    let body: serde_json::Value = app
        .client
        .get(app.url(&format!("/api/affiliate/summary/{}", referrer_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["data"]["referral_count"], 0);
    assert_eq!(body["data"]["converted_count"], 0);
    let commission: f64 = body["data"]["commission_total"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(commission, 0.0);
    assert_eq!(body["data"]["credit_points_total"], 0);
}

#[tokio::test]
#[ignore]
#[serial]
async fn leaderboard_caps_at_ten_sorted_by_commission() {
    let app = TestApp::spawn().await;

    // Twelve referrers; commissions chosen to outrank anything else seeded.
    let mut top_referrer = None;
    for i in 0..12i64 {
        let referrer_id = app.seed_user(&format!("Referrer {}", i)).await;
        app.seed_referral(referrer_id, "converted").await;
        app.seed_reward(referrer_id, 5_000_000 + i * 1_000, 0).await;
        if i == 11 {
            top_referrer = Some(referrer_id);
        }
    }

    let body: serde_json::Value = app
        .client
        .get(app.url("/api/affiliate/leaderboard"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 10);

    // Descending by commission.
    let commissions: Vec<f64> = entries
        .iter()
        .map(|e| e["commission_total"].as_str().unwrap().parse().unwrap())
        .collect();
    for pair in commissions.windows(2) {
        assert!(pair[0] >= pair[1]);
    }

    assert_eq!(
        entries[0]["referrer_id"].as_str().unwrap(),
        top_referrer.unwrap().to_string()
    );
    assert_eq!(entries[0]["display_name"], "Referrer 11");
}

#[tokio::test]
#[ignore]
#[serial]
async fn leaderboard_substitutes_anonymous_for_missing_users() {
    let app = TestApp::spawn().await;

    // A referrer with rewards but no user row must not break the query.
    let ghost_referrer = Uuid::new_v4();
    app.seed_referral(ghost_referrer, "converted").await;
    app.seed_reward(ghost_referrer, 99_000_000, 0).await;

    let body: serde_json::Value = app
        .client
        .get(app.url("/api/affiliate/leaderboard"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let entries = body["data"].as_array().unwrap();
    assert_eq!(
        entries[0]["referrer_id"].as_str().unwrap(),
        ghost_referrer.to_string()
    );
    assert_eq!(entries[0]["display_name"], "Anonymous");
    assert_eq!(entries[0]["referral_count"], 1);
}
