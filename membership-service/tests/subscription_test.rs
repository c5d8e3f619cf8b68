//! Subscription checkout and activation tests.
//!
//! Run with: ./scripts/integ-tests.sh

mod common;

use common::TestApp;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
#[ignore]
async fn activate_valid_subscription_returns_active() {
    let app = TestApp::spawn().await;
    let user_id = app.seed_user("Mariam Sanogo").await;

    let checkout: serde_json::Value = app
        .client
        .post(app.url("/api/subscriptions/checkout"))
        .json(&json!({
            "user_id": user_id,
            "plan": "premium",
            "amount_fcfa": "25000"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let subscription_id = checkout["data"]["subscription"]["subscription_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .client
        .post(app.url("/api/subscriptions/activate"))
        .json(&json!({
            "subscription_id": subscription_id,
            "user_id": user_id,
            "plan": "premium"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "active");
    assert_eq!(body["data"]["plan"], "premium");

    assert_eq!(app.user_tier(user_id).await, "premium");
}

#[tokio::test]
#[ignore]
async fn activate_with_missing_plan_returns_400_without_writes() {
    let app = TestApp::spawn().await;
    let user_id = app.seed_user("Adjoua Kouassi").await;

    let checkout: serde_json::Value = app
        .client
        .post(app.url("/api/subscriptions/checkout"))
        .json(&json!({
            "user_id": user_id,
            "plan": "premium",
            "amount_fcfa": "25000"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let subscription_id = checkout["data"]["subscription"]["subscription_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .client
        .post(app.url("/api/subscriptions/activate"))
        .json(&json!({
            "subscription_id": subscription_id,
            "user_id": user_id
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("plan"));

    // Nothing changed.
    let subscription: serde_json::Value = app
        .client
        .get(app.url(&format!("/api/subscriptions/{}", subscription_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(subscription["data"]["status"], "pending");
    assert_eq!(app.user_tier(user_id).await, "essential");
}

#[tokio::test]
#[ignore]
async fn activate_unknown_subscription_returns_404() {
    let app = TestApp::spawn().await;
    let user_id = app.seed_user("Brahima Dosso").await;

    let response = app
        .client
        .post(app.url("/api/subscriptions/activate"))
        .json(&json!({
            "subscription_id": Uuid::new_v4(),
            "user_id": user_id,
            "plan": "elite"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
    assert_eq!(app.user_tier(user_id).await, "essential");
}

#[tokio::test]
#[ignore]
async fn checkout_with_unknown_plan_returns_400() {
    let app = TestApp::spawn().await;
    let user_id = app.seed_user("Salif Diallo").await;

    let response = app
        .client
        .post(app.url("/api/subscriptions/checkout"))
        .json(&json!({
            "user_id": user_id,
            "plan": "platinum",
            "amount_fcfa": "25000"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
#[ignore]
async fn checkout_for_unknown_user_returns_404() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(app.url("/api/subscriptions/checkout"))
        .json(&json!({
            "user_id": Uuid::new_v4(),
            "plan": "premium",
            "amount_fcfa": "25000"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
#[ignore]
async fn list_user_subscriptions_newest_first() {
    let app = TestApp::spawn().await;
    let user_id = app.seed_user("Rokia Keïta").await;

    for plan in ["essential", "premium"] {
        let response = app
            .client
            .post(app.url("/api/subscriptions/checkout"))
            .json(&json!({
                "user_id": user_id,
                "plan": plan,
                "amount_fcfa": "10000"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
    }

    let body: serde_json::Value = app
        .client
        .get(app.url(&format!("/api/users/{}/subscriptions", user_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let subscriptions = body["data"].as_array().unwrap();
    assert_eq!(subscriptions.len(), 2);
    assert_eq!(subscriptions[0]["plan"], "premium");
    assert_eq!(subscriptions[1]["plan"], "essential");
}
