//! Common test utilities for membership-service integration tests.

use membership_service::config::{DatabaseConfig, MembershipConfig, ProfileCacheConfig};
use membership_service::startup::Application;
use rust_decimal::Decimal;
use secrecy::Secret;
use service_core::config::Config as CommonConfig;
use sqlx::PgPool;
use std::sync::Once;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,membership_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub struct TestApp {
    pub http_address: String,
    pub http_port: u16,
    pub pool: PgPool,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Spawn the application on a random port against TEST_DATABASE_URL.
    pub async fn spawn() -> Self {
        init_tracing();

        let database_url = std::env::var("TEST_DATABASE_URL")
            .expect("TEST_DATABASE_URL must be set - use scripts/integ-tests.sh to run tests");

        let config = MembershipConfig {
            common: CommonConfig { port: 0 },
            service_name: "membership-service-test".to_string(),
            service_version: "test".to_string(),
            log_level: "debug".to_string(),
            otlp_endpoint: None,
            database: DatabaseConfig {
                url: Secret::new(database_url),
                max_connections: 2,
                min_connections: 1,
            },
            profile_cache: ProfileCacheConfig {
                capacity: 64,
                ttl_seconds: 60,
            },
        };

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let http_port = app.http_port();
        let pool = app.db().pool().clone();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the HTTP server to come up.
        let client = reqwest::Client::new();
        let health_url = format!("http://127.0.0.1:{}/health", http_port);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            http_address: format!("http://127.0.0.1:{}", http_port),
            http_port,
            pool,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.http_address, path)
    }

    /// Insert a user the way the external identity system would.
    pub async fn seed_user(&self, full_name: &str) -> Uuid {
        let user_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO users (user_id, full_name, email, membership_tier) VALUES ($1, $2, $3, 'essential')",
        )
        .bind(user_id)
        .bind(full_name)
        .bind(format!("{}@example.test", Uuid::new_v4().simple()))
        .execute(&self.pool)
        .await
        .expect("Failed to seed user");
        user_id
    }

    /// Insert a payment attempt directly, bypassing the purchase endpoint.
    pub async fn seed_token_attempt(
        &self,
        user_id: Uuid,
        reference: &str,
        plan: &str,
        amount: Decimal,
    ) {
        sqlx::query(
            r#"
            INSERT INTO payment_attempts (attempt_id, reference, user_id, amount, secours_plan, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(reference)
        .bind(user_id)
        .bind(amount)
        .bind(plan)
        .execute(&self.pool)
        .await
        .expect("Failed to seed payment attempt");
    }

    /// Insert a referral the way the registration flow would.
    pub async fn seed_referral(&self, referrer_id: Uuid, status: &str) -> Uuid {
        let referral_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO referrals (referral_id, referrer_id, referred_user_id, status)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(referral_id)
        .bind(referrer_id)
        .bind(Uuid::new_v4())
        .bind(status)
        .execute(&self.pool)
        .await
        .expect("Failed to seed referral");
        referral_id
    }

    /// Insert an affiliate reward grant.
    pub async fn seed_reward(&self, referrer_id: Uuid, commission_fcfa: i64, credit_points: i64) {
        sqlx::query(
            r#"
            INSERT INTO affiliate_rewards (reward_id, referrer_id, commission_fcfa, credit_points, status)
            VALUES ($1, $2, $3, $4, 'granted')
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(referrer_id)
        .bind(Decimal::from(commission_fcfa))
        .bind(credit_points)
        .execute(&self.pool)
        .await
        .expect("Failed to seed reward");
    }

    /// Fetch a payment attempt's status by reference.
    pub async fn attempt_status(&self, reference: &str) -> Option<String> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT status FROM payment_attempts
            WHERE reference = $1
            ORDER BY created_utc DESC
            LIMIT 1
            "#,
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .expect("Failed to query attempt status")
    }

    /// Fetch a user's membership tier.
    pub async fn user_tier(&self, user_id: Uuid) -> String {
        sqlx::query_scalar::<_, String>("SELECT membership_tier FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .expect("Failed to query user tier")
    }

    /// Count ledger rows for a user.
    pub async fn ledger_row_count(&self, user_id: Uuid) -> i64 {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM secours_transactions t
            JOIN secours_subscriptions s ON s.secours_id = t.secours_id
            WHERE s.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .expect("Failed to count ledger rows")
    }

    /// Post a gateway webhook callback and return the parsed body.
    pub async fn post_webhook(&self, body: serde_json::Value) -> serde_json::Value {
        let response = self
            .client
            .post(self.url("/api/webhooks/mobile-money"))
            .json(&body)
            .send()
            .await
            .expect("Failed to post webhook");
        assert!(response.status().is_success());
        response.json().await.expect("Failed to parse webhook ack")
    }
}
