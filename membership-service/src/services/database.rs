//! Database service for membership-service.

use crate::models::{
    AffiliateSummary, LeaderboardEntry, MembershipTier, Payment, PaymentAttempt, PaymentStatus,
    SecoursAccount, SecoursPlan, SecoursTransaction, Subscription, SubscriptionStatus, User,
};
use crate::services::metrics::DB_QUERY_DURATION;
use chrono::Utc;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Result of reconciling a `TOKENS_` reference against the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenCreditOutcome {
    Credited {
        user_id: Uuid,
        plan: String,
        tokens: i64,
    },
    /// The attempt was already resolved (replayed or concurrent delivery).
    AlreadyProcessed,
    /// No payment attempt recorded for the reference.
    UnknownReference,
}

/// Result of reconciling a `SUB_`/`ELV` reference against a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    Activated {
        subscription_id: Uuid,
        user_id: Uuid,
        tier: String,
    },
    AlreadyProcessed,
    UnknownReference,
    /// The attempt carries no subscription link; nothing to activate.
    MissingSubscription,
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "membership-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // User Operations
    // -------------------------------------------------------------------------

    /// Get a user by ID.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_user"])
            .start_timer();

        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, full_name, email, membership_tier, created_utc, updated_utc
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get user: {}", e)))?;

        timer.observe_duration();

        Ok(user)
    }

    // -------------------------------------------------------------------------
    // Subscription Operations
    // -------------------------------------------------------------------------

    /// Create a pending subscription plus the payment attempt the UI hands to
    /// the gateway. Both rows are written in one transaction so a checkout
    /// never leaves a subscription without a reference.
    #[instrument(skip(self), fields(user_id = %user_id, plan = %tier))]
    pub async fn create_pending_subscription(
        &self,
        user_id: Uuid,
        tier: MembershipTier,
        amount: Decimal,
    ) -> Result<(Subscription, PaymentAttempt), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_pending_subscription"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let start_date = Utc::now().date_naive();
        let end_date = start_date + chrono::Duration::days(365);

        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions (subscription_id, user_id, plan, status, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING subscription_id, user_id, plan, status, start_date, end_date, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(tier.as_str())
        .bind(SubscriptionStatus::Pending.as_str())
        .bind(start_date)
        .bind(end_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::NotFound(anyhow::anyhow!("User {} does not exist", user_id))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create subscription: {}", e)),
        })?;

        let attempt = sqlx::query_as::<_, PaymentAttempt>(
            r#"
            INSERT INTO payment_attempts (attempt_id, reference, user_id, subscription_id, amount, status, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING attempt_id, reference, user_id, subscription_id, amount, secours_plan, status, metadata, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(crate::models::new_subscription_reference())
        .bind(user_id)
        .bind(subscription.subscription_id)
        .bind(amount)
        .bind(PaymentStatus::Pending.as_str())
        .bind(serde_json::json!({ "plan": tier.as_str() }))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create payment attempt: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            subscription_id = %subscription.subscription_id,
            reference = %attempt.reference,
            "Pending subscription created"
        );

        Ok((subscription, attempt))
    }

    /// Get a subscription by ID.
    #[instrument(skip(self), fields(subscription_id = %subscription_id))]
    pub async fn get_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<Subscription>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_subscription"])
            .start_timer();

        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT subscription_id, user_id, plan, status, start_date, end_date, created_utc, updated_utc
            FROM subscriptions
            WHERE subscription_id = $1
            "#,
        )
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get subscription: {}", e))
        })?;

        timer.observe_duration();

        Ok(subscription)
    }

    /// List a user's subscriptions, newest first.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_user_subscriptions(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Subscription>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_user_subscriptions"])
            .start_timer();

        let subscriptions = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT subscription_id, user_id, plan, status, start_date, end_date, created_utc, updated_utc
            FROM subscriptions
            WHERE user_id = $1
            ORDER BY created_utc DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list subscriptions: {}", e))
        })?;

        timer.observe_duration();

        Ok(subscriptions)
    }

    /// Activate a subscription and set the owner's membership tier.
    ///
    /// Both writes run in one transaction: either the subscription is active
    /// AND the tier matches, or nothing changed.
    #[instrument(skip(self), fields(subscription_id = %subscription_id, user_id = %user_id, plan = %tier))]
    pub async fn activate_subscription(
        &self,
        subscription_id: Uuid,
        user_id: Uuid,
        tier: MembershipTier,
    ) -> Result<Subscription, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["activate_subscription"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            UPDATE subscriptions
            SET status = $1, plan = $2, updated_utc = now()
            WHERE subscription_id = $3 AND user_id = $4
            RETURNING subscription_id, user_id, plan, status, start_date, end_date, created_utc, updated_utc
            "#,
        )
        .bind(SubscriptionStatus::Active.as_str())
        .bind(tier.as_str())
        .bind(subscription_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to activate subscription: {}", e))
        })?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!(
                "Subscription {} not found for user {}",
                subscription_id,
                user_id
            ))
        })?;

        let updated = sqlx::query(
            "UPDATE users SET membership_tier = $1, updated_utc = now() WHERE user_id = $2",
        )
        .bind(tier.as_str())
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update tier: {}", e)))?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "User {} not found",
                user_id
            )));
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            subscription_id = %subscription_id,
            plan = %tier,
            "Subscription activated"
        );

        Ok(subscription)
    }

    // -------------------------------------------------------------------------
    // Payment Attempt Operations
    // -------------------------------------------------------------------------

    /// Create a pending token-purchase attempt with a fresh `TOKENS_` reference.
    #[instrument(skip(self), fields(user_id = %user_id, plan = %plan))]
    pub async fn create_token_purchase_attempt(
        &self,
        user_id: Uuid,
        plan: SecoursPlan,
        amount: Decimal,
        payment_method: &str,
    ) -> Result<PaymentAttempt, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_token_purchase_attempt"])
            .start_timer();

        let attempt = sqlx::query_as::<_, PaymentAttempt>(
            r#"
            INSERT INTO payment_attempts (attempt_id, reference, user_id, amount, secours_plan, status, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING attempt_id, reference, user_id, subscription_id, amount, secours_plan, status, metadata, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(crate::models::new_token_reference())
        .bind(user_id)
        .bind(amount)
        .bind(plan.as_str())
        .bind(PaymentStatus::Pending.as_str())
        .bind(serde_json::json!({ "payment_method": payment_method }))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::NotFound(anyhow::anyhow!("User {} does not exist", user_id))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create attempt: {}", e)),
        })?;

        timer.observe_duration();

        info!(reference = %attempt.reference, "Token purchase attempt created");

        Ok(attempt)
    }

    /// Mark the latest pending attempt for a reference as failed.
    ///
    /// Returns the attempt when one was transitioned; `None` when the
    /// reference is unknown or already resolved.
    #[instrument(skip(self), fields(reference = %reference))]
    pub async fn mark_attempt_failed(
        &self,
        reference: &str,
    ) -> Result<Option<PaymentAttempt>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["mark_attempt_failed"])
            .start_timer();

        let attempt = sqlx::query_as::<_, PaymentAttempt>(
            r#"
            UPDATE payment_attempts
            SET status = $1
            WHERE attempt_id = (
                SELECT attempt_id FROM payment_attempts
                WHERE reference = $2 AND status = $3
                ORDER BY created_utc DESC
                LIMIT 1
            )
            RETURNING attempt_id, reference, user_id, subscription_id, amount, secours_plan, status, metadata, created_utc
            "#,
        )
        .bind(PaymentStatus::Failed.as_str())
        .bind(reference)
        .bind(PaymentStatus::Pending.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to mark attempt failed: {}", e))
        })?;

        timer.observe_duration();

        Ok(attempt)
    }

    // -------------------------------------------------------------------------
    // Webhook Reconciliation
    // -------------------------------------------------------------------------

    /// Credit a confirmed token purchase.
    ///
    /// Runs as one transaction keyed on the payment reference: the attempt
    /// row is locked, an already-completed attempt short-circuits, and the
    /// unique constraint on `secours_transactions.reference` catches the
    /// delivery that lost a race. Ledger row, balance and attempt status
    /// commit together or not at all.
    #[instrument(skip(self), fields(reference = %reference))]
    pub async fn confirm_token_purchase(
        &self,
        reference: &str,
        paid_amount: Option<Decimal>,
    ) -> Result<TokenCreditOutcome, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["confirm_token_purchase"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let attempt = sqlx::query_as::<_, PaymentAttempt>(
            r#"
            SELECT attempt_id, reference, user_id, subscription_id, amount, secours_plan, status, metadata, created_utc
            FROM payment_attempts
            WHERE reference = $1
            ORDER BY created_utc DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(reference)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock attempt: {}", e)))?;

        let attempt = match attempt {
            Some(a) => a,
            None => {
                tx.rollback().await.ok();
                return Ok(TokenCreditOutcome::UnknownReference);
            }
        };

        if attempt.status == PaymentStatus::Completed.as_str() {
            tx.rollback().await.ok();
            return Ok(TokenCreditOutcome::AlreadyProcessed);
        }

        let amount = paid_amount.unwrap_or(attempt.amount);
        let plan = attempt.secours_plan.clone().unwrap_or_default();
        let tokens = SecoursPlan::tokens_for_amount(&plan, amount);
        if tokens == 0 {
            warn!(
                reference = %reference,
                plan = %plan,
                amount = %amount,
                "Confirmed payment credits zero tokens"
            );
        }

        let payment_method = attempt
            .metadata
            .as_ref()
            .and_then(|m| m.get("payment_method"))
            .and_then(|v| v.as_str())
            .unwrap_or("mobile_money")
            .to_string();

        let account = sqlx::query_as::<_, SecoursAccount>(
            r#"
            INSERT INTO secours_subscriptions (secours_id, user_id, plan, token_balance)
            VALUES ($1, $2, $3, 0)
            ON CONFLICT (user_id, plan) DO UPDATE SET updated_utc = now()
            RETURNING secours_id, user_id, plan, token_balance, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(attempt.user_id)
        .bind(&plan)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to upsert token account: {}", e))
        })?;

        let result = sqlx::query(
            r#"
            INSERT INTO secours_transactions
                (transaction_id, secours_id, reference, token_amount, token_value_fcfa, payment_method, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(account.secours_id)
        .bind(&attempt.reference)
        .bind(tokens)
        .bind(amount)
        .bind(&payment_method)
        .bind(PaymentStatus::Completed.as_str())
        .execute(&mut *tx)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => {
                // Another delivery of the same reference won the race.
                tx.rollback().await.ok();
                timer.observe_duration();
                return Ok(TokenCreditOutcome::AlreadyProcessed);
            }
            Err(e) => {
                return Err(AppError::DatabaseError(anyhow::anyhow!(
                    "Failed to insert ledger entry: {}",
                    e
                )));
            }
        }

        sqlx::query(
            r#"
            UPDATE secours_subscriptions
            SET token_balance = token_balance + $1, updated_utc = now()
            WHERE secours_id = $2
            "#,
        )
        .bind(tokens)
        .bind(account.secours_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update balance: {}", e)))?;

        sqlx::query("UPDATE payment_attempts SET status = $1 WHERE attempt_id = $2")
            .bind(PaymentStatus::Completed.as_str())
            .bind(attempt.attempt_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to complete attempt: {}", e))
            })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            reference = %reference,
            user_id = %attempt.user_id,
            plan = %plan,
            tokens = tokens,
            amount = %amount,
            "Token purchase credited"
        );

        Ok(TokenCreditOutcome::Credited {
            user_id: attempt.user_id,
            plan,
            tokens,
        })
    }

    /// Activate the subscription a confirmed `SUB_`/`ELV` payment refers to.
    ///
    /// Same idempotency scheme as token crediting: locked attempt, completed
    /// short-circuit, unique `payments.reference` as the race backstop;
    /// payment record, subscription status, user tier and attempt status are
    /// a single transaction.
    #[instrument(skip(self), fields(reference = %reference))]
    pub async fn confirm_subscription_payment(
        &self,
        reference: &str,
        paid_amount: Option<Decimal>,
    ) -> Result<ActivationOutcome, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["confirm_subscription_payment"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let attempt = sqlx::query_as::<_, PaymentAttempt>(
            r#"
            SELECT attempt_id, reference, user_id, subscription_id, amount, secours_plan, status, metadata, created_utc
            FROM payment_attempts
            WHERE reference = $1
            ORDER BY created_utc DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(reference)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock attempt: {}", e)))?;

        let attempt = match attempt {
            Some(a) => a,
            None => {
                tx.rollback().await.ok();
                return Ok(ActivationOutcome::UnknownReference);
            }
        };

        if attempt.status == PaymentStatus::Completed.as_str() {
            tx.rollback().await.ok();
            return Ok(ActivationOutcome::AlreadyProcessed);
        }

        let subscription_id = match attempt.subscription_id {
            Some(id) => id,
            None => {
                warn!(reference = %reference, "Subscription payment attempt has no subscription");
                tx.rollback().await.ok();
                return Ok(ActivationOutcome::MissingSubscription);
            }
        };

        let amount = paid_amount.unwrap_or(attempt.amount);

        // RETURNING yields no row when the reference already has a payment.
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (payment_id, reference, user_id, subscription_id, amount)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (reference) DO NOTHING
            RETURNING payment_id, reference, user_id, subscription_id, amount, paid_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&attempt.reference)
        .bind(attempt.user_id)
        .bind(subscription_id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to record payment: {}", e))
        })?;

        let payment = match payment {
            Some(p) => p,
            None => {
                tx.rollback().await.ok();
                timer.observe_duration();
                return Ok(ActivationOutcome::AlreadyProcessed);
            }
        };

        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            UPDATE subscriptions
            SET status = $1, updated_utc = now()
            WHERE subscription_id = $2
            RETURNING subscription_id, user_id, plan, status, start_date, end_date, created_utc, updated_utc
            "#,
        )
        .bind(SubscriptionStatus::Active.as_str())
        .bind(subscription_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to activate subscription: {}", e))
        })?;

        let subscription = match subscription {
            Some(s) => s,
            None => {
                warn!(
                    reference = %reference,
                    subscription_id = %subscription_id,
                    "Referenced subscription no longer exists"
                );
                tx.rollback().await.ok();
                return Ok(ActivationOutcome::MissingSubscription);
            }
        };

        // Tier comes from the attempt metadata recorded at checkout, falling
        // back to the subscription's own plan.
        let tier = attempt
            .metadata
            .as_ref()
            .and_then(|m| m.get("plan"))
            .and_then(|v| v.as_str())
            .unwrap_or(&subscription.plan)
            .to_string();

        sqlx::query(
            "UPDATE users SET membership_tier = $1, updated_utc = now() WHERE user_id = $2",
        )
        .bind(&tier)
        .bind(attempt.user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update tier: {}", e)))?;

        sqlx::query("UPDATE payment_attempts SET status = $1 WHERE attempt_id = $2")
            .bind(PaymentStatus::Completed.as_str())
            .bind(attempt.attempt_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to complete attempt: {}", e))
            })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            reference = %reference,
            payment_id = %payment.payment_id,
            subscription_id = %subscription_id,
            tier = %tier,
            "Subscription payment confirmed"
        );

        Ok(ActivationOutcome::Activated {
            subscription_id,
            user_id: attempt.user_id,
            tier,
        })
    }

    // -------------------------------------------------------------------------
    // Secours Ledger Operations
    // -------------------------------------------------------------------------

    /// List a user's token accounts.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_secours_accounts(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<SecoursAccount>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_secours_accounts"])
            .start_timer();

        let accounts = sqlx::query_as::<_, SecoursAccount>(
            r#"
            SELECT secours_id, user_id, plan, token_balance, created_utc, updated_utc
            FROM secours_subscriptions
            WHERE user_id = $1
            ORDER BY plan
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list accounts: {}", e)))?;

        timer.observe_duration();

        Ok(accounts)
    }

    /// Ledger history for a user, newest first, optionally scoped to one plan.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_secours_transactions(
        &self,
        user_id: Uuid,
        plan: Option<&str>,
        limit: i64,
    ) -> Result<Vec<SecoursTransaction>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_secours_transactions"])
            .start_timer();

        let limit = limit.clamp(1, 100);

        let transactions = sqlx::query_as::<_, SecoursTransaction>(
            r#"
            SELECT t.transaction_id, t.secours_id, t.reference, t.token_amount, t.token_value_fcfa,
                   t.payment_method, t.status, t.created_utc
            FROM secours_transactions t
            JOIN secours_subscriptions s ON s.secours_id = t.secours_id
            WHERE s.user_id = $1
              AND ($2::varchar IS NULL OR s.plan = $2)
            ORDER BY t.created_utc DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(plan)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list transactions: {}", e))
        })?;

        timer.observe_duration();

        Ok(transactions)
    }

    /// Debit tokens from an account, appending the negative ledger row in the
    /// same transaction. Fails without writes when the account is missing or
    /// the balance is insufficient.
    #[instrument(skip(self), fields(user_id = %user_id, plan = %plan, tokens = tokens))]
    pub async fn withdraw_tokens(
        &self,
        user_id: Uuid,
        plan: &str,
        tokens: i64,
    ) -> Result<(SecoursAccount, SecoursTransaction), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["withdraw_tokens"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let account = sqlx::query_as::<_, SecoursAccount>(
            r#"
            SELECT secours_id, user_id, plan, token_balance, created_utc, updated_utc
            FROM secours_subscriptions
            WHERE user_id = $1 AND plan = $2
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(plan)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock account: {}", e)))?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!(
                "No secours account for user {} and plan {}",
                user_id,
                plan
            ))
        })?;

        if account.token_balance < tokens {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Insufficient token balance: have {}, requested {}",
                account.token_balance,
                tokens
            )));
        }

        let account = sqlx::query_as::<_, SecoursAccount>(
            r#"
            UPDATE secours_subscriptions
            SET token_balance = token_balance - $1, updated_utc = now()
            WHERE secours_id = $2
            RETURNING secours_id, user_id, plan, token_balance, created_utc, updated_utc
            "#,
        )
        .bind(tokens)
        .bind(account.secours_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to debit balance: {}", e)))?;

        let value = SecoursPlan::unit_price_for(plan)
            .map(|price| price * Decimal::from(tokens))
            .unwrap_or(Decimal::ZERO);

        let transaction = sqlx::query_as::<_, SecoursTransaction>(
            r#"
            INSERT INTO secours_transactions
                (transaction_id, secours_id, reference, token_amount, token_value_fcfa, payment_method, status)
            VALUES ($1, $2, NULL, $3, $4, $5, $6)
            RETURNING transaction_id, secours_id, reference, token_amount, token_value_fcfa, payment_method, status, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(account.secours_id)
        .bind(-tokens)
        .bind(value)
        .bind("withdrawal")
        .bind(PaymentStatus::Completed.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to insert ledger entry: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            user_id = %user_id,
            plan = %plan,
            tokens = tokens,
            balance = account.token_balance,
            "Tokens withdrawn"
        );

        Ok((account, transaction))
    }

    // -------------------------------------------------------------------------
    // Affiliate Reporting
    // -------------------------------------------------------------------------

    /// Per-referrer totals for the affiliate dashboard.
    #[instrument(skip(self), fields(referrer_id = %referrer_id))]
    pub async fn affiliate_summary(
        &self,
        referrer_id: Uuid,
    ) -> Result<AffiliateSummary, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["affiliate_summary"])
            .start_timer();

        let summary = sqlx::query_as::<_, AffiliateSummary>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM referrals WHERE referrer_id = $1) AS referral_count,
                (SELECT COUNT(*) FROM referrals WHERE referrer_id = $1 AND status = 'converted') AS converted_count,
                COALESCE((SELECT SUM(commission_fcfa) FROM affiliate_rewards WHERE referrer_id = $1), 0) AS commission_total,
                COALESCE((SELECT SUM(credit_points) FROM affiliate_rewards WHERE referrer_id = $1), 0)::BIGINT AS credit_points_total
            "#,
        )
        .bind(referrer_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to aggregate summary: {}", e))
        })?;

        timer.observe_duration();

        Ok(summary)
    }

    /// Top referrers by summed commission. At most 10 rows; referrers whose
    /// user row is gone show up as "Anonymous" rather than breaking the join.
    #[instrument(skip(self))]
    pub async fn affiliate_leaderboard(&self) -> Result<Vec<LeaderboardEntry>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["affiliate_leaderboard"])
            .start_timer();

        let entries = sqlx::query_as::<_, LeaderboardEntry>(
            r#"
            SELECT agg.referrer_id,
                   COALESCE(u.full_name, 'Anonymous') AS display_name,
                   COALESCE(ref.referral_count, 0)::BIGINT AS referral_count,
                   agg.commission_total
            FROM (
                SELECT referrer_id, SUM(commission_fcfa) AS commission_total
                FROM affiliate_rewards
                GROUP BY referrer_id
            ) agg
            LEFT JOIN users u ON u.user_id = agg.referrer_id
            LEFT JOIN (
                SELECT referrer_id, COUNT(*) AS referral_count
                FROM referrals
                GROUP BY referrer_id
            ) ref ON ref.referrer_id = agg.referrer_id
            ORDER BY agg.commission_total DESC, agg.referrer_id
            LIMIT 10
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to build leaderboard: {}", e))
        })?;

        timer.observe_duration();

        Ok(entries)
    }
}
