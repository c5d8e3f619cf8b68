//! Mobile-money gateway webhook handler.
//!
//! The gateway posts payment-status callbacks with provider-specific field
//! names; they are normalized here and reconciled against the stored payment
//! attempt for the reference. Once the body parses as JSON the endpoint
//! acknowledges with `200 {"success": true}` no matter what happens inside:
//! an internal failure is logged and swallowed rather than surfaced, so the
//! provider never goes into its retry loop.

use axum::{extract::State, Json};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;

use crate::models::ReferenceKind;
use crate::services::database::{ActivationOutcome, TokenCreditOutcome};
use crate::services::metrics::{
    ERRORS_TOTAL, SUBSCRIPTIONS_ACTIVATED_TOTAL, TOKENS_CREDITED_TOTAL, WEBHOOK_CALLBACKS_TOTAL,
};
use crate::startup::AppState;

/// Normalized view over a provider callback body.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GatewayCallback {
    pub reference: Option<String>,
    pub status: CallbackStatus,
    pub amount: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallbackStatus {
    Success,
    Failure,
    Unknown,
}

impl CallbackStatus {
    fn normalize(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" | "successful" | "accepted" | "completed" | "ok" => CallbackStatus::Success,
            "failed" | "failure" | "cancelled" | "canceled" | "echec" | "rejected" => {
                CallbackStatus::Failure
            }
            _ => CallbackStatus::Unknown,
        }
    }
}

impl GatewayCallback {
    /// Providers disagree on key names (`idCommande` vs `reference` vs
    /// `orderId`, `etat` vs `status`, `montant` vs `amount`) and some send
    /// amounts as strings. Everything funnels through this one place.
    pub(crate) fn from_value(payload: &Value) -> Self {
        let reference = pick_string(payload, &["reference", "idCommande", "orderId"]);
        let status = pick_string(payload, &["status", "etat"])
            .map(|s| CallbackStatus::normalize(&s))
            .unwrap_or(CallbackStatus::Unknown);
        let amount = pick_amount(payload, &["amount", "montant"]);

        Self {
            reference,
            status,
            amount,
        }
    }
}

fn pick_string(payload: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(s) = payload.get(key).and_then(Value::as_str) {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

fn pick_amount(payload: &Value, keys: &[&str]) -> Option<Decimal> {
    for key in keys {
        match payload.get(key) {
            Some(Value::Number(n)) => {
                if let Ok(d) = Decimal::from_str(&n.to_string()) {
                    return Some(d);
                }
            }
            Some(Value::String(s)) => {
                if let Ok(d) = Decimal::from_str(s.trim()) {
                    return Some(d);
                }
            }
            _ => {}
        }
    }
    None
}

fn acknowledge() -> Json<Value> {
    Json(json!({ "success": true }))
}

fn kind_label(reference: &str) -> &'static str {
    match ReferenceKind::classify(reference) {
        ReferenceKind::TokenPurchase => "tokens",
        ReferenceKind::SubscriptionPayment => "subscription",
        ReferenceKind::Unknown => "unknown",
    }
}

/// `POST /api/webhooks/mobile-money`
pub async fn mobile_money(State(state): State<AppState>, Json(payload): Json<Value>) -> Json<Value> {
    let callback = GatewayCallback::from_value(&payload);

    let Some(reference) = callback.reference.clone() else {
        tracing::warn!("Webhook payload carries no payment reference");
        WEBHOOK_CALLBACKS_TOTAL
            .with_label_values(&["unknown", "ignored"])
            .inc();
        return acknowledge();
    };

    match callback.status {
        CallbackStatus::Unknown => {
            tracing::debug!(reference = %reference, "Webhook status not recognized");
            WEBHOOK_CALLBACKS_TOTAL
                .with_label_values(&[kind_label(&reference), "ignored"])
                .inc();
        }
        CallbackStatus::Failure => {
            handle_failure(&state, &reference).await;
        }
        CallbackStatus::Success => match ReferenceKind::classify(&reference) {
            ReferenceKind::TokenPurchase => {
                handle_token_purchase(&state, &reference, callback.amount).await;
            }
            ReferenceKind::SubscriptionPayment => {
                handle_subscription_payment(&state, &reference, callback.amount).await;
            }
            ReferenceKind::Unknown => {
                tracing::debug!(reference = %reference, "Unrecognized reference prefix");
                WEBHOOK_CALLBACKS_TOTAL
                    .with_label_values(&["unknown", "ignored"])
                    .inc();
            }
        },
    }

    acknowledge()
}

async fn handle_failure(state: &AppState, reference: &str) {
    let kind = kind_label(reference);
    match state.db.mark_attempt_failed(reference).await {
        Ok(Some(attempt)) => {
            tracing::info!(
                reference = %reference,
                attempt_id = %attempt.attempt_id,
                "Payment attempt marked failed"
            );
            WEBHOOK_CALLBACKS_TOTAL
                .with_label_values(&[kind, "failed_marked"])
                .inc();
        }
        Ok(None) => {
            tracing::debug!(reference = %reference, "No pending attempt to fail");
            WEBHOOK_CALLBACKS_TOTAL
                .with_label_values(&[kind, "ignored"])
                .inc();
        }
        Err(e) => {
            tracing::error!(reference = %reference, error = %e, "Failed to mark attempt failed");
            ERRORS_TOTAL.with_label_values(&["webhook_failure"]).inc();
            WEBHOOK_CALLBACKS_TOTAL
                .with_label_values(&[kind, "error"])
                .inc();
        }
    }
}

async fn handle_token_purchase(state: &AppState, reference: &str, amount: Option<Decimal>) {
    match state.db.confirm_token_purchase(reference, amount).await {
        Ok(TokenCreditOutcome::Credited {
            user_id,
            plan,
            tokens,
        }) => {
            tracing::info!(
                reference = %reference,
                user_id = %user_id,
                plan = %plan,
                tokens = tokens,
                "Token purchase credited"
            );
            // Unknown plans collapse into one label value.
            let plan_label = crate::models::SecoursPlan::parse(&plan)
                .map(|p| p.as_str())
                .unwrap_or("unknown");
            TOKENS_CREDITED_TOTAL
                .with_label_values(&[plan_label])
                .inc_by(tokens as f64);
            WEBHOOK_CALLBACKS_TOTAL
                .with_label_values(&["tokens", "credited"])
                .inc();
        }
        Ok(TokenCreditOutcome::AlreadyProcessed) => {
            tracing::info!(reference = %reference, "Duplicate token webhook ignored");
            WEBHOOK_CALLBACKS_TOTAL
                .with_label_values(&["tokens", "duplicate"])
                .inc();
        }
        Ok(TokenCreditOutcome::UnknownReference) => {
            tracing::warn!(reference = %reference, "No payment attempt for token reference");
            WEBHOOK_CALLBACKS_TOTAL
                .with_label_values(&["tokens", "ignored"])
                .inc();
        }
        Err(e) => {
            tracing::error!(reference = %reference, error = %e, "Token credit failed");
            ERRORS_TOTAL.with_label_values(&["webhook_credit"]).inc();
            WEBHOOK_CALLBACKS_TOTAL
                .with_label_values(&["tokens", "error"])
                .inc();
        }
    }
}

async fn handle_subscription_payment(state: &AppState, reference: &str, amount: Option<Decimal>) {
    match state.db.confirm_subscription_payment(reference, amount).await {
        Ok(ActivationOutcome::Activated {
            subscription_id,
            user_id,
            tier,
        }) => {
            tracing::info!(
                reference = %reference,
                subscription_id = %subscription_id,
                user_id = %user_id,
                tier = %tier,
                "Subscription activated from webhook"
            );
            // The tier just changed underneath any cached profile.
            state.profiles.invalidate(&user_id);
            let tier_label = crate::models::MembershipTier::parse(&tier)
                .map(|t| t.as_str())
                .unwrap_or("unknown");
            SUBSCRIPTIONS_ACTIVATED_TOTAL
                .with_label_values(&[tier_label])
                .inc();
            WEBHOOK_CALLBACKS_TOTAL
                .with_label_values(&["subscription", "activated"])
                .inc();
        }
        Ok(ActivationOutcome::AlreadyProcessed) => {
            tracing::info!(reference = %reference, "Duplicate subscription webhook ignored");
            WEBHOOK_CALLBACKS_TOTAL
                .with_label_values(&["subscription", "duplicate"])
                .inc();
        }
        Ok(ActivationOutcome::UnknownReference) => {
            tracing::warn!(reference = %reference, "No payment attempt for subscription reference");
            WEBHOOK_CALLBACKS_TOTAL
                .with_label_values(&["subscription", "ignored"])
                .inc();
        }
        Ok(ActivationOutcome::MissingSubscription) => {
            tracing::warn!(reference = %reference, "Attempt has no subscription to activate");
            WEBHOOK_CALLBACKS_TOTAL
                .with_label_values(&["subscription", "ignored"])
                .inc();
        }
        Err(e) => {
            tracing::error!(reference = %reference, error = %e, "Subscription confirmation failed");
            ERRORS_TOTAL.with_label_values(&["webhook_activation"]).inc();
            WEBHOOK_CALLBACKS_TOTAL
                .with_label_values(&["subscription", "error"])
                .inc();
        }
    }
}
