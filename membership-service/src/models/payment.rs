//! Payment attempt and payment models.
//!
//! A payment attempt is created when the UI hands a reference to the
//! mobile-money gateway; the webhook resolves it exactly once. The
//! `reference` is the end-to-end idempotency key.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Reference prefix for secours token purchases.
pub const TOKEN_PREFIX: &str = "TOKENS_";
/// Reference prefix for subscription payments.
pub const SUBSCRIPTION_PREFIX: &str = "SUB_";
/// Legacy subscription references issued by the previous checkout flow.
const LEGACY_SUBSCRIPTION_PREFIX: &str = "ELV";

/// What a gateway reference pays for, decided by its naming convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    TokenPurchase,
    SubscriptionPayment,
    Unknown,
}

impl ReferenceKind {
    pub fn classify(reference: &str) -> Self {
        if reference.starts_with(TOKEN_PREFIX) {
            ReferenceKind::TokenPurchase
        } else if reference.starts_with(SUBSCRIPTION_PREFIX)
            || reference.starts_with(LEGACY_SUBSCRIPTION_PREFIX)
        {
            ReferenceKind::SubscriptionPayment
        } else {
            ReferenceKind::Unknown
        }
    }
}

/// Generate a fresh token-purchase reference.
pub fn new_token_reference() -> String {
    format!("{}{}", TOKEN_PREFIX, Uuid::new_v4().simple())
}

/// Generate a fresh subscription-payment reference.
pub fn new_subscription_reference() -> String {
    format!("{}{}", SUBSCRIPTION_PREFIX, Uuid::new_v4().simple())
}

/// Payment attempt status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }
}

/// One user-initiated request to pay through the gateway. Updated exactly
/// once when the webhook resolves it; never deleted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PaymentAttempt {
    pub attempt_id: Uuid,
    pub reference: String,
    pub user_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub amount: Decimal,
    pub secours_plan: Option<String>,
    pub status: String,
    pub metadata: Option<serde_json::Value>,
    pub created_utc: DateTime<Utc>,
}

/// Confirmed subscription payment. One row per reference, enforced by a
/// unique constraint.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: Uuid,
    pub reference: String,
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub amount: Decimal,
    pub paid_utc: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_prefix() {
        assert_eq!(
            ReferenceKind::classify("TOKENS_abc123"),
            ReferenceKind::TokenPurchase
        );
        assert_eq!(
            ReferenceKind::classify("SUB_abc123"),
            ReferenceKind::SubscriptionPayment
        );
        assert_eq!(
            ReferenceKind::classify("ELV20240101"),
            ReferenceKind::SubscriptionPayment
        );
        assert_eq!(ReferenceKind::classify("ORDER_42"), ReferenceKind::Unknown);
        assert_eq!(ReferenceKind::classify(""), ReferenceKind::Unknown);
    }

    #[test]
    fn generated_references_classify_correctly() {
        assert_eq!(
            ReferenceKind::classify(&new_token_reference()),
            ReferenceKind::TokenPurchase
        );
        assert_eq!(
            ReferenceKind::classify(&new_subscription_reference()),
            ReferenceKind::SubscriptionPayment
        );
    }
}
