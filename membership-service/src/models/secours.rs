//! Secours (emergency assistance) token models.
//!
//! Tokens are prepaid credits for one service category. The FCFA unit price
//! per category is a fixed table; an unknown category has no price, so a
//! confirmed payment against it credits zero tokens (the ledger row is still
//! written with the paid amount).

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Service category a token account is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecoursPlan {
    SchoolFees,
    Transport,
    Health,
    Food,
}

impl SecoursPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecoursPlan::SchoolFees => "school_fees",
            SecoursPlan::Transport => "transport",
            SecoursPlan::Health => "health",
            SecoursPlan::Food => "food",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "school_fees" => Some(SecoursPlan::SchoolFees),
            "transport" => Some(SecoursPlan::Transport),
            "health" => Some(SecoursPlan::Health),
            "food" => Some(SecoursPlan::Food),
            _ => None,
        }
    }

    /// Fixed FCFA price of one token for this category.
    pub fn unit_price_fcfa(&self) -> Decimal {
        let price: i64 = match self {
            SecoursPlan::SchoolFees => 500,
            SecoursPlan::Transport => 250,
            SecoursPlan::Health => 1000,
            SecoursPlan::Food => 300,
        };
        Decimal::from(price)
    }

    /// Unit price for a stored plan string; `None` when the plan is unknown.
    pub fn unit_price_for(plan: &str) -> Option<Decimal> {
        Self::parse(plan).map(|p| p.unit_price_fcfa())
    }

    /// Whole tokens bought by `amount` FCFA under `plan`.
    ///
    /// floor(amount / unit price); zero for unknown plans, non-positive
    /// amounts, or prices the division cannot represent.
    pub fn tokens_for_amount(plan: &str, amount: Decimal) -> i64 {
        let Some(price) = Self::unit_price_for(plan) else {
            return 0;
        };
        if amount <= Decimal::ZERO {
            return 0;
        }
        (amount / price).floor().to_i64().unwrap_or(0)
    }
}

impl std::fmt::Display for SecoursPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-user, per-category token account with its denormalized balance.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SecoursAccount {
    pub secours_id: Uuid,
    pub user_id: Uuid,
    pub plan: String,
    pub token_balance: i64,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// One ledger entry. `token_amount` is signed: purchases are positive,
/// withdrawals negative. `reference` carries the gateway idempotency key for
/// purchases and is null for withdrawals.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SecoursTransaction {
    pub transaction_id: Uuid,
    pub secours_id: Uuid,
    pub reference: Option<String>,
    pub token_amount: i64,
    pub token_value_fcfa: Decimal,
    pub payment_method: String,
    pub status: String,
    pub created_utc: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_parse_round_trips() {
        for plan in [
            SecoursPlan::SchoolFees,
            SecoursPlan::Transport,
            SecoursPlan::Health,
            SecoursPlan::Food,
        ] {
            assert_eq!(SecoursPlan::parse(plan.as_str()), Some(plan));
        }
        assert_eq!(SecoursPlan::parse("lodging"), None);
    }

    #[test]
    fn tokens_floor_division() {
        // 5000 / 500 = 10 exactly
        assert_eq!(
            SecoursPlan::tokens_for_amount("school_fees", Decimal::from(5000)),
            10
        );
        // 5200 / 500 = 10.4 -> 10
        assert_eq!(
            SecoursPlan::tokens_for_amount("school_fees", Decimal::from(5200)),
            10
        );
        // 200 / 250 = 0.8 -> 0
        assert_eq!(
            SecoursPlan::tokens_for_amount("transport", Decimal::from(200)),
            0
        );
    }

    #[test]
    fn unknown_plan_credits_zero() {
        assert_eq!(
            SecoursPlan::tokens_for_amount("lodging", Decimal::from(10_000)),
            0
        );
        assert_eq!(SecoursPlan::unit_price_for("lodging"), None);
    }

    #[test]
    fn non_positive_amount_credits_zero() {
        assert_eq!(
            SecoursPlan::tokens_for_amount("health", Decimal::ZERO),
            0
        );
        assert_eq!(
            SecoursPlan::tokens_for_amount("health", Decimal::from(-500)),
            0
        );
    }
}
