//! Subscription and membership tier models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Membership tier controlled by the subscription plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipTier {
    Essential,
    Premium,
    Elite,
}

impl MembershipTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipTier::Essential => "essential",
            MembershipTier::Premium => "premium",
            MembershipTier::Elite => "elite",
        }
    }

    /// Strict parse; unknown plan names are rejected at the API boundary.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "essential" => Some(MembershipTier::Essential),
            "premium" => Some(MembershipTier::Premium),
            "elite" => Some(MembershipTier::Elite),
            _ => None,
        }
    }
}

impl std::fmt::Display for MembershipTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "active" => SubscriptionStatus::Active,
            "cancelled" => SubscriptionStatus::Cancelled,
            _ => SubscriptionStatus::Pending,
        }
    }
}

/// Subscription row. Expiry at `end_date` is informational; nothing in this
/// service transitions subscriptions based on the calendar.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Subscription {
    pub subscription_id: Uuid,
    pub user_id: Uuid,
    pub plan: String,
    pub status: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_parse_round_trips() {
        for tier in [
            MembershipTier::Essential,
            MembershipTier::Premium,
            MembershipTier::Elite,
        ] {
            assert_eq!(MembershipTier::parse(tier.as_str()), Some(tier));
        }
        assert_eq!(MembershipTier::parse("platinum"), None);
        assert_eq!(MembershipTier::parse(""), None);
    }

    #[test]
    fn status_from_string_defaults_to_pending() {
        assert_eq!(
            SubscriptionStatus::from_string("active"),
            SubscriptionStatus::Active
        );
        assert_eq!(
            SubscriptionStatus::from_string("bogus"),
            SubscriptionStatus::Pending
        );
    }
}
