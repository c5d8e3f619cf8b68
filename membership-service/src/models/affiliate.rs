//! Affiliate aggregation projections. Referral and reward rows are written
//! at registration and reward-grant time by the outer platform; this service
//! only aggregates them, so only the aggregate shapes are modeled.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Per-referrer dashboard totals.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AffiliateSummary {
    pub referral_count: i64,
    pub converted_count: i64,
    pub commission_total: Decimal,
    pub credit_points_total: i64,
}

/// One leaderboard row. `display_name` falls back to "Anonymous" when the
/// referrer's user row no longer exists.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LeaderboardEntry {
    pub referrer_id: Uuid,
    pub display_name: String,
    pub referral_count: i64,
    pub commission_total: Decimal,
}
