//! Affiliate reporting endpoints. Read-only: referrals and rewards are
//! written by the registration flow, which lives outside this service.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{AffiliateSummary, LeaderboardEntry, UserProfile};
use crate::startup::AppState;

#[derive(Debug, Serialize)]
pub struct SummaryData {
    pub referrer: Option<UserProfile>,
    #[serde(flatten)]
    pub totals: AffiliateSummary,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub success: bool,
    pub data: SummaryData,
}

/// Dashboard totals for one referrer. The profile lookup goes through the
/// TTL cache; a referrer without a user row still gets their totals.
pub async fn summary(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<SummaryResponse>, AppError> {
    let referrer = state.profile(user_id).await?;
    let totals = state.db.affiliate_summary(user_id).await?;

    Ok(Json(SummaryResponse {
        success: true,
        data: SummaryData { referrer, totals },
    }))
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub success: bool,
    pub data: Vec<LeaderboardEntry>,
}

/// Top-10 referrers by summed commission.
pub async fn leaderboard(
    State(state): State<AppState>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let entries = state.db.affiliate_leaderboard().await?;

    Ok(Json(LeaderboardResponse {
        success: true,
        data: entries,
    }))
}
