//! Subscription checkout and activation handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::models::{MembershipTier, Subscription};
use crate::services::metrics::SUBSCRIPTIONS_ACTIVATED_TOTAL;
use crate::startup::AppState;

/// Request to start a subscription checkout.
#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1, message = "plan is required"))]
    pub plan: String,
    /// Amount in FCFA the gateway will collect.
    pub amount_fcfa: Decimal,
}

#[derive(Debug, Serialize)]
pub struct CheckoutData {
    pub subscription: Subscription,
    /// Reference the UI hands to the mobile-money gateway.
    pub reference: String,
    pub amount_fcfa: Decimal,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub success: bool,
    pub data: CheckoutData,
}

/// Create a pending subscription and its gateway payment attempt.
///
/// The subscription stays pending until the gateway webhook confirms the
/// reference or the activation endpoint is called.
pub async fn checkout(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), AppError> {
    payload.validate()?;

    let tier = MembershipTier::parse(&payload.plan).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!("Unknown membership plan: {}", payload.plan))
    })?;

    if payload.amount_fcfa <= Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "amount_fcfa must be positive"
        )));
    }

    if state.profile(payload.user_id).await?.is_none() {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "User {} not found",
            payload.user_id
        )));
    }

    let (subscription, attempt) = state
        .db
        .create_pending_subscription(payload.user_id, tier, payload.amount_fcfa)
        .await?;

    tracing::info!(
        subscription_id = %subscription.subscription_id,
        user_id = %payload.user_id,
        plan = %tier,
        reference = %attempt.reference,
        "Subscription checkout created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            success: true,
            data: CheckoutData {
                subscription,
                reference: attempt.reference,
                amount_fcfa: attempt.amount,
            },
        }),
    ))
}

/// Request to activate a subscription. All fields are required; the fields
/// are optional here only so a missing one maps to a 400 with a message
/// naming it instead of a bare deserialization rejection.
#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub subscription_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub plan: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub success: bool,
    pub data: Subscription,
}

/// Activate a subscription and synchronize the owner's membership tier.
pub async fn activate(
    State(state): State<AppState>,
    Json(payload): Json<ActivateRequest>,
) -> Result<Json<SubscriptionResponse>, AppError> {
    let subscription_id = payload
        .subscription_id
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("subscription_id is required")))?;
    let user_id = payload
        .user_id
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("user_id is required")))?;
    let plan = payload
        .plan
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("plan is required")))?;

    let tier = MembershipTier::parse(plan)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown membership plan: {}", plan)))?;

    let subscription = state
        .db
        .activate_subscription(subscription_id, user_id, tier)
        .await?;

    state.profiles.invalidate(&user_id);
    SUBSCRIPTIONS_ACTIVATED_TOTAL
        .with_label_values(&[tier.as_str()])
        .inc();

    tracing::info!(
        subscription_id = %subscription_id,
        user_id = %user_id,
        plan = %tier,
        "Subscription activated"
    );

    Ok(Json(SubscriptionResponse {
        success: true,
        data: subscription,
    }))
}

/// Get a subscription by ID.
pub async fn get_subscription(
    State(state): State<AppState>,
    Path(subscription_id): Path<Uuid>,
) -> Result<Json<SubscriptionResponse>, AppError> {
    let subscription = state
        .db
        .get_subscription(subscription_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Subscription not found")))?;

    Ok(Json(SubscriptionResponse {
        success: true,
        data: subscription,
    }))
}

#[derive(Debug, Serialize)]
pub struct SubscriptionListResponse {
    pub success: bool,
    pub data: Vec<Subscription>,
}

/// List a user's subscriptions, newest first.
pub async fn list_user_subscriptions(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<SubscriptionListResponse>, AppError> {
    let subscriptions = state.db.list_user_subscriptions(user_id).await?;

    Ok(Json(SubscriptionListResponse {
        success: true,
        data: subscriptions,
    }))
}
