//! Secours token endpoints: purchase initiation, balances, history,
//! withdrawal.
//!
//! Purchases never credit tokens directly; they record a pending payment
//! attempt whose `TOKENS_` reference the gateway webhook later confirms.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::models::{PaymentAttempt, SecoursAccount, SecoursPlan, SecoursTransaction};
use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct PurchaseRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1, message = "plan is required"))]
    pub plan: String,
    pub amount_fcfa: Decimal,
    pub payment_method: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PurchaseData {
    /// Reference the UI hands to the mobile-money gateway.
    pub reference: String,
    pub attempt: PaymentAttempt,
    /// Tokens this amount buys if the gateway confirms it unchanged.
    pub expected_tokens: i64,
}

#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub success: bool,
    pub data: PurchaseData,
}

/// Start a token purchase: records the pending attempt and returns the
/// gateway reference.
pub async fn purchase(
    State(state): State<AppState>,
    Json(payload): Json<PurchaseRequest>,
) -> Result<(StatusCode, Json<PurchaseResponse>), AppError> {
    payload.validate()?;

    let plan = SecoursPlan::parse(&payload.plan).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!("Unknown secours plan: {}", payload.plan))
    })?;

    if payload.amount_fcfa <= Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "amount_fcfa must be positive"
        )));
    }

    let payment_method = payload
        .payment_method
        .as_deref()
        .unwrap_or("mobile_money");

    let attempt = state
        .db
        .create_token_purchase_attempt(payload.user_id, plan, payload.amount_fcfa, payment_method)
        .await?;

    let expected_tokens = SecoursPlan::tokens_for_amount(plan.as_str(), payload.amount_fcfa);

    tracing::info!(
        user_id = %payload.user_id,
        plan = %plan,
        amount = %payload.amount_fcfa,
        reference = %attempt.reference,
        "Token purchase initiated"
    );

    Ok((
        StatusCode::CREATED,
        Json(PurchaseResponse {
            success: true,
            data: PurchaseData {
                reference: attempt.reference.clone(),
                attempt,
                expected_tokens,
            },
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub success: bool,
    pub data: Vec<SecoursAccount>,
}

/// All token accounts for a user.
pub async fn balance(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<BalanceResponse>, AppError> {
    let accounts = state.db.list_secours_accounts(user_id).await?;

    Ok(Json(BalanceResponse {
        success: true,
        data: accounts,
    }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub plan: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub data: Vec<SecoursTransaction>,
}

/// Ledger history for a user, newest first.
pub async fn history(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let transactions = state
        .db
        .list_secours_transactions(user_id, query.plan.as_deref(), query.limit.unwrap_or(50))
        .await?;

    Ok(Json(HistoryResponse {
        success: true,
        data: transactions,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct WithdrawRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1, message = "plan is required"))]
    pub plan: String,
    pub tokens: i64,
}

#[derive(Debug, Serialize)]
pub struct WithdrawData {
    pub account: SecoursAccount,
    pub transaction: SecoursTransaction,
}

#[derive(Debug, Serialize)]
pub struct WithdrawResponse {
    pub success: bool,
    pub data: WithdrawData,
}

/// Debit tokens from an account for an assistance disbursement.
pub async fn withdraw(
    State(state): State<AppState>,
    Json(payload): Json<WithdrawRequest>,
) -> Result<Json<WithdrawResponse>, AppError> {
    payload.validate()?;

    if payload.tokens <= 0 {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "tokens must be positive"
        )));
    }

    let (account, transaction) = state
        .db
        .withdraw_tokens(payload.user_id, &payload.plan, payload.tokens)
        .await?;

    tracing::info!(
        user_id = %payload.user_id,
        plan = %payload.plan,
        tokens = payload.tokens,
        balance = account.token_balance,
        "Tokens withdrawn"
    );

    Ok(Json(WithdrawResponse {
        success: true,
        data: WithdrawData {
            account,
            transaction,
        },
    }))
}
