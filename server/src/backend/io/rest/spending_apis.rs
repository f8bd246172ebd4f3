//! # REST API for Spending Limits
//!
//! Limits, usage status and the purchase eligibility check.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use tracing::info;

use crate::backend::AppState;
use shared::{PurchaseCheckRequest, PurchaseCheckResponse, UpdateSpendingLimitRequest};

/// Current daily and monthly usage against the student's limits
pub async fn get_spending_status(
    State(state): State<AppState>,
    Path((school_id, student_id)): Path<(String, String)>,
) -> impl IntoResponse {
    info!("GET /api/spending/{}/{}/status", school_id, student_id);

    match state.spending_service.get_spending_status(&student_id, &school_id).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_spending_limit(
    State(state): State<AppState>,
    Path((school_id, student_id)): Path<(String, String)>,
) -> impl IntoResponse {
    info!("GET /api/spending/{}/{}/limits", school_id, student_id);

    match state.spending_service.get_or_create_limit(&student_id, &school_id).await {
        Ok(limit) => (StatusCode::OK, Json(limit)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn update_spending_limit(
    State(state): State<AppState>,
    Path((school_id, student_id)): Path<(String, String)>,
    Json(request): Json<UpdateSpendingLimitRequest>,
) -> impl IntoResponse {
    info!("PUT /api/spending/{}/{}/limits - request: {:?}", school_id, student_id, request);

    match state
        .spending_service
        .update_limit(&student_id, &school_id, request.daily_limit, request.monthly_limit)
        .await
    {
        Ok(limit) => (StatusCode::OK, Json(limit)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Always answers 200; a failed check is `allowed: false`
pub async fn check_purchase(
    State(state): State<AppState>,
    Json(request): Json<PurchaseCheckRequest>,
) -> impl IntoResponse {
    info!("POST /api/spending/check - request: {:?}", request);

    let allowed = state
        .spending_service
        .can_make_purchase(&request.student_id, &request.school_id, request.amount)
        .await;
    (StatusCode::OK, Json(PurchaseCheckResponse { allowed }))
}
