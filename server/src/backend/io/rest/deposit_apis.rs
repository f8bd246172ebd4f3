//! # REST API for Deposits
//!
//! The calling parent always owns the deposit: any `parent_user_id` in a
//! request body is replaced by the `x-user-id` identity. Settling or failing
//! a deposit is reserved for the payment processor (`x-payment-token`).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::info;

use super::extractors::{CurrentUser, PaymentProcessor};
use crate::backend::AppState;
use shared::{Deposit, DepositRequest, FailDepositRequest};

#[derive(Debug, Serialize)]
pub struct CompleteDepositResponse {
    pub deposit: Deposit,
    pub new_balance: f64,
}

pub async fn validate_deposit(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(mut request): Json<DepositRequest>,
) -> impl IntoResponse {
    info!("POST /api/deposits/validate - parent: {}", user.id());
    request.parent_user_id = user.0;

    let validation = state.deposit_service.validate_deposit(&request).await;
    (StatusCode::OK, Json(validation))
}

pub async fn create_deposit(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(mut request): Json<DepositRequest>,
) -> impl IntoResponse {
    info!("POST /api/deposits - parent: {}, amount: {}", user.id(), request.amount);
    request.parent_user_id = user.0;

    match state.deposit_service.create_deposit(request).await {
        Ok(deposit) => (StatusCode::CREATED, Json(deposit)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn list_deposits(State(state): State<AppState>, user: CurrentUser) -> impl IntoResponse {
    info!("GET /api/deposits - parent: {}", user.id());

    match state.deposit_service.list_deposits(user.id()).await {
        Ok(deposits) => (StatusCode::OK, Json(deposits)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn complete_deposit(
    State(state): State<AppState>,
    _processor: PaymentProcessor,
    Path(deposit_id): Path<String>,
) -> impl IntoResponse {
    info!("POST /api/deposits/{}/complete - payment processor", deposit_id);

    match state.deposit_service.complete_deposit(&deposit_id).await {
        Ok((deposit, new_balance)) => {
            (StatusCode::OK, Json(CompleteDepositResponse { deposit, new_balance })).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn fail_deposit(
    State(state): State<AppState>,
    _processor: PaymentProcessor,
    Path(deposit_id): Path<String>,
    Json(request): Json<FailDepositRequest>,
) -> impl IntoResponse {
    info!("POST /api/deposits/{}/fail - payment processor", deposit_id);

    match state.deposit_service.fail_deposit(&deposit_id, &request.reason).await {
        Ok(deposit) => (StatusCode::OK, Json(deposit)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn cancel_deposit(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(deposit_id): Path<String>,
) -> impl IntoResponse {
    info!("POST /api/deposits/{}/cancel - parent: {}", deposit_id, user.id());

    match state.deposit_service.cancel_deposit(user.id(), &deposit_id).await {
        Ok(deposit) => (StatusCode::OK, Json(deposit)).into_response(),
        Err(e) => e.into_response(),
    }
}
