//! # REST API for Payment Methods

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use tracing::info;

use super::extractors::CurrentUser;
use crate::backend::AppState;
use shared::AddPaymentMethodRequest;

pub async fn list_payment_methods(State(state): State<AppState>, user: CurrentUser) -> impl IntoResponse {
    info!("GET /api/payment-methods - parent: {}", user.id());

    match state.payment_method_service.list_payment_methods(user.id()).await {
        Ok(methods) => (StatusCode::OK, Json(methods)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn add_payment_method(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<AddPaymentMethodRequest>,
) -> impl IntoResponse {
    info!("POST /api/payment-methods - parent: {}, label: {}", user.id(), request.label);

    match state.payment_method_service.add_payment_method(user.id(), request).await {
        Ok(method) => (StatusCode::CREATED, Json(method)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn set_default_payment_method(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(method_id): Path<String>,
) -> impl IntoResponse {
    info!("POST /api/payment-methods/{}/default - parent: {}", method_id, user.id());

    match state.payment_method_service.set_default(user.id(), &method_id).await {
        Ok(methods) => (StatusCode::OK, Json(methods)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn remove_payment_method(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(method_id): Path<String>,
) -> impl IntoResponse {
    info!("DELETE /api/payment-methods/{} - parent: {}", method_id, user.id());

    match state
        .payment_method_service
        .remove_payment_method(user.id(), &method_id)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}
