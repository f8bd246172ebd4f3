//! # REST API for Gifts and Thank-You Notes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use tracing::info;

use super::extractors::CurrentUser;
use crate::backend::AppState;
use shared::{RedeemGiftRequest, SendGiftRequest, SendThankYouRequest};

pub async fn send_gift(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<SendGiftRequest>,
) -> impl IntoResponse {
    info!(
        "POST /api/gifts - sender: {}, receiver: {}, product: {}",
        user.id(),
        request.receiver_id,
        request.product_id
    );

    match state.gift_service.send_gift(user.id(), request).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn list_received_gifts(State(state): State<AppState>, user: CurrentUser) -> impl IntoResponse {
    info!("GET /api/gifts - receiver: {}", user.id());

    match state.gift_service.list_received_gifts(user.id()).await {
        Ok(gifts) => (StatusCode::OK, Json(gifts)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn redeem_gift(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<RedeemGiftRequest>,
) -> impl IntoResponse {
    info!("POST /api/gifts/redeem - receiver: {}", user.id());

    match state.gift_service.redeem_gift(user.id(), &request.redemption_code).await {
        Ok(gift) => (StatusCode::OK, Json(gift)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn send_thank_you(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(gift_id): Path<String>,
    Json(request): Json<SendThankYouRequest>,
) -> impl IntoResponse {
    info!("POST /api/gifts/{}/thanks - from: {}", gift_id, user.id());

    match state.gift_service.send_thank_you(&gift_id, user.id(), &request.message).await {
        Ok(note) => (StatusCode::CREATED, Json(note)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn list_thank_you_notes(State(state): State<AppState>, user: CurrentUser) -> impl IntoResponse {
    info!("GET /api/thanks - user: {}", user.id());

    match state.gift_service.list_thank_you_notes(user.id()).await {
        Ok(notes) => (StatusCode::OK, Json(notes)).into_response(),
        Err(e) => e.into_response(),
    }
}
