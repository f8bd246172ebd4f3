//! # REST API for Purchases

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use tracing::info;

use crate::backend::AppState;
use shared::RecordPurchaseRequest;

/// Record a purchase. Declines are a normal 200 response with
/// `approved: false` and a reason.
pub async fn record_purchase(
    State(state): State<AppState>,
    Json(request): Json<RecordPurchaseRequest>,
) -> impl IntoResponse {
    info!("POST /api/purchases - request: {:?}", request);

    match state
        .purchase_service
        .record_purchase(&request.student_id, &request.school_id, &request.product_id)
        .await
    {
        Ok(response) if response.approved => (StatusCode::CREATED, Json(response)).into_response(),
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => e.into_response(),
    }
}
