//! # REST API for Alerts

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tracing::info;

use super::extractors::CurrentUser;
use crate::backend::AppState;
use shared::{CreateAlertRequest, CreateAlertResponse};

#[derive(Debug, Deserialize)]
pub struct UnreadAlertsQuery {
    pub school_id: String,
}

/// Append an alert. Used by producers outside this service.
pub async fn create_alert(
    State(state): State<AppState>,
    Json(request): Json<CreateAlertRequest>,
) -> impl IntoResponse {
    info!(
        "POST /api/alerts - {} for parent {}",
        request.alert_type.as_str(),
        request.parent_user_id
    );

    match state.alert_service.create_alert(request).await {
        Ok(alert_id) => (StatusCode::CREATED, Json(CreateAlertResponse { alert_id })).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_unread_alerts(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<UnreadAlertsQuery>,
) -> impl IntoResponse {
    info!("GET /api/alerts/unread - parent: {}, school: {}", user.id(), query.school_id);

    match state.alert_service.get_unread_alerts(user.id(), &query.school_id).await {
        Ok(alerts) => (StatusCode::OK, Json(alerts)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn mark_alert_read(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(alert_id): Path<String>,
) -> impl IntoResponse {
    info!("POST /api/alerts/{}/read - parent: {}", alert_id, user.id());

    match state.alert_service.mark_alert_read(user.id(), &alert_id).await {
        Ok(alert) => (StatusCode::OK, Json(alert)).into_response(),
        Err(e) => e.into_response(),
    }
}
