//! # REST API for Parent-Student Links

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use tracing::info;

use super::extractors::CurrentUser;
use crate::backend::AppState;
use shared::LinkStudentRequest;

pub async fn link_student(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<LinkStudentRequest>,
) -> impl IntoResponse {
    info!(
        "POST /api/links - parent: {}, student: {}, school: {}",
        user.id(),
        request.student_id,
        request.school_id
    );

    match state
        .link_service
        .link_parent_student(user.id(), &request.student_id, &request.school_id)
        .await
    {
        Ok(link) => (StatusCode::CREATED, Json(link)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn unlink_student(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<LinkStudentRequest>,
) -> impl IntoResponse {
    info!("DELETE /api/links - parent: {}, student: {}", user.id(), request.student_id);

    match state
        .link_service
        .unlink_parent_student(user.id(), &request.student_id, &request.school_id)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn list_links(State(state): State<AppState>, user: CurrentUser) -> impl IntoResponse {
    info!("GET /api/links - parent: {}", user.id());

    match state.link_service.list_students_for_parent(user.id()).await {
        Ok(links) => (StatusCode::OK, Json(links)).into_response(),
        Err(e) => e.into_response(),
    }
}
