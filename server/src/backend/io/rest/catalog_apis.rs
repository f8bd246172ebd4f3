//! # REST API for Profiles, Products and Favorites

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use tracing::info;

use super::extractors::CurrentUser;
use crate::backend::AppState;
use shared::AddFavoriteRequest;

pub async fn list_products(State(state): State<AppState>, Path(school_id): Path<String>) -> impl IntoResponse {
    info!("GET /api/schools/{}/products", school_id);

    match state.catalog_service.list_products(&school_id).await {
        Ok(products) => (StatusCode::OK, Json(products)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path((school_id, student_id)): Path<(String, String)>,
) -> impl IntoResponse {
    info!("GET /api/profiles/{}/{}", school_id, student_id);

    match state.catalog_service.get_profile(&student_id, &school_id).await {
        Ok(profile) => (StatusCode::OK, Json(profile)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn list_favorites(State(state): State<AppState>, user: CurrentUser) -> impl IntoResponse {
    info!("GET /api/favorites - student: {}", user.id());

    match state.catalog_service.list_favorites(user.id()).await {
        Ok(favorites) => (StatusCode::OK, Json(favorites)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn add_favorite(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<AddFavoriteRequest>,
) -> impl IntoResponse {
    info!("POST /api/favorites - student: {}, product: {}", user.id(), request.product_id);

    match state
        .catalog_service
        .add_favorite(user.id(), &request.school_id, &request.product_id)
        .await
    {
        Ok(favorite) => (StatusCode::CREATED, Json(favorite)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(product_id): Path<String>,
) -> impl IntoResponse {
    info!("DELETE /api/favorites/{} - student: {}", product_id, user.id());

    match state.catalog_service.remove_favorite(user.id(), &product_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}
