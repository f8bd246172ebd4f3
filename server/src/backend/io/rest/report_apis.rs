//! # REST API for Reports

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tracing::info;

use crate::backend::AppState;

const DEFAULT_WINDOW_DAYS: u32 = 30;

#[derive(Debug, Deserialize)]
pub struct SchoolReportQuery {
    pub window_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct StudentReportQuery {
    pub school_id: String,
    pub start: String,
    pub end: String,
}

pub async fn get_school_report(
    State(state): State<AppState>,
    Path(school_id): Path<String>,
    Query(query): Query<SchoolReportQuery>,
) -> impl IntoResponse {
    info!("GET /api/reports/schools/{} - query: {:?}", school_id, query);

    let window_days = query.window_days.unwrap_or(DEFAULT_WINDOW_DAYS);
    match state.reporting_service.get_school_report(&school_id, window_days).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_student_report(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    Query(query): Query<StudentReportQuery>,
) -> impl IntoResponse {
    info!("GET /api/reports/students/{} - query: {:?}", student_id, query);

    match state
        .reporting_service
        .get_student_transaction_report(&student_id, &query.school_id, &query.start, &query.end)
        .await
    {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => e.into_response(),
    }
}
