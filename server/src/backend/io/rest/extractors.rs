//! Request extractors.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::Response,
};

use super::error::error_response;
use crate::backend::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const PAYMENT_TOKEN_HEADER: &str = "x-payment-token";

/// Opaque id of the calling user, supplied by the identity layer in front
/// of this service. Requests without it are rejected with 401.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser(pub String);

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| CurrentUser(id.to_string()))
            .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "Missing x-user-id header"))
    }
}

/// The payment processor reporting on a transfer. Only it may settle or
/// fail a deposit, because settling credits the student's balance.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentProcessor;

#[async_trait]
impl FromRequestParts<AppState> for PaymentProcessor {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.payment_token.as_deref() else {
            return Err(error_response(StatusCode::FORBIDDEN, "Deposit settlement is disabled"));
        };

        let presented = parts
            .headers
            .get(PAYMENT_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|token| !token.is_empty());
        match presented {
            None => Err(error_response(StatusCode::UNAUTHORIZED, "Missing x-payment-token header")),
            Some(token) if token == expected => Ok(PaymentProcessor),
            Some(_) => Err(error_response(StatusCode::FORBIDDEN, "Invalid payment token")),
        }
    }
}
