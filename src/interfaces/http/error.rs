use crate::error::{ErrorBody, PaymentError};
use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

/// An error rendered as `{code, message}` with its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody::new(code, message),
        }
    }
}

pub fn status_for(err: &PaymentError) -> StatusCode {
    match err {
        PaymentError::InvalidRequest(_) | PaymentError::InvalidId(_) => StatusCode::BAD_REQUEST,
        PaymentError::CardNotFound(_) | PaymentError::ChargeNotFound(_) => StatusCode::NOT_FOUND,
        PaymentError::CardNotChargeable(_)
        | PaymentError::InsufficientFunds
        | PaymentError::CurrencyMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        PaymentError::InvalidTransition { .. } | PaymentError::StatusConflict { .. } => {
            StatusCode::CONFLICT
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        let status = status_for(&err);
        let message = match &err {
            PaymentError::CardNotFound(_) => "Card not found".to_string(),
            PaymentError::ChargeNotFound(_) => "Charge not found".to_string(),
            PaymentError::InvalidId(_) => "Invalid ID format".to_string(),
            PaymentError::CardUpdateFailed(_) => {
                error!(error = %err, "charge rolled back");
                "Failed to update card status after charge".to_string()
            }
            e if e.is_internal() => {
                error!(error = %e, "request failed");
                "An error occurred while processing the request".to_string()
            }
            e => e.to_string(),
        };
        Self::new(status, err.code(), message)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "INVALID_REQUEST",
            rejection.body_text(),
        )
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "INVALID_REQUEST",
            rejection.body_text(),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
