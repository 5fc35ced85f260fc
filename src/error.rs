use crate::domain::card::{CardId, CardStatus};
use crate::domain::money::Currency;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PaymentError>;

#[derive(Error, Debug)]
pub enum PaymentError {
    /// Client input failed a schema or range check.
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
    #[error("Card not found: {0}")]
    CardNotFound(String),
    #[error("Charge not found: {0}")]
    ChargeNotFound(String),
    #[error("Card cannot be charged because it is {0}")]
    CardNotChargeable(CardStatus),
    #[error("Card has insufficient funds for this charge")]
    InsufficientFunds,
    #[error("Charge currency {requested} must match card currency {card}")]
    CurrencyMismatch { card: Currency, requested: Currency },
    #[error("Card status cannot change from {from} to {to}")]
    InvalidTransition { from: CardStatus, to: CardStatus },
    /// The compare-and-swap precondition of a status update did not hold.
    #[error("Card {id} is {actual}, expected {expected}")]
    StatusConflict {
        id: CardId,
        expected: CardStatus,
        actual: CardStatus,
    },
    /// Network error, timeout or non-2xx answer from the card service.
    #[error("Card service call failed: {0}")]
    RemoteCall(String),
    #[error("Failed to update card status after charge: {0}")]
    CardUpdateFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    Storage(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl PaymentError {
    /// Stable machine-readable code shared by the HTTP bodies and the CLI.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::InvalidId(_) => "INVALID_ID",
            Self::CardNotFound(_) => "CARD_NOT_FOUND",
            Self::ChargeNotFound(_) => "CHARGE_NOT_FOUND",
            Self::CardNotChargeable(_) => "CARD_NOT_CHARGEABLE",
            Self::InsufficientFunds => "INSUFFICIENT_FUNDS",
            Self::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            Self::InvalidTransition { .. } => "INVALID_STATUS_TRANSITION",
            Self::StatusConflict { .. } => "STATUS_CONFLICT",
            Self::CardUpdateFailed(_) => "CARD_UPDATE_FAILED",
            Self::RemoteCall(_) | Self::Serialization(_) | Self::InternalError(_) => {
                "INTERNAL_SERVER_ERROR"
            }
            #[cfg(feature = "storage-rocksdb")]
            Self::Storage(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Whether the error carries details that must not reach a client.
    pub fn is_internal(&self) -> bool {
        self.code() == "INTERNAL_SERVER_ERROR"
    }
}

/// Body of every error response: the stable code and a human-readable message.
///
/// The card service produces it and the HTTP card client reads it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        Self::RemoteCall(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_wire_contract() {
        assert_eq!(
            PaymentError::CardNotChargeable(CardStatus::Used).code(),
            "CARD_NOT_CHARGEABLE"
        );
        assert_eq!(PaymentError::InsufficientFunds.code(), "INSUFFICIENT_FUNDS");
        assert_eq!(
            PaymentError::CardUpdateFailed("timeout".into()).code(),
            "CARD_UPDATE_FAILED"
        );
        assert_eq!(
            PaymentError::InternalError("disk".into()).code(),
            "INTERNAL_SERVER_ERROR"
        );
    }

    #[test]
    fn test_not_chargeable_message_names_status() {
        let err = PaymentError::CardNotChargeable(CardStatus::Used);
        assert_eq!(err.to_string(), "Card cannot be charged because it is used");
    }

    #[test]
    fn test_error_body_wire_shape() {
        let body = ErrorBody::new("STATUS_CONFLICT", "Card is used");
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"code":"STATUS_CONFLICT","message":"Card is used"}"#);
        assert_eq!(serde_json::from_str::<ErrorBody>(&json).unwrap(), body);
    }

    #[test]
    fn test_internal_errors_are_flagged() {
        assert!(PaymentError::InternalError("x".into()).is_internal());
        assert!(PaymentError::RemoteCall("x".into()).is_internal());
        assert!(!PaymentError::InsufficientFunds.is_internal());
    }
}
