use crate::domain::card::CardId;
use crate::domain::money::{Amount, Currency};
use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type Metadata = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChargeId(Uuid);

impl ChargeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChargeId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for ChargeId {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 36 {
            return Err(PaymentError::InvalidId(s.to_string()));
        }
        Uuid::try_parse(s)
            .map(Self)
            .map_err(|_| PaymentError::InvalidId(s.to_string()))
    }
}

impl fmt::Display for ChargeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeStatus {
    Pending,
    Succeeded,
    Failed,
}

/// A charge record as persisted by the charge store and returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Charge {
    pub id: ChargeId,
    pub card_id: CardId,
    pub status: ChargeStatus,
    pub amount: Amount,
    pub currency: Currency,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: Metadata,
}

impl Charge {
    /// Builds the `succeeded` record for an authorized charge.
    pub fn succeeded(request: ValidatedCharge) -> Self {
        let now = Utc::now();
        Self {
            id: ChargeId::new(),
            card_id: request.card_id,
            status: ChargeStatus::Succeeded,
            amount: request.amount,
            currency: request.currency,
            description: request.description,
            created_at: now,
            updated_at: now,
            metadata: request.metadata,
        }
    }
}

/// Charge creation request as received from a client.
///
/// Fields are loosely typed so that [`ChargeRequest::validate`] can report
/// which one is wrong instead of failing deserialization as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChargeRequest {
    pub card_id: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<Metadata>,
}

/// A charge request whose fields all passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedCharge {
    pub card_id: CardId,
    pub amount: Amount,
    pub currency: Currency,
    pub description: Option<String>,
    pub metadata: Metadata,
}

impl ChargeRequest {
    pub fn validate(self) -> Result<ValidatedCharge, PaymentError> {
        let card_id = self
            .card_id
            .ok_or_else(|| required("cardId"))?
            .parse::<CardId>()
            .map_err(|_| PaymentError::InvalidRequest("\"cardId\" must be a valid GUID".into()))?;
        let amount = Amount::new(self.amount.ok_or_else(|| required("amount"))?)?;
        let currency = self
            .currency
            .ok_or_else(|| required("currency"))?
            .parse::<Currency>()?;

        if self.description.as_deref() == Some("") {
            return Err(PaymentError::InvalidRequest(
                "\"description\" is not allowed to be empty".into(),
            ));
        }

        Ok(ValidatedCharge {
            card_id,
            amount,
            currency,
            description: self.description,
            metadata: self.metadata.unwrap_or_default(),
        })
    }
}

fn required(field: &str) -> PaymentError {
    PaymentError::InvalidRequest(format!("\"{field}\" is required"))
}
