use crate::domain::money::{Amount, Currency};
use crate::error::PaymentError;
use chrono::{DateTime, Datelike, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Leading digit of every issued card number.
pub const CARD_NUMBER_PREFIX: char = '4';
pub const CARD_NUMBER_LEN: usize = 16;
pub const VISIBLE_DIGITS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(Uuid);

impl CardId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CardId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for CardId {
    type Err = PaymentError;

    /// Accepts only the hyphenated 8-4-4-4-12 form, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 36 {
            return Err(PaymentError::InvalidId(s.to_string()));
        }
        Uuid::try_parse(s)
            .map(Self)
            .map_err(|_| PaymentError::InvalidId(s.to_string()))
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    Active,
    Used,
    Expired,
    Cancelled,
}

impl CardStatus {
    /// Transition table of the card lifecycle.
    ///
    /// Only an active card may move, and re-asserting the current status is
    /// accepted as a no-op.
    pub fn can_transition_to(self, next: CardStatus) -> bool {
        use CardStatus::*;
        self == next
            || matches!(
                (self, next),
                (Active, Used) | (Active, Expired) | (Active, Cancelled)
            )
    }

    pub fn is_chargeable(self) -> bool {
        self == CardStatus::Active
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::Active => "active",
            CardStatus::Used => "used",
            CardStatus::Expired => "expired",
            CardStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardStatus {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(CardStatus::Active),
            "used" => Ok(CardStatus::Used),
            "expired" => Ok(CardStatus::Expired),
            "cancelled" => Ok(CardStatus::Cancelled),
            other => Err(PaymentError::InvalidRequest(format!(
                "\"status\" must be one of [active, used, expired, cancelled], got {other}"
            ))),
        }
    }
}

/// A stored card, including the sensitive fields.
///
/// The status field is private: [`Card::transition_to`] is the only way to
/// change it once the card exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    status: CardStatus,
    pub amount: Amount,
    pub currency: Currency,
    pub card_number: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
    pub cvv: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    /// Issues a new active card with generated number, expiry and security code.
    pub fn issue(
        amount: Amount,
        currency: Currency,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let mut rng = rand::thread_rng();
        let now = Utc::now();

        let card_number = std::iter::once(CARD_NUMBER_PREFIX)
            .chain((1..CARD_NUMBER_LEN).map(|_| char::from(b'0' + rng.gen_range(0..10u8))))
            .collect();
        let cvv = rng.gen_range(100..1000u16).to_string();

        Self {
            id: CardId::new(),
            status: CardStatus::Active,
            amount,
            currency,
            card_number,
            expiry_month: now.month(),
            expiry_year: now.year() + 1,
            cvv,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> CardStatus {
        self.status
    }

    /// Moves the card to `next` if the lifecycle allows it.
    pub fn transition_to(&mut self, next: CardStatus) -> Result<(), PaymentError> {
        if !self.status.can_transition_to(next) {
            return Err(PaymentError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        if self.status != next {
            self.status = next;
            self.updated_at = Utc::now();
        }
        Ok(())
    }

    pub fn masked_number(&self) -> String {
        mask_card_number(&self.card_number)
    }
}

/// A requested status change, optionally conditioned on the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StatusChange {
    pub status: CardStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_status: Option<CardStatus>,
}

impl StatusChange {
    /// Plain overwrite, subject only to the transition table.
    pub fn to(status: CardStatus) -> Self {
        Self {
            status,
            expected_status: None,
        }
    }

    /// Compare-and-swap: applies only while the card is still `expected`.
    pub fn guarded(expected: CardStatus, status: CardStatus) -> Self {
        Self {
            status,
            expected_status: Some(expected),
        }
    }

    /// Applies the change to `card`. Stores call this while holding the
    /// card's write lock, which makes the check and the write one step.
    pub fn apply(&self, card: &mut Card) -> Result<(), PaymentError> {
        if let Some(expected) = self.expected_status
            && card.status != expected
        {
            return Err(PaymentError::StatusConflict {
                id: card.id,
                expected,
                actual: card.status,
            });
        }
        card.transition_to(self.status)
    }
}

/// What a card looks like to anyone but its creator: masked number, no security code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardView {
    pub id: CardId,
    pub status: CardStatus,
    pub amount: Amount,
    pub currency: Currency,
    pub card_number: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// The creation response: the masked view plus the security code, shown once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCard {
    #[serde(flatten)]
    pub card: CardView,
    pub cvv: String,
}

impl From<&Card> for CardView {
    fn from(card: &Card) -> Self {
        Self {
            id: card.id,
            status: card.status,
            amount: card.amount,
            currency: card.currency,
            card_number: card.masked_number(),
            expiry_month: card.expiry_month,
            expiry_year: card.expiry_year,
            created_at: card.created_at,
            updated_at: card.updated_at,
            metadata: card.metadata.clone(),
        }
    }
}

impl From<Card> for CardView {
    fn from(card: Card) -> Self {
        Self::from(&card)
    }
}

impl From<Card> for IssuedCard {
    fn from(card: Card) -> Self {
        Self {
            card: CardView::from(&card),
            cvv: card.cvv,
        }
    }
}

/// Replaces every digit but the last four with `*`, preserving the length.
pub fn mask_card_number(number: &str) -> String {
    let len = number.chars().count();
    number
        .chars()
        .enumerate()
        .map(|(i, c)| if i + VISIBLE_DIGITS < len { '*' } else { c })
        .collect()
}
