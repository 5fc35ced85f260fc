use crate::domain::card::{Card, CardId, CardStatus, CardView, IssuedCard, StatusChange};
use crate::domain::charge::Metadata;
use crate::domain::money::{Amount, Currency};
use crate::domain::ports::CardStoreBox;
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Card creation request as received from a client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateCardRequest {
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub metadata: Option<Metadata>,
}

/// Owns the card lifecycle on top of a [`CardStore`](crate::domain::ports::CardStore).
///
/// This is the logic behind the card service endpoint; the charge orchestrator
/// reaches it either in-process or over HTTP.
pub struct CardService {
    store: CardStoreBox,
}

impl CardService {
    pub fn new(store: CardStoreBox) -> Self {
        Self { store }
    }

    /// Validates the request and persists a new `active` card.
    ///
    /// The returned value is the only one that carries the security code.
    pub async fn create_card(&self, request: CreateCardRequest) -> Result<IssuedCard> {
        let amount = Amount::new(
            request
                .amount
                .ok_or_else(|| PaymentError::InvalidRequest("\"amount\" is required".into()))?,
        )?;
        let currency = request
            .currency
            .ok_or_else(|| PaymentError::InvalidRequest("\"currency\" is required".into()))?
            .parse::<Currency>()?;

        let card = Card::issue(amount, currency, request.metadata.unwrap_or_default());
        self.store.insert(card.clone()).await?;

        info!(card_id = %card.id, %amount, %currency, "card created");
        Ok(IssuedCard::from(card))
    }

    /// Looks up a card by its raw identifier.
    ///
    /// A malformed identifier cannot name any card and is reported as not found.
    pub async fn get_card(&self, id: &str) -> Result<CardView> {
        let card_id = id
            .parse::<CardId>()
            .map_err(|_| PaymentError::CardNotFound(id.to_string()))?;
        self.get_card_by_id(card_id).await
    }

    pub async fn get_card_by_id(&self, id: CardId) -> Result<CardView> {
        self.store
            .get(id)
            .await?
            .map(CardView::from)
            .ok_or_else(|| PaymentError::CardNotFound(id.to_string()))
    }

    pub async fn update_card_status(&self, id: CardId, change: StatusChange) -> Result<CardView> {
        let card = self
            .store
            .update_status(id, change)
            .await?
            .ok_or_else(|| PaymentError::CardNotFound(id.to_string()))?;

        debug!(card_id = %id, status = %card.status(), "card status updated");
        Ok(CardView::from(card))
    }

    /// Convenience for administrative paths that only move a card out of `active`.
    pub async fn retire_card(&self, id: CardId, status: CardStatus) -> Result<CardView> {
        if status == CardStatus::Used {
            return Err(PaymentError::InvalidRequest(
                "cards only become used through a charge".into(),
            ));
        }
        self.update_card_status(id, StatusChange::to(status)).await
    }

    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }
}
