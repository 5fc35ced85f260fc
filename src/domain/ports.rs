use super::card::{Card, CardId, CardView, StatusChange};
use super::charge::{Charge, ChargeId};
use crate::error::Result;
use async_trait::async_trait;

/// Persistence for card records.
#[async_trait]
pub trait CardStore: Send + Sync {
    async fn insert(&self, card: Card) -> Result<()>;
    async fn get(&self, id: CardId) -> Result<Option<Card>>;
    /// Applies `change` to the stored card, atomically with respect to other
    /// updates of the same card. Returns `None` if the card does not exist.
    async fn update_status(&self, id: CardId, change: StatusChange) -> Result<Option<Card>>;
    /// Cheap liveness probe used by the health endpoint.
    async fn ping(&self) -> Result<()>;
}

/// Persistence for charge records. Writes only happen inside a [`ChargeTransaction`].
#[async_trait]
pub trait ChargeStore: Send + Sync {
    async fn begin(&self) -> Result<ChargeTransactionBox>;
    async fn get(&self, id: ChargeId) -> Result<Option<Charge>>;
    async fn list_by_card(&self, card_id: CardId) -> Result<Vec<Charge>>;
    async fn ping(&self) -> Result<()>;
}

/// A local transaction scope over the charge store.
///
/// Rows inserted here are invisible to readers until [`commit`](Self::commit).
/// Dropping the transaction without committing discards them.
#[async_trait]
pub trait ChargeTransaction: Send {
    async fn insert(&mut self, charge: Charge) -> Result<()>;
    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// The card service as seen by the charge orchestrator.
#[async_trait]
pub trait CardServiceClient: Send + Sync {
    /// Returns `None` when the card service reports the card as absent.
    async fn fetch_card(&self, id: CardId) -> Result<Option<CardView>>;
    async fn set_card_status(&self, id: CardId, change: StatusChange) -> Result<CardView>;
}

pub type CardStoreBox = Box<dyn CardStore>;
pub type ChargeStoreBox = Box<dyn ChargeStore>;
pub type ChargeTransactionBox = Box<dyn ChargeTransaction>;
pub type CardServiceClientBox = Box<dyn CardServiceClient>;
