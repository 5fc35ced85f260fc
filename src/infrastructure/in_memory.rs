use crate::domain::card::{Card, CardId, StatusChange};
use crate::domain::charge::{Charge, ChargeId};
use crate::domain::ports::{CardStore, ChargeStore, ChargeTransaction, ChargeTransactionBox};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for cards.
///
/// Uses `Arc<RwLock<HashMap<CardId, Card>>>` to allow shared concurrent access.
/// Status updates run under the write lock, so a guarded update is atomic.
#[derive(Default, Clone)]
pub struct InMemoryCardStore {
    cards: Arc<RwLock<HashMap<CardId, Card>>>,
}

impl InMemoryCardStore {
    /// Creates a new, empty in-memory card store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CardStore for InMemoryCardStore {
    async fn insert(&self, card: Card) -> Result<()> {
        let mut cards = self.cards.write().await;
        if cards.contains_key(&card.id) {
            return Err(PaymentError::InternalError(format!(
                "card {} already exists",
                card.id
            )));
        }
        cards.insert(card.id, card);
        Ok(())
    }

    async fn get(&self, id: CardId) -> Result<Option<Card>> {
        let cards = self.cards.read().await;
        Ok(cards.get(&id).cloned())
    }

    async fn update_status(&self, id: CardId, change: StatusChange) -> Result<Option<Card>> {
        let mut cards = self.cards.write().await;
        let Some(card) = cards.get_mut(&id) else {
            return Ok(None);
        };
        change.apply(card)?;
        Ok(Some(card.clone()))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// A thread-safe in-memory store for charges.
///
/// Only committed charges live in the shared map; a transaction stages its
/// rows privately until commit.
#[derive(Default, Clone)]
pub struct InMemoryChargeStore {
    charges: Arc<RwLock<HashMap<ChargeId, Charge>>>,
}

impl InMemoryChargeStore {
    /// Creates a new, empty in-memory charge store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChargeStore for InMemoryChargeStore {
    async fn begin(&self) -> Result<ChargeTransactionBox> {
        Ok(Box::new(InMemoryChargeTransaction {
            charges: Arc::clone(&self.charges),
            staged: Vec::new(),
        }))
    }

    async fn get(&self, id: ChargeId) -> Result<Option<Charge>> {
        let charges = self.charges.read().await;
        Ok(charges.get(&id).cloned())
    }

    async fn list_by_card(&self, card_id: CardId) -> Result<Vec<Charge>> {
        let charges = self.charges.read().await;
        let mut found: Vec<Charge> = charges
            .values()
            .filter(|c| c.card_id == card_id)
            .cloned()
            .collect();
        found.sort_by_key(|c| c.created_at);
        Ok(found)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

pub struct InMemoryChargeTransaction {
    charges: Arc<RwLock<HashMap<ChargeId, Charge>>>,
    staged: Vec<Charge>,
}

#[async_trait]
impl ChargeTransaction for InMemoryChargeTransaction {
    async fn insert(&mut self, charge: Charge) -> Result<()> {
        self.staged.push(charge);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Self { charges, staged } = *self;
        let mut charges = charges.write().await;
        if let Some(dup) = staged.iter().find(|c| charges.contains_key(&c.id)) {
            return Err(PaymentError::InternalError(format!(
                "charge {} already exists",
                dup.id
            )));
        }
        charges.extend(staged.into_iter().map(|c| (c.id, c)));
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
