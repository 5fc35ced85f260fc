//! Shared fakes for the charge workflow tests.
//!
//! Each integration test file is its own crate, so helpers used by only some
//! of them would otherwise warn as dead code.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use ghostpay::domain::card::{CardId, CardStatus, CardView, StatusChange};
use ghostpay::domain::charge::{Charge, ChargeId, ChargeRequest};
use ghostpay::domain::money::{Amount, Currency};
use ghostpay::domain::ports::{
    CardServiceClient, ChargeStore, ChargeTransaction, ChargeTransactionBox,
};
use ghostpay::error::{PaymentError, Result};
use ghostpay::infrastructure::in_memory::InMemoryChargeStore;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;

pub fn card_view(amount: Decimal, currency: Currency, status: CardStatus) -> CardView {
    let now = Utc::now();
    CardView {
        id: CardId::new(),
        status,
        amount: Amount::new(amount).unwrap(),
        currency,
        card_number: "************4242".to_string(),
        expiry_month: 12,
        expiry_year: 2030,
        created_at: now,
        updated_at: now,
        metadata: Default::default(),
    }
}

pub fn charge_request(card_id: CardId, amount: Decimal, currency: &str) -> ChargeRequest {
    ChargeRequest {
        card_id: Some(card_id.to_string()),
        amount: Some(amount),
        currency: Some(currency.to_string()),
        description: None,
        metadata: None,
    }
}

#[derive(Default)]
struct FakeState {
    cards: Mutex<HashMap<CardId, CardView>>,
    fail_updates: AtomicBool,
    fetch_delay: Mutex<Option<Duration>>,
    update_delay: Mutex<Option<Duration>>,
    fetches: AtomicUsize,
    updates: AtomicUsize,
}

/// In-memory stand-in for the card service endpoint.
///
/// Accepts any status update, ignoring the expected status, like a facade
/// that only overwrites a column.
#[derive(Clone, Default)]
pub struct FakeCardService {
    state: Arc<FakeState>,
}

impl FakeCardService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, card: CardView) -> CardId {
        let id = card.id;
        self.state.cards.lock().unwrap().insert(id, card);
        id
    }

    pub fn status(&self, id: CardId) -> Option<CardStatus> {
        self.state.cards.lock().unwrap().get(&id).map(|c| c.status)
    }

    pub fn fail_updates(&self) {
        self.state.fail_updates.store(true, Ordering::SeqCst);
    }

    pub fn delay_fetches(&self, delay: Duration) {
        *self.state.fetch_delay.lock().unwrap() = Some(delay);
    }

    pub fn delay_updates(&self, delay: Duration) {
        *self.state.update_delay.lock().unwrap() = Some(delay);
    }

    pub fn fetches(&self) -> usize {
        self.state.fetches.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.state.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CardServiceClient for FakeCardService {
    async fn fetch_card(&self, id: CardId) -> Result<Option<CardView>> {
        let delay = *self.state.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.state.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.cards.lock().unwrap().get(&id).cloned())
    }

    async fn set_card_status(&self, id: CardId, change: StatusChange) -> Result<CardView> {
        let delay = *self.state.update_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.state.fail_updates.load(Ordering::SeqCst) {
            return Err(PaymentError::RemoteCall("connection refused".into()));
        }

        self.state.updates.fetch_add(1, Ordering::SeqCst);
        let mut cards = self.state.cards.lock().unwrap();
        let card = cards
            .get_mut(&id)
            .ok_or_else(|| PaymentError::CardNotFound(id.to_string()))?;
        card.status = change.status;
        Ok(card.clone())
    }
}

/// Wraps a client so that every `fetch_card` waits until `parties` fetches
/// are in flight. Forces concurrent charges to all read the card before any
/// of them updates it.
#[derive(Clone)]
pub struct LockstepClient<C> {
    inner: C,
    barrier: Arc<Barrier>,
}

impl<C> LockstepClient<C> {
    pub fn new(inner: C, parties: usize) -> Self {
        Self {
            inner,
            barrier: Arc::new(Barrier::new(parties)),
        }
    }
}

#[async_trait]
impl<C: CardServiceClient> CardServiceClient for LockstepClient<C> {
    async fn fetch_card(&self, id: CardId) -> Result<Option<CardView>> {
        let card = self.inner.fetch_card(id).await;
        self.barrier.wait().await;
        card
    }

    async fn set_card_status(&self, id: CardId, change: StatusChange) -> Result<CardView> {
        self.inner.set_card_status(id, change).await
    }
}

/// Charge store whose commits always fail, as after a crash or disk error.
#[derive(Clone, Default)]
pub struct FailingCommitStore {
    inner: InMemoryChargeStore,
}

impl FailingCommitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

struct FailingCommitTransaction;

#[async_trait]
impl ChargeTransaction for FailingCommitTransaction {
    async fn insert(&mut self, _charge: Charge) -> Result<()> {
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        Err(PaymentError::InternalError("disk full".into()))
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl ChargeStore for FailingCommitStore {
    async fn begin(&self) -> Result<ChargeTransactionBox> {
        Ok(Box::new(FailingCommitTransaction))
    }

    async fn get(&self, id: ChargeId) -> Result<Option<Charge>> {
        self.inner.get(id).await
    }

    async fn list_by_card(&self, card_id: CardId) -> Result<Vec<Charge>> {
        self.inner.list_by_card(card_id).await
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
