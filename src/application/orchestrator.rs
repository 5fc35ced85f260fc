use crate::domain::card::{CardId, CardStatus, CardView, StatusChange};
use crate::domain::charge::{Charge, ChargeId, ChargeRequest, ValidatedCharge};
use crate::domain::ports::{CardServiceClientBox, ChargeStoreBox, ChargeTransactionBox};
use crate::error::{PaymentError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

/// Default bound on each call to the card service.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(5);

/// How the card status update in the last step protects against concurrent
/// charges on the same card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChargeGuard {
    /// The update only applies while the card is still `active`; a request that
    /// loses the race is rolled back and rejected as not chargeable.
    #[default]
    CompareAndSwap,
    /// Plain overwrite. Two concurrent requests that both read the card as
    /// `active` can both succeed.
    Unguarded,
}

/// Coordinates the card service and the charge store for one charge.
///
/// There is no transaction spanning both sides. The charge row is committed
/// only after the card service confirms the status update, so a failed update
/// never leaves a visible charge; a commit failure after a successful update
/// leaves the card `used` with no charge and is only logged.
pub struct ChargeOrchestrator {
    cards: CardServiceClientBox,
    charges: ChargeStoreBox,
    remote_timeout: Duration,
    guard: ChargeGuard,
}

impl ChargeOrchestrator {
    pub fn new(cards: CardServiceClientBox, charges: ChargeStoreBox) -> Self {
        Self {
            cards,
            charges,
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
            guard: ChargeGuard::default(),
        }
    }

    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    pub fn with_guard(mut self, guard: ChargeGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn guard(&self) -> ChargeGuard {
        self.guard
    }

    /// Runs the charge workflow: validate, open a transaction, check the card,
    /// insert the charge, mark the card used, commit.
    pub async fn create_charge(&self, request: ChargeRequest) -> Result<Charge> {
        let request = request.validate()?;
        let mut tx = self.charges.begin().await?;

        let card = match self.fetch_chargeable(&request).await {
            Ok(card) => card,
            Err(e) => return abort(tx, e).await,
        };

        let charge = Charge::succeeded(request);
        if let Err(e) = tx.insert(charge.clone()).await {
            return abort(tx, e).await;
        }

        let change = match self.guard {
            ChargeGuard::CompareAndSwap => StatusChange::guarded(CardStatus::Active, CardStatus::Used),
            ChargeGuard::Unguarded => StatusChange::to(CardStatus::Used),
        };
        let update = self
            .remote("set_card_status", self.cards.set_card_status(card.id, change))
            .await;
        if let Err(e) = update {
            let e = match e {
                PaymentError::StatusConflict { actual, .. } => {
                    warn!(card_id = %card.id, %actual, "card changed status during charge");
                    PaymentError::CardNotChargeable(actual)
                }
                PaymentError::InvalidTransition { from, .. } => PaymentError::CardNotChargeable(from),
                other => {
                    warn!(card_id = %card.id, error = %other, "card status update failed, discarding charge");
                    PaymentError::CardUpdateFailed(other.to_string())
                }
            };
            return abort(tx, e).await;
        }

        if let Err(e) = tx.commit().await {
            error!(
                card_id = %card.id,
                charge_id = %charge.id,
                error = %e,
                "charge commit failed after card was marked used; card has no recorded charge"
            );
            return Err(e);
        }

        info!(charge_id = %charge.id, card_id = %card.id, amount = %charge.amount, "charge succeeded");
        Ok(charge)
    }

    pub async fn get_charge(&self, id: ChargeId) -> Result<Charge> {
        self.charges
            .get(id)
            .await?
            .ok_or_else(|| PaymentError::ChargeNotFound(id.to_string()))
    }

    pub async fn charges_for_card(&self, card_id: CardId) -> Result<Vec<Charge>> {
        self.charges.list_by_card(card_id).await
    }

    pub async fn ping(&self) -> Result<()> {
        self.charges.ping().await
    }

    /// Fetches the card and checks it can carry the requested charge.
    async fn fetch_chargeable(&self, request: &ValidatedCharge) -> Result<CardView> {
        let card = self
            .remote("fetch_card", self.cards.fetch_card(request.card_id))
            .await?
            .ok_or_else(|| PaymentError::CardNotFound(request.card_id.to_string()))?;

        if !card.status.is_chargeable() {
            warn!(card_id = %card.id, status = %card.status, "charge rejected: card not chargeable");
            return Err(PaymentError::CardNotChargeable(card.status));
        }
        if card.amount < request.amount {
            warn!(card_id = %card.id, "charge rejected: insufficient funds");
            return Err(PaymentError::InsufficientFunds);
        }
        if card.currency != request.currency {
            warn!(card_id = %card.id, "charge rejected: currency mismatch");
            return Err(PaymentError::CurrencyMismatch {
                card: card.currency,
                requested: request.currency,
            });
        }
        Ok(card)
    }

    /// Bounds a card service call by the configured timeout.
    async fn remote<T>(&self, call: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.remote_timeout, fut)
            .await
            .map_err(|_| {
                PaymentError::RemoteCall(format!(
                    "{call} timed out after {}ms",
                    self.remote_timeout.as_millis()
                ))
            })?
    }
}

/// Rolls back `tx` and returns `err`. A rollback failure is logged but does
/// not replace the original error.
async fn abort<T>(tx: ChargeTransactionBox, err: PaymentError) -> Result<T> {
    if let Err(rollback_err) = tx.rollback().await {
        error!(error = %rollback_err, "charge rollback failed");
    }
    Err(err)
}
