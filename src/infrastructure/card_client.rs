use crate::application::cards::CardService;
use crate::domain::card::{CardId, CardStatus, CardView, StatusChange};
use crate::domain::ports::CardServiceClient;
use crate::error::{ErrorBody, PaymentError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Reaches a card service running in the same process.
#[derive(Clone)]
pub struct LocalCardClient {
    service: Arc<CardService>,
}

impl LocalCardClient {
    pub fn new(service: Arc<CardService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl CardServiceClient for LocalCardClient {
    async fn fetch_card(&self, id: CardId) -> Result<Option<CardView>> {
        match self.service.get_card_by_id(id).await {
            Ok(card) => Ok(Some(card)),
            Err(PaymentError::CardNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn set_card_status(&self, id: CardId, change: StatusChange) -> Result<CardView> {
        self.service.update_card_status(id, change).await
    }
}

/// Reaches the card service endpoint over HTTP.
///
/// `GET {base}/cards/{id}` and `PUT {base}/cards/{id}/status`. Every request is
/// bounded by the configured timeout; nothing is retried.
#[derive(Clone)]
pub struct HttpCardClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCardClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn card_url(&self, id: CardId) -> String {
        format!("{}/cards/{id}", self.base_url)
    }

    /// Current status of a card, used to explain a rejected update.
    async fn current_status(&self, id: CardId) -> Result<CardStatus> {
        self.fetch_card(id)
            .await?
            .map(|card| card.status)
            .ok_or_else(|| PaymentError::CardNotFound(id.to_string()))
    }
}

#[async_trait]
impl CardServiceClient for HttpCardClient {
    async fn fetch_card(&self, id: CardId) -> Result<Option<CardView>> {
        let response = self.client.get(self.card_url(id)).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(PaymentError::RemoteCall(format!(
                "GET card answered {status}"
            ))),
        }
    }

    async fn set_card_status(&self, id: CardId, change: StatusChange) -> Result<CardView> {
        let response = self
            .client
            .put(format!("{}/status", self.card_url(id)))
            .json(&change)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(PaymentError::CardNotFound(id.to_string()));
        }
        if status == StatusCode::CONFLICT {
            let body: Option<ErrorBody> = response.json().await.ok();
            debug!(card_id = %id, code = ?body.as_ref().map(|b| &b.code), "card status update rejected");
            // The 409 already settles the outcome; the re-fetch only names the status
            let actual = match self.current_status(id).await {
                Ok(actual) => actual,
                Err(e) => {
                    debug!(card_id = %id, error = %e, "could not re-read card after conflict");
                    change.status
                }
            };
            return Err(match body.as_ref().map(|b| b.code.as_str()) {
                Some("STATUS_CONFLICT") => PaymentError::StatusConflict {
                    id,
                    expected: change.expected_status.unwrap_or(CardStatus::Active),
                    actual,
                },
                _ => PaymentError::InvalidTransition {
                    from: actual,
                    to: change.status,
                },
            });
        }
        Err(PaymentError::RemoteCall(format!(
            "PUT card status answered {status}"
        )))
    }
}
