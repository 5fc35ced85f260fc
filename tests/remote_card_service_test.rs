mod common;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use common::{card_view, charge_request};
use ghostpay::application::cards::{CardService, CreateCardRequest};
use ghostpay::application::orchestrator::ChargeOrchestrator;
use ghostpay::domain::card::{CardId, CardStatus, CardView, StatusChange};
use ghostpay::domain::money::Currency;
use ghostpay::domain::ports::CardServiceClient;
use ghostpay::error::{ErrorBody, PaymentError};
use ghostpay::infrastructure::card_client::HttpCardClient;
use ghostpay::infrastructure::in_memory::{InMemoryCardStore, InMemoryChargeStore};
use ghostpay::interfaces::http;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;

/// Serves `router` on an ephemeral port and returns its base URL.
async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn spawn_card_service(service: Arc<CardService>) -> String {
    spawn(http::card_service(service)).await
}

/// A misbehaving card service: the first `healthy_gets` reads return `card`,
/// later reads answer 500, and every status update answers `put_status`.
#[derive(Clone)]
struct StubCardService {
    card: CardView,
    healthy_gets: Arc<AtomicUsize>,
    put_status: StatusCode,
    put_code: &'static str,
}

impl StubCardService {
    fn router(self) -> Router {
        Router::new()
            .route("/cards/{id}", get(stub_get_card))
            .route("/cards/{id}/status", put(stub_put_status))
            .with_state(self)
    }
}

async fn stub_get_card(State(stub): State<StubCardService>) -> Response {
    let healthy = stub
        .healthy_gets
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if healthy {
        Json(stub.card).into_response()
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody::new("INTERNAL_SERVER_ERROR", "database unavailable")),
        )
            .into_response()
    }
}

async fn stub_put_status(State(stub): State<StubCardService>) -> (StatusCode, Json<ErrorBody>) {
    (stub.put_status, Json(ErrorBody::new(stub.put_code, "rejected")))
}

async fn issue(service: &CardService) -> CardId {
    service
        .create_card(CreateCardRequest {
            amount: Some(dec!(100.00)),
            currency: Some("USD".into()),
            metadata: None,
        })
        .await
        .unwrap()
        .card
        .id
}

fn client(base_url: &str) -> HttpCardClient {
    HttpCardClient::new(base_url, Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn test_charge_over_http() {
    let service = Arc::new(CardService::new(Box::new(InMemoryCardStore::new())));
    let card_id = issue(&service).await;
    let base_url = spawn_card_service(Arc::clone(&service)).await;

    let orchestrator =
        ChargeOrchestrator::new(Box::new(client(&base_url)), Box::new(InMemoryChargeStore::new()));

    let charge = orchestrator
        .create_charge(charge_request(card_id, dec!(60.00), "USD"))
        .await
        .unwrap();
    assert_eq!(charge.card_id, card_id);
    assert_eq!(
        service.get_card_by_id(card_id).await.unwrap().status,
        CardStatus::Used
    );

    let err = orchestrator
        .create_charge(charge_request(card_id, dec!(10.00), "USD"))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::CardNotChargeable(CardStatus::Used)));

    let err = orchestrator
        .create_charge(charge_request(CardId::new(), dec!(10.00), "USD"))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::CardNotFound(_)));
}

#[tokio::test]
async fn test_http_client_reports_conflicts() {
    let service = Arc::new(CardService::new(Box::new(InMemoryCardStore::new())));
    let card_id = issue(&service).await;
    let client = client(&spawn_card_service(Arc::clone(&service)).await);

    let view = client.fetch_card(card_id).await.unwrap().unwrap();
    assert_eq!(view.status, CardStatus::Active);
    assert!(view.card_number.starts_with("************"));
    assert!(client.fetch_card(CardId::new()).await.unwrap().is_none());

    let guarded = StatusChange::guarded(CardStatus::Active, CardStatus::Used);
    let used = client.set_card_status(card_id, guarded).await.unwrap();
    assert_eq!(used.status, CardStatus::Used);

    let err = client.set_card_status(card_id, guarded).await.unwrap_err();
    assert!(matches!(
        err,
        PaymentError::StatusConflict {
            expected: CardStatus::Active,
            actual: CardStatus::Used,
            ..
        }
    ));

    let err = client
        .set_card_status(card_id, StatusChange::to(CardStatus::Cancelled))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PaymentError::InvalidTransition {
            from: CardStatus::Used,
            to: CardStatus::Cancelled
        }
    ));

    let err = client
        .set_card_status(CardId::new(), StatusChange::to(CardStatus::Used))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::CardNotFound(_)));
}

#[tokio::test]
async fn test_unreachable_card_service_fails_without_charge() {
    // Bind then drop to get a port nothing listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let charges = InMemoryChargeStore::new();
    let orchestrator = ChargeOrchestrator::new(
        Box::new(client(&format!("http://{addr}"))),
        Box::new(charges.clone()),
    );

    let card_id = CardId::new();
    let err = orchestrator
        .create_charge(charge_request(card_id, dec!(10.00), "USD"))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::RemoteCall(_)));
    assert_eq!(err.code(), "INTERNAL_SERVER_ERROR");
    assert!(orchestrator.charges_for_card(card_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_card_service_error_on_update_rolls_back() {
    let card = card_view(dec!(100.00), Currency::Usd, CardStatus::Active);
    let card_id = card.id;
    let base_url = spawn(
        StubCardService {
            card,
            healthy_gets: Arc::new(AtomicUsize::new(usize::MAX)),
            put_status: StatusCode::INTERNAL_SERVER_ERROR,
            put_code: "INTERNAL_SERVER_ERROR",
        }
        .router(),
    )
    .await;

    let orchestrator =
        ChargeOrchestrator::new(Box::new(client(&base_url)), Box::new(InMemoryChargeStore::new()));
    let err = orchestrator
        .create_charge(charge_request(card_id, dec!(60.00), "USD"))
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::CardUpdateFailed(_)));
    assert_eq!(err.code(), "CARD_UPDATE_FAILED");
    assert!(orchestrator.charges_for_card(card_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_lost_race_stays_not_chargeable_when_card_reread_fails() {
    let card = card_view(dec!(100.00), Currency::Usd, CardStatus::Active);
    let card_id = card.id;
    // One healthy read for the charge's own check; the read after the 409 fails
    let base_url = spawn(
        StubCardService {
            card,
            healthy_gets: Arc::new(AtomicUsize::new(1)),
            put_status: StatusCode::CONFLICT,
            put_code: "STATUS_CONFLICT",
        }
        .router(),
    )
    .await;

    let orchestrator =
        ChargeOrchestrator::new(Box::new(client(&base_url)), Box::new(InMemoryChargeStore::new()));
    let err = orchestrator
        .create_charge(charge_request(card_id, dec!(60.00), "USD"))
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::CardNotChargeable(CardStatus::Used)));
    assert_eq!(err.code(), "CARD_NOT_CHARGEABLE");
    assert!(orchestrator.charges_for_card(card_id).await.unwrap().is_empty());

    let err = client(&base_url)
        .set_card_status(card_id, StatusChange::guarded(CardStatus::Active, CardStatus::Used))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PaymentError::StatusConflict {
            expected: CardStatus::Active,
            actual: CardStatus::Used,
            ..
        }
    ));
}
