//! HTTP interface: the card service endpoint and the client-facing charge endpoint.
//!
//! Each service gets its own router so they can run as separate processes;
//! [`standalone`] mounts both in one.

pub mod cards;
pub mod charges;
pub mod dto;
pub mod error;

use crate::application::cards::CardService;
use crate::application::orchestrator::ChargeOrchestrator;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use dto::{HealthBody, Liveness};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Stores whose reachability the health endpoint reports.
#[derive(Clone, Default)]
struct Probes {
    cards: Option<Arc<CardService>>,
    charges: Option<Arc<ChargeOrchestrator>>,
}

impl Probes {
    async fn check(&self) -> crate::error::Result<()> {
        if let Some(cards) = &self.cards {
            cards.ping().await?;
        }
        if let Some(charges) = &self.charges {
            charges.ping().await?;
        }
        Ok(())
    }
}

/// Router of the card service endpoint.
pub fn card_service(service: Arc<CardService>) -> Router {
    let probes = Probes {
        cards: Some(Arc::clone(&service)),
        ..Default::default()
    };
    cards::routes(service)
        .merge(health_routes(probes))
        .layer(TraceLayer::new_for_http())
}

/// Router of the charge service.
pub fn charge_service(orchestrator: Arc<ChargeOrchestrator>) -> Router {
    let probes = Probes {
        charges: Some(Arc::clone(&orchestrator)),
        ..Default::default()
    };
    charges::routes(orchestrator)
        .merge(health_routes(probes))
        .layer(TraceLayer::new_for_http())
}

/// Both services behind one router.
pub fn standalone(service: Arc<CardService>, orchestrator: Arc<ChargeOrchestrator>) -> Router {
    let probes = Probes {
        cards: Some(Arc::clone(&service)),
        charges: Some(Arc::clone(&orchestrator)),
    };
    cards::routes(service)
        .merge(charges::routes(orchestrator))
        .merge(health_routes(probes))
        .layer(TraceLayer::new_for_http())
}

fn health_routes(probes: Probes) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(probes)
}

/// GET /health
async fn health(State(probes): State<Probes>) -> (StatusCode, Json<HealthBody>) {
    match probes.check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthBody {
                status: Liveness::Up,
                database: Liveness::Up,
                error: None,
                timestamp: Utc::now(),
            }),
        ),
        Err(e) => {
            error!(error = %e, "health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HealthBody {
                    status: Liveness::Down,
                    database: Liveness::Down,
                    error: Some(e.to_string()),
                    timestamp: Utc::now(),
                }),
            )
        }
    }
}
