use super::dto::ListChargesQuery;
use super::error::ApiError;
use crate::application::orchestrator::ChargeOrchestrator;
use crate::domain::card::CardId;
use crate::domain::charge::{Charge, ChargeId, ChargeRequest};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;

/// Charge routes without the health endpoint.
pub fn routes(orchestrator: Arc<ChargeOrchestrator>) -> Router {
    Router::new()
        .route("/charges", get(list_charges).post(create_charge))
        .route("/charges/{id}", get(get_charge))
        .with_state(orchestrator)
}

/// POST /charges
async fn create_charge(
    State(orchestrator): State<Arc<ChargeOrchestrator>>,
    body: Result<Json<ChargeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Charge>), ApiError> {
    let Json(request) = body?;
    let charge = orchestrator.create_charge(request).await?;
    Ok((StatusCode::CREATED, Json(charge)))
}

/// GET /charges/{id}
async fn get_charge(
    State(orchestrator): State<Arc<ChargeOrchestrator>>,
    Path(id): Path<String>,
) -> Result<Json<Charge>, ApiError> {
    let id: ChargeId = id.parse()?;
    Ok(Json(orchestrator.get_charge(id).await?))
}

/// GET /charges?cardId=...
async fn list_charges(
    State(orchestrator): State<Arc<ChargeOrchestrator>>,
    query: Result<Query<ListChargesQuery>, QueryRejection>,
) -> Result<Json<Vec<Charge>>, ApiError> {
    let Query(query) = query?;
    let card_id: CardId = query.card_id.parse()?;
    Ok(Json(orchestrator.charges_for_card(card_id).await?))
}
