use super::error::ApiError;
use crate::application::cards::{CardService, CreateCardRequest};
use crate::domain::card::{CardId, CardView, IssuedCard, StatusChange};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use std::sync::Arc;

/// Card routes without the health endpoint.
pub fn routes(service: Arc<CardService>) -> Router {
    Router::new()
        .route("/cards", post(create_card))
        .route("/cards/{id}", get(get_card))
        .route("/cards/{id}/status", put(update_card_status))
        .with_state(service)
}

/// POST /cards
async fn create_card(
    State(service): State<Arc<CardService>>,
    body: Result<Json<CreateCardRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IssuedCard>), ApiError> {
    let Json(request) = body?;
    let card = service.create_card(request).await?;
    Ok((StatusCode::CREATED, Json(card)))
}

/// GET /cards/{id}
async fn get_card(
    State(service): State<Arc<CardService>>,
    Path(id): Path<String>,
) -> Result<Json<CardView>, ApiError> {
    let id: CardId = id.parse()?;
    Ok(Json(service.get_card_by_id(id).await?))
}

/// PUT /cards/{id}/status, called by the charge orchestrator.
async fn update_card_status(
    State(service): State<Arc<CardService>>,
    Path(id): Path<String>,
    body: Result<Json<StatusChange>, JsonRejection>,
) -> Result<Json<CardView>, ApiError> {
    let id: CardId = id.parse()?;
    let Json(change) = body?;
    Ok(Json(service.update_card_status(id, change).await?))
}
