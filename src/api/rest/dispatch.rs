use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::dispatch::RespondOutcome;
use crate::error::AppError;
use crate::models::actor::Actor;
use crate::models::assignment::DriverAssignment;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders/:id/assign", post(assign_driver))
        .route("/orders/:id/reassign", post(reassign_driver))
        .route("/assignments/:id/respond", post(respond_to_offer))
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub candidate_driver_ids: Vec<Uuid>,
}

#[derive(Deserialize)]
pub struct ReassignRequest {
    pub driver_id: Uuid,
    pub actor: Actor,
}

#[derive(Deserialize)]
pub struct RespondRequest {
    pub accept: bool,
}

async fn assign_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<DriverAssignment>, AppError> {
    if payload.candidate_driver_ids.is_empty() {
        return Err(AppError::BadRequest(
            "candidate_driver_ids cannot be empty".to_string(),
        ));
    }

    let offer = state
        .dispatch
        .assign(id, &payload.candidate_driver_ids)
        .await?;
    Ok(Json(offer))
}

async fn reassign_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReassignRequest>,
) -> Result<Json<DriverAssignment>, AppError> {
    let assignment = state
        .dispatch
        .reassign(id, payload.driver_id, payload.actor)?;
    Ok(Json(assignment))
}

async fn respond_to_offer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RespondRequest>,
) -> Result<Json<RespondOutcome>, AppError> {
    let outcome = state.dispatch.respond(id, payload.accept).await?;
    Ok(Json(outcome))
}
