use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::lifecycle::{NewOrder, TransitionOutcome};
use crate::error::AppError;
use crate::models::actor::Actor;
use crate::models::assignment::DriverAssignment;
use crate::models::coordinate::Address;
use crate::models::order::{Order, OrderStatus, PaymentStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/transitions", post(transition_order))
        .route("/orders/:id/assignments", get(list_assignments))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: Uuid,
    pub vendor_id: Uuid,
    pub pickup: Address,
    pub delivery: Address,
    pub subtotal_cents: i64,
    pub radius_km: Option<f64>,
    #[serde(default)]
    pub payment_status: PaymentStatus,
}

#[derive(Deserialize)]
pub struct TransitionRequest {
    pub status: OrderStatus,
    pub actor: Actor,
    pub reason: Option<String>,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    let quote = state
        .fees
        .quote(
            payload.pickup.location,
            payload.delivery.location,
            payload.radius_km,
        )
        .await?;

    if !quote.within_service_radius {
        return Err(AppError::OutOfServiceArea(format!(
            "delivery is {:.1} km from the vendor, beyond the service radius",
            quote.distance_meters / 1_000.0
        )));
    }

    let (pricing, earnings) = state
        .fees
        .price_order(payload.subtotal_cents, quote.fee_cents)?;

    let draft = NewOrder {
        customer_id: payload.customer_id,
        vendor_id: payload.vendor_id,
        pickup: payload.pickup,
        delivery: payload.delivery,
        payment_status: payload.payment_status,
    };

    let order = state.lifecycle.create(draft, pricing, earnings)?;
    Ok(Json(order))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.store.load(id)?.order))
}

async fn transition_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TransitionRequest>,
) -> Result<Json<TransitionOutcome>, AppError> {
    let outcome = state.lifecycle.transition(
        id,
        payload.status,
        payload.actor,
        payload.reason.as_deref(),
    )?;
    Ok(Json(outcome))
}

async fn list_assignments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DriverAssignment>>, AppError> {
    Ok(Json(state.dispatch.history(id)?))
}
