use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::coordinate::Coordinate;
use crate::models::distance::{DeliveryQuote, DistanceResult, OptimizedRoute, Route};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/geo/validate", get(validate))
        .route("/distance", post(point_to_point))
        .route("/distance/matrix", post(one_to_many))
        .route("/routes", post(route))
        .route("/routes/optimize", post(optimize))
        .route("/quotes", post(quote))
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub serviceable: bool,
}

#[derive(Deserialize)]
pub struct PairRequest {
    pub origin: Coordinate,
    pub destination: Coordinate,
}

#[derive(Deserialize)]
pub struct MatrixRequest {
    pub origin: Coordinate,
    pub destinations: Vec<Coordinate>,
}

#[derive(Serialize)]
pub struct MatrixResponse {
    pub results: Vec<DistanceResult>,
}

#[derive(Deserialize)]
pub struct RouteRequest {
    pub origin: Coordinate,
    pub destination: Coordinate,
    #[serde(default)]
    pub waypoints: Vec<Coordinate>,
}

#[derive(Deserialize)]
pub struct OptimizeRequest {
    pub origin: Coordinate,
    pub stops: Vec<Coordinate>,
    #[serde(default)]
    pub return_to_origin: bool,
}

#[derive(Deserialize)]
pub struct QuoteRequest {
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub radius_km: Option<f64>,
}

async fn validate(
    State(state): State<Arc<AppState>>,
    Query(coordinate): Query<Coordinate>,
) -> Result<Json<ValidateResponse>, AppError> {
    let serviceable = state.distance.validator().validate(&coordinate)?;
    Ok(Json(ValidateResponse { serviceable }))
}

async fn point_to_point(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PairRequest>,
) -> Result<Json<DistanceResult>, AppError> {
    let result = state
        .distance
        .point_to_point(payload.origin, payload.destination)
        .await?;
    Ok(Json(result))
}

async fn one_to_many(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<MatrixRequest>,
) -> Result<Json<MatrixResponse>, AppError> {
    let results = state
        .distance
        .one_to_many(payload.origin, &payload.destinations)
        .await?;
    Ok(Json(MatrixResponse { results }))
}

async fn route(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RouteRequest>,
) -> Result<Json<Route>, AppError> {
    let route = state
        .distance
        .route(payload.origin, payload.destination, &payload.waypoints)
        .await?;
    Ok(Json(route))
}

async fn optimize(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OptimizeRequest>,
) -> Result<Json<OptimizedRoute>, AppError> {
    let optimized = state
        .optimizer
        .optimize(payload.origin, &payload.stops, payload.return_to_origin)
        .await?;
    Ok(Json(optimized))
}

async fn quote(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QuoteRequest>,
) -> Result<Json<DeliveryQuote>, AppError> {
    let quote = state
        .fees
        .quote(payload.origin, payload.destination, payload.radius_km)
        .await?;
    Ok(Json(quote))
}
