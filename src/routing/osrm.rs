use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::models::coordinate::Coordinate;
use crate::models::distance::DistanceStatus;
use crate::routing::{ProviderError, ProviderLeg, ProviderRoute, RoutingProvider};

/// Client for an OSRM-compatible `/route/v1` HTTP API.
pub struct OsrmProvider {
    base_url: String,
    client: reqwest::Client,
}

impl OsrmProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ProviderError::Transport(err.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn fetch(&self, points: &[Coordinate], profile: &str) -> Result<OsrmResponse, ProviderError> {
        let coords = points
            .iter()
            .map(|p| format!("{},{}", p.lng, p.lat))
            .collect::<Vec<_>>()
            .join(";");
        let url = format!("{}/route/v1/{}/{}", self.base_url, profile, coords);

        debug!(url = %url, "requesting route from provider");

        let response = self
            .client
            .get(&url)
            .query(&[("overview", "full"), ("geometries", "polyline"), ("steps", "false")])
            .send()
            .await
            .map_err(|err| ProviderError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| ProviderError::Transport(err.to_string()))?;

        // OSRM reports NoRoute/NoSegment with a 4xx and a JSON body.
        match serde_json::from_slice::<OsrmResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(_) if !status.is_success() => Err(ProviderError::Status(status.as_u16())),
            Err(err) => Err(ProviderError::Decode(err.to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    #[serde(default)]
    geometry: String,
    #[serde(default)]
    legs: Vec<OsrmLeg>,
}

#[derive(Debug, Deserialize)]
struct OsrmLeg {
    distance: f64,
    duration: f64,
}

fn status_for(code: &str) -> Result<DistanceStatus, ProviderError> {
    match code {
        "Ok" => Ok(DistanceStatus::Ok),
        "NoRoute" => Ok(DistanceStatus::ZeroResults),
        "NoSegment" => Ok(DistanceStatus::NotFound),
        other => Err(ProviderError::Decode(format!("unexpected provider code {other}"))),
    }
}

fn checked(distance: f64, duration: f64) -> Result<ProviderLeg, ProviderError> {
    if !(distance.is_finite() && distance >= 0.0 && duration.is_finite() && duration >= 0.0) {
        return Err(ProviderError::Decode(format!(
            "nonsensical leg: distance={distance} duration={duration}"
        )));
    }
    Ok(ProviderLeg {
        distance_meters: distance,
        duration_seconds: duration,
        status: DistanceStatus::Ok,
    })
}

#[async_trait]
impl RoutingProvider for OsrmProvider {
    async fn leg(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        profile: &str,
    ) -> Result<ProviderLeg, ProviderError> {
        let response = self.fetch(&[origin, destination], profile).await?;
        let status = status_for(&response.code)?;
        if status != DistanceStatus::Ok {
            return Ok(ProviderLeg::unroutable(status));
        }

        let route = response
            .routes
            .first()
            .ok_or_else(|| ProviderError::Decode("no routes in OK response".to_string()))?;
        checked(route.distance, route.duration)
    }

    async fn route(
        &self,
        points: &[Coordinate],
        profile: &str,
    ) -> Result<ProviderRoute, ProviderError> {
        let response = self.fetch(points, profile).await?;
        let status = status_for(&response.code)?;
        if status != DistanceStatus::Ok {
            return Ok(ProviderRoute {
                status,
                legs: Vec::new(),
                polyline: String::new(),
            });
        }

        let route = response
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Decode("no routes in OK response".to_string()))?;

        let expected_legs = points.len().saturating_sub(1);
        if route.legs.len() != expected_legs {
            return Err(ProviderError::Decode(format!(
                "expected {expected_legs} legs, got {}",
                route.legs.len()
            )));
        }

        let legs = route
            .legs
            .iter()
            .map(|leg| checked(leg.distance, leg.duration))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ProviderRoute {
            status,
            legs,
            polyline: route.geometry,
        })
    }
}
