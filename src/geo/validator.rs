use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::coordinate::Coordinate;

/// Serviceable area: inside `polygon`, outside every exclusion zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRegion {
    pub polygon: Vec<Coordinate>,
    #[serde(default)]
    pub exclusions: Vec<Vec<Coordinate>>,
}

impl ServiceRegion {
    /// Rough bounding box around the Philippine archipelago.
    pub fn philippines() -> Self {
        Self::bounding_box(4.5, 116.0, 21.5, 127.0)
    }

    pub fn bounding_box(min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64) -> Self {
        Self {
            polygon: vec![
                Coordinate::new(min_lat, min_lng),
                Coordinate::new(min_lat, max_lng),
                Coordinate::new(max_lat, max_lng),
                Coordinate::new(max_lat, min_lng),
            ],
            exclusions: Vec::new(),
        }
    }

    pub fn with_exclusion(mut self, zone: Vec<Coordinate>) -> Self {
        self.exclusions.push(zone);
        self
    }

    fn check(&self) -> Result<(), AppError> {
        let rings = std::iter::once(&self.polygon).chain(self.exclusions.iter());
        for ring in rings {
            if ring.len() < 3 {
                return Err(AppError::BadRequest(
                    "service region polygons need at least 3 vertices".to_string(),
                ));
            }
            if let Some(bad) = ring.iter().find(|c| !c.is_well_formed()) {
                return Err(AppError::InvalidCoordinate(format!(
                    "service region vertex {bad} is malformed"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct GeoValidator {
    region: ServiceRegion,
}

impl GeoValidator {
    pub fn new(region: ServiceRegion) -> Result<Self, AppError> {
        region.check()?;
        Ok(Self { region })
    }

    pub fn region(&self) -> &ServiceRegion {
        &self.region
    }

    /// True iff `c` lies in the service polygon and in no exclusion zone.
    pub fn validate(&self, c: &Coordinate) -> Result<bool, AppError> {
        if !c.is_well_formed() {
            return Err(AppError::InvalidCoordinate(format!(
                "{c} is not a finite lat/lng pair within [-90,90]/[-180,180]"
            )));
        }

        let inside = contains(&self.region.polygon, c)
            && !self
                .region
                .exclusions
                .iter()
                .any(|zone| contains(zone, c) && !on_boundary(zone, c));

        Ok(inside)
    }

    pub fn ensure_serviceable(&self, c: &Coordinate) -> Result<(), AppError> {
        if self.validate(c)? {
            Ok(())
        } else {
            Err(AppError::OutOfServiceArea(format!(
                "{c} is outside the service region"
            )))
        }
    }
}

/// Even-odd ray cast; boundary points count as inside.
fn contains(ring: &[Coordinate], p: &Coordinate) -> bool {
    if on_boundary(ring, p) {
        return true;
    }

    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (a, b) = (&ring[i], &ring[j]);
        if (a.lat > p.lat) != (b.lat > p.lat) {
            let cross_lng = a.lng + (p.lat - a.lat) * (b.lng - a.lng) / (b.lat - a.lat);
            if p.lng < cross_lng {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn on_boundary(ring: &[Coordinate], p: &Coordinate) -> bool {
    const EPSILON: f64 = 1e-12;

    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (a, b) = (&ring[i], &ring[j]);
        let cross = (b.lng - a.lng) * (p.lat - a.lat) - (b.lat - a.lat) * (p.lng - a.lng);
        let within_lat = p.lat >= a.lat.min(b.lat) - EPSILON && p.lat <= a.lat.max(b.lat) + EPSILON;
        let within_lng = p.lng >= a.lng.min(b.lng) - EPSILON && p.lng <= a.lng.max(b.lng) + EPSILON;
        if cross.abs() <= EPSILON && within_lat && within_lng {
            return true;
        }
        j = i;
    }
    false
}
