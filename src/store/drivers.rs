use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::coordinate::Coordinate;
use crate::models::driver::{Driver, DriverStatus};

#[derive(Default)]
pub struct DriverRegistry {
    drivers: DashMap<Uuid, Driver>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: String, location: Coordinate) -> Driver {
        let driver = Driver {
            id: Uuid::new_v4(),
            name,
            location,
            status: DriverStatus::Available,
            updated_at: Utc::now(),
        };
        self.drivers.insert(driver.id, driver.clone());
        driver
    }

    pub fn get(&self, id: Uuid) -> Option<Driver> {
        self.drivers.get(&id).map(|entry| entry.value().clone())
    }

    pub fn require(&self, id: Uuid) -> Result<Driver, AppError> {
        self.get(id)
            .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))
    }

    pub fn list(&self) -> Vec<Driver> {
        self.drivers
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn set_status(&self, id: Uuid, status: DriverStatus) -> Result<Driver, AppError> {
        let mut driver = self
            .drivers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

        driver.status = status;
        driver.updated_at = Utc::now();
        Ok(driver.clone())
    }

    pub fn set_location(&self, id: Uuid, location: Coordinate) -> Result<Driver, AppError> {
        let mut driver = self
            .drivers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

        driver.location = location;
        driver.updated_at = Utc::now();
        Ok(driver.clone())
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}
