pub mod actor;
pub mod assignment;
pub mod coordinate;
pub mod distance;
pub mod driver;
pub mod events;
pub mod order;
