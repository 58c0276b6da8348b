//! Domain core for the warehouse fleet simulator.
//!
//! Value types, the inventory arbiter, configuration, the sample catalog,
//! and the binary report codec. Everything here is runtime-agnostic; the
//! daemon crate supplies the concurrency.

pub mod catalog;
pub mod config;
pub mod inventory;
pub mod report;
pub mod types;

pub use config::FleetConfig;
pub use inventory::{Inventory, InventoryError};
pub use types::{Part, PartRequest, RequestStatus, RobotStatus, ValidationError};
