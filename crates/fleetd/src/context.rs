//! Capability record handed to every worker, station, and ingester.
//!
//! Components reach the shared resources through this context instead of
//! holding the orchestrator, which keeps the ownership graph acyclic.

use std::sync::Arc;

use fleet_core::{FleetConfig, Inventory};
use tokio::sync::watch;

use crate::charging::ChargingPool;
use crate::ledger::RequestLedger;
use crate::queue::RequestQueue;

pub struct FleetContext {
    pub config: FleetConfig,
    pub queue: Arc<RequestQueue>,
    pub inventory: Arc<Inventory>,
    pub charging: Arc<ChargingPool>,
    pub ledger: Arc<RequestLedger>,
    shutdown: watch::Receiver<bool>,
}

impl FleetContext {
    pub fn new(
        config: FleetConfig,
        queue: Arc<RequestQueue>,
        inventory: Arc<Inventory>,
        charging: Arc<ChargingPool>,
        ledger: Arc<RequestLedger>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            queue,
            inventory,
            charging,
            ledger,
            shutdown,
        }
    }

    /// Whether the fleet is still running. Flips exactly once, at stop.
    pub fn is_running(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Resolves when the fleet shuts down. Never resolves while running.
    pub async fn cancelled(&self) {
        let mut shutdown = self.shutdown.clone();
        // A dropped sender also means the fleet is gone.
        let _ = shutdown.wait_for(|running| !running).await;
    }
}
