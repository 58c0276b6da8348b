//! fleetd - Warehouse Robot Fleet Simulation Daemon
//!
//! Library components for the daemon process: the shared coordination
//! kernel (queue, inventory arbiter, charging pool, workers) and its
//! collaborators (ingester, log sink, HTTP control API).

pub mod charging;
pub mod context;
pub mod ingest;
pub mod ledger;
pub mod logging;
pub mod queue;
pub mod server;
pub mod worker;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fleet_core::report::ReportError;
use fleet_core::{FleetConfig, Inventory, Part, PartRequest, ValidationError};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use charging::{ChargingPool, Station, StationSnapshot};
use context::FleetContext;
use ingest::Ingester;
use ledger::RequestLedger;
use logging::FileLogger;
use queue::RequestQueue;
use worker::{RobotSnapshot, Worker};

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("fleet already started")]
    AlreadyStarted,
    #[error("fleet has been stopped; create a new fleet to restart")]
    Stopped,
    #[error("unknown part id: {0}")]
    UnknownPart(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to open simulation log: {0}")]
    Logging(#[from] std::io::Error),
}

const LIFECYCLE_NEW: u8 = 0;
const LIFECYCLE_STARTED: u8 = 1;
const LIFECYCLE_STOPPED: u8 = 2;

/// The orchestrator: wires the shared resources, owns the spawned tasks,
/// and exposes the dashboard surface.
///
/// A fleet starts at most once; after `stop` a fresh orchestrator is
/// needed to run again.
pub struct Fleet {
    ctx: Arc<FleetContext>,
    workers: Vec<Arc<Worker>>,
    stations: Vec<Arc<Station>>,
    shutdown: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    lifecycle: AtomicU8,
    log: FileLogger,
}

impl Fleet {
    /// Build a fleet over `inventory` according to `config`. Nothing runs
    /// until [`start`](Self::start).
    pub fn new(config: FleetConfig, inventory: Inventory) -> Result<Self, FleetError> {
        let log = FileLogger::new(&config.log_dir, "Fleet")?;

        let (shutdown, shutdown_rx) = watch::channel(true);
        let ctx = Arc::new(FleetContext::new(
            config.clone(),
            Arc::new(RequestQueue::new()),
            Arc::new(inventory),
            Arc::new(ChargingPool::new()),
            Arc::new(RequestLedger::new()),
            shutdown_rx,
        ));

        let workers: Vec<Arc<Worker>> = (0..config.robot_count)
            .map(|i| {
                Arc::new(Worker::new(
                    format!("R-{:03}", i + 1),
                    config.max_battery,
                ))
            })
            .collect();

        let stations: Vec<Arc<Station>> = (0..config.station_count)
            .map(|i| {
                let letter = (b'A' + (i % 26) as u8) as char;
                Arc::new(Station::new(format!("CS-{letter}")))
            })
            .collect();

        log.log(&format!(
            "Fleet initialized with {} robots and {} stations",
            workers.len(),
            stations.len()
        ));

        Ok(Self {
            ctx,
            workers,
            stations,
            shutdown,
            handles: Mutex::new(Vec::new()),
            lifecycle: AtomicU8::new(LIFECYCLE_NEW),
            log,
        })
    }

    pub fn config(&self) -> &FleetConfig {
        &self.ctx.config
    }

    pub fn context(&self) -> &Arc<FleetContext> {
        &self.ctx
    }

    pub fn workers(&self) -> &[Arc<Worker>] {
        &self.workers
    }

    /// Spawn one task per station and per worker, plus the file ingester
    /// when one is configured.
    pub fn start(&self) -> Result<(), FleetError> {
        match self.lifecycle.compare_exchange(
            LIFECYCLE_NEW,
            LIFECYCLE_STARTED,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => {}
            Err(LIFECYCLE_STOPPED) => return Err(FleetError::Stopped),
            Err(_) => return Err(FleetError::AlreadyStarted),
        }

        info!("=== starting fleet simulation ===");
        self.log.log("=== STARTING FLEET SIMULATION ===");

        let mut handles = self.handles.lock().expect("handles lock poisoned");

        // Stations first so they are waiting when the robots come up.
        for station in &self.stations {
            let pool = Arc::clone(&self.ctx.charging);
            handles.push(tokio::spawn(
                Arc::clone(station).run(pool, Arc::clone(&self.ctx)),
            ));
        }
        for worker in &self.workers {
            handles.push(tokio::spawn(
                Arc::clone(worker).run(Arc::clone(&self.ctx)),
            ));
        }

        if let Some(path) = &self.ctx.config.request_file {
            let ingester = Ingester::new(
                path.clone(),
                Duration::from_millis(self.ctx.config.ingest_interval_ms),
            );
            handles.push(tokio::spawn(ingester.run(Arc::clone(&self.ctx))));
        }

        Ok(())
    }

    /// Signal shutdown without waiting. `stop` still has to run to join
    /// the tasks.
    pub fn signal_stop(&self) {
        let _ = self.shutdown.send(false);
    }

    /// Resolves when shutdown has been signalled from anywhere.
    pub async fn cancelled(&self) {
        self.ctx.cancelled().await;
    }

    /// Stop the simulation: cancel every task and wait for all of them.
    pub async fn stop(&self) {
        self.lifecycle.store(LIFECYCLE_STOPPED, Ordering::SeqCst);
        info!("=== stopping fleet simulation ===");
        self.log.log("=== STOPPING FLEET SIMULATION ===");
        let _ = self.shutdown.send(false);

        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.handles.lock().expect("handles lock poisoned");
            guard.drain(..).collect()
        };
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "fleet task ended abnormally");
            }
        }
        self.log.log("Fleet simulation stopped");
    }

    /// Dashboard ingestion: mint a request for `qty` of the given part and
    /// enqueue it.
    pub fn submit(&self, part_id: &str, qty: i32) -> Result<PartRequest, FleetError> {
        if self.lifecycle.load(Ordering::SeqCst) == LIFECYCLE_STOPPED {
            return Err(FleetError::Stopped);
        }

        let part = self
            .ctx
            .inventory
            .find_by_id(part_id)
            .cloned()
            .ok_or_else(|| FleetError::UnknownPart(part_id.to_string()))?;
        let request = PartRequest::create(Some(part), qty)?;

        self.log.log(&format!(
            "Accepted request {} ({part_id} x{qty})",
            request.id
        ));
        self.ctx.queue.offer(request.clone());
        Ok(request)
    }

    // --- Non-blocking snapshot accessors for the dashboard. ---

    pub fn robots(&self) -> Vec<RobotSnapshot> {
        self.workers.iter().map(|w| w.snapshot()).collect()
    }

    pub fn station_snapshots(&self) -> Vec<StationSnapshot> {
        self.stations.iter().map(|s| s.snapshot()).collect()
    }

    pub fn inventory_snapshot(&self) -> Vec<(Part, i32)> {
        self.ctx.inventory.snapshot()
    }

    pub fn queued(&self) -> Vec<PartRequest> {
        self.ctx.queue.snapshot()
    }

    pub fn ledger_snapshot(&self) -> Vec<PartRequest> {
        self.ctx.ledger.snapshot()
    }

    /// Dump the terminal record set as a binary report.
    pub fn write_report(&self, path: &std::path::Path) -> Result<usize, ReportError> {
        let records = self.ctx.ledger.snapshot();
        let count = fleet_core::report::write_report(path, &records)?;
        self.log.log(&format!(
            "Final report written to {} ({count} requests)",
            path.display()
        ));
        Ok(count)
    }
}
