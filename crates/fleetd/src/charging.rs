//! Charging pool and stations.
//!
//! Low-battery workers enqueue themselves with a bounded wait; each
//! station loops taking the oldest waiter, docks it, and tops the battery
//! up in ticks. The dock is a scoped guard so the worker is released and
//! the station freed on every exit path, including shutdown mid-charge.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{oneshot, Notify};
use tracing::{debug, info};

use crate::context::FleetContext;
use crate::worker::Worker;

/// A queued charging request: the worker plus the channel a station uses
/// to commit to serving it.
struct Waiter {
    worker: Arc<Worker>,
    commit: oneshot::Sender<()>,
}

/// FIFO of workers waiting for a station.
pub struct ChargingPool {
    waiting: Mutex<VecDeque<Waiter>>,
    stations: Notify,
}

impl Default for ChargingPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ChargingPool {
    pub fn new() -> Self {
        Self {
            waiting: Mutex::new(VecDeque::new()),
            stations: Notify::new(),
        }
    }

    /// Offer `worker` for charging and wait until a station commits to
    /// serving it.
    ///
    /// Returns `false` on timeout or shutdown; a `false` return guarantees
    /// the worker is no longer queued. If a station dequeues the waiter
    /// concurrently with either, its commitment wins and `enqueue` returns
    /// `true` — the station already owns the worker at that point.
    pub async fn enqueue(
        &self,
        worker: Arc<Worker>,
        timeout: Duration,
        ctx: &FleetContext,
    ) -> bool {
        let worker_id = worker.id().to_string();
        let (tx, mut rx) = oneshot::channel();
        {
            let mut waiting = self.waiting.lock().expect("charging queue lock poisoned");
            waiting.push_back(Waiter { worker, commit: tx });
        }
        self.stations.notify_one();

        let awaited = tokio::time::timeout(timeout, async {
            tokio::select! {
                committed = &mut rx => Some(committed.is_ok()),
                _ = ctx.cancelled() => None,
            }
        })
        .await;

        match awaited {
            Ok(Some(committed)) => committed,
            // Shutdown and timeout share the same race: a station may
            // have dequeued the waiter before we could leave the queue.
            Ok(None) => self.leave_queue(&worker_id, "shutdown", rx).await,
            Err(_elapsed) => self.leave_queue(&worker_id, "timeout", rx).await,
        }
    }

    /// Give up waiting and leave the queue. If a station dequeued the
    /// waiter first, the withdraw fails and the station's commitment
    /// decides the result instead.
    async fn leave_queue(&self, worker_id: &str, reason: &str, rx: oneshot::Receiver<()>) -> bool {
        if self.withdraw(worker_id) {
            debug!(robot = worker_id, reason, "left charging queue");
            return false;
        }
        rx.await.is_ok()
    }

    fn withdraw(&self, worker_id: &str) -> bool {
        let mut waiting = self.waiting.lock().expect("charging queue lock poisoned");
        if let Some(pos) = waiting.iter().position(|w| w.worker.id() == worker_id) {
            waiting.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting.lock().expect("charging queue lock poisoned").len()
    }

    /// Oldest waiter, blocking until one arrives. Cancellation-safe: the
    /// pop and the return happen in the same poll.
    async fn next_waiter(&self) -> Waiter {
        loop {
            let notified = self.stations.notified();
            {
                let mut waiting = self.waiting.lock().expect("charging queue lock poisoned");
                if let Some(waiter) = waiting.pop_front() {
                    return waiter;
                }
            }
            notified.await;
        }
    }
}

/// Dashboard view of a station.
#[derive(Debug, Clone, Serialize)]
pub struct StationSnapshot {
    pub id: String,
    pub occupant: Option<String>,
}

/// One charging bay. Serves a single worker at a time to full charge.
pub struct Station {
    id: String,
    occupant: Mutex<Option<Arc<Worker>>>,
}

impl Station {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            occupant: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn occupant_id(&self) -> Option<String> {
        self.occupant
            .lock()
            .expect("occupant lock poisoned")
            .as_ref()
            .map(|w| w.id().to_string())
    }

    pub fn snapshot(&self) -> StationSnapshot {
        StationSnapshot {
            id: self.id.clone(),
            occupant: self.occupant_id(),
        }
    }

    /// Station service loop: wait for a waiter, charge it to full, repeat
    /// until shutdown.
    pub async fn run(self: Arc<Self>, pool: Arc<ChargingPool>, ctx: Arc<FleetContext>) {
        info!(station = %self.id, "station online, waiting for robots");
        loop {
            tokio::select! {
                _ = ctx.cancelled() => break,
                waiter = pool.next_waiter() => {
                    self.serve(waiter, &ctx).await;
                }
            }
        }
        info!(station = %self.id, "station offline");
    }

    async fn serve(&self, waiter: Waiter, ctx: &FleetContext) {
        let worker = waiter.worker;
        info!(station = %self.id, robot = worker.id(), "robot docked, charging");

        // The dock guarantees release (worker idle, bay free) on every
        // exit path, including this future being dropped mid-charge.
        let dock = Dock::new(self, Arc::clone(&worker));
        worker.start_charging();
        if waiter.commit.send(()).is_err() {
            // The worker gave up between dequeue and commit.
            drop(dock);
            return;
        }

        let tick = Duration::from_millis(ctx.config.charge_tick_ms);
        while !worker.is_fully_charged() {
            tokio::select! {
                _ = tokio::time::sleep(tick) => {
                    let level = worker.charge(ctx.config.charge_per_tick);
                    debug!(station = %self.id, robot = worker.id(), battery = level, "charging");
                }
                _ = ctx.cancelled() => break,
            }
        }

        info!(
            station = %self.id,
            robot = worker.id(),
            battery = worker.battery(),
            "charge cycle finished, releasing robot"
        );
        drop(dock);
    }
}

/// Scoped occupancy of a station by a worker.
struct Dock<'a> {
    station: &'a Station,
    worker: Arc<Worker>,
}

impl<'a> Dock<'a> {
    fn new(station: &'a Station, worker: Arc<Worker>) -> Self {
        *station.occupant.lock().expect("occupant lock poisoned") = Some(Arc::clone(&worker));
        Self { station, worker }
    }
}

impl Drop for Dock<'_> {
    fn drop(&mut self) {
        // Free the bay before releasing the worker so a reader that sees
        // the worker idle never still sees it docked.
        *self
            .station
            .occupant
            .lock()
            .expect("occupant lock poisoned") = None;
        self.worker.finish_charging();
    }
}
