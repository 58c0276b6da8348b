//! Worker robots: the per-robot state machine.
//!
//! Each worker cycles IDLE -> WORKING -> {IDLE | LOW_BATTERY} ->
//! WAITING_FOR_CHARGE -> CHARGING -> IDLE, acquiring tasks from the
//! request queue and stock from the inventory. Status and battery are
//! atomics so dashboard readers never tear; while a worker is CHARGING
//! its station owns both fields.

use std::sync::atomic::{AtomicI32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fleet_core::inventory::InventoryError;
use fleet_core::{PartRequest, RequestStatus, RobotStatus};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::context::FleetContext;

/// Dashboard view of a worker.
#[derive(Debug, Clone, Serialize)]
pub struct RobotSnapshot {
    pub id: String,
    pub status: RobotStatus,
    pub battery: i32,
    pub task_id: Option<String>,
}

pub struct Worker {
    id: String,
    max_battery: i32,
    status: AtomicU8,
    battery: AtomicI32,
    task: Mutex<Option<PartRequest>>,
}

impl Worker {
    /// A fresh worker: idle, fully charged, no task.
    pub fn new(id: impl Into<String>, max_battery: i32) -> Self {
        Self {
            id: id.into(),
            max_battery,
            status: AtomicU8::new(RobotStatus::Idle as u8),
            battery: AtomicI32::new(max_battery),
            task: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> RobotStatus {
        RobotStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    pub(crate) fn set_status(&self, status: RobotStatus) {
        self.status.store(status as u8, Ordering::SeqCst);
    }

    pub fn battery(&self) -> i32 {
        self.battery.load(Ordering::SeqCst)
    }

    /// Force the battery level. Fault-injection hook for drills and tests;
    /// the simulation itself only moves the level through task drain and
    /// charging.
    pub fn set_battery(&self, level: i32) {
        self.battery.store(level.clamp(0, self.max_battery), Ordering::SeqCst);
    }

    pub fn current_task_id(&self) -> Option<String> {
        self.task
            .lock()
            .expect("task lock poisoned")
            .as_ref()
            .map(|t| t.id.clone())
    }

    pub fn snapshot(&self) -> RobotSnapshot {
        RobotSnapshot {
            id: self.id.clone(),
            status: self.status(),
            battery: self.battery(),
            task_id: self.current_task_id(),
        }
    }

    // --- Station-facing controls. The station owns status and battery
    // --- from `start_charging` until `finish_charging`.

    pub(crate) fn start_charging(&self) {
        self.set_status(RobotStatus::Charging);
    }

    pub(crate) fn is_fully_charged(&self) -> bool {
        self.battery() >= self.max_battery
    }

    /// Add one tick of charge, clamped at the maximum. Returns the new level.
    pub(crate) fn charge(&self, per_tick: i32) -> i32 {
        self.battery
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |level| {
                Some((level + per_tick).min(self.max_battery))
            })
            .map(|prev| (prev + per_tick).min(self.max_battery))
            .unwrap_or_else(|prev| prev)
    }

    /// Release from the charging bay: idle, no task.
    pub(crate) fn finish_charging(&self) {
        *self.task.lock().expect("task lock poisoned") = None;
        self.set_status(RobotStatus::Idle);
    }

    /// Drain the battery after a task, clamped at zero. Returns the new level.
    fn drain_battery(&self, drain: i32) -> i32 {
        self.battery
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |level| {
                Some((level - drain).max(0))
            })
            .map(|prev| (prev - drain).max(0))
            .unwrap_or_else(|prev| prev)
    }

    /// The worker's main loop. Runs until the fleet stops.
    pub async fn run(self: Arc<Self>, ctx: Arc<FleetContext>) {
        info!(robot = %self.id, battery = self.battery(), "robot online");

        while ctx.is_running() {
            match self.status() {
                RobotStatus::Idle => self.handle_idle(&ctx).await,
                RobotStatus::Working => self.handle_working(&ctx).await,
                RobotStatus::LowBattery => {
                    Arc::clone(&self).handle_charging_request(&ctx).await;
                }
                RobotStatus::WaitingForCharge | RobotStatus::Charging => {
                    // The pool and station drive these states.
                    self.idle_tick(&ctx).await;
                }
            }
        }

        // Shutdown accounting: an in-flight task is a failure.
        let in_flight = self.task.lock().expect("task lock poisoned").clone();
        if let Some(task) = in_flight {
            warn!(robot = %self.id, task = %task.id, "interrupted mid-task, recording failure");
            ctx.ledger.record(task.with_status(RequestStatus::Failed));
        }
        info!(robot = %self.id, status = self.status().as_str(), "robot offline");
    }

    async fn idle_tick(&self, ctx: &FleetContext) {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(ctx.config.idle_poll_ms)) => {}
            _ = ctx.cancelled() => {}
        }
    }

    async fn handle_idle(&self, ctx: &FleetContext) {
        // Charging takes priority over new work.
        if self.battery() <= ctx.config.low_battery_threshold {
            self.set_status(RobotStatus::LowBattery);
            return;
        }

        if let Some(task) = self.find_and_secure_task(ctx).await {
            info!(robot = %self.id, task = %task.id, "stock secured, starting work");
            ctx.ledger.record(task.clone());
            *self.task.lock().expect("task lock poisoned") = Some(task);
            self.set_status(RobotStatus::Working);
        }
    }

    /// Pop one request and reserve its stock.
    ///
    /// Polling before reserving means two workers never fight over one
    /// request; reserving after polling means scarce stock is granted to
    /// at most one of them. A request whose stock cannot be reserved is
    /// failed and consumed, never retried.
    async fn find_and_secure_task(&self, ctx: &FleetContext) -> Option<PartRequest> {
        let poll = Duration::from_millis(ctx.config.idle_poll_ms);
        let request = tokio::select! {
            request = ctx.queue.await_or_poll(poll) => request?,
            _ = ctx.cancelled() => return None,
        };

        match ctx.inventory.reserve(&request.part, request.qty) {
            Ok(true) => Some(request.with_status(RequestStatus::InProgress)),
            Ok(false) => None,
            Err(err @ InventoryError::InsufficientStock { .. }) => {
                warn!(robot = %self.id, task = %request.id, error = %err, "failing request");
                ctx.ledger.record(request.with_status(RequestStatus::Failed));
                None
            }
        }
    }

    async fn handle_working(&self, ctx: &FleetContext) {
        let Some(task) = self.task.lock().expect("task lock poisoned").clone() else {
            self.set_status(RobotStatus::Idle);
            return;
        };

        debug!(robot = %self.id, task = %task.id, "performing task");
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(ctx.config.task_duration_ms)) => {}
            // The run loop exits and records the in-flight task as failed.
            _ = ctx.cancelled() => return,
        }

        let avg = ctx.config.avg_battery_drain;
        let drain = rand::rng().random_range(avg - 5..avg + 5);
        let battery = self.drain_battery(drain);

        info!(robot = %self.id, task = %task.id, battery, "task complete");
        ctx.ledger.record(task.with_status(RequestStatus::Completed));
        *self.task.lock().expect("task lock poisoned") = None;

        self.set_status(if battery <= ctx.config.low_battery_threshold {
            RobotStatus::LowBattery
        } else {
            RobotStatus::Idle
        });
    }

    async fn handle_charging_request(self: Arc<Self>, ctx: &FleetContext) {
        self.set_status(RobotStatus::WaitingForCharge);
        info!(robot = %self.id, battery = self.battery(), "battery low, queuing for charge");

        let timeout = Duration::from_millis(ctx.config.charging_timeout_ms);
        let accepted = ctx
            .charging
            .enqueue(Arc::clone(&self), timeout, ctx)
            .await;

        if !accepted {
            // Timed out or shutting down; fall back and retry next cycle.
            debug!(robot = %self.id, "left charging queue, will retry");
            self.set_status(if self.battery() <= ctx.config.low_battery_threshold {
                RobotStatus::LowBattery
            } else {
                RobotStatus::Idle
            });
        }
        // On acceptance the station has already marked this worker CHARGING.
    }
}
