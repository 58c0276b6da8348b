//! End-to-end simulation tests: dispatch, stock contention, charging,
//! station contention, charging timeout, and graceful shutdown.

use std::sync::Arc;
use std::time::{Duration, Instant};

use fleet_core::types::Part;
use fleet_core::{FleetConfig, Inventory, RequestStatus, RobotStatus};
use fleetd::Fleet;
use tempfile::TempDir;

struct TestFleet {
    fleet: Arc<Fleet>,
    _dir: TempDir,
}

fn fast_config(dir: &TempDir) -> FleetConfig {
    FleetConfig {
        robot_count: 1,
        station_count: 1,
        capacity: 100,
        max_battery: 100,
        low_battery_threshold: 25,
        avg_battery_drain: 40,
        task_duration_ms: 50,
        idle_poll_ms: 20,
        charge_tick_ms: 10,
        charge_per_tick: 20,
        charging_timeout_ms: 200,
        log_dir: dir.path().join("logs"),
        report_path: dir.path().join("completed_report.dat"),
        ..FleetConfig::default()
    }
}

fn build_fleet(configure: impl FnOnce(&mut FleetConfig), stock: Vec<(Part, i32)>) -> TestFleet {
    let dir = TempDir::new().unwrap();
    let mut config = fast_config(&dir);
    configure(&mut config);
    let inventory = Inventory::new(config.capacity, stock);
    let fleet = Arc::new(Fleet::new(config, inventory).unwrap());
    TestFleet { fleet, _dir: dir }
}

fn oil_filter() -> Part {
    Part::new("P1001", "Oil Filter", "Standard oil filter")
}

async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn happy_path_dispatch_completes_request() {
    let tf = build_fleet(|_| {}, vec![(oil_filter(), 10)]);
    tf.fleet.start().unwrap();

    let request = tf.fleet.submit("P1001", 5).unwrap();
    let ledger = Arc::clone(&tf.fleet.context().ledger);
    let id = request.id.clone();

    wait_until("request to complete", || {
        ledger
            .get(&id)
            .is_some_and(|r| r.status == RequestStatus::Completed)
    })
    .await;

    assert_eq!(tf.fleet.context().inventory.level(&oil_filter()), 5);
    assert!(tf.fleet.queued().is_empty());

    // The worker returns to idle once the task is done.
    wait_until("worker to go idle", || {
        tf.fleet.robots()[0].status == RobotStatus::Idle
    })
    .await;

    // Binary report round-trip over the terminal set.
    let report_path = tf.fleet.config().report_path.clone();
    let written = tf.fleet.write_report(&report_path).unwrap();
    assert_eq!(written, 1);
    let entries = fleet_core::report::read_report(&report_path).unwrap();
    assert_eq!(entries[0].request_id, id);
    assert_eq!(entries[0].part_id, "P1001");
    assert_eq!(entries[0].qty, 5);
    assert_eq!(entries[0].status, RequestStatus::Completed);

    tf.fleet.stop().await;
}

#[tokio::test]
async fn insufficient_stock_fails_request_without_consuming_it() {
    let tf = build_fleet(|_| {}, vec![(oil_filter(), 10)]);
    tf.fleet.start().unwrap();

    let request = tf.fleet.submit("P1001", 20).unwrap();
    let ledger = Arc::clone(&tf.fleet.context().ledger);
    let id = request.id.clone();

    wait_until("request to fail", || {
        ledger
            .get(&id)
            .is_some_and(|r| r.status == RequestStatus::Failed)
    })
    .await;

    // Stock untouched, request consumed (one-shot, no retry), worker idle.
    assert_eq!(tf.fleet.context().inventory.level(&oil_filter()), 10);
    assert!(tf.fleet.queued().is_empty());
    assert_eq!(tf.fleet.robots()[0].status, RobotStatus::Idle);

    tf.fleet.stop().await;
}

#[tokio::test]
async fn low_battery_worker_charges_to_full_and_returns_idle() {
    let tf = build_fleet(|_| {}, Vec::new());
    tf.fleet.start().unwrap();

    tf.fleet.workers()[0].set_battery(20);

    wait_until("worker to recharge fully", || {
        let snap = &tf.fleet.robots()[0];
        snap.battery == 100 && snap.status == RobotStatus::Idle
    })
    .await;

    assert!(tf.fleet.station_snapshots()[0].occupant.is_none());
    tf.fleet.stop().await;
}

#[tokio::test]
async fn two_workers_share_one_station_without_deadlock() {
    let tf = build_fleet(
        |config| {
            config.robot_count = 2;
            config.charging_timeout_ms = 500;
        },
        Vec::new(),
    );
    tf.fleet.start().unwrap();

    for worker in tf.fleet.workers() {
        worker.set_battery(20);
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let robots = tf.fleet.robots();
        // A single station never charges two robots at once, and no
        // battery ever exceeds the maximum.
        let charging = robots
            .iter()
            .filter(|r| r.status == RobotStatus::Charging)
            .count();
        assert!(charging <= 1, "one station cannot charge two robots");
        for robot in &robots {
            assert!(robot.battery <= 100, "battery above maximum");
        }

        if robots
            .iter()
            .all(|r| r.battery == 100 && r.status == RobotStatus::Idle)
        {
            break;
        }
        assert!(Instant::now() < deadline, "charging never finished");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(tf.fleet.station_snapshots()[0].occupant.is_none());
    tf.fleet.stop().await;
}

#[tokio::test]
async fn charging_timeout_falls_back_without_getting_stuck() {
    let tf = build_fleet(
        |config| {
            // No stations: every enqueue times out.
            config.station_count = 0;
            config.charging_timeout_ms = 100;
        },
        Vec::new(),
    );
    tf.fleet.start().unwrap();

    tf.fleet.workers()[0].set_battery(20);

    wait_until("worker to seek charging", || {
        matches!(
            tf.fleet.robots()[0].status,
            RobotStatus::LowBattery | RobotStatus::WaitingForCharge
        )
    })
    .await;

    // Over several timeout windows the worker keeps cycling between the
    // two low-battery states and never charges or wedges.
    for _ in 0..30 {
        let status = tf.fleet.robots()[0].status;
        assert!(
            matches!(
                status,
                RobotStatus::LowBattery | RobotStatus::WaitingForCharge
            ),
            "unexpected status {status:?} with no stations"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // Shutdown is still prompt while the worker waits on the pool.
    tokio::time::timeout(Duration::from_secs(5), tf.fleet.stop())
        .await
        .expect("stop() wedged on a waiting worker");
}

#[tokio::test]
async fn shutdown_mid_task_records_failure_and_frees_stations() {
    let tf = build_fleet(
        |config| {
            // A task long enough that stop() always lands mid-work.
            config.task_duration_ms = 60_000;
        },
        vec![(oil_filter(), 10)],
    );
    tf.fleet.start().unwrap();

    let request = tf.fleet.submit("P1001", 5).unwrap();
    let id = request.id.clone();

    wait_until("worker to start the task", || {
        tf.fleet.robots()[0].status == RobotStatus::Working
    })
    .await;
    assert_eq!(
        tf.fleet.context().ledger.get(&id).unwrap().status,
        RequestStatus::InProgress
    );

    tokio::time::timeout(Duration::from_secs(5), tf.fleet.stop())
        .await
        .expect("stop() wedged on a working robot");

    // The interrupted task ends FAILED; nothing is left IN_PROGRESS.
    let record = tf.fleet.context().ledger.get(&id).unwrap();
    assert_eq!(record.status, RequestStatus::Failed);
    for record in tf.fleet.ledger_snapshot() {
        assert!(
            record.status.is_terminal(),
            "{} left non-terminal after stop",
            record.id
        );
    }
    assert!(tf.fleet.station_snapshots()[0].occupant.is_none());
}

#[tokio::test]
async fn file_ingester_feeds_the_fleet_end_to_end() {
    let dir = TempDir::new().unwrap();
    let request_file = dir.path().join("pending_requests.txt");
    std::fs::write(&request_file, "P1001,2\nP1001,3\n").unwrap();

    let mut config = fast_config(&dir);
    config.request_file = Some(request_file.clone());
    config.ingest_interval_ms = 30;

    let inventory = Inventory::new(config.capacity, vec![(oil_filter(), 10)]);
    let fleet = Arc::new(Fleet::new(config, inventory).unwrap());
    fleet.start().unwrap();

    let ledger = Arc::clone(&fleet.context().ledger);
    wait_until("both file requests to complete", || {
        let records = ledger.snapshot();
        records.len() == 2
            && records
                .iter()
                .all(|r| r.status == RequestStatus::Completed)
    })
    .await;

    assert_eq!(fleet.context().inventory.level(&oil_filter()), 5);
    assert_eq!(std::fs::read_to_string(&request_file).unwrap(), "");

    fleet.stop().await;
}
