//! HTTP control plane for the fleet dashboard.
//!
//! Local-only REST surface: snapshot reads for robots, stations,
//! inventory, and the request queue, plus request ingestion, report
//! dumping, and shutdown. Every read is a non-blocking snapshot of the
//! concurrent structures.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{Fleet, FleetError};

/// Shared state for HTTP handlers.
pub struct AppState {
    pub fleet: Arc<Fleet>,
}

/// Create the HTTP router with all endpoints.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/robots", get(list_robots))
        .route("/stations", get(list_stations))
        .route("/inventory", get(get_inventory))
        .route("/requests", get(list_requests).post(submit_request))
        .route("/ledger", get(get_ledger))
        .route("/report", post(write_report))
        .route("/start", post(start_fleet))
        .route("/stop", post(stop_fleet))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Start the HTTP server, bound to localhost only.
pub async fn start_server(
    fleet: Arc<Fleet>,
    port: u16,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let state = Arc::new(AppState { fleet });
    let router = create_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("dashboard API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

// --- Request/Response types ---

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub part_id: String,
    pub qty: i32,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub request: fleet_core::PartRequest,
}

#[derive(Debug, Serialize)]
pub struct InventoryEntry {
    pub part: fleet_core::Part,
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub path: String,
    pub count: usize,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

// --- Handlers ---

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_robots(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({ "robots": state.fleet.robots() }))
}

async fn list_stations(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({ "stations": state.fleet.station_snapshots() }))
}

async fn get_inventory(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let entries: Vec<InventoryEntry> = state
        .fleet
        .inventory_snapshot()
        .into_iter()
        .map(|(part, quantity)| InventoryEntry { part, quantity })
        .collect();
    Json(serde_json::json!({ "inventory": entries }))
}

async fn list_requests(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({ "queued": state.fleet.queued() }))
}

async fn get_ledger(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({ "requests": state.fleet.ledger_snapshot() }))
}

/// POST /requests - mint and enqueue a new part request.
async fn submit_request(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    match state.fleet.submit(&req.part_id, req.qty) {
        Ok(request) => Ok((StatusCode::CREATED, Json(SubmitResponse { request }))),
        Err(err @ FleetError::UnknownPart(_)) => {
            Err(error_response(StatusCode::NOT_FOUND, err.to_string()))
        }
        Err(err @ FleetError::Validation(_)) => Err(error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            err.to_string(),
        )),
        Err(err) => Err(error_response(StatusCode::CONFLICT, err.to_string())),
    }
}

/// POST /report - dump the terminal record set to the configured path.
async fn write_report(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let path = state.fleet.config().report_path.clone();
    match state.fleet.write_report(&path) {
        Ok(count) => Ok(Json(ReportResponse {
            path: path.display().to_string(),
            count,
        })),
        Err(err) => {
            error!(error = %err, "report write failed");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                err.to_string(),
            ))
        }
    }
}

/// POST /start - spawn the fleet tasks. Conflicts once started or stopped.
async fn start_fleet(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    match state.fleet.start() {
        Ok(()) => {
            info!("fleet started over HTTP");
            Ok(StatusCode::OK)
        }
        Err(err) => Err(error_response(StatusCode::CONFLICT, err.to_string())),
    }
}

/// POST /stop - signal fleet shutdown. The daemon joins the tasks.
async fn stop_fleet(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    info!("shutdown requested over HTTP");
    state.fleet.signal_stop();
    StatusCode::ACCEPTED
}
