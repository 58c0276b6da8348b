//! Core domain types for the fleet simulator.
//!
//! Parts, part requests, and the lifecycle enumerations shared by the
//! daemon, the report codec, and the HTTP snapshots.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A catalog entry. Immutable; two parts are the same part iff their ids
/// are equal, regardless of name or description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl Part {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
        }
    }
}

impl PartialEq for Part {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Part {}

impl std::hash::Hash for Part {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Request lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// Inverse of [`as_str`](Self::as_str), used when decoding reports.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "PENDING" => Some(Self::Pending),
            "IN_PROGRESS" => Some(Self::InProgress),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    /// COMPLETED and FAILED are terminal; no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Robot lifecycle status.
///
/// `LowBattery` means the robot has decided to charge; `WaitingForCharge`
/// means it is queued at the charging pool. `repr(u8)` so the live value
/// can be stored in an `AtomicU8` and read without tearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum RobotStatus {
    Idle = 0,
    Working = 1,
    LowBattery = 2,
    WaitingForCharge = 3,
    Charging = 4,
}

impl RobotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Working => "WORKING",
            Self::LowBattery => "LOW_BATTERY",
            Self::WaitingForCharge => "WAITING_FOR_CHARGE",
            Self::Charging => "CHARGING",
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Working,
            2 => Self::LowBattery,
            3 => Self::WaitingForCharge,
            4 => Self::Charging,
            _ => Self::Idle,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Part cannot be null")]
    MissingPart,
    #[error("Quantity must be positive")]
    NonPositiveQuantity(i32),
}

/// Process-wide request id counter. Monotonic and unique within a run;
/// gaplessness is not guaranteed and must not be relied on.
static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// An immutable unit of work: pick `qty` units of `part`.
///
/// A state transition produces a new value with the same id via
/// [`with_status`](Self::with_status).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartRequest {
    pub id: String,
    pub part: Part,
    pub qty: i32,
    pub status: RequestStatus,
}

impl PartRequest {
    /// Mint a new PENDING request with a fresh `Task-N` id.
    ///
    /// Two concurrent calls always receive distinct ids.
    pub fn create(part: Option<Part>, qty: i32) -> Result<Self, ValidationError> {
        let part = part.ok_or(ValidationError::MissingPart)?;
        if qty <= 0 {
            return Err(ValidationError::NonPositiveQuantity(qty));
        }

        let n = REQUEST_COUNTER.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Self {
            id: format!("Task-{n}"),
            part,
            qty,
            status: RequestStatus::Pending,
        })
    }

    /// A copy of this request carrying `status`, sharing id, part, and qty.
    pub fn with_status(&self, status: RequestStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

impl std::fmt::Display for PartRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{} x{} {}]",
            self.id,
            self.part.id,
            self.qty,
            self.status.as_str()
        )
    }
}
