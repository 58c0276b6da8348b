//! File-based request ingester.
//!
//! Polls a text file of `PART_ID,QTY` lines on an interval, turns the
//! lines into pending requests, truncates the file, and offers the whole
//! batch to the queue at once. A bad quantity or an I/O failure drops the
//! entire batch; unknown parts and malformed lines only lose their line.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fleet_core::{Inventory, PartRequest, ValidationError};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::context::FleetContext;

#[derive(Debug, Error)]
pub enum RequestProcessingError {
    #[error("error reading request file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid quantity {value:?} in request file")]
    InvalidQuantity {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("could not clear request file {path}")]
    Truncate {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("rejected request line")]
    Invalid(#[from] ValidationError),
}

pub struct Ingester {
    path: PathBuf,
    interval: Duration,
}

impl Ingester {
    pub fn new(path: PathBuf, interval: Duration) -> Self {
        Self { path, interval }
    }

    /// Poll loop: one batch attempt per interval until shutdown. Batch
    /// failures are logged and the next interval proceeds.
    pub async fn run(self, ctx: Arc<FleetContext>) {
        info!(path = %self.path.display(), "request ingester online");
        loop {
            tokio::select! {
                _ = ctx.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {
                    match self.load_batch(&ctx) {
                        Ok(0) => {}
                        Ok(count) => info!(count, "ingested request batch"),
                        Err(err) => error!(error = %err, "failed to process request file"),
                    }
                }
            }
        }
        info!("request ingester offline");
    }

    /// Read, parse, truncate, enqueue. Returns the batch size.
    pub fn load_batch(&self, ctx: &FleetContext) -> Result<usize, RequestProcessingError> {
        let batch = parse_request_file(&self.path, &ctx.inventory)?;
        if batch.is_empty() {
            return Ok(0);
        }

        // Truncate only after the whole file parsed cleanly.
        std::fs::write(&self.path, "").map_err(|source| RequestProcessingError::Truncate {
            path: self.path.display().to_string(),
            source,
        })?;

        let count = batch.len();
        ctx.queue.offer_batch(batch);
        Ok(count)
    }
}

/// Parse every line of the request file. The whole batch fails on a
/// quantity parse error or I/O error; unknown parts and lines without
/// exactly two fields are logged and skipped.
fn parse_request_file(
    path: &std::path::Path,
    inventory: &Inventory,
) -> Result<Vec<PartRequest>, RequestProcessingError> {
    let content = std::fs::read_to_string(path).map_err(|source| RequestProcessingError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let mut batch = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 2 {
            warn!(line, "invalid request format, skipping line");
            continue;
        }

        let part_id = fields[0].trim();
        let qty_text = fields[1].trim();
        let qty: i32 =
            qty_text
                .parse()
                .map_err(|source| RequestProcessingError::InvalidQuantity {
                    value: qty_text.to_string(),
                    source,
                })?;

        let Some(part) = inventory.find_by_id(part_id) else {
            warn!(part_id, "unknown part id in request file, skipping line");
            continue;
        };

        let request = PartRequest::create(Some(part.clone()), qty)?;
        info!(task = %request.id, part_id, qty, "read request from file");
        batch.push(request);
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charging::ChargingPool;
    use crate::ledger::RequestLedger;
    use crate::queue::RequestQueue;
    use fleet_core::types::Part;
    use fleet_core::FleetConfig;
    use tokio::sync::watch;

    fn test_context() -> Arc<FleetContext> {
        let inventory = Inventory::new(
            100,
            vec![
                (Part::new("P1001", "Oil Filter", ""), 25),
                (Part::new("P1002", "Air Filter", ""), 30),
            ],
        );
        let (_tx, rx) = watch::channel(true);
        Arc::new(FleetContext::new(
            FleetConfig::default(),
            Arc::new(RequestQueue::new()),
            Arc::new(inventory),
            Arc::new(ChargingPool::new()),
            Arc::new(RequestLedger::new()),
            rx,
        ))
    }

    fn ingester_for(dir: &tempfile::TempDir, content: &str) -> Ingester {
        let path = dir.path().join("pending_requests.txt");
        std::fs::write(&path, content).unwrap();
        Ingester::new(path, Duration::from_secs(5))
    }

    #[test]
    fn batch_is_parsed_enqueued_and_file_truncated() {
        let dir = tempfile::TempDir::new().unwrap();
        let ingester = ingester_for(&dir, "P1001,5\n\nP1002, 3\n");
        let ctx = test_context();

        let count = ingester.load_batch(&ctx).unwrap();
        assert_eq!(count, 2);
        assert_eq!(ctx.queue.len(), 2);

        let first = ctx.queue.poll().unwrap();
        assert_eq!(first.part.id, "P1001");
        assert_eq!(first.qty, 5);
        let second = ctx.queue.poll().unwrap();
        assert_eq!(second.part.id, "P1002");
        assert_eq!(second.qty, 3);

        // Successful processing clears the file.
        assert_eq!(std::fs::read_to_string(&ingester.path).unwrap(), "");
    }

    #[test]
    fn unknown_part_and_malformed_lines_are_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        let ingester = ingester_for(&dir, "P9999,5\nnot a line\nP1001,2\n");
        let ctx = test_context();

        let count = ingester.load_batch(&ctx).unwrap();
        assert_eq!(count, 1);
        assert_eq!(ctx.queue.poll().unwrap().part.id, "P1001");
    }

    #[test]
    fn bad_quantity_fails_the_whole_batch() {
        let dir = tempfile::TempDir::new().unwrap();
        let ingester = ingester_for(&dir, "P1001,5\nP1002,many\n");
        let ctx = test_context();

        let err = ingester.load_batch(&ctx).unwrap_err();
        assert!(matches!(
            err,
            RequestProcessingError::InvalidQuantity { .. }
        ));
        // Nothing enqueued, file left intact for inspection.
        assert!(ctx.queue.is_empty());
        assert_ne!(std::fs::read_to_string(&ingester.path).unwrap(), "");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let ingester = Ingester::new(dir.path().join("absent.txt"), Duration::from_secs(5));
        let ctx = test_context();

        let err = ingester.load_batch(&ctx).unwrap_err();
        assert!(matches!(err, RequestProcessingError::Io { .. }));
    }

    #[test]
    fn empty_file_is_an_empty_batch() {
        let dir = tempfile::TempDir::new().unwrap();
        let ingester = ingester_for(&dir, "\n\n");
        let ctx = test_context();
        assert_eq!(ingester.load_batch(&ctx).unwrap(), 0);
    }
}
