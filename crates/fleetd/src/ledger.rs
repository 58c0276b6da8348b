//! Terminal record set: the master map of every request the fleet has
//! accepted, keyed by request id. A later write for the same id wins.

use std::collections::HashMap;
use std::sync::Mutex;

use fleet_core::PartRequest;

#[derive(Default)]
pub struct RequestLedger {
    inner: Mutex<HashMap<String, PartRequest>>,
}

impl RequestLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest lifecycle value for a request.
    pub fn record(&self, request: PartRequest) {
        self.inner
            .lock()
            .expect("ledger lock poisoned")
            .insert(request.id.clone(), request);
    }

    pub fn get(&self, request_id: &str) -> Option<PartRequest> {
        self.inner
            .lock()
            .expect("ledger lock poisoned")
            .get(request_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("ledger lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All records, ordered by the numeric suffix of the `Task-N` id so
    /// reports come out deterministic.
    pub fn snapshot(&self) -> Vec<PartRequest> {
        let mut records: Vec<PartRequest> = self
            .inner
            .lock()
            .expect("ledger lock poisoned")
            .values()
            .cloned()
            .collect();
        records.sort_by_key(|r| {
            r.id.rsplit('-')
                .next()
                .and_then(|n| n.parse::<u64>().ok())
                .unwrap_or(u64::MAX)
        });
        records
    }
}
