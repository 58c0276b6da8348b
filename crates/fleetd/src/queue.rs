//! Multi-producer / multi-consumer request queue.
//!
//! A FIFO guarded by a short mutex, with a [`Notify`] so idle workers can
//! sleep between polls instead of spinning. FIFO order is the arrival
//! order of `offer` calls across all producers.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use fleet_core::PartRequest;
use tokio::sync::Notify;
use tracing::debug;

pub struct RequestQueue {
    inner: Mutex<VecDeque<PartRequest>>,
    notify: Notify,
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// Append a request and wake at least one waiting consumer.
    pub fn offer(&self, request: PartRequest) {
        {
            let mut queue = self.inner.lock().expect("queue lock poisoned");
            queue.push_back(request);
        }
        self.notify.notify_one();
    }

    /// Append a whole batch in one critical section, then wake consumers.
    ///
    /// Used by the file ingester so a batch becomes visible atomically.
    pub fn offer_batch(&self, requests: Vec<PartRequest>) {
        if requests.is_empty() {
            return;
        }
        let wakeups = requests.len();
        {
            let mut queue = self.inner.lock().expect("queue lock poisoned");
            queue.extend(requests);
        }
        for _ in 0..wakeups {
            self.notify.notify_one();
        }
        debug!(batch = wakeups, "request batch enqueued");
    }

    /// Pop the head without blocking.
    pub fn poll(&self) -> Option<PartRequest> {
        self.inner.lock().expect("queue lock poisoned").pop_front()
    }

    /// Pop the head if present; otherwise wait up to `timeout` for an
    /// offer and retry once. May still return `None`.
    pub async fn await_or_poll(&self, timeout: Duration) -> Option<PartRequest> {
        if let Some(request) = self.poll() {
            return Some(request);
        }

        // The notified future is created before the retry so an offer that
        // lands in between is not lost.
        let notified = self.notify.notified();
        tokio::select! {
            _ = notified => {}
            _ = tokio::time::sleep(timeout) => {}
        }
        self.poll()
    }

    pub fn has_any(&self) -> bool {
        !self.inner.lock().expect("queue lock poisoned").is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ordered copy of the pending requests for the dashboard.
    pub fn snapshot(&self) -> Vec<PartRequest> {
        self.inner
            .lock()
            .expect("queue lock poisoned")
            .iter()
            .cloned()
            .collect()
    }
}
