//! Shared inventory: part catalog plus a capacity-hinted stock map.
//!
//! `reserve` is the one linearizable mutation; everything else is a read.
//! No I/O happens while the stock lock is held.

use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;
use tracing::warn;

use crate::types::Part;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("not enough stock of {part}: requested {requested}, available {available}")]
    InsufficientStock {
        part: String,
        requested: i32,
        available: i32,
    },
}

/// Part catalog and stock levels, shared by every worker.
///
/// The id index is built once at construction and never mutated, so
/// lookups need no lock. The stock map sits behind a mutex whose critical
/// sections are a handful of map operations.
pub struct Inventory {
    capacity: i32,
    index: HashMap<String, Part>,
    stock: Mutex<HashMap<String, i32>>,
}

impl Inventory {
    /// Build an inventory from an initial stocking.
    ///
    /// `capacity` is a sizing hint: an initial total above it is logged,
    /// not rejected.
    pub fn new(capacity: i32, initial: Vec<(Part, i32)>) -> Self {
        let mut index = HashMap::new();
        let mut stock = HashMap::new();
        for (part, qty) in initial {
            stock.insert(part.id.clone(), qty);
            index.insert(part.id.clone(), part);
        }

        let total: i32 = stock.values().sum();
        if total > capacity {
            warn!(total, capacity, "initial stock exceeds inventory capacity");
        }

        Self {
            capacity,
            index,
            stock: Mutex::new(stock),
        }
    }

    pub fn capacity(&self) -> i32 {
        self.capacity
    }

    /// O(1) catalog lookup. Never mutates; safe for concurrent readers.
    pub fn find_by_id(&self, part_id: &str) -> Option<&Part> {
        self.index.get(part_id)
    }

    /// Atomically take `qty` units of `part` from stock.
    ///
    /// Exactly one of two concurrent reservations that together exceed the
    /// level can succeed. `qty <= 0` is a no-op returning `Ok(false)`; an
    /// absent part or a shortfall fails without any state change.
    pub fn reserve(&self, part: &Part, qty: i32) -> Result<bool, InventoryError> {
        if qty <= 0 {
            return Ok(false);
        }

        let mut stock = self.stock.lock().expect("stock lock poisoned");
        let available = stock.get(&part.id).copied().unwrap_or(0);
        if qty > available {
            return Err(InventoryError::InsufficientStock {
                part: part.name.clone(),
                requested: qty,
                available,
            });
        }

        stock.insert(part.id.clone(), available - qty);
        Ok(true)
    }

    /// Current stock level, 0 for parts not in the catalog.
    pub fn level(&self, part: &Part) -> i32 {
        self.stock
            .lock()
            .expect("stock lock poisoned")
            .get(&part.id)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_stock(&self) -> i32 {
        self.stock
            .lock()
            .expect("stock lock poisoned")
            .values()
            .sum()
    }

    /// Read-only copy of the stock map for the dashboard, sorted by part id.
    pub fn snapshot(&self) -> Vec<(Part, i32)> {
        let stock = self.stock.lock().expect("stock lock poisoned");
        let mut entries: Vec<(Part, i32)> = stock
            .iter()
            .filter_map(|(id, qty)| self.index.get(id).map(|part| (part.clone(), *qty)))
            .collect();
        entries.sort_by(|a, b| a.0.id.cmp(&b.0.id));
        entries
    }
}

impl std::fmt::Debug for Inventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inventory")
            .field("capacity", &self.capacity)
            .field("parts", &self.index.len())
            .finish()
    }
}
