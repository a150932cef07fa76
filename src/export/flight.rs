//! Per-tenant single-flight guard

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Tracks which tenants have an export running.
#[derive(Debug, Clone, Default)]
pub struct SingleFlight {
    running: Arc<Mutex<HashSet<String>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `key`, or `None` if it is already taken
    ///
    /// The slot is released when the returned guard is dropped.
    pub fn try_acquire(&self, key: &str) -> Option<FlightGuard> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if !running.insert(key.to_string()) {
            return None;
        }
        Some(FlightGuard {
            running: Arc::clone(&self.running),
            key: key.to_string(),
        })
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }
}

/// Held for the duration of one export.
#[derive(Debug)]
pub struct FlightGuard {
    running: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
