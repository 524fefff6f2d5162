// src/alert_tracker.rs
//
// Per-(class, side) cooldown bookkeeping. Entries are written when an alert
// fires and never removed; the cooldown comparison makes stale entries inert.

use crate::types::Side;
use std::collections::HashMap;

/// Suppression window for repeated alerts on the same key.
pub const COOLDOWN_SECONDS: f64 = 120.0;

pub type AlertKey = (String, Side);

#[derive(Debug, Default)]
pub struct AlertKeyTracker {
    last_fired: HashMap<AlertKey, f64>,
}

impl AlertKeyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if no alert has fired for `key`, or the last one is strictly
    /// older than the cooldown window. Exactly at the boundary the key
    /// stays ineligible.
    pub fn is_eligible(&self, key: &AlertKey, now: f64) -> bool {
        match self.last_fired.get(key) {
            None => true,
            Some(&last) => now - last > COOLDOWN_SECONDS,
        }
    }

    /// Unconditionally stamps `key` as fired at `now`. Called before the
    /// rewrite call returns, so a slow or failing rewrite cannot cause
    /// duplicate firing within the window.
    pub fn record_fired(&mut self, key: AlertKey, now: f64) {
        self.last_fired.insert(key, now);
    }

    pub fn tracked_keys(&self) -> usize {
        self.last_fired.len()
    }
}
