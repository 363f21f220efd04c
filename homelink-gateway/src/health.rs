use crate::admission::AdmissionController;
use crate::cache::TelemetryCache;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Serialize)]
pub struct GatewayHealth {
    pub uptime_seconds: u64,
    pub broker_status: String,
    pub broker_reconnects: u32,
    pub samples_cached: u32,
    pub requests_throttled: u64,
}

/// Suivi de l'état infrastructure, exposé sur /system/health
#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    broker_reconnects: Arc<AtomicU32>,
    broker_status: Arc<parking_lot::Mutex<String>>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            broker_reconnects: Arc::new(AtomicU32::new(0)),
            broker_status: Arc::new(parking_lot::Mutex::new("connecting".to_string())),
        }
    }

    pub fn mark_broker_connected(&self) {
        *self.broker_status.lock() = "connected".to_string();
    }

    pub fn mark_broker_reconnecting(&self) {
        self.broker_reconnects.fetch_add(1, Ordering::Relaxed);
        *self.broker_status.lock() = "reconnecting".to_string();
    }

    /// Budget de reconnexion épuisé : état terminal visible des opérateurs
    pub fn mark_broker_faulted(&self) {
        *self.broker_status.lock() = "faulted".to_string();
    }

    pub fn broker_reconnects(&self) -> u32 {
        self.broker_reconnects.load(Ordering::Relaxed)
    }

    pub fn get_health(&self, cache: &TelemetryCache, admission: &AdmissionController) -> GatewayHealth {
        GatewayHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            broker_status: self.broker_status.lock().clone(),
            broker_reconnects: self.broker_reconnects(),
            samples_cached: cache.samples_present() as u32,
            requests_throttled: admission.throttled_total(),
        }
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}
