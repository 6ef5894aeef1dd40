//! In-memory transport for simulations and tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Transport, TransportError};

/// Records every delivered body. Clones share the record, so a test can
/// keep one handle while controllers own others.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    deliveries: Arc<Mutex<Vec<String>>>,
    offline: Arc<AtomicBool>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent deliveries fail (or succeed again).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn deliveries(&self) -> Vec<String> {
        self.deliveries.lock().clone()
    }

    /// Every delivered slot payload, one per line of each body.
    pub fn delivered_records(&self) -> Vec<String> {
        self.deliveries
            .lock()
            .iter()
            .flat_map(|body| body.lines().map(str::to_string).collect::<Vec<_>>())
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn deliver(&self, body: String) -> Result<(), TransportError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("recording transport offline".into()));
        }
        self.deliveries.lock().push(body);
        Ok(())
    }
}
