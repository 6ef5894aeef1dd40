use std::time::Duration;

use parking_lot::Mutex;
use reqwest::header::CONTENT_TYPE;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use super::{Transport, TransportError};
use crate::config::Config;

const BLOCKING_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP POST transport.
///
/// Inside a tokio runtime the request is spawned and not awaited; a newer
/// delivery aborts one still in flight, since its payload is stale. Outside a
/// runtime it falls back to a synchronous request.
pub struct BeaconTransport {
    endpoint: String,
    client: reqwest::Client,
    in_flight: Mutex<Option<AbortHandle>>,
}

impl BeaconTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
            in_flight: Mutex::new(None),
        }
    }

    /// Transport for the configured collector, if one is set
    pub fn from_config(config: &Config) -> Option<Self> {
        config.endpoint.as_deref().map(Self::new)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn spawn(&self, handle: &Handle, body: String) {
        let mut in_flight = self.in_flight.lock();
        if let Some(previous) = in_flight.take() {
            if !previous.is_finished() {
                tracing::debug!(endpoint = %self.endpoint, "Aborting superseded delivery");
                previous.abort();
            }
        }

        let request = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/plain")
            .body(body);
        let endpoint = self.endpoint.clone();
        let task = handle.spawn(async move {
            if let Err(e) = request.send().await {
                tracing::debug!(endpoint = %endpoint, error = %e, "Beacon delivery failed");
            }
        });
        *in_flight = Some(task.abort_handle());
    }

    fn send_blocking(&self, body: String) -> Result<(), TransportError> {
        reqwest::blocking::Client::builder()
            .timeout(BLOCKING_TIMEOUT)
            .build()?
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/plain")
            .body(body)
            .send()?
            .error_for_status()?;
        Ok(())
    }
}

impl Transport for BeaconTransport {
    fn deliver(&self, body: String) -> Result<(), TransportError> {
        match Handle::try_current() {
            Ok(handle) => {
                self.spawn(&handle, body);
                Ok(())
            }
            Err(_) => self.send_blocking(body),
        }
    }
}

impl std::fmt::Debug for BeaconTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeaconTransport")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
