//! Delivery of archived slots to the collector.
//!
//! Delivery is best-effort and never retried here: a failed delivery leaves
//! the slots archived in the shared store for the next collection pass.

mod beacon;
mod recording;

use thiserror::Error;

pub use beacon::BeaconTransport;
pub use recording::RecordingTransport;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

/// Fire-and-forget sink for an opaque payload body.
pub trait Transport: Send + Sync {
    /// Hand `body` off for delivery. `Ok` means the hand-off happened, not
    /// that the collector received it.
    fn deliver(&self, body: String) -> Result<(), TransportError>;
}
