//! Admin→guest scene synchronization.
//!
//! The admin pushes a serialized scene after a quiet period; guests poll the
//! relay and merge newer envelopes layer by layer. Transports only move
//! strings and report results through [`SyncTransport::poll_events`].

mod codec;
mod engine;
mod memory;
mod schedule;

#[cfg(not(target_arch = "wasm32"))]
mod http;
#[cfg(target_arch = "wasm32")]
mod wasm;

pub use codec::{Calibration, MergeReport, SceneSnapshot, layers_equivalent, merge_snapshot};
pub use engine::SyncEngine;
pub use memory::{MemoryRelay, MemoryTransport};
pub use schedule::{Debouncer, PollSchedule};

#[cfg(not(target_arch = "wasm32"))]
pub use http::HttpTransport;
#[cfg(target_arch = "wasm32")]
pub use wasm::FetchTransport;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// Use web_time for WASM compatibility
#[cfg(target_arch = "wasm32")]
pub use web_time::Instant;
#[cfg(not(target_arch = "wasm32"))]
pub use std::time::Instant;

/// Path of the sync endpoint, relative to the server base URL.
pub const SYNC_PATH: &str = "/api/map/sync";

/// What the relay returns for a poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEnvelope {
    pub timestamp: u64,
    /// The serialized scene, or nothing if no admin has pushed yet.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl SyncEnvelope {
    /// Decode the payload. Payloads stored as a JSON string are unwrapped first.
    pub fn snapshot(&self) -> Result<Option<SceneSnapshot>, SyncError> {
        match &self.data {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(text)) => Ok(Some(serde_json::from_str(text)?)),
            Some(value) => Ok(Some(SceneSnapshot::deserialize(value)?)),
        }
    }
}

/// Errors from the sync layer.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("server returned HTTP {0}")]
    Status(u16),

    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("transport closed")]
    Closed,
}

/// Results delivered by a transport.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A poll completed.
    Fetched(SyncEnvelope),
    /// A push was accepted by the relay.
    Pushed,
    /// A request failed.
    Error { message: String },
}

/// Reachability of the relay, as seen by the last completed request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Unknown,
    Reachable,
    Unreachable,
}

/// Moves snapshots to and from a relay.
pub trait SyncTransport {
    /// Queue a push of a serialized scene.
    fn push(&mut self, body: String) -> Result<(), SyncError>;

    /// Queue a fetch of the latest envelope.
    fn request_snapshot(&mut self) -> Result<(), SyncError>;

    /// Drain completed results (non-blocking).
    fn poll_events(&mut self) -> Vec<SyncEvent>;
}

/// Platform-specific HTTP transport type.
#[cfg(target_arch = "wasm32")]
pub type PlatformTransport = FetchTransport;

#[cfg(not(target_arch = "wasm32"))]
pub type PlatformTransport = HttpTransport;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_without_data() {
        let envelope: SyncEnvelope = serde_json::from_str(r#"{"timestamp": 0}"#).unwrap();
        assert_eq!(envelope.data, None);
        assert!(envelope.snapshot().unwrap().is_none());

        let envelope: SyncEnvelope =
            serde_json::from_str(r#"{"timestamp": 3, "data": null}"#).unwrap();
        assert!(envelope.snapshot().unwrap().is_none());
    }

    #[test]
    fn test_envelope_with_string_payload() {
        let inner = serde_json::to_string(&SceneSnapshot::default()).unwrap();
        let envelope = SyncEnvelope {
            timestamp: 1,
            data: Some(serde_json::Value::String(inner)),
        };
        assert!(envelope.snapshot().unwrap().is_some());
    }

    #[test]
    fn test_malformed_payload() {
        let envelope = SyncEnvelope {
            timestamp: 1,
            data: Some(serde_json::json!({"layers": 7})),
        };
        assert!(matches!(envelope.snapshot(), Err(SyncError::Malformed(_))));
    }
}
