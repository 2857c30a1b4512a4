//! In-process relay for tests and single-process setups.

use super::{SceneSnapshot, SyncEnvelope, SyncError, SyncEvent, SyncTransport};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Default)]
struct RelayState {
    timestamp: u64,
    data: Option<serde_json::Value>,
    offline: bool,
    pushes: usize,
    fetches: usize,
}

/// Shared relay state, stamping each push with the next timestamp.
#[derive(Debug, Clone, Default)]
pub struct MemoryRelay {
    state: Rc<RefCell<RelayState>>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a snapshot under an explicit timestamp.
    pub fn publish(&self, timestamp: u64, snapshot: SceneSnapshot) {
        let mut state = self.state.borrow_mut();
        state.timestamp = timestamp;
        state.data = serde_json::to_value(snapshot).ok();
    }

    /// Simulate the relay being unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.state.borrow_mut().offline = offline;
    }

    pub fn envelope(&self) -> SyncEnvelope {
        let state = self.state.borrow();
        SyncEnvelope {
            timestamp: state.timestamp,
            data: state.data.clone(),
        }
    }

    pub fn push_count(&self) -> usize {
        self.state.borrow().pushes
    }

    pub fn fetch_count(&self) -> usize {
        self.state.borrow().fetches
    }
}

/// Transport over a [`MemoryRelay`]. Requests complete immediately.
#[derive(Debug)]
pub struct MemoryTransport {
    relay: MemoryRelay,
    events: Vec<SyncEvent>,
}

impl MemoryTransport {
    pub fn new(relay: MemoryRelay) -> Self {
        Self {
            relay,
            events: Vec::new(),
        }
    }
}

impl SyncTransport for MemoryTransport {
    fn push(&mut self, body: String) -> Result<(), SyncError> {
        let mut state = self.relay.state.borrow_mut();
        if state.offline {
            self.events.push(SyncEvent::Error {
                message: "relay offline".to_string(),
            });
            return Ok(());
        }
        state.data = Some(serde_json::from_str(&body)?);
        state.timestamp += 1;
        state.pushes += 1;
        self.events.push(SyncEvent::Pushed);
        Ok(())
    }

    fn request_snapshot(&mut self) -> Result<(), SyncError> {
        let mut state = self.relay.state.borrow_mut();
        state.fetches += 1;
        if state.offline {
            self.events.push(SyncEvent::Error {
                message: "relay offline".to_string(),
            });
            return Ok(());
        }
        self.events.push(SyncEvent::Fetched(SyncEnvelope {
            timestamp: state.timestamp,
            data: state.data.clone(),
        }));
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<SyncEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_stamps_increasing_timestamps() {
        let relay = MemoryRelay::new();
        let mut transport = MemoryTransport::new(relay.clone());
        let body = SceneSnapshot::default().to_json().unwrap();
        transport.push(body.clone()).unwrap();
        transport.push(body).unwrap();
        assert_eq!(relay.envelope().timestamp, 2);
        assert_eq!(transport.poll_events().len(), 2);
    }

    #[test]
    fn test_push_rejects_invalid_json() {
        let relay = MemoryRelay::new();
        let mut transport = MemoryTransport::new(relay);
        assert!(matches!(
            transport.push("{not json".into()),
            Err(SyncError::Malformed(_))
        ));
    }
}
