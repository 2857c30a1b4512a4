//! Role-specific push/poll driver.

use super::{
    ConnectionState, Debouncer, Instant, PollSchedule, SceneSnapshot, SyncEnvelope, SyncEvent,
    SyncTransport,
};
use crate::config::EditorConfig;
use crate::session::Role;
use std::time::Duration;

/// Runs the admin push or guest poll protocol over a transport.
pub struct SyncEngine {
    role: Role,
    transport: Box<dyn SyncTransport>,
    debounce: Debouncer,
    poll: PollSchedule,
    last_applied: u64,
    state: ConnectionState,
    running: bool,
}

impl SyncEngine {
    pub fn new(role: Role, transport: Box<dyn SyncTransport>, config: &EditorConfig) -> Self {
        Self {
            role,
            transport,
            debounce: Debouncer::new(Duration::from_millis(config.push_debounce_ms)),
            poll: PollSchedule::new(Duration::from_millis(config.poll_interval_ms)),
            last_applied: 0,
            state: ConnectionState::Unknown,
            running: false,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Timestamp of the newest envelope applied so far.
    pub fn last_applied(&self) -> u64 {
        self.last_applied
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    /// Arm the timers for this role.
    pub fn start(&mut self, now: Instant) {
        self.running = true;
        match self.role {
            Role::Admin => self.debounce.start(),
            Role::Guest => self.poll.start(now),
        }
        log::info!("sync started as {:?}", self.role);
    }

    /// Disarm all timers. Results already in flight are still drained.
    pub fn stop(&mut self) {
        self.running = false;
        self.debounce.stop();
        self.poll.stop();
        log::info!("sync stopped");
    }

    /// Record a committed mutation; restarts the push quiet period.
    pub fn notify_mutation(&mut self, now: Instant) {
        if self.role == Role::Admin {
            self.debounce.trigger(now);
        }
    }

    /// Whether the admin should push now. True once per quiet period.
    pub fn push_due(&mut self, now: Instant) -> bool {
        self.role == Role::Admin && self.debounce.fire(now)
    }

    /// Serialize and queue a push. Failures are logged; the next mutation retries.
    /// Cancels any pending quiet period.
    pub fn push(&mut self, snapshot: &SceneSnapshot) {
        self.debounce.cancel();
        let body = match snapshot.to_json() {
            Ok(body) => body,
            Err(e) => {
                log::warn!("failed to serialize scene: {e}");
                return;
            }
        };
        log::debug!("pushing scene ({} bytes)", body.len());
        if let Err(e) = self.transport.push(body) {
            log::warn!("push failed: {e}");
            self.state = ConnectionState::Unreachable;
        }
    }

    /// Queue a guest fetch when the poll interval elapses.
    pub fn poll(&mut self, now: Instant) {
        if self.role != Role::Guest || !self.poll.fire(now) {
            return;
        }
        if let Err(e) = self.transport.request_snapshot() {
            log::warn!("poll failed: {e}");
            self.state = ConnectionState::Unreachable;
        }
    }

    /// Drain transport results and return the newest snapshot to apply, if any.
    ///
    /// Envelopes not strictly newer than the last applied one, or without
    /// data, are skipped silently. Malformed payloads are logged and skipped.
    pub fn receive(&mut self) -> Option<SceneSnapshot> {
        let mut accepted = None;
        for event in self.transport.poll_events() {
            match event {
                SyncEvent::Fetched(envelope) => {
                    self.state = ConnectionState::Reachable;
                    if let Some(snapshot) = self.accept(envelope) {
                        accepted = Some(snapshot);
                    }
                }
                SyncEvent::Pushed => self.state = ConnectionState::Reachable,
                SyncEvent::Error { message } => {
                    log::warn!("sync request failed: {message}");
                    self.state = ConnectionState::Unreachable;
                }
            }
        }
        accepted
    }

    fn accept(&mut self, envelope: SyncEnvelope) -> Option<SceneSnapshot> {
        if envelope.timestamp <= self.last_applied {
            return None;
        }
        match envelope.snapshot() {
            Ok(Some(snapshot)) => {
                self.last_applied = envelope.timestamp;
                Some(snapshot)
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("ignoring envelope {}: {e}", envelope.timestamp);
                None
            }
        }
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("role", &self.role)
            .field("last_applied", &self.last_applied)
            .field("state", &self.state)
            .field("running", &self.running)
            .finish()
    }
}
