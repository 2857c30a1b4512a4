//! Native HTTP transport.
//!
//! Requests run on a background thread so the session thread never blocks;
//! results come back through a channel and are drained by `poll_events`.

use super::{SYNC_PATH, SyncEnvelope, SyncError, SyncEvent, SyncTransport};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Commands sent to the worker thread.
enum HttpCommand {
    Push(String),
    Fetch,
    Close,
}

/// HTTP transport for native platforms.
pub struct HttpTransport {
    endpoint: String,
    cmd_tx: Option<Sender<HttpCommand>>,
    event_rx: Receiver<SyncEvent>,
    thread: Option<JoinHandle<()>>,
}

/// Validate a server base URL and return the sync endpoint on it.
pub(crate) fn sync_endpoint(base_url: &str) -> Result<String, SyncError> {
    let parsed = Url::parse(base_url).map_err(|e| SyncError::InvalidUrl(e.to_string()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(SyncError::InvalidUrl(format!(
            "unsupported scheme: {}",
            parsed.scheme()
        )));
    }
    Ok(format!("{}{}", base_url.trim_end_matches('/'), SYNC_PATH))
}

impl HttpTransport {
    /// Spawn the worker for a server base URL such as `http://localhost:5000`.
    pub fn new(base_url: &str) -> Result<Self, SyncError> {
        let endpoint = sync_endpoint(base_url)?;
        let (cmd_tx, cmd_rx) = channel::<HttpCommand>();
        let (event_tx, event_rx) = channel::<SyncEvent>();

        let worker_endpoint = endpoint.clone();
        let handle = thread::Builder::new()
            .name("tablemap-sync".to_string())
            .spawn(move || run_worker(&worker_endpoint, cmd_rx, event_tx))
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        log::info!("sync transport targeting {endpoint}");
        Ok(Self {
            endpoint,
            cmd_tx: Some(cmd_tx),
            event_rx,
            thread: Some(handle),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn send(&self, command: HttpCommand) -> Result<(), SyncError> {
        self.cmd_tx
            .as_ref()
            .ok_or(SyncError::Closed)?
            .send(command)
            .map_err(|_| SyncError::Closed)
    }
}

fn run_worker(endpoint: &str, cmd_rx: Receiver<HttpCommand>, event_tx: Sender<SyncEvent>) {
    let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
    for command in cmd_rx {
        let event = match command {
            HttpCommand::Push(body) => match push_once(&agent, endpoint, &body) {
                Ok(()) => SyncEvent::Pushed,
                Err(e) => SyncEvent::Error {
                    message: e.to_string(),
                },
            },
            HttpCommand::Fetch => match fetch_once(&agent, endpoint) {
                Ok(envelope) => SyncEvent::Fetched(envelope),
                Err(e) => SyncEvent::Error {
                    message: e.to_string(),
                },
            },
            HttpCommand::Close => break,
        };
        if event_tx.send(event).is_err() {
            break;
        }
    }
    log::debug!("sync worker exiting");
}

fn push_once(agent: &ureq::Agent, endpoint: &str, body: &str) -> Result<(), SyncError> {
    agent
        .post(endpoint)
        .set("Content-Type", "application/json")
        .send_string(body)
        .map_err(map_ureq_error)?;
    Ok(())
}

fn fetch_once(agent: &ureq::Agent, endpoint: &str) -> Result<SyncEnvelope, SyncError> {
    let text = agent
        .get(endpoint)
        .call()
        .map_err(map_ureq_error)?
        .into_string()
        .map_err(|e| SyncError::Transport(e.to_string()))?;
    Ok(serde_json::from_str(&text)?)
}

pub(crate) fn map_ureq_error(error: ureq::Error) -> SyncError {
    match error {
        ureq::Error::Status(code, _) => SyncError::Status(code),
        other => SyncError::Transport(other.to_string()),
    }
}

impl SyncTransport for HttpTransport {
    fn push(&mut self, body: String) -> Result<(), SyncError> {
        self.send(HttpCommand::Push(body))
    }

    fn request_snapshot(&mut self) -> Result<(), SyncError> {
        self.send(HttpCommand::Fetch)
    }

    fn poll_events(&mut self) -> Vec<SyncEvent> {
        self.event_rx.try_iter().collect()
    }
}

impl Drop for HttpTransport {
    fn drop(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(HttpCommand::Close);
        }
        // The worker may be mid-request; let it finish on its own.
        self.thread.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_validation() {
        assert_eq!(
            sync_endpoint("http://localhost:5000/").unwrap(),
            "http://localhost:5000/api/map/sync"
        );
        assert!(matches!(
            sync_endpoint("ws://localhost:5000"),
            Err(SyncError::InvalidUrl(_))
        ));
        assert!(matches!(sync_endpoint("not a url"), Err(SyncError::InvalidUrl(_))));
    }
}
