//! Browser transport built on `fetch`.
//!
//! Requests are spawned on the local executor; their results are collected
//! and must be polled via `poll_events()`.

use super::{SYNC_PATH, SyncEnvelope, SyncError, SyncEvent, SyncTransport};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{Request, RequestInit, Response};

/// HTTP transport for the browser.
pub struct FetchTransport {
    endpoint: String,
    events: Rc<RefCell<Vec<SyncEvent>>>,
}

impl FetchTransport {
    /// `base_url` may be empty to target the page's own origin.
    pub fn new(base_url: &str) -> Self {
        Self {
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), SYNC_PATH),
            events: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn spawn(&self, body: Option<String>) {
        let endpoint = self.endpoint.clone();
        let events = self.events.clone();
        spawn_local(async move {
            let pushing = body.is_some();
            let event = match fetch_text(&endpoint, body).await {
                Ok(_) if pushing => SyncEvent::Pushed,
                Ok(text) => match serde_json::from_str::<SyncEnvelope>(&text) {
                    Ok(envelope) => SyncEvent::Fetched(envelope),
                    Err(e) => SyncEvent::Error {
                        message: format!("malformed envelope: {e}"),
                    },
                },
                Err(e) => SyncEvent::Error {
                    message: format!("{e:?}"),
                },
            };
            events.borrow_mut().push(event);
        });
    }
}

async fn fetch_text(url: &str, body: Option<String>) -> Result<String, JsValue> {
    let opts = RequestInit::new();
    match &body {
        Some(body) => {
            opts.set_method("POST");
            opts.set_body(&JsValue::from_str(body));
        }
        None => opts.set_method("GET"),
    }
    let request = Request::new_with_str_and_init(url, &opts)?;
    if body.is_some() {
        request.headers().set("Content-Type", "application/json")?;
    }

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let response: Response = JsFuture::from(window.fetch_with_request(&request))
        .await?
        .dyn_into()?;
    if !response.ok() {
        return Err(JsValue::from_str(&format!("HTTP {}", response.status())));
    }
    let text = JsFuture::from(response.text()?).await?;
    text.as_string()
        .ok_or_else(|| JsValue::from_str("response body is not text"))
}

impl SyncTransport for FetchTransport {
    fn push(&mut self, body: String) -> Result<(), SyncError> {
        self.spawn(Some(body));
        Ok(())
    }

    fn request_snapshot(&mut self) -> Result<(), SyncError> {
        self.spawn(None);
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<SyncEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}
