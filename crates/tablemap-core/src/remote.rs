//! Client side of the asset, import and save endpoints.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from the remote store.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("server returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("server reported failure: {0}")]
    Rejected(String),
}

/// Calibration metadata stored next to a map image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneMetadata {
    #[serde(
        rename = "pixelsPerMeter",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub pixels_per_meter: Option<f64>,
}

/// A map available for import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteScene {
    pub name: String,
    #[serde(rename = "metadata_id")]
    pub remote_id: String,
}

/// Result of importing a remote map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedScene {
    pub status: String,
    /// Where the imported image can be loaded from.
    pub local_path: String,
    #[serde(default)]
    pub metadata: SceneMetadata,
}

/// Body of a save request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveSceneRequest {
    /// PNG as a `data:image/png;base64,` URL.
    pub image: String,
    pub filename: String,
    pub metadata: SceneMetadata,
}

impl SaveSceneRequest {
    /// Wrap rasterized PNG bytes, naming the file `Map_<millis>`.
    pub fn from_png(png: &[u8], cell_size: f64, unix_millis: u128) -> Self {
        Self {
            image: format!("data:image/png;base64,{}", STANDARD.encode(png)),
            filename: format!("Map_{unix_millis}"),
            metadata: SceneMetadata {
                pixels_per_meter: Some(cell_size),
            },
        }
    }
}

/// Reply to a save request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedScene {
    pub status: String,
    pub path: String,
}

/// Asset catalogue and scene storage on the server.
pub trait RemoteStore {
    /// Character portrait URLs, used for tokens.
    fn list_characters(&self) -> Result<Vec<String>, RemoteError>;

    /// Asset image URLs grouped by category.
    fn list_assets(&self) -> Result<BTreeMap<String, Vec<String>>, RemoteError>;

    /// Maps that can be imported.
    fn list_remote_scenes(&self) -> Result<Vec<RemoteScene>, RemoteError>;

    /// Fetch a remote map onto the server; the returned path is loadable.
    fn import_scene(&self, remote_id: &str) -> Result<ImportedScene, RemoteError>;

    fn save_scene_image(&self, request: &SaveSceneRequest) -> Result<SavedScene, RemoteError>;
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::HttpRemoteStore;

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use super::*;
    use serde::de::DeserializeOwned;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    use url::Url;

    /// Blocking HTTP implementation of [`RemoteStore`].
    pub struct HttpRemoteStore {
        base_url: String,
        agent: ureq::Agent,
    }

    impl HttpRemoteStore {
        pub fn new(base_url: &str) -> Result<Self, RemoteError> {
            let parsed =
                Url::parse(base_url).map_err(|e| RemoteError::InvalidUrl(e.to_string()))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(RemoteError::InvalidUrl(format!(
                    "unsupported scheme: {}",
                    parsed.scheme()
                )));
            }
            Ok(Self {
                base_url: base_url.trim_end_matches('/').to_string(),
                agent: ureq::AgentBuilder::new()
                    .timeout(Duration::from_secs(60))
                    .build(),
            })
        }

        /// Absolute URL for a server path such as `/data/maps/x.png`.
        pub fn resolve(&self, path: &str) -> String {
            if path.starts_with("http://") || path.starts_with("https://") {
                path.to_string()
            } else {
                format!("{}/{}", self.base_url, path.trim_start_matches('/'))
            }
        }

        fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteError> {
            let response = self.agent.get(&self.resolve(path)).call().map_err(map_error)?;
            read_json(response)
        }

        fn post<B: Serialize, T: DeserializeOwned>(
            &self,
            path: &str,
            body: &B,
        ) -> Result<T, RemoteError> {
            let body = serde_json::to_string(body)?;
            let response = self
                .agent
                .post(&self.resolve(path))
                .set("Content-Type", "application/json")
                .send_string(&body)
                .map_err(map_error)?;
            read_json(response)
        }
    }

    fn read_json<T: DeserializeOwned>(response: ureq::Response) -> Result<T, RemoteError> {
        let text = response
            .into_string()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Ok(serde_json::from_str(&text)?)
    }

    fn map_error(error: ureq::Error) -> RemoteError {
        match error {
            ureq::Error::Status(status, response) => RemoteError::Status {
                status,
                message: response.into_string().unwrap_or_default(),
            },
            other => RemoteError::Transport(other.to_string()),
        }
    }

    fn ensure_success(status: &str) -> Result<(), RemoteError> {
        if status == "success" {
            Ok(())
        } else {
            Err(RemoteError::Rejected(status.to_string()))
        }
    }

    impl RemoteStore for HttpRemoteStore {
        fn list_characters(&self) -> Result<Vec<String>, RemoteError> {
            self.get("/api/map/characters")
        }

        fn list_assets(&self) -> Result<BTreeMap<String, Vec<String>>, RemoteError> {
            self.get("/api/map/assets")
        }

        fn list_remote_scenes(&self) -> Result<Vec<RemoteScene>, RemoteError> {
            self.get("/api/map/drive-list")
        }

        fn import_scene(&self, remote_id: &str) -> Result<ImportedScene, RemoteError> {
            let body = serde_json::json!({ "metadata_id": remote_id });
            let mut imported: ImportedScene = self.post("/api/map/import-drive", &body)?;
            ensure_success(&imported.status)?;
            // The server reuses file names, so bust any cached copy.
            let millis = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or_default();
            imported.local_path = format!("{}?t={millis}", self.resolve(&imported.local_path));
            Ok(imported)
        }

        fn save_scene_image(&self, request: &SaveSceneRequest) -> Result<SavedScene, RemoteError> {
            let saved: SavedScene = self.post("/api/map/save", request)?;
            ensure_success(&saved.status)?;
            log::info!("scene saved to {}", saved.path);
            Ok(saved)
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_request_shape() {
        let request = SaveSceneRequest::from_png(&[0x89, 0x50], 42.0, 1_700_000_000_000);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["filename"], "Map_1700000000000");
        assert_eq!(json["metadata"]["pixelsPerMeter"], 42.0);
        assert!(json["image"].as_str().unwrap().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_import_reply_parses() {
        let reply = r#"{
            "status": "success",
            "local_path": "/data/maps/Cave.png",
            "metadata": {"pixelsPerMeter": 64, "type": "MAP"}
        }"#;
        let imported: ImportedScene = serde_json::from_str(reply).unwrap();
        assert_eq!(imported.metadata.pixels_per_meter, Some(64.0));

        let scenes: Vec<RemoteScene> =
            serde_json::from_str(r#"[{"name": "Cave", "metadata_id": "abc"}]"#).unwrap();
        assert_eq!(scenes[0].remote_id, "abc");
    }
}
