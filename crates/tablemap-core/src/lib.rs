//! Tablemap Core Library
//!
//! Platform-agnostic scene graph, tools and admin-to-guest sync for the
//! tabletop map editor.

pub mod config;
pub mod grid;
pub mod input;
pub mod placement;
pub mod remote;
pub mod scene;
pub mod selection;
pub mod session;
pub mod sync;
pub mod tools;
pub mod viewport;

pub use config::{ConfigError, EditorConfig};
pub use grid::{DEFAULT_CELL_SIZE, GridGeometry, GridRenderer};
pub use input::{KeyEvent, KeyFocus, MouseButton, PointerEvent, PointerEventKind};
pub use placement::{DropEvent, DropKind, DropPayload, DroppedFile, PlacementError};
pub use remote::{RemoteError, RemoteScene, RemoteStore, SaveSceneRequest, SceneMetadata};
pub use scene::{LayerKind, Node, NodeId, Scene, Tag};
pub use selection::{ManipulationEnd, SelectionController};
pub use session::{AppState, DropOutcome, EditorSession, ImageRequest, Mutation, Role};
pub use sync::{ConnectionState, PlatformTransport, SceneSnapshot, SyncEngine, SyncError};
pub use tools::{Handler, ToolError, ToolMachine, ToolMode};
pub use viewport::Viewport;
