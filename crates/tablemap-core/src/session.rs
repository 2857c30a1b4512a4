//! The editor session: one user's view of the shared map.
//!
//! [`EditorSession`] owns the scene, viewport, selection, tools and sync
//! engine, and executes pointer handlers chosen by the dispatch table. Hosts
//! feed it input events and clock ticks, load the images it asks for, and
//! repaint the layers it reports as dirty.

use crate::config::{ConfigError, EditorConfig};
use crate::grid::GridRenderer;
use crate::input::{KeyEvent, KeyFocus, PointerEvent};
use crate::placement::{self, DropEvent, DropPayload, PlacementError};
use crate::remote::{RemoteError, RemoteStore, SaveSceneRequest, SceneMetadata};
use crate::scene::{Image, ImageSource, LayerKind, Node, NodeId, Scene, SerializableColor};
use crate::selection::{ManipulationEnd, SelectionController};
use crate::sync::{
    Calibration, ConnectionState, Instant, MergeReport, SceneSnapshot, SyncEngine, SyncError,
    SyncTransport, merge_snapshot,
};
use crate::tools::{CalibrationOutcome, Handler, ToolError, ToolMachine, ToolMode, Transition};
use crate::viewport::{Viewport, ZoomDirection};
use kurbo::Size;
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// Label used for ad-hoc tokens created without a name.
const ADHOC_DEFAULT_NAME: &str = "M";

/// Fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Edits the map and pushes it.
    Admin,
    /// Read-only; polls the admin's map.
    Guest,
}

impl Role {
    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}

/// Session-scoped editor settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    /// Scene units per grid cell.
    pub cell_size: f64,
    pub grid_enabled: bool,
    pub brush_color: SerializableColor,
    pub brush_width: f64,
    pub current_layer: LayerKind,
}

/// A committed change that should reach guests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mutation {
    DragEnd(NodeId),
    TransformEnd(NodeId),
    NodeAdded(NodeId),
    NodeRemoved(NodeId),
    BackgroundReplaced,
    Calibrated { cell_size: f64 },
    GridToggled,
}

/// An image the host should load and report back on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub node: NodeId,
    pub source: ImageSource,
}

/// What a drop did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// A token or asset node was added.
    Placed(NodeId),
    /// The background was replaced.
    BackgroundReplaced(NodeId),
    /// The host should import this remote scene via [`EditorSession::import_remote_scene`].
    ImportRequested { remote_id: String },
    /// Drops are ignored in read-only sessions.
    Ignored,
}

#[derive(Debug, Clone)]
struct PendingBackground {
    image: Image,
    cell_size: Option<f64>,
}

/// Scene with export-only layers hidden. Visibility is restored on drop.
pub struct ExportView<'a> {
    scene: &'a mut Scene,
    restore: Vec<(LayerKind, bool)>,
}

impl Deref for ExportView<'_> {
    type Target = Scene;

    fn deref(&self) -> &Scene {
        &*self.scene
    }
}

impl Drop for ExportView<'_> {
    fn drop(&mut self) {
        for &(kind, visible) in &self.restore {
            self.scene.set_layer_visible(kind, visible);
        }
    }
}

/// One user's editing session.
pub struct EditorSession {
    config: EditorConfig,
    state: AppState,
    viewport: Viewport,
    grid: GridRenderer,
    scene: Scene,
    selection: SelectionController,
    tools: ToolMachine,
    pending_background: Option<PendingBackground>,
    image_requests: Vec<ImageRequest>,
    outbox: Vec<Mutation>,
    sync: Option<SyncEngine>,
}

impl EditorSession {
    pub fn new(role: Role, config: EditorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let state = AppState {
            cell_size: config.cell_size,
            grid_enabled: true,
            brush_color: config.brush_color()?,
            brush_width: config.brush_width,
            current_layer: LayerKind::Tokens,
        };
        let mut session = Self {
            viewport: Viewport::new(config.viewport).with_zoom_step(config.zoom_step),
            grid: GridRenderer::new(config.cell_size),
            scene: Scene::new(),
            selection: SelectionController::new(),
            tools: ToolMachine::new(role),
            pending_background: None,
            image_requests: Vec::new(),
            outbox: Vec::new(),
            sync: None,
            config,
            state,
        };
        session.refresh_grid();
        log::info!("{role:?} session started in {} mode", session.mode());
        Ok(session)
    }

    pub fn role(&self) -> Role {
        self.tools.role()
    }

    pub fn mode(&self) -> ToolMode {
        self.tools.mode()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selection.selected()
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn sync_engine(&self) -> Option<&SyncEngine> {
        self.sync.as_ref()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.sync
            .as_ref()
            .map_or(ConnectionState::Unknown, SyncEngine::connection_state)
    }

    /// Switch tools, dropping any half-finished interaction of the old one.
    pub fn set_tool(&mut self, mode: ToolMode) -> Result<Transition, ToolError> {
        let transition = self.tools.transition(mode)?;
        if transition.changed() {
            match transition.from {
                ToolMode::Brush => {
                    self.tools.brush.discard(&mut self.scene);
                }
                ToolMode::ScaleCalibrate => self.tools.calibration.cancel(&mut self.scene),
                ToolMode::Pan => {
                    self.tools.pan.release();
                }
                ToolMode::Select => {}
            }
        }
        if mode != ToolMode::Select {
            self.selection.clear(&mut self.scene);
        }
        self.apply_draggable();
        Ok(transition)
    }

    /// Route a pointer event through the current tool.
    pub fn handle_pointer(&mut self, event: &PointerEvent) {
        if let PointerEvent::Wheel { position, delta } = *event {
            self.viewport
                .zoom_at(position, ZoomDirection::from_wheel(delta.y));
            self.after_viewport_change();
            return;
        }
        let Some(kind) = event.kind() else {
            return;
        };
        let screen = event.position();
        let point = self.viewport.to_scene(screen);
        let scale = self.viewport.scale();

        match self.tools.dispatch(kind) {
            Handler::SelectPress => {
                self.selection.press(&mut self.scene, point, scale);
            }
            Handler::SelectDrag => {
                self.selection.drag(&mut self.scene, point, scale);
            }
            Handler::SelectRelease => match self.selection.release() {
                Some(ManipulationEnd::DragEnd(id)) => self.record(Mutation::DragEnd(id)),
                Some(ManipulationEnd::TransformEnd(id)) => {
                    self.record(Mutation::TransformEnd(id))
                }
                None => {}
            },
            Handler::PanGrab => self.tools.pan.grab(screen),
            Handler::PanDrag => {
                if let Some(delta) = self.tools.pan.drag(screen) {
                    self.viewport.pan(delta);
                    self.after_viewport_change();
                }
            }
            Handler::PanRelease => {
                self.tools.pan.release();
            }
            Handler::CalibrationBegin => {
                self.tools.calibration.begin(&mut self.scene, point, scale);
            }
            Handler::CalibrationResize => {
                self.tools.calibration.resize(&mut self.scene, point);
            }
            Handler::CalibrationFinish => {
                if let CalibrationOutcome::Committed { cell_size } =
                    self.tools.calibration.finish(&mut self.scene, scale)
                {
                    self.apply_cell_size(cell_size);
                    self.record(Mutation::Calibrated { cell_size });
                    if let Err(e) = self.set_tool(ToolMode::Select) {
                        log::warn!("{e}");
                    }
                }
            }
            Handler::StrokeBegin => {
                let (color, width) = (self.state.brush_color, self.state.brush_width);
                self.tools.brush.begin(&mut self.scene, point, color, width);
            }
            Handler::StrokeExtend => {
                self.tools.brush.extend(&mut self.scene, point);
            }
            Handler::StrokeFinish => {
                self.tools.brush.finish();
            }
        }
    }

    /// Handle a key press. Returns true if it changed the scene.
    pub fn handle_key(&mut self, key: &KeyEvent) -> bool {
        if key.focus == KeyFocus::TextInput {
            return false;
        }
        if key.is_delete() {
            return self.delete_selection().is_some();
        }
        if key.is_escape() {
            let discarded = self.tools.brush.discard(&mut self.scene).is_some();
            let cancelled = self.tools.calibration.is_active();
            self.tools.calibration.cancel(&mut self.scene);
            return discarded || cancelled;
        }
        false
    }

    /// Remove the selected node, if any.
    pub fn delete_selection(&mut self) -> Option<Node> {
        if !self.role().is_admin() {
            return None;
        }
        let removed = self.selection.delete_selection(&mut self.scene)?;
        self.record(Mutation::NodeRemoved(removed.id()));
        Some(removed)
    }

    /// Place whatever was dropped at a screen position.
    pub fn handle_drop(&mut self, drop: DropEvent) -> Result<DropOutcome, PlacementError> {
        if !self.role().is_admin() {
            log::debug!("ignoring {:?} drop in read-only session", drop.payload.kind());
            return Ok(DropOutcome::Ignored);
        }
        let point = self.viewport.to_scene(drop.position);
        let outcome = match drop.payload {
            DropPayload::Token { url } => {
                let node = placement::image_token(&url, point, self.state.cell_size);
                DropOutcome::Placed(self.place(LayerKind::Tokens, node))
            }
            DropPayload::Asset { url } => {
                DropOutcome::Placed(self.place(LayerKind::Objects, placement::asset(&url, point)))
            }
            DropPayload::DriveMap { remote_id } => DropOutcome::ImportRequested { remote_id },
            DropPayload::RawFile(file) => {
                let (image, natural) = placement::background_from_file(&file)?;
                DropOutcome::BackgroundReplaced(self.install_background(image, natural, None))
            }
        };
        Ok(outcome)
    }

    /// Add a lettered token at the center of the view.
    pub fn add_adhoc_token(&mut self, name: &str) -> Option<NodeId> {
        if !self.role().is_admin() {
            return None;
        }
        let name = match name.trim() {
            "" => ADHOC_DEFAULT_NAME,
            trimmed => trimmed,
        };
        let center = self.viewport.scene_center();
        let node = placement::adhoc_token(name, center, self.state.cell_size);
        Some(self.place(LayerKind::Tokens, node))
    }

    /// Import a remote map and start loading it as the background.
    pub fn import_remote_scene(
        &mut self,
        store: &dyn RemoteStore,
        remote_id: &str,
    ) -> Result<NodeId, RemoteError> {
        let imported = store.import_scene(remote_id)?;
        log::info!("imported remote scene {remote_id} as {}", imported.local_path);
        Ok(self.load_background(ImageSource::Url(imported.local_path), Some(imported.metadata)))
    }

    /// Queue a background load. It replaces the current background once the
    /// host reports it loaded; metadata calibrates the grid at that point.
    pub fn load_background(
        &mut self,
        source: ImageSource,
        metadata: Option<SceneMetadata>,
    ) -> NodeId {
        let image = placement::background(source, None);
        let id = image.attrs.id();
        self.image_requests.push(ImageRequest {
            node: id,
            source: image.source.clone(),
        });
        let cell_size =
            metadata.map(|m| m.pixels_per_meter.unwrap_or(self.config.cell_size));
        if self.pending_background.replace(PendingBackground { image, cell_size }).is_some() {
            log::debug!("superseded pending background");
        }
        id
    }

    /// Images waiting to be loaded by the host.
    pub fn take_image_requests(&mut self) -> Vec<ImageRequest> {
        std::mem::take(&mut self.image_requests)
    }

    /// The host decoded an image. Returns false for unknown ids.
    pub fn image_loaded(&mut self, id: NodeId, natural: Size) -> bool {
        if self
            .pending_background
            .as_ref()
            .is_some_and(|pending| pending.image.attrs.id() == id)
        {
            if let Some(PendingBackground { mut image, cell_size }) = self.pending_background.take()
            {
                image.mark_ready(natural);
                self.install_background(image, natural, cell_size);
            }
            return true;
        }

        let Some(image) = self.scene.node_mut(id).and_then(Node::as_image_mut) else {
            return false;
        };
        image.mark_ready(natural);
        if let Some(kind) = self.scene.layer_of(id) {
            self.scene.request_redraw(kind);
        }
        self.refresh_overlay();
        true
    }

    /// The host could not load an image; whatever was waiting on it is dropped.
    pub fn image_failed(&mut self, id: NodeId) -> bool {
        if self
            .pending_background
            .as_ref()
            .is_some_and(|pending| pending.image.attrs.id() == id)
        {
            self.pending_background = None;
            log::warn!("background {id} failed to load");
            return true;
        }

        let Some(root) = self.scene.top_level_of(id) else {
            return false;
        };
        if self.selection.is_selected(root) {
            self.selection.clear(&mut self.scene);
        }
        self.scene.remove_node(root);
        log::warn!("image {id} failed to load, removed {root}");
        self.record(Mutation::NodeRemoved(root));
        true
    }

    /// Turn the grid on or off; the cell size is kept.
    pub fn toggle_grid(&mut self) -> bool {
        self.state.grid_enabled = !self.state.grid_enabled;
        self.grid.set_enabled(self.state.grid_enabled);
        self.refresh_grid();
        self.record(Mutation::GridToggled);
        self.state.grid_enabled
    }

    pub fn set_brush_color(&mut self, hex: &str) -> Result<(), ConfigError> {
        self.state.brush_color =
            SerializableColor::from_hex(hex).ok_or_else(|| ConfigError::Invalid {
                field: "brush_color",
                reason: format!("{hex:?} is not a hex color"),
            })?;
        Ok(())
    }

    pub fn set_layer_visible(&mut self, kind: LayerKind, visible: bool) {
        self.scene.set_layer_visible(kind, visible);
    }

    /// Resize the stage.
    pub fn resize(&mut self, size: Size) {
        self.viewport.set_size(size);
        self.refresh_grid();
    }

    /// Regenerate grid lines if the viewport or calibration changed.
    pub fn refresh_grid(&mut self) -> bool {
        let Some(geometry) = self.grid.update(&self.viewport) else {
            return false;
        };
        let nodes = geometry.to_nodes();
        self.scene.replace_layer_children(LayerKind::Grid, nodes);
        true
    }

    /// Layers that need repainting since the last call.
    pub fn take_redraws(&mut self) -> Vec<LayerKind> {
        self.scene.take_redraws()
    }

    /// Hide the grid, token and ui layers for rasterizing a save image.
    pub fn export_view(&mut self) -> ExportView<'_> {
        let hidden = [LayerKind::Grid, LayerKind::Tokens, LayerKind::Ui];
        let restore = hidden
            .iter()
            .map(|&kind| (kind, self.scene.layer(kind).visible))
            .collect();
        for kind in hidden {
            self.scene.set_layer_visible(kind, false);
        }
        ExportView {
            scene: &mut self.scene,
            restore,
        }
    }

    /// Save request for a PNG rasterized from [`Self::export_view`].
    pub fn save_request(&self, png: &[u8], unix_millis: u128) -> SaveSceneRequest {
        SaveSceneRequest::from_png(png, self.state.cell_size, unix_millis)
    }

    /// Transmitted layers plus the current calibration.
    pub fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot {
            calibration: Some(Calibration {
                cell_size: self.state.cell_size,
                grid_enabled: self.state.grid_enabled,
            }),
            ..self.scene.serialize()
        }
    }

    /// Use `transport` for this session's role.
    pub fn attach_sync(&mut self, transport: Box<dyn SyncTransport>) {
        self.sync = Some(SyncEngine::new(self.role(), transport, &self.config));
    }

    /// Attach the platform HTTP transport for the configured server.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn connect(&mut self) -> Result<(), SyncError> {
        let transport = crate::sync::HttpTransport::new(&self.config.server_url)?;
        self.attach_sync(Box::new(transport));
        Ok(())
    }

    /// Attach the platform HTTP transport for the configured server.
    #[cfg(target_arch = "wasm32")]
    pub fn connect(&mut self) -> Result<(), SyncError> {
        let transport = crate::sync::FetchTransport::new(&self.config.server_url);
        self.attach_sync(Box::new(transport));
        Ok(())
    }

    pub fn start_sync(&mut self, now: Instant) {
        if let Some(engine) = self.sync.as_mut() {
            engine.start(now);
        }
    }

    pub fn stop_sync(&mut self) {
        if let Some(engine) = self.sync.as_mut() {
            engine.stop();
        }
    }

    /// Push the current scene now instead of waiting for the quiet period.
    pub fn flush(&mut self) -> bool {
        if !self.role().is_admin() {
            return false;
        }
        let snapshot = self.snapshot();
        let Some(engine) = self.sync.as_mut() else {
            return false;
        };
        self.outbox.clear();
        engine.push(&snapshot);
        true
    }

    /// Advance sync timers. Returns what a merged remote snapshot changed.
    ///
    /// Mutations recorded since the last tick restart the push quiet period
    /// at `now`, so the push lands one quiet period after the tick that saw
    /// the last mutation. The drift is bounded by the tick period.
    pub fn tick(&mut self, now: Instant) -> Option<MergeReport> {
        let mutations = std::mem::take(&mut self.outbox);
        let engine = self.sync.as_mut()?;
        if !mutations.is_empty() {
            log::trace!("{} mutations since last tick", mutations.len());
            engine.notify_mutation(now);
        }
        if engine.push_due(now) {
            let snapshot = self.snapshot();
            if let Some(engine) = self.sync.as_mut() {
                engine.push(&snapshot);
            }
        }
        let incoming = self.sync.as_mut().and_then(|engine| {
            engine.poll(now);
            engine.receive()
        })?;
        Some(self.apply_remote(incoming))
    }

    /// Merge a snapshot from the admin into this scene.
    pub fn apply_remote(&mut self, snapshot: SceneSnapshot) -> MergeReport {
        let calibration = snapshot.calibration;
        let report = merge_snapshot(&mut self.scene, snapshot);
        if let Some(Calibration {
            cell_size,
            grid_enabled,
        }) = calibration
        {
            self.state.cell_size = cell_size;
            self.state.grid_enabled = grid_enabled;
            self.grid.set_cell_size(cell_size);
            self.grid.set_enabled(grid_enabled);
        }
        if self
            .selection
            .selected()
            .is_some_and(|id| !self.scene.contains(id))
        {
            self.selection.clear(&mut self.scene);
        }
        self.apply_draggable();
        for &kind in &report.replaced {
            for node in &self.scene.layer(kind).children {
                queue_pending_images(node, &mut self.image_requests);
            }
        }
        log::info!(
            "merged {} layers, {} local nodes replaced",
            report.replaced.len(),
            report.destroyed
        );
        report
    }

    fn place(&mut self, kind: LayerKind, mut node: Node) -> NodeId {
        node.attrs_mut().draggable = self.mode().nodes_draggable();
        queue_pending_images(&node, &mut self.image_requests);
        let id = self.scene.add_node(kind, node);
        self.record(Mutation::NodeAdded(id));
        id
    }

    fn install_background(
        &mut self,
        image: Image,
        natural: Size,
        cell_size: Option<f64>,
    ) -> NodeId {
        let id = image.attrs.id();
        self.scene
            .replace_layer_children(LayerKind::Background, vec![image.into()]);
        if let Some(cell_size) = cell_size {
            self.apply_cell_size(cell_size);
        }
        let scale = self.viewport.fit_image(natural);
        log::info!(
            "background {}x{} installed at scale {scale:.3}",
            natural.width,
            natural.height
        );
        self.after_viewport_change();
        self.record(Mutation::BackgroundReplaced);
        id
    }

    fn apply_cell_size(&mut self, cell_size: f64) {
        self.grid.set_cell_size(cell_size);
        self.state.cell_size = self.grid.cell_size();
        self.refresh_grid();
    }

    /// Selectable nodes follow the current mode's drag permission.
    fn apply_draggable(&mut self) {
        let draggable = self.mode().nodes_draggable();
        for kind in [LayerKind::Objects, LayerKind::Tokens] {
            self.scene.for_each_mut(kind, |node| {
                if node.is_selectable() {
                    node.attrs_mut().draggable = draggable;
                }
            });
        }
    }

    fn after_viewport_change(&mut self) {
        self.refresh_grid();
        self.refresh_overlay();
    }

    fn refresh_overlay(&mut self) {
        if self.selection.selected().is_some() {
            self.selection
                .refresh(&mut self.scene, self.viewport.scale());
        }
    }

    fn record(&mut self, mutation: Mutation) {
        if self.role().is_admin() {
            log::debug!("mutation: {mutation:?}");
            self.outbox.push(mutation);
        }
    }
}

fn queue_pending_images(node: &Node, out: &mut Vec<ImageRequest>) {
    node.visit(&mut |n| {
        if let Some(image) = n.as_image().filter(|image| !image.is_ready()) {
            out.push(ImageRequest {
                node: image.attrs.id(),
                source: image.source.clone(),
            });
        }
    });
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("role", &self.role())
            .field("mode", &self.mode())
            .field("state", &self.state)
            .field("viewport", &self.viewport)
            .field("selected", &self.selection.selected())
            .field("syncing", &self.sync.as_ref().is_some_and(SyncEngine::is_running))
            .finish()
    }
}
