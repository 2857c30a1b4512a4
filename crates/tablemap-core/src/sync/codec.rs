//! Snapshot payload and the layer merge applied by guests.

use crate::scene::{Layer, LayerKind, Scene};
use serde::{Deserialize, Serialize};

/// Grid calibration carried alongside the layers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub cell_size: f64,
    pub grid_enabled: bool,
}

/// Serialized scene as pushed by the admin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneSnapshot {
    #[serde(default)]
    pub layers: Vec<Layer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration: Option<Calibration>,
}

impl SceneSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn layer(&self, kind: LayerKind) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.kind == kind)
    }

    /// Number of nodes across all carried layers.
    pub fn node_count(&self) -> usize {
        self.layers.iter().map(Layer::node_count).sum()
    }
}

/// What a merge changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    /// Layers that were repopulated, in merge order.
    pub replaced: Vec<LayerKind>,
    /// Local nodes destroyed, descendants included.
    pub destroyed: usize,
}

/// Replace the children of each transmitted layer with the snapshot's.
///
/// Layers run in fixed order (background, grid, objects, tokens). A layer the
/// snapshot lacks is left alone; untransmitted layers are never touched.
pub fn merge_snapshot(scene: &mut Scene, snapshot: SceneSnapshot) -> MergeReport {
    let mut incoming = snapshot.layers;
    let mut report = MergeReport::default();
    for kind in LayerKind::TRANSMITTED {
        let Some(index) = incoming.iter().position(|layer| layer.kind == kind) else {
            continue;
        };
        let remote = incoming.swap_remove(index);
        let old = scene.replace_layer_children(kind, remote.children);
        report.destroyed += old.iter().map(|n| n.subtree_len()).sum::<usize>();
        report.replaced.push(kind);
    }
    report
}

/// Structural equality of two layers, ignoring node identities and load state.
pub fn layers_equivalent(a: &Layer, b: &Layer) -> bool {
    match (serde_json::to_value(a), serde_json::to_value(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement;
    use kurbo::Point;

    fn populated_scene() -> Scene {
        let mut scene = Scene::new();
        scene.add_node(
            LayerKind::Tokens,
            placement::image_token("/t.png", Point::new(10.0, 10.0), 50.0),
        );
        scene.add_node(
            LayerKind::Objects,
            placement::asset("/static/img/assets/tree.png", Point::new(80.0, 40.0)),
        );
        scene
    }

    #[test]
    fn test_merge_into_identical_graph_is_equivalent() {
        let scene = populated_scene();
        let mut guest = populated_scene();
        let snapshot = SceneSnapshot::from_json(&scene.serialize().to_json().unwrap()).unwrap();
        merge_snapshot(&mut guest, snapshot);
        for kind in LayerKind::TRANSMITTED {
            assert!(layers_equivalent(scene.layer(kind), guest.layer(kind)), "{kind:?}");
        }
    }

    #[test]
    fn test_merge_order_and_redraws() {
        let admin = populated_scene();
        let mut guest = Scene::new();
        guest.take_redraws();
        let report = merge_snapshot(&mut guest, admin.serialize());
        assert_eq!(report.replaced, LayerKind::TRANSMITTED.to_vec());
        assert_eq!(guest.take_redraws(), LayerKind::TRANSMITTED.to_vec());
        assert_eq!(guest.layer(LayerKind::Tokens).node_count(), 4);
    }

    #[test]
    fn test_merge_destroys_local_children_and_keeps_ui() {
        let mut guest = populated_scene();
        let ui_marker = guest.add_node(
            LayerKind::Ui,
            crate::scene::Rectangle::new(Default::default(), 1.0, 1.0).into(),
        );
        let report = merge_snapshot(&mut guest, Scene::new().serialize());
        assert_eq!(report.destroyed, 5);
        assert_eq!(guest.layer(LayerKind::Tokens).node_count(), 0);
        assert!(guest.contains(ui_marker));
    }

    #[test]
    fn test_missing_layers_are_left_alone() {
        let mut guest = populated_scene();
        let snapshot = SceneSnapshot {
            layers: vec![Layer::new(LayerKind::Grid)],
            calibration: None,
        };
        let report = merge_snapshot(&mut guest, snapshot);
        assert_eq!(report.replaced, vec![LayerKind::Grid]);
        assert_eq!(guest.layer(LayerKind::Tokens).node_count(), 4);
    }

    #[test]
    fn test_fresh_identities_after_merge() {
        let admin = populated_scene();
        let admin_ids = admin.find_by_tag(crate::scene::Tag::Token);
        let mut guest = Scene::new();
        let json = admin.serialize().to_json().unwrap();
        merge_snapshot(&mut guest, SceneSnapshot::from_json(&json).unwrap());
        let guest_ids = guest.find_by_tag(crate::scene::Tag::Token);
        assert_eq!(guest_ids.len(), 1);
        assert_ne!(admin_ids, guest_ids);
    }
}
