//! Tool state machine.
//!
//! Pointer input is routed through [`dispatch`], an explicit table from
//! `(mode, event kind)` to a [`Handler`]. The session executes the handler
//! against the scene, viewport and selection.

mod brush;
mod calibrate;
mod pan;

pub use brush::{BRUSH_TENSION, BrushTool};
pub use calibrate::{CalibrationOutcome, CalibrationTool, MIN_CALIBRATION_PX};
pub use pan::PanTool;

use crate::input::PointerEventKind;
use crate::session::Role;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolMode {
    #[default]
    Select,
    Pan,
    ScaleCalibrate,
    Brush,
}

impl ToolMode {
    pub const ALL: [ToolMode; 4] = [
        ToolMode::Select,
        ToolMode::Pan,
        ToolMode::ScaleCalibrate,
        ToolMode::Brush,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolMode::Select => "select",
            ToolMode::Pan => "pan",
            ToolMode::ScaleCalibrate => "scale_calibrate",
            ToolMode::Brush => "brush",
        }
    }

    /// The stage itself follows pointer drags.
    pub fn stage_draggable(self) -> bool {
        self == ToolMode::Pan
    }

    /// Token and object nodes can be dragged.
    pub fn nodes_draggable(self) -> bool {
        self == ToolMode::Select
    }

    /// Mode a session of this role starts in.
    pub fn initial(role: Role) -> Self {
        match role {
            Role::Admin => ToolMode::Select,
            Role::Guest => ToolMode::Pan,
        }
    }
}

impl fmt::Display for ToolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors from tool switching.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ToolError {
    #[error("read-only session cannot switch to {0}")]
    ReadOnly(ToolMode),
}

/// Every action a pointer event can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handler {
    SelectPress,
    SelectDrag,
    SelectRelease,
    PanGrab,
    PanDrag,
    PanRelease,
    CalibrationBegin,
    CalibrationResize,
    CalibrationFinish,
    StrokeBegin,
    StrokeExtend,
    StrokeFinish,
}

/// Route a pointer event kind in a given mode to its handler.
pub const fn dispatch(mode: ToolMode, kind: PointerEventKind) -> Handler {
    use PointerEventKind::{Down, Move, Up};
    match (mode, kind) {
        (ToolMode::Select, Down) => Handler::SelectPress,
        (ToolMode::Select, Move) => Handler::SelectDrag,
        (ToolMode::Select, Up) => Handler::SelectRelease,
        (ToolMode::Pan, Down) => Handler::PanGrab,
        (ToolMode::Pan, Move) => Handler::PanDrag,
        (ToolMode::Pan, Up) => Handler::PanRelease,
        (ToolMode::ScaleCalibrate, Down) => Handler::CalibrationBegin,
        (ToolMode::ScaleCalibrate, Move) => Handler::CalibrationResize,
        (ToolMode::ScaleCalibrate, Up) => Handler::CalibrationFinish,
        (ToolMode::Brush, Down) => Handler::StrokeBegin,
        (ToolMode::Brush, Move) => Handler::StrokeExtend,
        (ToolMode::Brush, Up) => Handler::StrokeFinish,
    }
}

/// A completed mode change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ToolMode,
    pub to: ToolMode,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Manages the current mode and per-tool interaction state.
#[derive(Debug, Clone)]
pub struct ToolMachine {
    role: Role,
    mode: ToolMode,
    pub brush: BrushTool,
    pub calibration: CalibrationTool,
    pub pan: PanTool,
}

impl ToolMachine {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            mode: ToolMode::initial(role),
            brush: BrushTool::default(),
            calibration: CalibrationTool::default(),
            pan: PanTool::default(),
        }
    }

    pub fn mode(&self) -> ToolMode {
        self.mode
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Switch modes. Guests may only be in `pan`.
    ///
    /// Leaving a mode's in-progress state is the caller's job; see
    /// [`Transition::from`].
    pub fn transition(&mut self, to: ToolMode) -> Result<Transition, ToolError> {
        if self.role == Role::Guest && to != ToolMode::Pan {
            return Err(ToolError::ReadOnly(to));
        }
        let from = self.mode;
        self.mode = to;
        if from != to {
            log::debug!("tool {from} -> {to}");
        }
        Ok(Transition { from, to })
    }

    /// Handler for a pointer event kind in the current mode.
    pub fn dispatch(&self, kind: PointerEventKind) -> Handler {
        dispatch(self.mode, kind)
    }

    /// Whether any tool is mid-interaction.
    pub fn is_interacting(&self) -> bool {
        self.brush.is_active() || self.calibration.is_active() || self.pan.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_initial_modes() {
        assert_eq!(ToolMachine::new(Role::Admin).mode(), ToolMode::Select);
        assert_eq!(ToolMachine::new(Role::Guest).mode(), ToolMode::Pan);
    }

    #[test]
    fn test_guest_is_read_only() {
        let mut tools = ToolMachine::new(Role::Guest);
        for mode in [ToolMode::Select, ToolMode::Brush, ToolMode::ScaleCalibrate] {
            assert_eq!(tools.transition(mode), Err(ToolError::ReadOnly(mode)));
            assert_eq!(tools.mode(), ToolMode::Pan);
        }
        assert!(tools.transition(ToolMode::Pan).is_ok());
    }

    #[test]
    fn test_admin_transitions_directly() {
        let mut tools = ToolMachine::new(Role::Admin);
        for to in ToolMode::ALL {
            let from = tools.mode();
            let transition = tools.transition(to).unwrap();
            assert_eq!(transition.from, from);
            assert_eq!(tools.mode(), to);
        }
    }

    #[test]
    fn test_dispatch_table_is_total_and_injective() {
        let mut seen = HashSet::new();
        for mode in ToolMode::ALL {
            for kind in PointerEventKind::ALL {
                assert!(seen.insert(dispatch(mode, kind)));
            }
        }
        assert_eq!(seen.len(), 12);
    }

    #[test]
    fn test_mode_side_effects() {
        assert!(ToolMode::Pan.stage_draggable());
        assert!(!ToolMode::Pan.nodes_draggable());
        assert!(ToolMode::Select.nodes_draggable());
        assert!(!ToolMode::Brush.nodes_draggable());
        assert!(!ToolMode::ScaleCalibrate.stage_draggable());
    }
}
