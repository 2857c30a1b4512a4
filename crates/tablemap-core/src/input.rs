//! Pointer and keyboard events delivered by the host.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Pointer event in screen coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down {
        position: Point,
        button: MouseButton,
    },
    Up {
        position: Point,
        button: MouseButton,
    },
    Move {
        position: Point,
    },
    Wheel {
        position: Point,
        delta: Vec2,
    },
}

/// Pointer event kinds routed through the tool dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerEventKind {
    Down,
    Move,
    Up,
}

impl PointerEventKind {
    pub const ALL: [PointerEventKind; 3] = [
        PointerEventKind::Down,
        PointerEventKind::Move,
        PointerEventKind::Up,
    ];
}

impl PointerEvent {
    pub fn position(&self) -> Point {
        match self {
            PointerEvent::Down { position, .. }
            | PointerEvent::Up { position, .. }
            | PointerEvent::Move { position }
            | PointerEvent::Wheel { position, .. } => *position,
        }
    }

    /// Kind for tool dispatch; `None` for wheel events and non-primary buttons.
    pub fn kind(&self) -> Option<PointerEventKind> {
        match self {
            PointerEvent::Down { button: MouseButton::Left, .. } => Some(PointerEventKind::Down),
            PointerEvent::Up { button: MouseButton::Left, .. } => Some(PointerEventKind::Up),
            PointerEvent::Move { .. } => Some(PointerEventKind::Move),
            _ => None,
        }
    }
}

/// Where keyboard focus sits when a key is pressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyFocus {
    #[default]
    Stage,
    /// A text field in the surrounding UI.
    TextInput,
}

/// Keyboard event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Key name as reported by the platform (`"Delete"`, `"Escape"`, ...).
    pub key: String,
    #[serde(default)]
    pub focus: KeyFocus,
}

impl KeyEvent {
    pub fn pressed(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            focus: KeyFocus::Stage,
        }
    }

    pub fn in_text_input(mut self) -> Self {
        self.focus = KeyFocus::TextInput;
        self
    }

    pub fn is_delete(&self) -> bool {
        matches!(self.key.as_str(), "Delete" | "Backspace")
    }

    pub fn is_escape(&self) -> bool {
        self.key == "Escape"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_primary_button_dispatches() {
        let down = PointerEvent::Down {
            position: Point::new(1.0, 2.0),
            button: MouseButton::Left,
        };
        assert_eq!(down.kind(), Some(PointerEventKind::Down));
        assert_eq!(down.position(), Point::new(1.0, 2.0));

        let right = PointerEvent::Down {
            position: Point::ZERO,
            button: MouseButton::Right,
        };
        assert_eq!(right.kind(), None);

        let wheel = PointerEvent::Wheel {
            position: Point::ZERO,
            delta: Vec2::new(0.0, -1.0),
        };
        assert_eq!(wheel.kind(), None);
    }

    #[test]
    fn test_delete_keys() {
        assert!(KeyEvent::pressed("Backspace").is_delete());
        assert!(KeyEvent::pressed("Delete").is_delete());
        assert!(!KeyEvent::pressed("d").is_delete());
        assert!(KeyEvent::pressed("Escape").is_escape());
    }
}
