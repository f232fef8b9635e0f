//! Input events delivered by the host and the pointer/modifier state derived from them.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

/// Host platform, which decides the primary shortcut modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Platform {
    Mac,
    #[default]
    Other,
}

impl Platform {
    /// The platform of the running binary.
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::Mac
        } else {
            Platform::Other
        }
    }

    /// Display name of the primary modifier ("Cmd" or "Ctrl").
    pub fn primary_label(self) -> &'static str {
        match self {
            Platform::Mac => "Cmd",
            Platform::Other => "Ctrl",
        }
    }
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub const ALT: Modifiers = Modifiers {
        alt: true,
        ..Modifiers::NONE
    };

    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ..Modifiers::NONE
    };

    /// The primary shortcut modifier for `platform` (Cmd on Mac, Ctrl elsewhere).
    pub fn primary(platform: Platform) -> Self {
        match platform {
            Platform::Mac => Modifiers {
                meta: true,
                ..Modifiers::NONE
            },
            Platform::Other => Modifiers {
                ctrl: true,
                ..Modifiers::NONE
            },
        }
    }

    /// Whether the primary modifier is held.
    pub fn has_primary(&self, platform: Platform) -> bool {
        match platform {
            Platform::Mac => self.meta,
            Platform::Other => self.ctrl,
        }
    }

    /// Whether the clone-on-drag modifier (Alt/Option) is held.
    pub fn clone_drag(&self) -> bool {
        self.alt
    }

    pub fn is_empty(&self) -> bool {
        *self == Modifiers::NONE
    }
}

/// A logical key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// A printable character, lowercased for letters.
    Char(char),
    Escape,
    Delete,
    Backspace,
    Enter,
    Tab,
    /// Any other named key.
    Named(String),
}

impl Key {
    /// Parse a key name as hosts report it ("Escape", "Delete", "a", "0", "=").
    pub fn from_name(name: &str) -> Self {
        match name {
            "Escape" | "Esc" => Key::Escape,
            "Delete" | "Del" => Key::Delete,
            "Backspace" => Key::Backspace,
            "Enter" | "Return" => Key::Enter,
            "Tab" => Key::Tab,
            _ => {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Char(c.to_ascii_lowercase()),
                    _ => Key::Named(name.to_string()),
                }
            }
        }
    }

    /// Whether this key deletes the selection.
    pub fn is_delete(&self) -> bool {
        matches!(self, Key::Delete | Key::Backspace)
    }
}

/// An event delivered to the editor. Positions are in screen coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    PointerDown {
        position: Point,
        #[serde(default)]
        button: MouseButton,
        #[serde(default)]
        modifiers: Modifiers,
    },
    PointerMove {
        position: Point,
        #[serde(default)]
        modifiers: Modifiers,
    },
    PointerUp {
        position: Point,
        #[serde(default)]
        button: MouseButton,
        #[serde(default)]
        modifiers: Modifiers,
    },
    DoubleClick {
        position: Point,
    },
    KeyDown {
        key: Key,
        #[serde(default)]
        modifiers: Modifiers,
    },
    KeyUp {
        key: Key,
        #[serde(default)]
        modifiers: Modifiers,
    },
    Wheel {
        position: Point,
        delta: Vec2,
        #[serde(default)]
        modifiers: Modifiers,
    },
}

impl InputEvent {
    /// Modifiers reported with the event, if it carries any.
    pub fn modifiers(&self) -> Option<Modifiers> {
        match self {
            InputEvent::PointerDown { modifiers, .. }
            | InputEvent::PointerMove { modifiers, .. }
            | InputEvent::PointerUp { modifiers, .. }
            | InputEvent::KeyDown { modifiers, .. }
            | InputEvent::KeyUp { modifiers, .. }
            | InputEvent::Wheel { modifiers, .. } => Some(*modifiers),
            InputEvent::DoubleClick { .. } => None,
        }
    }

    /// Pointer position carried by the event, if any.
    pub fn position(&self) -> Option<Point> {
        match self {
            InputEvent::PointerDown { position, .. }
            | InputEvent::PointerMove { position, .. }
            | InputEvent::PointerUp { position, .. }
            | InputEvent::DoubleClick { position }
            | InputEvent::Wheel { position, .. } => Some(*position),
            InputEvent::KeyDown { .. } | InputEvent::KeyUp { .. } => None,
        }
    }
}

/// Pointer and modifier state accumulated from [`InputEvent`]s.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    /// Current pointer position in screen coordinates.
    pub pointer_position: Point,
    /// Previous pointer position for delta calculations.
    pub previous_pointer_position: Point,
    /// Currently pressed mouse buttons.
    pressed_buttons: HashSet<MouseButton>,
    /// Current modifier keys state.
    pub modifiers: Modifiers,
}

impl InputState {
    /// Create a new input state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold an event into the state.
    pub fn handle(&mut self, event: &InputEvent) {
        if let Some(modifiers) = event.modifiers() {
            self.modifiers = modifiers;
        }
        if let Some(position) = event.position() {
            self.previous_pointer_position = self.pointer_position;
            self.pointer_position = position;
        }
        match event {
            InputEvent::PointerDown { button, .. } => {
                self.pressed_buttons.insert(*button);
            }
            InputEvent::PointerUp { button, .. } => {
                self.pressed_buttons.remove(button);
            }
            _ => {}
        }
    }

    /// Check if a button is currently pressed.
    pub fn is_button_pressed(&self, button: MouseButton) -> bool {
        self.pressed_buttons.contains(&button)
    }

    /// Get the pointer movement delta since the previous positioned event.
    pub fn pointer_delta(&self) -> Vec2 {
        self.pointer_position - self.previous_pointer_position
    }
}
