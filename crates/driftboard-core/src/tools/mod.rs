//! Tool system for the whiteboard.

use crate::selection::{Marquee, MultiMoveState};
use crate::shapes::{BoxShape, Connector, Embed, Endpoint, Shape, ShapeId, ShapeStyle};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ToolKind {
    #[default]
    Select,
    Box,
    Connector,
    Embed,
    Pan,
    Text,
}

impl ToolKind {
    pub const ALL: [ToolKind; 6] = [
        ToolKind::Select,
        ToolKind::Box,
        ToolKind::Connector,
        ToolKind::Embed,
        ToolKind::Pan,
        ToolKind::Text,
    ];

    /// Single-key shortcut that activates the tool.
    pub fn shortcut(self) -> char {
        match self {
            ToolKind::Select => 'v',
            ToolKind::Box => 'r',
            ToolKind::Connector => 'c',
            ToolKind::Embed => 'e',
            ToolKind::Pan => 'h',
            ToolKind::Text => 't',
        }
    }

    /// Tool bound to a shortcut key, if any.
    pub fn from_shortcut(key: char) -> Option<Self> {
        let key = key.to_ascii_lowercase();
        Self::ALL.into_iter().find(|tool| tool.shortcut() == key)
    }

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::Select => "Select",
            ToolKind::Box => "Box",
            ToolKind::Connector => "Connector",
            ToolKind::Embed => "Embed",
            ToolKind::Pan => "Pan",
            ToolKind::Text => "Text",
        }
    }

    /// Whether press-drag-release with this tool draws a new shape.
    pub fn draws(self) -> bool {
        matches!(self, ToolKind::Box | ToolKind::Connector | ToolKind::Embed)
    }
}

/// State of the current pointer gesture.
#[derive(Debug, Clone, Default)]
pub enum GestureState {
    /// Waiting for interaction.
    #[default]
    Idle,
    /// Drawing a new shape; points are in world coordinates.
    Drawing {
        start: Point,
        current: Point,
        /// Shape under the pointer when a connector was started.
        start_target: Option<ShapeId>,
    },
    /// Moving (or clone-dragging) the selection.
    Moving(MultiMoveState),
    /// Rubber-band selection.
    Marquee(Marquee),
    /// Panning the view by the pointer's screen movement.
    Panning,
}

/// A finished drawing gesture, ready to become a shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawnGesture {
    pub tool: ToolKind,
    pub start: Point,
    pub end: Point,
    pub start_target: Option<ShapeId>,
}

impl DrawnGesture {
    /// The rectangle spanned by the gesture.
    pub fn rect(&self) -> Rect {
        Rect::from_points(self.start, self.end)
    }
}

/// Manages the current tool and its gesture state.
#[derive(Debug, Clone, Default)]
pub struct ToolManager {
    /// Currently selected tool.
    pub current_tool: ToolKind,
    /// Current gesture.
    pub state: GestureState,
    /// Current style to apply to new shapes.
    pub current_style: ShapeStyle,
    /// Corner radius for new boxes (0 = sharp corners).
    pub corner_radius: f64,
}

impl ToolManager {
    /// Create a new tool manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the current tool, abandoning any gesture.
    pub fn set_tool(&mut self, tool: ToolKind) {
        self.current_tool = tool;
        self.state = GestureState::Idle;
    }

    /// Begin a drawing gesture.
    pub fn begin(&mut self, point: Point, start_target: Option<ShapeId>) {
        self.state = GestureState::Drawing {
            start: point,
            current: point,
            start_target,
        };
    }

    /// Update the drawing gesture with a new pointer position.
    pub fn update(&mut self, point: Point) {
        if let GestureState::Drawing { current, .. } = &mut self.state {
            *current = point;
        }
    }

    /// End the drawing gesture, returning it if one was in progress.
    pub fn end(&mut self, point: Point) -> Option<DrawnGesture> {
        match std::mem::take(&mut self.state) {
            GestureState::Drawing {
                start, start_target, ..
            } => Some(DrawnGesture {
                tool: self.current_tool,
                start,
                end: point,
                start_target,
            }),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Abandon the current gesture without committing.
    pub fn cancel(&mut self) -> GestureState {
        std::mem::take(&mut self.state)
    }

    /// Check if a gesture is in progress.
    pub fn is_active(&self) -> bool {
        !matches!(self.state, GestureState::Idle)
    }

    /// Shape to draw as a preview of the current drawing gesture.
    pub fn preview_shape(&self) -> Option<Shape> {
        let GestureState::Drawing { start, current, .. } = self.state else {
            return None;
        };
        let mut shape = match self.current_tool {
            ToolKind::Box => {
                let mut b = BoxShape::from_corners(start, current);
                b.corner_radius = self.corner_radius;
                Shape::Box(b)
            }
            ToolKind::Connector => {
                Shape::Connector(Connector::new(Endpoint::Free(start), Endpoint::Free(current)))
            }
            ToolKind::Embed => Shape::Embed(Embed::in_frame(Rect::from_points(start, current), "")),
            _ => return None,
        };
        if !matches!(shape, Shape::Connector(_)) {
            *shape.style_mut() = self.current_style.clone();
        }
        Some(shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::ShapeKind;

    #[test]
    fn test_shortcuts() {
        assert_eq!(ToolKind::from_shortcut('r'), Some(ToolKind::Box));
        assert_eq!(ToolKind::from_shortcut('C'), Some(ToolKind::Connector));
        assert_eq!(ToolKind::from_shortcut('t'), Some(ToolKind::Text));
        assert_eq!(ToolKind::from_shortcut('q'), None);
        for tool in ToolKind::ALL {
            assert_eq!(ToolKind::from_shortcut(tool.shortcut()), Some(tool));
        }
    }

    #[test]
    fn test_draw_gesture() {
        let mut tm = ToolManager::new();
        tm.set_tool(ToolKind::Box);
        tm.begin(Point::new(5.0, 5.0), None);
        tm.update(Point::new(30.0, 30.0));
        assert!(tm.is_active());
        let preview = tm.preview_shape().unwrap();
        assert_eq!(preview.kind(), ShapeKind::Box);

        let gesture = tm.end(Point::new(50.0, 50.0)).unwrap();
        assert_eq!(gesture.rect(), Rect::new(5.0, 5.0, 50.0, 50.0));
        assert!(!tm.is_active());
    }

    #[test]
    fn test_cancel_discards() {
        let mut tm = ToolManager::new();
        tm.set_tool(ToolKind::Connector);
        tm.begin(Point::ZERO, None);
        tm.cancel();
        assert!(tm.end(Point::new(10.0, 10.0)).is_none());
    }

    #[test]
    fn test_set_tool_resets_state() {
        let mut tm = ToolManager::new();
        tm.set_tool(ToolKind::Box);
        tm.begin(Point::ZERO, None);
        tm.set_tool(ToolKind::Select);
        assert!(!tm.is_active());
        assert!(tm.preview_shape().is_none());
    }
}
