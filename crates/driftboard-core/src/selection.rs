//! Selection gesture state: moving, clone-dragging and rubber-band selection.

use crate::shapes::{Shape, ShapeId};
use kurbo::{Point, Rect, Vec2};

/// Pointer travel (world units) below which a drag counts as a click.
pub const MOVE_THRESHOLD: f64 = 0.1;

/// State for moving multiple shapes at once.
#[derive(Debug, Clone)]
pub struct MultiMoveState {
    /// Starting point of the drag.
    pub start_point: Point,
    /// Current point of the drag.
    pub current_point: Point,
    /// Shapes as they were when the drag began, in selection order.
    pub original_shapes: Vec<(ShapeId, Shape)>,
    /// Whether this is an alt-drag duplicate operation.
    pub is_duplicate: bool,
    /// IDs of duplicated shapes, index-aligned with `original_shapes`.
    pub duplicated_ids: Vec<ShapeId>,
}

impl MultiMoveState {
    /// Create a new multi-move state.
    pub fn new(start_point: Point, original_shapes: Vec<(ShapeId, Shape)>) -> Self {
        Self {
            start_point,
            current_point: start_point,
            original_shapes,
            is_duplicate: false,
            duplicated_ids: Vec::new(),
        }
    }

    /// Create a new multi-move state for duplication (Alt+drag).
    pub fn new_duplicate(
        start_point: Point,
        original_shapes: Vec<(ShapeId, Shape)>,
        duplicated_ids: Vec<ShapeId>,
    ) -> Self {
        Self {
            start_point,
            current_point: start_point,
            original_shapes,
            is_duplicate: true,
            duplicated_ids,
        }
    }

    /// Get the drag delta.
    pub fn delta(&self) -> Vec2 {
        self.current_point - self.start_point
    }

    /// Whether the pointer travelled far enough to count as a move.
    pub fn has_moved(&self) -> bool {
        let d = self.delta();
        d.x.abs() > MOVE_THRESHOLD || d.y.abs() > MOVE_THRESHOLD
    }

    /// The shapes that follow the pointer: the duplicates when cloning, otherwise the originals.
    pub fn moving_ids(&self) -> Vec<ShapeId> {
        if self.is_duplicate {
            self.duplicated_ids.clone()
        } else {
            self.original_shapes.iter().map(|(id, _)| *id).collect()
        }
    }
}

/// Rubber-band selection rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marquee {
    /// Starting point in world coordinates.
    pub start: Point,
    /// Current point in world coordinates.
    pub current: Point,
    /// Whether the result extends the existing selection (Shift held).
    pub additive: bool,
}

impl Marquee {
    pub fn new(start: Point, additive: bool) -> Self {
        Self {
            start,
            current: start,
            additive,
        }
    }

    /// Get the selection rectangle as a Rect.
    pub fn to_rect(&self) -> Rect {
        Rect::from_points(self.start, self.current)
    }
}
