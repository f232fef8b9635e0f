//! Portal shape: a window onto another page, referenced by title.

use super::{ShapeId, ShapeStyle, ShapeTrait};
use kurbo::{Affine, Point, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A portal to another page.
///
/// The target is a title, looked up in the page registry whenever it is needed;
/// a portal never owns or pins the page it shows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portal {
    pub(crate) id: ShapeId,
    /// Top-left corner position.
    pub position: Point,
    /// Frame width.
    pub width: f64,
    /// Frame height.
    pub height: f64,
    /// Title of the referenced page.
    pub page_title: String,
    /// Collapsed portals show only the title bar.
    #[serde(default)]
    pub collapsed: bool,
    /// Style properties.
    pub style: ShapeStyle,
}

impl Portal {
    pub const DEFAULT_WIDTH: f64 = 400.0;
    pub const DEFAULT_HEIGHT: f64 = 280.0;
    /// Height of the title bar, which is all a collapsed portal shows.
    pub const TITLE_BAR_HEIGHT: f64 = 40.0;

    /// Create a portal at `position` showing the page titled `page_title`.
    pub fn new(position: Point, page_title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            width: Self::DEFAULT_WIDTH,
            height: Self::DEFAULT_HEIGHT,
            page_title: page_title.into(),
            collapsed: false,
            style: ShapeStyle::default(),
        }
    }

    /// Whether this portal points at `title` (page titles compare case-insensitively).
    pub fn targets(&self, title: &str) -> bool {
        self.page_title.to_lowercase() == title.to_lowercase()
    }
}

impl ShapeTrait for Portal {
    fn id(&self) -> ShapeId {
        self.id
    }

    fn bounds(&self) -> Rect {
        let height = if self.collapsed { Self::TITLE_BAR_HEIGHT } else { self.height };
        Rect::from_origin_size(self.position, (self.width, height))
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.bounds().inflate(tolerance, tolerance).contains(point)
    }

    fn style(&self) -> &ShapeStyle {
        &self.style
    }

    fn style_mut(&mut self) -> &mut ShapeStyle {
        &mut self.style
    }

    fn transform(&mut self, affine: Affine) {
        self.position = affine * self.position;
        let scale = affine.as_coeffs();
        self.width *= scale[0].abs();
        self.height *= scale[3].abs();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_ignores_case() {
        let portal = Portal::new(Point::ZERO, "My-Whiteboard-2");
        assert!(portal.targets("my-whiteboard-2"));
        assert!(!portal.targets("my-whiteboard"));
    }

    #[test]
    fn test_collapsed_bounds() {
        let mut portal = Portal::new(Point::ZERO, "notes");
        portal.collapsed = true;
        assert!((portal.bounds().height() - Portal::TITLE_BAR_HEIGHT).abs() < f64::EPSILON);
    }
}
