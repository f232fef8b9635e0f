//! Text shape.

use super::{ShapeId, ShapeStyle, ShapeTrait};
use kurbo::{Affine, Point, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A plain text shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Text {
    pub(crate) id: ShapeId,
    /// Position (top-left corner of text bounding box).
    pub position: Point,
    /// The text content.
    pub content: String,
    /// Font size in pixels.
    pub font_size: f64,
    /// Rotation angle in radians (around center).
    #[serde(default)]
    pub rotation: f64,
    /// Style properties.
    pub style: ShapeStyle,
}

impl Text {
    /// Default font size.
    pub const DEFAULT_FONT_SIZE: f64 = 20.0;
    /// Average glyph width relative to the font size.
    const CHAR_WIDTH_FACTOR: f64 = 0.55;
    /// Line height relative to the font size.
    const LINE_HEIGHT: f64 = 1.2;

    /// Create a new text shape.
    pub fn new(position: Point, content: String) -> Self {
        let mut style = ShapeStyle::default();
        style.fill_color = None;
        Self {
            id: Uuid::new_v4(),
            position,
            content,
            font_size: Self::DEFAULT_FONT_SIZE,
            rotation: 0.0,
            style,
        }
    }

    /// Approximate width based on the widest line.
    fn approximate_width(&self) -> f64 {
        let max_line_len = self
            .content
            .lines()
            .map(|line| line.chars().count())
            .max()
            .unwrap_or(0)
            .max(1);
        max_line_len as f64 * self.font_size * Self::CHAR_WIDTH_FACTOR
    }

    /// Approximate height based on font size and number of lines.
    fn approximate_height(&self) -> f64 {
        let mut line_count = self.content.lines().count().max(1);
        if self.content.ends_with('\n') {
            line_count += 1;
        }
        line_count as f64 * self.font_size * Self::LINE_HEIGHT
    }
}

impl ShapeTrait for Text {
    fn id(&self) -> ShapeId {
        self.id
    }

    fn bounds(&self) -> Rect {
        Rect::from_origin_size(
            self.position,
            (self.approximate_width(), self.approximate_height()),
        )
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
        self.font_size *= scale[3].abs();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiline_bounds() {
        let text = Text::new(Point::ZERO, "ab\nabcd".to_string());
        let bounds = text.bounds();
        assert!((bounds.width() - 4.0 * 20.0 * 0.55).abs() < 1e-9);
        assert!((bounds.height() - 2.0 * 20.0 * 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_empty_text_has_area() {
        let text = Text::new(Point::ZERO, String::new());
        assert!(text.bounds().area() > 0.0);
    }
}
