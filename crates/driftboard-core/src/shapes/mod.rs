//! Shape definitions for the whiteboard.

mod box_shape;
mod connector;
mod embed;
mod portal;
mod text;

pub use box_shape::BoxShape;
pub use connector::{Connector, Endpoint, clip_to_bounds};
pub use embed::{Embed, EmbedState};
pub use portal::Portal;
pub use text::Text;

use kurbo::{Affine, Point, Rect};
use peniko::Color;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Style properties for shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeStyle {
    /// Stroke color.
    pub stroke_color: SerializableColor,
    /// Stroke width.
    pub stroke_width: f64,
    /// Fill color (None = no fill).
    pub fill_color: Option<SerializableColor>,
    /// Overall opacity (0.0 = fully transparent, 1.0 = fully opaque).
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

fn default_opacity() -> f64 {
    1.0
}

impl ShapeStyle {
    /// Get the stroke color as a peniko Color.
    pub fn stroke(&self) -> Color {
        self.stroke_color.into()
    }

    /// Get the fill color as a peniko Color.
    pub fn fill(&self) -> Option<Color> {
        self.fill_color.map(|c| c.into())
    }

    /// Set the fill color from a peniko Color.
    pub fn set_fill(&mut self, color: Option<Color>) {
        self.fill_color = color.map(|c| c.into());
    }
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            stroke_color: SerializableColor::black(),
            stroke_width: 2.0,
            fill_color: Some(SerializableColor::white()),
            opacity: 1.0,
        }
    }
}

/// Unique identifier for shapes.
pub type ShapeId = Uuid;

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = kurbo::Vec2::new(b.x - a.x, b.y - a.y);
    let pv = kurbo::Vec2::new(point.x - a.x, point.y - a.y);
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = Point::new(a.x + t * seg.x, a.y + t * seg.y);
    ((point.x - proj.x).powi(2) + (point.y - proj.y).powi(2)).sqrt()
}

/// Common trait for all shapes.
pub trait ShapeTrait {
    /// Get the unique identifier.
    fn id(&self) -> ShapeId;

    /// Get the bounding box in world coordinates.
    fn bounds(&self) -> Rect;

    /// Check if a point (in world coordinates) hits this shape.
    fn hit_test(&self, point: Point, tolerance: f64) -> bool;

    /// Get the style.
    fn style(&self) -> &ShapeStyle;

    /// Get mutable style.
    fn style_mut(&mut self) -> &mut ShapeStyle;

    /// Apply a transform to this shape.
    fn transform(&mut self, affine: Affine);
}

/// Variant tag of a shape, used for counting and for the renderer's container class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Box,
    Connector,
    Iframe,
    Tweet,
    Video,
    /// Embed whose URL has not been classified yet.
    PendingEmbed,
    Portal,
    Text,
}

impl ShapeKind {
    /// CSS-style container class the host renders this shape into.
    pub fn container_class(self) -> &'static str {
        match self {
            ShapeKind::Box => "tl-box-container",
            ShapeKind::Connector => "tl-line-container",
            ShapeKind::Iframe => "tl-iframe-container",
            ShapeKind::Tweet => "tl-tweet-container",
            ShapeKind::Video => "tl-youtube-container",
            ShapeKind::PendingEmbed => "tl-embed-placeholder",
            ShapeKind::Portal => "tl-portal-container",
            ShapeKind::Text => "tl-text-container",
        }
    }
}

/// Enum wrapper for all shape types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Shape {
    Box(BoxShape),
    Connector(Connector),
    Embed(Embed),
    Portal(Portal),
    Text(Text),
}

impl Shape {
    pub fn id(&self) -> ShapeId {
        match self {
            Shape::Box(s) => s.id(),
            Shape::Connector(s) => s.id(),
            Shape::Embed(s) => s.id(),
            Shape::Portal(s) => s.id(),
            Shape::Text(s) => s.id(),
        }
    }

    pub fn bounds(&self) -> Rect {
        match self {
            Shape::Box(s) => s.bounds(),
            Shape::Connector(s) => s.bounds(),
            Shape::Embed(s) => s.bounds(),
            Shape::Portal(s) => s.bounds(),
            Shape::Text(s) => s.bounds(),
        }
    }

    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        match self {
            Shape::Box(s) => s.hit_test(point, tolerance),
            Shape::Connector(s) => s.hit_test(point, tolerance),
            Shape::Embed(s) => s.hit_test(point, tolerance),
            Shape::Portal(s) => s.hit_test(point, tolerance),
            Shape::Text(s) => s.hit_test(point, tolerance),
        }
    }

    pub fn style(&self) -> &ShapeStyle {
        match self {
            Shape::Box(s) => s.style(),
            Shape::Connector(s) => s.style(),
            Shape::Embed(s) => s.style(),
            Shape::Portal(s) => s.style(),
            Shape::Text(s) => s.style(),
        }
    }

    pub fn style_mut(&mut self) -> &mut ShapeStyle {
        match self {
            Shape::Box(s) => s.style_mut(),
            Shape::Connector(s) => s.style_mut(),
            Shape::Embed(s) => s.style_mut(),
            Shape::Portal(s) => s.style_mut(),
            Shape::Text(s) => s.style_mut(),
        }
    }

    pub fn transform(&mut self, affine: Affine) {
        match self {
            Shape::Box(s) => s.transform(affine),
            Shape::Connector(s) => s.transform(affine),
            Shape::Embed(s) => s.transform(affine),
            Shape::Portal(s) => s.transform(affine),
            Shape::Text(s) => s.transform(affine),
        }
    }

    /// The variant tag of this shape.
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Box(_) => ShapeKind::Box,
            Shape::Connector(_) => ShapeKind::Connector,
            Shape::Embed(e) => e.kind(),
            Shape::Portal(_) => ShapeKind::Portal,
            Shape::Text(_) => ShapeKind::Text,
        }
    }

    /// Test if this shape intersects a selection rectangle.
    /// Connectors check their segment; everything else uses bounds.
    pub fn intersects_rect(&self, rect: Rect) -> bool {
        match self {
            Shape::Connector(c) => {
                let (a, b) = c.segment();
                rect.contains(a) || rect.contains(b) || segment_crosses_rect(a, b, rect)
            }
            _ => rect.intersect(self.bounds().inflate(1.0, 1.0)).area() > 0.0,
        }
    }

    /// Regenerate the shape's ID with a new unique identifier.
    /// Used when duplicating or pasting shapes.
    pub fn regenerate_id(&mut self) {
        let new_id = Uuid::new_v4();
        match self {
            Shape::Box(s) => s.id = new_id,
            Shape::Connector(s) => s.id = new_id,
            Shape::Embed(s) => s.id = new_id,
            Shape::Portal(s) => s.id = new_id,
            Shape::Text(s) => s.id = new_id,
        }
    }

    /// Get the connector if this shape is a connector.
    pub fn as_connector(&self) -> Option<&Connector> {
        match self {
            Shape::Connector(c) => Some(c),
            _ => None,
        }
    }

    /// Get the mutable connector if this shape is a connector.
    pub fn as_connector_mut(&mut self) -> Option<&mut Connector> {
        match self {
            Shape::Connector(c) => Some(c),
            _ => None,
        }
    }

    /// Get the portal if this shape is a portal.
    pub fn as_portal(&self) -> Option<&Portal> {
        match self {
            Shape::Portal(p) => Some(p),
            _ => None,
        }
    }

    /// Get the embed if this shape is an embed.
    pub fn as_embed(&self) -> Option<&Embed> {
        match self {
            Shape::Embed(e) => Some(e),
            _ => None,
        }
    }

    /// Get the mutable embed if this shape is an embed.
    pub fn as_embed_mut(&mut self) -> Option<&mut Embed> {
        match self {
            Shape::Embed(e) => Some(e),
            _ => None,
        }
    }

    /// Get the rotation angle in radians (0 for shapes that don't support rotation).
    pub fn rotation(&self) -> f64 {
        match self {
            Shape::Box(b) => b.rotation,
            Shape::Embed(e) => e.rotation,
            Shape::Text(t) => t.rotation,
            Shape::Connector(_) | Shape::Portal(_) => 0.0,
        }
    }

    /// Set the rotation angle in radians.
    pub fn set_rotation(&mut self, rotation: f64) {
        match self {
            Shape::Box(b) => b.rotation = rotation,
            Shape::Embed(e) => e.rotation = rotation,
            Shape::Text(t) => t.rotation = rotation,
            Shape::Connector(_) | Shape::Portal(_) => {}
        }
    }

    /// Whether other shapes' connectors may bind to this shape.
    pub fn is_bindable(&self) -> bool {
        !matches!(self, Shape::Connector(_))
    }
}

/// Test if segment a-b crosses any edge of `rect`.
fn segment_crosses_rect(a: Point, b: Point, rect: Rect) -> bool {
    let corners = [
        Point::new(rect.x0, rect.y0),
        Point::new(rect.x1, rect.y0),
        Point::new(rect.x1, rect.y1),
        Point::new(rect.x0, rect.y1),
    ];
    (0..4).any(|i| segments_intersect(a, b, corners[i], corners[(i + 1) % 4]))
}

/// Test if two line segments (a-b) and (c-d) intersect.
fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    let cross = |o: Point, p: Point, q: Point| -> f64 {
        (p.x - o.x) * (q.y - o.y) - (p.y - o.y) * (q.x - o.x)
    };
    let d1 = cross(c, d, a);
    let d2 = cross(c, d, b);
    let d3 = cross(a, b, c);
    let d4 = cross(a, b, d);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regenerate_id_changes_id_only() {
        let mut shape = Shape::Box(BoxShape::new(Point::new(10.0, 10.0), 40.0, 40.0));
        let old_id = shape.id();
        let old_bounds = shape.bounds();
        shape.regenerate_id();
        assert_ne!(shape.id(), old_id);
        assert_eq!(shape.bounds(), old_bounds);
    }

    #[test]
    fn test_connector_intersects_rect_by_segment() {
        let conn = Shape::Connector(Connector::free(Point::new(0.0, 0.0), Point::new(100.0, 100.0)));
        assert!(conn.intersects_rect(Rect::new(40.0, 40.0, 60.0, 60.0)));
        // Inside the bounding box but away from the diagonal.
        assert!(!conn.intersects_rect(Rect::new(70.0, 0.0, 90.0, 20.0)));
    }

    #[test]
    fn test_container_classes() {
        assert_eq!(ShapeKind::Box.container_class(), "tl-box-container");
        assert_eq!(ShapeKind::Video.container_class(), "tl-youtube-container");
    }
}
