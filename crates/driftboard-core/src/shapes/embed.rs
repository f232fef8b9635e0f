//! Embed shape for external content resolved from a URL.

use super::{ShapeId, ShapeKind, ShapeStyle, ShapeTrait};
use crate::embed::EmbedDescriptor;
use kurbo::{Affine, Point, Rect, Size};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Resolution progress of an embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbedState {
    /// Created but not classified yet; rendered as a placeholder.
    Pending,
    /// Classified; carries the provider-specific render descriptor.
    Resolved(EmbedDescriptor),
}

/// A frame showing external content (generic page, tweet or video).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embed {
    pub(crate) id: ShapeId,
    /// Top-left corner position.
    pub position: Point,
    /// Frame width.
    pub width: f64,
    /// Frame height.
    pub height: f64,
    /// Rotation angle in radians (around center).
    #[serde(default)]
    pub rotation: f64,
    /// Source URL as entered or pasted.
    pub url: String,
    /// Resolution state.
    pub state: EmbedState,
    /// When set, resolution replaces the frame size with the provider's default.
    #[serde(default)]
    pub auto_size: bool,
    /// Style properties.
    pub style: ShapeStyle,
}

impl Embed {
    /// Frame size used before the provider is known.
    pub const PLACEHOLDER_SIZE: Size = Size::new(400.0, 300.0);

    /// Create a pending embed whose size follows the provider once resolved.
    pub fn pending(position: Point, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            width: Self::PLACEHOLDER_SIZE.width,
            height: Self::PLACEHOLDER_SIZE.height,
            rotation: 0.0,
            url: url.into(),
            state: EmbedState::Pending,
            auto_size: true,
            style: ShapeStyle::default(),
        }
    }

    /// Create a pending embed inside a frame the user drew.
    pub fn in_frame(frame: Rect, url: impl Into<String>) -> Self {
        let mut embed = Self::pending(frame.origin(), url);
        embed.width = frame.width();
        embed.height = frame.height();
        embed.auto_size = false;
        embed
    }

    /// Whether resolution is still outstanding.
    pub fn is_pending(&self) -> bool {
        matches!(self.state, EmbedState::Pending)
    }

    /// The resolved descriptor, if any.
    pub fn descriptor(&self) -> Option<&EmbedDescriptor> {
        match &self.state {
            EmbedState::Pending => None,
            EmbedState::Resolved(d) => Some(d),
        }
    }

    /// Store a resolution result, resizing to the provider default when auto-sized.
    pub fn apply_resolution(&mut self, descriptor: EmbedDescriptor) {
        if self.auto_size {
            let size = descriptor.default_size();
            self.width = size.width;
            self.height = size.height;
        }
        self.state = EmbedState::Resolved(descriptor);
    }

    pub(crate) fn kind(&self) -> ShapeKind {
        match &self.state {
            EmbedState::Pending => ShapeKind::PendingEmbed,
            EmbedState::Resolved(d) => d.shape_kind(),
        }
    }
}

impl ShapeTrait for Embed {
    fn id(&self) -> ShapeId {
        self.id
    }

    fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.position, (self.width, self.height))
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
    fn test_pending_then_resolved() {
        let mut embed = Embed::pending(Point::new(10.0, 10.0), "https://www.youtube.com/watch?v=hz2BacySDXE");
        assert!(embed.is_pending());
        assert_eq!(embed.kind(), ShapeKind::PendingEmbed);

        embed.apply_resolution(EmbedDescriptor::Video {
            video_id: "hz2BacySDXE".to_string(),
        });
        assert!(!embed.is_pending());
        assert_eq!(embed.kind(), ShapeKind::Video);
        let size = EmbedDescriptor::Video { video_id: String::new() }.default_size();
        assert!((embed.width - size.width).abs() < f64::EPSILON);
    }

    #[test]
    fn test_framed_embed_keeps_size() {
        let frame = Rect::new(0.0, 0.0, 200.0, 100.0);
        let mut embed = Embed::in_frame(frame, "https://example.com");
        embed.apply_resolution(EmbedDescriptor::Iframe {
            url: "https://example.com/".to_string(),
        });
        assert!((embed.width - 200.0).abs() < f64::EPSILON);
        assert!((embed.height - 100.0).abs() < f64::EPSILON);
    }
}
