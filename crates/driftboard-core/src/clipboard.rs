//! Clipboard payloads: copied shapes travel as marked base64 JSON, anything else is
//! treated as a link or plain text.

use crate::canvas::CanvasDocument;
use crate::shapes::{Shape, ShapeId};
use base64::{Engine, engine::general_purpose::STANDARD};
use std::collections::HashSet;
use thiserror::Error;

/// Prefix identifying copied shapes.
pub const PAYLOAD_MARKER: &str = "driftboard/shapes;base64,";

/// Clipboard errors.
#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("Nothing to copy")]
    Empty,
    #[error("Not a shape payload")]
    NotShapes,
    #[error("Payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Copied shapes in their clipboard text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardPayload(String);

impl ClipboardPayload {
    /// Encode shapes as clipboard text.
    pub fn encode(shapes: &[Shape]) -> Result<Self, ClipboardError> {
        if shapes.is_empty() {
            return Err(ClipboardError::Empty);
        }
        let json = serde_json::to_vec(shapes)?;
        Ok(Self(format!("{PAYLOAD_MARKER}{}", STANDARD.encode(json))))
    }

    /// Decode clipboard text produced by [`encode`](Self::encode).
    pub fn decode(text: &str) -> Result<Vec<Shape>, ClipboardError> {
        let body = text
            .trim()
            .strip_prefix(PAYLOAD_MARKER)
            .ok_or(ClipboardError::NotShapes)?;
        let json = STANDARD.decode(body)?;
        Ok(serde_json::from_slice(&json)?)
    }

    /// Whether clipboard text carries copied shapes.
    pub fn is_payload(text: &str) -> bool {
        text.trim_start().starts_with(PAYLOAD_MARKER)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Serialize shapes for the clipboard.
///
/// Connector ends bound to shapes outside `ids` are detached at their current
/// position, so a paste never refers back into the source page.
pub fn copy(document: &CanvasDocument, ids: &[ShapeId]) -> Result<ClipboardPayload, ClipboardError> {
    let mut shapes = document.query_by_ids(ids);
    let copied: HashSet<ShapeId> = shapes.iter().map(Shape::id).collect();
    for shape in &mut shapes {
        if let Some(conn) = shape.as_connector_mut() {
            conn.remap_bindings(|target| copied.contains(&target).then_some(target));
        }
    }
    let payload = ClipboardPayload::encode(&shapes)?;
    log::info!("copied {} shape(s)", shapes.len());
    Ok(payload)
}

/// What pasted text turns into.
#[derive(Debug, Clone)]
pub enum PasteContent {
    /// Copied shapes, still carrying their source ids.
    Shapes(Vec<Shape>),
    /// A link for the embed resolver.
    Link(String),
    /// Anything else, inserted as a text shape.
    Text(String),
}

/// Route pasted text: shape payloads are decoded, web links go to the embed
/// resolver, everything else stays text.
///
/// A payload that carries the marker but fails to decode is an error rather than
/// being pasted as raw text.
pub fn classify(text: &str) -> Result<PasteContent, ClipboardError> {
    if ClipboardPayload::is_payload(text) {
        return ClipboardPayload::decode(text).map(PasteContent::Shapes);
    }
    let trimmed = text.trim();
    if looks_like_link(trimmed) {
        Ok(PasteContent::Link(trimmed.to_string()))
    } else {
        Ok(PasteContent::Text(text.to_string()))
    }
}

fn looks_like_link(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    (lower.starts_with("http://") || lower.starts_with("https://"))
        && !text.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{BoxShape, Connector, Endpoint};
    use kurbo::Point;

    fn doc_with_connected_boxes() -> (CanvasDocument, ShapeId, ShapeId, ShapeId) {
        let mut doc = CanvasDocument::new();
        let a = doc.add_shape(Shape::Box(BoxShape::new(Point::new(0.0, 0.0), 40.0, 40.0)));
        let b = doc.add_shape(Shape::Box(BoxShape::new(Point::new(200.0, 0.0), 40.0, 40.0)));
        let ra = doc.get_shape(a).unwrap().bounds();
        let rb = doc.get_shape(b).unwrap().bounds();
        let conn = Connector::new(
            Endpoint::bound_at(a, ra, ra.center()),
            Endpoint::bound_at(b, rb, rb.center()),
        );
        let c = doc.create_shape(Shape::Connector(conn)).unwrap();
        (doc, a, b, c)
    }

    #[test]
    fn test_copy_decodes_back() {
        let (doc, a, b, c) = doc_with_connected_boxes();
        let payload = copy(&doc, &[a, b, c]).unwrap();
        assert!(payload.as_str().starts_with(PAYLOAD_MARKER));

        let shapes = ClipboardPayload::decode(payload.as_str()).unwrap();
        let ids: Vec<ShapeId> = shapes.iter().map(Shape::id).collect();
        assert_eq!(ids, vec![a, b, c]);
        let conn = shapes[2].as_connector().unwrap();
        assert_eq!(conn.start.bound_shape(), Some(a));
        assert_eq!(conn.end.bound_shape(), Some(b));
    }

    #[test]
    fn test_copy_detaches_outside_targets() {
        let (doc, a, _, c) = doc_with_connected_boxes();
        let payload = copy(&doc, &[a, c]).unwrap();
        let shapes = ClipboardPayload::decode(payload.as_str()).unwrap();
        let conn = shapes[1].as_connector().unwrap();
        assert_eq!(conn.start.bound_shape(), Some(a));
        let Endpoint::Free(end) = conn.end else {
            panic!("end should be free");
        };
        // Clipped to the left edge of the box at x = 200.
        assert!((end.x - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_copy_nothing() {
        let doc = CanvasDocument::new();
        assert!(matches!(copy(&doc, &[]), Err(ClipboardError::Empty)));
    }

    #[test]
    fn test_classify() {
        assert!(matches!(classify("https://logseq.com"), Ok(PasteContent::Link(url)) if url == "https://logseq.com"));
        assert!(matches!(classify("  HTTPS://example.com/a  "), Ok(PasteContent::Link(_))));
        assert!(matches!(classify("hello world"), Ok(PasteContent::Text(_))));
        assert!(matches!(classify("https://exa mple.com"), Ok(PasteContent::Text(_))));
        assert!(matches!(
            classify(&format!("{PAYLOAD_MARKER}!!!")),
            Err(ClipboardError::Decode(_))
        ));
    }
}
