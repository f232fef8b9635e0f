//! Canvas document and state management.

use crate::camera::Camera;
use crate::embed::EmbedDescriptor;
use crate::shapes::{Portal, Shape, ShapeId, ShapeKind};
use crate::spatial::SpatialIndex;
use crate::tools::{ToolKind, ToolManager};
use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

/// Maximum number of undo states to keep.
const MAX_UNDO_HISTORY: usize = 50;

/// Shortest connector, in world units, that is kept.
pub const MIN_CONNECTOR_LENGTH: f64 = 1.0;

/// Shape model errors.
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("Shape not found: {0}")]
    NotFound(ShapeId),
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A change to the shape model, reported to the host.
#[derive(Debug, Clone)]
pub enum ShapeDelta {
    Created(Shape),
    Updated(Shape),
    Deleted(ShapeId),
}

impl ShapeDelta {
    /// Id of the shape the delta refers to.
    pub fn id(&self) -> ShapeId {
        match self {
            ShapeDelta::Created(s) | ShapeDelta::Updated(s) => s.id(),
            ShapeDelta::Deleted(id) => *id,
        }
    }
}

/// A snapshot of document state for undo/redo.
#[derive(Debug, Clone)]
struct DocumentSnapshot {
    /// All shapes in the snapshot.
    shapes: HashMap<ShapeId, Shape>,
    /// Z-order of shapes.
    z_order: Vec<ShapeId>,
}

/// The shapes of one page, their z-order and the spatial index over them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasDocument {
    /// Unique document identifier.
    pub id: Uuid,
    /// All shapes in the document, keyed by ID.
    shapes: HashMap<ShapeId, Shape>,
    /// Z-order of shapes (back to front).
    z_order: Vec<ShapeId>,
    /// Sort key per shape, ascending back to front.
    #[serde(skip)]
    z_keys: HashMap<ShapeId, i64>,
    /// Next key above every shape.
    #[serde(skip)]
    z_top: i64,
    /// Next key below every shape.
    #[serde(skip)]
    z_bottom: i64,
    #[serde(skip)]
    index: SpatialIndex,
    /// Undo history stack.
    #[serde(skip)]
    undo_stack: Vec<DocumentSnapshot>,
    /// Redo history stack.
    #[serde(skip)]
    redo_stack: Vec<DocumentSnapshot>,
    /// Changes not yet taken by the host.
    #[serde(skip)]
    deltas: Vec<ShapeDelta>,
}

impl Default for CanvasDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasDocument {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::with_index(SpatialIndex::default())
    }

    /// Create a new empty document whose spatial index uses `cell_size` world units per cell.
    pub fn with_cell_size(cell_size: f64) -> Self {
        Self::with_index(SpatialIndex::new(cell_size))
    }

    fn with_index(index: SpatialIndex) -> Self {
        Self {
            id: Uuid::new_v4(),
            shapes: HashMap::new(),
            z_order: Vec::new(),
            z_keys: HashMap::new(),
            z_top: 0,
            z_bottom: -1,
            index,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            deltas: Vec::new(),
        }
    }

    /// Re-bucket the spatial index with a new cell size.
    pub fn set_cell_size(&mut self, cell_size: f64) {
        if (self.index.cell_size() - cell_size).abs() < f64::EPSILON {
            return;
        }
        self.index = SpatialIndex::new(cell_size);
        self.rebuild_index();
    }

    /// Take a snapshot of the current document state for undo.
    fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            shapes: self.shapes.clone(),
            z_order: self.z_order.clone(),
        }
    }

    /// Push current state to undo stack (call before making changes).
    pub fn push_undo(&mut self) {
        let snapshot = self.snapshot();
        self.undo_stack.push(snapshot);
        self.redo_stack.clear();
        if self.undo_stack.len() > MAX_UNDO_HISTORY {
            self.undo_stack.remove(0);
        }
    }

    /// Drop the most recent undo snapshot without restoring it.
    pub fn pop_undo(&mut self) -> bool {
        self.undo_stack.pop().is_some()
    }

    /// Undo the last change.
    /// Returns true if undo was performed, false if nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(snapshot) = self.undo_stack.pop() else {
            return false;
        };
        let current = self.snapshot();
        self.redo_stack.push(current);
        self.restore(snapshot);
        true
    }

    /// Redo the last undone change.
    /// Returns true if redo was performed, false if nothing to redo.
    pub fn redo(&mut self) -> bool {
        let Some(snapshot) = self.redo_stack.pop() else {
            return false;
        };
        let current = self.snapshot();
        self.undo_stack.push(current);
        self.restore(snapshot);
        true
    }

    /// Check if undo is available.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    fn restore(&mut self, snapshot: DocumentSnapshot) {
        let before: HashSet<ShapeId> = self.shapes.keys().copied().collect();
        self.shapes = snapshot.shapes;
        self.z_order = snapshot.z_order;
        self.renumber_z();
        self.rebuild_index();

        let mut gone: Vec<ShapeId> = before
            .iter()
            .filter(|id| !self.shapes.contains_key(id))
            .copied()
            .collect();
        gone.sort();
        for id in gone {
            self.deltas.push(ShapeDelta::Deleted(id));
        }
        for id in self.z_order.clone() {
            if let Some(shape) = self.shapes.get(&id) {
                let delta = if before.contains(&id) {
                    ShapeDelta::Updated(shape.clone())
                } else {
                    ShapeDelta::Created(shape.clone())
                };
                self.deltas.push(delta);
            }
        }
    }

    /// Rebuild the z-order keys from `z_order`.
    fn renumber_z(&mut self) {
        self.z_keys = self
            .z_order
            .iter()
            .enumerate()
            .map(|(rank, &id)| (id, rank as i64))
            .collect();
        self.z_top = self.z_order.len() as i64;
        self.z_bottom = -1;
    }

    fn raise_to_top(&mut self, id: ShapeId) {
        self.z_keys.insert(id, self.z_top);
        self.z_top += 1;
    }

    /// Re-index every shape and re-resolve every connector.
    fn rebuild_index(&mut self) {
        self.index.clear();
        let ids = self.z_order.clone();
        for &id in &ids {
            if let Some(shape) = self.shapes.get(&id) {
                if shape.as_connector().is_none() {
                    self.index.insert(id, shape.bounds());
                }
            }
        }
        for id in ids {
            self.resolve_connector(id);
        }
    }

    fn reindex(&mut self, id: ShapeId) {
        if let Some(shape) = self.shapes.get(&id) {
            self.index.insert(id, shape.bounds());
        }
    }

    /// Recompute a connector's rendered segment from its bound shapes, and re-index it.
    fn resolve_connector(&mut self, id: ShapeId) {
        let Some(mut shape) = self.shapes.remove(&id) else {
            return;
        };
        if let Shape::Connector(conn) = &mut shape {
            let shapes = &self.shapes;
            conn.resolve(|target| {
                shapes
                    .get(&target)
                    .filter(|s| s.is_bindable())
                    .map(Shape::bounds)
            });
        }
        self.index.insert(id, shape.bounds());
        self.shapes.insert(id, shape);
    }

    pub(crate) fn record_updated(&mut self, id: ShapeId) {
        if let Some(shape) = self.shapes.get(&id) {
            self.deltas.push(ShapeDelta::Updated(shape.clone()));
        }
    }

    /// Re-resolve every connector bound to `id`.
    fn refresh_dependents(&mut self, id: ShapeId) {
        let dependents: Vec<ShapeId> = self
            .z_order
            .iter()
            .filter(|cid| {
                self.shapes
                    .get(cid)
                    .and_then(Shape::as_connector)
                    .is_some_and(|c| c.is_bound_to(id))
            })
            .copied()
            .collect();
        for cid in dependents {
            self.resolve_connector(cid);
            self.record_updated(cid);
        }
    }

    /// Add a shape on top of the z-order without validation.
    pub fn add_shape(&mut self, shape: Shape) -> ShapeId {
        let id = shape.id();
        self.z_order.retain(|&shape_id| shape_id != id);
        self.z_order.push(id);
        self.raise_to_top(id);
        self.shapes.insert(id, shape);
        self.resolve_connector(id);
        if let Some(shape) = self.shapes.get(&id) {
            self.deltas.push(ShapeDelta::Created(shape.clone()));
        }
        id
    }

    /// Validate and add a new shape.
    ///
    /// Degenerate boxes and frames, zero-length connectors and connectors bound to
    /// missing shapes are rejected.
    pub fn create_shape(&mut self, shape: Shape) -> Result<ShapeId, CanvasError> {
        match &shape {
            Shape::Connector(conn) => {
                for target in conn.bound_shapes() {
                    if !self.shapes.get(&target).is_some_and(Shape::is_bindable) {
                        return Err(CanvasError::NotFound(target));
                    }
                }
                let mut candidate = conn.clone();
                candidate.resolve(|target| self.shapes.get(&target).map(Shape::bounds));
                if candidate.length() < MIN_CONNECTOR_LENGTH {
                    return Err(CanvasError::InvalidGeometry(format!(
                        "connector shorter than {MIN_CONNECTOR_LENGTH}"
                    )));
                }
            }
            Shape::Text(_) => {}
            other => {
                let bounds = other.bounds();
                if bounds.width() < 1.0 || bounds.height() < 1.0 {
                    return Err(CanvasError::InvalidGeometry(format!(
                        "{:?} of {}x{}",
                        other.kind(),
                        bounds.width(),
                        bounds.height()
                    )));
                }
            }
        }
        let id = self.add_shape(shape);
        log::debug!("created shape {id}");
        Ok(id)
    }

    /// Mutate a shape in place, keeping the index and bound connectors current.
    pub fn update_shape(
        &mut self,
        id: ShapeId,
        f: impl FnOnce(&mut Shape),
    ) -> Result<(), CanvasError> {
        let shape = self.shapes.get_mut(&id).ok_or(CanvasError::NotFound(id))?;
        f(shape);
        if shape.as_connector().is_some() {
            self.resolve_connector(id);
        } else {
            self.reindex(id);
        }
        self.record_updated(id);
        self.refresh_dependents(id);
        Ok(())
    }

    /// Apply a geometric transform to a shape.
    pub fn update_geometry(&mut self, id: ShapeId, affine: Affine) -> Result<(), CanvasError> {
        self.update_shape(id, |shape| shape.transform(affine))
    }

    /// Replace a shape with another value carrying the same id.
    pub fn set_shape(&mut self, shape: Shape) -> Result<(), CanvasError> {
        self.update_shape(shape.id(), |slot| *slot = shape)
    }

    /// Translate several shapes; missing ids are skipped.
    pub fn translate(&mut self, ids: &[ShapeId], delta: Vec2) {
        let affine = Affine::translate(delta);
        for &id in ids {
            if self.update_geometry(id, affine).is_err() {
                log::debug!("translate skipped missing shape {id}");
            }
        }
    }

    fn detach(&mut self, id: ShapeId) -> Option<Shape> {
        self.z_order.retain(|&shape_id| shape_id != id);
        self.z_keys.remove(&id);
        self.index.remove(id);
        self.shapes.remove(&id)
    }

    /// Delete shapes and every connector bound to them.
    ///
    /// Returns the ids actually removed, cascaded connectors included.
    pub fn delete_shapes(&mut self, ids: &[ShapeId]) -> Vec<ShapeId> {
        let mut doomed: Vec<ShapeId> = Vec::new();
        let mut seen = HashSet::new();
        for &id in ids {
            if self.shapes.contains_key(&id) && seen.insert(id) {
                doomed.push(id);
            }
        }
        for &cid in &self.z_order {
            if seen.contains(&cid) {
                continue;
            }
            let bound_to_doomed = self
                .shapes
                .get(&cid)
                .and_then(Shape::as_connector)
                .is_some_and(|c| c.bound_shapes().any(|target| seen.contains(&target)));
            if bound_to_doomed {
                doomed.push(cid);
            }
        }
        seen.extend(doomed.iter().copied());

        for &id in &doomed {
            if self.detach(id).is_some() {
                self.deltas.push(ShapeDelta::Deleted(id));
            }
        }
        if !doomed.is_empty() {
            log::info!("deleted {} shape(s)", doomed.len());
        }
        doomed
    }

    /// Clear all shapes from the document.
    pub fn clear(&mut self) {
        let ids = self.z_order.clone();
        self.delete_shapes(&ids);
    }

    /// Clone the given shapes in z-order, in the given order of ids.
    pub fn query_by_ids(&self, ids: &[ShapeId]) -> Vec<Shape> {
        ids.iter().filter_map(|id| self.shapes.get(id).cloned()).collect()
    }

    /// Duplicate shapes, offset by `offset`, on top of the z-order.
    ///
    /// Returns the clone ids, index-aligned with the ids that were found.
    pub fn duplicate(&mut self, ids: &[ShapeId], offset: Vec2) -> Vec<ShapeId> {
        let sources = self.query_by_ids(ids);
        let clones = clone_shapes(&sources, offset);
        self.add_clones(clones)
    }

    /// Add cloned shapes, non-connectors first so connector bindings resolve.
    pub fn add_clones(&mut self, clones: Vec<Shape>) -> Vec<ShapeId> {
        let ids: Vec<ShapeId> = clones.iter().map(Shape::id).collect();
        let (connectors, others): (Vec<Shape>, Vec<Shape>) =
            clones.into_iter().partition(|s| s.as_connector().is_some());
        for shape in others.into_iter().chain(connectors) {
            self.add_shape(shape);
        }
        ids
    }

    /// Get a shape by ID.
    pub fn get_shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(&id)
    }

    /// Whether a shape with this id exists.
    pub fn contains(&self, id: ShapeId) -> bool {
        self.shapes.contains_key(&id)
    }

    /// Get shapes in z-order (back to front).
    pub fn shapes_ordered(&self) -> impl Iterator<Item = &Shape> {
        self.z_order.iter().filter_map(|id| self.shapes.get(id))
    }

    /// Shape ids back to front.
    pub fn z_order(&self) -> &[ShapeId] {
        &self.z_order
    }

    /// Number of shapes of the given kind.
    pub fn count_kind(&self, kind: ShapeKind) -> usize {
        self.shapes.values().filter(|s| s.kind() == kind).count()
    }

    /// Bring a shape to the front (topmost).
    pub fn bring_to_front(&mut self, id: ShapeId) {
        if self.shapes.contains_key(&id) {
            self.z_order.retain(|&shape_id| shape_id != id);
            self.z_order.push(id);
            self.raise_to_top(id);
            self.record_updated(id);
        }
    }

    /// Send a shape to the back (bottommost).
    pub fn send_to_back(&mut self, id: ShapeId) {
        if self.shapes.contains_key(&id) {
            self.z_order.retain(|&shape_id| shape_id != id);
            self.z_order.insert(0, id);
            self.z_keys.insert(id, self.z_bottom);
            self.z_bottom -= 1;
            self.record_updated(id);
        }
    }

    /// Move a shape one layer forward (towards front).
    /// Returns true if the shape was moved, false if already at front.
    pub fn bring_forward(&mut self, id: ShapeId) -> bool {
        if let Some(pos) = self.z_order.iter().position(|&shape_id| shape_id == id) {
            if pos + 1 < self.z_order.len() {
                self.swap_layers(pos, pos + 1);
                self.record_updated(id);
                return true;
            }
        }
        false
    }

    /// Move a shape one layer backward (towards back).
    /// Returns true if the shape was moved, false if already at back.
    pub fn send_backward(&mut self, id: ShapeId) -> bool {
        if let Some(pos) = self.z_order.iter().position(|&shape_id| shape_id == id) {
            if pos > 0 {
                self.swap_layers(pos, pos - 1);
                self.record_updated(id);
                return true;
            }
        }
        false
    }

    fn swap_layers(&mut self, a: usize, b: usize) {
        let (id_a, id_b) = (self.z_order[a], self.z_order[b]);
        self.z_order.swap(a, b);
        let key_a = self.z_rank(id_a);
        let key_b = self.z_rank(id_b);
        self.z_keys.insert(id_a, key_b);
        self.z_keys.insert(id_b, key_a);
    }

    /// Get the bounding box of all shapes.
    pub fn bounds(&self) -> Option<Rect> {
        self.shapes
            .values()
            .map(Shape::bounds)
            .reduce(|acc, b| acc.union(b))
    }

    fn z_rank(&self, id: ShapeId) -> i64 {
        self.z_keys.get(&id).copied().unwrap_or(i64::MAX)
    }

    /// Find shapes at a point (in world coordinates), front to back.
    pub fn shapes_at_point(&self, point: Point, tolerance: f64) -> Vec<ShapeId> {
        let mut hits: Vec<(i64, ShapeId)> = self
            .index
            .query_point(point, tolerance)
            .into_iter()
            .filter(|id| {
                self.shapes
                    .get(id)
                    .is_some_and(|s| s.hit_test(point, tolerance))
            })
            .map(|id| (self.z_rank(id), id))
            .collect();
        hits.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        hits.into_iter().map(|(_, id)| id).collect()
    }

    /// Topmost shape at a point, if any.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> Option<ShapeId> {
        self.shapes_at_point(point, tolerance).first().copied()
    }

    /// Shapes intersecting a rectangle, back to front.
    pub fn hit_test_region(&self, rect: Rect) -> Vec<ShapeId> {
        let mut hits: Vec<(i64, ShapeId)> = self
            .index
            .query_rect(rect)
            .into_iter()
            .filter(|id| self.shapes.get(id).is_some_and(|s| s.intersects_rect(rect)))
            .map(|id| (self.z_rank(id), id))
            .collect();
        hits.sort_unstable_by_key(|(rank, _)| *rank);
        hits.into_iter().map(|(_, id)| id).collect()
    }

    /// All portals on this page.
    pub fn portals(&self) -> impl Iterator<Item = &Portal> {
        self.shapes_ordered().filter_map(Shape::as_portal)
    }

    /// Point every portal targeting `old_title` at `new_title`, in the live shapes and
    /// in the undo history. Records no deltas; returns how many live portals changed.
    pub fn retitle_portals(&mut self, old_title: &str, new_title: &str) -> usize {
        let retitle = |shapes: &mut HashMap<ShapeId, Shape>| {
            let mut changed = 0;
            for shape in shapes.values_mut() {
                if let Shape::Portal(portal) = shape {
                    if portal.targets(old_title) {
                        portal.page_title = new_title.to_string();
                        changed += 1;
                    }
                }
            }
            changed
        };
        for snapshot in self.undo_stack.iter_mut().chain(self.redo_stack.iter_mut()) {
            retitle(&mut snapshot.shapes);
        }
        retitle(&mut self.shapes)
    }

    /// Store an embed resolution. Returns false if the shape is gone or not an embed.
    pub fn apply_embed_resolution(&mut self, id: ShapeId, descriptor: EmbedDescriptor) -> bool {
        if !self.shapes.get(&id).is_some_and(|s| s.as_embed().is_some()) {
            return false;
        }
        self.update_shape(id, |shape| {
            if let Some(embed) = shape.as_embed_mut() {
                embed.apply_resolution(descriptor);
            }
        })
        .is_ok()
    }

    /// Take the changes recorded since the last call.
    pub fn take_deltas(&mut self) -> Vec<ShapeDelta> {
        std::mem::take(&mut self.deltas)
    }

    /// Check if the document is empty.
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Get the number of shapes.
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Serialize the document to JSON.
    pub fn to_json(&self) -> Result<String, CanvasError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize a document from JSON, rebuilding derived state.
    pub fn from_json(json: &str) -> Result<Self, CanvasError> {
        let mut doc: Self = serde_json::from_str(json)?;
        doc.z_order.retain(|id| doc.shapes.contains_key(id));
        let missing: Vec<ShapeId> = doc
            .shapes
            .keys()
            .filter(|id| !doc.z_order.contains(id))
            .copied()
            .collect();
        doc.z_order.extend(missing);
        doc.renumber_z();
        doc.rebuild_index();
        Ok(doc)
    }
}

/// Copy shapes with fresh ids, translated by `offset`.
///
/// Connector bindings are remapped to the copies of their targets; a binding whose
/// target is not among `shapes` becomes a free point.
pub fn clone_shapes(shapes: &[Shape], offset: Vec2) -> Vec<Shape> {
    let mut clones: Vec<Shape> = shapes.to_vec();
    let mut id_map = HashMap::new();
    for clone in &mut clones {
        let old = clone.id();
        clone.regenerate_id();
        id_map.insert(old, clone.id());
    }
    let translation = Affine::translate(offset);
    for clone in &mut clones {
        if let Some(conn) = clone.as_connector_mut() {
            conn.remap_bindings(|id| id_map.get(&id).copied());
        }
        clone.transform(translation);
    }
    clones
}

/// Runtime canvas state (not persisted).
#[derive(Debug, Clone)]
pub struct Canvas {
    /// The document being edited.
    pub document: CanvasDocument,
    /// Camera for view transform.
    pub camera: Camera,
    /// Tool manager.
    pub tool_manager: ToolManager,
    /// Currently selected shape IDs, in selection order.
    pub selection: Vec<ShapeId>,
    /// Viewport size.
    pub viewport_size: Size,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas {
    /// Create a new canvas with an empty document.
    pub fn new() -> Self {
        Self::with_document(CanvasDocument::new())
    }

    /// Create a canvas with an existing document.
    pub fn with_document(document: CanvasDocument) -> Self {
        Self {
            document,
            camera: Camera::new(),
            tool_manager: ToolManager::new(),
            selection: Vec::new(),
            viewport_size: Size::new(800.0, 600.0),
        }
    }

    /// Set the viewport size.
    pub fn set_viewport_size(&mut self, width: f64, height: f64) {
        self.viewport_size = Size::new(width, height);
    }

    /// Center of the viewport in screen coordinates.
    pub fn viewport_center(&self) -> Point {
        Point::new(self.viewport_size.width / 2.0, self.viewport_size.height / 2.0)
    }

    /// Select a shape (clears previous selection).
    pub fn select(&mut self, id: ShapeId) {
        self.clear_selection();
        self.add_to_selection(id);
    }

    /// Add to selection.
    pub fn add_to_selection(&mut self, id: ShapeId) {
        if !self.selection.contains(&id) {
            self.selection.push(id);
        }
    }

    /// Add the shape if unselected, remove it otherwise.
    pub fn toggle_selection(&mut self, id: ShapeId) {
        if self.is_selected(id) {
            self.selection.retain(|&s| s != id);
        } else {
            self.selection.push(id);
        }
    }

    /// Clear selection.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Select all shapes.
    pub fn select_all(&mut self) {
        self.selection = self.document.z_order().to_vec();
    }

    /// Check if a shape is selected.
    pub fn is_selected(&self, id: ShapeId) -> bool {
        self.selection.contains(&id)
    }

    /// Drop ids of shapes that no longer exist.
    pub fn prune_selection(&mut self) {
        let document = &self.document;
        self.selection.retain(|&id| document.contains(id));
    }

    /// Set the current tool. Changing tools clears the selection.
    pub fn set_tool(&mut self, tool: ToolKind) {
        if tool != self.tool_manager.current_tool {
            self.clear_selection();
        }
        self.tool_manager.set_tool(tool);
    }

    /// Fit the view to show all shapes.
    pub fn fit_to_content(&mut self) {
        if let Some(bounds) = self.document.bounds() {
            self.camera.fit_to_bounds(bounds, self.viewport_size, 50.0);
        }
    }

    /// Delete selected shapes (and connectors bound to them).
    pub fn delete_selected(&mut self) -> Vec<ShapeId> {
        if self.selection.is_empty() {
            return Vec::new();
        }
        self.document.push_undo();
        let ids = std::mem::take(&mut self.selection);
        self.document.delete_shapes(&ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{BoxShape, Connector, Endpoint};

    fn add_box(doc: &mut CanvasDocument, x0: f64, y0: f64, x1: f64, y1: f64) -> ShapeId {
        doc.add_shape(Shape::Box(BoxShape::from_corners(Point::new(x0, y0), Point::new(x1, y1))))
    }

    fn connect(doc: &mut CanvasDocument, a: ShapeId, b: ShapeId) -> ShapeId {
        let ra = doc.get_shape(a).unwrap().bounds();
        let rb = doc.get_shape(b).unwrap().bounds();
        let conn = Connector::new(
            Endpoint::bound_at(a, ra, ra.center()),
            Endpoint::bound_at(b, rb, rb.center()),
        );
        doc.create_shape(Shape::Connector(conn)).unwrap()
    }

    #[test]
    fn test_document_creation() {
        let doc = CanvasDocument::new();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_create_then_delete_leaves_no_trace() {
        let mut doc = CanvasDocument::new();
        let id = add_box(&mut doc, 0.0, 0.0, 100.0, 100.0);
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.delete_shapes(&[id]), vec![id]);
        assert!(doc.is_empty());
        assert!(doc.z_order().is_empty());
        assert!(doc.hit_test(Point::new(50.0, 50.0), 0.0).is_none());
    }

    #[test]
    fn test_create_rejects_degenerate_box() {
        let mut doc = CanvasDocument::new();
        let flat = Shape::Box(BoxShape::from_corners(Point::new(5.0, 5.0), Point::new(90.0, 5.5)));
        assert!(matches!(doc.create_shape(flat), Err(CanvasError::InvalidGeometry(_))));
        assert!(doc.is_empty());
    }

    #[test]
    fn test_create_rejects_dangling_connector() {
        let mut doc = CanvasDocument::new();
        let ghost = Uuid::new_v4();
        let conn = Connector::new(
            Endpoint::Bound {
                shape: ghost,
                anchor: Vec2::new(0.5, 0.5),
            },
            Endpoint::Free(Point::new(100.0, 100.0)),
        );
        assert!(matches!(
            doc.create_shape(Shape::Connector(conn)),
            Err(CanvasError::NotFound(id)) if id == ghost
        ));
    }

    #[test]
    fn test_z_order() {
        let mut doc = CanvasDocument::new();
        let id1 = add_box(&mut doc, 0.0, 0.0, 100.0, 100.0);
        let id2 = add_box(&mut doc, 50.0, 50.0, 150.0, 150.0);
        assert_eq!(doc.z_order(), &[id1, id2]);

        doc.bring_to_front(id1);
        assert_eq!(doc.z_order(), &[id2, id1]);

        doc.send_to_back(id1);
        assert_eq!(doc.z_order(), &[id1, id2]);
    }

    #[test]
    fn test_shapes_at_point() {
        let mut doc = CanvasDocument::new();
        let id1 = add_box(&mut doc, 0.0, 0.0, 100.0, 100.0);
        let id2 = add_box(&mut doc, 50.0, 50.0, 150.0, 150.0);

        let hits = doc.shapes_at_point(Point::new(75.0, 75.0), 0.0);
        assert_eq!(hits, vec![id2, id1]);
        assert_eq!(doc.hit_test(Point::new(25.0, 25.0), 0.0), Some(id1));

        doc.bring_to_front(id1);
        assert_eq!(doc.hit_test(Point::new(75.0, 75.0), 0.0), Some(id1));
    }

    #[test]
    fn test_hit_test_region_back_to_front() {
        let mut doc = CanvasDocument::new();
        let id1 = add_box(&mut doc, 0.0, 0.0, 100.0, 100.0);
        let id2 = add_box(&mut doc, 50.0, 50.0, 150.0, 150.0);
        let far = add_box(&mut doc, 1000.0, 1000.0, 1100.0, 1100.0);

        let hits = doc.hit_test_region(Rect::new(-10.0, -10.0, 200.0, 200.0));
        assert_eq!(hits, vec![id1, id2]);
        assert!(!hits.contains(&far));
    }

    #[test]
    fn test_moving_bound_shape_moves_connector() {
        let mut doc = CanvasDocument::new();
        let a = add_box(&mut doc, 0.0, 0.0, 40.0, 40.0);
        let b = add_box(&mut doc, 200.0, 0.0, 240.0, 40.0);
        let c = connect(&mut doc, a, b);

        doc.update_geometry(b, Affine::translate((0.0, 300.0))).unwrap();
        let (_, end) = doc.get_shape(c).unwrap().as_connector().unwrap().segment();
        assert!(end.y >= 300.0 - 1e-9);
        // The index follows the connector's new extent.
        assert!(doc.hit_test_region(Rect::new(100.0, 250.0, 260.0, 360.0)).contains(&c));
    }

    #[test]
    fn test_delete_cascades_to_connectors() {
        let mut doc = CanvasDocument::new();
        let a = add_box(&mut doc, 0.0, 0.0, 40.0, 40.0);
        let b = add_box(&mut doc, 200.0, 0.0, 240.0, 40.0);
        let c = connect(&mut doc, a, b);
        doc.take_deltas();

        let removed = doc.delete_shapes(&[a]);
        assert_eq!(removed, vec![a, c]);
        assert!(doc.get_shape(c).is_none());
        assert!(doc.get_shape(b).is_some());

        let deleted: Vec<ShapeId> = doc.take_deltas().iter().map(ShapeDelta::id).collect();
        assert_eq!(deleted, vec![a, c]);
    }

    #[test]
    fn test_duplicate_remaps_connectors() {
        let mut doc = CanvasDocument::new();
        let a = add_box(&mut doc, 0.0, 0.0, 40.0, 40.0);
        let b = add_box(&mut doc, 200.0, 0.0, 240.0, 40.0);
        let c = connect(&mut doc, a, b);

        let clones = doc.duplicate(&[a, c], Vec2::new(20.0, 20.0));
        assert_eq!(clones.len(), 2);
        assert_eq!(doc.len(), 5);
        assert_eq!(doc.get_shape(a).unwrap().bounds(), Rect::new(0.0, 0.0, 40.0, 40.0));
        assert_eq!(doc.get_shape(clones[0]).unwrap().bounds(), Rect::new(20.0, 20.0, 60.0, 60.0));

        let conn = doc.get_shape(clones[1]).unwrap().as_connector().unwrap();
        assert_eq!(conn.start.bound_shape(), Some(clones[0]));
        assert!(!conn.end.is_bound());
    }

    #[test]
    fn test_json_roundtrip_rebuilds_index() {
        let mut doc = CanvasDocument::new();
        let a = add_box(&mut doc, 0.0, 0.0, 40.0, 40.0);
        let b = add_box(&mut doc, 200.0, 0.0, 240.0, 40.0);
        let c = connect(&mut doc, a, b);

        let restored = CanvasDocument::from_json(&doc.to_json().unwrap()).unwrap();
        assert_eq!(restored.z_order(), doc.z_order());
        assert_eq!(restored.hit_test(Point::new(20.0, 20.0), 0.0), Some(a));
        assert_eq!(restored.hit_test(Point::new(120.0, 20.0), 2.0), Some(c));
    }

    #[test]
    fn test_canvas_selection() {
        let mut canvas = Canvas::new();
        let id = add_box(&mut canvas.document, 0.0, 0.0, 100.0, 100.0);

        assert!(!canvas.is_selected(id));
        canvas.select(id);
        assert!(canvas.is_selected(id));
        canvas.set_tool(ToolKind::Box);
        assert!(!canvas.is_selected(id));
    }

    #[test]
    fn test_delete_selected() {
        let mut canvas = Canvas::new();
        let id = add_box(&mut canvas.document, 0.0, 0.0, 100.0, 100.0);

        canvas.select(id);
        canvas.delete_selected();

        assert!(canvas.document.is_empty());
        assert!(canvas.selection.is_empty());
        assert!(canvas.document.can_undo());
    }

    #[test]
    fn test_undo_add_shape() {
        let mut doc = CanvasDocument::new();

        doc.push_undo();
        let id = add_box(&mut doc, 0.0, 0.0, 100.0, 100.0);

        assert_eq!(doc.len(), 1);
        assert!(doc.can_undo());

        assert!(doc.undo());
        assert!(doc.is_empty());
        assert!(doc.can_redo());
        assert!(doc.hit_test(Point::new(50.0, 50.0), 0.0).is_none());

        assert!(doc.redo());
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.hit_test(Point::new(50.0, 50.0), 0.0), Some(id));
    }

    #[test]
    fn test_undo_clears_redo() {
        let mut doc = CanvasDocument::new();

        doc.push_undo();
        add_box(&mut doc, 0.0, 0.0, 100.0, 100.0);

        assert!(doc.undo());
        assert!(doc.can_redo());

        doc.push_undo();
        add_box(&mut doc, 50.0, 50.0, 150.0, 150.0);
        assert!(!doc.can_redo());
    }

    #[test]
    fn test_undo_empty_stack() {
        let mut doc = CanvasDocument::new();
        assert!(!doc.undo());
        assert!(!doc.redo());
    }

    #[test]
    fn test_hit_order_follows_layer_moves_and_undo() {
        let mut doc = CanvasDocument::new();
        let bottom = add_box(&mut doc, 0.0, 0.0, 100.0, 100.0);
        let top = add_box(&mut doc, 50.0, 50.0, 150.0, 150.0);
        let overlap = Point::new(75.0, 75.0);
        assert_eq!(doc.hit_test(overlap, 0.0), Some(top));

        doc.push_undo();
        doc.send_to_back(top);
        assert_eq!(doc.hit_test(overlap, 0.0), Some(bottom));
        assert_eq!(doc.shapes_at_point(overlap, 0.0), vec![bottom, top]);

        assert!(doc.bring_forward(top));
        assert_eq!(doc.hit_test(overlap, 0.0), Some(top));
        assert!(doc.send_backward(top));
        assert_eq!(doc.hit_test(overlap, 0.0), Some(bottom));

        assert!(doc.undo());
        assert_eq!(doc.z_order(), &[bottom, top]);
        assert_eq!(doc.hit_test(overlap, 0.0), Some(top));

        let newest = add_box(&mut doc, 60.0, 60.0, 90.0, 90.0);
        assert_eq!(doc.hit_test(overlap, 0.0), Some(newest));
    }

    #[test]
    fn test_retitle_reaches_undo_history() {
        let mut doc = CanvasDocument::new();
        let portal = doc.add_shape(Shape::Portal(Portal::new(Point::ZERO, "a")));
        doc.push_undo();
        add_box(&mut doc, 500.0, 500.0, 600.0, 600.0);
        doc.take_deltas();

        assert_eq!(doc.retitle_portals("a", "b"), 1);
        assert!(doc.take_deltas().is_empty());

        assert!(doc.undo());
        assert_eq!(doc.len(), 1);
        let title = |doc: &CanvasDocument| {
            doc.get_shape(portal)
                .and_then(Shape::as_portal)
                .map(|p| p.page_title.clone())
        };
        assert_eq!(title(&doc).as_deref(), Some("b"));

        assert!(doc.redo());
        assert_eq!(title(&doc).as_deref(), Some("b"));
    }
}
