//! Uniform-grid spatial index over shape bounds.
//!
//! The index only answers "which shapes might be here"; exact hit-testing and
//! z-order sorting happen in [`crate::canvas::CanvasDocument`].

use crate::shapes::ShapeId;
use kurbo::{Point, Rect};
use std::collections::{HashMap, HashSet};

/// Default grid cell size in world units.
pub const DEFAULT_CELL_SIZE: f64 = 128.0;

/// Shapes (and queries) touching more cells than this skip the grid.
const MAX_CELL_SPAN: f64 = 4096.0;

type Cell = (i64, i64);

/// Grid buckets mapping cells to the shapes whose bounds touch them.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f64,
    cells: HashMap<Cell, HashSet<ShapeId>>,
    /// Shapes too large for the grid; checked by every query.
    oversized: HashSet<ShapeId>,
    bounds: HashMap<ShapeId, Rect>,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

impl SpatialIndex {
    /// Create an empty index with the given cell size.
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size: if cell_size.is_finite() && cell_size >= 1.0 { cell_size } else { DEFAULT_CELL_SIZE },
            cells: HashMap::new(),
            oversized: HashSet::new(),
            bounds: HashMap::new(),
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Grid cells `rect` touches, or `None` when there are too many to list
    /// (or the rect is not finite).
    fn cells_for(&self, rect: Rect) -> Option<Vec<Cell>> {
        let rect = rect.abs();
        let x0 = (rect.x0 / self.cell_size).floor();
        let y0 = (rect.y0 / self.cell_size).floor();
        let x1 = (rect.x1 / self.cell_size).floor();
        let y1 = (rect.y1 / self.cell_size).floor();
        let span = (x1 - x0 + 1.0) * (y1 - y0 + 1.0);
        if !(span <= MAX_CELL_SPAN) {
            return None;
        }
        let (x0, y0, x1, y1) = (x0 as i64, y0 as i64, x1 as i64, y1 as i64);
        Some(
            (x0..=x1)
                .flat_map(|cx| (y0..=y1).map(move |cy| (cx, cy)))
                .collect(),
        )
    }

    /// Insert or move a shape.
    pub fn insert(&mut self, id: ShapeId, bounds: Rect) {
        if let Some(old) = self.bounds.get(&id) {
            if *old == bounds {
                return;
            }
            self.remove(id);
        }
        match self.cells_for(bounds) {
            Some(cells) => {
                for cell in cells {
                    self.cells.entry(cell).or_default().insert(id);
                }
            }
            None => {
                log::debug!("shape {id} spans too many cells; indexed as oversized");
                self.oversized.insert(id);
            }
        }
        self.bounds.insert(id, bounds);
    }

    /// Remove a shape. Returns false if it was not indexed.
    pub fn remove(&mut self, id: ShapeId) -> bool {
        let Some(bounds) = self.bounds.remove(&id) else {
            return false;
        };
        if self.oversized.remove(&id) {
            return true;
        }
        for cell in self.cells_for(bounds).unwrap_or_default() {
            if let Some(bucket) = self.cells.get_mut(&cell) {
                bucket.remove(&id);
                if bucket.is_empty() {
                    self.cells.remove(&cell);
                }
            }
        }
        true
    }

    /// Indexed bounds of a shape.
    pub fn bounds_of(&self, id: ShapeId) -> Option<Rect> {
        self.bounds.get(&id).copied()
    }

    /// Shapes whose bounds, grown by `tolerance`, contain `point`.
    pub fn query_point(&self, point: Point, tolerance: f64) -> HashSet<ShapeId> {
        let area = Rect::from_center_size(point, (tolerance * 2.0, tolerance * 2.0));
        self.query_rect(area)
    }

    /// Shapes whose bounds overlap `rect` (touching edges count).
    pub fn query_rect(&self, rect: Rect) -> HashSet<ShapeId> {
        let rect = rect.abs();
        let candidates: Box<dyn Iterator<Item = &ShapeId> + '_> = match self.cells_for(rect) {
            Some(cells) => Box::new(
                cells
                    .into_iter()
                    .filter_map(|cell| self.cells.get(&cell))
                    .flatten()
                    .chain(&self.oversized),
            ),
            // A query wider than the grid limit checks every shape once.
            None => Box::new(self.bounds.keys()),
        };
        candidates
            .copied()
            .filter(|id| self.bounds.get(id).is_some_and(|b| overlaps(*b, rect)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.oversized.clear();
        self.bounds.clear();
    }

    /// Number of occupied grid cells.
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }
}

/// Closed-interval overlap, so zero-width bounds (straight connectors) still match.
fn overlaps(a: Rect, b: Rect) -> bool {
    a.x0 <= b.x1 && a.x1 >= b.x0 && a.y0 <= b.y1 && a.y1 >= b.y0
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_insert_and_query_point() {
        let mut index = SpatialIndex::default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        index.insert(a, Rect::new(5.0, 5.0, 50.0, 50.0));
        index.insert(b, Rect::new(500.0, 500.0, 600.0, 600.0));

        let hits = index.query_point(Point::new(20.0, 20.0), 0.0);
        assert!(hits.contains(&a));
        assert!(!hits.contains(&b));
    }

    #[test]
    fn test_move_updates_cells() {
        let mut index = SpatialIndex::new(100.0);
        let a = Uuid::new_v4();
        index.insert(a, Rect::new(0.0, 0.0, 10.0, 10.0));
        index.insert(a, Rect::new(1000.0, 1000.0, 1010.0, 1010.0));

        assert!(index.query_point(Point::new(5.0, 5.0), 1.0).is_empty());
        assert!(index.query_point(Point::new(1005.0, 1005.0), 1.0).contains(&a));
        assert_eq!(index.occupied_cells(), 1);
    }

    #[test]
    fn test_remove() {
        let mut index = SpatialIndex::default();
        let a = Uuid::new_v4();
        index.insert(a, Rect::new(0.0, 0.0, 300.0, 300.0));
        assert!(index.occupied_cells() > 1);
        assert!(index.remove(a));
        assert!(!index.remove(a));
        assert!(index.is_empty());
        assert_eq!(index.occupied_cells(), 0);
    }

    #[test]
    fn test_zero_height_bounds() {
        let mut index = SpatialIndex::default();
        let a = Uuid::new_v4();
        index.insert(a, Rect::new(0.0, 50.0, 200.0, 50.0));
        assert!(index.query_rect(Rect::new(90.0, 40.0, 110.0, 60.0)).contains(&a));
    }

    #[test]
    fn test_negative_coordinates() {
        let mut index = SpatialIndex::default();
        let a = Uuid::new_v4();
        index.insert(a, Rect::new(-300.0, -300.0, -200.0, -200.0));
        assert!(index.query_point(Point::new(-250.0, -250.0), 0.0).contains(&a));
    }

    #[test]
    fn test_huge_bounds_skip_the_grid() {
        let mut index = SpatialIndex::default();
        let huge = Uuid::new_v4();
        let small = Uuid::new_v4();
        index.insert(huge, Rect::new(-1e12, -1e12, 1e12, 1e12));
        index.insert(small, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(index.occupied_cells(), 1);

        let hits = index.query_point(Point::new(5.0, 5.0), 0.0);
        assert!(hits.contains(&huge) && hits.contains(&small));
        assert!(index.query_point(Point::new(5e11, 5e11), 0.0).contains(&huge));

        let all = index.query_rect(Rect::new(-1e9, -1e9, 1e9, 1e9));
        assert_eq!(all.len(), 2);

        assert!(index.remove(huge));
        assert!(!index.query_point(Point::new(5.0, 5.0), 0.0).contains(&huge));
        assert_eq!(index.len(), 1);
    }
}
