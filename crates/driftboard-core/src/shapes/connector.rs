//! Connector shape (arrow between two endpoints that may be bound to shapes).

use super::{ShapeId, ShapeStyle, ShapeTrait, point_to_segment_dist};
use kurbo::{Affine, Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One end of a connector.
///
/// A bound endpoint stores only the target's id and a normalized anchor inside the
/// target's bounds; its world position is recomputed from the target on access.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Endpoint {
    /// Unattached point in world coordinates.
    Free(Point),
    /// Attached to another shape.
    Bound {
        shape: ShapeId,
        /// Anchor within the shape's bounds, each axis in `0.0..=1.0`.
        anchor: Vec2,
    },
}

impl Endpoint {
    /// Bind to `shape` at the world point `at`, normalized against `bounds`.
    pub fn bound_at(shape: ShapeId, bounds: Rect, at: Point) -> Self {
        let nx = if bounds.width() > f64::EPSILON { (at.x - bounds.x0) / bounds.width() } else { 0.5 };
        let ny = if bounds.height() > f64::EPSILON { (at.y - bounds.y0) / bounds.height() } else { 0.5 };
        Endpoint::Bound {
            shape,
            anchor: Vec2::new(nx.clamp(0.0, 1.0), ny.clamp(0.0, 1.0)),
        }
    }

    /// The shape this endpoint is bound to, if any.
    pub fn bound_shape(&self) -> Option<ShapeId> {
        match self {
            Endpoint::Free(_) => None,
            Endpoint::Bound { shape, .. } => Some(*shape),
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, Endpoint::Bound { .. })
    }
}

/// A connector drawn between two endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connector {
    pub(crate) id: ShapeId,
    /// Start endpoint.
    pub start: Endpoint,
    /// End endpoint.
    pub end: Endpoint,
    /// Rendered segment, derived from the endpoints by [`Connector::resolve`].
    #[serde(skip)]
    resolved: (Point, Point),
    /// Style properties.
    pub style: ShapeStyle,
}

impl Connector {
    /// Create a connector between two endpoints.
    pub fn new(start: Endpoint, end: Endpoint) -> Self {
        let seed = |e: &Endpoint| match e {
            Endpoint::Free(p) => *p,
            Endpoint::Bound { .. } => Point::ZERO,
        };
        let resolved = (seed(&start), seed(&end));
        let mut style = ShapeStyle::default();
        style.fill_color = None;
        Self {
            id: Uuid::new_v4(),
            start,
            end,
            resolved,
            style,
        }
    }

    /// Create a connector with two free endpoints.
    pub fn free(start: Point, end: Point) -> Self {
        Self::new(Endpoint::Free(start), Endpoint::Free(end))
    }

    /// The rendered segment (start, end) in world coordinates.
    pub fn segment(&self) -> (Point, Point) {
        self.resolved
    }

    /// Length of the rendered segment.
    pub fn length(&self) -> f64 {
        let (a, b) = self.resolved;
        (b - a).hypot()
    }

    /// Whether both endpoints are bound to shapes.
    pub fn is_fully_bound(&self) -> bool {
        self.start.is_bound() && self.end.is_bound()
    }

    /// Whether either endpoint is bound to `shape`.
    pub fn is_bound_to(&self, shape: ShapeId) -> bool {
        self.start.bound_shape() == Some(shape) || self.end.bound_shape() == Some(shape)
    }

    /// Ids of the shapes this connector is bound to.
    pub fn bound_shapes(&self) -> impl Iterator<Item = ShapeId> + '_ {
        self.start.bound_shape().into_iter().chain(self.end.bound_shape())
    }

    /// Turn every endpoint bound to `shape` into a free point at its last rendered position.
    pub fn unbind(&mut self, shape: ShapeId) {
        if self.start.bound_shape() == Some(shape) {
            self.start = Endpoint::Free(self.resolved.0);
        }
        if self.end.bound_shape() == Some(shape) {
            self.end = Endpoint::Free(self.resolved.1);
        }
    }

    /// Point bindings at new shape ids; endpoints whose target has no mapping become free.
    pub fn remap_bindings(&mut self, map: impl Fn(ShapeId) -> Option<ShapeId>) {
        let (rs, re) = self.resolved;
        for (endpoint, at) in [(&mut self.start, rs), (&mut self.end, re)] {
            if let Endpoint::Bound { shape, anchor } = *endpoint {
                *endpoint = match map(shape) {
                    Some(new_shape) => Endpoint::Bound { shape: new_shape, anchor },
                    None => Endpoint::Free(at),
                };
            }
        }
    }

    /// Recompute the rendered segment from the current bounds of the bound shapes.
    ///
    /// Bound ends are clipped to the edge of their shape along the line toward the
    /// other end. A binding whose target is missing is converted to a free point.
    pub fn resolve(&mut self, bounds_of: impl Fn(ShapeId) -> Option<Rect>) {
        let (prev_start, prev_end) = self.resolved;
        let start_info = reference(&mut self.start, prev_start, &bounds_of);
        let end_info = reference(&mut self.end, prev_end, &bounds_of);

        let start = match start_info {
            (p, Some(rect)) => clip_to_bounds(rect, p, end_info.0),
            (p, None) => p,
        };
        let end = match end_info {
            (p, Some(rect)) => clip_to_bounds(rect, p, start_info.0),
            (p, None) => p,
        };
        self.resolved = (start, end);
    }
}

/// World anchor point of an endpoint plus the bounds it is clipped to, if bound.
fn reference(
    endpoint: &mut Endpoint,
    fallback: Point,
    bounds_of: &impl Fn(ShapeId) -> Option<Rect>,
) -> (Point, Option<Rect>) {
    match *endpoint {
        Endpoint::Free(p) => (p, None),
        Endpoint::Bound { shape, anchor } => match bounds_of(shape) {
            Some(rect) => (
                Point::new(
                    rect.x0 + anchor.x * rect.width(),
                    rect.y0 + anchor.y * rect.height(),
                ),
                Some(rect),
            ),
            None => {
                log::debug!("connector endpoint lost its target {shape}; unbinding");
                *endpoint = Endpoint::Free(fallback);
                (fallback, None)
            }
        },
    }
}

/// Point where the segment from `inside` toward `toward` leaves `rect`.
///
/// Returns `inside` unchanged when `toward` also lies within `rect`.
pub fn clip_to_bounds(rect: Rect, inside: Point, toward: Point) -> Point {
    if rect.contains(toward) {
        return inside;
    }
    let d = toward - inside;
    let mut t_exit = 1.0_f64;
    if d.x.abs() > f64::EPSILON {
        let edge = if d.x > 0.0 { rect.x1 } else { rect.x0 };
        t_exit = t_exit.min((edge - inside.x) / d.x);
    }
    if d.y.abs() > f64::EPSILON {
        let edge = if d.y > 0.0 { rect.y1 } else { rect.y0 };
        t_exit = t_exit.min((edge - inside.y) / d.y);
    }
    inside + d * t_exit.clamp(0.0, 1.0)
}

impl ShapeTrait for Connector {
    fn id(&self) -> ShapeId {
        self.id
    }

    fn bounds(&self) -> Rect {
        let (a, b) = self.resolved;
        Rect::from_points(a, b)
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let (a, b) = self.resolved;
        point_to_segment_dist(point, a, b) <= tolerance + self.style.stroke_width / 2.0
    }

    fn style(&self) -> &ShapeStyle {
        &self.style
    }

    fn style_mut(&mut self) -> &mut ShapeStyle {
        &mut self.style
    }

    fn transform(&mut self, affine: Affine) {
        // Bound ends follow their targets on the next resolve.
        if let Endpoint::Free(p) = &mut self.start {
            *p = affine * *p;
        }
        if let Endpoint::Free(p) = &mut self.end {
            *p = affine * *p;
        }
        self.resolved = (affine * self.resolved.0, affine * self.resolved.1);
    }
}
