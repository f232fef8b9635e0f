//! Camera module for pan/zoom transforms.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

#[cfg(target_arch = "wasm32")]
use web_time::{Duration, Instant};
#[cfg(not(target_arch = "wasm32"))]
use std::time::{Duration, Instant};

/// Multiplier applied by one zoom-in step (and divided by one zoom-out step).
pub const ZOOM_STEP: f64 = 1.25;
/// Lowest zoom factor.
pub const MIN_ZOOM: f64 = 0.1;
/// Highest zoom factor.
pub const MAX_ZOOM: f64 = 8.0;
/// Default length of a keyboard/button zoom animation.
pub const DEFAULT_ZOOM_ANIMATION: Duration = Duration::from_millis(300);

fn default_animation_duration() -> Duration {
    DEFAULT_ZOOM_ANIMATION
}

/// An in-flight zoom change that keeps `anchor` (screen space) fixed.
#[derive(Debug, Clone, Copy)]
struct ZoomAnimation {
    from: f64,
    to: f64,
    anchor: Point,
    /// Set on the first tick, so animations can be requested without a clock.
    started: Option<Instant>,
}

/// Camera manages the view transform for the canvas.
///
/// It handles panning (translation) and zooming (scaling) operations,
/// converting between screen coordinates and world coordinates.
/// A zoom of 1.0 is shown as 100%.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    /// Current translation offset (pan)
    pub offset: Vec2,
    /// Current zoom level
    pub zoom: f64,
    /// Minimum allowed zoom level
    pub min_zoom: f64,
    /// Maximum allowed zoom level
    pub max_zoom: f64,
    #[serde(skip, default = "default_animation_duration")]
    animation_duration: Duration,
    #[serde(skip)]
    animation: Option<ZoomAnimation>,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
            animation_duration: DEFAULT_ZOOM_ANIMATION,
            animation: None,
        }
    }
}

impl Camera {
    /// Create a new camera with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a camera whose zoom animations last `duration`.
    pub fn with_animation_duration(duration: Duration) -> Self {
        Self {
            animation_duration: duration,
            ..Self::default()
        }
    }

    /// Get the affine transform for rendering.
    ///
    /// This transform converts world coordinates to screen coordinates.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.zoom)
    }

    /// Get the inverse transform for input handling.
    ///
    /// This transform converts screen coordinates to world coordinates.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.zoom) * Affine::translate(-self.offset)
    }

    /// Convert a screen point to world coordinates.
    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    /// Convert a world point to screen coordinates.
    pub fn world_to_screen(&self, world_point: Point) -> Point {
        self.transform() * world_point
    }

    /// Pan the camera by a delta in screen coordinates.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    fn clamp_zoom(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min_zoom, self.max_zoom)
    }

    /// Set the zoom immediately, keeping `anchor` (screen space) fixed.
    fn apply_zoom_about(&mut self, zoom: f64, anchor: Point) {
        let world_point = self.screen_to_world(anchor);
        self.zoom = zoom;
        let new_screen = self.world_to_screen(world_point);
        self.offset += anchor - new_screen;
    }

    /// Set the zoom factor immediately (about the screen origin), cancelling any animation.
    pub fn set_zoom(&mut self, factor: f64) {
        self.animation = None;
        self.zoom = self.clamp_zoom(factor);
    }

    /// Zoom the camera, keeping the given screen point fixed.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        self.animation = None;
        let new_zoom = self.clamp_zoom(self.zoom * factor);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }
        self.apply_zoom_about(new_zoom, screen_point);
    }

    /// Start an animated zoom toward `target`, keeping `anchor` fixed on screen.
    pub fn animate_zoom_to(&mut self, target: f64, anchor: Point) {
        let to = self.clamp_zoom(target);
        if self.animation_duration.is_zero() {
            self.animation = None;
            self.apply_zoom_about(to, anchor);
            return;
        }
        self.animation = Some(ZoomAnimation {
            from: self.zoom,
            to,
            anchor,
            started: None,
        });
    }

    /// One discrete step in (100% → 125%).
    pub fn zoom_in(&mut self, anchor: Point) {
        self.animate_zoom_to(self.target_zoom() * ZOOM_STEP, anchor);
    }

    /// One discrete step out (100% → 80%).
    pub fn zoom_out(&mut self, anchor: Point) {
        self.animate_zoom_to(self.target_zoom() / ZOOM_STEP, anchor);
    }

    /// Animate back to 100%, keeping `anchor` (normally the viewport center) fixed.
    pub fn reset_zoom(&mut self, anchor: Point) {
        self.animate_zoom_to(1.0, anchor);
    }

    /// Advance the zoom animation. Returns true while it is still running.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(mut anim) = self.animation else {
            return false;
        };
        let started = *anim.started.get_or_insert(now);
        let elapsed = now.saturating_duration_since(started);
        let t = (elapsed.as_secs_f64() / self.animation_duration.as_secs_f64()).clamp(0.0, 1.0);
        let eased = 1.0 - (1.0 - t).powi(3);
        self.apply_zoom_about(anim.from + (anim.to - anim.from) * eased, anim.anchor);

        if t >= 1.0 {
            self.animation = None;
            false
        } else {
            self.animation = Some(anim);
            true
        }
    }

    /// Jump to the end of any running animation.
    pub fn finish_animation(&mut self) {
        if let Some(anim) = self.animation.take() {
            self.apply_zoom_about(anim.to, anim.anchor);
        }
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// The zoom the camera settles at once the current animation ends.
    pub fn target_zoom(&self) -> f64 {
        self.animation.map_or(self.zoom, |a| a.to)
    }

    /// Current zoom as a whole percentage.
    pub fn zoom_percent(&self) -> u32 {
        (self.zoom * 100.0).round() as u32
    }

    /// Reset camera to default position and zoom.
    pub fn reset(&mut self) {
        self.animation = None;
        self.offset = Vec2::ZERO;
        self.zoom = 1.0;
    }

    /// Fit the camera to show the given bounding box.
    pub fn fit_to_bounds(&mut self, bounds: Rect, viewport: Size, padding: f64) {
        self.animation = None;
        if bounds.is_zero_area() {
            self.reset();
            return;
        }

        let padded_viewport = Size::new(
            (viewport.width - padding * 2.0).max(1.0),
            (viewport.height - padding * 2.0).max(1.0),
        );

        let scale_x = padded_viewport.width / bounds.width();
        let scale_y = padded_viewport.height / bounds.height();
        self.zoom = self.clamp_zoom(scale_x.min(scale_y));

        // Center the bounds in the viewport
        let bounds_center = bounds.center();
        let viewport_center = Point::new(viewport.width / 2.0, viewport.height / 2.0);

        self.offset = Vec2::new(
            viewport_center.x - bounds_center.x * self.zoom,
            viewport_center.y - bounds_center.y * self.zoom,
        );
    }
}
