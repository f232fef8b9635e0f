//! Per-page editor: the single entry point that turns input events into model changes.

use crate::camera::{Camera, DEFAULT_ZOOM_ANIMATION};
use crate::canvas::{Canvas, CanvasDocument, CanvasError, ShapeDelta, clone_shapes};
use crate::clipboard::{self, ClipboardError, ClipboardPayload, PasteContent};
use crate::context_menu::{ContextMenu, MenuAction, MenuItem, OpenMenu};
use crate::embed::{EmbedError, EmbedQueue};
use crate::input::{InputEvent, InputState, Key, Modifiers, MouseButton, Platform};
use crate::linking::{LinkError, PageId, PageRegistry, PendingRename, QuickSearch, RenameOutcome};
use crate::selection::{Marquee, MultiMoveState};
use crate::shapes::{BoxShape, Connector, Embed, Endpoint, Shape, ShapeId, Text};
use crate::tools::{DrawnGesture, GestureState, ToolKind};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[cfg(target_arch = "wasm32")]
use web_time::Instant;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

/// Editor errors.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Canvas(#[from] CanvasError),
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
    #[error(transparent)]
    Embed(#[from] EmbedError),
    #[error("Quick search is not open")]
    NoQuickSearch,
    #[error("No search result at index {0}")]
    NoSearchResult(usize),
    #[error("No embed frame is waiting for a URL")]
    NoEmbedFrame,
    #[error("The page being edited cannot be deleted")]
    CurrentPage,
}

/// Engine knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Spatial index cell size in world units.
    pub cell_size: f64,
    /// Pointer hit tolerance in screen pixels.
    pub hit_tolerance: f64,
    /// Offset applied to duplicated and pasted shapes.
    pub clone_offset: Vec2,
    /// Length of keyboard and button zoom animations, in milliseconds.
    pub zoom_animation_ms: u64,
    /// Stay on a drawing tool after a shape is committed.
    pub keep_tool_after_draw: bool,
    /// Decides whether Cmd or Ctrl is the primary modifier.
    pub platform: Platform,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            cell_size: crate::spatial::DEFAULT_CELL_SIZE,
            hit_tolerance: 5.0,
            clone_offset: Vec2::new(20.0, 20.0),
            zoom_animation_ms: DEFAULT_ZOOM_ANIMATION.as_millis() as u64,
            keep_tool_after_draw: false,
            platform: Platform::current(),
        }
    }
}

impl EditorConfig {
    pub fn zoom_animation(&self) -> Duration {
        Duration::from_millis(self.zoom_animation_ms)
    }
}

/// Notifications for the host, collected per dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    /// An embed frame was drawn; answer with [`Editor::submit_embed_url`].
    EmbedUrlRequested { frame: Rect },
    /// A text shape wants its content edited; answer with [`Editor::set_text`].
    EditText { shape_id: ShapeId },
    /// The title menu asked to rename the page.
    RenameRequested { current_title: String },
    /// A rename waits for [`Editor::confirm_rename`] or [`Editor::decline_rename`].
    ConfirmRename(PendingRename),
    /// A portal was double-clicked.
    OpenPage(PageId),
    /// Text the host should put on the system clipboard.
    CopyToClipboard(String),
    /// A recoverable failure worth showing to the user.
    Notice(String),
}

/// Edits one page of a [`PageRegistry`].
///
/// The page's document is moved into the editor's [`Canvas`] while it is open and
/// handed back for registry-wide operations such as backlink counts and renames.
#[derive(Debug)]
pub struct Editor {
    config: EditorConfig,
    page_id: PageId,
    registry: PageRegistry,
    canvas: Canvas,
    input: InputState,
    menu: ContextMenu,
    quick_search: Option<QuickSearch>,
    embed_frame: Option<Rect>,
    embeds: EmbedQueue,
    events: Vec<EditorEvent>,
}

impl Editor {
    /// Open `page_id` with the default configuration.
    pub fn new(page_id: PageId, registry: PageRegistry) -> Result<Self, EditorError> {
        Self::with_config(page_id, registry, EditorConfig::default())
    }

    pub fn with_config(
        page_id: PageId,
        mut registry: PageRegistry,
        config: EditorConfig,
    ) -> Result<Self, EditorError> {
        let mut document = registry
            .take_document(page_id)
            .ok_or(LinkError::PageNotFound(page_id))?;
        document.set_cell_size(config.cell_size);
        document.take_deltas();
        let mut canvas = Canvas::with_document(document);
        canvas.camera = Camera::with_animation_duration(config.zoom_animation());
        log::info!("editing page {:?}", registry.title(page_id).unwrap_or_default());
        let mut editor = Self {
            config,
            page_id,
            registry,
            canvas,
            input: InputState::new(),
            menu: ContextMenu::new(),
            quick_search: None,
            embed_frame: None,
            embeds: EmbedQueue::new(),
            events: Vec::new(),
        };
        editor.requeue_pending_embeds();
        Ok(editor)
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Title of the page being edited.
    pub fn title(&self) -> &str {
        self.registry.title(self.page_id).unwrap_or_default()
    }

    /// The page registry. The open page's shapes live in [`document`](Self::document)
    /// until the editor is closed.
    pub fn registry(&self) -> &PageRegistry {
        &self.registry
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn document(&self) -> &CanvasDocument {
        &self.canvas.document
    }

    pub fn camera(&self) -> &Camera {
        &self.canvas.camera
    }

    pub fn selection(&self) -> &[ShapeId] {
        &self.canvas.selection
    }

    pub fn current_tool(&self) -> ToolKind {
        self.canvas.tool_manager.current_tool
    }

    pub fn context_menu(&self) -> Option<&OpenMenu> {
        self.menu.current()
    }

    pub fn quick_search(&self) -> Option<&QuickSearch> {
        self.quick_search.as_ref()
    }

    /// Frame drawn with the embed tool that still waits for a URL.
    pub fn pending_embed_frame(&self) -> Option<Rect> {
        self.embed_frame
    }

    /// Embeds waiting for the next [`tick`](Self::tick).
    pub fn pending_embeds(&self) -> usize {
        self.embeds.len()
    }

    pub fn set_viewport_size(&mut self, width: f64, height: f64) {
        self.canvas.set_viewport_size(width, height);
    }

    /// Shape changes since the last call.
    pub fn take_deltas(&mut self) -> Vec<ShapeDelta> {
        self.canvas.document.take_deltas()
    }

    /// Host notifications since the last call.
    pub fn take_events(&mut self) -> Vec<EditorEvent> {
        std::mem::take(&mut self.events)
    }

    /// Close the editor, handing the page's document back to the registry.
    pub fn into_registry(mut self) -> PageRegistry {
        let document = std::mem::take(&mut self.canvas.document);
        self.registry.put_document(self.page_id, document);
        self.registry
    }

    /// Switch to another page, dropping all transient interaction state.
    pub fn open_page(&mut self, page_id: PageId) -> Result<(), EditorError> {
        if page_id == self.page_id {
            return Ok(());
        }
        let mut document = self
            .registry
            .take_document(page_id)
            .ok_or(LinkError::PageNotFound(page_id))?;
        document.set_cell_size(self.config.cell_size);
        // Changes made while the page was closed were never shown; start clean.
        document.take_deltas();
        let previous = std::mem::replace(&mut self.canvas.document, document);
        self.registry.put_document(self.page_id, previous);
        self.page_id = page_id;

        self.canvas.tool_manager.cancel();
        self.canvas.clear_selection();
        self.canvas.camera = Camera::with_animation_duration(self.config.zoom_animation());
        self.menu.close();
        self.quick_search = None;
        self.embed_frame = None;
        self.embeds = EmbedQueue::new();
        self.requeue_pending_embeds();
        log::info!("editing page {:?}", self.title());
        Ok(())
    }

    /// Run `f` with the open page's document back in the registry.
    fn with_synced_registry<R>(&mut self, f: impl FnOnce(&mut PageRegistry) -> R) -> R {
        let document = std::mem::take(&mut self.canvas.document);
        self.registry.put_document(self.page_id, document);
        let result = f(&mut self.registry);
        self.canvas.document = self.registry.take_document(self.page_id).unwrap_or_default();
        result
    }

    /// Run a rename step on the registry, reporting portals on the open page that
    /// it retitled as updates.
    fn with_retitled_portals<R>(&mut self, f: impl FnOnce(&mut PageRegistry) -> R) -> R {
        let old_title = self.title().to_string();
        let portals: Vec<ShapeId> = self
            .canvas
            .document
            .portals()
            .filter(|p| p.targets(&old_title))
            .map(|p| p.id)
            .collect();
        let result = self.with_synced_registry(f);
        for id in portals {
            let retitled = self
                .canvas
                .document
                .get_shape(id)
                .and_then(Shape::as_portal)
                .is_some_and(|p| !p.targets(&old_title));
            if retitled {
                self.canvas.document.record_updated(id);
            }
        }
        result
    }

    fn tolerance(&self) -> f64 {
        self.config.hit_tolerance / self.canvas.camera.zoom
    }

    fn to_world(&self, screen: Point) -> Point {
        self.canvas.camera.screen_to_world(screen)
    }

    /// Feed one input event.
    pub fn dispatch(&mut self, event: InputEvent) {
        self.input.handle(&event);
        match event {
            InputEvent::PointerDown {
                position,
                button,
                modifiers,
            } => self.handle_press(position, button, modifiers),
            InputEvent::PointerMove { position, .. } => self.handle_drag(position),
            InputEvent::PointerUp {
                position, button, ..
            } => self.handle_release(position, button),
            InputEvent::DoubleClick { position } => self.handle_double_click(position),
            InputEvent::KeyDown { key, modifiers } => self.handle_key(&key, modifiers),
            InputEvent::KeyUp { .. } => {}
            InputEvent::Wheel {
                position,
                delta,
                modifiers,
            } => self.handle_wheel(position, delta, modifiers),
        }
    }

    fn handle_press(&mut self, screen: Point, button: MouseButton, modifiers: Modifiers) {
        if button == MouseButton::Right {
            let targets = self.context_menu_targets(screen);
            self.quick_search = None;
            self.menu.open_at(screen, &targets);
            return;
        }
        // An outside click only dismisses.
        if self.menu.close() || self.quick_search.take().is_some() {
            return;
        }
        if button == MouseButton::Middle {
            self.canvas.tool_manager.state = GestureState::Panning;
            return;
        }

        let world = self.to_world(screen);
        match self.current_tool() {
            ToolKind::Select => self.press_select(world, modifiers),
            ToolKind::Box | ToolKind::Embed => self.canvas.tool_manager.begin(world, None),
            ToolKind::Connector => {
                let target = self.bindable_at(world, None);
                self.canvas.tool_manager.begin(world, target);
            }
            ToolKind::Pan => self.canvas.tool_manager.state = GestureState::Panning,
            ToolKind::Text => self.place_text(world),
        }
    }

    fn press_select(&mut self, world: Point, modifiers: Modifiers) {
        let Some(hit) = self.canvas.document.hit_test(world, self.tolerance()) else {
            if !modifiers.shift {
                self.canvas.clear_selection();
            }
            self.canvas.tool_manager.state =
                GestureState::Marquee(Marquee::new(world, modifiers.shift));
            return;
        };

        if modifiers.shift {
            self.canvas.toggle_selection(hit);
            if !self.canvas.is_selected(hit) {
                return;
            }
        } else if !self.canvas.is_selected(hit) {
            self.canvas.select(hit);
        }

        let ids = self.canvas.selection.clone();
        let originals: Vec<(ShapeId, Shape)> = self
            .canvas
            .document
            .query_by_ids(&ids)
            .into_iter()
            .map(|shape| (shape.id(), shape))
            .collect();

        let state = if modifiers.clone_drag() {
            self.canvas.document.push_undo();
            let source_ids: Vec<ShapeId> = originals.iter().map(|(id, _)| *id).collect();
            let clones = self.canvas.document.duplicate(&source_ids, Vec2::ZERO);
            self.canvas.selection = clones.clone();
            log::debug!("cloning {} shape(s)", clones.len());
            MultiMoveState::new_duplicate(world, originals, clones)
        } else {
            MultiMoveState::new(world, originals)
        };
        self.canvas.tool_manager.state = GestureState::Moving(state);
    }

    fn handle_drag(&mut self, screen: Point) {
        // Hover moves carry no gesture.
        if !self.input.is_button_pressed(MouseButton::Left)
            && !self.input.is_button_pressed(MouseButton::Middle)
        {
            return;
        }
        let world = self.to_world(screen);
        if matches!(self.canvas.tool_manager.state, GestureState::Drawing { .. }) {
            self.canvas.tool_manager.update(world);
            return;
        }
        match &mut self.canvas.tool_manager.state {
            GestureState::Idle | GestureState::Drawing { .. } => {}
            GestureState::Marquee(marquee) => marquee.current = world,
            GestureState::Panning => self.canvas.camera.pan(self.input.pointer_delta()),
            GestureState::Moving(mm) => {
                let first_move = !mm.is_duplicate && !mm.has_moved();
                let step = world - mm.current_point;
                mm.current_point = world;
                let ids = mm.moving_ids();
                if first_move && mm.has_moved() {
                    self.canvas.document.push_undo();
                }
                self.canvas.document.translate(&ids, step);
            }
        }
    }

    fn handle_release(&mut self, screen: Point, button: MouseButton) {
        if button == MouseButton::Right {
            return;
        }
        let world = self.to_world(screen);
        if let Some(gesture) = self.canvas.tool_manager.end(world) {
            self.commit_gesture(gesture);
            return;
        }
        match self.canvas.tool_manager.cancel() {
            GestureState::Idle | GestureState::Panning | GestureState::Drawing { .. } => {}
            GestureState::Marquee(mut marquee) => {
                marquee.current = world;
                let hits = self.canvas.document.hit_test_region(marquee.to_rect());
                if !marquee.additive {
                    self.canvas.clear_selection();
                }
                for id in hits {
                    self.canvas.add_to_selection(id);
                }
            }
            GestureState::Moving(mm) => {
                if mm.has_moved() {
                    log::info!("moved {} shape(s) by {:?}", mm.original_shapes.len(), mm.delta());
                } else if mm.is_duplicate {
                    self.discard_clones(&mm);
                }
            }
        }
    }

    /// Remove clones made at the start of an alt-drag and reselect their sources.
    fn discard_clones(&mut self, mm: &MultiMoveState) {
        self.canvas.document.delete_shapes(&mm.duplicated_ids);
        self.canvas.document.pop_undo();
        self.canvas.selection = mm.original_shapes.iter().map(|(id, _)| *id).collect();
    }

    fn handle_double_click(&mut self, screen: Point) {
        if self.current_tool() != ToolKind::Select {
            return;
        }
        let world = self.to_world(screen);
        let Some(hit) = self.canvas.document.hit_test(world, self.tolerance()) else {
            self.menu.close();
            self.quick_search = Some(QuickSearch::open(&self.registry, self.page_id, world));
            return;
        };
        match self.canvas.document.get_shape(hit) {
            Some(Shape::Text(_)) => self.events.push(EditorEvent::EditText { shape_id: hit }),
            Some(Shape::Portal(portal)) => match self.registry.resolve_portal(portal) {
                Some(page) => self.events.push(EditorEvent::OpenPage(page)),
                None => self
                    .events
                    .push(EditorEvent::Notice(format!("No page titled {:?}", portal.page_title))),
            },
            _ => {}
        }
    }

    fn handle_key(&mut self, key: &Key, modifiers: Modifiers) {
        if *key == Key::Escape {
            self.escape();
            return;
        }
        if self.quick_search.is_some() {
            return;
        }
        let platform = self.config.platform;
        if modifiers.has_primary(platform) {
            match key {
                Key::Char('a') => self.select_all(),
                Key::Char('z') if modifiers.shift => {
                    self.redo();
                }
                Key::Char('z') => {
                    self.undo();
                }
                Key::Char('y') => {
                    self.redo();
                }
                Key::Char('d') => {
                    let ids = self.canvas.selection.clone();
                    self.duplicate(&ids);
                }
                Key::Char('c') => match self.copy() {
                    Ok(payload) => self
                        .events
                        .push(EditorEvent::CopyToClipboard(payload.into_string())),
                    Err(e) => log::debug!("copy skipped: {e}"),
                },
                Key::Char('=') | Key::Char('+') => self.zoom_in(),
                Key::Char('-') => self.zoom_out(),
                _ => {}
            }
            return;
        }
        if key.is_delete() {
            self.delete_selection();
            return;
        }
        match key {
            Key::Char('0') | Key::Char(')') if modifiers.shift => self.reset_zoom(),
            Key::Char('=') | Key::Char('+') => self.zoom_in(),
            Key::Char('-') => self.zoom_out(),
            Key::Char(c) if !modifiers.alt => {
                if let Some(tool) = ToolKind::from_shortcut(*c) {
                    self.set_tool(tool);
                }
            }
            _ => {}
        }
    }

    fn handle_wheel(&mut self, screen: Point, delta: Vec2, modifiers: Modifiers) {
        if modifiers.has_primary(self.config.platform) || modifiers.ctrl {
            let factor = if delta.y > 0.0 { 1.1 } else { 0.9 };
            self.canvas.camera.zoom_at(screen, factor);
        } else {
            self.canvas.camera.pan(delta);
        }
    }

    /// Cancel the innermost active thing: a gesture, then a popup, then the tool and selection.
    pub fn escape(&mut self) {
        match self.canvas.tool_manager.cancel() {
            GestureState::Idle => {}
            GestureState::Drawing { .. } => {
                log::debug!("{} gesture cancelled", self.current_tool().name());
                self.canvas.set_tool(ToolKind::Select);
                return;
            }
            GestureState::Moving(mm) => {
                if mm.is_duplicate {
                    self.discard_clones(&mm);
                } else if mm.has_moved() {
                    for (_, original) in mm.original_shapes {
                        if let Err(e) = self.canvas.document.set_shape(original) {
                            log::debug!("could not restore moved shape: {e}");
                        }
                    }
                    self.canvas.document.pop_undo();
                }
                return;
            }
            GestureState::Marquee(_) | GestureState::Panning => return,
        }
        if self.menu.close() || self.quick_search.take().is_some() || self.embed_frame.take().is_some() {
            return;
        }
        self.canvas.set_tool(ToolKind::Select);
        self.canvas.clear_selection();
    }

    /// Switch tools, abandoning any gesture. Changing tools clears the selection.
    pub fn set_tool(&mut self, tool: ToolKind) {
        if tool != self.current_tool() {
            log::debug!("tool: {}", tool.name());
        }
        self.canvas.set_tool(tool);
    }

    /// Push undo, then validate and add. Rejected shapes are logged and dropped.
    fn commit_shape(&mut self, shape: Shape) -> Option<ShapeId> {
        let kind = shape.kind();
        self.canvas.document.push_undo();
        match self.canvas.document.create_shape(shape) {
            Ok(id) => Some(id),
            Err(e) => {
                self.canvas.document.pop_undo();
                log::debug!("discarded {kind:?}: {e}");
                None
            }
        }
    }

    /// Select a freshly drawn shape and fall back to the select tool.
    fn finish_draw(&mut self, id: ShapeId) {
        if !self.config.keep_tool_after_draw {
            self.canvas.set_tool(ToolKind::Select);
        }
        self.canvas.select(id);
    }

    fn commit_gesture(&mut self, gesture: DrawnGesture) {
        let style = self.canvas.tool_manager.current_style.clone();
        match gesture.tool {
            ToolKind::Box => {
                let mut rect = BoxShape::from_corners(gesture.start, gesture.end);
                rect.corner_radius = self.canvas.tool_manager.corner_radius;
                rect.style = style;
                if let Some(id) = self.commit_shape(Shape::Box(rect)) {
                    log::info!("box {id} committed");
                    self.finish_draw(id);
                }
            }
            ToolKind::Connector => {
                let start = self.endpoint_for(gesture.start_target, gesture.start);
                let end_target = self.bindable_at(gesture.end, gesture.start_target);
                let end = self.endpoint_for(end_target, gesture.end);
                let mut conn = Connector::new(start, end);
                conn.style.stroke_color = style.stroke_color;
                conn.style.stroke_width = style.stroke_width;
                if let Some(id) = self.commit_shape(Shape::Connector(conn)) {
                    log::info!("connector {id} committed");
                    self.finish_draw(id);
                }
            }
            ToolKind::Embed => {
                let frame = gesture.rect();
                if frame.width() < BoxShape::MIN_SIDE || frame.height() < BoxShape::MIN_SIDE {
                    log::debug!("discarded embed frame of {}x{}", frame.width(), frame.height());
                    return;
                }
                self.embed_frame = Some(frame);
                self.events.push(EditorEvent::EmbedUrlRequested { frame });
            }
            ToolKind::Select | ToolKind::Pan | ToolKind::Text => {}
        }
    }

    fn endpoint_for(&self, target: Option<ShapeId>, at: Point) -> Endpoint {
        target
            .and_then(|id| self.canvas.document.get_shape(id).map(|s| (id, s.bounds())))
            .map_or(Endpoint::Free(at), |(id, bounds)| Endpoint::bound_at(id, bounds, at))
    }

    /// Topmost shape a connector end can bind to at `world`.
    ///
    /// `start` is skipped when the point lies inside it, so a connector never
    /// binds both ends to the shape it was started from.
    fn bindable_at(&self, world: Point, start: Option<ShapeId>) -> Option<ShapeId> {
        let document = &self.canvas.document;
        document
            .shapes_at_point(world, self.tolerance())
            .into_iter()
            .filter(|id| document.get_shape(*id).is_some_and(Shape::is_bindable))
            .find(|id| Some(*id) != start)
    }

    fn place_text(&mut self, world: Point) {
        let mut text = Text::new(world, String::new());
        text.style.stroke_color = self.canvas.tool_manager.current_style.stroke_color;
        if let Some(id) = self.commit_shape(Shape::Text(text)) {
            self.finish_draw(id);
            self.events.push(EditorEvent::EditText { shape_id: id });
        }
    }

    /// Replace a text shape's content. Empty content removes the shape.
    pub fn set_text(&mut self, id: ShapeId, content: &str) -> Result<(), EditorError> {
        if content.trim().is_empty() {
            self.canvas.document.delete_shapes(&[id]);
            self.canvas.prune_selection();
            return Ok(());
        }
        let content = content.to_string();
        self.canvas.document.update_shape(id, move |shape| {
            if let Shape::Text(text) = shape {
                text.content = content;
            }
        })?;
        Ok(())
    }

    /// Fill the frame drawn with the embed tool.
    pub fn submit_embed_url(&mut self, url: &str) -> Result<ShapeId, EditorError> {
        let frame = self.embed_frame.ok_or(EditorError::NoEmbedFrame)?;
        let url = url.trim();
        if url.is_empty() {
            return Err(EmbedError::Empty.into());
        }
        self.embed_frame = None;
        self.canvas.document.push_undo();
        let id = match self.canvas.document.create_shape(Shape::Embed(Embed::in_frame(frame, url))) {
            Ok(id) => id,
            Err(e) => {
                self.canvas.document.pop_undo();
                return Err(e.into());
            }
        };
        self.embeds.push(id, url);
        self.finish_draw(id);
        Ok(id)
    }

    /// Advance time: apply finished embed resolutions and step the zoom animation.
    ///
    /// Returns true while the camera is still animating.
    pub fn tick(&mut self, now: Instant) -> bool {
        for resolution in self.embeds.drain() {
            let id = resolution.shape_id;
            match resolution.result {
                Ok(descriptor) => {
                    if !self.canvas.document.apply_embed_resolution(id, descriptor) {
                        log::debug!("embed {id} is gone; resolution dropped");
                    }
                }
                Err(e) => self.embed_to_text(id, &resolution.url, &e.to_string()),
            }
        }
        self.canvas.camera.tick(now)
    }

    /// Queue every pending embed that has no live task, such as placeholders
    /// brought back by undo or stored with a page.
    fn requeue_pending_embeds(&mut self) {
        let orphans: Vec<(ShapeId, String)> = self
            .canvas
            .document
            .shapes_ordered()
            .filter_map(Shape::as_embed)
            .filter(|embed| embed.is_pending() && !self.embeds.is_queued(embed.id))
            .map(|embed| (embed.id, embed.url.clone()))
            .collect();
        for (id, url) in orphans {
            log::debug!("requeueing embed {id}");
            self.embeds.push(id, url);
        }
    }

    /// Replace an embed that failed to resolve with a text shape showing its URL.
    fn embed_to_text(&mut self, id: ShapeId, url: &str, reason: &str) {
        let Some(position) = self
            .canvas
            .document
            .get_shape(id)
            .and_then(Shape::as_embed)
            .map(|e| e.position)
        else {
            return;
        };
        log::warn!("cannot embed {url:?}: {reason}");
        self.canvas.document.delete_shapes(&[id]);
        let text = self.canvas.document.add_shape(Shape::Text(Text::new(position, url.to_string())));
        if self.canvas.is_selected(id) {
            self.canvas.prune_selection();
            self.canvas.add_to_selection(text);
        }
        self.events
            .push(EditorEvent::Notice(format!("Could not embed {url}: {reason}")));
    }

    /// Topmost shape at a screen point. Never changes the selection.
    pub fn context_menu_target(&self, screen: Point) -> Option<ShapeId> {
        self.canvas.document.hit_test(self.to_world(screen), self.tolerance())
    }

    /// Shapes a context menu at `screen` acts on: the selection when the hit is
    /// part of it, otherwise the hit alone.
    fn context_menu_targets(&self, screen: Point) -> Vec<ShapeId> {
        match self.context_menu_target(screen) {
            Some(id) if self.canvas.is_selected(id) => self.canvas.selection.clone(),
            Some(id) => vec![id],
            None => Vec::new(),
        }
    }

    /// Open the canvas or shape menu for a right-click at `screen`.
    pub fn open_context_menu(&mut self, screen: Point) {
        let targets = self.context_menu_targets(screen);
        self.quick_search = None;
        self.menu.open_at(screen, &targets);
    }

    /// Open the menu for the page title element.
    pub fn open_title_menu(&mut self, screen: Point) {
        self.quick_search = None;
        self.menu.open_title(screen);
    }

    pub fn close_context_menu(&mut self) -> bool {
        self.menu.close()
    }

    /// Pick a menu entry and run it. Returns false if the entry was not on offer.
    pub fn choose_menu_item(&mut self, item: MenuItem) -> bool {
        let Some(action) = self.menu.choose(item) else {
            return false;
        };
        match action {
            MenuAction::SelectAll => self.select_all(),
            MenuAction::ZoomToFit => self.canvas.fit_to_content(),
            MenuAction::ResetZoom => self.reset_zoom(),
            MenuAction::Delete(ids) => {
                self.delete_shapes(&ids);
            }
            MenuAction::Duplicate(ids) => {
                self.duplicate(&ids);
            }
            MenuAction::BringToFront(ids) => {
                self.canvas.document.push_undo();
                for id in ids {
                    self.canvas.document.bring_to_front(id);
                }
            }
            MenuAction::SendToBack(ids) => {
                self.canvas.document.push_undo();
                for id in ids.into_iter().rev() {
                    self.canvas.document.send_to_back(id);
                }
            }
            MenuAction::RenamePage => {
                let current_title = self.title().to_string();
                self.events.push(EditorEvent::RenameRequested { current_title });
            }
            MenuAction::CopyPageLink => {
                let link = format!("[[{}]]", self.title());
                self.events.push(EditorEvent::CopyToClipboard(link));
            }
        }
        true
    }

    pub fn select_all(&mut self) {
        self.canvas.select_all();
    }

    /// Delete the selection and every connector bound to it.
    pub fn delete_selection(&mut self) -> Vec<ShapeId> {
        let ids = self.canvas.selection.clone();
        self.delete_shapes(&ids)
    }

    /// Delete shapes (cascading to bound connectors) and cancel their pending embeds.
    pub fn delete_shapes(&mut self, ids: &[ShapeId]) -> Vec<ShapeId> {
        if ids.is_empty() {
            return Vec::new();
        }
        self.canvas.document.push_undo();
        let removed = self.canvas.document.delete_shapes(ids);
        if removed.is_empty() {
            self.canvas.document.pop_undo();
        }
        for &id in &removed {
            self.embeds.cancel(id);
        }
        self.canvas.prune_selection();
        removed
    }

    /// Duplicate shapes by the configured offset and select the copies.
    pub fn duplicate(&mut self, ids: &[ShapeId]) -> Vec<ShapeId> {
        if ids.is_empty() {
            return Vec::new();
        }
        self.canvas.document.push_undo();
        let clones = self.canvas.document.duplicate(ids, self.config.clone_offset);
        self.canvas.selection = clones.clone();
        clones
    }

    pub fn undo(&mut self) -> bool {
        let done = self.canvas.document.undo();
        self.canvas.prune_selection();
        self.requeue_pending_embeds();
        done
    }

    pub fn redo(&mut self) -> bool {
        let done = self.canvas.document.redo();
        self.canvas.prune_selection();
        self.requeue_pending_embeds();
        done
    }

    /// Serialize the selection for the clipboard.
    pub fn copy(&self) -> Result<ClipboardPayload, EditorError> {
        Ok(clipboard::copy(&self.canvas.document, &self.canvas.selection)?)
    }

    /// Paste clipboard text.
    ///
    /// Copied shapes are cloned with new ids at the clone offset, links become
    /// pending embeds resolved on the next tick, other text becomes a text shape.
    pub fn paste(&mut self, text: &str) -> Result<Vec<ShapeId>, EditorError> {
        let content = clipboard::classify(text)?;
        let at = self.to_world(self.canvas.viewport_center());
        let ids = match content {
            PasteContent::Shapes(shapes) => {
                self.canvas.document.push_undo();
                let clones = clone_shapes(&shapes, self.config.clone_offset);
                self.canvas.document.add_clones(clones)
            }
            PasteContent::Link(url) => {
                let size = Embed::PLACEHOLDER_SIZE;
                let origin = at - Vec2::new(size.width / 2.0, size.height / 2.0);
                self.canvas.document.push_undo();
                let id = self.canvas.document.add_shape(Shape::Embed(Embed::pending(origin, &url)));
                self.embeds.push(id, url);
                vec![id]
            }
            PasteContent::Text(text) => {
                if text.trim().is_empty() {
                    return Ok(Vec::new());
                }
                self.canvas.document.push_undo();
                vec![self.canvas.document.add_shape(Shape::Text(Text::new(at, text)))]
            }
        };
        log::info!("pasted {} shape(s)", ids.len());
        self.canvas.selection = ids.clone();
        Ok(ids)
    }

    fn zoom_anchor(&self) -> Point {
        self.canvas.viewport_center()
    }

    /// One discrete step in, animated about the viewport center.
    pub fn zoom_in(&mut self) {
        let anchor = self.zoom_anchor();
        self.canvas.camera.zoom_in(anchor);
    }

    pub fn zoom_out(&mut self) {
        let anchor = self.zoom_anchor();
        self.canvas.camera.zoom_out(anchor);
    }

    /// Back to 100%, keeping the viewport center fixed.
    pub fn reset_zoom(&mut self) {
        let anchor = self.zoom_anchor();
        self.canvas.camera.reset_zoom(anchor);
    }

    pub fn zoom_percent(&self) -> u32 {
        self.canvas.camera.zoom_percent()
    }

    /// Open quick search as if the empty canvas had been double-clicked at `screen`.
    pub fn open_quick_search(&mut self, screen: Point) {
        let world = self.to_world(screen);
        self.menu.close();
        self.quick_search = Some(QuickSearch::open(&self.registry, self.page_id, world));
    }

    /// Update the quick search query, returning the matching titles.
    pub fn set_search_query(&mut self, query: &str) -> Result<&[String], EditorError> {
        let search = self.quick_search.as_mut().ok_or(EditorError::NoQuickSearch)?;
        search.set_query(&self.registry, self.page_id, query);
        Ok(&search.results)
    }

    /// Insert a portal to the result at `index` and close quick search.
    pub fn choose_search_result(&mut self, index: usize) -> Result<ShapeId, EditorError> {
        let search = self.quick_search.as_ref().ok_or(EditorError::NoQuickSearch)?;
        let title = search
            .results
            .get(index)
            .ok_or(EditorError::NoSearchResult(index))?;
        let portal = self.registry.create_portal(title, search.position)?;
        self.quick_search = None;
        self.canvas.document.push_undo();
        let id = match self.canvas.document.create_shape(Shape::Portal(portal)) {
            Ok(id) => id,
            Err(e) => {
                self.canvas.document.pop_undo();
                return Err(e.into());
            }
        };
        log::info!("portal {id} added");
        self.finish_draw(id);
        Ok(id)
    }

    pub fn close_quick_search(&mut self) -> bool {
        self.quick_search.take().is_some()
    }

    /// Create a page in the registry.
    pub fn create_page(&mut self, title: Option<&str>) -> Result<PageId, EditorError> {
        Ok(self.registry.create_page(title)?)
    }

    /// Delete another page. Portals pointing at it become unlinked.
    pub fn delete_page(&mut self, page_id: PageId) -> Result<(), EditorError> {
        if page_id == self.page_id {
            return Err(EditorError::CurrentPage);
        }
        self.registry.delete_page(page_id)?;
        Ok(())
    }

    /// Portals on other pages referencing `title`, counted across every page.
    pub fn backlink_count(&mut self, title: &str) -> usize {
        self.with_synced_registry(|registry| registry.backlink_count(title))
    }

    /// Ranked page titles for `query`, excluding the open page.
    pub fn search(&self, query: &str) -> Vec<String> {
        self.registry.search(query, self.page_id)
    }

    /// Rename the open page.
    pub fn rename_page(&mut self, new_title: &str) -> Result<RenameOutcome, EditorError> {
        let page_id = self.page_id;
        let outcome = self.with_retitled_portals(|registry| registry.rename_page(page_id, new_title))?;
        if let RenameOutcome::NeedsConfirmation(pending) = &outcome {
            self.events.push(EditorEvent::ConfirmRename(pending.clone()));
        }
        Ok(outcome)
    }

    /// Apply the pending rename of the open page. Returns the new title.
    pub fn confirm_rename(&mut self) -> Result<String, EditorError> {
        let page_id = self.page_id;
        Ok(self.with_retitled_portals(|registry| registry.confirm_rename(page_id))?)
    }

    /// Keep the current title.
    pub fn decline_rename(&mut self) -> Result<(), EditorError> {
        self.registry.decline_rename(self.page_id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::ShapeKind;

    fn editor() -> Editor {
        let mut registry = PageRegistry::new();
        let page = registry.create_page(None).unwrap();
        let config = EditorConfig {
            zoom_animation_ms: 0,
            platform: Platform::Other,
            ..EditorConfig::default()
        };
        Editor::with_config(page, registry, config).unwrap()
    }

    fn press(editor: &mut Editor, x: f64, y: f64, modifiers: Modifiers) {
        editor.dispatch(InputEvent::PointerDown {
            position: Point::new(x, y),
            button: MouseButton::Left,
            modifiers,
        });
    }

    fn drag(editor: &mut Editor, from: (f64, f64), to: (f64, f64), modifiers: Modifiers) {
        press(editor, from.0, from.1, modifiers);
        editor.dispatch(InputEvent::PointerMove {
            position: Point::new(to.0, to.1),
            modifiers,
        });
        editor.dispatch(InputEvent::PointerUp {
            position: Point::new(to.0, to.1),
            button: MouseButton::Left,
            modifiers,
        });
    }

    fn key(editor: &mut Editor, name: &str, modifiers: Modifiers) {
        editor.dispatch(InputEvent::KeyDown {
            key: Key::from_name(name),
            modifiers,
        });
    }

    fn draw_box(editor: &mut Editor) -> ShapeId {
        key(editor, "r", Modifiers::NONE);
        drag(editor, (5.0, 5.0), (50.0, 50.0), Modifiers::NONE);
        editor.selection()[0]
    }

    #[test]
    fn test_draw_box_returns_to_select() {
        let mut editor = editor();
        let id = draw_box(&mut editor);
        assert_eq!(editor.document().count_kind(ShapeKind::Box), 1);
        assert_eq!(editor.current_tool(), ToolKind::Select);
        assert_eq!(
            editor.document().get_shape(id).unwrap().bounds(),
            Rect::new(5.0, 5.0, 50.0, 50.0)
        );
    }

    #[test]
    fn test_click_without_drag_draws_nothing() {
        let mut editor = editor();
        key(&mut editor, "r", Modifiers::NONE);
        drag(&mut editor, (5.0, 5.0), (5.0, 5.0), Modifiers::NONE);
        assert!(editor.document().is_empty());
        assert!(!editor.document().can_undo());
    }

    #[test]
    fn test_escape_cancels_draw() {
        let mut editor = editor();
        key(&mut editor, "r", Modifiers::NONE);
        press(&mut editor, 5.0, 5.0, Modifiers::NONE);
        editor.dispatch(InputEvent::PointerMove {
            position: Point::new(60.0, 60.0),
            modifiers: Modifiers::NONE,
        });
        key(&mut editor, "Escape", Modifiers::NONE);
        editor.dispatch(InputEvent::PointerUp {
            position: Point::new(60.0, 60.0),
            button: MouseButton::Left,
            modifiers: Modifiers::NONE,
        });
        assert!(editor.document().is_empty());
        assert_eq!(editor.current_tool(), ToolKind::Select);
    }

    #[test]
    fn test_escape_after_commit_keeps_shape() {
        let mut editor = editor();
        draw_box(&mut editor);
        key(&mut editor, "Escape", Modifiers::NONE);
        assert_eq!(editor.document().len(), 1);
        assert!(editor.selection().is_empty());
    }

    #[test]
    fn test_move_and_escape_restores() {
        let mut editor = editor();
        let id = draw_box(&mut editor);
        press(&mut editor, 20.0, 20.0, Modifiers::NONE);
        editor.dispatch(InputEvent::PointerMove {
            position: Point::new(70.0, 20.0),
            modifiers: Modifiers::NONE,
        });
        assert_eq!(editor.document().get_shape(id).unwrap().bounds().x0, 55.0);
        key(&mut editor, "Escape", Modifiers::NONE);
        assert_eq!(editor.document().get_shape(id).unwrap().bounds().x0, 5.0);
    }

    #[test]
    fn test_alt_click_without_drag_leaves_no_clone() {
        let mut editor = editor();
        let id = draw_box(&mut editor);
        drag(&mut editor, (20.0, 20.0), (20.0, 20.0), Modifiers::ALT);
        assert_eq!(editor.document().len(), 1);
        assert_eq!(editor.selection(), &[id]);
    }

    #[test]
    fn test_alt_drag_clones() {
        let mut editor = editor();
        let id = draw_box(&mut editor);
        drag(&mut editor, (20.0, 20.0), (100.0, 100.0), Modifiers::ALT);
        assert_eq!(editor.document().count_kind(ShapeKind::Box), 2);
        let clone = editor.selection()[0];
        assert_ne!(clone, id);
        assert_eq!(
            editor.document().get_shape(id).unwrap().bounds(),
            Rect::new(5.0, 5.0, 50.0, 50.0)
        );
        assert_eq!(
            editor.document().get_shape(clone).unwrap().bounds(),
            Rect::new(85.0, 85.0, 130.0, 130.0)
        );
    }

    #[test]
    fn test_marquee_selects() {
        let mut editor = editor();
        let id = draw_box(&mut editor);
        key(&mut editor, "Escape", Modifiers::NONE);
        drag(&mut editor, (200.0, 200.0), (0.0, 0.0), Modifiers::NONE);
        assert_eq!(editor.selection(), &[id]);
    }

    #[test]
    fn test_right_click_does_not_select() {
        let mut editor = editor();
        draw_box(&mut editor);
        key(&mut editor, "Escape", Modifiers::NONE);
        editor.dispatch(InputEvent::PointerDown {
            position: Point::new(20.0, 20.0),
            button: MouseButton::Right,
            modifiers: Modifiers::NONE,
        });
        assert!(editor.selection().is_empty());
        let menu = editor.context_menu().unwrap();
        assert_eq!(menu.kind, crate::context_menu::MenuKind::Shape);

        // Outside click closes without touching the model.
        press(&mut editor, 400.0, 400.0, Modifiers::NONE);
        assert!(editor.context_menu().is_none());
        assert_eq!(editor.document().len(), 1);
    }

    #[test]
    fn test_menu_duplicate() {
        let mut editor = editor();
        let id = draw_box(&mut editor);
        editor.open_context_menu(Point::new(20.0, 20.0));
        assert!(editor.choose_menu_item(MenuItem::Duplicate));
        assert_eq!(editor.document().len(), 2);
        let clone = editor.selection()[0];
        assert_eq!(
            editor.document().get_shape(clone).unwrap().bounds(),
            editor.document().get_shape(id).unwrap().bounds() + Vec2::new(20.0, 20.0)
        );
    }

    #[test]
    fn test_undo_redo_via_keys() {
        let mut editor = editor();
        draw_box(&mut editor);
        let ctrl = Modifiers::primary(Platform::Other);
        key(&mut editor, "z", ctrl);
        assert!(editor.document().is_empty());
        key(&mut editor, "z", Modifiers { shift: true, ..ctrl });
        assert_eq!(editor.document().len(), 1);
    }

    #[test]
    fn test_embed_tool_requests_url() {
        let mut editor = editor();
        key(&mut editor, "e", Modifiers::NONE);
        drag(&mut editor, (0.0, 0.0), (300.0, 200.0), Modifiers::NONE);
        let events = editor.take_events();
        assert_eq!(
            events,
            vec![EditorEvent::EmbedUrlRequested {
                frame: Rect::new(0.0, 0.0, 300.0, 200.0)
            }]
        );
        let id = editor.submit_embed_url("https://youtu.be/hz2BacySDXE").unwrap();
        assert!(editor.document().get_shape(id).unwrap().as_embed().unwrap().is_pending());

        editor.tick(Instant::now());
        let shape = editor.document().get_shape(id).unwrap();
        assert_eq!(shape.kind(), ShapeKind::Video);
        // A drawn frame keeps its size.
        assert_eq!(shape.bounds(), Rect::new(0.0, 0.0, 300.0, 200.0));
        assert!(matches!(editor.submit_embed_url("x"), Err(EditorError::NoEmbedFrame)));
    }

    #[test]
    fn test_deleted_embed_is_not_resurrected() {
        let mut editor = editor();
        let ids = editor.paste("https://logseq.com").unwrap();
        editor.delete_shapes(&ids);
        editor.tick(Instant::now());
        assert!(editor.document().is_empty());
    }

    #[test]
    fn test_malformed_link_falls_back_to_text() {
        let mut editor = editor();
        editor.paste("https://").unwrap();
        editor.tick(Instant::now());
        assert_eq!(editor.document().count_kind(ShapeKind::Text), 1);
        assert_eq!(editor.document().count_kind(ShapeKind::PendingEmbed), 0);
        assert!(matches!(editor.take_events().as_slice(), [EditorEvent::Notice(_)]));
    }

    #[test]
    fn test_copy_paste_offsets() {
        let mut editor = editor();
        let id = draw_box(&mut editor);
        let payload = editor.copy().unwrap();
        let pasted = editor.paste(payload.as_str()).unwrap();
        assert_eq!(pasted.len(), 1);
        assert_ne!(pasted[0], id);
        assert_eq!(
            editor.document().get_shape(pasted[0]).unwrap().bounds(),
            Rect::new(25.0, 25.0, 70.0, 70.0)
        );
    }

    #[test]
    fn test_text_tool() {
        let mut editor = editor();
        key(&mut editor, "t", Modifiers::NONE);
        press(&mut editor, 10.0, 10.0, Modifiers::NONE);
        let events = editor.take_events();
        let [EditorEvent::EditText { shape_id }] = events.as_slice() else {
            panic!("expected an edit request");
        };
        editor.set_text(*shape_id, "hello").unwrap();
        let Some(Shape::Text(text)) = editor.document().get_shape(*shape_id) else {
            panic!("expected text");
        };
        assert_eq!(text.content, "hello");
        editor.set_text(*shape_id, "").unwrap();
        assert!(editor.document().is_empty());
    }

    #[test]
    fn test_quick_search_escape_has_no_effect() {
        let mut registry = PageRegistry::new();
        let page = registry.create_page(Some("home")).unwrap();
        registry.create_page(Some("notes")).unwrap();
        let mut editor = Editor::new(page, registry).unwrap();

        editor.dispatch(InputEvent::DoubleClick {
            position: Point::new(300.0, 300.0),
        });
        assert_eq!(editor.quick_search().unwrap().results, vec!["notes"]);
        key(&mut editor, "Escape", Modifiers::NONE);
        assert!(editor.quick_search().is_none());
        assert!(editor.document().is_empty());
    }

    #[test]
    fn test_wheel_zoom_and_pan() {
        let mut editor = editor();
        editor.dispatch(InputEvent::Wheel {
            position: Point::new(100.0, 100.0),
            delta: Vec2::new(0.0, 1.0),
            modifiers: Modifiers::primary(Platform::Other),
        });
        assert_eq!(editor.zoom_percent(), 110);
        let before = editor.camera().screen_to_world(Point::new(100.0, 100.0));
        assert!((before.x - 100.0).abs() < 1e-9);

        editor.dispatch(InputEvent::Wheel {
            position: Point::ZERO,
            delta: Vec2::new(10.0, 0.0),
            modifiers: Modifiers::NONE,
        });
        // Zooming about x = 100 shifted the view by -10; the pan brings it back.
        assert!(editor.camera().offset.x.abs() < 1e-9);
    }

    #[test]
    fn test_pan_tool_follows_pointer() {
        let mut editor = editor();
        editor.set_tool(ToolKind::Pan);
        press(&mut editor, 100.0, 100.0, Modifiers::NONE);
        editor.dispatch(InputEvent::PointerMove {
            position: Point::new(130.0, 110.0),
            modifiers: Modifiers::NONE,
        });
        assert_eq!(editor.camera().offset, Vec2::new(30.0, 10.0));
        editor.dispatch(InputEvent::PointerUp {
            position: Point::new(130.0, 110.0),
            button: MouseButton::Left,
            modifiers: Modifiers::NONE,
        });

        // Hovering after release leaves the view alone.
        editor.dispatch(InputEvent::PointerMove {
            position: Point::new(400.0, 300.0),
            modifiers: Modifiers::NONE,
        });
        assert_eq!(editor.camera().offset, Vec2::new(30.0, 10.0));
        assert!(editor.document().is_empty());
    }

    #[test]
    fn test_stored_pending_embed_resolves() {
        let mut registry = PageRegistry::new();
        let page = registry.create_page(None).unwrap();
        registry
            .page_mut(page)
            .unwrap()
            .document
            .add_shape(Shape::Embed(Embed::pending(Point::ZERO, "https://logseq.com")));
        let mut editor = Editor::new(page, registry).unwrap();
        assert_eq!(editor.pending_embeds(), 1);
        assert!(editor.take_deltas().is_empty());

        editor.tick(Instant::now());
        assert_eq!(editor.document().count_kind(ShapeKind::PendingEmbed), 0);
        assert_eq!(editor.document().count_kind(ShapeKind::Iframe), 1);
    }

    #[test]
    fn test_chosen_portal_is_one_undo_step() {
        let mut registry = PageRegistry::new();
        let page = registry.create_page(Some("home")).unwrap();
        registry.create_page(Some("notes")).unwrap();
        let mut editor = Editor::new(page, registry).unwrap();

        editor.open_quick_search(Point::new(300.0, 300.0));
        editor.set_search_query("notes").unwrap();
        assert!(matches!(
            editor.choose_search_result(3),
            Err(EditorError::NoSearchResult(3))
        ));
        assert!(!editor.document().can_undo());

        let portal = editor.choose_search_result(0).unwrap();
        assert!(editor.document().contains(portal));
        assert!(editor.undo());
        assert!(editor.document().is_empty());
        assert!(!editor.document().can_undo());
    }
}
