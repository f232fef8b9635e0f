//! Right-click menu: at most one open at a time.

use crate::shapes::ShapeId;
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Which surface the menu was opened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MenuKind {
    Canvas,
    Shape,
    Title,
}

/// An entry in a menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MenuItem {
    SelectAll,
    ZoomToFit,
    ResetZoom,
    Delete,
    Duplicate,
    BringToFront,
    SendToBack,
    Rename,
    CopyLink,
}

impl MenuItem {
    pub fn label(self) -> &'static str {
        match self {
            MenuItem::SelectAll => "Select all",
            MenuItem::ZoomToFit => "Zoom to fit",
            MenuItem::ResetZoom => "Reset zoom",
            MenuItem::Delete => "Delete",
            MenuItem::Duplicate => "Duplicate",
            MenuItem::BringToFront => "Bring to front",
            MenuItem::SendToBack => "Send to back",
            MenuItem::Rename => "Rename",
            MenuItem::CopyLink => "Copy link",
        }
    }
}

impl MenuKind {
    /// Entries offered by this kind of menu, top to bottom.
    pub fn items(self) -> &'static [MenuItem] {
        match self {
            MenuKind::Canvas => &[MenuItem::SelectAll, MenuItem::ZoomToFit, MenuItem::ResetZoom],
            MenuKind::Shape => &[
                MenuItem::Delete,
                MenuItem::Duplicate,
                MenuItem::BringToFront,
                MenuItem::SendToBack,
            ],
            MenuKind::Title => &[MenuItem::Rename, MenuItem::CopyLink],
        }
    }
}

/// What the editor should do for a chosen entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    SelectAll,
    ZoomToFit,
    ResetZoom,
    Delete(Vec<ShapeId>),
    Duplicate(Vec<ShapeId>),
    BringToFront(Vec<ShapeId>),
    SendToBack(Vec<ShapeId>),
    RenamePage,
    CopyPageLink,
}

/// The menu currently on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenMenu {
    pub kind: MenuKind,
    /// Anchor in screen coordinates.
    pub position: Point,
    /// Shapes the menu acts on (empty for canvas and title menus).
    pub targets: Vec<ShapeId>,
}

impl OpenMenu {
    pub fn items(&self) -> &'static [MenuItem] {
        self.kind.items()
    }
}

/// Owns the single context menu instance.
#[derive(Debug, Clone, Default)]
pub struct ContextMenu {
    open: Option<OpenMenu>,
}

impl ContextMenu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open at `position`: a shape menu when `context_shape_ids` is non-empty, else the canvas menu.
    ///
    /// Replaces any menu already open.
    pub fn open_at(&mut self, position: Point, context_shape_ids: &[ShapeId]) {
        let kind = if context_shape_ids.is_empty() {
            MenuKind::Canvas
        } else {
            MenuKind::Shape
        };
        self.open = Some(OpenMenu {
            kind,
            position,
            targets: context_shape_ids.to_vec(),
        });
    }

    /// Open the page-title menu.
    pub fn open_title(&mut self, position: Point) {
        self.open = Some(OpenMenu {
            kind: MenuKind::Title,
            position,
            targets: Vec::new(),
        });
    }

    /// Close the menu. Returns whether one was open.
    pub fn close(&mut self) -> bool {
        self.open.take().is_some()
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn current(&self) -> Option<&OpenMenu> {
        self.open.as_ref()
    }

    /// Pick an entry, closing the menu. `None` if no menu is open or it lacks the entry.
    pub fn choose(&mut self, item: MenuItem) -> Option<MenuAction> {
        let menu = self.open.take()?;
        if !menu.items().contains(&item) {
            log::debug!("{item:?} is not offered by the {:?} menu", menu.kind);
            return None;
        }
        let targets = menu.targets;
        Some(match item {
            MenuItem::SelectAll => MenuAction::SelectAll,
            MenuItem::ZoomToFit => MenuAction::ZoomToFit,
            MenuItem::ResetZoom => MenuAction::ResetZoom,
            MenuItem::Delete => MenuAction::Delete(targets),
            MenuItem::Duplicate => MenuAction::Duplicate(targets),
            MenuItem::BringToFront => MenuAction::BringToFront(targets),
            MenuItem::SendToBack => MenuAction::SendToBack(targets),
            MenuItem::Rename => MenuAction::RenamePage,
            MenuItem::CopyLink => MenuAction::CopyPageLink,
        })
    }
}
