//! Driftboard Core Library
//!
//! Headless whiteboard engine: shapes, hit-testing, camera, tools, embeds,
//! page links and the editor that dispatches input to all of them.

pub mod camera;
pub mod canvas;
pub mod clipboard;
pub mod context_menu;
pub mod editor;
pub mod embed;
pub mod input;
pub mod linking;
pub mod selection;
pub mod shapes;
pub mod spatial;
pub mod tools;

pub use camera::Camera;
pub use canvas::{Canvas, CanvasDocument, CanvasError, ShapeDelta};
pub use clipboard::{ClipboardError, ClipboardPayload};
pub use context_menu::{ContextMenu, MenuItem, MenuKind};
pub use editor::{Editor, EditorConfig, EditorError, EditorEvent};
pub use embed::{EmbedDescriptor, EmbedError, EmbedQueue};
pub use input::{InputEvent, InputState, Key, Modifiers, MouseButton, Platform};
pub use linking::{LinkError, PageId, PageRegistry, RenameOutcome};
pub use selection::MultiMoveState;
pub use shapes::{Shape, ShapeId, ShapeKind};
pub use spatial::SpatialIndex;
pub use tools::{ToolKind, ToolManager};
