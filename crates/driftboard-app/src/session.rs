//! Scripted editing sessions: a JSON list of steps replayed against an [`Editor`].

use crate::config::{AppConfig, AppError, AppResult};
use driftboard_core::context_menu::MenuItem;
use driftboard_core::input::{InputEvent, Key, Modifiers, MouseButton};
use driftboard_core::linking::LinkError;
use driftboard_core::shapes::ShapeKind;
use driftboard_core::{Editor, EditorEvent, PageRegistry, ShapeDelta};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

/// A replayable session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Script {
    /// Titles of pages that exist besides the one being edited.
    pub pages: Vec<String>,
    pub steps: Vec<Step>,
}

impl Script {
    pub fn load(path: &Path) -> AppResult<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| AppError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> AppResult<Self> {
        serde_json::from_str(json).map_err(|e| AppError::Serialization(e.to_string()))
    }
}

/// One scripted action or check. Positions are in screen coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// A raw input event.
    Event { event: InputEvent },
    /// Press and release a key by name ("r", "Escape", "Delete", ...).
    Key {
        key: String,
        #[serde(default)]
        modifiers: Modifiers,
    },
    Click {
        at: Point,
        #[serde(default)]
        button: MouseButton,
        #[serde(default)]
        modifiers: Modifiers,
    },
    DoubleClick { at: Point },
    Drag {
        from: Point,
        to: Point,
        #[serde(default)]
        modifiers: Modifiers,
    },
    Paste { text: String },
    /// Paste whatever the last copy put on the clipboard.
    PasteClipboard,
    SubmitEmbedUrl { url: String },
    /// Let time pass; animations and embed resolution advance.
    Wait { ms: u64 },
    Menu { item: MenuItem },
    Search { query: String },
    ChooseResult {
        #[serde(default)]
        index: usize,
    },
    Rename { title: String },
    ConfirmRename,
    DeclineRename,
    OpenPage { title: String },
    ExpectCount { kind: ShapeKind, count: usize },
    ExpectZoom { percent: u32 },
    ExpectTitle { title: String },
    ExpectBacklinks { title: String, count: usize },
}

/// What a session did, printed at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub page: String,
    pub shapes: BTreeMap<String, usize>,
    pub zoom_percent: u32,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failures: Vec<String>,
}

/// An editor driven by a virtual clock.
pub struct Session {
    editor: Editor,
    started: Instant,
    elapsed: Duration,
    clipboard: Option<String>,
    summary: Summary,
}

impl Session {
    /// Open the configured page in a fresh registry holding `pages` as well.
    pub fn new(config: &AppConfig, pages: &[String]) -> AppResult<Self> {
        let mut registry = PageRegistry::new();
        let page = registry.create_page(config.title.as_deref())?;
        for title in pages {
            registry.create_page(Some(title.as_str()))?;
        }
        let mut editor = Editor::with_config(page, registry, config.editor_config())?;
        editor.set_viewport_size(f64::from(config.width), f64::from(config.height));
        Ok(Self {
            editor,
            started: Instant::now(),
            elapsed: Duration::ZERO,
            clipboard: None,
            summary: Summary::default(),
        })
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    fn now(&self) -> Instant {
        self.started + self.elapsed
    }

    /// Run every step. Failed steps are recorded and the run continues.
    pub fn run(&mut self, steps: &[Step]) {
        for (index, step) in steps.iter().enumerate() {
            if let Err(e) = self.step(step) {
                log::warn!("step {index} failed: {e}");
                self.summary.failures.push(format!("step {index}: {e}"));
            }
        }
    }

    /// Run one step, then tick and collect what the editor reported.
    pub fn step(&mut self, step: &Step) -> AppResult<()> {
        log::debug!("{step:?}");
        let result = self.apply(step);
        self.editor.tick(self.now());
        self.flush();
        result
    }

    fn apply(&mut self, step: &Step) -> AppResult<()> {
        match step {
            Step::Event { event } => self.editor.dispatch(event.clone()),
            Step::Key { key, modifiers } => {
                let key = Key::from_name(key);
                self.editor.dispatch(InputEvent::KeyDown {
                    key: key.clone(),
                    modifiers: *modifiers,
                });
                self.editor.dispatch(InputEvent::KeyUp {
                    key,
                    modifiers: *modifiers,
                });
            }
            Step::Click {
                at,
                button,
                modifiers,
            } => {
                self.editor.dispatch(InputEvent::PointerDown {
                    position: *at,
                    button: *button,
                    modifiers: *modifiers,
                });
                self.editor.dispatch(InputEvent::PointerUp {
                    position: *at,
                    button: *button,
                    modifiers: *modifiers,
                });
            }
            Step::DoubleClick { at } => self.editor.dispatch(InputEvent::DoubleClick { position: *at }),
            Step::Drag {
                from,
                to,
                modifiers,
            } => {
                self.editor.dispatch(InputEvent::PointerDown {
                    position: *from,
                    button: MouseButton::Left,
                    modifiers: *modifiers,
                });
                self.editor.dispatch(InputEvent::PointerMove {
                    position: *to,
                    modifiers: *modifiers,
                });
                self.editor.dispatch(InputEvent::PointerUp {
                    position: *to,
                    button: MouseButton::Left,
                    modifiers: *modifiers,
                });
            }
            Step::Paste { text } => {
                self.editor.paste(text)?;
            }
            Step::PasteClipboard => {
                let text = self.clipboard.clone().unwrap_or_default();
                self.editor.paste(&text)?;
            }
            Step::SubmitEmbedUrl { url } => {
                self.editor.submit_embed_url(url)?;
            }
            Step::Wait { ms } => {
                self.editor.tick(self.now());
                self.elapsed += Duration::from_millis(*ms);
            }
            Step::Menu { item } => {
                if !self.editor.choose_menu_item(*item) {
                    self.fail(format!("menu item {item:?} is not on offer"));
                }
            }
            Step::Search { query } => {
                if self.editor.quick_search().is_none() {
                    let center = self.editor.canvas().viewport_center();
                    self.editor.open_quick_search(center);
                }
                self.editor.set_search_query(query)?;
            }
            Step::ChooseResult { index } => {
                self.editor.choose_search_result(*index)?;
            }
            Step::Rename { title } => {
                self.editor.rename_page(title)?;
            }
            Step::ConfirmRename => {
                self.editor.confirm_rename()?;
            }
            Step::DeclineRename => self.editor.decline_rename()?,
            Step::OpenPage { title } => {
                let page = self
                    .editor
                    .registry()
                    .find_by_title(title)
                    .ok_or_else(|| LinkError::TitleNotFound(title.clone()))?;
                self.editor.open_page(page)?;
            }
            Step::ExpectCount { kind, count } => {
                let actual = self.editor.document().count_kind(*kind);
                self.expect(actual == *count, format!("expected {count} {kind:?}, found {actual}"));
            }
            Step::ExpectZoom { percent } => {
                let actual = self.editor.zoom_percent();
                self.expect(actual == *percent, format!("expected zoom {percent}%, found {actual}%"));
            }
            Step::ExpectTitle { title } => {
                let actual = self.editor.title().to_string();
                self.expect(actual == *title, format!("expected title {title:?}, found {actual:?}"));
            }
            Step::ExpectBacklinks { title, count } => {
                let actual = self.editor.backlink_count(title);
                self.expect(
                    actual == *count,
                    format!("expected {count} backlink(s) to {title:?}, found {actual}"),
                );
            }
        }
        Ok(())
    }

    fn expect(&mut self, ok: bool, message: String) {
        if !ok {
            self.fail(message);
        }
    }

    fn fail(&mut self, message: String) {
        log::warn!("{message}");
        self.summary.failures.push(message);
    }

    /// Log the editor's deltas and events.
    fn flush(&mut self) {
        for delta in self.editor.take_deltas() {
            match &delta {
                ShapeDelta::Created(shape) => {
                    self.summary.created += 1;
                    log::info!("created {:?} {}", shape.kind(), shape.id());
                }
                ShapeDelta::Updated(shape) => {
                    self.summary.updated += 1;
                    log::debug!("updated {:?} {}", shape.kind(), shape.id());
                }
                ShapeDelta::Deleted(id) => {
                    self.summary.deleted += 1;
                    log::info!("deleted {id}");
                }
            }
        }
        for event in self.editor.take_events() {
            match event {
                EditorEvent::CopyToClipboard(text) => self.clipboard = Some(text),
                EditorEvent::ConfirmRename(pending) => log::info!("{}", pending.prompt()),
                EditorEvent::Notice(message) => log::warn!("{message}"),
                other => log::info!("{other:?}"),
            }
        }
    }

    /// Final state of the open page plus everything recorded on the way.
    pub fn summary(&self) -> Summary {
        let mut shapes = BTreeMap::new();
        for shape in self.editor.document().shapes_ordered() {
            *shapes.entry(format!("{:?}", shape.kind())).or_insert(0) += 1;
        }
        Summary {
            page: self.editor.title().to_string(),
            shapes,
            zoom_percent: self.editor.zoom_percent(),
            ..self.summary.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftboard_core::input::Platform;

    fn session(pages: &[&str]) -> Session {
        let mut config = AppConfig::default();
        config.platform = Some(Platform::Other);
        let pages: Vec<String> = pages.iter().map(|p| p.to_string()).collect();
        Session::new(&config, &pages).unwrap()
    }

    #[test]
    fn test_script_parses() {
        let script = Script::from_json(
            r#"{
                "pages": ["journal"],
                "steps": [
                    { "op": "key", "key": "r" },
                    { "op": "drag", "from": { "x": 5, "y": 5 }, "to": { "x": 50, "y": 50 } },
                    { "op": "drag", "from": { "x": 20, "y": 20 }, "to": { "x": 100, "y": 100 },
                      "modifiers": { "alt": true } },
                    { "op": "confirm_rename" },
                    { "op": "expect_count", "kind": "Box", "count": 2 }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(script.pages, vec!["journal"]);
        assert_eq!(script.steps.len(), 5);
        assert!(matches!(
            &script.steps[2],
            Step::Drag { modifiers, .. } if modifiers.alt
        ));
        assert_eq!(script.steps[3], Step::ConfirmRename);
    }

    #[test]
    fn test_box_clone_connect_delete() {
        let mut session = session(&[]);
        let steps = Script::from_json(
            r#"{ "steps": [
                { "op": "key", "key": "r" },
                { "op": "drag", "from": { "x": 5, "y": 5 }, "to": { "x": 50, "y": 50 } },
                { "op": "expect_count", "kind": "Box", "count": 1 },
                { "op": "drag", "from": { "x": 20, "y": 20 }, "to": { "x": 100, "y": 100 },
                  "modifiers": { "alt": true } },
                { "op": "expect_count", "kind": "Box", "count": 2 },
                { "op": "key", "key": "c" },
                { "op": "drag", "from": { "x": 20, "y": 20 }, "to": { "x": 100, "y": 100 } },
                { "op": "expect_count", "kind": "Connector", "count": 1 },
                { "op": "click", "at": { "x": 20, "y": 20 } },
                { "op": "key", "key": "Delete" },
                { "op": "expect_count", "kind": "Box", "count": 1 },
                { "op": "expect_count", "kind": "Connector", "count": 0 }
            ] }"#,
        )
        .unwrap()
        .steps;
        session.run(&steps);
        let summary = session.summary();
        assert!(summary.failures.is_empty(), "{:?}", summary.failures);
        assert_eq!(summary.shapes.get("Box"), Some(&1));
        assert_eq!(summary.deleted, 2);
    }

    #[test]
    fn test_zoom_waits_for_animation() {
        let mut session = session(&[]);
        session.run(&[
            Step::Key {
                key: "=".to_string(),
                modifiers: Modifiers::NONE,
            },
            Step::Wait { ms: 400 },
            Step::ExpectZoom { percent: 125 },
            Step::Key {
                key: "0".to_string(),
                modifiers: Modifiers::SHIFT,
            },
            Step::Wait { ms: 400 },
            Step::ExpectZoom { percent: 100 },
        ]);
        assert!(session.summary().failures.is_empty(), "{:?}", session.summary().failures);
    }

    #[test]
    fn test_copy_then_paste_clipboard() {
        let mut session = session(&[]);
        session.run(&[
            Step::Key {
                key: "r".to_string(),
                modifiers: Modifiers::NONE,
            },
            Step::Drag {
                from: Point::new(5.0, 5.0),
                to: Point::new(50.0, 50.0),
                modifiers: Modifiers::NONE,
            },
            Step::Key {
                key: "c".to_string(),
                modifiers: Modifiers::primary(Platform::Other),
            },
            Step::PasteClipboard,
            Step::ExpectCount {
                kind: ShapeKind::Box,
                count: 2,
            },
        ]);
        assert!(session.summary().failures.is_empty(), "{:?}", session.summary().failures);
    }

    #[test]
    fn test_failed_steps_are_recorded() {
        let mut session = session(&["journal"]);
        session.run(&[
            Step::ConfirmRename,
            Step::OpenPage {
                title: "missing".to_string(),
            },
            Step::ExpectTitle {
                title: "Untitled".to_string(),
            },
        ]);
        assert_eq!(session.summary().failures.len(), 2);
    }
}
