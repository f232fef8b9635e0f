//! Keyboard shortcut registry and documentation.

use driftboard_core::input::Platform;
use driftboard_core::tools::ToolKind;

/// A keyboard shortcut definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortcut {
    pub key: String,
    /// Needs the platform's primary modifier (Cmd or Ctrl).
    pub primary: bool,
    pub shift: bool,
    pub description: String,
}

impl Shortcut {
    pub fn new(key: impl Into<String>, primary: bool, shift: bool, description: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            primary,
            shift,
            description: description.into(),
        }
    }

    /// Format the shortcut for display (e.g., "Ctrl+A" or "Cmd+A").
    pub fn format(&self, platform: Platform) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if self.primary {
            parts.push(platform.primary_label());
        }
        if self.shift {
            parts.push("Shift");
        }
        parts.push(self.key.as_str());
        parts.join("+")
    }
}

/// Registry of all keyboard shortcuts.
pub struct ShortcutRegistry;

impl ShortcutRegistry {
    /// Get all registered shortcuts.
    pub fn all() -> Vec<Shortcut> {
        let tools = ToolKind::ALL.into_iter().map(|tool| {
            Shortcut::new(
                tool.shortcut().to_ascii_uppercase().to_string(),
                false,
                false,
                format!("{} tool", tool.name()),
            )
        });
        let editing = [
            Shortcut::new("A", true, false, "Select all shapes"),
            Shortcut::new("Z", true, false, "Undo"),
            Shortcut::new("Z", true, true, "Redo"),
            Shortcut::new("Y", true, false, "Redo"),
            Shortcut::new("D", true, false, "Duplicate selection"),
            Shortcut::new("C", true, false, "Copy shapes"),
            Shortcut::new("Delete", false, false, "Delete selected shapes"),
            Shortcut::new("Backspace", false, false, "Delete selected shapes"),
            Shortcut::new("=", false, false, "Zoom in"),
            Shortcut::new("-", false, false, "Zoom out"),
            Shortcut::new("0", false, true, "Reset zoom"),
            Shortcut::new("Escape", false, false, "Cancel current action"),
            Shortcut::new("Alt+Drag", false, false, "Clone selection"),
        ];
        tools.chain(editing).collect()
    }

    /// Print all shortcuts to console.
    pub fn print_all(platform: Platform) {
        println!("\n=== Keyboard Shortcuts ===");
        for shortcut in Self::all() {
            println!("  {:20} {}", shortcut.format(platform), shortcut.description);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_per_platform() {
        let select_all = Shortcut::new("A", true, false, "Select all shapes");
        assert_eq!(select_all.format(Platform::Mac), "Cmd+A");
        assert_eq!(select_all.format(Platform::Other), "Ctrl+A");
        assert_eq!(Shortcut::new("0", false, true, "Reset zoom").format(Platform::Mac), "Shift+0");
    }

    #[test]
    fn test_every_tool_listed() {
        let all = ShortcutRegistry::all();
        for tool in ToolKind::ALL {
            let key = tool.shortcut().to_ascii_uppercase().to_string();
            assert!(all.iter().any(|s| s.key == key && !s.primary), "{key}");
        }
    }
}
