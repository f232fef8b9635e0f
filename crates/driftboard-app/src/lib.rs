//! Driftboard Application
//!
//! Headless shell around the editor: configuration, shortcut listing,
//! and replay of scripted editing sessions.

mod config;
mod session;
mod shortcuts;

pub use config::{AppConfig, AppError, AppResult};
pub use session::{Script, Session, Step, Summary};
pub use shortcuts::{Shortcut, ShortcutRegistry};
