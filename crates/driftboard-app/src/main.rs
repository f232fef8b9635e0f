//! Main application entry point.
//!
//! Usage: `driftboard [--config <path>] [--shortcuts] [script.json]`

use driftboard_app::{AppConfig, AppError, AppResult, Script, Session, ShortcutRegistry};
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();
    log::info!("Starting Driftboard");

    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

/// Returns whether every scripted step succeeded.
fn run() -> AppResult<bool> {
    let mut config_path = None;
    let mut script_path = None;
    let mut list_shortcuts = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config_path = args.next().map(PathBuf::from),
            "--shortcuts" => list_shortcuts = true,
            _ => script_path = Some(PathBuf::from(arg)),
        }
    }

    let config = match config_path {
        Some(path) => AppConfig::load(&path)?,
        None => AppConfig::default(),
    };

    if list_shortcuts {
        ShortcutRegistry::print_all(config.editor_config().platform);
        return Ok(true);
    }

    let script_path = script_path
        .or_else(|| config.script.clone())
        .ok_or(AppError::NoScript)?;
    let script = Script::load(&script_path)?;
    log::info!("Replaying {} step(s) from {}", script.steps.len(), script_path.display());

    let mut session = Session::new(&config, &script.pages)?;
    session.run(&script.steps);
    let summary = session.summary();

    let json = serde_json::to_string_pretty(&summary)
        .map_err(|e| AppError::Serialization(e.to_string()))?;
    println!("{json}");
    Ok(summary.failures.is_empty())
}
