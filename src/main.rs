//! shellbridge - headless host for the browser shell event bridge
//!
//! # Overview
//!
//! Stands in for a desktop toolkit: a "toolkit" thread reads commands from
//! stdin and posts them as envelopes, while the main thread runs the poll
//! loop that dispatches them. State changes are echoed to stdout by a
//! listener thread.
//!
//! # Execution Flow
//!
//! 1. Load `Shell Config.yaml` from the data directory (`$SHELLBRIDGE_DATA`
//!    or `Shell Data/`)
//! 2. Initialize logging → `<log dir>/shellbridge.<date>`
//! 3. Bootstrap the shell (option paths, session databases, handlers)
//! 4. Open the start window (`argv[1]`, homepage option, or built-in page)
//! 5. Poll until `quit` or end of input
//! 6. Save cookies and URL history
//!
//! # Commands
//!
//! `open <url>`, `type <text>`, `back`, `forward`, `stop`, `reload`, `home`,
//! `up`, `down`, `menu <code>`, `source`, `new`, `close`, `file <path>...`,
//! `about`, `quit`. Prefix with `@<window>` to address a window.

use anyhow::{Context, Result};
use camino::Utf8Path;
use shellbridge::services::ResourceLocator;
use shellbridge::services::paths::path_add_part;
use shellbridge::shell::{MENU_CLOSE_WINDOW, MENU_NEW_WINDOW, MENU_VIEW_SOURCE};
use shellbridge::{
    APP_NAME, ConfigManager, Envelope, EnvelopeSender, Message, NavAction, Shell, StateChange,
    StateManager, VERSION, WindowId,
};
use std::io::{self, BufRead};
use std::thread;

fn main() -> Result<()> {
    let data_dir = std::env::var("SHELLBRIDGE_DATA").unwrap_or_else(|_| "Shell Data".to_string());
    let config_manager = ConfigManager::new(&data_dir)?;
    let config = config_manager.load_config()?;

    let log_dir = if Utf8Path::new(&config.settings.log_dir).is_relative() {
        let mut dir = config_manager.config_dir().to_string();
        path_add_part(&mut dir, &config.settings.log_dir);
        dir
    } else {
        config.settings.log_dir.clone()
    };
    let _guard = shellbridge::logging::setup_logging_with_console(
        &log_dir,
        APP_NAME,
        config.settings.debug_mode,
        true,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    tracing::info!("Using config {}", config_manager.config_path());

    let locator = ResourceLocator::from_env(&config.settings.app_name, config.settings.resource_dir.clone());
    let mut shell = Shell::init(config, &locator).context("Failed to initialize shell")?;

    spawn_state_listener(shell.state());
    spawn_toolkit_thread(shell.sender())?;

    let args: Vec<String> = std::env::args().collect();
    shell.open_start_window(&args);

    shell.run();

    shell.shutdown()?;
    tracing::info!("Application shutdown complete");
    Ok(())
}

/// Echo state changes to stdout.
fn spawn_state_listener(state: &StateManager) {
    let mut rx = state.subscribe();
    let spawned = thread::Builder::new()
        .name("state-listener".to_string())
        .spawn(move || {
            while let Ok(change) = rx.blocking_recv() {
                match change {
                    StateChange::WindowOpened { window, url } => {
                        println!("[{}] opened {}", window.0, url)
                    }
                    StateChange::WindowClosed { window } => println!("[{}] closed", window.0),
                    StateChange::Navigated { window, url } => println!("[{}] {}", window.0, url),
                    StateChange::StatusChanged { status } => println!("status: {}", status),
                    StateChange::QuitRequested => println!("quitting"),
                }
            }
        });
    if let Err(e) = spawned {
        tracing::warn!("State listener unavailable: {}", e);
    }
}

/// Read commands from stdin and post them to the main thread. End of input
/// counts as `quit`.
fn spawn_toolkit_thread(sender: EnvelopeSender) -> Result<()> {
    thread::Builder::new()
        .name("toolkit".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match parse_command(line) {
                    Some(envelope) => {
                        if sender.send(envelope).is_err() {
                            return;
                        }
                    }
                    None => eprintln!("unknown command: {}", line),
                }
            }
            let _ = sender.send(Envelope::new(Message::QuitRequested));
        })
        .context("Failed to start toolkit thread")?;
    Ok(())
}

fn parse_command(line: &str) -> Option<Envelope> {
    let (window, line) = match line.strip_prefix('@') {
        Some(rest) => {
            let (id, rest) = rest.split_once(char::is_whitespace)?;
            (Some(WindowId(id.parse().ok()?)), rest.trim_start())
        }
        None => (None, line),
    };

    let (command, arg) = match line.split_once(char::is_whitespace) {
        Some((command, arg)) => (command, arg.trim()),
        None => (line, ""),
    };

    let message = match (command, arg) {
        ("open", url) if !url.is_empty() => Message::OpenUrl(url.to_string()),
        ("type", text) => Message::UrlChanged(text.to_string()),
        ("back", "") => Message::Navigate(NavAction::Back),
        ("forward", "") => Message::Navigate(NavAction::Forward),
        ("stop", "") => Message::Navigate(NavAction::Stop),
        ("reload", "") => Message::Navigate(NavAction::Reload),
        ("home", "") => Message::Navigate(NavAction::Home),
        ("up", "") => Message::Navigate(NavAction::ScrollUp),
        ("down", "") => Message::Navigate(NavAction::ScrollDown),
        ("menu", code) => Message::Menu(code.parse().ok()?),
        ("source", "") => Message::Menu(MENU_VIEW_SOURCE),
        ("new", "") => Message::Menu(MENU_NEW_WINDOW),
        ("close", "") => Message::Menu(MENU_CLOSE_WINDOW),
        ("file", paths) if !paths.is_empty() => {
            Message::RefsReceived(paths.split_whitespace().map(Into::into).collect())
        }
        ("about", "") => Message::AboutRequested,
        ("quit", "") => Message::QuitRequested,
        _ => return None,
    };

    let envelope = Envelope::new(message);
    Some(match window {
        Some(window) => envelope.with_window(window),
        None => envelope,
    })
}
