// Message handlers
//
// Everything the router runs lives here. Handlers execute on the main thread
// inside `EventBridge::poll` and share the shell's state through `Actions`.

use crate::bridge::HandlerRegistry;
use crate::layout::ReformatHandle;
use crate::models::{Message, MessageKind, NavAction, Target, WindowId};
use crate::services::paths::{filename_from_path, path_to_url, resource_url, url_to_path};
use crate::services::{AlertSink, FileSessionStore, Launcher, ShellError, Spawner, warn_user};
use crate::state::{ShellState, StateManager};
use camino::Utf8PathBuf;
use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

/// Menu command: open the current document's source in an editor.
pub const MENU_VIEW_SOURCE: u32 = 1;
/// Menu command: open a new window on the homepage.
pub const MENU_NEW_WINDOW: u32 = 2;
/// Menu command: close the target window. Closing the last window quits.
pub const MENU_CLOSE_WINDOW: u32 = 3;

/// Schemes shown in a browser window rather than handed to another program.
const INTERNAL_SCHEMES: &[&str] = &["http", "https", "file", "about", "data", "rsrc"];

pub(crate) struct Actions<S: Spawner> {
    state: StateManager,
    launcher: Launcher<S>,
    alerts: Rc<dyn AlertSink>,
    session: Rc<RefCell<FileSessionStore>>,
    reformat: ReformatHandle,
    homepage: String,
}

impl<S: Spawner> Actions<S> {
    pub(crate) fn new(
        state: StateManager,
        launcher: Launcher<S>,
        alerts: Rc<dyn AlertSink>,
        session: Rc<RefCell<FileSessionStore>>,
        reformat: ReformatHandle,
        homepage: String,
    ) -> Self {
        Self {
            state,
            launcher,
            alerts,
            session,
            reformat,
            homepage,
        }
    }

    /// The addressed window if it is still open, else the newest window.
    fn window_for(&self, target: &Target) -> Option<WindowId> {
        self.state.read(|s| {
            target
                .window
                .filter(|w| s.windows.contains_key(w))
                .or_else(|| s.last_window())
        })
    }

    fn current_url(&self, window: WindowId) -> Option<String> {
        self.state
            .read(|s| s.windows.get(&window).map(|w| w.url.clone()))
    }

    /// Open `url` in a browser window or hand it to an external handler.
    pub(crate) fn open_url(&self, target: &Target, url: &str) {
        match self.launcher.scheme_of(url) {
            Some(scheme) if scheme == "resource" => {
                let name = url["resource:".len()..].trim_start_matches('/');
                self.show(target, &resource_url(name));
            }
            Some(scheme) if INTERNAL_SCHEMES.contains(&scheme.as_str()) => {
                self.show(target, url);
            }
            Some(_) => self.launch(url),
            None => tracing::debug!("Ignoring {}: no valid scheme", url),
        }
    }

    /// Open `url` in a window of its own.
    pub(crate) fn open_in_new_window(&self, url: &str) {
        let target = Target::default();
        match self.launcher.scheme_of(url) {
            Some(scheme) if INTERNAL_SCHEMES.contains(&scheme.as_str()) => {
                let (window, _) = self.state.open_window(url);
                self.reformat.request(window);
                self.session.borrow_mut().record_visit(url);
            }
            _ => self.open_url(&target, url),
        }
    }

    fn show(&self, target: &Target, url: &str) {
        let window = match self.window_for(target) {
            Some(window) => {
                self.state.navigate(window, url);
                window
            }
            None => self.state.open_window(url).0,
        };
        tracing::info!("Window {} showing {}", window.0, url);
        self.reformat.request(window);
        self.session.borrow_mut().record_visit(url);
    }

    fn launch(&self, url: &str) {
        match self.launcher.launch_url(url) {
            Ok(()) => {}
            Err(ShellError::NoHandler(scheme)) => {
                tracing::debug!("Ignoring {}: no handler for {}", url, scheme);
            }
            Err(e) => warn_user(self.alerts.as_ref(), "Cannot launch URL", Some(&e.to_string())),
        }
    }

    pub(crate) fn navigate(&self, target: &Target, action: NavAction) {
        let Some(window) = self.window_for(target) else {
            tracing::debug!("{:?} with no open window", action);
            return;
        };

        match action {
            NavAction::Back => {
                if !self.state.go_back(window).is_empty() {
                    self.reformat.request(window);
                }
            }
            NavAction::Forward => {
                if !self.state.go_forward(window).is_empty() {
                    self.reformat.request(window);
                }
            }
            NavAction::Home => {
                let home = Target {
                    window: Some(window),
                    ..*target
                };
                self.open_url(&home, &self.homepage);
            }
            NavAction::Reload | NavAction::ScrollUp | NavAction::ScrollDown => {
                self.reformat.request(window);
            }
            NavAction::Stop => {
                self.state.set_status("Stopped");
            }
        }
    }

    pub(crate) fn menu(&self, target: &Target, code: u32) {
        match code {
            MENU_VIEW_SOURCE => self.view_source(target),
            MENU_NEW_WINDOW => self.open_in_new_window(&self.homepage),
            MENU_CLOSE_WINDOW => {
                if let Some(window) = self.window_for(target) {
                    self.state.close_window(window);
                    if self.state.read(|s: &ShellState| s.windows.is_empty()) {
                        tracing::info!("Last window closed");
                        self.state.request_quit();
                    }
                }
            }
            other => tracing::debug!("Unknown menu command {}", other),
        }
    }

    fn view_source(&self, target: &Target) {
        let Some(url) = self.window_for(target).and_then(|w| self.current_url(w)) else {
            return;
        };

        // Only local documents have source available without a fetch layer
        let source = url_to_path(&url).ok().and_then(|path| fs::read(path).ok());
        let mime = mime_for(&url);

        match self.launcher.view_source(&url, source.as_deref(), mime) {
            Ok(path) => tracing::info!("Viewing source of {} in {}", url, path),
            Err(ShellError::NoSource) => {
                warn_user(self.alerts.as_ref(), "No document source", None)
            }
            Err(e) => warn_user(self.alerts.as_ref(), "Cannot view source", Some(&e.to_string())),
        }
    }

    pub(crate) fn open_files(&self, paths: &[Utf8PathBuf]) {
        for path in paths {
            self.open_in_new_window(&path_to_url(path.as_str()));
        }
    }

    pub(crate) fn about(&self) {
        self.state
            .set_status(format!("{} {}", crate::APP_NAME, crate::VERSION));
    }

    pub(crate) fn quit(&self) {
        self.state.request_quit();
    }
}

fn mime_for(url: &str) -> &'static str {
    let leaf = filename_from_path(url);
    match leaf.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "css" => "text/css",
        Some(ext) if ext == "js" => "application/javascript",
        Some(ext) if ext == "xml" => "text/xml",
        Some(ext) if ext == "txt" => "text/plain",
        _ => "text/html",
    }
}

/// Install a handler for every message kind the shell understands.
pub(crate) fn register<S: Spawner + 'static>(registry: &mut HandlerRegistry, actions: Rc<Actions<S>>) {
    let a = actions.clone();
    registry.on(MessageKind::OpenUrl, move |envelope| {
        if let Message::OpenUrl(url) = envelope.message {
            a.open_url(&envelope.target, &url);
        }
    });

    let a = actions.clone();
    registry.on(MessageKind::UrlChanged, move |envelope| {
        if let Message::UrlChanged(text) = envelope.message {
            a.state.set_status(text);
        }
    });

    let a = actions.clone();
    registry.on(MessageKind::Navigate, move |envelope| {
        if let Message::Navigate(action) = envelope.message {
            a.navigate(&envelope.target, action);
        }
    });

    let a = actions.clone();
    registry.on(MessageKind::Menu, move |envelope| {
        if let Message::Menu(code) = envelope.message {
            a.menu(&envelope.target, code);
        }
    });

    let a = actions.clone();
    registry.on(MessageKind::RefsReceived, move |envelope| {
        if let Message::RefsReceived(paths) = envelope.message {
            a.open_files(&paths);
        }
    });

    let a = actions.clone();
    registry.on(MessageKind::ArgvReceived, move |envelope| {
        if let Message::ArgvReceived(args) = envelope.message {
            // argv[0] is the program
            for arg in args.iter().skip(1) {
                a.open_in_new_window(arg);
            }
        }
    });

    let a = actions.clone();
    registry.on(MessageKind::AboutRequested, move |_| a.about());

    let a = actions;
    registry.on(MessageKind::QuitRequested, move |_| a.quit());

    registry.fallback(|envelope| {
        tracing::debug!("Unhandled toolkit message {:?}", envelope.message);
    });
}
