//! Shell lifecycle: bootstrap, the run loop, and shutdown.
//!
//! [`Shell`] owns the main-thread half of the bridge together with the
//! [`PollContext`] it drives. Toolkit threads get an [`EnvelopeSender`]
//! from [`Shell::sender`] and never touch anything else.
//!
//! # Lifecycle
//!
//! 1. [`Shell::init`] resolves unset option paths through the
//!    [`ResourceLocator`], creates the settings and cache directories, loads
//!    the URL history and cookies, and wires handlers into the router
//! 2. [`Shell::open_start_window`] opens the first window on
//!    [`Shell::start_url`]
//! 3. [`Shell::run`] polls until a quit is requested
//! 4. [`Shell::shutdown`] saves cookies, then URL history

mod handlers;

pub use handlers::{MENU_CLOSE_WINDOW, MENU_NEW_WINDOW, MENU_VIEW_SOURCE};

use crate::bridge::{
    CycleReport, DescriptorRegistry, EnvelopeSender, EventBridge, HandlerRegistry, PollContext,
    envelope_channel,
};
use crate::layout::{ReformatHandle, ReformatQueue};
use crate::metrics::BridgeMetrics;
use crate::models::{BrowserOptions, ShellConfig, WindowId};
use crate::schedule::Scheduler;
use crate::services::{
    AlertSink, FileSessionStore, Launcher, LogAlertSink, ResourceLocator, SessionStore,
    ShellError, Spawner, report_fatal, warn_user,
};
use crate::state::StateManager;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use handlers::Actions;
use std::cell::{Ref, RefCell};
use std::fs;
use std::rc::Rc;
use std::time::Duration;

/// Start page when neither the command line nor the options name one.
pub const DEFAULT_HOMEPAGE: &str = "about:welcome";

type Reformatter = Box<dyn FnMut(WindowId)>;

/// The concrete collaborators the shell hands to the poll loop.
pub type ShellContext =
    PollContext<DescriptorRegistry, Scheduler, ReformatQueue<Reformatter>, HandlerRegistry>;

pub struct Shell {
    config: ShellConfig,
    state: StateManager,
    session: Rc<RefCell<FileSessionStore>>,
    sender: EnvelopeSender,
    bridge: EventBridge,
    ctx: ShellContext,
}

impl Shell {
    /// Bootstrap with the default launcher and a logging alert sink.
    pub fn init(config: ShellConfig, locator: &ResourceLocator) -> Result<Self> {
        let launcher = Launcher::new(&config.handlers, config.settings.cache_dir.clone());
        Self::init_with(config, locator, Rc::new(LogAlertSink), launcher)
    }

    /// Bootstrap with an explicit alert sink and launcher.
    pub fn init_with<S: Spawner + 'static>(
        mut config: ShellConfig,
        locator: &ResourceLocator,
        alerts: Rc<dyn AlertSink>,
        launcher: Launcher<S>,
    ) -> Result<Self> {
        let settings_dir = locator
            .ensure_settings_dir()
            .context("Unable to set up the user settings directory")
            .map_err(|e| fatal(alerts.as_ref(), e))?;
        tracing::info!("Using settings directory {}", settings_dir);

        resolve_options(&mut config.options, locator);

        let cache_dir = Utf8Path::new(&config.settings.cache_dir);
        fs::create_dir_all(cache_dir)
            .with_context(|| format!("Failed to create cache directory: {}", cache_dir))
            .map_err(|e| fatal(alerts.as_ref(), e))?;

        let mut session = FileSessionStore::new();
        load_session(&mut session, &config.options, alerts.as_ref());
        let session = Rc::new(RefCell::new(session));

        let (sender, receiver) = envelope_channel(config.settings.channel_capacity)
            .context("Failed to create envelope channel")
            .map_err(|e| fatal(alerts.as_ref(), e))?;
        let bridge = EventBridge::new(receiver);

        let state = StateManager::new();
        let reformatter: Reformatter =
            Box::new(|window: WindowId| tracing::debug!("Reformatted window {}", window.0));
        let layout = ReformatQueue::new(reformatter);

        let actions = Actions::new(
            state.clone(),
            launcher,
            alerts,
            session.clone(),
            layout.handle(),
            homepage(&config.options).to_string(),
        );
        let mut router = HandlerRegistry::new();
        handlers::register(&mut router, Rc::new(actions));

        let mut timers = Scheduler::new();
        if config.settings.autosave_interval > 0 {
            let interval = Duration::from_secs(config.settings.autosave_interval);
            let session = session.clone();
            let cookie_jar = Utf8PathBuf::from(config.options.cookie_jar.clone());
            let url_file = Utf8PathBuf::from(config.options.url_file.clone());
            timers.schedule_repeating(interval, move || {
                if let Err(e) = save_session(&*session.borrow(), &cookie_jar, &url_file) {
                    tracing::warn!("Session autosave failed: {}", e);
                }
            });
            tracing::debug!("Session autosave every {:?}", interval);
        }

        let ctx = PollContext::new(DescriptorRegistry::new(), timers, layout, router);

        tracing::info!("Shell initialized");

        Ok(Self {
            config,
            state,
            session,
            sender,
            bridge,
            ctx,
        })
    }

    /// URL for the first window: `args[1]` if present (`args[0]` is the
    /// program), then the configured homepage, then [`DEFAULT_HOMEPAGE`].
    pub fn start_url(&self, args: &[String]) -> String {
        args.get(1)
            .cloned()
            .unwrap_or_else(|| homepage(&self.config.options).to_string())
    }

    /// Open the initial browser window.
    pub fn open_start_window(&mut self, args: &[String]) -> WindowId {
        let url = self.start_url(args);
        let (window, _) = self.state.open_window(&url);
        self.session.borrow_mut().record_visit(&url);
        self.reformat_handle().request(window);
        tracing::info!("Opened start window {} on {}", window.0, url);
        window
    }

    /// One poll cycle; transfers count as active whenever any descriptor
    /// is registered.
    pub fn poll_once(&mut self) -> CycleReport {
        let active = self.ctx.transfers().is_active();
        self.bridge.poll(active, &mut self.ctx)
    }

    /// Poll until a quit is requested.
    pub fn run(&mut self) {
        tracing::info!("Entering poll loop");
        while !self.state.quit_requested() {
            self.poll_once();
        }
        tracing::info!("Quit requested, leaving poll loop");
    }

    /// Save cookies to the cookie jar, then the URL history.
    pub fn shutdown(self) -> Result<()> {
        self.bridge.metrics().log_summary();

        let options = &self.config.options;
        save_session(
            &*self.session.borrow(),
            Utf8Path::new(&options.cookie_jar),
            Utf8Path::new(&options.url_file),
        )
        .context("Failed to save session")?;

        tracing::info!("Shell shut down");
        Ok(())
    }

    /// A sender for a toolkit thread.
    pub fn sender(&self) -> EnvelopeSender {
        self.sender.clone()
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// Options with every path resolved.
    pub fn options(&self) -> &BrowserOptions {
        &self.config.options
    }

    pub fn session(&self) -> Ref<'_, FileSessionStore> {
        self.session.borrow()
    }

    pub fn metrics(&self) -> &BridgeMetrics {
        self.bridge.metrics()
    }

    pub fn reformat_handle(&self) -> ReformatHandle {
        self.ctx.layout().handle()
    }

    /// Descriptors of in-flight transfers.
    pub fn transfers_mut(&mut self) -> &mut DescriptorRegistry {
        self.ctx.transfers_mut()
    }

    pub fn timers_mut(&mut self) -> &mut Scheduler {
        self.ctx.timers_mut()
    }
}

/// Startup cannot continue: tell the user, then hand the error back.
fn fatal(alerts: &dyn AlertSink, error: anyhow::Error) -> anyhow::Error {
    report_fatal(alerts, &format!("{:#}", error));
    error
}

fn homepage(options: &BrowserOptions) -> &str {
    if options.homepage_url.is_empty() {
        DEFAULT_HOMEPAGE
    } else {
        &options.homepage_url
    }
}

/// Fill every unset option path from the resource locator.
fn resolve_options(options: &mut BrowserOptions, locator: &ResourceLocator) {
    resolve_option(&mut options.choices_file, "choices file", || {
        locator.find("Choices", "%/Choices")
    });
    resolve_option(&mut options.cookie_file, "cookie file", || {
        locator.find("Cookies", "%/Cookies")
    });
    resolve_option(&mut options.cookie_jar, "cookie jar", || {
        locator.find("Cookies", "%/Cookies")
    });
    resolve_option(&mut options.url_file, "URL file", || {
        locator.find("URLs", "%/URLs")
    });
    resolve_option(&mut options.ca_path, "certificate path", || {
        locator.find("certs", "/etc/ssl/certs")
    });
}

fn resolve_option(value: &mut String, what: &str, locate: impl FnOnce() -> Utf8PathBuf) {
    if value.is_empty() {
        *value = locate().into_string();
        tracing::info!("Using '{}' as {}", value, what);
    }
}

/// Load URL history and cookies. A damaged file costs its contents, not the
/// startup.
fn load_session(store: &mut impl SessionStore, options: &BrowserOptions, alerts: &dyn AlertSink) {
    if let Err(e) = store.load_urls(Utf8Path::new(&options.url_file)) {
        warn_user(alerts, "Failed to load URL history", Some(&e.to_string()));
    }
    if let Err(e) = store.load_cookies(Utf8Path::new(&options.cookie_file)) {
        warn_user(alerts, "Failed to load cookies", Some(&e.to_string()));
    }
}

fn save_session(
    store: &impl SessionStore,
    cookie_jar: &Utf8Path,
    url_file: &Utf8Path,
) -> Result<(), ShellError> {
    store.save_cookies(cookie_jar)?;
    store.save_urls(url_file)
}
