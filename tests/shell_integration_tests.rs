// Integration tests for the shell lifecycle: bootstrap, dispatch through the
// poll loop, and session persistence.

use camino::{Utf8Path, Utf8PathBuf};
use shellbridge::bridge::WaitTimeout;
use shellbridge::models::{Envelope, Message, NavAction, ShellConfig, WindowId};
use shellbridge::services::{
    Alert, AlertSink, FileSessionStore, Launcher, ResourceLocator, SessionStore, Severity,
    Spawner,
};
use shellbridge::shell::{DEFAULT_HOMEPAGE, Shell};
use std::cell::RefCell;
use std::fs;
use std::io;
use std::rc::Rc;
use tempfile::TempDir;

#[derive(Default)]
struct CollectingSink {
    alerts: RefCell<Vec<Alert>>,
}

impl AlertSink for CollectingSink {
    fn show(&self, alert: &Alert) {
        self.alerts.borrow_mut().push(alert.clone());
    }
}

#[derive(Clone, Default)]
struct RecordingSpawner {
    calls: Rc<RefCell<Vec<(String, Vec<String>)>>>,
}

impl Spawner for RecordingSpawner {
    fn spawn(&self, program: &str, args: &[String]) -> io::Result<()> {
        self.calls
            .borrow_mut()
            .push((program.to_string(), args.to_vec()));
        Ok(())
    }
}

struct Fixture {
    _temp: TempDir,
    settings: Utf8PathBuf,
    config: ShellConfig,
    locator: ResourceLocator,
    alerts: Rc<CollectingSink>,
    spawner: RecordingSpawner,
}

impl Fixture {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp.path().canonicalize().unwrap()).unwrap();
        let settings = root.join("settings");

        let mut config = ShellConfig::default();
        config.settings.cache_dir = root.join("cache").into_string();
        config.settings.autosave_interval = 0;
        config.settings.channel_capacity = 16;

        let locator = ResourceLocator::new(
            "shellbridge",
            Some(settings.clone()),
            Some(root.join("home")),
            None,
            root.join("res"),
        );

        Self {
            _temp: temp,
            settings,
            config,
            locator,
            alerts: Rc::new(CollectingSink::default()),
            spawner: RecordingSpawner::default(),
        }
    }

    fn shell(&self) -> Shell {
        let launcher = Launcher::with_spawner(
            &self.config.handlers,
            self.config.settings.cache_dir.clone(),
            self.spawner.clone(),
        );
        Shell::init_with(
            self.config.clone(),
            &self.locator,
            self.alerts.clone(),
            launcher,
        )
        .unwrap()
    }
}

fn url_of(shell: &Shell, window: WindowId) -> String {
    shell.state().read(|s| s.windows[&window].url.clone())
}

#[test]
fn test_init_resolves_paths_and_creates_directories() {
    let fixture = Fixture::new();
    let shell = fixture.shell();

    assert!(fixture.settings.is_dir());
    assert!(Utf8Path::new(&shell.config().settings.cache_dir).is_dir());
    assert_eq!(shell.options().url_file, fixture.settings.join("URLs").as_str());
    assert_eq!(shell.options().cookie_jar, fixture.settings.join("Cookies").as_str());
    assert!(!shell.options().ca_path.is_empty());
    assert!(fixture.alerts.alerts.borrow().is_empty());
}

#[test]
fn test_start_url_precedence() {
    let mut fixture = Fixture::new();
    let args = vec!["shellbridge".to_string(), "http://from-args/".to_string()];

    let shell = fixture.shell();
    assert_eq!(shell.start_url(&args), "http://from-args/");
    assert_eq!(shell.start_url(&args[..1]), DEFAULT_HOMEPAGE);

    fixture.config.options.homepage_url = "http://home/".to_string();
    let shell = fixture.shell();
    assert_eq!(shell.start_url(&args[..1]), "http://home/");
}

#[test]
fn test_envelopes_drive_navigation() {
    let fixture = Fixture::new();
    let mut shell = fixture.shell();
    let sender = shell.sender();

    let window = shell.open_start_window(&["shellbridge".to_string()]);
    assert_eq!(url_of(&shell, window), DEFAULT_HOMEPAGE);

    sender
        .send(Envelope::new(Message::OpenUrl("http://example.com/".into())))
        .unwrap();
    let report = shell.poll_once();
    // The start window's reformat keeps this cycle from blocking
    assert_eq!(report.timeout, WaitTimeout::Zero);
    assert!(report.dispatched);
    assert!(report.flushed);
    assert_eq!(url_of(&shell, window), "http://example.com/");

    sender
        .send(Envelope::new(Message::Navigate(NavAction::Back)).with_window(window))
        .unwrap();
    let report = shell.poll_once();
    assert!(report.dispatched);
    assert_eq!(url_of(&shell, window), DEFAULT_HOMEPAGE);
}

#[test]
fn test_external_scheme_is_launched_not_shown() {
    let fixture = Fixture::new();
    let mut shell = fixture.shell();

    shell
        .sender()
        .send(Envelope::new(Message::OpenUrl("mailto:someone@example.com".into())))
        .unwrap();
    shell.poll_once();

    assert!(shell.state().snapshot().windows.is_empty());
    assert_eq!(
        *fixture.spawner.calls.borrow(),
        vec![(
            "xdg-email".to_string(),
            vec!["mailto:someone@example.com".to_string()]
        )]
    );
}

#[test]
fn test_run_until_quit_then_save_session() {
    let fixture = Fixture::new();
    let mut shell = fixture.shell();
    let sender = shell.sender();

    shell.open_start_window(&["shellbridge".to_string(), "http://first/".to_string()]);
    sender
        .send(Envelope::new(Message::OpenUrl("http://second/".into())))
        .unwrap();
    sender.send(Envelope::new(Message::QuitRequested)).unwrap();

    shell.run();
    assert!(shell.state().quit_requested());
    shell.shutdown().unwrap();

    let mut saved = FileSessionStore::new();
    saved.load_urls(&fixture.settings.join("URLs")).unwrap();
    let urls: Vec<_> = saved.data().urls.iter().cloned().collect();
    assert_eq!(urls, vec!["http://first/", "http://second/"]);
    assert!(fixture.settings.join("Cookies").is_file());
}

#[test]
fn test_init_loads_existing_session() {
    let fixture = Fixture::new();
    fs::create_dir_all(&fixture.settings).unwrap();

    let mut previous = FileSessionStore::new();
    previous.record_visit("http://remembered/");
    previous.add_cookie("id=1");
    previous.save_urls(&fixture.settings.join("URLs")).unwrap();
    previous.save_cookies(&fixture.settings.join("Cookies")).unwrap();

    let shell = fixture.shell();

    assert!(shell.session().data().urls.contains("http://remembered/"));
    assert_eq!(shell.session().data().cookies, vec!["id=1"]);
}

#[test]
fn test_damaged_history_warns_and_continues() {
    let fixture = Fixture::new();
    fs::create_dir_all(&fixture.settings).unwrap();
    fs::write(fixture.settings.join("URLs"), "urls: [broken").unwrap();

    let shell = fixture.shell();

    assert!(shell.session().data().urls.is_empty());
    let alerts = fixture.alerts.alerts.borrow();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].text.starts_with("Failed to load URL history"));
}

#[test]
fn test_autosave_runs_from_the_scheduler() {
    let mut fixture = Fixture::new();
    fixture.config.settings.autosave_interval = 1;
    let mut shell = fixture.shell();

    // Nothing queued and nothing pending: the wait is bounded by the autosave
    let report = shell.poll_once();

    assert!(matches!(report.timeout, WaitTimeout::Bounded(_)));
    assert_eq!(report.late_callbacks, 1);
    assert!(fixture.settings.join("URLs").is_file());
}

#[test]
fn test_missing_settings_directory_is_fatal() {
    let fixture = Fixture::new();
    let homeless = ResourceLocator::new(
        "shellbridge",
        None,
        None,
        None,
        fixture.settings.join("res"),
    );
    let launcher = Launcher::with_spawner(
        &fixture.config.handlers,
        fixture.config.settings.cache_dir.clone(),
        fixture.spawner.clone(),
    );

    let result = Shell::init_with(
        fixture.config.clone(),
        &homeless,
        fixture.alerts.clone(),
        launcher,
    );

    assert!(result.is_err());
    let alerts = fixture.alerts.alerts.borrow();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, Severity::Fatal);
    assert!(alerts[0].text.contains("Unable to set up the user settings directory"));
}
