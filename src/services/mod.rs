//! Services module - OS-facing helpers used by the shell.
//!
//! Nothing here touches the poll loop; handlers and the shell lifecycle call
//! into these services from the main thread.
//!
//! # Components
//!
//! - [`ResourceLocator`]: finds resource files across the user settings
//!   directory, `~/.<app>/`, `$<APP>RES` and the install directory
//! - [`paths`]: `file:` URL and path conversions, leaf names, resource URLs
//! - [`Launcher`]: hands unsupported URLs and document source to external programs
//! - [`AlertSink`] / [`warn_user`] / [`report_fatal`]: user-visible failures
//! - [`SessionStore`]: URL history and cookie load/save hooks

pub mod alerts;
pub mod launcher;
pub mod paths;
pub mod resources;
pub mod session;

pub use alerts::{Alert, AlertSink, LogAlertSink, Severity, report_fatal, warn_user};
pub use launcher::{CommandSpawner, Launcher, Spawner};
pub use resources::ResourceLocator;
pub use session::{FileSessionStore, SessionData, SessionStore};

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors from the shell's OS-facing services
#[derive(Error, Debug)]
pub enum ShellError {
    #[error("User settings directory could not be determined")]
    NoSettingsDir,

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Not a file URL: {0}")]
    NotFileUrl(String),

    #[error("File URL does not name a UTF-8 path: {0}")]
    NonUtf8Path(String),

    #[error("No document source")]
    NoSource,

    #[error("No handler configured for scheme {0}")]
    NoHandler(String),

    #[error("Invalid URL scheme in {0}")]
    InvalidScheme(String),

    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: String,
        source: std::io::Error,
    },

    #[error("No editor could be started for {0}")]
    NoEditor(Utf8PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse session file: {0}")]
    Parse(#[from] serde_yaml_ng::Error),
}
