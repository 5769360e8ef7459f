// shellbridge - main-thread event bridge for a browser shell
//
// This is the library crate containing the poll loop, its collaborators and
// the shell services. The binary crate (main.rs) provides a headless host.

pub mod bridge;
pub mod config;
pub mod layout;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod schedule;
pub mod services;
pub mod shell;
pub mod state;

// Re-export commonly used types for convenience
pub use bridge::{EnvelopeSender, EventBridge, PollContext, envelope_channel};
pub use config::ConfigManager;
pub use models::{Envelope, Message, MessageKind, NavAction, ShellConfig, Target, WindowId};
pub use shell::Shell;
pub use state::{StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
