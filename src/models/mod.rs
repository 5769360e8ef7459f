//! Data models shared by the bridge, the shell and its services.
//!
//! - [`Envelope`]: a [`Message`] in transit from the toolkit thread, with optional
//!   [`Target`] annotations
//! - [`MessageKind`]: the routing key derived from a message
//! - [`ShellConfig`]: settings, option paths and external handlers loaded from
//!   `Shell Config.yaml`

pub mod config;
pub mod envelope;

pub use config::{BrowserOptions, HandlerSettings, ShellConfig, ShellSettings};
pub use envelope::{Envelope, Message, MessageKind, NavAction, Target, ViewId, WindowId};
