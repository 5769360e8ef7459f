use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Handle of an application-level browser window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowId(pub u32);

/// Handle of a toolkit view inside a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewId(pub u32);

/// Navigation commands coming from toolbar buttons and external browsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NavAction {
    Back,
    Forward,
    Stop,
    Reload,
    Home,
    ScrollUp,
    ScrollDown,
}

/// Messages produced by the toolkit thread.
///
/// Each variant carries its own payload; the loop never interprets it and
/// only routes on [`Message::kind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Toolbar or remote navigation
    Navigate(NavAction),

    /// The URL bar text changed (not yet submitted)
    UrlChanged(String),

    /// A URL was submitted, either from the URL bar or an external request
    OpenUrl(String),

    /// Menu item selected, identified by its command code
    Menu(u32),

    /// Files dropped on or opened with the application
    RefsReceived(Vec<Utf8PathBuf>),

    /// Command-line arguments forwarded from a second launch
    ArgvReceived(Vec<String>),

    AboutRequested,

    QuitRequested,

    /// Anything the toolkit emits that the shell has no dedicated variant for
    Custom { code: u32, payload: Vec<u8> },
}

/// Field-less discriminant of [`Message`], used as the handler lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Navigate,
    UrlChanged,
    OpenUrl,
    Menu,
    RefsReceived,
    ArgvReceived,
    AboutRequested,
    QuitRequested,
    Custom,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Navigate(_) => MessageKind::Navigate,
            Message::UrlChanged(_) => MessageKind::UrlChanged,
            Message::OpenUrl(_) => MessageKind::OpenUrl,
            Message::Menu(_) => MessageKind::Menu,
            Message::RefsReceived(_) => MessageKind::RefsReceived,
            Message::ArgvReceived(_) => MessageKind::ArgvReceived,
            Message::AboutRequested => MessageKind::AboutRequested,
            Message::QuitRequested => MessageKind::QuitRequested,
            Message::Custom { .. } => MessageKind::Custom,
        }
    }
}

/// Optional destination annotations attached by the producer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub view: Option<ViewId>,
    pub window: Option<WindowId>,
}

/// A message in transit from the toolkit thread to the main loop.
///
/// Envelopes move by value: the sender gives one up on `send` and the router
/// owns it after dispatch.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub message: Message,
    pub target: Target,
}

impl Envelope {
    /// Envelope with no target annotations (application-level messages).
    pub fn new(message: Message) -> Self {
        Self {
            message,
            target: Target::default(),
        }
    }

    /// Annotate with the view that produced the message.
    pub fn with_view(mut self, view: ViewId) -> Self {
        self.target.view = Some(view);
        self
    }

    /// Annotate with the application window the message belongs to.
    pub fn with_window(mut self, window: WindowId) -> Self {
        self.target.window = Some(window);
        self
    }

    pub fn kind(&self) -> MessageKind {
        self.message.kind()
    }
}
