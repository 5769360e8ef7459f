/// How serious an alert is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Recoverable problem, e.g. a handler failed to launch
    Warning,
    /// The application cannot continue
    Fatal,
}

/// A user-visible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub text: String,
    pub severity: Severity,
}

impl Alert {
    pub fn warning(warning: &str, detail: Option<&str>) -> Self {
        let text = match detail {
            Some(detail) => format!("{}:\n{}", warning, detail),
            None => warning.to_string(),
        };
        Self {
            title: "Warning".to_string(),
            text,
            severity: Severity::Warning,
        }
    }

    pub fn fatal(error: &str) -> Self {
        Self {
            title: "Error".to_string(),
            text: format!("Cannot continue:\n{}", error),
            severity: Severity::Fatal,
        }
    }
}

/// Where alerts are shown. A desktop front end would pop a dialog; the
/// headless shell only logs.
#[cfg_attr(test, mockall::automock)]
pub trait AlertSink {
    fn show(&self, alert: &Alert);
}

/// Alert sink that writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn show(&self, alert: &Alert) {
        match alert.severity {
            Severity::Warning => tracing::warn!("{}: {}", alert.title, alert.text),
            Severity::Fatal => tracing::error!("{}: {}", alert.title, alert.text),
        }
    }
}

/// Report a serious but recoverable problem to the user.
pub fn warn_user(sink: &dyn AlertSink, warning: &str, detail: Option<&str>) {
    tracing::info!("warn_user: {} ({})", warning, detail.unwrap_or(""));
    sink.show(&Alert::warning(warning, detail));
}

/// Report a problem the application cannot recover from. The caller is
/// expected to stop afterwards.
pub fn report_fatal(sink: &dyn AlertSink, error: &str) {
    tracing::error!("report_fatal: {}", error);
    sink.show(&Alert::fatal(error));
}
