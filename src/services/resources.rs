use super::ShellError;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Locates shared resource files by searching known places in order.
///
/// Search order:
/// 1. the user settings directory for the application
/// 2. `~/.<app>/`
/// 3. the directory named by the `<APP>RES` environment variable
/// 4. the install resource directory
#[derive(Debug, Clone)]
pub struct ResourceLocator {
    settings_dir: Option<Utf8PathBuf>,
    home_dir: Option<Utf8PathBuf>,
    env_dir: Option<Utf8PathBuf>,
    install_dir: Utf8PathBuf,
    app_name: String,
}

impl ResourceLocator {
    /// Build a locator from the running user's environment.
    pub fn from_env(app_name: &str, install_dir: impl Into<Utf8PathBuf>) -> Self {
        let settings_dir = dirs::config_dir()
            .and_then(|p| Utf8PathBuf::from_path_buf(p).ok())
            .map(|p| p.join(app_name));
        let home_dir = dirs::home_dir().and_then(|p| Utf8PathBuf::from_path_buf(p).ok());
        let env_var = format!("{}RES", app_name.to_uppercase());
        let env_dir = std::env::var(&env_var).ok().map(Utf8PathBuf::from);

        tracing::debug!(
            "Resource locator: settings={:?}, home={:?}, ${}={:?}",
            settings_dir,
            home_dir,
            env_var,
            env_dir
        );

        Self::new(app_name, settings_dir, home_dir, env_dir, install_dir)
    }

    pub fn new(
        app_name: &str,
        settings_dir: Option<Utf8PathBuf>,
        home_dir: Option<Utf8PathBuf>,
        env_dir: Option<Utf8PathBuf>,
        install_dir: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            settings_dir,
            home_dir,
            env_dir,
            install_dir: install_dir.into(),
            app_name: app_name.to_string(),
        }
    }

    pub fn settings_dir(&self) -> Option<&Utf8Path> {
        self.settings_dir.as_deref()
    }

    /// Candidate locations for `filename`, in search order.
    pub fn candidates(&self, filename: &str) -> Vec<Utf8PathBuf> {
        let mut candidates = Vec::with_capacity(4);
        if let Some(dir) = &self.settings_dir {
            candidates.push(dir.join(filename));
        }
        if let Some(home) = &self.home_dir {
            candidates.push(home.join(format!(".{}", self.app_name)).join(filename));
        }
        if let Some(dir) = &self.env_dir {
            candidates.push(dir.join(filename));
        }
        candidates.push(self.install_dir.join(filename));
        candidates
    }

    /// First readable candidate for `filename`; otherwise `default` with a
    /// leading `%` expanded to the settings directory and a leading `~` to
    /// the home directory.
    pub fn find(&self, filename: &str, default: &str) -> Utf8PathBuf {
        for candidate in self.candidates(filename) {
            if is_readable(&candidate) {
                tracing::debug!("Found resource {} at {}", filename, candidate);
                return canonical_or_self(candidate);
            }
        }

        let fallback = if let Some(rest) = default.strip_prefix('%') {
            match &self.settings_dir {
                Some(dir) => Utf8PathBuf::from(format!("{}{}", dir, rest)),
                None => Utf8PathBuf::from(rest),
            }
        } else if let Some(rest) = default.strip_prefix('~') {
            match &self.home_dir {
                Some(home) => Utf8PathBuf::from(format!("{}{}", home, rest)),
                None => Utf8PathBuf::from(rest),
            }
        } else {
            Utf8PathBuf::from(default)
        };

        tracing::debug!("Resource {} not found, using {}", filename, fallback);
        canonical_or_self(fallback)
    }

    /// Create the user settings directory if needed.
    pub fn ensure_settings_dir(&self) -> Result<&Utf8Path, ShellError> {
        let dir = self.settings_dir.as_deref().ok_or(ShellError::NoSettingsDir)?;
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|source| ShellError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
            tracing::info!("Created settings directory {}", dir);
        }
        Ok(dir)
    }
}

fn is_readable(path: &Utf8Path) -> bool {
    if path.is_dir() {
        fs::read_dir(path).is_ok()
    } else {
        fs::File::open(path).is_ok()
    }
}

fn canonical_or_self(path: Utf8PathBuf) -> Utf8PathBuf {
    path.canonicalize_utf8().unwrap_or(path)
}
