use super::ShellError;
use camino::Utf8Path;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fs;

/// Visited URLs and stored cookies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    /// Visited URLs, oldest first, without duplicates
    #[serde(default)]
    pub urls: IndexSet<String>,

    /// Cookie lines as handed over by the fetch layer
    #[serde(default)]
    pub cookies: Vec<String>,
}

/// Load/save hooks for the URL database and cookie jar, called at startup
/// and shutdown.
pub trait SessionStore {
    fn load_urls(&mut self, path: &Utf8Path) -> Result<(), ShellError>;
    fn load_cookies(&mut self, path: &Utf8Path) -> Result<(), ShellError>;
    fn save_urls(&self, path: &Utf8Path) -> Result<(), ShellError>;
    fn save_cookies(&self, path: &Utf8Path) -> Result<(), ShellError>;
}

/// YAML-file backed session store.
///
/// Missing files load as empty; the directory of a save target must exist.
#[derive(Debug, Default)]
pub struct FileSessionStore {
    data: SessionData,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UrlFile {
    #[serde(default)]
    urls: IndexSet<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CookieFile {
    #[serde(default)]
    cookies: Vec<String>,
}

impl FileSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(&self) -> &SessionData {
        &self.data
    }

    /// Record a visit; repeated URLs keep their first position.
    pub fn record_visit(&mut self, url: &str) {
        self.data.urls.insert(url.to_string());
    }

    pub fn add_cookie(&mut self, cookie: impl Into<String>) {
        self.data.cookies.push(cookie.into());
    }
}

impl SessionStore for FileSessionStore {
    fn load_urls(&mut self, path: &Utf8Path) -> Result<(), ShellError> {
        if let Some(file) = read_yaml::<UrlFile>(path)? {
            tracing::info!("Loaded {} URLs from {}", file.urls.len(), path);
            self.data.urls = file.urls;
        }
        Ok(())
    }

    fn load_cookies(&mut self, path: &Utf8Path) -> Result<(), ShellError> {
        if let Some(file) = read_yaml::<CookieFile>(path)? {
            tracing::info!("Loaded {} cookies from {}", file.cookies.len(), path);
            self.data.cookies = file.cookies;
        }
        Ok(())
    }

    fn save_urls(&self, path: &Utf8Path) -> Result<(), ShellError> {
        let file = UrlFile {
            urls: self.data.urls.clone(),
        };
        fs::write(path, serde_yaml_ng::to_string(&file)?)?;
        tracing::info!("Saved {} URLs to {}", file.urls.len(), path);
        Ok(())
    }

    fn save_cookies(&self, path: &Utf8Path) -> Result<(), ShellError> {
        let file = CookieFile {
            cookies: self.data.cookies.clone(),
        };
        fs::write(path, serde_yaml_ng::to_string(&file)?)?;
        tracing::info!("Saved {} cookies to {}", file.cookies.len(), path);
        Ok(())
    }
}

fn read_yaml<T: for<'de> Deserialize<'de>>(path: &Utf8Path) -> Result<Option<T>, ShellError> {
    if !path.exists() {
        tracing::debug!("{} does not exist, starting empty", path);
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_yaml_ng::from_str(&contents)?))
}
