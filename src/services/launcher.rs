use super::ShellError;
use super::paths::url_to_path;
use crate::models::HandlerSettings;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use regex::Regex;
use std::fs;
use std::io;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU32, Ordering};

/// Starts external programs without waiting for them.
#[cfg_attr(test, mockall::automock)]
pub trait Spawner {
    fn spawn(&self, program: &str, args: &[String]) -> io::Result<()>;
}

/// [`Spawner`] backed by `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandSpawner;

impl Spawner for CommandSpawner {
    fn spawn(&self, program: &str, args: &[String]) -> io::Result<()> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        tracing::debug!("Started {} (pid {})", program, child.id());
        Ok(())
    }
}

/// Hands URLs the browser cannot handle, and document source, to external
/// programs.
pub struct Launcher<S: Spawner = CommandSpawner> {
    url_handlers: IndexMap<String, String>,
    editors: Vec<String>,
    cache_dir: Utf8PathBuf,
    spawner: S,
    scheme_pattern: Regex,
    next_source_file: AtomicU32,
}

impl Launcher<CommandSpawner> {
    pub fn new(handlers: &HandlerSettings, cache_dir: impl Into<Utf8PathBuf>) -> Self {
        Self::with_spawner(handlers, cache_dir, CommandSpawner)
    }
}

impl<S: Spawner> Launcher<S> {
    pub fn with_spawner(
        handlers: &HandlerSettings,
        cache_dir: impl Into<Utf8PathBuf>,
        spawner: S,
    ) -> Self {
        Self {
            url_handlers: handlers
                .url_handlers
                .iter()
                .map(|(scheme, command)| (scheme.to_ascii_lowercase(), command.clone()))
                .collect(),
            editors: handlers.editors.clone(),
            cache_dir: cache_dir.into(),
            spawner,
            scheme_pattern: Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*):")
                .expect("Invalid scheme regex"),
            next_source_file: AtomicU32::new(0),
        }
    }

    pub fn cache_dir(&self) -> &Utf8Path {
        &self.cache_dir
    }

    /// Lowercased scheme of `url`, if it has a syntactically valid one.
    pub fn scheme_of(&self, url: &str) -> Option<String> {
        self.scheme_pattern
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_ascii_lowercase())
    }

    /// Launch the configured handler for `url`'s scheme.
    pub fn launch_url(&self, url: &str) -> Result<(), ShellError> {
        let scheme = self
            .scheme_of(url)
            .ok_or_else(|| ShellError::InvalidScheme(url.to_string()))?;

        let command = self
            .url_handlers
            .get(&scheme)
            .ok_or_else(|| ShellError::NoHandler(scheme.clone()))?;

        tracing::info!("Launching {} handler for {}", scheme, url);
        self.spawn_command(command, url)
    }

    /// Open a document's source in the first editor that starts.
    ///
    /// Local files are opened in place; anything else is written to a new
    /// file in the cache directory first. Returns the path handed to the
    /// editor.
    pub fn view_source(
        &self,
        url: &str,
        source: Option<&[u8]>,
        mime: &str,
    ) -> Result<Utf8PathBuf, ShellError> {
        let source = match source {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => return Err(ShellError::NoSource),
        };

        let path = match local_file(url) {
            Some(path) => path,
            None => self.write_source_file(source, mime)?,
        };

        for editor in &self.editors {
            match self.spawn_command(editor, path.as_str()) {
                Ok(()) => return Ok(path),
                Err(e) => tracing::debug!("Editor {} unavailable: {}", editor, e),
            }
        }

        Err(ShellError::NoEditor(path))
    }

    fn write_source_file(&self, source: &[u8], mime: &str) -> Result<Utf8PathBuf, ShellError> {
        fs::create_dir_all(&self.cache_dir).map_err(|source| ShellError::CreateDir {
            path: self.cache_dir.clone(),
            source,
        })?;

        let n = self.next_source_file.fetch_add(1, Ordering::Relaxed);
        let path = self.cache_dir.join(format!(
            "source-{}-{}.{}",
            std::process::id(),
            n,
            extension_for_mime(mime)
        ));
        fs::write(&path, source)?;
        tracing::debug!("Wrote {} bytes of source to {}", source.len(), path);
        Ok(path)
    }

    fn spawn_command(&self, command: &str, arg: &str) -> Result<(), ShellError> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| ShellError::NoHandler(command.to_string()))?;
        let mut args: Vec<String> = parts.map(str::to_string).collect();
        args.push(arg.to_string());

        self.spawner
            .spawn(program, &args)
            .map_err(|source| ShellError::Launch {
                program: program.to_string(),
                source,
            })
    }
}

/// Existing regular file behind a `file:` URL.
fn local_file(url: &str) -> Option<Utf8PathBuf> {
    let path = Utf8PathBuf::from(url_to_path(url).ok()?);
    path.is_file().then_some(path)
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        m if m.contains("html") => "html",
        m if m.contains("css") => "css",
        m if m.contains("javascript") => "js",
        m if m.contains("xml") => "xml",
        _ => "txt",
    }
}
