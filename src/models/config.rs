use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Shell configuration from `Shell Config.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShellConfig {
    #[serde(rename = "Shell_Settings", default)]
    pub settings: ShellSettings,

    #[serde(rename = "Options", default)]
    pub options: BrowserOptions,

    #[serde(rename = "Handlers", default)]
    pub handlers: HandlerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellSettings {
    /// Application name; also names the settings directory and the
    /// resource environment variable (`<NAME>RES`)
    #[serde(rename = "App Name", default = "default_app_name")]
    pub app_name: String,

    #[serde(rename = "Debug Mode", default)]
    pub debug_mode: bool,

    #[serde(rename = "Log Dir", default = "default_log_dir")]
    pub log_dir: String,

    /// Maximum envelopes waiting between the toolkit thread and the loop
    #[serde(rename = "Channel Capacity", default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Install-time resource directory, searched after user locations
    #[serde(rename = "Resource Dir", default = "default_resource_dir")]
    pub resource_dir: String,

    /// Where view-source writes documents that are not local files
    #[serde(rename = "Cache Dir", default = "default_cache_dir")]
    pub cache_dir: String,

    /// Seconds between session saves while running; 0 saves only at exit
    #[serde(rename = "Autosave Interval", default = "default_autosave_interval")]
    pub autosave_interval: u64,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            debug_mode: false,
            log_dir: default_log_dir(),
            channel_capacity: default_channel_capacity(),
            resource_dir: default_resource_dir(),
            cache_dir: default_cache_dir(),
            autosave_interval: default_autosave_interval(),
        }
    }
}

/// Browser option paths. Empty strings are resolved at startup through the
/// resource locator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserOptions {
    #[serde(rename = "Homepage URL", default)]
    pub homepage_url: String,

    #[serde(rename = "Choices File", default)]
    pub choices_file: String,

    #[serde(rename = "Cookie File", default)]
    pub cookie_file: String,

    #[serde(rename = "Cookie Jar", default)]
    pub cookie_jar: String,

    #[serde(rename = "URL File", default)]
    pub url_file: String,

    #[serde(rename = "CA Path", default)]
    pub ca_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerSettings {
    /// Editors tried in order by view-source
    #[serde(rename = "Editors", default = "default_editors")]
    pub editors: Vec<String>,

    /// Scheme (lowercase, without `:`) to external command
    #[serde(rename = "URL Handlers", default = "default_url_handlers")]
    pub url_handlers: IndexMap<String, String>,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            editors: default_editors(),
            url_handlers: default_url_handlers(),
        }
    }
}

fn default_app_name() -> String {
    "shellbridge".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_channel_capacity() -> usize {
    256
}

fn default_resource_dir() -> String {
    "/usr/share/shellbridge/res".to_string()
}

fn default_cache_dir() -> String {
    "/tmp/shellbridge".to_string()
}

fn default_autosave_interval() -> u64 {
    300
}

fn default_editors() -> Vec<String> {
    vec!["xdg-open".to_string(), "vi".to_string()]
}

fn default_url_handlers() -> IndexMap<String, String> {
    let mut handlers = IndexMap::new();
    handlers.insert("mailto".to_string(), "xdg-email".to_string());
    handlers.insert("ftp".to_string(), "xdg-open".to_string());
    handlers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_settings_defaults() {
        let settings = ShellSettings::default();
        assert_eq!(settings.app_name, "shellbridge");
        assert_eq!(settings.channel_capacity, 256);
        assert!(!settings.debug_mode);
    }

    #[test]
    fn test_handler_defaults_keep_order() {
        let handlers = HandlerSettings::default();
        let schemes: Vec<_> = handlers.url_handlers.keys().cloned().collect();
        assert_eq!(schemes, vec!["mailto", "ftp"]);
        assert_eq!(handlers.editors.len(), 2);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "Shell_Settings:\n  Debug Mode: true\n";
        let config: ShellConfig = serde_yaml_ng::from_str(yaml).unwrap();

        assert!(config.settings.debug_mode);
        assert_eq!(config.settings.channel_capacity, 256);
        assert!(config.options.homepage_url.is_empty());
        assert!(config.handlers.url_handlers.contains_key("mailto"));
    }
}
