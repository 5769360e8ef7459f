use crate::bridge::MAX_CHANNEL_CAPACITY;
use crate::models::ShellConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Configuration manager for loading and saving the shell's YAML configuration.
///
/// The configuration lives in `Shell Config.yaml` inside the configuration
/// directory. A missing file yields defaults.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Name of the configuration file inside the configuration directory.
    pub const CONFIG_FILE: &'static str = "Shell Config.yaml";

    /// Create a new ConfigManager for `config_dir`, creating the directory if needed.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            config_path: config_dir.join(Self::CONFIG_FILE),
            config_dir,
        })
    }

    /// Load the shell configuration.
    ///
    /// # Returns
    /// The loaded ShellConfig, or default if the file doesn't exist
    pub fn load_config(&self) -> Result<ShellConfig> {
        if !self.config_path.exists() {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                self.config_path
            );
            return Ok(ShellConfig::default());
        }

        let file_contents = fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config: {}", self.config_path))?;

        let config: ShellConfig = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse config: {}", self.config_path))?;

        let capacity = config.settings.channel_capacity;
        if capacity == 0 || capacity > MAX_CHANNEL_CAPACITY {
            anyhow::bail!(
                "Invalid config {}: Channel Capacity must be between 1 and {}",
                self.config_path,
                MAX_CHANNEL_CAPACITY
            );
        }

        tracing::info!("Loaded config from {}", self.config_path);
        Ok(config)
    }

    /// Save the shell configuration.
    pub fn save_config(&self, config: &ShellConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize config to YAML")?;

        fs::write(&self.config_path, yaml_string)
            .with_context(|| format!("Failed to write config: {}", self.config_path))?;

        tracing::info!("Saved config to {}", self.config_path);
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }
}
