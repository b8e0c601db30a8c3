use crate::models::InstallerConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Name of the installer configuration file
pub const CONFIG_FILE_NAME: &str = "installer.yaml";

/// Prefix of environment overrides, e.g. `PTBR_INSTALLER__PATCH_TIMEOUT_SECS=600`
pub const ENV_PREFIX: &str = "PTBR_INSTALLER";

/// Configuration manager for loading and saving the installer configuration.
///
/// Values are layered, later sources winning:
/// 1. Built-in defaults ([`InstallerConfig::default`])
/// 2. `installer.yaml` in the configuration directory (optional)
/// 3. `PTBR_INSTALLER__<FIELD>` environment variables
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
    env_prefix: String,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory holding `installer.yaml`; created if missing
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
            config_dir,
            env_prefix: ENV_PREFIX.to_string(),
        })
    }

    /// Use a different environment variable prefix
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load the layered configuration.
    ///
    /// # Returns
    /// The merged InstallerConfig; defaults when neither file nor variables exist
    pub fn load_config(&self) -> Result<InstallerConfig> {
        if !self.config_path.exists() {
            tracing::info!(
                "Config file not found at {}, using defaults",
                self.config_path
            );
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(self.config_path.as_std_path()).required(false))
            .add_source(
                config::Environment::with_prefix(&self.env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read config: {}", self.config_path))?;

        let config: InstallerConfig = settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse config: {}", self.config_path))?;

        tracing::debug!("Loaded installer config: {:?}", config);
        Ok(config)
    }

    /// Save the configuration file.
    pub fn save_config(&self, config: &InstallerConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize config to YAML")?;

        fs::write(&self.config_path, yaml_string)
            .with_context(|| format!("Failed to write config: {}", self.config_path))?;

        tracing::info!("Saved config to {}", self.config_path);
        Ok(())
    }

    /// Write the default configuration unless a file already exists.
    ///
    /// # Returns
    /// `true` when a new file was written
    pub fn create_default_config(&self) -> Result<bool> {
        if self.config_path.exists() {
            return Ok(false);
        }
        self.save_config(&InstallerConfig::default())?;
        Ok(true)
    }

    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}
