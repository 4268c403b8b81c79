use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_TIME_FORMAT: &str = "[year]-[month]-[day] [hour]:[minute]:[second]";

/// Configuration for advice composition
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct AdviceConfig {
    /// What to do when a mixin list contains an absent descriptor
    pub missing_mixin: Option<MissingMixinPolicy>,

    /// Logging configuration
    pub logging: Option<LoggingConfig>,
}

/// Handling of absent mixin descriptors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MissingMixinPolicy {
    /// Log a warning naming the target and keep composing
    #[default]
    Warn,
    /// Stop composing and return an error
    Error,
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct LoggingConfig {
    /// Enable verbose (debug) logging
    pub verbose: Option<bool>,

    /// Time format for log timestamps (uses time crate format syntax)
    pub time_format: Option<String>,
}

impl AdviceConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AdviceConfig =
            toml::from_str(content).context("Failed to parse config file as TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read config file {}", path.as_ref().display())
        })?;
        Self::from_toml_str(&content)
    }

    /// Try to load configuration from standard locations
    pub fn load() -> Result<Self> {
        for path in Self::get_config_paths() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        // Return default config if no config file found
        Ok(Self::default())
    }

    /// Get potential configuration file paths in order of preference
    pub fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("advice.toml"), PathBuf::from(".advice.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("advice").join("config.toml"));
        }

        paths
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        fs::write(path.as_ref(), content).context("Failed to write config file")?;

        Ok(())
    }

    /// Reject settings that would only fail later, when logging starts
    pub fn validate(&self) -> Result<()> {
        let time_format = self.get_time_format();
        time::format_description::parse_owned::<2>(&time_format)
            .with_context(|| format!("Invalid logging time_format '{time_format}'"))?;
        Ok(())
    }

    /// JSON schema describing the configuration file
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AdviceConfig)
    }

    pub fn missing_mixin_policy(&self) -> MissingMixinPolicy {
        self.missing_mixin.unwrap_or_default()
    }

    /// Check if verbose logging is enabled by default
    pub fn is_verbose_default(&self) -> bool {
        self.logging
            .as_ref()
            .and_then(|l| l.verbose)
            .unwrap_or(false)
    }

    /// Get the time format for log timestamps
    pub fn get_time_format(&self) -> String {
        self.logging
            .as_ref()
            .and_then(|l| l.time_format.clone())
            .unwrap_or_else(|| DEFAULT_TIME_FORMAT.to_string())
    }

    pub fn logging_config(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }
}
