use crate::error::{ExchangeError, Result};
use crate::model::ExportFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILENAME: &str = "config.json";
const DEFAULT_PASSWORD_ATTEMPTS: u32 = 3;

/// Configuration for subjex, stored in `<data dir>/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExchangeConfig {
    /// How many passwords to try on an encrypted import before giving up
    #[serde(default = "default_password_attempts")]
    pub max_password_attempts: u32,

    /// Parent directory for import staging; the system temp dir when unset
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,

    /// Container written by `export` when no format is given
    #[serde(default)]
    pub default_format: ExportFormat,
}

fn default_password_attempts() -> u32 {
    DEFAULT_PASSWORD_ATTEMPTS
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            max_password_attempts: DEFAULT_PASSWORD_ATTEMPTS,
            staging_dir: None,
            default_format: ExportFormat::default(),
        }
    }
}

impl ExchangeConfig {
    /// Load config from the given directory, or return defaults if not found
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILENAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(ExchangeError::Io)?;
        let config: ExchangeConfig =
            serde_json::from_str(&content).map_err(ExchangeError::Serialization)?;
        Ok(config)
    }

    /// Save config to the given directory
    pub fn save<P: AsRef<Path>>(&self, config_dir: P) -> Result<()> {
        let config_dir = config_dir.as_ref();

        if !config_dir.exists() {
            fs::create_dir_all(config_dir).map_err(ExchangeError::Io)?;
        }

        let config_path = config_dir.join(CONFIG_FILENAME);
        let content = serde_json::to_string_pretty(self).map_err(ExchangeError::Serialization)?;
        fs::write(config_path, content).map_err(ExchangeError::Io)?;
        Ok(())
    }

    pub fn keys() -> &'static [&'static str] {
        &["max-password-attempts", "staging-dir", "default-format"]
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "max-password-attempts" => Some(self.max_password_attempts.to_string()),
            "staging-dir" => Some(
                self.staging_dir
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            ),
            "default-format" => Some(self.default_format.to_string()),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> std::result::Result<(), String> {
        match key {
            "max-password-attempts" => {
                let attempts: u32 = value
                    .parse()
                    .map_err(|_| format!("Not a number: {}", value))?;
                if attempts == 0 {
                    return Err("max-password-attempts must be at least 1".to_string());
                }
                self.max_password_attempts = attempts;
            }
            "staging-dir" => {
                self.staging_dir = if value.trim().is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "default-format" => {
                self.default_format = value.parse()?;
            }
            _ => return Err(format!("Unknown config key: {}", key)),
        }
        Ok(())
    }
}
