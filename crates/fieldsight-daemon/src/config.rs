//! Configuration loading and validation

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Bind address for web server
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Paths to served asset trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// Field packages root (one subdirectory per field)
    #[serde(default = "default_fields_path")]
    pub fields_path: String,
    /// Fiducial tag textures
    #[serde(default = "default_apriltags_path")]
    pub apriltags_path: String,
    /// Static frontend files (WASM viewer)
    #[serde(default = "default_web_path")]
    pub web_path: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            fields_path: default_fields_path(),
            apriltags_path: default_apriltags_path(),
            web_path: default_web_path(),
        }
    }
}

/// Settings document persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Path to the persisted settings JSON
    #[serde(default = "default_settings_path")]
    pub path: String,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: default_settings_path(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_fields_path() -> String {
    "fields".to_string()
}

fn default_apriltags_path() -> String {
    "apriltags".to_string()
}

fn default_web_path() -> String {
    "web".to_string()
}

fn default_settings_path() -> String {
    "settings.json".to_string()
}

/// Load configuration from a TOML file, or defaults when the file does
/// not exist.
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(path = %path.display(), "No config file found, using defaults");
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.daemon.bind, "0.0.0.0:8080");
        assert_eq!(config.assets.fields_path, "fields");
        assert_eq!(config.settings.path, "settings.json");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [daemon]
            bind = "127.0.0.1:9000"
            "#,
        )
        .unwrap();
        assert_eq!(config.daemon.bind, "127.0.0.1:9000");
        assert_eq!(config.assets.web_path, "web");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = load_config(Path::new("does-not-exist.toml")).unwrap();
        assert_eq!(config.daemon.bind, "0.0.0.0:8080");
    }
}
