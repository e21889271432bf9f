//! Configuration loading

use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

/// Top-level configuration (from .caravan.toml)
#[derive(Debug, Default, Deserialize)]
pub struct CaravanFileConfig {
    #[serde(default)]
    pub registry: RegistrySectionConfig,
    #[serde(default)]
    pub engine: EngineSectionConfig,
}

/// Registry connection section
#[derive(Debug, Deserialize)]
pub struct RegistrySectionConfig {
    #[serde(default = "default_registry_url")]
    pub url: String,
}

/// Engine defaults section
#[derive(Debug, Deserialize)]
pub struct EngineSectionConfig {
    #[serde(default = "default_tag")]
    pub default_tag: String,
}

fn default_registry_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_tag() -> String {
    "v1".to_string()
}

impl Default for RegistrySectionConfig {
    fn default() -> Self {
        Self {
            url: default_registry_url(),
        }
    }
}

impl Default for EngineSectionConfig {
    fn default() -> Self {
        Self {
            default_tag: default_tag(),
        }
    }
}

impl CaravanFileConfig {
    /// Load config from .caravan.toml
    ///
    /// Search order:
    /// 1. ./.caravan.toml (current directory)
    /// 2. <config dir>/caravan/config.toml
    /// 3. Fall back to defaults
    pub fn load() -> Result<Self> {
        if let Ok(cwd) = std::env::current_dir() {
            let local_config = cwd.join(".caravan.toml");
            if local_config.exists() {
                tracing::debug!(path = %local_config.display(), "loading config");
                return Self::load_from_path(&local_config);
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("caravan").join("config.toml");
            if user_config.exists() {
                tracing::debug!(path = %user_config.display(), "loading config");
                return Self::load_from_path(&user_config);
            }
        }

        tracing::debug!("no config file found, using defaults");
        Ok(Self::default())
    }

    /// Load from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CaravanFileConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CaravanFileConfig::default();
        assert_eq!(config.registry.url, "http://localhost:5000");
        assert_eq!(config.engine.default_tag, "v1");
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[registry]\nurl = \"http://registry.internal:5000\"\n\n[engine]\ndefault_tag = \"stable\"\n"
        )
        .unwrap();

        let config = CaravanFileConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.registry.url, "http://registry.internal:5000");
        assert_eq!(config.engine.default_tag, "stable");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[registry]\nurl = \"http://other:5000\"\n").unwrap();

        let config = CaravanFileConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.registry.url, "http://other:5000");
        assert_eq!(config.engine.default_tag, "v1");
    }
}
