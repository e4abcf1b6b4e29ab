//! CLI and server configuration
//!
//! Read from `<config dir>/litemodel/config.toml` (or `--config`); command
//! line flags override what the file sets.
//!
//! ```toml
//! database = "reviews.db"
//! location = "/var/lib/litemodel"
//!
//! [server]
//! port = 8080
//! format = "html"
//! ```

use crate::error::{ModelError, ModelResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "LITEMODEL_CONFIG";

/// Default port of the browsing server.
pub const DEFAULT_PORT: u16 = 5649;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database file name or path
    pub database: Option<String>,

    /// Directory holding database files
    pub location: Option<PathBuf>,

    /// Default log filter, e.g. `info` or `litemodel=debug`
    pub log_level: Option<String>,

    pub server: ServerConfig,
}

/// Browsing server settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub format: ResponseFormat,
    /// Enable CORS
    pub cors: bool,
    /// Cap on rows returned per table when the request gives no limit
    pub row_limit: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            format: ResponseFormat::Json,
            cors: true,
            row_limit: None,
        }
    }
}

impl ServerConfig {
    /// `bind:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// How the browsing server renders responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Json,
    Html,
}

impl Config {
    /// Create a new configuration builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn from_toml_str(s: &str) -> ModelResult<Self> {
        toml::from_str(s).map_err(|e| ModelError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load `path`, or the default config file when `path` is `None`.
    ///
    /// A missing default file yields the defaults; a missing explicit file is
    /// an error.
    pub fn load(path: Option<&Path>) -> ModelResult<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match default_config_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            if explicit {
                return Err(ModelError::Config(format!(
                    "config file {} not found",
                    path.display()
                )));
            }
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }
}

/// `<config dir>/litemodel/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("litemodel").join("config.toml"))
}

/// Builder for Config
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the database file
    pub fn database(mut self, name: impl Into<String>) -> Self {
        self.config.database = Some(name.into());
        self
    }

    /// Set the database directory
    pub fn location(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.location = Some(dir.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    /// Set the bind address
    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.config.server.bind = addr.into();
        self
    }

    pub fn format(mut self, format: ResponseFormat) -> Self {
        self.config.server.format = format;
        self
    }

    pub fn row_limit(mut self, limit: u64) -> Self {
        self.config.server.row_limit = Some(limit);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server.address(), "0.0.0.0:5649");
        assert_eq!(config.server.format, ResponseFormat::Json);
    }

    #[test]
    fn test_parse() {
        let config = Config::from_toml_str(
            r#"
            database = "reviews.db"
            location = "/srv/db"

            [server]
            port = 8080
            format = "html"
            cors = false
            "#,
        )
        .unwrap();
        assert_eq!(config.database.as_deref(), Some("reviews.db"));
        assert_eq!(config.location, Some(PathBuf::from("/srv/db")));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.format, ResponseFormat::Html);
        assert!(!config.server.cors);
    }

    #[test]
    fn test_bad_format() {
        let err = Config::from_toml_str("[server]\nformat = \"xml\"").unwrap_err();
        assert!(matches!(err, ModelError::Config(_)));
    }

    #[test]
    fn test_missing_explicit_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Config::load(Some(tmp.path().join("nope.toml").as_path())).unwrap_err();
        assert!(matches!(err, ModelError::Config(_)));
    }

    #[test]
    fn test_builder() {
        let config = Config::builder()
            .database("x.db")
            .port(9000)
            .format(ResponseFormat::Html)
            .build();
        assert_eq!(config.server.address(), "0.0.0.0:9000");
        assert_eq!(config.database.as_deref(), Some("x.db"));
    }
}
