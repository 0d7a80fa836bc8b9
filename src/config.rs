use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::encoding::EncodingKind;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    fn set(&mut self, value: T, source: ConfigSource) {
        self.value = value;
        self.source = source;
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the SQLite plant database
    pub database_path: ConfigValue<PathBuf>,
    /// Plant server URL; when set the CLI talks to it instead of SQLite
    pub api_url: ConfigValue<Option<String>>,
    /// Bearer key for the plant server
    #[serde(skip_serializing)]
    pub api_key: ConfigValue<Option<String>>,
    /// How images are written to the store
    pub storage_encoding: ConfigValue<EncodingKind>,
    /// Apply EXIF orientation to new images
    pub normalize_images: ConfigValue<bool>,
    /// Port the plant server listens on
    pub port: ConfigValue<u16>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    api_url: Option<String>,
    api_key: Option<String>,
    storage_encoding: Option<EncodingKind>,
    normalize_images: Option<bool>,
    port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: ConfigValue::new(
                Self::default_data_dir().join("plants.db"),
                ConfigSource::Default,
            ),
            api_url: ConfigValue::new(None, ConfigSource::Default),
            api_key: ConfigValue::new(None, ConfigSource::Default),
            storage_encoding: ConfigValue::new(EncodingKind::default(), ConfigSource::Default),
            normalize_images: ConfigValue::new(true, ConfigSource::Default),
            port: ConfigValue::new(8080, ConfigSource::Default),
            config_file: None,
        }
    }
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config.apply_file(file_config, &path);
            config.config_file = Some(path);
        }

        config.apply_env()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: ConfigFile, path: &std::path::Path) {
        let source = ConfigSource::File;

        if let Some(db_path) = file.database_path {
            // Resolve relative paths against config file's directory
            let resolved_path = if db_path.is_relative() {
                path.parent().map(|p| p.join(&db_path)).unwrap_or(db_path)
            } else {
                db_path
            };
            self.database_path.set(resolved_path, source.clone());
        }
        if let Some(url) = file.api_url {
            self.api_url.set(Some(url), source.clone());
        }
        if let Some(key) = file.api_key {
            self.api_key.set(Some(key), source.clone());
        }
        if let Some(encoding) = file.storage_encoding {
            self.storage_encoding.set(encoding, source.clone());
        }
        if let Some(normalize) = file.normalize_images {
            self.normalize_images.set(normalize, source.clone());
        }
        if let Some(port) = file.port {
            self.port.set(port, source);
        }
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        let source = ConfigSource::Environment;

        if let Ok(db_path) = std::env::var("PLANTSYNC_DATABASE_PATH") {
            self.database_path.set(PathBuf::from(db_path), source.clone());
        }
        if let Ok(url) = std::env::var("PLANTSYNC_API_URL") {
            self.api_url.set(Some(url), source.clone());
        }
        if let Ok(key) = std::env::var("PLANTSYNC_API_KEY") {
            self.api_key.set(Some(key), source.clone());
        }
        if let Ok(raw) = std::env::var("PLANTSYNC_STORAGE_ENCODING") {
            let encoding = EncodingKind::parse(&raw)
                .ok_or_else(|| ConfigError::InvalidEnv("PLANTSYNC_STORAGE_ENCODING", raw))?;
            self.storage_encoding.set(encoding, source.clone());
        }
        if let Ok(raw) = std::env::var("PLANTSYNC_NORMALIZE_IMAGES") {
            let normalize = parse_bool(&raw)
                .ok_or_else(|| ConfigError::InvalidEnv("PLANTSYNC_NORMALIZE_IMAGES", raw))?;
            self.normalize_images.set(normalize, source.clone());
        }
        if let Ok(raw) = std::env::var("PLANTSYNC_PORT") {
            let port = raw
                .parse()
                .map_err(|_| ConfigError::InvalidEnv("PLANTSYNC_PORT", raw))?;
            self.port.set(port, source);
        }

        Ok(())
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/plantsync/
    /// - macOS: ~/Library/Application Support/plantsync/
    /// - Windows: %APPDATA%/plantsync/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("plantsync")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/plantsync/
    /// - macOS: ~/Library/Application Support/plantsync/
    /// - Windows: %APPDATA%/plantsync/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("plantsync")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidEnv(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidEnv(name, value) => {
                write!(f, "Invalid value '{}' for {}", value, name)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
