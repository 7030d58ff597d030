//! INI configuration file.
//!
//! Settings live at `<config dir>/arbormap/config.ini`:
//!
//! ```ini
//! [map]
//! container = map
//! center_lat = 35.6762
//! center_lng = 139.6503
//! zoom = 10
//! focus_zoom = 15
//!
//! [logging]
//! level = info
//! directory = /var/log/arbormap
//! ```
//!
//! A missing file yields defaults. Missing keys fall back to their default
//! individually; present but unparseable values are an error.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;
use thiserror::Error;
use tracing::debug;

use crate::engine::EngineConfig;
use crate::geo::{LatLng, DEFAULT_CENTER, DEFAULT_FOCUS_ZOOM, DEFAULT_ZOOM};
use crate::logging::LoggingConfig;

/// Highest zoom level accepted from configuration.
pub const MAX_ZOOM: u8 = 22;

const MAP_SECTION: &str = "map";
const LOGGING_SECTION: &str = "logging";

/// Errors raised while reading or writing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),
}

impl ConfigError {
    fn invalid(key: ConfigKey, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// `[map]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct MapSettings {
    pub container: String,
    pub center_lat: f64,
    pub center_lng: f64,
    pub zoom: u8,
    pub focus_zoom: u8,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            container: "map".to_string(),
            center_lat: DEFAULT_CENTER.lat,
            center_lng: DEFAULT_CENTER.lng,
            zoom: DEFAULT_ZOOM,
            focus_zoom: DEFAULT_FOCUS_ZOOM,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for daily log files. Console only when unset.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub map: MapSettings,
    pub logging: LoggingSettings,
}

/// Default location of the configuration file.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("arbormap")
        .join("config.ini")
}

impl ConfigFile {
    /// Load from [`config_file_path`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config = Self::default();
        for key in ConfigKey::all() {
            if let Some(value) = ini.get_from(Some(key.section()), key.key_name()) {
                key.set(&mut config, value)?;
            }
        }
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Write to [`config_file_path`], creating the directory if needed.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section())).set(key.key_name(), value);
            }
        }
        ini.write_to_file(path)?;
        Ok(())
    }

    /// Engine settings for the configured map. Click handlers are left unset.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(self.map.container.clone())
            .with_initial_center(LatLng::new(self.map.center_lat, self.map.center_lng))
            .with_initial_zoom(self.map.zoom)
            .with_focus_zoom(self.map.focus_zoom)
    }

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.logging.level.clone(),
            directory: self.logging.directory.clone(),
            ..LoggingConfig::default()
        }
    }
}

/// Every settable configuration key, addressed as `section.key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    MapContainer,
    MapCenterLat,
    MapCenterLng,
    MapZoom,
    MapFocusZoom,
    LoggingLevel,
    LoggingDirectory,
}

impl ConfigKey {
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::MapContainer,
            ConfigKey::MapCenterLat,
            ConfigKey::MapCenterLng,
            ConfigKey::MapZoom,
            ConfigKey::MapFocusZoom,
            ConfigKey::LoggingLevel,
            ConfigKey::LoggingDirectory,
        ]
    }

    pub fn section(&self) -> &'static str {
        match self {
            ConfigKey::MapContainer
            | ConfigKey::MapCenterLat
            | ConfigKey::MapCenterLng
            | ConfigKey::MapZoom
            | ConfigKey::MapFocusZoom => MAP_SECTION,
            ConfigKey::LoggingLevel | ConfigKey::LoggingDirectory => LOGGING_SECTION,
        }
    }

    pub fn key_name(&self) -> &'static str {
        match self {
            ConfigKey::MapContainer => "container",
            ConfigKey::MapCenterLat => "center_lat",
            ConfigKey::MapCenterLng => "center_lng",
            ConfigKey::MapZoom => "zoom",
            ConfigKey::MapFocusZoom => "focus_zoom",
            ConfigKey::LoggingLevel => "level",
            ConfigKey::LoggingDirectory => "directory",
        }
    }

    /// Current value as a string; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::MapContainer => config.map.container.clone(),
            ConfigKey::MapCenterLat => config.map.center_lat.to_string(),
            ConfigKey::MapCenterLng => config.map.center_lng.to_string(),
            ConfigKey::MapZoom => config.map.zoom.to_string(),
            ConfigKey::MapFocusZoom => config.map.focus_zoom.to_string(),
            ConfigKey::LoggingLevel => config.logging.level.clone(),
            ConfigKey::LoggingDirectory => config
                .logging
                .directory
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Parse and store `value`.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match self {
            ConfigKey::MapContainer => {
                if value.is_empty() {
                    return Err(ConfigError::invalid(*self, value, "must not be empty"));
                }
                config.map.container = value.to_string();
            }
            ConfigKey::MapCenterLat => {
                let lat = self.parse_f64(value)?;
                LatLng::new(lat, 0.0)
                    .validate()
                    .map_err(|e| ConfigError::invalid(*self, value, e.to_string()))?;
                config.map.center_lat = lat;
            }
            ConfigKey::MapCenterLng => {
                let lng = self.parse_f64(value)?;
                LatLng::new(0.0, lng)
                    .validate()
                    .map_err(|e| ConfigError::invalid(*self, value, e.to_string()))?;
                config.map.center_lng = lng;
            }
            ConfigKey::MapZoom => config.map.zoom = self.parse_zoom(value)?,
            ConfigKey::MapFocusZoom => config.map.focus_zoom = self.parse_zoom(value)?,
            ConfigKey::LoggingLevel => {
                if value.is_empty() {
                    return Err(ConfigError::invalid(*self, value, "must not be empty"));
                }
                config.logging.level = value.to_string();
            }
            ConfigKey::LoggingDirectory => {
                config.logging.directory = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
        }
        Ok(())
    }

    fn parse_f64(&self, value: &str) -> Result<f64, ConfigError> {
        value
            .parse::<f64>()
            .map_err(|_| ConfigError::invalid(*self, value, "expected a number"))
    }

    fn parse_zoom(&self, value: &str) -> Result<u8, ConfigError> {
        match value.parse::<u8>() {
            Ok(zoom) if zoom <= MAX_ZOOM => Ok(zoom),
            _ => Err(ConfigError::invalid(
                *self,
                value,
                format!("expected an integer between 0 and {}", MAX_ZOOM),
            )),
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section(), self.key_name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.to_string() == s)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}
