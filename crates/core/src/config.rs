//! Session configuration: default origin, zoom limits and marker hit radius.
//!
//! Configuration is layered: built-in defaults, then an optional key=value
//! file, then environment variables.

use crate::transform::Origin;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const ENV_DEFAULT_ORIGIN: &str = "PAGEPOINT_DEFAULT_ORIGIN";
const ENV_ZOOM_STEP: &str = "PAGEPOINT_ZOOM_STEP";
const ENV_MIN_ZOOM: &str = "PAGEPOINT_MIN_ZOOM";
const ENV_MAX_ZOOM: &str = "PAGEPOINT_MAX_ZOOM";
const ENV_MARKER_TOLERANCE_PX: &str = "PAGEPOINT_MARKER_TOLERANCE_PX";
const ENV_PER_PAGE_DIMENSIONS: &str = "PAGEPOINT_PER_PAGE_DIMENSIONS";

/// User-tunable settings for a viewing session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Origin selected when a session starts
    pub default_origin: Origin,
    /// Factor applied by one zoom-in or zoom-out step
    pub zoom_step: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Distance in canvas pixels within which a press grabs an existing marker
    pub marker_tolerance_px: f64,
    /// Reproject each annotation against its own page size on origin change
    /// instead of the size of the page currently shown
    pub per_page_dimensions: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_origin: Origin::BottomLeft,
            zoom_step: 1.25,
            min_zoom: 0.2,
            max_zoom: 5.0,
            marker_tolerance_px: 15.0,
            per_page_dimensions: true,
        }
    }
}

impl SessionConfig {
    pub fn with_default_origin(mut self, origin: Origin) -> Self {
        self.default_origin = origin;
        self
    }

    pub fn with_per_page_dimensions(mut self, enabled: bool) -> Self {
        self.per_page_dimensions = enabled;
        self
    }

    /// Platform config file location.
    ///
    /// - macOS: ~/Library/Application Support/pagepoint/pagepoint.toml
    /// - Linux: ~/.config/pagepoint/pagepoint.toml
    /// - Windows: %APPDATA%\pagepoint\pagepoint.toml
    pub fn default_config_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("pagepoint").join("pagepoint.toml")
        } else {
            PathBuf::from("pagepoint.toml")
        }
    }

    /// Defaults, overlaid with `path` (or the default path) when the file
    /// exists, overlaid with environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_config_path);

        let config = if path.exists() {
            log::debug!("loading config from {}", path.display());
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        config.apply_env()
    }

    /// Loads configuration from environment variables on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env()
    }

    fn apply_env(mut self) -> Result<Self, ConfigError> {
        for (key, name) in [
            ("default_origin", ENV_DEFAULT_ORIGIN),
            ("zoom_step", ENV_ZOOM_STEP),
            ("min_zoom", ENV_MIN_ZOOM),
            ("max_zoom", ENV_MAX_ZOOM),
            ("marker_tolerance_px", ENV_MARKER_TOLERANCE_PX),
            ("per_page_dimensions", ENV_PER_PAGE_DIMENSIONS),
        ] {
            if let Ok(value) = std::env::var(name) {
                self.set(key, value.trim())
                    .map_err(|_| ConfigError::InvalidValue(name.to_string()))?;
            }
        }

        self.validate()?;
        Ok(self)
    }

    /// Loads configuration from a key=value file.
    ///
    /// Expected file format:
    /// ```toml
    /// default_origin = "Bottom-Left"
    /// zoom_step = 1.25
    /// min_zoom = 0.2
    /// max_zoom = 5.0
    /// marker_tolerance_px = 15
    /// per_page_dimensions = true
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;

        Self::from_toml(&contents)
    }

    fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for line in toml_str.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"');
                config.set(key, value)?;
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue(key.to_string());

        match key {
            "default_origin" => self.default_origin = value.parse().map_err(|_| invalid())?,
            "zoom_step" => self.zoom_step = value.parse().map_err(|_| invalid())?,
            "min_zoom" => self.min_zoom = value.parse().map_err(|_| invalid())?,
            "max_zoom" => self.max_zoom = value.parse().map_err(|_| invalid())?,
            "marker_tolerance_px" => {
                self.marker_tolerance_px = value.parse().map_err(|_| invalid())?
            }
            "per_page_dimensions" => {
                self.per_page_dimensions = value.parse().map_err(|_| invalid())?
            }
            _ => {} // Ignore unknown keys
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.zoom_step > 1.0 && self.zoom_step.is_finite()) {
            return Err(ConfigError::InvalidValue("zoom_step".to_string()));
        }
        if !(self.min_zoom > 0.0 && self.min_zoom <= 1.0) {
            return Err(ConfigError::InvalidValue("min_zoom".to_string()));
        }
        if !(self.max_zoom >= 1.0 && self.max_zoom.is_finite()) {
            return Err(ConfigError::InvalidValue("max_zoom".to_string()));
        }
        if !(self.marker_tolerance_px >= 0.0 && self.marker_tolerance_px.is_finite()) {
            return Err(ConfigError::InvalidValue("marker_tolerance_px".to_string()));
        }
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path.as_ref(), self.to_toml())?;
        Ok(())
    }

    fn to_toml(&self) -> String {
        format!(
            "# pagepoint session configuration\n\
             default_origin = \"{}\"\n\
             zoom_step = {}\n\
             min_zoom = {}\n\
             max_zoom = {}\n\
             marker_tolerance_px = {}\n\
             per_page_dimensions = {}\n",
            self.default_origin,
            self.zoom_step,
            self.min_zoom,
            self.max_zoom,
            self.marker_tolerance_px,
            self.per_page_dimensions
        )
    }
}

/// Errors that can occur during configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
