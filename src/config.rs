//! Configuration for the map view.
//!
//! Every section and key is optional; missing values fall back to the
//! Stuttgart defaults. Example:
//!
//! ```toml
//! [view]
//! center = [9.1829, 48.7758]
//! zoom = 11.0
//!
//! [clustering]
//! enabled = true
//! radius = 50
//! ```

use crate::geo::LngLat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while reading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Camera position handed to the host at construction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewState {
    pub center: LngLat,
    pub zoom: f64,
    pub pitch: Option<f64>,
    pub bearing: Option<f64>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            center: LngLat::new(9.1829, 48.7758),
            zoom: 11.0,
            pitch: None,
            bearing: None,
        }
    }
}

/// Base map: a raster tile source plus attribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// URL templates containing `{z}`, `{x}` and `{y}`
    pub tiles: Vec<String>,
    pub tile_size: u32,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub attribution: String,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            tiles: vec![
                "https://a.basemaps.cartocdn.com/light_all/{z}/{x}/{y}.png".into(),
                "https://b.basemaps.cartocdn.com/light_all/{z}/{x}/{y}.png".into(),
                "https://c.basemaps.cartocdn.com/light_all/{z}/{x}/{y}.png".into(),
            ],
            tile_size: 256,
            min_zoom: 0,
            max_zoom: 19,
            attribution: "© OpenStreetMap contributors, © CartoDB".into(),
        }
    }
}

/// Highest zoom clustering can be configured for
pub const MAX_CLUSTER_ZOOM: u8 = 24;

/// Clustering options for the point source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterOptions {
    pub enabled: bool,
    /// Cluster radius in screen pixels
    pub radius: u32,
    /// Highest zoom at which points are still clustered
    pub max_zoom: u8,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            radius: 50,
            max_zoom: 14,
        }
    }
}

impl ClusterOptions {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.radius == 0 {
            return Err(ConfigError::InvalidValue {
                key: "clustering.radius".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.max_zoom > MAX_CLUSTER_ZOOM {
            return Err(ConfigError::InvalidValue {
                key: "clustering.max_zoom".into(),
                reason: format!("must be at most {MAX_CLUSTER_ZOOM}"),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// GeoJSON file with the features; the built-in Stuttgart set is used when absent
    pub features: Option<PathBuf>,
    pub show_features: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            features: None,
            show_features: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    pub file: String,
    /// Default filter when RUST_LOG is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            file: "geopol-map.log".into(),
            level: "info".into(),
        }
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub view: ViewState,
    pub style: StyleConfig,
    pub clustering: ClusterOptions,
    pub data: DataConfig,
    pub logging: LoggingConfig,
}

impl MapConfig {
    /// Read and validate a TOML configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: MapConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.view.center.is_valid() {
            return Err(ConfigError::InvalidValue {
                key: "view.center".into(),
                reason: "must be [longitude, latitude] in degrees".into(),
            });
        }
        if !(0.0..=24.0).contains(&self.view.zoom) {
            return Err(ConfigError::InvalidValue {
                key: "view.zoom".into(),
                reason: "must be between 0 and 24".into(),
            });
        }
        self.clustering.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_stuttgart_setup() {
        let config = MapConfig::default();
        assert_eq!(config.view.center, LngLat::new(9.1829, 48.7758));
        assert_eq!(config.view.zoom, 11.0);
        assert!(!config.clustering.enabled);
        assert_eq!(config.clustering.radius, 50);
        assert_eq!(config.clustering.max_zoom, 14);
        assert_eq!(config.style.tiles.len(), 3);
    }

    #[test]
    fn test_partial_file_overlays_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[view]\nzoom = 13.5\n\n[clustering]\nenabled = true").unwrap();

        let config = MapConfig::load(file.path()).unwrap();
        assert_eq!(config.view.zoom, 13.5);
        assert_eq!(config.view.center, LngLat::new(9.1829, 48.7758));
        assert!(config.clustering.enabled);
        assert_eq!(config.clustering.radius, 50);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[clustering]\nradius = 0").unwrap();
        let err = MapConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_cluster_zoom_limit() {
        let options = ClusterOptions {
            max_zoom: 255,
            ..ClusterOptions::enabled()
        };
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("clustering.max_zoom"));
        assert!(ClusterOptions {
            max_zoom: MAX_CLUSTER_ZOOM,
            ..ClusterOptions::enabled()
        }
        .validate()
        .is_ok());
    }

    #[test]
    fn test_missing_file() {
        let err = MapConfig::load(Path::new("/nonexistent/geopol.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
