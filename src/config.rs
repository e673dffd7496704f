//! Configuration management for the capturer
//!
//! Loads and saves the capture defaults the CLI and embedding applications start from:
//! which camera to open, the format to negotiate, listener buffering and log filter.

use crate::errors::CapturerError;
use crate::types::{CameraSource, VideoDimensions, VideoFormat, VideoPixelFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturerConfig {
    pub capture: CaptureSettings,
    pub delivery: DeliverySettings,
    pub logging: LoggingSettings,
}

/// Capture defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Camera to open first ("front" or "back")
    pub source: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Pixel layout name, e.g. "NV21"
    pub pixel_format: String,
}

/// Frame delivery to channel listeners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliverySettings {
    /// Frames buffered before a lagging consumer starts losing them
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// env_logger filter used when RUST_LOG is unset
    pub filter: String,
}

impl Default for CapturerConfig {
    fn default() -> Self {
        Self {
            capture: CaptureSettings {
                source: CameraSource::BackCamera.as_str().to_string(),
                width: 1280,
                height: 720,
                fps: 30,
                pixel_format: VideoPixelFormat::Nv21.as_str().to_string(),
            },
            delivery: DeliverySettings {
                channel_capacity: 8,
            },
            logging: LoggingSettings {
                filter: crate::DEFAULT_LOG_FILTER.to_string(),
            },
        }
    }
}

impl CaptureSettings {
    pub fn camera_source(&self) -> Result<CameraSource, CapturerError> {
        self.source.parse()
    }

    /// Format to negotiate against the catalog.
    pub fn requested_format(&self) -> Result<VideoFormat, CapturerError> {
        let pixel_format: VideoPixelFormat = self
            .pixel_format
            .parse()
            .map_err(|e| CapturerError::ConfigError(format!("capture.pixel_format: {e}")))?;
        Ok(VideoFormat::new(
            VideoDimensions::new(self.width, self.height),
            self.fps,
            pixel_format,
        ))
    }
}

impl CapturerConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CapturerError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            CapturerError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        let config: CapturerConfig = toml::from_str(&contents).map_err(|e| {
            CapturerError::ConfigError(format!("Failed to parse config file: {}", e))
        })?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CapturerError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                CapturerError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(|e| {
            CapturerError::ConfigError(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, toml_string).map_err(|e| {
            CapturerError::ConfigError(format!("Failed to write config file: {}", e))
        })?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from("camera-capturer.toml")
    }

    /// Load from default location, falling back to defaults on any error
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    pub fn validate(&self) -> Result<(), CapturerError> {
        let capture = &self.capture;
        if capture.width == 0 || capture.height == 0 {
            return Err(CapturerError::ConfigError(
                "Invalid capture resolution".to_string(),
            ));
        }
        if capture.fps == 0 || capture.fps > 240 {
            return Err(CapturerError::ConfigError(
                "Invalid capture FPS (must be 1-240)".to_string(),
            ));
        }
        capture.camera_source()?;
        capture.requested_format()?;

        if self.delivery.channel_capacity == 0 {
            return Err(CapturerError::ConfigError(
                "Channel capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CapturerConfig::default();
        assert_eq!(config.capture.source, "back");
        assert_eq!(config.capture.fps, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_requested_format() {
        let config = CapturerConfig::default();
        let format = config.capture.requested_format().unwrap();
        assert_eq!(format, VideoFormat::hd_720p());
    }

    #[test]
    fn test_config_validation() {
        let mut bad = CapturerConfig::default();
        bad.capture.width = 0;
        assert!(bad.validate().is_err());

        let mut bad = CapturerConfig::default();
        bad.capture.fps = 241;
        assert!(bad.validate().is_err());

        let mut bad = CapturerConfig::default();
        bad.capture.source = "sideways".into();
        assert!(bad.validate().is_err());

        let mut bad = CapturerConfig::default();
        bad.delivery.channel_capacity = 0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_config_toml_format() {
        let config = CapturerConfig::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[capture]"));
        assert!(toml_string.contains("[delivery]"));
        assert!(toml_string.contains("[logging]"));
        assert!(toml_string.contains("pixel_format"));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = CapturerConfig::load_from_file("nonexistent_capturer_config.toml");
        assert_eq!(result.unwrap(), CapturerConfig::default());
    }
}
