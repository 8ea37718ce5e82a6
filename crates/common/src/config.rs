//! Application configuration.

use std::path::{Path, PathBuf};

use dashcam_camera_core::PixelFormat;
use serde::{Deserialize, Serialize};

use crate::error::{DashcamError, DashcamResult};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root directory of the media store.
    pub media_dir: PathBuf,

    /// Application name, used as the album directory for saved media.
    pub app_name: String,

    /// Still capture tuning.
    pub capture: CaptureDefaults,

    /// Video recording tuning.
    pub recording: RecordingDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Still capture parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureDefaults {
    /// Capacity of the per-capture buffer queue. Should match the number of
    /// buffers the hardware keeps in flight.
    pub buffer_queue_capacity: usize,

    /// How long to wait for capture metadata and then for the matching
    /// buffer, in milliseconds.
    pub capture_timeout_ms: u64,

    /// Whether buffer timestamps can be compared with capture metadata on
    /// this platform at all.
    pub timestamp_matching: bool,

    /// Formats whose buffer timestamps are not comparable; for these the
    /// first delivered buffer is accepted.
    pub first_buffer_formats: Vec<PixelFormat>,
}

/// Default recording parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingDefaults {
    /// Recordings shorter than this are extended before being finalized.
    pub min_duration_ms: u64,

    /// Target frame rate.
    pub fps: u32,

    /// Output width.
    pub width: u32,

    /// Output height.
    pub height: u32,

    /// Video bitrate in bits per second.
    pub video_bitrate: u32,

    /// Whether to record the microphone.
    pub audio: bool,

    /// MIME type of the recorded container.
    pub mime_type: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "dashcam=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            media_dir: default_media_dir(),
            app_name: "Dashcam".to_string(),
            capture: CaptureDefaults::default(),
            recording: RecordingDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CaptureDefaults {
    fn default() -> Self {
        Self {
            buffer_queue_capacity: 3,
            capture_timeout_ms: 5000,
            timestamp_matching: true,
            first_buffer_formats: vec![PixelFormat::DepthJpeg],
        }
    }
}

impl Default for RecordingDefaults {
    fn default() -> Self {
        Self {
            min_duration_ms: 1000,
            fps: 30,
            width: 1920,
            height: 1080,
            video_bitrate: 10_000_000,
            audio: true,
            mime_type: "video/mp4".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit file. Unlike [`AppConfig::load`], errors
    /// are returned rather than replaced by defaults.
    pub fn load_from(path: &Path) -> DashcamResult<Self> {
        if !path.exists() {
            return Err(DashcamError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<PathBuf, std::io::Error> {
        let config_path = config_file_path();
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    /// Save config to an explicit file.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Reject values that would make capture or recording unusable.
    pub fn validate(&self) -> DashcamResult<()> {
        if self.capture.buffer_queue_capacity == 0 {
            return Err(DashcamError::config(
                "capture.buffer_queue_capacity must be at least 1",
            ));
        }
        if self.capture.capture_timeout_ms == 0 {
            return Err(DashcamError::config(
                "capture.capture_timeout_ms must be greater than 0",
            ));
        }
        if self.recording.fps == 0 {
            return Err(DashcamError::config("recording.fps must be greater than 0"));
        }
        if self.recording.width == 0 || self.recording.height == 0 {
            return Err(DashcamError::config(
                "recording.width and recording.height must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("dashcam").join("config.json")
}

/// Default media directory.
fn default_media_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("dashcam").join("media")
}
