//! Error types shared across Dashcam crates.

use std::path::PathBuf;

/// Top-level error type for Dashcam operations.
#[derive(Debug, thiserror::Error)]
pub enum DashcamError {
    #[error("Capture error: {message}")]
    Capture { message: String },

    #[error("Recording error: {message}")]
    Recording { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Camera session error: {message}")]
    Session { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using DashcamError.
pub type DashcamResult<T> = Result<T, DashcamError>;

impl DashcamError {
    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
        }
    }

    pub fn recording(msg: impl Into<String>) -> Self {
        Self::Recording {
            message: msg.into(),
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage {
            message: msg.into(),
        }
    }

    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}
