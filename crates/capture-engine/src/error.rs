//! Error types for capture and recording.

use std::time::Duration;

use dashcam_camera_core::PixelFormat;
use dashcam_common::error::DashcamError;
use dashcam_media_store::StoreError;

/// Failures reported by the camera session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("camera disconnected")]
    Disconnected,

    #[error("camera in use")]
    InUse,

    #[error("maximum cameras in use")]
    MaxCamerasInUse,

    #[error("camera disabled by device policy")]
    DisabledByPolicy,

    #[error("fatal camera device error")]
    DeviceFatal,

    #[error("fatal camera service error")]
    ServiceFatal,

    #[error("capture session configuration failed")]
    ConfigurationFailed,

    #[error("camera session closed")]
    Closed,

    #[error("unknown camera error ({0})")]
    Unknown(i32),
}

impl SessionError {
    /// Map a numeric device error code to a session error.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::InUse,
            2 => Self::MaxCamerasInUse,
            3 => Self::DisabledByPolicy,
            4 => Self::DeviceFatal,
            5 => Self::ServiceFatal,
            other => Self::Unknown(other),
        }
    }
}

/// What a timed-out capture was waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutStage {
    /// The capture-completed metadata never arrived.
    Metadata,
    /// Metadata arrived but no buffer matched it.
    Buffer,
}

impl std::fmt::Display for TimeoutStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Metadata => f.write_str("capture metadata"),
            Self::Buffer => f.write_str("a matching image buffer"),
        }
    }
}

/// Errors returned by still capture.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("a capture is already in progress")]
    InProgress,

    #[error("capture #{ticket} timed out after {}ms waiting for {stage}", .waited.as_millis())]
    Timeout {
        ticket: u64,
        stage: TimeoutStage,
        waited: Duration,
    },

    #[error("camera session error: {0}")]
    Session(#[from] SessionError),

    #[error("cannot persist {0} output")]
    UnsupportedFormat(PixelFormat),

    #[error("media store has no destination for {0}")]
    DestinationUnavailable(String),

    #[error("failed to store photo: {0}")]
    Store(#[from] StoreError),
}

impl CaptureError {
    /// Whether the error is the reentrancy guard rather than a fault.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

/// Errors returned by the recording lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum RecordingError {
    #[error("camera session error: {0}")]
    Session(#[from] SessionError),

    #[error("recorder error: {message}")]
    Recorder { message: String },

    #[error("media store has no destination for {0}")]
    DestinationUnavailable(String),

    #[error("failed to store recording: {0}")]
    Store(#[from] StoreError),
}

impl RecordingError {
    pub fn recorder(msg: impl Into<String>) -> Self {
        Self::Recorder {
            message: msg.into(),
        }
    }
}

impl From<SessionError> for DashcamError {
    fn from(e: SessionError) -> Self {
        DashcamError::session(e.to_string())
    }
}

impl From<CaptureError> for DashcamError {
    fn from(e: CaptureError) -> Self {
        match e {
            CaptureError::Session(session) => session.into(),
            CaptureError::Store(store) => DashcamError::storage(store.to_string()),
            other => DashcamError::capture(other.to_string()),
        }
    }
}

impl From<RecordingError> for DashcamError {
    fn from(e: RecordingError) -> Self {
        match e {
            RecordingError::Session(session) => session.into(),
            RecordingError::Store(store) => DashcamError::storage(store.to_string()),
            other => DashcamError::recording(other.to_string()),
        }
    }
}
