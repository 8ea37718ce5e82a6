//! Contracts the engine consumes from the camera hardware layer.
//!
//! Opening a device and configuring its session happen outside the engine;
//! what arrives here is an already-active [`CameraSession`].

use std::sync::atomic::{AtomicI32, Ordering};

use dashcam_camera_core::CameraCharacteristics;
use tokio::sync::oneshot;

use crate::buffer::{BufferListener, QueuedBuffer};
use crate::error::SessionError;

pub mod synthetic;

pub use synthetic::{
    default_characteristics, BufferStamp, CaptureScript, MetadataOutcome, ScriptedBuffer,
    SyntheticCamera,
};

/// Request template, mirroring what the hardware is asked to optimize for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestTemplate {
    Preview,
    StillCapture,
    Record,
}

/// A capture request submitted to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    pub template: RequestTemplate,
    /// Fixed frame rate for all targets, if requested.
    pub target_fps: Option<u32>,
}

impl CaptureRequest {
    pub fn preview() -> Self {
        Self {
            template: RequestTemplate::Preview,
            target_fps: None,
        }
    }

    pub fn still_capture() -> Self {
        Self {
            template: RequestTemplate::StillCapture,
            target_fps: None,
        }
    }

    pub fn record(fps: u32) -> Self {
        Self {
            template: RequestTemplate::Record,
            target_fps: Some(fps),
        }
    }
}

/// Metadata of a completed capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureMetadata {
    /// Hardware frame counter.
    pub frame_number: u64,
    /// Sensor timestamp of the exposure, in the same clock as buffer
    /// timestamps when the platform guarantees it.
    pub sensor_timestamp_ns: i64,
}

/// Resolves once with the capture's metadata or the session failure.
pub type MetadataReceiver = oneshot::Receiver<Result<CaptureMetadata, SessionError>>;

/// An open, configured camera pipeline.
///
/// Implementations deliver capture metadata through the receiver returned
/// by [`CameraSession::submit_capture`] and image buffers to the registered
/// [`BufferListener`]. Buffers produced while no listener is registered
/// stay in the session until taken with
/// [`CameraSession::acquire_next_buffer`].
#[async_trait::async_trait]
pub trait CameraSession: Send + Sync {
    /// Static properties of the opened camera.
    fn characteristics(&self) -> &CameraCharacteristics;

    /// Submit a single capture request.
    async fn submit_capture(&self, request: CaptureRequest)
        -> Result<MetadataReceiver, SessionError>;

    /// Route newly available still buffers to `listener`, replacing any
    /// previous listener.
    fn register_buffer_listener(&self, listener: BufferListener);

    /// Stop routing buffers to the registered listener.
    fn unregister_buffer_listener(&self);

    /// Take the oldest buffer that arrived while no listener was registered.
    fn acquire_next_buffer(&self) -> Option<QueuedBuffer>;

    /// Install `request` as the repeating request (preview or record).
    async fn repeat_preview(&self, request: CaptureRequest) -> Result<(), SessionError>;

    /// Cancel the repeating request.
    async fn stop_repeating(&self) -> Result<(), SessionError>;

    /// Close the session and release every buffer it still holds.
    async fn close(&self);
}

/// Supplies the device rotation relative to the sensor, in degrees.
pub trait OrientationSource: Send + Sync {
    /// Current rotation, or `None` if not known yet.
    fn rotation_degrees(&self) -> Option<i32>;
}

/// Orientation source holding a value set by its owner.
#[derive(Debug, Default)]
pub struct FixedOrientation {
    degrees: AtomicI32,
}

impl FixedOrientation {
    pub fn new(degrees: i32) -> Self {
        Self {
            degrees: AtomicI32::new(degrees),
        }
    }

    pub fn set(&self, degrees: i32) {
        self.degrees.store(degrees, Ordering::Relaxed);
    }
}

impl OrientationSource for FixedOrientation {
    fn rotation_degrees(&self) -> Option<i32> {
        Some(self.degrees.load(Ordering::Relaxed))
    }
}
