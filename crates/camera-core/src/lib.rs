//! Dashcam camera core contracts.
//!
//! This crate contains the camera data structures shared by the capture
//! engine, the media store, and configuration without coupling to a concrete
//! hardware backend.

pub mod orientation;

pub use orientation::*;

use serde::{Deserialize, Serialize};

/// Pixel format of a buffer produced by the still-capture output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Compressed JPEG.
    Jpeg,
    /// JPEG with an embedded depth map.
    DepthJpeg,
    /// Planar YUV 4:2:0.
    Yuv420,
    /// Unprocessed sensor data.
    RawSensor,
}

impl PixelFormat {
    /// Whether buffers in this format are already encoded JPEG bytes.
    pub fn is_jpeg(self) -> bool {
        matches!(self, Self::Jpeg | Self::DepthJpeg)
    }

    /// MIME type used when persisting buffers of this format, if any.
    pub fn mime_type(self) -> Option<&'static str> {
        if self.is_jpeg() {
            Some("image/jpeg")
        } else {
            None
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Jpeg => "jpeg",
            Self::DepthJpeg => "depth_jpeg",
            Self::Yuv420 => "yuv420",
            Self::RawSensor => "raw_sensor",
        };
        f.write_str(name)
    }
}

/// Direction the camera lens faces relative to the device screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LensFacing {
    Front,
    #[default]
    Back,
    External,
}

impl LensFacing {
    /// Front-facing output is mirrored relative to the scene.
    pub fn is_mirrored(self) -> bool {
        self == Self::Front
    }
}

/// Static properties of an opened camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraCharacteristics {
    /// Backend identifier of the camera.
    pub camera_id: String,
    /// Lens direction.
    pub lens_facing: LensFacing,
    /// Format of the still-capture output.
    pub still_format: PixelFormat,
    /// Largest still-capture output size.
    pub still_width: u32,
    pub still_height: u32,
    /// Maximum number of still buffers the hardware keeps in flight.
    pub max_in_flight_buffers: usize,
}
