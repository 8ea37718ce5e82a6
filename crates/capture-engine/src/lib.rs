//! Dashcam Capture Engine
//!
//! Turns an opened camera session into saved photos and recordings.
//! Two pieces carry the concurrency:
//!
//! - [`StillCaptureCoordinator`] reconciles the capture-metadata stream with
//!   the image-buffer stream for one still capture, under a timeout.
//! - [`RecordingController`] serializes start/pause/resume/stop of a video
//!   recording and enforces a minimum recording duration.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                      Camera                      │
//! │  ┌─────────────────────┐  ┌────────────────────┐ │
//! │  │ StillCapture        │  │ Recording          │ │
//! │  │ Coordinator         │  │ Controller         │ │
//! │  └──┬──────────────▲───┘  └──┬──────────────┬──┘ │
//! │     │ submit       │ meta +  │ repeat       │    │
//! │     ▼              │ buffers ▼ request      ▼    │
//! │  ┌─────────────────┴──────────────┐  ┌─────────┐ │
//! │  │        CameraSession           │  │Recording│ │
//! │  └────────────────────────────────┘  │Pipeline │ │
//! │                                      └─────────┘ │
//! │  ┌────────────────────────────────────────────┐  │
//! │  │        MediaStore (photos, videos)         │  │
//! │  └────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod buffer;
pub mod camera;
pub mod error;
pub mod pipeline;
pub mod recording;
pub mod still;

pub use backend::{
    CameraSession, CaptureMetadata, CaptureRequest, CaptureScript, FixedOrientation,
    OrientationSource, RequestTemplate, SyntheticCamera,
};
pub use buffer::{BufferListener, BufferPool, QueuedBuffer};
pub use camera::*;
pub use error::*;
pub use pipeline::*;
pub use recording::*;
pub use still::*;
